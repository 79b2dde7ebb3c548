//! Outgoing effects, queued during dispatch and drained after it.

use std::path::PathBuf;

use crate::{
    ports::{api, Transport},
    Result,
};

/// A pending outgoing effect. Each variant captures everything needed to
/// execute itself: chat/message identifiers and payload. The queue never
/// inspects action contents, it only orders them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    SendMessage {
        chat_id: u64,
        text: String,
    },
    ReplyMessage {
        chat_id: u64,
        reply_to: u64,
        text: String,
    },
    SetChatTitle {
        chat_id: u64,
        title: String,
    },
    SendVideo {
        chat_id: u64,
        path: PathBuf,
    },
}

impl Action {
    /// Render this action into the corresponding API call.
    pub async fn execute(&self, transport: &dyn Transport) -> Result<()> {
        match self {
            Action::SendMessage { chat_id, text } => {
                transport
                    .call(
                        api::SEND_MESSAGE,
                        &[
                            ("chat_id", chat_id.to_string()),
                            ("text", text.clone()),
                        ],
                    )
                    .await?;
            }
            Action::ReplyMessage {
                chat_id,
                reply_to,
                text,
            } => {
                transport
                    .call(
                        api::SEND_MESSAGE,
                        &[
                            ("chat_id", chat_id.to_string()),
                            ("text", text.clone()),
                            ("reply_to_message_id", reply_to.to_string()),
                        ],
                    )
                    .await?;
            }
            Action::SetChatTitle { chat_id, title } => {
                transport
                    .call(
                        api::SET_CHAT_TITLE,
                        &[
                            ("chat_id", chat_id.to_string()),
                            ("title", title.clone()),
                        ],
                    )
                    .await?;
            }
            Action::SendVideo { chat_id, path } => {
                tracing::info!(path = %path.display(), "uploading video");
                transport
                    .call_with_file(
                        api::SEND_VIDEO,
                        &[("chat_id", chat_id.to_string())],
                        "video",
                        path,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}
