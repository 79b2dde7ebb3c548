use serde::Deserialize;

/// A Telegram chat (private, group, supergroup or channel).
///
/// `id` and `kind` are always present on the wire; everything else depends on
/// the chat type.
#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A Telegram user or bot account.
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: u64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// An incoming message. Only `message_id`, `date` and `chat` are guaranteed;
/// the payload fields are populated per message kind.
#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub message_id: u64,
    pub date: u64,
    pub chat: Chat,
    pub from: Option<User>,
    pub forward_from: Option<User>,
    pub reply_to_message: Option<Box<Message>>,
    pub text: Option<String>,
    pub entities: Option<Vec<MessageEntity>>,
    pub sticker: Option<Sticker>,
    pub new_chat_members: Option<Vec<User>>,
    pub left_chat_member: Option<User>,
}

/// A tagged sub-range of a message's text.
///
/// `offset` and `length` are text-unit positions, not byte offsets.
#[derive(Clone, Debug, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: u32,
    pub length: u32,
    pub user: Option<User>,
    pub url: Option<String>,
}

impl MessageEntity {
    pub const BOT_COMMAND: &'static str = "bot_command";
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sticker {
    pub file_id: String,
    pub width: i32,
    pub height: i32,
    pub is_animated: bool,
    pub emoji: Option<String>,
    pub set_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub width: i32,
    pub height: i32,
    pub duration: i32,
    pub thumb: Option<PhotoSize>,
    pub mime_type: Option<String>,
    pub file_size: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i32,
    pub height: i32,
    pub file_size: Option<i32>,
}

/// One long-poll event. `update_id` is assigned by the server, strictly
/// increasing with possible gaps. At most one payload field is populated;
/// updates carrying neither are ignored by the dispatcher.
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: u64,
    pub message: Option<Message>,
    pub edited_message: Option<Message>,
}

/// A bot command extracted from a `bot_command` entity. Derived locally,
/// never transmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub offset: u32,
    pub length: u32,
}
