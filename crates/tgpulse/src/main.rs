use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use tgpulse_core::{
    codec::JsonCodec,
    config::Config,
    domain::{BotCommand, Message},
    engine::{EngineConfig, EngineHandle, PollEngine},
    router::{CommandHandler, CommandRouter},
    Result,
};
use tgpulse_http::{HttpTransport, HttpTransportConfig};

/// `/status`: reply with a short liveness note.
struct Status;

#[async_trait]
impl CommandHandler for Status {
    async fn handle(
        &self,
        message: &Message,
        _command: &BotCommand,
        engine: &EngineHandle,
    ) -> Result<()> {
        engine.reply_message(&message.chat, message, "alive and polling");
        Ok(())
    }
}

/// `/title <text>`: rename the chat to the text following the command.
struct Title;

#[async_trait]
impl CommandHandler for Title {
    async fn handle(
        &self,
        message: &Message,
        command: &BotCommand,
        engine: &EngineHandle,
    ) -> Result<()> {
        let text = message.text.as_deref().unwrap_or_default();
        let rest: String = text.chars().skip(command.length as usize).collect();
        let title = rest.trim();

        if title.is_empty() {
            engine.reply_message(&message.chat, message, "Usage: /title <new title>");
        } else {
            engine.set_chat_title(&message.chat, title);
        }
        Ok(())
    }
}

/// `/video`: upload the configured video file to the chat.
struct Video {
    path: Option<PathBuf>,
}

#[async_trait]
impl CommandHandler for Video {
    async fn handle(
        &self,
        message: &Message,
        _command: &BotCommand,
        engine: &EngineHandle,
    ) -> Result<()> {
        match &self.path {
            Some(path) => engine.send_video(&message.chat, path.clone()),
            None => engine.reply_message(&message.chat, message, "No video is configured."),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgpulse_core::logging::init("tgpulse")?;

    let cfg = Config::load()?;

    let transport = Arc::new(HttpTransport::new(HttpTransportConfig {
        token: cfg.telegram_bot_token.clone(),
        api_base: cfg.api_base.clone(),
        proxy: cfg.proxy.clone(),
        connect_timeout: cfg.connect_timeout,
    })?);

    let router = CommandRouter::new()
        .route("/status", Arc::new(Status))
        .route("/title", Arc::new(Title))
        .route(
            "/video",
            Arc::new(Video {
                path: cfg.video_path.clone(),
            }),
        );

    let engine = PollEngine::new(
        transport,
        Arc::new(JsonCodec::new()),
        EngineConfig {
            batch_limit: cfg.batch_limit,
            poll_timeout: cfg.poll_timeout,
        },
    );

    // Blocking mode: lend this task to the worker until it is stopped.
    let worker = engine.start(Arc::new(router)).await?;
    worker.run().await;

    Ok(())
}
