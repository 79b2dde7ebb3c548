//! Name-to-handler command routing on top of the dispatcher.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::warn;

use crate::{
    domain::{BotCommand, Message},
    dispatch::Processor,
    engine::EngineHandle,
    Result,
};

/// One registered command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        message: &Message,
        command: &BotCommand,
        engine: &EngineHandle,
    ) -> Result<()>;
}

/// Routes extracted bot commands to registered handlers by command text and
/// replies to anything unregistered. Messages without a sender are dropped.
#[derive(Default)]
pub struct CommandRouter {
    routes: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name` (e.g. `"/status"`), builder style.
    pub fn route(mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.routes.insert(name.into(), handler);
        self
    }
}

#[async_trait]
impl Processor for CommandRouter {
    async fn on_message(&self, _message: &Message, _engine: &EngineHandle) -> Result<()> {
        Ok(())
    }

    async fn on_bot_commands(
        &self,
        message: &Message,
        commands: &[BotCommand],
        engine: &EngineHandle,
    ) -> Result<()> {
        if message.from.is_none() {
            return Ok(());
        }

        for command in commands {
            match self.routes.get(&command.command) {
                Some(handler) => {
                    if let Err(error) = handler.handle(message, command, engine).await {
                        warn!(command = %command.command, %error, "command handler failed");
                    }
                }
                None => {
                    engine.send_message(
                        &message.chat,
                        format!("Unknown command \"{}\".", command.command),
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::domain::MessageEntity;
    use crate::dispatch::extract_commands;
    use crate::testing::{entity, message};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        handled: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandHandler for Recording {
        async fn handle(
            &self,
            _message: &Message,
            command: &BotCommand,
            _engine: &EngineHandle,
        ) -> Result<()> {
            self.handled.lock().unwrap().push(command.command.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn routes_registered_commands() {
        let handler = Arc::new(Recording::default());
        let router = CommandRouter::new().route("/status", handler.clone());
        let engine = EngineHandle::test_handle();

        let msg = message(
            1,
            Some("/status"),
            vec![entity(MessageEntity::BOT_COMMAND, 0, 7)],
        );
        let commands = extract_commands(&msg);

        router.on_bot_commands(&msg, &commands, &engine).await.unwrap();

        assert_eq!(*handler.handled.lock().unwrap(), vec!["/status"]);
        assert!(engine.queued().is_empty());
    }

    #[tokio::test]
    async fn unknown_commands_get_a_reply() {
        let router = CommandRouter::new();
        let engine = EngineHandle::test_handle();

        let msg = message(
            1,
            Some("/nope"),
            vec![entity(MessageEntity::BOT_COMMAND, 0, 5)],
        );
        let commands = extract_commands(&msg);

        router.on_bot_commands(&msg, &commands, &engine).await.unwrap();

        assert_eq!(
            engine.queued(),
            vec![Action::SendMessage {
                chat_id: msg.chat.id,
                text: "Unknown command \"/nope\".".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn anonymous_messages_are_dropped() {
        let handler = Arc::new(Recording::default());
        let router = CommandRouter::new().route("/status", handler.clone());
        let engine = EngineHandle::test_handle();

        let mut msg = message(
            1,
            Some("/status"),
            vec![entity(MessageEntity::BOT_COMMAND, 0, 7)],
        );
        msg.from = None;
        let commands = extract_commands(&msg);

        router.on_bot_commands(&msg, &commands, &engine).await.unwrap();

        assert!(handler.handled.lock().unwrap().is_empty());
        assert!(engine.queued().is_empty());
    }
}
