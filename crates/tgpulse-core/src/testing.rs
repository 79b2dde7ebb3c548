//! In-crate test doubles shared by the engine, dispatcher and router tests.

use std::{collections::VecDeque, path::Path, sync::Mutex, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    dispatch::Processor,
    domain::{BotCommand, Chat, Message, MessageEntity, Update},
    engine::EngineHandle,
    ports::{api, Transport},
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Vec<(String, String)>,
    pub field: Option<String>,
    pub file: Option<String>,
}

/// Transport double: records every call, serves scripted `getUpdates`
/// envelopes in order, and can request engine stop once the script runs dry.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Result<Value>>>,
    offsets: Mutex<Vec<u64>>,
    identify: Mutex<Option<Value>>,
    fail_methods: Mutex<Vec<String>>,
    stop: Mutex<Option<EngineHandle>>,
}

impl RecordingTransport {
    pub fn push_batch(&self, envelope: Value) {
        self.script.lock().unwrap().push_back(Ok(envelope));
    }

    pub fn push_fetch_error(&self, error: Error) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn set_identify(&self, envelope: Value) {
        *self.identify.lock().unwrap() = Some(envelope);
    }

    pub fn fail_method(&self, method: &str) {
        self.fail_methods.lock().unwrap().push(method.to_string());
    }

    /// Once the scripted envelopes are exhausted, ask the engine to stop and
    /// keep serving empty batches until it does.
    pub fn stop_after_script(&self, handle: EngineHandle) {
        *self.stop.lock().unwrap() = Some(handle);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().unwrap().clone()
    }

    fn record(
        &self,
        method: &str,
        params: &[(&str, String)],
        field: Option<&str>,
        file: Option<&Path>,
    ) {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            field: field.map(str::to_string),
            file: file.map(|p| p.display().to_string()),
        });
    }

    fn check_failure(&self, method: &str) -> Result<()> {
        if self.fail_methods.lock().unwrap().iter().any(|m| m == method) {
            return Err(Error::Service(400));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get_updates(&self, cursor: u64, _limit: u32, _poll_timeout: Duration) -> Result<Value> {
        self.offsets.lock().unwrap().push(cursor);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => {
                if let Some(handle) = self.stop.lock().unwrap().as_ref() {
                    handle.stop();
                }
                Ok(json!({ "ok": true, "result": [] }))
            }
        }
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        self.record(method, params, None, None);
        self.check_failure(method)?;
        if method == api::GET_ME {
            if let Some(envelope) = self.identify.lock().unwrap().clone() {
                return Ok(envelope);
            }
            return Ok(json!({
                "ok": true,
                "result": { "id": 1, "is_bot": true, "first_name": "double" }
            }));
        }
        Ok(json!({ "ok": true, "result": {} }))
    }

    async fn call_with_file(
        &self,
        method: &str,
        params: &[(&str, String)],
        field: &str,
        path: &Path,
    ) -> Result<Value> {
        self.record(method, params, Some(field), Some(path));
        self.check_failure(method)?;
        Ok(json!({ "ok": true, "result": {} }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Seen {
    Message(u64),
    Commands(u64, Vec<BotCommand>),
    Edited(u64),
}

/// Processor double that records which callback fired, keyed by message id.
#[derive(Default)]
pub struct RecordingProcessor {
    seen: Mutex<Vec<Seen>>,
}

impl RecordingProcessor {
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn on_message(&self, message: &Message, _engine: &EngineHandle) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Message(message.message_id));
        Ok(())
    }

    async fn on_bot_commands(
        &self,
        message: &Message,
        commands: &[BotCommand],
        _engine: &EngineHandle,
    ) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Commands(message.message_id, commands.to_vec()));
        Ok(())
    }

    async fn on_message_edited(&self, message: &Message, _engine: &EngineHandle) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push(Seen::Edited(message.message_id));
        Ok(())
    }
}

pub fn chat(id: u64) -> Chat {
    Chat {
        id,
        kind: "group".to_string(),
        title: None,
        user_name: None,
        first_name: None,
        last_name: None,
    }
}

pub fn entity(kind: &str, offset: u32, length: u32) -> MessageEntity {
    MessageEntity {
        kind: kind.to_string(),
        offset,
        length,
        user: None,
        url: None,
    }
}

pub fn message(message_id: u64, text: Option<&str>, entities: Vec<MessageEntity>) -> Message {
    Message {
        message_id,
        date: 1700000000,
        chat: chat(10),
        from: Some(crate::domain::User {
            id: 5,
            is_bot: false,
            first_name: "Ada".to_string(),
            last_name: None,
            username: None,
        }),
        forward_from: None,
        reply_to_message: None,
        text: text.map(str::to_string),
        entities: if entities.is_empty() {
            None
        } else {
            Some(entities)
        },
        sticker: None,
        new_chat_members: None,
        left_chat_member: None,
    }
}

pub fn update_with_message(update_id: u64, message: Message) -> Update {
    Update {
        update_id,
        message: Some(message),
        edited_message: None,
    }
}

pub fn update_with_edit(update_id: u64, message: Message) -> Update {
    Update {
        update_id,
        message: None,
        edited_message: Some(message),
    }
}
