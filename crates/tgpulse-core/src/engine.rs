//! The poll-dispatch-act cycle.
//!
//! A single worker task owns the cursor and runs fetch → advance → dispatch →
//! drain until stopped. The engine never spawns the worker itself: `start`
//! validates the credential and hands back a [`Worker`] for the caller to
//! `tokio::spawn` (detached) or `.await` (blocking).

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    actions::Action,
    dispatch::{self, Processor},
    domain::{Chat, Message},
    ports::{Codec, Transport},
    Result,
};

/// Cycle tuning. Defaults match the server-side maximum batch size and a
/// moderate long-poll wait.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub batch_limit: u32,
    pub poll_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_limit: 256,
            poll_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<Action>>,
    stop: AtomicBool,
    terminated: AtomicBool,
}

/// Cloneable handle for enqueuing outgoing actions and requesting stop.
///
/// Handed to processor callbacks during dispatch; every operation only
/// appends to the queue. Nothing executes until the drain step.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl EngineHandle {
    pub fn enqueue(&self, action: Action) {
        self.shared.queue.lock().unwrap().push_back(action);
    }

    pub fn send_message(&self, chat: &Chat, text: impl Into<String>) {
        self.enqueue(Action::SendMessage {
            chat_id: chat.id,
            text: text.into(),
        });
    }

    pub fn reply_message(&self, chat: &Chat, target: &Message, text: impl Into<String>) {
        self.enqueue(Action::ReplyMessage {
            chat_id: chat.id,
            reply_to: target.message_id,
            text: text.into(),
        });
    }

    pub fn set_chat_title(&self, chat: &Chat, title: impl Into<String>) {
        self.enqueue(Action::SetChatTitle {
            chat_id: chat.id,
            title: title.into(),
        });
    }

    pub fn send_video(&self, chat: &Chat, path: impl Into<PathBuf>) {
        self.enqueue(Action::SendVideo {
            chat_id: chat.id,
            path: path.into(),
        });
    }

    /// Request cooperative termination; observed at the next loop boundary.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
impl EngineHandle {
    pub(crate) fn test_handle() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    pub(crate) fn queued(&self) -> Vec<Action> {
        self.shared.queue.lock().unwrap().iter().cloned().collect()
    }
}

/// Owns the polling cursor state machine and the action queue.
pub struct PollEngine {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    config: EngineConfig,
    shared: Arc<Shared>,
}

impl PollEngine {
    pub fn new(transport: Arc<dyn Transport>, codec: Arc<dyn Codec>, config: EngineConfig) -> Self {
        Self {
            transport,
            codec,
            config,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
        }
    }

    /// Request cooperative termination of the worker. Returns immediately;
    /// the in-flight fetch or action call finishes first.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    /// True once the worker has observed termination and the loop body will
    /// not execute again. False right after `stop` until the exit happens.
    pub fn is_ready_to_destroy(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Validate the credential with an `identify` round-trip and return the
    /// poll worker. The caller decides how to run it: `tokio::spawn` for a
    /// detached engine, `.await` to lend the current task.
    ///
    /// Fails without creating a worker when the token is rejected
    /// ([`Error::InvalidCredential`](crate::Error::InvalidCredential),
    /// [`Error::PrincipalNotFound`](crate::Error::PrincipalNotFound)) or the
    /// transport cannot reach the server.
    pub async fn start(&self, processor: Arc<dyn Processor>) -> Result<Worker> {
        let envelope = self.transport.identify().await?;
        let me = self.codec.decode_user(&envelope)?;
        info!(id = me.id, name = %me.first_name, "token accepted");

        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.terminated.store(false, Ordering::SeqCst);

        Ok(Worker {
            transport: self.transport.clone(),
            codec: self.codec.clone(),
            config: self.config,
            shared: self.shared.clone(),
            processor,
            cursor: 0,
        })
    }
}

/// The poll loop, detached from the engine so the caller owns its task.
pub struct Worker {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn Codec>,
    config: EngineConfig,
    shared: Arc<Shared>,
    processor: Arc<dyn Processor>,
    cursor: u64,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Run the cycle until stop is observed at a loop boundary.
    ///
    /// Per cycle: fetch a batch at the cursor; advance the cursor past the
    /// highest update id *before* dispatching (acknowledgment is optimistic,
    /// so a dispatched batch is never re-fetched even if a callback fails);
    /// dispatch in batch order; drain queued actions in FIFO order. A fetch
    /// failure aborts the cycle before the cursor moves and the loop retries
    /// without backoff.
    pub async fn run(mut self) {
        while !self.shared.stop.load(Ordering::SeqCst) {
            let envelope = match self
                .transport
                .get_updates(self.cursor, self.config.batch_limit, self.config.poll_timeout)
                .await
            {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!(%error, "fetch failed, retrying");
                    continue;
                }
            };

            let batch = match self.codec.decode_updates(&envelope) {
                Ok(batch) => batch,
                Err(error) => {
                    warn!(%error, "batch rejected, retrying");
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }
            debug!(count = batch.len(), "fetched updates");

            let top = batch.iter().map(|u| u.update_id).max().unwrap_or(0);
            self.advance(top + 1);

            let handle = EngineHandle {
                shared: self.shared.clone(),
            };
            dispatch::dispatch_batch(&batch, self.processor.as_ref(), &handle).await;

            self.drain().await;
        }

        self.shared.terminated.store(true, Ordering::SeqCst);
        info!("poll loop exited");
    }

    fn advance(&mut self, next: u64) {
        info!(from = self.cursor, to = next, "advancing cursor");
        self.cursor = next;
    }

    async fn drain(&self) {
        let pending = self.shared.queue.lock().unwrap().len();
        if pending > 0 {
            debug!(pending, "draining outgoing actions");
        }

        loop {
            let action = self.shared.queue.lock().unwrap().pop_front();
            let Some(action) = action else { break };

            if let Err(error) = action.execute(self.transport.as_ref()).await {
                warn!(%error, "outgoing action failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::domain::BotCommand;
    use crate::ports::api;
    use crate::testing::{RecordingProcessor, RecordingTransport, Seen};
    use crate::Error;
    use async_trait::async_trait;
    use serde_json::json;

    fn engine(transport: Arc<RecordingTransport>) -> PollEngine {
        PollEngine::new(transport, Arc::new(JsonCodec::new()), EngineConfig::default())
    }

    fn batch_of(ids: &[u64]) -> serde_json::Value {
        let updates: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "update_id": id,
                    "message": {
                        "message_id": id,
                        "date": 1700000000u64,
                        "chat": { "id": 10, "type": "group" },
                        "text": "hello"
                    }
                })
            })
            .collect();
        json!({ "ok": true, "result": updates })
    }

    #[tokio::test]
    async fn start_rejects_a_bad_token_without_a_worker() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_identify(json!({ "ok": false, "error_code": 401 }));

        let engine = engine(transport);
        let err = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidCredential));
        assert!(!engine.is_ready_to_destroy());
    }

    #[tokio::test]
    async fn start_surfaces_a_missing_principal() {
        let transport = Arc::new(RecordingTransport::default());
        transport.set_identify(json!({ "ok": false, "error_code": 404 }));

        let engine = engine(transport);
        let err = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PrincipalNotFound));
    }

    #[tokio::test]
    async fn cursor_advances_past_the_highest_update_id() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(batch_of(&[10, 12, 11]));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap();
        worker.run().await;

        // Second fetch carries the advanced cursor, then the script is dry
        // and the transport requests stop.
        assert_eq!(transport.offsets(), vec![0, 13]);
        assert!(engine.is_ready_to_destroy());
    }

    #[tokio::test]
    async fn empty_batches_leave_the_cursor_alone() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(json!({ "ok": true, "result": [] }));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap();
        worker.run().await;

        assert_eq!(transport.offsets(), vec![0, 0]);
    }

    #[tokio::test]
    async fn fetch_failure_never_moves_the_cursor() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_fetch_error(Error::TransportTimeout);
        transport.push_batch(batch_of(&[7]));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap();
        worker.run().await;

        // Retry after the failure still fetches at 0; only the successful
        // batch advances the cursor.
        assert_eq!(transport.offsets(), vec![0, 0, 8]);
    }

    #[tokio::test]
    async fn failure_envelope_never_moves_the_cursor() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(json!({ "ok": false, "error_code": 420 }));
        transport.push_batch(batch_of(&[5]));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine
            .start(Arc::new(RecordingProcessor::default()))
            .await
            .unwrap();
        worker.run().await;

        assert_eq!(transport.offsets(), vec![0, 0, 6]);
    }

    /// Enqueues several actions per message, interleaved, then stops.
    struct Enqueuing;

    #[async_trait]
    impl Processor for Enqueuing {
        async fn on_message(&self, message: &Message, engine: &EngineHandle) -> Result<()> {
            engine.send_message(&message.chat, format!("a{}", message.message_id));
            engine.set_chat_title(&message.chat, format!("b{}", message.message_id));
            engine.reply_message(&message.chat, message, format!("c{}", message.message_id));
            Ok(())
        }

        async fn on_bot_commands(
            &self,
            _: &Message,
            _: &[BotCommand],
            _: &EngineHandle,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn actions_drain_in_exact_enqueue_order() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(batch_of(&[1, 2]));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine.start(Arc::new(Enqueuing)).await.unwrap();
        worker.run().await;

        let outgoing: Vec<(String, String)> = transport
            .calls()
            .into_iter()
            .filter(|c| c.method != api::GET_ME)
            .map(|c| (c.method, c.params[1].1.clone()))
            .collect();

        assert_eq!(
            outgoing,
            vec![
                (api::SEND_MESSAGE.to_string(), "a1".to_string()),
                (api::SET_CHAT_TITLE.to_string(), "b1".to_string()),
                (api::SEND_MESSAGE.to_string(), "c1".to_string()),
                (api::SEND_MESSAGE.to_string(), "a2".to_string()),
                (api::SET_CHAT_TITLE.to_string(), "b2".to_string()),
                (api::SEND_MESSAGE.to_string(), "c2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn a_failing_action_does_not_abort_the_drain() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(batch_of(&[1]));
        transport.fail_method(api::SET_CHAT_TITLE);

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let worker = engine.start(Arc::new(Enqueuing)).await.unwrap();
        worker.run().await;

        // The reply enqueued after the failing rename still executes.
        let methods: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|c| c.method != api::GET_ME)
            .map(|c| c.method)
            .collect();
        assert_eq!(
            methods,
            vec![api::SEND_MESSAGE, api::SET_CHAT_TITLE, api::SEND_MESSAGE]
        );
    }

    /// Stops the engine from inside the dispatch step.
    struct StopOnFirstMessage;

    #[async_trait]
    impl Processor for StopOnFirstMessage {
        async fn on_message(&self, message: &Message, engine: &EngineHandle) -> Result<()> {
            engine.send_message(&message.chat, "bye");
            engine.stop();
            Ok(())
        }

        async fn on_bot_commands(
            &self,
            _: &Message,
            _: &[BotCommand],
            _: &EngineHandle,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_mid_cycle_still_finishes_the_cycle() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(batch_of(&[1]));

        let engine = engine(transport.clone());
        let worker = engine.start(Arc::new(StopOnFirstMessage)).await.unwrap();

        assert!(!engine.is_ready_to_destroy());
        worker.run().await;

        // The enqueued action drained before the loop observed the flag, and
        // no further fetch happened.
        assert_eq!(transport.offsets(), vec![0]);
        let sent = transport
            .calls()
            .into_iter()
            .any(|c| c.method == api::SEND_MESSAGE);
        assert!(sent);
        assert!(engine.is_ready_to_destroy());
    }

    #[tokio::test]
    async fn command_batch_flows_end_to_end() {
        let transport = Arc::new(RecordingTransport::default());
        transport.push_batch(json!({
            "ok": true,
            "result": [{
                "update_id": 10,
                "message": {
                    "message_id": 3,
                    "date": 1700000000u64,
                    "chat": { "id": 10, "type": "group" },
                    "text": "/abc",
                    "entities": [
                        { "type": "bot_command", "offset": 0, "length": 4 }
                    ]
                }
            }]
        }));

        let engine = engine(transport.clone());
        transport.stop_after_script(engine.handle());

        let processor = Arc::new(RecordingProcessor::default());
        let worker = engine.start(processor.clone()).await.unwrap();
        worker.run().await;

        assert_eq!(transport.offsets(), vec![0, 11]);
        assert_eq!(
            processor.seen(),
            vec![Seen::Commands(
                3,
                vec![BotCommand {
                    command: "/abc".to_string(),
                    offset: 0,
                    length: 4,
                }]
            )]
        );
    }
}
