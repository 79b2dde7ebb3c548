use std::{path::Path, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Bot API method names.
pub mod api {
    pub const GET_UPDATES: &str = "getUpdates";
    pub const GET_ME: &str = "getMe";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const SET_CHAT_TITLE: &str = "setChatTitle";
    pub const SEND_VIDEO: &str = "sendVideo";
}

/// HTTP transport port.
///
/// Implementations own the credential and the endpoint; callers name a method
/// and its parameters and get back the raw response envelope, undecoded.
/// Timeouts map to [`Error::TransportTimeout`](crate::Error::TransportTimeout),
/// everything else transport-level to `Error::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-poll for a batch of updates starting at `cursor`, waiting at most
    /// `poll_timeout` server-side.
    async fn get_updates(&self, cursor: u64, limit: u32, poll_timeout: Duration) -> Result<Value>;

    /// Invoke an API method with form parameters.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value>;

    /// Invoke an API method with an attached file, uploaded under `field`.
    async fn call_with_file(
        &self,
        method: &str,
        params: &[(&str, String)],
        field: &str,
        path: &Path,
    ) -> Result<Value>;

    /// Resolve the credential to the account it belongs to.
    async fn identify(&self) -> Result<Value> {
        self.call(api::GET_ME, &[]).await
    }
}

/// Wire-format decoder port.
///
/// Turns raw response envelopes into domain entities, raising the classified
/// service error when the envelope reports `ok: false`.
pub trait Codec: Send + Sync {
    fn decode_updates(&self, envelope: &Value) -> Result<Vec<crate::domain::Update>>;
    fn decode_user(&self, envelope: &Value) -> Result<crate::domain::User>;
}
