//! Default serde codec for the Bot API response envelope.

use serde_json::Value;

use crate::{
    domain::{Update, User},
    errors::classify,
    ports::Codec,
    Error, Result,
};

/// Decodes `{"ok": bool, "result": ..., "error_code": ...}` envelopes with
/// serde. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    /// Check the envelope and return its `result` payload.
    fn result<'a>(&self, envelope: &'a Value) -> Result<&'a Value> {
        let ok = envelope
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !ok {
            let code = envelope
                .get("error_code")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            return Err(classify(code));
        }

        envelope
            .get("result")
            .ok_or_else(|| Error::Transport("envelope is ok but has no result".to_string()))
    }
}

impl Codec for JsonCodec {
    fn decode_updates(&self, envelope: &Value) -> Result<Vec<Update>> {
        let result = self.result(envelope)?;
        Ok(serde_json::from_value(result.clone())?)
    }

    fn decode_user(&self, envelope: &Value) -> Result<User> {
        let result = self.result(envelope)?;
        Ok(serde_json::from_value(result.clone())?)
    }
}
