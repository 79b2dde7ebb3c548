//! HTTP transport adapter (reqwest).
//!
//! Implements the `tgpulse-core` Transport port over the Bot API's
//! JSON-over-HTTPS contract: parameterized GET requests for regular methods
//! and a multipart POST for file uploads.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use tgpulse_core::{
    ports::{api, Transport},
    Error, Result,
};

const USER_AGENT: &str = concat!("tgpulse/", env!("CARGO_PKG_VERSION"));

/// Client-side slack on top of the server-side long-poll wait, so the
/// request outlives the wait it asked for.
const POLL_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    pub token: String,
    pub api_base: String,
    pub proxy: Option<String>,
    pub connect_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: "https://api.telegram.org".to_string(),
            proxy: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Owns the HTTP client, the endpoint and the credential. Accessed only from
/// the engine's worker task.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.token, method
        )
    }

    async fn get_json(
        &self,
        method: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let mut request = self.client.get(self.api_url(method)).query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        debug!(method, "GET");
        let response = request.send().await.map_err(map_transport_err)?;
        response.json::<Value>().await.map_err(map_transport_err)
    }
}

fn map_transport_err(error: reqwest::Error) -> Error {
    if error.is_timeout() || error.is_connect() {
        Error::TransportTimeout
    } else {
        Error::Transport(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_updates(&self, cursor: u64, limit: u32, poll_timeout: Duration) -> Result<Value> {
        let params = [
            ("offset", cursor.to_string()),
            ("limit", limit.to_string()),
            ("timeout", poll_timeout.as_secs().to_string()),
        ];
        self.get_json(api::GET_UPDATES, &params, Some(poll_timeout + POLL_GRACE))
            .await
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        self.get_json(method, params, None).await
    }

    async fn call_with_file(
        &self,
        method: &str,
        params: &[(&str, String)],
        field: &str,
        path: &Path,
    ) -> Result<Value> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        // Video is the only upload the engine performs.
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mpeg")
            .map_err(map_transport_err)?;

        let mut form = Form::new().part(field.to_string(), part);
        for (key, value) in params {
            form = form.text((*key).to_string(), value.clone());
        }

        debug!(method, "POST multipart");
        let response = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport_err)?;
        response.json::<Value>().await.map_err(map_transport_err)
    }
}
