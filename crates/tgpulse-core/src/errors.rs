/// Core error type.
///
/// The first four variants are the closed taxonomy surfaced by the engine;
/// adapter crates map their failures into `Transport`/`TransportTimeout` so
/// the engine can handle them consistently (fatal vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("access token rejected by the server")]
    InvalidCredential,

    #[error("bot not found; the token is probably malformed")]
    PrincipalNotFound,

    #[error("request exceeded its transport timeout")]
    TransportTimeout,

    #[error("server returned error code {0}")]
    Service(i64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

mod error_codes {
    pub const BAD_AUTHORIZATION: i64 = 401;
    pub const NOT_FOUND: i64 = 404;
}

/// Map a server `error_code` to the error taxonomy. Pure; used by both the
/// credential-check path and the steady-state fetch path.
pub fn classify(code: i64) -> Error {
    match code {
        error_codes::BAD_AUTHORIZATION => Error::InvalidCredential,
        error_codes::NOT_FOUND => Error::PrincipalNotFound,
        other => Error::Service(other),
    }
}
