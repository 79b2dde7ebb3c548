use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed runtime configuration, loaded from the environment with `.env`
/// support.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub proxy: Option<String>,
    pub api_base: String,

    // Cycle tuning
    pub batch_limit: u32,
    pub poll_timeout: Duration,
    pub connect_timeout: Duration,

    // Demo commands
    pub video_path: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let proxy = env_str("TELEGRAM_PROXY").and_then(non_empty);
        let api_base = env_str("TELEGRAM_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://api.telegram.org".to_string());

        let batch_limit = env_u32("POLL_BATCH_LIMIT").unwrap_or(256);
        let poll_timeout = Duration::from_secs(env_u64("POLL_TIMEOUT_SECS").unwrap_or(15));
        let connect_timeout = Duration::from_secs(env_u64("CONNECT_TIMEOUT_SECS").unwrap_or(5));

        let video_path = env_path("VIDEO_PATH");

        Ok(Self {
            telegram_bot_token,
            proxy,
            api_base,
            batch_limit,
            poll_timeout,
            connect_timeout,
            video_path,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
