use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::{debug, info};

use crate::core::DEFAULT_RESET_DELAY;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub backend_url: String,
    pub anon_key: String,
    pub bucket: String,
    pub table: String,
    /// Where the confirmation mail sends the user back to.
    pub redirect_url: String,
    pub reset_delay: Duration,
    /// Persist the remote session here so it survives restarts.
    pub session_file: Option<PathBuf>,
    /// Use the SQLite-backed local backend rooted here instead of the hosted one.
    pub local_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            bucket: "grant-documents".to_string(),
            table: "grant_applications".to_string(),
            redirect_url: "http://localhost:3000/?verified=true".to_string(),
            reset_delay: DEFAULT_RESET_DELAY,
            session_file: None,
            local_dir: None,
        }
    }
}

impl Config {
    /// Read `GRANTDESK_*` environment variables, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            backend_url: try_load("GRANTDESK_BACKEND_URL", &defaults.backend_url)?,
            anon_key: var("GRANTDESK_ANON_KEY").unwrap_or_default(),
            bucket: try_load("GRANTDESK_BUCKET", &defaults.bucket)?,
            table: try_load("GRANTDESK_TABLE", &defaults.table)?,
            redirect_url: try_load("GRANTDESK_REDIRECT_URL", &defaults.redirect_url)?,
            reset_delay: Duration::from_secs(try_load(
                "GRANTDESK_RESET_DELAY_SECS",
                &defaults.reset_delay.as_secs().to_string(),
            )?),
            session_file: var("GRANTDESK_SESSION_FILE").map(PathBuf::from),
            local_dir: var("GRANTDESK_LOCAL_DIR").map(PathBuf::from),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = match var(key) {
        Some(value) => {
            debug!("{key} set from environment");
            value
        }
        None => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    };
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
