use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _};
use rspotify::Credentials;
use tracing_subscriber::EnvFilter;

use crate::render::RenderConfig;

const DEFAULT_LOG_FILTER: &str = "info";

pub struct Config {
    pub discord_token: String,
    pub application_id: u64,
    pub render: RenderConfig,
    /// Client credentials for Spotify lookups, which are off without them
    pub spotify: Option<Credentials>,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow!("Expected {name} in the environment"))
}

fn optional<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value {value:?}")),
        _ => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let discord_token = required("DISCORD_TOKEN")?;
        let application_id = required("APPLICATION_ID")?
            .parse()
            .context("APPLICATION_ID must be an integer")?;

        let defaults = RenderConfig::default();
        let render = RenderConfig {
            chrome_path: optional::<PathBuf>("CHROME_PATH")?,
            settle_timeout: optional("RENDER_SETTLE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_timeout),
            timeout: optional("RENDER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        };
        let spotify = match (
            optional::<String>("SPOTIFY_CLIENT_ID")?,
            optional::<String>("SPOTIFY_CLIENT_SECRET")?,
        ) {
            (Some(id), Some(secret)) => Some(Credentials::new(&id, &secret)),
            (None, None) => None,
            _ => bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together"),
        };
        Ok(Config {
            discord_token,
            application_id,
            render,
            spotify,
        })
    }
}

/// Loads `.env` if there is one and installs the log subscriber.
pub fn init_environment() {
    if let Ok(path) = dotenvy::dotenv() {
        // Logging is not set up yet
        eprintln!("Loaded environment from {}", path.display());
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|err| {
        if env::var("RUST_LOG").map_or(false, |v| !v.is_empty()) {
            eprintln!("Invalid RUST_LOG, falling back to {DEFAULT_LOG_FILTER}: {err}");
        }
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
