//! Server configuration loaded from the environment

use rand::Rng;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POLL_DURATION_SECS: u64 = 7200;
/// Longest poll lifetime accepted from the environment (30 days)
const MAX_POLL_DURATION_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    /// How long a poll lives after creation. Access tokens expire at the same time.
    pub poll_duration: Duration,
    /// HS256 secret used to sign and verify access tokens
    pub jwt_secret: Vec<u8>,
    /// How often expired polls are swept out of the store
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            poll_duration: Duration::from_secs(DEFAULT_POLL_DURATION_SECS),
            jwt_secret: random_secret(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Load config from environment variables.
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let bind_address = std::env::var("BIND_ADDRESS")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = parse_var("PORT").unwrap_or(DEFAULT_PORT);

        let mut poll_duration = parse_var("POLL_DURATION")
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(DEFAULT_POLL_DURATION_SECS);
        if poll_duration > MAX_POLL_DURATION_SECS {
            tracing::warn!(
                requested_secs = poll_duration,
                max_secs = MAX_POLL_DURATION_SECS,
                "POLL_DURATION too large, clamping"
            );
            poll_duration = MAX_POLL_DURATION_SECS;
        }

        let sweep_interval = parse_var("SWEEP_INTERVAL")
            .filter(|secs: &u64| *secs > 0)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret.trim().as_bytes().to_vec(),
            _ => {
                tracing::warn!(
                    "JWT_SECRET not set; using a random secret. Tokens will not survive a restart"
                );
                random_secret()
            }
        };

        tracing::info!(
            bind_address = %bind_address,
            port,
            poll_duration_secs = poll_duration,
            sweep_interval_secs = sweep_interval,
            "Config loaded"
        );

        Self {
            bind_address,
            port,
            poll_duration: Duration::from_secs(poll_duration),
            jwt_secret,
            sweep_interval: Duration::from_secs(sweep_interval),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

fn random_secret() -> Vec<u8> {
    let key: [u8; 32] = rand::rng().random();
    key.to_vec()
}
