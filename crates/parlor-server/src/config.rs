use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use parlor_types::limits::{ContentLimits, PageLimits};

/// Secrets that ship in sample configs and must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub page_limits: PageLimits,
    pub content_limits: ContentLimits,
    pub heartbeat_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset keys take their default;
    /// set but unparsable values are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("PARLOR_JWT_SECRET").unwrap_or_default();
        let trimmed = jwt_secret.trim();
        if trimmed.is_empty() {
            bail!("PARLOR_JWT_SECRET must be set");
        }
        if PLACEHOLDER_SECRETS.contains(&trimmed) {
            bail!("PARLOR_JWT_SECRET is a placeholder value, set a real secret");
        }

        let page_limits = PageLimits {
            default: number(&lookup, "PARLOR_PAGE_DEFAULT", PageLimits::DEFAULT.default)?,
            max: number(&lookup, "PARLOR_PAGE_MAX", PageLimits::DEFAULT.max)?,
        };
        if page_limits.default == 0 || page_limits.default > page_limits.max {
            bail!(
                "page limits need 1 <= PARLOR_PAGE_DEFAULT ({}) <= PARLOR_PAGE_MAX ({})",
                page_limits.default,
                page_limits.max
            );
        }

        let content_limits = ContentLimits {
            max_chars: number(&lookup, "PARLOR_CONTENT_MAX", ContentLimits::DEFAULT.max_chars)?,
        };
        if content_limits.max_chars == 0 {
            bail!("PARLOR_CONTENT_MAX must be at least 1");
        }

        let heartbeat_secs: u64 = number(&lookup, "PARLOR_HEARTBEAT_SECS", 15)?;
        if heartbeat_secs == 0 {
            bail!("PARLOR_HEARTBEAT_SECS must be at least 1");
        }

        Ok(Self {
            host: lookup("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: number(&lookup, "PARLOR_PORT", 8080)?,
            db_path: PathBuf::from(lookup("PARLOR_DB_PATH").unwrap_or_else(|| "parlor.db".into())),
            jwt_secret,
            page_limits,
            content_limits,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
        })
    }
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
    }
}
