use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Token secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
    pub media_dir: PathBuf,
    pub media_base_url: String,
    /// Remote hosting endpoint; media stays on local disk when unset.
    pub media_upload_url: Option<String>,
    /// Allowed browser origin; any origin when unset.
    pub cors_origin: Option<String>,
    pub body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("TUBEHUB_HOST", "0.0.0.0");
        let port: u16 = get("TUBEHUB_PORT", "8000")
            .parse()
            .context("TUBEHUB_PORT is not a port number")?;
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let access_ttl_minutes: i64 = get("TUBEHUB_ACCESS_TOKEN_TTL_MINUTES", "60")
            .parse()
            .context("TUBEHUB_ACCESS_TOKEN_TTL_MINUTES is not a number")?;
        let refresh_ttl_days: i64 = get("TUBEHUB_REFRESH_TOKEN_TTL_DAYS", "10")
            .parse()
            .context("TUBEHUB_REFRESH_TOKEN_TTL_DAYS is not a number")?;
        if access_ttl_minutes <= 0 || refresh_ttl_days <= 0 {
            bail!("token lifetimes must be positive");
        }

        let access_secret = secret(&var, "TUBEHUB_ACCESS_TOKEN_SECRET")?;
        let refresh_secret = secret(&var, "TUBEHUB_REFRESH_TOKEN_SECRET")?;
        if access_secret == refresh_secret {
            bail!("access and refresh token secrets must differ");
        }

        Ok(Self {
            addr,
            db_path: get("TUBEHUB_DB_PATH", "tubehub.db").into(),
            access_secret,
            refresh_secret,
            access_ttl: chrono::Duration::minutes(access_ttl_minutes),
            refresh_ttl: chrono::Duration::days(refresh_ttl_days),
            media_dir: get("TUBEHUB_MEDIA_DIR", "./media").into(),
            media_base_url: get("TUBEHUB_MEDIA_BASE_URL", "/media"),
            media_upload_url: optional("TUBEHUB_MEDIA_UPLOAD_URL"),
            cors_origin: optional("TUBEHUB_CORS_ORIGIN"),
            body_limit_bytes: get("TUBEHUB_BODY_LIMIT_BYTES", "16384")
                .parse()
                .context("TUBEHUB_BODY_LIMIT_BYTES is not a number")?,
        })
    }

    /// Where clients drop files before naming them in a request.
    pub fn staging_dir(&self) -> PathBuf {
        self.media_dir.join("staging")
    }
}

fn secret(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    let value = var(key).unwrap_or_default();
    if value.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        bail!("{key} is unset or still a placeholder; set it in your .env file");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const SECRETS: [(&str, &str); 2] = [
        ("TUBEHUB_ACCESS_TOKEN_SECRET", "a-long-access-secret"),
        ("TUBEHUB_REFRESH_TOKEN_SECRET", "a-long-refresh-secret"),
    ];

    #[test]
    fn defaults_apply() {
        let config = load(&SECRETS).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.db_path, PathBuf::from("tubehub.db"));
        assert_eq!(config.access_ttl, chrono::Duration::minutes(60));
        assert_eq!(config.refresh_ttl, chrono::Duration::days(10));
        assert_eq!(config.staging_dir(), PathBuf::from("./media/staging"));
        assert_eq!(config.body_limit_bytes, 16384);
        assert!(config.media_upload_url.is_none());
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[
            ("TUBEHUB_ACCESS_TOKEN_SECRET", "dev-secret-change-me"),
            ("TUBEHUB_REFRESH_TOKEN_SECRET", "a-long-refresh-secret"),
        ])
        .is_err());
        assert!(load(&[
            ("TUBEHUB_ACCESS_TOKEN_SECRET", "same"),
            ("TUBEHUB_REFRESH_TOKEN_SECRET", "same"),
        ])
        .is_err());
    }

    #[test]
    fn blank_optional_values_count_as_unset() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("TUBEHUB_MEDIA_UPLOAD_URL", "  "));
        pairs.push(("TUBEHUB_CORS_ORIGIN", "https://tubehub.test"));
        let config = load(&pairs).unwrap();
        assert!(config.media_upload_url.is_none());
        assert_eq!(config.cors_origin.as_deref(), Some("https://tubehub.test"));
    }

    #[test]
    fn bad_numbers_fail() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("TUBEHUB_PORT", "eighty"));
        assert!(load(&pairs).is_err());
    }
}
