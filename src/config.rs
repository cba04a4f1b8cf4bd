use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStorage {
    Disk,
    Database,
}

impl UploadStorage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStorage::Disk => "disk",
            UploadStorage::Database => "database",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub upload_dir: String,
    pub upload_storage: UploadStorage,
    pub max_upload_bytes: usize,
    pub shipping_fee: i64,
    pub free_shipping_threshold: i64,
    pub notification_ttl_days: i64,
    pub payment: Option<PaymentConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env`.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET is not set")?;
        let host = get("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&get, "APP_PORT", 3000u16)?;

        let upload_storage = match get("UPLOAD_STORAGE").as_deref() {
            None | Some("disk") => UploadStorage::Disk,
            Some("database") => UploadStorage::Database,
            Some(other) => anyhow::bail!("UPLOAD_STORAGE must be disk or database, got {other}"),
        };

        let payment = match (
            get("PAYMENT_GATEWAY_URL"),
            get("PAYMENT_KEY_ID"),
            get("PAYMENT_KEY_SECRET"),
        ) {
            (Some(base_url), Some(key_id), Some(key_secret)) => Some(PaymentConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                key_id,
                key_secret,
                currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours: parse_within(&get, "JWT_TTL_HOURS", 24, 1..=MAX_JWT_TTL_HOURS)?,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            upload_storage,
            max_upload_bytes: parse_within(
                &get,
                "MAX_UPLOAD_BYTES",
                5 * 1024 * 1024,
                1..=MAX_UPLOAD_BYTES,
            )?,
            shipping_fee: parse_within(&get, "SHIPPING_FEE", 5_000, 0..=i64::from(u32::MAX))?,
            free_shipping_threshold: parse_within(
                &get,
                "FREE_SHIPPING_THRESHOLD",
                50_000,
                0..=i64::MAX,
            )?,
            notification_ttl_days: parse_within(
                &get,
                "NOTIFICATION_TTL_DAYS",
                30,
                1..=MAX_NOTIFICATION_TTL_DAYS,
            )?,
            payment,
        })
    }

    /// Flat fee, waived once the subtotal reaches the threshold.
    pub fn shipping_fee_for(&self, subtotal: i64) -> i64 {
        if subtotal >= self.free_shipping_threshold {
            0
        } else {
            self.shipping_fee
        }
    }
}

const MAX_JWT_TTL_HOURS: i64 = 24 * 365;
const MAX_NOTIFICATION_TTL_DAYS: i64 = 3650;
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Missing vars fall back to `default`; malformed ones are an error.
fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
    }
}

fn parse_within<F, T>(get: &F, key: &str, default: T, range: RangeInclusive<T>) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_or(get, key, default)?;
    if !range.contains(&value) {
        anyhow::bail!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pureharvest"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.upload_storage, UploadStorage::Disk);
        assert_eq!(config.notification_ttl_days, 30);
        assert!(config.payment.is_none());
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let result = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")]));
        assert!(result.is_err());
    }

    #[test]
    fn payment_gateway_needs_all_three_vars() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "secret"),
            ("PAYMENT_GATEWAY_URL", "https://gateway.test/"),
            ("PAYMENT_KEY_ID", "key"),
            ("PAYMENT_KEY_SECRET", "shh"),
            ("UPLOAD_STORAGE", "database"),
        ]))
        .unwrap();

        let payment = config.payment.unwrap();
        assert_eq!(payment.base_url, "https://gateway.test");
        assert_eq!(payment.currency, "INR");
        assert_eq!(config.upload_storage, UploadStorage::Database);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "secret"),
            ("JWT_TTL_HOURS", "abc"),
        ]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("JWT_TTL_HOURS"), "{err}");
    }

    #[test]
    fn ttls_outside_their_range_are_rejected() {
        for (key, value) in [
            ("JWT_TTL_HOURS", "0"),
            ("JWT_TTL_HOURS", "9223372036854775807"),
            ("NOTIFICATION_TTL_DAYS", "-1"),
            ("NOTIFICATION_TTL_DAYS", "1000000000000"),
            ("SHIPPING_FEE", "-5"),
        ] {
            let result = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://x"),
                ("JWT_SECRET", "secret"),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn shipping_is_free_at_threshold() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "secret"),
            ("SHIPPING_FEE", "4000"),
            ("FREE_SHIPPING_THRESHOLD", "10000"),
        ]))
        .unwrap();

        assert_eq!(config.shipping_fee_for(9_999), 4_000);
        assert_eq!(config.shipping_fee_for(10_000), 0);
    }
}
