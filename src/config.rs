use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub service_token: String,
    pub cache_ttl_secs: u64,
    pub pending_timeout_secs: u64,
    pub stale_trip_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub health_check_interval_secs: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            service_token: env::var("SERVICE_TOKEN").unwrap_or_else(|_| "change-me".to_string()),
            cache_ttl_secs: parse_or_default("CACHE_TTL_SECS", 300)?,
            pending_timeout_secs: parse_or_default("PENDING_TIMEOUT_SECS", 300)?,
            stale_trip_timeout_secs: parse_or_default("STALE_TRIP_TIMEOUT_SECS", 14_400)?,
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 30)?,
            health_check_interval_secs: parse_or_default("HEALTH_CHECK_INTERVAL_SECS", 60)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            service_token: "change-me".to_string(),
            cache_ttl_secs: 300,
            pending_timeout_secs: 300,
            stale_trip_timeout_secs: 14_400,
            sweep_interval_secs: 30,
            health_check_interval_secs: 60,
            event_buffer_size: 1024,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
