use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub dispatch_queue_size: usize,
    pub event_buffer_size: usize,
    pub default_radius_km: f64,
    pub candidate_limit: usize,
    pub minutes_per_km: f64,
    pub base_fare: f64,
    pub per_km_rate: f64,
    pub per_min_rate: f64,
    pub broadcast_max_attempts: u32,
    pub broadcast_backoff_secs: u64,
    pub routing_base_url: Option<String>,
    pub routing_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", 10.0)?,
            candidate_limit: parse_or_default("CANDIDATE_LIMIT", 10)?,
            minutes_per_km: parse_or_default("MINUTES_PER_KM", 2.0)?,
            base_fare: parse_or_default("BASE_FARE", 500.0)?,
            per_km_rate: parse_or_default("PER_KM_RATE", 120.0)?,
            per_min_rate: parse_or_default("PER_MIN_RATE", 25.0)?,
            broadcast_max_attempts: parse_or_default("BROADCAST_MAX_ATTEMPTS", 3)?,
            broadcast_backoff_secs: parse_or_default("BROADCAST_BACKOFF_SECS", 60)?,
            routing_base_url: env::var("ROUTING_BASE_URL").ok(),
            routing_timeout_secs: parse_or_default("ROUTING_TIMEOUT_SECS", 10)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            dispatch_queue_size: 1024,
            event_buffer_size: 1024,
            default_radius_km: 10.0,
            candidate_limit: 10,
            minutes_per_km: 2.0,
            base_fare: 500.0,
            per_km_rate: 120.0,
            per_min_rate: 25.0,
            broadcast_max_attempts: 3,
            broadcast_backoff_secs: 60,
            routing_base_url: None,
            routing_timeout_secs: 10,
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
