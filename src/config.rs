use std::env;
use std::time::Duration;

use crate::engine::simulation::SimulationSettings;
use crate::error::AppError;
use crate::geo::DistanceMetric;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub tick_interval_ms: u64,
    pub arrival_threshold: f64,
    pub step_size: f64,
    pub distance_metric: DistanceMetric,
    pub lock_timeout_ms: u64,
    pub notify_timeout_ms: u64,
    pub simulation_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            tick_interval_ms: parse_or_default("TICK_INTERVAL_MS", 1000)?,
            arrival_threshold: parse_or_default("ARRIVAL_THRESHOLD", 0.1)?,
            step_size: parse_or_default("STEP_SIZE", 0.05)?,
            distance_metric: parse_or_default("DISTANCE_METRIC", DistanceMetric::Planar)?,
            lock_timeout_ms: parse_or_default("LOCK_TIMEOUT_MS", 5000)?,
            notify_timeout_ms: parse_or_default("NOTIFY_TIMEOUT_MS", 500)?,
            simulation_seed: parse_optional("SIMULATION_SEED")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.tick_interval_ms == 0 {
            return Err(AppError::Internal("TICK_INTERVAL_MS must be > 0".to_string()));
        }
        if !(self.arrival_threshold.is_finite() && self.arrival_threshold > 0.0) {
            return Err(AppError::Internal("ARRIVAL_THRESHOLD must be > 0".to_string()));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(AppError::Internal("STEP_SIZE must be > 0".to_string()));
        }
        if self.event_buffer_size == 0 {
            return Err(AppError::Internal("EVENT_BUFFER_SIZE must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            arrival_threshold: self.arrival_threshold,
            step_size: self.step_size,
            metric: self.distance_metric,
            notify_timeout: Duration::from_millis(self.notify_timeout_ms),
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}
