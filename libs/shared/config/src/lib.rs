use std::env;
use tracing::warn;

/// Scheduling engine configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// How far ahead slots are materialized when a doctor's rules change.
    pub slot_horizon_days: i64,
    /// Default lifetime of a soft slot reservation.
    pub reservation_ttl_minutes: i64,
    /// Bounds for a rule's slot duration, in minutes.
    pub min_slot_duration_minutes: i64,
    pub max_slot_duration_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            slot_horizon_days: read_i64("SLOT_HORIZON_DAYS", 90),
            reservation_ttl_minutes: read_i64("RESERVATION_TTL_MINUTES", 15),
            min_slot_duration_minutes: read_i64("MIN_SLOT_DURATION_MINUTES", 15),
            max_slot_duration_minutes: read_i64("MAX_SLOT_DURATION_MINUTES", 240),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slot_horizon_days: 90,
            reservation_ttl_minutes: 15,
            min_slot_duration_minutes: 15,
            max_slot_duration_minutes: 240,
        }
    }
}

fn read_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", key, default);
            default
        }),
        Err(_) => default,
    }
}
