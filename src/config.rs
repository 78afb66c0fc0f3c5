use std::env;
use std::time::Duration;

use crate::services::booking_builder::BookingLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub api_token: String,
    pub deadline_poll_secs: u64,
    pub schedule_max_duration_minutes: u32,
    pub notify_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "carebook.db".to_string()),
            api_token: env::var("API_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            deadline_poll_secs: env::var("DEADLINE_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(60),
            schedule_max_duration_minutes: env::var("SCHEDULE_MAX_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|minutes| *minutes > 0)
                .unwrap_or(360),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn deadline_poll_period(&self) -> Duration {
        Duration::from_secs(self.deadline_poll_secs)
    }

    pub fn booking_limits(&self) -> BookingLimits {
        BookingLimits {
            schedule_max_duration_minutes: self.schedule_max_duration_minutes,
        }
    }
}
