use serde::Deserialize;

use crate::payout::scheduler::PayoutFrequency;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub stripe_secret_key: String,
    pub stripe_api_url: String,
    /// Unpaid balances below this (minor currency units) roll forward
    pub min_payout_amount: i64,
    pub payout_frequency: PayoutFrequency,
    /// UTC hour for the daily payout run (0-23)
    pub payout_hour_utc: u32,
    /// Claims stuck `processing` with no transfer id are released after this
    pub stale_payout_timeout_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/tipflow".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_api_url: std::env::var("STRIPE_API_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            min_payout_amount: parse_var("MIN_PAYOUT_AMOUNT", 500)?,
            payout_frequency: match std::env::var("PAYOUT_SCHEDULE").as_deref() {
                Ok("hourly") => PayoutFrequency::Hourly,
                _ => PayoutFrequency::Daily,
            },
            payout_hour_utc: parse_var::<u32>("PAYOUT_HOUR_UTC", 2)?.min(23),
            stale_payout_timeout_minutes: parse_var("STALE_PAYOUT_TIMEOUT_MINUTES", 60)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("invalid value for {}", name))),
        Err(_) => Ok(default),
    }
}
