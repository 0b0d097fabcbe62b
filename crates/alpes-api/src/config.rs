//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AppError;

/// Where aggregate snapshots are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; state is lost on exit.
    Memory,
    /// `PostgreSQL` through `DATABASE_URL`.
    Postgres,
}

/// Which broker carries integration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    /// Process-local broker; only useful when the consumer runs in-process.
    Memory,
    /// NATS `JetStream` at `BROKER_URL`.
    Nats,
}

/// Settings shared by the API server and the campaign worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub broker: BrokerBackend,
    pub broker_url: String,
    /// Prefix of `source_service` on published records.
    pub service_name: String,
    pub consumer_retry_delay: Duration,
    pub ack_wait: Duration,
    /// Whether the API process also runs the campaign consumer.
    pub run_consumers: bool,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an invalid value or
    /// `DATABASE_URL` is missing for the `postgres` backend.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let store = match var("STORE_BACKEND").as_deref().map(str::trim) {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be 'memory' or 'postgres', got '{other}'"
                )));
            }
        };
        let broker = match var("BROKER_BACKEND").as_deref().map(str::trim) {
            None | Some("memory") => BrokerBackend::Memory,
            Some("nats") => BrokerBackend::Nats,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "BROKER_BACKEND must be 'memory' or 'nats', got '{other}'"
                )));
            }
        };
        let database_url = var("DATABASE_URL");
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config(
                "DATABASE_URL must be set when STORE_BACKEND=postgres".into(),
            ));
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse(var("PORT"), "PORT", 3000)?,
            store,
            database_url,
            database_max_connections: parse(
                var("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                10,
            )?,
            broker,
            broker_url: var("BROKER_URL").unwrap_or_else(|| "nats://localhost:4222".to_owned()),
            service_name: var("SERVICE_NAME").unwrap_or_else(|| "alpes-partners".to_owned()),
            consumer_retry_delay: Duration::from_millis(parse(
                var("CONSUMER_RETRY_DELAY_MS"),
                "CONSUMER_RETRY_DELAY_MS",
                5_000,
            )?),
            ack_wait: Duration::from_millis(parse(var("ACK_WAIT_MS"), "ACK_WAIT_MS", 30_000)?),
            run_consumers: parse(var("RUN_CONSUMERS"), "RUN_CONSUMERS", true)?,
        })
    }

    /// HTTP bind address.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse<T>(value: Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_use_in_memory_backends() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.broker, BrokerBackend::Memory);
        assert_eq!(config.port, 3000);
        assert_eq!(config.consumer_retry_delay, Duration::from_secs(5));
        assert_eq!(config.ack_wait, Duration::from_secs(30));
        assert!(config.run_consumers);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let result = config_from(&[("STORE_BACKEND", "postgres")]);

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let config = config_from(&[
            ("STORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://localhost/alpes"),
            ("BROKER_BACKEND", "nats"),
            ("PORT", "8080"),
            ("CONSUMER_RETRY_DELAY_MS", "250"),
            ("RUN_CONSUMERS", "false"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreBackend::Postgres);
        assert_eq!(config.broker, BrokerBackend::Nats);
        assert_eq!(config.port, 8080);
        assert_eq!(config.consumer_retry_delay, Duration::from_millis(250));
        assert!(!config.run_consumers);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("PORT", "http")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            config_from(&[("BROKER_BACKEND", "kafka")]),
            Err(AppError::Config(_))
        ));
    }
}
