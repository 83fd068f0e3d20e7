// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Configuration
//!
//! All runtime settings live in one `Configs` value built once at startup.
//! Defaults match a local RabbitMQ install and the public httpbin endpoints.

use crate::errors::ConfigError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfigs {
    pub name: String,
}

impl Default for AppConfigs {
    fn default() -> Self {
        AppConfigs {
            name: "content-router".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "%2f".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfigs {
    /// Endpoint called with POST for user messages
    pub api_a_url: String,
    /// Endpoint called with PUT for admin messages
    pub api_b_url: String,
    pub timeout_ms: u64,
}

impl Default for HttpConfigs {
    fn default() -> Self {
        HttpConfigs {
            api_a_url: "https://httpbin.org/post".to_owned(),
            api_b_url: "https://httpbin.org/put".to_owned(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfigs {
    /// Maximum number of messages dispatched concurrently
    pub workers: usize,
    /// Upper bound for a single transport call
    pub timeout_ms: u64,
}

impl Default for DispatchConfigs {
    fn default() -> Self {
        DispatchConfigs {
            workers: 8,
            timeout_ms: 10_000,
        }
    }
}

impl DispatchConfigs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configs {
    pub app: AppConfigs,
    pub rabbitmq: RabbitMQConfigs,
    pub http: HttpConfigs,
    pub dispatch: DispatchConfigs,
}

impl Configs {
    /// Rejects settings the routes cannot run with.
    ///
    /// # Returns
    /// * `Result<(), ConfigError>` - `InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rabbitmq.host.trim().is_empty() {
            return Err(ConfigError::invalid("rabbitmq.host", "must not be empty"));
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::invalid("dispatch.workers", "must be at least 1"));
        }
        if self.dispatch.timeout_ms == 0 {
            return Err(ConfigError::invalid("dispatch.timeout_ms", "must be positive"));
        }
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::invalid("http.timeout_ms", "must be positive"));
        }
        if self.http.timeout_ms > self.dispatch.timeout_ms {
            return Err(ConfigError::invalid(
                "http.timeout_ms",
                "must not exceed dispatch.timeout_ms",
            ));
        }
        for (field, url) in [
            ("http.api_a_url", &self.http.api_a_url),
            ("http.api_b_url", &self.http.api_b_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(field, "must be an http(s) url"));
            }
        }
        Ok(())
    }
}
