// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Log and Error Sinks
//!
//! Fire-and-forget outputs of the dispatcher. `LogSink` receives messages
//! routed to log destinations, `ErrorSink` receives one `FailureRecord` per
//! handled transport failure. `TracingSink` implements both on top of
//! `tracing` events.

use crate::{
    destination::LogLevel,
    errors::TransportError,
    message::Message,
};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info, warn};

/// Structured record emitted to a log destination.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub destination: String,
    pub message: Message,
}

/// Structured record of a transport failure that was handled.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub destination: String,
    pub message: Message,
    pub error: TransportError,
}

#[cfg_attr(test, automock)]
pub trait LogSink: Send + Sync {
    fn log(&self, record: &LogRecord);
}

#[cfg_attr(test, automock)]
pub trait ErrorSink: Send + Sync {
    fn failure(&self, record: &FailureRecord);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, record: &LogRecord) {
        let body = record.message.payload.to_string();
        let headers = format!("{:?}", record.message.headers);
        let destination = record.destination.as_str();

        match record.level {
            LogLevel::Debug => debug!(destination, body, headers, "message routed"),
            LogLevel::Info => info!(destination, body, headers, "message routed"),
            LogLevel::Warn => warn!(destination, body, headers, "message routed"),
            LogLevel::Error => error!(destination, body, headers, "message routed"),
        }
    }
}

impl ErrorSink for TracingSink {
    fn failure(&self, record: &FailureRecord) {
        error!(
            destination = record.destination,
            body = record.message.payload.to_string(),
            error = record.error.to_string(),
            "dispatch failed, message handled"
        );
    }
}
