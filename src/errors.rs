// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Content Router
//!
//! Errors are split by the boundary they belong to:
//!
//! - `ConfigError`: raised while building route tables or validating the
//!   configuration. These are the only errors allowed to abort startup.
//! - `TransportError`: failures talking to a destination. The dispatcher turns
//!   every one of them into a handled, logged outcome.
//! - `AmqpError`: failures of the RabbitMQ plumbing (connection, channel,
//!   topology, publishing, consuming).

use thiserror::Error;

/// Startup-time configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Route table built without an `otherwise` destination
    #[error("route table `{0}` has no default destination")]
    MissingDefault(String),

    /// A containment predicate with an empty needle matches every message
    #[error("route table `{table}` has an empty predicate for destination `{destination}`")]
    EmptyPredicate { table: String, destination: String },

    /// A configuration field holds an unusable value
    #[error("invalid configuration value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reaching a destination.
///
/// Any of these ends in a failure record, never in an error returned to the
/// inbound source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The destination answered with a non-2xx status
    #[error("destination answered with status {status}")]
    Status { status: u16, body: String },

    /// The destination could not be reached
    #[error("connection failure: {0}")]
    Connection(String),

    /// The call did not complete within the configured timeout
    #[error("call timed out after {0} ms")]
    Timeout(u64),

    /// The broker refused or failed the publish
    #[error("broker failure: {0}")]
    Broker(String),

    /// The payload cannot be encoded in the destination's wire format
    #[error("payload serialization failure: {0}")]
    Serialization(String),
}

/// Represents errors that can occur during AMQP/RabbitMQ operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error publishing a message
    #[error("failure to publish to `{0}`")]
    PublishingError(String),

    /// Error creating a consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,
}

impl From<AmqpError> for TransportError {
    fn from(err: AmqpError) -> Self {
        TransportError::Broker(err.to_string())
    }
}
