// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Broker destinations are reached through the `Publisher` trait.
//! `RabbitMQPublisher` implements it on a lapin channel, tagging every message
//! as JSON with a fresh message id and propagating the current OpenTelemetry
//! context in the AMQP headers.

use crate::{errors::AmqpError, message::Headers, otel};
use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel,
};
#[cfg(test)]
use mockall::automock;
use opentelemetry::Context;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub exchange: String,
    pub routing_key: String,
    pub data: Vec<u8>,
    pub headers: Headers,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, msg: &PublishMessage) -> Result<(), AmqpError>;
}

pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    pub fn new(channel: Arc<Channel>) -> Arc<RabbitMQPublisher> {
        Arc::new(RabbitMQPublisher { channel })
    }
}

#[async_trait]
impl Publisher for RabbitMQPublisher {
    async fn publish(&self, msg: &PublishMessage) -> Result<(), AmqpError> {
        let mut btree = amqp_headers(&msg.headers);
        otel::inject_context(&Context::current(), &mut btree);

        debug!(
            exchange = msg.exchange,
            routing_key = msg.routing_key,
            "publishing message"
        );

        match self
            .channel
            .basic_publish(
                &msg.exchange,
                &msg.routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &msg.data,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(btree)),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError(msg.exchange.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Converts message headers into an AMQP header table.
///
/// Every header value travels as a long string.
pub(crate) fn amqp_headers(headers: &Headers) -> BTreeMap<ShortString, AMQPValue> {
    headers
        .iter()
        .map(|(key, value)| {
            (
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.to_string())),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{UserType, USER_TYPE_HEADER};

    #[test]
    fn headers_become_long_strings() {
        let mut headers = Headers::new();
        headers.insert(USER_TYPE_HEADER.to_owned(), UserType::User.into());

        let table = amqp_headers(&headers);

        assert_eq!(
            table.get(&ShortString::from(USER_TYPE_HEADER)),
            Some(&AMQPValue::LongString(LongString::from("user")))
        );
    }
}
