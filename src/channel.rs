// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! Opens the single connection/channel pair the process uses for publishing,
//! consuming and topology declaration.

use crate::{configs::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Connects to RabbitMQ and opens a channel on the new connection.
///
/// The connection is named after `cfg.app.name` so it can be identified in
/// the broker management UI.
pub async fn new_amqp_channel(cfg: &Configs) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app.name.clone()));

    let conn = match Connection::connect(&cfg.rabbitmq.uri(), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(
                error = err.to_string(),
                host = cfg.rabbitmq.host,
                "failure to connect"
            );
            Err(AmqpError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}
