// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology
//!
//! Collects exchange, queue and binding definitions and declares them on the
//! broker in that order. Declarations are idempotent on the broker side, so
//! installing an already existing topology is harmless as long as the
//! definitions agree.

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel,
};
use std::sync::Arc;
use tracing::{debug, error, info};

#[async_trait]
pub trait Topology {
    fn exchange(self, def: ExchangeDefinition) -> Self;

    fn queue(self, def: QueueDefinition) -> Self;

    fn queue_binding(self, binding: QueueBinding) -> Self;

    /// Declares exchanges, then queues, then bindings.
    async fn install(&self) -> Result<(), AmqpError>;
}

pub struct AmqpTopology {
    channel: Arc<Channel>,
    pub(crate) exchanges: Vec<ExchangeDefinition>,
    pub(crate) queues: Vec<QueueDefinition>,
    pub(crate) queues_binding: Vec<QueueBinding>,
}

impl AmqpTopology {
    pub fn new(channel: Arc<Channel>) -> AmqpTopology {
        AmqpTopology {
            channel,
            exchanges: vec![],
            queues: vec![],
            queues_binding: vec![],
        }
    }
}

#[async_trait]
impl Topology for AmqpTopology {
    fn exchange(mut self, def: ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    async fn install(&self) -> Result<(), AmqpError> {
        self.install_exchanges().await?;
        self.install_queues().await?;
        self.binding_queues().await
    }
}

impl AmqpTopology {
    async fn install_exchanges(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    &exch.name,
                    exch.kind.into(),
                    exchange_options(exch),
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(AmqpError::DeclareExchangeError(exch.name.clone()))
                }
                _ => Ok(()),
            }?;

            info!("created exchange: {}", exch.name);
        }

        Ok(())
    }

    async fn install_queues(&self) -> Result<(), AmqpError> {
        for def in &self.queues {
            debug!("creating queue: {}", def.name);

            match self
                .channel
                .queue_declare(&def.name, queue_options(def), FieldTable::default())
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), name = def.name, "error to declare the queue");
                    Err(AmqpError::DeclareQueueError(def.name.clone()))
                }
                _ => Ok(()),
            }?;

            info!("created queue: {}", def.name);
        }

        Ok(())
    }

    async fn binding_queues(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            match self
                .channel
                .queue_bind(
                    &binding.queue_name,
                    &binding.exchange_name,
                    &binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");
                    Err(AmqpError::BindingExchangeToQueueError(
                        binding.exchange_name.clone(),
                        binding.queue_name.clone(),
                    ))
                }
                _ => Ok(()),
            }?;

            info!(
                "bound queue '{}' to exchange '{}' with routing key '{}'",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );
        }

        Ok(())
    }
}

fn exchange_options(def: &ExchangeDefinition) -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        passive: false,
        durable: def.durable,
        auto_delete: def.delete,
        internal: false,
        nowait: false,
    }
}

fn queue_options(def: &QueueDefinition) -> QueueDeclareOptions {
    QueueDeclareOptions {
        passive: false,
        durable: def.durable,
        exclusive: def.exclusive,
        auto_delete: def.delete,
        nowait: false,
    }
}
