// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions and Bindings

/// Builder-style description of a queue to declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
}

impl QueueDefinition {
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Survives broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Binds a queue to an exchange under a routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    /// A binding for `queue` with empty exchange and routing key.
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_defaults_to_transient() {
        let def = QueueDefinition::new("character-queue");
        assert!(!def.durable && !def.delete && !def.exclusive);
        assert!(QueueDefinition::new("q").durable().durable);
    }

    #[test]
    fn binding_builder() {
        let binding = QueueBinding::new("character-queue")
            .exchange("got-exchange")
            .routing_key("character");
        assert_eq!(binding.exchange_name, "got-exchange");
        assert_eq!(binding.routing_key, "character");
    }
}
