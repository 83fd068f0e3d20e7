// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Game of Thrones Characters
//!
//! Publishes seven character records, one message each, as JSON to the
//! characters exchange.

use crate::{
    dispatcher::{DispatchOutcome, Dispatcher},
    exchange::ExchangeDefinition,
    message::{Message, Payload},
    queue::{QueueBinding, QueueDefinition},
    routes::tables::{CHARACTERS_EXCHANGE, CHARACTERS_QUEUE, CHARACTERS_ROUTING_KEY},
    topology::{AmqpTopology, Topology},
};
use lapin::Channel;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Alive,
    Deceased,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Character {
    pub name: &'static str,
    pub house: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub status: Status,
}

pub fn characters() -> [Character; 7] {
    [
        Character {
            name: "Eddard Stark",
            house: "Stark",
            title: "Lord of Winterfell",
            description: "Honorable Warden of the North, known for his strong sense of justice",
            status: Status::Deceased,
        },
        Character {
            name: "Tyrion Lannister",
            house: "Lannister",
            title: "Hand of the Queen",
            description: "The Imp, known for his wit and intelligence despite his stature",
            status: Status::Alive,
        },
        Character {
            name: "Daenerys Targaryen",
            house: "Targaryen",
            title: "Queen of the Andals and the First Men",
            description: "The Mother of Dragons, breaker of chains",
            status: Status::Deceased,
        },
        Character {
            name: "Robert Baratheon",
            house: "Baratheon",
            title: "King of the Seven Kingdoms",
            description: "The Usurper, known for his strength in battle",
            status: Status::Deceased,
        },
        Character {
            name: "Theon Greyjoy",
            house: "Greyjoy",
            title: "Prince of Winterfell",
            description: "Reek, torn between his birth family and the Starks who raised him",
            status: Status::Deceased,
        },
        Character {
            name: "Margaery Tyrell",
            house: "Tyrell",
            title: "Queen of the Seven Kingdoms",
            description: "The Queen of Thorns' granddaughter, known for her political acumen",
            status: Status::Deceased,
        },
        Character {
            name: "Oberyn Martell",
            house: "Martell",
            title: "Prince of Dorne",
            description: "The Red Viper, known for his combat skills and passionate nature",
            status: Status::Deceased,
        },
    ]
}

/// Dispatches every character and returns how many were delivered.
///
/// `dispatcher` is expected to route to the characters exchange.
pub async fn publish_characters(dispatcher: &Dispatcher) -> usize {
    let all = characters();
    info!(count = all.len(), "prepared characters to send to rabbitmq");

    let mut delivered = 0;
    for character in &all {
        let payload = match Payload::json(character) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(name = character.name, error = err.to_string(), "skipping character");
                continue;
            }
        };

        if let DispatchOutcome::Delivered { message, .. } =
            dispatcher.dispatch(Message::new(payload)).await
        {
            info!(body = message.payload.to_string(), "sent character to rabbitmq");
            delivered += 1;
        }
    }

    delivered
}

/// Declares the characters exchange, queue and binding.
///
/// Failures are logged and swallowed: the topology may already exist or the
/// broker may be unreachable, and publishing reports its own failures.
pub async fn install_characters_topology(channel: Arc<Channel>) -> bool {
    let topology = AmqpTopology::new(channel)
        .exchange(ExchangeDefinition::new(CHARACTERS_EXCHANGE).topic().durable())
        .queue(QueueDefinition::new(CHARACTERS_QUEUE).durable())
        .queue_binding(
            QueueBinding::new(CHARACTERS_QUEUE)
                .exchange(CHARACTERS_EXCHANGE)
                .routing_key(CHARACTERS_ROUTING_KEY),
        );

    match topology.install().await {
        Ok(()) => true,
        Err(err) => {
            warn!(
                error = err.to_string(),
                "failed to create rabbitmq exchange/queue, they may already exist"
            );
            false
        }
    }
}
