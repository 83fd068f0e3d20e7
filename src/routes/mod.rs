// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routes
//!
//! The concrete pipelines run by the binary: timers, simple processors, the
//! content-based route tables and the character publisher. Feeders push
//! sample messages into a dispatcher's input channel on a timer.

pub mod characters;
pub mod tables;
pub mod timer;
pub mod transform;

use crate::message::Message;
use timer::Timer;
use tokio::sync::mpsc;
use tracing::warn;

/// Line logged by the greeting route
pub const GREETING: &str = "The North Remembers!";

/// Sentence fed to the uppercase route
pub const UPPERCASE_SAMPLE: &str = "Hola Mundo desde Apache Camel - Ejercicio 3";

/// Sample bodies for the choice table, with the delay before each is sent
pub const CHOICE_SAMPLES: [(&str, u64); 3] = [
    ("This is an admin message", 2_000),
    ("This is a user message", 3_000),
    ("This is a regular message without keywords", 4_000),
];

/// Sample bodies for the dynamic API table, with the delay before each is sent
pub const DYNAMIC_API_SAMPLES: [(&str, u64); 3] = [
    ("user:john.doe@example.com", 2_000),
    ("admin:admin@example.com", 3_000),
    ("guest:guest@example.com", 4_000),
];

/// Sends `body` to `tx` on every tick of `timer` and returns the ticks fired.
pub async fn feed(tx: mpsc::Sender<Message>, timer: Timer, body: &str) -> u64 {
    timer
        .run(|_| {
            let tx = tx.clone();
            let msg = Message::text(body);
            async move {
                if tx.send(msg).await.is_err() {
                    warn!("dispatcher input closed, dropping message");
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;

    #[tokio::test(start_paused = true)]
    async fn feed_sends_one_message_per_tick() {
        let (tx, mut rx) = mpsc::channel(8);

        let fired = feed(tx, Timer::new("feed").repeat(3), UPPERCASE_SAMPLE).await;

        assert_eq!(fired, 3);
        for _ in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.payload, Payload::Text(UPPERCASE_SAMPLE.to_owned()));
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn feed_survives_a_closed_dispatcher() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert_eq!(feed(tx, Timer::new("feed").repeat(2), GREETING).await, 2);
    }
}
