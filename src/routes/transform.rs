// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Payload processors used by the simple routes.

use crate::message::{Message, Payload};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Body set by the fixed-text route
pub const FIXED_TEXT: &str = "Mensaje de texto fijo desde la ruta";

/// Replaces the body with `FIXED_TEXT` and logs it.
pub fn fixed_text(mut msg: Message) -> Message {
    msg.payload = Payload::Text(FIXED_TEXT.to_owned());
    info!(body = FIXED_TEXT, "message content");
    msg
}

/// Uppercases text bodies. Other payloads pass through unchanged.
pub fn uppercase(mut msg: Message) -> Message {
    match &msg.payload {
        Payload::Text(text) => {
            let upper = text.to_uppercase();
            debug!(from = text.as_str(), to = upper.as_str(), "transformed text");
            info!(body = upper.as_str(), "text transformed to uppercase");
            msg.payload = Payload::Text(upper);
        }
        _ => warn!("message body is not text, cannot convert to uppercase"),
    }
    msg
}

/// Applies `processor` to every message received on `rx`.
///
/// # Parameters
/// * `rx` - Inbound messages of the route.
/// * `processor` - Transformation applied to each message.
///
/// # Returns
/// * `u64` - Messages processed once `rx` is closed.
pub async fn process_route(
    mut rx: mpsc::Receiver<Message>,
    processor: fn(Message) -> Message,
) -> u64 {
    let mut processed = 0;
    while let Some(msg) = rx.recv().await {
        processor(msg);
        processed += 1;
    }
    debug!(processed, "route input closed");
    processed
}
