// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Destinations
//!
//! A destination is a named, static sink a message can be routed to: a log
//! channel, an HTTP endpoint called with a fixed method, or a broker exchange
//! with a routing key. Destinations are built once at startup and never
//! mutated afterwards.

use crate::{errors::TransportError, message::Payload};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity a log destination records messages with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Encoding a destination expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// UTF-8 text; JSON payloads are sent in their compact form
    Text,
    /// A JSON document; text payloads must already hold valid JSON
    Json,
}

impl WireFormat {
    /// Encodes a payload for this format.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>, TransportError> {
        match (self, payload) {
            (WireFormat::Text, Payload::Text(text)) => Ok(text.clone().into_bytes()),
            (WireFormat::Text, Payload::Json(value)) => Ok(value.to_string().into_bytes()),
            (WireFormat::Text, Payload::Binary(bytes)) => std::str::from_utf8(bytes)
                .map(|text| text.as_bytes().to_vec())
                .map_err(|err| TransportError::Serialization(err.to_string())),
            (WireFormat::Json, Payload::Json(value)) => serde_json::to_vec(value)
                .map_err(|err| TransportError::Serialization(err.to_string())),
            (WireFormat::Json, Payload::Text(text)) => {
                serde_json::from_str::<serde_json::Value>(text)
                    .map(|_| text.clone().into_bytes())
                    .map_err(|err| TransportError::Serialization(err.to_string()))
            }
            (WireFormat::Json, Payload::Binary(bytes)) => {
                serde_json::from_slice::<serde_json::Value>(bytes)
                    .map(|_| bytes.clone())
                    .map_err(|err| TransportError::Serialization(err.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationKind {
    Log { level: LogLevel },
    Http { method: HttpMethod, url: String },
    Broker { exchange: String, routing_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub(crate) name: String,
    pub(crate) kind: DestinationKind,
}

impl Destination {
    pub fn log(name: &str, level: LogLevel) -> Destination {
        Destination {
            name: name.to_owned(),
            kind: DestinationKind::Log { level },
        }
    }

    pub fn http(name: &str, method: HttpMethod, url: &str) -> Destination {
        Destination {
            name: name.to_owned(),
            kind: DestinationKind::Http {
                method,
                url: url.to_owned(),
            },
        }
    }

    pub fn broker(name: &str, exchange: &str, routing_key: &str) -> Destination {
        Destination {
            name: name.to_owned(),
            kind: DestinationKind::Broker {
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &DestinationKind {
        &self.kind
    }

    /// HTTP method used by this destination, if it is an HTTP destination.
    pub fn method(&self) -> Option<HttpMethod> {
        match &self.kind {
            DestinationKind::Http { method, .. } => Some(*method),
            _ => None,
        }
    }

    pub fn wire_format(&self) -> WireFormat {
        match self.kind {
            DestinationKind::Broker { .. } => WireFormat::Json,
            _ => WireFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_format_rejects_free_text() {
        let res = WireFormat::Json.encode(&Payload::Text("user:john".to_owned()));
        assert!(matches!(res, Err(TransportError::Serialization(_))));
    }

    #[test]
    fn json_format_accepts_text_holding_json() {
        let bytes = WireFormat::Json
            .encode(&Payload::Text(r#"{"name":"Eddard Stark"}"#.to_owned()))
            .unwrap();
        assert_eq!(bytes, br#"{"name":"Eddard Stark"}"#.to_vec());
    }

    #[test]
    fn text_format_rejects_non_utf8() {
        let res = WireFormat::Text.encode(&Payload::Binary(vec![0xc3, 0x28]));
        assert!(matches!(res, Err(TransportError::Serialization(_))));
    }

    #[test]
    fn broker_destinations_speak_json() {
        let dest = Destination::broker("got", "got-exchange", "character");
        assert_eq!(dest.wire_format(), WireFormat::Json);
        assert_eq!(
            WireFormat::Json.encode(&Payload::Json(json!({"a": 1}))).unwrap(),
            br#"{"a":1}"#.to_vec()
        );
    }
}
