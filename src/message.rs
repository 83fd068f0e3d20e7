// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messages
//!
//! A `Message` is the unit of work flowing through a route: a payload plus a
//! set of header annotations. It carries no identity or retry state.

use crate::errors::TransportError;
use serde::Serialize;
use std::{collections::BTreeMap, fmt};

/// Header carrying the classified user type
pub const USER_TYPE_HEADER: &str = "User-Type";

/// Body of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Payload {
    /// Builds a JSON payload from any serializable value.
    pub fn json<T: Serialize>(value: &T) -> Result<Payload, TransportError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|err| TransportError::Serialization(err.to_string()))
    }

    /// Interprets raw bytes as text when they are valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Payload {
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(err) => Payload::Binary(err.into_bytes()),
        }
    }

    /// Text view used by content predicates.
    ///
    /// JSON payloads are matched against their compact serialization, binary
    /// payloads only when they happen to be valid UTF-8.
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Payload::Text(text) => Some(text.as_str().into()),
            Payload::Json(value) => Some(value.to_string().into()),
            Payload::Binary(bytes) => std::str::from_utf8(bytes).ok().map(Into::into),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.write_str(text),
            Payload::Json(value) => write!(f, "{value}"),
            Payload::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Kind of user a message was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserType {
    Admin,
    User,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::User => "user",
        }
    }
}

/// Value of a message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    UserType(UserType),
}

impl HeaderValue {
    pub fn as_str(&self) -> &str {
        match self {
            HeaderValue::Text(text) => text,
            HeaderValue::UserType(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_owned())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<UserType> for HeaderValue {
    fn from(value: UserType) -> Self {
        HeaderValue::UserType(value)
    }
}

pub type Headers = BTreeMap<String, HeaderValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub payload: Payload,
    pub headers: Headers,
}

impl Message {
    pub fn new(payload: Payload) -> Message {
        Message {
            payload,
            headers: Headers::default(),
        }
    }

    pub fn text(body: impl Into<String>) -> Message {
        Message::new(Payload::Text(body.into()))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&HeaderValue> {
        self.headers.get(key)
    }

    /// Merges a header patch, overwriting keys already present.
    pub fn apply_headers(&mut self, patch: &Headers) {
        for (key, value) in patch {
            self.headers.insert(key.clone(), value.clone());
        }
    }
}
