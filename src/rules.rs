// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Route Tables
//!
//! A route table is an ordered list of rules plus a mandatory default
//! destination. Each rule pairs a content predicate with a destination and a
//! header patch. Rules are evaluated in insertion order and the first match
//! wins, so every message resolves to exactly one destination.
//!
//! Tables are built with `RouteTable::builder` and are immutable afterwards.
//! A table without a default destination cannot be built.

use crate::{
    destination::Destination,
    errors::ConfigError,
    message::{HeaderValue, Headers, Message},
};

/// Content test evaluated against a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Payload text contains the given substring
    Contains(String),
}

impl Predicate {
    pub fn contains(needle: &str) -> Predicate {
        Predicate::Contains(needle.to_owned())
    }

    /// Evaluates the predicate. Payloads with no text view never match.
    pub fn matches(&self, msg: &Message) -> bool {
        match self {
            Predicate::Contains(needle) => msg
                .payload
                .as_text()
                .is_some_and(|text| text.contains(needle.as_str())),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Predicate::Contains(needle) => needle.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub(crate) predicate: Predicate,
    pub(crate) destination: Destination,
    pub(crate) headers: Headers,
}

/// Result of classifying a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification<'t> {
    pub destination: &'t Destination,
    pub headers: &'t Headers,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    name: String,
    rules: Vec<RouteRule>,
    default: Destination,
    default_headers: Headers,
}

impl RouteTable {
    pub fn builder(name: &str) -> RouteTableBuilder {
        RouteTableBuilder {
            name: name.to_owned(),
            rules: vec![],
            default: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the destination and header patch for a message.
    ///
    /// Depends only on the message payload.
    pub fn classify(&self, msg: &Message) -> Classification<'_> {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(msg))
            .map(|rule| Classification {
                destination: &rule.destination,
                headers: &rule.headers,
            })
            .unwrap_or(Classification {
                destination: &self.default,
                headers: &self.default_headers,
            })
    }

    /// Every destination reachable through this table, default last.
    pub fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.rules
            .iter()
            .map(|rule| &rule.destination)
            .chain(std::iter::once(&self.default))
    }
}

pub struct RouteTableBuilder {
    name: String,
    rules: Vec<RouteRule>,
    default: Option<(Destination, Headers)>,
}

impl RouteTableBuilder {
    /// Appends a rule. Rules are evaluated in the order they are added.
    ///
    /// # Parameters
    /// * `predicate` - Content test the message payload must pass.
    /// * `destination` - Where matching messages are forwarded.
    pub fn when(mut self, predicate: Predicate, destination: Destination) -> Self {
        self.rules.push(RouteRule {
            predicate,
            destination,
            headers: Headers::default(),
        });
        self
    }

    /// Adds a header to the patch of the last rule added with `when`, or to
    /// the default when called after `otherwise`. Ignored before any rule.
    ///
    /// # Parameters
    /// * `key` - Header name.
    /// * `value` - Header value, set on every message the rule resolves.
    pub fn header(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        let target = match (&mut self.default, self.rules.last_mut()) {
            (Some((_, headers)), _) => Some(headers),
            (None, Some(rule)) => Some(&mut rule.headers),
            (None, None) => None,
        };

        if let Some(headers) = target {
            headers.insert(key.to_owned(), value.into());
        }
        self
    }

    /// Sets the destination used when no rule matches.
    pub fn otherwise(mut self, destination: Destination) -> Self {
        self.default = Some((destination, Headers::default()));
        self
    }

    /// Freezes the table.
    ///
    /// # Returns
    /// * `Result<RouteTable, ConfigError>` - `EmptyPredicate` if a rule tests
    ///   for an empty string, `MissingDefault` if `otherwise` was never called.
    pub fn build(self) -> Result<RouteTable, ConfigError> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.predicate.is_empty()) {
            return Err(ConfigError::EmptyPredicate {
                table: self.name,
                destination: rule.destination.name.clone(),
            });
        }

        let Some((default, default_headers)) = self.default else {
            return Err(ConfigError::MissingDefault(self.name));
        };

        Ok(RouteTable {
            name: self.name,
            rules: self.rules,
            default,
            default_headers,
        })
    }
}
