// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Route tables for the content-based routes.
//!
//! Both tables test for `admin` before `user`, and both attach the
//! `User-Type` header on their admin and user rules. Messages that match
//! neither reach the default destination without a `User-Type` header.

use crate::{
    configs::HttpConfigs,
    destination::{Destination, HttpMethod, LogLevel},
    errors::ConfigError,
    message::{UserType, USER_TYPE_HEADER},
    rules::{Predicate, RouteTable},
};

pub const ADMIN_LOG: &str = "admin";
pub const USER_LOG: &str = "user";
pub const DEFAULT_LOG: &str = "default";

pub const API_A: &str = "api-a";
pub const API_B: &str = "api-b";
pub const ERROR_LOG: &str = "error";

pub const CHARACTERS_EXCHANGE: &str = "got-exchange";
pub const CHARACTERS_QUEUE: &str = "character-queue";
pub const CHARACTERS_ROUTING_KEY: &str = "character";

/// Routes messages to one of three log channels by content.
pub fn choice_table() -> Result<RouteTable, ConfigError> {
    RouteTable::builder("choice")
        .when(Predicate::contains("admin"), Destination::log(ADMIN_LOG, LogLevel::Info))
        .header(USER_TYPE_HEADER, UserType::Admin)
        .when(Predicate::contains("user"), Destination::log(USER_LOG, LogLevel::Info))
        .header(USER_TYPE_HEADER, UserType::User)
        .otherwise(Destination::log(DEFAULT_LOG, LogLevel::Info))
        .build()
}

/// Calls API B with PUT for admins, API A with POST for users, and logs
/// everything else as an error.
pub fn dynamic_api_table(cfg: &HttpConfigs) -> Result<RouteTable, ConfigError> {
    RouteTable::builder("dynamic-api")
        .when(
            Predicate::contains("admin"),
            Destination::http(API_B, HttpMethod::Put, &cfg.api_b_url),
        )
        .header(USER_TYPE_HEADER, UserType::Admin)
        .when(
            Predicate::contains("user"),
            Destination::http(API_A, HttpMethod::Post, &cfg.api_a_url),
        )
        .header(USER_TYPE_HEADER, UserType::User)
        .otherwise(Destination::log(ERROR_LOG, LogLevel::Error))
        .build()
}

/// Sends every message to the characters exchange.
pub fn characters_table() -> Result<RouteTable, ConfigError> {
    RouteTable::builder("characters")
        .otherwise(Destination::broker(
            "got",
            CHARACTERS_EXCHANGE,
            CHARACTERS_ROUTING_KEY,
        ))
        .build()
}
