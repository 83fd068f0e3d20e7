// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod channel;
pub mod configs;
pub mod consumer;
pub mod destination;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod http;
pub mod message;
pub mod publisher;
pub mod queue;
pub mod routes;
pub mod rules;
pub mod sink;
pub mod topology;
