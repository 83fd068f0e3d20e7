// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Context Propagation
//!
//! Injects the current trace context into AMQP headers of published messages
//! so consumers downstream can continue the trace.

use lapin::types::{AMQPValue, ShortString};
use opentelemetry::{propagation::Injector, Context};
use std::collections::BTreeMap;

pub(crate) struct AmqpHeaderInjector<'a> {
    headers: &'a mut BTreeMap<ShortString, AMQPValue>,
}

impl<'a> AmqpHeaderInjector<'a> {
    pub(crate) fn new(headers: &'a mut BTreeMap<ShortString, AMQPValue>) -> Self {
        Self { headers }
    }
}

impl Injector for AmqpHeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(
            key.to_lowercase().into(),
            AMQPValue::LongString(value.into()),
        );
    }
}

/// Writes the trace context of `ctx` into `headers` using the global propagator.
pub(crate) fn inject_context(ctx: &Context, headers: &mut BTreeMap<ShortString, AMQPValue>) {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut AmqpHeaderInjector::new(headers))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_lowercases_keys() {
        let mut headers = BTreeMap::new();
        AmqpHeaderInjector::new(&mut headers).set("TraceParent", "00-abc".to_owned());

        assert_eq!(
            headers.get(&ShortString::from("traceparent")),
            Some(&AMQPValue::LongString("00-abc".into()))
        );
    }
}
