// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Queue Consumer
//!
//! Turns a RabbitMQ queue into an inbound source for a `Dispatcher`. Every
//! delivery becomes a `Message` (payload plus string headers) and is
//! dispatched. Dispatch never fails, so each delivery is acked once dispatch
//! returns, whatever the outcome.

use crate::{
    dispatcher::{DispatchOutcome, DispatchStats, Dispatcher},
    errors::AmqpError,
    message::{Headers, Message, Payload},
};
use futures_util::{Stream, StreamExt};
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions},
    protocol::basic::AMQPProperties,
    types::{AMQPValue, FieldTable},
    Channel,
};
use std::{future::Future, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info};

/// Builds a message from a delivery body and its properties.
///
/// Only textual header values are carried over.
pub(crate) fn delivery_message(data: Vec<u8>, props: &AMQPProperties) -> Message {
    let mut headers = Headers::new();

    if let Some(table) = props.headers() {
        for (key, value) in table.inner() {
            let text = match value {
                AMQPValue::LongString(v) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
                AMQPValue::ShortString(v) => v.as_str().to_owned(),
                _ => continue,
            };
            headers.insert(key.as_str().to_owned(), text.into());
        }
    }

    Message {
        payload: Payload::from_bytes(data),
        headers,
    }
}

/// Consumes `queue` until the consumer stream ends, dispatching each delivery.
///
/// Up to `workers` deliveries are dispatched at once, so a slow destination
/// does not hold back the rest of the queue. Each delivery is acked as soon
/// as its own dispatch finishes.
///
/// # Parameters
/// * `channel` - Channel the consumer is opened on.
/// * `queue` - Name of the queue to consume.
/// * `consumer_tag` - Tag identifying this consumer on the broker.
/// * `dispatcher` - Dispatcher every delivery is handed to.
/// * `workers` - Maximum number of in-flight dispatches.
///
/// # Returns
/// * `Result<DispatchStats, AmqpError>` - The dispatch counters once the stream
///   closes, or `BindingConsumerError` if the consumer could not be created.
pub async fn consume_into(
    channel: Arc<Channel>,
    queue: &str,
    consumer_tag: &str,
    dispatcher: Dispatcher,
    workers: usize,
) -> Result<DispatchStats, AmqpError> {
    let consumer = match channel
        .basic_consume(
            queue,
            consumer_tag,
            BasicConsumeOptions {
                no_local: false,
                no_ack: false,
                exclusive: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), queue, "error to create the consumer");
            Err(AmqpError::BindingConsumerError(queue.to_owned()))
        }
        Ok(c) => Ok(c),
    }?;

    info!(queue, workers, "consuming");

    let deliveries = consumer.filter_map(|result| async move {
        match result {
            Ok(mut delivery) => {
                let msg = delivery_message(std::mem::take(&mut delivery.data), &delivery.properties);
                let ack = async move {
                    delivery
                        .ack(BasicAckOptions { multiple: false })
                        .await
                        .map_err(|err| {
                            error!(error = err.to_string(), "error whiling ack msg");
                            AmqpError::AckMessageError
                        })
                };
                Some((msg, ack))
            }
            Err(err) => {
                error!(error = err.to_string(), "errors consume msg");
                None
            }
        }
    });

    let stats = dispatch_then_ack(deliveries, dispatcher, workers).await;

    info!(
        queue,
        delivered = stats.delivered,
        handled = stats.handled,
        "consumer stream closed"
    );
    Ok(stats)
}

/// Dispatches each `(message, ack)` pair, at most `workers` at a time, and
/// awaits `ack` once the message's dispatch returned.
pub(crate) async fn dispatch_then_ack<S, A>(
    deliveries: S,
    dispatcher: Dispatcher,
    workers: usize,
) -> DispatchStats
where
    S: Stream<Item = (Message, A)>,
    A: Future<Output = Result<(), AmqpError>> + Send + 'static,
{
    let mut deliveries = std::pin::pin!(deliveries);
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut stats = DispatchStats::default();

    while let Some((msg, ack)) = deliveries.next().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        let dispatcher = dispatcher.clone();
        tasks.spawn(async move {
            let outcome = dispatcher.dispatch(msg).await;
            match &outcome {
                DispatchOutcome::Delivered { destination, .. } => {
                    debug!(destination, "delivery dispatched")
                }
                DispatchOutcome::Handled { destination, .. } => {
                    debug!(destination, "delivery handled after transport failure")
                }
            }

            // dispatch never fails, so the delivery is acked whatever the outcome
            if ack.await.is_err() {
                debug!(destination = outcome.destination(), "delivery left unacked");
            }
            drop(permit);
            outcome
        });

        while let Some(res) = tasks.try_join_next() {
            stats.record(res);
        }
    }

    while let Some(res) = tasks.join_next().await {
        stats.record(res);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        destination::{Destination, HttpMethod, LogLevel},
        errors::TransportError,
        http::{HttpRequest, HttpResponse, HttpTransport},
        rules::{Predicate, RouteTable},
        sink::{MockErrorSink, MockLogSink},
    };
    use async_trait::async_trait;
    use futures_util::stream;
    use lapin::types::{LongString, ShortString};
    use std::{collections::BTreeMap, sync::Mutex, time::Duration};

    struct SlowApi;

    #[async_trait]
    impl HttpTransport for SlowApi {
        async fn call(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HttpResponse { status: 200, body: vec![] })
        }
    }

    fn acked(
        order: Arc<Mutex<Vec<String>>>,
        label: &str,
    ) -> impl Future<Output = Result<(), AmqpError>> + Send + 'static {
        let label = label.to_owned();
        async move {
            order.lock().unwrap().push(label);
            Ok(())
        }
    }

    fn queue_dispatcher() -> Dispatcher {
        let table = RouteTable::builder("queue")
            .when(
                Predicate::contains("user"),
                Destination::http("api-a", HttpMethod::Post, "https://api.test/post"),
            )
            .otherwise(Destination::log("default", LogLevel::Info))
            .build()
            .unwrap();

        let mut log = MockLogSink::new();
        log.expect_log().times(1).returning(|_| ());
        let mut errors = MockErrorSink::new();
        errors
            .expect_failure()
            .withf(|record| record.error == TransportError::Timeout(10_000))
            .times(1)
            .returning(|_| ());

        Dispatcher::builder(table)
            .http(Arc::new(SlowApi))
            .log_sink(Arc::new(log))
            .error_sink(Arc::new(errors))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_destination_does_not_hold_back_later_deliveries() {
        let order = Arc::new(Mutex::new(vec![]));
        let deliveries = stream::iter(vec![
            (Message::text("user:slow"), acked(order.clone(), "slow")),
            (Message::text("guest:fast"), acked(order.clone(), "fast")),
        ]);

        let stats = dispatch_then_ack(deliveries, queue_dispatcher(), 2).await;

        assert_eq!(*order.lock().unwrap(), vec!["fast", "slow"]);
        assert_eq!(
            stats,
            DispatchStats {
                delivered: 1,
                handled: 1,
                panicked: 0
            }
        );
    }

    #[test]
    fn delivery_keeps_text_headers_only() {
        let mut table = BTreeMap::new();
        table.insert(
            ShortString::from("User-Type"),
            AMQPValue::LongString(LongString::from("admin")),
        );
        table.insert(ShortString::from("x-count"), AMQPValue::LongLongInt(3));
        let props = AMQPProperties::default().with_headers(FieldTable::from(table));

        let msg = delivery_message(b"admin:root".to_vec(), &props);

        assert_eq!(msg.payload, Payload::Text("admin:root".to_owned()));
        assert_eq!(msg.header("User-Type").unwrap().as_str(), "admin");
        assert!(msg.header("x-count").is_none());
    }
}
