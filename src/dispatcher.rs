// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Content-Based Dispatcher
//!
//! The dispatcher takes one inbound message at a time, classifies it against
//! an immutable `RouteTable`, annotates it with the matching header patch and
//! forwards it to the resolved destination:
//!
//! - log destinations are written to the `LogSink`;
//! - HTTP destinations are called through the `HttpTransport` with the
//!   destination's method, and a non-empty response body replaces the payload;
//! - broker destinations are published through the `Publisher`.
//!
//! Transport failures (error status, connection error, timeout, encoding
//! failure) never reach the caller. Each one produces exactly one
//! `FailureRecord` on the `ErrorSink` and a `DispatchOutcome::Handled`.
//! Nothing is retried.
//!
//! A dispatcher holds no mutable state, so clones can dispatch concurrently.
//! `Dispatcher::run` drives a channel of messages with a bounded number of
//! in-flight dispatches.

use crate::{
    destination::{Destination, DestinationKind},
    errors::{ConfigError, TransportError},
    http::{HttpRequest, HttpTransport},
    message::{Message, Payload},
    publisher::{PublishMessage, Publisher},
    rules::{Classification, RouteTable},
    sink::{ErrorSink, FailureRecord, LogRecord, LogSink, TracingSink},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Semaphore},
    task::{JoinError, JoinHandle, JoinSet},
};
use tracing::{debug, error, info, instrument, warn};

/// Timeout applied to transport calls when none is configured
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The destination accepted the message. `message` carries the applied
    /// headers and, for HTTP destinations, the response body.
    Delivered { destination: String, message: Message },
    /// The transport failed; the failure was recorded and suppressed.
    Handled {
        destination: String,
        error: TransportError,
    },
}

impl DispatchOutcome {
    pub fn destination(&self) -> &str {
        match self {
            DispatchOutcome::Delivered { destination, .. } => destination,
            DispatchOutcome::Handled { destination, .. } => destination,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Counters reported by `Dispatcher::run` once its input is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub handled: u64,
    pub panicked: u64,
}

impl DispatchStats {
    pub(crate) fn record(&mut self, res: Result<DispatchOutcome, JoinError>) {
        match res {
            Ok(DispatchOutcome::Delivered { .. }) => self.delivered += 1,
            Ok(DispatchOutcome::Handled { .. }) => self.handled += 1,
            Err(err) => {
                error!(error = err.to_string(), "dispatch task failed");
                self.panicked += 1;
            }
        }
    }
}

pub struct DispatcherBuilder {
    table: RouteTable,
    http: Option<Arc<dyn HttpTransport>>,
    publisher: Option<Arc<dyn Publisher>>,
    log_sink: Arc<dyn LogSink>,
    error_sink: Arc<dyn ErrorSink>,
    timeout: Duration,
}

impl DispatcherBuilder {
    pub fn http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that every destination of the table has a transport.
    ///
    /// # Returns
    /// * `Result<Dispatcher, ConfigError>` - The dispatcher, or `InvalidValue`
    ///   when an HTTP or broker destination has no transport, or the timeout is zero.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        for dest in self.table.destinations() {
            match dest.kind() {
                DestinationKind::Http { .. } if self.http.is_none() => {
                    return Err(ConfigError::invalid(
                        dest.name(),
                        "http destination without an http transport",
                    ));
                }
                DestinationKind::Broker { .. } if self.publisher.is_none() => {
                    return Err(ConfigError::invalid(
                        dest.name(),
                        "broker destination without a publisher",
                    ));
                }
                _ => {}
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::invalid(self.table.name(), "zero dispatch timeout"));
        }

        Ok(Dispatcher {
            table: Arc::new(self.table),
            http: self.http,
            publisher: self.publisher,
            log_sink: self.log_sink,
            error_sink: self.error_sink,
            timeout: self.timeout,
        })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    http: Option<Arc<dyn HttpTransport>>,
    publisher: Option<Arc<dyn Publisher>>,
    log_sink: Arc<dyn LogSink>,
    error_sink: Arc<dyn ErrorSink>,
    timeout: Duration,
}

impl Dispatcher {
    /// Starts a builder with `tracing` sinks and the default timeout.
    ///
    /// # Parameters
    /// * `table` - Route table every dispatched message is classified against.
    ///
    /// # Returns
    /// * `DispatcherBuilder` - A builder without HTTP transport or publisher.
    pub fn builder(table: RouteTable) -> DispatcherBuilder {
        DispatcherBuilder {
            table,
            http: None,
            publisher: None,
            log_sink: Arc::new(TracingSink),
            error_sink: Arc::new(TracingSink),
            timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn classify(&self, msg: &Message) -> Classification<'_> {
        self.table.classify(msg)
    }

    /// Classifies, annotates and forwards one message.
    #[instrument(name = "dispatch", skip_all, fields(table = self.table.name()))]
    pub async fn dispatch(&self, mut msg: Message) -> DispatchOutcome {
        let classification = self.table.classify(&msg);
        let destination = classification.destination;
        msg.apply_headers(classification.headers);

        debug!(destination = destination.name(), "message classified");

        let result = match tokio::time::timeout(self.timeout, self.forward(destination, &msg)).await
        {
            Ok(res) => res,
            Err(_) => Err(TransportError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(response) => {
                if let Some(payload) = response {
                    info!(
                        destination = destination.name(),
                        response = payload.to_string(),
                        "response received"
                    );
                    msg.payload = payload;
                }

                DispatchOutcome::Delivered {
                    destination: destination.name().to_owned(),
                    message: msg,
                }
            }
            Err(error) => {
                warn!(
                    destination = destination.name(),
                    error = error.to_string(),
                    "transport failure handled"
                );
                self.error_sink.failure(&FailureRecord {
                    destination: destination.name().to_owned(),
                    message: msg,
                    error: error.clone(),
                });

                DispatchOutcome::Handled {
                    destination: destination.name().to_owned(),
                    error,
                }
            }
        }
    }

    async fn forward(
        &self,
        destination: &Destination,
        msg: &Message,
    ) -> Result<Option<Payload>, TransportError> {
        match destination.kind() {
            DestinationKind::Log { level } => {
                self.log_sink.log(&LogRecord {
                    level: *level,
                    destination: destination.name().to_owned(),
                    message: msg.clone(),
                });
                Ok(None)
            }
            DestinationKind::Http { method, url } => {
                let Some(http) = &self.http else {
                    return Err(TransportError::Connection("no http transport".to_owned()));
                };

                let request = HttpRequest {
                    method: *method,
                    url: url.clone(),
                    body: destination.wire_format().encode(&msg.payload)?,
                    headers: msg
                        .headers
                        .iter()
                        .map(|(key, value)| (key.clone(), value.to_string()))
                        .collect(),
                };

                info!(destination = destination.name(), method = %method, url, "calling api");
                let response = http.call(request).await?;

                if !response.is_success() {
                    return Err(TransportError::Status {
                        status: response.status,
                        body: String::from_utf8_lossy(&response.body).into_owned(),
                    });
                }

                if response.body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Payload::from_bytes(response.body)))
            }
            DestinationKind::Broker {
                exchange,
                routing_key,
            } => {
                let Some(publisher) = &self.publisher else {
                    return Err(TransportError::Broker("no publisher".to_owned()));
                };

                let publish = PublishMessage {
                    exchange: exchange.clone(),
                    routing_key: routing_key.clone(),
                    data: destination.wire_format().encode(&msg.payload)?,
                    headers: msg.headers.clone(),
                };

                publisher.publish(&publish).await?;
                Ok(None)
            }
        }
    }

    /// Dispatches every message received on `rx`, at most `workers` at a time.
    ///
    /// Returns once `rx` is closed and all in-flight dispatches finished.
    #[instrument(name = "dispatcher_run", skip(self, rx), fields(table = self.table.name()))]
    pub async fn run(self, mut rx: mpsc::Receiver<Message>, workers: usize) -> DispatchStats {
        info!(workers, "dispatcher started");

        let permits = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut stats = DispatchStats::default();

        while let Some(msg) = rx.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };

            let dispatcher = self.clone();
            tasks.spawn(async move {
                let outcome = dispatcher.dispatch(msg).await;
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

        info!(
            delivered = stats.delivered,
            handled = stats.handled,
            "dispatcher input closed"
        );

        stats
    }

    pub fn spawn(self, rx: mpsc::Receiver<Message>, workers: usize) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run(rx, workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        destination::{HttpMethod, LogLevel},
        errors::AmqpError,
        http::{HttpResponse, MockHttpTransport},
        message::{HeaderValue, UserType, USER_TYPE_HEADER},
        publisher::MockPublisher,
        rules::Predicate,
        sink::{MockErrorSink, MockLogSink},
    };
    use async_trait::async_trait;

    const API_A: &str = "https://api.test/post";
    const API_B: &str = "https://api.test/put";

    fn api_table() -> RouteTable {
        RouteTable::builder("dynamic-api")
            .when(
                Predicate::contains("admin"),
                Destination::http("api-b", HttpMethod::Put, API_B),
            )
            .header(USER_TYPE_HEADER, UserType::Admin)
            .when(
                Predicate::contains("user"),
                Destination::http("api-a", HttpMethod::Post, API_A),
            )
            .header(USER_TYPE_HEADER, UserType::User)
            .otherwise(Destination::log("error", LogLevel::Error))
            .build()
            .unwrap()
    }

    fn quiet_sinks(builder: DispatcherBuilder) -> DispatcherBuilder {
        let mut log = MockLogSink::new();
        log.expect_log().returning(|_| ());
        let mut errors = MockErrorSink::new();
        errors.expect_failure().never();
        builder.log_sink(Arc::new(log)).error_sink(Arc::new(errors))
    }

    fn has_header(req: &HttpRequest, key: &str, value: &str) -> bool {
        req.headers.iter().any(|(k, v)| k == key && v == value)
    }

    #[tokio::test]
    async fn user_message_is_posted_to_api_a() {
        let mut http = MockHttpTransport::new();
        http.expect_call()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == API_A
                    && req.body == b"user:john.doe@example.com".to_vec()
                    && has_header(req, USER_TYPE_HEADER, "user")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    body: br#"{"json":"ok"}"#.to_vec(),
                })
            });

        let dispatcher = quiet_sinks(Dispatcher::builder(api_table()).http(Arc::new(http)))
            .build()
            .unwrap();

        let outcome = dispatcher
            .dispatch(Message::text("user:john.doe@example.com"))
            .await;

        let DispatchOutcome::Delivered {
            destination,
            message,
        } = outcome
        else {
            panic!("expected delivery, got {outcome:?}");
        };
        assert_eq!(destination, "api-a");
        assert_eq!(message.payload, Payload::Text(r#"{"json":"ok"}"#.to_owned()));
        assert_eq!(
            message.header(USER_TYPE_HEADER),
            Some(&HeaderValue::UserType(UserType::User))
        );
    }

    #[tokio::test]
    async fn admin_message_is_put_to_api_b() {
        let mut http = MockHttpTransport::new();
        http.expect_call()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.url == API_B
                    && has_header(req, USER_TYPE_HEADER, "admin")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse { status: 200, body: vec![] }));

        let dispatcher = quiet_sinks(Dispatcher::builder(api_table()).http(Arc::new(http)))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text("admin:admin@example.com")).await;

        assert_eq!(outcome.destination(), "api-b");
        let DispatchOutcome::Delivered { message, .. } = outcome else {
            panic!("expected delivery");
        };
        // empty response bodies keep the original payload
        assert_eq!(message.payload, Payload::Text("admin:admin@example.com".to_owned()));
    }

    #[tokio::test]
    async fn unknown_user_goes_to_error_log_without_http_call() {
        let mut http = MockHttpTransport::new();
        http.expect_call().never();

        let mut log = MockLogSink::new();
        log.expect_log()
            .withf(|record| {
                record.destination == "error"
                    && record.level == LogLevel::Error
                    && record.message.header(USER_TYPE_HEADER).is_none()
            })
            .times(1)
            .returning(|_| ());

        let dispatcher = Dispatcher::builder(api_table())
            .http(Arc::new(http))
            .log_sink(Arc::new(log))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text("guest:guest@example.com")).await;

        assert!(outcome.is_delivered());
        assert_eq!(outcome.destination(), "error");
    }

    #[tokio::test]
    async fn connection_failure_is_recorded_once_and_suppressed() {
        let mut http = MockHttpTransport::new();
        http.expect_call()
            .times(1)
            .returning(|_| Err(TransportError::Connection("connection refused".to_owned())));

        let mut errors = MockErrorSink::new();
        errors
            .expect_failure()
            .withf(|record| {
                record.destination == "api-a"
                    && record.message.payload
                        == Payload::Text("user:john.doe@example.com".to_owned())
            })
            .times(1)
            .returning(|_| ());

        let dispatcher = Dispatcher::builder(api_table())
            .http(Arc::new(http))
            .error_sink(Arc::new(errors))
            .build()
            .unwrap();

        let outcome = dispatcher
            .dispatch(Message::text("user:john.doe@example.com"))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                destination: "api-a".to_owned(),
                error: TransportError::Connection("connection refused".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn error_status_is_a_transport_failure() {
        let mut http = MockHttpTransport::new();
        http.expect_call().returning(|_| {
            Ok(HttpResponse {
                status: 503,
                body: b"unavailable".to_vec(),
            })
        });

        let mut errors = MockErrorSink::new();
        errors.expect_failure().times(1).returning(|_| ());

        let dispatcher = Dispatcher::builder(api_table())
            .http(Arc::new(http))
            .error_sink(Arc::new(errors))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text("admin:root")).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Handled {
                error: TransportError::Status { status: 503, .. },
                ..
            }
        ));
    }

    struct StalledTransport;

    #[async_trait]
    impl HttpTransport for StalledTransport {
        async fn call(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(HttpResponse { status: 200, body: vec![] })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out_as_handled_failure() {
        let mut errors = MockErrorSink::new();
        errors
            .expect_failure()
            .withf(|record| record.error == TransportError::Timeout(50))
            .times(1)
            .returning(|_| ());

        let dispatcher = Dispatcher::builder(api_table())
            .http(Arc::new(StalledTransport))
            .error_sink(Arc::new(errors))
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text("user:slow")).await;

        assert!(!outcome.is_delivered());
    }

    fn broker_table() -> RouteTable {
        RouteTable::builder("characters")
            .otherwise(Destination::broker("got", "got-exchange", "character"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn json_payload_is_published_to_exchange() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|msg| {
                msg.exchange == "got-exchange"
                    && msg.routing_key == "character"
                    && msg.data == br#"{"name":"Eddard Stark"}"#.to_vec()
            })
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = quiet_sinks(Dispatcher::builder(broker_table()).publisher(Arc::new(publisher)))
            .build()
            .unwrap();

        let outcome = dispatcher
            .dispatch(Message::new(Payload::Json(
                serde_json::json!({ "name": "Eddard Stark" }),
            )))
            .await;

        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn non_json_payload_is_not_published() {
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let mut errors = MockErrorSink::new();
        errors
            .expect_failure()
            .withf(|record| matches!(record.error, TransportError::Serialization(_)))
            .times(1)
            .returning(|_| ());

        let dispatcher = Dispatcher::builder(broker_table())
            .publisher(Arc::new(publisher))
            .error_sink(Arc::new(errors))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text("not json")).await;

        assert!(!outcome.is_delivered());
    }

    #[tokio::test]
    async fn publish_failure_is_handled() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .returning(|_| Err(AmqpError::PublishingError("got-exchange".to_owned())));

        let mut errors = MockErrorSink::new();
        errors.expect_failure().times(1).returning(|_| ());

        let dispatcher = Dispatcher::builder(broker_table())
            .publisher(Arc::new(publisher))
            .error_sink(Arc::new(errors))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(Message::text(r#"{"a":1}"#)).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Handled {
                error: TransportError::Broker(_),
                ..
            }
        ));
    }

    #[test]
    fn http_table_requires_http_transport() {
        let res = Dispatcher::builder(api_table()).build();
        assert!(matches!(res, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn broker_table_requires_publisher() {
        let res = Dispatcher::builder(broker_table()).build();
        assert!(matches!(res, Err(ConfigError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn run_dispatches_every_message_until_input_closes() {
        let table = RouteTable::builder("choice")
            .when(Predicate::contains("admin"), Destination::log("admin", LogLevel::Info))
            .otherwise(Destination::log("default", LogLevel::Info))
            .build()
            .unwrap();

        let mut log = MockLogSink::new();
        log.expect_log().times(5).returning(|_| ());

        let dispatcher = Dispatcher::builder(table)
            .log_sink(Arc::new(log))
            .build()
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = dispatcher.spawn(rx, 2);

        for i in 0..5 {
            tx.send(Message::text(format!("admin message {i}"))).await.unwrap();
        }
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(
            stats,
            DispatchStats {
                delivered: 5,
                handled: 0,
                panicked: 0
            }
        );
    }
}
