// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # HTTP Transport
//!
//! The dispatcher talks to HTTP destinations through the `HttpTransport`
//! trait. A transport returns whatever status the server answered with;
//! deciding that a non-2xx status is a failure is left to the caller.

use crate::{destination::HttpMethod, errors::TransportError};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `HttpTransport` backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport whose requests give up after `timeout`.
    ///
    /// # Parameters
    /// * `timeout` - Upper bound for a whole request, connect included.
    ///
    /// # Returns
    /// * `Result<ReqwestTransport, TransportError>` - The transport, or a
    ///   `Connection` error if the client could not be built.
    pub fn new(timeout: Duration) -> Result<ReqwestTransport, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                error!(error = err.to_string(), "failure to build the http client");
                TransportError::Connection(err.to_string())
            })?;

        Ok(ReqwestTransport { client, timeout })
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = request.url, "calling http destination");

        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url)
            .body(request.body);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(self.timeout.as_millis() as u64)
            } else {
                TransportError::Connection(err.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(self.timeout.as_millis() as u64)
            } else {
                TransportError::Connection(err.to_string())
            }
        })?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
