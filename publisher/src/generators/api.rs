use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{Generator, uniform_delay};
use crate::context::EngineContext;
use crate::counters::{RateCounter, ValueCounter};
use crate::error::OperationError;

const DELAY_MS: std::ops::Range<u64> = 500..3_000;

/// The fixed set of remote endpoints the generator calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Post1,
    Post2,
    User1,
    DelayedResponse,
    StatusOk,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Post1,
        Endpoint::Post2,
        Endpoint::User1,
        Endpoint::DelayedResponse,
        Endpoint::StatusOk,
    ];

    pub fn url(self) -> &'static str {
        match self {
            Endpoint::Post1 => "https://jsonplaceholder.typicode.com/posts/1",
            Endpoint::Post2 => "https://jsonplaceholder.typicode.com/posts/2",
            Endpoint::User1 => "https://jsonplaceholder.typicode.com/users/1",
            Endpoint::DelayedResponse => "https://httpbin.org/delay/1",
            Endpoint::StatusOk => "https://httpbin.org/status/200",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Issues one outbound GET and reports the response status.
///
/// A completed call with a non-2xx status is `Ok`; only transport-level
/// failures are errors.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<StatusCode, OperationError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, url: &str) -> Result<StatusCode, OperationError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        // The body is read in full so the measured time covers the whole exchange.
        let body = resp.bytes().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "api call completed");
        Ok(status)
    }
}

pub struct ApiCallGenerator {
    ctx: EngineContext,
    transport: Arc<dyn ApiTransport>,
    rng: StdRng,
}

impl ApiCallGenerator {
    pub fn new(ctx: EngineContext, transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            ctx,
            transport,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl Generator for ApiCallGenerator {
    fn name(&self) -> &'static str {
        "api_calls"
    }

    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<(), OperationError> {
        let activity = &self.ctx.activity;
        let _task = activity.begin_task();

        let endpoint = Endpoint::random(&mut self.rng);
        let started = Instant::now();

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OperationError::Cancelled),
            res = self.transport.get(endpoint.url()) => res?,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        activity.record_api_call();
        self.ctx.counters.increment(RateCounter::ApiCalls)?;
        self.ctx.counters.set(ValueCounter::ApiResponseTime, elapsed_ms)?;

        if !status.is_success() {
            activity.record_error();
            debug!(?endpoint, status = status.as_u16(), "api call returned non-success status");
        }

        Ok(())
    }

    fn next_delay(&mut self) -> Duration {
        uniform_delay(&mut self.rng, DELAY_MS)
    }
}
