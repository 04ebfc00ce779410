//! HTTP delivery of one rendered payload to one hook.
//!
//! Delivery is best effort: one attempt, bounded by the configured timeout,
//! no retry. Anything other than `200 OK` is a failure, logged at `warn`
//! and passed to the error reporter as a notice. A successful response body
//! may carry a [`HookReply`], which is applied on the simulation thread
//! from a blocking task.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use simgate_core::{Reporter, SimError};
use tracing::{debug, warn};

use crate::hook::WebHook;
use crate::reply::{HookReply, ReplySink};

/// Crate version, sent in the user agent and version header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version header name.
pub const VERSION_HEADER: &str = "X-Simgate-Version";
/// Event kind header name.
pub const EVENT_HEADER: &str = "X-Simgate-Event";
/// Event source header name.
pub const SOURCE_HEADER: &str = "X-Simgate-Source";

/// One request, ready to send.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    /// Target hook.
    pub hook: Arc<WebHook>,
    /// Wire name of the event kind.
    pub event: &'static str,
    /// Event source, sent when present.
    pub source: Option<String>,
    /// Encoded body.
    pub body: String,
    /// Upper bound on the request, reply body included.
    pub timeout: Duration,
}

/// What came of a delivery that reached the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// `200` with no reply.
    Acknowledged,
    /// `200` with a reply, delivered to this many players.
    Replied(usize),
    /// `200` with a body that is not a valid reply; dropped.
    MalformedReply,
}

/// Sends webhook requests.
pub struct Delivery {
    client: reqwest::Client,
    user_agent: String,
    replies: Arc<dyn ReplySink>,
    reporter: Reporter,
}

impl core::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delivery")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Delivery {
    /// A sender whose replies go to `replies`.
    pub fn new(replies: Arc<dyn ReplySink>, reporter: Reporter) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: format!("simgate/{VERSION}"),
            replies,
            reporter,
        }
    }

    /// Deliver `job`, logging and reporting any failure.
    pub async fn run(&self, job: DeliveryJob) -> Result<DeliveryOutcome, SimError> {
        let address = job.hook.address.clone();
        let result = self.send(job).await;
        match &result {
            Ok(outcome) => debug!(hook = %address, ?outcome, "Hook delivered"),
            Err(err) => {
                warn!(hook = %address, error = %err, "Hook delivery failed");
                self.reporter.notice(err, "webhook delivery");
            }
        }
        result
    }

    async fn send(&self, job: DeliveryJob) -> Result<DeliveryOutcome, SimError> {
        let hook = &job.hook;
        let method = reqwest::Method::from_bytes(hook.method.as_bytes()).map_err(|_err| {
            SimError::DeliveryFailed(format!("invalid method '{}'", hook.method))
        })?;

        let mut request = self
            .client
            .request(method, &hook.address)
            .timeout(job.timeout);
        for header in &hook.headers {
            request = request.header(header.name.as_str(), header.value.as_str());
        }
        request = request
            .header(USER_AGENT, self.user_agent.as_str())
            .header(VERSION_HEADER, VERSION)
            .header(EVENT_HEADER, job.event)
            .header(ACCEPT, "application/json");
        if let Some(source) = &job.source {
            request = request.header(SOURCE_HEADER, source.as_str());
        }
        let response = request
            .header(CONTENT_TYPE, hook.data_type.content_type())
            .body(job.body)
            .send()
            .await
            .map_err(|e| SimError::DeliveryFailed(format!("request to '{}' failed: {e}", hook.address)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SimError::DeliveryFailed(format!(
                "'{}' responded with {status}",
                hook.address
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SimError::DeliveryFailed(format!("reading reply from '{}': {e}", hook.address)))?;

        let reply = match HookReply::parse(&body) {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(DeliveryOutcome::Acknowledged),
            Err(err) => {
                warn!(hook = %hook.address, error = %err, "Malformed hook reply dropped");
                return Ok(DeliveryOutcome::MalformedReply);
            }
        };

        let replies = Arc::clone(&self.replies);
        let delivered = tokio::task::spawn_blocking(move || replies.deliver(reply))
            .await
            .map_err(|e| SimError::Internal(format!("reply task failed: {e}")))??;
        Ok(DeliveryOutcome::Replied(delivered))
    }
}
