//! The per-call request pipeline (§4.4): a small state machine that carries
//! one request from validated input to a decoded response or a terminal
//! error.
//!
//! ```text
//! Built --encode & issue--> InFlight --on_response--> Decoded --> Done
//!                              |                                   ^
//!                              `--should_retry--> Sleeping ---------'
//! ```
//!
//! `Built` is the caller handing us a `Request`; `InFlight` is the window
//! between `RpcTransport::issue` and its `on_response` callback; `Sleeping`
//! is a `TimerService::after` wait before the next attempt; `Decoded` is a
//! successfully parsed response or a fully-classified error; `Done` is
//! returning control to the caller.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::{Digest, Md5};
use tracing::debug;

use tablestore_api::{
    Action, Codec, Error, Request, Response, RetryPolicy, RpcTransport, TimerService, Tracker,
    TransportOutcome,
};

fn content_md5(body: &[u8]) -> String {
    let digest = Md5::digest(body);
    BASE64.encode(digest)
}

/// The collaborators every call shares; cheap to clone, so one `Pipeline`
/// is built once per client and reused across calls.
#[derive(Clone)]
pub struct Pipeline {
    codec: Arc<dyn Codec>,
    transport: Arc<dyn RpcTransport>,
    timer: Arc<dyn TimerService>,
}

impl Pipeline {
    pub fn new(codec: Arc<dyn Codec>, transport: Arc<dyn RpcTransport>, timer: Arc<dyn TimerService>) -> Self {
        Pipeline { codec, transport, timer }
    }

    /// Drives one request through the pipeline to completion, retrying
    /// per `retry_policy` until it gives up or the call succeeds.
    pub async fn call(
        &self,
        request: Request,
        tracker: Tracker,
        deadline: std::time::Instant,
        mut retry_policy: Box<dyn RetryPolicy>,
    ) -> Result<Response, Error> {
        let action = request.action();
        let mut attempt: u32 = 0;
        loop {
            debug!(trace_id = %tracker.trace_id, %action, attempt, "InFlight");
            let outcome = self.issue_once(&request, action, deadline, &tracker).await;
            match outcome {
                Ok(response) => {
                    debug!(trace_id = %tracker.trace_id, %action, attempt, "Decoded");
                    return Ok(response);
                }
                Err(err) => {
                    let err = err.with_trace_id(tracker.trace_id.clone());
                    if !retry_policy.should_retry(action, attempt, &err) {
                        debug!(trace_id = %tracker.trace_id, %action, attempt, code = %err.code, "Done (error)");
                        return Err(err);
                    }
                    let pause = retry_policy.next_pause(attempt);
                    debug!(trace_id = %tracker.trace_id, %action, attempt, ?pause, "Sleeping");
                    self.sleep(pause).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn issue_once(
        &self,
        request: &Request,
        action: Action,
        deadline: std::time::Instant,
        tracker: &Tracker,
    ) -> Result<Response, Error> {
        let body = self.codec.encode_request(request)?;
        let digest = content_md5(&body);
        let codec = self.codec.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.transport.issue(
            action,
            &tracker.trace_id,
            deadline,
            body,
            digest,
            Box::new(move |outcome| {
                let result = Self::decode_outcome(&*codec, action, outcome);
                let _ = tx.send(result);
            }),
        );
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::corrupted_response("transport dropped the response callback")
                .with_trace_id(tracker.trace_id.clone())),
        }
    }

    fn decode_outcome(codec: &dyn Codec, action: Action, outcome: TransportOutcome) -> Result<Response, Error> {
        match outcome {
            TransportOutcome::Ok { http_status, body, request_id } => {
                if (200..300).contains(&http_status) {
                    codec.decode_response(action, &body).map_err(|e| e.with_request_id(request_id))
                } else {
                    match codec.decode_error_body(action, &body) {
                        Some((code, message)) => {
                            Err(Error::synthetic(http_status, &code, message).with_request_id(request_id))
                        }
                        None => Err(Error::corrupted_response(
                            "server returned a non-2xx status with an undecodable error body",
                        )
                        .with_request_id(request_id)),
                    }
                }
            }
            TransportOutcome::Err(err) => Err(err),
        }
    }

    async fn sleep(&self, delay: std::time::Duration) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _handle = self.timer.after(delay, Box::new(move || {
            let _ = tx.send(());
        }));
        let _ = rx.await;
    }
}
