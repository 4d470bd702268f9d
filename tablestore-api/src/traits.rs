//! The seams the SDK core is generic over (§1/§6): how a call is carried
//! over the wire, how its payload is encoded, and how a retry delay is
//! timed. `tablestore-sdk` depends only on these traits; concrete
//! implementations live in `tablestore-http`, `tablestore-proto` and
//! `tablestore-client`.

use std::time::{Duration, Instant};

use crate::action::Action;
use crate::error::Error;
use crate::rpc::{Request, Response};
use crate::tracker::Tracker;

/// The outcome handed back to a transport's caller exactly once per call
/// (§4.5): either the raw response bytes plus the HTTP status they arrived
/// with, or a fully-formed [`Error`] if the call never produced a usable
/// response.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    Ok { http_status: i32, body: Vec<u8>, request_id: String },
    Err(Error),
}

/// A pluggable carrier for a single signed HTTP exchange (§6). `issue`
/// returns immediately; `on_response` fires exactly once, from any thread,
/// once a result is known or the deadline is reached.
pub trait RpcTransport: Send + Sync + 'static {
    #[allow(clippy::too_many_arguments)]
    fn issue(
        &self,
        action: Action,
        trace_id: &str,
        deadline: Instant,
        body: Vec<u8>,
        content_md5: String,
        on_response: Box<dyn FnOnce(TransportOutcome) + Send>,
    );
}

/// A handle to a scheduled callback; dropping or cancelling it must prevent
/// the callback from firing (§4.6, Sleeping state exit).
pub trait TimerHandle: Send {
    fn cancel(&self);
}

/// Schedules work after a delay, used by the retry loop's Sleeping state
/// (§4.6) and by the write aggregator's nap interval (§4.8).
pub trait TimerService: Send + Sync + 'static {
    fn after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> Box<dyn TimerHandle>;
}

/// Turns typed requests and responses into wire bytes and back (§1: the
/// on-wire encoding is an opaque collaborator). One call encodes a request,
/// one decodes a matching response, and one decodes an error body that
/// didn't carry a 2xx status.
pub trait Codec: Send + Sync + 'static {
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>, Error>;
    fn decode_response(&self, action: Action, body: &[u8]) -> Result<Response, Error>;
    fn decode_error_body(&self, action: Action, body: &[u8]) -> Option<(String, String)>;
}

/// A retry policy's in-flight state for one call (§4.3): how many attempts
/// are left to try, and how long to sleep before the next one. A fresh
/// instance is cloned from the client's configured prototype at the start
/// of every call so concurrent calls never share mutable retry state.
pub trait RetryPolicy: Send {
    /// Whether `error`, produced by `action` on attempt number `attempt`
    /// (0-based), should be retried at all. Combines the error's own
    /// [`crate::error::RetryClass`] with this policy's own limits (attempt
    /// count, deadline).
    fn should_retry(&self, action: Action, attempt: u32, error: &Error) -> bool;

    /// The delay to sleep before the next attempt. Only meaningful
    /// immediately after `should_retry` returned `true`.
    fn next_pause(&mut self, attempt: u32) -> Duration;

    /// A fresh, independently-seeded clone for a new call.
    fn clone_policy(&self) -> Box<dyn RetryPolicy>;
}
