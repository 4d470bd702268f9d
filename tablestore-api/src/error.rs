//! The closed error taxonomy of §4.1/§7: every failure a call can surface,
//! whether raised locally (validation, transport) or decoded off the wire.

use std::fmt;

use thiserror::Error;

use crate::action::Action;

/// Canonical code string for a local condition that never reached, or never
/// came back cleanly from, the network.
pub mod synthetic {
    pub const COULDNT_RESOLVE_HOST: &str = "CouldntResolveHost";
    pub const COULDNT_CONNECT: &str = "CouldntConnect";
    pub const OPERATION_TIMEOUT: &str = "OTSRequestTimeout";
    pub const WRITE_REQUEST_FAIL: &str = "WriteRequestFail";
    pub const CORRUPTED_RESPONSE: &str = "CorruptedResponse";
    pub const NO_AVAILABLE_CONNECTION: &str = "NoAvailableConnection";
}

/// Synthetic HTTP-status-like markers for local conditions (§4.1). All are
/// below 200 so they never collide with a real HTTP status.
pub mod synthetic_status {
    pub const COULDNT_RESOLVE_HOST: i32 = -2;
    pub const COULDNT_CONNECT: i32 = -3;
    pub const OPERATION_TIMEOUT: i32 = -4;
    pub const WRITE_REQUEST_FAIL: i32 = -5;
    pub const CORRUPTED_RESPONSE: i32 = -6;
    pub const NO_AVAILABLE_CONNECTION: i32 = -7;
    /// Reserved for local validation failures (§4.2).
    pub const PARAMETER_INVALID: i32 = -1;
}

/// Server-side error codes consulted by the retry policy (§4.1).
pub mod server_code {
    pub const SERVER_BUSY: &str = "OTSServerBusy";
    pub const PARTITION_UNAVAILABLE: &str = "OTSPartitionUnavailable";
    pub const QUOTA_EXHAUSTED: &str = "OTSQuotaExhausted";
    pub const ROW_OPERATION_CONFLICT: &str = "OTSRowOperationConflict";
    pub const TABLE_NOT_READY: &str = "OTSTableNotReady";
    pub const TOO_FREQUENT_RESERVED_THROUGHPUT_ADJUSTMENT: &str =
        "OTSTooFrequentReservedThroughputAdjustment";
    pub const CAPACITY_UNIT_EXHAUSTED: &str = "OTSCapacityUnitExhausted";
    pub const TIMEOUT: &str = "OTSTimeout";
    pub const AUTH_FAILED: &str = "OTSAuthFailed";
}

const QUOTA_EXHAUSTED_MESSAGE: &str = "Too frequent table operations.";

/// Result of classifying an error for retry purposes (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Never retry, regardless of action.
    Unretriable,
    /// Always retry (subject to the policy's own limits).
    Retriable,
    /// Retry only if the action is idempotent.
    Depends,
}

/// A single error returned by the client. Carries everything a caller needs
/// to log or branch on: the (possibly synthetic) HTTP status, the code used
/// for retry classification, a human message, and the request/trace
/// identifiers that tie the failure back to a specific call.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{code} (status {http_status}): {message}")]
pub struct Error {
    pub http_status: i32,
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub trace_id: String,
}

impl Error {
    /// A purely local, synchronously-raised validation failure (§4.2).
    /// `field` is folded into the message so the violation is
    /// self-describing (testable property 1).
    pub fn parameter_invalid(field: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Error {
            http_status: synthetic_status::PARAMETER_INVALID,
            code: "OTSParameterInvalid".to_string(),
            message: format!("{field}: {reason}"),
            request_id: String::new(),
            trace_id: String::new(),
        }
    }

    /// Build a synthetic transport error before a trace id is known; callers
    /// attach the id once the pipeline context exists.
    pub fn synthetic(status: i32, code: &str, message: impl Into<String>) -> Self {
        Error {
            http_status: status,
            code: code.to_string(),
            message: message.into(),
            request_id: String::new(),
            trace_id: String::new(),
        }
    }

    pub fn couldnt_resolve_host(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::COULDNT_RESOLVE_HOST,
            synthetic::COULDNT_RESOLVE_HOST,
            message,
        )
    }

    pub fn couldnt_connect(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::COULDNT_CONNECT,
            synthetic::COULDNT_CONNECT,
            message,
        )
    }

    pub fn operation_timeout(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::OPERATION_TIMEOUT,
            synthetic::OPERATION_TIMEOUT,
            message,
        )
    }

    pub fn write_request_fail(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::WRITE_REQUEST_FAIL,
            synthetic::WRITE_REQUEST_FAIL,
            message,
        )
    }

    pub fn corrupted_response(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::CORRUPTED_RESPONSE,
            synthetic::CORRUPTED_RESPONSE,
            message,
        )
    }

    pub fn no_available_connection(message: impl Into<String>) -> Self {
        Self::synthetic(
            synthetic_status::NO_AVAILABLE_CONNECTION,
            synthetic::NO_AVAILABLE_CONNECTION,
            message,
        )
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// §4.1: an error is temporary if its status is a 5xx or one of the
    /// synthetic network statuses, or its code names a known-retriable
    /// server condition.
    pub fn is_temporary(&self) -> bool {
        if (500..=599).contains(&self.http_status) {
            return true;
        }
        if matches!(
            self.http_status,
            synthetic_status::COULDNT_RESOLVE_HOST
                | synthetic_status::COULDNT_CONNECT
                | synthetic_status::OPERATION_TIMEOUT
                | synthetic_status::WRITE_REQUEST_FAIL
                | synthetic_status::CORRUPTED_RESPONSE
                | synthetic_status::NO_AVAILABLE_CONNECTION
        ) {
            return true;
        }
        matches!(
            self.code.as_str(),
            synthetic::COULDNT_RESOLVE_HOST
                | synthetic::COULDNT_CONNECT
                | synthetic::OPERATION_TIMEOUT
                | synthetic::WRITE_REQUEST_FAIL
                | synthetic::CORRUPTED_RESPONSE
                | synthetic::NO_AVAILABLE_CONNECTION
                | server_code::SERVER_BUSY
                | server_code::PARTITION_UNAVAILABLE
                | server_code::QUOTA_EXHAUSTED
                | server_code::ROW_OPERATION_CONFLICT
                | server_code::TABLE_NOT_READY
                | server_code::TOO_FREQUENT_RESERVED_THROUGHPUT_ADJUSTMENT
                | server_code::CAPACITY_UNIT_EXHAUSTED
                | server_code::TIMEOUT
        )
    }

    /// §4.1/§4.3: the three-way retry classification, independent of which
    /// action produced the error.
    pub fn retry_class(&self) -> RetryClass {
        if !self.is_temporary() {
            return RetryClass::Unretriable;
        }
        match self.http_status {
            synthetic_status::COULDNT_RESOLVE_HOST | synthetic_status::NO_AVAILABLE_CONNECTION => {
                return RetryClass::Retriable
            }
            synthetic_status::COULDNT_CONNECT => return RetryClass::Retriable,
            synthetic_status::OPERATION_TIMEOUT
            | synthetic_status::WRITE_REQUEST_FAIL
            | synthetic_status::CORRUPTED_RESPONSE => return RetryClass::Depends,
            _ => {}
        }
        match self.code.as_str() {
            server_code::SERVER_BUSY | server_code::PARTITION_UNAVAILABLE => RetryClass::Retriable,
            server_code::QUOTA_EXHAUSTED if self.message == QUOTA_EXHAUSTED_MESSAGE => {
                RetryClass::Retriable
            }
            server_code::ROW_OPERATION_CONFLICT
            | server_code::TABLE_NOT_READY
            | server_code::TOO_FREQUENT_RESERVED_THROUGHPUT_ADJUSTMENT
            | server_code::CAPACITY_UNIT_EXHAUSTED => RetryClass::Retriable,
            server_code::TIMEOUT => RetryClass::Depends,
            _ if (500..=599).contains(&self.http_status) => RetryClass::Depends,
            _ => RetryClass::Unretriable,
        }
    }

    /// §4.3: whether this error, produced by `action`, should be retried.
    /// `Depends`-class errors are retried only for idempotent actions.
    pub fn is_retriable_for(&self, action: Action) -> bool {
        match self.retry_class() {
            RetryClass::Unretriable => false,
            RetryClass::Retriable => true,
            RetryClass::Depends => action.is_idempotent(),
        }
    }
}

/// A lightweight discriminant for matching on error shape without comparing
/// code strings, used by tests and by callers who want a `match` instead of
/// string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
    Protocol,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.http_status {
            synthetic_status::PARAMETER_INVALID => ErrorKind::Validation,
            synthetic_status::COULDNT_RESOLVE_HOST
            | synthetic_status::COULDNT_CONNECT
            | synthetic_status::WRITE_REQUEST_FAIL
            | synthetic_status::NO_AVAILABLE_CONNECTION => ErrorKind::Network,
            synthetic_status::OPERATION_TIMEOUT => ErrorKind::Network,
            synthetic_status::CORRUPTED_RESPONSE => ErrorKind::Protocol,
            _ => ErrorKind::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_5xx_is_temporary_and_depends() {
        let err = Error::synthetic(503, "OTSInternalServerError", "boom");
        assert!(err.is_temporary());
        assert_eq!(err.retry_class(), RetryClass::Depends);
        assert!(err.is_retriable_for(Action::GetRow));
        assert!(!err.is_retriable_for(Action::PutRow));
    }

    #[test]
    fn quota_exhausted_requires_exact_message() {
        let retriable = Error::synthetic(400, server_code::QUOTA_EXHAUSTED, QUOTA_EXHAUSTED_MESSAGE);
        assert_eq!(retriable.retry_class(), RetryClass::Retriable);

        let not = Error::synthetic(400, server_code::QUOTA_EXHAUSTED, "something else");
        assert_eq!(not.retry_class(), RetryClass::Unretriable);
    }

    #[test]
    fn auth_failed_is_not_retriable() {
        let err = Error::synthetic(403, server_code::AUTH_FAILED, "test");
        assert!(!err.is_temporary());
        assert_eq!(err.retry_class(), RetryClass::Unretriable);
    }

    #[test]
    fn network_errors_are_retriable_regardless_of_action() {
        let err = Error::couldnt_connect("tcp refused");
        assert!(err.is_retriable_for(Action::PutRow));
        assert!(err.is_retriable_for(Action::GetRow));
    }

    #[test]
    fn operation_timeout_depends_on_idempotence() {
        let err = Error::operation_timeout("deadline exceeded");
        assert!(err.is_retriable_for(Action::BatchGetRow));
        assert!(!err.is_retriable_for(Action::BatchWriteRow));
    }
}
