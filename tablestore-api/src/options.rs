//! Client-wide configuration (§3/§5): where the Service lives, how calls
//! authenticate, and the defaults every call starts from unless a
//! per-call override replaces them.

use std::time::Duration;

use crate::action::Action;
use crate::error::Error;
use crate::traits::RetryPolicy;

/// Where the Service lives: the endpoint URL plus the instance name that
/// scopes every table name under it (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub instance_name: String,
}

/// Signing material (§6): an access key pair, plus an optional STS security
/// token carried as an extra signed header when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: Option<String>,
}

/// A retry policy that never retries. The default when a caller builds
/// `ClientOptions` without naming one; real deployments are expected to
/// supply a deadline- or counting-based policy.
#[derive(Debug, Clone, Copy, Default)]
struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _action: Action, _attempt: u32, _error: &Error) -> bool {
        false
    }

    fn next_pause(&mut self, _attempt: u32) -> Duration {
        Duration::ZERO
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(NoRetryPolicy)
    }
}

/// Client-wide configuration a call starts from before any per-call
/// override is applied (§3).
pub struct ClientOptions {
    pub endpoint: Endpoint,
    pub credential: Credential,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry_policy: Box<dyn RetryPolicy>,
    /// `None` means the SDK picks its own default actor-pool size.
    pub actor_count: Option<usize>,
    /// Seeds the PRNG the retry policy uses for jitter. `None` means the
    /// builder draws one from OS entropy at build time, so two clients
    /// built without an explicit seed do not share retry timing.
    pub random_seed: u64,
    /// Upper bound on concurrent in-flight requests (§5 "Shared resources:
    /// Pool"). An acquire that can't be satisfied before the call's
    /// deadline surfaces `NoAvailableConnection`.
    pub max_connections: usize,
}

impl ClientOptions {
    pub fn builder(endpoint: Endpoint, credential: Credential) -> ClientOptionsBuilder {
        ClientOptionsBuilder {
            endpoint,
            credential,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            retry_policy: None,
            actor_count: None,
            random_seed: None,
            max_connections: 5000,
        }
    }
}

pub struct ClientOptionsBuilder {
    endpoint: Endpoint,
    credential: Credential,
    connect_timeout: Duration,
    request_timeout: Duration,
    retry_policy: Option<Box<dyn RetryPolicy>>,
    actor_count: Option<usize>,
    random_seed: Option<u64>,
    max_connections: usize,
}

impl ClientOptionsBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn actor_count(mut self, count: usize) -> Self {
        self.actor_count = Some(count);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn build(self) -> Result<ClientOptions, Error> {
        if self.endpoint.url.is_empty() {
            return Err(Error::parameter_invalid("endpoint.url", "must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(Error::parameter_invalid("max_connections", "must be at least 1"));
        }
        if self.endpoint.instance_name.is_empty() {
            return Err(Error::parameter_invalid(
                "endpoint.instance_name",
                "must not be empty",
            ));
        }
        if self.credential.access_key_id.is_empty() {
            return Err(Error::parameter_invalid(
                "credential.access_key_id",
                "must not be empty",
            ));
        }
        if self.credential.access_key_secret.is_empty() {
            return Err(Error::parameter_invalid(
                "credential.access_key_secret",
                "must not be empty",
            ));
        }
        if let Some(count) = self.actor_count {
            if count == 0 {
                return Err(Error::parameter_invalid("actor_count", "must be at least 1"));
            }
        }
        Ok(ClientOptions {
            endpoint: self.endpoint,
            credential: self.credential,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            retry_policy: self
                .retry_policy
                .unwrap_or_else(|| Box::new(NoRetryPolicy)),
            actor_count: self.actor_count,
            random_seed: self.random_seed.unwrap_or_else(random_seed_from_entropy),
            max_connections: self.max_connections,
        })
    }
}

fn random_seed_from_entropy() -> u64 {
    use rand::RngCore;
    rand::rngs::OsRng.next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            url: "https://example.cn-hangzhou.ots.aliyuncs.com".to_string(),
            instance_name: "example".to_string(),
        }
    }

    fn credential() -> Credential {
        Credential {
            access_key_id: "id".to_string(),
            access_key_secret: "secret".to_string(),
            security_token: None,
        }
    }

    #[test]
    fn rejects_empty_instance_name() {
        let mut ep = endpoint();
        ep.instance_name.clear();
        let err = ClientOptions::builder(ep, credential()).build().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn rejects_zero_actor_count() {
        let err = ClientOptions::builder(endpoint(), credential())
            .actor_count(0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn default_retry_policy_never_retries() {
        let opts = ClientOptions::builder(endpoint(), credential()).build().unwrap();
        let err = Error::couldnt_connect("refused");
        assert!(!opts.retry_policy.should_retry(Action::GetRow, 0, &err));
    }

    #[test]
    fn builds_with_explicit_seed_deterministically() {
        let opts = ClientOptions::builder(endpoint(), credential())
            .random_seed(42)
            .build()
            .unwrap();
        assert_eq!(opts.random_seed, 42);
    }
}
