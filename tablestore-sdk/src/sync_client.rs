//! The sync façade (§4.6): a blocking wrapper sharing the same pipeline the
//! async client drives. Each call spawns the async call onto a runtime,
//! blocks the calling thread on a channel, and returns once the result
//! arrives — no separate code path, just a different way of waiting for it.

use std::sync::Arc;
use std::time::Instant;

use tablestore_api::{Error, Request, Response, RetryPolicy, Tracker};

use crate::pipeline::Pipeline;

pub struct SyncClient {
    pipeline: Arc<Pipeline>,
    runtime: tokio::runtime::Handle,
}

impl SyncClient {
    pub fn new(pipeline: Arc<Pipeline>, runtime: tokio::runtime::Handle) -> Self {
        SyncClient { pipeline, runtime }
    }

    /// Blocks the calling thread until the call completes or the deadline's
    /// retry budget is exhausted. Must not be called from within the async
    /// runtime's own worker threads — it would deadlock waiting on work it
    /// can't make progress on.
    pub fn call(
        &self,
        request: Request,
        tracker: Tracker,
        deadline: Instant,
        retry_policy: Box<dyn RetryPolicy>,
    ) -> Result<Response, Error> {
        let (tx, rx) = std::sync::mpsc::channel();
        let pipeline = self.pipeline.clone();
        self.runtime.spawn(async move {
            let result = pipeline.call(request, tracker, deadline, retry_policy).await;
            let _ = tx.send(result);
        });
        rx.recv()
            .expect("the spawned call always sends exactly one result before finishing")
    }
}
