//! The actor pool (§4.8): a fixed number of single-threaded FIFO executors
//! that the write aggregator uses to serialize batch assembly for a given
//! trace. A job posted to the same actor always runs after every job
//! already queued there, and never concurrently with another job on that
//! same actor — jobs on different actors run independently.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Matches the original SDK's default actor count (`sDefaultActors`).
pub const DEFAULT_ACTOR_COUNT: usize = 32;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Actor {
    sender: mpsc::UnboundedSender<Job>,
    _worker: JoinHandle<()>,
}

/// A pool of actors indexed `0..actor_count`. `Tracker::actor_index` picks
/// which actor a given trace routes to.
pub struct ActorPool {
    actors: Vec<Actor>,
}

impl ActorPool {
    pub fn new(actor_count: usize) -> Self {
        assert!(actor_count > 0, "actor pool must have at least one actor");
        let actors = (0..actor_count)
            .map(|_| {
                let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
                let worker = tokio::spawn(async move {
                    while let Some(job) = receiver.recv().await {
                        job();
                    }
                });
                Actor { sender, _worker: worker }
            })
            .collect();
        ActorPool { actors }
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Enqueue `job` on the given actor. Jobs on one actor run strictly in
    /// the order they were posted.
    pub fn post(&self, actor_index: usize, job: Job) {
        let actor = &self.actors[actor_index % self.actors.len()];
        // The receiver only stops when the pool itself is dropped, so a send
        // failure here would mean the pool has already shut down; drop the
        // job rather than panic, matching the queue-owner's lifetime.
        let _ = actor.sender.send(job);
    }
}

impl Default for ActorPool {
    fn default() -> Self {
        ActorPool::new(DEFAULT_ACTOR_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn jobs_on_one_actor_run_in_order() {
        let pool = ActorPool::new(4);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = order.clone();
            pool.post(1, Box::new(move || order.lock().unwrap().push(i)));
        }
        // Give the single-threaded actor time to drain the queue.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn actor_index_wraps_modulo_pool_size() {
        let pool = ActorPool::new(2);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        pool.post(5, Box::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
