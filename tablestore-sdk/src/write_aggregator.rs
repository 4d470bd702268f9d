//! The write aggregator (§4.8): coalesces many single-row writes into
//! `BatchWriteRow` calls on a background task, backing off and re-queuing
//! under load via an AIMD nap/concurrency schedule, deduplicating
//! (table, primary-key) collisions within one batch the way the original
//! writer does — with an Adler-32 rolling hash over the table name and key
//! values, auto-increment placeholders distinguished by a running ordinal
//! so repeated placeholder keys never collide with each other.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use tablestore_api::rpc::{BatchWriteRowItem, BatchWriteRowRequest, CapacityUnit};
use tablestore_api::{validate, Action, Error, PrimaryKeyValue, Request, Response, RetryPolicy, Row, Tracker};

use crate::actor::ActorPool;
use crate::pipeline::Pipeline;

/// Matches the original writer's `sConcurrencyIncStep`.
const CONCURRENCY_INC_STEP: usize = 1;

#[derive(Debug, Clone)]
pub struct WriteAggregatorOptions {
    pub max_concurrency: usize,
    pub max_batch_size: usize,
    pub regular_nap: Duration,
    pub max_nap: Duration,
    pub nap_shrink_step: Duration,
    pub request_timeout: Duration,
}

impl Default for WriteAggregatorOptions {
    fn default() -> Self {
        WriteAggregatorOptions {
            max_concurrency: 10,
            max_batch_size: 100,
            regular_nap: Duration::from_millis(10),
            max_nap: Duration::from_millis(1000),
            nap_shrink_step: Duration::from_millis(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

type WriteCallback = Box<dyn FnOnce(Result<(Option<Row>, CapacityUnit), Error>) + Send>;

struct WaitingItem {
    item: BatchWriteRowItem,
    callback: WriteCallback,
}

struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    fn new() -> Self {
        Adler32 { a: 1, b: 0 }
    }

    fn update_byte(&mut self, byte: u8) {
        self.a = (self.a + byte as u32) % 65521;
        self.b = (self.b + self.a) % 65521;
    }

    fn update_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update_byte(byte);
        }
    }

    fn update_u64(&mut self, x: u64) {
        self.update_bytes(&x.to_be_bytes());
    }

    fn get(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

const TAG_AUTO_INCR: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BINARY: u8 = 4;

/// Hashes `table` plus every primary-key column's *value* (not its name,
/// mirroring the original: two items against different tables with the
/// same key shape never collide, and the key schema is fixed per table so
/// omitting the names loses nothing). `auto_incr_ordinal` is threaded
/// across the whole batch being built, not reset per item, so repeated
/// `AutoIncrPlaceholder` values never collide with one another.
fn dedup_hash(item: &BatchWriteRowItem, auto_incr_ordinal: &mut u64) -> u32 {
    let mut adl = Adler32::new();
    let table = item.table_name();
    adl.update_u64(table.len() as u64);
    adl.update_bytes(table.as_bytes());
    for (_name, value) in item.primary_key() {
        match value {
            PrimaryKeyValue::AutoIncrPlaceholder => {
                adl.update_byte(TAG_AUTO_INCR);
                adl.update_u64(*auto_incr_ordinal);
                *auto_incr_ordinal += 1;
            }
            PrimaryKeyValue::Integer(i) => {
                adl.update_byte(TAG_INTEGER);
                adl.update_u64(*i as u64);
            }
            PrimaryKeyValue::String(s) => {
                adl.update_byte(TAG_STRING);
                adl.update_u64(s.len() as u64);
                adl.update_bytes(s);
            }
            PrimaryKeyValue::Binary(b) => {
                adl.update_byte(TAG_BINARY);
                adl.update_u64(b.len() as u64);
                adl.update_bytes(b);
            }
            PrimaryKeyValue::None | PrimaryKeyValue::InfMin | PrimaryKeyValue::InfMax => {
                unreachable!("a validated row's primary key never carries a boundary marker")
            }
        }
    }
    adl.get()
}

/// Pulls up to `max_batch_size` items off the front of `waiting`, stopping
/// as soon as the next item's (table, primary-key) hash collides with one
/// already in the batch — exactly like the original, which would rather
/// send a short batch than risk two writes to the same row racing inside
/// one `BatchWriteRow` call.
fn build_batch(waiting: &mut VecDeque<WaitingItem>, max_batch_size: usize) -> Vec<WaitingItem> {
    let mut batch = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut auto_incr_ordinal: u64 = 0;
    while batch.len() < max_batch_size {
        let Some(front) = waiting.front() else { break };
        let hash = dedup_hash(&front.item, &mut auto_incr_ordinal);
        if seen.contains(&hash) {
            break;
        }
        seen.insert(hash);
        batch.push(waiting.pop_front().expect("front already checked Some"));
    }
    batch
}

fn validate_item(item: &BatchWriteRowItem) -> Result<(), Error> {
    match item {
        BatchWriteRowItem::Put(r) => validate::primary_key(&r.row.primary_key, true),
        BatchWriteRowItem::Update(r) => validate::primary_key(&r.primary_key, false),
        BatchWriteRowItem::Delete(r) => validate::primary_key(&r.primary_key, false),
    }
}

struct Inner {
    pipeline: Arc<Pipeline>,
    actors: Arc<ActorPool>,
    options: WriteAggregatorOptions,
    waiting: Mutex<VecDeque<WaitingItem>>,
    wake: Notify,
    exit: AtomicBool,
    ongoing: AtomicUsize,
    should_back_off: AtomicBool,
    actor_selector: AtomicUsize,
    next_batch_id: AtomicU64,
}

impl Inner {
    fn dispatch_callback(&self, callback: WriteCallback, result: Result<(Option<Row>, CapacityUnit), Error>) {
        let actor = self.actor_selector.fetch_add(1, Ordering::AcqRel) % self.actors.actor_count();
        self.actors.post(actor, Box::new(move || callback(result)));
    }

    fn requeue_front(&self, items: Vec<WaitingItem>) {
        let mut waiting = self.waiting.lock().unwrap();
        for item in items.into_iter().rev() {
            waiting.push_front(item);
        }
    }
}

/// Background coalescer for `PutRow`/`UpdateRow`/`DeleteRow`, grouping them
/// into `BatchWriteRow` calls. Must be explicitly shut down with
/// [`WriteAggregator::shutdown`] before it's dropped, since Rust has no
/// async destructors to run the original's join-then-drain sequence; the
/// synchronous `Drop` impl only signals the background task to stop.
pub struct WriteAggregator {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

impl WriteAggregator {
    pub fn new(
        pipeline: Arc<Pipeline>,
        actors: Arc<ActorPool>,
        options: WriteAggregatorOptions,
        retry_policy: Box<dyn RetryPolicy>,
        random_seed: u64,
    ) -> Self {
        let inner = Arc::new(Inner {
            pipeline,
            actors,
            options,
            waiting: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            exit: AtomicBool::new(false),
            ongoing: AtomicUsize::new(0),
            should_back_off: AtomicBool::new(false),
            actor_selector: AtomicUsize::new(0),
            next_batch_id: AtomicU64::new(0),
        });
        let worker_inner = inner.clone();
        let worker = tokio::spawn(async move {
            aggregator_loop(worker_inner, retry_policy, random_seed).await;
        });
        WriteAggregator { inner, worker: Some(worker) }
    }

    /// Validates and enqueues one write. On validation failure, the error
    /// is delivered to `callback` asynchronously on an actor rather than
    /// returned directly, matching every other enqueue outcome.
    pub fn enqueue(&self, item: BatchWriteRowItem, callback: WriteCallback) {
        if let Err(err) = validate_item(&item) {
            self.inner.dispatch_callback(callback, Err(err));
            return;
        }
        self.inner.waiting.lock().unwrap().push_back(WaitingItem { item, callback });
        self.inner.wake.notify_one();
    }

    /// Wakes the aggregator immediately instead of waiting out its nap.
    pub fn flush(&self) {
        self.inner.wake.notify_one();
    }

    /// Signals shutdown, waits for the background task to exit, then polls
    /// every 20ms (matching the original destructor) until every in-flight
    /// batch has completed.
    pub async fn shutdown(mut self) {
        self.inner.exit.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        while self.inner.ongoing.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for WriteAggregator {
    fn drop(&mut self) {
        self.inner.exit.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();
    }
}

fn next_nap_and_concurrency(
    back_off: bool,
    current_concurrency: usize,
    current_nap: Duration,
    options: &WriteAggregatorOptions,
) -> (Duration, usize) {
    if !back_off {
        if current_nap.saturating_sub(options.nap_shrink_step) >= options.regular_nap {
            (current_nap - options.nap_shrink_step, 1)
        } else {
            (options.regular_nap, (current_concurrency + CONCURRENCY_INC_STEP).min(options.max_concurrency))
        }
    } else if current_concurrency > 1 {
        (current_nap, current_concurrency / 2)
    } else {
        (current_nap.saturating_mul(2).min(options.max_nap), 1)
    }
}

async fn take_some_nap(inner: &Inner, upper: Duration, rng: &mut StdRng) {
    let upper_us = upper.as_micros().max(1) as u64;
    let low_us = upper_us / 2 + 1;
    let high_us = upper_us + 1;
    let napped_us = rng.random_range(low_us..high_us.max(low_us + 1));
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_micros(napped_us)) => {}
        _ = inner.wake.notified() => {}
    }
}

async fn aggregator_loop(inner: Arc<Inner>, retry_policy: Box<dyn RetryPolicy>, random_seed: u64) {
    let mut rng = StdRng::seed_from_u64(random_seed);
    let mut nap = inner.options.regular_nap;
    let mut concurrency = inner.options.max_concurrency;
    loop {
        take_some_nap(&inner, nap, &mut rng).await;
        if inner.exit.load(Ordering::Acquire) {
            break;
        }
        let back_off = inner.should_back_off.swap(false, Ordering::AcqRel);
        let (next_nap, next_concurrency) = next_nap_and_concurrency(back_off, concurrency, nap, &inner.options);
        nap = next_nap;
        concurrency = next_concurrency;

        loop {
            if inner.ongoing.load(Ordering::Acquire) >= concurrency {
                break;
            }
            let batch = {
                let mut waiting = inner.waiting.lock().unwrap();
                if waiting.is_empty() {
                    break;
                }
                build_batch(&mut waiting, inner.options.max_batch_size)
            };
            if batch.is_empty() {
                break;
            }
            inner.ongoing.fetch_add(1, Ordering::AcqRel);
            let inner = inner.clone();
            let retry_policy = retry_policy.clone_policy();
            tokio::spawn(async move {
                dispatch_batch(inner, batch, retry_policy).await;
            });
        }
    }
}

async fn dispatch_batch(inner: Arc<Inner>, batch: Vec<WaitingItem>, retry_policy: Box<dyn RetryPolicy>) {
    let batch_id = inner.next_batch_id.fetch_add(1, Ordering::Relaxed);
    let tracker = Tracker::new(format!("write-aggregator-{batch_id}"));
    let deadline = Instant::now() + inner.options.request_timeout;

    let (items, callbacks): (Vec<BatchWriteRowItem>, Vec<WriteCallback>) =
        batch.into_iter().map(|w| (w.item, w.callback)).unzip();
    let items_for_requeue = items.clone();
    let request = Request::BatchWriteRow(BatchWriteRowRequest { items });

    let outcome = inner.pipeline.call(request, tracker, deadline, retry_policy).await;
    match outcome {
        Err(err) => {
            if err.is_retriable_for(Action::BatchWriteRow) {
                inner.should_back_off.store(true, Ordering::Release);
                let requeued: Vec<WaitingItem> = items_for_requeue
                    .into_iter()
                    .zip(callbacks)
                    .map(|(item, callback)| WaitingItem { item, callback })
                    .collect();
                inner.requeue_front(requeued);
            } else {
                for callback in callbacks {
                    inner.dispatch_callback(callback, Err(err.clone()));
                }
            }
        }
        Ok(Response::BatchWriteRow(resp)) => {
            let mut to_requeue = Vec::new();
            for ((item, callback), result) in
                items_for_requeue.into_iter().zip(callbacks).zip(resp.results)
            {
                match result.result {
                    Ok(ok) => inner.dispatch_callback(callback, Ok(ok)),
                    Err(err) if err.is_retriable_for(Action::BatchWriteRow) => {
                        to_requeue.push(WaitingItem { item, callback });
                    }
                    Err(err) => inner.dispatch_callback(callback, Err(err)),
                }
            }
            if !to_requeue.is_empty() {
                inner.should_back_off.store(true, Ordering::Release);
                inner.requeue_front(to_requeue);
            }
        }
        Ok(_) => unreachable!("BatchWriteRow always decodes to Response::BatchWriteRow"),
    }

    inner.ongoing.fetch_sub(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore_api::rpc::{DeleteRowRequest, PutRowRequest};
    use tablestore_api::{Condition, PrimaryKeyValue, Row};

    fn put(table: &str, pk: i64) -> BatchWriteRowItem {
        BatchWriteRowItem::Put(PutRowRequest {
            table_name: table.to_string(),
            row: Row {
                primary_key: vec![("pk".into(), PrimaryKeyValue::Integer(pk))],
                attributes: Vec::new(),
            },
            condition: Condition::ignore(),
            return_row: false,
        })
    }

    fn waiting(item: BatchWriteRowItem) -> WaitingItem {
        WaitingItem { item, callback: Box::new(|_| {}) }
    }

    #[test]
    fn build_batch_stops_at_first_collision() {
        let mut queue = VecDeque::new();
        queue.push_back(waiting(put("t", 1)));
        queue.push_back(waiting(put("t", 2)));
        queue.push_back(waiting(put("t", 1))); // collides with the first item
        queue.push_back(waiting(put("t", 3)));

        let batch = build_batch(&mut queue, 10);
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn build_batch_respects_max_size() {
        let mut queue = VecDeque::new();
        for i in 0..5 {
            queue.push_back(waiting(put("t", i)));
        }
        let batch = build_batch(&mut queue, 3);
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn distinct_tables_with_same_key_do_not_collide() {
        let mut queue = VecDeque::new();
        queue.push_back(waiting(put("a", 1)));
        queue.push_back(waiting(put("b", 1)));
        let batch = build_batch(&mut queue, 10);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn repeated_auto_incr_placeholders_do_not_collide() {
        let placeholder_item = |table: &str| {
            BatchWriteRowItem::Put(PutRowRequest {
                table_name: table.to_string(),
                row: Row {
                    primary_key: vec![("pk".into(), PrimaryKeyValue::AutoIncrPlaceholder)],
                    attributes: Vec::new(),
                },
                condition: Condition::ignore(),
                return_row: false,
            })
        };
        let mut queue = VecDeque::new();
        queue.push_back(waiting(placeholder_item("t")));
        queue.push_back(waiting(placeholder_item("t")));
        queue.push_back(waiting(placeholder_item("t")));
        let batch = build_batch(&mut queue, 10);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn aimd_ramps_concurrency_only_after_nap_reaches_floor() {
        let options = WriteAggregatorOptions {
            max_concurrency: 8,
            regular_nap: Duration::from_millis(10),
            max_nap: Duration::from_millis(100),
            nap_shrink_step: Duration::from_millis(4),
            ..WriteAggregatorOptions::default()
        };
        // Elevated nap: concurrency pinned at 1 while the nap shrinks back down.
        let (nap, concurrency) = next_nap_and_concurrency(false, 1, Duration::from_millis(18), &options);
        assert_eq!(nap, Duration::from_millis(14));
        assert_eq!(concurrency, 1);

        // Once nap is at the floor, concurrency ramps by the fixed step.
        let (nap, concurrency) = next_nap_and_concurrency(false, 3, Duration::from_millis(10), &options);
        assert_eq!(nap, options.regular_nap);
        assert_eq!(concurrency, 4);
    }

    #[test]
    fn aimd_backs_off_by_halving_then_doubling_nap() {
        let options = WriteAggregatorOptions::default();
        let (nap, concurrency) = next_nap_and_concurrency(true, 8, options.regular_nap, &options);
        assert_eq!(nap, options.regular_nap);
        assert_eq!(concurrency, 4);

        let (nap, concurrency) = next_nap_and_concurrency(true, 1, options.regular_nap, &options);
        assert_eq!(nap, options.regular_nap * 2);
        assert_eq!(concurrency, 1);
    }

    #[test]
    fn validate_item_rejects_empty_primary_key() {
        let item = BatchWriteRowItem::Delete(DeleteRowRequest {
            table_name: "t".into(),
            primary_key: Vec::new(),
            condition: Condition::ignore(),
        });
        assert!(validate_item(&item).is_err());
    }
}
