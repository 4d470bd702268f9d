//! The range iterator (§4.7): a pull iterator over `GetRange` that chains
//! continuation requests, merges consumed capacity, and respects a user
//! row limit, keeping at most one `GetRange` in flight at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use tablestore_api::rpc::{CapacityUnit, GetRangeRequest, GetRangeResponse};
use tablestore_api::{Error, PrimaryKey, Request, Response, RetryPolicy, Row, ScanDirection, Tracker};

use crate::pipeline::Pipeline;

/// The criterion a range iterator scans: everything `GetRange` needs except
/// `limit`, which the iterator manages itself as the residual row budget.
#[derive(Debug, Clone)]
pub struct RangeQueryCriterion {
    pub table_name: String,
    pub direction: ScanDirection,
    pub columns_to_get: Vec<String>,
    pub start: PrimaryKey,
    pub end: PrimaryKey,
    pub limit: Option<i64>,
    pub time_range: Option<tablestore_api::TimeRange>,
    pub max_versions: Option<i64>,
    pub filter: Option<tablestore_api::ColumnCondition>,
}

const DEFAULT_WATERMARK: usize = 10_000;

/// Pulls rows from a table range one `move_next()` at a time, issuing a new
/// `GetRange` only once the buffer drains to half the watermark.
pub struct RangeIterator {
    pipeline: Arc<Pipeline>,
    table_name: String,
    direction: ScanDirection,
    columns_to_get: Vec<String>,
    end: PrimaryKey,
    time_range: Option<tablestore_api::TimeRange>,
    max_versions: Option<i64>,
    filter: Option<tablestore_api::ColumnCondition>,
    watermark: usize,

    next_start: Option<PrimaryKey>,
    residual_limit: Option<i64>,
    buffer: VecDeque<Row>,
    current: Option<Row>,
    consumed: CapacityUnit,
    terminal_error: Option<Error>,
    exhausted: bool,
}

impl RangeIterator {
    pub fn new(pipeline: Arc<Pipeline>, criterion: RangeQueryCriterion, watermark: usize) -> Self {
        RangeIterator {
            pipeline,
            table_name: criterion.table_name,
            direction: criterion.direction,
            columns_to_get: criterion.columns_to_get,
            end: criterion.end,
            time_range: criterion.time_range,
            max_versions: criterion.max_versions,
            filter: criterion.filter,
            watermark: watermark.max(1),
            next_start: Some(criterion.start),
            residual_limit: criterion.limit,
            buffer: VecDeque::new(),
            current: None,
            consumed: CapacityUnit::default(),
            terminal_error: None,
            exhausted: false,
        }
    }

    pub fn with_default_watermark(pipeline: Arc<Pipeline>, criterion: RangeQueryCriterion) -> Self {
        Self::new(pipeline, criterion, DEFAULT_WATERMARK)
    }

    /// `true` once `move_next` has positioned the iterator at a row that
    /// hasn't been consumed by an error or exhaustion.
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// The row the iterator is currently positioned at. Only meaningful
    /// after a `move_next()` that returned `Ok(true)`.
    pub fn get(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    pub fn consumed_capacity(&self) -> CapacityUnit {
        self.consumed
    }

    /// Advances to the next row, fetching another page if the buffer has
    /// drained and there's more to fetch. `Ok(true)` means a row is ready
    /// (via `get()`); `Ok(false)` means the stream is exhausted; `Err`
    /// means a terminal, unrecoverable error — no further rows will ever
    /// be delivered.
    pub async fn move_next(&mut self, tracker: Tracker, deadline: std::time::Instant, retry_policy: Box<dyn RetryPolicy>) -> Result<bool, Error> {
        if let Some(err) = &self.terminal_error {
            return Err(err.clone());
        }
        if self.buffer.len() * 2 < self.watermark && !self.exhausted {
            self.fetch_more(tracker, deadline, retry_policy).await?;
        }
        match self.buffer.pop_front() {
            Some(row) => {
                self.current = Some(row);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    async fn fetch_more(
        &mut self,
        tracker: Tracker,
        deadline: std::time::Instant,
        retry_policy: Box<dyn RetryPolicy>,
    ) -> Result<(), Error> {
        let Some(start) = self.next_start.clone() else { self.exhausted = true; return Ok(()) };
        let residual = match self.residual_limit {
            Some(n) if n <= 0 => {
                self.exhausted = true;
                return Ok(());
            }
            Some(n) => Some(n.min(self.watermark as i64)),
            None => Some(self.watermark as i64),
        };

        let request = Request::GetRange(GetRangeRequest {
            table_name: self.table_name.clone(),
            direction: self.direction,
            columns_to_get: self.columns_to_get.clone(),
            start,
            end: self.end.clone(),
            limit: residual,
            time_range: self.time_range,
            max_versions: self.max_versions,
            filter: self.filter.clone(),
        });

        let response = match self.pipeline.call(request, tracker, deadline, retry_policy).await {
            Ok(Response::GetRange(r)) => r,
            Ok(_) => return Err(Error::corrupted_response("GetRange call returned the wrong response shape")),
            Err(err) => {
                self.terminal_error = Some(err.clone());
                return Err(err);
            }
        };

        self.apply(response);
        Ok(())
    }

    fn apply(&mut self, response: GetRangeResponse) {
        if let Some(n) = &mut self.residual_limit {
            *n -= response.rows.len() as i64;
        }
        self.consumed += response.consumed;
        self.buffer.extend(response.rows);
        self.next_start = response.next_start;
        if self.next_start.is_none() || matches!(self.residual_limit, Some(n) if n <= 0) {
            self.next_start = None;
            self.exhausted = true;
        }
    }
}
