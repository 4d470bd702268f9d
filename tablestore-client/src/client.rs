//! The public entry point (§3/§4.6): `ClientBuilder` assembles one
//! `Pipeline` out of the concrete transport, codec and timer, then `Client`
//! exposes one callback-taking method per action plus a future adapter,
//! mirroring the original SDK's `AsyncClient` shape — a generic dispatch
//! core templated per action there, a generic `call` here with a thin
//! typed wrapper per action.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tablestore_api::rpc::{
    BatchGetRowRequest, BatchGetRowResponse, BatchWriteRowRequest, BatchWriteRowResponse,
    ComputeSplitPointsBySizeRequest, ComputeSplitPointsBySizeResponse, CreateTableRequest,
    CreateTableResponse, DeleteRowRequest, DeleteRowResponse, DeleteTableRequest, DeleteTableResponse,
    DescribeTableRequest, DescribeTableResponse, GetRangeRequest, GetRangeResponse, GetRowRequest,
    GetRowResponse, ListTableRequest, ListTableResponse, PutRowRequest, PutRowResponse,
    UpdateRowRequest, UpdateRowResponse, UpdateTableRequest, UpdateTableResponse,
};
use tablestore_api::rpc::BatchWriteRowItem;
use tablestore_api::traits::{Codec, RpcTransport};
use tablestore_api::{validate, ClientOptions, Credential, Endpoint, Error, Request, Response, RetryPolicy, Tracker};
use tablestore_sdk::{
    ActorPool, ConnectionPool, Pipeline, RangeIterator, RangeQueryCriterion, SyncClient, TokioTimerService,
    WriteAggregator, WriteAggregatorOptions, DEFAULT_ACTOR_COUNT,
};

use crate::transport::HttpTransport;

#[cfg(feature = "reqwest")]
fn default_http_client(connect_timeout: Duration) -> Result<Arc<dyn tablestore_http::HttpClient>, Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| {
            Error::parameter_invalid("http_client", format!("failed to build the default reqwest client: {e}"))
        })?;
    Ok(Arc::new(tablestore_http::ReqwestHttpClient::new(client)))
}

#[cfg(not(feature = "reqwest"))]
fn default_http_client(_connect_timeout: Duration) -> Result<Arc<dyn tablestore_http::HttpClient>, Error> {
    Err(Error::parameter_invalid(
        "http_client",
        "must be set explicitly via ClientBuilder::http_client when the `reqwest` feature is disabled",
    ))
}

/// Builds a [`Client`]: validates `Endpoint`/`Credential` (§4.2) and applies
/// `ClientOptions` defaults (§3) before wiring up the transport, codec,
/// timer and pipeline.
pub struct ClientBuilder {
    options: tablestore_api::ClientOptionsBuilder,
    http_client: Option<Arc<dyn tablestore_http::HttpClient>>,
    runtime: Option<tokio::runtime::Handle>,
}

impl ClientBuilder {
    pub fn new(endpoint: Endpoint, credential: Credential) -> Self {
        ClientBuilder {
            options: ClientOptions::builder(endpoint, credential),
            http_client: None,
            runtime: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.connect_timeout(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.request_timeout(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.options = self.options.retry_policy(policy);
        self
    }

    pub fn actor_count(mut self, count: usize) -> Self {
        self.options = self.options.actor_count(count);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.options = self.options.random_seed(seed);
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.options = self.options.max_connections(max);
        self
    }

    /// Supplies the transport's HTTP client. Defaults to a `reqwest` client
    /// built with `connect_timeout` when the `reqwest` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn tablestore_http::HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// The runtime calls are spawned on. Defaults to `Handle::current()`, so
    /// this must be called explicitly when building outside a Tokio context.
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<Client, Error> {
        let options = self.options.build()?;
        let runtime = self.runtime.unwrap_or_else(tokio::runtime::Handle::current);

        let http_client = match self.http_client {
            Some(client) => client,
            None => default_http_client(options.connect_timeout)?,
        };

        let pool = Arc::new(ConnectionPool::new(options.max_connections));
        let transport: Arc<dyn RpcTransport> = Arc::new(HttpTransport::new(
            http_client,
            options.endpoint,
            options.credential,
            pool,
            runtime.clone(),
        ));
        let codec: Arc<dyn Codec> = Arc::new(tablestore_proto::PlainBufferCodec);
        let timer = Arc::new(TokioTimerService::new(runtime.clone()));
        let pipeline = Arc::new(Pipeline::new(codec, transport, timer));
        let actors = Arc::new(ActorPool::new(options.actor_count.unwrap_or(DEFAULT_ACTOR_COUNT)));

        Ok(Client {
            pipeline,
            actors,
            runtime,
            retry_policy: Mutex::new(options.retry_policy),
            request_timeout: options.request_timeout,
            random_seed: options.random_seed,
        })
    }
}

/// The async client (§4.6): one callback-taking method per action, backed
/// by the shared pipeline. `call_async` adapts the same primitive into a
/// `Future` for callers who'd rather `.await` it.
pub struct Client {
    pipeline: Arc<Pipeline>,
    actors: Arc<ActorPool>,
    runtime: tokio::runtime::Handle,
    retry_policy: Mutex<Box<dyn RetryPolicy>>,
    request_timeout: Duration,
    random_seed: u64,
}

/// §4.2: every rule a request's fields are subject to, run once before the
/// request ever reaches the pipeline. Returns the first violation found.
fn validate_request(request: &Request) -> Result<(), Error> {
    match request {
        Request::CreateTable(r) => {
            validate::table_options(&r.table_options, true)?;
            validate::shard_split_points(&r.shard_split_points, &r.table_meta.schema)?;
        }
        Request::ListTable(_) | Request::DescribeTable(_) | Request::DeleteTable(_) => {}
        Request::UpdateTable(r) => validate::table_options(&r.table_options, false)?,
        Request::GetRow(r) => {
            validate::primary_key(&r.primary_key, false)?;
            if let Some(time_range) = &r.time_range {
                validate::time_range(time_range)?;
            }
        }
        Request::PutRow(r) => validate::primary_key(&r.row.primary_key, true)?,
        Request::UpdateRow(r) => {
            validate::primary_key(&r.primary_key, false)?;
            for update in &r.updates {
                validate::row_update(update)?;
            }
        }
        Request::DeleteRow(r) => validate::primary_key(&r.primary_key, false)?,
        Request::BatchGetRow(r) => {
            for table_get in &r.table_gets {
                for primary_key in &table_get.primary_keys {
                    validate::primary_key(primary_key, false)?;
                }
                if let Some(time_range) = &table_get.time_range {
                    validate::time_range(time_range)?;
                }
            }
        }
        Request::BatchWriteRow(r) => {
            for item in &r.items {
                validate_batch_write_item(item)?;
            }
        }
        Request::GetRange(r) => {
            validate::primary_key(&r.start, false)?;
            validate::primary_key(&r.end, false)?;
            if let Some(time_range) = &r.time_range {
                validate::time_range(time_range)?;
            }
        }
        Request::ComputeSplitPointsBySize(_) => {}
    }
    Ok(())
}

fn validate_batch_write_item(item: &BatchWriteRowItem) -> Result<(), Error> {
    match item {
        BatchWriteRowItem::Put(r) => validate::primary_key(&r.row.primary_key, true),
        BatchWriteRowItem::Update(r) => {
            validate::primary_key(&r.primary_key, false)?;
            for update in &r.updates {
                validate::row_update(update)?;
            }
            Ok(())
        }
        BatchWriteRowItem::Delete(r) => validate::primary_key(&r.primary_key, false),
    }
}

macro_rules! action_method {
    ($name:ident, $req:ty, $resp:ty, $variant:ident) => {
        pub fn $name(&self, request: $req, on_done: Box<dyn FnOnce(Result<$resp, Error>) + Send>) {
            self.call(
                Request::$variant(request),
                Box::new(move |result| {
                    on_done(result.map(|response| match response {
                        Response::$variant(r) => r,
                        _ => unreachable!(concat!(
                            stringify!($variant),
                            " always decodes to the matching response variant"
                        )),
                    }))
                }),
            );
        }
    };
}

impl Client {
    /// The untyped primitive every typed method (and `call_async`) builds
    /// on: a fresh trace id, a deadline `request_timeout` out, and an
    /// independently-seeded clone of the configured retry policy.
    pub fn call(&self, request: Request, on_done: Box<dyn FnOnce(Result<Response, Error>) + Send>) {
        if let Err(err) = validate_request(&request) {
            on_done(Err(err));
            return;
        }
        let tracker = Tracker::random();
        let deadline = Instant::now() + self.request_timeout;
        let retry_policy = self.retry_policy.lock().unwrap().clone_policy();
        let pipeline = self.pipeline.clone();
        self.runtime.spawn(async move {
            let result = pipeline.call(request, tracker, deadline, retry_policy).await;
            on_done(result);
        });
    }

    /// Adapts `call` into a `Future`, for callers in idiomatic async code
    /// who don't want to name a callback.
    pub async fn call_async(&self, request: Request) -> Result<Response, Error> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.call(
            request,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::corrupted_response("call task dropped the response channel")),
        }
    }

    action_method!(create_table, CreateTableRequest, CreateTableResponse, CreateTable);
    action_method!(list_table, ListTableRequest, ListTableResponse, ListTable);
    action_method!(describe_table, DescribeTableRequest, DescribeTableResponse, DescribeTable);
    action_method!(delete_table, DeleteTableRequest, DeleteTableResponse, DeleteTable);
    action_method!(update_table, UpdateTableRequest, UpdateTableResponse, UpdateTable);
    action_method!(get_row, GetRowRequest, GetRowResponse, GetRow);
    action_method!(put_row, PutRowRequest, PutRowResponse, PutRow);
    action_method!(update_row, UpdateRowRequest, UpdateRowResponse, UpdateRow);
    action_method!(delete_row, DeleteRowRequest, DeleteRowResponse, DeleteRow);
    action_method!(batch_get_row, BatchGetRowRequest, BatchGetRowResponse, BatchGetRow);
    action_method!(batch_write_row, BatchWriteRowRequest, BatchWriteRowResponse, BatchWriteRow);
    action_method!(get_range, GetRangeRequest, GetRangeResponse, GetRange);
    action_method!(
        compute_split_points_by_size,
        ComputeSplitPointsBySizeRequest,
        ComputeSplitPointsBySizeResponse,
        ComputeSplitPointsBySize
    );

    /// A blocking façade sharing this client's pipeline (§4.6). Must not be
    /// called from inside this client's own runtime's worker threads.
    pub fn sync_client(&self) -> SyncClient {
        SyncClient::new(self.pipeline.clone(), self.runtime.clone())
    }

    /// A pull iterator over one `GetRange` scan (§4.7).
    pub fn range_iterator(&self, criterion: RangeQueryCriterion) -> RangeIterator {
        RangeIterator::with_default_watermark(self.pipeline.clone(), criterion)
    }

    /// A background write coalescer sharing this client's pipeline and
    /// actor pool (§4.8). Must be shut down with `WriteAggregator::shutdown`
    /// before it's dropped.
    pub fn write_aggregator(&self, options: WriteAggregatorOptions) -> WriteAggregator {
        let retry_policy = self.retry_policy.lock().unwrap().clone_policy();
        WriteAggregator::new(self.pipeline.clone(), self.actors.clone(), options, retry_policy, self.random_seed)
    }
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

    #[tokio::test]
    async fn build_rejects_invalid_options_before_touching_the_network() {
        let mut bad_endpoint = endpoint();
        bad_endpoint.instance_name.clear();
        let err = ClientBuilder::new(bad_endpoint, credential()).build().unwrap_err();
        assert_eq!(err.kind(), tablestore_api::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn build_succeeds_with_default_reqwest_client() {
        let client = ClientBuilder::new(endpoint(), credential()).build();
        assert!(client.is_ok());
    }
}
