//! End-to-end scenarios driven through a real `Client`: signing, the HTTP
//! transport, the pipeline and retry all run for real, only the network
//! socket is replaced by a scripted `HttpClient`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prost::Message;

use tablestore_api::rpc::{
    BatchWriteRowItem, DeleteRowRequest, GetRangeRequest, GetRowRequest, PutRowRequest, ScanDirection,
};
use tablestore_api::{Condition, Credential, Endpoint, Error, ErrorKind, PrimaryKeyValue, Request, Response, Row};
use tablestore_client::{Client, ClientBuilder, CountingPolicy, DeadlinePolicy, NonePolicy, RangeQueryCriterion};
use tablestore_http::{HttpClient, HttpError};

fn endpoint() -> Endpoint {
    Endpoint { url: "https://example.cn-hangzhou.ots.aliyuncs.com".to_string(), instance_name: "example".to_string() }
}

fn credential() -> Credential {
    Credential { access_key_id: "id".to_string(), access_key_secret: "secret".to_string(), security_token: None }
}

type ScriptedResult = Result<http::Response<Vec<u8>>, HttpError>;

/// Replays one scripted response per call, in order, recording every
/// request it was handed so assertions can inspect headers/body/URL later.
#[derive(Debug)]
struct ScriptedHttpClient {
    responses: Mutex<VecDeque<ScriptedResult>>,
    requests: Mutex<Vec<http::Request<Vec<u8>>>>,
}

impl ScriptedHttpClient {
    fn new(responses: Vec<ScriptedResult>) -> Arc<Self> {
        Arc::new(ScriptedHttpClient {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn take_requests(&self) -> Vec<http::Request<Vec<u8>>> {
        std::mem::take(&mut self.requests.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn send(&self, request: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>, HttpError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted HttpClient ran out of canned responses")
    }
}

fn ok_response(status: u16, request_id: &str, body: Vec<u8>) -> ScriptedResult {
    Ok(http::Response::builder()
        .status(status)
        .header("x-ots-requestid", request_id)
        .body(body)
        .unwrap())
}

fn error_response(status: u16, request_id: &str, code: &str, message: &str) -> ScriptedResult {
    let body = tablestore_proto::pb::ErrorPb { code: code.to_string(), message: message.to_string() }.encode_to_vec();
    ok_response(status, request_id, body)
}

fn list_table_response_body(table_names: Vec<&str>) -> Vec<u8> {
    tablestore_proto::pb::ListTableResponse { table_names: table_names.into_iter().map(String::from).collect() }
        .encode_to_vec()
}

/// This crate's row codec (`tablestore-proto::row_codec`, private to that
/// crate) length-prefixes a primary key as a `u32` column count followed by
/// per-column `(name, tagged value)` pairs; replicated here just enough to
/// build a single-integer-column continuation key for test fixtures.
fn encode_single_int_pk(name: &str, value: i64) -> Vec<u8> {
    const PK_TAG_INTEGER: u8 = 4;
    let mut buf = Vec::new();
    buf.extend_from_slice(&1u32.to_le_bytes());
    let name_bytes = name.as_bytes();
    buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(name_bytes);
    buf.push(PK_TAG_INTEGER);
    buf.extend_from_slice(&value.to_le_bytes());
    buf
}

/// Zero rows, in the row codec's own length-prefixed encoding (a `u32`
/// count of zero) rather than an empty byte string.
fn encode_zero_rows() -> Vec<u8> {
    0u32.to_le_bytes().to_vec()
}

/// One bare row (no attributes) with a single integer-column primary key,
/// in the row codec's own length-prefixed encoding.
fn encode_one_row_with_int_pk(name: &str, value: i64) -> Vec<u8> {
    let mut row = encode_single_int_pk(name, value);
    row.extend_from_slice(&0u32.to_le_bytes()); // zero attributes
    let mut buf = 1u32.to_le_bytes().to_vec(); // one row
    buf.extend_from_slice(&(row.len() as u32).to_le_bytes());
    buf.extend_from_slice(&row);
    buf
}

fn get_range_response_body(rows: Vec<u8>, next_start: Vec<u8>, read: i64) -> Vec<u8> {
    tablestore_proto::pb::GetRangeResponse {
        rows,
        next_start_primary_key: next_start,
        consumed: Some(tablestore_proto::pb::CapacityUnitPb { read, write: 0 }),
    }
    .encode_to_vec()
}

fn batch_write_row_response_body(oks: usize) -> Vec<u8> {
    tablestore_proto::pb::BatchWriteRowResponse {
        rows: (0..oks)
            .map(|_| tablestore_proto::pb::RowInBatchWriteRowResponse {
                is_ok: true,
                error_status: 0,
                error_code: String::new(),
                error_message: String::new(),
                row: Vec::new(),
                consumed: Some(tablestore_proto::pb::CapacityUnitPb { read: 0, write: 1 }),
            })
            .collect(),
    }
    .encode_to_vec()
}

fn build_client(http: Arc<ScriptedHttpClient>, retry_policy: Box<dyn tablestore_api::RetryPolicy>) -> Client {
    ClientBuilder::new(endpoint(), credential())
        .http_client(http)
        .retry_policy(retry_policy)
        .request_timeout(Duration::from_secs(5))
        .runtime(tokio::runtime::Handle::current())
        .build()
        .expect("valid options build a client")
}

fn pk(value: i64) -> Vec<(String, PrimaryKeyValue)> {
    vec![("pk".to_string(), PrimaryKeyValue::Integer(value))]
}

// S1: a oneshot ListTable call decodes the table names the server returned.
#[tokio::test]
async fn s1_oneshot_list_table_decodes_table_names() {
    let http = ScriptedHttpClient::new(vec![ok_response(200, "R1", list_table_response_body(vec!["pet"]))]);
    let client = build_client(http.clone(), Box::new(NonePolicy));

    let response = client.call_async(Request::ListTable(Default::default())).await.unwrap();
    match response {
        Response::ListTable(r) => assert_eq!(r.table_names, vec!["pet".to_string()]),
        _ => panic!("wrong response variant"),
    }

    let requests = http.take_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method(), http::Method::POST);
    assert!(requests[0].headers().contains_key("x-ots-signature"));
}

// S2: a 403 OTSAuthFailed response surfaces as an unretriable, fully
// populated Error carrying the server's code, message and request id.
#[tokio::test]
async fn s2_auth_failure_surfaces_as_a_closed_error() {
    let http = ScriptedHttpClient::new(vec![error_response(403, "R1", "OTSAuthFailed", "test")]);
    let client = build_client(http, Box::new(NonePolicy));

    let err = client.call_async(Request::ListTable(Default::default())).await.unwrap_err();
    assert_eq!(err.http_status, 403);
    assert_eq!(err.code, "OTSAuthFailed");
    assert_eq!(err.message, "test");
    assert_eq!(err.request_id, "R1");
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.retry_class(), tablestore_api::error::RetryClass::Unretriable);
}

// S3: a connection failure with NonePolicy is not retried, and since the
// request never reached a server, carries no request id at all.
#[tokio::test]
async fn s3_connection_failure_is_not_retried_under_none_policy() {
    let http = ScriptedHttpClient::new(vec![Err(HttpError::Client("refused".into()))]);
    let client = build_client(http.clone(), Box::new(NonePolicy));

    let err = client.call_async(Request::ListTable(Default::default())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.request_id, "");
    assert_eq!(http.take_requests().len(), 1, "NonePolicy must not retry");
}

// S4: the first attempt gets a retriable 500/OTSTableNotReady, the second
// a plain 200 success; a retrying policy recovers transparently.
#[tokio::test]
async fn s4_retry_policy_recovers_after_one_retriable_server_error() {
    let http = ScriptedHttpClient::new(vec![
        error_response(500, "R1", "OTSTableNotReady", "table is loading"),
        ok_response(200, "R2", list_table_response_body(vec!["pet", "toy"])),
    ]);
    let client = build_client(http.clone(), Box::new(CountingPolicy::new(3, Duration::from_millis(5), 1)));

    let response = client.call_async(Request::ListTable(Default::default())).await.unwrap();
    match response {
        Response::ListTable(r) => assert_eq!(r.table_names, vec!["pet".to_string(), "toy".to_string()]),
        _ => panic!("wrong response variant"),
    }
    assert_eq!(http.take_requests().len(), 2);
}

fn range_criterion() -> RangeQueryCriterion {
    RangeQueryCriterion {
        table_name: "pet".to_string(),
        direction: ScanDirection::Forward,
        columns_to_get: Vec::new(),
        start: pk(0),
        end: vec![("pk".to_string(), PrimaryKeyValue::InfMax)],
        limit: None,
        time_range: None,
        max_versions: None,
        filter: None,
    }
}

// S5: a range scan that spans two pages accumulates consumed capacity
// across both `GetRange` calls.
#[tokio::test]
async fn s5_range_iterator_accumulates_consumed_capacity_across_pages() {
    let http = ScriptedHttpClient::new(vec![
        ok_response(
            200,
            "R1",
            get_range_response_body(encode_one_row_with_int_pk("pk", 0), encode_single_int_pk("pk", 5), 4),
        ),
        ok_response(200, "R2", get_range_response_body(encode_zero_rows(), Vec::new(), 3)),
    ]);
    let client = build_client(http, Box::new(NonePolicy));
    let mut iter = client.range_iterator(range_criterion());

    loop {
        let tracker = tablestore_api::Tracker::random();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let more = iter.move_next(tracker, deadline, Box::new(NonePolicy)).await.unwrap();
        if !more {
            break;
        }
    }

    assert_eq!(iter.consumed_capacity(), tablestore_api::CapacityUnit { read: 7, write: 0 });
}

// S6: a user-supplied row limit is forwarded into the *next* GetRange
// request as the residual budget.
#[tokio::test]
async fn s6_range_iterator_forwards_residual_limit_to_next_request() {
    let http = ScriptedHttpClient::new(vec![
        ok_response(200, "R1", get_range_response_body(encode_zero_rows(), encode_single_int_pk("pk", 1), 1)),
        ok_response(200, "R2", get_range_response_body(encode_zero_rows(), Vec::new(), 1)),
    ]);
    let mut criterion = range_criterion();
    criterion.limit = Some(2);
    let http_for_assert = http.clone();
    let client = build_client(http, Box::new(NonePolicy));
    let mut iter = client.range_iterator(criterion);

    for _ in 0..2 {
        let tracker = tablestore_api::Tracker::random();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let _ = iter.move_next(tracker, deadline, Box::new(NonePolicy)).await.unwrap();
    }

    let requests = http_for_assert.take_requests();
    assert_eq!(requests.len(), 2);
    let second_body = tablestore_proto::pb::GetRangeRequest::decode(requests[1].body().as_slice()).unwrap();
    assert_eq!(second_body.limit, Some(2), "residual budget stays at the full limit since the first page returned 0 rows");
}

// S7: two writes enqueued on the aggregator both resolve once the batch
// dispatches, preserving per-item ordering of results.
#[tokio::test]
async fn s7_write_aggregator_resolves_every_enqueued_item() {
    let http = ScriptedHttpClient::new(vec![ok_response(200, "R1", batch_write_row_response_body(2))]);
    let client = build_client(http, Box::new(NonePolicy));
    let aggregator = client.write_aggregator(tablestore_sdk::WriteAggregatorOptions {
        regular_nap: Duration::from_millis(2),
        ..Default::default()
    });

    let (tx0, rx0) = tokio::sync::oneshot::channel();
    let (tx1, rx1) = tokio::sync::oneshot::channel();

    aggregator.enqueue(
        BatchWriteRowItem::Put(PutRowRequest {
            table_name: "pet".to_string(),
            row: Row { primary_key: pk(0), attributes: Vec::new() },
            condition: Condition::ignore(),
            return_row: false,
        }),
        Box::new(move |result| {
            let _ = tx0.send(result);
        }),
    );
    aggregator.enqueue(
        BatchWriteRowItem::Put(PutRowRequest {
            table_name: "pet".to_string(),
            row: Row { primary_key: pk(1), attributes: Vec::new() },
            condition: Condition::ignore(),
            return_row: false,
        }),
        Box::new(move |result| {
            let _ = tx1.send(result);
        }),
    );

    let (r0, r1) = tokio::join!(rx0, rx1);
    assert!(r0.unwrap().is_ok());
    assert!(r1.unwrap().is_ok());

    aggregator.shutdown().await;
}

#[tokio::test]
async fn deadline_policy_can_be_used_as_a_client_retry_policy() {
    let http = ScriptedHttpClient::new(vec![
        error_response(503, "R1", "OTSServerBusy", "too busy"),
        ok_response(200, "R2", list_table_response_body(vec![])),
    ]);
    let client = build_client(http, Box::new(DeadlinePolicy::new(Duration::from_secs(5), 1)));
    let response = client.call_async(Request::ListTable(Default::default())).await.unwrap();
    assert!(matches!(response, Response::ListTable(_)));
}

// A parameter validation failure never touches the transport at all.
#[tokio::test]
async fn validation_failure_short_circuits_before_any_http_call() {
    let http = ScriptedHttpClient::new(vec![]);
    let client = build_client(http.clone(), Box::new(NonePolicy));

    let err = client
        .call_async(Request::DeleteRow(DeleteRowRequest {
            table_name: "pet".to_string(),
            primary_key: Vec::new(),
            condition: Condition::ignore(),
        }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code, "OTSParameterInvalid");
    assert_eq!(http.take_requests().len(), 0, "a validation failure must never reach the transport");
}
