//! The client entry point: request signing, the concrete HTTP transport,
//! and the public `Client`/`ClientBuilder` surface tying together
//! `tablestore-api`'s traits, `tablestore-sdk`'s generic core and
//! `tablestore-proto`'s wire codec.

mod client;
mod signer;
mod transport;

pub use client::{Client, ClientBuilder};
pub use signer::Signer;
pub use transport::HttpTransport;

pub use tablestore_api::{ClientOptions, ClientOptionsBuilder, Credential, Endpoint, Error, ErrorKind};
pub use tablestore_sdk::{
    CountingPolicy, DeadlinePolicy, NonePolicy, RangeIterator, RangeQueryCriterion, SyncClient,
    WriteAggregator, WriteAggregatorOptions,
};
