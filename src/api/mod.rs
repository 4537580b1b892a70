//! Purpose: Define the public Rust API of the search client.
//! Exports: Client, index handles, browse iterator, query types, transport contract, errors.
//! Role: The only public path into the crate; submodules stay private.
//! Invariants: Every network operation goes through a `RequestExecutor`.
//! Invariants: Re-exports are additive; internal helpers are not exposed.

mod browse;
mod client;
mod config;
mod hosts;
mod http;
mod index;
mod models;
mod transport;

pub use crate::core::cancel::CancellationToken;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::query::{
    AroundRadius, BrowseQuery, Distinct, FilterGroup, LanguageToggle, LatLng, QueryType,
    SearchQuery, ToParam, TypoTolerance, parse_query_string,
};
pub use browse::{BrowseIterator, BrowseState};
pub use client::SearchClient;
pub use config::{API_KEY_ENV, APP_ID_ENV, SearchConfig};
pub use hosts::{
    AttemptOutcome, Host, HostAccept, RetryDecision, RetryStrategy, TryableHost, default_hosts,
};
pub use http::HttpRequester;
pub use index::SearchIndex;
pub use models::{
    BatchAction, BatchOperation, BatchRequest, BatchResponse, BrowseResponse, GetObjectsResponse,
    IndexInfo, ListIndicesResponse, SearchResponse, TaskResponse, TaskStatus,
};
pub use transport::{ApiResult, CallType, Method, RequestExecutor, RequestOptions};
