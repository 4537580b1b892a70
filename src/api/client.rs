//! Purpose: Entry point for talking to one search application.
//! Exports: `SearchClient`.
//! Role: Owns the shared executor and hands out `SearchIndex` handles bound to it.
//! Invariants: Every index handle from one client shares the same executor and host state.
#![allow(clippy::result_large_err)]

use super::config::SearchConfig;
use super::http::HttpRequester;
use super::index::SearchIndex;
use super::models::ListIndicesResponse;
use super::transport::{ApiResult, Method, RequestExecutor, RequestOptions};
use crate::core::cancel::CancellationToken;
use std::sync::Arc;
use std::time::Duration;

pub struct SearchClient<E = HttpRequester> {
    executor: Arc<E>,
    task_poll_interval: Duration,
}

impl<E> Clone for SearchClient<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            task_poll_interval: self.task_poll_interval,
        }
    }
}

impl SearchClient<HttpRequester> {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> ApiResult<Self> {
        Ok(Self::with_config(SearchConfig::new(app_id, api_key)?))
    }

    pub fn with_config(config: SearchConfig) -> Self {
        let task_poll_interval = config.task_poll_interval;
        Self::with_executor(Arc::new(HttpRequester::new(config)), task_poll_interval)
    }
}

impl<E: RequestExecutor> SearchClient<E> {
    /// Builds a client over any executor, e.g. an in-memory one in tests.
    pub fn with_executor(executor: Arc<E>, task_poll_interval: Duration) -> Self {
        Self {
            executor,
            task_poll_interval,
        }
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn init_index(&self, name: impl Into<String>) -> ApiResult<SearchIndex<E>> {
        SearchIndex::new(Arc::clone(&self.executor), name, self.task_poll_interval)
    }

    pub async fn list_indices(
        &self,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<ListIndicesResponse> {
        let options = options.cloned().unwrap_or_default();
        self.executor
            .execute(Method::Get, "/1/indexes", &options, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::SearchClient;
    use crate::core::error::ErrorKind;

    #[test]
    fn empty_credentials_are_rejected() {
        let err = SearchClient::new("", "key").err().expect("app id");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = SearchClient::new("APP", " ").err().expect("api key");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn index_handles_share_the_executor() {
        let client = SearchClient::new("APP", "key").expect("client");
        let products = client.init_index("products").expect("index");
        assert_eq!(products.name(), "products");
        assert!(std::sync::Arc::ptr_eq(products.executor(), client.executor()));
        let err = client.init_index("").expect_err("empty name");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
