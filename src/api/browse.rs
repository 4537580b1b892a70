//! Purpose: Turn the cursor-paginated browse endpoint into one lazy sequence of records.
//! Exports: `BrowseIterator`, `BrowseState`.
//! Role: Owns the `BrowseQuery` of one session and replays its cursor page after page.
//! Invariants: At most one page fetch is in flight; page N+1 waits for page N to drain.
//! Invariants: The cursor is stored before the fetched page's records are yielded.
//! Invariants: Absent cursor ends the session; errors and cancellation fuse the iterator.
#![allow(clippy::result_large_err)]

use super::index::SearchIndex;
use super::transport::{ApiResult, RequestExecutor};
use crate::core::cancel::{CancellationToken, cancelled_opt};
use crate::core::error::Error;
use crate::core::query::BrowseQuery;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrowseState {
    /// No page fetched yet; the cursor is unset.
    Start,
    /// The last page returned a cursor; more pages remain.
    Paging,
    /// Exhausted, failed, or cancelled. Only buffered records (if any) remain.
    Done,
}

pub struct BrowseIterator<E, T> {
    index: SearchIndex<E>,
    query: BrowseQuery,
    state: BrowseState,
    page: VecDeque<T>,
    cancel: Option<CancellationToken>,
    page_fetches: usize,
}

impl<E, T> BrowseIterator<E, T>
where
    E: RequestExecutor,
    T: DeserializeOwned + Send,
{
    pub(crate) fn new(
        index: SearchIndex<E>,
        query: BrowseQuery,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            index,
            query,
            state: BrowseState::Start,
            page: VecDeque::new(),
            cancel,
            page_fetches: 0,
        }
    }

    pub fn state(&self) -> BrowseState {
        self.state
    }

    pub fn query(&self) -> &BrowseQuery {
        &self.query
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches
    }

    pub async fn next_hit(&mut self) -> ApiResult<Option<T>> {
        self.next_hit_with(None).await
    }

    /// Pulls the next record; `cancel` applies to this pull only, in addition to
    /// any token the iterator was built with.
    pub async fn next_hit_with(
        &mut self,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Option<T>> {
        loop {
            if self.is_cancelled(cancel) {
                self.fuse();
                return Err(Error::cancelled());
            }
            if let Some(hit) = self.page.pop_front() {
                return Ok(Some(hit));
            }
            if self.state == BrowseState::Done {
                return Ok(None);
            }
            if let Err(err) = self.fetch_page(cancel).await {
                self.fuse();
                return Err(err);
            }
        }
    }

    /// Drains the remaining session into memory.
    pub async fn collect_all(mut self) -> ApiResult<Vec<T>> {
        let mut hits = Vec::new();
        while let Some(hit) = self.next_hit().await? {
            hits.push(hit);
        }
        Ok(hits)
    }

    /// Moves the session onto a background task feeding a bounded channel.
    ///
    /// The producer reserves a channel slot before pulling each record, so it
    /// only advances once the consumer has taken the previous one. The next
    /// page is therefore fetched only after the current page has been received.
    /// Dropping the stream stops the producer.
    pub fn into_stream(mut self) -> ReceiverStream<ApiResult<T>>
    where
        E: 'static,
        T: 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while let Ok(permit) = tx.reserve().await {
                let next = tokio::select! {
                    biased;
                    _ = tx.closed() => break,
                    next = self.next_hit() => next,
                };
                match next {
                    Ok(Some(hit)) => permit.send(Ok(hit)),
                    Ok(None) => break,
                    Err(err) => {
                        permit.send(Err(err));
                        break;
                    }
                }
            }
        });
        ReceiverStream::new(rx)
    }

    async fn fetch_page(&mut self, pull_cancel: Option<&CancellationToken>) -> ApiResult<()> {
        self.page_fetches += 1;
        tracing::debug!(
            index = %self.index.name(),
            page = self.page_fetches,
            resumed = self.query.cursor.is_some(),
            "fetching browse page"
        );
        let request = self
            .index
            .browse_from::<T>(&self.query, None, self.cancel.as_ref());
        let response = tokio::select! {
            biased;
            _ = cancelled_opt(self.cancel.as_ref()) => return Err(Error::cancelled()),
            _ = cancelled_opt(pull_cancel) => return Err(Error::cancelled()),
            response = request => response?,
        };

        self.query.cursor = response.cursor.filter(|cursor| !cursor.is_empty());
        self.state = if self.query.cursor.is_some() {
            BrowseState::Paging
        } else {
            BrowseState::Done
        };
        self.page.extend(response.hits);
        Ok(())
    }

    fn is_cancelled(&self, pull_cancel: Option<&CancellationToken>) -> bool {
        self.cancel
            .as_ref()
            .into_iter()
            .chain(pull_cancel)
            .any(CancellationToken::is_cancelled)
    }

    fn fuse(&mut self) {
        self.state = BrowseState::Done;
        self.page.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::BrowseState;
    use crate::api::index::SearchIndex;
    use crate::api::transport::{ApiResult, Method, RequestExecutor, RequestOptions};
    use crate::core::cancel::CancellationToken;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::query::{BrowseQuery, SearchQuery};
    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Serves canned browse pages and records the body of every request.
    struct PagedExecutor {
        pages: Mutex<Vec<Value>>,
        bodies: Mutex<Vec<Value>>,
    }

    impl PagedExecutor {
        fn new(pages: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn bodies(&self) -> Vec<Value> {
            self.bodies.lock().expect("bodies").clone()
        }
    }

    impl RequestExecutor for PagedExecutor {
        async fn execute_with_body<B, R>(
            &self,
            _method: Method,
            _path: &str,
            body: &B,
            _options: &RequestOptions,
            _cancel: Option<&CancellationToken>,
        ) -> ApiResult<R>
        where
            B: Serialize + Sync + ?Sized,
            R: DeserializeOwned + Send,
        {
            self.bodies
                .lock()
                .expect("bodies")
                .push(serde_json::to_value(body).expect("body"));
            let page = self.pages.lock().expect("pages").pop();
            let page = page.ok_or_else(|| Error::new(ErrorKind::Internal).with_message("no page"))?;
            Ok(serde_json::from_value(page).expect("decode"))
        }

        async fn execute<R>(
            &self,
            _method: Method,
            _path: &str,
            _options: &RequestOptions,
            _cancel: Option<&CancellationToken>,
        ) -> ApiResult<R>
        where
            R: DeserializeOwned + Send,
        {
            Err(Error::new(ErrorKind::Internal).with_message("unexpected get"))
        }
    }

    fn index(executor: Arc<PagedExecutor>) -> SearchIndex<PagedExecutor> {
        SearchIndex::new(executor, "products", Duration::from_millis(1)).expect("index")
    }

    #[tokio::test]
    async fn cursor_is_replayed_and_cleared() {
        let executor = PagedExecutor::new(vec![
            json!({"hits": [{"objectID": "1"}], "cursor": "c1"}),
            json!({"hits": [{"objectID": "2"}]}),
        ]);
        let index = index(executor.clone());
        let mut iter = index
            .browse::<Value>(BrowseQuery::new(SearchQuery::new("shoe")))
            .expect("iter");
        assert_eq!(iter.state(), BrowseState::Start);

        let first = iter.next_hit().await.expect("first").expect("hit");
        assert_eq!(first["objectID"], "1");
        assert_eq!(iter.state(), BrowseState::Paging);
        assert_eq!(iter.query().cursor.as_deref(), Some("c1"));

        let second = iter.next_hit().await.expect("second").expect("hit");
        assert_eq!(second["objectID"], "2");
        assert_eq!(iter.state(), BrowseState::Done);
        assert!(iter.query().cursor.is_none());
        assert!(iter.next_hit().await.expect("end").is_none());

        assert_eq!(
            executor.bodies(),
            vec![
                json!({"params": "query=shoe"}),
                json!({"params": "query=shoe", "cursor": "c1"}),
            ]
        );
    }

    #[tokio::test]
    async fn empty_cursor_ends_the_session() {
        let executor = PagedExecutor::new(vec![json!({"hits": [], "cursor": ""})]);
        let iter = index(executor.clone())
            .browse::<Value>(BrowseQuery::default())
            .expect("iter");
        assert!(iter.collect_all().await.expect("hits").is_empty());
        assert_eq!(executor.bodies().len(), 1);
    }

    #[tokio::test]
    async fn failure_fuses_the_iterator() {
        let executor = PagedExecutor::new(vec![json!({"hits": [{"objectID": "1"}], "cursor": "c1"})]);
        let mut iter = index(executor)
            .browse::<Value>(BrowseQuery::default())
            .expect("iter");
        assert!(iter.next_hit().await.expect("first").is_some());
        let err = iter.next_hit().await.expect_err("no second page");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.index(), Some("products"));
        assert_eq!(iter.state(), BrowseState::Done);
        assert!(iter.next_hit().await.expect("fused").is_none());
    }

    #[tokio::test]
    async fn per_pull_cancellation_stops_buffered_records() {
        let executor = PagedExecutor::new(vec![json!({
            "hits": [{"objectID": "1"}, {"objectID": "2"}]
        })]);
        let mut iter = index(executor)
            .browse::<Value>(BrowseQuery::default())
            .expect("iter");
        assert!(iter.next_hit().await.expect("first").is_some());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = iter.next_hit_with(Some(&cancel)).await.expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(iter.next_hit().await.expect("fused").is_none());
    }

    #[test]
    fn browse_rejects_preset_cursor() {
        let executor = PagedExecutor::new(Vec::new());
        let err = index(executor)
            .browse::<Value>(BrowseQuery::from_cursor("c9"))
            .err()
            .expect("cursor set");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
