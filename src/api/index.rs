//! Purpose: Typed operations on one remote index.
//! Exports: `SearchIndex`.
//! Role: Assembles endpoint paths and payloads, then delegates to a `RequestExecutor`.
//! Invariants: Argument validation fails with `Usage` before any request is issued.
//! Invariants: Search and browse are routed as read calls even though they POST.
//! Invariants: Path segments are percent-encoded; index names are never empty.
#![allow(clippy::result_large_err)]

use super::browse::BrowseIterator;
use super::models::{
    BatchAction, BatchOperation, BatchRequest, BatchResponse, BrowseResponse, GetObjectRequest,
    GetObjectsRequest, GetObjectsResponse, SearchResponse, TaskResponse, TaskStatus,
};
use super::transport::{ApiResult, CallType, Method, RequestExecutor, RequestOptions};
use crate::core::cancel::{CancellationToken, cancelled_opt};
use crate::core::error::{Error, ErrorKind};
use crate::core::query::{BrowseQuery, SearchQuery};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const OBJECT_ID: &str = "objectID";

pub struct SearchIndex<E> {
    executor: Arc<E>,
    name: String,
    task_poll_interval: Duration,
}

impl<E> Clone for SearchIndex<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            name: self.name.clone(),
            task_poll_interval: self.task_poll_interval,
        }
    }
}

impl<E> std::fmt::Debug for SearchIndex<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<E: RequestExecutor> SearchIndex<E> {
    pub fn new(
        executor: Arc<E>,
        name: impl Into<String>,
        task_poll_interval: Duration,
    ) -> ApiResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("index name must not be empty"));
        }
        Ok(Self {
            executor,
            name,
            task_poll_interval,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub async fn search<T>(
        &self,
        query: &SearchQuery,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<SearchResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        let path = self.path(&["query"]);
        self.executor
            .execute_with_body(Method::Post, &path, query, &read_options(options), cancel)
            .await
            .map_err(|err| err.with_index(self.name.clone()))
    }

    /// Fetches a single browse page; the caller replays `cursor` to continue.
    pub async fn browse_from<T>(
        &self,
        query: &BrowseQuery,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BrowseResponse<T>>
    where
        T: DeserializeOwned + Send,
    {
        let path = self.path(&["browse"]);
        self.executor
            .execute_with_body(Method::Post, &path, query, &read_options(options), cancel)
            .await
            .map_err(|err| err.with_index(self.name.clone()))
    }

    /// Lazily iterates every record matching `query`, one page fetch at a time.
    pub fn browse<T>(&self, query: BrowseQuery) -> ApiResult<BrowseIterator<E, T>>
    where
        T: DeserializeOwned + Send,
    {
        ensure_fresh_cursor(&query)?;
        Ok(BrowseIterator::new(self.clone(), query, None))
    }

    /// Like `browse`, aborting any in-flight page fetch once `cancel` fires.
    pub fn browse_with_cancel<T>(
        &self,
        query: BrowseQuery,
        cancel: CancellationToken,
    ) -> ApiResult<BrowseIterator<E, T>>
    where
        T: DeserializeOwned + Send,
    {
        ensure_fresh_cursor(&query)?;
        Ok(BrowseIterator::new(self.clone(), query, Some(cancel)))
    }

    pub async fn get_object<T>(
        &self,
        object_id: &str,
        attributes_to_retrieve: Option<&[String]>,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned + Send,
    {
        ensure_object_id(object_id)?;
        let mut options = options.cloned().unwrap_or_default();
        if let Some(attributes) = attributes_to_retrieve {
            options = options.with_query_param("attributesToRetrieve", attributes.join(","));
        }
        let path = self.path(&[object_id]);
        self.executor
            .execute(Method::Get, &path, &options, cancel)
            .await
            .map_err(|err| err.with_index(self.name.clone()).with_object_id(object_id))
    }

    /// Results keep the order of `object_ids`; missing records come back as `None`.
    pub async fn get_objects<T>(
        &self,
        object_ids: &[String],
        attributes_to_retrieve: Option<&[String]>,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<Vec<Option<T>>>
    where
        T: DeserializeOwned + Send,
    {
        if object_ids.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("object ids must not be empty"));
        }
        for object_id in object_ids {
            ensure_object_id(object_id)?;
        }
        let attributes = attributes_to_retrieve.map(|attributes| attributes.join(","));
        let request = GetObjectsRequest {
            requests: object_ids
                .iter()
                .map(|object_id| GetObjectRequest {
                    index_name: &self.name,
                    object_id: object_id.as_str(),
                    attributes_to_retrieve: attributes.clone(),
                })
                .collect(),
        };
        let response: GetObjectsResponse<T> = self
            .executor
            .execute_with_body(
                Method::Post,
                "/1/indexes/*/objects",
                &request,
                &read_options(options),
                cancel,
            )
            .await
            .map_err(|err| err.with_index(self.name.clone()))?;
        Ok(response.results)
    }

    pub async fn save_object<T>(
        &self,
        object: &T,
        auto_generate_object_id: bool,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse>
    where
        T: Serialize,
    {
        self.save_objects(
            std::slice::from_ref(object),
            auto_generate_object_id,
            options,
            cancel,
        )
        .await
    }

    /// Without `auto_generate_object_id`, every object must carry an `objectID`.
    pub async fn save_objects<T>(
        &self,
        objects: &[T],
        auto_generate_object_id: bool,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse>
    where
        T: Serialize,
    {
        let action = if auto_generate_object_id {
            BatchAction::AddObject
        } else {
            BatchAction::UpdateObject
        };
        let request = batch_of(objects, action, !auto_generate_object_id)?;
        self.batch(&request, options, cancel).await
    }

    pub async fn partial_update_object<T>(
        &self,
        object: &T,
        create_if_not_exists: bool,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse>
    where
        T: Serialize,
    {
        self.partial_update_objects(
            std::slice::from_ref(object),
            create_if_not_exists,
            options,
            cancel,
        )
        .await
    }

    pub async fn partial_update_objects<T>(
        &self,
        objects: &[T],
        create_if_not_exists: bool,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse>
    where
        T: Serialize,
    {
        let action = if create_if_not_exists {
            BatchAction::PartialUpdateObject
        } else {
            BatchAction::PartialUpdateObjectNoCreate
        };
        let request = batch_of(objects, action, true)?;
        self.batch(&request, options, cancel).await
    }

    pub async fn delete_object(
        &self,
        object_id: &str,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse> {
        self.delete_objects(&[object_id.to_string()], options, cancel).await
    }

    pub async fn delete_objects(
        &self,
        object_ids: &[String],
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse> {
        if object_ids.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("object ids must not be empty"));
        }
        let mut requests = Vec::with_capacity(object_ids.len());
        for object_id in object_ids {
            ensure_object_id(object_id)?;
            let mut body = Map::new();
            body.insert(OBJECT_ID.to_string(), Value::String(object_id.clone()));
            requests.push(BatchOperation {
                action: BatchAction::DeleteObject,
                body: Value::Object(body),
            });
        }
        self.batch(&BatchRequest { requests }, options, cancel).await
    }

    /// Deletes every record matching the query's filters.
    pub async fn delete_by(
        &self,
        query: &SearchQuery,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<TaskResponse> {
        let path = self.path(&["deleteByQuery"]);
        self.write(&path, query, options, cancel).await
    }

    pub async fn clear_objects(
        &self,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<TaskResponse> {
        let path = self.path(&["clear"]);
        self.write(&path, &Map::new(), options, cancel).await
    }

    pub async fn batch(
        &self,
        request: &BatchRequest,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<BatchResponse> {
        if request.requests.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("batch must not be empty"));
        }
        let path = self.path(&["batch"]);
        self.write(&path, request, options, cancel).await
    }

    pub async fn get_task(
        &self,
        task_id: u64,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<TaskStatus> {
        let path = self.path(&["task", &task_id.to_string()]);
        let options = options.cloned().unwrap_or_default();
        self.executor
            .execute(Method::Get, &path, &options, cancel)
            .await
            .map_err(|err| err.with_index(self.name.clone()))
    }

    /// Polls the task until the service reports it published.
    pub async fn wait_task(
        &self,
        task_id: u64,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<()> {
        loop {
            let status = self.get_task(task_id, options, cancel).await?;
            if status.is_published() {
                return Ok(());
            }
            tracing::debug!(index = %self.name, task_id, status = %status.status, "task pending");
            tokio::select! {
                biased;
                _ = cancelled_opt(cancel) => return Err(Error::cancelled()),
                _ = tokio::time::sleep(self.task_poll_interval) => {}
            }
        }
    }

    async fn write<B, R>(
        &self,
        path: &str,
        body: &B,
        options: Option<&RequestOptions>,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        let options = options.cloned().unwrap_or_default();
        self.executor
            .execute_with_body(Method::Post, path, body, &options, cancel)
            .await
            .map_err(|err| err.with_index(self.name.clone()))
    }

    fn path(&self, segments: &[&str]) -> String {
        let mut path = format!("/1/indexes/{}", encode_segment(&self.name));
        for segment in segments {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
        path
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn read_options(options: Option<&RequestOptions>) -> RequestOptions {
    let mut options = options.cloned().unwrap_or_default();
    if options.call_type.is_none() {
        options.call_type = Some(CallType::Read);
    }
    options
}

fn ensure_object_id(object_id: &str) -> ApiResult<()> {
    if object_id.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("objectID must not be empty"));
    }
    Ok(())
}

fn ensure_fresh_cursor(query: &BrowseQuery) -> ApiResult<()> {
    if query.cursor.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("browse sessions must start without a cursor")
            .with_hint("use browse_from to resume from a cursor"));
    }
    Ok(())
}

fn batch_of<T>(objects: &[T], action: BatchAction, require_id: bool) -> ApiResult<BatchRequest>
where
    T: Serialize,
{
    if objects.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("objects must not be empty"));
    }
    let requests = objects
        .iter()
        .map(|object| -> ApiResult<BatchOperation> {
            Ok(BatchOperation {
                action,
                body: object_body(object, require_id)?,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(BatchRequest { requests })
}

fn object_body<T>(object: &T, require_id: bool) -> ApiResult<Value>
where
    T: Serialize,
{
    let body = serde_json::to_value(object).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to encode object json")
            .with_source(err)
    })?;
    let Some(fields) = body.as_object() else {
        return Err(Error::new(ErrorKind::Usage).with_message("objects must encode to JSON objects"));
    };
    if require_id {
        let has_id = fields
            .get(OBJECT_ID)
            .and_then(Value::as_str)
            .is_some_and(|id| !id.trim().is_empty());
        if !has_id {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("object is missing an objectID")
                .with_hint("set objectID or enable auto_generate_object_id"));
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::{batch_of, encode_segment, object_body};
    use crate::api::models::BatchAction;
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(encode_segment("my index/é"), "my%20index%2F%C3%A9");
        assert_eq!(encode_segment("prod_en-US.v2~"), "prod_en-US.v2~");
    }

    #[test]
    fn object_without_id_is_rejected_unless_generated() {
        let object = json!({"title": "shoe"});
        let err = object_body(&object, true).expect_err("missing id");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(object_body(&object, false).is_ok());
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let err = object_body(&json!([1, 2]), false).expect_err("not an object");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn batch_keeps_object_order() {
        let objects = vec![json!({"objectID": "b"}), json!({"objectID": "a"})];
        let batch = batch_of(&objects, BatchAction::UpdateObject, true).expect("batch");
        let ids: Vec<_> = batch
            .requests
            .iter()
            .map(|op| op.body["objectID"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let objects: Vec<serde_json::Value> = Vec::new();
        let err = batch_of(&objects, BatchAction::AddObject, false).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
