//! Purpose: Request and response payloads for index endpoints.
//! Exports: Search/browse/batch/task response types and batch request builders.
//! Role: serde shapes of the service's JSON; no behavior beyond (de)serialization.
//! Invariants: Field names follow the service's wire casing via serde renames.
//! Invariants: Hit order is preserved exactly as received.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse<T> {
    pub hits: Vec<T>,
    #[serde(default)]
    pub nb_hits: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub nb_pages: u32,
    #[serde(default)]
    pub hits_per_page: u32,
    #[serde(rename = "processingTimeMS", default)]
    pub processing_time_ms: u64,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub params: String,
}

/// One page of a browse session.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseResponse<T> {
    pub hits: Vec<T>,
    /// Absent on the last page.
    pub cursor: Option<String>,
    pub nb_hits: Option<u64>,
    pub page: Option<u32>,
    pub nb_pages: Option<u32>,
    pub hits_per_page: Option<u32>,
    #[serde(rename = "processingTimeMS")]
    pub processing_time_ms: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TaskResponse {
    #[serde(rename = "taskID")]
    pub task_id: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BatchResponse {
    #[serde(rename = "taskID")]
    pub task_id: u64,
    #[serde(rename = "objectIDs", default)]
    pub object_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub status: String,
    #[serde(default)]
    pub pending_task: bool,
}

impl TaskStatus {
    pub fn is_published(&self) -> bool {
        self.status == "published"
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GetObjectsResponse<T> {
    pub results: Vec<Option<T>>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub name: String,
    #[serde(default)]
    pub entries: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIndicesResponse {
    pub items: Vec<IndexInfo>,
    #[serde(default)]
    pub nb_pages: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchAction {
    AddObject,
    UpdateObject,
    PartialUpdateObject,
    PartialUpdateObjectNoCreate,
    DeleteObject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchOperation {
    pub action: BatchAction,
    pub body: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchOperation>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct GetObjectRequest<'a> {
    #[serde(rename = "indexName")]
    pub index_name: &'a str,
    #[serde(rename = "objectID")]
    pub object_id: &'a str,
    #[serde(rename = "attributesToRetrieve", skip_serializing_if = "Option::is_none")]
    pub attributes_to_retrieve: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct GetObjectsRequest<'a> {
    pub requests: Vec<GetObjectRequest<'a>>,
}
