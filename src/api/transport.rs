//! Purpose: Define the request-execution contract every index operation funnels through.
//! Exports: `RequestExecutor`, `Method`, `CallType`, `RequestOptions`.
//! Role: Seam between typed index operations and a concrete transport.
//! Invariants: One call = one logical request = one decoded result or one classified error.
//! Invariants: The contract imposes no timeout; timeouts belong to the implementation.
use crate::core::cancel::CancellationToken;
use crate::core::error::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Read calls go to search hosts, write calls to indexing hosts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallType {
    Read,
    Write,
}

impl CallType {
    pub fn for_method(method: Method) -> Self {
        match method {
            Method::Get => CallType::Read,
            Method::Post => CallType::Write,
        }
    }
}

/// Per-request overrides layered over the client configuration.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Forces read routing for POST endpoints that only read (search, browse).
    pub call_type: Option<CallType>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = Some(call_type);
        self
    }

    pub fn call_type_for(&self, method: Method) -> CallType {
        self.call_type.unwrap_or_else(|| CallType::for_method(method))
    }
}

/// Executes one request against the service and decodes its JSON response.
///
/// Implementations must be safe to call from many tasks at once and must resolve
/// promptly with `ErrorKind::Cancelled` once `cancel` fires.
pub trait RequestExecutor: Send + Sync {
    fn execute_with_body<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: &RequestOptions,
        cancel: Option<&CancellationToken>,
    ) -> impl Future<Output = ApiResult<R>> + Send
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send;

    fn execute<R>(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
        cancel: Option<&CancellationToken>,
    ) -> impl Future<Output = ApiResult<R>> + Send
    where
        R: DeserializeOwned + Send;
}

#[cfg(test)]
mod tests {
    use super::{CallType, Method, RequestOptions};

    #[test]
    fn call_type_follows_method_unless_overridden() {
        let options = RequestOptions::new();
        assert_eq!(options.call_type_for(Method::Get), CallType::Read);
        assert_eq!(options.call_type_for(Method::Post), CallType::Write);

        let options = RequestOptions::new().with_call_type(CallType::Read);
        assert_eq!(options.call_type_for(Method::Post), CallType::Read);
    }
}
