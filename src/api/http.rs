//! Purpose: Concrete `RequestExecutor` over HTTPS using a blocking `ureq` agent.
//! Exports: `HttpRequester`.
//! Role: Injects credentials, walks the host list via `RetryStrategy`, decodes JSON.
//! Invariants: Blocking I/O runs on `spawn_blocking`; async callers are never blocked.
//! Invariants: Cancellation is checked before each attempt and raced against it.
//! Invariants: Error bodies `{"message", "status"}` map to classified `Error`s.
#![allow(clippy::result_large_err)]

use super::config::SearchConfig;
use super::hosts::{AttemptOutcome, Host, RetryDecision, RetryStrategy};
use super::transport::{ApiResult, Method, RequestExecutor, RequestOptions};
use crate::core::cancel::{CancellationToken, cancelled_opt};
use crate::core::error::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use url::Url;

const APP_ID_HEADER: &str = "X-Algolia-Application-Id";
const API_KEY_HEADER: &str = "X-Algolia-API-Key";

pub struct HttpRequester {
    config: SearchConfig,
    agent: ureq::Agent,
    retry: RetryStrategy,
    user_agent: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

struct AttemptFailure {
    outcome: AttemptOutcome,
    error: Error,
}

impl HttpRequester {
    pub fn new(config: SearchConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .build();
        let retry = RetryStrategy::new(config.hosts(), config.host_down_ttl);
        Self {
            config,
            agent,
            retry,
            user_agent: format!("Algolia for Rust ({})", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    async fn send<R>(
        &self,
        method: Method,
        path: &str,
        payload: Option<String>,
        options: &RequestOptions,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let call_type = options.call_type_for(method);
        let base_timeout = options
            .timeout
            .unwrap_or_else(|| self.config.timeout_for(call_type));
        let hosts = self.retry.tryable_hosts(call_type);
        let attempts = hosts.len();
        let mut last_error = None;

        for tryable in hosts {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(Error::cancelled());
            }
            let url = build_url(&tryable.host, path, &options.query_params)?;
            let timeout = tryable.timeout(base_timeout);
            tracing::debug!(
                method = method.as_str(),
                url = %url,
                timeout_ms = timeout.as_millis() as u64,
                "sending request"
            );
            let request = self.prepare(method, &url, options, timeout);
            let body = payload.clone();
            let attempt = tokio::task::spawn_blocking(move || send_blocking(request, body));

            let result = tokio::select! {
                biased;
                _ = cancelled_opt(cancel) => return Err(Error::cancelled()),
                joined = attempt => joined.map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("request task failed")
                        .with_source(err)
                })?,
            };

            let (outcome, response) = match result {
                Ok((status, body)) => (AttemptOutcome::Status(status), Ok((status, body))),
                Err(failure) => (failure.outcome, Err(failure.error)),
            };
            match (self.retry.decide(&tryable.host, outcome), response) {
                (RetryDecision::Success, Ok((_, body))) => return decode_body(&body),
                (RetryDecision::Failure, Ok((status, body))) => {
                    return Err(error_from_response(status, &body));
                }
                (_, Ok((status, body))) => {
                    last_error = Some(error_from_response(status, &body));
                }
                (_, Err(err)) => {
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| {
            Error::new(ErrorKind::Transport).with_message("no host accepts this request")
        });
        Err(err.with_hint(format!("all {attempts} hosts failed; check connectivity")))
    }

    fn prepare(
        &self,
        method: Method,
        url: &Url,
        options: &RequestOptions,
        timeout: Duration,
    ) -> ureq::Request {
        let mut request = self
            .agent
            .request(method.as_str(), url.as_str())
            .timeout(timeout)
            .set(APP_ID_HEADER, self.config.app_id())
            .set(API_KEY_HEADER, self.config.api_key())
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        for (name, value) in self.config.default_headers.iter().chain(&options.headers) {
            request = request.set(name, value);
        }
        request
    }
}

impl RequestExecutor for HttpRequester {
    async fn execute_with_body<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        options: &RequestOptions,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        self.send(method, path, Some(payload), options, cancel).await
    }

    async fn execute<R>(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<R>
    where
        R: DeserializeOwned + Send,
    {
        self.send(method, path, None, options, cancel).await
    }
}

fn send_blocking(
    request: ureq::Request,
    payload: Option<String>,
) -> Result<(u16, String), AttemptFailure> {
    let response = match payload {
        Some(body) => request.send_string(&body),
        None => request.call(),
    };
    let response = match response {
        Ok(resp) => resp,
        Err(ureq::Error::Status(_, resp)) => resp,
        Err(ureq::Error::Transport(err)) => {
            let timed_out = std::error::Error::source(&err)
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(is_timeout);
            return Err(transport_failure(timed_out, "request failed", err));
        }
    };
    let status = response.status();
    let body = response
        .into_string()
        .map_err(|err| transport_failure(is_timeout(&err), "failed to read response body", err))?;
    Ok((status, body))
}

fn transport_failure(
    timed_out: bool,
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> AttemptFailure {
    let (outcome, kind) = if timed_out {
        (AttemptOutcome::TimedOut, ErrorKind::Timeout)
    } else {
        (AttemptOutcome::Network, ErrorKind::Transport)
    };
    AttemptFailure {
        outcome,
        error: Error::new(kind).with_message(message).with_source(source),
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

fn build_url(host: &Host, path: &str, query_params: &[(String, String)]) -> ApiResult<Url> {
    let mut url = Url::parse(&format!("{}{}", host.base_url(), path)).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid request url for host {}", host.url))
            .with_source(err)
    })?;
    if !query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query_params {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

fn decode_body<R>(body: &str) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn error_from_response(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("remote error status {status}"));
    Error::new(error_kind_from_status(status))
        .with_message(message)
        .with_status(status)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Remote,
    }
}
