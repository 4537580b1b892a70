//! Purpose: Client configuration: credentials, hosts, timeouts, default headers.
//! Exports: `SearchConfig`, `APP_ID_ENV`, `API_KEY_ENV`.
//! Role: Validated input to `SearchClient` and `HttpRequester`.
//! Invariants: Application id and API key are non-empty once a config exists.
//! Invariants: Custom hosts fully replace the default host list.
#![allow(clippy::result_large_err)]

use super::hosts::{Host, default_hosts};
use super::transport::{ApiResult, CallType};
use crate::core::error::{Error, ErrorKind};
use std::time::Duration;

pub const APP_ID_ENV: &str = "ALGOLIA_APP_ID";
pub const API_KEY_ENV: &str = "ALGOLIA_API_KEY";

#[derive(Clone, Debug)]
pub struct SearchConfig {
    app_id: String,
    api_key: String,
    hosts: Option<Vec<Host>>,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    pub host_down_ttl: Duration,
    pub task_poll_interval: Duration,
    pub default_headers: Vec<(String, String)>,
}

impl SearchConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> ApiResult<Self> {
        let app_id = app_id.into();
        let api_key = api_key.into();
        if app_id.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("application id must not be empty")
                .with_hint(format!("pass --app-id or set {APP_ID_ENV}")));
        }
        if api_key.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("api key must not be empty")
                .with_hint(format!("pass --api-key or set {API_KEY_ENV}")));
        }
        Ok(Self {
            app_id,
            api_key,
            hosts: None,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
            host_down_ttl: Duration::from_secs(300),
            task_poll_interval: Duration::from_millis(200),
            default_headers: Vec::new(),
        })
    }

    pub fn from_env() -> ApiResult<Self> {
        let app_id = std::env::var(APP_ID_ENV).unwrap_or_default();
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::new(app_id, api_key)
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn with_hosts(mut self, hosts: Vec<Host>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_host_down_ttl(mut self, ttl: Duration) -> Self {
        self.host_down_ttl = ttl;
        self
    }

    pub fn with_task_poll_interval(mut self, interval: Duration) -> Self {
        self.task_poll_interval = interval;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn hosts(&self) -> Vec<Host> {
        match &self.hosts {
            Some(hosts) => hosts.clone(),
            None => default_hosts(&self.app_id),
        }
    }

    pub fn timeout_for(&self, call_type: CallType) -> Duration {
        match call_type {
            CallType::Read => self.read_timeout,
            CallType::Write => self.write_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SearchConfig;
    use crate::api::hosts::Host;
    use crate::api::transport::CallType;
    use crate::core::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn empty_credentials_are_usage_errors() {
        let err = SearchConfig::new("", "key").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = SearchConfig::new("APP", "  ").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn default_hosts_derive_from_app_id() {
        let config = SearchConfig::new("APP", "key").expect("config");
        let hosts: Vec<_> = config.hosts().into_iter().map(|host| host.url).collect();
        assert_eq!(hosts[0], "APP-dsn.algolia.net");
        assert_eq!(hosts[1], "APP.algolia.net");
        assert_eq!(hosts.len(), 5);
    }

    #[test]
    fn custom_hosts_replace_defaults() {
        let config = SearchConfig::new("APP", "key")
            .expect("config")
            .with_hosts(vec![Host::new("localhost:8080").with_scheme("http")]);
        let hosts = config.hosts();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].base_url(), "http://localhost:8080");
    }

    #[test]
    fn timeout_depends_on_call_type() {
        let config = SearchConfig::new("APP", "key")
            .expect("config")
            .with_read_timeout(Duration::from_secs(1))
            .with_write_timeout(Duration::from_secs(9));
        assert_eq!(config.timeout_for(CallType::Read), Duration::from_secs(1));
        assert_eq!(config.timeout_for(CallType::Write), Duration::from_secs(9));
    }
}
