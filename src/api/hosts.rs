//! Purpose: Host list and retry policy beneath the HTTP requester.
//! Exports: `Host`, `HostAccept`, `RetryStrategy`, `TryableHost`, `AttemptOutcome`, `RetryDecision`.
//! Role: Decides which host to try next and whether a failed attempt may be retried.
//! Invariants: Host state is shared across callers and only mutated under one lock.
//! Invariants: Decoded 4xx responses are never retried; down hosts return after a TTL.
use super::transport::CallType;
use rand::seq::SliceRandom;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostAccept {
    Read,
    Write,
    ReadWrite,
}

impl HostAccept {
    fn accepts(self, call_type: CallType) -> bool {
        matches!(
            (self, call_type),
            (HostAccept::ReadWrite, _)
                | (HostAccept::Read, CallType::Read)
                | (HostAccept::Write, CallType::Write)
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Host {
    /// `hostname[:port]`, no scheme.
    pub url: String,
    pub scheme: String,
    pub accept: HostAccept,
}

impl Host {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scheme: "https".to_string(),
            accept: HostAccept::ReadWrite,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_accept(mut self, accept: HostAccept) -> Self {
        self.accept = accept;
        self
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.url)
    }
}

/// Primary read and write hosts first, then the shared fallbacks in random order.
pub fn default_hosts(app_id: &str) -> Vec<Host> {
    let mut fallbacks: Vec<Host> = (1..=3)
        .map(|n| Host::new(format!("{app_id}-{n}.algolianet.com")))
        .collect();
    fallbacks.shuffle(&mut rand::rng());

    let mut hosts = vec![
        Host::new(format!("{app_id}-dsn.algolia.net")).with_accept(HostAccept::Read),
        Host::new(format!("{app_id}.algolia.net")).with_accept(HostAccept::Write),
    ];
    hosts.extend(fallbacks);
    hosts
}

#[derive(Clone, Debug)]
struct StatefulHost {
    host: Host,
    up: bool,
    last_use: Instant,
    retry_count: u32,
}

impl StatefulHost {
    fn new(host: Host) -> Self {
        Self {
            host,
            up: true,
            last_use: Instant::now(),
            retry_count: 0,
        }
    }

    fn reset(&mut self, now: Instant) {
        self.up = true;
        self.last_use = now;
        self.retry_count = 0;
    }
}

#[derive(Clone, Debug)]
pub struct TryableHost {
    pub host: Host,
    pub retry_count: u32,
}

impl TryableHost {
    /// Hosts that already timed out get proportionally longer to answer.
    pub fn timeout(&self, base: Duration) -> Duration {
        base.saturating_mul(self.retry_count.saturating_add(1))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttemptOutcome {
    Status(u16),
    TimedOut,
    Network,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    Success,
    Retry,
    Failure,
}

#[derive(Debug)]
pub struct RetryStrategy {
    hosts: Mutex<Vec<StatefulHost>>,
    down_ttl: Duration,
}

impl RetryStrategy {
    pub fn new(hosts: Vec<Host>, down_ttl: Duration) -> Self {
        Self {
            hosts: Mutex::new(hosts.into_iter().map(StatefulHost::new).collect()),
            down_ttl,
        }
    }

    /// Hosts to try for one call, in order. Never empty while any host accepts the call type.
    pub fn tryable_hosts(&self, call_type: CallType) -> Vec<TryableHost> {
        let mut hosts = self.lock();
        let now = Instant::now();
        for host in hosts.iter_mut() {
            if !host.up && now.duration_since(host.last_use) >= self.down_ttl {
                host.reset(now);
            }
        }

        let up = collect_tryable(&hosts, call_type, true);
        if !up.is_empty() {
            return up;
        }

        // Every eligible host is down; start over rather than fail without trying.
        for host in hosts
            .iter_mut()
            .filter(|host| host.host.accept.accepts(call_type))
        {
            host.reset(now);
        }
        collect_tryable(&hosts, call_type, false)
    }

    pub fn decide(&self, host: &Host, outcome: AttemptOutcome) -> RetryDecision {
        let mut hosts = self.lock();
        let now = Instant::now();
        let state = hosts.iter_mut().find(|state| state.host.url == host.url);

        let decision = classify(outcome);
        if let Some(state) = state {
            state.last_use = now;
            match (decision, outcome) {
                (RetryDecision::Retry, AttemptOutcome::TimedOut) => {
                    state.retry_count = state.retry_count.saturating_add(1);
                }
                (RetryDecision::Retry, _) => {
                    state.up = false;
                    tracing::warn!(host = %host.url, ?outcome, "marking host down");
                }
                (RetryDecision::Success, _) => {
                    state.up = true;
                    state.retry_count = 0;
                }
                (RetryDecision::Failure, _) => {}
            }
        }
        decision
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StatefulHost>> {
        self.hosts
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn collect_tryable(hosts: &[StatefulHost], call_type: CallType, only_up: bool) -> Vec<TryableHost> {
    hosts
        .iter()
        .filter(|state| state.host.accept.accepts(call_type))
        .filter(|state| !only_up || state.up)
        .map(|state| TryableHost {
            host: state.host.clone(),
            retry_count: state.retry_count,
        })
        .collect()
}

fn classify(outcome: AttemptOutcome) -> RetryDecision {
    match outcome {
        AttemptOutcome::Status(status) if (200..300).contains(&status) => RetryDecision::Success,
        AttemptOutcome::Status(408) => RetryDecision::Retry,
        AttemptOutcome::Status(status) if (400..500).contains(&status) => RetryDecision::Failure,
        AttemptOutcome::Status(_) | AttemptOutcome::TimedOut | AttemptOutcome::Network => {
            RetryDecision::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttemptOutcome, Host, HostAccept, RetryDecision, RetryStrategy, default_hosts};
    use crate::api::transport::CallType;
    use std::time::Duration;

    fn strategy(ttl: Duration) -> RetryStrategy {
        RetryStrategy::new(
            vec![
                Host::new("read.example").with_accept(HostAccept::Read),
                Host::new("write.example").with_accept(HostAccept::Write),
                Host::new("fallback.example"),
            ],
            ttl,
        )
    }

    fn urls(strategy: &RetryStrategy, call_type: CallType) -> Vec<String> {
        strategy
            .tryable_hosts(call_type)
            .into_iter()
            .map(|tryable| tryable.host.url)
            .collect()
    }

    #[test]
    fn hosts_are_filtered_by_call_type() {
        let strategy = strategy(Duration::from_secs(300));
        assert_eq!(urls(&strategy, CallType::Read), ["read.example", "fallback.example"]);
        assert_eq!(urls(&strategy, CallType::Write), ["write.example", "fallback.example"]);
    }

    #[test]
    fn network_failure_marks_host_down() {
        let strategy = strategy(Duration::from_secs(300));
        let decision = strategy.decide(&Host::new("read.example"), AttemptOutcome::Network);
        assert_eq!(decision, RetryDecision::Retry);
        assert_eq!(urls(&strategy, CallType::Read), ["fallback.example"]);
    }

    #[test]
    fn server_errors_retry_and_client_errors_fail() {
        let strategy = strategy(Duration::from_secs(300));
        let host = Host::new("fallback.example");
        assert_eq!(strategy.decide(&host, AttemptOutcome::Status(503)), RetryDecision::Retry);
        assert_eq!(strategy.decide(&host, AttemptOutcome::Status(408)), RetryDecision::Retry);
        assert_eq!(strategy.decide(&host, AttemptOutcome::Status(404)), RetryDecision::Failure);
        assert_eq!(strategy.decide(&host, AttemptOutcome::Status(200)), RetryDecision::Success);
    }

    #[test]
    fn client_error_keeps_host_up() {
        let strategy = strategy(Duration::from_secs(300));
        strategy.decide(&Host::new("read.example"), AttemptOutcome::Status(400));
        assert_eq!(urls(&strategy, CallType::Read), ["read.example", "fallback.example"]);
    }

    #[test]
    fn timeout_keeps_host_up_and_scales_timeout() {
        let strategy = strategy(Duration::from_secs(300));
        strategy.decide(&Host::new("read.example"), AttemptOutcome::TimedOut);
        strategy.decide(&Host::new("read.example"), AttemptOutcome::TimedOut);
        let hosts = strategy.tryable_hosts(CallType::Read);
        assert_eq!(hosts[0].host.url, "read.example");
        assert_eq!(hosts[0].retry_count, 2);
        assert_eq!(hosts[0].timeout(Duration::from_secs(2)), Duration::from_secs(6));
    }

    #[test]
    fn down_hosts_return_after_ttl() {
        let strategy = strategy(Duration::ZERO);
        strategy.decide(&Host::new("read.example"), AttemptOutcome::Network);
        assert_eq!(urls(&strategy, CallType::Read), ["read.example", "fallback.example"]);
    }

    #[test]
    fn all_hosts_down_resets_the_list() {
        let strategy = strategy(Duration::from_secs(300));
        strategy.decide(&Host::new("read.example"), AttemptOutcome::Network);
        strategy.decide(&Host::new("fallback.example"), AttemptOutcome::Network);
        assert_eq!(urls(&strategy, CallType::Read), ["read.example", "fallback.example"]);
    }

    #[test]
    fn default_fallbacks_accept_both_call_types() {
        let hosts = default_hosts("APP");
        assert_eq!(hosts[0].accept, HostAccept::Read);
        assert_eq!(hosts[1].accept, HostAccept::Write);
        let mut fallbacks: Vec<_> = hosts[2..].iter().map(|host| host.url.clone()).collect();
        fallbacks.sort();
        assert_eq!(
            fallbacks,
            ["APP-1.algolianet.com", "APP-2.algolianet.com", "APP-3.algolianet.com"]
        );
        assert!(hosts[2..].iter().all(|host| host.accept == HostAccept::ReadWrite));
    }
}
