//! Top-level configuration surface (§6.4).
//!
//! Loading this from a file or environment is a sibling crate's job (out of
//! scope here, same as MIB resolution); this module only defines the closed
//! option set and its defaults, plus the conversions into the structs the
//! core actually runs on ([`ClientConfig`], [`WalkOptions`], `max_concurrency`
//! for [`run_multi`](crate::multi::run_multi)).

use std::time::Duration;

use bytes::Bytes;

use crate::client::{ClientConfig, RequestOptions};
use crate::error::Result;
use crate::multi::{MultiOutcome, Operation, run_multi};
use crate::transport::Transport;
use crate::v3::EngineCache;
use crate::version::Version;
use crate::walk_engine::WalkOptions;

/// The closed set of top-level options recognized by a configuration
/// loader. Every field has a spec-mandated default; `Default` reproduces
/// them exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct TopLevelConfig {
    pub default_version: Version,
    pub default_community: Bytes,
    pub default_timeout_ms: u64,
    pub default_retries: u32,
    pub default_max_repetitions: i32,
    pub walk_budget_ms: u64,
    pub max_concurrency: usize,
    pub max_in_flight: usize,
    pub engine_cache_idle_ms: u64,
    pub auto_start_services: bool,
}

impl Default for TopLevelConfig {
    fn default() -> Self {
        Self {
            default_version: Version::V2c,
            default_community: Bytes::from_static(b"public"),
            default_timeout_ms: 10_000,
            default_retries: 0,
            default_max_repetitions: 10,
            walk_budget_ms: 1_200_000,
            max_concurrency: 10,
            max_in_flight: 1024,
            engine_cache_idle_ms: 300_000,
            auto_start_services: true,
        }
    }
}

impl TopLevelConfig {
    /// The per-target [`ClientConfig`] this configuration implies, absent
    /// any v3 security (callers needing v3 still go through
    /// [`Client::v3`](crate::Client::v3)'s builder, which isn't expressible
    /// as a flat option map).
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            version: self.default_version,
            community: self.default_community.clone(),
            timeout: Duration::from_millis(self.default_timeout_ms),
            retries: self.default_retries,
            max_oids_per_request: 10,
            v3_security: None,
        }
    }

    /// The [`WalkOptions`] this configuration implies for a single walk.
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            max_repetitions: self.default_max_repetitions,
            iteration_limit: 10_000,
            deadline: Some(Duration::from_millis(self.walk_budget_ms)),
        }
    }

    /// The [`EngineCache`] this configuration implies: entries are treated
    /// as stale (forcing rediscovery) after `engine_cache_idle_ms`.
    pub fn engine_cache(&self) -> EngineCache {
        EngineCache::with_idle(Duration::from_millis(self.engine_cache_idle_ms))
    }

    /// Runs `operations` through [`run_multi`](crate::multi::run_multi),
    /// bounding in-flight operations at this configuration's
    /// `max_concurrency`.
    pub async fn run_multi<T>(
        &self,
        operations: Vec<Operation<T>>,
        request_opts: &RequestOptions,
    ) -> Vec<Result<MultiOutcome>>
    where
        T: Transport + 'static,
    {
        run_multi(operations, request_opts, self.max_concurrency).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = TopLevelConfig::default();
        assert_eq!(cfg.default_version, Version::V2c);
        assert_eq!(cfg.default_timeout_ms, 10_000);
        assert_eq!(cfg.max_concurrency, 10);
        assert_eq!(cfg.walk_budget_ms, 1_200_000);
        assert!(cfg.auto_start_services);
    }

    #[test]
    fn client_config_carries_the_configured_community_and_timeout() {
        let cfg = TopLevelConfig { default_timeout_ms: 5_000, ..TopLevelConfig::default() };
        let client_config = cfg.client_config();
        assert_eq!(client_config.timeout, Duration::from_millis(5_000));
        assert_eq!(client_config.community, Bytes::from_static(b"public"));
    }

    #[test]
    fn walk_options_uses_the_walk_budget_as_its_deadline() {
        let cfg = TopLevelConfig::default();
        let opts = cfg.walk_options();
        assert_eq!(opts.deadline, Some(Duration::from_millis(1_200_000)));
    }

    #[test]
    fn engine_cache_treats_the_idle_interval_as_its_staleness_window() {
        let cfg = TopLevelConfig { engine_cache_idle_ms: 5, ..TopLevelConfig::default() };
        let cache = cfg.engine_cache();
        let target: std::net::SocketAddr = "127.0.0.1:161".parse().unwrap();
        cache.insert(target, crate::v3::EngineState::new(Bytes::from_static(b"eng"), 1, 0));
        assert!(cache.get(target).is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(target).is_none());
    }

    #[tokio::test]
    async fn run_multi_executes_every_operation_within_max_concurrency() {
        use crate::client::Client;
        use crate::multi::OperationKind;
        use crate::oid::Oid;
        use crate::transport::{MockTransport, ResponseBuilder};
        use crate::value::Value;

        let cfg = TopLevelConfig { max_concurrency: 1, ..TopLevelConfig::default() };

        let mut mock_a = MockTransport::new("127.0.0.1:1620".parse().unwrap());
        mock_a.queue_response(
            ResponseBuilder::new(1)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::OctetString("a".into()))
                .build_v2c(b"public"),
        );
        let mut mock_b = MockTransport::new("127.0.0.1:1621".parse().unwrap());
        mock_b.queue_response(
            ResponseBuilder::new(1)
                .varbind(Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0]), Value::OctetString("b".into()))
                .build_v2c(b"public"),
        );

        let client_config = cfg.client_config();
        let ops = vec![
            Operation::new(
                Client::new(mock_a, client_config.clone()),
                OperationKind::Get(vec![Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0])]),
            ),
            Operation::new(
                Client::new(mock_b, client_config),
                OperationKind::Get(vec![Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 1, 0])]),
            ),
        ];

        let results = cfg.run_multi(ops, &RequestOptions::default()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
