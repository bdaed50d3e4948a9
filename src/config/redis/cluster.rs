use std::fmt;

use serde::Serialize;

use crate::config::builder_base::ConfigBuilderBase;
use crate::config::EnvironmentProvider;

/// One `host:port` cluster startup node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub startup_nodes: Vec<ClusterNode>,
    pub skip_full_coverage_check: bool,
    pub read_from_replicas: bool,
}

/// Parse a comma-separated `host:port` list, skipping malformed entries
pub fn parse_cluster_nodes(raw: &str) -> Vec<ClusterNode> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = entry.rsplit_once(':').and_then(|(host, port)| {
                let host = host.trim();
                let port = port.trim().parse::<u16>().ok().filter(|p| *p > 0)?;
                (!host.is_empty()).then(|| ClusterNode {
                    host: host.to_string(),
                    port,
                })
            });
            if parsed.is_none() {
                tracing::warn!("Skipping malformed REDIS_CLUSTER_NODES entry '{}'", entry);
            }
            parsed
        })
        .collect()
}

pub struct ClusterBuilder<'a> {
    base: &'a ConfigBuilderBase,
}

impl<'a> ClusterBuilder<'a> {
    pub(super) fn new(base: &'a ConfigBuilderBase) -> Self {
        Self { base }
    }

    pub fn nodes(&self) -> Vec<ClusterNode> {
        self.base
            .get_trimmed("REDIS_CLUSTER_NODES")
            .map(|raw| parse_cluster_nodes(&raw))
            .unwrap_or_default()
    }

    /// Explicitly enabled, or implied by a node list
    pub fn is_enabled(&self) -> bool {
        self.base.get_env_bool("REDIS_CLUSTER_ENABLED", false) || !self.nodes().is_empty()
    }

    pub fn get_cluster_config(&self) -> ClusterConfig {
        let startup_nodes = self.nodes();
        let enabled = self.base.get_env_bool("REDIS_CLUSTER_ENABLED", false) || !startup_nodes.is_empty();
        if enabled && startup_nodes.is_empty() {
            tracing::warn!("REDIS_CLUSTER_ENABLED is set but REDIS_CLUSTER_NODES lists no usable nodes");
        }

        ClusterConfig {
            enabled,
            startup_nodes,
            skip_full_coverage_check: self.base.get_env_bool("REDIS_CLUSTER_SKIP_FULL_COVERAGE_CHECK", false),
            read_from_replicas: self.base.get_env_bool("REDIS_CLUSTER_READ_FROM_REPLICAS", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_entries_are_skipped() {
        let nodes = parse_cluster_nodes("host1:7000,badnode,host2:7001");

        let rendered: Vec<String> = nodes.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["host1:7000", "host2:7001"]);
    }

    #[test]
    fn test_other_malformed_shapes() {
        let nodes = parse_cluster_nodes(" :7000, host:notaport, host:0, host3:7002 ,, ");
        assert_eq!(nodes, vec![ClusterNode { host: "host3".to_string(), port: 7002 }]);
    }

    #[test]
    fn test_cluster_config_from_env() {
        let base = ConfigBuilderBase::from_vars(
            [("REDIS_CLUSTER_NODES", "host1:7000,badnode,host2:7001")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        let config = ClusterBuilder::new(&base).get_cluster_config();

        assert!(config.enabled);
        assert_eq!(config.startup_nodes.len(), 2);
    }

    #[test]
    fn test_cluster_disabled_by_default() {
        let base = ConfigBuilderBase::from_vars(Default::default());
        assert!(!ClusterBuilder::new(&base).is_enabled());
    }
}
