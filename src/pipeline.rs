use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::k8s::{ClusterProvider, NodeMetricsRecord, NodeRecord, PodMetricsRecord, PodRecord};
use crate::model::{ContainerResource, NodeResource, PodResource, Usage};

#[derive(Debug, Clone)]
pub struct Queries {
    pub pod: Regex,
    pub container: Regex,
    pub node: Regex,
}

impl Queries {
    pub fn compile(pod: &str, container: &str, node: &str) -> Result<Self> {
        Ok(Self {
            pod: Regex::new(pod).with_context(|| format!("invalid pod query {pod:?}"))?,
            container: Regex::new(container)
                .with_context(|| format!("invalid container query {container:?}"))?,
            node: Regex::new(node).with_context(|| format!("invalid node query {node:?}"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLogs {
    pub pod_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub containers: Vec<ContainerResource>,
    pub pods: Vec<PodResource>,
    pub nodes: Vec<NodeResource>,
    pub allocatable: HashMap<String, Usage>,
    pub logs: Option<PodLogs>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    queries: Queries,
    namespace: String,
    pod_selector: Option<String>,
    node_selector: Option<String>,
    log_lines: i64,
}

impl Aggregator {
    pub fn new(queries: Queries, namespace: impl Into<String>) -> Self {
        Self {
            queries,
            namespace: namespace.into(),
            pod_selector: None,
            node_selector: None,
            log_lines: 0,
        }
    }

    pub fn with_selectors(mut self, pods: Option<String>, nodes: Option<String>) -> Self {
        self.pod_selector = pods;
        self.node_selector = nodes;
        self
    }

    pub fn with_log_lines(mut self, lines: u32) -> Self {
        self.log_lines = i64::from(lines);
        self
    }

    /// Runs one tick: the node list first, then the pod side and the node side
    /// concurrently. Both sides always run to completion; either one failing
    /// fails the tick, and when both fail the error carries both messages.
    pub async fn update<P>(&self, provider: &P, log_target: Option<&str>) -> Result<ClusterSnapshot>
    where
        P: ClusterProvider + Sync,
    {
        let node_list = provider
            .list_nodes(self.node_selector.as_deref())
            .await?;

        let pod_side = async {
            let (listed, logs) = tokio::join!(
                async {
                    tokio::try_join!(
                        provider.pod_metrics(&self.namespace, self.pod_selector.as_deref()),
                        provider.list_pods(&self.namespace, self.pod_selector.as_deref()),
                    )
                },
                self.fetch_logs(provider, log_target),
            );
            let (metrics, pods) = listed?;
            let (containers, summarized) = self.join_pods(&metrics, &pods);
            Ok::<_, anyhow::Error>((containers, summarized, logs))
        };

        let node_side = async {
            let metrics = provider
                .node_metrics(self.node_selector.as_deref())
                .await?;
            Ok::<_, anyhow::Error>(self.join_nodes(&metrics, &node_list))
        };

        let (pod_result, node_result) = tokio::join!(pod_side, node_side);
        let ((containers, pods, logs), nodes) = match (pod_result, node_result) {
            (Ok(pod_side), Ok(nodes)) => (pod_side, nodes),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => return Err(err),
            (Err(pod_err), Err(node_err)) => {
                return Err(pod_err.context(format!("{node_err:#}")));
            }
        };

        let allocatable = node_list
            .into_iter()
            .map(|node| (node.name, node.allocatable))
            .collect();

        debug!(
            containers = containers.len(),
            pods = pods.len(),
            nodes = nodes.len(),
            "cluster snapshot aggregated"
        );

        Ok(ClusterSnapshot {
            containers,
            pods,
            nodes,
            allocatable,
            logs,
        })
    }

    async fn fetch_logs<P>(&self, provider: &P, log_target: Option<&str>) -> Option<PodLogs>
    where
        P: ClusterProvider + Sync,
    {
        let pod_name = log_target?;
        if self.log_lines <= 0 {
            return None;
        }

        let text = match provider
            .pod_log_tail(&self.namespace, pod_name, self.log_lines)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!(pod = pod_name, error = %format!("{err:#}"), "log fetch failed");
                format!("Failed to load logs for {pod_name}")
            }
        };

        Some(PodLogs {
            pod_name: pod_name.to_string(),
            text,
        })
    }

    fn join_pods(
        &self,
        metrics: &[PodMetricsRecord],
        pods: &[PodRecord],
    ) -> (Vec<ContainerResource>, Vec<PodResource>) {
        let specs = pods
            .iter()
            .map(|pod| (pod.name.as_str(), pod))
            .collect::<HashMap<_, _>>();

        let mut containers = Vec::new();
        let mut summarized = Vec::new();
        for pod_metrics in metrics
            .iter()
            .filter(|pod_metrics| self.queries.pod.is_match(&pod_metrics.name))
        {
            let Some(pod) = specs.get(pod_metrics.name.as_str()) else {
                debug!(pod = %pod_metrics.name, "pod metrics without pod spec, skipped");
                continue;
            };

            let mut total = Usage::default();
            for container_metrics in pod_metrics
                .containers
                .iter()
                .filter(|container| self.queries.container.is_match(&container.name))
            {
                let Some(spec) = pod
                    .containers
                    .iter()
                    .find(|spec| spec.name == container_metrics.name)
                else {
                    continue;
                };

                total = total.saturating_add(container_metrics.usage);
                containers.push(ContainerResource {
                    node_name: pod.node_name.clone(),
                    pod_name: pod.name.clone(),
                    container_name: spec.name.clone(),
                    usage: container_metrics.usage,
                    limits: spec.limits,
                    requests: spec.requests,
                });
            }

            summarized.push(PodResource {
                pod_name: pod.name.clone(),
                node_name: pod.node_name.clone(),
                usage: total,
            });
        }

        (containers, summarized)
    }

    fn join_nodes(&self, metrics: &[NodeMetricsRecord], nodes: &[NodeRecord]) -> Vec<NodeResource> {
        metrics
            .iter()
            .filter(|node_metrics| self.queries.node.is_match(&node_metrics.name))
            .filter_map(|node_metrics| {
                let Some(node) = nodes.iter().find(|node| node.name == node_metrics.name) else {
                    debug!(node = %node_metrics.name, "node metrics without node, skipped");
                    return None;
                };
                Some(NodeResource {
                    node_name: node.name.clone(),
                    capacity: node.capacity,
                    allocatable: node.allocatable,
                    usage: node_metrics.usage,
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::k8s::{ContainerMetricsRecord, ContainerSpecRecord};
    use crate::model::Bounds;
    use crate::viewer::{AllViewer, NodeViewer, SortKey, SummarizedViewer, TableViewer};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const MIB: u64 = 1_048_576;

    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeProvider {
        pub nodes: Vec<NodeRecord>,
        pub pods: Vec<PodRecord>,
        pub pod_metrics: Vec<PodMetricsRecord>,
        pub node_metrics: Vec<NodeMetricsRecord>,
        pub logs: HashMap<String, String>,
        pub fail_nodes: bool,
        pub fail_pod_metrics: bool,
        pub fail_node_metrics: bool,
        pub node_metrics_delay: Option<Duration>,
        pub node_metrics_done: Arc<AtomicBool>,
    }

    impl ClusterProvider for FakeProvider {
        async fn list_nodes(&self, _selector: Option<&str>) -> Result<Vec<NodeRecord>> {
            if self.fail_nodes {
                anyhow::bail!("failed to list nodes: connection refused");
            }
            Ok(self.nodes.clone())
        }

        async fn list_pods(&self, _namespace: &str, _selector: Option<&str>) -> Result<Vec<PodRecord>> {
            Ok(self.pods.clone())
        }

        async fn pod_metrics(
            &self,
            _namespace: &str,
            _selector: Option<&str>,
        ) -> Result<Vec<PodMetricsRecord>> {
            if self.fail_pod_metrics {
                anyhow::bail!("pod metrics unavailable");
            }
            Ok(self.pod_metrics.clone())
        }

        async fn node_metrics(&self, _selector: Option<&str>) -> Result<Vec<NodeMetricsRecord>> {
            if let Some(delay) = self.node_metrics_delay {
                tokio::time::sleep(delay).await;
            }
            self.node_metrics_done.store(true, Ordering::SeqCst);
            if self.fail_node_metrics {
                anyhow::bail!("node metrics unavailable");
            }
            Ok(self.node_metrics.clone())
        }

        async fn pod_log_tail(&self, _namespace: &str, pod_name: &str, _lines: i64) -> Result<String> {
            self.logs
                .get(pod_name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("pod {pod_name} has no logs"))
        }
    }

    fn spec(name: &str, cpu_limit: Option<u64>) -> ContainerSpecRecord {
        ContainerSpecRecord {
            name: name.to_string(),
            limits: Bounds {
                cpu_millicores: cpu_limit,
                memory_bytes: None,
            },
            requests: Bounds::default(),
        }
    }

    fn usage(name: &str, cpu: u64, mem_mib: u64) -> ContainerMetricsRecord {
        ContainerMetricsRecord {
            name: name.to_string(),
            usage: Usage::new(cpu, mem_mib * MIB),
        }
    }

    // n1 (2000m / 4096Mi) runs p1 with containers A and B.
    pub(crate) fn single_node_cluster() -> FakeProvider {
        FakeProvider {
            nodes: vec![NodeRecord {
                name: "n1".to_string(),
                capacity: Usage::new(4000, 8192 * MIB),
                allocatable: Usage::new(2000, 4096 * MIB),
            }],
            pods: vec![PodRecord {
                name: "p1".to_string(),
                node_name: "n1".to_string(),
                containers: vec![spec("B", None), spec("A", Some(500))],
            }],
            pod_metrics: vec![PodMetricsRecord {
                name: "p1".to_string(),
                containers: vec![usage("B", 200, 70), usage("A", 100, 50)],
            }],
            node_metrics: vec![NodeMetricsRecord {
                name: "n1".to_string(),
                usage: Usage::new(300, 1024 * MIB),
            }],
            logs: HashMap::from([("p1".to_string(), "ready\n".to_string())]),
            ..FakeProvider::default()
        }
    }

    pub(crate) fn match_all() -> Queries {
        Queries::compile(".*", ".*", ".*").expect("match-all queries compile")
    }

    #[tokio::test]
    async fn single_pod_scenario_projects_into_all_three_views() {
        let provider = single_node_cluster();
        let aggregator = Aggregator::new(match_all(), "default");
        let mut snapshot = aggregator.update(&provider, None).await.expect("tick succeeds");

        let mut summarized = SummarizedViewer::new(&mut snapshot.pods, SortKey::Name);
        summarized.sort_rows();
        let shape = summarized.table_shape(120);
        assert_eq!(shape.rows, vec![vec!["p1", "300m", "120Mi"]]);

        let mut all = AllViewer::new(&mut snapshot.containers, SortKey::Name);
        all.sort_rows();
        let shape = all.table_shape(200);
        assert_eq!(shape.keys, vec!["p1/A", "p1/B"]);

        let mut nodes = NodeViewer::new(&mut snapshot.nodes, SortKey::Name);
        nodes.sort_rows();
        let shape = nodes.table_shape(120);
        assert_eq!(shape.rows[0][3], "15%");
        assert_eq!(
            snapshot.allocatable.get("n1"),
            Some(&Usage::new(2000, 4096 * MIB))
        );
    }

    #[tokio::test]
    async fn metrics_without_spec_are_dropped_silently() {
        let mut provider = single_node_cluster();
        provider.pod_metrics.push(PodMetricsRecord {
            name: "ghost".to_string(),
            containers: vec![usage("A", 999, 1)],
        });
        provider.node_metrics.push(NodeMetricsRecord {
            name: "n-gone".to_string(),
            usage: Usage::new(1, 1),
        });

        let aggregator = Aggregator::new(match_all(), "default");
        let snapshot = aggregator.update(&provider, None).await.expect("tick succeeds");

        assert!(snapshot.pods.iter().all(|pod| pod.pod_name != "ghost"));
        assert!(snapshot.containers.iter().all(|c| c.pod_name != "ghost"));
        assert_eq!(snapshot.nodes.len(), 1);
    }

    #[tokio::test]
    async fn listed_node_without_metrics_is_excluded() {
        let mut provider = single_node_cluster();
        provider.nodes.push(NodeRecord {
            name: "n2".to_string(),
            ..NodeRecord::default()
        });

        let aggregator = Aggregator::new(match_all(), "default");
        let snapshot = aggregator.update(&provider, None).await.expect("tick succeeds");

        let names = snapshot
            .nodes
            .iter()
            .map(|node| node.node_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["n1"]);
        assert!(snapshot.allocatable.contains_key("n2"));
    }

    #[tokio::test]
    async fn container_filter_excludes_from_rows_and_pod_total() {
        let provider = single_node_cluster();
        let queries = Queries::compile(".*", "^A$", ".*").expect("queries compile");
        let snapshot = Aggregator::new(queries, "default")
            .update(&provider, None)
            .await
            .expect("tick succeeds");

        assert_eq!(snapshot.containers.len(), 1);
        assert_eq!(snapshot.containers[0].container_name, "A");
        assert_eq!(snapshot.pods[0].usage, Usage::new(100, 50 * MIB));
    }

    #[tokio::test]
    async fn pod_with_no_matching_containers_has_zero_usage() {
        let provider = single_node_cluster();
        let queries = Queries::compile(".*", "^nothing$", ".*").expect("queries compile");
        let snapshot = Aggregator::new(queries, "default")
            .update(&provider, None)
            .await
            .expect("tick succeeds");

        assert!(snapshot.containers.is_empty());
        assert_eq!(snapshot.pods.len(), 1);
        assert_eq!(snapshot.pods[0].usage, Usage::default());
    }

    #[tokio::test]
    async fn both_sides_failing_merges_both_messages() {
        let mut provider = single_node_cluster();
        provider.fail_pod_metrics = true;
        provider.fail_node_metrics = true;

        let err = Aggregator::new(match_all(), "default")
            .update(&provider, None)
            .await
            .expect_err("tick fails");
        let rendered = format!("{err:#}");
        assert!(rendered.contains("pod metrics unavailable"));
        assert!(rendered.contains("node metrics unavailable"));
    }

    #[tokio::test]
    async fn one_side_failing_fails_the_tick() {
        let mut provider = single_node_cluster();
        provider.fail_node_metrics = true;

        let err = Aggregator::new(match_all(), "default")
            .update(&provider, None)
            .await
            .expect_err("tick fails");
        assert_eq!(format!("{err:#}"), "node metrics unavailable");
    }

    #[tokio::test]
    async fn early_pod_failure_still_waits_for_node_side() {
        let mut provider = single_node_cluster();
        provider.fail_pod_metrics = true;
        provider.node_metrics_delay = Some(Duration::from_millis(100));
        let node_side_done = Arc::clone(&provider.node_metrics_done);

        let err = Aggregator::new(match_all(), "default")
            .update(&provider, None)
            .await
            .expect_err("tick fails");
        assert_eq!(format!("{err:#}"), "pod metrics unavailable");
        assert!(node_side_done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn sub_millicore_container_usage_is_summed_exactly() {
        let mut provider = single_node_cluster();
        provider.pod_metrics[0].containers = ["A", "B"]
            .into_iter()
            .map(|name| ContainerMetricsRecord {
                name: name.to_string(),
                usage: Usage::from_nanocores(1_400_000, MIB),
            })
            .collect();

        let snapshot = Aggregator::new(match_all(), "default")
            .update(&provider, None)
            .await
            .expect("tick succeeds");

        let per_container = snapshot
            .containers
            .iter()
            .map(|container| container.usage.cpu_millicores())
            .collect::<Vec<_>>();
        assert_eq!(per_container, vec![2, 2]);
        assert_eq!(snapshot.pods[0].usage.cpu_millicores(), 3);
        assert_eq!(snapshot.pods[0].to_row()[1], "3m");
    }

    #[tokio::test]
    async fn node_list_failure_stops_before_fan_out() {
        let mut provider = single_node_cluster();
        provider.fail_nodes = true;

        let err = Aggregator::new(match_all(), "default")
            .update(&provider, None)
            .await
            .expect_err("tick fails");
        assert!(format!("{err:#}").contains("failed to list nodes"));
    }

    #[tokio::test]
    async fn log_failure_degrades_to_placeholder() {
        let mut provider = single_node_cluster();
        provider.logs.clear();

        let aggregator = Aggregator::new(match_all(), "default").with_log_lines(100);
        let snapshot = aggregator
            .update(&provider, Some("p1"))
            .await
            .expect("log failure is not fatal");
        assert_eq!(
            snapshot.logs,
            Some(PodLogs {
                pod_name: "p1".to_string(),
                text: "Failed to load logs for p1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn logs_are_skipped_when_disabled_or_untargeted() {
        let provider = single_node_cluster();
        let disabled = Aggregator::new(match_all(), "default");
        assert_eq!(disabled.update(&provider, Some("p1")).await.expect("tick").logs, None);

        let enabled = Aggregator::new(match_all(), "default").with_log_lines(10);
        assert_eq!(enabled.update(&provider, None).await.expect("tick").logs, None);
        let logs = enabled.update(&provider, Some("p1")).await.expect("tick").logs;
        assert_eq!(logs.map(|logs| logs.text), Some("ready\n".to_string()));
    }

    #[test]
    fn malformed_query_is_rejected() {
        let err = Queries::compile("(", ".*", ".*").expect_err("unbalanced group");
        assert!(format!("{err:#}").contains("invalid pod query"));
    }
}
