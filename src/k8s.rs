use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Container, Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use crate::model::{
    Bounds, Usage, parse_cpu_millicores, parse_cpu_nanocores, parse_memory_bytes,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRecord {
    pub name: String,
    pub capacity: Usage,
    pub allocatable: Usage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpecRecord {
    pub name: String,
    pub limits: Bounds,
    pub requests: Bounds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub node_name: String,
    pub containers: Vec<ContainerSpecRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMetricsRecord {
    pub name: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodMetricsRecord {
    pub name: String,
    pub containers: Vec<ContainerMetricsRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetricsRecord {
    pub name: String,
    pub usage: Usage,
}

pub trait ClusterProvider {
    fn list_nodes(
        &self,
        selector: Option<&str>,
    ) -> impl Future<Output = Result<Vec<NodeRecord>>> + Send;

    fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> impl Future<Output = Result<Vec<PodRecord>>> + Send;

    fn pod_metrics(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> impl Future<Output = Result<Vec<PodMetricsRecord>>> + Send;

    fn node_metrics(
        &self,
        selector: Option<&str>,
    ) -> impl Future<Output = Result<Vec<NodeMetricsRecord>>> + Send;

    fn pod_log_tail(
        &self,
        namespace: &str,
        pod_name: &str,
        lines: i64,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct KubeTargetOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub user: Option<String>,
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new(options: &KubeTargetOptions) -> Result<Self> {
        let kubeconfig = match &options.kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let kube_options = KubeConfigOptions {
                context: options.context.clone(),
                cluster: options.cluster.clone(),
                user: options.user.clone(),
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &kube_options)
                .await
                .context("failed to load Kubernetes configuration from kubeconfig")?
        } else {
            if options.context.is_some() || options.cluster.is_some() || options.user.is_some() {
                anyhow::bail!(
                    "kubeconfig not found; --context/--cluster/--user cannot be honoured"
                );
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;

        let context = options
            .context
            .clone()
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn metrics_api(&self, kind: &str, plural: &str, namespace: Option<&str>) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, plural);
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

impl ClusterProvider for KubeGateway {
    async fn list_nodes(&self, selector: Option<&str>) -> Result<Vec<NodeRecord>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&list_params(selector))
            .await
            .context("failed to list nodes")?;
        Ok(list.into_iter().map(|node| node_record(&node)).collect())
    }

    async fn list_pods(&self, namespace: &str, selector: Option<&str>) -> Result<Vec<PodRecord>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&list_params(selector))
            .await
            .with_context(|| format!("failed to list pods in namespace {namespace}"))?;
        Ok(list.into_iter().map(|pod| pod_record(&pod)).collect())
    }

    async fn pod_metrics(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<PodMetricsRecord>> {
        let api = self.metrics_api("PodMetrics", "pods", Some(namespace));
        let list = api
            .list(&list_params(selector))
            .await
            .with_context(|| format!("failed to list pod metrics in namespace {namespace}"))?;
        Ok(list
            .into_iter()
            .map(|object| PodMetricsRecord {
                name: object.name_any(),
                containers: parse_container_metrics(&object.data),
            })
            .collect())
    }

    async fn node_metrics(&self, selector: Option<&str>) -> Result<Vec<NodeMetricsRecord>> {
        let api = self.metrics_api("NodeMetrics", "nodes", None);
        let list = api
            .list(&list_params(selector))
            .await
            .context("failed to list node metrics")?;
        Ok(list
            .into_iter()
            .map(|object| NodeMetricsRecord {
                name: object.name_any(),
                usage: parse_usage_from_value(&object.data["usage"]),
            })
            .collect())
    }

    async fn pod_log_tail(&self, namespace: &str, pod_name: &str, lines: i64) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(lines),
            ..LogParams::default()
        };

        pods.logs(pod_name, &params)
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{pod_name}"))
    }
}

fn list_params(selector: Option<&str>) -> ListParams {
    let params = ListParams::default();
    match selector.map(str::trim).filter(|value| !value.is_empty()) {
        Some(selector) => params.labels(selector),
        None => params,
    }
}

fn node_record(node: &Node) -> NodeRecord {
    let status = node.status.as_ref();
    NodeRecord {
        name: node.name_any(),
        capacity: usage_from_quantities(status.and_then(|status| status.capacity.as_ref())),
        allocatable: usage_from_quantities(status.and_then(|status| status.allocatable.as_ref())),
    }
}

fn pod_record(pod: &Pod) -> PodRecord {
    let spec = pod.spec.as_ref();
    PodRecord {
        name: pod.name_any(),
        node_name: spec
            .and_then(|spec| spec.node_name.clone())
            .unwrap_or_default(),
        containers: spec
            .map(|spec| spec.containers.iter().map(container_record).collect())
            .unwrap_or_default(),
    }
}

fn container_record(container: &Container) -> ContainerSpecRecord {
    let resources = container.resources.as_ref();
    ContainerSpecRecord {
        name: container.name.clone(),
        limits: bounds_from_quantities(resources.and_then(|resources| resources.limits.as_ref())),
        requests: bounds_from_quantities(
            resources.and_then(|resources| resources.requests.as_ref()),
        ),
    }
}

fn bounds_from_quantities(quantities: Option<&BTreeMap<String, Quantity>>) -> Bounds {
    let Some(quantities) = quantities else {
        return Bounds::default();
    };
    Bounds {
        cpu_millicores: quantities
            .get("cpu")
            .and_then(|quantity| parse_cpu_millicores(&quantity.0)),
        memory_bytes: quantities
            .get("memory")
            .and_then(|quantity| parse_memory_bytes(&quantity.0)),
    }
}

fn usage_from_quantities(quantities: Option<&BTreeMap<String, Quantity>>) -> Usage {
    let Some(quantities) = quantities else {
        return Usage::default();
    };
    Usage::from_nanocores(
        quantities
            .get("cpu")
            .and_then(|quantity| parse_cpu_nanocores(&quantity.0))
            .unwrap_or(0),
        quantities
            .get("memory")
            .and_then(|quantity| parse_memory_bytes(&quantity.0))
            .unwrap_or(0),
    )
}

fn parse_container_metrics(data: &Value) -> Vec<ContainerMetricsRecord> {
    let Some(containers) = data.get("containers").and_then(Value::as_array) else {
        return Vec::new();
    };

    containers
        .iter()
        .filter_map(|container| {
            let name = container.get("name").and_then(Value::as_str)?;
            let usage = container
                .get("usage")
                .map(parse_usage_from_value)
                .unwrap_or_default();
            Some(ContainerMetricsRecord {
                name: name.to_string(),
                usage,
            })
        })
        .collect()
}

fn parse_usage_from_value(value: &Value) -> Usage {
    let cpu = value
        .get("cpu")
        .and_then(Value::as_str)
        .and_then(parse_cpu_nanocores)
        .unwrap_or(0);
    let memory = value
        .get("memory")
        .and_then(Value::as_str)
        .and_then(parse_memory_bytes)
        .unwrap_or(0);
    Usage::from_nanocores(cpu, memory)
}
