use chrono::{DateTime, Local};

use crate::config::Settings;
use crate::graph::GraphState;
use crate::input::Action;
use crate::model::{
    ContainerResource, NodeResource, PodResource, Usage, format_cpu, format_memory,
    format_optional_cpu, format_optional_memory, format_percent,
};
use crate::pipeline::ClusterSnapshot;
use crate::table::TableState;
use crate::viewer::{AllViewer, NodeViewer, SortKey, SummarizedViewer, TableViewer, ViewMode};

const NODE_ALLOCATABLE_LABEL: &str = "NodeAllocatable";
const CONTAINER_LIMIT_LABEL: &str = "ContainerLimits";
const NODE_LOGS_TEXT: &str = "No logs for node view";
const MAX_STATUS_LEN: usize = 180;

#[derive(Debug, Clone, Default)]
pub struct ClusterInfo {
    pub cluster: String,
    pub context: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq)]
struct GraphSample {
    header: String,
    value: f64,
    data_label: String,
    upper_limit: f64,
    limit_label: String,
}

#[derive(Debug)]
pub struct Monitor {
    running: bool,
    info: ClusterInfo,
    mode: ViewMode,
    sort_key: SortKey,
    table: TableState,
    table_width: u16,
    cpu_graph: GraphState,
    mem_graph: GraphState,
    graphed_key: Option<String>,
    logs_title: String,
    logs: String,
    status: String,
    refreshed_at: Option<DateTime<Local>>,
    failures: u32,
}

impl Monitor {
    pub fn new(info: ClusterInfo, settings: &Settings) -> Self {
        let mode = ViewMode::Summarized;
        let table_width = 80;
        let mut table = TableState::default();
        table.reset(mode.empty_shape(table_width));

        Self {
            running: true,
            info,
            mode,
            sort_key: SortKey::default(),
            table,
            table_width,
            cpu_graph: GraphState::new(settings.graph.history, settings.graph.draw_upper_limit),
            mem_graph: GraphState::new(settings.graph.history, settings.graph.draw_upper_limit),
            graphed_key: None,
            logs_title: "Logs".to_string(),
            logs: String::new(),
            status: "Waiting for first refresh…".to_string(),
            refreshed_at: None,
            failures: 0,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn info(&self) -> &ClusterInfo {
        &self.info
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableState {
        &mut self.table
    }

    pub fn cpu_graph(&self) -> &GraphState {
        &self.cpu_graph
    }

    pub fn mem_graph(&self) -> &GraphState {
        &self.mem_graph
    }

    pub fn logs_title(&self) -> &str {
        &self.logs_title
    }

    pub fn logs(&self) -> &str {
        &self.logs
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn failing(&self) -> bool {
        self.failures > 0
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Local>> {
        self.refreshed_at
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn set_table_width(&mut self, width: u16) {
        self.table_width = width;
    }

    pub fn log_target(&self) -> Option<String> {
        if self.mode == ViewMode::Node || self.table.is_placeholder() {
            return None;
        }
        let key = self.table.selected_key()?;
        let pod = match self.mode {
            ViewMode::All => key.split_once('/').map_or(key, |(pod, _)| pod),
            _ => key,
        };
        Some(pod.to_string())
    }

    pub fn apply_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Up => self.scroll_up(),
            Action::Down => self.scroll_down(),
            Action::NextView => self.rotate(),
            Action::PrevView => self.reverse_rotate(),
            Action::CycleSort => self.cycle_sort(),
        }
    }

    pub fn scroll_up(&mut self) {
        let before = self.table.selected_row();
        self.table.scroll_up();
        if self.table.selected_row() != before {
            self.restart_graphs();
        }
    }

    pub fn scroll_down(&mut self) {
        let before = self.table.selected_row();
        self.table.scroll_down();
        if self.table.selected_row() != before {
            self.restart_graphs();
        }
    }

    pub fn rotate(&mut self) {
        self.switch_mode(self.mode.next());
    }

    pub fn reverse_rotate(&mut self) {
        self.switch_mode(self.mode.previous());
    }

    pub fn cycle_sort(&mut self) {
        self.sort_key = self.sort_key.next();
        self.set_status(format!("Sorting by {}", self.sort_key.label()));
    }

    fn switch_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
        self.table.reset(mode.empty_shape(self.table_width));
        self.restart_graphs();
        self.logs.clear();
        self.logs_title = "Logs".to_string();
        self.set_status(format!("View: {}", mode.label()));
    }

    fn restart_graphs(&mut self) {
        self.cpu_graph.reset();
        self.mem_graph.reset();
        self.graphed_key = None;
    }

    pub fn record_failure(&mut self, message: &str) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.set_status(format!("Refresh failed ({}): {message}", self.failures));
        self.failures
    }

    pub fn apply(&mut self, mut snapshot: ClusterSnapshot) {
        let previous_key = self.table.selected_key().map(str::to_string);
        let width = self.table_width;

        let samples = match self.mode {
            ViewMode::Summarized => {
                let mut viewer = SummarizedViewer::new(&mut snapshot.pods, self.sort_key);
                viewer.sort_rows();
                let shape = viewer.table_shape(width);
                let selected = self.table.replace(shape, previous_key.as_deref());
                snapshot
                    .pods
                    .get(selected)
                    .map(|pod| summarized_samples(pod, &snapshot))
            }
            ViewMode::All => {
                let mut viewer = AllViewer::new(&mut snapshot.containers, self.sort_key);
                viewer.sort_rows();
                let shape = viewer.table_shape(width);
                let selected = self.table.replace(shape, previous_key.as_deref());
                snapshot
                    .containers
                    .get(selected)
                    .map(|container| container_samples(container, &snapshot))
            }
            ViewMode::Node => {
                let mut viewer = NodeViewer::new(&mut snapshot.nodes, self.sort_key);
                viewer.sort_rows();
                let shape = viewer.table_shape(width);
                let selected = self.table.replace(shape, previous_key.as_deref());
                snapshot.nodes.get(selected).map(node_samples)
            }
        };

        let current_key = self.table.selected_key().map(str::to_string);
        if current_key.is_none() || current_key != self.graphed_key {
            self.restart_graphs();
        }
        if let Some((cpu, mem)) = samples {
            push_sample(&mut self.cpu_graph, cpu);
            push_sample(&mut self.mem_graph, mem);
            self.graphed_key = current_key;
        }

        self.apply_logs(&snapshot);
        self.refreshed_at = Some(Local::now());
        self.failures = 0;
        self.set_status(format!(
            "{} rows · sorted by {}",
            self.table.data_row_count(),
            self.sort_key.label()
        ));
    }

    fn apply_logs(&mut self, snapshot: &ClusterSnapshot) {
        if self.mode == ViewMode::Node {
            self.logs_title = "Logs".to_string();
            self.logs = NODE_LOGS_TEXT.to_string();
            return;
        }

        // logs fetched for a row the cursor has since left are stale
        let current = self.log_target();
        match &snapshot.logs {
            Some(logs) if current.as_deref() == Some(logs.pod_name.as_str()) => {
                self.logs_title = format!("Logs: {}", logs.pod_name);
                self.logs = logs.text.clone();
            }
            _ => {
                self.logs_title = "Logs".to_string();
                self.logs.clear();
            }
        }
    }
}

fn push_sample(graph: &mut GraphState, sample: GraphSample) {
    graph.push(sample.value);
    graph.set_labels(sample.header, sample.data_label);
    graph.set_upper_limit(sample.upper_limit, sample.limit_label);
}

fn allocatable_of<'a>(snapshot: &'a ClusterSnapshot, node_name: &str) -> Option<&'a Usage> {
    snapshot.allocatable.get(node_name)
}

fn summarized_samples(pod: &PodResource, snapshot: &ClusterSnapshot) -> (GraphSample, GraphSample) {
    let allocatable = allocatable_of(snapshot, &pod.node_name);
    let header = format!("Name: {}", pod.pod_name);
    let cpu = GraphSample {
        header: header.clone(),
        value: pod.usage.cpu_millicores() as f64,
        data_label: format!("Usage: {}", format_cpu(pod.usage.cpu_millicores())),
        upper_limit: allocatable.map_or(0.0, |usage| usage.cpu_millicores() as f64),
        limit_label: format!(
            "{NODE_ALLOCATABLE_LABEL}: {}",
            format_optional_cpu(allocatable.map(Usage::cpu_millicores))
        ),
    };
    let mem = GraphSample {
        header,
        value: pod.usage.memory_bytes as f64,
        data_label: format!("Usage: {}", format_memory(pod.usage.memory_bytes)),
        upper_limit: allocatable.map_or(0.0, |usage| usage.memory_bytes as f64),
        limit_label: format!(
            "{NODE_ALLOCATABLE_LABEL}: {}",
            format_optional_memory(allocatable.map(|usage| usage.memory_bytes))
        ),
    };
    (cpu, mem)
}

fn container_samples(
    container: &ContainerResource,
    snapshot: &ClusterSnapshot,
) -> (GraphSample, GraphSample) {
    let allocatable = allocatable_of(snapshot, &container.node_name);
    let header = format!("Name: {}", container.container_name);

    let (cpu_limit, cpu_label) = match container.limits.cpu_millicores {
        Some(limit) => (Some(limit), CONTAINER_LIMIT_LABEL),
        None => (
            allocatable.map(Usage::cpu_millicores),
            NODE_ALLOCATABLE_LABEL,
        ),
    };
    let (mem_limit, mem_label) = match container.limits.memory_bytes {
        Some(limit) => (Some(limit), CONTAINER_LIMIT_LABEL),
        None => (
            allocatable.map(|usage| usage.memory_bytes),
            NODE_ALLOCATABLE_LABEL,
        ),
    };

    let cpu = GraphSample {
        header: header.clone(),
        value: container.usage.cpu_millicores() as f64,
        data_label: format!("Usage: {}", format_cpu(container.usage.cpu_millicores())),
        upper_limit: cpu_limit.map_or(0.0, |limit| limit as f64),
        limit_label: format!("{cpu_label}: {}", format_optional_cpu(cpu_limit)),
    };
    let mem = GraphSample {
        header,
        value: container.usage.memory_bytes as f64,
        data_label: format!("Usage: {}", format_memory(container.usage.memory_bytes)),
        upper_limit: mem_limit.map_or(0.0, |limit| limit as f64),
        limit_label: format!("{mem_label}: {}", format_optional_memory(mem_limit)),
    };
    (cpu, mem)
}

fn node_samples(node: &NodeResource) -> (GraphSample, GraphSample) {
    let header = format!("Name: {}", node.node_name);
    let cpu = GraphSample {
        header: header.clone(),
        value: node.cpu_percent(),
        data_label: format!(
            "%Usage: {}",
            format_percent(node.usage.cpu_millicores(), node.allocatable.cpu_millicores())
        ),
        upper_limit: 100.0,
        limit_label: String::new(),
    };
    let mem = GraphSample {
        header,
        value: node.memory_percent(),
        data_label: format!(
            "%Usage: {}",
            format_percent(node.usage.memory_bytes, node.allocatable.memory_bytes)
        ),
        upper_limit: 100.0,
        limit_label: String::new(),
    };
    (cpu, mem)
}

fn normalize_status_text(status: String) -> String {
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}
