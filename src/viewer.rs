use std::cmp::Ordering;

use crate::model::{ContainerResource, NodeResource, PodResource};

const INDENT: u16 = 4;
const NUMERIC_WIDTH: u16 = 10;
const PLACEHOLDER_MESSAGE: &str = "No data points";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ViewMode {
    Summarized,
    All,
    Node,
}

impl ViewMode {
    pub const ROTATION: [Self; 3] = [Self::Summarized, Self::All, Self::Node];

    fn position(self) -> usize {
        match self {
            Self::Summarized => 0,
            Self::All => 1,
            Self::Node => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ROTATION[(self.position() + 1) % Self::ROTATION.len()]
    }

    pub fn previous(self) -> Self {
        let len = Self::ROTATION.len();
        Self::ROTATION[(self.position() + len - 1) % len]
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Summarized => "⎈ Pod ⎈",
            Self::All => "⎈ Pod/Container ⎈",
            Self::Node => "⎈ Node ⎈",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Summarized => "summarized",
            Self::All => "all",
            Self::Node => "node",
        }
    }

    pub fn empty_shape(self, width: u16) -> TableShape {
        let (header, widths) = match self {
            Self::Summarized => (SUMMARIZED_HEADER.as_slice(), summarized_widths(width, 0)),
            Self::All => (ALL_HEADER.as_slice(), all_widths(width, 0, 0)),
            Self::Node => (NODE_HEADER.as_slice(), node_widths(width, 0)),
        };
        TableShape {
            title: self.title().to_string(),
            header: header.iter().map(|title| title.to_string()).collect(),
            widths,
            rows: Vec::new(),
            keys: Vec::new(),
            placeholder: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Cpu,
    Memory,
}

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            Self::Name => Self::Cpu,
            Self::Cpu => Self::Memory,
            Self::Memory => Self::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableShape {
    pub title: String,
    pub header: Vec<String>,
    pub widths: Vec<u16>,
    pub rows: Vec<Vec<String>>,
    pub keys: Vec<String>,
    pub placeholder: bool,
}

pub trait TableViewer {
    fn sort_rows(&mut self);
    fn table_shape(&self, width: u16) -> TableShape;
}

const SUMMARIZED_HEADER: [&str; 3] = ["POD", "CPU(U)", "Memory(U)"];
const ALL_HEADER: [&str; 8] = [
    "POD",
    "CONTAINER",
    "CPU(U)",
    "CPU(L)",
    "CPU(R)",
    "Memory(U)",
    "Memory(L)",
    "Memory(R)",
];
const NODE_HEADER: [&str; 7] = [
    "NODE",
    "CPU(A)",
    "CPU(U)",
    "%CPU",
    "Memory(A)",
    "Memory(U)",
    "%Memory",
];

/// `max(min_width, min(available - reserved, longest + INDENT))`: the floor
/// wins when the terminal is too narrow for both.
fn name_width(available: u16, reserved: u16, longest: usize, min_width: u16) -> u16 {
    let wanted = u16::try_from(longest)
        .unwrap_or(u16::MAX)
        .saturating_add(INDENT);
    wanted.min(available.saturating_sub(reserved)).max(min_width)
}

fn summarized_widths(width: u16, longest: usize) -> Vec<u16> {
    vec![name_width(width, 20, longest, 50), NUMERIC_WIDTH, NUMERIC_WIDTH]
}

fn all_widths(width: u16, longest_pod: usize, longest_container: usize) -> Vec<u16> {
    let mut widths = vec![
        name_width(width, 60, longest_pod, 40),
        name_width(width, 60, longest_container, 30),
    ];
    widths.extend([NUMERIC_WIDTH; 6]);
    widths
}

fn node_widths(width: u16, longest: usize) -> Vec<u16> {
    let mut widths = vec![name_width(width, 20, longest, 50)];
    widths.extend([NUMERIC_WIDTH; 6]);
    widths
}

fn placeholder_shape(title: &str, width: u16) -> TableShape {
    TableShape {
        title: title.to_string(),
        header: vec!["Message".to_string()],
        widths: vec![width.saturating_sub(1).max(1)],
        rows: vec![vec![PLACEHOLDER_MESSAGE.to_string()]],
        keys: Vec::new(),
        placeholder: true,
    }
}

fn longest(rows: &[Vec<String>], column: usize) -> usize {
    rows.iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.chars().count())
        .max()
        .unwrap_or(0)
}

fn by_usage_desc(left: u64, right: u64) -> Ordering {
    right.cmp(&left)
}

pub struct SummarizedViewer<'a> {
    pods: &'a mut [PodResource],
    sort_key: SortKey,
}

impl<'a> SummarizedViewer<'a> {
    pub fn new(pods: &'a mut [PodResource], sort_key: SortKey) -> Self {
        Self { pods, sort_key }
    }
}

impl TableViewer for SummarizedViewer<'_> {
    fn sort_rows(&mut self) {
        let by_name = |left: &PodResource, right: &PodResource| left.pod_name.cmp(&right.pod_name);
        match self.sort_key {
            SortKey::Name => self.pods.sort_by(by_name),
            SortKey::Cpu => self.pods.sort_by(|left, right| {
                by_usage_desc(left.usage.cpu_nanocores, right.usage.cpu_nanocores)
                    .then_with(|| by_name(left, right))
            }),
            SortKey::Memory => self.pods.sort_by(|left, right| {
                by_usage_desc(left.usage.memory_bytes, right.usage.memory_bytes)
                    .then_with(|| by_name(left, right))
            }),
        }
    }

    fn table_shape(&self, width: u16) -> TableShape {
        let title = ViewMode::Summarized.title();
        if self.pods.is_empty() {
            return placeholder_shape(title, width);
        }

        let rows = self.pods.iter().map(PodResource::to_row).collect::<Vec<_>>();
        TableShape {
            title: title.to_string(),
            header: SUMMARIZED_HEADER.iter().map(|h| h.to_string()).collect(),
            widths: summarized_widths(width, longest(&rows, 0)),
            keys: self.pods.iter().map(|pod| pod.pod_name.clone()).collect(),
            rows,
            placeholder: false,
        }
    }
}

pub struct AllViewer<'a> {
    containers: &'a mut [ContainerResource],
    sort_key: SortKey,
}

impl<'a> AllViewer<'a> {
    pub fn new(containers: &'a mut [ContainerResource], sort_key: SortKey) -> Self {
        Self {
            containers,
            sort_key,
        }
    }
}

impl TableViewer for AllViewer<'_> {
    fn sort_rows(&mut self) {
        let by_name = |left: &ContainerResource, right: &ContainerResource| {
            left.pod_name
                .cmp(&right.pod_name)
                .then_with(|| left.container_name.cmp(&right.container_name))
        };
        match self.sort_key {
            SortKey::Name => self.containers.sort_by(by_name),
            SortKey::Cpu => self.containers.sort_by(|left, right| {
                by_usage_desc(left.usage.cpu_nanocores, right.usage.cpu_nanocores)
                    .then_with(|| by_name(left, right))
            }),
            SortKey::Memory => self.containers.sort_by(|left, right| {
                by_usage_desc(left.usage.memory_bytes, right.usage.memory_bytes)
                    .then_with(|| by_name(left, right))
            }),
        }
    }

    fn table_shape(&self, width: u16) -> TableShape {
        let title = ViewMode::All.title();
        if self.containers.is_empty() {
            return placeholder_shape(title, width);
        }

        let rows = self
            .containers
            .iter()
            .map(ContainerResource::to_row)
            .collect::<Vec<_>>();
        TableShape {
            title: title.to_string(),
            header: ALL_HEADER.iter().map(|h| h.to_string()).collect(),
            widths: all_widths(width, longest(&rows, 0), longest(&rows, 1)),
            keys: self.containers.iter().map(ContainerResource::key).collect(),
            rows,
            placeholder: false,
        }
    }
}

pub struct NodeViewer<'a> {
    nodes: &'a mut [NodeResource],
    sort_key: SortKey,
}

impl<'a> NodeViewer<'a> {
    pub fn new(nodes: &'a mut [NodeResource], sort_key: SortKey) -> Self {
        Self { nodes, sort_key }
    }
}

impl TableViewer for NodeViewer<'_> {
    fn sort_rows(&mut self) {
        let by_name =
            |left: &NodeResource, right: &NodeResource| left.node_name.cmp(&right.node_name);
        match self.sort_key {
            SortKey::Name => self.nodes.sort_by(by_name),
            SortKey::Cpu => self.nodes.sort_by(|left, right| {
                by_usage_desc(left.usage.cpu_nanocores, right.usage.cpu_nanocores)
                    .then_with(|| by_name(left, right))
            }),
            SortKey::Memory => self.nodes.sort_by(|left, right| {
                by_usage_desc(left.usage.memory_bytes, right.usage.memory_bytes)
                    .then_with(|| by_name(left, right))
            }),
        }
    }

    fn table_shape(&self, width: u16) -> TableShape {
        let title = ViewMode::Node.title();
        if self.nodes.is_empty() {
            return placeholder_shape(title, width);
        }

        let rows = self.nodes.iter().map(NodeResource::to_row).collect::<Vec<_>>();
        TableShape {
            title: title.to_string(),
            header: NODE_HEADER.iter().map(|h| h.to_string()).collect(),
            widths: node_widths(width, longest(&rows, 0)),
            keys: self.nodes.iter().map(|node| node.node_name.clone()).collect(),
            rows,
            placeholder: false,
        }
    }
}
