const MIB: u64 = 1_048_576;
const NANOS_PER_MILLI: u64 = 1_000_000;
const UNSET: &str = "-";

// CPU is kept in nanocores so sums over containers stay exact; millicores are
// derived (rounded up) only for display, percentages and graph values.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Usage {
    pub cpu_nanocores: u64,
    pub memory_bytes: u64,
}

impl Usage {
    pub fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self::from_nanocores(cpu_millicores.saturating_mul(NANOS_PER_MILLI), memory_bytes)
    }

    pub fn from_nanocores(cpu_nanocores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_nanocores,
            memory_bytes,
        }
    }

    pub fn cpu_millicores(&self) -> u64 {
        self.cpu_nanocores.div_ceil(NANOS_PER_MILLI)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            cpu_nanocores: self.cpu_nanocores.saturating_add(other.cpu_nanocores),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Bounds {
    pub cpu_millicores: Option<u64>,
    pub memory_bytes: Option<u64>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContainerResource {
    pub node_name: String,
    pub pod_name: String,
    pub container_name: String,
    pub usage: Usage,
    pub limits: Bounds,
    pub requests: Bounds,
}

impl ContainerResource {
    pub fn key(&self) -> String {
        format!("{}/{}", self.pod_name, self.container_name)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.pod_name.clone(),
            self.container_name.clone(),
            format_cpu(self.usage.cpu_millicores()),
            format_optional_cpu(self.limits.cpu_millicores),
            format_optional_cpu(self.requests.cpu_millicores),
            format_memory(self.usage.memory_bytes),
            format_optional_memory(self.limits.memory_bytes),
            format_optional_memory(self.requests.memory_bytes),
        ]
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodResource {
    pub pod_name: String,
    pub node_name: String,
    pub usage: Usage,
}

impl PodResource {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.pod_name.clone(),
            format_cpu(self.usage.cpu_millicores()),
            format_memory(self.usage.memory_bytes),
        ]
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NodeResource {
    pub node_name: String,
    pub capacity: Usage,
    pub allocatable: Usage,
    pub usage: Usage,
}

impl NodeResource {
    pub fn cpu_percent(&self) -> f64 {
        percentage(self.usage.cpu_millicores(), self.allocatable.cpu_millicores())
    }

    pub fn memory_percent(&self) -> f64 {
        percentage(self.usage.memory_bytes, self.allocatable.memory_bytes)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.node_name.clone(),
            format_cpu(self.allocatable.cpu_millicores()),
            format_cpu(self.usage.cpu_millicores()),
            format_percent(self.usage.cpu_millicores(), self.allocatable.cpu_millicores()),
            format_memory(self.allocatable.memory_bytes),
            format_memory(self.usage.memory_bytes),
            format_percent(self.usage.memory_bytes, self.allocatable.memory_bytes),
        ]
    }
}

pub fn mebibytes(bytes: u64) -> u64 {
    bytes / MIB
}

pub fn format_cpu(millicores: u64) -> String {
    format!("{millicores}m")
}

pub fn format_memory(bytes: u64) -> String {
    format!("{}Mi", mebibytes(bytes))
}

pub fn format_optional_cpu(millicores: Option<u64>) -> String {
    millicores.map_or_else(|| UNSET.to_string(), format_cpu)
}

pub fn format_optional_memory(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| UNSET.to_string(), format_memory)
}

pub fn percentage(usage: u64, allocatable: u64) -> f64 {
    if allocatable == 0 {
        return 0.0;
    }
    usage as f64 * 100.0 / allocatable as f64
}

pub fn percent_truncated(usage: u64, allocatable: u64) -> u64 {
    if allocatable == 0 {
        return 0;
    }
    (u128::from(usage) * 100 / u128::from(allocatable)) as u64
}

pub fn format_percent(usage: u64, allocatable: u64) -> String {
    format!("{}%", percent_truncated(usage, allocatable))
}

pub fn parse_cpu_nanocores(value: &str) -> Option<u64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(number) = raw.strip_suffix('n') {
        (number, 1.0)
    } else if let Some(number) = raw.strip_suffix('u') {
        (number, 1_000.0)
    } else if let Some(number) = raw.strip_suffix('m') {
        (number, 1_000_000.0)
    } else {
        (raw, 1_000_000_000.0)
    };

    let nanocores = (number.parse::<f64>().ok()? * multiplier).round();
    if !nanocores.is_finite() || nanocores < 0.0 {
        return None;
    }
    Some(nanocores as u64)
}

pub fn parse_cpu_millicores(value: &str) -> Option<u64> {
    parse_cpu_nanocores(value).map(|nanocores| nanocores.div_ceil(NANOS_PER_MILLI))
}

pub fn parse_memory_bytes(value: &str) -> Option<u64> {
    const BINARY_UNITS: [(&str, f64); 6] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
    ];
    const DECIMAL_UNITS: [(&str, f64); 7] = [
        ("E", 1_000_000_000_000_000_000.0),
        ("P", 1_000_000_000_000_000.0),
        ("T", 1_000_000_000_000.0),
        ("G", 1_000_000_000.0),
        ("M", 1_000_000.0),
        ("k", 1_000.0),
        ("K", 1_000.0),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = BINARY_UNITS
        .iter()
        .chain(DECIMAL_UNITS.iter())
        .find_map(|(suffix, multiplier)| {
            raw.strip_suffix(suffix).map(|number| (number, *multiplier))
        })
        .or_else(|| raw.strip_suffix('m').map(|number| (number, 0.001)))
        .unwrap_or((raw, 1.0));

    let bytes = (number.parse::<f64>().ok()? * multiplier).round();
    if !bytes.is_finite() || bytes < 0.0 {
        return None;
    }
    Some(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_quantities_normalize_to_millicores() {
        assert_eq!(parse_cpu_millicores("250m"), Some(250));
        assert_eq!(parse_cpu_millicores("2"), Some(2000));
        assert_eq!(parse_cpu_millicores("0.5"), Some(500));
        assert_eq!(parse_cpu_millicores("2000000n"), Some(2));
        assert_eq!(parse_cpu_millicores("1000u"), Some(1));
        assert_eq!(parse_cpu_millicores("1400000n"), Some(2));
        assert_eq!(parse_cpu_millicores(""), None);
        assert_eq!(parse_cpu_millicores("lots"), None);
        assert_eq!(parse_cpu_nanocores("350000n"), Some(350_000));
        assert_eq!(parse_cpu_nanocores("0.25"), Some(250_000_000));
    }

    #[test]
    fn sub_millicore_usage_is_summed_before_rounding_up() {
        let container = Usage::from_nanocores(1_400_000, 0);
        let pod = container.saturating_add(container);
        assert_eq!(container.cpu_millicores(), 2);
        assert_eq!(pod.cpu_millicores(), 3);

        let tenth = Usage::from_nanocores(400_000, 0);
        let total = (0..10).fold(Usage::default(), |total, _| total.saturating_add(tenth));
        assert_eq!(total.cpu_millicores(), 4);
        assert_eq!(Usage::default().cpu_millicores(), 0);
    }

    #[test]
    fn memory_quantities_normalize_to_bytes() {
        assert_eq!(parse_memory_bytes("4096Mi"), Some(4_294_967_296));
        assert_eq!(parse_memory_bytes("1Gi"), Some(1_073_741_824));
        assert_eq!(parse_memory_bytes("128974848"), Some(128_974_848));
        assert_eq!(parse_memory_bytes("129e6"), Some(129_000_000));
        assert_eq!(parse_memory_bytes("123M"), Some(123_000_000));
        assert_eq!(parse_memory_bytes("2k"), Some(2_000));
        assert_eq!(parse_memory_bytes("-1Ki"), None);
    }

    #[test]
    fn memory_is_rendered_in_truncated_mebibytes() {
        assert_eq!(format_memory(2_147_483_648), "2048Mi");
        assert_eq!(format_memory(MIB * 3 - 1), "2Mi");
        assert_eq!(format_optional_memory(None), "-");
    }

    #[test]
    fn percentage_is_exact_and_tolerates_zero_allocatable() {
        assert_eq!(percentage(500, 1000), 50.0);
        assert_eq!(format_percent(500, 1000), "50%");
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(format_percent(0, 0), "0%");
        assert_eq!(format_percent(2, 3), "66%");
    }

    #[test]
    fn node_percent_uses_raw_bytes_not_rounded_mebibytes() {
        let node = NodeResource {
            node_name: "n1".to_string(),
            capacity: Usage::default(),
            allocatable: Usage::new(1000, MIB * 2),
            usage: Usage::new(0, MIB + MIB / 2),
        };
        assert_eq!(node.memory_percent(), 75.0);
        assert_eq!(node.to_row()[6], "75%");
    }

    #[test]
    fn container_row_shows_placeholders_for_unset_bounds() {
        let container = ContainerResource {
            node_name: "n1".to_string(),
            pod_name: "p1".to_string(),
            container_name: "a".to_string(),
            usage: Usage::new(100, 50 * MIB),
            limits: Bounds {
                cpu_millicores: Some(500),
                memory_bytes: None,
            },
            requests: Bounds::default(),
        };

        assert_eq!(
            container.to_row(),
            vec!["p1", "a", "100m", "500m", "-", "50Mi", "-", "-"]
        );
        assert_eq!(container.key(), "p1/a");
    }
}
