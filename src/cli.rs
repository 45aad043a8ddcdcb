use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "ktop",
    version,
    about = "A top-like resource monitor for Kubernetes clusters."
)]
pub struct CliArgs {
    /// Polling interval (for example: 500ms, 1s, 2m; bare numbers are seconds)
    #[arg(short, long, default_value = "1s", value_parser = parse_interval)]
    pub interval: Duration,

    /// Regular expression selecting nodes by name
    #[arg(short = 'N', long, default_value = ".*")]
    pub node_query: String,

    /// Regular expression selecting pods by name
    #[arg(short = 'P', long, default_value = ".*")]
    pub pod_query: String,

    /// Regular expression selecting containers by name
    #[arg(short = 'C', long, default_value = ".*")]
    pub container_query: String,

    /// Namespace to watch (defaults to the kubeconfig context namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Kubeconfig cluster to use
    #[arg(long)]
    pub cluster: Option<String>,

    /// Kubeconfig user to use
    #[arg(long)]
    pub user: Option<String>,

    /// Path to a kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Label selector for pods and pod metrics
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Label selector for nodes and node metrics
    #[arg(long)]
    pub node_selector: Option<String>,

    /// Consecutive failed refreshes before exiting (0 keeps retrying)
    #[arg(long, default_value_t = 3)]
    pub max_failures: u32,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Append tracing output to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub fn parse_interval(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    let (number, unit) = match value.find(|c: char| !(c.is_ascii_digit() || c == '.')) {
        Some(split) => value.split_at(split),
        None => (value, "s"),
    };

    let amount = number
        .parse::<f64>()
        .map_err(|_| format!("invalid interval {raw:?}"))?;
    let seconds = match unit {
        "ms" => amount / 1_000.0,
        "s" => amount,
        "m" => amount * 60.0,
        "h" => amount * 3_600.0,
        _ => return Err(format!("unknown interval unit {unit:?} in {raw:?}")),
    };

    let interval = Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("invalid interval {raw:?}"))?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}
