mod cli;
mod config;
mod graph;
mod input;
mod k8s;
mod model;
mod monitor;
mod pipeline;
mod table;
mod ui;
mod viewer;

use anyhow::{Context, Result};
use clap::Parser;
use cli::CliArgs;
use config::{Settings, Theme};
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use k8s::{KubeGateway, KubeTargetOptions};
use monitor::{ClusterInfo, Monitor};
use pipeline::{Aggregator, ClusterSnapshot, Queries};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

struct LoopConfig {
    interval: Duration,
    max_failures: u32,
    theme: Theme,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let queries = Queries::compile(&args.pod_query, &args.container_query, &args.node_query)?;
    let settings = Settings::discover()?;
    if let Some(source) = &settings.source {
        debug!("settings loaded from {source}");
    }

    let gateway = KubeGateway::new(&KubeTargetOptions {
        kubeconfig: args.kubeconfig.clone(),
        context: args.context.clone(),
        cluster: args.cluster.clone(),
        user: args.user.clone(),
    })
    .await?;
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| gateway.default_namespace().to_string());
    info!(
        cluster = gateway.cluster(),
        context = gateway.context(),
        namespace = %namespace,
        "monitoring cluster"
    );

    let aggregator = Aggregator::new(queries, namespace.clone())
        .with_selectors(args.selector.clone(), args.node_selector.clone())
        .with_log_lines(settings.logs.tail_lines);
    let mut monitor = Monitor::new(
        ClusterInfo {
            cluster: gateway.cluster().to_string(),
            context: gateway.context().to_string(),
            namespace,
        },
        &settings,
    );
    let config = LoopConfig {
        interval: args.interval,
        max_failures: args.max_failures,
        theme: settings.theme,
    };

    run(&mut monitor, gateway, Arc::new(aggregator), &config).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

async fn run(
    monitor: &mut Monitor,
    gateway: KubeGateway,
    aggregator: Arc<Aggregator>,
    config: &LoopConfig,
) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, monitor, gateway, aggregator, config).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    monitor: &mut Monitor,
    gateway: KubeGateway,
    aggregator: Arc<Aggregator>,
    config: &LoopConfig,
) -> Result<()> {
    let mut reader = EventStream::new();
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel::<Result<ClusterSnapshot>>();
    let mut refresh_in_flight = false;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        terminal
            .draw(|frame| ui::render(frame, monitor, &config.theme))
            .context("failed to render terminal frame")?;

        if !monitor.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(key) {
                            debug!("action={action:?}");
                            monitor.apply_action(action);
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        monitor.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        monitor.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                if refresh_in_flight {
                    debug!("previous refresh still running, tick skipped");
                } else {
                    refresh_in_flight = true;
                    spawn_refresh(&gateway, &aggregator, monitor.log_target(), refresh_tx.clone());
                }
            }
            Some(result) = refresh_rx.recv() => {
                refresh_in_flight = false;
                match result {
                    Ok(snapshot) => monitor.apply(snapshot),
                    Err(error) => {
                        let failures = monitor.record_failure(&compact_error(&error));
                        warn!(failures, error = %format!("{error:#}"), "refresh failed");
                        if config.max_failures > 0 && failures >= config.max_failures {
                            return Err(error.context(format!(
                                "giving up after {failures} consecutive failed refreshes"
                            )));
                        }
                    }
                }
            }
            _ = &mut shutdown => {
                info!("received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

fn spawn_refresh(
    gateway: &KubeGateway,
    aggregator: &Arc<Aggregator>,
    log_target: Option<String>,
    tx: mpsc::UnboundedSender<Result<ClusterSnapshot>>,
) {
    let gateway = gateway.clone();
    let aggregator = Arc::clone(aggregator);
    tokio::spawn(async move {
        let result = aggregator.update(&gateway, log_target.as_deref()).await;
        let _ = tx.send(result);
    });
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join(" | ")
}
