use std::time::{Duration, Instant};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sira_client::config::{Config, LogFormat, MAX_QUERY_TIMEOUT_MS, MIN_QUERY_TIMEOUT_MS};
use sira_client::controller::{Completion, SubmissionController};
use sira_client::error::QueryError;
use sira_client::metrics::{MetricsPoller, PollerHandle};
use sira_client::trace::{default_expanded, render, TraceToggles, TraceView};
use sira_client::SiraClient;

/// Interactive console client for the SIRA reasoning backend.
#[derive(Debug, Parser)]
#[command(name = "sira-client", version, about)]
struct Cli {
    /// Backend base URL (overrides SIRA_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Query timeout ceiling in seconds (overrides QUERY_TIMEOUT_MS)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(secs) = cli.timeout_secs {
        config.query.timeout_ms = (secs * 1000).clamp(MIN_QUERY_TIMEOUT_MS, MAX_QUERY_TIMEOUT_MS);
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.backend.base_url,
        "SIRA client starting..."
    );

    let client = match SiraClient::new(&config.backend) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to initialize HTTP client");
            return Err(e.into());
        }
    };

    let mut controller = SubmissionController::new(config.query.clone());
    let mut toggles = TraceToggles::new();

    // Metrics poller lives for the duration of the interactive loop
    let poller = MetricsPoller::spawn(client.clone(), config.metrics.clone());

    println!("SIRA - Self-Improving Reasoning Agent");
    println!("Type a query, or :history, :metrics, :session, :health, :toggle <step>, :clear, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            ":quit" | ":q" => break,
            ":clear" => {
                controller.clear();
                println!("Conversation cleared.");
            }
            ":history" => print_history(&controller),
            ":metrics" => print_metrics(&poller),
            ":session" => print_session(&controller, &client).await,
            ":health" => match client.health().await {
                Ok(health) => println!("{} {} ({})", health.service, health.version, health.status),
                Err(e) => println!("Health check failed: {}", e),
            },
            cmd if cmd.starts_with(":toggle") => {
                toggle_step(&controller, &mut toggles, cmd.trim_start_matches(":toggle").trim());
            }
            text => {
                submit_and_render(&mut controller, &client, &mut toggles, text).await;
            }
        }
    }

    poller.stop();
    info!("Client shutdown complete");
    Ok(())
}

/// Submit one query, showing elapsed progress while it runs, and render
/// the outcome.
async fn submit_and_render(
    controller: &mut SubmissionController,
    client: &SiraClient,
    toggles: &mut TraceToggles,
    text: &str,
) {
    let pending = match controller.begin_submit(text) {
        Ok(pending) => pending,
        Err(rejection) => {
            println!("{}", rejection);
            return;
        }
    };
    let ceiling = controller.timeout();

    let request = tokio::time::timeout(ceiling, client.submit_query(&pending.request));
    tokio::pin!(request);
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await; // first tick is immediate, skip it

    // Progress display is cosmetic; the state machine only sees the
    // final completion.
    let outcome = loop {
        tokio::select! {
            result = &mut request => {
                break match result {
                    Ok(outcome) => outcome,
                    Err(_) => Err(QueryError::Timeout {
                        timeout_ms: ceiling.as_millis() as u64,
                    }),
                };
            }
            _ = ticker.tick() => {
                if let Some(progress) = controller.progress(Instant::now()) {
                    if progress.slow {
                        println!(
                            "Still working... {}s elapsed (taking longer than usual)",
                            progress.elapsed.as_secs()
                        );
                    } else {
                        println!("Processing... {}s elapsed", progress.elapsed.as_secs());
                    }
                }
            }
        }
    };

    match controller.complete(pending.token, outcome) {
        Completion::Applied => {
            if let Some(result) = controller.latest_result() {
                toggles.retain_result(result.id());
                print_trace(&render(result, toggles));
            }
        }
        Completion::Failed => {
            if let Some(error) = controller.last_error() {
                println!("Error: {}", error);
            }
        }
        // Only possible when the conversation was cleared mid-flight
        Completion::Stale => {}
    }
}

/// Flip the expand state of one step of the latest result and redraw.
fn toggle_step(controller: &SubmissionController, toggles: &mut TraceToggles, arg: &str) {
    let Some(result) = controller.latest_result() else {
        println!("No result to toggle.");
        return;
    };
    let Ok(step_number) = arg.parse::<u32>() else {
        println!("Usage: :toggle <step number>");
        return;
    };

    let view = render(result, toggles);
    let Some(position) = view
        .steps
        .iter()
        .position(|s| s.step_number == step_number)
    else {
        println!("No step {} in the current trace.", step_number);
        return;
    };

    toggles.toggle(result.id(), step_number, default_expanded(position));
    print_trace(&render(result, toggles));
}

fn print_trace(view: &TraceView) {
    println!();
    println!("Overall Quality: {:.0}%", view.quality_score * 100.0);
    match view.patterns_retrieved_count {
        Some(count) => println!("Patterns Retrieved: {}", count),
        None => println!("Patterns Retrieved: N/A"),
    }
    for step in &view.steps {
        let marker = if step.expanded { "v" } else { ">" };
        print!("{} Step {}: {}", marker, step.step_number, step.title);
        if let Some(quality) = step.quality_score {
            print!("  (quality {:.0}%)", quality * 100.0);
        }
        println!();
        if step.expanded {
            if let Some(reasoning) = &step.reasoning {
                println!("    Reasoning: {}", reasoning);
            }
            if let Some(result) = &step.result {
                println!("    Result: {}", result);
            }
            if !step.patterns_used.is_empty() {
                println!("    Patterns: {}", step.patterns_used.join(", "));
            }
        }
    }
    println!();
    println!("{}", view.response);
    println!();
}

fn print_history(controller: &SubmissionController) {
    let turns = controller.store().turns();
    if turns.is_empty() {
        println!("No conversation yet.");
        return;
    }
    if let Some(session) = controller.session_id() {
        println!("Session: {}", session);
    }
    for turn in turns {
        println!("[{}] You: {}", turn.timestamp.format("%H:%M:%S"), turn.query);
        match turn.quality_score {
            Some(q) => println!("SIRA ({:.0}%): {}", q * 100.0, turn.response),
            None => println!("SIRA: {}", turn.response),
        }
    }
}

/// Show the backend's view of the bound session.
async fn print_session(controller: &SubmissionController, client: &SiraClient) {
    let Some(session_id) = controller.session_id() else {
        println!("No session bound yet.");
        return;
    };
    match client.get_session(session_id).await {
        Ok(session) => println!(
            "Session {} - {} queries, last activity {}",
            session.id, session.query_count, session.last_activity
        ),
        Err(e) => println!("Session lookup failed: {}", e),
    }
}

fn print_metrics(poller: &PollerHandle) {
    let display = poller.latest();
    match &display.snapshot {
        None => println!("Metrics unavailable."),
        Some(m) => {
            println!("Total Queries:       {}", fmt_count(m.total_queries));
            println!("Avg Quality:         {}", fmt_rate(m.avg_quality));
            println!("Avg Latency:         {}", fmt_latency(m.avg_latency_ms));
            println!("Patterns Stored:     {}", fmt_count(m.pattern_library_size));
            println!("Pattern Reuse Rate:  {}", fmt_rate(m.pattern_reuse_rate));
            println!("Cache Hit Rate:      {}", fmt_rate(m.cache_hit_rate));
        }
    }
    if let Some(error) = &display.fetch_error {
        println!("(last fetch failed: {})", error);
    }
}

fn fmt_count(value: Option<u64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn fmt_rate(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn fmt_latency(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.1}s", v / 1000.0))
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
