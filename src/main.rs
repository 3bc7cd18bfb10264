//! AutoReview - Entry Point
//!
//! Runs the writer/retriever/reviewer loop on one topic and prints how it ended.

use anyhow::Context;
use autoreview::{Config, OpenAiCompatClient, WorkflowOrchestrator};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Value following `flag`; a flag with no value is an error
fn flag_value<'a>(args: &'a [String], flag: &str) -> anyhow::Result<Option<&'a str>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };

    match args.get(pos + 1) {
        Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
        _ => anyhow::bail!("Missing value for {}", flag),
    }
}

fn print_help() {
    println!("AutoReview v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: autoreview [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --topic <TEXT>      Literature review topic");
    println!("  --max-iter <N>      Maximum review iterations (default: 5)");
    println!("  --workdir <PATH>    Working directory (default: ./workspace)");
    println!("  --json              Log as JSON lines on stderr");
    println!("  --help, -h          Show this help");
    println!();
    println!("Environment variables:");
    println!("  AUTOREVIEW_API_KEY        Inference endpoint API key");
    println!("  AUTOREVIEW_API_BASE       Endpoint base URL (default: https://api.deepseek.com)");
    println!("  AUTOREVIEW_MODEL          Model name (default: deepseek-chat)");
    println!("  AUTOREVIEW_TOPIC          Default topic");
    println!("  AUTOREVIEW_MAX_TOOL_ROUNDS  Tool rounds per agent run (default: 25)");
    println!("  RUST_LOG                  trace|debug|info|warn|error");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let json_logs = args.iter().any(|a| a == "--json");

    if help_mode {
        print_help();
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let mut config = Config::from_env()?;
    if let Some(topic) = flag_value(&args, "--topic")? {
        config = config.with_topic(topic);
    }
    if let Some(raw) = flag_value(&args, "--max-iter")? {
        let max_iter: u32 = raw
            .parse()
            .with_context(|| format!("Invalid --max-iter value: {}", raw))?;
        config = config.with_max_iterations(max_iter);
    }
    if let Some(workdir) = flag_value(&args, "--workdir")? {
        config = config.with_workdir(workdir);
    }

    info!("AutoReview v{}", env!("CARGO_PKG_VERSION"));
    info!("Topic: {} | model: {} | workdir: {}", config.topic, config.model, config.workdir.display());

    let endpoint = Arc::new(OpenAiCompatClient::from_config(&config)?);
    let mut orchestrator = WorkflowOrchestrator::from_config(&config, endpoint)?;

    let outcome = orchestrator.run().await?;

    for report in &outcome.iterations {
        println!(
            "Iteration {}: score {}{}",
            report.iteration,
            report.score,
            report
                .retrieval
                .as_deref()
                .map(|q| format!(" (retrieved: {})", q))
                .unwrap_or_default()
        );
    }
    println!("{}", outcome.terminal);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_value() {
        let argv = args(&["autoreview", "--topic", "Diffusion models", "--json"]);
        assert_eq!(flag_value(&argv, "--topic").unwrap(), Some("Diffusion models"));
        assert_eq!(flag_value(&argv, "--workdir").unwrap(), None);
    }

    #[test]
    fn test_flag_without_value_is_rejected() {
        let followed_by_flag = args(&["autoreview", "--topic", "--json"]);
        assert!(flag_value(&followed_by_flag, "--topic").is_err());

        let trailing = args(&["autoreview", "--max-iter"]);
        let err = flag_value(&trailing, "--max-iter").unwrap_err();
        assert!(err.to_string().contains("--max-iter"));
    }
}
