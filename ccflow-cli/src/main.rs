use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use ccflow_core::{
    CcflowError, ClaudeRoot, SessionLocator, is_session_id, parse_session, render_json,
    session_id_from_path,
};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "ccflow",
    version,
    about = "Reconstruct Claude Code session logs into structured conversation JSON"
)]
struct Cli {
    /// Path to a session .jsonl file, or a session UUID to look up under the Claude data root
    session: String,

    /// Emit JSON without indentation
    #[arg(long)]
    compact: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> ccflow_core::Result<()> {
    let path = session_path(&cli.session)?;
    debug!(path = %path.display(), "reading session log");

    let document = parse_session(&path)?;
    let json = render_json(&document, &session_id_from_path(&path), cli.compact)?;

    match cli.output {
        Some(output) => fs::write(&output, json).map_err(|source| CcflowError::Io {
            path: output.clone(),
            source,
        })?,
        None => println!("{json}"),
    }

    Ok(())
}

/// Existing paths are used as given; anything shaped like a session id is
/// looked up.
fn session_path(session: &str) -> ccflow_core::Result<PathBuf> {
    let path = PathBuf::from(session);
    if path.exists() || !is_session_id(session) {
        return Ok(path);
    }

    let root = ClaudeRoot::from_env_or_home()?;
    let resolved = SessionLocator::new(&root).resolve(session)?;
    for warning in &resolved.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(resolved.path)
}
