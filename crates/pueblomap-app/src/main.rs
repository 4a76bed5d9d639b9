//! Main application entry point.

use clap::Parser;
use pueblomap_app::session::load_elements;
use pueblomap_app::{AppError, ReplayReport, Session, ShortcutRegistry, run_session};
use pueblomap_core::{EditorConfig, HttpGateway, MapEditor, MemoryGateway};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pueblomap", about = "Replay a PuebloMap editor session")]
struct Cli {
    /// Config file (defaults to the user config directory).
    #[arg(long, env = "PUEBLOMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Element snapshot to edit offline.
    #[arg(long, conflicts_with = "remote")]
    elements: Option<PathBuf>,

    /// Load elements from and save to the configured map service.
    #[arg(long)]
    remote: bool,

    /// Print shortcuts and exit.
    #[arg(long)]
    shortcuts: bool,

    /// Recorded session to replay.
    #[arg(required_unless_present = "shortcuts")]
    session: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting PuebloMap");

    let cli = Cli::parse();
    if cli.shortcuts {
        ShortcutRegistry::print_all();
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = EditorConfig::load_or_default(cli.config.as_deref())?;
    let Some(session_path) = cli.session else {
        return Ok(());
    };
    let session = Session::load(&session_path)?;

    let report = if cli.remote {
        let gateway = Arc::new(HttpGateway::new(&config.gateway_url)?);
        log::info!("Using map service at {}", gateway.base_url());
        let mut editor = MapEditor::new(config, Arc::clone(&gateway), session.surface.size());
        editor.refresh(gateway.as_ref()).await?;
        run_session(&mut editor, &session).await?
    } else {
        let snapshot = match &cli.elements {
            Some(path) => load_elements(path)?,
            None => session.elements.clone().unwrap_or_default(),
        };
        let gateway = Arc::new(MemoryGateway::with_snapshot(snapshot.clone()));
        let mut editor = MapEditor::new(config, gateway, session.surface.size());
        editor.load_snapshot(snapshot);
        run_session(&mut editor, &session).await?
    };

    print_report(&report)
}

fn print_report(report: &ReplayReport) -> Result<(), AppError> {
    let saved = report.commits.iter().filter(|c| c.saved).count();
    log::info!(
        "Replayed {} steps, {} of {} moves saved",
        report.steps,
        saved,
        report.commits.len()
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
