mod backup;
mod calc;
mod config;
mod csv_export;
mod db;
mod ipc;
mod model;
mod report;
mod state;
mod store;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use config::Config;
use report::{CommandGenerator, ReportGenerator};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let generator: Option<Box<dyn ReportGenerator>> = cfg
        .generator_cmd
        .as_deref()
        .and_then(CommandGenerator::from_command_line)
        .map(|g| Box::new(g) as Box<dyn ReportGenerator>);
    if generator.is_none() {
        warn!("no report generator configured, reports.generate will be unavailable");
    }

    let mut state = ipc::AppState::new(cfg.user_id.clone(), generator);
    if let Some(workspace) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, workspace) {
            error!(workspace = %workspace.display(), error = %format!("{e:#}"), "failed to open workspace");
        }
    }
    info!(user_id = %state.user_id, "classbookd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "dropping malformed request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    ExitCode::SUCCESS
}
