use std::io::{BufRead, Write};

use bim_viewer_lib::command::{execute_json, execute_json_batch};
use bim_viewer_lib::harness::TestHarness;
use bim_viewer_lib::server::StaticServer;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bim_viewer=info".into()),
        )
        .init();

    let mut harness = match parse_project_arg() {
        Some(server) => TestHarness::with_server(server),
        None => TestHarness::new(),
    };

    // One command (object) or batch (array) per line, one response line each
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {e}");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = if trimmed.starts_with('[') {
            execute_json_batch(&mut harness, trimmed).and_then(|r| {
                serde_json::to_string(&r).map_err(|e| e.to_string())
            })
        } else {
            execute_json(&mut harness, trimmed).and_then(|r| {
                serde_json::to_string(&r).map_err(|e| e.to_string())
            })
        };
        let out = response.unwrap_or_else(|e| {
            serde_json::json!({ "success": false, "error": e }).to_string()
        });
        if writeln!(stdout, "{out}").and_then(|_| stdout.flush()).is_err() {
            break;
        }
    }
}

/// `--project <path>`: serve the project document at `path` instead of the
/// built-in fixture building
fn parse_project_arg() -> Option<StaticServer> {
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--project" && i + 1 < args.len() {
            let path = &args[i + 1];
            match std::fs::read_to_string(path) {
                Ok(json) => match StaticServer::from_json(&json) {
                    Ok(server) => {
                        tracing::info!("Serving project from {path}");
                        return Some(server);
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse project JSON from {path}: {e}");
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read project file {path}: {e}");
                }
            }
            break;
        }
        i += 1;
    }
    None
}
