//! portico - terminal sign-in and sign-up for portico accounts.
//!
//! Signs in against the authentication API, keeps the issued bearer token in
//! origin-scoped storage, and reports who is signed in.

mod app;
mod cli;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{describe, App};
use cli::{parse_args, Command, USAGE};

/// Directory for log files; logs go to stderr when unset
const LOG_DIR_ENV: &str = "PORTICO_LOG_DIR";

const LOG_FILE_NAME: &str = "portico.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut app = App::new()?;
    info!(?command, "portico starting");

    if let Err(e) = run(&mut app, command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Status { json } => {
            let session = app.session()?;
            let state = session.state();
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("{}", describe(&state));
                if let Some(minutes) = session.minutes_until_expiry() {
                    println!("Session expires in {} minutes", minutes);
                }
            }
        }
        Command::Login { email } => {
            let state = app.login_interactive(email).await?;
            println!("{}", describe(&state));
        }
        Command::Register => {
            let state = app.register_interactive().await?;
            println!("{}", describe(&state));
        }
        Command::Logout => {
            let state = app.logout()?;
            println!("{}", describe(&state));
        }
        Command::Header => {
            let session = app.session()?;
            // Re-check before handing the token to another tool
            if session.refresh_user().is_logged_in() {
                for (name, value) in session.credentials().auth_header().iter() {
                    println!("{}: {}", name, value.to_str()?);
                }
            } else {
                eprintln!("Not signed in");
            }
        }
        Command::Get { path } => {
            let session = app.session()?;
            if !session.refresh_user().is_logged_in() {
                eprintln!("Warning: not signed in, sending request without credentials");
            }
            let body: serde_json::Value = app.api().get_json(&path, session.credentials()).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Help => println!("{}", USAGE),
    }
    Ok(())
}
