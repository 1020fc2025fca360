mod commands;
mod config;
mod render;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    ChannelNotificationSink, DirectoryClientConfig, EngineConfig, HttpDirectoryClient,
    Notification, PatientLinkEngine, SearchView, Severity, UserIntent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// Base url of the doctor-patient directory service.
    #[arg(long)]
    server_url: Option<String>,
    /// Bearer token sent with every request.
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(token) = args.token {
        settings.token = Some(token);
    }
    if let Some(debounce_ms) = args.debounce_ms {
        settings.debounce_ms = debounce_ms;
    }
    let server_url = settings.validated_server_url()?;
    tracing::info!(
        server_url = %server_url,
        debounce_ms = settings.debounce_ms,
        "starting patient link client"
    );

    let client = HttpDirectoryClient::new(DirectoryClientConfig {
        server_url: server_url.to_string(),
        credential: settings.token.clone(),
        request_timeout: settings.request_timeout(),
    })
    .context("failed to configure directory client")?;
    let (sink, mut notifications) = ChannelNotificationSink::new();
    let engine = PatientLinkEngine::new(
        Arc::new(client),
        Arc::new(sink),
        EngineConfig {
            debounce: settings.debounce(),
        },
    );

    let linked = engine.start().await;
    println!("{linked} linked patient(s) loaded\n{HELP}");

    let mut search_updates = engine.search().subscribe();
    let mut roster_updates = engine.roster().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_command(&engine, Command::parse(&line)) {
                    break;
                }
            }
            Ok(()) = search_updates.changed() => {
                println!("{}", render::search(&engine.search_view()));
            }
            Ok(()) = roster_updates.changed() => {
                println!("{}", render::roster(&engine.roster_view()));
            }
            Some(notification) = notifications.recv() => print_notification(&notification),
        }
    }

    engine.shutdown();
    tracing::info!("patient link client stopped");
    Ok(())
}

/// Returns false when the user asked to leave.
fn handle_command(engine: &PatientLinkEngine, command: Command) -> bool {
    match command {
        Command::Query(text) => {
            engine.dispatch(UserIntent::QueryChanged(text));
        }
        Command::Retry => {
            engine.dispatch(UserIntent::RetrySearch);
        }
        Command::Add(row) => match result_row(&engine.search_view(), row) {
            Some(patient) => {
                engine.dispatch(UserIntent::AddRequested(patient));
            }
            None => eprintln!("no result row {row}"),
        },
        Command::Remove(patient_id) => {
            engine.dispatch(UserIntent::RemoveRequested(patient_id));
        }
        Command::Roster => println!("{}", render::roster(&engine.roster_view())),
        Command::Help => println!("{HELP}"),
        Command::Invalid(reason) => eprintln!("{reason}"),
        Command::Quit => return false,
    }
    true
}

fn result_row(view: &SearchView, row: usize) -> Option<shared::domain::Patient> {
    let rows = match view {
        SearchView::Results(rows) | SearchView::Searching { rows } => rows,
        _ => return None,
    };
    rows.get(row.checked_sub(1)?).map(|r| r.patient.clone())
}

fn print_notification(notification: &Notification) {
    match notification.severity {
        Severity::Info => println!("* {}", notification.message),
        Severity::Error => println!("! {}", notification.message),
    }
}
