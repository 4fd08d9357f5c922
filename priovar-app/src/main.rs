use anyhow::Result;
use clap::{Parser, Subcommand};
use priovar_portal::{PatientScope, RecordId};
use priovar_runtime::PortalRuntime;
use std::path::PathBuf;
use std::time::Duration;

mod commands;
mod wiring;

/// Terminal client for the PrioVar clinician portal.
#[derive(Parser, Debug)]
#[command(name = "priovar", version)]
#[command(about = "Review and act on a health center's patient files")]
struct Cli {
    /// YAML config file; `PRIOVAR_` environment variables override it.
    #[arg(short, long, global = true, env = "PRIOVAR_CONFIG", default_value = "priovar.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Cmd {
    /// Interactive table (default).
    Tui,
    /// Print the patient list.
    List {
        /// requested | clinic (defaults to `ui.scope`).
        #[arg(long)]
        scope: Option<PatientScope>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a patient.
    Delete {
        #[arg(long)]
        patient: RecordId,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Start annotation of the patient's file with the default settings.
    Annotate {
        #[arg(long)]
        patient: RecordId,
    },
    /// Replace the clinician notes of the patient's file.
    Note {
        #[arg(long)]
        patient: RecordId,
        #[arg(long)]
        text: String,
    },
    /// Mark the patient's analysis as finished.
    Finish {
        #[arg(long)]
        patient: RecordId,
    },
    /// Select the patient for a similar-patients lookup.
    Similar {
        #[arg(long)]
        patient: RecordId,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = PortalRuntime::build("priovar-worker", None)?;
    let shutdown = runtime.shutdown_handle();

    let result = runtime.block_on(async move {
        let command = cli.command.unwrap_or(Cmd::Tui);
        let cfg = wiring::load_config(&cli.config)?;
        let interactive = command == Cmd::Tui;
        let log_path = wiring::init_logging(&cfg, interactive)?;
        tracing::info!(log = %log_path.display(), config = %cli.config.display(), "app.start");

        let table = wiring::build_table(&cfg).await?;
        match command {
            Cmd::Tui => wiring::run_tui(table, &cfg, shutdown).await,
            Cmd::List { scope, json } => commands::list(&table, scope, json).await,
            Cmd::Delete { patient, yes } => commands::delete(&table, &patient, yes).await,
            Cmd::Annotate { patient } => commands::annotate(&table, &patient).await,
            Cmd::Note { patient, text } => commands::note(&table, &patient, &text).await,
            Cmd::Finish { patient } => commands::finish(&table, &patient).await,
            Cmd::Similar { patient } => commands::similar(&table, &patient).await,
        }
    });

    if let Err(e) = &result {
        tracing::error!(error = %e, "app.failed");
    }
    runtime.shutdown(Duration::from_secs(1));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_tui() {
        let cli = Cli::try_parse_from(["priovar"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, PathBuf::from("priovar.yaml"));
    }

    #[test]
    fn list_takes_scope_and_json() {
        let cli = Cli::try_parse_from(["priovar", "list", "--scope", "clinic", "--json"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Cmd::List {
                scope: Some(PatientScope::Clinic),
                json: true
            })
        );
    }

    #[test]
    fn bad_scope_is_rejected() {
        assert!(Cli::try_parse_from(["priovar", "list", "--scope", "everyone"]).is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from([
            "priovar", "delete", "--patient", "41", "--yes", "--config", "/etc/priovar.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/priovar.yaml"));
        assert_eq!(
            cli.command,
            Some(Cmd::Delete {
                patient: RecordId::from("41"),
                yes: true
            })
        );
    }

    #[test]
    fn note_requires_text() {
        assert!(Cli::try_parse_from(["priovar", "note", "--patient", "41"]).is_err());
    }
}
