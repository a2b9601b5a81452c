//! ReelPay CLI
//!
//! Runs the payout engine against a JSON fixture exported from the
//! dashboard database.

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reelpay_core::prelude::*;
use reelpay_payouts::{
    aggregate_milestones, LogNotifier, LoggingConfig, PayoutConfig, PayoutEngine,
    ProjectPayoutReport, UnlockOrchestrator, UnlockOutcome,
};
use reelpay_storage::{Fixture, MemoryStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "reelpay")]
#[command(version = "0.1.0")]
#[command(about = "ReelPay - editor payout previews, settlement and unlock", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Rate card file (TOML); seeded defaults when absent
    #[arg(short, long, global = true, env = "REELPAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Expected payout range before work starts
    Preview {
        /// Fixture file (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Project ID
        #[arg(short, long)]
        project: String,

        /// Editor ID; previews every assigned editor when omitted
        #[arg(short, long)]
        editor: Option<String>,
    },

    /// Settle one editor without touching the ledger
    Settle {
        /// Fixture file (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Project ID
        #[arg(short, long)]
        project: String,

        /// Editor ID
        #[arg(short, long)]
        editor: String,

        /// QC average; aggregated from approved milestones when omitted
        #[arg(long)]
        qc: Option<f64>,

        /// Late minutes; aggregated from approved milestones when omitted
        #[arg(long)]
        late: Option<f64>,

        /// Bonus as CODE=AMOUNT, admitted in the order given
        #[arg(short, long = "bonus", value_parser = parse_bonus)]
        bonuses: Vec<Bonus>,
    },

    /// Unlock a completed project's payouts
    Unlock {
        /// Fixture file (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Project ID
        #[arg(short, long)]
        project: String,

        /// Write the updated store back to the fixture file
        #[arg(long)]
        write: bool,
    },

    /// Totals over a project's payout records
    Report {
        /// Fixture file (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Project ID
        #[arg(short, long)]
        project: String,
    },

    /// Print the effective rate card
    ShowConfig,
}

fn parse_bonus(s: &str) -> std::result::Result<Bonus, String> {
    let (code, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=AMOUNT, got '{}'", s))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|e| format!("bad bonus amount '{}': {}", amount, e))?;
    Ok(Bonus::new(code.trim(), amount))
}

fn init_logging(verbose: bool, config: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays valid JSON
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PayoutConfig> {
    match path {
        Some(path) => PayoutConfig::load(path)
            .with_context(|| format!("loading rate card from {}", path.display())),
        None => Ok(PayoutConfig::default()),
    }
}

fn load_store(path: &Path) -> anyhow::Result<MemoryStore> {
    let fixture =
        Fixture::load(path).with_context(|| format!("loading fixture {}", path.display()))?;
    Ok(MemoryStore::from_fixture(fixture))
}

fn require_project(store: &MemoryStore, id: &ProjectId) -> anyhow::Result<Project> {
    store
        .project(id)?
        .ok_or_else(|| anyhow!(PayoutError::ProjectNotFound(id.clone())))
}

fn require_editor(store: &MemoryStore, id: &EditorId) -> anyhow::Result<Editor> {
    store
        .editor(id)?
        .ok_or_else(|| anyhow!("editor {} not found", id))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.verbose, &config.logging);

    let engine = PayoutEngine::from_config(&config).context("building rate card")?;

    match cli.command {
        Commands::Preview {
            fixture,
            project,
            editor,
        } => {
            let store = load_store(&fixture)?;
            let project = require_project(&store, &ProjectId::new(project))?;

            match editor {
                Some(editor_id) => {
                    let editor = require_editor(&store, &EditorId::new(editor_id))?;
                    print_json(&engine.preview(&project, &editor)?)?;
                }
                None => {
                    let milestones = store.milestones(&project.id)?;
                    let mut team = Vec::new();
                    for editor_id in assigned_editors(&milestones) {
                        team.push(require_editor(&store, &editor_id)?);
                    }
                    if team.is_empty() {
                        team = store.editors();
                    }

                    let previews: Vec<serde_json::Value> = engine
                        .preview_team(&project, &team)?
                        .into_iter()
                        .map(|(editor_id, preview)| {
                            serde_json::json!({ "editorId": editor_id, "preview": preview })
                        })
                        .collect();
                    print_json(&previews)?;
                }
            }
        }

        Commands::Settle {
            fixture,
            project,
            editor,
            qc,
            late,
            bonuses,
        } => {
            let store = load_store(&fixture)?;
            let project = require_project(&store, &ProjectId::new(project))?;
            let editor = require_editor(&store, &EditorId::new(editor))?;

            let neutral = engine.rate_card().neutral_qc_average;
            let aggregate = aggregate_milestones(&store.milestones(&project.id)?, neutral)
                .remove(&editor.id);
            let qc_average = qc
                .or_else(|| aggregate.as_ref().map(|a| a.qc_average))
                .unwrap_or(neutral);
            let late_minutes = late
                .or_else(|| aggregate.as_ref().map(|a| a.late_minutes))
                .unwrap_or(0.0);

            tracing::debug!(qc_average, late_minutes, "Settlement inputs");
            let breakdown = engine.settle(&project, &editor, qc_average, late_minutes, &bonuses)?;
            print_json(&breakdown)?;
        }

        Commands::Unlock {
            fixture,
            project,
            write,
        } => {
            let store = Arc::new(load_store(&fixture)?);
            let orchestrator =
                UnlockOrchestrator::new(Arc::new(engine), store.clone(), Arc::new(LogNotifier));

            let outcome = orchestrator.unlock(&ProjectId::new(project), Utc::now())?;
            print_json(&outcome)?;

            if write && matches!(outcome, UnlockOutcome::Unlocked(_)) {
                store
                    .snapshot()
                    .save(&fixture)
                    .with_context(|| format!("writing fixture {}", fixture.display()))?;
                tracing::info!(fixture = %fixture.display(), "Fixture updated");
            }
        }

        Commands::Report { fixture, project } => {
            let store = load_store(&fixture)?;
            let project_id = ProjectId::new(project);
            if store.project(&project_id)?.is_none() {
                bail!(PayoutError::ProjectNotFound(project_id));
            }

            let records = store.records_for_project(&project_id)?;
            print_json(&ProjectPayoutReport::from_records(project_id, &records))?;
        }

        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

/// Editors assigned to any milestone, regardless of status
fn assigned_editors(milestones: &[Milestone]) -> Vec<EditorId> {
    let mut ids: Vec<EditorId> = milestones
        .iter()
        .filter_map(|m| m.assigned_editor_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
