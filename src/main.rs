//! # Blockdeck - A Block Editor for Lessons and Exercises
//!
//! Documents live in a directory store, one JSON file each, and are edited
//! with scripts in the command language of `blockdeck-core`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a lesson and print its id
//! cargo run -- new lesson "Photosynthesis"
//!
//! # Apply a script of editing commands
//! cargo run -- edit <ID> script.txt
//! echo 'add narrative-text
//! set {"html": "<p>Hi</p>"}
//! confirm
//! save' | cargo run -- edit <ID>
//!
//! # Show the blocks of a document
//! cargo run -- show <ID>
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blockdeck_blocks::{BlockRegistry, Family};
use blockdeck_core::command::list_blocks;
use blockdeck_core::config::EditorConfig;
use blockdeck_core::{
    CommandDispatcher, Config, Document, DocumentController, DocumentId, DocumentStore, FileStore,
};

/// Blockdeck - edit block-structured lessons and exercises
#[derive(Parser, Debug)]
#[command(name = "blockdeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Document store directory
    #[arg(short, long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create an empty document and print its id
    New {
        #[arg(value_enum)]
        family: FamilyArg,
        title: String,
    },
    /// Run an editing script against a document
    Edit {
        id: String,
        /// Script file; reads stdin when omitted
        script: Option<PathBuf>,
    },
    /// Print a document's blocks
    Show {
        id: String,
        /// Print the stored JSON instead
        #[arg(long)]
        json: bool,
    },
    /// List the ids of stored documents
    List,
    /// List the available block kinds
    Kinds {
        #[arg(value_enum)]
        family: Option<FamilyArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum FamilyArg {
    Lesson,
    Exercise,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Lesson => Family::Lesson,
            FamilyArg::Exercise => Family::Exercise,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    // Initialize logging
    let log_level = log_level(args.verbose, config.log_level.as_deref());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Blockdeck v{}", env!("CARGO_PKG_VERSION"));

    let directory = match args.store {
        Some(dir) => dir,
        None => config.storage.resolved_directory()?,
    };
    let store = FileStore::open(&directory)
        .await
        .with_context(|| format!("Failed to open store at {}", directory.display()))?;
    let registry = Arc::new(config.registry()?);

    for line in run(&args.command, &store, registry, &config.editor).await? {
        println!("{line}");
    }

    Ok(())
}

/// Picks the log level: `-v` flags win, then the config file, then WARN.
fn log_level(verbose: u8, configured: Option<&str>) -> tracing::Level {
    match verbose {
        0 => configured
            .and_then(|level| level.parse().ok())
            .unwrap_or(tracing::Level::WARN),
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

/// Runs a subcommand and returns the lines to print.
async fn run(
    command: &Commands,
    store: &FileStore,
    registry: Arc<BlockRegistry>,
    editor: &EditorConfig,
) -> anyhow::Result<Vec<String>> {
    let lines = match command {
        Commands::New { family, title } => {
            let document = match family {
                FamilyArg::Lesson => Document::lesson(title.as_str()),
                FamilyArg::Exercise => Document::exercise(title.as_str()),
            };
            let mut controller = DocumentController::new(document, registry).with_config(editor);
            let id = controller.save(store).await.context("Failed to create document")?;
            vec![id.to_string()]
        }
        Commands::Edit { id, script } => {
            let script = match script {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read script {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin().read_to_string(&mut buf).await?;
                    buf
                }
            };

            let id = DocumentId::from(id.as_str());
            let mut controller = DocumentController::load(store, &id, registry)
                .await
                .with_context(|| format!("Failed to load document {id}"))?
                .with_config(editor);

            let report = CommandDispatcher::new()
                .run_script(&mut controller, store, &script)
                .await?;
            if report.saved.is_none() && controller.can_undo() {
                tracing::warn!("Script made changes but never ran `save`");
            }

            let mut lines = report.messages;
            lines.push(format!(
                "{} command(s) applied, {} failed",
                report.executed, report.failures
            ));
            lines
        }
        Commands::Show { id, json } => {
            let id = DocumentId::from(id.as_str());
            if *json {
                let stored = store.load_document(&id).await?;
                vec![serde_json::to_string_pretty(&stored)?]
            } else {
                let controller = DocumentController::load(store, &id, registry).await?;
                let mut lines = vec![format!(
                    "{} [{}] ({} blocks)",
                    controller.title(),
                    controller.status(),
                    controller.blocks().len()
                )];
                lines.extend(list_blocks(&controller));
                lines
            }
        }
        Commands::List => store.list().await?.into_iter().map(|id| id.to_string()).collect(),
        Commands::Kinds { family } => {
            let families = match family {
                Some(family) => vec![Family::from(*family)],
                None => vec![Family::Lesson, Family::Exercise],
            };
            families
                .into_iter()
                .flat_map(|family| registry.kinds(family))
                .map(|kind| match registry.default_points(kind) {
                    Some(points) => format!("{:<22} {} ({} pts)", kind.as_str(), kind.display_name(), points),
                    None => format!("{:<22} {}", kind.as_str(), kind.display_name()),
                })
                .collect()
        }
    };

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["blockdeck", "kinds"]);
        assert!(args.config.is_none());
        assert_eq!(args.verbose, 0);
        assert_eq!(args.command, Commands::Kinds { family: None });
    }

    #[test]
    fn test_args_new_document() {
        let args = Args::parse_from(["blockdeck", "-vv", "--store", "docs", "new", "exercise", "Quiz"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.store, Some(PathBuf::from("docs")));
        assert_eq!(
            args.command,
            Commands::New {
                family: FamilyArg::Exercise,
                title: "Quiz".to_string()
            }
        );
    }

    #[test]
    fn test_log_level_precedence() {
        assert_eq!(log_level(0, None), tracing::Level::WARN);
        assert_eq!(log_level(0, Some("debug")), tracing::Level::DEBUG);
        assert_eq!(log_level(0, Some("noisy")), tracing::Level::WARN);
        assert_eq!(log_level(1, Some("error")), tracing::Level::INFO);
        assert_eq!(log_level(5, None), tracing::Level::TRACE);
    }

    #[tokio::test]
    async fn test_new_edit_show() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let registry = Arc::new(BlockRegistry::standard());
        let editor = EditorConfig::default();

        let created = run(
            &Commands::New {
                family: FamilyArg::Lesson,
                title: "Cells".to_string(),
            },
            &store,
            registry.clone(),
            &editor,
        )
        .await
        .unwrap();
        let id = created[0].clone();

        let script = dir.path().join("script.txt");
        std::fs::write(
            &script,
            "add narrative-text\nset {\"html\": \"<p>Cells divide</p>\"}\nconfirm\nsave\n",
        )
        .unwrap();
        let edited = run(
            &Commands::Edit {
                id: id.clone(),
                script: Some(script),
            },
            &store,
            registry.clone(),
            &editor,
        )
        .await
        .unwrap();
        assert_eq!(edited.last().unwrap(), "4 command(s) applied, 0 failed");

        let shown = run(&Commands::Show { id, json: false }, &store, registry, &editor)
            .await
            .unwrap();
        assert_eq!(shown[0], "Cells [draft] (1 blocks)");
        assert!(shown[1].contains("Cells divide"));
    }
}
