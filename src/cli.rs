//! CLI argument parsing for the assertion engine's demo binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "betrace")]
#[command(version)]
#[command(about = "Behavioral assertion engine for distributed traces", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a rule's source text for syntax and static-validation errors.
    Validate {
        /// Path to a `.rule` file containing DSL source.
        file: PathBuf,
    },
    /// Load every `.rule` file in a directory through the lifecycle FSM.
    Load {
        /// Directory containing `.rule` files.
        rules_dir: PathBuf,
        /// Durable store directory (created if missing).
        #[arg(long, default_value = "./betrace-store")]
        store_dir: PathBuf,
    },
    /// Replay a JSON-lines file of spans through the engine and print any
    /// violations that fire.
    Ingest {
        /// Directory containing `.rule` files to load first.
        rules_dir: PathBuf,
        /// JSON-lines file, one `Span` per line.
        spans_file: PathBuf,
        /// Durable store directory (created if missing).
        #[arg(long, default_value = "./betrace-store")]
        store_dir: PathBuf,
        /// Optional TOML configuration overriding engine defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validate_subcommand() {
        let cli = Cli::parse_from(["betrace", "validate", "rule.txt"]);
        match cli.command {
            Commands::Validate { file } => assert_eq!(file, PathBuf::from("rule.txt")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_ingest_subcommand_with_store_override() {
        let cli = Cli::parse_from([
            "betrace",
            "ingest",
            "rules/",
            "spans.jsonl",
            "--store-dir",
            "/tmp/store",
        ]);
        match cli.command {
            Commands::Ingest {
                rules_dir,
                spans_file,
                store_dir,
                config,
            } => {
                assert_eq!(rules_dir, PathBuf::from("rules/"));
                assert_eq!(spans_file, PathBuf::from("spans.jsonl"));
                assert_eq!(store_dir, PathBuf::from("/tmp/store"));
                assert!(config.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
