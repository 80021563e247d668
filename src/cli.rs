use crate::core::Pillar;
use crate::io::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "esgmap")]
#[command(about = "ESG data quality, scoring and hierarchy propagation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to .esgmap.toml in this directory or an ancestor)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output destination shared by reporting commands
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score one entity, or every entity in the store
    Score {
        /// JSON snapshot of the document store
        #[arg(long)]
        store: PathBuf,

        /// Entity to score (all entities when omitted)
        entity: Option<String>,

        /// Do not write results back to the snapshot
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Assess data quality of provider bundles
    Validate {
        /// JSON file holding one bundle or an array of bundles
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Reconcile scores reported by several providers for one entity
    Reconcile {
        /// JSON file holding an array of provider bundles
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Train a pillar model from a labelled dataset
    Train {
        /// JSON snapshot of the document store receiving the artifact
        #[arg(long)]
        store: PathBuf,

        /// Pillar to train (environmental, social, governance)
        #[arg(long)]
        pillar: Pillar,

        /// JSON array of feature maps, each carrying the target column
        #[arg(long)]
        dataset: PathBuf,

        /// Name of the target column
        #[arg(long)]
        target: String,

        /// Also write artifacts as files into this directory
        #[arg(long)]
        model_dir: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Propagate scores through Fund → Company → Project trees
    Propagate {
        /// JSON snapshot of the document store
        #[arg(long)]
        store: PathBuf,

        /// Root of the tree to propagate (all trees when omitted)
        #[arg(long)]
        root: Option<String>,

        /// Process trees one at a time
        #[arg(long)]
        no_parallel: bool,

        /// Do not write results back to the snapshot
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Initialize a configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },
}
