use anyhow::Result;
use clap::Parser;
use esgmap::cli::{Cli, Commands};
use esgmap::commands::{self, PropagateConfig, ScoreConfig, TrainConfig};
use esgmap::observability::{init_tracing, install_panic_hook};

fn main() -> Result<()> {
    install_panic_hook();
    let cli = Cli::parse();
    init_tracing(cli.verbosity);

    match cli.command {
        Commands::Init { force } => {
            let dir = std::env::current_dir()?;
            commands::init_config(&dir, force)
        }
        Commands::Score {
            store,
            entity,
            dry_run,
            output,
        } => {
            let config = commands::resolve_config(cli.config.as_deref())?;
            commands::score_store(ScoreConfig {
                store,
                entity,
                dry_run,
                format: output.format,
                output: output.output,
                config,
            })
        }
        Commands::Validate { input, output } => {
            let config = commands::resolve_config(cli.config.as_deref())?;
            let passed = commands::validate_bundles(
                &input,
                config.quality,
                output.format,
                output.output.as_deref(),
            )?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Reconcile { input, output } => {
            let config = commands::resolve_config(cli.config.as_deref())?;
            commands::reconcile_bundles(
                &input,
                config.reconciliation,
                output.format,
                output.output.as_deref(),
            )
        }
        Commands::Train {
            store,
            pillar,
            dataset,
            target,
            model_dir,
            output,
        } => {
            let config = commands::resolve_config(cli.config.as_deref())?;
            let trained = commands::train_model(TrainConfig {
                store,
                pillar,
                dataset,
                target,
                model_dir,
                format: output.format,
                output: output.output,
                config,
            })?;
            if !trained {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Propagate {
            store,
            root,
            no_parallel,
            dry_run,
            output,
        } => {
            let config = commands::resolve_config(cli.config.as_deref())?;
            commands::propagate_store(PropagateConfig {
                store,
                root,
                parallel: !no_parallel,
                dry_run,
                format: output.format,
                output: output.output,
                config,
            })?;
            Ok(())
        }
    }
}
