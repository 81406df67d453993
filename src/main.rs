//! tfprobe - provision a Terraform S3 bucket module and verify it
//!
//! Applies the module, checks versioning, policy and access logging on the
//! resulting bucket, then destroys everything.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tfprobe::{config::Config, logging, BucketScenario, VerifyStrategy};
use tracing::info;

/// tfprobe - Terraform S3 module verification
#[derive(Parser, Debug)]
#[command(name = "tfprobe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tfprobe.yaml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision, verify and destroy the bucket module
    Run {
        /// How to read bucket properties back: helper or client
        #[arg(short, long, default_value = "helper")]
        strategy: VerifyStrategy,
    },
    /// Load and validate the configuration, then exit
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json {
        config.logging.json = true;
    }
    config.validate()?;

    logging::init_subscriber(&config.logging)?;
    info!("Starting tfprobe v{}", tfprobe::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    match args.command {
        Command::Validate => {
            info!("Configuration is valid");
        }
        Command::Run { strategy } => {
            let report = BucketScenario::new(config).run(strategy).await?;
            for check in &report.checks {
                println!("ok   {}", check);
            }
            println!(
                "bucket {} in {} passed {} checks ({} strategy)",
                report.bucket_id,
                report.inputs.region,
                report.checks.len(),
                report.strategy
            );
        }
    }

    Ok(())
}
