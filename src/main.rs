//! Keel - container cluster provisioning
//!
//! This is the main CLI entry point for Keel.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keel::backend::LocalBackend;
use keel::cluster::config::DEFAULT_REGION;
use keel::cluster::{
    ClusterConfig, ClusterOrchestrator, ContainerRow, DownRequest, RegionImageResolver,
    ScaleRequest, UpRequest,
};
use keel::stack::{EmbeddedTemplate, StackController, ThreadSleeper};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keel - container cluster provisioning
#[derive(Parser)]
#[command(name = "keel")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Bring container clusters up, scale them and tear them down", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Cluster name
    #[arg(short, long, global = true, env = "KEEL_CLUSTER", default_value = "default")]
    cluster: String,

    /// Region the cluster lives in
    #[arg(short, long, global = true, env = "KEEL_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Directory holding the local backend state
    #[arg(long, global = true, env = "KEEL_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cluster and provision its instances
    Up {
        /// Acknowledge that the stack creates IAM resources
        #[arg(long)]
        capability_iam: bool,
        /// Key pair for instance login
        #[arg(long)]
        keypair: Option<String>,
        /// Number of instances
        #[arg(long)]
        size: Option<String>,
        /// Instance type
        #[arg(long)]
        instance_type: Option<String>,
        /// Machine image, defaults to the region's image
        #[arg(long)]
        image_id: Option<String>,
        /// Availability zones, comma separated
        #[arg(long)]
        azs: Option<String>,
        /// Existing security group
        #[arg(long)]
        security_group: Option<String>,
        /// CIDR allowed to reach the service port
        #[arg(long)]
        cidr: Option<String>,
        /// Service port to open
        #[arg(long)]
        port: Option<String>,
        /// Existing subnets, comma separated
        #[arg(long)]
        subnets: Option<String>,
        /// Existing VPC
        #[arg(long)]
        vpc: Option<String>,
    },

    /// Delete the stack and the cluster
    Down {
        /// Confirm deletion
        #[arg(long)]
        force: bool,
    },

    /// Change the number of instances
    Scale {
        /// Acknowledge that the stack creates IAM resources
        #[arg(long)]
        capability_iam: bool,
        /// Number of instances
        #[arg(long)]
        size: Option<String>,
    },

    /// List containers of the tasks registered with the backend
    ///
    /// The local backend only knows about tasks placed on it, so a fresh
    /// cluster lists nothing.
    Ps {
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state_dir = cli.state_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("keel")
    });

    let backend = LocalBackend::open(&state_dir)
        .with_context(|| format!("failed to open state in {}", state_dir.display()))?;
    let config = ClusterConfig::new(&cli.cluster, &cli.region)?;

    let sleeper = ThreadSleeper;
    let template = EmbeddedTemplate;
    let images = RegionImageResolver;
    let orchestrator = ClusterOrchestrator::new(
        &config,
        &backend,
        &backend,
        StackController::new(&backend, &sleeper),
        &template,
        &images,
    );

    match cli.command {
        Commands::Up {
            capability_iam,
            keypair,
            size,
            instance_type,
            image_id,
            azs,
            security_group,
            cidr,
            port,
            subnets,
            vpc,
        } => {
            let request = UpRequest {
                capability_iam,
                key_pair: keypair,
                size,
                instance_type,
                image_id,
                azs,
                security_group,
                source_cidr: cidr,
                port,
                subnets,
                vpc,
            };
            orchestrator
                .up(&request)
                .with_context(|| format!("failed to bring up cluster {}", config.cluster()))?;
            println!("Cluster {} is up", config.cluster());
        }

        Commands::Down { force } => {
            orchestrator
                .down(&DownRequest { force })
                .with_context(|| format!("failed to bring down cluster {}", config.cluster()))?;
            println!("Cluster {} is down", config.cluster());
        }

        Commands::Scale {
            capability_iam,
            size,
        } => {
            orchestrator
                .scale(&ScaleRequest {
                    capability_iam,
                    size,
                })
                .with_context(|| format!("failed to scale cluster {}", config.cluster()))?;
            println!("Cluster {} scaled", config.cluster());
        }

        Commands::Ps { json } => {
            let rows = orchestrator
                .ps()
                .with_context(|| format!("failed to list containers of {}", config.cluster()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_rows(&rows);
            }
        }
    }

    Ok(())
}

fn print_rows(rows: &[ContainerRow]) {
    println!(
        "{:<45} {:<12} {:<40} {:<20}",
        "NAME", "STATE", "PORTS", "TASK DEFINITION"
    );
    for row in rows {
        println!(
            "{:<45} {:<12} {:<40} {:<20}",
            row.name, row.state, row.ports, row.task_definition
        );
    }
}
