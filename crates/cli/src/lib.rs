//! `apisim` command line: node server, status server, artifact generators.

use anyhow::{Context as AnyhowContext, Result};
use apisim_mesh::{HttpTransport, MeshEngine, Transport, DEFAULT_MAX_IN_FLIGHT};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod artifacts;
pub mod check;
pub mod node;
pub mod settings;
pub mod status;

use settings::Settings;

#[derive(Parser)]
#[command(name = "apisim")]
#[command(about = "Simulate a mesh of API services from a JSON call graph", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Function definitions (overrides APISIM_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Port node servers listen on and host-less definitions default to
    /// (overrides APISIM_PORT)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Base timeout of outbound calls in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Outbound calls one request may have open at once
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the functions of one node
    #[command(name = "node-server")]
    NodeServer(NodeArgs),

    /// Serve a status page probing every node
    #[command(name = "status-server")]
    StatusServer(StatusArgs),

    /// Generate ReplicationController and Service specs
    #[command(name = "generate-k8s-spec")]
    GenerateK8sSpec(OutputArgs),

    /// Generate NetworkPolicy specs
    #[command(name = "generate-k8s-net-policy")]
    GenerateK8sNetPolicy(OutputArgs),

    /// Generate L7 policies
    #[command(name = "generate-l7-policy")]
    GenerateL7Policy(OutputArgs),

    /// Validate the definitions and print a summary
    Check(CheckArgs),
}

#[derive(Args)]
pub struct NodeArgs {
    /// Host name of this node; defaults to the request's Host header
    #[arg(short, long)]
    pub name: Option<String>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Port for the status service to listen on
    #[arg(long, default_value_t = 8888)]
    pub status_port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Directory the generated files are written to
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn engine(tree: Arc<apisim_graph::FunctionTree>, settings: &Settings) -> Result<MeshEngine> {
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new().context("Failed to build HTTP client")?);
    Ok(MeshEngine::new(tree, transport, settings.mesh))
}

async fn bind(addr: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((addr, port))
        .await
        .with_context(|| format!("Failed to bind {addr}:{port}"))
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(cli.config, cli.port, cli.timeout_ms, cli.max_in_flight)?;
    let tree = settings.load_tree()?;
    log::debug!(
        "Loaded {} functions from {}",
        tree.len(),
        settings.config_path.display()
    );

    match cli.command {
        Commands::NodeServer(args) => {
            let state = node::NodeState::new(
                engine(tree, &settings)?,
                args.name.as_deref(),
                settings.port,
            );
            let listener = bind(&args.bind, settings.port).await?;
            node::serve(listener, node::router(Arc::new(state)), node::ctrl_c()).await
        }
        Commands::StatusServer(args) => {
            let engine = Arc::new(engine(tree, &settings)?);
            let listener = bind(&args.bind, args.status_port).await?;
            node::serve(listener, status::router(engine), node::ctrl_c()).await
        }
        Commands::GenerateK8sSpec(args) => {
            artifacts::write_all(&artifacts::k8s_specs(&tree), &args.out_dir)?;
            Ok(())
        }
        Commands::GenerateK8sNetPolicy(args) => {
            artifacts::write_all(&artifacts::net_policies(&tree), &args.out_dir)?;
            Ok(())
        }
        Commands::GenerateL7Policy(args) => {
            artifacts::write_all(&artifacts::l7_policies(&tree), &args.out_dir)?;
            Ok(())
        }
        Commands::Check(args) => {
            let summary = check::CheckSummary::of(&tree);
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
                );
            } else {
                print!("{}", summary.render_text());
            }
            Ok(())
        }
    }
}
