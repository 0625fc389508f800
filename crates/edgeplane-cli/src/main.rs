//! edgeplane — operator CLI for the edge deployment controller.
//!
//! # Usage
//!
//! ```text
//! edgeplane blueprint add stack.yaml
//! edgeplane pod create --name lab-1 --blueprint <uuid> --edgesite <uuid> --input input.yaml
//! edgeplane pod event <uuid> --level STATUS --message "State changed to: ACTIVE"
//! edgeplane serve
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edgeplane_catalog::EventLevel;
use uuid::Uuid;

mod commands;
mod config;

use commands::pod::CreateArgs;
use commands::{App, blueprint, inventory, pod, serve};
use config::ControllerConfig;

#[derive(Parser)]
#[command(
    name = "edgeplane",
    about = "Edgeplane — edge deployment controller",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file; missing means built-in defaults.
    #[arg(long, global = true, default_value = "edgeplane.toml")]
    config: PathBuf,

    /// Keep the catalog database in this directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hardware profiles
    Hardware {
        #[command(subcommand)]
        action: HardwareAction,
    },
    /// Physical nodes
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Regions
    Region {
        #[command(subcommand)]
        action: RegionAction,
    },
    /// Edgesites (node clusters)
    Edgesite {
        #[command(subcommand)]
        action: EdgesiteAction,
    },
    /// Blueprints
    Blueprint {
        #[command(subcommand)]
        action: BlueprintAction,
    },
    /// PODs (deployments of a Blueprint onto an Edgesite)
    Pod {
        #[command(subcommand)]
        action: PodAction,
    },
    /// Remove expired DAGs and workspaces once
    Prune,
    /// Run the controller's background work until Ctrl-C
    Serve,
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum HardwareAction {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// YAML details
        #[arg(long)]
        file: Option<PathBuf>,
    },
    List,
    Show { uuid: Uuid },
    Delete { uuid: Uuid },
}

#[derive(Subcommand)]
enum NodeAction {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        hardware: Uuid,
        /// YAML details
        #[arg(long)]
        file: Option<PathBuf>,
    },
    List,
    Show { uuid: Uuid },
    Delete { uuid: Uuid },
}

#[derive(Subcommand)]
enum RegionAction {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Parent region (default: the universal region)
        #[arg(long)]
        parent: Option<Uuid>,
    },
    List,
    Show { uuid: Uuid },
    Delete { uuid: Uuid },
}

#[derive(Subcommand)]
enum EdgesiteAction {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "node", required = true)]
        nodes: Vec<Uuid>,
        #[arg(long = "region", required = true)]
        regions: Vec<Uuid>,
    },
    /// Change an Edgesite no live POD is using
    Update {
        uuid: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replacement node set
        #[arg(long = "node")]
        nodes: Vec<Uuid>,
        /// Replacement region set
        #[arg(long = "region")]
        regions: Vec<Uuid>,
    },
    List,
    Show { uuid: Uuid },
    Delete { uuid: Uuid },
}

#[derive(Subcommand)]
enum BlueprintAction {
    /// Submit a Blueprint document
    Add { file: PathBuf },
    List,
    /// Show a Blueprint with its lineage and effective workflows
    Show { uuid: Uuid },
    /// Replace a Blueprint's description
    Describe { uuid: Uuid, description: String },
    Delete { uuid: Uuid },
}

#[derive(Subcommand)]
enum PodAction {
    /// Deploy a Blueprint onto an Edgesite
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        blueprint: Uuid,
        #[arg(long)]
        edgesite: Uuid,
        /// Input for the create workflow (YAML)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Validate only
        #[arg(long)]
        dry_run: bool,
    },
    List,
    /// Show a POD with its events and workflow runs
    Show { uuid: Uuid },
    /// Start a named workflow
    Run {
        uuid: Uuid,
        workflow: String,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Move a POD to a descendant Blueprint
    Upgrade {
        uuid: Uuid,
        #[arg(long)]
        blueprint: Uuid,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Tear a POD down
    Delete {
        uuid: Uuid,
        /// Input for the delete workflow (default: the latest input)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Record an event, as a runner callback would
    Event {
        uuid: Uuid,
        #[arg(long, default_value = "INFO")]
        level: EventLevel,
        #[arg(long)]
        message: String,
        /// UTC time as YYYY-MM-DD HH:MM:SS (default: now)
        #[arg(long)]
        time: Option<String>,
    },
    /// Print runner logs of a workflow run
    Logs {
        uuid: Uuid,
        workflow: String,
        /// Run index (default: the latest)
        #[arg(long)]
        index: Option<u32>,
    },
    /// Ask the runner to stop the current workflow
    Cancel { uuid: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,edgeplane=debug"))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ControllerConfig::load(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            return Ok(());
        }
        Commands::Prune => return serve::prune(&config.airflow).await,
        Commands::Serve => return serve::serve(&config.airflow).await,
        _ => {}
    }

    let app = App::open(config)?;

    match cli.command {
        Commands::Hardware { action } => match action {
            HardwareAction::Add { name, description, file } => {
                inventory::add_hardware(&app, &name, &description, file.as_deref())
            }
            HardwareAction::List => inventory::list_hardware(&app),
            HardwareAction::Show { uuid } => inventory::show_hardware(&app, uuid),
            HardwareAction::Delete { uuid } => {
                app.inventory.delete_hardware(uuid)?;
                deleted("Hardware", uuid)
            }
        },
        Commands::Node { action } => match action {
            NodeAction::Add {
                name,
                description,
                hardware,
                file,
            } => inventory::add_node(&app, &name, &description, hardware, file.as_deref()),
            NodeAction::List => inventory::list_nodes(&app),
            NodeAction::Show { uuid } => inventory::show_node(&app, uuid),
            NodeAction::Delete { uuid } => {
                app.inventory.delete_node(uuid).await?;
                deleted("Node", uuid)
            }
        },
        Commands::Region { action } => match action {
            RegionAction::Add {
                name,
                description,
                parent,
            } => inventory::add_region(&app, &name, &description, parent),
            RegionAction::List => inventory::list_regions(&app),
            RegionAction::Show { uuid } => inventory::show_region(&app, uuid),
            RegionAction::Delete { uuid } => {
                app.inventory.delete_region(uuid)?;
                deleted("Region", uuid)
            }
        },
        Commands::Edgesite { action } => match action {
            EdgesiteAction::Add {
                name,
                description,
                nodes,
                regions,
            } => inventory::add_edgesite(&app, &name, &description, nodes, regions).await,
            EdgesiteAction::Update {
                uuid,
                name,
                description,
                nodes,
                regions,
            } => inventory::update_edgesite(&app, uuid, name, description, nodes, regions).await,
            EdgesiteAction::List => inventory::list_edgesites(&app),
            EdgesiteAction::Show { uuid } => inventory::show_edgesite(&app, uuid),
            EdgesiteAction::Delete { uuid } => {
                app.inventory.delete_edgesite(uuid).await?;
                deleted("Edgesite", uuid)
            }
        },
        Commands::Blueprint { action } => match action {
            BlueprintAction::Add { file } => blueprint::add(&app, &file).await,
            BlueprintAction::List => blueprint::list(&app),
            BlueprintAction::Show { uuid } => blueprint::show(&app, uuid),
            BlueprintAction::Describe { uuid, description } => {
                blueprint::describe(&app, uuid, &description)
            }
            BlueprintAction::Delete { uuid } => {
                app.inventory.delete_blueprint(uuid)?;
                deleted("Blueprint", uuid)
            }
        },
        Commands::Pod { action } => match action {
            PodAction::Create {
                name,
                description,
                blueprint,
                edgesite,
                input,
                dry_run,
            } => {
                pod::create(
                    &app,
                    CreateArgs {
                        name: &name,
                        description: &description,
                        blueprint,
                        edgesite,
                        input: input.as_deref(),
                        dry_run,
                    },
                )
                .await
            }
            PodAction::List => pod::list(&app),
            PodAction::Show { uuid } => pod::show(&app, uuid),
            PodAction::Run { uuid, workflow, input } => {
                pod::run(&app, uuid, &workflow, input.as_deref()).await
            }
            PodAction::Upgrade { uuid, blueprint, input } => {
                pod::upgrade(&app, uuid, blueprint, input.as_deref()).await
            }
            PodAction::Delete { uuid, input } => pod::delete(&app, uuid, input.as_deref()).await,
            PodAction::Event {
                uuid,
                level,
                message,
                time,
            } => pod::event(&app, uuid, level, &message, time.as_deref()).await,
            PodAction::Logs { uuid, workflow, index } => {
                pod::logs(&app, uuid, &workflow, index).await
            }
            PodAction::Cancel { uuid } => pod::cancel(&app, uuid).await,
        },
        Commands::Config | Commands::Prune | Commands::Serve => Ok(()),
    }
}

fn deleted(kind: &str, uuid: Uuid) -> anyhow::Result<()> {
    println!("✓ {kind} {uuid} deleted");
    Ok(())
}
