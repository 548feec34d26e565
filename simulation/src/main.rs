//! Meshwave simulator
//!
//! Runs flooding search and spanning-tree construction over nodes described
//! by topology files.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use meshwave_logging::{FileConfig, LogConfig, SubscriberBuilder, TracingEventSink};
use meshwave_node::{
    DEFAULT_ACCESS_ADDR, DEFAULT_CLIENT_ADDR, NodeConfig, NodeRuntime, run_query,
};
use meshwave_simulation::{
    AddressPlan, Cluster, ClusterConfig, DirectoryInventory, MeshBuilder, NodeTopology, Shape,
    parse_address, save_dir,
};
use meshwave_transport::{SendPolicy, TcpTransport};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "meshwave-sim",
    about = "Flooding search and spanning-tree construction over a static mesh",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Also write JSON logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Node settings shared by `network` and `node`
#[derive(clap::Args, Clone)]
struct NodeArgs {
    /// Directory holding one warehouse directory per node id
    #[arg(short, long, default_value = "warehouses")]
    warehouses: PathBuf,

    /// TTL given to searches submitted at a node
    #[arg(long, default_value_t = meshwave_search::DEFAULT_INITIAL_TTL)]
    ttl: u32,

    /// Cap on concurrent outbound sends per node
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Do not report failed sends
    #[arg(long)]
    quiet_failures: bool,
}

impl NodeArgs {
    fn node_config(&self) -> NodeConfig {
        let mut policy = SendPolicy::default();
        if let Some(max) = self.max_in_flight {
            policy = policy.with_max_in_flight(max);
        }
        if self.quiet_failures {
            policy = policy.swallow_failures();
        }
        NodeConfig::default()
            .with_initial_ttl(self.ttl)
            .with_send_policy(policy)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ShapeArg {
    Line,
    Ring,
    Star,
    Full,
    Random,
}

impl From<ShapeArg> for Shape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Line => Shape::Line,
            ShapeArg::Ring => Shape::Ring,
            ShapeArg::Star => Shape::Star,
            ShapeArg::Full => Shape::Full,
            ShapeArg::Random => Shape::Random,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every node of a topology directory in this process
    Network {
        /// Directory of topology files
        #[arg(short, long, default_value = "topology")]
        topology: PathBuf,

        /// Start a spanning-tree run at this node
        #[arg(long)]
        wave_root: Option<u32>,

        /// Seconds to wait for the spanning tree
        #[arg(long, default_value = "10")]
        tree_timeout: u64,

        #[command(flatten)]
        node: NodeArgs,
    },

    /// Run a single node
    Node {
        /// Topology file of this node
        file: PathBuf,

        /// Start a spanning-tree run from this node after a delay
        #[arg(long)]
        root: bool,

        /// Seconds to wait before starting the run, so the others are up
        #[arg(long, default_value = "3")]
        root_delay: u64,

        #[command(flatten)]
        node: NodeArgs,
    },

    /// Search the network as a client
    Query {
        /// Search term, matched case-insensitively against item names
        term: String,

        /// Node the search is submitted to
        #[arg(short, long, default_value = DEFAULT_ACCESS_ADDR)]
        access: String,

        /// Address responses are sent to
        #[arg(short, long, default_value = DEFAULT_CLIENT_ADDR)]
        listen: String,

        /// Seconds to wait for responses
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Generate topology files
    Topology {
        #[arg(short, long, value_enum, default_value = "ring")]
        shape: ShapeArg,

        /// Number of nodes
        #[arg(short, long, default_value = "8")]
        nodes: u32,

        /// Edge probability for random meshes
        #[arg(short = 'p', long, default_value = "0.4")]
        connection_prob: f64,

        /// Put every node on 127.0.0.1 with ports counting up from here
        /// instead of 127.0.1.<id>
        #[arg(long)]
        base_port: Option<u16>,

        /// Where to write the files
        #[arg(short, long, default_value = "topology")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    config.console.json = cli.json;
    let mut logging = SubscriberBuilder::new().with_config(config);
    if let Some(dir) = &cli.log_dir {
        logging = logging.with_file_output(FileConfig::new(dir).with_prefix("meshwave-sim"));
    }
    let _guard = logging.init().context("failed to set up logging")?;

    match cli.command {
        Commands::Network {
            topology,
            wave_root,
            tree_timeout,
            node,
        } => run_network(topology, wave_root, Duration::from_secs(tree_timeout), node).await,
        Commands::Node {
            file,
            root,
            root_delay,
            node,
        } => run_node(file, root.then(|| Duration::from_secs(root_delay)), node).await,
        Commands::Query {
            term,
            access,
            listen,
            timeout,
        } => query(&term, &access, &listen, Duration::from_secs(timeout)).await,
        Commands::Topology {
            shape,
            nodes,
            connection_prob,
            base_port,
            out,
        } => {
            let mesh = MeshBuilder::new(nodes).build(shape.into(), connection_prob);
            let plan = base_port.map_or_else(AddressPlan::default, AddressPlan::localhost);
            let paths = save_dir(&out, &mesh.to_topologies(plan)?)?;
            println!("{}", mesh.visualize());
            println!("Wrote {} topology files to {}", paths.len(), out.display());
            Ok(())
        }
    }
}

async fn run_network(
    topology: PathBuf,
    wave_root: Option<u32>,
    tree_timeout: Duration,
    node: NodeArgs,
) -> anyhow::Result<()> {
    let mut config = ClusterConfig::new(&topology, &node.warehouses)
        .with_node_config(node.node_config());
    config.wave_root = wave_root;

    let cluster = Cluster::launch(config, Arc::new(TracingEventSink::new()))
        .await
        .with_context(|| format!("failed to launch {}", topology.display()))?;
    for (id, addr) in cluster.addresses() {
        info!(node = %id, %addr, "up");
    }

    if wave_root.is_some() {
        match cluster.wait_for_tree(tree_timeout).await {
            Ok(tree) => println!("Spanning tree:\n{}", tree),
            Err(e) => eprintln!("Spanning tree not built: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cluster.stop().await;
    Ok(())
}

async fn run_node(file: PathBuf, root_delay: Option<Duration>, node: NodeArgs) -> anyhow::Result<()> {
    let topology = NodeTopology::load(&file)?;
    let inventory = DirectoryInventory::load(&node.warehouses, topology.id)?;
    let runtime = NodeRuntime::new(
        topology.neighbor_table()?,
        Arc::new(inventory),
        Arc::new(TcpTransport::new()),
        Arc::new(TracingEventSink::new()),
        node.node_config(),
    );
    let handle = runtime.start().await?;

    if let Some(delay) = root_delay {
        tokio::time::sleep(delay).await;
        runtime.start_wave();
    }

    let mut tree = runtime.watch_tree();
    let snapshot = tokio::select! {
        done = tree.wait_for(|snapshot| snapshot.is_done()) => done.map(|s| s.clone()).ok(),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            handle.stop().await;
            return Ok(());
        }
    };

    if let Some(snapshot) = snapshot {
        let children: Vec<_> = snapshot.children.iter().map(|c| c.to_string()).collect();
        println!(
            "Node {}: parent {}, children [{}]",
            topology.id,
            snapshot.parent.map_or_else(|| "-".to_string(), |p| p.to_string()),
            children.join(", ")
        );
    }
    tokio::signal::ctrl_c().await?;

    handle.stop().await;
    Ok(())
}

async fn query(term: &str, access: &str, listen: &str, timeout: Duration) -> anyhow::Result<()> {
    let access: SocketAddr = parse_address(access)?;
    let listen: SocketAddr = parse_address(listen)?;

    let results = run_query(listen, access, term, timeout)
        .await
        .with_context(|| format!("search through {} failed", access))?;

    println!("Results:");
    for line in results.render() {
        println!("{}", line);
    }
    Ok(())
}
