//! Fleetsmith - fleet build verification and cleanup
//!
//! ## Usage
//!
//! ```bash
//! # Build one server per (image, flavor) pair and report pass/fail
//! fleetsmith build-verification compute prod.json \
//!     --image-filter ubuntu --flavor-filter 512 --key qe-key
//!
//! # Build 50 servers at once, spread over a 60 second window
//! fleetsmith builder compute prod.json 50 --ramp-up 60
//!
//! # Delete every keypair, server and image snapshot in the account
//! fleetsmith cleaner compute prod.json
//! ```

use clap::{Parser, Subcommand};
use fleetsmith::{
    cleaner::sweep_account,
    config::TestEnv,
    generate::{image_flavor_pairs, load_test_specs},
    pool::{run_batch, VERIFY_POOL_WIDTH},
    report::BuildReport,
    rest::RestSessionFactory,
    SessionFactory,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fleetsmith: build verification, load testing and cleanup for a compute account
#[derive(Parser)]
#[command(name = "fleetsmith")]
#[command(about = "Fleet build verification and cleanup for a cloud compute API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one server per (image, flavor) pair and report the results
    BuildVerification {
        /// Product name (namespaces the config lookup)
        product: String,

        /// Test config: a path, or a file name under ~/.fleetsmith/<product>/
        config: String,

        /// Only build images whose name contains this substring
        #[arg(long)]
        image_filter: Option<String>,

        /// Only build flavors whose name contains this substring
        #[arg(long)]
        flavor_filter: Option<String>,

        /// Name of an existing keypair to attach to every server
        #[arg(long)]
        key: Option<String>,
    },

    /// Build a flat count of servers with randomized ramp-up
    Builder {
        /// Product name (namespaces the config lookup)
        product: String,

        /// Test config: a path, or a file name under ~/.fleetsmith/<product>/
        config: String,

        /// Number of servers to build
        num_servers: usize,

        /// Window in seconds over which server requests are spread
        #[arg(long)]
        ramp_up: Option<u64>,
    },

    /// Delete every keypair, server and image snapshot in the account
    Cleaner {
        /// Product name (namespaces the config lookup)
        product: String,

        /// Test config: a path, or a file name under ~/.fleetsmith/<product>/
        config: String,

        /// Also delete isolated networks (the reserved public and service
        /// networks are always kept)
        #[arg(long)]
        networks: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetsmith=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildVerification {
            product,
            config,
            image_filter,
            flavor_filter,
            key,
        } => {
            build_verification(
                &product,
                &config,
                image_filter.as_deref().unwrap_or(""),
                flavor_filter.as_deref().unwrap_or(""),
                key.as_deref(),
            )
            .await
        }

        Commands::Builder {
            product,
            config,
            num_servers,
            ramp_up,
        } => builder(&product, &config, num_servers, ramp_up.unwrap_or(0)).await,

        Commands::Cleaner {
            product,
            config,
            networks,
        } => cleaner(&product, &config, networks).await,
    }
}

/// Cross-product mode: one server per filtered (image, flavor) pair
async fn build_verification(
    product: &str,
    config: &str,
    image_filter: &str,
    flavor_filter: &str,
    key: Option<&str>,
) -> anyhow::Result<()> {
    let env = TestEnv::load(product, config)?;
    let fault_overrides_pass = env.run.fault_overrides_pass;
    let factory: Arc<dyn SessionFactory> = Arc::new(RestSessionFactory::new(env)?);

    // One up-front session for the listings; each build task authenticates
    // its own later.
    let session = factory.authenticate().await?;
    let images = session.list_images().await?;
    let flavors = session.list_flavors().await?;
    info!(
        "Found {} images and {} flavors in the account",
        images.len(),
        flavors.len()
    );

    let specs = image_flavor_pairs(&images, &flavors, image_filter, flavor_filter, key);
    info!("Building {} image/flavor pairs", specs.len());

    let started = Instant::now();
    let outcomes = run_batch(specs, VERIFY_POOL_WIDTH, factory).await;
    let report =
        BuildReport::new(outcomes, started.elapsed()).with_fault_override(fault_overrides_pass);

    println!("{}", report.render());
    Ok(())
}

/// Flat-count mode: every task launches at once, offset only by its jitter
async fn builder(
    product: &str,
    config: &str,
    num_servers: usize,
    ramp_up_secs: u64,
) -> anyhow::Result<()> {
    let env = TestEnv::load(product, config)?;
    let fault_overrides_pass = env.run.fault_overrides_pass;
    let factory: Arc<dyn SessionFactory> = Arc::new(RestSessionFactory::new(env)?);

    info!(
        "Building {} servers over a {}s ramp-up window",
        num_servers, ramp_up_secs
    );
    let specs = load_test_specs(num_servers, Duration::from_secs(ramp_up_secs));

    let started = Instant::now();
    let outcomes = run_batch(specs, num_servers, factory).await;
    let report =
        BuildReport::new(outcomes, started.elapsed()).with_fault_override(fault_overrides_pass);

    println!("{}", report.render());
    Ok(())
}

/// Account sweep
async fn cleaner(product: &str, config: &str, networks: bool) -> anyhow::Result<()> {
    let env = TestEnv::load(product, config)?;
    let factory = RestSessionFactory::new(env)?;
    let session = factory.authenticate().await?;

    let summary = sweep_account(session.as_ref(), networks).await?;

    println!("Keypairs deleted: {}", summary.keypairs);
    println!("Servers deleted: {}", summary.servers);
    println!("Image snapshots deleted: {}", summary.snapshots);
    if networks {
        println!("Networks deleted: {}", summary.networks);
    }
    if summary.failures > 0 {
        println!("Deletes failed and skipped: {}", summary.failures);
    }
    Ok(())
}
