//! # Fleetsmith
//!
//! Fleet build verification, load testing and account cleanup for a cloud
//! compute API.
//!
//! ## Architecture
//!
//! ```text
//! CLI (build-verification / builder / cleaner)
//! ├── generate   image×flavor cross-product, flat-count with jitter
//! ├── pool       bounded fan-out, ordered outcome collection
//! │   └── task   create → wait → inspect → delete, per server
//! │       └── client / rest   authenticated compute sessions
//! ├── report     pass/error counts, mean build time, results table
//! └── cleaner    keypair / server / snapshot / network sweep
//! ```
//!
//! The engine fans a batch of independent provisioning tasks across a
//! bounded pool. Each task owns its spec, authenticates its own session and
//! returns an outcome by value — nothing is shared or mutated between
//! concurrent tasks, which is the design's core safety property. A task
//! absorbs every failure into its outcome, so a batch of hundreds survives
//! any one bad build, and the report at the end always prints.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleaner;
pub mod client;
pub mod config;
pub mod error;
pub mod generate;
pub mod pool;
pub mod report;
pub mod rest;
pub mod task;

// Error handling
pub use error::{FleetError, Result};

// Client boundary
pub use client::{
    ComputeSession, CreateServerRequest, CreatedServer, Flavor, Image, Keypair, Network,
    ServerDetail, ServerFault, ServerStatus, ServerSummary, SessionFactory,
};
pub use rest::{RestSession, RestSessionFactory};

// Configuration
pub use config::{AccountConfig, RunConfig, TestEnv, CONFIG_DIR_ENV};

// Provisioning engine
pub use generate::{image_flavor_pairs, load_test_specs};
pub use pool::{run_batch, VERIFY_POOL_WIDTH};
pub use task::{provision, BuildOutcome, ServerSpec, AUTH_ATTEMPTS};

// Reporting
pub use report::BuildReport;

// Account sweep
pub use cleaner::{sweep_account, SweepSummary, PUBLIC_NETWORK_ID, SERVICE_NETWORK_ID};
