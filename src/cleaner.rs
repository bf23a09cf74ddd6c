//! Account-wide resource sweep
//!
//! Deletes every keypair, server and image snapshot in the account, and —
//! when asked — every isolated network except the provider's two reserved
//! ones. Each category is a plain list-then-delete loop: a delete that
//! fails is logged with the resource id and skipped, so one stuck resource
//! never stops the sweep. Listing failures abort, since there is nothing
//! sensible to iterate.

use crate::client::ComputeSession;
use crate::error::Result;
use tracing::{info, warn};

/// Well-known id of the shared public network; never deleted
pub const PUBLIC_NETWORK_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Well-known id of the shared service network; never deleted
pub const SERVICE_NETWORK_ID: &str = "11111111-1111-1111-1111-111111111111";

/// What one sweep deleted, and how many deletes failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Keypairs deleted
    pub keypairs: usize,
    /// Servers deleted
    pub servers: usize,
    /// Image snapshots deleted
    pub snapshots: usize,
    /// Networks deleted
    pub networks: usize,
    /// Deletes that failed and were skipped
    pub failures: usize,
}

/// Sweep the account clean through one authenticated session
pub async fn sweep_account(
    session: &dyn ComputeSession,
    include_networks: bool,
) -> Result<SweepSummary> {
    let mut summary = SweepSummary::default();

    let keypairs = session.list_keypairs().await?;
    info!("Preparing to delete {} keypairs...", keypairs.len());
    for keypair in keypairs {
        match session.delete_keypair(&keypair.name).await {
            Ok(()) => summary.keypairs += 1,
            Err(err) => {
                warn!("Failed to delete keypair {}: {}", keypair.name, err);
                summary.failures += 1;
            }
        }
    }

    // The sweep takes the whole account, not just servers this tool built.
    let servers = session.list_servers().await?;
    info!("Preparing to delete {} servers...", servers.len());
    for server in servers {
        match session.delete_server(&server.id).await {
            Ok(()) => summary.servers += 1,
            Err(err) => {
                warn!("Failed to delete server {}: {}", server.id, err);
                summary.failures += 1;
            }
        }
    }

    let snapshots = session.list_snapshots().await?;
    info!("Preparing to delete {} image snapshots...", snapshots.len());
    for snapshot in snapshots {
        match session.delete_image(&snapshot.id).await {
            Ok(()) => summary.snapshots += 1,
            Err(err) => {
                warn!("Failed to delete image {}: {}", snapshot.id, err);
                summary.failures += 1;
            }
        }
    }

    if include_networks {
        let networks = session.list_networks().await?;
        let deletable: Vec<_> = networks
            .into_iter()
            .filter(|n| n.id != PUBLIC_NETWORK_ID && n.id != SERVICE_NETWORK_ID)
            .collect();
        info!("Preparing to delete {} networks...", deletable.len());
        for network in deletable {
            match session.delete_network(&network.id).await {
                Ok(()) => summary.networks += 1,
                Err(err) => {
                    warn!("Failed to delete network {}: {}", network.id, err);
                    summary.failures += 1;
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::MockSession;
    use crate::client::{Image, Keypair, Network, ServerSummary};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sweep_deletes_each_category() {
        let session = Arc::new(MockSession {
            keypairs: vec![
                Keypair {
                    name: "key-1".to_string(),
                },
                Keypair {
                    name: "key-2".to_string(),
                },
            ],
            snapshots: vec![Image {
                id: "snap-1".to_string(),
                name: "backup".to_string(),
            }],
            servers: vec![ServerSummary {
                id: "srv-leftover".to_string(),
                name: "fleetsmith-old".to_string(),
            }],
            ..Default::default()
        });

        let summary = sweep_account(session.as_ref(), false).await.unwrap();

        assert_eq!(summary.keypairs, 2);
        assert_eq!(summary.servers, 1);
        assert_eq!(summary.snapshots, 1);
        assert_eq!(summary.networks, 0);
        assert_eq!(summary.failures, 0);
        assert_eq!(
            session.deleted_keypairs.lock().unwrap().as_slice(),
            ["key-1", "key-2"]
        );
        assert_eq!(session.deleted_images.lock().unwrap().as_slice(), ["snap-1"]);
    }

    #[tokio::test]
    async fn test_reserved_networks_are_kept() {
        let session = Arc::new(MockSession {
            networks: vec![
                Network {
                    id: PUBLIC_NETWORK_ID.to_string(),
                    label: "public".to_string(),
                },
                Network {
                    id: SERVICE_NETWORK_ID.to_string(),
                    label: "private".to_string(),
                },
                Network {
                    id: "net-custom".to_string(),
                    label: "qe-isolated".to_string(),
                },
            ],
            ..Default::default()
        });

        let summary = sweep_account(session.as_ref(), true).await.unwrap();

        assert_eq!(summary.networks, 1);
        assert_eq!(
            session.deleted_networks.lock().unwrap().as_slice(),
            ["net-custom"]
        );
    }

    #[tokio::test]
    async fn test_networks_skipped_unless_requested() {
        let session = Arc::new(MockSession {
            networks: vec![Network {
                id: "net-custom".to_string(),
                label: "qe-isolated".to_string(),
            }],
            ..Default::default()
        });

        let summary = sweep_account(session.as_ref(), false).await.unwrap();
        assert_eq!(summary.networks, 0);
        assert!(session.deleted_networks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_continues_past_delete_failures() {
        let session = Arc::new(MockSession {
            keypairs: vec![
                Keypair {
                    name: "stuck".to_string(),
                },
                Keypair {
                    name: "fine".to_string(),
                },
            ],
            fail_keypair_deletes: vec!["stuck".to_string()],
            ..Default::default()
        });

        let summary = sweep_account(session.as_ref(), false).await.unwrap();

        assert_eq!(summary.keypairs, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(session.deleted_keypairs.lock().unwrap().as_slice(), ["fine"]);
    }
}
