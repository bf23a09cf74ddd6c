//! Bounded worker pool for provisioning batches
//!
//! One tokio task per spec, gated by a semaphore of `width` permits, joined
//! in submission order: `result[i]` always corresponds to `specs[i]`,
//! whatever order the tasks actually finish in. There is no cancellation or
//! pool-level timeout — once submitted, every task runs to its own natural
//! completion, and the only bounded wait is the client's build ceiling.

use crate::client::SessionFactory;
use crate::task::{provision, BuildOutcome, ServerSpec};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

/// Pool width used by build-verification runs
pub const VERIFY_POOL_WIDTH: usize = 8;

/// Run every spec through its own provisioning task, at most `width` at a
/// time, and collect the outcomes in input order.
///
/// A task that panics is degraded to a failed [`BuildOutcome`] carrying the
/// join error; it never takes the rest of the batch down with it.
pub async fn run_batch(
    specs: Vec<ServerSpec>,
    width: usize,
    factory: Arc<dyn SessionFactory>,
) -> Vec<BuildOutcome> {
    debug!("Submitting {} tasks with width {}", specs.len(), width);

    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut handles = Vec::with_capacity(specs.len());
    for spec in specs {
        let semaphore = Arc::clone(&semaphore);
        let factory = Arc::clone(&factory);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            provision(spec, factory).await
        }));
    }

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            joined.unwrap_or_else(|err| {
                error!("Provisioning task died: {}", err);
                BuildOutcome::aborted(format!("task aborted: {err}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{MockFactory, MockSession};
    use crate::generate::{image_flavor_pairs, load_test_specs};
    use crate::client::{Flavor, Image};
    use std::collections::HashMap;
    use std::time::Duration;

    fn image(id: &str, name: &str) -> Image {
        Image {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn flavor(id: &str, name: &str) -> Flavor {
        Flavor {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_outcomes_match_input_order() {
        // The first spec's build is the slowest; its outcome must still
        // come back first.
        let session = Arc::new(MockSession {
            wait_millis_for_image: HashMap::from([
                ("slow".to_string(), 100u64),
                ("medium".to_string(), 50u64),
            ]),
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(session));

        let specs = vec![
            ServerSpec::default().with_image("slow"),
            ServerSpec::default().with_image("medium"),
            ServerSpec::default().with_image("fast"),
        ];
        let outcomes = run_batch(specs, 3, factory).await;

        let ids: Vec<_> = outcomes
            .iter()
            .map(|o| o.server_id.as_deref().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["srv-slow", "srv-medium", "srv-fast"]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_the_rest() {
        let session = Arc::new(MockSession {
            fail_create_for_image: Some("bad".to_string()),
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(session));

        let specs = vec![
            ServerSpec::default().with_image("good-1"),
            ServerSpec::default().with_image("bad"),
            ServerSpec::default().with_image("good-2"),
        ];
        let outcomes = run_batch(specs, 2, factory).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[2].passed);
    }

    #[tokio::test]
    async fn test_zero_width_is_clamped() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(session));

        let specs = vec![ServerSpec::default().with_image("only")];
        let outcomes = run_batch(specs, 0, factory).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].passed);
    }

    #[tokio::test]
    async fn test_empty_batch_returns_empty() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(session));

        let outcomes = run_batch(Vec::new(), VERIFY_POOL_WIDTH, factory).await;
        assert!(outcomes.is_empty());
    }

    // End-to-end: two ubuntu images crossed with one 512MB flavor builds
    // exactly two servers.
    #[tokio::test]
    async fn test_cross_product_end_to_end() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let images = vec![
            image("img-1", "ubuntu-20.04"),
            image("img-2", "ubuntu-22.04"),
            image("img-3", "centos-7"),
        ];
        let flavors = vec![flavor("flv-1", "512MB Standard"), flavor("flv-2", "1GB Standard")];

        let specs = image_flavor_pairs(&images, &flavors, "ubuntu", "512", Some("qe-key"));
        assert_eq!(specs.len(), 2);

        let outcomes = run_batch(specs, VERIFY_POOL_WIDTH, factory).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.passed));
        assert_eq!(session.created.lock().unwrap().len(), 2);
    }

    // End-to-end: a flat batch of five with ramp-up jitter all complete.
    #[tokio::test]
    async fn test_load_test_end_to_end() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let specs = load_test_specs(5, Duration::from_secs(0));
        let outcomes = run_batch(specs.clone(), specs.len(), factory).await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.passed));
    }
}
