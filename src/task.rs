//! Single-server provisioning workflow
//!
//! [`provision`] runs one create→wait→inspect→delete cycle and always
//! returns a [`BuildOutcome`] — never an error. A batch of hundreds of
//! tasks must not be aborted by one bad instance, so every failure path
//! degrades to a populated outcome instead.

use crate::client::{CreateServerRequest, ComputeSession, SessionFactory};
use crate::error::{FleetError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Authentication attempts per task before the task is written off
pub const AUTH_ATTEMPTS: usize = 5;

/// One requested server build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSpec {
    /// Image to boot; account default when absent
    pub image_ref: Option<String>,

    /// Flavor to boot on; account default when absent
    pub flavor_ref: Option<String>,

    /// Keypair to inject
    pub key_name: Option<String>,

    /// Sleep before the task starts, spreading a batch's create requests
    pub ramp_up_delay: Duration,
}

impl ServerSpec {
    /// Set the image
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Set the flavor
    pub fn with_flavor(mut self, flavor_ref: impl Into<String>) -> Self {
        self.flavor_ref = Some(flavor_ref.into());
        self
    }

    /// Set the keypair
    pub fn with_key(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Set the ramp-up delay
    pub fn with_ramp_up(mut self, delay: Duration) -> Self {
        self.ramp_up_delay = delay;
        self
    }
}

/// Result of one provisioning task
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    /// True only if the server reached active state without a build failure
    pub passed: bool,

    /// Present whenever a create response was obtained, even on failure,
    /// so leaked servers can be found afterwards
    pub server_id: Option<String>,

    /// Wall-clock seconds from create submission to completion or failure
    pub build_duration: f64,

    /// Provider-reported fault detail, when one was found
    pub fault_message: Option<String>,
}

impl BuildOutcome {
    /// Outcome for a task that never got an authenticated session
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            server_id: None,
            build_duration: 0.0,
            fault_message: Some(message.into()),
        }
    }

    /// Outcome for a task that died before producing a result
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            server_id: None,
            build_duration: 0.0,
            fault_message: Some(message.into()),
        }
    }
}

/// Run one full provisioning cycle for `spec`.
///
/// The task authenticates its own session through `factory`; sessions are
/// never shared between concurrent tasks. The created server is always
/// deleted afterwards, pass or fail; delete failures are logged and
/// swallowed, so a leaked server shows up in the provider account but not
/// in the outcome.
pub async fn provision(spec: ServerSpec, factory: Arc<dyn SessionFactory>) -> BuildOutcome {
    if spec.ramp_up_delay > Duration::ZERO {
        debug!("Ramping up for {:?}", spec.ramp_up_delay);
        tokio::time::sleep(spec.ramp_up_delay).await;
    }

    let session = match authenticate_with_retry(factory.as_ref()).await {
        Ok(session) => session,
        Err(err) => {
            warn!("Giving up on task: {}", err);
            return BuildOutcome::auth_failed(err.to_string());
        }
    };

    let request = CreateServerRequest {
        name: format!("fleetsmith-{}", Uuid::new_v4()),
        image_ref: spec.image_ref.clone(),
        flavor_ref: spec.flavor_ref.clone(),
        key_name: spec.key_name.clone(),
    };

    let start = Instant::now();
    let mut passed = true;
    let mut server_id: Option<String> = None;

    match session.create_server(&request).await {
        Ok(created) => {
            if let Err(err) = session.wait_for_build(&created.id).await {
                warn!("Build of server {} failed: {}", created.id, err);
                passed = false;
            }
            server_id = Some(created.id);
        }
        Err(err) => {
            warn!("Create request '{}' failed: {}", request.name, err);
            passed = false;
        }
    }
    let build_duration = start.elapsed().as_secs_f64();

    let mut fault_message = None;
    if let Some(id) = server_id.as_deref() {
        // Fault detail is informational; it does not change `passed` here.
        match session.get_server(id).await {
            Ok(detail) => {
                if let Some(fault) = detail.fault {
                    fault_message = Some(fault.message);
                }
            }
            Err(err) => debug!("Could not fetch detail for server {}: {}", id, err),
        }

        if let Err(err) = session.delete_server(id).await {
            warn!("Failed to delete server {}: {}", id, err);
        }
    }

    BuildOutcome {
        passed,
        server_id,
        build_duration,
        fault_message,
    }
}

async fn authenticate_with_retry(factory: &dyn SessionFactory) -> Result<Arc<dyn ComputeSession>> {
    let mut last_error = String::new();
    for attempt in 1..=AUTH_ATTEMPTS {
        match factory.authenticate().await {
            Ok(session) => return Ok(session),
            Err(err) => {
                warn!(
                    "Authentication attempt {}/{} failed: {}",
                    attempt, AUTH_ATTEMPTS, err
                );
                last_error = err.to_string();
            }
        }
    }
    Err(FleetError::Auth {
        attempts: AUTH_ATTEMPTS,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{MockFactory, MockSession};

    fn spec_for(image: &str) -> ServerSpec {
        ServerSpec::default().with_image(image)
    }

    #[tokio::test]
    async fn test_successful_build_passes_and_cleans_up() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory).await;

        assert!(outcome.passed);
        assert_eq!(outcome.server_id.as_deref(), Some("srv-ubuntu"));
        assert!(outcome.build_duration >= 0.0);
        assert!(outcome.fault_message.is_none());
        assert_eq!(
            session.deleted_servers.lock().unwrap().as_slice(),
            ["srv-ubuntu"]
        );
    }

    #[tokio::test]
    async fn test_create_failure_records_error_without_server_id() {
        let session = Arc::new(MockSession {
            fail_create_for_image: Some("ubuntu".to_string()),
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory).await;

        assert!(!outcome.passed);
        assert!(outcome.server_id.is_none());
        // Nothing was created, so nothing to delete.
        assert!(session.deleted_servers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_failure_keeps_server_id_and_deletes() {
        let session = Arc::new(MockSession {
            fail_wait_for_image: Some("ubuntu".to_string()),
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory).await;

        assert!(!outcome.passed);
        assert_eq!(outcome.server_id.as_deref(), Some("srv-ubuntu"));
        assert_eq!(
            session.deleted_servers.lock().unwrap().as_slice(),
            ["srv-ubuntu"]
        );
    }

    #[tokio::test]
    async fn test_fault_is_informational_only() {
        let session = Arc::new(MockSession {
            fault_for_image: Some(("ubuntu".to_string(), "no hosts available".to_string())),
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory).await;

        // The wait succeeded, so the build passes even though a fault was
        // recorded alongside it.
        assert!(outcome.passed);
        assert_eq!(outcome.fault_message.as_deref(), Some("no hosts available"));
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let session = Arc::new(MockSession {
            fail_delete_server: true,
            ..Default::default()
        });
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory).await;

        assert!(outcome.passed);
        assert!(outcome.fault_message.is_none());
    }

    #[tokio::test]
    async fn test_auth_retry_recovers_after_four_failures() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::failing(4, Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory.clone()).await;

        assert!(outcome.passed);
        assert_eq!(factory.attempts(), 5);
    }

    #[tokio::test]
    async fn test_auth_exhaustion_degrades_to_failed_outcome() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::failing(5, Arc::clone(&session)));

        let outcome = provision(spec_for("ubuntu"), factory.clone()).await;

        assert!(!outcome.passed);
        assert!(outcome.server_id.is_none());
        assert_eq!(outcome.build_duration, 0.0);
        assert!(
            outcome
                .fault_message
                .as_deref()
                .unwrap()
                .contains("authentication failed after 5 attempts")
        );
        assert_eq!(factory.attempts(), 5);
        // No session was ever issued, so nothing was created.
        assert!(session.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spec_fields_reach_the_create_request() {
        let session = Arc::new(MockSession::default());
        let factory = Arc::new(MockFactory::new(Arc::clone(&session)));

        let spec = ServerSpec::default()
            .with_image("ubuntu")
            .with_flavor("512MB")
            .with_key("qe-key");
        provision(spec, factory).await;

        let created = session.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].image_ref.as_deref(), Some("ubuntu"));
        assert_eq!(created[0].flavor_ref.as_deref(), Some("512MB"));
        assert_eq!(created[0].key_name.as_deref(), Some("qe-key"));
        assert!(created[0].name.starts_with("fleetsmith-"));
    }
}
