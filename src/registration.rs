//! Self-registration of a subordinate SCL into its parent.

use crate::core::{Method, Operation, Result, SclError, StatusCode};
use crate::router::Router;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

/// Registers this SCL under `/{nscl}/scls` of the parent, retrying until the
/// parent answers CREATED or CONFLICT, then mirrors the parent locally.
pub struct Registration {
    router: Router,
    nscl_id: String,
    nscl_poc: String,
}

impl Registration {
    /// Fails when the configuration names no parent SCL.
    pub fn new(router: Router) -> Result<Self> {
        let config = &router.context().config;
        let (Some(nscl_id), Some(nscl_poc)) = (config.nscl_id.clone(), config.nscl_poc.clone())
        else {
            return Err(SclError::bad_request(
                "registration needs the parent SCL id and point of contact",
            ));
        };
        Ok(Self {
            router,
            nscl_id,
            nscl_poc,
        })
    }

    fn registration_operation(&self) -> Operation {
        let config = &self.router.context().config;
        let body = json!({
            "id": config.scl_id,
            "link": config.base_uri(),
            "pocs": [config.public_poc()],
        });
        Operation::new(
            Method::Create,
            format!("/{}/scls", self.nscl_id),
            config.admin_identity.clone(),
        )
        .with_representation(body.to_string())
        .with_base(self.nscl_poc.clone())
    }

    /// Runs the protocol to completion. Returns the number of attempts sent
    /// to the parent.
    pub async fn run(&self) -> usize {
        let ctx = self.router.context();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = ctx.client.send(self.registration_operation()).await;
            match result.status_code {
                StatusCode::Created => {
                    info!(nscl = %self.nscl_id, attempts, "registered into parent scl");
                    break;
                }
                StatusCode::Conflict => {
                    info!(nscl = %self.nscl_id, attempts, "already registered into parent scl");
                    break;
                }
                status => {
                    warn!(
                        nscl = %self.nscl_id,
                        %status,
                        retry_in = ?ctx.config.registration_retry,
                        "registration failed"
                    );
                    sleep(ctx.config.registration_retry).await;
                }
            }
        }

        if let Err(err) = self.mirror_parent().await {
            warn!(nscl = %self.nscl_id, error = %err, "cannot mirror parent scl");
        }
        attempts
    }

    /// Creates `/{scl_id}/scls/{nscl}` so operations below it reach the parent.
    async fn mirror_parent(&self) -> Result<()> {
        let ctx = self.router.context();
        let _guard = ctx.lock.read().await;

        let body = json!({
            "id": self.nscl_id,
            "link": format!("/{}", self.nscl_id),
            "pocs": [self.nscl_poc],
        });
        let operation = Operation::new(
            Method::Create,
            format!("{}/scls", ctx.base_uri()),
            ctx.config.admin_identity.clone(),
        )
        .with_representation(body.to_string());

        let result = self.router.dispatch(operation).await;
        match result.status_code {
            StatusCode::Created | StatusCode::Conflict => Ok(()),
            status => Err(SclError::Internal(format!(
                "local mirror of '{}' answered {}",
                self.nscl_id, status
            ))),
        }
    }

    /// Runs the protocol on a background task.
    pub fn spawn(self) -> RegistrationWorker {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let join_handle = tokio::spawn(async move {
            tokio::select! {
                _ = &mut stop_rx => {
                    info!(nscl = %self.nscl_id, "registration cancelled");
                }
                _ = self.run() => {}
            }
        });
        RegistrationWorker {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }
}

/// Handle on a spawned registration task.
pub struct RegistrationWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl RegistrationWorker {
    /// Waits for the registration to finish.
    pub async fn join(mut self) -> Result<()> {
        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| SclError::Internal(format!("registration join: {}", err)))?;
        }
        Ok(())
    }

    /// Stops retrying and waits for the task to exit.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.join().await
    }
}

impl Drop for RegistrationWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}
