//! Off-thread execution of workflows
//!
//! Every workflow may block on storage and on password hashing, so callers on
//! a latency sensitive thread hand commands to [`BackgroundService`] and either
//! await the returned future or pass a continuation. Once started a workflow
//! always runs to completion.
use crate::permission::Session;
use crate::service::{Command, InventoryService, Response, UNEXPECTED_ERROR};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

#[derive(Clone)]
pub struct BackgroundService {
    service: Arc<InventoryService>,
    runtime: Handle,
}

impl BackgroundService {
    pub fn new(service: Arc<InventoryService>, runtime: Handle) -> Self {
        Self { service, runtime }
    }

    /// Bind to the runtime of the calling task.
    pub fn current(service: Arc<InventoryService>) -> anyhow::Result<Self> {
        Ok(Self::new(service, Handle::try_current()?))
    }

    /// Start the workflow on the blocking pool.
    pub fn dispatch(&self, session: Option<Session>, command: Command) -> JoinHandle<Response> {
        let service = Arc::clone(&self.service);
        self.runtime
            .spawn_blocking(move || service.execute(session.as_ref(), command))
    }

    /// Run the workflow off-thread and wait for its response.
    pub async fn execute(&self, session: Option<Session>, command: Command) -> Response {
        let name = command.name();
        joined_response(name, self.dispatch(session, command).await)
    }

    /// Run the workflow off-thread and hand the response to `on_done`.
    ///
    /// `on_done` runs on a runtime worker; marshal UI-affine updates from there.
    pub fn dispatch_with<F>(&self, session: Option<Session>, command: Command, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let this = self.clone();
        self.runtime.spawn(async move {
            let response = this.execute(session, command).await;
            on_done(response);
        })
    }
}

// a worker that panicked or was cancelled reports the generic failure
fn joined_response(name: &str, joined: Result<Response, JoinError>) -> Response {
    match joined {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("{name} worker did not complete: {e}");
            Response::failed(UNEXPECTED_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Status;

    #[tokio::test]
    async fn panicked_worker_becomes_a_generic_failure() {
        let joined = tokio::task::spawn_blocking(|| -> Response { panic!("worker blew up") }).await;
        let response = joined_response("fetch_users", joined);

        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.message, UNEXPECTED_ERROR);
        assert!(!response.message.contains("blew up"));
    }

    #[tokio::test]
    async fn finished_worker_passes_its_response_through() {
        let joined = tokio::task::spawn_blocking(|| Response::failed("Invalid username or password")).await;
        let response = joined_response("login", joined);

        assert_eq!(response.message, "Invalid username or password");
    }
}
