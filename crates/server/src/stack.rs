//! Ordered startup and shutdown of long-lived units.
//!
//! Units start in list order and stop in reverse. A failed start rolls back
//! the units that already started; a stop attempts every unit and reports the
//! first failure.

use crate::server::Fault;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Where running units report faults.
pub type FaultSink = mpsc::UnboundedSender<Fault>;

/// Errors returned by a single unit.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("already started")]
    AlreadyStarted,

    #[error("not started")]
    NotStarted,

    #[error("{0}")]
    Failed(String),
}

/// A long-lived unit managed by a [`Stack`].
#[async_trait]
pub trait Service: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Start the unit. Faults raised while it runs go to `faults`.
    async fn start(&mut self, faults: FaultSink) -> Result<(), ServiceError>;

    /// Stop the unit, returning once it has fully stopped.
    async fn stop(&mut self) -> Result<(), ServiceError>;
}

/// Stack lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("stack already started")]
    AlreadyStarted,

    #[error("failed to start {service}: {source}")]
    StartFailed {
        service: String,
        #[source]
        source: ServiceError,
    },

    #[error("failed to stop {service}: {source}")]
    StopFailed {
        service: String,
        #[source]
        source: ServiceError,
    },
}

/// A fixed sequence of units.
pub struct Stack {
    services: Vec<Box<dyn Service>>,
    state: StackState,
}

impl Stack {
    pub fn new(services: Vec<Box<dyn Service>>) -> Self {
        Self {
            services,
            state: StackState::NotStarted,
        }
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    /// Start every unit in order.
    ///
    /// On the first failure the units already started are stopped in reverse
    /// order, their errors ignored, and the start error is returned. A stack
    /// can only be started once.
    pub async fn start(&mut self, faults: FaultSink) -> Result<(), StackError> {
        if self.state != StackState::NotStarted {
            return Err(StackError::AlreadyStarted);
        }
        self.state = StackState::Starting;

        for i in 0..self.services.len() {
            let service = &mut self.services[i];
            tracing::debug!(service = %service.name(), "Starting service");

            if let Err(source) = service.start(faults.clone()).await {
                let name = service.name().to_string();
                tracing::error!(service = %name, error = %source, "Service failed to start, rolling back");

                for started in self.services[..i].iter_mut().rev() {
                    if let Err(e) = started.stop().await {
                        tracing::warn!(service = %started.name(), error = %e, "Rollback stop failed");
                    }
                }
                self.state = StackState::Stopped;
                return Err(StackError::StartFailed {
                    service: name,
                    source,
                });
            }

            tracing::info!(service = %service.name(), "Service started");
        }

        self.state = StackState::Running;
        Ok(())
    }

    /// Stop every unit in reverse order.
    ///
    /// Every unit gets a stop attempt; the first error is returned. Stopping a
    /// stack that is not running does nothing.
    pub async fn stop(&mut self) -> Result<(), StackError> {
        if self.state != StackState::Running {
            tracing::debug!(state = ?self.state, "Stop requested on a stack that is not running");
            return Ok(());
        }
        self.state = StackState::Stopping;

        let mut first_error = None;
        for service in self.services.iter_mut().rev() {
            match service.stop().await {
                Ok(()) => tracing::info!(service = %service.name(), "Service stopped"),
                Err(source) => {
                    tracing::error!(service = %service.name(), error = %source, "Service failed to stop");
                    if first_error.is_none() {
                        first_error = Some(StackError::StopFailed {
                            service: service.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        self.state = StackState::Stopped;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
