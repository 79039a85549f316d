//! Heartbeats on behalf of one in-flight activity invocation.
//!
//! The invoker interprets heartbeat responses: a cancel request or an
//! inactive domain runs the cancel handler once and closes the invoker; an
//! unknown entity closes it without the handler. A closed invoker no longer
//! contacts the service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadenza_core::client::RecordActivityTaskHeartbeatRequest;
use cadenza_core::{ServiceError, WorkflowService};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type CancelHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct HeartbeatState {
    last_sent: Option<Instant>,
    /// Latest details recorded by the activity
    details: Option<Vec<u8>>,
    /// Details recorded while throttled and not yet sent
    unsent: bool,
}

pub struct ServiceInvoker {
    task_token: Vec<u8>,
    identity: String,
    service: Arc<dyn WorkflowService>,
    cancel_handler: CancelHandler,
    interval: Duration,
    cancel_handled: AtomicBool,
    closed: AtomicBool,
    state: Mutex<HeartbeatState>,
}

impl ServiceInvoker {
    /// A zero `interval` sends every heartbeat immediately
    pub fn new(
        task_token: Vec<u8>,
        identity: impl Into<String>,
        service: Arc<dyn WorkflowService>,
        cancel_handler: impl Fn() + Send + Sync + 'static,
        interval: Duration,
    ) -> Self {
        Self {
            task_token,
            identity: identity.into(),
            service,
            cancel_handler: Box::new(cancel_handler),
            interval,
            cancel_handled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            state: Mutex::new(HeartbeatState::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the invoker stopped talking to the service
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record progress and report it to the service.
    ///
    /// Within `interval` of the previous send the details are only stored;
    /// [`run`](Self::run) delivers them on its next tick.
    pub async fn heartbeat(&self, details: Option<Vec<u8>>) -> Result<(), ServiceError> {
        if self.is_closed() {
            return Ok(());
        }

        {
            let mut state = self.state.lock();
            state.details = details.clone();
            let throttled = !self.interval.is_zero()
                && state
                    .last_sent
                    .is_some_and(|sent| sent.elapsed() < self.interval);
            if throttled {
                state.unsent = true;
                return Ok(());
            }
            state.last_sent = Some(Instant::now());
            state.unsent = false;
        }

        self.send(details).await
    }

    async fn send(&self, details: Option<Vec<u8>>) -> Result<(), ServiceError> {
        let request = RecordActivityTaskHeartbeatRequest {
            task_token: self.task_token.clone(),
            details,
            identity: self.identity.clone(),
        };

        match self.service.record_activity_task_heartbeat(request).await {
            Ok(response) => {
                if response.cancel_requested {
                    debug!("Service requested activity cancellation");
                    self.close();
                    self.handle_cancel();
                }
                Ok(())
            }
            Err(err @ ServiceError::DomainNotActive { .. }) => {
                warn!(error = %err, "Heartbeat rejected, domain not active");
                self.close();
                self.handle_cancel();
                Err(err)
            }
            Err(err @ ServiceError::EntityNotExists { .. }) => {
                warn!(error = %err, "Heartbeat rejected, activity no longer exists");
                self.close();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn handle_cancel(&self) {
        if !self.cancel_handled.swap(true, Ordering::AcqRel) {
            (self.cancel_handler)();
        }
    }

    /// Heartbeat every `interval` with the latest recorded details until
    /// `stop` fires or the invoker closes. Returns immediately for a zero
    /// interval.
    pub async fn run(self: Arc<Self>, stop: CancellationToken) {
        if self.interval.is_zero() {
            return;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.is_closed() {
                break;
            }

            let details = {
                let mut state = self.state.lock();
                let recent = !state.unsent
                    && state
                        .last_sent
                        .is_some_and(|sent| sent.elapsed() < self.interval);
                if recent {
                    continue;
                }
                state.last_sent = Some(Instant::now());
                state.unsent = false;
                state.details.clone()
            };

            if let Err(err) = self.send(details).await {
                warn!(error = %err, "Background heartbeat failed");
            }
            if self.is_closed() {
                break;
            }
        }
    }
}

impl std::fmt::Debug for ServiceInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInvoker")
            .field("identity", &self.identity)
            .field("interval", &self.interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}
