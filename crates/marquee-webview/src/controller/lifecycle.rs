use std::sync::Arc;
use std::time::Duration;

use marquee_channel::Endpoint;
use marquee_common::{LifecycleEvent, WebviewMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::panel::{Panel, PanelHandle};

use super::types::{GuiState, Readiness};
use super::{ControllerInner, GuiController};

impl GuiController {
    /// Open the panel with the configured readiness timeout.
    pub fn open(&self) {
        self.open_with_delay(self.inner.options.ready_timeout);
    }

    /// Open the panel, or reveal it if it is already active. Revealing
    /// publishes `WebviewOpen` again.
    ///
    /// A new panel is created and raced against `delay`: if it does not
    /// report `{ ready: true }` in time it is disposed and recreated with
    /// the delay grown by the backoff step, up to the configured number of
    /// attempts. Any open already in flight is cancelled first.
    pub fn open_with_delay(&self, delay: Duration) {
        let mut session = self.inner.lock_session();
        if session.status == GuiState::Active {
            if let Some(panel) = &session.panel {
                panel.reveal();
                drop(session);
                self.inner.publish(LifecycleEvent::WebviewOpen);
                return;
            }
        }

        self.inner.reset_session(&mut session);
        session.generation += 1;
        session.status = GuiState::Opening;

        let generation = session.generation;
        let inner = Arc::clone(&self.inner);
        session.task = Some(tokio::spawn(async move {
            inner.run_open(generation, delay).await;
        }));
    }

    /// Dispose the panel and everything tied to it. Pending readiness
    /// waits, retries and the recovery push stop immediately. Returns false
    /// if there was nothing to close.
    pub fn close(&self) -> bool {
        let previous = {
            let mut session = self.inner.lock_session();
            let previous = session.status;
            self.inner.reset_session(&mut session);
            session.generation += 1;
            session.status = GuiState::Closed;
            previous
        };

        match previous {
            GuiState::Closed => false,
            GuiState::Active => {
                info!("Webview closed");
                self.inner.publish(LifecycleEvent::WebviewClose);
                true
            }
            _ => {
                info!(state = ?previous, "Pending webview open cancelled");
                true
            }
        }
    }

    /// Attach another webview while the primary panel is active. It gets
    /// its own readiness handshake (one attempt) and then receives the same
    /// broadcasts and recovery pushes. Returns false if no panel is active.
    pub fn attach_secondary(&self, handle: PanelHandle) -> bool {
        let mut session = self.inner.lock_session();
        if session.status != GuiState::Active {
            debug!("No active panel, secondary webview rejected");
            handle.panel.dispose();
            return false;
        }

        let generation = session.generation;
        let inner = Arc::clone(&self.inner);
        session.side_tasks.push(tokio::spawn(async move {
            inner.run_secondary(generation, handle).await;
        }));
        true
    }
}

impl ControllerInner {
    pub(crate) async fn run_open(self: Arc<Self>, generation: u64, first_delay: Duration) {
        let attempts = self.options.max_open_attempts.max(1);
        let mut delay = first_delay;

        for attempt in 1..=attempts {
            let document = self.document();
            let PanelHandle {
                panel,
                endpoint,
                mut inbound,
            } = match self.factory.create(&document) {
                Ok(handle) => handle,
                Err(e) => {
                    error!(attempt, error = %e, "Failed to create webview panel");
                    self.fail(generation, attempt);
                    return;
                }
            };

            let current = self.with_current(generation, |session| {
                session.status = GuiState::AwaitingReady;
                session.panel = Some(Arc::clone(&panel));
                session.endpoint = Some(Arc::clone(&endpoint));
            });
            if current.is_none() {
                panel.dispose();
                return;
            }
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Awaiting webview readiness");

            match await_ready(&mut inbound, delay).await {
                Readiness::Ready => {
                    self.activate(generation, panel, endpoint, inbound).await;
                    return;
                }
                Readiness::Disposed => {
                    info!(attempt, "Webview disposed before it was ready");
                    self.with_current(generation, |session| {
                        session.panel = None;
                        session.endpoint = None;
                        session.task = None;
                        session.status = GuiState::Closed;
                    });
                    return;
                }
                outcome => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        ?outcome,
                        "Webview not ready, recreating panel"
                    );
                    panel.dispose();
                    let current = self.with_current(generation, |session| {
                        session.panel = None;
                        session.endpoint = None;
                        session.status = GuiState::Closed;
                    });
                    if current.is_none() {
                        return;
                    }
                    delay += self.options.backoff_step;
                }
            }
        }

        error!(attempts, "Webview never became ready, giving up");
        self.fail(generation, attempts);
    }

    pub(super) async fn activate(
        self: &Arc<Self>,
        generation: u64,
        panel: Arc<dyn Panel>,
        endpoint: Arc<dyn Endpoint>,
        inbound: mpsc::UnboundedReceiver<Value>,
    ) {
        let gui_channel = self.gui_channel();
        let client = gui_channel.attach(Arc::clone(&endpoint));
        let current = self.with_current(generation, |session| {
            session.status = GuiState::Active;
            session.client = Some(client);
        });
        if current.is_none() {
            gui_channel.detach(endpoint.id());
            panel.dispose();
            return;
        }

        self.state.attach_endpoint(Arc::clone(&endpoint));
        let extensions = self
            .extensions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for extension in &extensions {
            self.bind_extension(generation, &endpoint, extension);
        }

        info!(endpoint = %endpoint.id(), "Webview active");
        self.publish(LifecycleEvent::WebviewOpen);

        self.serve(&endpoint, inbound).await;

        // The webview went away on its own
        let closed = self.with_current(generation, |session| {
            // This task is the one finishing; nothing to abort
            session.task = None;
            self.reset_session(session);
            session.status = GuiState::Closed;
        });
        if closed.is_some() {
            info!(endpoint = %endpoint.id(), "Webview disposed");
            self.publish(LifecycleEvent::WebviewClose);
        }
    }

    pub(crate) async fn run_secondary(self: Arc<Self>, generation: u64, handle: PanelHandle) {
        let PanelHandle {
            panel,
            endpoint,
            mut inbound,
        } = handle;

        let outcome = await_ready(&mut inbound, self.options.ready_timeout).await;
        if outcome != Readiness::Ready {
            warn!(endpoint = %endpoint.id(), ?outcome, "Secondary webview not ready");
            panel.dispose();
            return;
        }

        let current = self.with_current(generation, |session| {
            session
                .secondaries
                .push((Arc::clone(&panel), Arc::clone(&endpoint)));
        });
        if current.is_none() {
            panel.dispose();
            return;
        }

        self.state.attach_endpoint(Arc::clone(&endpoint));
        for namespace in self.channels.namespaces() {
            if let Some(channel) = self.channels.get(&namespace) {
                channel.attach(Arc::clone(&endpoint));
            }
        }
        info!(endpoint = %endpoint.id(), "Secondary webview attached");

        self.serve(&endpoint, inbound).await;

        self.state.detach_endpoint(endpoint.id());
        self.channels.detach_endpoint(endpoint.id());
        self.with_current(generation, |session| {
            session.secondaries.retain(|(_, e)| e.id() != endpoint.id());
        });
        info!(endpoint = %endpoint.id(), "Secondary webview detached");
    }

    /// Give up on the current open. A later `open` starts over.
    fn fail(&self, generation: u64, attempts: u32) {
        let current = self.with_current(generation, |session| {
            session.task = None;
            self.reset_session(session);
            session.status = GuiState::Failed;
        });
        if current.is_some() {
            self.publish(LifecycleEvent::WebviewFailed { attempts });
        }
    }
}

/// Wait for the webview's readiness message. Anything else it sends first
/// is dropped.
pub(crate) async fn await_ready(
    inbound: &mut mpsc::UnboundedReceiver<Value>,
    delay: Duration,
) -> Readiness {
    let probe = async {
        while let Some(message) = inbound.recv().await {
            match WebviewMessage::parse(&message) {
                Ok(WebviewMessage::Ready(true)) => return Readiness::Ready,
                Ok(WebviewMessage::Ready(false)) => return Readiness::Refused,
                _ => debug!("Ignoring webview message before readiness"),
            }
        }
        Readiness::Disposed
    };

    tokio::time::timeout(delay, probe)
        .await
        .unwrap_or(Readiness::TimedOut)
}
