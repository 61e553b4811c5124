//! Webview panel lifecycle.
//!
//! `GuiController` owns at most one primary panel and moves it through
//! `Closed -> Opening -> AwaitingReady -> Active -> Closed`. Every open
//! bumps a generation counter; async work started for an older generation
//! finds it stale and stops, so a timer from a disposed panel can never act
//! on its successor.

use std::sync::{Arc, Mutex, PoisonError};

use marquee_channel::{Channel, ChannelRegistry, Client, Endpoint};
use marquee_common::{Disposable, JsonMap, LifecycleBus, LifecycleEvent};
use marquee_state::{StateManager, WidgetExtension};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bootstrap::BootstrapDocument;
use crate::commands::CommandRegistry;
use crate::panel::{Panel, PanelFactory};

mod handlers;
mod lifecycle;
mod types;


pub use types::{ControllerOptions, GuiState};

/// Namespace of the channel between the host and the Marquee GUI itself.
pub const GUI_CHANNEL: &str = "vscode.marquee";

/// Host-side owner of the Marquee panel.
///
/// Cloning shares the same controller.
#[derive(Clone)]
pub struct GuiController {
    inner: Arc<ControllerInner>,
}

pub(crate) struct ControllerInner {
    pub(crate) options: ControllerOptions,
    pub(crate) factory: Arc<dyn PanelFactory>,
    pub(crate) state: Arc<StateManager>,
    pub(crate) channels: Arc<ChannelRegistry>,
    pub(crate) commands: Arc<CommandRegistry>,
    pub(crate) lifecycle: Arc<LifecycleBus>,
    pub(crate) extensions: Mutex<Vec<WidgetExtension>>,
    pub(crate) session: Mutex<Session>,
}

/// Everything tied to the current panel.
#[derive(Default)]
pub(crate) struct Session {
    pub(crate) status: GuiState,
    pub(crate) generation: u64,
    pub(crate) panel: Option<Arc<dyn Panel>>,
    pub(crate) endpoint: Option<Arc<dyn Endpoint>>,
    pub(crate) client: Option<Client>,
    /// The open/serve task of the primary panel.
    pub(crate) task: Option<JoinHandle<()>>,
    /// Widget channel registrations and secondary webviews.
    pub(crate) side_tasks: Vec<JoinHandle<()>>,
    pub(crate) secondaries: Vec<(Arc<dyn Panel>, Arc<dyn Endpoint>)>,
    pub(crate) disposables: Vec<Disposable>,
}

impl GuiController {
    pub fn new(
        options: ControllerOptions,
        factory: Arc<dyn PanelFactory>,
        state: Arc<StateManager>,
        lifecycle: Arc<LifecycleBus>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                options,
                factory,
                state,
                channels: Arc::new(ChannelRegistry::new()),
                commands: Arc::new(CommandRegistry::new()),
                lifecycle,
                extensions: Mutex::new(Vec::new()),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn status(&self) -> GuiState {
        self.inner.lock_session().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == GuiState::Active
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.inner.state
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.inner.channels
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.inner.commands
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleBus> {
        &self.inner.lifecycle
    }

    /// Send an event to the GUI over its channel. Returns false while no
    /// panel is active.
    pub fn broadcast(&self, event: &str, payload: Value) -> bool {
        let client = self.inner.lock_session().client.clone();
        match client {
            Some(client) => {
                client.emit(event, payload);
                true
            }
            None => {
                debug!(event = %event, "No active panel, broadcast dropped");
                false
            }
        }
    }

    /// Add a widget extension. Its script goes into the next bootstrap
    /// document; if it exports a widget API, a channel is registered for it
    /// whenever a panel becomes active (immediately if one already is).
    pub fn register_extension(&self, extension: WidgetExtension) {
        self.inner
            .extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(extension.clone());

        let active = {
            let session = self.inner.lock_session();
            match (&session.endpoint, session.status) {
                (Some(endpoint), GuiState::Active) => Some((session.generation, Arc::clone(endpoint))),
                _ => None,
            }
        };
        if let Some((generation, endpoint)) = active {
            self.inner.bind_extension(generation, &endpoint, &extension);
        }
    }

    /// The payload a new panel is created with.
    pub fn document(&self) -> BootstrapDocument {
        self.inner.document()
    }
}

impl ControllerInner {
    pub(crate) fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the session if `generation` is still current.
    pub(crate) fn with_current<R>(&self, generation: u64, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut session = self.lock_session();
        (session.generation == generation).then(|| f(&mut *session))
    }

    pub(crate) fn document(&self) -> BootstrapDocument {
        let widget_scripts = self
            .extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|ext| ext.active)
            .filter_map(|ext| ext.widget_script.clone())
            .collect();
        BootstrapDocument::new(self.options.title.clone(), self.state.recover(), widget_scripts)
    }

    /// The GUI's own channel, created on first use.
    pub(crate) fn gui_channel(&self) -> Channel {
        if let Some(channel) = self.channels.get(GUI_CHANNEL) {
            return channel;
        }
        let channel = Channel::new(GUI_CHANNEL, JsonMap::new());
        self.channels.insert(channel.clone());
        channel
    }

    /// Register a channel for one extension on `endpoint` and hand the
    /// client to the extension once the webview acknowledges it.
    pub(crate) fn bind_extension(
        self: &Arc<Self>,
        generation: u64,
        endpoint: &Arc<dyn Endpoint>,
        extension: &WidgetExtension,
    ) {
        let Some(api) = extension.channel_api().cloned() else {
            return;
        };

        let mut defaults = api.default_state();
        defaults.extend(api.default_configuration());
        let channel = Channel::new(extension.id.clone(), defaults);
        self.channels.insert(channel.clone());

        let inner = Arc::clone(self);
        let endpoint = Arc::clone(endpoint);
        let namespace = extension.id.clone();
        let timeout = self.options.ready_timeout;
        let task = tokio::spawn(async move {
            match channel.register_with_timeout(vec![endpoint], timeout).await {
                Ok(client) => {
                    let mut pending = api.setup(client);
                    inner.with_current(generation, |session| {
                        session.disposables.extend(pending.take());
                    });
                    if let Some(stale) = pending {
                        stale.dispose();
                    }
                    info!(namespace = %namespace, "Widget channel bound");
                }
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Widget channel not acknowledged");
                }
            }
        });

        let mut task = Some(task);
        self.with_current(generation, |session| session.side_tasks.extend(task.take()));
        if let Some(stale) = task {
            stale.abort();
            debug!(namespace = %extension.id, "Panel changed before widget channel was bound");
        }
    }

    /// Drop everything tied to the current panel without touching the
    /// status or publishing events. The caller holds the session lock.
    pub(crate) fn reset_session(&self, session: &mut Session) {
        if let Some(task) = session.task.take() {
            task.abort();
        }
        for task in session.side_tasks.drain(..) {
            task.abort();
        }
        for disposable in session.disposables.drain(..) {
            disposable.dispose();
        }
        if let Some(endpoint) = session.endpoint.take() {
            self.state.detach_endpoint(endpoint.id());
            self.channels.detach_endpoint(endpoint.id());
        }
        if let Some(panel) = session.panel.take() {
            panel.dispose();
        }
        for (panel, endpoint) in session.secondaries.drain(..) {
            self.state.detach_endpoint(endpoint.id());
            self.channels.detach_endpoint(endpoint.id());
            panel.dispose();
        }
        session.client = None;
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        let receivers = self.lifecycle.publish(event.clone());
        debug!(?event, receivers, "Lifecycle event published");
    }
}
