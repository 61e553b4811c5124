//! WebSocket host: browser tabs connect and act as Marquee webviews.

mod connection;
mod factory;

use std::sync::Arc;

use marquee_common::{LifecycleBus, LifecycleEvent, MarqueeError, WebviewError};
use marquee_config::MarqueeConfig;
use marquee_layout::{ThirdPartyWidget, WidgetRegistry};
use marquee_state::StateManager;
use marquee_webview::{ControllerOptions, GuiController};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use crate::dashboard;

pub use factory::SocketPanelFactory;

/// Host commands a webview can run through `execCommands`. Handlers only
/// forward them to the serve loop, which owns the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Open,
    Close,
    Reset,
    DefineWidget(ThirdPartyWidget),
}

/// Register `marquee.*` commands that forward to `tx`.
pub fn register_host_commands(controller: &GuiController, tx: &mpsc::UnboundedSender<HostCommand>) {
    let commands = controller.commands();
    for (name, command) in [
        ("marquee.open", HostCommand::Open),
        ("marquee.close", HostCommand::Close),
        ("marquee.reset", HostCommand::Reset),
    ] {
        let tx = tx.clone();
        commands.register(name, move |_, _| {
            tx.send(command.clone()).map_err(|e| e.to_string())
        });
    }

    let tx = tx.clone();
    commands.register("marquee.defineWidget", move |args, _| {
        let definition = args.first().cloned().unwrap_or(Value::Null);
        let widget: ThirdPartyWidget =
            serde_json::from_value(definition).map_err(|e| format!("invalid widget: {e}"))?;
        tx.send(HostCommand::DefineWidget(widget))
            .map_err(|e| e.to_string())
    });
}

/// Everything the serve loop acts on.
struct Host {
    controller: GuiController,
    state: Arc<StateManager>,
    lifecycle: Arc<LifecycleBus>,
    registry: WidgetRegistry,
    disabled: Vec<String>,
}

impl Host {
    fn apply(&mut self, command: HostCommand) {
        match command {
            HostCommand::Open => self.controller.open(),
            HostCommand::Close => {
                self.controller.close();
            }
            HostCommand::Reset => match self.state.clear() {
                Ok(()) => info!("Marquee state reset"),
                Err(e) => error!(error = %e, "Failed to reset state"),
            },
            HostCommand::DefineWidget(widget) => {
                match dashboard::define_widget(&self.state, &mut self.registry, widget, &self.disabled) {
                    Ok(widgets) if !widgets.is_empty() => {
                        self.lifecycle.publish(LifecycleEvent::ModesReconciled { widgets });
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Failed to persist reconciled modes"),
                }
            }
        }
    }
}

/// Run the host until Ctrl-C.
pub async fn serve(
    config: &MarqueeConfig,
    state: Arc<StateManager>,
    bind: &str,
) -> Result<(), MarqueeError> {
    let lifecycle = Arc::new(LifecycleBus::default());
    let factory = Arc::new(SocketPanelFactory::new());
    let controller = GuiController::new(
        ControllerOptions::from(&config.gui),
        factory.clone(),
        Arc::clone(&state),
        Arc::clone(&lifecycle),
    );

    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    register_host_commands(&controller, &command_tx);
    let mut host = Host {
        controller: controller.clone(),
        state,
        lifecycle: Arc::clone(&lifecycle),
        registry: WidgetRegistry::new(),
        disabled: config.widgets.disabled.clone(),
    };

    let listener = TcpListener::bind(bind).await?;
    info!(addr = %bind, "Marquee host listening");

    let log_task = tokio::spawn(log_lifecycle(lifecycle.subscribe()));
    tokio::spawn(forward_open_requests(lifecycle.subscribe(), command_tx.clone()));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let controller = controller.clone();
                    let factory = Arc::clone(&factory);
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => {
                                connection::handle_connection(ws, addr, controller, &factory).await
                            }
                            Err(e) => warn!(peer = %addr, error = %e, "WS handshake failed"),
                        }
                    });
                }
                Err(e) => warn!(error = %e, "TCP accept error"),
            },

            Some(command) = command_rx.recv() => {
                debug!(?command, "Host command");
                host.apply(command);
            }

            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    controller.close();
    lifecycle.publish(LifecycleEvent::Shutdown);
    let _ = log_task.await;
    Ok(())
}

/// Turn widget open requests into [`HostCommand::Open`].
async fn forward_open_requests(
    mut events: broadcast::Receiver<LifecycleEvent>,
    tx: mpsc::UnboundedSender<HostCommand>,
) {
    loop {
        match events.recv().await {
            Ok(LifecycleEvent::GuiOpenRequested) => {
                if tx.send(HostCommand::Open).is_err() {
                    break;
                }
            }
            Ok(LifecycleEvent::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Open request forwarder fell behind");
            }
        }
    }
}

async fn log_lifecycle(mut events: broadcast::Receiver<LifecycleEvent>) {
    loop {
        match events.recv().await {
            Ok(LifecycleEvent::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(LifecycleEvent::WebviewFailed { attempts }) => {
                let e = WebviewError::ReadinessExhausted(attempts);
                error!(error = %e, "Webview failed, open it again to retry");
            }
            Ok(event) => info!(?event, "Lifecycle event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Lifecycle log fell behind");
            }
        }
    }
}
