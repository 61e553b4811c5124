//! Inbound message routing for an active webview.

use std::sync::Arc;

use marquee_channel::Endpoint;
use marquee_common::WebviewMessage;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::ControllerInner;

impl ControllerInner {
    /// Route messages from `endpoint` and push the persistence snapshot to
    /// it periodically, until the webview goes away.
    pub(crate) async fn serve(
        &self,
        endpoint: &Arc<dyn Endpoint>,
        mut inbound: mpsc::UnboundedReceiver<Value>,
    ) {
        let mut recovery = time::interval_at(
            Instant::now() + self.options.recovery_initial,
            self.options.recovery_interval,
        );
        recovery.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.handle_message(endpoint, &message),
                    None => break,
                },
                _ = recovery.tick() => self.push_recovery(endpoint),
            }
        }
    }

    pub(crate) fn handle_message(&self, endpoint: &Arc<dyn Endpoint>, message: &Value) {
        match WebviewMessage::parse(message) {
            Ok(WebviewMessage::State(envelope)) => {
                self.state.receive_envelope(Some(endpoint.id()), &envelope);
            }
            Ok(WebviewMessage::Commands(requests)) => {
                let ran = self.commands.execute_all(&requests);
                debug!(endpoint = %endpoint.id(), requested = requests.len(), ran, "Commands dispatched");
            }
            Ok(WebviewMessage::Channel(frame)) => {
                self.channels.route(endpoint.id(), &frame);
            }
            Ok(WebviewMessage::Ready(ready)) => {
                debug!(endpoint = %endpoint.id(), ready, "Ignoring repeated readiness message");
            }
            Err(e) => {
                warn!(endpoint = %endpoint.id(), error = %e, "Dropping malformed webview message");
            }
        }
    }

    fn push_recovery(&self, endpoint: &Arc<dyn Endpoint>) {
        if let Err(e) = endpoint.post_message(self.state.persistence_message()) {
            debug!(endpoint = %endpoint.id(), error = %e, "Persistence push dropped");
        }
    }
}
