//! Host commands a webview can ask to run via `{ west: { execCommands } }`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use marquee_common::CommandRequest;
use serde_json::Value;
use tracing::{debug, warn};

type Handler = Arc<dyn Fn(&[Value], Option<&Value>) -> Result<(), String> + Send + Sync>;

/// Command id to handler.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `command`. Returns true if it replaced one.
    pub fn register<F>(&self, command: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&[Value], Option<&Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.lock()
            .insert(command.into(), Arc::new(handler))
            .is_some()
    }

    pub fn unregister(&self, command: &str) -> bool {
        self.lock().remove(command).is_some()
    }

    pub fn contains(&self, command: &str) -> bool {
        self.lock().contains_key(command)
    }

    pub fn commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run one request. Unknown commands and handler failures are logged;
    /// returns whether the handler ran successfully.
    pub fn execute(&self, request: &CommandRequest) -> bool {
        // Handlers may register or run other commands
        let handler = self.lock().get(&request.command).cloned();
        let Some(handler) = handler else {
            warn!(command = %request.command, "Unknown command requested by webview");
            return false;
        };

        match handler(&request.args_list(), request.options.as_ref()) {
            Ok(()) => {
                debug!(command = %request.command, "Command executed");
                true
            }
            Err(e) => {
                warn!(command = %request.command, error = %e, "Command failed");
                false
            }
        }
    }

    /// Run requests in order. Returns how many succeeded.
    pub fn execute_all(&self, requests: &[CommandRequest]) -> usize {
        requests.iter().filter(|r| self.execute(r)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Handler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
