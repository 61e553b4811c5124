use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use marquee_common::{ChannelFrame, EndpointId};
use tracing::debug;

use crate::channel::Channel;

/// Every host-side channel, keyed by namespace.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel, replacing any previous one for the same namespace.
    pub fn insert(&self, channel: Channel) -> Option<Channel> {
        self.lock()
            .insert(channel.namespace().to_string(), channel)
    }

    pub fn get(&self, namespace: &str) -> Option<Channel> {
        self.lock().get(namespace).cloned()
    }

    pub fn remove(&self, namespace: &str) -> Option<Channel> {
        self.lock().remove(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Hand an inbound frame to the channel that owns its namespace.
    /// Returns false when no such channel exists.
    pub fn route(&self, origin: &EndpointId, frame: &ChannelFrame) -> bool {
        match self.get(frame.namespace()) {
            Some(channel) => {
                channel.handle_frame(origin, frame);
                true
            }
            None => {
                debug!(namespace = %frame.namespace(), endpoint = %origin, "No channel for frame");
                false
            }
        }
    }

    /// Detach an endpoint from every channel, e.g. when its panel closes.
    pub fn detach_endpoint(&self, id: &EndpointId) {
        let channels: Vec<Channel> = self.lock().values().cloned().collect();
        for channel in channels {
            channel.detach(id);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Channel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
