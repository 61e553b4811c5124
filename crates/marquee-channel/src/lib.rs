//! Channel transport between the extension host and webview documents.
//!
//! Star topology: the host is the hub and every webview is an
//! [`Endpoint`]. Provides:
//! - [`EndpointSet`]: fan-out to attached endpoints, pruning closed ones
//! - [`Channel`] / [`Client`]: host side of a namespaced event channel
//! - [`WebviewChannel`] / [`WebviewClient`]: webview side of the same channel
//! - [`ChannelRegistry`]: routes inbound frames to the channel owning the namespace
//! - [`MemoryEndpoint`]: in-process endpoint backed by an unbounded queue

pub mod channel;
pub mod endpoint;
pub mod registry;
pub mod webview;

pub use channel::{Channel, Client};
pub use endpoint::{Endpoint, EndpointSet, MemoryEndpoint};
pub use registry::ChannelRegistry;
pub use webview::{HostLink, WebviewChannel, WebviewClient};
