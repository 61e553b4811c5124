pub mod errors;
pub mod events;
pub mod id;
pub mod lifecycle;
pub mod protocol;
pub mod types;

pub use errors::{
    ConfigError, MarqueeError, ProtocolError, StateError, TransportError, WebviewError,
};
pub use events::{EventBus, EventBusRegistry, ListenerId};
pub use id::{new_id, EndpointId};
pub use lifecycle::{LifecycleBus, LifecycleEvent};
pub use protocol::{
    BootstrapPayload, ChannelFrame, CommandRequest, HostMessage, StateEnvelope, WebviewMessage,
};
pub use types::{Disposable, JsonMap, Namespace, NamespaceSnapshot, Snapshot};

pub type Result<T> = std::result::Result<T, MarqueeError>;
