// Real-time fan-out to WebSocket subscribers

pub mod manager;
pub mod protocol;
pub mod registry;

pub use manager::ConnectionManager;
pub use protocol::{DeviceSummary, MessageType, PitSummary, RealtimeMessage};
pub use registry::{BroadcastOutcome, Broadcaster, SubscriberChannel, SubscriberId};
