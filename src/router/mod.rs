// ABOUTME: Message routing between host, sandbox and inspector contexts
// Hosts the inspector protocol bridge and the port plumbing each context posts through

pub mod bridge;
pub mod message_router;
pub mod ports;

pub use bridge::{BridgeOutput, InspectorBridge, HANDSHAKE_DOMAINS};
pub use message_router::{Delivery, HostEvent, MessageRouter, Outlets, RouterStats};
pub use ports::PortSender;
