pub mod bridge_server;
pub mod protocol;

pub use bridge_server::{BridgeContext, start_bridge_server};
