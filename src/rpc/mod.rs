pub mod client;
pub mod error;
pub mod message;
pub mod pending;
pub mod pool;
pub mod resolve;
pub mod socket;

pub use client::{RpcClient, RpcEndpoint};
pub use error::{RpcError, RpcFailureKind, RpcResult};
pub use pool::ClientPool;
