pub mod animation;
pub mod app;
pub mod capture;
pub mod cli;
pub mod host;
pub mod ipc;
pub mod monitor;
pub mod notify;
pub mod rpc;
pub mod util;

pub use app::{config::Config, state::AppState};
