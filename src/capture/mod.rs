pub mod decision;
pub mod engine;
pub mod event;
pub mod request;

pub use decision::{CaptureRuleSet, Decision, SkipReason, should_capture};
pub use engine::{CaptureEngine, CaptureError, CaptureOutcome, CaptureState};
pub use event::{DownloadEvent, NativeDownload};
pub use request::DownloadRequest;
