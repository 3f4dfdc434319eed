pub mod canvas;
pub mod engine;
pub mod kinds;
pub mod timer;

pub use engine::{AnimationEngine, AnimationError, StartOutcome};
pub use kinds::AnimationKind;
pub use timer::Timer;
