pub mod format;
pub mod net;
pub mod paths;
pub mod pattern;
