// Exit codes for CLI automation
pub const SUCCESS: i32 = 0;
pub const ERROR: i32 = 1;
pub const NOT_FOUND: i32 = 2;
pub const INVALID_INPUT: i32 = 3;
/// `decide` ran fine but the download would stay in the browser
pub const SKIPPED: i32 = 4;
