pub mod commands;
pub mod controller;
mod error;
pub mod state;

pub use commands::Operator;
pub use controller::{AttendanceToggle, ToggleOutcome};
pub use error::AttendanceError;
pub use state::{AttendanceState, Transition};
