/// ScanWarden Console — headless text frontend.
///
/// This crate contains the presentation state and rendering. Scan logic
/// lives in `scanwarden-core`.
pub mod render;
pub mod state;

pub use state::{ConsolePhase, ConsoleState, ResultRow, Severity};
