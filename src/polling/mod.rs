//! Background polling of AI diagnostic jobs.

pub mod files;
pub mod poller;
pub mod schedule;

pub use poller::{DiagnosticPoller, DiagnosticSnapshot, DiagnosticSource};
pub use schedule::PollSchedule;
