//! Background execution of migrations.
//!
//! Each execution walks a fixed plan of steps (see [`plan`]) in its own
//! tokio task. Progress, status and the step log are written back to the
//! store after every transition so pollers see a consistent record, and
//! every write is conditional on the record still being live so a
//! cancellation is never overwritten.

pub mod plan;
pub mod runner;

pub use plan::{deployment_url, PlannedStep, StepAction};
pub use runner::{FinishHook, MigrationRunner};
