//! Experiment harness: configuration sweep, resource metrics and report

mod harness;
mod memory;
mod phases;
mod plan;
pub mod report;

pub use harness::{ExperimentHarness, SweepOutcome};
pub use memory::MemoryProbe;
pub use phases::{build_embedder, build_llms, check_llms, connect_phases, connect_store, BackendPhase};
pub use plan::{GridPoint, SweepPlan};
pub use report::{read_rows, ReportMode, ReportWriter};
