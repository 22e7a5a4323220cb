//! Process boundary of the job worker: environment-driven configuration and
//! job envelope input. `main.rs` wires these into a
//! [`JobRunner`](genjob_pipeline::JobRunner).

pub mod config;
pub mod input;
