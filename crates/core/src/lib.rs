//! Domain types and policy shared by every Navigator crate.
//!
//! Nothing in here performs I/O. The persistence seam ([`store::ImageStore`])
//! is declared here so that the pipeline and the database layer can meet
//! without depending on each other.

pub mod error;
pub mod hires;
pub mod job_events;
pub mod store;
pub mod task;
pub mod types;
pub mod validation;
