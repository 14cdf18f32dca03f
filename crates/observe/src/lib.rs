//! Logging and metrics setup shared by the binaries and tests of this
//! workspace.
pub mod metrics;
pub mod tracing;
