//! Reusable clap argument blocks for the pageowner command line.
pub mod migration;
pub mod tokio;
