//! Build options shared by the resolver and scheduler.

pub mod opts;

pub use opts::Opts;
