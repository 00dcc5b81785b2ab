//! Subcommand implementations.

pub mod compare;
pub mod decide;
pub mod fingerprint;
pub mod score;
