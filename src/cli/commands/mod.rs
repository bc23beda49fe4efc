//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod init;
pub mod plan;
pub mod reset;
pub mod status;
pub mod sync;
pub mod validate;
