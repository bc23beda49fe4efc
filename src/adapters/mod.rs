//! External system integrations for fhirsync.
//!
//! - [`fhir`] - FHIR server access over HTTP (trait-based)
//! - [`storage`] - Local watermark and resource storage (trait-based)
//!
//! Both layers sit behind traits so the sync core can be exercised with
//! in-memory implementations.

pub mod fhir;
pub mod storage;
