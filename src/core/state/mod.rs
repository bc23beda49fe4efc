// Watermark state for incremental syncs

pub mod manager;
pub mod watermark;

pub use manager::{StateManager, WatermarkSnapshot};
pub use watermark::{format_timestamp, page_maxima, Watermark};
