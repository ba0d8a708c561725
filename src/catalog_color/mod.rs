pub mod alpha_mask;
pub mod background;
pub mod fetch;
pub mod item;
mod kmeans;
pub mod orchestrator;
pub mod palette;
mod quantize;
pub mod resize;
pub mod selector;
