pub mod collector;
pub mod history;
pub mod host;
pub mod platform;
pub mod sampler;
pub mod sensors;
pub mod snapshot;
