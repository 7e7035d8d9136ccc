pub mod config;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod status_server;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
