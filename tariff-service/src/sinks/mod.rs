pub mod sensor;
pub mod snapshot_store;

pub use sensor::SensorSink;
pub use snapshot_store::SnapshotStore;
