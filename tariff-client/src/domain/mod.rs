mod sensor_state;
mod tariff_snapshot;

pub use sensor_state::{SensorDescriptor, SensorState, UNAVAILABLE};
pub use tariff_snapshot::{TariffKind, TariffSnapshot};
