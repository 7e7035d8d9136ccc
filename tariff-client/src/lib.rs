pub mod domain;
pub mod ha;

pub use domain::{SensorDescriptor, SensorState, TariffKind, TariffSnapshot};
pub use ha::{HaError, HomeAssistantClient};
