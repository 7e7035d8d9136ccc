use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;

use super::{TariffKind, TariffSnapshot};

pub const UNAVAILABLE: &str = "unavailable";

/// Static identity of one published sensor entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub kind: TariffKind,
    pub entity_id: String,
    pub friendly_name: String,
    pub unit: String,
}

impl SensorDescriptor {
    pub fn new(kind: TariffKind, entity_prefix: &str, name_prefix: &str, unit: &str) -> Self {
        Self {
            kind,
            entity_id: format!("{entity_prefix}_{}", kind.slug()),
            friendly_name: format!("{name_prefix} {}", kind.label()),
            unit: unit.to_string(),
        }
    }
}

/// Body of a Home Assistant `POST /api/states/<entity_id>` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl SensorState {
    pub fn available(descriptor: &SensorDescriptor, snapshot: &TariffSnapshot) -> Self {
        let mut attributes = base_attributes(descriptor);
        let last_updated = snapshot
            .fetched_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| snapshot.fetched_at.to_string());
        attributes.insert("last_updated".into(), Value::String(last_updated));
        attributes.insert(
            "base_price_excl_vat".into(),
            Value::String(snapshot.base(descriptor.kind).to_string()),
        );
        attributes.insert("vat_rate".into(), Value::String(snapshot.vat_percent()));
        attributes.insert("source_url".into(), Value::String(snapshot.source_url.clone()));

        Self {
            state: snapshot.rate(descriptor.kind).to_string(),
            attributes,
        }
    }

    pub fn unavailable(descriptor: &SensorDescriptor) -> Self {
        Self {
            state: UNAVAILABLE.to_string(),
            attributes: base_attributes(descriptor),
        }
    }
}

fn base_attributes(descriptor: &SensorDescriptor) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("friendly_name".into(), Value::String(descriptor.friendly_name.clone()));
    attributes.insert("unit_of_measurement".into(), Value::String(descriptor.unit.clone()));
    attributes.insert("device_class".into(), Value::String("monetary".into()));
    attributes
}
