//! Adapters for the two JSON shapes older tooling used for object lists.
//!
//! * Units only: `[{"id", "type", "player", "position", "rotation", "scale"}, ..]`
//!   where position and scale are `"x,y,z"` strings. Non-unit objects are
//!   simply absent.
//! * Mixed: every object carries `"tag"` and `"attrib"` (the raw attribute
//!   map); `ObjectUnit` objects additionally carry the unit keys above.
//!
//! Internally both become a `Vec<PlacedRecord>`.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use super::record::{Element, OpaqueRecord, PlacedRecord, UnitRecord, UNIT_TAG};

/// Which legacy shape a list uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacySchema {
    UnitsOnly,
    Mixed,
}

/// A list is mixed iff at least one object carries a `tag` key.
pub fn classify_legacy(objects: &[Value]) -> LegacySchema {
    let tagged = objects
        .iter()
        .any(|obj| obj.as_object().is_some_and(|map| map.contains_key("tag")));
    if tagged {
        LegacySchema::Mixed
    } else {
        LegacySchema::UnitsOnly
    }
}

/// Build records from either legacy shape.
pub fn from_legacy(objects: &[Value]) -> Result<(LegacySchema, Vec<PlacedRecord>)> {
    let schema = classify_legacy(objects);
    let records = objects
        .iter()
        .map(|obj| {
            let map = obj
                .as_object()
                .ok_or_else(|| Error::Parse(format!("legacy object is not a map: {obj}")))?;
            record_from_map(schema, map)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((schema, records))
}

/// Project records back to a legacy shape. `UnitsOnly` drops opaque records.
pub fn to_legacy(records: &[PlacedRecord], schema: LegacySchema) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| match (schema, record) {
            (LegacySchema::UnitsOnly, PlacedRecord::Unit(unit)) => Some(unit_fields(unit)),
            (LegacySchema::UnitsOnly, PlacedRecord::Opaque(_)) => None,
            (LegacySchema::Mixed, PlacedRecord::Unit(unit)) => {
                let mut value = unit_fields(unit);
                value["tag"] = json!(UNIT_TAG);
                value["attrib"] = attributes_value(&unit.to_element().attributes);
                Some(value)
            }
            (LegacySchema::Mixed, PlacedRecord::Opaque(opaque)) => Some(json!({
                "tag": opaque.tag,
                "attrib": attributes_value(&opaque.attributes),
            })),
        })
        .collect()
}

fn record_from_map(schema: LegacySchema, map: &Map<String, Value>) -> Result<PlacedRecord> {
    let tag = match schema {
        LegacySchema::UnitsOnly => UNIT_TAG.to_string(),
        LegacySchema::Mixed => map
            .get("tag")
            .map(scalar_string)
            .transpose()?
            .ok_or_else(|| Error::Parse("mixed legacy object without tag".into()))?,
    };

    let mut element = Element::new(tag);
    if let Some(attrib) = map.get("attrib") {
        let attrib = attrib
            .as_object()
            .ok_or_else(|| Error::Parse("legacy attrib is not a map".into()))?;
        for (key, value) in attrib {
            element.attributes.insert(key.clone(), scalar_string(value)?);
        }
    }

    if element.name == UNIT_TAG {
        for (field, attribute) in [
            ("id", "Id"),
            ("type", "UnitType"),
            ("player", "Player"),
            ("position", "Position"),
            ("rotation", "Rotation"),
            ("scale", "Scale"),
        ] {
            if let Some(value) = map.get(field) {
                element.attributes.insert(attribute.to_string(), scalar_string(value)?);
            }
        }
        return UnitRecord::from_element(element).map(PlacedRecord::Unit);
    }

    Ok(PlacedRecord::Opaque(OpaqueRecord {
        tag: element.name,
        attributes: element.attributes,
        children: Vec::new(),
    }))
}

fn unit_fields(unit: &UnitRecord) -> Value {
    json!({
        "id": unit.id,
        "type": unit.unit_type,
        "player": unit.player.to_string(),
        "position": unit.position.to_string(),
        "rotation": unit.rotation.to_string(),
        "scale": unit.scale.to_string(),
    })
}

fn attributes_value(attributes: &IndexMap<String, String>) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn scalar_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::Parse(format!("expected a scalar, got {other}"))),
    }
}
