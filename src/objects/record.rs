use std::fmt;

use indexmap::IndexMap;
use sc2_terrain::Position;

use crate::error::{Error, Result};

/// Element name of a unit placement in the object list.
pub const UNIT_TAG: &str = "ObjectUnit";

const ATTR_ID: &str = "Id";
const ATTR_POSITION: &str = "Position";
const ATTR_ROTATION: &str = "Rotation";
const ATTR_SCALE: &str = "Scale";
const ATTR_UNIT_TYPE: &str = "UnitType";
const ATTR_PLAYER: &str = "Player";

/// Canonical attribute order for unit elements.
pub const UNIT_ATTRIBUTES: [&str; 6] = [
    ATTR_ID,
    ATTR_POSITION,
    ATTR_ROTATION,
    ATTR_SCALE,
    ATTR_UNIT_TYPE,
    ATTR_PLAYER,
];

/// Generic markup element: name, ordered attributes, nested elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Per-axis model scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// A placed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    /// Kept as text; maps may carry ids that are not integers.
    pub id: String,
    pub unit_type: String,
    pub player: u32,
    pub position: Position,
    pub rotation: f64,
    pub scale: Scale,
    /// Attributes beyond the canonical six, in source order.
    pub extra: IndexMap<String, String>,
    pub children: Vec<Element>,
}

impl UnitRecord {
    pub fn new(
        id: u64,
        unit_type: impl Into<String>,
        player: u32,
        position: Position,
        rotation: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            unit_type: unit_type.into(),
            player,
            position,
            rotation,
            scale: Scale::default(),
            extra: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn numeric_id(&self) -> Option<u64> {
        parse_id(&self.id)
    }

    pub(crate) fn from_element(element: Element) -> Result<Self> {
        let Element { mut attributes, children, .. } = element;
        let id = attributes.shift_remove(ATTR_ID).unwrap_or_default();
        let unit_type = attributes.shift_remove(ATTR_UNIT_TYPE).unwrap_or_default();

        let player = attributes.shift_remove(ATTR_PLAYER);
        let player = match player.as_deref().map(str::trim) {
            None => 1,
            Some(raw) => raw
                .parse()
                .map_err(|_| bad_attribute(&id, ATTR_PLAYER, raw))?,
        };

        let position = match attributes.shift_remove(ATTR_POSITION) {
            None => Position::default(),
            Some(raw) => {
                let [x, y, z] = parse_triple(&raw, 0.0)
                    .ok_or_else(|| bad_attribute(&id, ATTR_POSITION, &raw))?;
                Position::new(x, y, z)
            }
        };

        let rotation = match attributes.shift_remove(ATTR_ROTATION) {
            None => 0.0,
            Some(raw) => parse_number(&raw)
                .ok_or_else(|| bad_attribute(&id, ATTR_ROTATION, &raw))?,
        };

        let scale = match attributes.shift_remove(ATTR_SCALE) {
            None => Scale::default(),
            Some(raw) => {
                let [x, y, z] = parse_triple(&raw, 1.0)
                    .ok_or_else(|| bad_attribute(&id, ATTR_SCALE, &raw))?;
                Scale { x, y, z }
            }
        };

        Ok(Self {
            id,
            unit_type,
            player,
            position,
            rotation,
            scale,
            extra: attributes,
            children,
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut attributes = IndexMap::with_capacity(UNIT_ATTRIBUTES.len() + self.extra.len());
        attributes.insert(ATTR_ID.to_string(), self.id.clone());
        attributes.insert(ATTR_POSITION.to_string(), self.position.to_string());
        attributes.insert(ATTR_ROTATION.to_string(), self.rotation.to_string());
        attributes.insert(ATTR_SCALE.to_string(), self.scale.to_string());
        attributes.insert(ATTR_UNIT_TYPE.to_string(), self.unit_type.clone());
        attributes.insert(ATTR_PLAYER.to_string(), self.player.to_string());
        for (key, value) in &self.extra {
            attributes.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Element {
            name: UNIT_TAG.to_string(),
            attributes,
            children: self.children.clone(),
        }
    }
}

/// Any object-list entry that is not a unit. Carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueRecord {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Element>,
}

impl OpaqueRecord {
    pub fn numeric_id(&self) -> Option<u64> {
        self.attributes.get(ATTR_ID).and_then(|id| parse_id(id))
    }
}

/// One entry of a map's object list.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacedRecord {
    Unit(UnitRecord),
    Opaque(OpaqueRecord),
}

impl PlacedRecord {
    pub fn from_element(element: Element) -> Result<Self> {
        if element.name == UNIT_TAG {
            UnitRecord::from_element(element).map(Self::Unit)
        } else {
            Ok(Self::Opaque(OpaqueRecord {
                tag: element.name,
                attributes: element.attributes,
                children: element.children,
            }))
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            Self::Unit(unit) => unit.to_element(),
            Self::Opaque(opaque) => Element {
                name: opaque.tag.clone(),
                attributes: opaque.attributes.clone(),
                children: opaque.children.clone(),
            },
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Unit(_) => UNIT_TAG,
            Self::Opaque(opaque) => &opaque.tag,
        }
    }

    pub fn numeric_id(&self) -> Option<u64> {
        match self {
            Self::Unit(unit) => unit.numeric_id(),
            Self::Opaque(opaque) => opaque.numeric_id(),
        }
    }

    pub fn as_unit(&self) -> Option<&UnitRecord> {
        match self {
            Self::Unit(unit) => Some(unit),
            Self::Opaque(_) => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut UnitRecord> {
        match self {
            Self::Unit(unit) => Some(unit),
            Self::Opaque(_) => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit(_))
    }
}

impl From<UnitRecord> for PlacedRecord {
    fn from(unit: UnitRecord) -> Self {
        Self::Unit(unit)
    }
}

impl From<OpaqueRecord> for PlacedRecord {
    fn from(opaque: OpaqueRecord) -> Self {
        Self::Opaque(opaque)
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse `"a,b,c"`. A missing third component takes `default_z`.
fn parse_triple(raw: &str, default_z: f64) -> Option<[f64; 3]> {
    let parts: Vec<&str> = raw.split(',').collect();
    match parts.as_slice() {
        [x, y] => Some([parse_number(x)?, parse_number(y)?, default_z]),
        [x, y, z] => Some([parse_number(x)?, parse_number(y)?, parse_number(z)?]),
        _ => None,
    }
}

fn bad_attribute(id: &str, attribute: &str, raw: &str) -> Error {
    Error::Parse(format!("{UNIT_TAG} {id:?}: invalid {attribute} {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_element() -> Element {
        Element::new(UNIT_TAG)
            .with_attribute("Flags", "2")
            .with_attribute("Player", "2")
            .with_attribute("UnitType", "Marine")
            .with_attribute("Position", "10.5,11,8.25")
            .with_attribute("Id", "42")
    }

    #[test]
    fn test_unit_from_element() {
        let unit = UnitRecord::from_element(unit_element()).unwrap();
        assert_eq!(unit.id, "42");
        assert_eq!(unit.numeric_id(), Some(42));
        assert_eq!(unit.unit_type, "Marine");
        assert_eq!(unit.player, 2);
        assert_eq!(unit.position, Position::new(10.5, 11.0, 8.25));
        assert_eq!(unit.rotation, 0.0);
        assert_eq!(unit.scale, Scale::default());
        assert_eq!(unit.extra.get("Flags").map(String::as_str), Some("2"));
        assert_eq!(unit.extra.len(), 1);
    }

    #[test]
    fn test_unit_defaults() {
        let unit = UnitRecord::from_element(Element::new(UNIT_TAG)).unwrap();
        assert_eq!(unit.id, "");
        assert_eq!(unit.numeric_id(), None);
        assert_eq!(unit.player, 1);
        assert_eq!(unit.position, Position::new(0.0, 0.0, 0.0));
        assert_eq!(unit.scale, Scale { x: 1.0, y: 1.0, z: 1.0 });
    }

    #[test]
    fn test_canonical_attribute_order() {
        let unit = UnitRecord::from_element(unit_element()).unwrap();
        let element = unit.to_element();
        let keys: Vec<&str> = element.attributes.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["Id", "Position", "Rotation", "Scale", "UnitType", "Player", "Flags"]
        );
        assert_eq!(element.attributes["Position"], "10.5,11,8.25");
        assert_eq!(element.attributes["Scale"], "1,1,1");
    }

    #[test]
    fn test_invalid_numeric_attributes() {
        for (key, value) in [
            ("Player", "one"),
            ("Position", "1,2,3,4"),
            ("Position", "1,x,3"),
            ("Rotation", "NaN"),
            ("Scale", ""),
        ] {
            let element = Element::new(UNIT_TAG).with_attribute(key, value);
            assert!(
                matches!(UnitRecord::from_element(element), Err(Error::Parse(_))),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn test_opaque_classification() {
        let element = Element::new("ObjectDoodad")
            .with_attribute("Id", "7")
            .with_attribute("Type", "Rock");
        let record = PlacedRecord::from_element(element.clone()).unwrap();
        assert!(!record.is_unit());
        assert_eq!(record.tag(), "ObjectDoodad");
        assert_eq!(record.numeric_id(), Some(7));
        assert_eq!(record.to_element(), element);
    }
}
