use indexmap::{IndexMap, IndexSet};
use sc2_terrain::Position;

/// Map center, used when an addition has no usable coordinates.
pub const MAP_CENTER: (f64, f64) = (16.0, 16.0);

/// Where a batch of added units is anchored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BasePosition {
    /// Height comes from the terrain.
    Planar { x: f64, y: f64 },
    /// Caller-supplied height.
    Full(Position),
}

impl BasePosition {
    /// `[x, y]` is planar, `[x, y, z, ..]` is full; anything shorter falls back
    /// to the map center.
    pub fn from_coords(coords: &[f64]) -> Self {
        match coords {
            [x, y, z, ..] => Self::Full(Position::new(*x, *y, *z)),
            [x, y] => Self::Planar { x: *x, y: *y },
            _ => Self::Planar { x: MAP_CENTER.0, y: MAP_CENTER.1 },
        }
    }

    pub fn xy(&self) -> (f64, f64) {
        match self {
            Self::Planar { x, y } => (*x, *y),
            Self::Full(p) => (p.x, p.y),
        }
    }
}

/// `count` new units of one type for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct Addition {
    pub unit_type: String,
    pub player: u32,
    pub base_position: BasePosition,
    pub rotation: f64,
    pub count: u32,
}

impl Addition {
    pub fn new(unit_type: impl Into<String>, player: u32, base_position: BasePosition) -> Self {
        Self {
            unit_type: unit_type.into(),
            player,
            base_position,
            rotation: 0.0,
            count: 1,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Declarative description of an edit to a map's units.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModificationRequest {
    pub clear_all: bool,
    pub remove_types: IndexSet<String>,
    pub replace_types: IndexMap<String, String>,
    pub additions: Vec<Addition>,
}

impl ModificationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(mut self) -> Self {
        self.clear_all = true;
        self
    }

    pub fn remove(mut self, unit_type: impl Into<String>) -> Self {
        self.remove_types.insert(unit_type.into());
        self
    }

    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replace_types.insert(from.into(), to.into());
        self
    }

    pub fn add(mut self, addition: Addition) -> Self {
        self.additions.push(addition);
        self
    }

    /// Total units the additions will create.
    pub fn added_count(&self) -> usize {
        self.additions.iter().map(|a| a.count as usize).sum()
    }
}
