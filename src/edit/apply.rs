//! Applying a [`ModificationRequest`] to a record set.

use std::collections::HashSet;

use rand::Rng;
use sc2_terrain::{clamp_world, Position, TerrainAnalyzer};
use tracing::{debug, info};

use crate::objects::{PlacedRecord, UnitRecord};
use super::request::{BasePosition, ModificationRequest};

/// First id handed out when no existing record has an integer id.
pub const FIRST_ALLOCATED_ID: u64 = 2_000_001;
/// Max offset on each axis between units of one batch and its base position.
pub const POSITION_JITTER: f64 = 2.0;
/// Max rotation offset between units of one batch.
pub const ROTATION_JITTER: f64 = 0.5;

/// Minimum spacing used when relocating an unwalkable unit.
const RELOCATE_MIN_DISTANCE: f64 = 1.0;

/// Hands out unit ids above every integer id already present. Once the id
/// space above the maximum is exhausted it wraps to [`FIRST_ALLOCATED_ID`],
/// skipping ids that are taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
    used: HashSet<u64>,
}

impl IdAllocator {
    pub fn from_records(records: &[PlacedRecord]) -> Self {
        let used: HashSet<u64> = records.iter().filter_map(PlacedRecord::numeric_id).collect();
        let next = used
            .iter()
            .max()
            .and_then(|max| max.checked_add(1))
            .unwrap_or(FIRST_ALLOCATED_ID);
        Self { next, used }
    }

    fn free_from(&self, mut id: u64) -> u64 {
        while self.used.contains(&id) {
            id = id.checked_add(1).unwrap_or(FIRST_ALLOCATED_ID);
        }
        id
    }

    pub fn peek(&self) -> u64 {
        self.free_from(self.next)
    }

    pub fn allocate(&mut self) -> u64 {
        let id = self.free_from(self.next);
        self.used.insert(id);
        self.next = id.checked_add(1).unwrap_or(FIRST_ALLOCATED_ID);
        id
    }
}

/// Result of [`apply_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    /// Opaque records first, then units. Added units come last.
    pub records: Vec<PlacedRecord>,
    pub removed: usize,
    pub replaced: usize,
    pub added: usize,
}

impl EditReport {
    /// The units created by the additions.
    pub fn added_records(&self) -> &[PlacedRecord] {
        &self.records[self.records.len() - self.added..]
    }

    pub fn added_records_mut(&mut self) -> &mut [PlacedRecord] {
        let start = self.records.len() - self.added;
        &mut self.records[start..]
    }
}

/// Apply `req` with the thread RNG and return the new record set.
pub fn apply(
    existing: &[PlacedRecord],
    req: &ModificationRequest,
    terrain: &TerrainAnalyzer,
) -> Vec<PlacedRecord> {
    apply_with(&mut rand::thread_rng(), existing, req, terrain).records
}

/// Apply `req` to `existing`. Never fails: clauses that match nothing do nothing.
pub fn apply_with<R: Rng + ?Sized>(
    rng: &mut R,
    existing: &[PlacedRecord],
    req: &ModificationRequest,
    terrain: &TerrainAnalyzer,
) -> EditReport {
    let (opaque, original_units): (Vec<&PlacedRecord>, Vec<&PlacedRecord>) =
        existing.iter().partition(|r| !r.is_unit());

    let mut units: Vec<UnitRecord> = if req.clear_all {
        info!(count = original_units.len(), "clearing existing units");
        Vec::new()
    } else {
        original_units
            .iter()
            .filter_map(|r| r.as_unit().cloned())
            .collect()
    };

    let before = units.len();
    units.retain(|u| !req.remove_types.contains(&u.unit_type));
    let removed = before - units.len();
    if removed > 0 {
        info!(removed, types = ?req.remove_types, "removed units");
    }

    let mut replaced = 0;
    for unit in &mut units {
        if let Some(to) = req.replace_types.get(&unit.unit_type) {
            unit.unit_type = to.clone();
            replaced += 1;
        }
    }
    if replaced > 0 {
        info!(replaced, "replaced unit types");
    }

    let mut ids = IdAllocator::from_records(existing);
    debug!(next_id = ids.peek(), "allocating unit ids");

    let mut added = 0;
    for addition in &req.additions {
        let batch = addition.count > 1;
        for _ in 0..addition.count {
            let (dx, dy) = if batch {
                (
                    rng.gen_range(-POSITION_JITTER..=POSITION_JITTER),
                    rng.gen_range(-POSITION_JITTER..=POSITION_JITTER),
                )
            } else {
                (0.0, 0.0)
            };
            let (bx, by) = addition.base_position.xy();
            let (x, y) = (bx + dx, by + dy);
            let z = match addition.base_position {
                BasePosition::Full(p) => p.z,
                BasePosition::Planar { .. } => terrain.height_at(x, y),
            };
            let rotation = if batch {
                addition.rotation + rng.gen_range(-ROTATION_JITTER..=ROTATION_JITTER)
            } else {
                addition.rotation
            };

            units.push(UnitRecord::new(
                ids.allocate(),
                addition.unit_type.as_str(),
                addition.player,
                Position::new(x, y, z),
                rotation,
            ));
            added += 1;
        }
        info!(
            count = addition.count,
            unit_type = %addition.unit_type,
            player = addition.player,
            "added units"
        );
    }

    let records = opaque
        .into_iter()
        .cloned()
        .chain(units.into_iter().map(PlacedRecord::Unit))
        .collect();

    EditReport { records, removed, replaced, added }
}

/// Clamp into the world bound, recompute height, and relocate unwalkable
/// positions to a safe spot. Returns the corrected position and whether it
/// was relocated.
pub fn correct_position<R: Rng + ?Sized>(
    rng: &mut R,
    position: Position,
    terrain: &TerrainAnalyzer,
) -> (Position, bool) {
    let x = clamp_world(position.x);
    let y = clamp_world(position.y);

    if !terrain.is_walkable(x, y) {
        let safe = terrain.find_safe_positions_with(rng, 1, RELOCATE_MIN_DISTANCE, true);
        if let Some(safe) = safe.first() {
            let clamped = safe.clamped();
            return (clamped, true);
        }
    }

    (Position::new(x, y, terrain.height_at(x, y)), false)
}

/// Correct every unit position with the thread RNG.
pub fn validate_positions(
    mut records: Vec<PlacedRecord>,
    terrain: &TerrainAnalyzer,
) -> Vec<PlacedRecord> {
    validate_positions_with(&mut rand::thread_rng(), &mut records, terrain);
    records
}

/// Correct unit positions in place; opaque records are left alone. Returns
/// how many units had to be relocated.
pub fn validate_positions_with<R: Rng + ?Sized>(
    rng: &mut R,
    records: &mut [PlacedRecord],
    terrain: &TerrainAnalyzer,
) -> usize {
    let mut relocated = 0;
    for unit in records.iter_mut().filter_map(PlacedRecord::as_unit_mut) {
        let (position, moved) = correct_position(rng, unit.position, terrain);
        if moved {
            debug!(id = %unit.id, unit_type = %unit.unit_type, %position, "relocated unwalkable unit");
            relocated += 1;
        }
        unit.position = position;
    }
    relocated
}
