//! Terrain queries and safe-placement search.
//!
//! Coordinates are in the map plane; a point belongs to the integer cell it
//! truncates to. Every query degrades to a permissive answer when the grid it
//! needs is missing, so an analyzer built from an archive without terrain data
//! still produces usable placements.

use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::grid::{HeightGrid, WalkabilityGrid};

/// Upper world coordinate on both axes, regardless of grid resolution.
pub const WORLD_MAX: f64 = 31.0;
/// Gradient magnitude above which a cell counts as a slope or cliff.
pub const MAX_SLOPE: f64 = 200.0;
/// Rejection-sampling attempts per requested position.
pub const ATTEMPTS_PER_POSITION: usize = 50;

const EDGE_MARGIN: f64 = 2.0;
const FALLBACK_MIN: f64 = 2.0;
const FALLBACK_MAX: f64 = 29.0;
const FLAT_STDDEV: f64 = 100.0;
const MOUNTAINOUS_STDDEV: f64 = 500.0;

/// A point on the map. `z` is a world height.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance in the map plane, ignoring height.
    pub fn planar_distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Clamp x and y into the world bound.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_world(self.x),
            y: clamp_world(self.y),
            z: self.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// Clamp a coordinate into `[0, WORLD_MAX]`. NaN maps to 0.
pub fn clamp_world(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, WORLD_MAX)
}

/// How strictly a returned position satisfied the placement constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTier {
    /// Walkable, gentle slope, and spaced from every other strict placement.
    Strict,
    /// Padding drawn after the attempt budget ran out. Only the bound box holds.
    Relaxed,
    /// No height grid: uniform sample in the default interior box.
    Unguided,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub position: Position,
    pub tier: PlacementTier,
}

/// Inclusive sampling box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        (
            sample_range(rng, self.min_x, self.max_x),
            sample_range(rng, self.min_y, self.max_y),
        )
    }
}

/// Uniform sample in `[lo, hi]`; a degenerate range yields `lo`.
fn sample_range<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainClass {
    Flat,
    Hilly,
    Mountainous,
}

impl TerrainClass {
    pub fn from_stddev(stddev: f64) -> Self {
        if stddev < FLAT_STDDEV {
            Self::Flat
        } else if stddev > MOUNTAINOUS_STDDEV {
            Self::Mountainous
        } else {
            Self::Hilly
        }
    }
}

impl fmt::Display for TerrainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Hilly => f.write_str("hilly"),
            Self::Mountainous => f.write_str("mountainous"),
        }
    }
}

/// Summary statistics over the raw height samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainSummary {
    pub size: (u32, u32),
    pub height_range: (u16, u16),
    pub mean: f64,
    pub stddev: f64,
    /// Share of walkable cells, `None` without a walkability grid.
    pub walkable_ratio: Option<f64>,
    pub terrain_class: TerrainClass,
}

impl fmt::Display for TerrainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "map size:        {}x{}", self.size.0, self.size.1)?;
        writeln!(f, "height range:    {}-{}", self.height_range.0, self.height_range.1)?;
        writeln!(f, "average height:  {:.1}", self.mean)?;
        writeln!(f, "height stddev:   {:.1}", self.stddev)?;
        match self.walkable_ratio {
            Some(r) => writeln!(f, "walkable ratio:  {:.1}%", r * 100.0)?,
            None => writeln!(f, "walkable ratio:  unknown")?,
        }
        write!(f, "terrain type:    {}", self.terrain_class)
    }
}

/// Read-only view over the decoded terrain of one map.
#[derive(Debug, Clone, Default)]
pub struct TerrainAnalyzer {
    height: Option<HeightGrid>,
    walkability: Option<WalkabilityGrid>,
}

impl TerrainAnalyzer {
    pub fn new(height: Option<HeightGrid>, walkability: Option<WalkabilityGrid>) -> Self {
        if let (Some(h), Some(w)) = (&height, &walkability) {
            if h.width() != w.width() || h.height() != w.height() {
                warn!(
                    "walkability map size {}x{} does not match height map {}x{}",
                    w.width(),
                    w.height(),
                    h.width(),
                    h.height()
                );
            }
        }
        Self { height, walkability }
    }

    /// Analyzer with no terrain data. Every query answers permissively.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn height_grid(&self) -> Option<&HeightGrid> {
        self.height.as_ref()
    }

    pub fn walkability_grid(&self) -> Option<&WalkabilityGrid> {
        self.walkability.as_ref()
    }

    /// World height at a point; 0 without a height grid or outside it.
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let Some(grid) = &self.height else {
            return 0.0;
        };
        match cell_of(x, y).and_then(|(cx, cy)| grid.sample(cx, cy)) {
            Some(raw) => raw as f64 * grid.scale(),
            None => 0.0,
        }
    }

    /// Whether a point can be walked on; true without a walkability grid or outside it.
    pub fn is_walkable(&self, x: f64, y: f64) -> bool {
        let Some(grid) = &self.walkability else {
            return true;
        };
        cell_of(x, y)
            .and_then(|(cx, cy)| grid.walkable(cx, cy))
            .unwrap_or(true)
    }

    pub fn summary(&self) -> Option<TerrainSummary> {
        let grid = self.height.as_ref()?;
        let samples = grid.samples();
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        let walkable_ratio = self.walkability.as_ref().map(|w| {
            let total = w.cells().len();
            if total == 0 {
                0.0
            } else {
                w.walkable_count() as f64 / total as f64
            }
        });

        Some(TerrainSummary {
            size: (grid.width(), grid.height()),
            height_range: grid.range(),
            mean,
            stddev,
            walkable_ratio,
            terrain_class: TerrainClass::from_stddev(stddev),
        })
    }

    /// The box `find_safe_positions` samples from, `None` without a height grid.
    pub fn bound_box(&self, avoid_edges: bool) -> Option<BoundBox> {
        let grid = self.height.as_ref()?;
        let margin = if avoid_edges { EDGE_MARGIN } else { 0.0 };
        // Grids narrower than the margin collapse to a point at the margin.
        let upper = |extent: u32| (WORLD_MAX - margin).min(extent as f64).max(margin);
        Some(BoundBox {
            min_x: margin,
            max_x: upper(grid.width()),
            min_y: margin,
            max_y: upper(grid.height()),
        })
    }

    /// Slope estimate per cell, row-major with the height grid's dimensions.
    pub fn gradient_magnitude(&self) -> Option<SlopeMap> {
        self.height.as_ref().map(SlopeMap::from_heights)
    }

    /// `count` placement positions using the thread RNG.
    pub fn find_safe_positions(
        &self,
        count: usize,
        min_distance: f64,
        avoid_edges: bool,
    ) -> Vec<Position> {
        self.find_safe_positions_with(&mut rand::thread_rng(), count, min_distance, avoid_edges)
    }

    pub fn find_safe_positions_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        min_distance: f64,
        avoid_edges: bool,
    ) -> Vec<Position> {
        self.find_placements_with(rng, count, min_distance, avoid_edges)
            .into_iter()
            .map(|p| p.position)
            .collect()
    }

    /// Rejection-sampling search. Always returns exactly `count` placements;
    /// whatever the attempt budget could not satisfy is padded with
    /// [`PlacementTier::Relaxed`] entries.
    pub fn find_placements_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        min_distance: f64,
        avoid_edges: bool,
    ) -> Vec<Placement> {
        let Some(bounds) = self.bound_box(avoid_edges) else {
            return (0..count)
                .map(|_| {
                    let x = rng.gen_range(FALLBACK_MIN..=FALLBACK_MAX);
                    let y = rng.gen_range(FALLBACK_MIN..=FALLBACK_MAX);
                    Placement {
                        position: Position::new(x, y, 0.0),
                        tier: PlacementTier::Unguided,
                    }
                })
                .collect();
        };

        let slopes = self.gradient_magnitude();
        let mut placements: Vec<Placement> = Vec::with_capacity(count);
        let max_attempts = count.saturating_mul(ATTEMPTS_PER_POSITION);
        let mut attempts = 0usize;

        while placements.len() < count && attempts < max_attempts {
            attempts += 1;
            let (x, y) = bounds.sample(rng);

            if !self.is_walkable(x, y) {
                continue;
            }

            let steep = match (&slopes, cell_of(x, y)) {
                (Some(slopes), Some((cx, cy))) => {
                    slopes.at(cx, cy).map_or(true, |g| g > MAX_SLOPE)
                }
                _ => true,
            };
            if steep {
                continue;
            }

            let candidate = Position::new(x, y, 0.0);
            if placements
                .iter()
                .any(|p| p.position.planar_distance(&candidate) < min_distance)
            {
                continue;
            }

            placements.push(Placement {
                position: Position::new(x, y, self.height_at(x, y)),
                tier: PlacementTier::Strict,
            });
        }

        let strict = placements.len();
        if strict < count {
            warn!(
                requested = count,
                strict,
                attempts,
                "safe-position budget exhausted, padding with relaxed positions"
            );
        }
        while placements.len() < count {
            let (x, y) = bounds.sample(rng);
            placements.push(Placement {
                position: Position::new(x, y, self.height_at(x, y)),
                tier: PlacementTier::Relaxed,
            });
        }

        debug!(count, strict, attempts, "safe-position search finished");
        placements
    }
}

/// Per-cell gradient magnitude of the raw height samples.
///
/// Central differences inside the grid, one-sided differences on the border,
/// and zero along an axis of length one.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeMap {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl SlopeMap {
    pub fn from_heights(grid: &HeightGrid) -> Self {
        let width = grid.width() as usize;
        let height = grid.height() as usize;
        let samples = grid.samples();
        let at = |x: usize, y: usize| samples[y * width + x] as f64;

        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let gx = axis_gradient(width, x, |i| at(i, y));
                let gy = axis_gradient(height, y, |i| at(x, i));
                values.push((gx * gx + gy * gy).sqrt());
            }
        }
        Self { width, height, values }
    }

    pub fn at(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }
}

fn axis_gradient(len: usize, i: usize, value: impl Fn(usize) -> f64) -> f64 {
    if len < 2 {
        0.0
    } else if i == 0 {
        value(1) - value(0)
    } else if i == len - 1 {
        value(i) - value(i - 1)
    } else {
        (value(i + 1) - value(i - 1)) / 2.0
    }
}

/// Integer cell containing a point, `None` for negative or non-finite coordinates.
fn cell_of(x: f64, y: f64) -> Option<(usize, usize)> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    Some((x as usize, y as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn flat(width: u32, height: u32, value: u16) -> HeightGrid {
        HeightGrid::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_permissive_defaults() {
        let terrain = TerrainAnalyzer::empty();
        for (x, y) in [(0.0, 0.0), (15.5, 3.2), (-4.0, 100.0), (31.0, 31.0)] {
            assert_eq!(terrain.height_at(x, y), 0.0);
            assert!(terrain.is_walkable(x, y));
        }
        assert!(terrain.summary().is_none());

        let positions = terrain.find_safe_positions_with(&mut rng(), 5, 3.0, true);
        assert_eq!(positions.len(), 5);
        for p in positions {
            assert!((2.0..=29.0).contains(&p.x) && (2.0..=29.0).contains(&p.y), "{p}");
            assert_eq!(p.z, 0.0);
        }
    }

    #[test]
    fn test_height_lookup_truncates_to_cell() {
        let grid = HeightGrid::new(2, 2, vec![0, 65535, 100, 200]).unwrap();
        let terrain = TerrainAnalyzer::new(Some(grid), None);

        assert_eq!(terrain.height_at(0.9, 0.9), 0.0);
        assert_eq!(terrain.height_at(1.2, 0.1), 65535.0);
        assert_eq!(terrain.height_at(0.5, 1.7), 100.0);
        assert_eq!(terrain.height_at(2.0, 0.0), 0.0);
        assert_eq!(terrain.height_at(-0.5, 0.0), 0.0);
    }

    #[test]
    fn test_walkability_uses_own_dimensions() {
        let heights = flat(4, 4, 10);
        let walk = WalkabilityGrid::new(2, 1, vec![0, 1]).unwrap();
        let terrain = TerrainAnalyzer::new(Some(heights), Some(walk));

        assert!(!terrain.is_walkable(0.5, 0.5));
        assert!(terrain.is_walkable(1.5, 0.5));
        // Outside the walkability grid but inside the height grid.
        assert!(terrain.is_walkable(3.0, 3.0));
    }

    #[test]
    fn test_summary_classification() {
        let terrain = TerrainAnalyzer::new(Some(flat(4, 4, 1000)), None);
        let summary = terrain.summary().unwrap();
        assert_eq!(summary.size, (4, 4));
        assert_eq!(summary.height_range, (1000, 1000));
        assert_eq!(summary.mean, 1000.0);
        assert_eq!(summary.stddev, 0.0);
        assert_eq!(summary.walkable_ratio, None);
        assert_eq!(summary.terrain_class, TerrainClass::Flat);

        let hills = HeightGrid::new(2, 1, vec![0, 600]).unwrap();
        let walk = WalkabilityGrid::new(2, 1, vec![1, 0]).unwrap();
        let summary = TerrainAnalyzer::new(Some(hills), Some(walk)).summary().unwrap();
        assert_eq!(summary.stddev, 300.0);
        assert_eq!(summary.terrain_class, TerrainClass::Hilly);
        assert_eq!(summary.walkable_ratio, Some(0.5));

        assert_eq!(TerrainClass::from_stddev(500.1), TerrainClass::Mountainous);
        assert_eq!(TerrainClass::from_stddev(99.9), TerrainClass::Flat);
    }

    #[test]
    fn test_gradient_magnitude() {
        // Ramp along x: 0, 100, 300
        let grid = HeightGrid::new(3, 1, vec![0, 100, 300]).unwrap();
        let slopes = SlopeMap::from_heights(&grid);
        assert_eq!(slopes.at(0, 0), Some(100.0));
        assert_eq!(slopes.at(1, 0), Some(150.0));
        assert_eq!(slopes.at(2, 0), Some(200.0));
        assert_eq!(slopes.at(3, 0), None);

        let grid = HeightGrid::new(2, 2, vec![0, 300, 400, 700]).unwrap();
        let slopes = SlopeMap::from_heights(&grid);
        assert_eq!(slopes.at(0, 0), Some(500.0));
    }

    #[test]
    fn test_safe_positions_respect_constraints() {
        // Left half blocked, right half walkable, flat everywhere.
        let heights = flat(32, 32, 2000);
        let cells = (0..32 * 32).map(|i| u8::from(i % 32 >= 16)).collect();
        let walk = WalkabilityGrid::new(32, 32, cells).unwrap();
        let terrain = TerrainAnalyzer::new(Some(heights), Some(walk));

        let placements = terrain.find_placements_with(&mut rng(), 6, 2.0, true);
        assert_eq!(placements.len(), 6);
        let strict: Vec<_> = placements
            .iter()
            .filter(|p| p.tier == PlacementTier::Strict)
            .map(|p| p.position)
            .collect();
        assert!(!strict.is_empty());
        for p in &strict {
            assert!(p.x >= 16.0 && p.x <= 29.0, "{p}");
            assert!(p.y >= 2.0 && p.y <= 29.0, "{p}");
            assert!(terrain.is_walkable(p.x, p.y));
            assert_eq!(p.z, terrain.height_at(p.x, p.y));
        }
        for (i, a) in strict.iter().enumerate() {
            for b in &strict[i + 1..] {
                assert!(a.planar_distance(b) >= 2.0);
            }
        }
    }

    #[test]
    fn test_steep_terrain_falls_back_to_relaxed() {
        // Diagonal ramp: gradient magnitude is 300 * sqrt(2) in every cell.
        let samples = (0..16 * 16u16).map(|i| (i / 16 + i % 16) * 300).collect();
        let grid = HeightGrid::new(16, 16, samples).unwrap();
        let terrain = TerrainAnalyzer::new(Some(grid), None);

        let placements = terrain.find_placements_with(&mut rng(), 4, 1.0, false);
        assert_eq!(placements.len(), 4);
        assert!(placements.iter().all(|p| p.tier == PlacementTier::Relaxed));
        let bounds = terrain.bound_box(false).unwrap();
        assert_eq!(bounds.max_x, 16.0);
        for p in placements {
            assert!(bounds.contains(p.position.x, p.position.y));
        }
    }

    #[test]
    fn test_count_guarantee() {
        let terrain = TerrainAnalyzer::new(Some(flat(8, 40, 0)), None);
        let mut rng = rng();
        for count in [0, 1, 3, 25] {
            let positions = terrain.find_safe_positions_with(&mut rng, count, 5.0, true);
            assert_eq!(positions.len(), count);
            let bounds = terrain.bound_box(true).unwrap();
            assert_eq!((bounds.max_x, bounds.max_y), (8.0, 29.0));
            for p in positions {
                assert!(bounds.contains(p.x, p.y), "{p}");
            }
        }
    }

    #[test]
    fn test_degenerate_box_does_not_panic() {
        let terrain = TerrainAnalyzer::new(Some(flat(1, 1, 0)), None);
        let bounds = terrain.bound_box(true).unwrap();
        assert!(bounds.min_x <= bounds.max_x && bounds.min_y <= bounds.max_y, "{bounds:?}");

        let positions = terrain.find_safe_positions_with(&mut rng(), 3, 0.0, true);
        assert_eq!(positions.len(), 3);
        for p in positions {
            assert_eq!((p.x, p.y), (2.0, 2.0));
            assert!(bounds.contains(p.x, p.y));
        }

        let narrow = TerrainAnalyzer::new(Some(flat(3, 40, 0)), None);
        let bounds = narrow.bound_box(true).unwrap();
        assert_eq!((bounds.min_x, bounds.max_x), (2.0, 3.0));
        assert_eq!((bounds.min_y, bounds.max_y), (2.0, 29.0));
        for p in narrow.find_safe_positions_with(&mut rng(), 5, 0.0, true) {
            assert!(bounds.contains(p.x, p.y), "{p}");
        }
    }

    #[test]
    fn test_clamp_world() {
        assert_eq!(Position::new(-3.0, 40.0, 1.0).clamped(), Position::new(0.0, 31.0, 1.0));
        assert_eq!(clamp_world(f64::NAN), 0.0);
        assert_eq!(Position::new(1.5, 2.0, 0.0).to_string(), "1.5,2,0");
    }
}
