//! Caller-facing battle scene description.
//!
//! A scene lists the units each of the two players should start with. It is
//! read from JSON (or from the task-file format used by scenario generators)
//! and translated into a [`ModificationRequest`].

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sc2_terrain::{Position, TerrainAnalyzer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::objects::UpgradeGrant;
use super::apply::correct_position;
use super::request::{Addition, BasePosition, ModificationRequest};

fn default_true() -> bool {
    true
}

fn default_count() -> u32 {
    1
}

/// A batch of units for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    #[serde(rename = "type")]
    pub unit_type: String,
    #[serde(default = "default_count")]
    pub count: u32,
    /// `[x, y]` or `[x, y, z]`.
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
    #[serde(default = "default_true")]
    pub clear_existing: bool,
    #[serde(default)]
    pub player1_units: Vec<UnitSpec>,
    #[serde(default)]
    pub player2_units: Vec<UnitSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_units: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub replace_units: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrades: Vec<UpgradeGrant>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            scenario_type: None,
            clear_existing: true,
            player1_units: Vec::new(),
            player2_units: Vec::new(),
            remove_units: Vec::new(),
            replace_units: IndexMap::new(),
            upgrades: Vec::new(),
        }
    }
}

impl SceneConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidScene(e.to_string()))
    }

    /// Parse a task file:
    ///
    /// ```json
    /// { "agent": { "a1": { "type": "Marine", "num": " 5", "pos": " (9, 32)" } },
    ///   "enemy": { "e1": { "type": "Zergling", "num": "8", "pos": "(20, 12)" } } }
    /// ```
    ///
    /// Agents belong to player 1, enemies to player 2, and existing units are
    /// cleared.
    pub fn from_task_json(text: &str) -> Result<Self> {
        let task: TaskFile =
            serde_json::from_str(text).map_err(|e| Error::InvalidScene(e.to_string()))?;
        Ok(Self {
            player1_units: task.agent.values().map(TaskUnit::to_spec).collect::<Result<_>>()?,
            player2_units: task.enemy.values().map(TaskUnit::to_spec).collect::<Result<_>>()?,
            ..Self::default()
        })
    }

    /// Unit totals for player 1 and player 2.
    pub fn unit_totals(&self) -> (u64, u64) {
        let total = |specs: &[UnitSpec]| specs.iter().map(|s| u64::from(s.count)).sum::<u64>();
        (total(&self.player1_units), total(&self.player2_units))
    }

    /// [`Self::validate_positions_with`] using the thread RNG.
    pub fn validate_positions(&mut self, terrain: &TerrainAnalyzer) -> usize {
        self.validate_positions_with(&mut rand::thread_rng(), terrain)
    }

    /// Correct every declared position against the terrain, as
    /// [`correct_position`] does for placed units. Returns how many were
    /// relocated. Specs without at least two coordinates are left alone.
    pub fn validate_positions_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        terrain: &TerrainAnalyzer,
    ) -> usize {
        let mut relocated = 0;
        for spec in self.player1_units.iter_mut().chain(self.player2_units.iter_mut()) {
            let (x, y) = match spec.position.as_slice() {
                [x, y, ..] => (*x, *y),
                _ => continue,
            };
            let (corrected, moved) = correct_position(rng, Position::new(x, y, 0.0), terrain);
            if moved {
                relocated += 1;
            }
            debug!(unit_type = %spec.unit_type, position = %corrected, "corrected scene position");
            spec.position = vec![corrected.x, corrected.y, corrected.z];
        }
        relocated
    }

    /// Build the request that realizes this scene.
    pub fn to_request(&self) -> ModificationRequest {
        let additions = [(1, &self.player1_units), (2, &self.player2_units)]
            .into_iter()
            .flat_map(|(player, specs)| {
                specs.iter().map(move |spec| {
                    Addition::new(
                        spec.unit_type.as_str(),
                        player,
                        BasePosition::from_coords(&spec.position),
                    )
                    .count(spec.count)
                    .rotation(spec.rotation)
                })
            })
            .collect();

        ModificationRequest {
            clear_all: self.clear_existing,
            remove_types: self.remove_units.iter().cloned().collect(),
            replace_types: self.replace_units.clone(),
            additions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(default)]
    agent: IndexMap<String, TaskUnit>,
    #[serde(default)]
    enemy: IndexMap<String, TaskUnit>,
}

#[derive(Debug, Deserialize)]
struct TaskUnit {
    #[serde(rename = "type")]
    unit_type: String,
    num: Value,
    pos: String,
}

impl TaskUnit {
    fn to_spec(&self) -> Result<UnitSpec> {
        let count = match &self.num {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::InvalidScene(format!("bad unit count {} for {}", self.num, self.unit_type)))?;

        Ok(UnitSpec {
            unit_type: self.unit_type.clone(),
            count,
            position: task_position(&self.pos),
            rotation: 0.0,
        })
    }
}

/// First two runs of digits as `[x, y, 0]`; `[0, 0, 0]` when there are fewer.
fn task_position(raw: &str) -> Vec<f64> {
    let numbers: Vec<f64> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .take(2)
        .filter_map(|run| run.parse().ok())
        .collect();
    match numbers.as_slice() {
        [x, y] => vec![*x, *y, 0.0],
        _ => vec![0.0, 0.0, 0.0],
    }
}
