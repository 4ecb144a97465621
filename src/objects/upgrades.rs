//! The `Upgrades` document granting researched upgrades to players.

use serde::{Deserialize, Serialize};

use super::codec::write_document;
use super::record::Element;

pub const UPGRADES_ROOT: &str = "Upgrades";

/// One upgrade level granted to a player at map start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeGrant {
    pub player: u32,
    pub upgrade_id: String,
    #[serde(default = "default_level")]
    pub level: u32,
}

fn default_level() -> u32 {
    1
}

pub fn encode_upgrades(grants: &[UpgradeGrant]) -> Vec<u8> {
    let mut root = Element::new(UPGRADES_ROOT);
    root.children = grants
        .iter()
        .map(|grant| {
            Element::new("Upgrade")
                .with_attribute("Player", grant.player.to_string())
                .with_attribute("UpgradeID", grant.upgrade_id.as_str())
                .with_attribute("Level", grant.level.to_string())
        })
        .collect();
    write_document(&root)
}
