pub mod record;
pub mod codec;
pub mod upgrades;
pub mod legacy;

pub use record::{Element, UnitRecord, OpaqueRecord, PlacedRecord, Scale, UNIT_TAG, UNIT_ATTRIBUTES};
pub use codec::{ObjectList, decode, encode, DEFAULT_ROOT, DEFAULT_VERSION};
pub use upgrades::{UpgradeGrant, encode_upgrades};
pub use legacy::{LegacySchema, classify_legacy, from_legacy, to_legacy};
