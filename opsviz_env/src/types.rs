//! Common types for the OpsViz environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one mounted scene.
///
/// A scene that is unmounted and mounted again gets a fresh id, which
/// keeps log lines and exports of the two lifetimes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(pub Uuid);

impl SceneId {
    /// Creates a new random SceneId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SceneId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic SceneId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_id_from_seed_is_stable() {
        assert_eq!(SceneId::from_seed(7), SceneId::from_seed(7));
        assert_ne!(SceneId::from_seed(7), SceneId::from_seed(8));
    }

    #[test]
    fn test_scene_id_display_is_short() {
        let id = SceneId::from_seed(1);
        assert_eq!(id.to_string().len(), 8);
    }
}
