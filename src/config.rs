use serde::{Deserialize, Serialize};

/// Loader options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Keep textured placements the delegate did not handle in `TiledMap::tiles`.
    pub collect_unhandled_tiles: bool,
    /// Reject documents whose closing tags do not match their opening tags.
    pub check_end_names: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            collect_unhandled_tiles: true,
            check_end_names: true,
        }
    }
}
