use crate::grid::TilePlacement;
use crate::model::{ObjectGroup, TiledMap};

/// Receives tile placements and finished object groups while a map loads.
///
/// `map` is the document being built, as far as it has been parsed.
pub trait MapDelegate {
    /// Called once per cell of every tile layer, empty cells included.
    ///
    /// Return `true` when the placement was handled. Unhandled placements that carry a
    /// texture are kept in [`TiledMap::tiles`].
    fn tile_placed(&mut self, map: &TiledMap, placement: &TilePlacement) -> bool {
        let _ = (map, placement);
        false
    }

    /// Called when an `<objectgroup>` closes, with all of its objects attached.
    fn object_group_complete(&mut self, map: &TiledMap, group: &ObjectGroup) {
        let _ = (map, group);
    }
}

/// No delegate: nothing is handled, every textured tile is kept on the map.
impl MapDelegate for () {}
