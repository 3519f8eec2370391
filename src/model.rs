//! Records built while a TMX document streams past.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::atlas::{TileTexture, TilesetAtlas};

/// Attributes of the root `<map>` element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapHeader {
    pub version: String,
    /// `tiledversion` attribute
    pub editor_version: String,
    /// orthogonal, isometric, staggered or hexagonal
    pub orientation: String,
    pub render_order: String,
    pub compression_level: String,

    /// Map width in tiles
    pub width: f32,
    /// Map height in tiles
    pub height: f32,
    /// Width of each tile in pixels
    pub tile_width: f32,
    /// Height of each tile in pixels
    pub tile_height: f32,

    /// Chunked infinite maps are not loaded; the flag is kept for callers to check.
    pub infinite: bool,
    pub next_layer_id: i64,
    pub next_object_id: i64,
}

impl MapHeader {
    /// Size of the whole map in pixels.
    pub fn pixel_size(&self) -> (f32, f32) {
        (self.width * self.tile_width, self.height * self.tile_height)
    }

    /// Number of cells in the tile grid. Negative sentinels count as zero; sizes too
    /// large to count saturate at `usize::MAX`.
    pub fn cell_count(&self) -> usize {
        grid_extent(self.width).saturating_mul(grid_extent(self.height))
    }

    /// Grid `(width, height)` in whole cells, or `None` when the cell count overflows.
    pub fn grid_size(&self) -> Option<(usize, usize)> {
        let width = grid_extent(self.width);
        let height = grid_extent(self.height);
        width.checked_mul(height).map(|_| (width, height))
    }
}

/// Whole-cell extent of a tile-space dimension.
pub(crate) fn grid_extent(value: f32) -> usize {
    if value > 0.0 {
        value as usize
    } else {
        0
    }
}

/// A `<tileset>` as registered on a map: its name plus the sliced atlas behind it.
///
/// The atlas is shared with the [`AtlasCache`](crate::AtlasCache) it came from.
#[derive(Clone, Debug)]
pub struct Tileset {
    pub name: String,
    pub tile_width: f32,
    pub tile_height: f32,
    pub atlas: Arc<TilesetAtlas>,
}

impl Tileset {
    pub fn tile_count(&self) -> usize {
        self.atlas.len()
    }
}

/// A `<layer>` header. Its tiles are not stored here; they flow to the delegate as
/// they are decoded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub properties: BTreeMap<String, String>,
}

/// Encoding of the `<data>` element currently being read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// `csv` or `base64`; empty for XML `<tile>` children, which are not supported
    pub encoding: String,
    /// empty, `zlib`, `gzip` or `zstd`
    pub compression: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectGroup {
    pub id: String,
    pub name: String,
    /// Objects in document order
    pub objects: Vec<Object>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: String,
    pub name: String,
    /// Type/class of the object
    pub obj_type: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Every other attribute on the element, verbatim.
    pub attributes: BTreeMap<String, String>,
    /// Values from nested `<properties>`.
    pub properties: BTreeMap<String, String>,
}

/// A placement nobody claimed, kept so the host can draw it later.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedTile {
    /// Index into [`TiledMap::layers`] of the layer being filled
    pub layer: Option<usize>,
    pub x: u32,
    pub y: u32,
    /// Global tile ID
    pub gid: u32,
    pub texture: TileTexture,
}

/// Everything one TMX document produced.
#[derive(Clone, Debug, Default)]
pub struct TiledMap {
    /// User-defined name for this map
    pub name: String,
    pub header: MapHeader,
    /// In registration order; global ids resolve against their cumulative tile counts.
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
    pub object_groups: Vec<ObjectGroup>,
    pub properties: BTreeMap<String, String>,
    /// Placements with a texture that the delegate did not handle.
    pub tiles: Vec<PlacedTile>,
}

impl TiledMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `true` when nothing was loaded at all.
    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty() && self.layers.is_empty() && self.object_groups.is_empty()
    }

    pub fn object_group(&self, name: &str) -> Option<&ObjectGroup> {
        self.object_groups.iter().find(|group| group.name == name)
    }
}
