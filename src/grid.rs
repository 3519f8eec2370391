//! Turning a flat list of global tile ids into per-cell placements.

use crate::atlas::TileTexture;
use crate::model::Tileset;

const FLIPPED_HORIZONTALLY: u32 = 0x8000_0000;
const FLIPPED_VERTICALLY: u32 = 0x4000_0000;
const FLIPPED_DIAGONALLY: u32 = 0x2000_0000;

/// One visited cell of a tile layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePlacement {
    /// Index into the map's layer list of the layer being filled
    pub layer: Option<usize>,
    /// X coordinate in the layer (in tiles)
    pub x: u32,
    /// Y coordinate in the layer (in tiles)
    pub y: u32,
    /// Global tile ID (0 = empty tile)
    pub gid: u32,
    /// `None` for empty cells and ids no tileset owns
    pub texture: Option<TileTexture>,
}

impl TilePlacement {
    pub fn is_empty(&self) -> bool {
        self.gid == 0
    }

    pub fn flip_h(&self) -> bool {
        self.gid & FLIPPED_HORIZONTALLY != 0
    }

    pub fn flip_v(&self) -> bool {
        self.gid & FLIPPED_VERTICALLY != 0
    }

    pub fn flip_d(&self) -> bool {
        self.gid & FLIPPED_DIAGONALLY != 0
    }
}

/// Maps global ids onto registered tilesets.
///
/// Tileset `k` owns the ids in `(before, before + tile_count]`, where `before` is the
/// total tile count of the tilesets registered ahead of it. Document `firstgid` values
/// are not consulted.
#[derive(Clone, Copy, Debug)]
pub struct TileResolver<'a> {
    tilesets: &'a [Tileset],
}

impl<'a> TileResolver<'a> {
    pub fn new(tilesets: &'a [Tileset]) -> Self {
        Self { tilesets }
    }

    pub fn resolve(&self, gid: u32) -> Option<TileTexture> {
        if gid == 0 {
            return None;
        }
        let gid = gid as usize;
        let mut before = 0usize;
        for (index, tileset) in self.tilesets.iter().enumerate() {
            let total = before + tileset.tile_count();
            if gid > before && gid <= total {
                let local = gid - before - 1;
                return tileset.atlas.rect(local).map(|rect| TileTexture {
                    tileset: index,
                    local_id: local as u32,
                    rect,
                });
            }
            before = total;
        }
        None
    }
}

/// Walk a `width × height` grid row by row, consuming one id per cell.
///
/// Every cell yields a placement, empty ones included. Ids missing from a short
/// sequence read as `0`; surplus ids are ignored.
pub fn place_tiles<'a>(
    gids: &'a [u32],
    width: usize,
    height: usize,
    resolver: TileResolver<'a>,
    layer: Option<usize>,
) -> impl Iterator<Item = TilePlacement> + 'a {
    let mut ids = gids.iter().copied();
    (0..height)
        .flat_map(move |y| (0..width).map(move |x| (x, y)))
        .map(move |(x, y)| {
            let gid = ids.next().unwrap_or(0);
            TilePlacement {
                layer,
                x: x as u32,
                y: y as u32,
                gid,
                texture: resolver.resolve(gid),
            }
        })
}
