//! Load Tiled maps one region at a time.
//!
//! This library streams TMX documents, decodes their tile layers (CSV or base64, optionally
//! zlib/gzip compressed), slices tileset images into atlases and collects object groups.
//! Tile placements and finished object groups are handed to a [`MapDelegate`] as they
//! are parsed; what to draw or spawn is up to the host.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tmx_stream::*;
//!
//! fn load_region() -> Result<TiledMap, TmxError> {
//!     let mut atlases = AtlasCache::new();
//!     let images = ImageDirectory::new("assets/tilesets");
//!     let mut delegate = ();
//!     let mut ctx = LoadContext::new(&mut atlases, &images, &mut delegate);
//!
//!     load_tmx_map(&mut ctx, "forest_0_0", "assets/maps/forest_0_0.tmx")
//! }
//! ```
//!
//! # Tile ids
//!
//! Global tile ids are resolved against the tilesets in the order they were declared,
//! using the number of tiles each sliced atlas holds. `firstgid` attributes are not read,
//! so tilesets must appear in ascending `firstgid` order without gaps.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub mod atlas;
pub mod attributes;
pub mod config;
pub mod decode;
pub mod delegate;
pub mod error;
pub mod grid;
pub mod model;
pub mod parser;

pub use atlas::{AtlasCache, ImageDirectory, ImageSource, Rect, TileTexture, TilesetAtlas};
pub use config::LoaderConfig;
pub use delegate::MapDelegate;
pub use error::{TmxError, TmxResult};
pub use grid::{TilePlacement, TileResolver};
pub use model::{Data, Layer, MapHeader, Object, ObjectGroup, PlacedTile, TiledMap, Tileset};
pub use parser::{LoadContext, TmxParser};

// ============================================================================
// Core Functionality
// ============================================================================

/// Load a TMX map file
///
/// A missing file is not an error: the map simply comes back empty, with no layers,
/// tiles or object groups, and nothing reaches the delegate.
///
/// # Arguments
///
/// * `ctx` - Atlas cache, image source, delegate and options for this load
/// * `map_name` - A user-defined name for this map
/// * `tmx_path` - Path to the TMX file to load
///
/// # Example
///
/// ```rust,no_run
/// use tmx_stream::*;
///
/// fn load_world(ctx: &mut LoadContext<'_>) -> Result<(), TmxError> {
///     let overworld = load_tmx_map(ctx, "overworld", "maps/world.tmx")?;
///     let dungeon = load_tmx_map(ctx, "dungeon_1", "maps/dungeon1.tmx")?;
///     assert!(overworld.tilesets.len() + dungeon.tilesets.len() > 0);
///     Ok(())
/// }
/// ```
pub fn load_tmx_map(
    ctx: &mut LoadContext<'_>,
    map_name: &str,
    tmx_path: impl AsRef<Path>,
) -> TmxResult<TiledMap> {
    let tmx_path = tmx_path.as_ref();
    log::info!("Loading TMX map '{map_name}' from {}", tmx_path.display());

    let file = match File::open(tmx_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!(
                "TMX file {} not found; map '{map_name}' is empty",
                tmx_path.display()
            );
            return Ok(TiledMap::new(map_name));
        }
        Err(e) => return Err(e.into()),
    };

    load_tmx_map_from_reader(ctx, map_name, BufReader::new(file))
}

/// Load a TMX map from a string
///
/// Use the `include_str!` macro to embed a TMX file at compile time.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use tmx_stream::*;
///
/// const MAP_DATA: &str = r#"<map width="2" height="1" tilewidth="16" tileheight="16">
///   <tileset firstgid="1" name="terrain" tilewidth="16" tileheight="16"/>
///   <layer id="1" name="ground"><data encoding="csv">1,8</data></layer>
/// </map>"#;
///
/// let images = HashMap::from([("terrain".to_string(), (64, 32))]);
/// let mut atlases = AtlasCache::new();
/// let mut delegate = ();
/// let mut ctx = LoadContext::new(&mut atlases, &images, &mut delegate);
/// let map = load_tmx_map_from_str(&mut ctx, "village", MAP_DATA)?;
/// assert_eq!(map.tiles.len(), 2);
/// # Ok::<(), TmxError>(())
/// ```
pub fn load_tmx_map_from_str(
    ctx: &mut LoadContext<'_>,
    map_name: &str,
    tmx_content: &str,
) -> TmxResult<TiledMap> {
    log::info!("Parsing TMX map '{map_name}' from string");
    parse_map(ctx, map_name, tmx_content.as_bytes())
}

/// Load a TMX map from any buffered reader
pub fn load_tmx_map_from_reader<R: BufRead>(
    ctx: &mut LoadContext<'_>,
    map_name: &str,
    reader: R,
) -> TmxResult<TiledMap> {
    parse_map(ctx, map_name, reader)
}

fn parse_map<R: BufRead>(
    ctx: &mut LoadContext<'_>,
    map_name: &str,
    reader: R,
) -> TmxResult<TiledMap> {
    let map = TmxParser::new(ctx, map_name).parse(reader)?;

    log::info!(
        "Successfully loaded map '{}' ({}x{} tiles, {} tilesets, {} layers, {} object groups)",
        map_name,
        map.header.width,
        map.header.height,
        map.tilesets.len(),
        map.layers.len(),
        map.object_groups.len()
    );
    Ok(map)
}
