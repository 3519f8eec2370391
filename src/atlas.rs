//! Tileset images sliced into regular grids of tile rectangles, plus the cache that keeps
//! one sliced atlas per image name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Sub-rectangle of a tileset image in normalized coordinates.
///
/// The origin is the image's top-left corner; `(1.0, 1.0)` is its bottom-right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A resolved tile: which registered tileset it came from and where it sits in that
/// tileset's image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileTexture {
    /// Index into the map's tileset list
    pub tileset: usize,
    /// 0-based position inside the tileset atlas
    pub local_id: u32,
    pub rect: Rect,
}

/// Supplies pixel dimensions for a tileset image by name.
///
/// Loading and drawing the pixels is left to the host.
pub trait ImageSource {
    fn dimensions(&self, name: &str) -> Option<(u32, u32)>;
}

impl ImageSource for HashMap<String, (u32, u32)> {
    fn dimensions(&self, name: &str) -> Option<(u32, u32)> {
        self.get(name).copied()
    }
}

/// Reads image headers from `<root>/<name>.<extension>`.
#[derive(Clone, Debug)]
pub struct ImageDirectory {
    root: PathBuf,
    extensions: Vec<String>,
}

impl ImageDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["png".to_string()],
        }
    }

    /// Extensions tried in order when looking an image up.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for ImageDirectory {
    fn dimensions(&self, name: &str) -> Option<(u32, u32)> {
        for extension in &self.extensions {
            let path = self.root.join(format!("{name}.{extension}"));
            if !path.is_file() {
                continue;
            }
            match image::image_dimensions(&path) {
                Ok(dimensions) => return Some(dimensions),
                Err(e) => log::warn!("Failed to read image {}: {e}", path.display()),
            }
        }
        None
    }
}

/// One tileset image cut into `columns × rows` tiles.
///
/// Tiles are ordered row-major starting at the top-left: index `columns - 1` is the
/// top-right tile and index `columns` starts the second row.
#[derive(Clone, Debug, PartialEq)]
pub struct TilesetAtlas {
    name: String,
    image_width: u32,
    image_height: u32,
    tile_width: f32,
    tile_height: f32,
    columns: u32,
    rows: u32,
    rects: Vec<Rect>,
}

impl TilesetAtlas {
    /// Slice by tile pixel size; partial tiles at the right and bottom edges are dropped.
    pub fn from_tile_size(
        name: impl Into<String>,
        (image_width, image_height): (u32, u32),
        tile_width: f32,
        tile_height: f32,
    ) -> Self {
        let columns = whole_tiles(image_width, tile_width);
        let rows = whole_tiles(image_height, tile_height);
        Self::sliced(
            name.into(),
            (image_width, image_height),
            (tile_width, tile_height),
            (columns, rows),
        )
    }

    /// Slice into a fixed grid; the tile size follows from the image size.
    pub fn from_grid(
        name: impl Into<String>,
        (image_width, image_height): (u32, u32),
        columns: u32,
        rows: u32,
    ) -> Self {
        if columns == 0 || rows == 0 {
            return Self::sliced(name.into(), (image_width, image_height), (0.0, 0.0), (0, 0));
        }
        let tile_width = image_width as f32 / columns as f32;
        let tile_height = image_height as f32 / rows as f32;
        Self::sliced(
            name.into(),
            (image_width, image_height),
            (tile_width, tile_height),
            (columns, rows),
        )
    }

    /// Atlas with no tiles, for images that could not be found.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::sliced(name.into(), (0, 0), (0.0, 0.0), (0, 0))
    }

    fn sliced(
        name: String,
        (image_width, image_height): (u32, u32),
        (tile_width, tile_height): (f32, f32),
        (columns, rows): (u32, u32),
    ) -> Self {
        let tile_count = columns as usize * rows as usize;
        let mut rects = Vec::with_capacity(tile_count);

        let full_width = image_width as f32;
        let full_height = image_height as f32;
        let mut column = 0u32;
        let mut row = 0u32;
        for _ in 0..tile_count {
            if column >= columns {
                column = 0;
                row += 1;
            }
            rects.push(Rect {
                x: tile_width * column as f32 / full_width,
                y: tile_height * row as f32 / full_height,
                width: tile_width / full_width,
                height: tile_height / full_height,
            });
            column += 1;
        }

        Self {
            name,
            image_width,
            image_height,
            tile_width,
            tile_height,
            columns,
            rows,
            rects,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn tile_size(&self) -> (f32, f32) {
        (self.tile_width, self.tile_height)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of tiles in the atlas.
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Rectangle of the tile at a 0-based local index.
    pub fn rect(&self, local_id: usize) -> Option<Rect> {
        self.rects.get(local_id).copied()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }
}

fn whole_tiles(image_extent: u32, tile_extent: f32) -> u32 {
    if tile_extent > 0.0 {
        (image_extent as f32 / tile_extent).floor() as u32
    } else {
        0
    }
}

/// Sliced atlases keyed by image name.
///
/// The first load of a name slices the image; later loads return the same atlas no
/// matter which tile size or grid they ask for. Call [`AtlasCache::reset`] before
/// loading content that must not reuse earlier atlases.
#[derive(Debug, Default)]
pub struct AtlasCache {
    atlases: HashMap<String, Arc<TilesetAtlas>>,
}

impl AtlasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached atlas for `name`, or a new one sliced by tile pixel size.
    pub fn load_with_tile_size(
        &mut self,
        name: &str,
        tile_width: f32,
        tile_height: f32,
        images: &dyn ImageSource,
    ) -> Arc<TilesetAtlas> {
        self.load_with(name, images, |dimensions| {
            TilesetAtlas::from_tile_size(name, dimensions, tile_width, tile_height)
        })
    }

    /// Cached atlas for `name`, or a new one sliced into `columns × rows`.
    pub fn load_with_grid(
        &mut self,
        name: &str,
        columns: u32,
        rows: u32,
        images: &dyn ImageSource,
    ) -> Arc<TilesetAtlas> {
        self.load_with(name, images, |dimensions| {
            TilesetAtlas::from_grid(name, dimensions, columns, rows)
        })
    }

    fn load_with(
        &mut self,
        name: &str,
        images: &dyn ImageSource,
        slice: impl FnOnce((u32, u32)) -> TilesetAtlas,
    ) -> Arc<TilesetAtlas> {
        if let Some(atlas) = self.atlases.get(name) {
            return Arc::clone(atlas);
        }

        // Missing images are not cached so a later load can still find them.
        let Some(dimensions) = images.dimensions(name) else {
            log::warn!("No image found for tileset '{name}'; it will have no tiles");
            return Arc::new(TilesetAtlas::empty(name));
        };

        let atlas = Arc::new(slice(dimensions));
        log::debug!(
            "Sliced tileset '{}' into {}x{} tiles",
            name,
            atlas.columns(),
            atlas.rows()
        );
        self.atlases.insert(name.to_string(), Arc::clone(&atlas));
        atlas
    }

    pub fn get(&self, name: &str) -> Option<Arc<TilesetAtlas>> {
        self.atlases.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }

    /// Forget every cached atlas.
    pub fn reset(&mut self) {
        self.atlases.clear();
    }
}
