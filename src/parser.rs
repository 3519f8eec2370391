//! Single forward pass over a TMX document.
//!
//! Elements are handled as they open and close; tile data is decoded as soon as its
//! `<data>` element closes and handed to the delegate cell by cell.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::atlas::{AtlasCache, ImageSource};
use crate::attributes::Attributes;
use crate::config::LoaderConfig;
use crate::decode::decode_tile_data;
use crate::delegate::MapDelegate;
use crate::error::TmxResult;
use crate::grid::{place_tiles, TileResolver};
use crate::model::{Data, Layer, MapHeader, Object, ObjectGroup, PlacedTile, TiledMap, Tileset};

/// Attributes of `<object>` that become typed fields instead of residual attributes.
const OBJECT_FIELDS: [&str; 7] = ["id", "name", "type", "x", "y", "width", "height"];

/// Everything a load needs from its caller.
///
/// Each load borrows the atlas cache exclusively, so two loads can never interleave on
/// the same cache. Give each worker its own cache to load in parallel.
pub struct LoadContext<'a> {
    pub atlases: &'a mut AtlasCache,
    pub images: &'a dyn ImageSource,
    pub delegate: &'a mut dyn MapDelegate,
    pub config: LoaderConfig,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        atlases: &'a mut AtlasCache,
        images: &'a dyn ImageSource,
        delegate: &'a mut dyn MapDelegate,
    ) -> Self {
        Self {
            atlases,
            images,
            delegate,
            config: LoaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }
}

/// What an open element means to the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Map,
    Tileset,
    Layer,
    Data,
    ObjectGroup,
    /// An object attached to the last object group
    Object,
    Properties,
    Other,
}

pub struct TmxParser<'c, 'a> {
    ctx: &'c mut LoadContext<'a>,
    map: TiledMap,
    data: Data,
    scopes: Vec<Scope>,
    payload: String,
}

impl<'c, 'a> TmxParser<'c, 'a> {
    pub fn new(ctx: &'c mut LoadContext<'a>, map_name: &str) -> Self {
        Self {
            ctx,
            map: TiledMap::new(map_name),
            data: Data::default(),
            scopes: Vec::new(),
            payload: String::new(),
        }
    }

    /// Run the whole document through the parser and return what it built.
    pub fn parse<R: BufRead>(mut self, source: R) -> TmxResult<TiledMap> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = self.ctx.config.check_end_names;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => self.start_element(&e)?,
                Event::End(_) => self.end_element()?,
                Event::Text(e) => {
                    if self.in_data() {
                        self.payload.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) => {
                    if self.in_data() {
                        self.payload.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(self.map)
    }

    fn in_data(&self) -> bool {
        self.scopes.last() == Some(&Scope::Data)
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> TmxResult<()> {
        let scope = match e.name().as_ref() {
            b"map" => {
                self.configure(&Attributes::from_start(e)?);
                Scope::Map
            }
            b"tileset" => {
                self.register_tileset(&Attributes::from_start(e)?);
                Scope::Tileset
            }
            b"layer" => {
                let layer = load_layer(&Attributes::from_start(e)?);
                log::debug!("Added layer '{}' (id: {})", layer.name, layer.id);
                self.map.layers.push(layer);
                Scope::Layer
            }
            b"data" => {
                self.data = load_data(&Attributes::from_start(e)?);
                self.payload.clear();
                Scope::Data
            }
            b"objectgroup" => {
                let attrs = Attributes::from_start(e)?;
                self.map.object_groups.push(ObjectGroup {
                    id: attrs.string("id"),
                    name: attrs.string("name"),
                    ..Default::default()
                });
                Scope::ObjectGroup
            }
            b"object" => {
                let object = load_object(Attributes::from_start(e)?);
                match self.map.object_groups.last_mut() {
                    Some(group) => {
                        group.objects.push(object);
                        Scope::Object
                    }
                    None => {
                        log::debug!("Skipping object '{}' outside any object group", object.id);
                        Scope::Other
                    }
                }
            }
            b"properties" => Scope::Properties,
            b"property" => {
                self.add_property(&Attributes::from_start(e)?);
                Scope::Other
            }
            _ => Scope::Other,
        };
        self.scopes.push(scope);
        Ok(())
    }

    fn end_element(&mut self) -> TmxResult<()> {
        match self.scopes.pop() {
            Some(Scope::Data) => self.finish_data()?,
            Some(Scope::ObjectGroup) => {
                if let Some(group) = self.map.object_groups.last() {
                    log::debug!(
                        "Object group '{}' complete with {} objects",
                        group.name,
                        group.objects.len()
                    );
                    self.ctx.delegate.object_group_complete(&self.map, group);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn configure(&mut self, attrs: &Attributes) {
        self.map.header = MapHeader {
            version: attrs.string("version"),
            editor_version: attrs.string("tiledversion"),
            orientation: attrs.string("orientation"),
            render_order: attrs.string("renderorder"),
            compression_level: attrs.string("compressionlevel"),
            width: attrs.float("width"),
            height: attrs.float("height"),
            tile_width: attrs.float("tilewidth"),
            tile_height: attrs.float("tileheight"),
            infinite: attrs.bool("infinite"),
            next_layer_id: attrs.int("nextlayerid"),
            next_object_id: attrs.int("nextobjectid"),
        };
        self.map.tilesets.clear();
        self.map.layers.clear();
        self.map.object_groups.clear();
        self.map.properties.clear();
        self.map.tiles.clear();

        if self.map.header.infinite {
            log::warn!(
                "Map '{}' is infinite; chunked tile data is not loaded",
                self.map.name
            );
        }
    }

    /// `firstgid`, `tilecount` and `columns` are not read: id ranges come from the
    /// sliced atlas sizes in registration order.
    fn register_tileset(&mut self, attrs: &Attributes) {
        let name = attrs.string("name");
        let tile_width = attrs.float("tilewidth");
        let tile_height = attrs.float("tileheight");

        let images = self.ctx.images;
        let atlas = self
            .ctx
            .atlases
            .load_with_tile_size(&name, tile_width, tile_height, images);

        log::debug!(
            "Added tileset '{}' at index {} ({} tiles)",
            name,
            self.map.tilesets.len(),
            atlas.len()
        );
        self.map.tilesets.push(Tileset {
            name,
            tile_width,
            tile_height,
            atlas,
        });
    }

    fn add_property(&mut self, attrs: &Attributes) {
        // Owner is the element holding <properties>.
        let owner = match self.scopes.as_slice() {
            [.., owner, Scope::Properties] => *owner,
            _ => return,
        };
        let properties = match owner {
            Scope::Map => Some(&mut self.map.properties),
            Scope::Layer => self.map.layers.last_mut().map(|l| &mut l.properties),
            Scope::ObjectGroup => self.map.object_groups.last_mut().map(|g| &mut g.properties),
            Scope::Object => self
                .map
                .object_groups
                .last_mut()
                .and_then(|g| g.objects.last_mut())
                .map(|o| &mut o.properties),
            _ => None,
        };
        if let Some(properties) = properties {
            properties.insert(attrs.string("name"), attrs.string("value"));
        }
    }

    fn finish_data(&mut self) -> TmxResult<()> {
        let payload = std::mem::take(&mut self.payload);
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(());
        }

        let gids = decode_tile_data(payload, &self.data.encoding, &self.data.compression)?;
        if !gids.is_empty() {
            self.place_layer(&gids);
        }
        Ok(())
    }

    fn place_layer(&mut self, gids: &[u32]) {
        let Some((width, height)) = self.map.header.grid_size() else {
            log::warn!(
                "Map '{}' is {}x{} tiles, too large to walk; layer skipped",
                self.map.name,
                self.map.header.width,
                self.map.header.height
            );
            return;
        };
        let cells = width * height;
        if gids.len() != cells {
            log::warn!(
                "Layer data has {} tiles but map '{}' is {}x{}",
                gids.len(),
                self.map.name,
                width,
                height
            );
        }

        let layer = self.map.layers.len().checked_sub(1);
        let collect = self.ctx.config.collect_unhandled_tiles;
        let resolver = TileResolver::new(&self.map.tilesets);

        let mut unhandled = Vec::new();
        for placement in place_tiles(gids, width, height, resolver, layer) {
            if self.ctx.delegate.tile_placed(&self.map, &placement) || !collect {
                continue;
            }
            if let Some(texture) = placement.texture {
                unhandled.push(PlacedTile {
                    layer,
                    x: placement.x,
                    y: placement.y,
                    gid: placement.gid,
                    texture,
                });
            }
        }

        log::debug!(
            "Placed {} tiles, {} left to the map",
            cells,
            unhandled.len()
        );
        self.map.tiles.extend(unhandled);
    }
}

fn load_layer(attrs: &Attributes) -> Layer {
    Layer {
        id: attrs.string("id"),
        name: attrs.string("name"),
        width: attrs.float("width"),
        height: attrs.float("height"),
        ..Default::default()
    }
}

fn load_data(attrs: &Attributes) -> Data {
    Data {
        encoding: attrs.string("encoding"),
        compression: attrs.string("compression"),
    }
}

fn load_object(attrs: Attributes) -> Object {
    Object {
        id: attrs.string("id"),
        name: attrs.string("name"),
        obj_type: attrs.string("type"),
        x: attrs.float("x"),
        y: attrs.float("y"),
        width: attrs.float("width"),
        height: attrs.float("height"),
        attributes: attrs.without(&OBJECT_FIELDS),
        properties: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmxError;
    use crate::grid::TilePlacement;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct Recorder {
        placements: Vec<TilePlacement>,
        groups: Vec<ObjectGroup>,
        handle: bool,
    }

    impl MapDelegate for Recorder {
        fn tile_placed(&mut self, _map: &TiledMap, placement: &TilePlacement) -> bool {
            self.placements.push(*placement);
            self.handle
        }

        fn object_group_complete(&mut self, _map: &TiledMap, group: &ObjectGroup) {
            self.groups.push(group.clone());
        }
    }

    fn images() -> HashMap<String, (u32, u32)> {
        HashMap::from([("tiles".to_string(), (32, 32))])
    }

    fn parse(xml: &str, recorder: &mut Recorder) -> TmxResult<TiledMap> {
        let images = images();
        let mut cache = AtlasCache::new();
        let mut ctx = LoadContext::new(&mut cache, &images, recorder);
        TmxParser::new(&mut ctx, "test").parse(xml.as_bytes())
    }

    #[test]
    fn object_keeps_only_custom_attributes() {
        let xml = r#"<map width="1" height="1">
            <objectgroup id="2" name="doors">
              <object id="3" name="Door" type="exit" x="4" y="2" width="1" height="1" foo="bar"/>
            </objectgroup>
        </map>"#;
        let mut recorder = Recorder::default();
        let map = parse(xml, &mut recorder).unwrap();

        let object = &map.object_groups[0].objects[0];
        assert_eq!(object.id, "3");
        assert_eq!(object.name, "Door");
        assert_eq!(object.obj_type, "exit");
        assert_eq!((object.x, object.y, object.width, object.height), (4.0, 2.0, 1.0, 1.0));
        assert_eq!(
            object.attributes,
            BTreeMap::from([("foo".to_string(), "bar".to_string())])
        );
    }

    #[test]
    fn object_groups_are_emitted_on_close_with_objects() {
        let xml = r#"<map width="1" height="1">
            <objectgroup id="1" name="spawns">
              <object id="1" name="a" x="0" y="0"/>
              <object id="2" name="b" x="1" y="0"/>
            </objectgroup>
            <objectgroup id="4" name="empty"/>
        </map>"#;
        let mut recorder = Recorder::default();
        parse(xml, &mut recorder).unwrap();

        assert_eq!(recorder.groups.len(), 2);
        assert_eq!(recorder.groups[0].name, "spawns");
        let names: Vec<_> = recorder.groups[0].objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(recorder.groups[1].name, "empty");
        assert!(recorder.groups[1].objects.is_empty());
    }

    #[test]
    fn csv_layer_visits_every_cell() {
        let xml = r#"<map width="2" height="2" tilewidth="16" tileheight="16">
            <tileset firstgid="1" name="tiles" tilewidth="16" tileheight="16"/>
            <layer id="1" name="ground" width="2" height="2">
              <data encoding="csv">
                1,0,
                4,2
              </data>
            </layer>
        </map>"#;
        let mut recorder = Recorder::default();
        let map = parse(xml, &mut recorder).unwrap();

        let cells: Vec<_> = recorder
            .placements
            .iter()
            .map(|p| (p.x, p.y, p.gid, p.texture.map(|t| t.local_id)))
            .collect();
        assert_eq!(
            cells,
            vec![
                (0, 0, 1, Some(0)),
                (1, 0, 0, None),
                (0, 1, 4, Some(3)),
                (1, 1, 2, Some(1)),
            ]
        );
        assert!(recorder.placements.iter().all(|p| p.layer == Some(0)));
        // Unhandled textured placements stay on the map.
        assert_eq!(map.tiles.len(), 3);
    }

    #[test]
    fn handled_placements_are_not_kept() {
        let xml = r#"<map width="1" height="1">
            <tileset name="tiles" tilewidth="16" tileheight="16"/>
            <layer id="1" name="l"><data encoding="csv">1</data></layer>
        </map>"#;
        let mut recorder = Recorder {
            handle: true,
            ..Default::default()
        };
        let map = parse(xml, &mut recorder).unwrap();
        assert_eq!(recorder.placements.len(), 1);
        assert!(map.tiles.is_empty());
    }

    #[test]
    fn cdata_payload_is_decoded() {
        let xml = r#"<map width="3" height="1">
            <layer id="1" name="l"><data encoding="csv"><![CDATA[3,2,1]]></data></layer>
        </map>"#;
        let mut recorder = Recorder::default();
        parse(xml, &mut recorder).unwrap();
        let gids: Vec<_> = recorder.placements.iter().map(|p| p.gid).collect();
        assert_eq!(gids, [3, 2, 1]);
    }

    #[test]
    fn payload_split_across_text_events_is_joined() {
        let xml = r#"<map width="4" height="1">
            <layer id="1" name="l"><data encoding="csv">1,&#50;,<!-- split -->3,<![CDATA[4]]></data></layer>
        </map>"#;
        let mut recorder = Recorder::default();
        parse(xml, &mut recorder).unwrap();
        let gids: Vec<_> = recorder.placements.iter().map(|p| p.gid).collect();
        assert_eq!(gids, [1, 2, 3, 4]);
    }

    #[test]
    fn oversized_map_skips_the_layer() {
        let xml = r#"<map width="5000000000" height="5000000000">
            <layer id="1" name="l"><data encoding="csv">1</data></layer>
            <objectgroup id="2" name="after"/>
        </map>"#;
        let mut recorder = Recorder::default();
        let map = parse(xml, &mut recorder).unwrap();
        assert!(recorder.placements.is_empty());
        assert!(map.tiles.is_empty());
        assert_eq!(recorder.groups.len(), 1);
    }

    #[test]
    fn zstd_aborts_the_parse() {
        let xml = r#"<map width="1" height="1">
            <layer id="1" name="l"><data encoding="base64" compression="zstd">KLUv/SAEIQAAAQAAAA==</data></layer>
            <objectgroup id="2" name="late"/>
        </map>"#;
        let mut recorder = Recorder::default();
        let err = parse(xml, &mut recorder).unwrap_err();
        assert!(matches!(err, TmxError::UnsupportedCompression(_)));
        assert!(recorder.placements.is_empty());
        assert!(recorder.groups.is_empty());
    }

    #[test]
    fn text_outside_data_is_ignored() {
        let xml = r#"<map width="1" height="1">
            <layer id="1" name="l"><data encoding="csv"></data></layer>
            <layer id="2" name="chunked"><data encoding="csv"><chunk x="0" y="0">5</chunk></data></layer>
        </map>"#;
        let mut recorder = Recorder::default();
        let map = parse(xml, &mut recorder).unwrap();
        assert_eq!(map.layers.len(), 2);
        assert!(recorder.placements.is_empty());
    }

    #[test]
    fn properties_attach_to_their_owner() {
        let xml = r#"<map width="1" height="1">
            <properties><property name="music" value="town"/></properties>
            <layer id="1" name="l">
              <properties><property name="z" type="int" value="3"/></properties>
            </layer>
            <objectgroup id="2" name="g">
              <properties><property name="kind" value="spawns"/></properties>
              <object id="9" x="0" y="0">
                <properties><property name="hp" value="10"/></properties>
              </object>
            </objectgroup>
        </map>"#;
        let mut recorder = Recorder::default();
        let map = parse(xml, &mut recorder).unwrap();

        assert_eq!(map.properties.get("music").map(String::as_str), Some("town"));
        assert_eq!(map.layers[0].properties.get("z").map(String::as_str), Some("3"));
        let group = &map.object_groups[0];
        assert_eq!(group.properties.get("kind").map(String::as_str), Some("spawns"));
        assert_eq!(group.objects[0].properties.get("hp").map(String::as_str), Some("10"));
        assert!(group.objects[0].attributes.is_empty());
    }

    #[test]
    fn header_uses_sentinels_for_missing_attributes() {
        let mut recorder = Recorder::default();
        let map = parse(r#"<map version="1.10" infinite="1"/>"#, &mut recorder).unwrap();
        assert_eq!(map.header.version, "1.10");
        assert_eq!(map.header.editor_version, "");
        assert_eq!(map.header.width, -1.0);
        assert_eq!(map.header.next_object_id, -1);
        assert!(map.header.infinite);
    }

    #[test]
    fn mismatched_end_tag_is_an_error() {
        let mut recorder = Recorder::default();
        let err = parse("<map><layer></map>", &mut recorder).unwrap_err();
        assert!(matches!(err, TmxError::Xml(_)));
    }
}
