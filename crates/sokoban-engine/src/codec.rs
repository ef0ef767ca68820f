//! Binary map codec.
//!
//! A map file is, in order:
//!
//! ```text
//! [width][height]
//! placement record*        [pieces][size]*pieces [blob]*pieces [count:u16][x y]*count
//! [0]                      end of placements
//! [player x][player y]
//! structure record*        [type][pieces][size]*pieces [blob]*pieces   (until EOF)
//! ```
//!
//! The first blob of a placement record is the UTF-8 type name; the rest are
//! the kind's arguments (see [`ObjectKind::encode_attributes`]). Structure
//! blobs are either link headers or object references `[x][y][layer]`, which
//! resolve against the objects placed above.
//!
//! Multi-byte integers are little-endian. In the standard (`.map`) format
//! dimensions and coordinates take one byte each; the extended (`.mapx`)
//! format widens both to two bytes for levels beyond 255 × 255.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sokoban_grid::{AttributeError, Grid, GridError, Layer, ObjectId, ObjectKind, Position};

use crate::level::Level;
use crate::signal::{LinkRule, MultiSwitchLink, SingleSwitchLink, Structure};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while reading a map.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("map data ends at byte {offset} while reading {expected}")]
    Truncated {
        offset: usize,
        expected: &'static str,
    },

    #[error("placement record at byte {offset} has a type name that is not UTF-8")]
    InvalidTypeName { offset: usize },

    #[error("placement record at byte {offset} is malformed: {source}")]
    Attribute {
        offset: usize,
        #[source]
        source: AttributeError,
    },

    #[error("placement record at byte {offset} cannot be placed: {source}")]
    Placement {
        offset: usize,
        #[source]
        source: GridError,
    },

    #[error("structure references {layer:?} at {position}, which is empty")]
    DanglingReference { position: Position, layer: Layer },

    #[error("unknown structure type {0}")]
    UnknownStructure(u8),

    #[error("structure type '{0}' is not supported")]
    UnsupportedStructure(&'static str),

    #[error("structure record at byte {offset} is invalid: {reason}")]
    InvalidStructure { offset: usize, reason: String },

    #[error("a {width}x{height} level exceeds the supported grid size")]
    TooLarge { width: u16, height: u16 },
}

/// Errors that can occur while writing a map.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to write map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("the level has no player")]
    MissingPlayer,

    #[error("a {width}x{height} level does not fit the standard format; save it as .mapx")]
    TooLarge { width: u16, height: u16 },

    #[error("{what} count {len} does not fit in one byte")]
    RecordTooLarge { what: &'static str, len: usize },

    #[error("structure references {0}, which is not on the grid")]
    UnknownObject(ObjectId),
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// On-disk variant, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapFormat {
    /// `.map`: one byte per dimension and coordinate.
    #[default]
    Standard,
    /// `.mapx`: two bytes (little-endian) per dimension and coordinate.
    Extended,
}

impl MapFormat {
    /// `.mapx` files are extended, everything else is standard.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("mapx") => MapFormat::Extended,
            _ => MapFormat::Standard,
        }
    }

    /// The file extension, without the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            MapFormat::Standard => "map",
            MapFormat::Extended => "mapx",
        }
    }

    /// Bytes per dimension or coordinate.
    pub const fn coordinate_width(self) -> usize {
        match self {
            MapFormat::Standard => 1,
            MapFormat::Extended => 2,
        }
    }

    const fn max_dimension(self) -> u16 {
        match self {
            MapFormat::Standard => u8::MAX as u16,
            MapFormat::Extended => u16::MAX,
        }
    }

    const fn reference_len(self) -> usize {
        2 * self.coordinate_width() + 1
    }
}

/// Structure record type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StructureType {
    /// Reserved; groups are rebuilt from stickiness on load.
    Group = 1,
    SingleSwitchLink = 2,
    /// Room transitions; not supported.
    Door = 3,
    MultiSwitchLink = 4,
}

impl StructureType {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(StructureType::Group),
            2 => Some(StructureType::SingleSwitchLink),
            3 => Some(StructureType::Door),
            4 => Some(StructureType::MultiSwitchLink),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            StructureType::Group => "Group",
            StructureType::SingleSwitchLink => "SingleSwitchLink",
            StructureType::Door => "Door",
            StructureType::MultiSwitchLink => "MultiSwitchLink",
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

struct Writer {
    buf: Vec<u8>,
    format: MapFormat,
}

impl Writer {
    fn new(format: MapFormat) -> Self {
        Self {
            buf: Vec::new(),
            format,
        }
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Callers guarantee `value` fits the format (interior cells of a level
    /// whose dimensions were checked).
    fn coordinate(&mut self, value: i32) {
        match self.format {
            MapFormat::Standard => self.u8(value as u8),
            MapFormat::Extended => self.u16(value as u16),
        }
    }

    fn dimension(&mut self, value: u16) {
        match self.format {
            MapFormat::Standard => self.u8(value as u8),
            MapFormat::Extended => self.u16(value),
        }
    }

    fn position(&mut self, pos: Position) {
        self.coordinate(pos.x);
        self.coordinate(pos.y);
    }

    fn blobs(&mut self, blobs: &[Vec<u8>]) -> Result<(), SaveError> {
        let pieces = u8::try_from(blobs.len()).map_err(|_| SaveError::RecordTooLarge {
            what: "blob",
            len: blobs.len(),
        })?;
        self.u8(pieces);
        for blob in blobs {
            let size = u8::try_from(blob.len()).map_err(|_| SaveError::RecordTooLarge {
                what: "blob byte",
                len: blob.len(),
            })?;
            self.u8(size);
        }
        for blob in blobs {
            self.buf.extend_from_slice(blob);
        }
        Ok(())
    }
}

/// Encode `level` in `format`.
///
/// Placement records are emitted in the order their attributes first appear
/// in a column-major scan of the interior (FLOOR, SOLID, then PLAYER slot of
/// each cell), so a level decoded from this codec's output encodes back to
/// the same bytes. Border walls, gate walls and the player's own record are
/// never written.
///
/// # Errors
///
/// - [`SaveError::MissingPlayer`] if the level has no player.
/// - [`SaveError::TooLarge`] if the level does not fit `format`.
/// - [`SaveError::RecordTooLarge`] if a link has more than 255 pieces.
pub fn encode(level: &Level, format: MapFormat) -> Result<Vec<u8>, SaveError> {
    let grid = level.grid();
    let player = level.player_position().ok_or(SaveError::MissingPlayer)?;
    let (width, height) = (grid.width(), grid.height());
    if width > format.max_dimension() || height > format.max_dimension() {
        return Err(SaveError::TooLarge { width, height });
    }

    let mut w = Writer::new(format);
    w.dimension(width);
    w.dimension(height);

    let mut records: Vec<(Vec<Vec<u8>>, Vec<Position>)> = Vec::new();
    for pos in grid.interior_positions() {
        for layer in Layer::ALL {
            let Some(obj) = grid.object_at(pos, layer) else {
                continue;
            };
            if !obj.kind.is_persisted() || obj.capabilities().is_player {
                continue;
            }
            let blobs = obj.kind.encode_attributes();
            match records.iter_mut().find(|(b, _)| *b == blobs) {
                Some((_, positions)) => positions.push(pos),
                None => records.push((blobs, vec![pos])),
            }
        }
    }

    for (blobs, positions) in &records {
        for chunk in positions.chunks(usize::from(u16::MAX)) {
            w.blobs(blobs)?;
            w.u16(chunk.len() as u16);
            for &pos in chunk {
                w.position(pos);
            }
        }
    }
    w.u8(0);
    w.position(player);

    for (_, structure) in level.signals().iter() {
        let mut blobs = Vec::new();
        let kind = match structure {
            Structure::Single(_) => StructureType::SingleSwitchLink,
            Structure::Multi(link) => {
                let n = u8::try_from(link.switches.len()).map_err(|_| SaveError::RecordTooLarge {
                    what: "switch",
                    len: link.switches.len(),
                })?;
                blobs.push(vec![
                    u8::from(link.rule == LinkRule::All),
                    n,
                    u8::from(link.persistent),
                ]);
                StructureType::MultiSwitchLink
            }
        };
        for &object in structure.switches().iter().chain(structure.gates()) {
            blobs.push(encode_reference(grid, object, format)?);
        }
        w.u8(kind.to_byte());
        w.blobs(&blobs)?;
    }

    Ok(w.buf)
}

fn encode_reference(grid: &Grid, object: ObjectId, format: MapFormat) -> Result<Vec<u8>, SaveError> {
    let obj = grid
        .object(object)
        .filter(|o| grid.is_placed(o.id))
        .ok_or(SaveError::UnknownObject(object))?;
    let mut w = Writer::new(format);
    w.position(obj.position);
    w.u8(obj.layer().to_byte());
    Ok(w.buf)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    format: MapFormat,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], format: MapFormat) -> Self {
        Self {
            bytes,
            offset: 0,
            format,
        }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, n: usize, expected: &'static str) -> Result<&'a [u8], LoadError> {
        let end = self.offset + n;
        let slice = self.bytes.get(self.offset..end).ok_or(LoadError::Truncated {
            offset: self.bytes.len(),
            expected,
        })?;
        self.offset = end;
        Ok(slice)
    }

    /// Fail unless at least `n` more bytes are available.
    fn require(&self, n: usize, expected: &'static str) -> Result<(), LoadError> {
        if self.bytes.len().saturating_sub(self.offset) < n {
            return Err(LoadError::Truncated {
                offset: self.bytes.len(),
                expected,
            });
        }
        Ok(())
    }

    fn u8(&mut self, expected: &'static str) -> Result<u8, LoadError> {
        Ok(self.take(1, expected)?[0])
    }

    fn u16(&mut self, expected: &'static str) -> Result<u16, LoadError> {
        let bytes = self.take(2, expected)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn dimension(&mut self, expected: &'static str) -> Result<u16, LoadError> {
        match self.format {
            MapFormat::Standard => self.u8(expected).map(u16::from),
            MapFormat::Extended => self.u16(expected),
        }
    }

    fn position(&mut self) -> Result<Position, LoadError> {
        let x = self.dimension("x coordinate")?;
        let y = self.dimension("y coordinate")?;
        Ok(Position::new(i32::from(x), i32::from(y)))
    }

    /// `[size]*pieces` followed by the blobs.
    fn blobs(&mut self, pieces: u8) -> Result<Vec<&'a [u8]>, LoadError> {
        let sizes = self.take(usize::from(pieces), "blob sizes")?;
        sizes
            .iter()
            .map(|&size| self.take(usize::from(size), "blob"))
            .collect()
    }
}

/// Decode a level from `bytes`.
///
/// Sticky objects are merged once every placement is loaded, the player
/// rides whatever car it starts on, and gates settle against an all-low
/// signal. Switches are not evaluated until the first step.
///
/// # Errors
///
/// Any malformed record fails the whole load; no partial level is returned.
pub fn decode(bytes: &[u8], format: MapFormat) -> Result<Level, LoadError> {
    let mut r = Reader::new(bytes, format);
    let width = r.dimension("width")?;
    let height = r.dimension("height")?;
    // The end marker and the player position must follow the header.
    r.require(1 + 2 * format.coordinate_width(), "placement records")?;
    let mut level = Level::try_new(width, height).map_err(|_| LoadError::TooLarge { width, height })?;
    let mut sticky = Vec::new();

    loop {
        let offset = r.offset;
        let pieces = r.u8("placement record")?;
        if pieces == 0 {
            break;
        }
        let blobs = r.blobs(pieces)?;
        let name = std::str::from_utf8(blobs[0]).map_err(|_| LoadError::InvalidTypeName { offset })?;
        let kind = ObjectKind::decode_attributes(name, &blobs[1..])
            .map_err(|source| LoadError::Attribute { offset, source })?;
        let count = r.u16("placement count")?;

        let caps = kind.capabilities();
        if caps.is_player {
            tracing::warn!(offset, count, "ignoring player placement record");
        }
        for _ in 0..count {
            let pos = r.position()?;
            if caps.is_player {
                continue;
            }
            let id = level
                .grid_mut()
                .spawn(kind, pos)
                .map_err(|source| LoadError::Placement { offset, source })?;
            if caps.sticky {
                sticky.push(id);
            }
        }
    }
    for id in sticky {
        let _ = level.grid_mut().merge_adjacent(id);
    }

    let offset = r.offset;
    let start = r.position()?;
    let player = level
        .grid_mut()
        .spawn(ObjectKind::Player, start)
        .map_err(|source| LoadError::Placement { offset, source })?;
    level.adopt_player(player);

    while !r.is_empty() {
        let offset = r.offset;
        let byte = r.u8("structure type")?;
        let pieces = r.u8("structure pieces")?;
        let blobs = r.blobs(pieces)?;
        let structure = match StructureType::from_byte(byte) {
            Some(StructureType::SingleSwitchLink) => decode_single(level.grid(), &blobs, format, offset)?,
            Some(StructureType::MultiSwitchLink) => decode_multi(level.grid(), &blobs, format, offset)?,
            Some(other) => return Err(LoadError::UnsupportedStructure(other.name())),
            None => return Err(LoadError::UnknownStructure(byte)),
        };
        level
            .link(structure)
            .map_err(|e| LoadError::InvalidStructure {
                offset,
                reason: e.to_string(),
            })?;
    }

    level.settle_gates();
    Ok(level)
}

fn decode_single(
    grid: &Grid,
    blobs: &[&[u8]],
    format: MapFormat,
    offset: usize,
) -> Result<Structure, LoadError> {
    let Some((switch, gates)) = blobs.split_first() else {
        return Err(LoadError::InvalidStructure {
            offset,
            reason: "a single switch link needs a switch".to_owned(),
        });
    };
    Ok(Structure::Single(SingleSwitchLink {
        switch: decode_reference(grid, switch, format, offset)?,
        gates: decode_references(grid, gates, format, offset)?,
    }))
}

fn decode_multi(
    grid: &Grid,
    blobs: &[&[u8]],
    format: MapFormat,
    offset: usize,
) -> Result<Structure, LoadError> {
    let invalid = |reason: String| LoadError::InvalidStructure { offset, reason };
    let Some((header, refs)) = blobs.split_first() else {
        return Err(invalid("a multi switch link needs a header".to_owned()));
    };
    let &[all, n, persistent] = *header else {
        return Err(invalid(format!(
            "multi switch link header is {} bytes, expected 3",
            header.len()
        )));
    };
    let flag = |value: u8, name: &str| match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(invalid(format!("'{name}' flag is {value}, expected 0 or 1"))),
    };
    let rule = if flag(all, "all")? { LinkRule::All } else { LinkRule::Any };
    let persistent = flag(persistent, "persistent")?;

    let n = usize::from(n);
    if n > refs.len() {
        return Err(invalid(format!(
            "multi switch link declares {n} switches but has {} references",
            refs.len()
        )));
    }
    let (switches, gates) = refs.split_at(n);
    Ok(Structure::Multi(MultiSwitchLink::new(
        decode_references(grid, switches, format, offset)?,
        decode_references(grid, gates, format, offset)?,
        rule,
        persistent,
    )))
}

fn decode_references(
    grid: &Grid,
    blobs: &[&[u8]],
    format: MapFormat,
    offset: usize,
) -> Result<Vec<ObjectId>, LoadError> {
    blobs
        .iter()
        .map(|blob| decode_reference(grid, blob, format, offset))
        .collect()
}

fn decode_reference(grid: &Grid, blob: &[u8], format: MapFormat, offset: usize) -> Result<ObjectId, LoadError> {
    if blob.len() != format.reference_len() {
        return Err(LoadError::InvalidStructure {
            offset,
            reason: format!(
                "object reference is {} bytes, expected {}",
                blob.len(),
                format.reference_len()
            ),
        });
    }
    let mut r = Reader::new(blob, format);
    let position = r.position()?;
    let byte = r.u8("layer")?;
    let layer = Layer::from_byte(byte).ok_or_else(|| LoadError::InvalidStructure {
        offset,
        reason: format!("invalid layer {byte}"),
    })?;
    grid.at(position, layer)
        .ok_or(LoadError::DanglingReference { position, layer })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// The path [`save`] writes to: `path` itself if it ends in `.map` or
/// `.mapx`, otherwise `path` with `.map` appended.
pub fn save_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("map" | "mapx") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".map");
            PathBuf::from(name)
        }
    }
}

/// Read and decode a map file. The format follows the extension.
///
/// # Errors
///
/// [`LoadError::Io`] if the file cannot be read, otherwise see [`decode`].
pub fn load(path: impl AsRef<Path>) -> Result<Level, LoadError> {
    let path = path.as_ref();
    let format = MapFormat::from_path(path);
    let bytes = std::fs::read(path)?;
    let level = decode(&bytes, format)?;
    tracing::info!(
        path = %path.display(),
        ?format,
        width = level.grid().width(),
        height = level.grid().height(),
        structures = level.signals().len(),
        "loaded level"
    );
    Ok(level)
}

/// Encode `level` and write it to [`save_path(path)`](save_path).
///
/// # Errors
///
/// See [`encode`]; [`SaveError::Io`] if the file cannot be written.
pub fn save(path: impl AsRef<Path>, level: &Level) -> Result<(), SaveError> {
    let path = save_path(path);
    let format = MapFormat::from_path(&path);
    let bytes = encode(level, format)?;
    std::fs::write(&path, &bytes)?;
    tracing::info!(path = %path.display(), ?format, bytes = bytes.len(), "saved level");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
