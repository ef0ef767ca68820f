//! Object identifiers, kinds, capabilities, and per-object runtime state.
//!
//! Every placeable thing on the grid is a [`GameObject`]. What an object *can
//! do* is decided entirely by its [`ObjectKind`] through the static
//! [`ObjectKind::capabilities`] table, so adding a new kind is a compile-time
//! exhaustive change rather than a new string key.
//!
//! Objects that are only used to preview a kind (editor palettes, tooltips)
//! are [`ObjectPreview`]s. They carry no identity and no group, and the grid
//! API never accepts them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::group::GroupId;
use crate::position::Position;

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// Stable handle to an object in a grid's arena.
///
/// Identifiers are issued monotonically and never reused within one grid, so
/// a stale handle can only ever resolve to "no object", never to a different
/// one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Construct an `ObjectId` from its arena index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The arena index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// The three per-cell slots. Each cell holds at most one object per layer.
///
/// The discriminants are the byte values written to map files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Layer {
    /// Passive, stationary things: switches, gate bases.
    Floor = 1,
    /// Things that block and push: walls, boxes, cars, raised gates.
    Solid = 2,
    /// The player.
    Player = 3,
}

/// Number of layers per cell.
pub const NUM_LAYERS: usize = 3;

impl Layer {
    /// Every layer, bottom to top.
    pub const ALL: [Layer; NUM_LAYERS] = [Layer::Floor, Layer::Solid, Layer::Player];

    /// Slot index within a cell (0-based).
    #[inline]
    pub const fn slot(self) -> usize {
        self as usize - 1
    }

    /// The persisted byte value.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decode a persisted byte value.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Layer::Floor),
            2 => Some(Layer::Solid),
            3 => Some(Layer::Player),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// An RGB color. Stickiness only binds objects of *identical* color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Construct a color from its channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The 3-byte wire form.
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub const RED: Color = Color::rgb(200, 50, 50);
    pub const GREEN: Color = Color::rgb(50, 200, 50);
    pub const BLUE: Color = Color::rgb(50, 50, 200);
    pub const PURPLE: Color = Color::rgb(200, 50, 200);
    pub const GOLD: Color = Color::rgb(200, 200, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GREY: Color = Color::rgb(100, 100, 100);
    pub const LIGHT_GREY: Color = Color::rgb(200, 200, 200);
    pub const NAVY_BLUE: Color = Color::rgb(40, 40, 80);
    pub const LIGHT_BROWN: Color = Color::rgb(240, 200, 120);
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// What an object of a given kind is able to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The layer the object occupies.
    pub layer: Layer,
    /// Occupies the SOLID layer and blocks movement.
    pub solid: bool,
    /// Can be pushed by the player or by another pushed object.
    pub pushable: bool,
    /// Fuses with adjacent same-color sticky objects into one rigid body.
    pub sticky: bool,
    /// The player can stand on it and be carried along.
    pub rideable: bool,
    /// The player object.
    pub is_player: bool,
    /// Emits a signal when pressed.
    pub is_switch: bool,
    /// Reacts to signals.
    pub is_switchable: bool,
    /// Receives an update callback after every successful step.
    pub dynamic: bool,
}

impl Capabilities {
    const fn base(layer: Layer) -> Self {
        Self {
            layer,
            solid: matches!(layer, Layer::Solid),
            pushable: false,
            sticky: false,
            rideable: false,
            is_player: false,
            is_switch: false,
            is_switchable: false,
            dynamic: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectKind
// ---------------------------------------------------------------------------

/// The closed set of object kinds, with their type-specific arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Immovable wall. Also used for the implicit border.
    Wall,
    /// A pushable box.
    Box {
        /// Box color.
        color: Color,
        /// Whether it fuses with same-color sticky neighbours.
        sticky: bool,
    },
    /// A pushable box the player can ride.
    Car {
        /// Car color.
        color: Color,
        /// Whether it fuses with same-color sticky neighbours.
        sticky: bool,
    },
    /// The player.
    Player,
    /// A floor switch, pressed while a solid object covers it.
    Switch {
        /// Once pressed, stays pressed.
        persistent: bool,
    },
    /// The floor anchor of a gate. Raises a [`ObjectKind::GateWall`] on its
    /// cell while the gate is up.
    GateBase {
        /// The gate is up when it receives *no* signal.
        default_up: bool,
    },
    /// The solid proxy of a raised gate. Owned by its gate base; never saved.
    GateWall,
}

/// Type names in the order they are listed in the capability table.
pub const TYPE_NAMES: [&str; 7] = [
    "Wall", "Box", "Car", "Player", "Switch", "GateBase", "GateWall",
];

impl ObjectKind {
    /// The static capability table.
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            ObjectKind::Wall | ObjectKind::GateWall => Capabilities::base(Layer::Solid),
            ObjectKind::Box { sticky, .. } => Capabilities {
                pushable: true,
                sticky: *sticky,
                ..Capabilities::base(Layer::Solid)
            },
            ObjectKind::Car { sticky, .. } => Capabilities {
                pushable: true,
                sticky: *sticky,
                rideable: true,
                ..Capabilities::base(Layer::Solid)
            },
            ObjectKind::Player => Capabilities {
                is_player: true,
                ..Capabilities::base(Layer::Player)
            },
            ObjectKind::Switch { .. } => Capabilities {
                is_switch: true,
                dynamic: true,
                ..Capabilities::base(Layer::Floor)
            },
            ObjectKind::GateBase { .. } => Capabilities {
                is_switchable: true,
                dynamic: true,
                ..Capabilities::base(Layer::Floor)
            },
        }
    }

    /// Shorthand for `capabilities().layer`.
    #[inline]
    pub const fn layer(&self) -> Layer {
        self.capabilities().layer
    }

    /// The display color of this kind.
    pub const fn color(&self) -> Color {
        match self {
            ObjectKind::Wall => Color::BLACK,
            ObjectKind::Box { color, .. } | ObjectKind::Car { color, .. } => *color,
            ObjectKind::Player => Color::GREY,
            ObjectKind::Switch { .. } => Color::LIGHT_BROWN,
            ObjectKind::GateBase { .. } => Color::LIGHT_GREY,
            ObjectKind::GateWall => Color::NAVY_BLUE,
        }
    }

    /// The persisted type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Wall => "Wall",
            ObjectKind::Box { .. } => "Box",
            ObjectKind::Car { .. } => "Car",
            ObjectKind::Player => "Player",
            ObjectKind::Switch { .. } => "Switch",
            ObjectKind::GateBase { .. } => "GateBase",
            ObjectKind::GateWall => "GateWall",
        }
    }

    /// Whether objects of this kind are written to map files.
    ///
    /// Gate walls are derived from their gate base and are rebuilt on load.
    pub const fn is_persisted(&self) -> bool {
        !matches!(self, ObjectKind::GateWall)
    }

    /// Encode as attribute blobs: the UTF-8 type name followed by one blob per
    /// type-specific argument.
    pub fn encode_attributes(&self) -> Vec<Vec<u8>> {
        let mut blobs = vec![self.type_name().as_bytes().to_vec()];
        match self {
            ObjectKind::Box { color, sticky } | ObjectKind::Car { color, sticky } => {
                blobs.push(color.to_bytes().to_vec());
                blobs.push(encode_bool(*sticky));
            }
            ObjectKind::Switch { persistent } => blobs.push(encode_bool(*persistent)),
            ObjectKind::GateBase { default_up } => blobs.push(encode_bool(*default_up)),
            ObjectKind::Wall | ObjectKind::Player | ObjectKind::GateWall => {}
        }
        blobs
    }

    /// Decode a kind from its type name and argument blobs (the name blob
    /// already stripped).
    pub fn decode_attributes(type_name: &str, args: &[&[u8]]) -> Result<Self, AttributeError> {
        let expect_arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(AttributeError::WrongArity {
                    type_name: type_name.to_owned(),
                    expected: n,
                    found: args.len(),
                })
            }
        };
        match type_name {
            "Wall" => expect_arity(0).map(|_| ObjectKind::Wall),
            "Player" => expect_arity(0).map(|_| ObjectKind::Player),
            "GateWall" => expect_arity(0).map(|_| ObjectKind::GateWall),
            "Box" | "Car" => {
                expect_arity(2)?;
                let color = decode_color(type_name, 0, args[0])?;
                let sticky = decode_bool(type_name, 1, args[1])?;
                Ok(if type_name == "Box" {
                    ObjectKind::Box { color, sticky }
                } else {
                    ObjectKind::Car { color, sticky }
                })
            }
            "Switch" => {
                expect_arity(1)?;
                let persistent = decode_bool(type_name, 0, args[0])?;
                Ok(ObjectKind::Switch { persistent })
            }
            "GateBase" => {
                expect_arity(1)?;
                let default_up = decode_bool(type_name, 0, args[0])?;
                Ok(ObjectKind::GateBase { default_up })
            }
            other => Err(AttributeError::UnknownType(other.to_owned())),
        }
    }
}

fn encode_bool(value: bool) -> Vec<u8> {
    vec![u8::from(value)]
}

fn decode_bool(type_name: &str, index: usize, blob: &[u8]) -> Result<bool, AttributeError> {
    match blob {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(AttributeError::InvalidArgument {
            type_name: type_name.to_owned(),
            index,
            expected: "bool (1 byte, 0 or 1)",
        }),
    }
}

fn decode_color(type_name: &str, index: usize, blob: &[u8]) -> Result<Color, AttributeError> {
    match blob {
        [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
        _ => Err(AttributeError::InvalidArgument {
            type_name: type_name.to_owned(),
            index,
            expected: "color (3 bytes RGB)",
        }),
    }
}

/// Errors from decoding an object's attribute blobs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    /// The type name is not in the capability table.
    #[error("unknown object type '{0}'. Known types: {TYPE_NAMES:?}")]
    UnknownType(String),

    /// The number of argument blobs does not match the type's schema.
    #[error("object type '{type_name}' takes {expected} argument(s), found {found}")]
    WrongArity {
        type_name: String,
        expected: usize,
        found: usize,
    },

    /// An argument blob has the wrong size or value.
    #[error("argument {index} of '{type_name}' is malformed: expected {expected}")]
    InvalidArgument {
        type_name: String,
        index: usize,
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// ObjectState
// ---------------------------------------------------------------------------

/// Mutable per-kind state that changes during play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    /// Kinds with no runtime state.
    Inert,
    /// The player, possibly riding a rideable object.
    Player {
        /// The object being ridden, if any.
        riding: Option<ObjectId>,
    },
    /// A switch.
    Switch {
        /// Whether a solid object is (or, if persistent, was) on the switch.
        pressed: bool,
    },
    /// A gate base.
    Gate {
        /// The gate wall currently occupies the SOLID slot.
        active: bool,
        /// The last signal received from a switch or link.
        signal: bool,
        /// The gate wants to rise but its cell is occupied.
        waiting: bool,
        /// The detached wall object raised while the gate is up.
        wall: ObjectId,
    },
}

// ---------------------------------------------------------------------------
// GameObject
// ---------------------------------------------------------------------------

/// An object owned by a grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    /// Arena handle.
    pub id: ObjectId,
    /// Kind and type-specific arguments.
    pub kind: ObjectKind,
    /// Current cell.
    pub position: Position,
    /// The rigid body this object belongs to.
    pub group: GroupId,
    /// Runtime state.
    pub state: ObjectState,
}

impl GameObject {
    /// The static capabilities of this object's kind.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    /// The layer this object occupies.
    #[inline]
    pub fn layer(&self) -> Layer {
        self.kind.layer()
    }

    /// The color, if the kind is colored.
    pub fn color(&self) -> Option<Color> {
        match self.kind {
            ObjectKind::Box { color, .. } | ObjectKind::Car { color, .. } => Some(color),
            _ => None,
        }
    }

    /// Whether something travelling on `layer` may share this object's cell.
    pub fn is_passable(&self, layer: Layer) -> bool {
        self.layer() != layer
    }

    /// Whether this object and `other` stick together when adjacent.
    pub fn sticks_to(&self, other: &GameObject) -> bool {
        self.capabilities().sticky
            && other.capabilities().sticky
            && self.color().is_some()
            && self.color() == other.color()
    }

    /// Short human-readable description, e.g. `Box #4 (2, 1)`.
    pub fn display_str(&self) -> String {
        format!("{} {} {}", self.kind.type_name(), self.id, self.position)
    }
}

// ---------------------------------------------------------------------------
// ObjectPreview
// ---------------------------------------------------------------------------

/// A "virtual" object: a kind at a nominal position with no identity.
///
/// Previews exist for UI purposes only. They have no group and no runtime
/// state, and there is no API to place one on a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectPreview {
    /// The previewed kind.
    pub kind: ObjectKind,
    /// Where the preview is drawn.
    pub position: Position,
}

impl ObjectPreview {
    /// Create a preview of `kind` at `position`.
    pub const fn new(kind: ObjectKind, position: Position) -> Self {
        Self { kind, position }
    }

    /// The static capabilities of the previewed kind.
    pub const fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    /// Short human-readable description, e.g. `Box (virtual) (-1, -1)`.
    pub fn display_str(&self) -> String {
        format!("{} (virtual) {}", self.kind.type_name(), self.position)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> Vec<ObjectKind> {
        vec![
            ObjectKind::Wall,
            ObjectKind::Box {
                color: Color::RED,
                sticky: true,
            },
            ObjectKind::Car {
                color: Color::BLUE,
                sticky: false,
            },
            ObjectKind::Player,
            ObjectKind::Switch { persistent: true },
            ObjectKind::GateBase { default_up: false },
            ObjectKind::GateWall,
        ]
    }

    #[test]
    fn type_names_match_table_order() {
        let names: Vec<&str> = all_kinds().iter().map(|k| k.type_name()).collect();
        assert_eq!(names, TYPE_NAMES.to_vec());
    }

    #[test]
    fn capability_table_layers() {
        assert_eq!(ObjectKind::Wall.layer(), Layer::Solid);
        assert_eq!(ObjectKind::Player.layer(), Layer::Player);
        assert_eq!(ObjectKind::Switch { persistent: false }.layer(), Layer::Floor);
        assert_eq!(ObjectKind::GateBase { default_up: true }.layer(), Layer::Floor);
        assert_eq!(ObjectKind::GateWall.layer(), Layer::Solid);
    }

    #[test]
    fn only_boxes_and_cars_are_pushable() {
        for kind in all_kinds() {
            let caps = kind.capabilities();
            let expected = matches!(kind, ObjectKind::Box { .. } | ObjectKind::Car { .. });
            assert_eq!(caps.pushable, expected, "{kind:?}");
        }
    }

    #[test]
    fn cars_are_rideable_and_sticky_follows_argument() {
        let car = ObjectKind::Car {
            color: Color::GOLD,
            sticky: true,
        };
        assert!(car.capabilities().rideable);
        assert!(car.capabilities().sticky);
        let plain = ObjectKind::Box {
            color: Color::GOLD,
            sticky: false,
        };
        assert!(!plain.capabilities().sticky);
    }

    #[test]
    fn switches_and_gates_are_dynamic() {
        assert!(ObjectKind::Switch { persistent: false }.capabilities().dynamic);
        assert!(ObjectKind::GateBase { default_up: false }.capabilities().dynamic);
        assert!(!ObjectKind::Wall.capabilities().dynamic);
    }

    #[test]
    fn attributes_decode_back_to_the_same_kind() {
        for kind in all_kinds() {
            let blobs = kind.encode_attributes();
            let name = std::str::from_utf8(&blobs[0]).unwrap();
            let args: Vec<&[u8]> = blobs[1..].iter().map(Vec::as_slice).collect();
            assert_eq!(ObjectKind::decode_attributes(name, &args).unwrap(), kind);
        }
    }

    #[test]
    fn box_attributes_layout() {
        let blobs = ObjectKind::Box {
            color: Color::rgb(1, 2, 3),
            sticky: true,
        }
        .encode_attributes();
        assert_eq!(blobs, vec![b"Box".to_vec(), vec![1, 2, 3], vec![1]]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = ObjectKind::decode_attributes("Teleporter", &[]).unwrap_err();
        assert_eq!(err, AttributeError::UnknownType("Teleporter".to_owned()));
    }

    #[test]
    fn malformed_bool_is_rejected() {
        let err = ObjectKind::decode_attributes("Switch", &[&[7]]).unwrap_err();
        assert!(matches!(err, AttributeError::InvalidArgument { index: 0, .. }));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = ObjectKind::decode_attributes("Box", &[&[1, 2, 3]]).unwrap_err();
        assert!(matches!(
            err,
            AttributeError::WrongArity {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn layer_bytes_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_byte(layer.to_byte()), Some(layer));
        }
        assert_eq!(Layer::from_byte(0), None);
        assert_eq!(Layer::Floor.slot(), 0);
        assert_eq!(Layer::Player.slot(), 2);
    }

    #[test]
    fn preview_display_marks_virtual() {
        let preview = ObjectPreview::new(ObjectKind::Wall, Position::new(-1, -1));
        assert_eq!(preview.display_str(), "Wall (virtual) (-1, -1)");
    }
}
