//! The world-map save codec: a 32-byte pointer-table header, an opcode-tagged
//! main chunk stream, and six independently addressed trailing sections.

pub mod decoder;
pub mod encoder;
pub mod opcode;

pub use decoder::decode_world;
pub use encoder::encode_world;

/// `"WRLD"` little-endian.
pub const WORLD_MAGIC: i32 = 0x444C_5257;

/// Magic plus seven section offsets.
pub const HEADER_LEN: usize = 32;

pub const LEAF_WORLD_NAME: &str = "Name";
pub const LEAF_TERRAIN_FILE: &str = "Terrain File";

pub const SECTION_TEXTURES: &str = "Textures";
pub const SECTION_SOUNDS: &str = "Sound Effects";
pub const SECTION_DEFINITIONS: &str = "Object Definitions";
pub const SECTION_ENV_FX: &str = "Environment FX";
pub const SECTION_SCENARIOS: &str = "Scenario List";
pub const SECTION_INCLUDES: &str = "Include Files";

/// Top-level node names reserved for the trailing sections, in header order.
pub const SECTION_NODES: [&str; 6] = [
    SECTION_TEXTURES,
    SECTION_SOUNDS,
    SECTION_DEFINITIONS,
    SECTION_ENV_FX,
    SECTION_SCENARIOS,
    SECTION_INCLUDES,
];

/// Upper bound on section record counts and spline points, to reject
/// nonsense counts before allocating.
pub(crate) const MAX_RECORDS: i32 = 1 << 20;
