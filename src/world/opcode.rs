//! Declarative opcode descriptors.
//!
//! The decoder and encoder must agree exactly on the field order of every
//! chunk; both sides are driven by this one table rather than two separately
//! maintained switch statements. An entry's position also fixes the order in
//! which the encoder emits object attributes.

/// Wire type of a single chunk field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTy {
    Byte,
    Int32,
    Single,
    /// Null-terminated string.
    StrZ,
}

/// One named field in a chunk payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldTy,
}

macro_rules! fields {
    ($($name:literal : $ty:ident),* $(,)?) => {
        &[$(FieldDef { name: $name, ty: FieldTy::$ty }),*]
    };
}

/// How a chunk maps onto the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpShape {
    /// New node under the root, or under a named logical group node.
    Record {
        node: &'static str,
        group: Option<&'static str>,
    },
    /// Placed-object record; becomes the decoder's current object.
    Object,
    /// Placed-object record with the two tilt angles.
    ObjectTilted,
    /// Fields attach as leaves to the current object.
    Attr,
    /// Void leaf on the current object.
    AttrFlag { name: &'static str },
    /// Repeatable child node under the current object.
    AttrNode { node: &'static str },
    /// Count-prefixed point list under the current object.
    Spline,
    /// Opens a nested lock scope under the current object.
    OpenLock,
    /// Closes the innermost lock scope.
    CloseLock,
    /// Value-less chunk; an empty tagged node under the root.
    Marker { node: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeDef {
    pub op: u8,
    pub shape: OpShape,
    pub fields: &'static [FieldDef],
}

pub const TERMINATOR: u8 = 0xFF;
pub const OP_OBJECT: u8 = 0x2A;
pub const OP_OBJECT_TILTED: u8 = 0x46;
pub const OP_SPLINE: u8 = 0x30;
pub const OP_OPEN_LOCK: u8 = 0x32;
pub const OP_CLOSE_LOCK: u8 = 0x33;

pub const NODE_OBJECT: &str = "Object";
pub const NODE_LOCK: &str = "Lock";
pub const NODE_SPLINE: &str = "Spline";
pub const NODE_POINT: &str = "Point";
pub const GROUP_SURFACE_TEXTURES: &str = "Surface Textures";

const RGB: &[FieldDef] = fields!["Red": Byte, "Green": Byte, "Blue": Byte];
const FOG: &[FieldDef] =
    fields!["Near": Single, "Far": Single, "Red": Byte, "Green": Byte, "Blue": Byte];
const NAME_ONLY: &[FieldDef] = fields!["Name": StrZ];
const OBJECT_BASE: &[FieldDef] =
    fields!["Name": StrZ, "X": Single, "Y": Single, "Z": Single, "Angle": Single];
const OBJECT_TILTED: &[FieldDef] = fields![
    "Name": StrZ,
    "X": Single,
    "Y": Single,
    "Z": Single,
    "Angle": Single,
    "Tilt Forward": Single,
    "Tilt Left": Single,
];

const fn rec(op: u8, node: &'static str, fields: &'static [FieldDef]) -> OpcodeDef {
    OpcodeDef {
        op,
        shape: OpShape::Record { node, group: None },
        fields,
    }
}

const fn grouped(
    op: u8,
    node: &'static str,
    group: &'static str,
    fields: &'static [FieldDef],
) -> OpcodeDef {
    OpcodeDef {
        op,
        shape: OpShape::Record {
            node,
            group: Some(group),
        },
        fields,
    }
}

const fn binding(op: u8, node: &'static str) -> OpcodeDef {
    grouped(op, node, GROUP_SURFACE_TEXTURES, NAME_ONLY)
}

const fn attr(op: u8, fields: &'static [FieldDef]) -> OpcodeDef {
    OpcodeDef {
        op,
        shape: OpShape::Attr,
        fields,
    }
}

const fn flag(op: u8, name: &'static str) -> OpcodeDef {
    OpcodeDef {
        op,
        shape: OpShape::AttrFlag { name },
        fields: &[],
    }
}

const fn marker(op: u8, node: &'static str) -> OpcodeDef {
    OpcodeDef {
        op,
        shape: OpShape::Marker { node },
        fields: &[],
    }
}

/// Every recognized chunk. Attribute entries appear in the order the encoder
/// must emit them after an object record.
pub static OPCODES: &[OpcodeDef] = &[
    // environment
    rec(0x01, "Fog", FOG),
    rec(0x02, "Water Fog", FOG),
    rec(
        0x03,
        "Tiling",
        fields![
            "Ground U": Single,
            "Ground V": Single,
            "Slope U": Single,
            "Slope V": Single,
            "Wall U": Single,
            "Wall V": Single,
            "Detail Scale": Single,
        ],
    ),
    rec(0x04, "Sea Speed", fields!["Speed": Single]),
    rec(0x05, "Sun Color", RGB),
    rec(
        0x06,
        "Sun Flare",
        fields!["Size": Single, "Red": Byte, "Green": Byte, "Blue": Byte],
    ),
    rec(0x07, "Ambient Color", RGB),
    rec(0x08, "Water Color", RGB),
    rec(0x09, "Water Material", fields!["Material": Int32]),
    rec(0x0A, "Sky Texture", fields!["Name": StrZ]),
    rec(
        0x0B,
        "Sun Direction",
        fields!["X": Single, "Y": Single, "Z": Single],
    ),
    rec(
        0x0C,
        "Wind",
        fields!["Direction": Single, "Strength": Single],
    ),
    rec(0x0D, "Sea Level", fields!["Height": Single]),
    rec(0x0E, "Gravity", fields!["Value": Single]),
    rec(0x0F, "Time Of Day", fields!["Hours": Single]),
    // surface texture bindings
    binding(0x10, "Ground Base"),
    binding(0x11, "Ground Bump"),
    binding(0x12, "Ground Detail"),
    binding(0x13, "Ground Normal"),
    binding(0x14, "Slope Base"),
    binding(0x15, "Slope Bump"),
    binding(0x16, "Slope Detail"),
    binding(0x17, "Slope Normal"),
    binding(0x18, "Wall Base"),
    binding(0x19, "Wall Bump"),
    binding(0x1A, "Wall Detail"),
    binding(0x1B, "Wall Normal"),
    // more environment
    rec(0x1C, "Cloud Texture", fields!["Name": StrZ]),
    rec(0x1D, "Cloud Speed", fields!["Speed": Single]),
    rec(0x1E, "Fog Density", fields!["Density": Single]),
    rec(0x1F, "Shadow Color", RGB),
    rec(0x20, "Far Clip", fields!["Distance": Single]),
    rec(0x21, "Sky Color", RGB),
    rec(0x22, "Horizon Color", RGB),
    rec(0x23, "Water Alpha", fields!["Alpha": Byte]),
    rec(0x24, "Wave Height", fields!["Height": Single]),
    rec(0x25, "Wave Speed", fields!["Speed": Single]),
    rec(0x26, "Reflection", fields!["Enabled": Byte]),
    rec(0x27, "Detail Distance", fields!["Distance": Single]),
    rec(0x28, "Grass Texture", fields!["Name": StrZ]),
    rec(0x29, "Grass Density", fields!["Density": Single]),
    // placed objects
    OpcodeDef {
        op: OP_OBJECT,
        shape: OpShape::Object,
        fields: OBJECT_BASE,
    },
    OpcodeDef {
        op: OP_OBJECT_TILTED,
        shape: OpShape::ObjectTilted,
        fields: OBJECT_TILTED,
    },
    // object attributes, in encoder emission order
    attr(0x2B, fields!["Scale": Single]),
    attr(0x2C, fields!["AI Mode": Byte]),
    attr(0x2D, fields!["Team": Int32]),
    attr(
        0x2E,
        fields![
            "Light Red": Byte,
            "Light Green": Byte,
            "Light Blue": Byte,
        ],
    ),
    attr(0x2F, fields!["Animation": StrZ]),
    attr(0x34, fields!["Health": Int32]),
    attr(0x35, fields!["Shield": Int32]),
    attr(0x36, fields!["Speed": Single]),
    attr(0x3C, fields!["Trigger Radius": Single]),
    attr(0x3D, fields!["Respawn Time": Int32]),
    attr(0x3E, fields!["Variant": Byte]),
    attr(0x47, fields!["Sound Loop": StrZ]),
    attr(0x48, fields!["Sound Radius": Single]),
    attr(0x49, fields!["Named Target": StrZ]),
    flag(0x37, "Carried"),
    flag(0x38, "Invulnerable"),
    flag(0x39, "Hidden"),
    flag(0x3A, "No Collision"),
    OpcodeDef {
        op: OP_SPLINE,
        shape: OpShape::Spline,
        fields: &[],
    },
    OpcodeDef {
        op: 0x31,
        shape: OpShape::AttrNode { node: "Icon" },
        fields: fields!["Name": StrZ],
    },
    OpcodeDef {
        op: 0x3B,
        shape: OpShape::AttrNode { node: "Waypoint" },
        fields: fields!["X": Single, "Y": Single, "Z": Single],
    },
    OpcodeDef {
        op: OP_OPEN_LOCK,
        shape: OpShape::OpenLock,
        fields: &[],
    },
    OpcodeDef {
        op: OP_CLOSE_LOCK,
        shape: OpShape::CloseLock,
        fields: &[],
    },
    // world markers
    marker(0x40, "Night"),
    marker(0x41, "Snow"),
    marker(0x42, "Rain"),
    marker(0x43, "Mirror Sea"),
    // world records
    grouped(
        0x50,
        "Start Location",
        "Start Locations",
        fields![
            "Team": Int32,
            "X": Single,
            "Y": Single,
            "Z": Single,
            "Angle": Single,
        ],
    ),
    grouped(
        0x51,
        "Teleport",
        "Teleports",
        fields![
            "Name": StrZ,
            "X": Single,
            "Y": Single,
            "Z": Single,
            "Target X": Single,
            "Target Y": Single,
            "Target Z": Single,
        ],
    ),
    grouped(
        0x52,
        "Scenario",
        "Scenarios",
        fields!["Index": Int32, "Name": StrZ],
    ),
    grouped(
        0x53,
        "Mission",
        "Missions",
        fields!["Id": Int32, "Name": StrZ, "Script": StrZ],
    ),
    grouped(
        0x54,
        "Flick",
        "Flicks",
        fields!["Name": StrZ, "Autoplay": Byte],
    ),
    rec(
        0x55,
        "World Grid",
        fields![
            "Width": Int32,
            "Height": Int32,
            "Cell Size": Single,
        ],
    ),
    rec(
        0x56,
        "Camera Start",
        fields![
            "X": Single,
            "Y": Single,
            "Z": Single,
            "Pitch": Single,
            "Yaw": Single,
        ],
    ),
    rec(0x57, "Music", fields!["Track": StrZ]),
    rec(0x58, "Briefing", fields!["File": StrZ]),
];

/// Descriptor for an opcode byte, if recognized.
pub fn by_op(op: u8) -> Option<&'static OpcodeDef> {
    OPCODES.iter().find(|d| d.op == op)
}

/// Descriptor whose record/marker node name matches, for the encoder's
/// name-driven dispatch.
pub fn for_node(name: &str) -> Option<&'static OpcodeDef> {
    OPCODES.iter().find(|d| match d.shape {
        OpShape::Record { node, .. } | OpShape::Marker { node } => node == name,
        _ => false,
    })
}

/// Is this root-child name one of the logical group nodes?
pub fn is_group(name: &str) -> bool {
    OPCODES.iter().any(|d| {
        matches!(d.shape, OpShape::Record { group: Some(g), .. } if g == name)
    })
}

/// Attribute-style descriptors in table (= emission) order.
pub fn attr_defs() -> impl Iterator<Item = &'static OpcodeDef> {
    OPCODES.iter().filter(|d| {
        matches!(
            d.shape,
            OpShape::Attr
                | OpShape::AttrFlag { .. }
                | OpShape::AttrNode { .. }
                | OpShape::Spline
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_opcodes_are_unique() {
        let mut seen = HashSet::new();
        for def in OPCODES {
            assert!(seen.insert(def.op), "duplicate opcode {:#04x}", def.op);
            assert_ne!(def.op, TERMINATOR);
        }
    }

    #[test]
    fn test_record_node_names_are_unique() {
        let mut seen = HashSet::new();
        for def in OPCODES {
            if let OpShape::Record { node, .. } | OpShape::Marker { node } = def.shape {
                assert!(seen.insert(node), "duplicate node name {node:?}");
            }
        }
    }

    #[test]
    fn test_group_names_never_collide_with_record_names() {
        for def in OPCODES {
            if let OpShape::Record { group: Some(g), .. } = def.shape {
                assert!(for_node(g).is_none(), "group {g:?} shadows a record");
            }
        }
    }

    #[test]
    fn test_object_shapes() {
        assert!(matches!(by_op(OP_OBJECT).unwrap().shape, OpShape::Object));
        assert!(matches!(
            by_op(OP_OBJECT_TILTED).unwrap().shape,
            OpShape::ObjectTilted
        ));
        assert_eq!(by_op(OP_OBJECT).unwrap().fields.len(), 5);
        assert_eq!(by_op(OP_OBJECT_TILTED).unwrap().fields.len(), 7);
    }

    #[test]
    fn test_roughly_eighty_opcodes() {
        assert!(OPCODES.len() >= 75 && OPCODES.len() <= 85);
    }
}
