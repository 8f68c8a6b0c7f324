//! World file encoder: replays the document tree back into bytes.
//!
//! The root's children are emitted in their current order, which is what
//! makes an unmodified decode → encode round trip byte-identical. Per
//! object, attribute chunks are emitted in opcode-table order, gated by
//! presence of the corresponding leaves or child nodes; lock scopes recurse
//! after the attributes. Required fields that are absent fail the encode;
//! emitting zeroed defaults would produce a file that cannot round-trip.

use super::opcode::{
    self, OpShape, NODE_LOCK, NODE_OBJECT, NODE_POINT, NODE_SPLINE, OP_CLOSE_LOCK, OP_OBJECT,
    OP_OBJECT_TILTED, OP_OPEN_LOCK, OP_SPLINE, TERMINATOR,
};
use super::{LEAF_TERRAIN_FILE, LEAF_WORLD_NAME, SECTION_NODES, WORLD_MAGIC};
use crate::codec::BinaryWriter;
use crate::error::{Error, Result};
use crate::tree::{LeafValue, NodeId, Tree};

/// Encode a document tree into a complete world file.
pub fn encode_world(tree: &Tree) -> Result<Vec<u8>> {
    let root = tree.root();
    let mut w = BinaryWriter::with_capacity(4096);

    w.write_i32(WORLD_MAGIC);
    let pointer_table = w.position();
    for _ in 0..7 {
        w.write_i32(0);
    }

    let mut offsets = [0i32; 7];
    offsets[0] = w.position() as i32;

    let length_spot = w.position();
    w.write_i32(0);
    let block_start = w.position();

    w.write_string_z(tree.leaf_str(root, LEAF_WORLD_NAME)?)?;
    w.write_string_z(tree.leaf_str(root, LEAF_TERRAIN_FILE)?)?;

    for &child in tree.children(root) {
        if SECTION_NODES.contains(&tree.name(child)) {
            continue;
        }
        write_root_child(&mut w, tree, child)?;
    }
    w.write_u8(TERMINATOR);
    w.patch_i32(length_spot, (w.position() - block_start) as i32)?;

    offsets[1] = w.position() as i32;
    write_textures(&mut w, tree)?;
    offsets[2] = w.position() as i32;
    write_sounds(&mut w, tree)?;
    offsets[3] = w.position() as i32;
    write_definitions(&mut w, tree)?;
    offsets[4] = w.position() as i32;
    write_env_fx(&mut w, tree)?;
    offsets[5] = w.position() as i32;
    write_scenarios(&mut w, tree)?;
    offsets[6] = w.position() as i32;
    write_includes(&mut w, tree)?;

    for (i, &offset) in offsets.iter().enumerate() {
        w.patch_i32(pointer_table + i * 4, offset)?;
    }
    Ok(w.into_vec())
}

fn write_root_child(w: &mut BinaryWriter, tree: &Tree, node: NodeId) -> Result<()> {
    let name = tree.name(node);
    if name == NODE_OBJECT {
        return write_object(w, tree, node);
    }
    if opcode::is_group(name) {
        for &child in tree.children(node) {
            let def = opcode::for_node(tree.name(child)).ok_or_else(|| Error::UnencodableNode {
                name: tree.name(child).into(),
            })?;
            w.write_u8(def.op);
            write_fields(w, tree, child, def.fields)?;
        }
        return Ok(());
    }
    match opcode::for_node(name) {
        Some(def) => {
            w.write_u8(def.op);
            write_fields(w, tree, node, def.fields)
        }
        None => Err(Error::UnencodableNode { name: name.into() }),
    }
}

fn write_object(w: &mut BinaryWriter, tree: &Tree, node: NodeId) -> Result<()> {
    // opcode choice is driven by tilt-field presence; half a tilt pair is an
    // authoring error, not something to paper over
    let forward = tree.find_child_leaf(node, "Tilt Forward").is_some();
    let left = tree.find_child_leaf(node, "Tilt Left").is_some();
    let op = match (forward, left) {
        (true, true) => OP_OBJECT_TILTED,
        (false, false) => OP_OBJECT,
        (true, false) => {
            return Err(Error::MissingField {
                node: object_label(tree, node),
                field: "Tilt Left".into(),
            })
        }
        (false, true) => {
            return Err(Error::MissingField {
                node: object_label(tree, node),
                field: "Tilt Forward".into(),
            })
        }
    };
    let def = opcode::by_op(op).expect("object opcodes are always in the table");
    w.write_u8(def.op);
    write_fields(w, tree, node, def.fields)?;

    for attr in opcode::attr_defs() {
        match attr.shape {
            OpShape::Attr => {
                let present = attr
                    .fields
                    .iter()
                    .filter(|f| tree.find_child_leaf(node, f.name).is_some())
                    .count();
                if present == attr.fields.len() {
                    w.write_u8(attr.op);
                    write_fields(w, tree, node, attr.fields)?;
                } else if present > 0 {
                    let missing = attr
                        .fields
                        .iter()
                        .find(|f| tree.find_child_leaf(node, f.name).is_none())
                        .expect("at least one field is absent");
                    return Err(Error::MissingField {
                        node: object_label(tree, node),
                        field: missing.name.into(),
                    });
                }
            }
            OpShape::AttrFlag { name } => {
                if tree.has_void(node, name) {
                    w.write_u8(attr.op);
                }
            }
            OpShape::AttrNode { node: child_name } => {
                for &child in tree.children(node) {
                    if tree.name(child) == child_name {
                        w.write_u8(attr.op);
                        write_fields(w, tree, child, attr.fields)?;
                    }
                }
            }
            OpShape::Spline => {
                for &child in tree.children(node) {
                    if tree.name(child) == NODE_SPLINE {
                        write_spline(w, tree, child)?;
                    }
                }
            }
            _ => unreachable!("attr_defs yields only attribute shapes"),
        }
    }

    for &child in tree.children(node) {
        if tree.name(child) == NODE_LOCK {
            w.write_u8(OP_OPEN_LOCK);
            for &locked in tree.children(child) {
                if tree.name(locked) != NODE_OBJECT {
                    return Err(Error::UnencodableNode {
                        name: tree.name(locked).into(),
                    });
                }
                write_object(w, tree, locked)?;
            }
            w.write_u8(OP_CLOSE_LOCK);
        }
    }
    Ok(())
}

fn write_spline(w: &mut BinaryWriter, tree: &Tree, spline: NodeId) -> Result<()> {
    w.write_u8(OP_SPLINE);
    let points: Vec<NodeId> = tree
        .children(spline)
        .iter()
        .copied()
        .filter(|&p| tree.name(p) == NODE_POINT)
        .collect();
    w.write_i32(points.len() as i32);
    for point in points {
        w.write_single(tree.leaf_single(point, "X")?);
        w.write_single(tree.leaf_single(point, "Y")?);
        w.write_single(tree.leaf_single(point, "Z")?);
    }
    Ok(())
}

fn write_fields(
    w: &mut BinaryWriter,
    tree: &Tree,
    node: NodeId,
    fields: &[opcode::FieldDef],
) -> Result<()> {
    for field in fields {
        match field.ty {
            opcode::FieldTy::Byte => w.write_u8(tree.leaf_byte(node, field.name)?),
            opcode::FieldTy::Int32 => w.write_i32(tree.leaf_i32(node, field.name)?),
            opcode::FieldTy::Single => w.write_single(tree.leaf_single(node, field.name)?),
            opcode::FieldTy::StrZ => w.write_string_z(tree.leaf_str(node, field.name)?)?,
        }
    }
    Ok(())
}

fn object_label(tree: &Tree, node: NodeId) -> String {
    match tree.find_child_leaf(node, "Name").and_then(|l| l.as_str()) {
        Some(name) => format!("{} {name:?}", NODE_OBJECT),
        None => NODE_OBJECT.into(),
    }
}

fn section_children(tree: &Tree, name: &str) -> Vec<NodeId> {
    match tree.find_child_node(tree.root(), name) {
        Some(section) => tree.children(section).to_vec(),
        None => Vec::new(),
    }
}

fn write_textures(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    let records = section_children(tree, super::SECTION_TEXTURES);
    w.write_i32(records.len() as i32);
    for node in records {
        w.write_u8(tree.leaf_byte(node, "Flags A")?);
        w.write_u8(tree.leaf_byte(node, "Flags B")?);
        w.write_string_b(tree.leaf_str(node, "Name")?)?;
    }
    Ok(())
}

fn write_sounds(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    const FIELDS: [&str; 5] = ["Effect ID", "Volume", "Min Distance", "Max Distance", "Flags"];
    let records = section_children(tree, super::SECTION_SOUNDS);
    w.write_i32(records.len() as i32);
    for node in records {
        for name in FIELDS {
            w.write_i32(tree.leaf_i32(node, name)?);
        }
    }
    Ok(())
}

fn write_definitions(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    let records = section_children(tree, super::SECTION_DEFINITIONS);
    w.write_i32(records.len() as i32);
    for node in records {
        let blob = tree.leaf_bytes(node, "Data")?;
        w.write_i32(blob.len() as i32);
        w.write_bytes(blob);
    }
    Ok(())
}

fn write_env_fx(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    let values: Vec<i32> = match tree.find_child_node(tree.root(), super::SECTION_ENV_FX) {
        Some(section) => tree
            .leaves(section)
            .iter()
            .filter(|l| l.name == "FX")
            .map(|l| match l.value {
                LeafValue::Int32(v) => Ok(v),
                _ => Err(Error::WrongLeafType {
                    node: super::SECTION_ENV_FX.into(),
                    field: "FX".into(),
                    expected: "int32",
                }),
            })
            .collect::<Result<_>>()?,
        None => Vec::new(),
    };
    w.write_i32(values.len() as i32);
    for value in values {
        w.write_i32(value);
    }
    Ok(())
}

fn write_scenarios(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    let records = section_children(tree, super::SECTION_SCENARIOS);
    w.write_i32(records.len() as i32);
    for node in records {
        w.write_i32(tree.leaf_i32(node, "Index")?);
        w.write_string_r32z(tree.leaf_str(node, "Name")?);
    }
    Ok(())
}

fn write_includes(w: &mut BinaryWriter, tree: &Tree) -> Result<()> {
    let records = section_children(tree, super::SECTION_INCLUDES);
    w.write_i32(records.len() as i32);
    for node in records {
        w.write_string_r32(tree.leaf_str(node, "Name")?);
    }
    Ok(())
}
