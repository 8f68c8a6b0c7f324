//! World file decoder: header validation, main chunk stream, trailing
//! sections.
//!
//! Failure policy follows the format's constraints. Header problems are
//! fatal, since nothing can be located without the pointer table. Inside the main
//! block an unrecognized opcode (or a truncated payload) only terminates the
//! opcode loop: payload lengths are implicit in the opcode, so the rest of
//! the block cannot be re-synchronized and is abandoned. Each trailing
//! section is decoded independently; one bad section is logged and dropped
//! without affecting the others.

use tracing::{debug, warn};

use super::opcode::{self, OpShape, TERMINATOR};
use super::{
    HEADER_LEN, LEAF_TERRAIN_FILE, LEAF_WORLD_NAME, MAX_RECORDS, SECTION_DEFINITIONS,
    SECTION_ENV_FX, SECTION_INCLUDES, SECTION_SCENARIOS, SECTION_SOUNDS, SECTION_TEXTURES,
    WORLD_MAGIC,
};
use crate::codec::BinaryReader;
use crate::error::{Error, Result};
use crate::tree::{LeafValue, NodeId, Tree};

/// Per-call decoder context. The scope stack bottom is always the root; lock
/// opcodes push and pop attachment points, and `current` tracks the most
/// recently opened object for attribute chunks.
struct Context {
    scopes: Vec<NodeId>,
    current: Option<NodeId>,
}

impl Context {
    fn new(root: NodeId) -> Self {
        Self {
            scopes: vec![root],
            current: None,
        }
    }

    fn root(&self) -> NodeId {
        self.scopes[0]
    }

    fn attach_point(&self) -> NodeId {
        *self.scopes.last().expect("scope stack never empties")
    }

    fn require_current(&self, op: u8, offset: usize) -> Result<NodeId> {
        self.current.ok_or_else(|| Error::Malformed {
            reason: format!("attribute opcode {op:#04x} at offset {offset} with no open object"),
        })
    }
}

/// Decode a complete world file into a fresh document tree.
pub fn decode_world(data: &[u8]) -> Result<Tree> {
    let mut reader = BinaryReader::new(data);
    let offsets = read_header(&mut reader, data.len())?;

    let mut tree = Tree::new("World");

    reader.set_position(offsets[0] as usize);
    decode_main_block(&mut reader, &mut tree)?;

    decode_section(&mut tree, data, offsets[1], SECTION_TEXTURES, read_textures);
    decode_section(&mut tree, data, offsets[2], SECTION_SOUNDS, read_sounds);
    decode_section(
        &mut tree,
        data,
        offsets[3],
        SECTION_DEFINITIONS,
        read_definitions,
    );
    decode_section(&mut tree, data, offsets[4], SECTION_ENV_FX, read_env_fx);
    decode_section(&mut tree, data, offsets[5], SECTION_SCENARIOS, read_scenarios);
    decode_section(&mut tree, data, offsets[6], SECTION_INCLUDES, read_includes);

    Ok(tree)
}

fn read_header(reader: &mut BinaryReader, file_len: usize) -> Result<[i32; 7]> {
    if file_len < HEADER_LEN {
        return Err(Error::MalformedHeader {
            reason: format!("file is {file_len} bytes, header needs {HEADER_LEN}"),
        });
    }
    let magic = reader.read_i32()?;
    if magic != WORLD_MAGIC {
        return Err(Error::MalformedHeader {
            reason: format!("bad magic {magic:#010x}, expected {WORLD_MAGIC:#010x}"),
        });
    }
    let mut offsets = [0i32; 7];
    for (i, slot) in offsets.iter_mut().enumerate() {
        let offset = reader.read_i32()?;
        if offset < HEADER_LEN as i32 || offset as usize > file_len {
            return Err(Error::MalformedHeader {
                reason: format!("section {i} offset {offset} outside {HEADER_LEN}..={file_len}"),
            });
        }
        *slot = offset;
    }
    Ok(offsets)
}

fn decode_main_block(reader: &mut BinaryReader, tree: &mut Tree) -> Result<()> {
    let block_len = reader.read_i32()?;
    let start = reader.position();

    // the file-start record is required; failing here fails the whole load
    let world_name = reader.read_string_z()?;
    let terrain_file = reader.read_string_z()?;
    let root = tree.root();
    tree.add_leaf(root, LEAF_WORLD_NAME, LeafValue::str(world_name));
    tree.add_leaf(root, LEAF_TERRAIN_FILE, LeafValue::str(terrain_file));

    let mut ctx = Context::new(root);
    loop {
        let offset = reader.position();
        let op = match reader.read_u8() {
            Ok(op) => op,
            Err(e) => {
                warn!(offset, error = %e, "main block ended without terminator");
                return Ok(());
            }
        };
        if op == TERMINATOR {
            if ctx.scopes.len() > 1 {
                let e = Error::ScopeMismatch { offset };
                warn!(
                    offset,
                    open = ctx.scopes.len() - 1,
                    error = %e,
                    "main block ended with unclosed lock scopes"
                );
                return Ok(());
            }
            let actual = reader.position() - start;
            if block_len >= 0 && actual != block_len as usize {
                debug!(declared = block_len, actual, "main block length mismatch");
            }
            return Ok(());
        }
        if let Err(e) = dispatch(reader, tree, &mut ctx, op, offset) {
            // implicit payload lengths make recovery impossible; abandon the
            // rest of the block but keep everything decoded so far
            warn!(opcode = op, offset, error = %e, "main block decode stopped early");
            return Ok(());
        }
    }
}

fn dispatch(
    reader: &mut BinaryReader,
    tree: &mut Tree,
    ctx: &mut Context,
    op: u8,
    offset: usize,
) -> Result<()> {
    let def = opcode::by_op(op).ok_or(Error::UnrecognizedOpcode { opcode: op, offset })?;

    match def.shape {
        OpShape::Record { node, group } => {
            let parent = match group {
                Some(group) => tree.get_or_add_node(ctx.root(), group),
                None => ctx.root(),
            };
            let node = tree.add_node(parent, node);
            read_fields(reader, tree, node, def.fields)
        }
        OpShape::Object | OpShape::ObjectTilted => {
            let node = tree.add_node(ctx.attach_point(), opcode::NODE_OBJECT);
            read_fields(reader, tree, node, def.fields)?;
            ctx.current = Some(node);
            Ok(())
        }
        OpShape::Attr => {
            let current = ctx.require_current(op, offset)?;
            // a second copy of a scalar attribute would leave a duplicate
            // leaf the encoder can only emit once, breaking idempotence
            for field in def.fields {
                if tree.find_child_leaf(current, field.name).is_some() {
                    return Err(Error::Malformed {
                        reason: format!(
                            "duplicate attribute {:?} at offset {offset}",
                            field.name
                        ),
                    });
                }
            }
            read_fields(reader, tree, current, def.fields)
        }
        OpShape::AttrFlag { name } => {
            let current = ctx.require_current(op, offset)?;
            if tree.has_void(current, name) {
                return Err(Error::Malformed {
                    reason: format!("duplicate flag {name:?} at offset {offset}"),
                });
            }
            tree.add_leaf(current, name, LeafValue::Void);
            Ok(())
        }
        OpShape::AttrNode { node } => {
            let current = ctx.require_current(op, offset)?;
            let node = tree.add_node(current, node);
            read_fields(reader, tree, node, def.fields)
        }
        OpShape::Spline => {
            let current = ctx.require_current(op, offset)?;
            let spline = tree.add_node(current, opcode::NODE_SPLINE);
            let count = read_count(reader, "spline points")?;
            for _ in 0..count {
                let point = tree.add_node(spline, opcode::NODE_POINT);
                tree.add_leaf(point, "X", LeafValue::Single(reader.read_single()?));
                tree.add_leaf(point, "Y", LeafValue::Single(reader.read_single()?));
                tree.add_leaf(point, "Z", LeafValue::Single(reader.read_single()?));
            }
            Ok(())
        }
        OpShape::OpenLock => {
            let current = ctx.require_current(op, offset)?;
            let lock = tree.add_node(current, opcode::NODE_LOCK);
            ctx.scopes.push(lock);
            Ok(())
        }
        OpShape::CloseLock => {
            if ctx.scopes.len() <= 1 {
                return Err(Error::ScopeMismatch { offset });
            }
            let lock = ctx.scopes.pop().expect("checked above");
            // attributes after a close re-target the object owning the lock
            ctx.current = tree.parent(lock);
            Ok(())
        }
        OpShape::Marker { node } => {
            tree.add_node(ctx.root(), node);
            Ok(())
        }
    }
}

fn read_fields(
    reader: &mut BinaryReader,
    tree: &mut Tree,
    node: NodeId,
    fields: &[opcode::FieldDef],
) -> Result<()> {
    for field in fields {
        let value = match field.ty {
            opcode::FieldTy::Byte => LeafValue::Byte(reader.read_u8()?),
            opcode::FieldTy::Int32 => LeafValue::Int32(reader.read_i32()?),
            opcode::FieldTy::Single => LeafValue::Single(reader.read_single()?),
            opcode::FieldTy::StrZ => LeafValue::str(reader.read_string_z()?),
        };
        tree.add_leaf(node, field.name, value);
    }
    Ok(())
}

fn read_count(reader: &mut BinaryReader, what: &str) -> Result<i32> {
    let offset = reader.position();
    let count = reader.read_i32()?;
    if !(0..=MAX_RECORDS).contains(&count) {
        return Err(Error::Malformed {
            reason: format!("implausible {what} count {count} at offset {offset}"),
        });
    }
    Ok(count)
}

/// Run one trailing-section reader at its offset. A failure removes the
/// partially built section node and is reported, never propagated: malformed
/// optional sections must not prevent loading the world data itself.
fn decode_section(
    tree: &mut Tree,
    data: &[u8],
    offset: i32,
    name: &'static str,
    read: fn(&mut BinaryReader, &mut Tree, NodeId) -> Result<()>,
) {
    let mut reader = BinaryReader::new(data);
    reader.set_position(offset as usize);
    let node = tree.add_node(tree.root(), name);
    if let Err(source) = read(&mut reader, tree, node) {
        let err = Error::SectionDecode {
            section: name,
            source: Box::new(source),
        };
        warn!(section = name, error = %err, "skipping section");
        tree.remove_node(node);
    }
}

fn read_textures(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    let count = read_count(reader, "texture")?;
    for _ in 0..count {
        let node = tree.add_node(section, "Texture");
        tree.add_leaf(node, "Flags A", LeafValue::Byte(reader.read_u8()?));
        tree.add_leaf(node, "Flags B", LeafValue::Byte(reader.read_u8()?));
        let name = reader.read_string_b()?;
        tree.add_leaf(node, "Name", LeafValue::str_max(name, u8::MAX as u32));
    }
    Ok(())
}

fn read_sounds(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    const FIELDS: [&str; 5] = ["Effect ID", "Volume", "Min Distance", "Max Distance", "Flags"];
    let count = read_count(reader, "sound effect")?;
    for _ in 0..count {
        let node = tree.add_node(section, "Sound");
        for name in FIELDS {
            tree.add_leaf(node, name, LeafValue::Int32(reader.read_i32()?));
        }
    }
    Ok(())
}

fn read_definitions(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    let count = read_count(reader, "object definition")?;
    for _ in 0..count {
        let offset = reader.position();
        let size = reader.read_i32()?;
        if size < 0 {
            return Err(Error::Malformed {
                reason: format!("negative definition size {size} at offset {offset}"),
            });
        }
        let blob = reader.read_bytes(size as usize)?.to_vec();
        let node = tree.add_node(section, "Definition");
        tree.add_leaf(node, "Data", LeafValue::Bytes(blob));
    }
    Ok(())
}

fn read_env_fx(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    let count = read_count(reader, "environment fx")?;
    for _ in 0..count {
        let value = reader.read_i32()?;
        tree.add_leaf(section, "FX", LeafValue::Int32(value));
    }
    Ok(())
}

fn read_scenarios(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    let count = read_count(reader, "scenario")?;
    for _ in 0..count {
        let node = tree.add_node(section, "Entry");
        tree.add_leaf(node, "Index", LeafValue::Int32(reader.read_i32()?));
        let name = reader.read_string_r32z()?;
        tree.add_leaf(node, "Name", LeafValue::str(name));
    }
    Ok(())
}

fn read_includes(reader: &mut BinaryReader, tree: &mut Tree, section: NodeId) -> Result<()> {
    let count = read_count(reader, "include file")?;
    for _ in 0..count {
        let node = tree.add_node(section, "Include");
        let name = reader.read_string_r32()?;
        tree.add_leaf(node, "Name", LeafValue::str(name));
    }
    Ok(())
}
