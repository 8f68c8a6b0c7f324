//! World-Map Save Codec
//!
//! Decodes a header-indexed, opcode-tagged world save file into a generic
//! ordered tree of named nodes and typed leaves, and re-encodes that tree
//! byte-identically. The peer terrain grid format shares the same primitive
//! binary codec.

pub mod codec;
pub mod error;
pub mod terrain;
pub mod tree;
pub mod world;

pub use codec::{BinaryReader, BinaryWriter, Single};
pub use error::{Error, Result};
pub use terrain::{TerrainGrid, TERRAIN_MAGIC};
pub use tree::{Leaf, LeafValue, NodeId, Tree};
pub use world::{decode_world, encode_world, WORLD_MAGIC};
