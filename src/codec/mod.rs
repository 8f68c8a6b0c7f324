pub mod reader;
pub mod writer;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;

/// IEEE-754 single stored as its raw 32-bit pattern.
///
/// World files must round-trip bit-exactly, including NaN payloads, the
/// infinities and negative zero, so the codec never passes floats through
/// arithmetic. It carries the pattern and converts only at the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Single(pub u32);

impl Single {
    pub fn from_f32(v: f32) -> Self {
        Single(v.to_bits())
    }

    pub fn to_f32(self) -> f32 {
        f32::from_bits(self.0)
    }
}

impl From<f32> for Single {
    fn from(v: f32) -> Self {
        Single::from_f32(v)
    }
}
