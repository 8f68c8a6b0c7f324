use super::Single;
use crate::error::{Error, Result};

/// Append-only little-endian writer with support for backpatching
/// previously written integers (block lengths, the header pointer table).
pub struct BinaryWriter {
    data: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current append position; capture this before a placeholder write to
    /// patch it later.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_i32(v as i32);
    }

    pub fn write_single(&mut self, v: Single) {
        self.write_u32(v.0);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_single(Single::from_f32(v));
    }

    /// Overwrite the 4 bytes at `offset` with `v`, leaving everything else
    /// untouched. `offset` must have been obtained from `position()` before
    /// writing a placeholder.
    pub fn patch_i32(&mut self, offset: usize, v: i32) -> Result<()> {
        if offset + 4 > self.data.len() {
            return Err(Error::PatchOutOfRange {
                offset,
                len: self.data.len(),
            });
        }
        self.data[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Write exactly `n` bytes: the string, NUL-padded. Fails without
    /// writing anything when the string does not fit or contains a NUL
    /// (a reader stops at the first NUL, so the value would not survive).
    pub fn write_string_fixed(&mut self, s: &str, n: usize) -> Result<()> {
        Self::reject_nul(s)?;
        if s.len() > n {
            return Err(Error::StringTooLong {
                len: s.len(),
                max: n,
            });
        }
        self.data.extend_from_slice(s.as_bytes());
        self.data.extend(std::iter::repeat(0).take(n - s.len()));
        Ok(())
    }

    /// Write the string bytes followed by a NUL terminator. An interior NUL
    /// would become the terminator on read and shift every following field,
    /// so it fails the write instead; the buffer is left untouched.
    pub fn write_string_z(&mut self, s: &str) -> Result<()> {
        Self::reject_nul(s)?;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        Ok(())
    }

    /// Write one length byte then the string bytes.
    pub fn write_string_b(&mut self, s: &str) -> Result<()> {
        if s.len() > u8::MAX as usize {
            return Err(Error::StringTooLong {
                len: s.len(),
                max: u8::MAX as usize,
            });
        }
        self.data.push(s.len() as u8);
        self.data.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Region convention A: `i32` region size including a trailing NUL.
    pub fn write_string_r32z(&mut self, s: &str) {
        self.write_i32(s.len() as i32 + 1);
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
    }

    /// Region convention B: `i32` byte count, no terminator.
    pub fn write_string_r32(&mut self, s: &str) {
        self.write_i32(s.len() as i32);
        self.data.extend_from_slice(s.as_bytes());
    }

    fn reject_nul(s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(Error::NulInString { value: s.into() });
        }
        Ok(())
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl From<BinaryWriter> for Vec<u8> {
    fn from(writer: BinaryWriter) -> Self {
        writer.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::reader::BinaryReader;

    #[test]
    fn test_roundtrip_primitives() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0x42);
        writer.write_i32(-7);
        writer.write_single(Single(0xFF80_0000)); // -inf

        let data = writer.into_vec();
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_single().unwrap(), Single(0xFF80_0000));
    }

    #[test]
    fn test_single_bit_patterns() {
        let patterns = [
            0x7FC0_0001u32, // NaN with payload
            0x7F80_0000,    // +inf
            0xFF80_0000,    // -inf
            0x8000_0000,    // -0.0
            0x3F80_0000,    // 1.0
        ];
        for &bits in &patterns {
            let mut writer = BinaryWriter::new();
            writer.write_single(Single(bits));
            let data = writer.into_vec();
            let mut reader = BinaryReader::new(&data);
            assert_eq!(reader.read_single().unwrap().0, bits);
        }
    }

    #[test]
    fn test_patch_i32() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0xAA);
        let spot = writer.position();
        writer.write_i32(0);
        writer.write_bytes(&[1, 2, 3, 4, 5]);

        let before = writer.as_slice().to_vec();
        writer.patch_i32(spot, 0x11223344).unwrap();
        let after = writer.into_vec();

        // only the 4 placeholder bytes changed
        assert_eq!(after[0], before[0]);
        assert_eq!(&after[1..5], &0x11223344i32.to_le_bytes());
        assert_eq!(&after[5..], &before[5..]);
    }

    #[test]
    fn test_patch_out_of_range() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0);
        assert!(writer.patch_i32(0, 1).is_err());
    }

    #[test]
    fn test_fixed_string_overflow_leaves_no_partial_write() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0x55);
        let err = writer.write_string_fixed("toolongforthis", 8);
        assert!(matches!(err, Err(Error::StringTooLong { len: 14, max: 8 })));
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_fixed_string_padding() {
        let mut writer = BinaryWriter::new();
        writer.write_string_fixed("ab", 4).unwrap();
        assert_eq!(writer.as_slice(), &[b'a', b'b', 0, 0]);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let mut writer = BinaryWriter::new();
        writer.write_u8(0x01);
        assert!(matches!(
            writer.write_string_z("a\0b"),
            Err(Error::NulInString { .. })
        ));
        assert!(matches!(
            writer.write_string_fixed("a\0b", 8),
            Err(Error::NulInString { .. })
        ));
        // nothing was written by the failed attempts
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_string_roundtrips() {
        let mut writer = BinaryWriter::new();
        writer.write_string_z("alpha").unwrap();
        writer.write_string_b("beta").unwrap();
        writer.write_string_r32z("gamma");
        writer.write_string_r32("delta");

        let data = writer.into_vec();
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_z().unwrap(), "alpha");
        assert_eq!(reader.read_string_b().unwrap(), "beta");
        assert_eq!(reader.read_string_r32z().unwrap(), "gamma");
        assert_eq!(reader.read_string_r32().unwrap(), "delta");
        assert!(!reader.has_more());
    }
}
