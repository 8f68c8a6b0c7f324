use super::Single;
use crate::error::{Error, Result};

/// Cursor-based little-endian reader over a borrowed byte buffer.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            });
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                wanted: n,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                wanted: 1,
            });
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    /// Read a single as its raw bit pattern.
    pub fn read_single(&mut self) -> Result<Single> {
        Ok(Single(self.read_u32()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.read_single()?.to_f32())
    }

    /// Read exactly `n` bytes; the value is the prefix before the first NUL
    /// (or all `n` bytes when none is present).
    pub fn read_string_fixed(&mut self, n: usize) -> Result<String> {
        let start = self.pos;
        let bytes = self.read_bytes(n)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(n);
        Self::to_string(&bytes[..end], start)
    }

    /// Read bytes until a NUL terminator (consumed, not returned).
    pub fn read_string_z(&mut self) -> Result<String> {
        let start = self.pos;
        let mut end = self.pos;
        loop {
            match self.data.get(end) {
                Some(0) => break,
                Some(_) => end += 1,
                None => {
                    return Err(Error::UnexpectedEof {
                        offset: self.pos,
                        wanted: end - self.pos + 1,
                    })
                }
            }
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end + 1;
        Self::to_string(bytes, start)
    }

    /// Read one length byte, then that many bytes.
    pub fn read_string_b(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let start = self.pos;
        let bytes = self.read_bytes(len)?;
        Self::to_string(bytes, start)
    }

    /// Region convention A: an `i32` region size that includes a trailing NUL.
    pub fn read_string_r32z(&mut self) -> Result<String> {
        let size = self.read_i32()?;
        if size < 1 {
            return Err(Error::Malformed {
                reason: format!("string region size {size} at offset {}", self.pos - 4),
            });
        }
        let start = self.pos;
        let bytes = self.read_bytes(size as usize)?;
        match bytes.last() {
            Some(0) => Self::to_string(&bytes[..bytes.len() - 1], start),
            _ => Err(Error::Malformed {
                reason: format!("string region at offset {start} is not NUL-terminated"),
            }),
        }
    }

    /// Region convention B: an `i32` byte count, no terminator.
    pub fn read_string_r32(&mut self) -> Result<String> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(Error::Malformed {
                reason: format!("string region size {size} at offset {}", self.pos - 4),
            });
        }
        let start = self.pos;
        let bytes = self.read_bytes(size as usize)?;
        Self::to_string(bytes, start)
    }

    fn to_string(bytes: &[u8], offset: usize) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidString { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_i32().unwrap(), 0x05040302);
        assert!(!reader.has_more());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(
            reader.read_i32(),
            Err(Error::UnexpectedEof { offset: 0, wanted: 4 })
        ));
        // a failed read must not advance the cursor
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_single_preserves_bits() {
        let nan = 0x7FC0_0001u32;
        let data = nan.to_le_bytes();
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_single().unwrap(), Single(nan));
    }

    #[test]
    fn test_read_string_fixed() {
        let data = [b'a', b'b', 0, 0, 0, 0, 0, 0];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_fixed(8).unwrap(), "ab");
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn test_read_string_z() {
        let data = [b'h', b'i', 0, b'x'];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_z().unwrap(), "hi");
        assert_eq!(reader.read_u8().unwrap(), b'x');
    }

    #[test]
    fn test_read_string_z_unterminated() {
        let data = [b'h', b'i'];
        let mut reader = BinaryReader::new(&data);
        assert!(reader.read_string_z().is_err());
    }

    #[test]
    fn test_read_string_b() {
        let data = [3, b'f', b'o', b'o'];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_b().unwrap(), "foo");
    }

    #[test]
    fn test_read_string_regions() {
        // convention A: size includes the trailing NUL
        let data = [4, 0, 0, 0, b'a', b'b', b'c', 0];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_r32z().unwrap(), "abc");

        // convention B: size is the byte count, no terminator
        let data = [3, 0, 0, 0, b'a', b'b', b'c'];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string_r32().unwrap(), "abc");
    }

    #[test]
    fn test_skip() {
        let data = [1, 2, 3];
        let mut reader = BinaryReader::new(&data);
        reader.skip(2).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert!(reader.skip(1).is_err());
    }
}
