//! Fixed-layout terrain grid codec, the structurally simpler peer of the
//! world chunk stream. One header, then three parallel per-cell channels:
//! 32-bit heights, a run-length-encoded triangle-type byte, and a 3-byte
//! light color.

use crate::codec::{BinaryReader, BinaryWriter, Single};
use crate::error::{Error, Result};

/// `"GTI\0"` little-endian.
pub const TERRAIN_MAGIC: i32 = 0x0049_5447;

const TEXTURE_NAME_LEN: usize = 32;
const MAX_CELLS: usize = 1 << 24;

/// In-memory terrain grid. The triangle-type channel is expanded to one byte
/// per cell on load; the on-disk RLE form is an encoding detail.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainGrid {
    pub width: i32,
    pub height: i32,
    /// Uniform cell spacing.
    pub stretch: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub texture: String,
    /// Row-major, `width * height` entries.
    pub heights: Vec<f32>,
    /// One triangle-type byte per cell.
    pub triangle_types: Vec<u8>,
    /// Three bytes (RGB) per cell.
    pub light: Vec<u8>,
}

impl TerrainGrid {
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Min/max of the in-memory height array. Written to the header on save
    /// instead of whatever the loaded file claimed.
    pub fn height_range(&self) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &h in &self.heights {
            min = min.min(h);
            max = max.max(h);
        }
        if self.heights.is_empty() {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let magic = reader.read_i32()?;
        if magic != TERRAIN_MAGIC {
            return Err(Error::MalformedHeader {
                reason: format!("bad terrain magic {magic:#010x}, expected {TERRAIN_MAGIC:#010x}"),
            });
        }
        let width = reader.read_i32()?;
        let height = reader.read_i32()?;
        if width < 0 || height < 0 {
            return Err(Error::MalformedHeader {
                reason: format!("negative terrain dimensions {width}x{height}"),
            });
        }
        let cells = width as usize * height as usize;
        if cells > MAX_CELLS {
            return Err(Error::MalformedHeader {
                reason: format!("implausible terrain size {width}x{height}"),
            });
        }
        let stretch = reader.read_f32()?;
        let offset_x = reader.read_f32()?;
        let offset_y = reader.read_f32()?;
        // min/max height are recomputed on save, not carried around
        reader.skip(8)?;
        let texture = reader.read_string_fixed(TEXTURE_NAME_LEN)?;

        let mut heights = Vec::with_capacity(cells);
        for _ in 0..cells {
            heights.push(reader.read_single()?.to_f32());
        }
        let triangle_types = read_rle(&mut reader, cells)?;
        let light = reader.read_bytes(cells * 3)?.to_vec();

        Ok(Self {
            width,
            height,
            stretch,
            offset_x,
            offset_y,
            texture,
            heights,
            triangle_types,
            light,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let cells = self.cells();
        if self.heights.len() != cells
            || self.triangle_types.len() != cells
            || self.light.len() != cells * 3
        {
            return Err(Error::Malformed {
                reason: format!(
                    "channel lengths {}/{}/{} do not match {} cells",
                    self.heights.len(),
                    self.triangle_types.len(),
                    self.light.len(),
                    cells
                ),
            });
        }

        let mut w = BinaryWriter::with_capacity(64 + cells * 8);
        w.write_i32(TERRAIN_MAGIC);
        w.write_i32(self.width);
        w.write_i32(self.height);
        w.write_f32(self.stretch);
        w.write_f32(self.offset_x);
        w.write_f32(self.offset_y);
        let (min, max) = self.height_range();
        w.write_f32(min);
        w.write_f32(max);
        w.write_string_fixed(&self.texture, TEXTURE_NAME_LEN)?;

        for &h in &self.heights {
            w.write_single(Single::from_f32(h));
        }
        write_rle(&mut w, &self.triangle_types);
        w.write_bytes(&self.light);
        Ok(w.into_vec())
    }
}

/// `(run, value)` byte pairs until `cells` entries are produced. A zero run
/// or a run overshooting the cell count is malformed.
fn read_rle(reader: &mut BinaryReader, cells: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(cells);
    while out.len() < cells {
        let offset = reader.position();
        let run = reader.read_u8()? as usize;
        let value = reader.read_u8()?;
        if run == 0 {
            return Err(Error::Malformed {
                reason: format!("zero-length RLE run at offset {offset}"),
            });
        }
        if out.len() + run > cells {
            return Err(Error::Malformed {
                reason: format!("RLE run at offset {offset} overshoots {cells} cells"),
            });
        }
        out.extend(std::iter::repeat(value).take(run));
    }
    Ok(out)
}

fn write_rle(w: &mut BinaryWriter, values: &[u8]) {
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        let mut run = 1usize;
        while run < 255 && i + run < values.len() && values[i + run] == value {
            run += 1;
        }
        w.write_u8(run as u8);
        w.write_u8(value);
        i += run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TerrainGrid {
        TerrainGrid {
            width: 4,
            height: 3,
            stretch: 2.5,
            offset_x: -16.0,
            offset_y: 8.0,
            texture: "grass01".into(),
            heights: (0..12).map(|i| i as f32 * 0.5 - 1.0).collect(),
            triangle_types: vec![0, 0, 0, 1, 1, 2, 2, 2, 2, 2, 0, 3],
            light: (0..36).map(|i| i as u8).collect(),
        }
    }

    #[test]
    fn test_roundtrip() {
        let grid = sample();
        let bytes = grid.encode().unwrap();
        let back = TerrainGrid::decode(&bytes).unwrap();
        assert_eq!(grid, back);
    }

    #[test]
    fn test_min_max_recomputed() {
        let grid = sample();
        let bytes = grid.encode().unwrap();
        // min/max live at header offsets 24 and 28
        let min = f32::from_le_bytes(bytes[24..28].try_into().unwrap());
        let max = f32::from_le_bytes(bytes[28..32].try_into().unwrap());
        assert_eq!(min, -1.0);
        assert_eq!(max, 4.5);
    }

    #[test]
    fn test_rle_long_run() {
        let mut grid = sample();
        grid.width = 20;
        grid.height = 20;
        grid.heights = vec![0.0; 400];
        grid.triangle_types = vec![7; 400]; // forces runs beyond one 255 pair
        grid.light = vec![0; 1200];

        let bytes = grid.encode().unwrap();
        let back = TerrainGrid::decode(&bytes).unwrap();
        assert_eq!(back.triangle_types, grid.triangle_types);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            TerrainGrid::decode(&bytes),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_zero_run_is_malformed() {
        let grid = sample();
        let mut bytes = grid.encode().unwrap();
        // first RLE pair sits right after the 64-byte header and height channel
        let rle_start = 64 + grid.cells() * 4;
        bytes[rle_start] = 0;
        assert!(matches!(
            TerrainGrid::decode(&bytes),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_truncated_heights() {
        let bytes = sample().encode().unwrap();
        assert!(matches!(
            TerrainGrid::decode(&bytes[..50]),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_texture_name_too_long() {
        let mut grid = sample();
        grid.texture = "x".repeat(40);
        assert!(matches!(
            grid.encode(),
            Err(Error::StringTooLong { len: 40, max: 32 })
        ));
    }
}
