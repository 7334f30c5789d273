//! MRC/CCP4 volume files.
//!
//! Reads modes 0 (i8), 1 (i16), 2 (f32) and 6 (u16) in either byte order,
//! detected from the MACHST stamp, and reorders the stored column/row/section
//! layout into `[x, y, z]` using MAPC/MAPR/MAPS. Writes mode 2, little-endian,
//! with the standard axis order.

use crate::core::io::traits::StructureFile;
use crate::core::models::volume::Volume;
use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use nalgebra::Vector3;
use ndarray::Array3;
use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

const HEADER_SIZE: usize = 1024;
const MAP_MAGIC: &[u8; 4] = b"MAP ";

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid MRC file: {0}")]
    InvalidFormat(String),
    #[error("Unsupported MRC data mode {0}")]
    UnsupportedMode(i32),
}

/// A volume together with the physical position of its first voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct MrcMap {
    pub volume: Volume,
    pub origin: Vector3<f64>,
}

struct Header {
    dims: [usize; 3],
    mode: i32,
    axis_map: [usize; 3],
    extended_size: usize,
    origin: [f32; 3],
}

fn parse_header<B: ByteOrder>(header: &[u8]) -> Result<Header, MrcError> {
    let word = |index: usize| B::read_i32(&header[index * 4..index * 4 + 4]);
    let float = |index: usize| B::read_f32(&header[index * 4..index * 4 + 4]);

    let (nc, nr, ns) = (word(0), word(1), word(2));
    if nc <= 0 || nr <= 0 || ns <= 0 {
        return Err(MrcError::InvalidFormat(format!(
            "non-positive grid dimensions: NC={nc}, NR={nr}, NS={ns}"
        )));
    }
    let mode = word(3);
    if !matches!(mode, 0 | 1 | 2 | 6) {
        return Err(MrcError::UnsupportedMode(mode));
    }

    let (mapc, mapr, maps) = (word(16), word(17), word(18));
    let valid_axis = |a: i32| (1..=3).contains(&a);
    if !(valid_axis(mapc) && valid_axis(mapr) && valid_axis(maps))
        || mapc == mapr
        || mapc == maps
        || mapr == maps
    {
        return Err(MrcError::InvalidFormat(format!(
            "invalid axis mapping: MAPC={mapc}, MAPR={mapr}, MAPS={maps}"
        )));
    }

    let extended = word(23);
    if extended < 0 {
        return Err(MrcError::InvalidFormat(format!(
            "negative extended header size: {extended}"
        )));
    }

    Ok(Header {
        dims: [nc as usize, nr as usize, ns as usize],
        mode,
        axis_map: [mapc as usize - 1, mapr as usize - 1, maps as usize - 1],
        extended_size: extended as usize,
        origin: [float(49), float(50), float(51)],
    })
}

fn read_values<B: ByteOrder>(data: &[u8], mode: i32, count: usize) -> Result<Vec<f32>, MrcError> {
    let width = match mode {
        0 => 1,
        1 | 6 => 2,
        2 => 4,
        _ => return Err(MrcError::UnsupportedMode(mode)),
    };
    let needed = count.checked_mul(width).ok_or_else(|| {
        MrcError::InvalidFormat(format!("{count} voxels of mode {mode} overflow the address space"))
    })?;
    if data.len() < needed {
        return Err(MrcError::InvalidFormat(format!(
            "not enough data: need {needed} bytes for {count} voxels (mode {mode}), got {}",
            data.len()
        )));
    }
    let chunks = data[..needed].chunks_exact(width);
    Ok(match mode {
        0 => chunks.map(|b| b[0] as i8 as f32).collect(),
        1 => chunks.map(|b| B::read_i16(b) as f32).collect(),
        6 => chunks.map(|b| B::read_u16(b) as f32).collect(),
        _ => chunks.map(B::read_f32).collect(),
    })
}

/// MACHST stamp: `0x44` little-endian, `0x11` big-endian. Unknown stamps fall
/// back to whichever byte order yields a supported mode.
fn is_little_endian(header: &[u8]) -> Result<bool, MrcError> {
    match header[212] {
        0x44 => Ok(true),
        0x11 => Ok(false),
        stamp => {
            let supported = |m: i32| matches!(m, 0 | 1 | 2 | 6);
            if supported(LittleEndian::read_i32(&header[12..16])) {
                Ok(true)
            } else if supported(BigEndian::read_i32(&header[12..16])) {
                Ok(false)
            } else {
                Err(MrcError::InvalidFormat(format!(
                    "cannot determine byte order from MACHST {stamp:#x}"
                )))
            }
        }
    }
}

fn decode<B: ByteOrder>(bytes: &[u8]) -> Result<MrcMap, MrcError> {
    let header = parse_header::<B>(&bytes[..HEADER_SIZE])?;
    let [nc, nr, ns] = header.dims;
    let data_start = HEADER_SIZE + header.extended_size;
    let payload = bytes.get(data_start..).ok_or_else(|| {
        MrcError::InvalidFormat(format!("extended header runs past end of file ({data_start} bytes)"))
    })?;
    let count = nc
        .checked_mul(nr)
        .and_then(|n| n.checked_mul(ns))
        .ok_or_else(|| {
            MrcError::InvalidFormat(format!("grid of {nc}x{nr}x{ns} voxels is too large"))
        })?;
    let flat = read_values::<B>(payload, header.mode, count)?;

    let mut shape = [0usize; 3];
    for (file_axis, &spatial) in header.axis_map.iter().enumerate() {
        shape[spatial] = header.dims[file_axis];
    }
    let mut data = Array3::<f32>::zeros((shape[0], shape[1], shape[2]));
    // Columns vary fastest, then rows, then sections.
    for s in 0..ns {
        for r in 0..nr {
            let row_start = (s * nr + r) * nc;
            for c in 0..nc {
                let mut xyz = [0usize; 3];
                xyz[header.axis_map[0]] = c;
                xyz[header.axis_map[1]] = r;
                xyz[header.axis_map[2]] = s;
                data[xyz] = flat[row_start + c];
            }
        }
    }

    let [ox, oy, oz] = header.origin;
    Ok(MrcMap {
        volume: Volume::from_array(data),
        origin: Vector3::new(ox as f64, oy as f64, oz as f64),
    })
}

pub struct MrcFile;

impl MrcFile {
    /// Parses a complete MRC file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<MrcMap, MrcError> {
        if bytes.len() < HEADER_SIZE {
            return Err(MrcError::InvalidFormat(format!(
                "file too small for MRC header: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[208..212] != MAP_MAGIC {
            return Err(MrcError::InvalidFormat(
                "missing MAP stamp at byte 208".to_string(),
            ));
        }
        if is_little_endian(bytes)? {
            decode::<LittleEndian>(bytes)
        } else {
            decode::<BigEndian>(bytes)
        }
    }
}

impl StructureFile for MrcFile {
    type Data = MrcMap;
    type Error = MrcError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Data, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    fn write_to(data: &Self::Data, writer: &mut impl Write) -> Result<(), Self::Error> {
        let [nx, ny, nz] = data.volume.dims();
        let values = data.volume.data();
        let count = values.len().max(1) as f64;
        let (min, max, sum) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(lo, hi, sum), &v| (lo.min(v), hi.max(v), sum + v as f64),
        );
        let mean = sum / count;
        let rms = (values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / count)
            .sqrt();
        let (min, max) = if values.is_empty() { (0.0, 0.0) } else { (min, max) };

        let mut header = Vec::with_capacity(HEADER_SIZE);
        for n in [nx, ny, nz] {
            header.write_i32::<LittleEndian>(n as i32)?;
        }
        header.write_i32::<LittleEndian>(2)?;
        for _ in 0..3 {
            header.write_i32::<LittleEndian>(0)?;
        }
        for n in [nx, ny, nz] {
            header.write_i32::<LittleEndian>(n as i32)?;
        }
        // One ångström per voxel.
        for n in [nx, ny, nz] {
            header.write_f32::<LittleEndian>(n as f32)?;
        }
        for _ in 0..3 {
            header.write_f32::<LittleEndian>(90.0)?;
        }
        for axis in [1, 2, 3] {
            header.write_i32::<LittleEndian>(axis)?;
        }
        header.write_f32::<LittleEndian>(min)?;
        header.write_f32::<LittleEndian>(max)?;
        header.write_f32::<LittleEndian>(mean as f32)?;
        header.write_i32::<LittleEndian>(1)?;
        header.write_i32::<LittleEndian>(0)?;
        header.resize(196, 0);
        for o in [data.origin.x, data.origin.y, data.origin.z] {
            header.write_f32::<LittleEndian>(o as f32)?;
        }
        header.extend_from_slice(MAP_MAGIC);
        header.extend_from_slice(&[0x44, 0x44, 0x00, 0x00]);
        header.write_f32::<LittleEndian>(rms as f32)?;
        header.resize(HEADER_SIZE, 0);
        writer.write_all(&header)?;

        let mut body = Vec::with_capacity(values.len() * 4);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    body.write_f32::<LittleEndian>(values[[x, y, z]])?;
                }
            }
        }
        writer.write_all(&body)?;
        Ok(())
    }
}
