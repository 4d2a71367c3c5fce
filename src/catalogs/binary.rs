//! Fixed-size binary star catalogs.
//!
//! Two layouts are understood, both little-endian:
//!
//! * The observational catalog: a `u32` record count followed by 25-byte
//!   records of `u32 hip, u32 hd, f32 ra_deg, f32 dec_deg, f32 parallax_mas,
//!   i16 app_mag×256, u16 packed class, u8 parallax_error`. An HD number of
//!   `0xFFFFFFFF` means the star has none.
//! * The pre-converted `CELSTARS` catalog: magic, `u16` version, `u32` count,
//!   then 20-byte records of `u32 catalog number, f32 x, f32 y, f32 z,
//!   i16 abs_mag×256, u16 packed class`.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::CatalogEntry;
use crate::error::{LoadError, Result};
use crate::star::{StarRecord, INVALID_CATALOG_NUMBER};
use crate::stellarclass::StellarClass;
use crate::Vector3;

pub const OBSERVATION_RECORD_SIZE: usize = 25;

pub const CELSTARS_MAGIC: &[u8; 8] = b"CELSTARS";
pub const CELSTARS_VERSION: u16 = 0x0100;
pub const CELSTARS_HEADER_SIZE: usize = 14;
pub const CELSTARS_RECORD_SIZE: usize = 20;

/// Magnitudes are stored as fixed point with 8 fractional bits.
pub const MAGNITUDE_SCALE: f32 = 256.0;

fn mag_from_disk(raw: i16) -> f32 {
    raw as f32 / MAGNITUDE_SCALE
}

fn mag_to_disk(mag: f32) -> i16 {
    (mag * MAGNITUDE_SCALE) as i16
}

fn spectral_class(catalog_number: u32, packed: u16) -> Result<StellarClass> {
    StellarClass::from_packed(packed).ok_or(LoadError::BadSpectralClass {
        catalog_number,
        packed,
    })
}

/// Split `body` into `count` records of `size` bytes.
fn records(body: &[u8], count: usize, size: usize) -> Result<std::slice::ChunksExact<'_, u8>> {
    let available = body.len() / size;
    if available < count {
        return Err(LoadError::Truncated {
            record: available,
            expected: size,
            actual: body.len() % size,
        });
    }
    Ok(body[..count * size].chunks_exact(size))
}

fn count_prefix(bytes: &[u8], offset: usize) -> Result<usize> {
    if bytes.len() < offset + 4 {
        return Err(LoadError::Truncated {
            record: 0,
            expected: offset + 4,
            actual: bytes.len(),
        });
    }
    Ok(LittleEndian::read_u32(&bytes[offset..offset + 4]) as usize)
}

// ── Observational catalog ───────────────────────────────────────────────────

/// Parse a complete observational catalog.
///
/// Every record must be present and carry a valid spectral class; on error
/// nothing is returned.
pub fn read_observations(bytes: &[u8]) -> Result<Vec<CatalogEntry>> {
    let count = count_prefix(bytes, 0)?;
    records(&bytes[4..], count, OBSERVATION_RECORD_SIZE)?
        .map(|rec| {
            let catalog_number = LittleEndian::read_u32(&rec[0..4]);
            let hd = LittleEndian::read_u32(&rec[4..8]);
            Ok(CatalogEntry {
                catalog_number,
                hd_number: (hd != INVALID_CATALOG_NUMBER).then_some(hd),
                ra_deg: LittleEndian::read_f32(&rec[8..12]),
                dec_deg: LittleEndian::read_f32(&rec[12..16]),
                parallax_mas: LittleEndian::read_f32(&rec[16..20]),
                apparent_magnitude: mag_from_disk(LittleEndian::read_i16(&rec[20..22])),
                spectral_class: spectral_class(catalog_number, LittleEndian::read_u16(&rec[22..24]))?,
                parallax_error: rec[24],
            })
        })
        .collect()
}

/// Write entries in the observational catalog layout.
pub fn write_observations<W: Write>(entries: &[CatalogEntry], mut writer: W) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(entries.len() as u32)?;
    for e in entries {
        writer.write_u32::<LittleEndian>(e.catalog_number)?;
        writer.write_u32::<LittleEndian>(e.hd_number.unwrap_or(INVALID_CATALOG_NUMBER))?;
        writer.write_f32::<LittleEndian>(e.ra_deg)?;
        writer.write_f32::<LittleEndian>(e.dec_deg)?;
        writer.write_f32::<LittleEndian>(e.parallax_mas)?;
        writer.write_i16::<LittleEndian>(mag_to_disk(e.apparent_magnitude))?;
        writer.write_u16::<LittleEndian>(e.spectral_class.packed())?;
        writer.write_u8(e.parallax_error)?;
    }
    Ok(())
}

// ── CELSTARS ────────────────────────────────────────────────────────────────

pub fn is_celstars(bytes: &[u8]) -> bool {
    bytes.starts_with(CELSTARS_MAGIC)
}

/// Parse a pre-converted `CELSTARS` catalog.
pub fn read_celstars(bytes: &[u8]) -> Result<Vec<StarRecord>> {
    if !is_celstars(bytes) {
        return Err(LoadError::BadHeader("missing CELSTARS magic".to_string()));
    }
    if bytes.len() < CELSTARS_HEADER_SIZE {
        return Err(LoadError::Truncated {
            record: 0,
            expected: CELSTARS_HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let version = LittleEndian::read_u16(&bytes[8..10]);
    if version != CELSTARS_VERSION {
        return Err(LoadError::BadHeader(format!(
            "unsupported CELSTARS version {version:#06x}"
        )));
    }

    let count = count_prefix(bytes, 10)?;
    records(&bytes[CELSTARS_HEADER_SIZE..], count, CELSTARS_RECORD_SIZE)?
        .map(|rec| {
            let catalog_number = LittleEndian::read_u32(&rec[0..4]);
            let position = Vector3::new(
                LittleEndian::read_f32(&rec[4..8]),
                LittleEndian::read_f32(&rec[8..12]),
                LittleEndian::read_f32(&rec[12..16]),
            );
            Ok(StarRecord::new(
                catalog_number,
                position,
                mag_from_disk(LittleEndian::read_i16(&rec[16..18])),
                spectral_class(catalog_number, LittleEndian::read_u16(&rec[18..20]))?,
            ))
        })
        .collect()
}

pub fn write_celstars<W: Write>(stars: &[StarRecord], mut writer: W) -> std::io::Result<()> {
    writer.write_all(CELSTARS_MAGIC)?;
    writer.write_u16::<LittleEndian>(CELSTARS_VERSION)?;
    writer.write_u32::<LittleEndian>(stars.len() as u32)?;
    for s in stars {
        writer.write_u32::<LittleEndian>(s.catalog_number)?;
        for c in s.position {
            writer.write_f32::<LittleEndian>(c)?;
        }
        writer.write_i16::<LittleEndian>(mag_to_disk(s.absolute_magnitude))?;
        writer.write_u16::<LittleEndian>(s.spectral_class.packed())?;
    }
    Ok(())
}
