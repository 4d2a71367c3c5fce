use rkyv::{Archive, Deserialize, Serialize};

use crate::astro;
use crate::stellarclass::StellarClass;
use crate::Vector3;

/// Catalog number used on disk to mark an absent identifier.
pub const INVALID_CATALOG_NUMBER: u32 = u32::MAX;

/// Largest catalog number that can come from HIP or packed Tycho numbering.
/// Numbers above it are assigned automatically to unnumbered text entries.
pub const MAX_TYCHO_CATALOG_NUMBER: u32 = 0xf000_0000;

/// Highest catalog number formatted as a HIP designation.
pub const MAX_HIPPARCOS_NUMBER: u32 = 999_999;

/// A star as stored by the database.
///
/// Records are plain values kept in one flat array. Once the database is
/// sealed their positions in that array never change.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct StarRecord {
    /// Canonical (HIP-derived) catalog number, unique within a database.
    pub catalog_number: u32,
    /// Cartesian position in light-years.
    pub position: [f32; 3],
    pub absolute_magnitude: f32,
    pub spectral_class: StellarClass,
}

impl StarRecord {
    pub fn new(
        catalog_number: u32,
        position: Vector3,
        absolute_magnitude: f32,
        spectral_class: StellarClass,
    ) -> Self {
        Self {
            catalog_number,
            position: position.into(),
            absolute_magnitude,
            spectral_class,
        }
    }

    pub fn position(&self) -> Vector3 {
        Vector3::from(self.position)
    }

    /// Apparent magnitude of the star as seen from `observer`.
    pub fn apparent_magnitude_from(&self, observer: &Vector3) -> f32 {
        astro::abs_to_app_mag(self.absolute_magnitude, (self.position() - observer).norm())
    }
}

/// Pack a Tycho identifier into a synthetic catalog number.
///
/// Returns `None` when a component is outside the ranges used by the
/// Tycho catalogs or the result would not fit into 32 bits.
pub fn tycho_catalog_number(tyc1: u32, tyc2: u32, tyc3: u32) -> Option<u32> {
    let tyc3_max = if tyc1 <= 2907 { 4 } else { 3 };
    if !(1..=9999).contains(&tyc1) || !(1..=99999).contains(&tyc2) || !(1..=tyc3_max).contains(&tyc3) {
        return None;
    }
    tyc3.checked_mul(1_000_000_000)?
        .checked_add(tyc2 * 10_000)?
        .checked_add(tyc1)
}

/// Split a packed Tycho catalog number back into its three components.
pub fn tycho_components(catalog_number: u32) -> (u32, u32, u32) {
    let tyc3 = catalog_number / 1_000_000_000;
    let rest = catalog_number % 1_000_000_000;
    (rest % 10_000, rest / 10_000, tyc3)
}
