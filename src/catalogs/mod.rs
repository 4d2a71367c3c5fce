//! Raw star catalogs: the binary observation and `CELSTARS` formats, text
//! catalogs and Hipparcos.

pub mod binary;
pub mod hipparcos;
pub mod stc;

use crate::astro;
use crate::star::StarRecord;
use crate::stellarclass::StellarClass;

/// A star as observed: equatorial coordinates, parallax and apparent
/// magnitude. Converted to a [`StarRecord`] on load.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub catalog_number: u32,
    pub hd_number: Option<u32>,
    pub ra_deg: f32,
    pub dec_deg: f32,
    pub parallax_mas: f32,
    pub apparent_magnitude: f32,
    pub spectral_class: StellarClass,
    /// Relative parallax error in percent, saturated at 255.
    pub parallax_error: u8,
}

impl CatalogEntry {
    /// Distance in light-years with the parallax clamped to `parallax_floor_mas`.
    pub fn distance_ly(&self, parallax_floor_mas: f32) -> f32 {
        astro::parallax_to_light_years(self.parallax_mas.max(parallax_floor_mas))
    }

    pub fn to_record(&self, parallax_floor_mas: f32) -> StarRecord {
        let distance = self.distance_ly(parallax_floor_mas);
        StarRecord::new(
            self.catalog_number,
            astro::equatorial_to_cartesian(self.ra_deg as f64, self.dec_deg as f64, distance as f64),
            astro::app_to_abs_mag(self.apparent_magnitude, distance),
            self.spectral_class,
        )
    }
}
