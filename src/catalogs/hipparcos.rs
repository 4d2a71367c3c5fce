//! Ingestion of the Hipparcos new reduction (I/311, `hip2.dat`).
//!
//! The catalog can be downloaded from
//! <http://cdsarc.u-strasbg.fr/ftp/I/311/hip2.dat.gz>. It has no spectral
//! types, so a class is estimated from the B−V colour.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::CatalogEntry;
use crate::stellarclass::{LuminosityClass, SpectralClass, StellarClass};

/// A star from the Hipparcos catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct HipparcosStar {
    pub hip: u32,
    pub ra_rad: f64,
    pub dec_rad: f64,
    /// Parallax in milliarcseconds.
    pub plx: f64,
    pub e_plx: f64,
    pub hpmag: f32,
    pub b_v: f32,
}

impl HipparcosStar {
    /// Convert Hipparcos Hp magnitude and Johnson B−V colour
    /// to Johnson V using the standard 4th-order polynomial.
    ///
    /// Reference: ESA SP-1200, Volume 1, Table 1.3.5 (magnitude transformations).
    ///
    /// Valid for roughly -0.2 < (B−V) < 1.8.
    pub fn hp_to_v(&self) -> f32 {
        let b = self.b_v;
        let delta = 0.304 * b - 0.202 * b * b + 0.107 * b * b * b - 0.045 * b * b * b * b;
        self.hpmag - delta
    }

    /// Main-sequence spectral class with the same B−V colour.
    pub fn spectral_class(&self) -> StellarClass {
        const BOUNDS: [(f32, SpectralClass); 6] = [
            (-0.30, SpectralClass::O),
            (-0.02, SpectralClass::B),
            (0.30, SpectralClass::A),
            (0.58, SpectralClass::F),
            (0.81, SpectralClass::G),
            (1.40, SpectralClass::K),
        ];
        if !self.b_v.is_finite() {
            return StellarClass::default();
        }
        let class = BOUNDS
            .iter()
            .find(|&&(upper, _)| self.b_v < upper)
            .map(|&(_, class)| class)
            .unwrap_or(SpectralClass::M);
        StellarClass::normal(class, None, LuminosityClass::V)
    }

    /// Relative parallax error in percent, saturated to a byte.
    pub fn parallax_error(&self) -> u8 {
        if self.plx <= 0.0 {
            return u8::MAX;
        }
        (self.e_plx / self.plx * 100.0).round().clamp(0.0, 255.0) as u8
    }

    pub fn to_catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            catalog_number: self.hip,
            hd_number: None,
            ra_deg: self.ra_rad.to_degrees() as f32,
            dec_deg: self.dec_rad.to_degrees() as f32,
            parallax_mas: self.plx as f32,
            apparent_magnitude: self.hp_to_v(),
            spectral_class: self.spectral_class(),
            parallax_error: self.parallax_error(),
        }
    }
}

/// Parse a single Hipparcos catalog record.
fn parse_hipparcos_star(record: &str) -> Option<HipparcosStar> {
    if record.len() < 171 {
        return None;
    }

    // None also when a column boundary falls inside a multibyte character
    fn field<T: std::str::FromStr>(record: &str, columns: std::ops::Range<usize>) -> Option<T> {
        record.get(columns)?.trim().parse().ok()
    }

    Some(HipparcosStar {
        hip: field(record, 0..6)?,
        ra_rad: field(record, 15..28)?,
        dec_rad: field(record, 29..42)?,
        plx: field(record, 43..50)?,
        e_plx: field(record, 83..89)?,
        hpmag: field(record, 129..136)?,
        b_v: field(record, 152..158)?,
    })
}

/// Load the Hipparcos catalog from an in-memory string. Unparsable lines
/// are skipped.
pub fn load_hipparcos_catalog(data: &str) -> Vec<HipparcosStar> {
    data.lines().filter_map(parse_hipparcos_star).collect()
}

pub fn load_hipparcos_catalog_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<HipparcosStar>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading Hipparcos catalog {}", path.display()))?;
    let stars = load_hipparcos_catalog(&data);
    info!("Loaded {} Hipparcos entries from {}", stars.len(), path.display());
    Ok(stars)
}

/// Convert `hip2.dat` into the binary observation catalog format.
pub fn convert_to_binary<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> anyhow::Result<usize> {
    let entries: Vec<CatalogEntry> = load_hipparcos_catalog_from_file(input)?
        .iter()
        .map(HipparcosStar::to_catalog_entry)
        .collect();
    let output = output.as_ref();
    let file = std::fs::File::create(output)
        .with_context(|| format!("creating {}", output.display()))?;
    super::binary::write_observations(&entries, std::io::BufWriter::new(file))?;
    info!("Wrote {} stars to {}", entries.len(), output.display());
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fixed-width record with the fields at their I/311 columns.
    fn record(hip: u32, ra: f64, dec: f64, plx: f64, e_plx: f64, hp: f32, b_v: f32) -> String {
        let mut line = vec![b' '; 171];
        let mut put = |start: usize, end: usize, text: String| {
            let bytes = text.as_bytes();
            assert!(bytes.len() <= end - start);
            line[end - bytes.len()..end].copy_from_slice(bytes);
        };
        put(0, 6, hip.to_string());
        put(15, 28, format!("{ra:.10}"));
        put(29, 42, format!("{dec:.10}"));
        put(43, 50, format!("{plx:.2}"));
        put(83, 89, format!("{e_plx:.2}"));
        put(129, 136, format!("{hp:.4}"));
        put(152, 158, format!("{b_v:.3}"));
        put(165, 171, "0.000".to_string());
        String::from_utf8(line).unwrap()
    }

    #[test]
    fn parses_fixed_columns() {
        let data = format!(
            "{}\n{}\nshort line\n",
            record(32349, 1.7677953, -0.2917512, 379.21, 1.58, -1.0876, 0.009),
            record(91262, 4.8735599, 0.6769014, 130.23, 0.36, 0.0868, -0.001),
        );
        let stars = load_hipparcos_catalog(&data);
        assert_eq!(stars.len(), 2);
        assert_eq!(stars[0].hip, 32349);
        assert!((stars[0].plx - 379.21).abs() < 1e-9);

        let entry = stars[0].to_catalog_entry();
        assert!((entry.ra_deg - 101.287).abs() < 1e-2);
        assert!((entry.dec_deg + 16.716).abs() < 1e-2);
        assert_eq!(entry.parallax_error, 0);
        assert_eq!(entry.spectral_class.spectral_class(), Some(SpectralClass::A));
        assert_eq!(stars[1].spectral_class().spectral_class(), Some(SpectralClass::A));
    }

    #[test]
    fn multibyte_text_on_a_column_boundary_skips_the_line() {
        let good = record(32349, 1.7677953, -0.2917512, 379.21, 1.58, -1.0876, 0.009);
        // 'é' occupies bytes 5..7, straddling the end of the HIP column
        let mut bad = good.clone();
        bad.replace_range(5..7, "é");
        assert_eq!(bad.len(), good.len());
        assert!(!bad.is_char_boundary(6));

        let stars = load_hipparcos_catalog(&format!("{bad}\n{good}\n"));
        assert_eq!(stars.len(), 1);
        assert_eq!(stars[0].hip, 32349);
    }

    #[test]
    fn colour_classes() {
        let mut star = HipparcosStar {
            hip: 1,
            ra_rad: 0.0,
            dec_rad: 0.0,
            plx: 10.0,
            e_plx: 1.0,
            hpmag: 5.0,
            b_v: 0.65,
        };
        assert_eq!(star.spectral_class().spectral_class(), Some(SpectralClass::G));
        assert_eq!(star.parallax_error(), 10);
        star.b_v = 1.9;
        assert_eq!(star.spectral_class().spectral_class(), Some(SpectralClass::M));
        star.plx = -1.0;
        assert_eq!(star.parallax_error(), 255);
    }

    #[test]
    #[ignore]
    fn load_hipparcos_from_file() {
        let stars = load_hipparcos_catalog_from_file("data/hip2.dat").expect("Failed to read Hipparcos catalog file");
        assert!(!stars.is_empty());
    }
}
