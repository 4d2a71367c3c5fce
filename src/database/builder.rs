//! Growable star store filled from catalog files and sealed into a
//! [`StarDatabase`].

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::StarDatabase;
use crate::astro;
use crate::catalogs::binary;
use crate::catalogs::stc::{self, Disposition, Entry};
use crate::catalogs::CatalogEntry;
use crate::crossindex::{Catalog, CatalogCrossIndex};
use crate::error::{LoadError, Result};
use crate::names::{parse_designation, Designation, StarNameDatabase};
use crate::octree::{OctreeConfig, StarOctree};
use crate::star::StarRecord;
use crate::stellarclass::StellarClass;
use crate::Vector3;

/// Apparent magnitudes cannot be converted for stars closer to the origin
/// than this (light-years).
const MIN_APP_MAG_DISTANCE: f32 = 1e-5;

/// Stars with a relative parallax error above this (percent) are counted
/// as poorly measured in the load diagnostics.
const POOR_PARALLAX_ERROR: u8 = 20;

/// First number handed out to text entries without a catalog number.
pub const FIRST_AUTO_CATALOG_NUMBER: u32 = 0xffff_fffe;

/// Catalog loading parameters.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Parallaxes below this (milliarcseconds) are raised to it.
    pub parallax_floor_mas: f32,
    /// Parameters of the octree built by [`StarDatabaseBuilder::finish`].
    pub octree: OctreeConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            parallax_floor_mas: astro::MIN_PARALLAX_MAS,
            octree: OctreeConfig::default(),
        }
    }
}

/// Collects stars, names and cross indexes from any number of files.
///
/// Files are applied in the order they are loaded; a later file can replace
/// or modify stars of an earlier one. [`finish`](Self::finish) consumes the
/// builder and produces the immutable database.
pub struct StarDatabaseBuilder {
    config: LoadConfig,
    stars: Vec<StarRecord>,
    /// Position of every catalog number in `stars`.
    index: HashMap<u32, usize>,
    names: StarNameDatabase,
    cross_index: CatalogCrossIndex,
    next_auto_number: u32,
}

impl Default for StarDatabaseBuilder {
    fn default() -> Self {
        Self::new(LoadConfig::default())
    }
}

impl StarDatabaseBuilder {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            stars: Vec::new(),
            index: HashMap::new(),
            names: StarNameDatabase::new(),
            cross_index: CatalogCrossIndex::new(),
            next_auto_number: FIRST_AUTO_CATALOG_NUMBER,
        }
    }

    /// Number of stars loaded so far.
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// A star loaded so far.
    pub fn find(&self, catalog_number: u32) -> Option<&StarRecord> {
        self.index.get(&catalog_number).map(|&i| &self.stars[i])
    }

    pub fn names(&self) -> &StarNameDatabase {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut StarNameDatabase {
        &mut self.names
    }

    pub fn cross_index(&self) -> &CatalogCrossIndex {
        &self.cross_index
    }

    pub fn cross_index_mut(&mut self) -> &mut CatalogCrossIndex {
        &mut self.cross_index
    }

    /// Add a star, replacing any star with the same catalog number.
    pub fn insert(&mut self, star: StarRecord) {
        match self.index.get(&star.catalog_number) {
            Some(&i) => self.stars[i] = star,
            None => {
                self.index.insert(star.catalog_number, self.stars.len());
                self.stars.push(star);
            }
        }
    }

    /// Add observed stars, registering their HD numbers.
    pub fn add_entries(&mut self, entries: &[CatalogEntry]) {
        let mut poor_parallax = 0usize;
        let mut hd_conflicts = 0usize;
        for entry in entries {
            if entry.parallax_error > POOR_PARALLAX_ERROR {
                poor_parallax += 1;
            }
            self.insert(entry.to_record(self.config.parallax_floor_mas));
            if let Some(hd) = entry.hd_number {
                if let Err(e) = self
                    .cross_index
                    .add_catalog_number(entry.catalog_number, Catalog::HenryDraper, hd)
                {
                    debug!("HD {} for star {}: {}", hd, entry.catalog_number, e);
                    hd_conflicts += 1;
                }
            }
        }
        if hd_conflicts > 0 {
            warn!("Ignored {} conflicting HD numbers", hd_conflicts);
        }
        debug!(
            "{} of {} stars have a parallax error above {}%",
            poor_parallax,
            entries.len(),
            POOR_PARALLAX_ERROR
        );
    }

    // ── Binary catalogs ─────────────────────────────────────────────────────

    /// Load a binary catalog, either the observational layout or `CELSTARS`.
    ///
    /// The whole stream is validated before any star is added, so a failed
    /// file leaves the builder unchanged.
    pub fn load_binary<R: Read>(&mut self, mut reader: R) -> Result<usize> {
        let start = Instant::now();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let count = if binary::is_celstars(&bytes) {
            let stars = binary::read_celstars(&bytes).inspect_err(|e| {
                error!("Failed to load CELSTARS catalog: {}", e);
            })?;
            let count = stars.len();
            for star in stars {
                self.insert(star);
            }
            count
        } else {
            let entries = binary::read_observations(&bytes).inspect_err(|e| {
                error!("Failed to load binary star catalog: {}", e);
            })?;
            self.add_entries(&entries);
            entries.len()
        };

        info!(
            "Loaded {} stars from binary catalog in {:.1} ms",
            count,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(count)
    }

    pub fn load_binary_file<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.load_binary(std::io::BufReader::new(file))
            .with_context(|| format!("loading star catalog {}", path.display()))
    }

    // ── Text catalogs ───────────────────────────────────────────────────────

    /// Load a text catalog.
    ///
    /// Entries with missing or invalid properties are skipped with a
    /// warning. A structural error rejects the whole file before any entry
    /// is applied. Returns the number of entries applied.
    pub fn load_text<R: Read>(&mut self, mut reader: R, resource_path: &Path) -> Result<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let entries: Vec<Entry> = stc::Reader::new(&text)
            .collect::<Result<_>>()
            .inspect_err(|e| error!("Error in star catalog {}: {}", resource_path.display(), e))?;

        let mut applied = 0usize;
        for entry in &entries {
            match self.apply_entry(entry) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => warn!("{}: skipping {}: {}", resource_path.display(), entry.label(), e),
            }
        }
        info!(
            "Loaded {} of {} entries from {}",
            applied,
            entries.len(),
            resource_path.display()
        );
        Ok(applied)
    }

    pub fn load_text_file<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.load_text(std::io::BufReader::new(file), path)
            .with_context(|| format!("loading star catalog {}", path.display()))
    }

    /// Canonical number for a name used in an entry header.
    fn resolve_name(&self, name: &str) -> Option<u32> {
        if let Some(Designation::Canonical(n)) = parse_designation(name) {
            return Some(n);
        }
        if let Some(Designation::Catalog(catalog, n)) = parse_designation(name) {
            return self.cross_index.get(catalog, n);
        }
        self.names.find_by_name(name)
    }

    /// Apply one text entry. `Ok(false)` means the entry was ignored.
    fn apply_entry(&mut self, entry: &Entry) -> Result<bool> {
        if !entry.is_star {
            debug!("Ignoring barycenter {}", entry.label());
            return Ok(false);
        }

        let mut catalog_number = entry.catalog_number;
        if entry.disposition != Disposition::Add && catalog_number.is_none() {
            catalog_number = entry.names.first().and_then(|name| self.resolve_name(name));
        }

        let existing = catalog_number
            .and_then(|n| self.index.get(&n))
            .map(|&i| self.stars[i]);
        if existing.is_none() && entry.disposition == Disposition::Modify {
            warn!("Modify requested for nonexistent star {}", entry.label());
            return Ok(false);
        }

        let merge_base = match entry.disposition {
            Disposition::Modify => existing,
            _ => None,
        };
        // Checked before an automatic number is used up.
        let (position, absolute_magnitude, spectral_class) = star_properties(entry, merge_base.as_ref())?;

        let catalog_number = match catalog_number {
            Some(n) => n,
            None => {
                let n = self.next_auto_number;
                self.next_auto_number = self.next_auto_number.saturating_sub(1);
                n
            }
        };

        self.insert(StarRecord::new(
            catalog_number,
            position,
            absolute_magnitude,
            spectral_class,
        ));
        if !entry.names.is_empty() {
            self.names.erase(catalog_number);
            for name in &entry.names {
                self.names.add(catalog_number, name);
            }
        }
        Ok(true)
    }

    // ── Names and cross indexes ─────────────────────────────────────────────

    /// Load a star name file. A malformed file adds no names.
    pub fn load_names<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let count = self.names.load(reader)?;
        info!("Loaded names for {} stars", count);
        Ok(count)
    }

    pub fn load_names_file<P: AsRef<Path>>(&mut self, path: P) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.load_names(std::io::BufReader::new(file))
            .with_context(|| format!("loading star names {}", path.display()))
    }

    /// Replace the cross index of `catalog` with the contents of a
    /// cross-index file.
    pub fn load_cross_index<R: Read>(&mut self, catalog: Catalog, reader: R) -> Result<()> {
        self.cross_index
            .load(catalog, reader)
            .inspect_err(|e| error!("Failed to load {} cross index: {}", catalog.prefix(), e))
    }

    pub fn load_cross_index_file<P: AsRef<Path>>(&mut self, catalog: Catalog, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.load_cross_index(catalog, std::io::BufReader::new(file))
            .with_context(|| format!("loading cross index {}", path.display()))
    }

    // ── Sealing ─────────────────────────────────────────────────────────────

    /// Build the octree and catalog number index.
    pub fn finish(self) -> StarDatabase {
        info!("Total star count: {}", self.stars.len());
        let start = Instant::now();

        let octree = StarOctree::build(self.stars, &self.config.octree);
        let mut catalog_number_index: Vec<u32> = (0..octree.len() as u32).collect();
        let stars = octree.stars();
        catalog_number_index.sort_unstable_by_key(|&i| stars[i as usize].catalog_number);

        debug!(
            "Sealed star database: {} nodes, depth {} in {:.1} ms",
            octree.node_count(),
            octree.max_depth(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        StarDatabase {
            octree,
            catalog_number_index,
            names: self.names,
            cross_index: self.cross_index,
        }
    }
}

fn malformed(entry: &Entry, field: &'static str, reason: impl Into<String>) -> LoadError {
    LoadError::MalformedField {
        record: entry.label(),
        field,
        reason: reason.into(),
    }
}

/// Position, absolute magnitude and class described by a text entry.
///
/// `base` is the star being modified; properties the entry leaves out are
/// taken from it.
fn star_properties(entry: &Entry, base: Option<&StarRecord>) -> Result<(Vector3, f32, StellarClass)> {
    let props = &entry.properties;

    let spectral_class = match props.string("SpectralType").map_err(|e| malformed(entry, "SpectralType", e))? {
        Some(st) => StellarClass::parse(st),
        None => match base {
            Some(star) => star.spectral_class,
            None => return Err(malformed(entry, "SpectralType", "missing")),
        },
    };

    let mut position = polar_position(entry, base)?;
    if let Some(v) = props
        .length_vector_ly("Position")
        .map_err(|e| malformed(entry, "Position", e))?
    {
        if position.is_some() {
            warn!("{}: ignoring RA/Dec/Distance in favor of Position", entry.label());
        }
        position = Some(Vector3::new(v[0] as f32, v[1] as f32, v[2] as f32));
    }
    let position = match (position, base) {
        (Some(p), _) => p,
        (None, Some(star)) => star.position(),
        (None, None) => return Err(malformed(entry, "RA", "missing coordinates")),
    };
    let distance = position.norm();

    let number = |key: &'static str| -> Result<Option<f32>> {
        props
            .number(key)
            .map(|v| v.map(|v| v as f32))
            .map_err(|e| malformed(entry, key, e))
    };
    let abs_mag = number("AbsMag")?;
    let app_mag = number("AppMag")?;
    let mut extinction = number("Extinction")?;
    if extinction.is_some() && distance < MIN_APP_MAG_DISTANCE {
        warn!("{}: extinction ignored for stars close to the origin", entry.label());
        extinction = None;
    }

    let absolute_magnitude = match (abs_mag, app_mag) {
        (Some(abs), app) => {
            if app.is_some() {
                warn!("{}: AppMag ignored when AbsMag is supplied", entry.label());
            }
            abs
        }
        (None, Some(app)) => {
            if distance < MIN_APP_MAG_DISTANCE {
                return Err(malformed(entry, "AppMag", "cannot be used close to the origin"));
            }
            astro::app_to_abs_mag(app, distance) - extinction.unwrap_or(0.0)
        }
        (None, None) => match base {
            Some(star) => star.absolute_magnitude,
            None => return Err(malformed(entry, "AbsMag", "no magnitude defined for star")),
        },
    };

    Ok((position, absolute_magnitude, spectral_class))
}

/// Position from `RA`, `Dec` and `Distance`. All three are required unless
/// an existing star is modified, in which case missing values are taken
/// from its current position.
fn polar_position(entry: &Entry, base: Option<&StarRecord>) -> Result<Option<Vector3>> {
    let props = &entry.properties;
    let ra = props.angle_deg("RA").map_err(|e| malformed(entry, "RA", e))?;
    let dec = props.angle_deg("Dec").map_err(|e| malformed(entry, "Dec", e))?;
    let distance = props
        .length_ly("Distance")
        .map_err(|e| malformed(entry, "Distance", e))?;

    match (ra, dec, distance, base) {
        (None, None, None, _) => Ok(None),
        (Some(ra), Some(dec), Some(d), _) => Ok(Some(astro::equatorial_to_cartesian(ra, dec, d))),
        (ra, dec, distance, Some(star)) => {
            let (cur_ra, cur_dec, cur_distance) = astro::cartesian_to_equatorial(&star.position());
            Ok(Some(astro::equatorial_to_cartesian(
                ra.unwrap_or(cur_ra),
                dec.unwrap_or(cur_dec),
                distance.unwrap_or(cur_distance),
            )))
        }
        (ra, dec, _, None) => {
            let field = match (ra, dec) {
                (None, _) => "RA",
                (_, None) => "Dec",
                _ => "Distance",
            };
            Err(malformed(entry, field, "incomplete set of coordinates RA/Dec/Distance"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellarclass::SpectralClass;

    fn load(builder: &mut StarDatabaseBuilder, text: &str) -> Result<usize> {
        builder.load_text(text.as_bytes(), Path::new("test.stc"))
    }

    #[test]
    fn text_entries_and_names() {
        let mut builder = StarDatabaseBuilder::default();
        let n = load(
            &mut builder,
            r#"
            32349 "Sirius:ALF CMa"
            {
                RA 101.287
                Dec -16.716
                Distance 8.6
                SpectralType "A1V"
                AppMag -1.46
            }
            "#,
        )
        .unwrap();
        assert_eq!(n, 1);
        let sirius = builder.find(32349).unwrap();
        assert!((sirius.position().norm() - 8.6).abs() < 1e-4);
        assert!((sirius.absolute_magnitude - astro::app_to_abs_mag(-1.46, 8.6)).abs() < 1e-5);
        assert_eq!(sirius.spectral_class.spectral_class(), Some(SpectralClass::A));
        assert_eq!(builder.names().find_by_name("alpha canis majoris"), Some(32349));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mut builder = StarDatabaseBuilder::default();
        let n = load(
            &mut builder,
            r#"
            1 { RA 10 Dec 10 SpectralType "G2V" AbsMag 4.8 }
            2 { RA 10 Dec 10 Distance 5 AbsMag 4.8 }
            3 { RA 10 Dec 10 Distance 5 SpectralType "K0III" }
            4 { RA "ten" Dec 10 Distance 5 SpectralType "K0" AbsMag 1 }
            5 { Position [ 0 0 0 ] SpectralType "M5V" AppMag 11 }
            6 { RA 20 Dec -5 Distance 12 SpectralType "F5IV" AbsMag 2.5 AppMag 9 }
            "#,
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.find(6).unwrap().absolute_magnitude, 2.5);
    }

    #[test]
    fn syntax_error_rejects_file() {
        let mut builder = StarDatabaseBuilder::default();
        let result = load(
            &mut builder,
            "1 { RA 10 Dec 10 Distance 5 SpectralType \"G2V\" AbsMag 4.8 }\n2 { RA 1",
        );
        assert!(matches!(result, Err(LoadError::Syntax { .. })));
        assert!(builder.is_empty());
    }

    #[test]
    fn dispositions() {
        let mut builder = StarDatabaseBuilder::default();
        load(
            &mut builder,
            r#"
            100 "Base" { RA 30 Dec 40 Distance 50 SpectralType "G2V" AbsMag 4.8 }
            Modify 100 { AbsMag 1.0 }
            Modify "Base" { Distance 25 }
            Modify 999 { AbsMag 2.0 }
            "#,
        )
        .unwrap();
        let star = builder.find(100).unwrap();
        assert_eq!(star.absolute_magnitude, 1.0);
        assert_eq!(star.spectral_class.spectral_class(), Some(SpectralClass::G));
        let (ra, dec, d) = astro::cartesian_to_equatorial(&star.position());
        assert!((ra - 30.0).abs() < 1e-3 && (dec - 40.0).abs() < 1e-3);
        assert!((d - 25.0).abs() < 1e-3);
        assert!(builder.find(999).is_none());

        load(
            &mut builder,
            r#"Replace 100 "Renamed" { RA 1 Dec 2 Distance 3 SpectralType "M1V" AbsMag 9 }"#,
        )
        .unwrap();
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.find(100).unwrap().absolute_magnitude, 9.0);
        assert_eq!(builder.names().names(100), ["Renamed".to_string()]);
        assert_eq!(builder.names().catalog_number_by_name("Base"), None);
    }

    #[test]
    fn automatic_catalog_numbers() {
        let mut builder = StarDatabaseBuilder::default();
        load(
            &mut builder,
            r#"
            "First" { RA 1 Dec 1 Distance 10 SpectralType "G2V" AbsMag 4 }
            "Broken" { RA 1 Dec 1 Distance 10 AbsMag 4 }
            "Second" { RA 2 Dec 2 Distance 10 SpectralType "K2V" AbsMag 6 }
            "#,
        )
        .unwrap();
        assert_eq!(builder.names().catalog_number_by_name("First"), Some(FIRST_AUTO_CATALOG_NUMBER));
        assert_eq!(
            builder.names().catalog_number_by_name("Second"),
            Some(FIRST_AUTO_CATALOG_NUMBER - 1)
        );
        assert!(builder.find(FIRST_AUTO_CATALOG_NUMBER - 1).is_some());
    }

    #[test]
    fn failed_binary_file_leaves_builder_unchanged() {
        let entry = CatalogEntry {
            catalog_number: 7,
            hd_number: Some(70),
            ra_deg: 10.0,
            dec_deg: 20.0,
            parallax_mas: 100.0,
            apparent_magnitude: 5.0,
            spectral_class: StellarClass::default(),
            parallax_error: 3,
        };
        let mut bytes = Vec::new();
        binary::write_observations(&[entry.clone(), CatalogEntry { catalog_number: 8, hd_number: None, ..entry }], &mut bytes)
            .unwrap();

        let mut builder = StarDatabaseBuilder::default();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(builder.load_binary(truncated), Err(LoadError::Truncated { .. })));
        assert!(builder.is_empty());
        assert_eq!(builder.cross_index().get(Catalog::HenryDraper, 70), None);

        assert_eq!(builder.load_binary(bytes.as_slice()).unwrap(), 2);
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.cross_index().get(Catalog::HenryDraper, 70), Some(7));
        assert_eq!(builder.cross_index().reverse_get(Catalog::HenryDraper, 7), Some(70));
    }

    #[test]
    fn celstars_catalog_is_detected() {
        let stars = vec![StarRecord::new(5, Vector3::new(1.0, 2.0, 3.0), 4.0, StellarClass::default())];
        let mut bytes = Vec::new();
        binary::write_celstars(&stars, &mut bytes).unwrap();
        let mut builder = StarDatabaseBuilder::default();
        assert_eq!(builder.load_binary(bytes.as_slice()).unwrap(), 1);
        assert_eq!(builder.find(5), Some(&stars[0]));
    }
}
