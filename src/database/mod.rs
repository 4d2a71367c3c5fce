//! The sealed star database.
//!
//! A [`StarDatabase`] is produced by [`StarDatabaseBuilder::finish`] and
//! never changes afterwards. Stars live in the octree's spatially sorted
//! array; their indices in that array are stable for the life of the
//! database. A second array of indices sorted by catalog number serves
//! [`StarDatabase::find`].

mod builder;

use std::collections::BTreeSet;
use std::io::Write;

use rkyv::{Archive, Deserialize, Serialize};
use tracing::info;

use crate::catalogs::binary;
use crate::crossindex::{Catalog, CatalogCrossIndex};
use crate::error::{LoadError, Result};
use crate::names::{parse_designation, Designation, StarNameDatabase};
use crate::octree::{Frustum, QueryStats, StarHandler, StarOctree};
use crate::star::{tycho_components, StarRecord, MAX_HIPPARCOS_NUMBER, MAX_TYCHO_CATALOG_NUMBER};
use crate::{Quaternion, Vector3};

pub use builder::{LoadConfig, StarDatabaseBuilder, FIRST_AUTO_CATALOG_NUMBER};

#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct StarDatabase {
    octree: StarOctree,
    /// Star indices ordered by catalog number.
    catalog_number_index: Vec<u32>,
    names: StarNameDatabase,
    cross_index: CatalogCrossIndex,
}

impl StarDatabase {
    pub fn len(&self) -> usize {
        self.octree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.octree.is_empty()
    }

    /// Star at `index` in the database's star array.
    pub fn star(&self, index: u32) -> Option<&StarRecord> {
        self.octree.stars().get(index as usize)
    }

    pub fn stars(&self) -> &[StarRecord] {
        self.octree.stars()
    }

    pub fn octree(&self) -> &StarOctree {
        &self.octree
    }

    pub fn names(&self) -> &StarNameDatabase {
        &self.names
    }

    pub fn cross_index(&self) -> &CatalogCrossIndex {
        &self.cross_index
    }

    /// Index of the star with `catalog_number`.
    pub fn find_index(&self, catalog_number: u32) -> Option<u32> {
        let stars = self.octree.stars();
        self.catalog_number_index
            .binary_search_by_key(&catalog_number, |&i| stars[i as usize].catalog_number)
            .ok()
            .map(|pos| self.catalog_number_index[pos])
    }

    pub fn find(&self, catalog_number: u32) -> Option<&StarRecord> {
        self.find_index(catalog_number).and_then(|i| self.star(i))
    }

    /// Star with number `number` in a cross-indexed catalog.
    pub fn find_by_catalog(&self, catalog: Catalog, number: u32) -> Option<&StarRecord> {
        self.find(self.cross_index.get(catalog, number)?)
    }

    /// Canonical number of the star designated by `name`.
    ///
    /// Catalog designations (`#n`, `HIP n`, `TYC a-b-c`, `HD n`, `SAO n`,
    /// `Gliese n`) are tried first; a designation that names no loaded star
    /// falls through to the name database.
    pub fn catalog_number_by_name(&self, name: &str) -> Option<u32> {
        let designated = match parse_designation(name) {
            Some(Designation::Canonical(n)) => Some(n),
            Some(Designation::Catalog(catalog, n)) => self.cross_index.get(catalog, n),
            None => None,
        };
        designated
            .filter(|&n| self.find_index(n).is_some())
            .or_else(|| self.names.find_by_name(name))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&StarRecord> {
        self.find(self.catalog_number_by_name(name)?)
    }

    /// Display name: the first registered name, otherwise a catalog
    /// designation that [`find_by_name`](Self::find_by_name) resolves.
    pub fn star_name(&self, star: &StarRecord) -> String {
        match self.names.first_name(star.catalog_number) {
            Some(name) => name.to_string(),
            None => catalog_number_to_string(star.catalog_number),
        }
    }

    /// Up to `max_names` distinct names and designations joined with `" / "`:
    /// the registered names, then the HIP or Tycho, HD and SAO numbers.
    pub fn star_name_list(&self, star: &StarRecord, max_names: usize) -> String {
        let n = star.catalog_number;
        let mut candidates: Vec<String> = self.names.names(n).to_vec();
        if n > 0 && n <= MAX_TYCHO_CATALOG_NUMBER {
            candidates.push(catalog_number_to_string(n));
        }
        for catalog in [Catalog::HenryDraper, Catalog::Sao] {
            if let Some(number) = self.cross_index.reverse_get(catalog, n) {
                candidates.push(format!("{} {}", catalog.prefix(), number));
            }
        }

        let mut seen = BTreeSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .take(max_names)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    /// Names starting with `prefix`, for interactive completion.
    pub fn completion(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.names.completion(prefix)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Report every star in the view frustum of a camera at `position` that
    /// is brighter than `limiting_mag`.
    ///
    /// `fov_y` is the vertical field of view in radians; the camera looks
    /// down its local -z axis.
    pub fn find_visible_stars<H: StarHandler + ?Sized>(
        &self,
        handler: &mut H,
        position: &Vector3,
        orientation: &Quaternion,
        fov_y: f32,
        aspect_ratio: f32,
        limiting_mag: f32,
    ) {
        let frustum = Frustum::new(*position, orientation, fov_y, aspect_ratio);
        self.octree.find_visible_stars(handler, &frustum, limiting_mag);
    }

    /// Like [`find_visible_stars`](Self::find_visible_stars), collecting
    /// traversal statistics.
    pub fn find_visible_stars_with_stats<H: StarHandler + ?Sized>(
        &self,
        handler: &mut H,
        frustum: &Frustum,
        limiting_mag: f32,
        stats: &mut QueryStats,
    ) {
        self.octree
            .find_visible_stars_with_stats(handler, frustum, limiting_mag, stats);
    }

    /// Report every star closer than `radius` light-years to `position`.
    pub fn find_close_stars<H: StarHandler + ?Sized>(&self, handler: &mut H, position: &Vector3, radius: f32) {
        self.octree.find_close_stars(handler, position, radius);
    }

    // ── Serialization ───────────────────────────────────────────────────────

    /// Write the stars in the pre-converted `CELSTARS` layout.
    pub fn write_celstars<W: Write>(&self, writer: W) -> std::io::Result<()> {
        binary::write_celstars(self.stars(), writer)
    }

    /// Serialize the database to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| anyhow::anyhow!("rkyv serialization failed: {}", e))?;
        Ok(bytes.to_vec())
    }

    /// Save the database to a file using rkyv.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let bytes = self.to_rkyv_bytes()?;
        std::fs::write(path, &bytes)?;
        info!("Saved star database to {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    /// Load a database from an rkyv file.
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)?;
        let db = Self::from_rkyv_bytes(&bytes)?;
        info!(
            "Loaded star database: {} stars, {} names",
            db.len(),
            db.names.len()
        );
        Ok(db)
    }

    /// Deserialize a database, rejecting data whose indexes do not fit the
    /// star and node arrays.
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let db = rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        db.validate()?;
        Ok(db)
    }

    /// Check the octree and the catalog number index against the star array.
    pub fn validate(&self) -> Result<()> {
        self.octree.validate()?;
        let stars = self.octree.stars();
        if self.catalog_number_index.len() != stars.len() {
            return Err(LoadError::Inconsistent(format!(
                "catalog number index has {} entries for {} stars",
                self.catalog_number_index.len(),
                stars.len()
            )));
        }
        let mut previous: Option<u32> = None;
        for &i in &self.catalog_number_index {
            let Some(star) = stars.get(i as usize) else {
                return Err(LoadError::Inconsistent(format!("catalog number index points at star {i}")));
            };
            if previous.is_some_and(|p| p >= star.catalog_number) {
                return Err(LoadError::Inconsistent(
                    "catalog number index is not strictly ordered".to_string(),
                ));
            }
            previous = Some(star.catalog_number);
        }
        Ok(())
    }
}

/// `HIP n` for Hipparcos numbers, `TYC a-b-c` for packed Tycho numbers and
/// `#n` for automatically assigned numbers.
fn catalog_number_to_string(catalog_number: u32) -> String {
    if catalog_number <= MAX_HIPPARCOS_NUMBER {
        format!("HIP {catalog_number}")
    } else if catalog_number <= MAX_TYCHO_CATALOG_NUMBER {
        let (tyc1, tyc2, tyc3) = tycho_components(catalog_number);
        format!("TYC {tyc1}-{tyc2}-{tyc3}")
    } else {
        format!("#{catalog_number}")
    }
}
