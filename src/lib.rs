//! # starvault
//!
//! A star catalog database with a **magnitude-pruned octree** for
//! per-frame visibility queries, range-compressed **catalog cross-indexes**
//! and a **star name database** that understands Bayer and Flamsteed
//! designations.
//!
//! Catalog files are loaded into a [`StarDatabaseBuilder`], which is then
//! sealed into an immutable [`StarDatabase`]. The sealed database can be
//! shared between threads without locking.
//!
//! ## Features
//!
//! - **Visibility queries**: every star inside a camera frustum and brighter
//!   than a limiting magnitude, skipping whole octree cells that cannot hold
//!   such a star
//! - **Proximity queries**: every star within a radius of a point
//! - **Cross-indexes**: HD, SAO and Gliese numbers to canonical HIP-derived
//!   numbers and back, stored as runs rather than per star
//! - **Names**: `Sirius`, `Alpha CMa`, `α¹ Cen`, `61 Cyg`, `HD 48915`,
//!   `TYC 8959-1257-1` and friends all resolve to a star
//! - **Catalog formats**: binary observation catalogs, pre-converted
//!   `CELSTARS` catalogs, brace-delimited text catalogs and Hipparcos `hip2.dat`
//! - **Zero-copy persistence**: sealed databases serialize with
//!   [rkyv](https://docs.rs/rkyv)
//!
//! ## Example
//!
//! ```no_run
//! use starvault::{StarDatabaseBuilder, Quaternion, Vector3};
//! use starvault::crossindex::Catalog;
//!
//! let mut builder = StarDatabaseBuilder::default();
//! builder.load_binary_file("data/stars.dat").unwrap();
//! builder.load_text_file("data/extrasolar.stc").unwrap();
//! builder.load_names_file("data/starnames.dat").unwrap();
//! builder.load_cross_index_file(Catalog::HenryDraper, "data/hdxindex.dat").unwrap();
//! let db = builder.finish();
//!
//! let sirius = db.find_by_name("Sirius").unwrap();
//! println!("{}", db.star_name_list(sirius, 5));
//!
//! let mut visible = 0;
//! db.find_visible_stars(
//!     &mut |_star: &starvault::StarRecord, _distance: f32, _app_mag: f32| visible += 1,
//!     &Vector3::zeros(),
//!     &Quaternion::identity(),
//!     45.0_f32.to_radians(),
//!     16.0 / 9.0,
//!     6.0,
//! );
//! println!("{visible} stars visible");
//! ```

pub mod astro;
pub mod browser;
pub mod catalogs;
pub mod crossindex;
pub mod database;
pub mod error;
pub mod names;
pub mod octree;
pub mod star;
pub mod stellarclass;

pub use browser::{BrowserPredicate, PlanetarySystems, StarBrowser};
pub use crossindex::{Catalog, CatalogCrossIndex, CrossIndex, CrossIndexError};
pub use database::{LoadConfig, StarDatabase, StarDatabaseBuilder};
pub use error::LoadError;
pub use names::StarNameDatabase;
pub use octree::{Frustum, OctreeConfig, QueryStats, StarHandler, StarOctree};
pub use star::*;
pub use stellarclass::StellarClass;

// Commonly used types
// 32-bit floats are enough for light-year positions of catalog stars.
pub type Quaternion = nalgebra::UnitQuaternion<f32>;
pub type Vector3 = nalgebra::Vector3<f32>;
