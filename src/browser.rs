//! Best-of-N star listings for star browser views.
//!
//! Every call to [`StarBrowser::list_stars`] rescans the whole database,
//! keeping the best `n` candidates in a bounded max-heap whose top is the
//! worst star kept so far.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use crate::astro;
use crate::database::StarDatabase;
use crate::star::StarRecord;
use crate::Vector3;

/// Largest number of stars a listing returns.
pub const MAX_LISTED_STARS: usize = 500;

/// Source of knowledge about which stars host planetary systems.
pub trait PlanetarySystems {
    fn has_planets(&self, catalog_number: u32) -> bool;

    /// Number of known planetary systems.
    fn system_count(&self) -> usize;
}

impl PlanetarySystems for HashSet<u32> {
    fn has_planets(&self, catalog_number: u32) -> bool {
        self.contains(&catalog_number)
    }

    fn system_count(&self) -> usize {
        self.len()
    }
}

impl PlanetarySystems for BTreeSet<u32> {
    fn has_planets(&self, catalog_number: u32) -> bool {
        self.contains(&catalog_number)
    }

    fn system_count(&self) -> usize {
        self.len()
    }
}

/// Ordering used to rank stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserPredicate {
    /// Closest to the observer first.
    #[default]
    Nearest,
    /// Brightest as seen by the observer first.
    BrighterApparent,
    /// Intrinsically brightest first.
    BrightestAbsolute,
    /// Stars hosting a known planetary system, nearest first.
    WithPlanets,
}

struct Ranked {
    value: f32,
    index: u32,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

pub struct StarBrowser<'a> {
    database: &'a StarDatabase,
    position: Vector3,
    predicate: BrowserPredicate,
    systems: Option<&'a dyn PlanetarySystems>,
}

impl<'a> StarBrowser<'a> {
    /// Browser for an observer at `position` (light-years).
    pub fn new(database: &'a StarDatabase, position: Vector3, predicate: BrowserPredicate) -> Self {
        Self {
            database,
            position,
            predicate,
            systems: None,
        }
    }

    pub fn with_planetary_systems(mut self, systems: &'a dyn PlanetarySystems) -> Self {
        self.systems = Some(systems);
        self
    }

    pub fn position(&self) -> &Vector3 {
        &self.position
    }

    /// Move the observer.
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    pub fn predicate(&self) -> BrowserPredicate {
        self.predicate
    }

    pub fn set_predicate(&mut self, predicate: BrowserPredicate) {
        self.predicate = predicate;
    }

    /// Ranking key of a star, `None` when the predicate excludes it.
    fn rank(&self, predicate: BrowserPredicate, index: u32, star: &StarRecord) -> Option<Ranked> {
        let dist2 = || (star.position() - self.position).norm_squared();
        let value = match predicate {
            BrowserPredicate::Nearest => dist2(),
            BrowserPredicate::BrighterApparent => astro::abs_to_app_mag(star.absolute_magnitude, dist2().sqrt()),
            BrowserPredicate::BrightestAbsolute => star.absolute_magnitude,
            BrowserPredicate::WithPlanets => {
                if !self.systems.is_some_and(|s| s.has_planets(star.catalog_number)) {
                    return None;
                }
                dist2()
            }
        };
        Some(Ranked { value, index })
    }

    fn best(&self, predicate: BrowserPredicate, n: usize) -> Vec<&'a StarRecord> {
        let n = n.min(MAX_LISTED_STARS);
        if n == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(n + 1);
        for (i, star) in self.database.stars().iter().enumerate() {
            let Some(candidate) = self.rank(predicate, i as u32, star) else {
                continue;
            };
            if heap.len() < n {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        let database = self.database;
        heap.into_sorted_vec()
            .into_iter()
            .filter_map(|r| database.star(r.index))
            .collect()
    }

    /// The best `n` stars under the current predicate, best first.
    ///
    /// At most [`MAX_LISTED_STARS`] are returned. Listing stars with planets
    /// returns only stars the planetary system source knows about, so nothing
    /// without a source and never more stars than known systems.
    pub fn list_stars(&self, n: usize) -> Vec<&'a StarRecord> {
        match self.predicate {
            BrowserPredicate::WithPlanets => match self.systems {
                None => Vec::new(),
                Some(systems) => self.best(BrowserPredicate::WithPlanets, n.min(systems.system_count())),
            },
            predicate => self.best(predicate, n),
        }
    }

    /// The star closest to the observer.
    pub fn nearest_star(&self) -> Option<&'a StarRecord> {
        self.best(BrowserPredicate::Nearest, 1).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StarDatabaseBuilder;
    use crate::stellarclass::StellarClass;

    fn database() -> StarDatabase {
        let mut builder = StarDatabaseBuilder::default();
        // (catalog number, x position, absolute magnitude)
        for (n, x, abs) in [
            (1, 1.0f32, 10.0f32),
            (2, 2.0, 0.0),
            (3, 3.0, 12.0),
            (4, 40.0, -5.0),
            (5, -1.5, 8.0),
        ] {
            builder.insert(StarRecord::new(n, Vector3::new(x, 0.0, 0.0), abs, StellarClass::default()));
        }
        builder.finish()
    }

    fn numbers(stars: &[&StarRecord]) -> Vec<u32> {
        stars.iter().map(|s| s.catalog_number).collect()
    }

    #[test]
    fn nearest() {
        let db = database();
        let browser = StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::Nearest);
        assert_eq!(numbers(&browser.list_stars(3)), vec![1, 5, 2]);
        assert_eq!(browser.nearest_star().map(|s| s.catalog_number), Some(1));
        assert_eq!(browser.list_stars(100).len(), 5);
        assert!(browser.list_stars(0).is_empty());
    }

    #[test]
    fn brightness() {
        let db = database();
        let mut browser = StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::BrightestAbsolute);
        assert_eq!(numbers(&browser.list_stars(2)), vec![4, 2]);

        browser.set_predicate(BrowserPredicate::BrighterApparent);
        let listed = numbers(&browser.list_stars(5));
        assert_eq!(listed[0], 2);
        assert_eq!(listed[1], 4);
        assert_eq!(listed[4], 3);

        browser.set_position(Vector3::new(3.0, 0.0, 0.001));
        assert_eq!(numbers(&browser.list_stars(1)), vec![3]);
    }

    #[test]
    fn planets() {
        let db = database();
        let systems: HashSet<u32> = [3, 4].into_iter().collect();
        let browser = StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::WithPlanets);
        assert!(browser.list_stars(10).is_empty());

        let browser = browser.with_planetary_systems(&systems);
        assert_eq!(numbers(&browser.list_stars(10)), vec![3, 4]);
        assert_eq!(numbers(&browser.list_stars(1)), vec![3]);
    }

    #[test]
    fn planets_of_unloaded_stars_leave_no_gap_filler() {
        let db = database();
        let systems: BTreeSet<u32> = [3, 999].into_iter().collect();
        let browser =
            StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::WithPlanets).with_planetary_systems(&systems);
        assert_eq!(numbers(&browser.list_stars(10)), vec![3]);

        let none: BTreeSet<u32> = [999].into_iter().collect();
        let browser =
            StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::WithPlanets).with_planetary_systems(&none);
        assert!(browser.list_stars(10).is_empty());
    }

    #[test]
    fn empty_database() {
        let db = StarDatabaseBuilder::default().finish();
        let browser = StarBrowser::new(&db, Vector3::zeros(), BrowserPredicate::Nearest);
        assert!(browser.list_stars(10).is_empty());
        assert!(browser.nearest_star().is_none());
    }
}
