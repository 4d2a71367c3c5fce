//! Star names and catalog designations.
//!
//! [`StarNameDatabase`] maps canonical catalog numbers to any number of
//! names (the first one being the proper name) and names back to numbers,
//! ignoring case. Lookups understand the usual ways of writing Bayer and
//! Flamsteed designations, so `Alpha Centauri`, `alf cen` and `α Cen` all
//! resolve to the entry stored as `ALF Cen`.
//!
//! Name files hold one star per line:
//!
//! ```text
//! # comment
//! 32349:Sirius:ALF CMa:9 CMa
//! 71683 Rigil Kentaurus:ALF1 Cen
//! ```

pub mod constellations;
pub mod greek;

use std::collections::BTreeMap;
use std::io::BufRead;

use rkyv::{Archive, Deserialize, Serialize};
use tracing::debug;

use crate::crossindex::Catalog;
use crate::error::{LoadError, Result};
use crate::star::tycho_catalog_number;

pub use constellations::{find_constellation, parse_constellation, Constellation};
pub use greek::{canonical_abbreviation, replace_greek_letter_abbr};

/// Lowest number of a `V###` variable star designation.
const FIRST_NUMBERED_VARIABLE: u32 = 335;

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
struct NameEntry {
    catalog_number: u32,
    name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Archive, Serialize, Deserialize)]
pub struct StarNameDatabase {
    names_by_number: BTreeMap<u32, Vec<String>>,
    /// Keyed by the lowercased name.
    numbers_by_name: BTreeMap<String, NameEntry>,
}

impl StarNameDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.numbers_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers_by_name.is_empty()
    }

    /// Add a name for a star. Empty names are ignored.
    ///
    /// A name already used by another star keeps pointing at the star it was
    /// first registered for.
    pub fn add(&mut self, catalog_number: u32, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let names = self.names_by_number.entry(catalog_number).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }

        let key = name.to_lowercase();
        match self.numbers_by_name.get(&key) {
            Some(existing) if existing.catalog_number != catalog_number => {
                debug!(
                    "Duplicate name '{}' on stars {} and {}",
                    name, existing.catalog_number, catalog_number
                );
            }
            Some(_) => {}
            None => {
                self.numbers_by_name.insert(
                    key,
                    NameEntry {
                        catalog_number,
                        name: name.to_string(),
                    },
                );
            }
        }
    }

    /// Remove every name of a star.
    pub fn erase(&mut self, catalog_number: u32) {
        if let Some(names) = self.names_by_number.remove(&catalog_number) {
            for name in names {
                let key = name.to_lowercase();
                if self
                    .numbers_by_name
                    .get(&key)
                    .is_some_and(|e| e.catalog_number == catalog_number)
                {
                    self.numbers_by_name.remove(&key);
                }
            }
        }
    }

    /// All names of a star in insertion order.
    pub fn names(&self, catalog_number: u32) -> &[String] {
        self.names_by_number
            .get(&catalog_number)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The proper (first registered) name of a star.
    pub fn first_name(&self, catalog_number: u32) -> Option<&str> {
        self.names(catalog_number).first().map(String::as_str)
    }

    /// Exact, case-insensitive name lookup.
    pub fn catalog_number_by_name(&self, name: &str) -> Option<u32> {
        self.numbers_by_name
            .get(&name.to_lowercase())
            .map(|e| e.catalog_number)
    }

    /// Resolve a name, trying designation variants when the exact name is
    /// not known.
    ///
    /// After the exact name, `<prefix> <constellation>[ suffix]` is tried as
    /// a Flamsteed number or variable star designation, then as a Bayer
    /// letter. The constellation may be given by name, genitive or
    /// abbreviation; Bayer letters may be spelled out or written as glyphs,
    /// with an optional number (`Alpha1`). Missing numbers and missing
    /// component letters fall back to `1` and ` A`.
    pub fn find_by_name(&self, name: &str) -> Option<u32> {
        if name.is_empty() {
            return None;
        }
        if let Some(n) = self.catalog_number_by_name(name) {
            return Some(n);
        }

        if let Some(pos) = name.find(' ') {
            if pos > 0 && pos < name.len() - 1 {
                let (prefix, remainder) = (&name[..pos], &name[pos + 1..]);
                if let Some(n) = self.find_flamsteed_or_variable(prefix, remainder) {
                    return Some(n);
                }
                if let Some(n) = self.find_bayer(prefix, remainder) {
                    return Some(n);
                }
            }
        }

        self.catalog_number_by_name(&format!("{name} A"))
    }

    fn find_flamsteed_or_variable(&self, prefix: &str, remainder: &str) -> Option<u32> {
        if !is_flamsteed_or_variable(prefix) {
            return None;
        }
        let (constellation, suffix) = split_constellation(remainder)?;

        let canonical = format!("{prefix} {constellation}{suffix}");
        if let Some(n) = self.catalog_number_by_name(&canonical) {
            return Some(n);
        }
        if !suffix.is_empty() {
            return None;
        }
        self.catalog_number_by_name(&format!("{canonical} A"))
    }

    fn find_bayer(&self, prefix: &str, remainder: &str) -> Option<u32> {
        let (letter, number) = parse_bayer_letter(prefix)?;
        let (constellation, suffix) = split_constellation(remainder)?;

        let mut candidates = Vec::with_capacity(4);
        match number {
            None => {
                candidates.push(format!("{letter} {constellation}{suffix}"));
                candidates.push(format!("{letter}1 {constellation}{suffix}"));
                if suffix.is_empty() {
                    candidates.push(format!("{letter} {constellation} A"));
                    candidates.push(format!("{letter}1 {constellation} A"));
                }
            }
            Some(n) => {
                candidates.push(format!("{letter}{n} {constellation}{suffix}"));
                if suffix.is_empty() {
                    candidates.push(format!("{letter}{n} {constellation} A"));
                }
            }
        }
        candidates
            .iter()
            .find_map(|c| self.catalog_number_by_name(c))
    }

    /// Names starting with `prefix`, ignoring case, in lexical order.
    pub fn completion(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        self.numbers_by_name
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, entry)| entry.name.clone())
            .collect()
    }

    /// Read a name file and add its names.
    ///
    /// A malformed line rejects the whole file and leaves the database
    /// unchanged.
    pub fn load<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut parsed: Vec<(u32, Vec<String>)> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let number_end = line
                .find(|c: char| c == ':' || c.is_whitespace())
                .ok_or_else(|| LoadError::Syntax {
                    line: idx + 1,
                    message: "missing name list".to_string(),
                })?;
            let catalog_number: u32 = line[..number_end].parse().map_err(|_| LoadError::Syntax {
                line: idx + 1,
                message: format!("bad catalog number '{}'", &line[..number_end]),
            })?;
            let names = line[number_end..]
                .trim_start_matches(|c: char| c.is_whitespace())
                .trim_start_matches(':')
                .split(':')
                .map(|s| s.to_string())
                .collect();
            parsed.push((catalog_number, names));
        }

        let count = parsed.len();
        for (catalog_number, names) in parsed {
            for name in names {
                self.add(catalog_number, &name);
            }
        }
        debug!("Loaded names for {} stars", count);
        Ok(count)
    }

    /// Iterate over `(catalog_number, names)` for every named star.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[String])> + '_ {
        self.names_by_number
            .iter()
            .map(|(&n, names)| (n, names.as_slice()))
    }
}

/// A catalog designation recognized in a star name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Designation {
    /// `#n`, `HIP n` and `TYC a-b-c` resolve directly to canonical numbers.
    Canonical(u32),
    /// A number in a cross-indexed catalog.
    Catalog(Catalog, u32),
}

/// Parse `#n`, `HIP n`, `TYC a-b-c`, `HD n`, `SAO n`, `Gliese n` or `GJ n`.
///
/// Prefixes are matched ignoring case and may be followed by extra
/// whitespace. Trailing text after the number rejects the designation.
pub fn parse_designation(name: &str) -> Option<Designation> {
    let name = name.trim_end();
    if let Some(rest) = name.strip_prefix('#') {
        return rest.parse().ok().map(Designation::Canonical);
    }
    if let Some(number) = simple_catalog_number(name, "HIP ") {
        return Some(Designation::Canonical(number));
    }
    if let Some(rest) = strip_prefix_ignore_case(name, "TYC ") {
        let mut parts = rest.trim_start().splitn(3, '-');
        let tyc1 = parts.next()?.parse().ok()?;
        let tyc2 = parts.next()?.parse().ok()?;
        let tyc3 = parts.next()?.parse().ok()?;
        return tycho_catalog_number(tyc1, tyc2, tyc3).map(Designation::Canonical);
    }
    for (prefix, catalog) in [
        ("HD ", Catalog::HenryDraper),
        ("SAO ", Catalog::Sao),
        ("Gliese ", Catalog::Gliese),
        ("GJ ", Catalog::Gliese),
    ] {
        if let Some(number) = simple_catalog_number(name, prefix) {
            return Some(Designation::Catalog(catalog, number));
        }
    }
    None
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn simple_catalog_number(name: &str, prefix: &str) -> Option<u32> {
    strip_prefix_ignore_case(name, prefix)?
        .trim_start_matches([' ', '\t'])
        .parse()
        .ok()
}

/// Constellation abbreviation and component suffix of the part of a name
/// following its first word.
fn split_constellation(remainder: &str) -> Option<(&'static str, &str)> {
    let (abbrev, suffix) = parse_constellation(remainder)?;
    (suffix.is_empty() || suffix.starts_with(' ')).then_some((abbrev, suffix))
}

/// Whether the first word of a name is a Flamsteed number or a variable star
/// designation such as `RR` or `V1500`.
///
/// Single-letter variable designations cannot be told apart from Latin Bayer
/// letters and are left to the Bayer lookup.
fn is_flamsteed_or_variable(prefix: &str) -> bool {
    let b = prefix.as_bytes();
    match b.len() {
        0 => false,
        1 => (b'1'..=b'9').contains(&b[0]),
        2 => {
            let two_digits = b[0].is_ascii_digit() && b[0] != b'0' && b[1].is_ascii_digit();
            let letters = b[0].is_ascii_alphabetic()
                && b[1].is_ascii_alphabetic()
                && !b[0].eq_ignore_ascii_case(&b'j')
                && !b[1].eq_ignore_ascii_case(&b'j')
                && b[1] >= b[0];
            two_digits || letters
        }
        _ => {
            let (digits, variable) = match b[0] {
                b'v' | b'V' => (&prefix[1..], true),
                _ => (prefix, false),
            };
            if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
                return false;
            }
            match digits.parse::<u32>() {
                Ok(value) => !variable || value >= FIRST_NUMBERED_VARIABLE,
                Err(_) => false,
            }
        }
    }
}

/// Split a Bayer prefix such as `Alpha2` or `b` into its canonical letter
/// and optional number.
fn parse_bayer_letter(prefix: &str) -> Option<(String, Option<u32>)> {
    let (letter, number) = match prefix.find(|c: char| c.is_ascii_digit()) {
        None => (prefix, None),
        Some(pos) => {
            let digits = &prefix[pos..];
            if !digits.bytes().all(|c| c.is_ascii_digit()) {
                return None;
            }
            (&prefix[..pos], Some(digits.parse().ok()?))
        }
    };
    if letter.is_empty() {
        return None;
    }

    if let Some(greek) = canonical_abbreviation(letter) {
        return Some((greek.to_string(), number));
    }
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some((letter.to_string(), number)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StarNameDatabase {
        let mut db = StarNameDatabase::new();
        db.add(32349, "Sirius");
        db.add(32349, "ALF CMa");
        db.add(32349, "9 CMa");
        db.add(71683, "Rigil Kentaurus");
        db.add(71683, "ALF1 Cen");
        db.add(71681, "Toliman");
        db.add(71681, "ALF2 Cen");
        db.add(104214, "61 Cyg A");
        db.add(27989, "Betelgeuse");
        db.add(27989, "ALF Ori");
        db.add(11767, "Polaris");
        db.add(11767, "ALF UMi");
        db.add(100, "RR Lyr");
        db.add(101, "V1500 Cyg");
        db.add(102, "b Cen");
        db
    }

    #[test]
    fn exact_lookup_ignores_case() {
        let db = sample();
        assert_eq!(db.catalog_number_by_name("sirius"), Some(32349));
        assert_eq!(db.catalog_number_by_name("SIRIUS"), Some(32349));
        assert_eq!(db.first_name(32349), Some("Sirius"));
        assert_eq!(db.names(32349).len(), 3);
        assert!(db.names(1).is_empty());
    }

    #[test]
    fn bayer_variants() {
        let db = sample();
        assert_eq!(db.find_by_name("Alpha Canis Majoris"), Some(32349));
        assert_eq!(db.find_by_name("alf cma"), Some(32349));
        assert_eq!(db.find_by_name("α CMa"), Some(32349));
        assert_eq!(db.find_by_name("Alpha Ursae Minoris"), Some(11767));
        // missing number falls back to the first component
        assert_eq!(db.find_by_name("Alpha Centauri"), Some(71683));
        assert_eq!(db.find_by_name("Alpha2 Cen"), Some(71681));
        assert_eq!(db.find_by_name("b Centauri"), Some(102));
        assert_eq!(db.find_by_name("Beta Centauri"), None);
    }

    #[test]
    fn flamsteed_and_variable_designations() {
        let db = sample();
        assert_eq!(db.find_by_name("9 Canis Majoris"), Some(32349));
        assert_eq!(db.find_by_name("61 Cygni"), Some(104214));
        assert_eq!(db.find_by_name("61 Cyg"), Some(104214));
        assert_eq!(db.find_by_name("RR Lyrae"), Some(100));
        assert_eq!(db.find_by_name("V1500 Cygni"), Some(101));
        assert_eq!(db.find_by_name("62 Cygni"), None);
    }

    #[test]
    fn component_suffix_fallback() {
        let mut db = StarNameDatabase::new();
        db.add(7, "Mizar A");
        assert_eq!(db.find_by_name("Mizar"), Some(7));
        assert_eq!(db.find_by_name("Mizar B"), None);
    }

    #[test]
    fn first_registration_keeps_name() {
        let mut db = StarNameDatabase::new();
        db.add(1, "Twin");
        db.add(2, "twin");
        assert_eq!(db.catalog_number_by_name("Twin"), Some(1));
        assert_eq!(db.first_name(2), Some("twin"));

        db.erase(1);
        assert_eq!(db.catalog_number_by_name("Twin"), None);
        assert!(db.names(1).is_empty());
    }

    #[test]
    fn completion_by_prefix() {
        let db = sample();
        assert_eq!(db.completion("alf"), vec!["ALF CMa", "ALF Ori", "ALF UMi", "ALF1 Cen", "ALF2 Cen"]);
        assert_eq!(db.completion("Si"), vec!["Sirius"]);
        assert!(db.completion("zz").is_empty());
    }

    #[test]
    fn load_name_file() {
        let text = "# star names\n\
                    32349:Sirius:ALF CMa\n\
                    \n\
                    71683 Rigil Kentaurus:ALF1 Cen\n\
                    70890:Proxima Centauri:\n";
        let mut db = StarNameDatabase::new();
        assert_eq!(db.load(text.as_bytes()).unwrap(), 3);
        assert_eq!(db.find_by_name("Alpha Cen"), Some(71683));
        assert_eq!(db.find_by_name("proxima centauri"), Some(70890));
        assert_eq!(db.names(70890).len(), 1);
    }

    #[test]
    fn load_rejects_bad_number() {
        let mut db = StarNameDatabase::new();
        let err = db.load("12:One\nabc:Two\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Syntax { line: 2, .. }));
        assert!(db.is_empty());
    }

    #[test]
    fn designations() {
        assert_eq!(parse_designation("#42"), Some(Designation::Canonical(42)));
        assert_eq!(parse_designation("HIP 32349"), Some(Designation::Canonical(32349)));
        assert_eq!(parse_designation("hip   7"), Some(Designation::Canonical(7)));
        assert_eq!(parse_designation("TYC 1-2-3"), Some(Designation::Canonical(3_000_020_001)));
        assert_eq!(parse_designation("TYC 1-2-5"), None);
        assert_eq!(
            parse_designation("HD 48915"),
            Some(Designation::Catalog(Catalog::HenryDraper, 48915))
        );
        assert_eq!(parse_designation("SAO 151881"), Some(Designation::Catalog(Catalog::Sao, 151881)));
        assert_eq!(parse_designation("GJ 551"), Some(Designation::Catalog(Catalog::Gliese, 551)));
        assert_eq!(parse_designation("HD 48915 B"), None);
        assert_eq!(parse_designation("HDX 1"), None);
        assert_eq!(parse_designation("Sirius"), None);
    }

    #[test]
    fn flamsteed_prefixes() {
        assert!(is_flamsteed_or_variable("9"));
        assert!(!is_flamsteed_or_variable("0"));
        assert!(is_flamsteed_or_variable("61"));
        assert!(!is_flamsteed_or_variable("06"));
        assert!(is_flamsteed_or_variable("RR"));
        assert!(!is_flamsteed_or_variable("RJ"));
        assert!(!is_flamsteed_or_variable("ZA"));
        assert!(is_flamsteed_or_variable("V335"));
        assert!(!is_flamsteed_or_variable("V334"));
        assert!(is_flamsteed_or_variable("123"));
        assert!(!is_flamsteed_or_variable("Alpha"));
    }
}
