//! Greek letters as they appear in Bayer designations.
//!
//! Catalog names store the three-letter canonical abbreviations (`ALF`,
//! `BET`, ...). User input may spell the letter out, use the abbreviation or
//! the letter itself.

struct GreekLetter {
    name: &'static str,
    abbreviation: &'static str,
    glyph: &'static str,
}

const fn g(name: &'static str, abbreviation: &'static str, glyph: &'static str) -> GreekLetter {
    GreekLetter {
        name,
        abbreviation,
        glyph,
    }
}

static GREEK_ALPHABET: [GreekLetter; 24] = [
    g("Alpha", "ALF", "α"),
    g("Beta", "BET", "β"),
    g("Gamma", "GAM", "γ"),
    g("Delta", "DEL", "δ"),
    g("Epsilon", "EPS", "ε"),
    g("Zeta", "ZET", "ζ"),
    g("Eta", "ETA", "η"),
    g("Theta", "TET", "θ"),
    g("Iota", "IOT", "ι"),
    g("Kappa", "KAP", "κ"),
    g("Lambda", "LAM", "λ"),
    g("Mu", "MU", "μ"),
    g("Nu", "NU", "ν"),
    g("Xi", "XI", "ξ"),
    g("Omicron", "OMI", "ο"),
    g("Pi", "PI", "π"),
    g("Rho", "RHO", "ρ"),
    g("Sigma", "SIG", "σ"),
    g("Tau", "TAU", "τ"),
    g("Upsilon", "UPS", "υ"),
    g("Phi", "PHI", "φ"),
    g("Chi", "CHI", "χ"),
    g("Psi", "PSI", "ψ"),
    g("Omega", "OME", "ω"),
];

const SUPERSCRIPT_DIGITS: [&str; 10] = ["⁰", "¹", "²", "³", "⁴", "⁵", "⁶", "⁷", "⁸", "⁹"];

/// Canonical abbreviation for a Greek letter given by name, abbreviation or
/// glyph.
pub fn canonical_abbreviation(letter: &str) -> Option<&'static str> {
    GREEK_ALPHABET
        .iter()
        .find(|l| {
            l.name.eq_ignore_ascii_case(letter)
                || l.abbreviation.eq_ignore_ascii_case(letter)
                || l.glyph == letter
        })
        .map(|l| l.abbreviation)
}

/// Replace a leading Greek letter abbreviation or name with its glyph, and
/// the digits that follow it with superscripts: `ALF2 Cen` becomes `α² Cen`.
///
/// Strings that do not start with a Greek letter are returned unchanged.
pub fn replace_greek_letter_abbr(s: &str) -> String {
    let word_end = s.find(' ').unwrap_or(s.len());
    let letter_end = s[..word_end].trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if letter_end == 0 || !s.starts_with(|c: char| c.is_ascii_uppercase()) {
        return s.to_string();
    }

    let word = &s[..letter_end];
    let Some(letter) = GREEK_ALPHABET
        .iter()
        .find(|l| l.abbreviation.eq_ignore_ascii_case(word) || l.name.eq_ignore_ascii_case(word))
    else {
        return s.to_string();
    };

    let mut out = String::from(letter.glyph);
    let rest = &s[letter_end..];
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    for d in rest[..digits].bytes() {
        out.push_str(SUPERSCRIPT_DIGITS[(d - b'0') as usize]);
    }
    out.push_str(&rest[digits..]);
    out
}
