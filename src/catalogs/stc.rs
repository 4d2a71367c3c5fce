//! Reader for brace-delimited star catalog text files.
//!
//! A file is a sequence of entries:
//!
//! ```text
//! # comment
//! [Add|Replace|Modify] [Star|Barycenter] [number] ["name:alias"]
//! {
//!     RA 101.287         # degrees unless a unit is given: RA <h> 6.75
//!     Dec -16.716
//!     Distance 8.6       # light-years, or Distance <pc> 2.64
//!     SpectralType "A1V"
//!     AppMag -1.46
//! }
//! ```
//!
//! Property values are numbers, quoted strings, bare names, `[ ]` arrays or
//! nested `{ }` hashes. A key may carry a unit in angle brackets.
//! Structural errors abort the file; checking the properties of an entry is
//! left to the caller.

use crate::error::LoadError;

/// Maximum number of names taken from an entry header.
pub const MAX_NAMES_PER_ENTRY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Name(String),
    BeginGroup,
    EndGroup,
    BeginArray,
    EndArray,
    BeginUnits,
    EndUnits,
    Equals,
    End,
}

struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    pushed: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            pushed: None,
        }
    }

    fn error(&self, message: impl Into<String>) -> LoadError {
        LoadError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn push_back(&mut self, token: Token) {
        self.pushed = Some(token);
    }

    fn next(&mut self) -> Result<Token, LoadError> {
        if let Some(token) = self.pushed.take() {
            return Ok(token);
        }
        self.skip_blank();
        let Some(c) = self.peek_char() else {
            return Ok(Token::End);
        };

        let simple = match c {
            '{' => Some(Token::BeginGroup),
            '}' => Some(Token::EndGroup),
            '[' => Some(Token::BeginArray),
            ']' => Some(Token::EndArray),
            '<' => Some(Token::BeginUnits),
            '>' => Some(Token::EndUnits),
            '=' => Some(Token::Equals),
            _ => None,
        };
        if let Some(token) = simple {
            self.bump();
            return Ok(token);
        }

        if c == '"' {
            self.bump();
            return self.read_string();
        }
        if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' {
            return self.read_number();
        }
        if c.is_alphabetic() || c == '_' {
            let start = self.pos;
            while self
                .peek_char()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                self.bump();
            }
            return Ok(Token::Name(self.text[start..self.pos].to_string()));
        }
        Err(self.error(format!("unexpected character '{c}'")))
    }

    fn read_string(&mut self) -> Result<Token, LoadError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(Token::String(s)),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some(c @ ('"' | '\\')) => s.push(c),
                    Some(c) => return Err(self.error(format!("unknown escape '\\{c}'"))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LoadError> {
        let start = self.pos;
        if matches!(self.peek_char(), Some('-' | '+')) {
            self.bump();
        }
        while let Some(c) = self.peek_char() {
            let exponent_sign = matches!(c, '-' | '+')
                && matches!(self.text[..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.text[start..self.pos];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("bad number '{text}'")))
    }
}

// ── Values ──────────────────────────────────────────────────────────────────

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Name(String),
    Array(Vec<Value>),
    Hash(Hash),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Name(_) => "name",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
        }
    }
}

/// A property with its optional unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub unit: Option<String>,
    pub value: Value,
}

/// Ordered key/value properties of an entry. When a key repeats the last
/// occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hash {
    properties: Vec<Property>,
}

/// Angle units, in degrees.
const ANGLE_UNITS: &[(&str, f64)] = &[
    ("deg", 1.0),
    ("h", 15.0),
    ("rad", 180.0 / std::f64::consts::PI),
    ("arcmin", 1.0 / 60.0),
    ("arcsec", 1.0 / 3600.0),
    ("mas", 1.0 / 3_600_000.0),
];

/// Length units, in light-years.
const LENGTH_UNITS: &[(&str, f64)] = &[
    ("ly", 1.0),
    ("pc", 3.261_563_777),
    ("kpc", 3_261.563_777),
    ("mpc", 3_261_563.777),
    ("au", 1.0 / 63_241.077),
    ("km", 1.0 / 9_460_730_472_580.8),
    ("m", 1.0 / 9_460_730_472_580_800.0),
];

impl Hash {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.properties.iter().rev().find(|p| p.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Numeric property; `Err` carries a description when the value has
    /// the wrong type.
    pub fn number(&self, key: &str) -> Result<Option<f64>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(p) => p
                .value
                .as_number()
                .map(Some)
                .ok_or_else(|| format!("expected a number, found a {}", p.value.kind())),
        }
    }

    pub fn string(&self, key: &str) -> Result<Option<&str>, String> {
        match self.get(key) {
            None => Ok(None),
            Some(p) => p
                .value
                .as_str()
                .map(Some)
                .ok_or_else(|| format!("expected a string, found a {}", p.value.kind())),
        }
    }

    /// Angle in degrees.
    pub fn angle_deg(&self, key: &str) -> Result<Option<f64>, String> {
        self.scaled(key, ANGLE_UNITS)
    }

    /// Length in light-years.
    pub fn length_ly(&self, key: &str) -> Result<Option<f64>, String> {
        self.scaled(key, LENGTH_UNITS)
    }

    /// Three-component vector of lengths in light-years.
    pub fn length_vector_ly(&self, key: &str) -> Result<Option<[f64; 3]>, String> {
        let Some(p) = self.get(key) else {
            return Ok(None);
        };
        let scale = unit_scale(p, LENGTH_UNITS)?;
        match &p.value {
            Value::Array(items) if items.len() == 3 => {
                let mut v = [0.0; 3];
                for (out, item) in v.iter_mut().zip(items) {
                    *out = item.as_number().ok_or("vector component is not a number")? * scale;
                }
                Ok(Some(v))
            }
            other => Err(format!("expected a 3-vector, found a {}", other.kind())),
        }
    }

    fn scaled(&self, key: &str, units: &[(&str, f64)]) -> Result<Option<f64>, String> {
        let Some(p) = self.get(key) else {
            return Ok(None);
        };
        let scale = unit_scale(p, units)?;
        let n = p
            .value
            .as_number()
            .ok_or_else(|| format!("expected a number, found a {}", p.value.kind()))?;
        Ok(Some(n * scale))
    }
}

fn unit_scale(p: &Property, units: &[(&str, f64)]) -> Result<f64, String> {
    match &p.unit {
        None => Ok(1.0),
        Some(unit) => units
            .iter()
            .find(|(name, _)| name == unit)
            .map(|&(_, scale)| scale)
            .ok_or_else(|| format!("unknown unit '{unit}'")),
    }
}

// ── Entries ─────────────────────────────────────────────────────────────────

/// How an entry combines with a star that is already loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Create a star, or replace one with the same catalog number.
    #[default]
    Add,
    /// Replace an existing star, creating it when absent.
    Replace,
    /// Change properties of an existing star.
    Modify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Line of the entry header.
    pub line: usize,
    pub disposition: Disposition,
    /// `false` for barycenter entries.
    pub is_star: bool,
    pub catalog_number: Option<u32>,
    pub names: Vec<String>,
    pub properties: Hash,
}

impl Entry {
    /// Label used in diagnostics.
    pub fn label(&self) -> String {
        match (self.catalog_number, self.names.first()) {
            (Some(n), _) => format!("#{n} (line {})", self.line),
            (None, Some(name)) => format!("\"{name}\" (line {})", self.line),
            (None, None) => format!("entry at line {}", self.line),
        }
    }
}

/// Streaming reader over the entries of a text catalog.
pub struct Reader<'a> {
    tokenizer: Tokenizer<'a>,
    failed: bool,
}

impl<'a> Reader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(text),
            failed: false,
        }
    }

    fn read_entry(&mut self) -> Result<Option<Entry>, LoadError> {
        let mut token = self.tokenizer.next()?;
        if token == Token::End {
            return Ok(None);
        }
        let line = self.tokenizer.line;

        let mut disposition = Disposition::Add;
        if let Token::Name(name) = &token {
            let d = match name.as_str() {
                "Add" => Some(Disposition::Add),
                "Replace" => Some(Disposition::Replace),
                "Modify" => Some(Disposition::Modify),
                _ => None,
            };
            if let Some(d) = d {
                disposition = d;
                token = self.tokenizer.next()?;
            }
        }

        let mut is_star = true;
        if let Token::Name(name) = &token {
            is_star = match name.as_str() {
                "Star" => true,
                "Barycenter" => false,
                other => return Err(self.tokenizer.error(format!("unrecognized object type '{other}'"))),
            };
            token = self.tokenizer.next()?;
        }

        let mut catalog_number = None;
        if let Token::Number(n) = token {
            if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                return Err(self.tokenizer.error(format!("bad catalog number {n}")));
            }
            catalog_number = Some(n as u32);
            token = self.tokenizer.next()?;
        }

        let mut names: Vec<String> = Vec::new();
        if let Token::String(s) = &token {
            for name in s.split(':').filter(|n| !n.is_empty()) {
                if names.len() == MAX_NAMES_PER_ENTRY {
                    break;
                }
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            token = self.tokenizer.next()?;
        } else if catalog_number.is_none() {
            return Err(self.tokenizer.error("entry missing name and catalog number"));
        }

        if token != Token::BeginGroup {
            return Err(self.tokenizer.error("expected '{' after entry header"));
        }
        let properties = self.read_hash()?;

        Ok(Some(Entry {
            line,
            disposition,
            is_star,
            catalog_number,
            names,
            properties,
        }))
    }

    /// Read hash contents after the opening brace.
    fn read_hash(&mut self) -> Result<Hash, LoadError> {
        let mut hash = Hash::default();
        loop {
            let key = match self.tokenizer.next()? {
                Token::EndGroup => return Ok(hash),
                Token::Name(key) => key,
                Token::End => return Err(self.tokenizer.error("unexpected end of file in hash")),
                other => return Err(self.tokenizer.error(format!("expected a key, found {other:?}"))),
            };

            let mut unit = None;
            let mut token = self.tokenizer.next()?;
            if token == Token::BeginUnits {
                match self.tokenizer.next()? {
                    Token::Name(u) => unit = Some(u),
                    _ => return Err(self.tokenizer.error(format!("bad unit for '{key}'"))),
                }
                if self.tokenizer.next()? != Token::EndUnits {
                    return Err(self.tokenizer.error(format!("unterminated unit for '{key}'")));
                }
                token = self.tokenizer.next()?;
            }
            if token != Token::Equals {
                self.tokenizer.push_back(token);
            }

            let value = self.read_value()?;
            hash.properties.push(Property { key, unit, value });
        }
    }

    fn read_value(&mut self) -> Result<Value, LoadError> {
        match self.tokenizer.next()? {
            Token::Number(n) => Ok(Value::Number(n)),
            Token::String(s) => Ok(Value::String(s)),
            Token::Name(n) => Ok(Value::Name(n)),
            Token::BeginGroup => self.read_hash().map(Value::Hash),
            Token::BeginArray => {
                let mut items = Vec::new();
                loop {
                    let token = self.tokenizer.next()?;
                    if token == Token::EndArray {
                        return Ok(Value::Array(items));
                    }
                    self.tokenizer.push_back(token);
                    items.push(self.read_value()?);
                }
            }
            Token::End => Err(self.tokenizer.error("unexpected end of file")),
            other => Err(self.tokenizer.error(format!("unexpected {other:?}"))),
        }
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Entry, LoadError>;

    /// Yields entries until the end of input; after a syntax error the
    /// reader is exhausted.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(text: &str) -> Vec<Result<Entry, LoadError>> {
        Reader::new(text).collect()
    }

    #[test]
    fn full_entry() {
        let text = r#"
            # Sirius
            32349 "Sirius:ALF CMa"
            {
                RA 101.287
                Dec -16.716
                Distance 8.6
                SpectralType "A1V"
                AppMag -1.46
            }
        "#;
        let all = entries(text);
        assert_eq!(all.len(), 1);
        let e = all[0].as_ref().unwrap();
        assert_eq!(e.line, 3);
        assert_eq!(e.disposition, Disposition::Add);
        assert!(e.is_star);
        assert_eq!(e.catalog_number, Some(32349));
        assert_eq!(e.names, vec!["Sirius", "ALF CMa"]);
        assert_eq!(e.properties.number("AppMag"), Ok(Some(-1.46)));
        assert_eq!(e.properties.string("SpectralType"), Ok(Some("A1V")));
        assert_eq!(e.properties.angle_deg("Dec"), Ok(Some(-16.716)));
        assert!(e.properties.number("AbsMag").unwrap().is_none());
        assert!(e.properties.number("SpectralType").is_err());
    }

    #[test]
    fn dispositions_and_units() {
        let text = r#"
            Modify 71683 { RA <h> 14.5 Distance <pc> 2.0 }
            Replace Star "Nameless" { Position [ 1 2 3e1 ] }
            Barycenter 900 { }
        "#;
        let all: Vec<Entry> = entries(text).into_iter().map(Result::unwrap).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].disposition, Disposition::Modify);
        assert_eq!(all[0].properties.angle_deg("RA"), Ok(Some(217.5)));
        let d = all[0].properties.length_ly("Distance").unwrap().unwrap();
        assert!((d - 6.523_127_554).abs() < 1e-6);

        assert_eq!(all[1].disposition, Disposition::Replace);
        assert_eq!(all[1].catalog_number, None);
        assert_eq!(all[1].properties.length_vector_ly("Position"), Ok(Some([1.0, 2.0, 30.0])));

        assert!(!all[2].is_star);
        assert_eq!(all[2].catalog_number, Some(900));
    }

    #[test]
    fn nested_values_and_duplicate_names() {
        let text = r#"1 "A:B:A::C" { Info { Note "x" } Tags [ "a" "b" ] Key = 4 Key 5 }"#;
        let e = entries(text).remove(0).unwrap();
        assert_eq!(e.names, vec!["A", "B", "C"]);
        assert!(matches!(e.properties.get("Info").map(|p| &p.value), Some(Value::Hash(_))));
        assert_eq!(e.properties.number("Key"), Ok(Some(5.0)));
    }

    #[test]
    fn structural_errors_stop_the_reader() {
        let all = entries("1 { RA 1 }\n{ RA 2 }\n3 { RA 3 }");
        assert_eq!(all.len(), 2);
        assert!(all[0].is_ok());
        assert!(matches!(all[1], Err(LoadError::Syntax { line: 2, .. })));

        let all = entries("1 { RA 1");
        assert!(matches!(all[0], Err(LoadError::Syntax { .. })));

        let all = entries("1 \"unterminated { }");
        assert!(matches!(all[0], Err(LoadError::Syntax { .. })));

        let all = entries("Planet 1 { }");
        assert!(matches!(all[0], Err(LoadError::Syntax { .. })));
    }

    #[test]
    fn bad_unit_reported_on_access() {
        let e = entries("1 { Distance <furlong> 3 }").remove(0).unwrap();
        assert!(e.properties.length_ly("Distance").is_err());
    }
}
