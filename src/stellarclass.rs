//! Packed stellar classification.
//!
//! A classification is stored in 16 bits exactly as catalog files carry it:
//!
//! ```text
//!  15..12     11..8            7..4       3..0
//! star type | spectral class | subclass | luminosity class
//! ```
//!
//! The spectral class nibble is interpreted according to the star type:
//! normal stars use [`SpectralClass`], white dwarfs use [`WhiteDwarfClass`],
//! and neutron stars and black holes carry no spectral information.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// Subclass nibble value used when the subclass digit is not known.
pub const SUBCLASS_UNKNOWN: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StarType {
    Normal = 0,
    WhiteDwarf = 1,
    NeutronStar = 2,
    BlackHole = 3,
}

/// Spectral classes of normal stars, numbered as in the packed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SpectralClass {
    O = 0,
    B = 1,
    A = 2,
    F = 3,
    G = 4,
    K = 5,
    M = 6,
    R = 7,
    S = 8,
    N = 9,
    WC = 10,
    WN = 11,
    Unknown = 12,
    L = 13,
    T = 14,
    C = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WhiteDwarfClass {
    DA = 0,
    DB = 1,
    DC = 2,
    DO = 3,
    DQ = 4,
    DZ = 5,
    D = 6,
    DX = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum LuminosityClass {
    Ia0 = 0,
    Ia = 1,
    Ib = 2,
    II = 3,
    III = 4,
    IV = 5,
    V = 6,
    VI = 7,
    Unknown = 8,
}

impl SpectralClass {
    const ALL: [SpectralClass; 16] = [
        Self::O,
        Self::B,
        Self::A,
        Self::F,
        Self::G,
        Self::K,
        Self::M,
        Self::R,
        Self::S,
        Self::N,
        Self::WC,
        Self::WN,
        Self::Unknown,
        Self::L,
        Self::T,
        Self::C,
    ];

    fn from_nibble(n: u16) -> Self {
        Self::ALL[(n & 0xf) as usize]
    }

    fn letter(self) -> &'static str {
        match self {
            Self::O => "O",
            Self::B => "B",
            Self::A => "A",
            Self::F => "F",
            Self::G => "G",
            Self::K => "K",
            Self::M => "M",
            Self::R => "R",
            Self::S => "S",
            Self::N => "N",
            Self::WC => "WC",
            Self::WN => "WN",
            Self::Unknown => "?",
            Self::L => "L",
            Self::T => "T",
            Self::C => "C",
        }
    }
}

impl WhiteDwarfClass {
    const ALL: [WhiteDwarfClass; 8] = [
        Self::DA,
        Self::DB,
        Self::DC,
        Self::DO,
        Self::DQ,
        Self::DZ,
        Self::D,
        Self::DX,
    ];

    fn from_nibble(n: u16) -> Option<Self> {
        Self::ALL.get((n & 0xf) as usize).copied()
    }
}

impl LuminosityClass {
    const ALL: [LuminosityClass; 9] = [
        Self::Ia0,
        Self::Ia,
        Self::Ib,
        Self::II,
        Self::III,
        Self::IV,
        Self::V,
        Self::VI,
        Self::Unknown,
    ];

    fn from_nibble(n: u16) -> Self {
        Self::ALL
            .get((n & 0xf) as usize)
            .copied()
            .unwrap_or(Self::Unknown)
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Ia0 => "I-a0",
            Self::Ia => "I-a",
            Self::Ib => "I-b",
            Self::II => "II",
            Self::III => "III",
            Self::IV => "IV",
            Self::V => "V",
            Self::VI => "VI",
            Self::Unknown => "",
        }
    }
}

/// A stellar classification in its packed 16-bit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub struct StellarClass {
    packed: u16,
}

impl Default for StellarClass {
    fn default() -> Self {
        Self::normal(SpectralClass::Unknown, None, LuminosityClass::Unknown)
    }
}

impl StellarClass {
    pub fn normal(class: SpectralClass, subclass: Option<u8>, lum: LuminosityClass) -> Self {
        Self::pack(StarType::Normal, class as u16, subclass, lum)
    }

    pub fn white_dwarf(class: WhiteDwarfClass, subclass: Option<u8>) -> Self {
        Self::pack(
            StarType::WhiteDwarf,
            class as u16,
            subclass,
            LuminosityClass::Unknown,
        )
    }

    pub fn neutron_star() -> Self {
        Self::pack(StarType::NeutronStar, SpectralClass::Unknown as u16, None, LuminosityClass::Unknown)
    }

    pub fn black_hole() -> Self {
        Self::pack(StarType::BlackHole, SpectralClass::Unknown as u16, None, LuminosityClass::Unknown)
    }

    fn pack(star_type: StarType, class: u16, subclass: Option<u8>, lum: LuminosityClass) -> Self {
        let subclass = subclass.filter(|&s| s < SUBCLASS_UNKNOWN).unwrap_or(SUBCLASS_UNKNOWN);
        Self {
            packed: (star_type as u16) << 12
                | (class & 0xf) << 8
                | (subclass as u16 & 0xf) << 4
                | (lum as u16 & 0xf),
        }
    }

    /// Validate a packed value read from a catalog file.
    ///
    /// Returns `None` for star types above black hole and for white dwarf
    /// classes outside the known range.
    pub fn from_packed(packed: u16) -> Option<Self> {
        match packed >> 12 {
            0 => Some(Self { packed }),
            1 => {
                WhiteDwarfClass::from_nibble(packed >> 8)?;
                Some(Self { packed })
            }
            2 => Some(Self::neutron_star()),
            3 => Some(Self::black_hole()),
            _ => None,
        }
    }

    pub fn packed(self) -> u16 {
        self.packed
    }

    pub fn star_type(self) -> StarType {
        match self.packed >> 12 {
            1 => StarType::WhiteDwarf,
            2 => StarType::NeutronStar,
            3 => StarType::BlackHole,
            _ => StarType::Normal,
        }
    }

    /// Spectral class of a normal star.
    pub fn spectral_class(self) -> Option<SpectralClass> {
        match self.star_type() {
            StarType::Normal => Some(SpectralClass::from_nibble(self.packed >> 8)),
            _ => None,
        }
    }

    pub fn white_dwarf_class(self) -> Option<WhiteDwarfClass> {
        match self.star_type() {
            StarType::WhiteDwarf => WhiteDwarfClass::from_nibble(self.packed >> 8),
            _ => None,
        }
    }

    pub fn subclass(self) -> Option<u8> {
        let s = ((self.packed >> 4) & 0xf) as u8;
        (s < SUBCLASS_UNKNOWN).then_some(s)
    }

    pub fn luminosity_class(self) -> LuminosityClass {
        match self.star_type() {
            StarType::Normal => LuminosityClass::from_nibble(self.packed),
            _ => LuminosityClass::Unknown,
        }
    }

    /// Parse a spectral type string such as `G2V`, `K0III`, `DA2`, `sdB5`,
    /// `WC8`, `Q` (neutron star) or `X` (black hole).
    ///
    /// The parser is forgiving: it keeps whatever it recognized before the
    /// first unexpected character and leaves the rest unknown.
    pub fn parse(st: &str) -> Self {
        let bytes = st.as_bytes();
        let mut i = 0usize;
        let mut state = ParseState::Begin;
        let mut star_type = StarType::Normal;
        let mut class = SpectralClass::Unknown as u16;
        let mut lum = LuminosityClass::Unknown;
        let mut subclass: Option<u8> = None;

        while state != ParseState::End {
            let c = bytes.get(i).copied().unwrap_or(0);
            match state {
                ParseState::Begin => match c {
                    b'Q' => {
                        star_type = StarType::NeutronStar;
                        state = ParseState::End;
                    }
                    b'X' => {
                        star_type = StarType::BlackHole;
                        state = ParseState::End;
                    }
                    b'D' => {
                        star_type = StarType::WhiteDwarf;
                        i += 1;
                        state = ParseState::WdType;
                    }
                    b's' => {
                        i += 1;
                        state = ParseState::SubdwarfPrefix;
                    }
                    b'?' => state = ParseState::End,
                    _ => state = ParseState::Class,
                },
                ParseState::SubdwarfPrefix => {
                    if c == b'd' {
                        lum = LuminosityClass::VI;
                        i += 1;
                        state = ParseState::Class;
                    } else {
                        state = ParseState::End;
                    }
                }
                ParseState::Class => {
                    let parsed = match c {
                        b'W' => {
                            i += 1;
                            state = ParseState::WolfRayet;
                            continue;
                        }
                        b'O' => Some(SpectralClass::O),
                        b'B' => Some(SpectralClass::B),
                        b'A' => Some(SpectralClass::A),
                        b'F' => Some(SpectralClass::F),
                        b'G' => Some(SpectralClass::G),
                        b'K' => Some(SpectralClass::K),
                        b'M' => Some(SpectralClass::M),
                        b'R' => Some(SpectralClass::R),
                        b'S' => Some(SpectralClass::S),
                        b'N' => Some(SpectralClass::N),
                        b'L' => Some(SpectralClass::L),
                        b'T' => Some(SpectralClass::T),
                        b'C' => Some(SpectralClass::C),
                        // Y dwarfs have no slot in the packed layout.
                        b'Y' => Some(SpectralClass::Unknown),
                        _ => None,
                    };
                    match parsed {
                        Some(sc) => {
                            class = sc as u16;
                            i += 1;
                            state = ParseState::Subclass;
                        }
                        None => state = ParseState::End,
                    }
                }
                ParseState::WolfRayet => {
                    class = match c {
                        b'C' => {
                            i += 1;
                            SpectralClass::WC as u16
                        }
                        b'N' => {
                            i += 1;
                            SpectralClass::WN as u16
                        }
                        b'O' => {
                            i += 1;
                            SpectralClass::Unknown as u16
                        }
                        _ => SpectralClass::WC as u16,
                    };
                    state = ParseState::Subclass;
                }
                ParseState::Subclass => {
                    if c.is_ascii_digit() {
                        subclass = Some(c - b'0');
                        i += 1;
                        state = ParseState::SubclassDecimal;
                    } else {
                        state = ParseState::LumBegin;
                    }
                }
                ParseState::SubclassDecimal => {
                    if c == b'.' {
                        i += 1;
                        state = ParseState::SubclassFinal;
                    } else {
                        state = ParseState::LumBegin;
                    }
                }
                ParseState::SubclassFinal => {
                    state = if c.is_ascii_digit() {
                        ParseState::LumBegin
                    } else {
                        ParseState::End
                    };
                    i += 1;
                }
                ParseState::LumBegin => {
                    match c {
                        b'I' => state = ParseState::LumI,
                        b'V' => state = ParseState::LumV,
                        b' ' => {}
                        _ => state = ParseState::End,
                    }
                    i += 1;
                }
                ParseState::LumI => {
                    match c {
                        b'I' => state = ParseState::LumII,
                        b'V' => {
                            lum = LuminosityClass::IV;
                            state = ParseState::End;
                        }
                        b'a' => state = ParseState::LumIa,
                        b'-' => state = ParseState::LumIDash,
                        _ => {
                            lum = LuminosityClass::Ib;
                            state = ParseState::End;
                        }
                    }
                    i += 1;
                }
                ParseState::LumII => {
                    lum = if c == b'I' {
                        LuminosityClass::III
                    } else {
                        LuminosityClass::II
                    };
                    state = ParseState::End;
                }
                ParseState::LumIDash => {
                    if c == b'a' {
                        i += 1;
                        state = ParseState::LumIDashA;
                    } else {
                        lum = LuminosityClass::Ib;
                        state = ParseState::End;
                    }
                }
                ParseState::LumIa => {
                    if c == b'-' {
                        i += 1;
                        state = ParseState::LumIDashA;
                    } else {
                        lum = if c == b'0' {
                            LuminosityClass::Ia0
                        } else {
                            LuminosityClass::Ia
                        };
                        state = ParseState::End;
                    }
                }
                ParseState::LumIDashA => {
                    lum = if c == b'0' {
                        LuminosityClass::Ia0
                    } else {
                        LuminosityClass::Ia
                    };
                    state = ParseState::End;
                }
                ParseState::LumV => {
                    lum = if c == b'I' {
                        LuminosityClass::VI
                    } else {
                        LuminosityClass::V
                    };
                    state = ParseState::End;
                }
                ParseState::WdType => {
                    let wd = match c {
                        b'A' => Some(WhiteDwarfClass::DA),
                        b'B' => Some(WhiteDwarfClass::DB),
                        b'C' => Some(WhiteDwarfClass::DC),
                        b'O' => Some(WhiteDwarfClass::DO),
                        b'Q' => Some(WhiteDwarfClass::DQ),
                        b'X' => Some(WhiteDwarfClass::DX),
                        b'Z' => Some(WhiteDwarfClass::DZ),
                        _ => None,
                    };
                    if wd.is_some() {
                        i += 1;
                    }
                    class = wd.unwrap_or(WhiteDwarfClass::D) as u16;
                    state = ParseState::WdExtended;
                }
                ParseState::WdExtended => match c {
                    // Secondary composition letters plus the V, P, H and E
                    // peculiarity flags carry no packed information.
                    b'A' | b'B' | b'C' | b'O' | b'Q' | b'Z' | b'X' | b'V' | b'P' | b'H'
                    | b'E' => i += 1,
                    _ => state = ParseState::WdSubclass,
                },
                ParseState::WdSubclass => {
                    if c.is_ascii_digit() {
                        subclass = Some(c - b'0');
                    }
                    state = ParseState::End;
                }
                ParseState::End => {}
            }
        }

        match star_type {
            StarType::Normal => Self::pack(StarType::Normal, class, subclass, lum),
            StarType::WhiteDwarf => {
                Self::pack(StarType::WhiteDwarf, class, subclass, LuminosityClass::Unknown)
            }
            StarType::NeutronStar => Self::neutron_star(),
            StarType::BlackHole => Self::black_hole(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Begin,
    End,
    SubdwarfPrefix,
    Class,
    WolfRayet,
    Subclass,
    SubclassDecimal,
    SubclassFinal,
    LumBegin,
    LumI,
    LumII,
    LumIDash,
    LumIa,
    LumIDashA,
    LumV,
    WdType,
    WdExtended,
    WdSubclass,
}

impl fmt::Display for StellarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.star_type() {
            StarType::NeutronStar => return f.write_str("Q"),
            StarType::BlackHole => return f.write_str("X"),
            StarType::WhiteDwarf => {
                let class = self.white_dwarf_class().unwrap_or(WhiteDwarfClass::D);
                write!(f, "{class:?}")?;
            }
            StarType::Normal => {
                let class = self.spectral_class().unwrap_or(SpectralClass::Unknown);
                f.write_str(class.letter())?;
            }
        }
        if let Some(s) = self.subclass() {
            write!(f, "{s}")?;
        }
        f.write_str(self.luminosity_class().suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_main_sequence_star() {
        let sun = StellarClass::parse("G2V");
        assert_eq!(sun.star_type(), StarType::Normal);
        assert_eq!(sun.spectral_class(), Some(SpectralClass::G));
        assert_eq!(sun.subclass(), Some(2));
        assert_eq!(sun.luminosity_class(), LuminosityClass::V);
        assert_eq!(sun.packed(), 0x0426);
        assert_eq!(sun.to_string(), "G2V");
    }

    #[test]
    fn parses_luminosity_variants() {
        assert_eq!(StellarClass::parse("K0III").luminosity_class(), LuminosityClass::III);
        assert_eq!(StellarClass::parse("B8Ia").luminosity_class(), LuminosityClass::Ia);
        assert_eq!(StellarClass::parse("B8Ia0").luminosity_class(), LuminosityClass::Ia0);
        assert_eq!(StellarClass::parse("M2Iab").luminosity_class(), LuminosityClass::Ia);
        assert_eq!(StellarClass::parse("F5IV").luminosity_class(), LuminosityClass::IV);
        assert_eq!(StellarClass::parse("A1 V").luminosity_class(), LuminosityClass::V);
        assert_eq!(StellarClass::parse("M1.5II").luminosity_class(), LuminosityClass::II);
        assert_eq!(StellarClass::parse("M1.5II").subclass(), Some(1));
    }

    #[test]
    fn parses_exotic_types() {
        let sd = StellarClass::parse("sdB5");
        assert_eq!(sd.spectral_class(), Some(SpectralClass::B));
        assert_eq!(sd.luminosity_class(), LuminosityClass::VI);

        let wd = StellarClass::parse("DA2");
        assert_eq!(wd.star_type(), StarType::WhiteDwarf);
        assert_eq!(wd.white_dwarf_class(), Some(WhiteDwarfClass::DA));
        assert_eq!(wd.subclass(), Some(2));
        assert_eq!(wd.to_string(), "DA2");

        assert_eq!(StellarClass::parse("DQZ8").white_dwarf_class(), Some(WhiteDwarfClass::DQ));
        assert_eq!(StellarClass::parse("D").white_dwarf_class(), Some(WhiteDwarfClass::D));
        assert_eq!(StellarClass::parse("WC8").spectral_class(), Some(SpectralClass::WC));
        assert_eq!(StellarClass::parse("WN").spectral_class(), Some(SpectralClass::WN));
        assert_eq!(StellarClass::parse("Q").star_type(), StarType::NeutronStar);
        assert_eq!(StellarClass::parse("X").star_type(), StarType::BlackHole);
    }

    #[test]
    fn unknown_input_stays_unknown() {
        for st in ["?", "", "zz", "sX"] {
            let sc = StellarClass::parse(st);
            assert_eq!(sc.spectral_class(), Some(SpectralClass::Unknown), "{st}");
            assert_eq!(sc.subclass(), None);
        }
        assert_eq!(StellarClass::default().to_string(), "?");
    }

    #[test]
    fn validates_packed_values() {
        assert!(StellarClass::from_packed(0x0426).is_some());
        assert!(StellarClass::from_packed(0x17a8).is_some());
        assert!(StellarClass::from_packed(0x18a8).is_none());
        assert!(StellarClass::from_packed(0x4000).is_none());
        assert_eq!(
            StellarClass::from_packed(0x2fff).map(|s| s.star_type()),
            Some(StarType::NeutronStar)
        );
    }
}
