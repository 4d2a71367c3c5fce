//! The 88 IAU constellations.

/// A constellation with its nominative and genitive names and its
/// three-letter abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constellation {
    pub name: &'static str,
    pub genitive: &'static str,
    pub abbreviation: &'static str,
}

const fn c(name: &'static str, genitive: &'static str, abbreviation: &'static str) -> Constellation {
    Constellation {
        name,
        genitive,
        abbreviation,
    }
}

pub static CONSTELLATIONS: [Constellation; 88] = [
    c("Aries", "Arietis", "Ari"),
    c("Taurus", "Tauri", "Tau"),
    c("Gemini", "Geminorum", "Gem"),
    c("Cancer", "Cancri", "Cnc"),
    c("Leo", "Leonis", "Leo"),
    c("Virgo", "Virginis", "Vir"),
    c("Libra", "Librae", "Lib"),
    c("Scorpius", "Scorpii", "Sco"),
    c("Sagittarius", "Sagittarii", "Sgr"),
    c("Capricornus", "Capricorni", "Cap"),
    c("Aquarius", "Aquarii", "Aqr"),
    c("Pisces", "Piscium", "Psc"),
    c("Ursa Major", "Ursae Majoris", "UMa"),
    c("Ursa Minor", "Ursae Minoris", "UMi"),
    c("Bootes", "Bootis", "Boo"),
    c("Orion", "Orionis", "Ori"),
    c("Canis Major", "Canis Majoris", "CMa"),
    c("Canis Minor", "Canis Minoris", "CMi"),
    c("Lepus", "Leporis", "Lep"),
    c("Perseus", "Persei", "Per"),
    c("Andromeda", "Andromedae", "And"),
    c("Cassiopeia", "Cassiopeiae", "Cas"),
    c("Cepheus", "Cephei", "Cep"),
    c("Cetus", "Ceti", "Cet"),
    c("Pegasus", "Pegasi", "Peg"),
    c("Carina", "Carinae", "Car"),
    c("Puppis", "Puppis", "Pup"),
    c("Vela", "Velorum", "Vel"),
    c("Hercules", "Herculis", "Her"),
    c("Hydra", "Hydrae", "Hya"),
    c("Centaurus", "Centauri", "Cen"),
    c("Lupus", "Lupi", "Lup"),
    c("Ara", "Arae", "Ara"),
    c("Ophiuchus", "Ophiuchi", "Oph"),
    c("Serpens", "Serpentis", "Ser"),
    c("Aquila", "Aquilae", "Aql"),
    c("Auriga", "Aurigae", "Aur"),
    c("Corona Australis", "Coronae Australis", "CrA"),
    c("Corona Borealis", "Coronae Borealis", "CrB"),
    c("Corvus", "Corvi", "Crv"),
    c("Crater", "Crateris", "Crt"),
    c("Cygnus", "Cygni", "Cyg"),
    c("Delphinus", "Delphini", "Del"),
    c("Draco", "Draconis", "Dra"),
    c("Equuleus", "Equulei", "Equ"),
    c("Eridanus", "Eridani", "Eri"),
    c("Lyra", "Lyrae", "Lyr"),
    c("Piscis Austrinus", "Piscis Austrini", "PsA"),
    c("Sagitta", "Sagittae", "Sge"),
    c("Triangulum", "Trianguli", "Tri"),
    c("Antlia", "Antliae", "Ant"),
    c("Apus", "Apodis", "Aps"),
    c("Caelum", "Caeli", "Cae"),
    c("Camelopardalis", "Camelopardalis", "Cam"),
    c("Canes Venatici", "Canum Venaticorum", "CVn"),
    c("Chamaeleon", "Chamaeleontis", "Cha"),
    c("Circinus", "Circini", "Cir"),
    c("Columba", "Columbae", "Col"),
    c("Coma Berenices", "Comae Berenices", "Com"),
    c("Crux", "Crucis", "Cru"),
    c("Dorado", "Doradus", "Dor"),
    c("Fornax", "Fornacis", "For"),
    c("Grus", "Gruis", "Gru"),
    c("Horologium", "Horologii", "Hor"),
    c("Hydrus", "Hydri", "Hyi"),
    c("Indus", "Indi", "Ind"),
    c("Lacerta", "Lacertae", "Lac"),
    c("Leo Minor", "Leonis Minoris", "LMi"),
    c("Lynx", "Lyncis", "Lyn"),
    c("Microscopium", "Microscopii", "Mic"),
    c("Monoceros", "Monocerotis", "Mon"),
    c("Mensa", "Mensae", "Men"),
    c("Musca", "Muscae", "Mus"),
    c("Norma", "Normae", "Nor"),
    c("Octans", "Octantis", "Oct"),
    c("Pavo", "Pavonis", "Pav"),
    c("Phoenix", "Phoenicis", "Phe"),
    c("Pictor", "Pictoris", "Pic"),
    c("Pyxis", "Pyxidis", "Pyx"),
    c("Reticulum", "Reticuli", "Ret"),
    c("Sculptor", "Sculptoris", "Scl"),
    c("Scutum", "Scuti", "Sct"),
    c("Sextans", "Sextantis", "Sex"),
    c("Telescopium", "Telescopii", "Tel"),
    c("Triangulum Australe", "Trianguli Australis", "TrA"),
    c("Tucana", "Tucanae", "Tuc"),
    c("Volans", "Volantis", "Vol"),
    c("Vulpecula", "Vulpeculae", "Vul"),
];

/// Match a constellation at the start of `text`.
///
/// The nominative name, the genitive and the abbreviation are all accepted,
/// ignoring case. The longest match wins, so "Ursae Minoris" is never read
/// as "Ursa". Returns the abbreviation and the unmatched remainder.
pub fn parse_constellation(text: &str) -> Option<(&'static str, &str)> {
    let mut best: Option<(&'static str, usize)> = None;
    for con in CONSTELLATIONS.iter() {
        for form in [con.name, con.genitive, con.abbreviation] {
            let longer = best.is_none_or(|(_, len)| form.len() > len);
            if longer && starts_with_ignore_case(text, form) {
                best = Some((con.abbreviation, form.len()));
            }
        }
    }
    best.map(|(abbrev, len)| (abbrev, &text[len..]))
}

/// Look up a constellation by any of its names.
pub fn find_constellation(name: &str) -> Option<&'static Constellation> {
    CONSTELLATIONS.iter().find(|con| {
        [con.name, con.genitive, con.abbreviation]
            .iter()
            .any(|form| form.eq_ignore_ascii_case(name))
    })
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_are_unique() {
        let mut abbrevs: Vec<&str> = CONSTELLATIONS.iter().map(|c| c.abbreviation).collect();
        abbrevs.sort_unstable();
        abbrevs.dedup();
        assert_eq!(abbrevs.len(), 88);
    }

    #[test]
    fn greedy_match() {
        assert_eq!(parse_constellation("Ursae Minoris"), Some(("UMi", "")));
        assert_eq!(parse_constellation("uma B"), Some(("UMa", " B")));
        assert_eq!(parse_constellation("Canum Venaticorum"), Some(("CVn", "")));
        assert_eq!(parse_constellation("Trianguli Australis"), Some(("TrA", "")));
        assert_eq!(parse_constellation("Centauri A"), Some(("Cen", " A")));
        assert_eq!(parse_constellation("Xyz"), None);
    }

    #[test]
    fn lookup_by_any_form() {
        assert_eq!(find_constellation("orionis").map(|c| c.abbreviation), Some("Ori"));
        assert_eq!(find_constellation("CMA").map(|c| c.name), Some("Canis Major"));
        assert!(find_constellation("Orio").is_none());
    }
}
