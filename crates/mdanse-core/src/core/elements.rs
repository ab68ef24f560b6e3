//! Periodic table with the per-element properties used for weighting.
//!
//! Neutron data follow the Sears (1992) tables: coherent scattering lengths in
//! femtometres and incoherent cross-sections in barns.

use phf::phf_map;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    pub symbol: &'static str,
    pub name: &'static str,
    pub atomic_number: u32,
    /// Standard atomic mass in g/mol.
    pub mass: f64,
    /// Bound coherent scattering length in fm.
    pub b_coherent: f64,
    /// Incoherent scattering cross-section in barn.
    pub sigma_incoherent: f64,
}

impl ElementData {
    /// Incoherent scattering length in fm, `sqrt(sigma_inc / 4π)`.
    pub fn b_incoherent(&self) -> f64 {
        (self.sigma_incoherent / (4.0 * PI)).sqrt() * 10.0
    }

    pub fn b_incoherent2(&self) -> f64 {
        let b = self.b_incoherent();
        b * b
    }

    pub fn property(&self, property: ElementProperty) -> f64 {
        match property {
            ElementProperty::Equal => 1.0,
            ElementProperty::Mass => self.mass,
            ElementProperty::AtomicNumber => self.atomic_number as f64,
            ElementProperty::BCoherent => self.b_coherent,
            ElementProperty::BIncoherent => self.b_incoherent(),
            ElementProperty::BIncoherent2 => self.b_incoherent2(),
        }
    }
}

macro_rules! element {
    ($symbol:literal, $name:literal, $z:literal, $mass:literal, $bcoh:literal, $sinc:literal) => {
        ElementData {
            symbol: $symbol,
            name: $name,
            atomic_number: $z,
            mass: $mass,
            b_coherent: $bcoh,
            sigma_incoherent: $sinc,
        }
    };
}

static ELEMENTS: phf::Map<&'static str, ElementData> = phf_map! {
    "h" => element!("H", "hydrogen", 1, 1.00794, -3.7390, 80.26),
    "d" => element!("D", "deuterium", 1, 2.014102, 6.671, 2.05),
    "he" => element!("He", "helium", 2, 4.002602, 3.26, 0.0),
    "li" => element!("Li", "lithium", 3, 6.941, -1.90, 0.92),
    "be" => element!("Be", "beryllium", 4, 9.012182, 7.79, 0.0018),
    "b" => element!("B", "boron", 5, 10.811, 5.30, 1.70),
    "c" => element!("C", "carbon", 6, 12.0107, 6.6460, 0.001),
    "n" => element!("N", "nitrogen", 7, 14.0067, 9.36, 0.50),
    "o" => element!("O", "oxygen", 8, 15.9994, 5.803, 0.0008),
    "f" => element!("F", "fluorine", 9, 18.998403, 5.654, 0.0008),
    "ne" => element!("Ne", "neon", 10, 20.1797, 4.566, 0.008),
    "na" => element!("Na", "sodium", 11, 22.989770, 3.63, 1.62),
    "mg" => element!("Mg", "magnesium", 12, 24.3050, 5.375, 0.08),
    "al" => element!("Al", "aluminium", 13, 26.981538, 3.449, 0.0082),
    "si" => element!("Si", "silicon", 14, 28.0855, 4.1491, 0.004),
    "p" => element!("P", "phosphorus", 15, 30.973761, 5.13, 0.005),
    "s" => element!("S", "sulphur", 16, 32.065, 2.847, 0.007),
    "cl" => element!("Cl", "chlorine", 17, 35.453, 9.5770, 5.3),
    "ar" => element!("Ar", "argon", 18, 39.948, 1.909, 0.225),
    "k" => element!("K", "potassium", 19, 39.0983, 3.67, 0.27),
    "ca" => element!("Ca", "calcium", 20, 40.078, 4.70, 0.05),
    "ti" => element!("Ti", "titanium", 22, 47.867, -3.438, 2.87),
    "fe" => element!("Fe", "iron", 26, 55.845, 9.45, 0.40),
    "ni" => element!("Ni", "nickel", 28, 58.6934, 10.3, 5.2),
    "cu" => element!("Cu", "copper", 29, 63.546, 7.718, 0.55),
    "zn" => element!("Zn", "zinc", 30, 65.38, 5.680, 0.077),
    "br" => element!("Br", "bromine", 35, 79.904, 6.795, 0.10),
    "i" => element!("I", "iodine", 53, 126.90447, 5.28, 0.31),
    "cs" => element!("Cs", "caesium", 55, 132.90545, 5.42, 0.21),
};

// Spelling variants resolve to the canonical lower-case symbol.
static ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "hydrogen" => "h",
    "deuterium" => "d",
    "helium" => "he",
    "lithium" => "li",
    "beryllium" => "be",
    "boron" => "b",
    "carbon" => "c",
    "nitrogen" => "n",
    "oxygen" => "o",
    "fluorine" => "f",
    "neon" => "ne",
    "sodium" => "na",
    "magnesium" => "mg",
    "aluminium" => "al",
    "aluminum" => "al",
    "silicon" => "si",
    "phosphorus" => "p",
    "sulphur" => "s",
    "sulfur" => "s",
    "chlorine" => "cl",
    "argon" => "ar",
    "potassium" => "k",
    "calcium" => "ca",
    "titanium" => "ti",
    "iron" => "fe",
    "nickel" => "ni",
    "copper" => "cu",
    "zinc" => "zn",
    "bromine" => "br",
    "iodine" => "i",
    "caesium" => "cs",
    "cesium" => "cs",
};

/// Looks up an element by symbol or name, case-insensitively.
pub fn lookup(token: &str) -> Option<&'static ElementData> {
    let key = token.trim().to_ascii_lowercase();
    ELEMENTS
        .get(key.as_str())
        .or_else(|| ALIASES.get(key.as_str()).and_then(|s| ELEMENTS.get(*s)))
}

/// Returns the canonical symbol for a symbol or name, if known.
pub fn canonical_symbol(token: &str) -> Option<&'static str> {
    lookup(token).map(|e| e.symbol)
}

/// All known elements, sorted by symbol.
pub fn all() -> Vec<&'static ElementData> {
    let mut elements: Vec<_> = ELEMENTS.values().collect();
    elements.sort_by_key(|e| e.symbol);
    elements
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementProperty {
    Equal,
    Mass,
    AtomicNumber,
    BCoherent,
    BIncoherent,
    BIncoherent2,
}

impl ElementProperty {
    pub const NAMES: &'static [&'static str] = &[
        "equal",
        "mass",
        "atomic_number",
        "b_coherent",
        "b_incoherent",
        "b_incoherent2",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementProperty::Equal => "equal",
            ElementProperty::Mass => "mass",
            ElementProperty::AtomicNumber => "atomic_number",
            ElementProperty::BCoherent => "b_coherent",
            ElementProperty::BIncoherent => "b_incoherent",
            ElementProperty::BIncoherent2 => "b_incoherent2",
        }
    }
}

impl FromStr for ElementProperty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "equal" => Ok(ElementProperty::Equal),
            "mass" => Ok(ElementProperty::Mass),
            "atomic_number" => Ok(ElementProperty::AtomicNumber),
            "b_coherent" => Ok(ElementProperty::BCoherent),
            "b_incoherent" => Ok(ElementProperty::BIncoherent),
            "b_incoherent2" => Ok(ElementProperty::BIncoherent2),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ElementProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_for_symbols_and_names() {
        assert_eq!(lookup("H").unwrap().symbol, "H");
        assert_eq!(lookup("h").unwrap().symbol, "H");
        assert_eq!(lookup("Hydrogen").unwrap().symbol, "H");
        assert_eq!(lookup("CL").unwrap().symbol, "Cl");
        assert!(lookup("unobtainium").is_none());
    }

    #[test]
    fn sulphur_and_sulfur_are_aliases() {
        assert_eq!(canonical_symbol("sulfur"), Some("S"));
        assert_eq!(canonical_symbol("SULPHUR"), Some("S"));
    }

    #[test]
    fn hydrogen_incoherent_length_matches_cross_section() {
        let h = lookup("H").unwrap();
        let b = h.b_incoherent();
        assert!((4.0 * PI * b * b / 100.0 - 80.26).abs() < 1e-9);
        assert!((h.b_incoherent2() - b * b).abs() < 1e-12);
    }

    #[test]
    fn property_parses_known_names() {
        for name in ElementProperty::NAMES {
            let property: ElementProperty = name.parse().unwrap();
            assert_eq!(property.as_str(), *name);
        }
        assert!("weird".parse::<ElementProperty>().is_err());
    }

    #[test]
    fn equal_property_is_one_for_every_element() {
        for element in all() {
            assert_eq!(element.property(ElementProperty::Equal), 1.0);
        }
    }
}
