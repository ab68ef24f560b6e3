use super::system::ChemicalSystem;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternAtom {
    pub element: String,
    /// Exact number of bonds the matched atom must have, if constrained.
    pub degree: Option<usize>,
}

impl PatternAtom {
    pub fn new(element: &str, degree: Option<usize>) -> Self {
        Self {
            element: element.to_string(),
            degree,
        }
    }
}

/// A small bonded graph of element-labelled atoms to be matched against a
/// system's bond graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubstructurePattern {
    pub atoms: Vec<PatternAtom>,
    pub bonds: Vec<(usize, usize)>,
}

impl SubstructurePattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(mut self, element: &str, degree: Option<usize>) -> Self {
        self.atoms.push(PatternAtom::new(element, degree));
        self
    }

    pub fn bond(mut self, a: usize, b: usize) -> Self {
        self.bonds.push((a, b));
        self
    }

    /// H-O-H, with the oxygen bonded to nothing else.
    pub fn water() -> Self {
        Self::new()
            .atom("O", Some(2))
            .atom("H", Some(1))
            .atom("H", Some(1))
            .bond(0, 1)
            .bond(0, 2)
    }

    fn bonded(&self, a: usize, b: usize) -> bool {
        self.bonds
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

impl ChemicalSystem {
    /// Every distinct embedding of `pattern`, each as a sorted atom set.
    ///
    /// Matches that cover the same atoms through a different mapping (for
    /// example the two hydrogens of a water swapped) are reported once.
    pub fn find_substructures(&self, pattern: &SubstructurePattern) -> Vec<Vec<usize>> {
        let mut found = BTreeSet::new();
        if pattern.atoms.is_empty() {
            return Vec::new();
        }
        let mut mapping = Vec::with_capacity(pattern.atoms.len());
        for start in 0..self.atom_count() {
            if self.atom_matches(pattern, 0, start) {
                mapping.push(start);
                self.extend_match(pattern, &mut mapping, &mut found);
                mapping.pop();
            }
        }
        found.into_iter().collect()
    }

    fn atom_matches(&self, pattern: &SubstructurePattern, slot: usize, index: usize) -> bool {
        let Some(atom) = self.atom(index) else {
            return false;
        };
        let wanted = &pattern.atoms[slot];
        atom.is_element(&wanted.element)
            && wanted
                .degree
                .is_none_or(|degree| atom.bonds.len() == degree)
    }

    fn extend_match(
        &self,
        pattern: &SubstructurePattern,
        mapping: &mut Vec<usize>,
        found: &mut BTreeSet<Vec<usize>>,
    ) {
        let slot = mapping.len();
        if slot == pattern.atoms.len() {
            let mut atoms = mapping.clone();
            atoms.sort_unstable();
            found.insert(atoms);
            return;
        }

        // Grow along a pattern bond when possible so candidates stay local.
        let anchor = (0..slot).find(|&earlier| pattern.bonded(earlier, slot));
        let candidates: Vec<usize> = match anchor {
            Some(earlier) => self.neighbours(mapping[earlier]).to_vec(),
            None => (0..self.atom_count()).collect(),
        };

        for candidate in candidates {
            if mapping.contains(&candidate) || !self.atom_matches(pattern, slot, candidate) {
                continue;
            }
            let consistent = (0..slot).all(|earlier| {
                !pattern.bonded(earlier, slot)
                    || self.neighbours(mapping[earlier]).contains(&candidate)
            });
            if !consistent {
                continue;
            }
            mapping.push(candidate);
            self.extend_match(pattern, mapping, found);
            mapping.pop();
        }
    }
}
