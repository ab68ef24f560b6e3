use itertools::Itertools;
use std::collections::BTreeMap;

/// Normalized weights of element `dim`-tuples.
///
/// The raw weight of a tuple is `Π c_e p_e` over its members. Symmetric
/// weights are keyed by sorted tuples and multiplied by the number of
/// distinct orderings; asymmetric weights cover every ordered tuple. Weights
/// are divided by their sum, and are all zero when that sum is zero.
pub fn weights(
    properties: &BTreeMap<String, f64>,
    counts: &BTreeMap<String, usize>,
    dim: usize,
    symmetric: bool,
) -> BTreeMap<Vec<String>, f64> {
    let elements: Vec<&String> = counts.keys().collect();
    let factor = |element: &String| {
        counts.get(element).copied().unwrap_or(0) as f64
            * properties.get(element).copied().unwrap_or(0.0)
    };

    let tuples: Vec<Vec<&String>> = if dim == 0 {
        Vec::new()
    } else if symmetric {
        elements
            .iter()
            .copied()
            .combinations_with_replacement(dim)
            .collect()
    } else {
        (0..dim)
            .map(|_| elements.iter().copied())
            .multi_cartesian_product()
            .collect()
    };

    let mut raw: BTreeMap<Vec<String>, f64> = BTreeMap::new();
    for tuple in tuples {
        let multiplicity = if symmetric { orderings(&tuple) } else { 1.0 };
        let value = multiplicity * tuple.iter().map(|e| factor(*e)).product::<f64>();
        raw.insert(tuple.into_iter().cloned().collect(), value);
    }

    let total: f64 = raw.values().sum();
    for value in raw.values_mut() {
        *value = if total == 0.0 { 0.0 } else { *value / total };
    }
    raw
}

/// Per-element weights, `c_e p_e / Σ c p`.
pub fn element_weights(
    properties: &BTreeMap<String, f64>,
    counts: &BTreeMap<String, usize>,
) -> BTreeMap<String, f64> {
    weights(properties, counts, 1, true)
        .into_iter()
        .filter_map(|(mut key, value)| key.pop().map(|element| (element, value)))
        .collect()
}

/// Number of distinct permutations of a sorted tuple, `d! / Π m_i!`.
fn orderings(tuple: &[&String]) -> f64 {
    let factorial = |n: usize| (1..=n).map(|i| i as f64).product::<f64>();
    let repeats: f64 = tuple
        .iter()
        .chunk_by(|e| **e)
        .into_iter()
        .map(|(_, group)| factorial(group.count()))
        .product();
    factorial(tuple.len()) / repeats
}
