//! Partnership counts per man.

use std::collections::BTreeMap;

use cohort_population::Population;
use cohort_types::Sex;

/// Men keyed by the number of partnerships they have been in. Only men
/// are counted so each partnership is seen once; a man with no
/// partnerships counts under zero. Illegitimate unions are not
/// partnerships here.
pub fn partnerships_per_male<P: Population>(population: &P) -> BTreeMap<usize, u64> {
    let mut counts = BTreeMap::new();
    for person in population.people().filter(|p| p.sex == Sex::Male) {
        let partnerships = population
            .partnerships_of(person)
            .filter(|p| !p.illegitimate)
            .count();
        let entry = counts.entry(partnerships).or_insert(0_u64);
        *entry = entry.saturating_add(1);
    }
    counts
}
