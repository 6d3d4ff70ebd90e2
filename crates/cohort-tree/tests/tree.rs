//! Building the contingency tree over a small hand-made population.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use chrono::NaiveDate;

use cohort_population::PeopleCollection;
use cohort_stats::{DemographicConstants, LoadOptions, PopulationStatistics};
use cohort_tree::{
    ContingencyTree, Dimension, NodeLabel, SeparationOption, SourceType, TreeError,
};
use cohort_types::{IntegerRange, Sex};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn statistics() -> PopulationStatistics {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("data")
        .join("statistics");
    PopulationStatistics::load(
        &dir,
        LoadOptions {
            consistency_tolerance: 1e-6,
            constants: DemographicConstants::default(),
        },
    )
    .unwrap()
}

/// A couple with two children who separate after the second birth, an old
/// man who dies in 1856, and an infant born and dead in 1856.
fn population() -> PeopleCollection {
    let mut pop = PeopleCollection::new();
    let father = pop.add_person(Sex::Male, date(1820, 5, 1), None).unwrap();
    let mother = pop.add_person(Sex::Female, date(1825, 3, 1), None).unwrap();
    let couple = pop.form_partnership(father, mother, date(1850, 1, 1)).unwrap();
    pop.add_person(Sex::Male, date(1851, 4, 1), Some(couple)).unwrap();
    pop.add_person(Sex::Female, date(1855, 6, 1), Some(couple)).unwrap();
    pop.separate(couple, date(1855, 8, 1)).unwrap();

    let old = pop.add_person(Sex::Male, date(1800, 1, 1), None).unwrap();
    pop.record_death(old, date(1856, 2, 1)).unwrap();
    let infant = pop.add_person(Sex::Male, date(1856, 3, 1), None).unwrap();
    pop.record_death(infant, date(1856, 9, 1)).unwrap();
    pop
}

fn build() -> ContingencyTree {
    ContingencyTree::build(&population(), &statistics(), 1855, 1857).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn mother_1855() -> Vec<NodeLabel> {
    vec![
        NodeLabel::YearOfBirth(1825),
        NodeLabel::Sex(Sex::Female),
        NodeLabel::Age(30),
        NodeLabel::Died(false),
        NodeLabel::PreviousChildrenInPartnership(IntegerRange::single(1)),
        NodeLabel::PreviousChildrenInAnyPartnership(IntegerRange::single(1)),
        NodeLabel::ChildrenInYear(true),
        NodeLabel::NumberOfChildrenInYear(IntegerRange::single(1)),
        NodeLabel::ChildrenInPartnership(IntegerRange::single(2)),
        NodeLabel::Separation(SeparationOption::Yes),
        NodeLabel::NewPartnerAge(None),
    ]
}

// ---------------------------------------------------------------------------
// Simulated branch
// ---------------------------------------------------------------------------

#[test]
fn sim_root_counts_person_years() {
    let tree = build();
    // 1855: both parents, the son and the old man. The daughter is born in
    // 1855 and survives, so she first counts in 1856 along with the infant
    // who is born and dies that year.
    let root = tree.node(tree.root(SourceType::Sim)).unwrap();
    assert!(close(root.count(), 10.0));
}

#[test]
fn mother_classified_through_every_dimension() {
    let tree = build();
    let found = tree.count_at(SourceType::Sim, &mother_1855()).unwrap();
    assert!(close(found, 1.0));
}

#[test]
fn separated_mother_has_no_partnership_next_year() {
    let tree = build();
    let path = [
        NodeLabel::YearOfBirth(1825),
        NodeLabel::Sex(Sex::Female),
        NodeLabel::Age(31),
        NodeLabel::Died(false),
        NodeLabel::PreviousChildrenInPartnership(IntegerRange::single(0)),
        NodeLabel::PreviousChildrenInAnyPartnership(IntegerRange::single(2)),
        NodeLabel::ChildrenInYear(false),
        NodeLabel::NumberOfChildrenInYear(IntegerRange::single(0)),
        NodeLabel::ChildrenInPartnership(IntegerRange::single(0)),
        NodeLabel::Separation(SeparationOption::NotApplicable),
        NodeLabel::NewPartnerAge(None),
    ];
    assert!(close(tree.count_at(SourceType::Sim, &path).unwrap(), 1.0));
}

#[test]
fn deaths_and_infants_are_counted() {
    let tree = build();
    let old = [
        NodeLabel::YearOfBirth(1800),
        NodeLabel::Sex(Sex::Male),
        NodeLabel::Age(56),
        NodeLabel::Died(true),
    ];
    assert!(close(tree.count_at(SourceType::Sim, &old).unwrap(), 1.0));

    let infant = [
        NodeLabel::YearOfBirth(1856),
        NodeLabel::Sex(Sex::Male),
        NodeLabel::Age(0),
        NodeLabel::Died(true),
    ];
    assert!(close(tree.count_at(SourceType::Sim, &infant).unwrap(), 1.0));
}

#[test]
fn men_stop_after_died() {
    let rows = build().rows_for(SourceType::Sim).unwrap();
    assert!(!rows.is_empty());
    for row in rows.iter().filter(|r| r.value(Dimension::Sex) == Some("M")) {
        assert!(row.value(Dimension::Died).is_some());
        assert_eq!(row.value(Dimension::PreviousChildrenInPartnership), None);
    }
}

#[test]
fn building_twice_gives_identical_rows() {
    let first = build().rows().unwrap();
    let second = build().rows().unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Expected branch
// ---------------------------------------------------------------------------

#[test]
fn expected_branch_seeds_from_year_before_start() {
    let tree = build();
    let seeded = [
        NodeLabel::YearOfBirth(1825),
        NodeLabel::Sex(Sex::Female),
        NodeLabel::Age(29),
    ];
    assert!(close(tree.count_at(SourceType::Stat, &seeded).unwrap(), 1.0));

    // Four people alive in 1854, plus their projected survivors.
    let root = tree.node(tree.root(SourceType::Stat)).unwrap();
    assert!(root.count() > 4.0);
    let cohort = [NodeLabel::YearOfBirth(1825), NodeLabel::Sex(Sex::Female)];
    let expected = 1.0 + 0.991 + 0.991 * 0.991;
    assert!(close(tree.count_at(SourceType::Stat, &cohort).unwrap(), expected));
}

#[test]
fn expected_levels_above_age_sum_their_children() {
    let tree = build();
    let mut pending = vec![tree.root(SourceType::Stat)];
    let mut checked = 0_usize;
    while let Some(id) = pending.pop() {
        let node = tree.node(id).unwrap();
        if matches!(node.label(), NodeLabel::Age(_)) {
            continue;
        }
        let children: f64 = node
            .children()
            .values()
            .map(|c| tree.node(*c).unwrap().count())
            .sum();
        assert!(close(node.count(), children), "{:?}", node.label());
        pending.extend(node.children().values().copied());
        checked = checked.saturating_add(1);
    }
    assert!(checked > 1);
}

#[test]
fn expected_survivors_age_forward() {
    let tree = build();
    let cohort = [NodeLabel::YearOfBirth(1825), NodeLabel::Sex(Sex::Female)];
    let at = |age: i32, extra: &[NodeLabel]| {
        let mut path = cohort.to_vec();
        path.push(NodeLabel::Age(age));
        path.extend_from_slice(extra);
        tree.count_at(SourceType::Stat, &path)
    };

    // Female 15-44 mortality is 0.009; expected deaths below the node
    // threshold are not created.
    assert!(at(29, &[NodeLabel::Died(true)]).is_none());
    assert!(close(at(29, &[NodeLabel::Died(false)]).unwrap(), 0.991));
    assert!(close(at(30, &[]).unwrap(), 0.991));
    assert!(close(at(31, &[]).unwrap(), 0.991 * 0.991));
    // The tree covers 1855 and 1856 only.
    assert!(at(32, &[]).is_none());
}

#[test]
fn expected_births_split_by_order_rate() {
    let tree = build();
    let prior = [
        NodeLabel::YearOfBirth(1825),
        NodeLabel::Sex(Sex::Female),
        NodeLabel::Age(29),
        NodeLabel::Died(false),
        NodeLabel::PreviousChildrenInPartnership(IntegerRange::single(1)),
        NodeLabel::PreviousChildrenInAnyPartnership(IntegerRange::single(1)),
    ];
    let mut with_birth = prior.to_vec();
    with_birth.push(NodeLabel::ChildrenInYear(true));
    let mut without = prior.to_vec();
    without.push(NodeLabel::ChildrenInYear(false));

    // Age 25-29, one previous child: rate 0.3.
    let born = tree.count_at(SourceType::Stat, &with_birth).unwrap();
    let not_born = tree.count_at(SourceType::Stat, &without).unwrap();
    assert!(close(born, 0.991 * 0.3));
    assert!(close(born + not_born, 0.991));
}

#[test]
fn projected_prior_children_keep_cohort_weight() {
    let tree = build();
    let path = [
        NodeLabel::YearOfBirth(1825),
        NodeLabel::Sex(Sex::Female),
        NodeLabel::Age(30),
    ];
    let node = tree.find(SourceType::Stat, &path).unwrap();
    let node = tree.node(node).unwrap();
    let total: f64 = node.prior_children().values().sum();
    assert!(close(total, node.count()));
    // Most of the cohort had no child in 1854 and keeps its state.
    let unchanged = node
        .prior_children()
        .get(&cohort_tree::PriorChildren {
            in_partnership: 1,
            in_any_partnership: 1,
        })
        .copied()
        .unwrap();
    assert!(close(unchanged, 0.991 * 0.7));
}

#[test]
fn empty_period_is_rejected() {
    let err = ContingencyTree::build(&population(), &statistics(), 1857, 1857).unwrap_err();
    assert!(matches!(
        err,
        TreeError::InvalidPeriod {
            start: 1857,
            end: 1857
        }
    ));
}
