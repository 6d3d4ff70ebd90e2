//! Expected-count tasks filling the `STAT` branch.
//!
//! Every task takes a node whose count is settled and splits it across the
//! labels of the next dimension using uncorrected rates and proportions
//! from the statistics. Women carry a weight map over prior-children
//! states on their age node; ageing a cohort projects that map one year
//! forward through births, maternity sizes, and separations.

use std::collections::BTreeMap;

use tracing::trace;

use cohort_stats::{LabeledValueSet, PopulationStatistics, StatsKey};
use cohort_types::{CompoundTimeUnit, IntegerRange, Sex};

use crate::classify::{resolve, year_start};
use crate::label::{Dimension, NodeLabel, SeparationOption};
use crate::node::{ContingencyTree, Node, NodeId, PriorChildren};
use crate::scheduler::{DeferredTasks, TaskKind};
use crate::{NODE_MIN_COUNT, TreeError};

const ONE_YEAR: CompoundTimeUnit = CompoundTimeUnit::years(1);

/// Executes expected-count tasks against one statistics set.
pub struct ExpectedCounts<'a> {
    statistics: &'a PopulationStatistics,
}

impl<'a> ExpectedCounts<'a> {
    /// Tasks reading `statistics`.
    pub const fn new(statistics: &'a PopulationStatistics) -> Self {
        Self { statistics }
    }

    /// Run one task, queueing its follow-up work.
    pub fn execute(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        kind: TaskKind,
        node: NodeId,
    ) -> Result<(), TreeError> {
        match kind {
            TaskKind::Death => self.death(tree, tasks, node),
            TaskKind::PreviousChildren => self.previous_children(tree, tasks, node),
            TaskKind::ChildrenInYear => self.children_in_year(tree, tasks, node),
            TaskKind::Separation => self.separation(tree, node),
            TaskKind::Age => self.age(tree, tasks, node),
        }
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Age node: split by death, then (women) by prior-children state.
    fn death(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        node: NodeId,
    ) -> Result<(), TreeError> {
        let count = tree.node(node)?.count();
        let sex = tree.sex(node)?;
        let age = tree.age(node)?;
        let date = year_start(tree.year(node)?)?;

        let dead = self
            .expected(StatsKey::death(age, sex, count, ONE_YEAR, date))?
            .min(count);
        trace!(node = %node, age, ?sex, count, dead, "Expected deaths");

        for (died, value) in [(true, dead), (false, count - dead)] {
            let Some(child) = add_child(tree, node, NodeLabel::Died(died), value)? else {
                continue;
            };
            if sex == Sex::Female {
                self.split_prior_children(tree, tasks, node, child, value)?;
            }
        }
        Ok(())
    }

    /// Distribute a died/survived node over the age node's prior-children
    /// weights.
    fn split_prior_children(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        age_node: NodeId,
        parent: NodeId,
        count: f64,
    ) -> Result<(), TreeError> {
        let date = year_start(tree.year(age_node)?)?;
        let separation_labels = self.statistics.separation_labels(date)?;
        let order_labels = self.statistics.birth_order_labels(date)?;
        let (weights, total) = normalizable(tree.node(age_node)?.prior_children());

        for (state, weight) in weights {
            let share = count * weight / total;
            if share < NODE_MIN_COUNT {
                continue;
            }
            let in_partnership = resolve(
                Dimension::PreviousChildrenInPartnership,
                &separation_labels,
                state.in_partnership,
            )?;
            let in_any = resolve(
                Dimension::PreviousChildrenInAnyPartnership,
                &order_labels,
                state.in_any_partnership,
            )?;
            let (p, _) = tree.get_or_create_child(
                parent,
                NodeLabel::PreviousChildrenInPartnership(in_partnership),
            )?;
            tree.add_count(p, share)?;
            let (q, created) = tree
                .get_or_create_child(p, NodeLabel::PreviousChildrenInAnyPartnership(in_any))?;
            tree.add_count(q, share)?;
            if created {
                tasks.push(TaskKind::PreviousChildren, q);
            }
        }
        Ok(())
    }

    /// Prior-children node: split by whether a child is born this year.
    fn previous_children(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        node: NodeId,
    ) -> Result<(), TreeError> {
        let count = tree.node(node)?.count();
        let age = tree.age(node)?;
        let order = IntegerRange::min(&tree.previous_children_in_any_partnership(node)?);
        let date = year_start(tree.year(node)?)?;

        let mothers = self
            .expected(StatsKey::ordered_birth(age, order, count, ONE_YEAR, date))?
            .min(count);

        for (flag, value) in [(true, mothers), (false, count - mothers)] {
            if let Some(child) = add_child(tree, node, NodeLabel::ChildrenInYear(flag), value)? {
                tasks.push(TaskKind::ChildrenInYear, child);
            }
        }
        Ok(())
    }

    /// Children-in-year node: split by maternity size, then record the
    /// resulting children in partnership.
    fn children_in_year(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        node: NodeId,
    ) -> Result<(), TreeError> {
        let count = tree.node(node)?.count();
        let any_born = tree.children_in_year(node)?;
        let age = tree.age(node)?;
        let prior = IntegerRange::min(&tree.previous_children_in_partnership(node)?);
        let date = year_start(tree.year(node)?)?;

        let sizes: Vec<(IntegerRange, f64)> = if any_born {
            let split =
                self.expected_split(StatsKey::multiple_birth(age, count, ONE_YEAR, date))?;
            if split.sum() > 0.0 {
                split.iter().map(|(size, v)| (*size, v)).collect()
            } else {
                vec![(IntegerRange::single(1), count)]
            }
        } else {
            vec![(IntegerRange::single(0), count)]
        };

        let separation_labels = self.statistics.separation_labels(date)?;
        for (size, value) in sizes {
            let Some(born) = add_child(tree, node, NodeLabel::NumberOfChildrenInYear(size), value)?
            else {
                continue;
            };
            let in_partnership = resolve(
                Dimension::ChildrenInPartnership,
                &separation_labels,
                prior.saturating_add(IntegerRange::min(&size)),
            )?;
            if let Some(child) = add_child(
                tree,
                born,
                NodeLabel::ChildrenInPartnership(in_partnership),
                value,
            )? {
                tasks.push(TaskKind::Separation, child);
            }
        }
        Ok(())
    }

    /// Children-in-partnership node: split by separation, then by the age
    /// of any partner taken this year.
    fn separation(&self, tree: &mut ContingencyTree, node: NodeId) -> Result<(), TreeError> {
        let count = tree.node(node)?.count();
        let any_born = tree.children_in_year(node)?;
        let prior = tree.previous_children_in_partnership(node)?;
        let in_partnership = tree.children_in_partnership(node)?;
        let age = tree.age(node)?;
        let date = year_start(tree.year(node)?)?;

        let outcomes = if any_born {
            let separated = self
                .expected(StatsKey::separation(
                    IntegerRange::min(&in_partnership),
                    count,
                    ONE_YEAR,
                    date,
                ))?
                .min(count);
            vec![
                (SeparationOption::Yes, separated),
                (SeparationOption::No, count - separated),
            ]
        } else if prior.contains(0) {
            vec![(SeparationOption::NotApplicable, count)]
        } else {
            vec![(SeparationOption::No, count)]
        };

        let new_partnership = any_born && prior.contains(0);
        for (option, value) in outcomes {
            let Some(child) = add_child(tree, node, NodeLabel::Separation(option), value)? else {
                continue;
            };
            let partners = if new_partnership {
                self.expected_split(StatsKey::partnering(age, value, ONE_YEAR, date))?
            } else {
                LabeledValueSet::default()
            };
            if partners.sum() > 0.0 {
                for (partner_age, v) in partners.iter() {
                    add_child(tree, child, NodeLabel::NewPartnerAge(Some(*partner_age)), v)?;
                }
            } else {
                add_child(tree, child, NodeLabel::NewPartnerAge(None), value)?;
            }
        }
        Ok(())
    }

    /// Age node: move survivors to next year's age node.
    fn age(
        &self,
        tree: &mut ContingencyTree,
        tasks: &mut DeferredTasks,
        node: NodeId,
    ) -> Result<(), TreeError> {
        let year = tree.year(node)?;
        let next_year = year.saturating_add(1);
        if next_year >= tree.end_year() {
            return Ok(());
        }
        let current = tree.node(node)?;
        let survivors = current
            .children()
            .get(&NodeLabel::Died(false))
            .map_or(Ok(0.0), |id| tree.node(*id).map(Node::count))?;
        if survivors < NODE_MIN_COUNT {
            return Ok(());
        }
        let sex_node = current.parent().ok_or(TreeError::MissingAncestor {
            node,
            dimension: Dimension::Sex,
        })?;
        let age = tree.age(node)?;
        let projected = if tree.sex(node)? == Sex::Female {
            self.project_prior_children(tree.node(node)?.prior_children(), age, year)?
        } else {
            BTreeMap::new()
        };

        let (next, created) =
            tree.get_or_create_child(sex_node, NodeLabel::Age(age.saturating_add(1)))?;
        tree.add_count(next, survivors)?;
        // Survivors count at every level above the age node too.
        let mut ancestor = Some(sex_node);
        while let Some(id) = ancestor {
            tree.add_count(id, survivors)?;
            ancestor = tree.node(id)?.parent();
        }
        let total: f64 = projected.values().sum();
        if total > 0.0 {
            for (state, weight) in projected {
                tree.add_prior_children(next, state, survivors * weight / total)?;
            }
        }
        if created {
            tasks.push(TaskKind::Death, next);
            tasks.push(TaskKind::Age, next);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Prior-children projection
    // -----------------------------------------------------------------------

    /// Prior-children weights one year on, for women aged `age` in `year`.
    pub fn project_prior_children(
        &self,
        weights: &BTreeMap<PriorChildren, f64>,
        age: i32,
        year: i32,
    ) -> Result<BTreeMap<PriorChildren, f64>, TreeError> {
        let date = year_start(year)?;
        let (weights, _) = normalizable(weights);
        let sizes = self.expected_split(StatsKey::multiple_birth(age, 1.0, ONE_YEAR, date))?;
        let sizes: Vec<(i32, f64)> = if sizes.sum() > 0.0 {
            sizes.iter().map(|(size, share)| (size.min(), share)).collect()
        } else {
            vec![(1, 1.0)]
        };

        let mut next: BTreeMap<PriorChildren, f64> = BTreeMap::new();
        for (state, weight) in weights {
            let birth = self
                .expected(StatsKey::ordered_birth(
                    age,
                    state.in_any_partnership,
                    1.0,
                    ONE_YEAR,
                    date,
                ))?
                .clamp(0.0, 1.0);
            *next.entry(state).or_insert(0.0) += weight * (1.0 - birth);
            if birth <= 0.0 {
                continue;
            }
            for (born, share) in &sizes {
                let in_partnership = state.in_partnership.saturating_add(*born);
                let in_any_partnership = state.in_any_partnership.saturating_add(*born);
                let separated = self
                    .expected(StatsKey::separation(in_partnership, 1.0, ONE_YEAR, date))?
                    .clamp(0.0, 1.0);
                let base = weight * birth * share;
                *next
                    .entry(PriorChildren {
                        in_partnership: 0,
                        in_any_partnership,
                    })
                    .or_insert(0.0) += base * separated;
                *next
                    .entry(PriorChildren {
                        in_partnership,
                        in_any_partnership,
                    })
                    .or_insert(0.0) += base * (1.0 - separated);
            }
        }
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Statistics lookups
    // -----------------------------------------------------------------------

    /// Uncorrected expected count for a rate table key.
    fn expected(&self, key: StatsKey) -> Result<f64, TreeError> {
        let determined = self
            .statistics
            .determine_single(&key.with_self_correction(false))?;
        Ok(determined.raw_uncorrected().max(0.0))
    }

    /// Uncorrected expected split for a proportional table key.
    fn expected_split(
        &self,
        key: StatsKey,
    ) -> Result<LabeledValueSet<IntegerRange, f64>, TreeError> {
        let determined = self
            .statistics
            .determine_multiple(&key.with_self_correction(false))?;
        Ok(determined.raw_uncorrected().clamp_negative())
    }
}

/// Add `value` to the child of `parent` labelled `label`, creating it when
/// needed. Values below [`NODE_MIN_COUNT`] are dropped.
fn add_child(
    tree: &mut ContingencyTree,
    parent: NodeId,
    label: NodeLabel,
    value: f64,
) -> Result<Option<NodeId>, TreeError> {
    if value < NODE_MIN_COUNT {
        return Ok(None);
    }
    let (child, _) = tree.get_or_create_child(parent, label)?;
    tree.add_count(child, value)?;
    Ok(Some(child))
}

/// Weights with a positive total; women with no recorded state count as
/// childless.
fn normalizable(weights: &BTreeMap<PriorChildren, f64>) -> (BTreeMap<PriorChildren, f64>, f64) {
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        (weights.clone(), total)
    } else {
        (BTreeMap::from([(PriorChildren::default(), 1.0)]), 1.0)
    }
}
