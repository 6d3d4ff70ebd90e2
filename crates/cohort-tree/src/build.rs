use chrono::NaiveDate;
use tracing::{debug, info};

use cohort_population::{Person, Population};
use cohort_stats::PopulationStatistics;

use crate::classify::{Classifier, year_start};
use crate::expected::ExpectedCounts;
use crate::label::{Dimension, NodeLabel, SourceType};
use crate::node::{ContingencyTree, NodeId, PriorChildren};
use crate::scheduler::{DeferredTasks, TaskKind};
use crate::TreeError;

struct TreeBuilder<'a, P> {
    population: &'a P,
    classifier: Classifier<'a, P>,
    tree: ContingencyTree,
    tasks: DeferredTasks,
}

impl ContingencyTree {
    /// Tabulate `population` for every year in `[start_year, end_year)`
    /// alongside the counts `statistics` predict for the population alive
    /// the year before `start_year`.
    pub fn build<P: Population>(
        population: &P,
        statistics: &PopulationStatistics,
        start_year: i32,
        end_year: i32,
    ) -> Result<Self, TreeError> {
        if start_year >= end_year {
            return Err(TreeError::InvalidPeriod {
                start: start_year,
                end: end_year,
            });
        }
        let mut builder = TreeBuilder {
            population,
            classifier: Classifier::new(population, statistics),
            tree: Self::new(start_year, end_year),
            tasks: DeferredTasks::new(),
        };

        let seed_year = start_year.saturating_sub(1);
        builder.seed_expected(seed_year)?;
        for year in start_year..end_year {
            builder.route_simulated(year)?;
        }

        let expected = ExpectedCounts::new(statistics);
        let tree = &mut builder.tree;
        let executed = builder
            .tasks
            .run(|kind, node, queue| expected.execute(tree, queue, kind, node))?;

        let tree = builder.tree;
        info!(
            start_year,
            end_year,
            nodes = tree.len(),
            tasks = executed,
            sim = tree.node(tree.root(SourceType::Sim))?.count(),
            stat = tree.node(tree.root(SourceType::Stat))?.count(),
            "Contingency tree built"
        );
        Ok(tree)
    }
}

impl<P: Population> TreeBuilder<'_, P> {
    /// Route everyone alive in `year` into the `STAT` branch down to age and
    /// record their prior-children state.
    fn seed_expected(&mut self, year: i32) -> Result<(), TreeError> {
        let date = year_start(year)?;
        let population = self.population;
        let mut seeded = 0_usize;
        for person in population.people().filter(|p| p.alive_in_year(year)) {
            let age_node = self.route(person, year, SourceType::Stat, Some(Dimension::Age))?;
            if person.is_female() {
                let state = self.prior_children(person, year, date);
                self.tree.add_prior_children(age_node, state, 1.0)?;
            }
            seeded = seeded.saturating_add(1);
        }
        debug!(year, seeded, "Seeded expected population");
        Ok(())
    }

    fn route_simulated(&mut self, year: i32) -> Result<(), TreeError> {
        let population = self.population;
        let mut routed = 0_usize;
        for person in population
            .people()
            .filter(|p| Classifier::<P>::counted_in_year(p, year))
        {
            self.route(person, year, SourceType::Sim, None)?;
            routed = routed.saturating_add(1);
        }
        debug!(year, routed, "Routed simulated population");
        Ok(())
    }

    /// Walk `person` down from the `source` root, adding one to every node
    /// on the path. Stops after `last` when given. Returns the final node.
    fn route(
        &mut self,
        person: &Person,
        year: i32,
        source: SourceType,
        last: Option<Dimension>,
    ) -> Result<NodeId, TreeError> {
        let mut node = self.tree.root(source);
        let mut label = NodeLabel::Source(source);
        self.tree.add_count(node, 1.0)?;
        while last != Some(label.dimension()) {
            let Some(next) = self.classifier.next(person, year, &label)? else {
                break;
            };
            let (child, created) = self.tree.get_or_create_child(node, next)?;
            self.tree.add_count(child, 1.0)?;
            if created && source == SourceType::Stat && next.dimension() == Dimension::Age {
                self.tasks.push(TaskKind::Death, child);
                self.tasks.push(TaskKind::Age, child);
            }
            node = child;
            label = next;
        }
        Ok(node)
    }

    fn prior_children(&self, person: &Person, year: i32, date: NaiveDate) -> PriorChildren {
        let in_partnership = self
            .population
            .active_partnership(person, year)
            .map_or(0, |p| self.population.children_born_before(p, date));
        let in_any = self.population.total_children_born_before(person, date);
        PriorChildren {
            in_partnership: i32::try_from(in_partnership).unwrap_or(i32::MAX),
            in_any_partnership: i32::try_from(in_any).unwrap_or(i32::MAX),
        }
    }
}
