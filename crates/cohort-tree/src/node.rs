//! Arena storage for tree nodes.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]; a child
//! keeps its parent's id so typed ancestor lookups walk upward without
//! shared ownership.

use std::collections::BTreeMap;

use serde::Serialize;

use cohort_types::{IntegerRange, Sex};

use crate::TreeError;
use crate::label::{Dimension, NodeLabel, SeparationOption, SourceType};

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub const fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Prior-children state of a group of women at the start of a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PriorChildren {
    /// Children in the current partnership.
    pub in_partnership: i32,
    /// Children across all partnerships.
    pub in_any_partnership: i32,
}

/// One node of the contingency tree.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    label: NodeLabel,
    count: f64,
    parent: Option<NodeId>,
    children: BTreeMap<NodeLabel, NodeId>,
    /// Weights over prior-children states. Only populated on `STAT` age
    /// nodes.
    prior_children: BTreeMap<PriorChildren, f64>,
}

impl Node {
    const fn new(label: NodeLabel, parent: Option<NodeId>) -> Self {
        Self {
            label,
            count: 0.0,
            parent,
            children: BTreeMap::new(),
            prior_children: BTreeMap::new(),
        }
    }

    /// The node's own label.
    pub const fn label(&self) -> &NodeLabel {
        &self.label
    }

    /// People (or expected people) classified into this node.
    pub const fn count(&self) -> f64 {
        self.count
    }

    /// Parent node; `None` for a source root.
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children keyed by label.
    pub const fn children(&self) -> &BTreeMap<NodeLabel, NodeId> {
        &self.children
    }

    /// Prior-children weights.
    pub const fn prior_children(&self) -> &BTreeMap<PriorChildren, f64> {
        &self.prior_children
    }

    /// True when the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A cross-classification of simulated and expected populations.
#[derive(Debug, Clone, Serialize)]
pub struct ContingencyTree {
    nodes: Vec<Node>,
    sim_root: NodeId,
    stat_root: NodeId,
    start_year: i32,
    end_year: i32,
}

/// Typed accessor for the value of the nearest ancestor (self included) on
/// one dimension.
macro_rules! ancestor_value {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $name(&self, id: NodeId) -> Result<$ty, TreeError> {
            match self.ancestor(id, Dimension::$variant)?.label {
                NodeLabel::$variant(value) => Ok(value),
                _ => Err(TreeError::MissingAncestor {
                    node: id,
                    dimension: Dimension::$variant,
                }),
            }
        }
    };
}

impl ContingencyTree {
    /// An empty tree covering `[start_year, end_year)` with both source
    /// roots in place.
    pub fn new(start_year: i32, end_year: i32) -> Self {
        let nodes = vec![
            Node::new(NodeLabel::Source(SourceType::Sim), None),
            Node::new(NodeLabel::Source(SourceType::Stat), None),
        ];
        Self {
            nodes,
            sim_root: NodeId(0),
            stat_root: NodeId(1),
            start_year,
            end_year,
        }
    }

    /// First tabulated year.
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Year tabulation stops before.
    pub const fn end_year(&self) -> i32 {
        self.end_year
    }

    /// Root of the given branch.
    pub const fn root(&self, source: SourceType) -> NodeId {
        match source {
            SourceType::Sim => self.sim_root,
            SourceType::Stat => self.stat_root,
        }
    }

    /// Number of nodes, roots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true; both roots always exist.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id))
    }

    /// Child of `parent` with `label`, created empty when absent. The flag
    /// is true when the child was created by this call.
    pub fn get_or_create_child(
        &mut self,
        parent: NodeId,
        label: NodeLabel,
    ) -> Result<(NodeId, bool), TreeError> {
        if let Some(existing) = self.node(parent)?.children.get(&label) {
            return Ok((*existing, false));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(label, Some(parent)));
        self.node_mut(parent)?.children.insert(label, id);
        Ok((id, true))
    }

    /// Add `delta` to a node's count.
    pub fn add_count(&mut self, id: NodeId, delta: f64) -> Result<(), TreeError> {
        self.node_mut(id)?.count += delta;
        Ok(())
    }

    /// Add weight to a prior-children state of a node.
    pub fn add_prior_children(
        &mut self,
        id: NodeId,
        state: PriorChildren,
        weight: f64,
    ) -> Result<(), TreeError> {
        *self
            .node_mut(id)?
            .prior_children
            .entry(state)
            .or_insert(0.0) += weight;
        Ok(())
    }

    /// Nearest node on `dimension` walking up from `id`, `id` included.
    pub fn ancestor(&self, id: NodeId, dimension: Dimension) -> Result<&Node, TreeError> {
        let mut current = Some(id);
        while let Some(cursor) = current {
            let node = self.node(cursor)?;
            if node.label.dimension() == dimension {
                return Ok(node);
            }
            current = node.parent;
        }
        Err(TreeError::MissingAncestor {
            node: id,
            dimension,
        })
    }

    ancestor_value!(
        /// Branch the node belongs to.
        source,
        Source,
        SourceType
    );
    ancestor_value!(
        /// Year of birth of the node's cohort.
        year_of_birth,
        YearOfBirth,
        i32
    );
    ancestor_value!(
        /// Sex of the node's cohort.
        sex,
        Sex,
        Sex
    );
    ancestor_value!(
        /// Age during the year the node describes.
        age,
        Age,
        i32
    );
    ancestor_value!(
        /// Whether the person died during the year the node describes.
        died, Died, bool);
    ancestor_value!(
        /// Children born in the current partnership before the year.
        previous_children_in_partnership,
        PreviousChildrenInPartnership,
        IntegerRange
    );
    ancestor_value!(
        /// Children born in any partnership before the year.
        previous_children_in_any_partnership,
        PreviousChildrenInAnyPartnership,
        IntegerRange
    );
    ancestor_value!(
        /// Whether any child is born during the year.
        children_in_year, ChildrenInYear, bool);
    ancestor_value!(
        /// Number of children born during the year.
        number_of_children_in_year, NumberOfChildrenInYear, IntegerRange);
    ancestor_value!(
        /// Children in the current partnership including this year's births.
        children_in_partnership, ChildrenInPartnership, IntegerRange);
    ancestor_value!(
        /// Separation outcome for the year.
        separation, Separation, SeparationOption);
    ancestor_value!(
        /// Age of any partner taken this year.
        new_partner_age, NewPartnerAge, Option<IntegerRange>);

    /// Calendar year the node describes (year of birth plus age).
    pub fn year(&self, id: NodeId) -> Result<i32, TreeError> {
        let yob = self.year_of_birth(id)?;
        let age = self.age(id)?;
        Ok(yob.saturating_add(age))
    }

    /// Labels from the root down to `id`, both included.
    pub fn path(&self, id: NodeId) -> Result<Vec<NodeLabel>, TreeError> {
        let mut labels = Vec::new();
        let mut current = Some(id);
        while let Some(cursor) = current {
            let node = self.node(cursor)?;
            labels.push(node.label);
            current = node.parent;
        }
        labels.reverse();
        Ok(labels)
    }

    /// Ids of every leaf, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
            .map(|(index, _)| NodeId(index))
    }

    /// Node reached from `source` by following `labels`.
    pub fn find(&self, source: SourceType, labels: &[NodeLabel]) -> Option<NodeId> {
        let mut cursor = self.root(source);
        for label in labels {
            cursor = *self.node(cursor).ok()?.children.get(label)?;
        }
        Some(cursor)
    }

    /// Count at the node reached from `source` by following `labels`.
    pub fn count_at(&self, source: SourceType, labels: &[NodeLabel]) -> Option<f64> {
        let id = self.find(source, labels)?;
        self.node(id).ok().map(Node::count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut tree = ContingencyTree::new(1850, 1860);
        let root = tree.root(SourceType::Sim);
        let (a, created) = tree
            .get_or_create_child(root, NodeLabel::YearOfBirth(1840))
            .unwrap();
        assert!(created);
        let (b, created) = tree
            .get_or_create_child(root, NodeLabel::YearOfBirth(1840))
            .unwrap();
        assert!(!created);
        assert_eq!(a, b);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn typed_ancestors_include_self() {
        let mut tree = ContingencyTree::new(1850, 1860);
        let root = tree.root(SourceType::Stat);
        let (yob, _) = tree
            .get_or_create_child(root, NodeLabel::YearOfBirth(1830))
            .unwrap();
        let (sex, _) = tree
            .get_or_create_child(yob, NodeLabel::Sex(Sex::Female))
            .unwrap();
        let (age, _) = tree.get_or_create_child(sex, NodeLabel::Age(24)).unwrap();

        assert_eq!(tree.age(age).unwrap(), 24);
        assert_eq!(tree.sex(age).unwrap(), Sex::Female);
        assert_eq!(tree.source(age).unwrap(), SourceType::Stat);
        assert_eq!(tree.year(age).unwrap(), 1854);
        assert!(matches!(
            tree.died(age),
            Err(TreeError::MissingAncestor {
                dimension: Dimension::Died,
                ..
            })
        ));
    }

    #[test]
    fn count_at_follows_labels() {
        let mut tree = ContingencyTree::new(1850, 1860);
        let root = tree.root(SourceType::Sim);
        let (yob, _) = tree
            .get_or_create_child(root, NodeLabel::YearOfBirth(1830))
            .unwrap();
        tree.add_count(yob, 2.0).unwrap();
        tree.add_count(yob, 1.5).unwrap();

        let found = tree.count_at(SourceType::Sim, &[NodeLabel::YearOfBirth(1830)]);
        assert!((found.unwrap() - 3.5).abs() < 1e-12);
        assert!(
            tree.count_at(SourceType::Stat, &[NodeLabel::YearOfBirth(1830)])
                .is_none()
        );
        assert_eq!(
            tree.path(yob).unwrap(),
            vec![
                NodeLabel::Source(SourceType::Sim),
                NodeLabel::YearOfBirth(1830)
            ]
        );
    }
}
