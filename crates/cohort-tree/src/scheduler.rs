//! Dependency-ordered execution of deferred tree tasks.
//!
//! Each [`TaskKind`] has a queue. A kind may run only while the queues of
//! every kind it depends on are empty, so for example no cohort is aged
//! before all outstanding fertility and separation work has settled. The
//! executor repeatedly picks the first runnable kind in dependency order
//! and drains a batch of it; ageing is limited to a small batch per cycle
//! so the newly aged cohorts have their own work done before more ageing
//! is queued.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::node::NodeId;

/// Maximum ageing tasks run in one cycle.
pub const AGE_TASK_BATCH: usize = 2;

/// Kinds of deferred work on `STAT` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    /// Split an age node by death.
    Death,
    /// Split a prior-children node by whether a child is born in the year.
    PreviousChildren,
    /// Split by number of children born and children in partnership.
    ChildrenInYear,
    /// Split by separation and new partner age.
    Separation,
    /// Project survivors one year forward.
    Age,
}

impl TaskKind {
    /// All kinds in dependency order.
    pub const ALL: [Self; 5] = [
        Self::Death,
        Self::PreviousChildren,
        Self::ChildrenInYear,
        Self::Separation,
        Self::Age,
    ];

    /// Kinds whose queues must be empty before this kind runs.
    pub const fn depends_on(self) -> &'static [Self] {
        match self {
            Self::Death => &[],
            Self::PreviousChildren => &[Self::Death],
            Self::ChildrenInYear => &[Self::Death, Self::PreviousChildren],
            Self::Separation => &[Self::Death, Self::PreviousChildren, Self::ChildrenInYear],
            Self::Age => &[
                Self::Death,
                Self::PreviousChildren,
                Self::ChildrenInYear,
                Self::Separation,
            ],
        }
    }

    const fn batch_limit(self) -> usize {
        match self {
            Self::Age => AGE_TASK_BATCH,
            _ => usize::MAX,
        }
    }
}

/// Queues of pending tasks, one per kind.
#[derive(Debug, Default)]
pub struct DeferredTasks {
    queues: BTreeMap<TaskKind, VecDeque<NodeId>>,
    executed: usize,
}

impl DeferredTasks {
    /// Empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `kind` work on `node`.
    pub fn push(&mut self, kind: TaskKind, node: NodeId) {
        self.queues.entry(kind).or_default().push_back(node);
    }

    /// Pending tasks of `kind`.
    pub fn pending(&self, kind: TaskKind) -> usize {
        self.queues.get(&kind).map_or(0, VecDeque::len)
    }

    /// True when no task of any kind is pending.
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Tasks executed so far by [`Self::run`].
    pub const fn executed(&self) -> usize {
        self.executed
    }

    /// Whether `kind` has work and nothing it depends on is pending.
    pub fn runnable(&self, kind: TaskKind) -> bool {
        self.pending(kind) > 0 && kind.depends_on().iter().all(|dep| self.pending(*dep) == 0)
    }

    /// Remove the next batch to execute.
    pub fn next_batch(&mut self) -> Option<(TaskKind, Vec<NodeId>)> {
        let kind = TaskKind::ALL.into_iter().find(|k| self.runnable(*k))?;
        let queue = self.queues.get_mut(&kind)?;
        let take = queue.len().min(kind.batch_limit());
        let batch: Vec<NodeId> = queue.drain(..take).collect();
        Some((kind, batch))
    }

    /// Run batches until every queue is empty. `execute` may queue further
    /// tasks.
    pub fn run<E, F>(&mut self, mut execute: F) -> Result<usize, E>
    where
        F: FnMut(TaskKind, NodeId, &mut Self) -> Result<(), E>,
    {
        let before = self.executed;
        while let Some((kind, batch)) = self.next_batch() {
            trace!(?kind, tasks = batch.len(), "Running task batch");
            for node in batch {
                execute(kind, node, self)?;
                self.executed = self.executed.saturating_add(1);
            }
        }
        Ok(self.executed.saturating_sub(before))
    }
}
