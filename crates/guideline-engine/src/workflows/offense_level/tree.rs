use super::domain::{EdgeTarget, Level, NodeId};
use super::guideline::{Guideline, Next};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One answered question on the walk from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub node: NodeId,
    pub answer: bool,
}

/// Outcome of walking the base-offense tree with the answers on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaseOutcome {
    Level {
        level: Level,
        description: String,
        path: Vec<PathStep>,
    },
    PendingAt {
        node: NodeId,
        path: Vec<PathStep>,
    },
}

impl BaseOutcome {
    pub fn level(&self) -> Option<Level> {
        match self {
            Self::Level { level, .. } => Some(*level),
            Self::PendingAt { .. } => None,
        }
    }

    pub fn pending_node(&self) -> Option<&NodeId> {
        match self {
            Self::PendingAt { node, .. } => Some(node),
            Self::Level { .. } => None,
        }
    }

    pub fn path(&self) -> &[PathStep] {
        match self {
            Self::Level { path, .. } | Self::PendingAt { path, .. } => path,
        }
    }

    /// Whether `node` is answered on the path or is the question being awaited.
    pub fn visits(&self, node: &NodeId) -> bool {
        self.pending_node() == Some(node) || self.path().iter().any(|step| &step.node == node)
    }
}

/// Walk the tree from the root, following recorded answers.
///
/// Stops at the first unanswered question with `PendingAt`; never assumes a
/// default. Termination is guaranteed because [`Guideline::new`] rejects
/// cycles.
pub fn evaluate_base(guideline: &Guideline, answers: &BTreeMap<NodeId, bool>) -> BaseOutcome {
    let mut index = guideline.root_index();
    let mut path = Vec::new();

    loop {
        let (node, resolved) = guideline.node_at(index);
        let Some(answer) = answers.get(&node.id).copied() else {
            return BaseOutcome::PendingAt {
                node: node.id.clone(),
                path,
            };
        };

        path.push(PathStep {
            node: node.id.clone(),
            answer,
        });

        let next = if answer { resolved.yes } else { resolved.no };
        match next {
            Next::Node(child) => index = child,
            Next::Level => {
                let (level, description) = match node.edge(answer) {
                    EdgeTarget::Level { level, description } => (*level, description.clone()),
                    EdgeTarget::Node { .. } => unreachable!("resolved edge disagrees with draft"),
                };
                return BaseOutcome::Level {
                    level,
                    description,
                    path,
                };
            }
        }
    }
}

/// Questions the walk could still visit given the answers on hand.
///
/// An answered question follows its answer; an unanswered one may still go
/// either way, so both of its edges are followed. Shared questions are
/// visited once.
pub fn reachable_nodes(
    guideline: &Guideline,
    answers: &BTreeMap<NodeId, bool>,
) -> BTreeSet<NodeId> {
    let mut reached = BTreeSet::new();
    let mut pending = vec![guideline.root_index()];

    while let Some(index) = pending.pop() {
        let (node, resolved) = guideline.node_at(index);
        if !reached.insert(node.id.clone()) {
            continue;
        }
        let edges = match answers.get(&node.id) {
            Some(true) => [Some(resolved.yes), None],
            Some(false) => [Some(resolved.no), None],
            None => [Some(resolved.yes), Some(resolved.no)],
        };
        for next in edges.into_iter().flatten() {
            if let Next::Node(child) = next {
                pending.push(child);
            }
        }
    }

    reached
}
