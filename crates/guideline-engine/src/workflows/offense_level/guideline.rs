use super::domain::{
    Adjustment, AdjustmentId, AdjustmentKind, AdjustmentScope, DecisionNode, EdgeTarget,
    EngineError, GuidelineYear, Level, NodeId, OffenseCode, StructuralDefect,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Unvalidated guideline contents as produced by a loader or built in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineDraft {
    pub offense: OffenseCode,
    pub year: GuidelineYear,
    pub title: String,
    pub citation: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub root: NodeId,
    pub questions: Vec<DecisionNode>,
    #[serde(default)]
    pub characteristics: Vec<Adjustment>,
    #[serde(default)]
    pub chapter_adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Next {
    Node(usize),
    Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedNode {
    pub(crate) yes: Next,
    pub(crate) no: Next,
}

/// A validated, immutable guideline for one (year, offense) pair.
///
/// The only way to obtain one is [`Guideline::new`], which rejects cyclic
/// trees, dangling edges, unreachable questions, duplicate ids, and empty
/// option sets. Evaluation code relies on those guarantees.
#[derive(Debug, Clone)]
pub struct Guideline {
    draft: GuidelineDraft,
    root: usize,
    resolved: Vec<ResolvedNode>,
    node_index: HashMap<NodeId, usize>,
    adjustment_index: HashMap<AdjustmentId, (AdjustmentScope, usize)>,
}

impl Guideline {
    pub fn new(mut draft: GuidelineDraft) -> Result<Self, EngineError> {
        let malformed = |defect: StructuralDefect| EngineError::MalformedGuideline {
            offense: draft.offense.clone(),
            year: draft.year,
            defect,
        };

        let mut node_index = HashMap::with_capacity(draft.questions.len());
        for (position, node) in draft.questions.iter().enumerate() {
            if node_index.insert(node.id.clone(), position).is_some() {
                return Err(malformed(StructuralDefect::DuplicateNode {
                    node: node.id.clone(),
                }));
            }
        }

        let root = *node_index
            .get(&draft.root)
            .ok_or_else(|| {
                malformed(StructuralDefect::MissingRoot {
                    root: draft.root.clone(),
                })
            })?;

        let mut resolved = Vec::with_capacity(draft.questions.len());
        for node in &draft.questions {
            let resolve = |edge: &EdgeTarget| match edge {
                EdgeTarget::Level { .. } => Ok(Next::Level),
                EdgeTarget::Node { id } => node_index
                    .get(id)
                    .map(|&at| Next::Node(at))
                    .ok_or_else(|| StructuralDefect::DanglingEdge {
                        from: node.id.clone(),
                        target: id.clone(),
                    }),
            };
            let yes = resolve(&node.yes).map_err(&malformed)?;
            let no = resolve(&node.no).map_err(&malformed)?;
            resolved.push(ResolvedNode { yes, no });
        }

        let reached = check_acyclic(root, &resolved)
            .map_err(|at| {
                malformed(StructuralDefect::Cycle {
                    node: draft.questions[at].id.clone(),
                })
            })?;
        if let Some(orphan) = (0..resolved.len()).find(|index| !reached.contains(index)) {
            return Err(malformed(StructuralDefect::UnreachableNode {
                node: draft.questions[orphan].id.clone(),
            }));
        }

        let mut adjustment_index = HashMap::new();
        let lists = [
            (AdjustmentScope::SpecificOffense, &mut draft.characteristics),
            (AdjustmentScope::ChapterWide, &mut draft.chapter_adjustments),
        ];
        for (scope, adjustments) in lists {
            for (position, adjustment) in adjustments.iter_mut().enumerate() {
                adjustment.scope = scope;
                if adjustment_index
                    .insert(adjustment.id.clone(), (scope, position))
                    .is_some()
                {
                    return Err(EngineError::MalformedGuideline {
                        offense: draft.offense.clone(),
                        year: draft.year,
                        defect: StructuralDefect::DuplicateAdjustment {
                            adjustment: adjustment.id.clone(),
                        },
                    });
                }
                check_options(adjustment).map_err(|defect| EngineError::MalformedGuideline {
                    offense: draft.offense.clone(),
                    year: draft.year,
                    defect,
                })?;
            }
        }

        Ok(Self {
            draft,
            root,
            resolved,
            node_index,
            adjustment_index,
        })
    }

    pub fn offense(&self) -> &OffenseCode {
        &self.draft.offense
    }

    pub fn year(&self) -> GuidelineYear {
        self.draft.year
    }

    pub fn title(&self) -> &str {
        &self.draft.title
    }

    pub fn citation(&self) -> &str {
        &self.draft.citation
    }

    pub fn reference(&self) -> Option<&str> {
        self.draft.reference.as_deref()
    }

    pub fn root(&self) -> &NodeId {
        &self.draft.questions[self.root].id
    }

    pub fn questions(&self) -> &[DecisionNode] {
        &self.draft.questions
    }

    pub fn question(&self, id: &NodeId) -> Option<&DecisionNode> {
        self.node_index
            .get(id)
            .map(|&index| &self.draft.questions[index])
    }

    pub fn characteristics(&self) -> &[Adjustment] {
        &self.draft.characteristics
    }

    pub fn chapter_adjustments(&self) -> &[Adjustment] {
        &self.draft.chapter_adjustments
    }

    /// SOCs followed by chapter-wide adjustments, in declared order.
    pub fn adjustments(&self) -> impl Iterator<Item = &Adjustment> {
        self.draft
            .characteristics
            .iter()
            .chain(self.draft.chapter_adjustments.iter())
    }

    pub fn adjustments_in(&self, scope: AdjustmentScope) -> &[Adjustment] {
        match scope {
            AdjustmentScope::SpecificOffense => self.characteristics(),
            AdjustmentScope::ChapterWide => self.chapter_adjustments(),
        }
    }

    pub fn adjustment(&self, id: &AdjustmentId) -> Option<&Adjustment> {
        self.adjustment_index
            .get(id)
            .map(|&(scope, index)| &self.adjustments_in(scope)[index])
    }

    pub fn adjustment_count(&self) -> usize {
        self.adjustment_index.len()
    }

    /// Whether this guideline names the same (year, offense) pair as `other`.
    pub fn same_edition(&self, other: &Guideline) -> bool {
        self.year() == other.year() && self.offense() == other.offense()
    }

    pub fn draft(&self) -> &GuidelineDraft {
        &self.draft
    }

    /// Every terminal base level the tree can produce, ascending.
    pub fn possible_base_levels(&self) -> BTreeSet<Level> {
        self.draft
            .questions
            .iter()
            .flat_map(|node| [&node.yes, &node.no])
            .filter_map(|edge| match edge {
                EdgeTarget::Level { level, .. } => Some(*level),
                EdgeTarget::Node { .. } => None,
            })
            .collect()
    }

    pub(crate) fn root_index(&self) -> usize {
        self.root
    }

    pub(crate) fn node_at(&self, index: usize) -> (&DecisionNode, &ResolvedNode) {
        (&self.draft.questions[index], &self.resolved[index])
    }
}

/// Depth-first walk from the root. Returns the set of reached nodes, or the
/// index of a node found on a cycle.
fn check_acyclic(root: usize, resolved: &[ResolvedNode]) -> Result<HashSet<usize>, usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; resolved.len()];
    let mut stack: Vec<(usize, bool)> = vec![(root, false)];

    while let Some((index, children_pushed)) = stack.pop() {
        if children_pushed {
            marks[index] = Mark::Done;
            continue;
        }
        match marks[index] {
            Mark::Done => continue,
            Mark::InProgress => return Err(index),
            Mark::Unvisited => {}
        }
        marks[index] = Mark::InProgress;
        stack.push((index, true));
        for next in [resolved[index].yes, resolved[index].no] {
            if let Next::Node(child) = next {
                match marks[child] {
                    Mark::InProgress => return Err(child),
                    Mark::Unvisited => stack.push((child, false)),
                    Mark::Done => {}
                }
            }
        }
    }

    Ok(marks
        .iter()
        .enumerate()
        .filter(|(_, mark)| **mark == Mark::Done)
        .map(|(index, _)| index)
        .collect())
}

fn check_options(adjustment: &Adjustment) -> Result<(), StructuralDefect> {
    let AdjustmentKind::MultiSelect { options } = &adjustment.kind else {
        return Ok(());
    };
    if options.is_empty() {
        return Err(StructuralDefect::EmptyOptions {
            adjustment: adjustment.id.clone(),
        });
    }
    let mut seen = HashSet::new();
    for option in options {
        if !seen.insert(&option.id) {
            return Err(StructuralDefect::DuplicateOption {
                adjustment: adjustment.id.clone(),
                option: option.id.clone(),
            });
        }
    }
    Ok(())
}
