use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Guideline edition year (e.g. the 2025 Guidelines Manual).
pub type GuidelineYear = u16;

/// Offense levels are small signed integers; deltas may be negative.
pub type Level = i32;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Chapter Two section code such as `2B1.1`.
    OffenseCode
);
string_id!(
    /// Identifier of a base-offense question node.
    NodeId
);
string_id!(AdjustmentId);
string_id!(OptionId);

/// Where a decision-tree edge leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeTarget {
    Node { id: NodeId },
    Level { level: Level, description: String },
}

impl EdgeTarget {
    pub fn node(id: impl Into<String>) -> Self {
        Self::Node {
            id: NodeId::new(id),
        }
    }

    pub fn level(level: Level, description: impl Into<String>) -> Self {
        Self::Level {
            level,
            description: description.into(),
        }
    }
}

/// Yes/no question in the base-offense decision tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNode {
    pub id: NodeId,
    pub prompt: String,
    pub yes: EdgeTarget,
    pub no: EdgeTarget,
}

impl DecisionNode {
    pub fn edge(&self, answer: bool) -> &EdgeTarget {
        if answer {
            &self.yes
        } else {
            &self.no
        }
    }
}

/// Which part of the computation an adjustment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentScope {
    SpecificOffense,
    ChapterWide,
}

impl AdjustmentScope {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SpecificOffense => "Specific Offense Characteristic",
            Self::ChapterWide => "Chapter Three Adjustment",
        }
    }

    pub const fn phase(self) -> Phase {
        match self {
            Self::SpecificOffense => Phase::Characteristics,
            Self::ChapterWide => Phase::ChapterThree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOption {
    pub id: OptionId,
    pub label: String,
    pub delta: Level,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Contributes `delta` only when answered yes.
    Binary {
        delta: Level,
        description: String,
        /// "If the resulting offense level is less than N, increase to N."
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum_level: Option<Level>,
        /// Replaces the running level outright; `delta` is ignored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        set_level: Option<Level>,
    },
    /// Closed set of mutually exclusive options.
    MultiSelect { options: Vec<AdjustmentOption> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub prompt: String,
    pub citation: String,
    pub scope: AdjustmentScope,
    pub kind: AdjustmentKind,
}

impl Adjustment {
    pub fn option(&self, option: &OptionId) -> Option<&AdjustmentOption> {
        match &self.kind {
            AdjustmentKind::MultiSelect { options } => {
                options.iter().find(|candidate| &candidate.id == option)
            }
            AdjustmentKind::Binary { .. } => None,
        }
    }

    /// Delta and human label this adjustment contributes under `answer`.
    pub fn contribution(&self, answer: &AnswerValue) -> Option<(Level, String)> {
        match (&self.kind, answer) {
            (AdjustmentKind::Binary { delta, description, .. }, AnswerValue::Flag(true)) => {
                let label = if description.is_empty() {
                    self.prompt.clone()
                } else {
                    description.clone()
                };
                Some((*delta, label))
            }
            (AdjustmentKind::Binary { .. }, AnswerValue::Flag(false)) => None,
            (AdjustmentKind::MultiSelect { .. }, AnswerValue::Selected(option)) => self
                .option(option)
                .map(|selected| (selected.delta, selected.label.clone())),
            _ => None,
        }
    }

    /// Change this adjustment makes to `running` under `answer`, with level
    /// floors and fixed levels applied at this point in the order.
    pub fn effect_on(&self, answer: &AnswerValue, running: Level) -> Option<(Level, String)> {
        let (delta, label) = self.contribution(answer)?;
        let AdjustmentKind::Binary {
            minimum_level,
            set_level,
            ..
        } = &self.kind
        else {
            return Some((delta, label));
        };

        let target = match (set_level, minimum_level) {
            (Some(level), _) => *level,
            (None, Some(floor)) => (running + delta).max(*floor),
            (None, None) => running + delta,
        };
        Some((target - running, label))
    }
}

/// Wizard phases, in order. The checklist shows the same phases side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Base,
    Characteristics,
    ChapterThree,
    Result,
}

impl Phase {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Start,
            Self::Base,
            Self::Characteristics,
            Self::ChapterThree,
            Self::Result,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Start => "Select Guideline",
            Self::Base => "Base Offense Level",
            Self::Characteristics => "Specific Offense Characteristics",
            Self::ChapterThree => "Chapter Three Adjustments",
            Self::Result => "Total Offense Level",
        }
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Base),
            Self::Base => Some(Self::Characteristics),
            Self::Characteristics => Some(Self::ChapterThree),
            Self::ChapterThree => Some(Self::Result),
            Self::Result => None,
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Start => None,
            Self::Base => Some(Self::Start),
            Self::Characteristics => Some(Self::Base),
            Self::ChapterThree => Some(Self::Characteristics),
            Self::Result => Some(Self::ChapterThree),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    Wizard,
    Checklist,
}

/// Response to an adjustment prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Selected(OptionId),
}

/// Caller-owned answer store. Serializable so the caller can persist it;
/// the engine never does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheet {
    #[serde(default)]
    pub base: BTreeMap<NodeId, bool>,
    #[serde(default)]
    pub adjustments: BTreeMap<AdjustmentId, AnswerValue>,
}

impl AnswerSheet {
    pub fn question(&self, node: &NodeId) -> Option<bool> {
        self.base.get(node).copied()
    }

    pub fn adjustment(&self, id: &AdjustmentId) -> Option<&AnswerValue> {
        self.adjustments.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.adjustments.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMarker {
    #[default]
    Unreviewed,
    Answered,
    NotApplicable,
}

impl ReviewMarker {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unreviewed => "Not yet reviewed",
            Self::Answered => "Reviewed",
            Self::NotApplicable => "Considered, not applicable",
        }
    }

    pub const fn is_reviewed(self) -> bool {
        !matches!(self, Self::Unreviewed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewProgress {
    pub reviewed: usize,
    pub total: usize,
}

impl ReviewProgress {
    pub fn is_complete(&self) -> bool {
        self.reviewed == self.total
    }
}

/// One non-zero contribution to the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub adjustment_id: AdjustmentId,
    pub scope: AdjustmentScope,
    pub citation: String,
    pub label: String,
    pub delta: Level,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub base_level: Level,
    pub base_description: String,
    pub lines: Vec<BreakdownLine>,
    pub total: Level,
}

impl Breakdown {
    pub fn adjustment_sum(&self) -> Level {
        self.total - self.base_level
    }
}

/// Result of evaluating a guideline against an answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Pending { at: NodeId },
    Complete(Breakdown),
}

impl Evaluation {
    pub fn breakdown(&self) -> Option<&Breakdown> {
        match self {
            Self::Complete(breakdown) => Some(breakdown),
            Self::Pending { .. } => None,
        }
    }

    pub fn total(&self) -> Option<Level> {
        self.breakdown().map(|breakdown| breakdown.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearOutcome {
    pub year: GuidelineYear,
    pub breakdown: Breakdown,
}

/// Structural defects rejected when a guideline is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "defect", rename_all = "snake_case")]
pub enum StructuralDefect {
    #[error("root question '{root}' does not exist")]
    MissingRoot { root: NodeId },
    #[error("question '{node}' is declared more than once")]
    DuplicateNode { node: NodeId },
    #[error("question '{from}' points to non-existent question '{target}'")]
    DanglingEdge { from: NodeId, target: NodeId },
    #[error("question '{node}' is part of a cycle")]
    Cycle { node: NodeId },
    #[error("question '{node}' is not reachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("adjustment '{adjustment}' is declared more than once")]
    DuplicateAdjustment { adjustment: AdjustmentId },
    #[error("adjustment '{adjustment}' has no options")]
    EmptyOptions { adjustment: AdjustmentId },
    #[error("adjustment '{adjustment}' repeats option '{option}'")]
    DuplicateOption {
        adjustment: AdjustmentId,
        option: OptionId,
    },
}

/// Reasons an answer mutation is rejected. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidAnswer {
    #[error("no guideline has been selected")]
    NoGuidelineSelected,
    #[error("question '{node}' does not exist in this guideline")]
    UnknownNode { node: NodeId },
    #[error("question '{node}' is not on the current decision path")]
    NodeNotOnPath { node: NodeId },
    #[error("adjustment '{adjustment}' does not exist in this guideline")]
    UnknownAdjustment { adjustment: AdjustmentId },
    #[error("option '{option}' is not offered by adjustment '{adjustment}'")]
    UnknownOption {
        adjustment: AdjustmentId,
        option: OptionId,
    },
    #[error("adjustment '{adjustment}' expects a {expected} answer")]
    KindMismatch {
        adjustment: AdjustmentId,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("guideline §{offense} ({year}) is malformed: {defect}")]
    MalformedGuideline {
        offense: OffenseCode,
        year: GuidelineYear,
        defect: StructuralDefect,
    },
    #[error("no guideline year for §{offense} produced a complete evaluation")]
    Incomparable {
        offense: OffenseCode,
        pending_years: Vec<GuidelineYear>,
    },
    #[error("answer rejected: {0}")]
    InvalidAnswer(#[from] InvalidAnswer),
}
