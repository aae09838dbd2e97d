//! Total offense level computation for a single guideline edition.
//!
//! A [`Guideline`] is validated once and then evaluated purely: the
//! base-offense tree is walked with the answers on hand, answered
//! adjustments are summed, and the result is either pending at a question or
//! a complete [`Breakdown`]. [`GuidelineSession`] wraps that evaluation in the
//! wizard/checklist state machine and [`compare_years`] applies the one-book
//! rule across editions.

mod accumulator;
mod comparator;
pub mod domain;
mod guideline;
mod session;
mod trail;
mod tree;
pub mod views;

#[cfg(test)]
mod tests;

pub use accumulator::{accumulate, accumulate_from, evaluate, Accumulation};
pub use comparator::{compare_years, Comparison, PendingYear, YearAnswers};
pub use domain::{
    Adjustment, AdjustmentId, AdjustmentKind, AdjustmentOption, AdjustmentScope, AnswerSheet,
    AnswerValue, Breakdown, BreakdownLine, DecisionNode, EdgeTarget, EngineError, Evaluation,
    GuidelineYear, InvalidAnswer, Level, NodeId, OffenseCode, OptionId, Phase, PresentationMode,
    ReviewMarker, ReviewProgress, StructuralDefect, YearOutcome,
};
pub use guideline::{Guideline, GuidelineDraft};
pub use session::{Advance, GuidelineSession, SessionContext, SessionRecord};
pub use trail::{DecisionTrail, TrailEffect, TrailEntry, TrailExportError};
pub use tree::{evaluate_base, reachable_nodes, BaseOutcome, PathStep};
