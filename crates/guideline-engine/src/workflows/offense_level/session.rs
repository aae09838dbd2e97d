use super::accumulator::evaluate;
use super::domain::{
    AdjustmentId, AdjustmentKind, AnswerSheet, AnswerValue, Breakdown, EngineError, Evaluation,
    GuidelineYear, InvalidAnswer, NodeId, OffenseCode, OptionId, Phase, PresentationMode,
    ReviewMarker, ReviewProgress,
};
use super::guideline::Guideline;
use super::tree::{evaluate_base, reachable_nodes, BaseOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Explicit selection carried by a session instead of ambient globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub year: GuidelineYear,
    pub offense: OffenseCode,
    pub mode: PresentationMode,
}

/// Result of asking the session to move forward or jump to a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advance {
    Entered { phase: Phase },
    AwaitingSelection,
    AwaitingBase { at: NodeId },
    AtResult,
}

/// Serializable snapshot a caller may persist and later restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub answers: AnswerSheet,
    #[serde(default)]
    pub not_applicable: BTreeSet<AdjustmentId>,
    #[serde(default)]
    pub flagged: BTreeSet<AdjustmentId>,
}

/// One caller's walk through a guideline.
///
/// Wizard and checklist presentations share this single state; the mode only
/// changes which phase transitions are gated.
#[derive(Debug, Clone)]
pub struct GuidelineSession {
    mode: PresentationMode,
    phase: Phase,
    guideline: Option<Arc<Guideline>>,
    answers: AnswerSheet,
    reviews: BTreeMap<AdjustmentId, ReviewMarker>,
    flagged: BTreeSet<AdjustmentId>,
}

impl GuidelineSession {
    pub fn new(mode: PresentationMode) -> Self {
        Self {
            mode,
            phase: Phase::Start,
            guideline: None,
            answers: AnswerSheet::default(),
            reviews: BTreeMap::new(),
            flagged: BTreeSet::new(),
        }
    }

    /// Rebuild a session from a persisted record. Base answers must name
    /// reachable questions; everything else goes through the same mutation
    /// boundary callers use.
    pub fn restore(
        guideline: Arc<Guideline>,
        mode: PresentationMode,
        record: &SessionRecord,
    ) -> Result<Self, EngineError> {
        let mut session = Self::new(mode);
        session.select(Arc::clone(&guideline));

        if let Some(unknown) = record
            .answers
            .base
            .keys()
            .find(|node| guideline.question(node).is_none())
        {
            return Err(InvalidAnswer::UnknownNode {
                node: unknown.clone(),
            }
            .into());
        }
        let reachable = reachable_nodes(&guideline, &record.answers.base);
        if let Some(stray) = record
            .answers
            .base
            .keys()
            .find(|node| !reachable.contains(*node))
        {
            return Err(InvalidAnswer::NodeNotOnPath {
                node: stray.clone(),
            }
            .into());
        }
        session.answers.base = record.answers.base.clone();

        for (adjustment, value) in &record.answers.adjustments {
            session.answer_adjustment(adjustment, value.clone())?;
        }
        for adjustment in &record.not_applicable {
            session.mark_not_applicable(adjustment)?;
        }
        for adjustment in &record.flagged {
            session.flag_for_review(adjustment, true)?;
        }

        session.settle_phase();
        Ok(session)
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            answers: self.answers.clone(),
            not_applicable: self
                .reviews
                .iter()
                .filter(|(_, marker)| **marker == ReviewMarker::NotApplicable)
                .map(|(id, _)| id.clone())
                .collect(),
            flagged: self.flagged.clone(),
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected(&self) -> Option<&Arc<Guideline>> {
        self.guideline.as_ref()
    }

    pub fn context(&self) -> Option<SessionContext> {
        self.guideline.as_ref().map(|guideline| SessionContext {
            year: guideline.year(),
            offense: guideline.offense().clone(),
            mode: self.mode,
        })
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    pub fn reviews(&self) -> &BTreeMap<AdjustmentId, ReviewMarker> {
        &self.reviews
    }

    pub fn flagged(&self) -> &BTreeSet<AdjustmentId> {
        &self.flagged
    }

    /// Choose the (year, offense) to work on. A different edition discards
    /// every answer, marker, and flag. Re-selecting the same guideline keeps
    /// them; a rebuilt copy of the same edition keeps them only if they are
    /// still valid against it.
    pub fn select(&mut self, guideline: Arc<Guideline>) -> Phase {
        let (same_edition, same_instance) = match &self.guideline {
            Some(current) => (
                current.same_edition(&guideline),
                Arc::ptr_eq(current, &guideline),
            ),
            None => (false, false),
        };

        if same_edition && !same_instance {
            match Self::restore(Arc::clone(&guideline), self.mode, &self.record()) {
                Ok(restored) => {
                    *self = restored;
                    self.phase = Phase::Base;
                    return self.phase;
                }
                Err(err) => {
                    debug!(error = %err, "kept answers do not fit the reloaded guideline");
                    self.discard_answers(&guideline);
                }
            }
        } else if !same_edition {
            self.discard_answers(&guideline);
        }

        self.guideline = Some(guideline);
        self.phase = Phase::Base;
        self.phase
    }

    fn discard_answers(&mut self, guideline: &Guideline) {
        if !self.answers.is_empty() || !self.reviews.is_empty() || !self.flagged.is_empty() {
            debug!(
                offense = %guideline.offense(),
                year = guideline.year(),
                "selection changed, discarding answers"
            );
        }
        self.answers = AnswerSheet::default();
        self.reviews.clear();
        self.flagged.clear();
    }

    pub fn set_mode(&mut self, mode: PresentationMode) {
        self.mode = mode;
        self.settle_phase();
    }

    /// Record a base-offense answer. Changing an answer discards answers for
    /// questions the walk can no longer reach.
    pub fn answer_question(
        &mut self,
        node: &NodeId,
        answer: bool,
    ) -> Result<BaseOutcome, EngineError> {
        let guideline = Arc::clone(self.require_guideline()?);

        if guideline.question(node).is_none() {
            return Err(InvalidAnswer::UnknownNode { node: node.clone() }.into());
        }
        if !evaluate_base(&guideline, &self.answers.base).visits(node) {
            return Err(InvalidAnswer::NodeNotOnPath { node: node.clone() }.into());
        }

        let previous = self.answers.base.insert(node.clone(), answer);
        if previous.is_some_and(|value| value != answer) {
            self.prune_unreachable(&guideline);
        }

        let outcome = evaluate_base(&guideline, &self.answers.base);
        debug!(node = %node, answer, level = ?outcome.level(), "base question answered");
        self.settle_phase();
        Ok(outcome)
    }

    pub fn answer_adjustment(
        &mut self,
        id: &AdjustmentId,
        value: AnswerValue,
    ) -> Result<(), EngineError> {
        let guideline = self.require_guideline()?;
        let adjustment = guideline
            .adjustment(id)
            .ok_or_else(|| InvalidAnswer::UnknownAdjustment {
                adjustment: id.clone(),
            })?;

        match (&adjustment.kind, &value) {
            (AdjustmentKind::Binary { .. }, AnswerValue::Flag(_)) => {}
            (AdjustmentKind::Binary { .. }, AnswerValue::Selected(_)) => {
                return Err(InvalidAnswer::KindMismatch {
                    adjustment: id.clone(),
                    expected: "yes/no",
                }
                .into());
            }
            (AdjustmentKind::MultiSelect { .. }, AnswerValue::Selected(option)) => {
                if adjustment.option(option).is_none() {
                    return Err(InvalidAnswer::UnknownOption {
                        adjustment: id.clone(),
                        option: option.clone(),
                    }
                    .into());
                }
            }
            (AdjustmentKind::MultiSelect { .. }, AnswerValue::Flag(_)) => {
                return Err(InvalidAnswer::KindMismatch {
                    adjustment: id.clone(),
                    expected: "option",
                }
                .into());
            }
        }

        debug!(adjustment = %id, ?value, "adjustment answered");
        self.answers.adjustments.insert(id.clone(), value);
        self.reviews.insert(id.clone(), ReviewMarker::Answered);
        Ok(())
    }

    pub fn answer_binary(&mut self, id: &AdjustmentId, applies: bool) -> Result<(), EngineError> {
        self.answer_adjustment(id, AnswerValue::Flag(applies))
    }

    /// Select one option of a multi-select adjustment, replacing any earlier
    /// selection.
    pub fn select_option(
        &mut self,
        id: &AdjustmentId,
        option: &OptionId,
    ) -> Result<(), EngineError> {
        self.answer_adjustment(id, AnswerValue::Selected(option.clone()))
    }

    /// Forget the answer and return the adjustment to "unreviewed".
    pub fn clear_adjustment(&mut self, id: &AdjustmentId) -> Result<(), EngineError> {
        self.require_adjustment(id)?;
        self.answers.adjustments.remove(id);
        self.reviews.remove(id);
        Ok(())
    }

    /// Considered and deliberately left out; distinct from answering "no".
    pub fn mark_not_applicable(&mut self, id: &AdjustmentId) -> Result<(), EngineError> {
        self.require_adjustment(id)?;
        self.answers.adjustments.remove(id);
        self.reviews.insert(id.clone(), ReviewMarker::NotApplicable);
        Ok(())
    }

    pub fn flag_for_review(&mut self, id: &AdjustmentId, flagged: bool) -> Result<(), EngineError> {
        self.require_adjustment(id)?;
        if flagged {
            self.flagged.insert(id.clone());
        } else {
            self.flagged.remove(id);
        }
        Ok(())
    }

    pub fn review_marker(&self, id: &AdjustmentId) -> ReviewMarker {
        self.reviews.get(id).copied().unwrap_or_default()
    }

    pub fn is_flagged(&self, id: &AdjustmentId) -> bool {
        self.flagged.contains(id)
    }

    pub fn review_progress(&self) -> ReviewProgress {
        let Some(guideline) = self.guideline.as_ref() else {
            return ReviewProgress {
                reviewed: 0,
                total: 0,
            };
        };

        let reviewed = guideline
            .adjustments()
            .filter(|adjustment| self.review_marker(&adjustment.id).is_reviewed())
            .count();

        ReviewProgress {
            reviewed,
            total: guideline.adjustment_count(),
        }
    }

    pub fn base_outcome(&self) -> Option<BaseOutcome> {
        self.guideline
            .as_ref()
            .map(|guideline| evaluate_base(guideline, &self.answers.base))
    }

    /// Live evaluation; recomputed on every call and never cached.
    pub fn evaluation(&self) -> Option<Evaluation> {
        self.guideline
            .as_ref()
            .map(|guideline| evaluate(guideline, &self.answers))
    }

    pub fn breakdown(&self) -> Option<Breakdown> {
        match self.evaluation()? {
            Evaluation::Complete(breakdown) => Some(breakdown),
            Evaluation::Pending { .. } => None,
        }
    }

    /// Move to the next phase, honoring wizard gating.
    pub fn advance(&mut self) -> Advance {
        let Some(next) = self.phase.next() else {
            return Advance::AtResult;
        };
        if let Some(blocked) = self.gate(next) {
            return blocked;
        }
        self.enter_unchecked(next)
    }

    /// Step back one phase. Never discards answers.
    pub fn back(&mut self) -> Phase {
        if let Some(previous) = self.phase.previous() {
            debug!(from = ?self.phase, to = ?previous, "stepping back");
            self.phase = previous;
        }
        self.phase
    }

    /// Jump to `phase`. Earlier phases are always reachable; later phases
    /// are gated in wizard mode and open in checklist mode.
    pub fn enter(&mut self, phase: Phase) -> Advance {
        if phase <= self.phase {
            return self.enter_unchecked(phase);
        }
        if let Some(blocked) = self.gate(phase) {
            return blocked;
        }
        self.enter_unchecked(phase)
    }

    fn enter_unchecked(&mut self, phase: Phase) -> Advance {
        if phase != self.phase {
            debug!(from = ?self.phase, to = ?phase, mode = ?self.mode, "entering phase");
        }
        self.phase = phase;
        Advance::Entered { phase }
    }

    fn gate(&self, target: Phase) -> Option<Advance> {
        if target == Phase::Start {
            return None;
        }
        let guideline = match self.guideline.as_ref() {
            Some(guideline) => guideline,
            None => return Some(Advance::AwaitingSelection),
        };
        if self.mode == PresentationMode::Wizard && target > Phase::Base {
            if let BaseOutcome::PendingAt { node, .. } =
                evaluate_base(guideline, &self.answers.base)
            {
                return Some(Advance::AwaitingBase { at: node });
            }
        }
        None
    }

    /// Keep the wizard from sitting past `Base` while the base level is open.
    fn settle_phase(&mut self) {
        if self.mode != PresentationMode::Wizard || self.phase <= Phase::Base {
            return;
        }
        if let Some(BaseOutcome::PendingAt { node, .. }) = self.base_outcome() {
            debug!(pending = %node, "base level reopened, returning wizard to base phase");
            self.phase = Phase::Base;
        }
    }

    fn prune_unreachable(&mut self, guideline: &Guideline) {
        let reachable = reachable_nodes(guideline, &self.answers.base);
        let before = self.answers.base.len();
        self.answers.base.retain(|node, _| reachable.contains(node));
        let discarded = before - self.answers.base.len();
        if discarded > 0 {
            debug!(discarded, "discarded answers for questions no longer reachable");
        }
    }

    fn require_guideline(&self) -> Result<&Arc<Guideline>, EngineError> {
        self.guideline
            .as_ref()
            .ok_or_else(|| InvalidAnswer::NoGuidelineSelected.into())
    }

    fn require_adjustment(&self, id: &AdjustmentId) -> Result<(), EngineError> {
        let guideline = self.require_guideline()?;
        if guideline.adjustment(id).is_none() {
            return Err(InvalidAnswer::UnknownAdjustment {
                adjustment: id.clone(),
            }
            .into());
        }
        Ok(())
    }
}
