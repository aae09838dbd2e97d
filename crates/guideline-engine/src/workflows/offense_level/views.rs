use super::accumulator::{accumulate, accumulate_from};
use super::domain::{
    Adjustment, AdjustmentId, AdjustmentKind, AdjustmentScope, AnswerValue, Level, NodeId,
    OptionId, Phase, ReviewMarker, ReviewProgress,
};
use super::session::{GuidelineSession, SessionContext};
use super::tree::{evaluate_base, BaseOutcome};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub node: NodeId,
    pub prompt: String,
    pub answer: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub id: OptionId,
    pub label: String,
    pub delta: Level,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentView {
    pub id: AdjustmentId,
    pub prompt: String,
    pub citation: String,
    pub scope: AdjustmentScope,
    /// Present only for yes/no adjustments.
    pub yes_delta: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_level: Option<Level>,
    /// Present only for multi-select adjustments.
    pub options: Vec<OptionView>,
    pub answer: Option<AnswerValue>,
    pub review: ReviewMarker,
    pub review_label: &'static str,
    pub flagged: bool,
    pub applied_delta: Level,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionView {
    pub phase: Phase,
    pub label: &'static str,
    pub questions: Vec<QuestionView>,
    pub adjustments: Vec<AdjustmentView>,
}

/// Running total shown alongside every screen. The total is only known once
/// the base level is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunningTotal {
    pub base_level: Option<Level>,
    pub adjustment_sum: Level,
    pub total: Option<Level>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardView {
    pub context: SessionContext,
    pub phase: Phase,
    pub phase_label: &'static str,
    /// The base question awaiting an answer, if any.
    pub pending_question: Option<QuestionView>,
    pub section: SectionView,
    pub running: RunningTotal,
    pub progress: ReviewProgress,
    pub can_advance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistView {
    pub context: SessionContext,
    pub sections: Vec<SectionView>,
    pub running: RunningTotal,
    pub progress: ReviewProgress,
}

impl GuidelineSession {
    /// One-phase-at-a-time projection. `None` until a guideline is selected.
    pub fn wizard_view(&self) -> Option<WizardView> {
        let context = self.context()?;
        let guideline = self.selected()?;
        let outcome = evaluate_base(guideline, &self.answers().base);

        let pending_question = outcome
            .pending_node()
            .and_then(|node| guideline.question(node))
            .map(|node| QuestionView {
                node: node.id.clone(),
                prompt: node.prompt.clone(),
                answer: None,
            });

        let can_advance = match self.phase() {
            Phase::Result => false,
            Phase::Base => outcome.level().is_some(),
            _ => true,
        };

        Some(WizardView {
            context,
            phase: self.phase(),
            phase_label: self.phase().label(),
            pending_question,
            section: self.section(self.phase(), &outcome),
            running: self.running_total(&outcome),
            progress: self.review_progress(),
            can_advance,
        })
    }

    /// Every section at once over the same answers.
    pub fn checklist_view(&self) -> Option<ChecklistView> {
        let context = self.context()?;
        let guideline = self.selected()?;
        let outcome = evaluate_base(guideline, &self.answers().base);

        let sections = [Phase::Base, Phase::Characteristics, Phase::ChapterThree]
            .into_iter()
            .map(|phase| self.section(phase, &outcome))
            .collect();

        Some(ChecklistView {
            context,
            sections,
            running: self.running_total(&outcome),
            progress: self.review_progress(),
        })
    }

    fn section(&self, phase: Phase, outcome: &BaseOutcome) -> SectionView {
        let mut section = SectionView {
            phase,
            label: phase.label(),
            questions: Vec::new(),
            adjustments: Vec::new(),
        };
        let Some(guideline) = self.selected() else {
            return section;
        };

        match phase {
            Phase::Base => {
                section.questions = outcome
                    .path()
                    .iter()
                    .map(|step| (step.node.clone(), Some(step.answer)))
                    .chain(outcome.pending_node().map(|node| (node.clone(), None)))
                    .filter_map(|(id, answer)| {
                        guideline.question(&id).map(|node| QuestionView {
                            node: id,
                            prompt: node.prompt.clone(),
                            answer,
                        })
                    })
                    .collect();
            }
            Phase::Characteristics => {
                section.adjustments = self.adjustment_views(guideline.characteristics());
            }
            Phase::ChapterThree => {
                section.adjustments = self.adjustment_views(guideline.chapter_adjustments());
            }
            Phase::Start | Phase::Result => {}
        }

        section
    }

    fn adjustment_views(&self, adjustments: &[Adjustment]) -> Vec<AdjustmentView> {
        // Once the base level is known, floors and fixed levels are resolved.
        let effective: Option<BTreeMap<AdjustmentId, Level>> = self.breakdown().map(|breakdown| {
            breakdown
                .lines
                .into_iter()
                .map(|line| (line.adjustment_id, line.delta))
                .collect()
        });

        adjustments
            .iter()
            .map(|adjustment| {
                let answer = self.answers().adjustment(&adjustment.id).cloned();
                let review = self.review_marker(&adjustment.id);
                let applied_delta = match &effective {
                    Some(lines) => lines.get(&adjustment.id).copied().unwrap_or(0),
                    None => answer
                        .as_ref()
                        .and_then(|value| adjustment.contribution(value))
                        .map(|(delta, _)| delta)
                        .unwrap_or(0),
                };

                let (yes_delta, minimum_level, set_level, options) = match &adjustment.kind {
                    AdjustmentKind::Binary {
                        delta,
                        minimum_level,
                        set_level,
                        ..
                    } => (Some(*delta), *minimum_level, *set_level, Vec::new()),
                    AdjustmentKind::MultiSelect { options } => (
                        None,
                        None,
                        None,
                        options
                            .iter()
                            .map(|option| OptionView {
                                id: option.id.clone(),
                                label: option.label.clone(),
                                delta: option.delta,
                                selected: matches!(
                                    &answer,
                                    Some(AnswerValue::Selected(chosen)) if chosen == &option.id
                                ),
                            })
                            .collect(),
                    ),
                };

                AdjustmentView {
                    id: adjustment.id.clone(),
                    prompt: adjustment.prompt.clone(),
                    citation: adjustment.citation.clone(),
                    scope: adjustment.scope,
                    yes_delta,
                    minimum_level,
                    set_level,
                    options,
                    answer,
                    review,
                    review_label: review.label(),
                    flagged: self.is_flagged(&adjustment.id),
                    applied_delta,
                }
            })
            .collect()
    }

    fn running_total(&self, outcome: &BaseOutcome) -> RunningTotal {
        let base_level = outcome.level();
        let adjustment_sum = self
            .selected()
            .map(|guideline| {
                let adjustments = guideline.adjustments();
                let answers = &self.answers().adjustments;
                match base_level {
                    Some(base) => accumulate_from(base, adjustments, answers).sum,
                    None => accumulate(adjustments, answers).sum,
                }
            })
            .unwrap_or(0);

        RunningTotal {
            base_level,
            adjustment_sum,
            total: base_level.map(|level| level + adjustment_sum),
        }
    }
}
