use super::accumulator::evaluate;
use super::domain::{
    AdjustmentId, AnswerSheet, AnswerValue, EdgeTarget, Evaluation, GuidelineYear, Level,
    OffenseCode, Phase, ReviewMarker,
};
use super::guideline::Guideline;
use super::session::GuidelineSession;
use super::tree::evaluate_base;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// What an item did to the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", content = "value", rename_all = "snake_case")]
pub enum TrailEffect {
    /// Base question leading to another question.
    Continue,
    BaseLevel(Level),
    Delta(Level),
    NotApplicable,
    FlaggedForReview,
}

impl TrailEffect {
    pub fn describe(&self) -> String {
        match self {
            Self::Continue => "continue".to_string(),
            Self::BaseLevel(level) => format!("base offense level {level}"),
            Self::Delta(0) => "no change".to_string(),
            Self::Delta(delta) => format!("{delta:+}"),
            Self::NotApplicable => "considered, not applicable".to_string(),
            Self::FlaggedForReview => "flagged for review".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrailEntry {
    pub phase: Phase,
    pub citation: String,
    pub item: String,
    pub choice: String,
    pub effect: TrailEffect,
    pub flagged: bool,
}

impl TrailEntry {
    pub fn line(&self) -> String {
        let mut line = format!(
            "{} | {} | {} | {}",
            self.citation,
            self.item,
            self.choice,
            self.effect.describe()
        );
        if self.flagged && self.effect != TrailEffect::FlaggedForReview {
            line.push_str(" [flagged for review]");
        }
        line
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrailExportError {
    #[error("failed to write decision trail CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush decision trail: {0}")]
    Io(#[from] std::io::Error),
}

/// Copy-out record of every answered, dismissed, or flagged item.
///
/// A projection of the answers at the time it is built; nothing here is
/// stored back into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionTrail {
    pub offense: OffenseCode,
    pub year: GuidelineYear,
    pub title: String,
    pub citation: String,
    pub prepared_on: Option<NaiveDate>,
    pub entries: Vec<TrailEntry>,
    pub evaluation: Evaluation,
}

impl DecisionTrail {
    pub fn from_session(session: &GuidelineSession) -> Option<Self> {
        let guideline = session.selected()?;
        Some(Self::from_parts(
            guideline,
            session.answers(),
            session.reviews(),
            session.flagged(),
        ))
    }

    pub fn from_parts(
        guideline: &Guideline,
        answers: &AnswerSheet,
        reviews: &BTreeMap<AdjustmentId, ReviewMarker>,
        flagged: &BTreeSet<AdjustmentId>,
    ) -> Self {
        let mut entries = Vec::new();
        let base_citation = format!("{}(a)", guideline.citation());

        for step in evaluate_base(guideline, &answers.base).path() {
            let Some(node) = guideline.question(&step.node) else {
                continue;
            };
            let effect = match node.edge(step.answer) {
                EdgeTarget::Level { level, .. } => TrailEffect::BaseLevel(*level),
                EdgeTarget::Node { .. } => TrailEffect::Continue,
            };
            entries.push(TrailEntry {
                phase: Phase::Base,
                citation: base_citation.clone(),
                item: node.prompt.clone(),
                choice: yes_no(step.answer).to_string(),
                effect,
                flagged: false,
            });
        }

        let evaluation = evaluate(guideline, answers);
        let effective: Option<BTreeMap<&AdjustmentId, Level>> = evaluation
            .breakdown()
            .map(|breakdown| {
                breakdown
                    .lines
                    .iter()
                    .map(|line| (&line.adjustment_id, line.delta))
                    .collect()
            });

        for adjustment in guideline.adjustments() {
            let is_flagged = flagged.contains(&adjustment.id);
            let marker = reviews.get(&adjustment.id).copied().unwrap_or_default();
            let answer = answers.adjustment(&adjustment.id);

            let (choice, effect) = match (answer, marker) {
                (Some(value), _) => {
                    let delta = match &effective {
                        Some(lines) => lines.get(&adjustment.id).copied().unwrap_or(0),
                        None => adjustment
                            .contribution(value)
                            .map(|(delta, _)| delta)
                            .unwrap_or(0),
                    };
                    (describe_answer(adjustment, value), TrailEffect::Delta(delta))
                }
                (None, ReviewMarker::NotApplicable) => {
                    ("Not applicable".to_string(), TrailEffect::NotApplicable)
                }
                (None, _) if is_flagged => {
                    ("No answer".to_string(), TrailEffect::FlaggedForReview)
                }
                (None, _) => continue,
            };

            entries.push(TrailEntry {
                phase: adjustment.scope.phase(),
                citation: adjustment.citation.clone(),
                item: adjustment.prompt.clone(),
                choice,
                effect,
                flagged: is_flagged,
            });
        }

        Self {
            offense: guideline.offense().clone(),
            year: guideline.year(),
            title: guideline.title().to_string(),
            citation: guideline.citation().to_string(),
            prepared_on: None,
            entries,
            evaluation,
        }
    }

    pub fn with_prepared_on(mut self, date: NaiveDate) -> Self {
        self.prepared_on = Some(date);
        self
    }

    /// Plain-text lines suitable for pasting into a memo.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} {} ({} Guidelines Manual)",
            self.citation, self.title, self.year
        )];
        if let Some(date) = self.prepared_on {
            lines.push(format!("Prepared on {}", date.format("%Y-%m-%d")));
        }

        lines.extend(self.entries.iter().map(TrailEntry::line));

        match &self.evaluation {
            Evaluation::Complete(breakdown) => {
                lines.push(format!("Base offense level: {}", breakdown.base_level));
                lines.push(format!("Total offense level: {}", breakdown.total));
            }
            Evaluation::Pending { at } => {
                lines.push(format!(
                    "Total offense level: pending (question {at} unanswered)"
                ));
            }
        }

        lines
    }

    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), TrailExportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(["phase", "citation", "item", "choice", "effect", "flagged"])?;
        for entry in &self.entries {
            csv.write_record([
                entry.phase.label(),
                entry.citation.as_str(),
                entry.item.as_str(),
                entry.choice.as_str(),
                entry.effect.describe().as_str(),
                if entry.flagged { "yes" } else { "no" },
            ])?;
        }
        csv.flush()?;
        Ok(())
    }
}

fn yes_no(answer: bool) -> &'static str {
    if answer {
        "Yes"
    } else {
        "No"
    }
}

fn describe_answer(adjustment: &super::domain::Adjustment, value: &AnswerValue) -> String {
    match value {
        AnswerValue::Flag(answer) => yes_no(*answer).to_string(),
        AnswerValue::Selected(option) => adjustment
            .option(option)
            .map(|selected| selected.label.clone())
            .unwrap_or_else(|| option.to_string()),
    }
}
