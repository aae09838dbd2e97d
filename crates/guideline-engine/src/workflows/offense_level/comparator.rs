use super::accumulator::evaluate;
use super::domain::{
    AnswerSheet, EngineError, Evaluation, GuidelineYear, NodeId, OffenseCode, YearOutcome,
};
use super::guideline::Guideline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers for a cross-year comparison.
///
/// Years share `shared` unless a partition is supplied for them. A year
/// whose tree or adjustments diverge from the others should get its own
/// partition; the comparator does not try to reconcile shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearAnswers {
    #[serde(default)]
    pub shared: AnswerSheet,
    #[serde(default)]
    pub by_year: BTreeMap<GuidelineYear, AnswerSheet>,
}

impl YearAnswers {
    pub fn shared(answers: AnswerSheet) -> Self {
        Self {
            shared: answers,
            by_year: BTreeMap::new(),
        }
    }

    pub fn with_partition(mut self, year: GuidelineYear, answers: AnswerSheet) -> Self {
        self.by_year.insert(year, answers);
        self
    }

    pub fn for_year(&self, year: GuidelineYear) -> &AnswerSheet {
        self.by_year.get(&year).unwrap_or(&self.shared)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingYear {
    pub year: GuidelineYear,
    pub at: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub offense: OffenseCode,
    pub selected: YearOutcome,
    /// Every computable year, ascending.
    pub outcomes: Vec<YearOutcome>,
    pub pending: Vec<PendingYear>,
}

impl Comparison {
    pub fn outcome_for(&self, year: GuidelineYear) -> Option<&YearOutcome> {
        self.outcomes.iter().find(|outcome| outcome.year == year)
    }
}

/// Apply the one-book rule: evaluate every edition and keep the lowest
/// total, preferring the most recent year on ties.
pub fn compare_years(
    offense: &OffenseCode,
    editions: &BTreeMap<GuidelineYear, Arc<Guideline>>,
    answers: &YearAnswers,
) -> Result<Comparison, EngineError> {
    let mut outcomes = Vec::new();
    let mut pending = Vec::new();

    for (&year, guideline) in editions {
        if guideline.offense() != offense {
            warn!(
                expected = %offense,
                found = %guideline.offense(),
                year,
                "skipping edition for a different offense"
            );
            continue;
        }

        match evaluate(guideline, answers.for_year(year)) {
            Evaluation::Complete(breakdown) => {
                debug!(year, total = breakdown.total, "edition evaluated");
                outcomes.push(YearOutcome { year, breakdown });
            }
            Evaluation::Pending { at } => {
                debug!(year, pending = %at, "edition still pending");
                pending.push(PendingYear { year, at });
            }
        }
    }

    let selected = outcomes
        .iter()
        .min_by(|a, b| {
            a.breakdown
                .total
                .cmp(&b.breakdown.total)
                .then_with(|| b.year.cmp(&a.year))
        })
        .cloned()
        .ok_or_else(|| EngineError::Incomparable {
            offense: offense.clone(),
            pending_years: pending.iter().map(|entry| entry.year).collect(),
        })?;

    Ok(Comparison {
        offense: offense.clone(),
        selected,
        outcomes,
        pending,
    })
}
