use super::domain::{
    Adjustment, AdjustmentId, AnswerSheet, AnswerValue, Breakdown, BreakdownLine, Evaluation,
    Level,
};
use super::guideline::Guideline;
use super::tree::{evaluate_base, BaseOutcome};
use std::collections::BTreeMap;

/// Non-zero contributions in declared order, plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulation {
    pub lines: Vec<BreakdownLine>,
    pub sum: Level,
}

/// Apply answered adjustments in order. Unanswered adjustments, "no"
/// answers, and zero-valued options contribute nothing and are not listed.
///
/// Without a base level, floors and fixed levels cannot be resolved; each
/// adjustment contributes its stated delta. See [`accumulate_from`].
pub fn accumulate<'a, I>(
    adjustments: I,
    answers: &BTreeMap<AdjustmentId, AnswerValue>,
) -> Accumulation
where
    I: IntoIterator<Item = &'a Adjustment>,
{
    apply(None, adjustments, answers)
}

/// Like [`accumulate`], starting from `base` so that level floors and fixed
/// levels take effect where they sit in the order. Line deltas are the
/// effective change, so `base + sum` is always the resulting level.
pub fn accumulate_from<'a, I>(
    base: Level,
    adjustments: I,
    answers: &BTreeMap<AdjustmentId, AnswerValue>,
) -> Accumulation
where
    I: IntoIterator<Item = &'a Adjustment>,
{
    apply(Some(base), adjustments, answers)
}

fn apply<'a, I>(
    base: Option<Level>,
    adjustments: I,
    answers: &BTreeMap<AdjustmentId, AnswerValue>,
) -> Accumulation
where
    I: IntoIterator<Item = &'a Adjustment>,
{
    let mut accumulation = Accumulation::default();

    for adjustment in adjustments {
        let Some(answer) = answers.get(&adjustment.id) else {
            continue;
        };
        let contribution = match base {
            Some(base) => adjustment.effect_on(answer, base + accumulation.sum),
            None => adjustment.contribution(answer),
        };
        let Some((delta, label)) = contribution else {
            continue;
        };
        if delta == 0 {
            continue;
        }

        accumulation.sum += delta;
        accumulation.lines.push(BreakdownLine {
            adjustment_id: adjustment.id.clone(),
            scope: adjustment.scope,
            citation: adjustment.citation.clone(),
            label,
            delta,
        });
    }

    accumulation
}

/// Pure evaluation of a guideline against an answer sheet.
pub fn evaluate(guideline: &Guideline, answers: &AnswerSheet) -> Evaluation {
    match evaluate_base(guideline, &answers.base) {
        BaseOutcome::PendingAt { node, .. } => Evaluation::Pending { at: node },
        BaseOutcome::Level {
            level, description, ..
        } => {
            let Accumulation { lines, sum } =
                accumulate_from(level, guideline.adjustments(), &answers.adjustments);
            Evaluation::Complete(Breakdown {
                base_level: level,
                base_description: description,
                lines,
                total: level + sum,
            })
        }
    }
}
