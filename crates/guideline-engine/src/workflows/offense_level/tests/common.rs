use std::sync::Arc;

use crate::workflows::offense_level::domain::{
    Adjustment, AdjustmentId, AdjustmentKind, AdjustmentOption, AdjustmentScope, AnswerSheet,
    AnswerValue, DecisionNode, EdgeTarget, GuidelineYear, Level, NodeId, OptionId,
};
use crate::workflows::offense_level::{Guideline, GuidelineDraft};

pub(super) const OFFENSE: &str = "2X1.1";

pub(super) fn node(id: &str) -> NodeId {
    NodeId::from(id)
}

pub(super) fn adj(id: &str) -> AdjustmentId {
    AdjustmentId::from(id)
}

pub(super) fn opt(id: &str) -> OptionId {
    OptionId::from(id)
}

pub(super) fn question(id: &str, prompt: &str, yes: EdgeTarget, no: EdgeTarget) -> DecisionNode {
    DecisionNode {
        id: node(id),
        prompt: prompt.to_string(),
        yes,
        no,
    }
}

pub(super) fn binary(id: &str, prompt: &str, delta: Level, citation: &str) -> Adjustment {
    Adjustment {
        id: adj(id),
        prompt: prompt.to_string(),
        citation: citation.to_string(),
        scope: AdjustmentScope::SpecificOffense,
        kind: AdjustmentKind::Binary {
            delta,
            description: String::new(),
            minimum_level: None,
            set_level: None,
        },
    }
}

/// Binary adjustment that adds `delta` and then lifts the running level to
/// at least `floor`.
pub(super) fn floored(
    id: &str,
    prompt: &str,
    delta: Level,
    floor: Level,
    citation: &str,
) -> Adjustment {
    let mut adjustment = binary(id, prompt, delta, citation);
    if let AdjustmentKind::Binary { minimum_level, .. } = &mut adjustment.kind {
        *minimum_level = Some(floor);
    }
    adjustment
}

/// Binary adjustment that replaces the running level with `level`.
pub(super) fn fixed(id: &str, prompt: &str, level: Level, citation: &str) -> Adjustment {
    let mut adjustment = binary(id, prompt, 0, citation);
    if let AdjustmentKind::Binary { set_level, .. } = &mut adjustment.kind {
        *set_level = Some(level);
    }
    adjustment
}

pub(super) fn select(
    id: &str,
    prompt: &str,
    citation: &str,
    options: &[(&str, &str, Level)],
) -> Adjustment {
    Adjustment {
        id: adj(id),
        prompt: prompt.to_string(),
        citation: citation.to_string(),
        scope: AdjustmentScope::SpecificOffense,
        kind: AdjustmentKind::MultiSelect {
            options: options
                .iter()
                .map(|(option, label, delta)| AdjustmentOption {
                    id: opt(option),
                    label: label.to_string(),
                    delta: *delta,
                })
                .collect(),
        },
    }
}

/// Three-question tree:
///
/// * `base_1` yes -> `root_level`, no -> `base_2`
/// * `base_2` yes -> 24, no -> `base_3`
/// * `base_3` yes -> 20, no -> 12
pub(super) fn draft(year: GuidelineYear, root_level: Level) -> GuidelineDraft {
    GuidelineDraft {
        offense: OFFENSE.into(),
        year,
        title: "Fictional Offense".to_string(),
        citation: format!("§{OFFENSE}"),
        reference: Some("p. 101".to_string()),
        root: node("base_1"),
        questions: vec![
            question(
                "base_1",
                "Is the statutory maximum 20 years or more?",
                EdgeTarget::level(root_level, "statutory maximum of 20 years or more"),
                EdgeTarget::node("base_2"),
            ),
            question(
                "base_2",
                "Was a firearm discharged?",
                EdgeTarget::level(24, "firearm discharged"),
                EdgeTarget::node("base_3"),
            ),
            question(
                "base_3",
                "Did the offense result in bodily injury?",
                EdgeTarget::level(20, "bodily injury"),
                EdgeTarget::level(12, "otherwise"),
            ),
        ],
        characteristics: vec![
            binary(
                "soc_weapon",
                "Was a dangerous weapon possessed?",
                2,
                "§2X1.1(b)(1)",
            ),
            select(
                "soc_victims",
                "How many victims were involved?",
                "§2X1.1(b)(2)",
                &[
                    ("fewer_than_10", "Fewer than 10 victims", 0),
                    ("ten_or_more", "10 or more victims", 2),
                    ("fifty_or_more", "50 or more victims", 4),
                ],
            ),
        ],
        chapter_adjustments: vec![
            binary(
                "ch3_obstruction",
                "Did the defendant obstruct justice?",
                2,
                "§3C1.1",
            ),
            select(
                "ch3_acceptance",
                "Did the defendant accept responsibility?",
                "§3E1.1",
                &[
                    ("none", "No acceptance", 0),
                    ("two_level", "Acceptance (2 levels)", -2),
                    ("three_level", "Acceptance with timely plea (3 levels)", -3),
                ],
            ),
        ],
    }
}

pub(super) fn guideline(year: GuidelineYear, root_level: Level) -> Arc<Guideline> {
    Arc::new(Guideline::new(draft(year, root_level)).expect("fixture guideline is well formed"))
}

pub(super) fn fixture() -> Arc<Guideline> {
    guideline(2025, 14)
}

/// Tree where `d` is shared by two branches:
///
/// * `a` yes -> `b`, no -> `c`
/// * `b` yes -> `d`, no -> 10
/// * `c` yes -> `d`, no -> 11
/// * `d` yes -> 20, no -> 21
pub(super) fn shared_draft() -> GuidelineDraft {
    GuidelineDraft {
        offense: "2X2.1".into(),
        year: 2025,
        title: "Fictional Shared Branch Offense".to_string(),
        citation: "§2X2.1".to_string(),
        reference: None,
        root: node("a"),
        questions: vec![
            question(
                "a",
                "Was the offense committed for hire?",
                EdgeTarget::node("b"),
                EdgeTarget::node("c"),
            ),
            question(
                "b",
                "Was payment received?",
                EdgeTarget::node("d"),
                EdgeTarget::level(10, "unpaid"),
            ),
            question(
                "c",
                "Was a threat made?",
                EdgeTarget::node("d"),
                EdgeTarget::level(11, "no threat"),
            ),
            question(
                "d",
                "Was a weapon used?",
                EdgeTarget::level(20, "weapon used"),
                EdgeTarget::level(21, "weapon not used"),
            ),
        ],
        characteristics: vec![binary(
            "soc_weapon",
            "Was a dangerous weapon possessed?",
            2,
            "§2X2.1(b)(1)",
        )],
        chapter_adjustments: Vec::new(),
    }
}

pub(super) fn shared_fixture() -> Arc<Guideline> {
    Arc::new(Guideline::new(shared_draft()).expect("shared fixture is well formed"))
}

pub(super) fn sheet(base: &[(&str, bool)], adjustments: &[(&str, AnswerValue)]) -> AnswerSheet {
    AnswerSheet {
        base: base.iter().map(|(id, answer)| (node(id), *answer)).collect(),
        adjustments: adjustments
            .iter()
            .map(|(id, value)| (adj(id), value.clone()))
            .collect(),
    }
}

pub(super) fn yes() -> AnswerValue {
    AnswerValue::Flag(true)
}

pub(super) fn no() -> AnswerValue {
    AnswerValue::Flag(false)
}

pub(super) fn pick(option: &str) -> AnswerValue {
    AnswerValue::Selected(opt(option))
}
