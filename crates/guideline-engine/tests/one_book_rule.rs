use guideline_engine::workflows::offense_level::{
    compare_years, AdjustmentId, AnswerSheet, AnswerValue, EngineError, NodeId, OffenseCode,
    OptionId, YearAnswers,
};
use guideline_engine::workflows::rulebook::RuleBook;

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data");

fn book() -> RuleBook {
    RuleBook::from_dir(DATA_DIR).expect("bundled rule data loads")
}

fn sheet(base: &[(&str, bool)], adjustments: &[(&str, AnswerValue)]) -> AnswerSheet {
    AnswerSheet {
        base: base
            .iter()
            .map(|(id, answer)| (NodeId::from(*id), *answer))
            .collect(),
        adjustments: adjustments
            .iter()
            .map(|(id, value)| (AdjustmentId::from(*id), value.clone()))
            .collect(),
    }
}

fn option(id: &str) -> AnswerValue {
    AnswerValue::Selected(OptionId::from(id))
}

const PROHIBITED_PERSON: [(&str, bool); 4] = [
    ("base_1", false),
    ("base_3", false),
    ("base_5", true),
    ("base_6", false),
];

#[test]
fn identical_editions_tie_and_the_latest_year_wins() {
    let book = book();
    let offense = OffenseCode::from("2B1.1");
    let answers = YearAnswers::shared(sheet(
        &[("base_1", true)],
        &[
            ("soc_loss", option("over_95000")),
            ("ch3_acceptance", option("three_level")),
        ],
    ));

    let comparison =
        compare_years(&offense, &book.editions(&offense), &answers).expect("comparable");

    assert_eq!(comparison.outcomes.len(), 2);
    assert_eq!(comparison.selected.year, 2025);
    assert_eq!(comparison.selected.breakdown.total, 12);
}

#[test]
fn divergent_editions_use_their_own_partitions() {
    let book = book();
    let offense = OffenseCode::from("2K2.1");
    let earlier = sheet(
        &PROHIBITED_PERSON,
        &[
            ("soc_trafficking", AnswerValue::Flag(true)),
            ("ch3_acceptance", option("two_level")),
        ],
    );
    let later = sheet(
        &PROHIBITED_PERSON,
        &[
            ("soc_trafficking", option("trafficking")),
            ("ch3_acceptance", option("two_level")),
        ],
    );
    let answers = YearAnswers::default()
        .with_partition(2024, earlier)
        .with_partition(2025, later);

    let comparison =
        compare_years(&offense, &book.editions(&offense), &answers).expect("comparable");

    assert_eq!(comparison.outcome_for(2024).map(|o| o.breakdown.total), Some(16));
    assert_eq!(comparison.outcome_for(2025).map(|o| o.breakdown.total), Some(17));
    assert_eq!(comparison.selected.year, 2024);
}

#[test]
fn shared_answers_of_the_wrong_shape_contribute_nothing() {
    let book = book();
    let offense = OffenseCode::from("2K2.1");
    let answers = YearAnswers::shared(sheet(
        &PROHIBITED_PERSON,
        &[("soc_trafficking", AnswerValue::Flag(true))],
    ));

    let comparison =
        compare_years(&offense, &book.editions(&offense), &answers).expect("comparable");

    assert_eq!(comparison.outcome_for(2024).map(|o| o.breakdown.total), Some(18));
    assert_eq!(comparison.outcome_for(2025).map(|o| o.breakdown.total), Some(14));
    assert_eq!(comparison.selected.year, 2025);
}

#[test]
fn unanswered_trees_are_incomparable() {
    let book = book();
    let offense = OffenseCode::from("2K2.1");
    let answers = YearAnswers::shared(sheet(&[("base_1", false)], &[]));

    let err = compare_years(&offense, &book.editions(&offense), &answers)
        .expect_err("no complete evaluation");

    assert_eq!(
        err,
        EngineError::Incomparable {
            offense,
            pending_years: vec![2024, 2025],
        }
    );
}
