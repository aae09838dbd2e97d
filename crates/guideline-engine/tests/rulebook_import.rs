use guideline_engine::workflows::offense_level::{AdjustmentKind, AdjustmentScope, OffenseCode};
use guideline_engine::workflows::rulebook::{normalize_offense_code, RuleBook, RuleBookError};

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data");

fn book() -> RuleBook {
    RuleBook::from_dir(DATA_DIR).expect("bundled rule data loads")
}

#[test]
fn bundled_data_loads_every_edition() {
    let book = book();

    assert!(book.rejected().is_empty(), "rejected: {:?}", book.rejected());
    assert_eq!(book.years().into_iter().collect::<Vec<_>>(), vec![2024, 2025]);
    assert_eq!(book.len(), 4);
    let offenses: Vec<_> = book.offenses(2025).into_iter().map(OffenseCode::as_str).collect();
    assert_eq!(offenses, vec!["2B1.1", "2K2.1"]);
}

#[test]
fn theft_guideline_carries_its_citations() {
    let book = book();

    let theft = book
        .guideline(2025, &OffenseCode::from("2B1.1"))
        .expect("theft guideline");

    assert_eq!(theft.citation(), "§2B1.1");
    assert_eq!(theft.root().as_str(), "base_1");
    assert_eq!(
        theft.possible_base_levels().into_iter().collect::<Vec<_>>(),
        vec![6, 7]
    );
    let loss = theft
        .characteristics()
        .first()
        .expect("loss table present");
    assert_eq!(loss.citation, "§2B1.1(b)(1)");
    assert!(matches!(&loss.kind, AdjustmentKind::MultiSelect { options } if options.len() == 16));
}

#[test]
fn chapter_three_adjustments_are_shared_by_every_offense() {
    let book = book();

    for offense in ["2B1.1", "2K2.1"] {
        let guideline = book
            .guideline(2024, &OffenseCode::from(offense))
            .expect("guideline present");
        let chapter_three = guideline.chapter_adjustments();
        assert_eq!(chapter_three.len(), 6);
        assert!(chapter_three
            .iter()
            .all(|adjustment| adjustment.scope == AdjustmentScope::ChapterWide));
        assert_eq!(chapter_three[5].citation, "§3E1.1");
    }
}

#[test]
fn firearms_editions_differ_in_trafficking_shape() {
    let book = book();
    let editions = book.editions(&OffenseCode::from("2K2.1"));

    let kinds: Vec<_> = editions
        .values()
        .map(|guideline| {
            let trafficking = guideline
                .adjustment(&"soc_trafficking".into())
                .expect("trafficking characteristic");
            matches!(trafficking.kind, AdjustmentKind::Binary { .. })
        })
        .collect();

    assert_eq!(kinds, vec![true, false]);
}

#[test]
fn unknown_edition_is_reported() {
    let book = book();

    let err = book
        .guideline(2019, &OffenseCode::from("2B1.1"))
        .expect_err("no 2019 data");

    assert!(matches!(err, RuleBookError::UnknownGuideline { year: 2019, .. }));
    assert_eq!(normalize_offense_code("§ 2k2.1"), "2K2.1");
}
