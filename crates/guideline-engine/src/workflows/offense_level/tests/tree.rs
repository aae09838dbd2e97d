use std::collections::{BTreeMap, BTreeSet};

use super::common::*;
use crate::workflows::offense_level::{evaluate_base, reachable_nodes, BaseOutcome, PathStep};

#[test]
fn empty_answers_are_pending_at_root() {
    let guideline = fixture();

    let outcome = evaluate_base(&guideline, &BTreeMap::new());

    assert_eq!(
        outcome,
        BaseOutcome::PendingAt {
            node: node("base_1"),
            path: Vec::new(),
        }
    );
}

#[test]
fn yes_at_root_terminates_immediately() {
    let guideline = fixture();
    let answers = sheet(&[("base_1", true)], &[]);

    let outcome = evaluate_base(&guideline, &answers.base);

    assert_eq!(outcome.level(), Some(14));
    assert_eq!(
        outcome.path(),
        &[PathStep {
            node: node("base_1"),
            answer: true,
        }]
    );
}

#[test]
fn walks_through_intermediate_questions() {
    let guideline = fixture();
    let answers = sheet(&[("base_1", false), ("base_2", false), ("base_3", true)], &[]);

    match evaluate_base(&guideline, &answers.base) {
        BaseOutcome::Level {
            level,
            description,
            path,
        } => {
            assert_eq!(level, 20);
            assert_eq!(description, "bodily injury");
            assert_eq!(path.len(), 3);
        }
        other => panic!("expected terminal level, got {other:?}"),
    }
}

#[test]
fn stops_at_first_unanswered_question() {
    let guideline = fixture();
    // base_3 is answered but unreachable until base_2 is answered.
    let answers = sheet(&[("base_1", false), ("base_3", true)], &[]);

    let outcome = evaluate_base(&guideline, &answers.base);

    assert_eq!(outcome.pending_node(), Some(&node("base_2")));
    assert!(outcome.visits(&node("base_1")));
    assert!(outcome.visits(&node("base_2")));
    assert!(!outcome.visits(&node("base_3")));
}

#[test]
fn answers_off_the_path_are_ignored() {
    let guideline = fixture();
    let answers = sheet(&[("base_1", true), ("base_2", true), ("base_3", false)], &[]);

    let outcome = evaluate_base(&guideline, &answers.base);

    assert_eq!(outcome.level(), Some(14));
    assert_eq!(outcome.path().len(), 1);
}

#[test]
fn every_fully_answered_path_reaches_a_level() {
    let guideline = fixture();
    let paths: [&[(&str, bool)]; 4] = [
        &[("base_1", true)],
        &[("base_1", false), ("base_2", true)],
        &[("base_1", false), ("base_2", false), ("base_3", true)],
        &[("base_1", false), ("base_2", false), ("base_3", false)],
    ];

    let levels: Vec<_> = paths
        .iter()
        .map(|path| evaluate_base(&guideline, &sheet(path, &[]).base).level())
        .collect();

    assert_eq!(levels, vec![Some(14), Some(24), Some(20), Some(12)]);
}

fn ids(nodes: BTreeSet<crate::workflows::offense_level::domain::NodeId>) -> Vec<String> {
    nodes.into_iter().map(|id| id.as_str().to_string()).collect()
}

#[test]
fn unanswered_questions_reach_both_branches() {
    let guideline = shared_fixture();

    let reached = reachable_nodes(&guideline, &BTreeMap::new());

    assert_eq!(ids(reached), vec!["a", "b", "c", "d"]);
}

#[test]
fn answered_questions_follow_their_answer() {
    let guideline = shared_fixture();
    let answers = BTreeMap::from([(node("a"), false), (node("c"), false)]);

    let reached = reachable_nodes(&guideline, &answers);

    assert_eq!(ids(reached), vec!["a", "c"]);
}

#[test]
fn shared_question_stays_reachable_from_the_other_branch() {
    let guideline = shared_fixture();
    let answers = BTreeMap::from([(node("a"), false), (node("b"), true), (node("d"), false)]);

    let reached = reachable_nodes(&guideline, &answers);

    assert_eq!(ids(reached), vec!["a", "c", "d"]);
}
