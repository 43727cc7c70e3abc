//! Integration tests for plain matching: sequences, ambiguity collapse,
//! result extraction and the incremental control surface.

use trellis::engine::testing;
use trellis::{BuildError, Definition, Step};

#[test]
fn a_literal_sequence_matches_end_to_end() {
    let defs = vec![Definition::new("Greeting").alt(["'hi'"])];
    let mut parser = testing::session("greeting", defs).expect("grammar compiles");
    let results = parser.parse_str("hi");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "Greeting");
    assert_eq!(results[0].position, 0);
    assert_eq!(results[0].length, 2);
    assert_eq!(results[0].text(), "hi");
}

#[test]
fn competing_alternatives_collapse_to_the_longest() {
    // both alternatives finish on the same 'b': the two-cell one is longer
    let defs = vec![Definition::new("Word")
        .alt(["'b'"])
        .alt(["'a'", "'b'"])];
    let mut parser = testing::session("words", defs).expect("grammar compiles");
    let results = parser.parse_str("ab");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].length, 2);
    assert_eq!(results[0].text(), "ab");
}

#[test]
fn extraction_reassembles_the_nested_text() {
    let mut parser = testing::session("sums", testing::sums()).expect("grammar compiles");
    let results = parser.parse_str("(1+2)");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "Paren");
    assert_eq!(results[0].text(), "(1+2)");

    // the interior slot carries the whole folded sum as one nested result
    let pattern = results[0].extract().expect("pattern");
    let inner = pattern.extractions[1].buddy.as_ref().expect("nested sum");
    assert_eq!(inner.symbol, "Sum");
    assert_eq!(inner.text(), "1+2");
}

#[test]
fn a_unit_boundary_splits_results_without_losing_them() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");

    // two logical units in one session: "10", then "1"
    assert_eq!(parser.parse_step('1', false), Step::Scanned { position: 1 });
    assert_eq!(parser.parse_step('0', true), Step::Scanned { position: 2 });
    assert_eq!(parser.parse_step('1', true), Step::Scanned { position: 3 });

    // the fold does not bridge the boundary: no single "101" here
    let results = parser.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text(), "10");
    assert_eq!(results[0].position, 0);
    assert_eq!(results[1].text(), "1");
    assert_eq!(results[1].position, 2);
}

#[test]
fn reset_then_reparse_is_idempotent() {
    let mut parser = testing::session("expr", testing::expressions()).expect("grammar compiles");
    let first = parser.parse_str("((1))");
    parser.reset();
    let second = parser.parse_str("((1))");
    assert_eq!(first, second);
}

#[test]
fn added_clusters_take_part_in_matching() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");
    parser
        .add_cluster(Definition::new("Pair").alt(["Number", "','", "Number"]))
        .expect("rebuild succeeds");

    // the new definition references Number, so it becomes the grammar top
    assert_eq!(parser.top_names(), ["Pair".to_string()]);

    let results = parser.parse_str("10,1");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "Pair");
    assert_eq!(results[0].text(), "10,1");
}

#[test]
fn removing_an_unreferenced_cluster_narrows_the_grammar() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");
    parser
        .add_cluster(Definition::new("Pair").alt(["Number", "','", "Number"]))
        .expect("rebuild succeeds");

    let removed = parser.remove_cluster("Pair").expect("rebuild succeeds");
    assert!(removed);
    assert_eq!(parser.top_names(), ["Number".to_string()]);
    assert!(!parser.remove_cluster("Pair").expect("no-op succeeds"));
}

#[test]
fn removing_a_referenced_cluster_is_rejected() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");
    let err = parser.remove_cluster("Digit").expect_err("dangling");
    assert!(matches!(err, BuildError::DanglingReference { .. }));
    // the old grammar stays bound and keeps working
    let results = parser.parse_str("11");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text(), "11");
}
