//! Integration tests for the recursion machinery: left-recursive folds stay
//! bounded, self-embedding constructs nest, and a fold inside brackets is
//! consumed only after it stops growing.

use trellis::engine::testing;
use trellis::{Results, Step};

#[test]
fn a_fold_consumes_arbitrarily_long_input() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");
    let input = "10110100101";
    let results = parser.parse_str(input);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "Number");
    assert_eq!(results[0].position, 0);
    assert_eq!(results[0].length, input.chars().count());
    assert_eq!(results[0].text(), input);
}

#[test]
fn fold_row_count_does_not_grow_with_input_length() {
    let mut parser = testing::session("numbers", testing::numbers()).expect("grammar compiles");
    let baseline = parser.row_count();
    for c in "1011010010110100".chars() {
        let step = parser.parse_step(c, false);
        assert!(matches!(step, Step::Scanned { .. }));
        assert!(parser.row_count() <= baseline + 2);
    }
}

#[test]
fn brackets_nest_to_matching_depth() {
    let mut parser = testing::session("expr", testing::expressions()).expect("grammar compiles");
    let results = parser.parse_str("(((1)))");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text(), "(((1)))");
    assert_eq!(nesting_depth(&results[0]), 3);
}

#[test]
fn an_unclosed_bracket_yields_no_top_result_for_it() {
    let mut parser = testing::session("expr", testing::expressions()).expect("grammar compiles");
    let results = parser.parse_str("((1)");

    // the inner pair completes; the outer construct never closes
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text(), "(1)");
    assert_eq!(results[0].position, 1);
}

#[test]
fn a_fold_inside_brackets_finishes_growing_first() {
    let mut parser = testing::session("sums", testing::sums()).expect("grammar compiles");
    let results = parser.parse_str("(1+2+1)");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol, "Paren");
    assert_eq!(results[0].text(), "(1+2+1)");

    let pattern = results[0].extract().expect("pattern");
    let sum = pattern.extractions[1].buddy.as_ref().expect("nested sum");
    assert_eq!(sum.text(), "1+2+1");
}

/// Count how many bracket levels a result wraps around its innermost digit.
fn nesting_depth(results: &Results) -> usize {
    let pattern = results.extract().expect("pattern");
    if pattern.extractions.len() == 1 {
        return 0;
    }
    match pattern.extractions[1].buddy.as_deref() {
        Some(inner) => 1 + nesting_depth(inner),
        None => 1,
    }
}
