//! Property-based round-trip tests: any input a grammar fully accepts comes
//! back out of the results as the same text.

use proptest::prelude::*;

use trellis::engine::testing;

proptest! {
    #[test]
    fn accepted_numbers_extract_back_to_the_input(input in "[01]{1,12}") {
        let mut parser = testing::session("numbers", testing::numbers())
            .expect("grammar compiles");
        let results = parser.parse_str(&input);

        prop_assert_eq!(results.len(), 1);
        prop_assert_eq!(results[0].position, 0);
        prop_assert_eq!(results[0].length, input.chars().count());
        prop_assert_eq!(results[0].text(), input);
    }

    #[test]
    fn nested_brackets_extract_back_to_the_input(depth in 0usize..6) {
        let input = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let mut parser = testing::session("expr", testing::expressions())
            .expect("grammar compiles");
        let results = parser.parse_str(&input);

        prop_assert_eq!(results.len(), 1);
        prop_assert_eq!(results[0].text(), input);
    }
}
