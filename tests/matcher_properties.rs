// tests/matcher_properties.rs

use proptest::prelude::*;

use promptdrive::driver::{RuleSet, TriggerRule};

fn needle() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,4}"
}

proptest! {
    /// The rule that answers is always the lowest-indexed rule whose
    /// substring occurs in the line.
    #[test]
    fn first_match_is_lowest_matching_index(
        needles in prop::collection::vec(needle(), 1..6),
        line in "[a-zA-Z ]{0,24}",
    ) {
        let rules: Vec<TriggerRule> = needles
            .iter()
            .map(|n| TriggerRule::new([n.clone()], "y"))
            .collect();
        let set = RuleSet::for_rules(&rules, false).unwrap();

        let expected = needles.iter().position(|n| line.contains(n.as_str()));
        prop_assert_eq!(set.first_match(&line), expected);

        let all = set.matches(&line);
        prop_assert_eq!(all.first().copied(), expected);
    }

    /// Case-insensitive matching ignores ASCII case on either side.
    #[test]
    fn case_insensitive_ignores_ascii_case(n in needle(), prefix in "[a-z ]{0,8}") {
        let rules = [TriggerRule::new([n.to_uppercase()], "y")];
        let set = RuleSet::for_rules(&rules, true).unwrap();
        let line = format!("{prefix}{}", n.to_lowercase());
        prop_assert_eq!(set.first_match(&line), Some(0));
    }
}
