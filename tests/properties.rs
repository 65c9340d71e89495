use proptest::prelude::*;
use route_verifier::{extract, is_valid_code, Registry, Status};

fn code_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[0-9]{4}", 0..40)
}

proptest! {
    #[test]
    fn extract_only_yields_four_digit_codes(s in ".{0,300}") {
        for code in extract(&s) {
            prop_assert!(is_valid_code(&code), "bad code {:?}", code);
        }
    }

    #[test]
    fn extract_handles_route_like_text(
        s in "((TBA|tba|Stop|pkg)? ?[0-9]{0,14}[ ,\n]){0,20}"
    ) {
        for code in extract(&s) {
            prop_assert!(is_valid_code(&code), "bad code {:?}", code);
        }
    }

    #[test]
    fn merge_is_idempotent(codes in prop::collection::vec(".{0,6}", 0..40)) {
        let mut registry = Registry::new();
        registry.merge(&codes);
        prop_assert_eq!(registry.merge(&codes), 0);
    }

    #[test]
    fn merge_keeps_strict_ascending_order(
        first in code_list(),
        second in code_list(),
    ) {
        let mut registry = Registry::new();
        registry.merge(&first);
        registry.merge(&second);

        let values: Vec<u16> = registry
            .entries()
            .iter()
            .map(|e| e.code.parse().unwrap())
            .collect();
        prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn counts_partition_total(
        codes in code_list(),
        taps in prop::collection::vec(0usize..40, 0..80),
    ) {
        let mut registry = Registry::new();
        registry.merge(&codes);
        for tap in taps {
            if let Some(code) = codes.get(tap) {
                registry.cycle_status(code);
            }
        }

        let counts = registry.counts();
        prop_assert_eq!(counts.total, registry.len());
        prop_assert_eq!(
            counts.confirmed + counts.missing + counts.extra + counts.unmarked,
            counts.total
        );
    }

    #[test]
    fn four_cycles_return_to_start(codes in code_list(), pre in 0usize..4) {
        let mut registry = Registry::new();
        registry.merge(&codes);

        for code in &codes {
            for _ in 0..pre {
                registry.cycle_status(code);
            }
        }
        let before = registry.clone();

        for entry in before.entries() {
            for _ in 0..4 {
                registry.cycle_status(&entry.code);
            }
        }
        prop_assert_eq!(registry, before);
    }

    #[test]
    fn filtered_view_is_ordered_subset(codes in code_list(), query in "[0-9]{0,4}") {
        let mut registry = Registry::new();
        registry.merge(&codes);

        let view = registry.filtered_view(&query);
        prop_assert!(view.iter().all(|e| e.code.contains(query.as_str())));
        prop_assert!(view.windows(2).all(|w| w[0].code < w[1].code));
        prop_assert!(view.iter().all(|e| e.status == Status::Unmarked));
    }
}
