use proptest::prelude::*;
use wordcode::{CompileOptions, compile_string};

fn expected_table(words: &[String]) -> Vec<u8> {
    let mut seen: Vec<&str> = Vec::new();
    let mut table = Vec::new();
    for word in words.iter().map(String::as_str) {
        if word.len() > 3 && !seen.contains(&word) {
            seen.push(word);
            table.extend_from_slice(word.as_bytes());
            table.push(0);
        }
    }
    table
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn long_words_are_stored_once_in_first_use_order(args in prop::collection::vec("[a-z]{1,8}", 0..12)) {
        let mut words = vec!["print".to_string()];
        words.extend(args);
        let text = words.join(" ");

        let program = compile_string(&text, CompileOptions::default()).expect("word lists always compile");
        let expected = expected_table(&words);
        prop_assert_eq!(program.strings(), expected.as_slice());
    }

    #[test]
    fn compilation_is_deterministic(args in prop::collection::vec("[a-z0-9_]{1,6}", 1..8), background in any::<bool>()) {
        let mut text = format!("print {}", args.join(" "));
        if background {
            text.push_str(" &");
        }
        let first = compile_string(&text, CompileOptions::default()).expect("should compile");
        let second = compile_string(&text, CompileOptions::default()).expect("should compile");
        prop_assert_eq!(first.words(), second.words());
        prop_assert_eq!(first.strings(), second.strings());
    }

    #[test]
    fn short_words_never_reach_the_table(args in prop::collection::vec("[a-z]{1,3}", 1..10)) {
        let text = format!("cd {}", args.join(" "));
        let program = compile_string(&text, CompileOptions::default()).expect("should compile");
        prop_assert!(program.strings().is_empty());
    }
}
