use wordcode::wordcode::disassemble;
use wordcode::{CompileErrorKind, CompileOptions, compile_string, compile_test};

fn test_listing(args: &[&str]) -> String {
    let program = compile_test(args.iter().copied(), CompileOptions::default())
        .unwrap_or_else(|error| panic!("failed to compile test {args:?}: {error}"));
    disassemble(&program)
}

fn cond_listing(text: &str) -> String {
    let program = compile_string(text, CompileOptions::default())
        .unwrap_or_else(|error| panic!("failed to compile {text:?}: {error}"));
    disassemble(&program)
}

#[test]
fn empty_test_is_always_false() {
    let listing = test_listing(&[]);
    assert!(listing.contains("COND -n \"\""), "{listing}");
}

#[test]
fn single_argument_tests_for_non_empty() {
    let listing = test_listing(&["word"]);
    assert!(listing.contains("COND -n \"word\""), "{listing}");
}

#[test]
fn lone_dash_t_means_standard_output() {
    let listing = test_listing(&["-t"]);
    assert!(listing.contains("COND -t \"1\""), "{listing}");

    let posix = CompileOptions {
        posix_builtins: true,
        ..CompileOptions::default()
    };
    let program = compile_test(["-t"], posix).expect("should compile");
    assert!(disassemble(&program).contains("COND -n \"-t\""));
}

#[test]
fn string_comparison_gets_a_pattern_slot() {
    let program = compile_test(["a", "=", "b"], CompileOptions::default()).expect("should compile");
    assert_eq!(program.pattern_count(), 1);
    assert!(disassemble(&program).contains("COND = \"a\" \"b\" #0"));
}

#[test]
fn unary_file_test() {
    let listing = test_listing(&["-f", "file"]);
    assert!(listing.contains("COND -f \"file\""), "{listing}");
}

#[test]
fn numeric_comparison() {
    let listing = test_listing(&["1", "-eq", "2"]);
    assert!(listing.contains("COND -eq \"1\" \"2\""), "{listing}");
}

#[test]
fn dash_a_joins_two_tests() {
    let listing = test_listing(&["a", "-a", "b"]);
    assert!(listing.contains("COND && skip="), "{listing}");
    assert!(listing.contains("COND -n \"a\""), "{listing}");
    assert!(listing.contains("COND -n \"b\""), "{listing}");
}

#[test]
fn bang_negates_the_following_test() {
    let listing = test_listing(&["!", "-z", "x"]);
    assert!(listing.contains("COND !"), "{listing}");
    assert!(listing.contains("COND -z \"x\""), "{listing}");
}

#[test]
fn double_bracket_and_with_pattern_match() {
    let listing = cond_listing("[[ -f file && $a == b* ]]");
    assert!(listing.contains("COND && skip="), "{listing}");
    assert!(listing.contains("COND -f \"file\""), "{listing}");
    assert!(listing.contains("COND == \"$a\" \"b*\" #0"), "{listing}");
}

#[test]
fn double_bracket_string_ordering() {
    let listing = cond_listing("[[ a < b ]]");
    assert!(listing.contains("COND < \"a\" \"b\""), "{listing}");
    let listing = cond_listing("[[ a > b ]]");
    assert!(listing.contains("COND > \"a\" \"b\""), "{listing}");
}

#[test]
fn double_bracket_grouping_and_negation() {
    let listing = cond_listing("[[ ! ( -d x || -e y ) ]]");
    assert!(listing.contains("COND !"), "{listing}");
    assert!(listing.contains("COND || skip="), "{listing}");
    assert!(listing.contains("COND -d \"x\""), "{listing}");
    assert!(listing.contains("COND -e \"y\""), "{listing}");
}

#[test]
fn regex_match() {
    let listing = cond_listing("[[ $x =~ ^a ]]");
    assert!(listing.contains("COND =~ \"$x\" \"^a\""), "{listing}");
}

#[test]
fn two_plain_words_are_not_a_condition() {
    let error = compile_string("[[ a b ]]", CompileOptions::default()).expect_err("no operator");
    assert_eq!(error.kind, CompileErrorKind::ConditionExpected);
}

#[test]
fn empty_double_bracket_is_rejected() {
    assert!(compile_string("[[ ]]", CompileOptions::default()).is_err());
}

#[test]
fn unclosed_double_bracket_expects_closer() {
    let error = compile_string("[[ -n x", CompileOptions::default()).expect_err("missing ]]");
    assert_eq!(error.expected, Some("]]"));
}
