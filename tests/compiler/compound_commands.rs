use wordcode::wordcode::disassemble;
use wordcode::{CompileErrorKind, CompileOptions, compile_string};

fn listing(text: &str) -> String {
    let program = compile_string(text, CompileOptions::default())
        .unwrap_or_else(|error| panic!("failed to compile {text:?}: {error}"));
    disassemble(&program)
}

fn lines_with<'a>(listing: &'a str, needle: &str) -> Vec<&'a str> {
    listing.lines().filter(|line| line.contains(needle)).collect()
}

#[test]
fn for_loop_records_names_and_words() {
    let listing = listing("for i in a b c; do echo $i; done");
    let head = lines_with(&listing, "FOR list");
    assert_eq!(head.len(), 1, "{listing}");
    assert!(head[0].ends_with("\"i\" in \"a\" \"b\" \"c\""), "{listing}");
    assert!(listing.contains("SIMPLE 2 \"echo\" \"$i\""), "{listing}");
}

#[test]
fn for_loop_over_positional_parameters() {
    let listing = listing("for arg; do print $arg; done");
    assert!(listing.contains("FOR pparam"), "{listing}");
    assert!(listing.contains("\"arg\""), "{listing}");
}

#[test]
fn arithmetic_for_keeps_three_expressions() {
    let listing = listing("for ((i = 0; i < 3; i++)) do echo $i; done");
    assert!(lines_with(&listing, "FOR cond").len() == 1, "{listing}");
}

#[test]
fn parenthesised_word_list_allows_newlines() {
    let listing = listing("for x (one\ntwo) { echo $x }");
    assert!(listing.contains("\"x\" in \"one\" \"two\""), "{listing}");
}

#[test]
fn select_has_a_single_name() {
    let listing = listing("select choice in yes no; do break; done");
    assert!(listing.contains("SELECT list"), "{listing}");
    assert!(listing.contains("\"choice\" in \"yes\" \"no\""), "{listing}");
}

#[test]
fn case_arms_number_their_pattern_slots() {
    let program = compile_string(
        "case $x in\n a|b) echo ab;;\n (c) echo c;&\n *) echo other;|\nesac",
        CompileOptions::default(),
    )
    .expect("case should compile");
    let listing = disassemble(&program);

    assert_eq!(lines_with(&listing, "CASE head").len(), 1, "{listing}");
    assert!(listing.contains("CASE ;; "), "{listing}");
    assert!(listing.contains("\"a\"#0 | \"b\"#1"), "{listing}");
    assert!(listing.contains("CASE ;& "), "{listing}");
    assert!(listing.contains("\"c\"#2"), "{listing}");
    assert!(listing.contains("CASE ;| "), "{listing}");
    assert!(listing.contains("\"*\"#3"), "{listing}");
    assert_eq!(program.pattern_count(), 4);
}

#[test]
fn case_without_in_is_rejected() {
    let error = compile_string("case x a) ;; esac", CompileOptions::default()).expect_err("`in` is required");
    assert_eq!(error.expected, Some("in"));
}

#[test]
fn if_elif_else_chain() {
    let listing = listing("if a; then b; elif c; then d; else e; fi");
    assert_eq!(lines_with(&listing, "IF head").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "IF if").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "IF elif").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "IF else").len(), 1, "{listing}");
}

#[test]
fn if_with_brace_bodies() {
    let listing = listing("if [[ -n $x ]] { echo yes } else { echo no }");
    assert_eq!(lines_with(&listing, "IF if").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "IF else").len(), 1, "{listing}");
}

#[test]
fn short_if_needs_the_option() {
    let options = CompileOptions {
        short_loops: false,
        ..CompileOptions::default()
    };
    assert!(compile_string("if [[ -n $x ]] echo yes", CompileOptions::default()).is_ok());
    let error = compile_string("if [[ -n $x ]] echo yes", options).expect_err("short form is disabled");
    assert_eq!(error.expected, Some("then"));
}

#[test]
fn while_and_until_loops() {
    let listing = listing("while a; do b; done; until c; do d; done");
    assert_eq!(lines_with(&listing, "WHILE while").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "WHILE until").len(), 1, "{listing}");
}

#[test]
fn csh_style_loop_ends_with_end() {
    let listing = listing("foreach f (a b)\n echo $f\nend");
    assert!(listing.contains("\"f\" in \"a\" \"b\""), "{listing}");
}

#[test]
fn unterminated_loop_expects_done() {
    let error = compile_string("while true; do echo", CompileOptions::default()).expect_err("loop is unterminated");
    assert_eq!(error.kind, CompileErrorKind::UnexpectedEndOfInput);
    assert_eq!(error.expected, Some("done"));
}

#[test]
fn repeat_stores_its_count() {
    let listing = listing("repeat 3 do echo hi; done");
    assert!(listing.contains("REPEAT skip="), "{listing}");
    assert!(listing.contains("\"3\""), "{listing}");
}

#[test]
fn subshell_and_current_shell_groups() {
    let listing = listing("(cd /tmp; ls); { echo a; echo b }");
    assert_eq!(lines_with(&listing, "SUBSH").len(), 1, "{listing}");
    assert_eq!(lines_with(&listing, "CURSH").len(), 1, "{listing}");
}

#[test]
fn always_block_becomes_a_try() {
    let listing = listing("{ echo body } always { echo cleanup }");
    assert_eq!(lines_with(&listing, "TRY").len(), 2, "{listing}");
    assert!(listing.contains("\"cleanup\""), "{listing}");
}

#[test]
fn time_prefix_wraps_the_pipeline() {
    let listing = listing("time sleep 1");
    assert!(listing.contains("TIMED pipe"), "{listing}");
    let bare = self::listing("time");
    assert!(bare.contains("TIMED empty"), "{bare}");
}

#[test]
fn nesting_limit_is_enforced() {
    let options = CompileOptions {
        max_nesting: 8,
        ..CompileOptions::default()
    };
    let deep = format!("{}true{}", "( ".repeat(20), " )".repeat(20));
    let error = compile_string(&deep, options).expect_err("nesting exceeds the limit");
    assert_eq!(error.kind, CompileErrorKind::NestingTooDeep);
    assert!(compile_string(&deep, CompileOptions::default()).is_ok());
}
