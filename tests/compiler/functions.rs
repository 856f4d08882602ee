use wordcode::wordcode::{Tag, disassemble};
use wordcode::{CompileOptions, Program, compile_string};

fn position_of(listing: &str, mnemonic: &str) -> usize {
    listing
        .lines()
        .find(|line| line.contains(mnemonic))
        .and_then(|line| line.split_whitespace().next())
        .and_then(|pc| pc.parse().ok())
        .unwrap_or_else(|| panic!("no {mnemonic} in\n{listing}"))
}

#[test]
fn function_body_has_its_own_strings() {
    let program = compile_string("echo outside; f() { echo inside; }", CompileOptions::default())
        .expect("definition should compile");
    let listing = disassemble(&program);
    let at = position_of(&listing, "FUNCDEF");
    assert_eq!(Tag::of(program.word(at)), Some(Tag::Funcdef));
    assert!(listing.contains("FUNCDEF") && listing.contains("\"f\""), "{listing}");

    let body = program.function_body(at).expect("FUNCDEF extracts a body");
    assert_eq!(body.strings(), b"echo\0inside\0");
    assert_eq!(Program::ref_count(&body), Some(1));
    let body_listing = disassemble(&body);
    assert!(body_listing.contains("SIMPLE 2 \"echo\" \"inside\""), "{body_listing}");
    assert!(program.strings().ends_with(b"echo\0inside\0"));
}

#[test]
fn function_body_rejects_other_words() {
    let program = compile_string("true", CompileOptions::default()).expect("command should compile");
    assert!(program.function_body(0).is_none());
}

#[test]
fn several_names_share_one_body() {
    let listing = disassemble(&compile_string("a b () { true }", CompileOptions::default()).expect("should compile"));
    let head = listing
        .lines()
        .find(|line| line.contains("FUNCDEF"))
        .expect("a FUNCDEF line");
    assert!(head.contains("\"a\" \"b\""), "{listing}");

    let options = CompileOptions {
        multi_func_def: false,
        ..CompileOptions::default()
    };
    assert!(compile_string("a b () { true }", options).is_err());
}

#[test]
fn function_keyword_with_tracing() {
    let listing = disassemble(
        &compile_string("function -T traced { print x }", CompileOptions::default()).expect("should compile"),
    );
    let head = listing
        .lines()
        .find(|line| line.contains("FUNCDEF"))
        .expect("a FUNCDEF line");
    assert!(head.contains("\"traced\""), "{listing}");
    assert!(head.ends_with("traced"), "{listing}");
}

#[test]
fn anonymous_function_carries_its_arguments() {
    let listing = disassemble(&compile_string("() { echo $1 } first second", CompileOptions::default()).expect("should compile"));
    assert!(listing.contains("args 2 \"first\" \"second\""), "{listing}");
}

#[test]
fn patterns_inside_a_body_are_numbered_from_zero() {
    let program = compile_string(
        "[[ $a == x* ]]; f() { [[ $b == y* ]] }",
        CompileOptions::default(),
    )
    .expect("should compile");
    let listing = disassemble(&program);
    let at = position_of(&listing, "FUNCDEF");
    let body = program.function_body(at).expect("body");
    assert_eq!(program.pattern_count(), 1);
    assert_eq!(body.pattern_count(), 1);
    assert!(disassemble(&body).contains("#0"));
}
