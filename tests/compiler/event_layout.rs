use wordcode::lexer::{Lexer, TokenKind};
use wordcode::wordcode::code::{self, AssignMode, AssignType, END, ListType, PipeType, SublistFlags, SublistType};
use wordcode::wordcode::strings::inline_reference;
use wordcode::{CompileErrorKind, CompileOptions, Compiler, compile_string};

fn inline(text: &str) -> u32 {
    inline_reference(text).expect("short strings are inline")
}

#[test]
fn two_lists_share_one_table_string() {
    let program = compile_string("echo hi; echo bye", CompileOptions::default()).expect("program should compile");

    let expected = vec![
        code::list(ListType::SYNC, 0),
        code::sublist(SublistType::End, SublistFlags::empty(), 4),
        code::pipe(PipeType::End, 1),
        code::simple(2),
        0,
        inline("hi"),
        code::list(ListType::SYNC | ListType::END, 0),
        code::sublist(SublistType::End, SublistFlags::empty(), 4),
        code::pipe(PipeType::End, 1),
        code::simple(2),
        0,
        inline("bye"),
        END,
    ];
    assert_eq!(program.words().as_ref(), expected.as_slice());
    assert_eq!(program.strings(), b"echo\0");
    assert_eq!(program.pattern_count(), 0);
}

#[test]
fn leading_assignment_precedes_the_command() {
    let program = compile_string("a=1 echo $a", CompileOptions::default()).expect("program should compile");

    let expected = vec![
        code::list(ListType::SYNC | ListType::END, 0),
        code::sublist(SublistType::End, SublistFlags::empty(), 7),
        code::pipe(PipeType::End, 1),
        code::assign(AssignType::Scalar, AssignMode::New, 0),
        inline("a"),
        inline("1"),
        code::simple(2),
        0,
        inline("$a"),
        END,
    ];
    assert_eq!(program.words().as_ref(), expected.as_slice());
    assert_eq!(program.strings(), b"echo\0");
}

#[test]
fn missing_then_reports_end_of_input() {
    let error = compile_string("if true; echo no-then", CompileOptions::default())
        .expect_err("if without then should fail");
    assert_eq!(error.kind, CompileErrorKind::UnexpectedEndOfInput);
    assert_eq!(error.expected, Some("then"));
}

#[test]
fn empty_input_compiles_to_a_lone_end() {
    let program = compile_string("", CompileOptions::default()).expect("empty input should compile");
    assert_eq!(program.words().as_ref(), &[END]);
    assert!(program.is_empty());
}

#[test]
fn stray_closer_is_an_unexpected_token() {
    let error = compile_string("echo a )", CompileOptions::default()).expect_err("`)` cannot end a command");
    assert_eq!(error.kind, CompileErrorKind::UnexpectedToken);
    assert_eq!(error.found.as_deref(), Some(")"));
}

#[test]
fn events_compile_one_line_at_a_time() {
    let mut compiler = Compiler::new(Lexer::new("echo one\necho two\n"), CompileOptions::default());

    let first = compiler
        .compile_event(TokenKind::EndInput)
        .expect("first line should compile")
        .expect("first line holds a command");
    let second = compiler
        .compile_event(TokenKind::EndInput)
        .expect("second line should compile")
        .expect("second line holds a command");
    assert!(wordcode::wordcode::disassemble(&first).contains("\"one\""));
    assert!(wordcode::wordcode::disassemble(&second).contains("\"two\""));
    assert!(compiler.compile_event(TokenKind::EndInput).expect("end of input").is_none());
}

#[test]
fn an_error_skips_to_the_next_line() {
    let mut compiler = Compiler::new(Lexer::new("echo a )\necho b\n"), CompileOptions::default());

    assert!(compiler.compile_event(TokenKind::EndInput).is_err());
    let next = compiler
        .compile_event(TokenKind::EndInput)
        .expect("the following line should compile")
        .expect("the following line holds a command");
    assert!(wordcode::wordcode::disassemble(&next).contains("\"b\""));
}
