use wordcode::wordcode::code::RedirKind;
use wordcode::wordcode::{ProgramCursor, Tag, disassemble};
use wordcode::{CompileOptions, Program, compile_string, copy_redirections};

fn compile(text: &str) -> std::rc::Rc<Program> {
    compile_string(text, CompileOptions::default()).unwrap_or_else(|error| panic!("failed to compile {text:?}: {error}"))
}

fn first_redirection(program: &Program) -> usize {
    (0..program.len())
        .find(|&pc| Tag::of(program.word(pc)) == Some(Tag::Redir))
        .expect("program holds a redirection")
}

#[test]
fn here_document_body_is_filled_in() {
    let program = compile("cat <<EOF\nline one\nline two\nEOF\n");
    let listing = disassemble(&program);
    let pc = listing
        .lines()
        .find(|line| line.contains("REDIR"))
        .and_then(|line| line.split_whitespace().next())
        .and_then(|pc| pc.parse().ok())
        .expect("a REDIR line");

    let mut cursor = ProgramCursor::at(&program, pc);
    let redirection = cursor.read_redirection().expect("a redirection");
    assert_eq!(redirection.kind, RedirKind::HereString);
    assert_eq!(redirection.fd, 0);
    assert_eq!(redirection.name, "line one\nline two\n");
    assert_eq!(
        redirection.here_terminator,
        Some(("EOF".to_string(), "EOF".to_string()))
    );
    assert!(listing.contains("until \"EOF\""), "{listing}");
}

#[test]
fn quoted_terminator_keeps_its_raw_form() {
    let program = compile("cat <<'END'\n$body\nEND\n");
    let pc = first_redirection(&program);
    let redirection = ProgramCursor::at(&program, pc)
        .read_redirection()
        .expect("a redirection");
    assert_eq!(redirection.name, "$body\n");
    let (raw, munged) = redirection.here_terminator.expect("terminators");
    assert_eq!(raw, "'END'");
    assert_eq!(munged, "END");
}

#[test]
fn redirections_precede_the_command() {
    let program = compile("cat >out 2>err");
    let pc = first_redirection(&program);
    let mut cursor = ProgramCursor::at(&program, pc);

    let first = cursor.read_redirection().expect("first redirection");
    assert_eq!((first.kind, first.fd, first.name.as_str()), (RedirKind::Write, 1, "out"));
    let second = cursor.read_redirection().expect("second redirection");
    assert_eq!((second.kind, second.fd, second.name.as_str()), (RedirKind::Write, 2, "err"));
    assert_eq!(Tag::of(cursor.peek()), Some(Tag::Simple));
}

#[test]
fn brace_variable_names_the_descriptor() {
    let program = compile("exec {fd}>log");
    let listing = disassemble(&program);
    let pc = first_redirection(&program);
    let redirection = ProgramCursor::at(&program, pc)
        .read_redirection()
        .expect("a redirection");
    assert_eq!(redirection.var_id.as_deref(), Some("fd"));
    assert!(listing.contains("{fd}"), "{listing}");

    let options = CompileOptions {
        ignore_braces: true,
        ..CompileOptions::default()
    };
    let plain = compile_string("exec {fd}>log", options).expect("should compile");
    let pc = first_redirection(&plain);
    let redirection = ProgramCursor::at(&plain, pc).read_redirection().expect("a redirection");
    assert_eq!(redirection.var_id, None);
}

#[test]
fn bar_amp_merges_standard_error() {
    let program = compile("make |& less");
    let pc = first_redirection(&program);
    let redirection = ProgramCursor::at(&program, pc)
        .read_redirection()
        .expect("a redirection");
    assert_eq!(redirection.kind, RedirKind::MergeOut);
    assert_eq!(redirection.fd, 2);
    assert_eq!(redirection.name, "1");
}

#[test]
fn process_substitution_targets_become_pipes() {
    let program = compile("diff < <(ls a) > >(cat)");
    let pc = first_redirection(&program);
    let mut cursor = ProgramCursor::at(&program, pc);
    assert_eq!(cursor.read_redirection().map(|r| r.kind), Some(RedirKind::InPipe));
    assert_eq!(cursor.read_redirection().map(|r| r.kind), Some(RedirKind::OutPipe));
}

#[test]
fn missing_target_is_an_error() {
    assert!(compile_string("echo >", CompileOptions::default()).is_err());
}

#[test]
fn copied_redirections_form_their_own_program() {
    let program = compile("cat <in >out 2>>log");
    let pc = first_redirection(&program);
    let mut cursor = ProgramCursor::at(&program, pc);

    let copy = copy_redirections(&mut cursor)
        .expect("copy should succeed")
        .expect("cursor was at a redirection");
    assert_eq!(Tag::of(cursor.peek()), Some(Tag::Simple));
    assert_eq!(Program::ref_count(&copy), Some(1));

    let mut copied = ProgramCursor::new(&copy);
    let names: Vec<String> = std::iter::from_fn(|| copied.read_redirection())
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["in".to_string(), "out".to_string(), "log".to_string()]);
    assert!(copied.at_end() || Tag::of(copied.peek()) == Some(Tag::End));
}

#[test]
fn copy_at_a_command_returns_nothing() {
    let program = compile("true");
    let mut cursor = ProgramCursor::at(&program, 3);
    assert_eq!(Tag::of(cursor.peek()), Some(Tag::Simple));
    assert!(copy_redirections(&mut cursor).expect("no error").is_none());
    assert_eq!(cursor.pc(), 3);
}

fn here_bodies(program: &Program) -> Vec<(RedirKind, String)> {
    disassemble(program)
        .lines()
        .filter(|line| line.contains("REDIR"))
        .filter_map(|line| line.split_whitespace().next()?.parse().ok())
        .filter_map(|pc| ProgramCursor::at(program, pc).read_redirection())
        .map(|redirection| (redirection.kind, redirection.name))
        .collect()
}

#[test]
fn here_documents_survive_a_pipeline() {
    let program = compile("cat <<A | wc <<B\nalpha body\nA\nbeta body\nB\n");
    assert_eq!(
        here_bodies(&program),
        vec![
            (RedirKind::HereString, "alpha body\n".to_string()),
            (RedirKind::HereString, "beta body\n".to_string()),
        ]
    );
}

#[test]
fn here_document_before_a_merged_pipe() {
    let program = compile("cat <<A |& wc\nalpha body\nA\n");
    assert_eq!(
        here_bodies(&program),
        vec![
            (RedirKind::HereString, "alpha body\n".to_string()),
            (RedirKind::MergeOut, "1".to_string()),
        ]
    );
}

#[test]
fn here_documents_in_consecutive_folded_lists() {
    let program = compile("cat <<A; cat <<B\nfirst\nA\nsecond\nB\n");
    assert_eq!(
        here_bodies(&program),
        vec![
            (RedirKind::HereString, "first\n".to_string()),
            (RedirKind::HereString, "second\n".to_string()),
        ]
    );
}
