use wordcode::lexer::{Lexer, Token, TokenKind};
use wordcode::wordcode::code::RedirKind;

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::tokenize(input).into_iter().map(|token| token.kind).collect()
}

fn texts(tokens: &[Token]) -> Vec<&str> {
    tokens.iter().map(|token| token.text.as_str()).collect()
}

#[test]
fn simple_command_and_separators() {
    assert_eq!(
        kinds("echo a; echo b & wait"),
        vec![
            TokenKind::String,
            TokenKind::String,
            TokenKind::Seper,
            TokenKind::String,
            TokenKind::String,
            TokenKind::Amper,
            TokenKind::String,
            TokenKind::EndInput,
        ]
    );
}

#[test]
fn longest_operator_wins() {
    assert_eq!(
        kinds("a && b || c |& d"),
        vec![
            TokenKind::String,
            TokenKind::Damper,
            TokenKind::String,
            TokenKind::Dbar,
            TokenKind::String,
            TokenKind::BarAmp,
            TokenKind::String,
            TokenKind::EndInput,
        ]
    );
    assert_eq!(kinds("a &! b")[1], TokenKind::AmperBang);
    assert_eq!(kinds("a &| b")[1], TokenKind::AmperBang);
}

#[test]
fn reserved_words_only_in_command_position() {
    let tokens = Lexer::tokenize("if true; then echo if; fi");
    let kinds: Vec<_> = tokens.iter().map(|token| token.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::If,
            TokenKind::String,
            TokenKind::Seper,
            TokenKind::Then,
            TokenKind::String,
            TokenKind::String,
            TokenKind::Seper,
            TokenKind::Fi,
            TokenKind::EndInput,
        ]
    );
    assert_eq!(tokens[5].text, "if");
}

#[test]
fn assignments_are_recognised_before_the_command() {
    let tokens = Lexer::tokenize("PATH=/bin:$PATH ls x=y");
    assert_eq!(tokens[0].kind, TokenKind::EnvString);
    assert_eq!(tokens[0].text, "PATH=/bin:$PATH");
    assert_eq!(tokens[1].kind, TokenKind::String);
    assert_eq!(tokens[2].kind, TokenKind::String, "not an assignment after the command name");
}

#[test]
fn array_assignment_opens_a_list() {
    let tokens = Lexer::tokenize("arr=(one two)");
    assert_eq!(tokens[0].kind, TokenKind::EnvArray);
    assert_eq!(tokens[0].text, "arr");
    assert_eq!(texts(&tokens[1..3]), vec!["one", "two"]);
    assert_eq!(tokens[3].kind, TokenKind::OutPar);
}

#[test]
fn quotes_and_substitutions_stay_in_one_word() {
    let tokens = Lexer::tokenize("echo 'a b' \"c $(d e) f\" ${g:-h i} `j k`");
    assert_eq!(
        texts(&tokens[..5]),
        vec!["echo", "'a b'", "\"c $(d e) f\"", "${g:-h i}", "`j k`"]
    );
    assert_eq!(tokens[5].kind, TokenKind::EndInput);
}

#[test]
fn unterminated_quote_is_a_lexical_error() {
    let tokens = Lexer::tokenize("echo 'open");
    assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::LexErr));
}

#[test]
fn comments_run_to_the_end_of_the_line() {
    let tokens = Lexer::tokenize("echo a # trailing words\necho b");
    assert_eq!(texts(&tokens), vec!["echo", "a", "\n", "echo", "b", ""]);
    assert!(tokens[2].newline);
}

#[test]
fn line_continuation_joins_lines() {
    let tokens = Lexer::tokenize("echo a \\\n  b");
    assert_eq!(texts(&tokens[..3]), vec!["echo", "a", "b"]);
    assert_eq!(tokens[2].line, 2);
}

#[test]
fn descriptor_numbers_attach_to_redirections() {
    let tokens = Lexer::tokenize("cmd 2>err 3<&0 >>log");
    assert_eq!(tokens[1].kind, TokenKind::Redir(RedirKind::Write));
    assert_eq!(tokens[1].fd, Some(2));
    assert_eq!(tokens[3].kind, TokenKind::Redir(RedirKind::MergeIn));
    assert_eq!(tokens[3].fd, Some(3));
    assert_eq!(tokens[5].kind, TokenKind::Redir(RedirKind::Append));
    assert_eq!(tokens[5].fd, None);
}

#[test]
fn arithmetic_command_is_one_token() {
    let tokens = Lexer::tokenize("(( i += 2 ))");
    assert_eq!(tokens[0].kind, TokenKind::DinPar);
    assert_eq!(tokens[0].text.trim(), "i += 2");
}

#[test]
fn lines_are_counted_from_one() {
    let tokens = Lexer::tokenize("a\nb\n\nc");
    let lines: Vec<_> = tokens
        .iter()
        .filter(|token| token.kind == TokenKind::String)
        .map(|token| token.line)
        .collect();
    assert_eq!(lines, vec![1, 2, 4]);
}
