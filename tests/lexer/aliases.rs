use wordcode::lexer::{AliasTable, Lexer};
use wordcode::wordcode::disassemble;
use wordcode::{CompileOptions, Compiler};

fn compile_with(aliases: AliasTable, text: &str) -> String {
    let program = Compiler::new(Lexer::with_aliases(text, aliases), CompileOptions::default())
        .compile_list()
        .expect("aliased input should compile");
    disassemble(&program)
}

#[test]
fn alias_expands_in_command_position() {
    let mut aliases = AliasTable::new();
    aliases.define("ll", "ls -l");
    let listing = compile_with(aliases, "ll /tmp");
    assert!(listing.contains("SIMPLE 3 \"ls\" \"-l\" \"/tmp\""), "{listing}");
}

#[test]
fn arguments_are_not_expanded() {
    let mut aliases = AliasTable::new();
    aliases.define("ll", "ls -l");
    let listing = compile_with(aliases, "echo ll");
    assert!(listing.contains("SIMPLE 2 \"echo\" \"ll\""), "{listing}");
}

#[test]
fn self_referencing_alias_expands_once() {
    let mut aliases = AliasTable::new();
    aliases.define("ls", "ls -F");
    let listing = compile_with(aliases, "ls");
    assert!(listing.contains("SIMPLE 2 \"ls\" \"-F\""), "{listing}");
}

#[test]
fn alias_may_expand_to_a_keyword() {
    let mut aliases = AliasTable::new();
    aliases.define("forever", "while true");
    let listing = compile_with(aliases, "forever; do sleep 1; done");
    assert!(listing.contains("WHILE while"), "{listing}");
}
