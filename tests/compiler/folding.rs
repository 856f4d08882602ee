use wordcode::wordcode::code::{self, ListType, SublistFlags, Tag};
use wordcode::{CompileOptions, compile_string};

fn compile(text: &str) -> Vec<u32> {
    compile_string(text, CompileOptions::default())
        .expect("program should compile")
        .words()
        .into_owned()
}

#[test]
fn word_free_command_folds_into_its_list() {
    let words = compile("(( x ))");
    assert_eq!(words.len(), 5);
    assert!(code::list_type(words[0]).contains(ListType::SIMPLE | ListType::END));
    assert_eq!(code::list_skip(words[0]), 3);
    assert_eq!(words[1], 1, "the folded list keeps the line number");
    assert_eq!(Tag::of(words[2]), Some(Tag::Arith));
    assert_eq!(Tag::of(words[4]), Some(Tag::End));
}

#[test]
fn background_list_is_never_folded() {
    let folded = compile("(( x ))");
    let background = compile("(( x )) &");
    assert_eq!(background.len(), folded.len() + 1);

    let kind = code::list_type(background[0]);
    assert!(kind.contains(ListType::ASYNC | ListType::END));
    assert!(!kind.contains(ListType::SIMPLE));
    assert_eq!(Tag::of(background[1]), Some(Tag::Sublist));
    assert!(!code::sublist_flags(background[1]).contains(SublistFlags::SIMPLE));
    assert_eq!(Tag::of(background[2]), Some(Tag::Pipe));
    assert_eq!(Tag::of(background[3]), Some(Tag::Arith));
}

#[test]
fn folded_skip_jumps_to_the_next_list() {
    let words = compile("(( x ))\n(( y ))");
    assert!(code::list_type(words[0]).contains(ListType::SIMPLE));
    assert!(!code::list_type(words[0]).contains(ListType::END));
    let next = 1 + code::list_skip(words[0]) as usize;
    assert_eq!(Tag::of(words[next]), Some(Tag::List));
    assert!(code::list_type(words[next]).contains(ListType::END));
    assert_eq!(words[next + 1], 2, "second list is on line two");
}

#[test]
fn commands_with_words_stay_complex() {
    let words = compile("true");
    assert!(!code::list_type(words[0]).contains(ListType::SIMPLE));
    assert_eq!(Tag::of(words[1]), Some(Tag::Sublist));
}

#[test]
fn pipelines_are_complex() {
    let words = compile("(( a )) | (( b ))");
    assert!(!code::list_type(words[0]).contains(ListType::SIMPLE));
    assert!(!code::sublist_flags(words[1]).contains(SublistFlags::SIMPLE));
    assert_eq!(code::pipe_type(words[2]), code::PipeType::Mid);
}
