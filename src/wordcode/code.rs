//! Wordcode layout: tag bits, per-tag builders, and field accessors.
//!
//! Every instruction is one `u32`. The low [`CODE_BITS`] bits hold the tag,
//! the remaining bits hold tag-specific data (a type, flags, a relative
//! skip, a count, or a line number).

use bitflags::bitflags;

/// One instruction word.
pub type Wordcode = u32;

/// Number of low bits reserved for the tag.
pub const CODE_BITS: u32 = 5;

const CODE_MASK: Wordcode = (1 << CODE_BITS) - 1;

/// Largest buffer length (in words) whose relative offsets fit every layout.
///
/// The widest data prefix is the seven-bit condition type, which leaves
/// twenty bits for a skip.
pub const MAX_PROGRAM_WORDS: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Instruction kinds stored in the low bits of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// End of a code block.
    End = 0,
    /// Sequential list element.
    List = 1,
    /// `&&` / `||` chain element.
    Sublist = 2,
    /// Pipeline stage.
    Pipe = 3,
    /// Redirection.
    Redir = 4,
    /// Variable assignment.
    Assign = 5,
    /// Simple command.
    Simple = 6,
    /// Declaration builtin with post-assignments.
    Typeset = 7,
    /// `( ... )` subshell.
    Subsh = 8,
    /// `{ ... }` current-shell group.
    Cursh = 9,
    /// `time` prefix.
    Timed = 10,
    /// Function definition.
    Funcdef = 11,
    /// `for` loop.
    For = 12,
    /// `select` loop.
    Select = 13,
    /// `while` / `until` loop.
    While = 14,
    /// `repeat` loop.
    Repeat = 15,
    /// `case` head or arm.
    Case = 16,
    /// `if` head or branch.
    If = 17,
    /// Condition expression node.
    Cond = 18,
    /// `(( ... ))` arithmetic command.
    Arith = 19,
    /// Autoload stub.
    Autofn = 20,
    /// `{ ... } always { ... }`.
    Try = 21,
}

impl Tag {
    /// Decodes the tag of `word`, if it names a known kind.
    pub fn of(word: Wordcode) -> Option<Self> {
        Some(match word & CODE_MASK {
            0 => Self::End,
            1 => Self::List,
            2 => Self::Sublist,
            3 => Self::Pipe,
            4 => Self::Redir,
            5 => Self::Assign,
            6 => Self::Simple,
            7 => Self::Typeset,
            8 => Self::Subsh,
            9 => Self::Cursh,
            10 => Self::Timed,
            11 => Self::Funcdef,
            12 => Self::For,
            13 => Self::Select,
            14 => Self::While,
            15 => Self::Repeat,
            16 => Self::Case,
            17 => Self::If,
            18 => Self::Cond,
            19 => Self::Arith,
            20 => Self::Autofn,
            21 => Self::Try,
            _ => return None,
        })
    }

    /// Short mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::End => "END",
            Self::List => "LIST",
            Self::Sublist => "SUBLIST",
            Self::Pipe => "PIPE",
            Self::Redir => "REDIR",
            Self::Assign => "ASSIGN",
            Self::Simple => "SIMPLE",
            Self::Typeset => "TYPESET",
            Self::Subsh => "SUBSH",
            Self::Cursh => "CURSH",
            Self::Timed => "TIMED",
            Self::Funcdef => "FUNCDEF",
            Self::For => "FOR",
            Self::Select => "SELECT",
            Self::While => "WHILE",
            Self::Repeat => "REPEAT",
            Self::Case => "CASE",
            Self::If => "IF",
            Self::Cond => "COND",
            Self::Arith => "ARITH",
            Self::Autofn => "AUTOFN",
            Self::Try => "TRY",
        }
    }
}

/// Returns the raw tag bits of `word`.
pub const fn code(word: Wordcode) -> u32 {
    word & CODE_MASK
}

/// Returns the data bits of `word`.
pub const fn data(word: Wordcode) -> u32 {
    word >> CODE_BITS
}

/// Shifts `data` into the data position without a tag.
pub const fn bdata(data: u32) -> Wordcode {
    data << CODE_BITS
}

/// Builds a word from a tag and data bits.
pub const fn build(tag: Tag, data: u32) -> Wordcode {
    (tag as u32) | (data << CODE_BITS)
}

/// The END word.
pub const END: Wordcode = build(Tag::End, 0);

// ---------------------------------------------------------------------------
// LIST
// ---------------------------------------------------------------------------

bitflags! {
    /// Execution type bits of a LIST word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListType: u32 {
        /// Pipeline is timed.
        const TIMED = 1 << 0;
        /// Run synchronously (`;`, newline).
        const SYNC = 1 << 1;
        /// Run asynchronously (`&`).
        const ASYNC = 1 << 2;
        /// Run without job control (`&!`, `&|`).
        const DISOWN = 1 << 3;
        /// Last list of the block.
        const END = 1 << 4;
        /// Folded: body is a single simple sublist.
        const SIMPLE = 1 << 5;
    }
}

const LIST_FREE: u32 = 6;

/// Builds a LIST word.
pub const fn list(kind: ListType, skip: u32) -> Wordcode {
    build(Tag::List, kind.bits() | (skip << LIST_FREE))
}

/// Type bits of a LIST word.
pub fn list_type(word: Wordcode) -> ListType {
    ListType::from_bits_truncate(data(word))
}

/// Skip of a simple LIST word.
pub const fn list_skip(word: Wordcode) -> u32 {
    data(word) >> LIST_FREE
}

// ---------------------------------------------------------------------------
// SUBLIST
// ---------------------------------------------------------------------------

/// Connector following a sublist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SublistType {
    /// Last sublist of the chain.
    End = 0,
    /// `&&` follows.
    And = 1,
    /// `||` follows.
    Or = 2,
}

bitflags! {
    /// Flag bits of a SUBLIST word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SublistFlags: u32 {
        /// `coproc` prefix.
        const COPROC = 4;
        /// `!` prefix.
        const NOT = 8;
        /// Folded: the pipeline word is replaced by its line number.
        const SIMPLE = 16;
    }
}

const SUBLIST_FREE: u32 = 5;

/// Builds a SUBLIST word.
pub const fn sublist(kind: SublistType, flags: SublistFlags, skip: u32) -> Wordcode {
    build(
        Tag::Sublist,
        (kind as u32) | flags.bits() | (skip << SUBLIST_FREE),
    )
}

/// Connector type of a SUBLIST word.
pub fn sublist_type(word: Wordcode) -> SublistType {
    match data(word) & 3 {
        1 => SublistType::And,
        2 => SublistType::Or,
        _ => SublistType::End,
    }
}

/// Flag bits of a SUBLIST word.
pub fn sublist_flags(word: Wordcode) -> SublistFlags {
    SublistFlags::from_bits_truncate(data(word) & 0x1c)
}

/// Skip of a SUBLIST word.
pub const fn sublist_skip(word: Wordcode) -> u32 {
    data(word) >> SUBLIST_FREE
}

// ---------------------------------------------------------------------------
// PIPE
// ---------------------------------------------------------------------------

/// Position of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeType {
    /// Last stage.
    End = 0,
    /// Stage followed by another.
    Mid = 1,
}

/// Largest line number representable in a PIPE word.
pub const MAX_PIPE_LINE: u32 = (1 << (32 - CODE_BITS - 1)) - 1;

/// Builds a PIPE word.
pub const fn pipe(kind: PipeType, line: u32) -> Wordcode {
    let line = if line > MAX_PIPE_LINE {
        MAX_PIPE_LINE
    } else {
        line
    };
    build(Tag::Pipe, (kind as u32) | (line << 1))
}

/// Stage type of a PIPE word.
pub const fn pipe_type(word: Wordcode) -> PipeType {
    if data(word) & 1 == 1 {
        PipeType::Mid
    } else {
        PipeType::End
    }
}

/// Source line recorded in a PIPE word.
pub const fn pipe_line(word: Wordcode) -> u32 {
    data(word) >> 1
}

// ---------------------------------------------------------------------------
// REDIR
// ---------------------------------------------------------------------------

/// Redirection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirKind {
    /// `>`
    Write = 0,
    /// `>|`
    WriteNow = 1,
    /// `>>`
    Append = 2,
    /// `>>|`
    AppendNow = 3,
    /// `&>`, `>&word`
    ErrWrite = 4,
    /// `>&|`
    ErrWriteNow = 5,
    /// `>>&`
    ErrAppend = 6,
    /// `>>&|`
    ErrAppendNow = 7,
    /// `<>`
    ReadWrite = 8,
    /// `<`
    Read = 9,
    /// `<<`
    HereDoc = 10,
    /// `<<-`
    HereDocDash = 11,
    /// `<<<`
    HereString = 12,
    /// `<&n`
    MergeIn = 13,
    /// `>&n`
    MergeOut = 14,
    /// `>&-`, `<&-`
    Close = 15,
    /// `< <(...)`
    InPipe = 16,
    /// `> >(...)`
    OutPipe = 17,
}

impl RedirKind {
    /// Decodes a redirection kind from its five-bit value.
    pub fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Write,
            1 => Self::WriteNow,
            2 => Self::Append,
            3 => Self::AppendNow,
            4 => Self::ErrWrite,
            5 => Self::ErrWriteNow,
            6 => Self::ErrAppend,
            7 => Self::ErrAppendNow,
            8 => Self::ReadWrite,
            9 => Self::Read,
            10 => Self::HereDoc,
            11 => Self::HereDocDash,
            12 => Self::HereString,
            13 => Self::MergeIn,
            14 => Self::MergeOut,
            15 => Self::Close,
            16 => Self::InPipe,
            17 => Self::OutPipe,
            _ => return None,
        })
    }

    /// Returns `true` for kinds whose default descriptor is standard input.
    pub fn reads(self) -> bool {
        matches!(
            self,
            Self::ReadWrite
                | Self::Read
                | Self::HereDoc
                | Self::HereDocDash
                | Self::HereString
                | Self::MergeIn
                | Self::InPipe
        )
    }

    /// Operator text used by the disassembler.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Write => ">",
            Self::WriteNow => ">|",
            Self::Append => ">>",
            Self::AppendNow => ">>|",
            Self::ErrWrite => "&>",
            Self::ErrWriteNow => ">&|",
            Self::ErrAppend => ">>&",
            Self::ErrAppendNow => ">>&|",
            Self::ReadWrite => "<>",
            Self::Read => "<",
            Self::HereDoc => "<<",
            Self::HereDocDash => "<<-",
            Self::HereString => "<<<",
            Self::MergeIn => "<&",
            Self::MergeOut => ">&",
            Self::Close => ">&-",
            Self::InPipe => "< <(",
            Self::OutPipe => "> >(",
        }
    }
}

/// Mask for the redirection kind.
pub const REDIR_TYPE_MASK: u32 = 0x1f;
/// Set when a trailing variable-name word is present (`{var}>file`).
pub const REDIR_VARID_MASK: u32 = 0x20;
/// Set when two here-document terminator words are present.
pub const REDIR_FROM_HEREDOC_MASK: u32 = 0x40;

/// Builds a REDIR word from a kind and the mask bits.
pub const fn redir(kind: RedirKind, masks: u32) -> Wordcode {
    build(Tag::Redir, (kind as u32) | masks)
}

/// Kind of a REDIR word.
pub fn redir_kind(word: Wordcode) -> Option<RedirKind> {
    RedirKind::from_bits(data(word) & REDIR_TYPE_MASK)
}

/// Returns `true` when the REDIR word carries a variable-name word.
pub const fn redir_has_varid(word: Wordcode) -> bool {
    data(word) & REDIR_VARID_MASK != 0
}

/// Returns `true` when the REDIR word carries here-document terminators.
pub const fn redir_from_heredoc(word: Wordcode) -> bool {
    data(word) & REDIR_FROM_HEREDOC_MASK != 0
}

/// Number of words (including the REDIR word) a redirection occupies.
pub const fn redir_words(word: Wordcode) -> usize {
    let base = if redir_has_varid(word) { 4 } else { 3 };
    if redir_from_heredoc(word) {
        base + 2
    } else {
        base
    }
}

// ---------------------------------------------------------------------------
// ASSIGN
// ---------------------------------------------------------------------------

/// Scalar or array assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignType {
    /// `name=value`
    Scalar = 0,
    /// `name=(values)`
    Array = 1,
}

/// Replace or append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignMode {
    /// `=`
    New = 0,
    /// `+=`, or a declaration name without a value.
    Increment = 1,
}

/// Builds an ASSIGN word.
pub const fn assign(kind: AssignType, mode: AssignMode, elements: u32) -> Wordcode {
    build(
        Tag::Assign,
        (kind as u32) | ((mode as u32) << 1) | (elements << 2),
    )
}

/// Scalar/array type of an ASSIGN word.
pub const fn assign_type(word: Wordcode) -> AssignType {
    if data(word) & 1 == 1 {
        AssignType::Array
    } else {
        AssignType::Scalar
    }
}

/// Replace/append mode of an ASSIGN word.
pub const fn assign_mode(word: Wordcode) -> AssignMode {
    if data(word) & 2 == 2 {
        AssignMode::Increment
    } else {
        AssignMode::New
    }
}

/// Array element count of an ASSIGN word.
pub const fn assign_elements(word: Wordcode) -> u32 {
    data(word) >> 2
}

// ---------------------------------------------------------------------------
// Plain-data tags
// ---------------------------------------------------------------------------

/// Builds a SIMPLE word.
pub const fn simple(argc: u32) -> Wordcode {
    build(Tag::Simple, argc)
}

/// Builds a TYPESET word.
pub const fn typeset(argc: u32) -> Wordcode {
    build(Tag::Typeset, argc)
}

/// Builds a SUBSH word.
pub const fn subsh(skip: u32) -> Wordcode {
    build(Tag::Subsh, skip)
}

/// Builds a CURSH word.
pub const fn cursh(skip: u32) -> Wordcode {
    build(Tag::Cursh, skip)
}

/// Builds a TRY word.
pub const fn try_block(skip: u32) -> Wordcode {
    build(Tag::Try, skip)
}

/// Builds a FUNCDEF word.
pub const fn funcdef(skip: u32) -> Wordcode {
    build(Tag::Funcdef, skip)
}

/// Builds a REPEAT word.
pub const fn repeat(skip: u32) -> Wordcode {
    build(Tag::Repeat, skip)
}

/// Builds an ARITH word.
pub const fn arith() -> Wordcode {
    build(Tag::Arith, 0)
}

/// Builds an AUTOFN word.
pub const fn autofn() -> Wordcode {
    build(Tag::Autofn, 0)
}

/// `time` with or without a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimedType {
    /// Bare `time`.
    Empty = 0,
    /// `time pipeline`.
    Pipe = 1,
}

/// Builds a TIMED word.
pub const fn timed(kind: TimedType) -> Wordcode {
    build(Tag::Timed, kind as u32)
}

// ---------------------------------------------------------------------------
// Loops and branches
// ---------------------------------------------------------------------------

/// `for` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForType {
    /// Iterate positional parameters.
    PParam = 0,
    /// Iterate an explicit word list.
    List = 1,
    /// `for ((init; cond; step))`.
    Cond = 2,
}

/// Builds a FOR word.
pub const fn for_loop(kind: ForType, skip: u32) -> Wordcode {
    build(Tag::For, (kind as u32) | (skip << 2))
}

/// `select` forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectType {
    /// Select from positional parameters.
    PParam = 0,
    /// Select from an explicit word list.
    List = 1,
}

/// Builds a SELECT word.
pub const fn select(kind: SelectType, skip: u32) -> Wordcode {
    build(Tag::Select, (kind as u32) | (skip << 1))
}

/// `while` or `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WhileType {
    /// Loop while the condition succeeds.
    While = 0,
    /// Loop until the condition succeeds.
    Until = 1,
}

/// Builds a WHILE word.
pub const fn while_loop(kind: WhileType, skip: u32) -> Wordcode {
    build(Tag::While, (kind as u32) | (skip << 1))
}

/// `case` head and arm terminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseType {
    /// Head word; skip points past `esac`.
    Head = 0,
    /// Arm ended by `;;`.
    Or = 1,
    /// Arm ended by `;&`.
    And = 2,
    /// Arm ended by `;|`.
    TestAnd = 3,
}

const CASE_FREE: u32 = 3;

/// Builds a CASE word.
pub const fn case(kind: CaseType, skip: u32) -> Wordcode {
    build(Tag::Case, (kind as u32) | (skip << CASE_FREE))
}

/// `if` head and branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfType {
    /// Head word; skip points past `fi`.
    Head = 0,
    /// `if` branch.
    If = 1,
    /// `elif` branch.
    Elif = 2,
    /// `else` branch.
    Else = 3,
}

/// Builds an IF word.
pub const fn if_branch(kind: IfType, skip: u32) -> Wordcode {
    build(Tag::If, (kind as u32) | (skip << 2))
}

/// Type field of a loop/branch word (the low bits of its data).
pub const fn type_bits(word: Wordcode, width: u32) -> u32 {
    data(word) & ((1 << width) - 1)
}

/// Skip field of a loop/branch word.
pub const fn skip_bits(word: Wordcode, width: u32) -> u32 {
    data(word) >> width
}

// ---------------------------------------------------------------------------
// COND
// ---------------------------------------------------------------------------

/// Condition node types below the single-letter unary tests.
///
/// Single-letter tests such as `-f` use the letter's byte value.
pub mod cond {
    /// `! cond`
    pub const NOT: u32 = 0;
    /// `cond && cond`
    pub const AND: u32 = 1;
    /// `cond || cond`
    pub const OR: u32 = 2;
    /// `a = b`
    pub const STREQ: u32 = 3;
    /// `a == b`
    pub const STRDEQ: u32 = 4;
    /// `a != b`
    pub const STRNEQ: u32 = 5;
    /// `a < b`
    pub const STRLT: u32 = 6;
    /// `a > b`
    pub const STRGTR: u32 = 7;
    /// `-nt`
    pub const NT: u32 = 8;
    /// `-ot`
    pub const OT: u32 = 9;
    /// `-ef`
    pub const EF: u32 = 10;
    /// `-eq`
    pub const EQ: u32 = 11;
    /// `-ne`
    pub const NE: u32 = 12;
    /// `-lt`
    pub const LT: u32 = 13;
    /// `-gt`
    pub const GT: u32 = 14;
    /// `-le`
    pub const LE: u32 = 15;
    /// `-ge`
    pub const GE: u32 = 16;
    /// `a =~ regex`
    pub const REGEX: u32 = 17;
    /// Module-defined test with `n` arguments.
    pub const MOD: u32 = 18;
    /// Module-defined infix test.
    pub const MODI: u32 = 19;

    /// Binary numeric and file operators, in type order from [`NT`].
    pub const BINARY_OPERATORS: [&str; 9] = ["nt", "ot", "ef", "eq", "ne", "lt", "gt", "le", "ge"];

    /// Letters accepted as single-letter unary tests.
    pub const UNARY_LETTERS: &str = "abcdefgknoprstuvwxzhLONGS";
}

const COND_FREE: u32 = 7;

/// Builds a COND word.
pub const fn cond_word(kind: u32, skip: u32) -> Wordcode {
    build(Tag::Cond, (kind & 127) | (skip << COND_FREE))
}

/// Type of a COND word.
pub const fn cond_type(word: Wordcode) -> u32 {
    data(word) & 127
}

/// Skip (or argument count) of a COND word.
pub const fn cond_skip(word: Wordcode) -> u32 {
    data(word) >> COND_FREE
}
