//! Wordcode: the compiled program representation.
//!
//! Programs are flat arrays of 32-bit words plus a string table. The
//! modules here define the word layout ([`code`]), the growable buffer the
//! compiler writes into ([`buffer`]), string interning ([`strings`]), the
//! finished program image ([`program`]) and a reader for consumers
//! ([`reader`]).

pub mod buffer;
pub mod code;
pub mod program;
pub mod reader;
pub mod strings;

pub use code::{Tag, Wordcode};
pub use program::{CompiledPattern, Program, ProgramFlags};
pub use reader::{ProgramCursor, Redirection, disassemble};
