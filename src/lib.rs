//! Library entrypoint for `wordcode`.
//!
//! The crate compiles shell grammar into relocatable wordcode programs and
//! stores them in dual byte-order cache files that can be read or mapped
//! back.

pub mod cache;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod wordcode;

pub use compiler::{CompileOptions, Compiler, compile_string, compile_test, copy_redirections};
pub use error::{CacheError, CompileError, CompileErrorKind};
pub use wordcode::{Program, ProgramFlags};
