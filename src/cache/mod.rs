//! Compiled program files (`.zwc`).
//!
//! [`DumpWriter`] serializes programs into a file holding two images, one
//! per byte order. [`CacheLoader`] picks the image matching the reader's
//! byte order and either reads a program into owned storage or maps the
//! file and aliases it; mappings are shared per file through a
//! [`SegmentRegistry`] and released when the last program drops.

pub mod format;
pub mod loader;
pub mod segment;
pub mod writer;

pub use format::{AutoloadStyle, ByteOrder, Descriptor, DumpHeader, MapPolicy};
pub use loader::{CacheLoader, LoadedProgram, load_header};
pub use segment::{Segment, SegmentKey, SegmentRegistry, SegmentStats};
pub use writer::DumpWriter;
