//! Plugin infrastructure
//! 
//! Header extraction for units on disk and the in-process host runtime that
//! activates compiled-in units.

pub mod metadata;
pub mod runtime;

pub use metadata::MetadataExtractor;
pub use runtime::BuiltinRuntime;
