#![allow(clippy::upper_case_acronyms)]
pub mod dir_store;
pub mod dump;
pub mod error;

pub use dir_store::DirAccessor;
