#![forbid(unsafe_code)]

pub mod bake;
pub mod cli;
pub mod contents;
pub mod document;
pub mod inspect;
pub mod logging;
pub mod rewrite;
