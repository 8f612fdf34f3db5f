//! Command implementations: split, run.

pub mod run;
pub mod split;
