//! The `tutorgate` command-line front end.

pub mod bootstrap;
pub mod cli;
pub mod guard;
