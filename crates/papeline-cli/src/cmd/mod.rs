//! Subcommands

pub mod keygen;
pub mod run;
pub mod verify;
