// colloquy-common: shared types and utilities for the Colloquy workspace

pub mod mentions;
pub mod types;
pub mod validation;
