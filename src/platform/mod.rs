// MecmLog - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library, directories, memmap2; implements the
// core::aggregate::SourceReader seam.
// Must NOT depend on: app, ui.

pub mod config;
pub mod fs;
