// MecmLog - ui/mod.rs
//
// UI layer: terminal presentation only.
// Dependencies: app (controller, session), core (read-only models).
// Must NOT depend on: platform specifics; sources are read through the
// SourceReader handed in by the binary.

pub mod repl;
pub mod table;
