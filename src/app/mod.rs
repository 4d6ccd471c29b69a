// MecmLog - app/mod.rs
//
// Application layer: session state, the filter worker thread and the
// interaction controller that drives it.
// Dependencies: core layer.
// Must NOT depend on: ui, platform specifics (sources are read through the
// core::aggregate::SourceReader trait).

pub mod controller;
pub mod session;
pub mod worker;
