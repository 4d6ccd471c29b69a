// MecmLog - core/mod.rs
//
// Core business logic layer.
// Dependencies: standard library plus pure-data crates (regex, chrono, serde).
// Must NOT depend on: ui, platform, app. Reading files is delegated to the
// `aggregate::SourceReader` seam; `discovery` only lists directories.

pub mod aggregate;
pub mod discovery;
pub mod export;
pub mod facets;
pub mod filter;
pub mod highlight;
pub mod model;
pub mod parser;
pub mod timestamp;
