//! Launches the external media inspector per file and interprets its raw
//! outcome.

mod driver;
mod process_group;

pub use driver::InspectorDriver;
