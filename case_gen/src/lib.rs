//! Generates the run files and case summaries that drive Gadgetron integration
//! tests as tyger jobs.
//!
//! Test cases are read from `.cfg` files ([test_case]). For each case the
//! [generator::DescriptionGenerator] fills the noise and main job templates and writes
//! `run_noise.yml`, `run_main.yml` and `case.yml` into the case directory, returning the
//! MD5 digest of every file it wrote. The [orchestrator] keeps the `testdata.json`
//! manifest at the data root current across many cases.

pub mod case_file;
pub mod error;
pub mod generator;
pub mod job;
pub mod manifest;
pub mod orchestrator;
pub mod settings;
pub mod test_case;

pub use error::{Error, Result};
