//! PhysioMRI raw data to ISMRMRD conversion.
//!
//! [`physio`] reads the scanner's MAT export, [`convert`] lays it out as
//! ISMRMRD acquisitions. [`dataset`] stores them in an ISMRMRD HDF5 file and
//! [`stream`] writes (and reads back) the ISMRMRD message stream.

pub mod convert;
pub mod dataset;
pub mod error;
pub mod ismrmrd;
pub mod physio;
pub mod stream;

pub use error::{Error, Result};
