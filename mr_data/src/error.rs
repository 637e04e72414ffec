use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

pub type Result<T> = std::result::Result<T,Error>;

#[derive(Debug,thiserror::Error)]
pub enum Error {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },
    #[error("mrd stream i/o failed: {0}")]
    Stream(#[from] std::io::Error),
    #[error("cannot parse MAT file: {0}")]
    Mat(String),
    #[error("variable `{0}` not found in MAT file")]
    MissingVariable(String),
    #[error("variable `{name}` must have {expected}, found dimensions {found:?}")]
    Shape {
        name:String,
        expected:&'static str,
        found:Vec<usize>,
    },
    #[error("variable `{name}` has an unusable value {value}")]
    InvalidValue {
        name:String,
        value:f64,
    },
    #[error("{what} = {value} does not fit in an ISMRMRD 16 bit field")]
    Overflow {
        what:&'static str,
        value:usize,
    },
    #[error("unknown mrd message id {0}")]
    UnknownMessage(u16),
    #[error("xml header is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("hdf5: {0}")]
    Hdf5(#[from] hdf5::Error),
    #[error("cannot store in hdf5 data set: {0}")]
    Hdf5Value(String),
}

impl Error {
    pub fn io(path:&Path,source:std::io::Error) -> Self {
        Error::Io { path:path.to_owned(), source }
    }
}
