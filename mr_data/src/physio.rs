use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use matfile::{MatFile, NumericData};
use ndarray::{s, Array4, ArrayView1, ShapeBuilder};
use num_complex::Complex32;
use tracing::debug;
use crate::error::{Error, Result};

pub const DATA_VAR:&str = "dataFull";
pub const LARMOR_VAR:&str = "larmorFreq";
pub const SCANS_VAR:&str = "nScans";
pub const FOV_VAR:&str = "fov";

/// PhysioMRI raw k-space with its acquisition scalars
#[derive(Clone,Debug)]
pub struct RawAcquisitionSet {
    /// indexed by (repetition, partition, line, sample)
    data:Array4<Complex32>,
    resonance_frequency_hz:f64,
    repetitions:usize,
    /// x, y, z in meters
    fov_m:[f64;3],
}

impl RawAcquisitionSet {

    pub fn new(data:Array4<Complex32>,resonance_frequency_hz:f64,repetitions:usize,fov_m:[f64;3]) -> Result<Self> {
        let (n_rep,n_par,n_lin,n_read) = data.dim();
        if n_par == 0 || n_lin == 0 || n_read == 0 {
            return Err(Error::Shape {
                name:DATA_VAR.to_string(),
                expected:"non-empty partition, line and readout dimensions",
                found:data.shape().to_vec(),
            });
        }
        if repetitions == 0 || repetitions > n_rep {
            return Err(Error::InvalidValue { name:SCANS_VAR.to_string(), value:repetitions as f64 });
        }
        Ok(Self { data, resonance_frequency_hz, repetitions, fov_m })
    }

    pub fn open(mat_file:&Path) -> Result<Self> {
        let f = File::open(mat_file).map_err(|e| Error::io(mat_file,e))?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn from_reader<R:Read>(reader:R) -> Result<Self> {
        let mat = MatFile::parse(reader).map_err(|e| Error::Mat(format!("{:?}",e)))?;

        let raw = find(&mat,DATA_VAR)?;
        let mut dims = raw.size().to_vec();
        if dims.len() == 3 {
            dims.insert(0,1);
        }
        if dims.len() != 4 {
            return Err(Error::Shape {
                name:DATA_VAR.to_string(),
                expected:"3 or 4 dimensions",
                found:raw.size().to_vec(),
            });
        }
        let (real,imag) = widen(raw.data())?;
        let samples:Vec<Complex32> = match imag {
            Some(imag) => real.into_iter().zip(imag).map(|(re,im)| Complex32::new(re,im)).collect(),
            None => real.into_iter().map(|re| Complex32::new(re,0.0)).collect(),
        };
        // MAT arrays are column-major
        let data = Array4::from_shape_vec((dims[0],dims[1],dims[2],dims[3]).f(),samples)
            .map_err(|_| Error::Shape {
                name:DATA_VAR.to_string(),
                expected:"as many samples as its dimensions describe",
                found:dims.clone(),
            })?;

        let larmor = first_scalar(&mat,LARMOR_VAR)?;
        let scans = first_scalar(&mat,SCANS_VAR)?;
        if scans.is_nan() || scans < 1.0 || scans.fract() != 0.0 {
            return Err(Error::InvalidValue { name:SCANS_VAR.to_string(), value:scans });
        }

        let fov_arr = find(&mat,FOV_VAR)?;
        let (fov,_) = widen_f64(fov_arr.data())?;
        let n = fov.len();
        if n < 3 {
            return Err(Error::Shape {
                name:FOV_VAR.to_string(),
                expected:"at least 3 elements",
                found:fov_arr.size().to_vec(),
            });
        }
        let fov_m = [fov[n-1],fov[n-2],fov[n-3]];

        debug!("{} dims {:?}, {} = {}, {} = {}, fov {:?} m",DATA_VAR,dims,LARMOR_VAR,larmor,SCANS_VAR,scans,fov_m);
        Self::new(data,larmor,scans as usize,fov_m)
    }

    pub fn resonance_frequency_hz(&self) -> f64 {
        self.resonance_frequency_hz
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    pub fn partitions(&self) -> usize {
        self.data.dim().1
    }

    pub fn lines(&self) -> usize {
        self.data.dim().2
    }

    pub fn readout_length(&self) -> usize {
        self.data.dim().3
    }

    pub fn fov_m(&self) -> [f64;3] {
        self.fov_m
    }

    pub fn readout(&self,repetition:usize,partition:usize,line:usize) -> ArrayView1<Complex32> {
        self.data.slice(s![repetition,partition,line,..])
    }
}

fn find<'a>(mat:&'a MatFile,name:&str) -> Result<&'a matfile::Array> {
    mat.find_by_name(name).ok_or_else(|| Error::MissingVariable(name.to_string()))
}

fn first_scalar(mat:&MatFile,name:&str) -> Result<f64> {
    let arr = find(mat,name)?;
    let (real,_) = widen_f64(arr.data())?;
    real.first().copied().ok_or_else(|| Error::Shape {
        name:name.to_string(),
        expected:"at least one element",
        found:arr.size().to_vec(),
    })
}

macro_rules! widen_numeric {
    (@parts $real:ident,$imag:ident,$t:ty) => {
        Ok((
            $real.iter().map(|v| *v as $t).collect::<Vec<$t>>(),
            $imag.as_ref().map(|im| im.iter().map(|v| *v as $t).collect::<Vec<$t>>()),
        ))
    };
    ($data:expr,$t:ty) => {
        match $data {
            NumericData::Int8 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::UInt8 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::Int16 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::UInt16 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::Int32 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::UInt32 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::Int64 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::UInt64 { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::Single { real, imag } => widen_numeric!(@parts real,imag,$t),
            NumericData::Double { real, imag } => widen_numeric!(@parts real,imag,$t),
            #[allow(unreachable_patterns)]
            _ => Err(Error::Mat(String::from("unsupported numeric class"))),
        }
    };
}

/// any MAT numeric class as f32 samples
fn widen(data:&NumericData) -> Result<(Vec<f32>,Option<Vec<f32>>)> {
    widen_numeric!(data,f32)
}

fn widen_f64(data:&NumericData) -> Result<(Vec<f64>,Option<Vec<f64>>)> {
    widen_numeric!(data,f64)
}
