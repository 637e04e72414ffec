use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};
use crate::error::{Error, Result};
use crate::ismrmrd::{
    Acquisition, AcquisitionFlag, AcquisitionFlags, AcquisitionHeader, Encoding, EncodingLimits,
    EncodingSpace, FieldOfView, IsmrmrdHeader, Limit, MatrixSize, Trajectory,
    ACQUISITION_HEADER_VERSION,
};
use crate::dataset::{DatasetWriter, DEFAULT_GROUP};
use crate::physio::RawAcquisitionSet;
use crate::stream::MrdWriter;

/// data is always written as a single receiver channel
pub const RECEIVER_CHANNELS:u16 = 1;

/// acquisition counts checked against the 16 bit ISMRMRD fields
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct AcqDims {
    pub repetitions:u16,
    pub partitions:u16,
    pub lines:u16,
    pub readout:u16,
}

fn to_u16(what:&'static str,value:usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::Overflow { what, value })
}

impl AcqDims {
    pub fn of(raw:&RawAcquisitionSet) -> Result<Self> {
        Ok(Self {
            repetitions:to_u16("repetitions",raw.repetitions())?,
            partitions:to_u16("partitions",raw.partitions())?,
            lines:to_u16("lines",raw.lines())?,
            readout:to_u16("readout length",raw.readout_length())?,
        })
    }
}

/// xml header for a PhysioMRI data set. No oversampling, so encoded and recon spaces match.
pub fn ismrmrd_header(raw:&RawAcquisitionSet) -> Result<IsmrmrdHeader> {
    let dims = AcqDims::of(raw)?;
    let [fov_x,fov_y,fov_z] = raw.fov_m();
    let space = EncodingSpace {
        matrix_size:MatrixSize {
            x:dims.readout,
            y:dims.lines,
            z:dims.partitions,
        },
        field_of_view_mm:FieldOfView {
            x:(fov_x*1000.0) as f32,
            y:(fov_y*1000.0) as f32,
            z:(fov_z*1000.0) as f32,
        },
    };
    let limits = EncodingLimits {
        kspace_encoding_step_1:Limit::over(dims.lines),
        kspace_encoding_step_2:Limit::over(dims.partitions),
        repetition:Limit {
            minimum:0,
            maximum:dims.repetitions - 1,
            center:0,
        },
        ..Default::default()
    };
    Ok(IsmrmrdHeader {
        receiver_channels:RECEIVER_CHANNELS,
        h1_resonance_frequency_hz:raw.resonance_frequency_hz() as i64,
        encoding:vec![Encoding {
            encoded_space:space,
            recon_space:space,
            encoding_limits:limits,
            trajectory:Trajectory::Cartesian,
        }],
    })
}

/// boundary flags for the readout at (partition z, line y)
pub fn boundary_flags(line:u16,partition:u16,dims:&AcqDims) -> AcquisitionFlags {
    let first_line = line == 0;
    let first_partition = partition == 0;
    let last_line = line == dims.lines - 1;
    let last_partition = partition == dims.partitions - 1;
    let mut flags = AcquisitionFlags::default();
    if first_line && first_partition {
        flags.set(AcquisitionFlag::FirstInRepetition);
    }
    if first_line {
        flags.set(AcquisitionFlag::FirstInEncodeStep1);
    }
    if first_partition {
        flags.set(AcquisitionFlag::FirstInEncodeStep2);
    }
    if last_line {
        flags.set(AcquisitionFlag::LastInEncodeStep1);
    }
    if last_partition {
        flags.set(AcquisitionFlag::LastInEncodeStep2);
    }
    if last_line && last_partition {
        flags.set(AcquisitionFlag::LastInRepetition);
    }
    flags
}

pub fn acquisition(raw:&RawAcquisitionSet,dims:&AcqDims,repetition:u16,partition:u16,line:u16) -> Acquisition {
    let mut head = AcquisitionHeader {
        version:ACQUISITION_HEADER_VERSION,
        flags:boundary_flags(line,partition,dims),
        number_of_samples:dims.readout,
        available_channels:RECEIVER_CHANNELS,
        active_channels:RECEIVER_CHANNELS,
        center_sample:dims.readout/2,
        discard_pre:0,
        discard_post:0,
        sample_time_us:0.0,
        ..Default::default()
    };
    head.idx.repetition = repetition;
    head.idx.kspace_encode_step_1 = line;
    head.idx.kspace_encode_step_2 = partition;
    Acquisition {
        head,
        traj:vec![],
        data:raw.readout(repetition as usize,partition as usize,line as usize).to_vec(),
    }
}

/// Destination for an ISMRMRD header followed by its acquisitions
pub trait AcquisitionSink {
    fn write_header(&mut self,header:&IsmrmrdHeader) -> Result<()>;
    fn write_acquisition(&mut self,acq:&Acquisition) -> Result<()>;
}

impl<W:Write> AcquisitionSink for MrdWriter<W> {
    fn write_header(&mut self,header:&IsmrmrdHeader) -> Result<()> {
        MrdWriter::write_header(self,header)
    }
    fn write_acquisition(&mut self,acq:&Acquisition) -> Result<()> {
        MrdWriter::write_acquisition(self,acq)
    }
}

impl AcquisitionSink for DatasetWriter {
    fn write_header(&mut self,header:&IsmrmrdHeader) -> Result<()> {
        DatasetWriter::write_header(self,header)
    }
    fn write_acquisition(&mut self,acq:&Acquisition) -> Result<()> {
        DatasetWriter::write_acquisition(self,acq)
    }
}

/// ISMRMRD container written by [`convert_physio`]
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum OutputFormat {
    /// HDF5 file with the `dataset` group
    Dataset,
    /// ISMRMRD message stream
    Stream,
}

impl OutputFormat {
    /// `.h5` and `.hdf5` outputs are HDF5 data sets, anything else is a stream
    pub fn from_path(output:&Path) -> Self {
        match output.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("h5") || ext.eq_ignore_ascii_case("hdf5") => Self::Dataset,
            _ => Self::Stream,
        }
    }
}

/// write the header and every readout, repetition outermost and line innermost.
/// Returns the number of acquisitions written.
pub fn write_ismrmrd<S:AcquisitionSink>(raw:&RawAcquisitionSet,writer:&mut S) -> Result<usize> {
    let dims = AcqDims::of(raw)?;
    writer.write_header(&ismrmrd_header(raw)?)?;
    let mut n = 0;
    for r in 0..dims.repetitions {
        info!("Repetition {}",r);
        for z in 0..dims.partitions {
            for y in 0..dims.lines {
                writer.write_acquisition(&acquisition(raw,&dims,r,z,y))?;
                n += 1;
            }
        }
    }
    Ok(n)
}

fn write_stream(raw:&RawAcquisitionSet,output:&Path) -> Result<usize> {
    let f = File::create(output).map_err(|e| Error::io(output,e))?;
    let mut writer = MrdWriter::new(BufWriter::new(f));
    let n = write_ismrmrd(raw,&mut writer)?;
    let buffered = writer.close()?;
    let f = buffered.into_inner().map_err(|e| Error::io(output,e.into_error()))?;
    f.sync_all().map_err(|e| Error::io(output,e))?;
    Ok(n)
}

fn write_dataset(raw:&RawAcquisitionSet,output:&Path) -> Result<usize> {
    let mut writer = DatasetWriter::create(output,DEFAULT_GROUP)?;
    write_ismrmrd(raw,&mut writer)?;
    writer.close()
}

/// convert a PhysioMRI MAT file, choosing the container from the output extension
pub fn convert_physio(input:&Path,output:&Path) -> Result<usize> {
    convert_physio_to(input,output,OutputFormat::from_path(output))
}

/// A failed conversion leaves no output file behind.
pub fn convert_physio_to(input:&Path,output:&Path,format:OutputFormat) -> Result<usize> {
    let raw = RawAcquisitionSet::open(input)?;
    let written = match format {
        OutputFormat::Dataset => write_dataset(&raw,output),
        OutputFormat::Stream => write_stream(&raw,output),
    };
    match written {
        Ok(n) => Ok(n),
        Err(e) => {
            if output.exists() && std::fs::remove_file(output).is_err() {
                warn!("could not remove partial output {}",output.display());
            }
            Err(e)
        }
    }
}
