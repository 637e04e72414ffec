//! ISMRMRD HDF5 datasets: the xml header in `/<group>/xml` and the
//! acquisitions as a compound record array in `/<group>/data`.

use std::path::Path;
use std::str::FromStr;
use hdf5::types::{VarLenArray, VarLenUnicode};
use hdf5::{File, Group, H5Type};
use num_complex::Complex32;
use crate::error::{Error, Result};
use crate::ismrmrd::{Acquisition, AcquisitionFlags, AcquisitionHeader, EncodingCounters, IsmrmrdHeader};

pub const DEFAULT_GROUP:&str = "dataset";
const XML_DATASET:&str = "xml";
const DATA_DATASET:&str = "data";

#[derive(H5Type,Clone,Copy,Debug,Default)]
#[repr(C)]
struct H5EncodingCounters {
    kspace_encode_step_1:u16,
    kspace_encode_step_2:u16,
    average:u16,
    slice:u16,
    contrast:u16,
    phase:u16,
    repetition:u16,
    set:u16,
    segment:u16,
    user:[u16;8],
}

#[derive(H5Type,Clone,Copy,Debug,Default)]
#[repr(C)]
struct H5AcquisitionHeader {
    version:u16,
    flags:u64,
    measurement_uid:u32,
    scan_counter:u32,
    acquisition_time_stamp:u32,
    physiology_time_stamp:[u32;3],
    number_of_samples:u16,
    available_channels:u16,
    active_channels:u16,
    channel_mask:[u64;16],
    discard_pre:u16,
    discard_post:u16,
    center_sample:u16,
    encoding_space_ref:u16,
    trajectory_dimensions:u16,
    sample_time_us:f32,
    position:[f32;3],
    read_dir:[f32;3],
    phase_dir:[f32;3],
    slice_dir:[f32;3],
    patient_table_position:[f32;3],
    idx:H5EncodingCounters,
    user_int:[i32;8],
    user_float:[f32;8],
}

/// complex samples are stored interleaved (re, im) as plain floats
#[derive(H5Type,Clone,Debug)]
#[repr(C)]
struct H5Acquisition {
    head:H5AcquisitionHeader,
    traj:VarLenArray<f32>,
    data:VarLenArray<f32>,
}

impl From<&EncodingCounters> for H5EncodingCounters {
    fn from(c:&EncodingCounters) -> Self {
        Self {
            kspace_encode_step_1:c.kspace_encode_step_1,
            kspace_encode_step_2:c.kspace_encode_step_2,
            average:c.average,
            slice:c.slice,
            contrast:c.contrast,
            phase:c.phase,
            repetition:c.repetition,
            set:c.set,
            segment:c.segment,
            user:c.user,
        }
    }
}

impl From<&H5EncodingCounters> for EncodingCounters {
    fn from(c:&H5EncodingCounters) -> Self {
        Self {
            kspace_encode_step_1:c.kspace_encode_step_1,
            kspace_encode_step_2:c.kspace_encode_step_2,
            average:c.average,
            slice:c.slice,
            contrast:c.contrast,
            phase:c.phase,
            repetition:c.repetition,
            set:c.set,
            segment:c.segment,
            user:c.user,
        }
    }
}

impl From<&AcquisitionHeader> for H5AcquisitionHeader {
    fn from(h:&AcquisitionHeader) -> Self {
        Self {
            version:h.version,
            flags:h.flags.bits(),
            measurement_uid:h.measurement_uid,
            scan_counter:h.scan_counter,
            acquisition_time_stamp:h.acquisition_time_stamp,
            physiology_time_stamp:h.physiology_time_stamp,
            number_of_samples:h.number_of_samples,
            available_channels:h.available_channels,
            active_channels:h.active_channels,
            channel_mask:h.channel_mask,
            discard_pre:h.discard_pre,
            discard_post:h.discard_post,
            center_sample:h.center_sample,
            encoding_space_ref:h.encoding_space_ref,
            trajectory_dimensions:h.trajectory_dimensions,
            sample_time_us:h.sample_time_us,
            position:h.position,
            read_dir:h.read_dir,
            phase_dir:h.phase_dir,
            slice_dir:h.slice_dir,
            patient_table_position:h.patient_table_position,
            idx:(&h.idx).into(),
            user_int:h.user_int,
            user_float:h.user_float,
        }
    }
}

impl From<&H5AcquisitionHeader> for AcquisitionHeader {
    fn from(h:&H5AcquisitionHeader) -> Self {
        Self {
            version:h.version,
            flags:AcquisitionFlags::from_bits(h.flags),
            measurement_uid:h.measurement_uid,
            scan_counter:h.scan_counter,
            acquisition_time_stamp:h.acquisition_time_stamp,
            physiology_time_stamp:h.physiology_time_stamp,
            number_of_samples:h.number_of_samples,
            available_channels:h.available_channels,
            active_channels:h.active_channels,
            channel_mask:h.channel_mask,
            discard_pre:h.discard_pre,
            discard_post:h.discard_post,
            center_sample:h.center_sample,
            encoding_space_ref:h.encoding_space_ref,
            trajectory_dimensions:h.trajectory_dimensions,
            sample_time_us:h.sample_time_us,
            position:h.position,
            read_dir:h.read_dir,
            phase_dir:h.phase_dir,
            slice_dir:h.slice_dir,
            patient_table_position:h.patient_table_position,
            idx:(&h.idx).into(),
            user_int:h.user_int,
            user_float:h.user_float,
        }
    }
}

impl From<&Acquisition> for H5Acquisition {
    fn from(a:&Acquisition) -> Self {
        let data:Vec<f32> = a.data.iter().flat_map(|c| [c.re,c.im]).collect();
        Self {
            head:(&a.head).into(),
            traj:VarLenArray::from_slice(&a.traj),
            data:VarLenArray::from_slice(&data),
        }
    }
}

impl From<&H5Acquisition> for Acquisition {
    fn from(a:&H5Acquisition) -> Self {
        Self {
            head:(&a.head).into(),
            traj:a.traj.as_slice().to_vec(),
            data:a.data.as_slice().chunks_exact(2).map(|c| Complex32::new(c[0],c[1])).collect(),
        }
    }
}

/// Collects acquisitions for an ISMRMRD HDF5 file. The record array is
/// written in one piece when the writer is closed.
pub struct DatasetWriter {
    file:File,
    group:Group,
    pending:Vec<H5Acquisition>,
}

impl DatasetWriter {

    /// create (or truncate) `path` with an empty group `group`
    pub fn create(path:&Path,group:&str) -> Result<Self> {
        let file = File::create(path)?;
        let group = file.create_group(group)?;
        Ok(Self { file, group, pending:vec![] })
    }

    pub fn write_header(&mut self,header:&IsmrmrdHeader) -> Result<()> {
        let xml = VarLenUnicode::from_str(&header.to_xml())
            .map_err(|e| Error::Hdf5Value(format!("xml header: {e}")))?;
        self.group.new_dataset_builder()
            .with_data(&[xml][..])
            .create(XML_DATASET)?;
        Ok(())
    }

    pub fn write_acquisition(&mut self,acq:&Acquisition) -> Result<()> {
        if acq.traj.len() != acq.n_traj() || acq.data.len() != acq.n_data() {
            return Err(Error::Hdf5Value(String::from("acquisition sample count does not match its header")));
        }
        self.pending.push(acq.into());
        Ok(())
    }

    /// write the record array and close the file. Returns the number of acquisitions.
    pub fn close(self) -> Result<usize> {
        if !self.pending.is_empty() {
            self.group.new_dataset_builder()
                .with_data(&self.pending[..])
                .create(DATA_DATASET)?;
        }
        self.file.flush()?;
        Ok(self.pending.len())
    }
}

/// Reads back an ISMRMRD HDF5 data set
pub struct DatasetReader {
    group:Group,
}

impl DatasetReader {

    pub fn open(path:&Path,group:&str) -> Result<Self> {
        let file = File::open(path)?;
        let group = file.group(group)?;
        Ok(Self { group })
    }

    pub fn read_xml_header(&self) -> Result<String> {
        let xml = self.group.dataset(XML_DATASET)?.read_raw::<VarLenUnicode>()?;
        xml.first()
            .map(|s| s.as_str().to_string())
            .ok_or_else(|| Error::Hdf5Value(String::from("empty xml header")))
    }

    /// all acquisitions; a data set without any has no `data` member
    pub fn read_acquisitions(&self) -> Result<Vec<Acquisition>> {
        if !self.group.link_exists(DATA_DATASET) {
            return Ok(vec![]);
        }
        let records = self.group.dataset(DATA_DATASET)?.read_raw::<H5Acquisition>()?;
        Ok(records.iter().map(Acquisition::from).collect())
    }
}
