//! ISMRMRD header and acquisition types.
//!
//! The xml header only carries the fields a Cartesian single-channel
//! acquisition needs. The acquisition header mirrors the packed 340 byte
//! ISMRMRD 1.x layout field for field.

use std::fmt::Write as FmtWrite;
use std::io::{Read, Write};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex32;

pub const ACQUISITION_HEADER_SIZE:usize = 340;
pub const ACQUISITION_HEADER_VERSION:u16 = 1;

const XML_NAMESPACE:&str = "http://www.ismrm.org/ISMRMRD";

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum AcquisitionFlag {
    FirstInEncodeStep1 = 1,
    LastInEncodeStep1 = 2,
    FirstInEncodeStep2 = 3,
    LastInEncodeStep2 = 4,
    FirstInRepetition = 13,
    LastInRepetition = 14,
}

impl AcquisitionFlag {
    pub fn bit(&self) -> u64 {
        1 << (*self as u64 - 1)
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct AcquisitionFlags(u64);

impl AcquisitionFlags {
    pub fn from_bits(bits:u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn set(&mut self,flag:AcquisitionFlag) {
        self.0 |= flag.bit();
    }

    pub fn is_set(&self,flag:AcquisitionFlag) -> bool {
        self.0 & flag.bit() != 0
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct EncodingCounters {
    pub kspace_encode_step_1:u16,
    pub kspace_encode_step_2:u16,
    pub average:u16,
    pub slice:u16,
    pub contrast:u16,
    pub phase:u16,
    pub repetition:u16,
    pub set:u16,
    pub segment:u16,
    pub user:[u16;8],
}

#[derive(Clone,Debug,Default,PartialEq)]
pub struct AcquisitionHeader {
    pub version:u16,
    pub flags:AcquisitionFlags,
    pub measurement_uid:u32,
    pub scan_counter:u32,
    pub acquisition_time_stamp:u32,
    pub physiology_time_stamp:[u32;3],
    pub number_of_samples:u16,
    pub available_channels:u16,
    pub active_channels:u16,
    pub channel_mask:[u64;16],
    pub discard_pre:u16,
    pub discard_post:u16,
    pub center_sample:u16,
    pub encoding_space_ref:u16,
    pub trajectory_dimensions:u16,
    pub sample_time_us:f32,
    pub position:[f32;3],
    pub read_dir:[f32;3],
    pub phase_dir:[f32;3],
    pub slice_dir:[f32;3],
    pub patient_table_position:[f32;3],
    pub idx:EncodingCounters,
    pub user_int:[i32;8],
    pub user_float:[f32;8],
}

fn write_f32s<W:Write>(w:&mut W,vals:&[f32]) -> std::io::Result<()> {
    vals.iter().try_for_each(|v| w.write_f32::<LittleEndian>(*v))
}

fn read_f32s<R:Read,const N:usize>(r:&mut R) -> std::io::Result<[f32;N]> {
    let mut vals = [0.0;N];
    r.read_f32_into::<LittleEndian>(&mut vals)?;
    Ok(vals)
}

impl AcquisitionHeader {

    pub fn write_to<W:Write>(&self,w:&mut W) -> std::io::Result<()> {
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.flags.bits())?;
        w.write_u32::<LittleEndian>(self.measurement_uid)?;
        w.write_u32::<LittleEndian>(self.scan_counter)?;
        w.write_u32::<LittleEndian>(self.acquisition_time_stamp)?;
        self.physiology_time_stamp.iter().try_for_each(|v| w.write_u32::<LittleEndian>(*v))?;
        w.write_u16::<LittleEndian>(self.number_of_samples)?;
        w.write_u16::<LittleEndian>(self.available_channels)?;
        w.write_u16::<LittleEndian>(self.active_channels)?;
        self.channel_mask.iter().try_for_each(|v| w.write_u64::<LittleEndian>(*v))?;
        w.write_u16::<LittleEndian>(self.discard_pre)?;
        w.write_u16::<LittleEndian>(self.discard_post)?;
        w.write_u16::<LittleEndian>(self.center_sample)?;
        w.write_u16::<LittleEndian>(self.encoding_space_ref)?;
        w.write_u16::<LittleEndian>(self.trajectory_dimensions)?;
        w.write_f32::<LittleEndian>(self.sample_time_us)?;
        write_f32s(w,&self.position)?;
        write_f32s(w,&self.read_dir)?;
        write_f32s(w,&self.phase_dir)?;
        write_f32s(w,&self.slice_dir)?;
        write_f32s(w,&self.patient_table_position)?;
        let idx = &self.idx;
        for v in [idx.kspace_encode_step_1,idx.kspace_encode_step_2,idx.average,idx.slice,
                  idx.contrast,idx.phase,idx.repetition,idx.set,idx.segment] {
            w.write_u16::<LittleEndian>(v)?;
        }
        idx.user.iter().try_for_each(|v| w.write_u16::<LittleEndian>(*v))?;
        self.user_int.iter().try_for_each(|v| w.write_i32::<LittleEndian>(*v))?;
        write_f32s(w,&self.user_float)
    }

    pub fn read_from<R:Read>(r:&mut R) -> std::io::Result<Self> {
        let mut h = AcquisitionHeader::default();
        h.version = r.read_u16::<LittleEndian>()?;
        h.flags = AcquisitionFlags::from_bits(r.read_u64::<LittleEndian>()?);
        h.measurement_uid = r.read_u32::<LittleEndian>()?;
        h.scan_counter = r.read_u32::<LittleEndian>()?;
        h.acquisition_time_stamp = r.read_u32::<LittleEndian>()?;
        r.read_u32_into::<LittleEndian>(&mut h.physiology_time_stamp)?;
        h.number_of_samples = r.read_u16::<LittleEndian>()?;
        h.available_channels = r.read_u16::<LittleEndian>()?;
        h.active_channels = r.read_u16::<LittleEndian>()?;
        r.read_u64_into::<LittleEndian>(&mut h.channel_mask)?;
        h.discard_pre = r.read_u16::<LittleEndian>()?;
        h.discard_post = r.read_u16::<LittleEndian>()?;
        h.center_sample = r.read_u16::<LittleEndian>()?;
        h.encoding_space_ref = r.read_u16::<LittleEndian>()?;
        h.trajectory_dimensions = r.read_u16::<LittleEndian>()?;
        h.sample_time_us = r.read_f32::<LittleEndian>()?;
        h.position = read_f32s(r)?;
        h.read_dir = read_f32s(r)?;
        h.phase_dir = read_f32s(r)?;
        h.slice_dir = read_f32s(r)?;
        h.patient_table_position = read_f32s(r)?;
        let mut counters = [0u16;9];
        r.read_u16_into::<LittleEndian>(&mut counters)?;
        let [step_1,step_2,average,slice,contrast,phase,repetition,set,segment] = counters;
        h.idx = EncodingCounters {
            kspace_encode_step_1:step_1,
            kspace_encode_step_2:step_2,
            average,
            slice,
            contrast,
            phase,
            repetition,
            set,
            segment,
            user:[0;8],
        };
        r.read_u16_into::<LittleEndian>(&mut h.idx.user)?;
        r.read_i32_into::<LittleEndian>(&mut h.user_int)?;
        h.user_float = read_f32s(r)?;
        Ok(h)
    }
}

/// one readout. Samples are channel-major: all samples of channel 0, then channel 1 ...
#[derive(Clone,Debug,Default,PartialEq)]
pub struct Acquisition {
    pub head:AcquisitionHeader,
    pub traj:Vec<f32>,
    pub data:Vec<Complex32>,
}

impl Acquisition {
    pub fn n_traj(&self) -> usize {
        self.head.trajectory_dimensions as usize * self.head.number_of_samples as usize
    }

    pub fn n_data(&self) -> usize {
        self.head.active_channels as usize * self.head.number_of_samples as usize
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct Limit {
    pub minimum:u16,
    pub maximum:u16,
    pub center:u16,
}

impl Limit {
    /// limit over `n` encoding steps, centered at floor(n/2)
    pub fn over(n:u16) -> Self {
        Self {
            minimum:0,
            maximum:n.saturating_sub(1),
            center:n/2,
        }
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct MatrixSize {
    pub x:u16,
    pub y:u16,
    pub z:u16,
}

#[derive(Clone,Copy,Debug,Default,PartialEq)]
pub struct FieldOfView {
    pub x:f32,
    pub y:f32,
    pub z:f32,
}

#[derive(Clone,Copy,Debug,Default,PartialEq)]
pub struct EncodingSpace {
    pub matrix_size:MatrixSize,
    pub field_of_view_mm:FieldOfView,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct EncodingLimits {
    pub kspace_encoding_step_0:Limit,
    pub kspace_encoding_step_1:Limit,
    pub kspace_encoding_step_2:Limit,
    pub average:Limit,
    pub slice:Limit,
    pub contrast:Limit,
    pub phase:Limit,
    pub repetition:Limit,
    pub set:Limit,
    pub segment:Limit,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub enum Trajectory {
    #[default]
    Cartesian,
}

impl Trajectory {
    pub fn print(&self) -> &'static str {
        match self {
            Trajectory::Cartesian => "cartesian",
        }
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq)]
pub struct Encoding {
    pub encoded_space:EncodingSpace,
    pub recon_space:EncodingSpace,
    pub encoding_limits:EncodingLimits,
    pub trajectory:Trajectory,
}

#[derive(Clone,Debug,Default,PartialEq)]
pub struct IsmrmrdHeader {
    pub receiver_channels:u16,
    pub h1_resonance_frequency_hz:i64,
    pub encoding:Vec<Encoding>,
}

fn xml_space(s:&mut String,tag:&str,space:&EncodingSpace) {
    let m = &space.matrix_size;
    let f = &space.field_of_view_mm;
    let _ = write!(s,"<{tag}><matrixSize><x>{}</x><y>{}</y><z>{}</z></matrixSize>",m.x,m.y,m.z);
    let _ = write!(s,"<fieldOfView_mm><x>{}</x><y>{}</y><z>{}</z></fieldOfView_mm></{tag}>",f.x,f.y,f.z);
}

fn xml_limit(s:&mut String,tag:&str,limit:&Limit) {
    let _ = write!(s,"<{tag}><minimum>{}</minimum><maximum>{}</maximum><center>{}</center></{tag}>",
                   limit.minimum,limit.maximum,limit.center);
}

impl IsmrmrdHeader {

    /// serialize in ismrmrd.xsd element order
    pub fn to_xml(&self) -> String {
        let mut s = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let _ = write!(s,"<ismrmrdHeader xmlns=\"{XML_NAMESPACE}\">");
        let _ = write!(s,"<acquisitionSystemInformation><receiverChannels>{}</receiverChannels></acquisitionSystemInformation>",
                       self.receiver_channels);
        let _ = write!(s,"<experimentalConditions><H1resonanceFrequency_Hz>{}</H1resonanceFrequency_Hz></experimentalConditions>",
                       self.h1_resonance_frequency_hz);
        for enc in &self.encoding {
            s.push_str("<encoding>");
            xml_space(&mut s,"encodedSpace",&enc.encoded_space);
            xml_space(&mut s,"reconSpace",&enc.recon_space);
            let l = &enc.encoding_limits;
            s.push_str("<encodingLimits>");
            xml_limit(&mut s,"kspace_encoding_step_0",&l.kspace_encoding_step_0);
            xml_limit(&mut s,"kspace_encoding_step_1",&l.kspace_encoding_step_1);
            xml_limit(&mut s,"kspace_encoding_step_2",&l.kspace_encoding_step_2);
            xml_limit(&mut s,"average",&l.average);
            xml_limit(&mut s,"slice",&l.slice);
            xml_limit(&mut s,"contrast",&l.contrast);
            xml_limit(&mut s,"phase",&l.phase);
            xml_limit(&mut s,"repetition",&l.repetition);
            xml_limit(&mut s,"set",&l.set);
            xml_limit(&mut s,"segment",&l.segment);
            s.push_str("</encodingLimits>");
            let _ = write!(s,"<trajectory>{}</trajectory>",enc.trajectory.print());
            s.push_str("</encoding>");
        }
        s.push_str("</ismrmrdHeader>\n");
        s
    }
}
