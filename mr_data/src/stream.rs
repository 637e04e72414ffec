//! ISMRMRD message stream: a u16 message id followed by the message body,
//! little-endian throughout.

use std::io::{ErrorKind, Read, Write};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex32;
use crate::error::{Error, Result};
use crate::ismrmrd::{Acquisition, AcquisitionHeader, IsmrmrdHeader};

pub const MESSAGE_HEADER:u16 = 3;
pub const MESSAGE_CLOSE:u16 = 4;
pub const MESSAGE_ACQUISITION:u16 = 1008;

#[derive(Clone,Debug,PartialEq)]
pub enum Message {
    Header(String),
    Acquisition(Acquisition),
    Close,
}

pub struct MrdWriter<W:Write> {
    inner:W,
}

impl<W:Write> MrdWriter<W> {

    pub fn new(inner:W) -> Self {
        Self { inner }
    }

    pub fn write_header(&mut self,header:&IsmrmrdHeader) -> Result<()> {
        let xml = header.to_xml();
        let len = u32::try_from(xml.len()).map_err(|_| Error::Overflow { what:"xml header length", value:xml.len() })?;
        self.inner.write_u16::<LittleEndian>(MESSAGE_HEADER)?;
        self.inner.write_u32::<LittleEndian>(len)?;
        self.inner.write_all(xml.as_bytes())?;
        Ok(())
    }

    pub fn write_acquisition(&mut self,acq:&Acquisition) -> Result<()> {
        if acq.traj.len() != acq.n_traj() || acq.data.len() != acq.n_data() {
            return Err(Error::Stream(std::io::Error::new(
                ErrorKind::InvalidInput,
                "acquisition sample count does not match its header",
            )));
        }
        self.inner.write_u16::<LittleEndian>(MESSAGE_ACQUISITION)?;
        acq.head.write_to(&mut self.inner)?;
        for t in &acq.traj {
            self.inner.write_f32::<LittleEndian>(*t)?;
        }
        for c in &acq.data {
            self.inner.write_f32::<LittleEndian>(c.re)?;
            self.inner.write_f32::<LittleEndian>(c.im)?;
        }
        Ok(())
    }

    /// terminate the stream and hand back the flushed writer
    pub fn close(mut self) -> Result<W> {
        self.inner.write_u16::<LittleEndian>(MESSAGE_CLOSE)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub struct MrdReader<R:Read> {
    inner:R,
    closed:bool,
}

impl<R:Read> MrdReader<R> {

    pub fn new(inner:R) -> Self {
        Self { inner, closed:false }
    }

    /// next message, or None once the stream is closed or exhausted
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        if self.closed {
            return Ok(None);
        }
        let id = match self.inner.read_u16::<LittleEndian>() {
            Ok(id) => id,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match id {
            MESSAGE_HEADER => {
                let len = self.inner.read_u32::<LittleEndian>()? as u64;
                let mut bytes = Vec::new();
                (&mut self.inner).take(len).read_to_end(&mut bytes)?;
                if (bytes.len() as u64) < len {
                    return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
                }
                Ok(Some(Message::Header(String::from_utf8(bytes)?)))
            }
            MESSAGE_ACQUISITION => {
                let head = AcquisitionHeader::read_from(&mut self.inner)?;
                let mut acq = Acquisition { head, ..Default::default() };
                acq.traj = vec![0.0;acq.n_traj()];
                self.inner.read_f32_into::<LittleEndian>(&mut acq.traj)?;
                let mut floats = vec![0.0f32;2*acq.n_data()];
                self.inner.read_f32_into::<LittleEndian>(&mut floats)?;
                acq.data = floats.chunks_exact(2).map(|c| Complex32::new(c[0],c[1])).collect();
                Ok(Some(Message::Acquisition(acq)))
            }
            MESSAGE_CLOSE => {
                self.closed = true;
                Ok(Some(Message::Close))
            }
            other => Err(Error::UnknownMessage(other)),
        }
    }
}

impl<R:Read> Iterator for MrdReader<R> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ismrmrd::AcquisitionFlag;

    #[test]
    fn close_ends_the_stream() {
        let mut w = MrdWriter::new(Vec::<u8>::new());
        w.write_header(&IsmrmrdHeader::default()).unwrap();
        let mut acq = Acquisition::default();
        acq.head.number_of_samples = 2;
        acq.head.active_channels = 1;
        acq.head.flags.set(AcquisitionFlag::FirstInRepetition);
        acq.data = vec![Complex32::new(1.0,-1.0),Complex32::new(2.0,-2.0)];
        w.write_acquisition(&acq).unwrap();
        let mut bytes = w.close().unwrap();
        // trailing garbage after close is never read
        bytes.extend_from_slice(&[0xff,0xff]);

        let messages:Vec<Message> = MrdReader::new(bytes.as_slice()).collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(),3);
        assert!(matches!(&messages[0],Message::Header(xml) if xml.contains("ismrmrdHeader")));
        assert_eq!(messages[1],Message::Acquisition(acq));
        assert_eq!(messages[2],Message::Close);
    }

    #[test]
    fn mismatched_sample_count_is_rejected() {
        let mut w = MrdWriter::new(Vec::<u8>::new());
        let mut acq = Acquisition::default();
        acq.head.number_of_samples = 4;
        acq.head.active_channels = 1;
        acq.data = vec![Complex32::new(0.0,0.0)];
        assert!(w.write_acquisition(&acq).is_err());
    }

    #[test]
    fn truncated_header_with_huge_length() {
        let mut bytes = MESSAGE_HEADER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(b"<ismrmrdHeader>");
        let mut r = MrdReader::new(bytes.as_slice());
        match r.read_message() {
            Err(Error::Stream(e)) => assert_eq!(e.kind(),ErrorKind::UnexpectedEof),
            other => panic!("expected eof, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_id() {
        let bytes = 77u16.to_le_bytes();
        let mut r = MrdReader::new(&bytes[..]);
        assert!(matches!(r.read_message(),Err(Error::UnknownMessage(77))));
    }
}
