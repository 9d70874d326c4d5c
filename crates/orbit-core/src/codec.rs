//! Fixed-width binary codec for save streams.
//!
//! The encoding is not self-describing: a reader must request exactly the
//! field sequence the writer produced. All values are little-endian:
//! flags take one byte, integers and floats four, vectors two floats (x, y).

use std::io::{self, Read, Write};

use rapier2d::prelude::Vector;

/// Error type for stream encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The stream ended before the expected field.
    #[error("stream truncated while reading {field} ({wanted} bytes)")]
    Truncated { field: &'static str, wanted: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Appends fixed-width fields to a byte sink.
pub struct Encoder<W> {
    inner: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), CodecError> {
        self.inner.write_all(&[u8::from(value)])?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), CodecError> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_vec2(&mut self, value: Vector) -> Result<(), CodecError> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)
    }

    /// Writes a collection length as `u32`.
    pub fn write_len(&mut self, len: usize, field: &'static str) -> Result<(), CodecError> {
        let len = u32::try_from(len).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{field} length {len} does not fit in u32"),
            )
        })?;
        self.write_u32(len)
    }
}

/// Consumes fixed-width fields from a byte source.
pub struct Decoder<R> {
    inner: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(CodecError::Truncated { field, wanted: N })
            }
            Err(e) => Err(CodecError::Io(e)),
        }
    }

    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, CodecError> {
        let [byte] = self.read_array::<1>(field)?;
        Ok(byte != 0)
    }

    pub fn read_i32(&mut self, field: &'static str) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_f32(&mut self, field: &'static str) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_vec2(&mut self, field: &'static str) -> Result<Vector, CodecError> {
        let x = self.read_f32(field)?;
        let y = self.read_f32(field)?;
        Ok(Vector::new(x, y))
    }

    pub fn read_len(&mut self, field: &'static str) -> Result<usize, CodecError> {
        Ok(self.read_u32(field)? as usize)
    }
}
