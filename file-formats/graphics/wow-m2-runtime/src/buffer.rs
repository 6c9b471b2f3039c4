//! Byte buffer view and the offset/count table pattern used by every M2 sub-array

use crate::error::{M2Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Quat, Vec2, Vec3};
use std::io::{self, Read, Seek, SeekFrom};
use std::marker::PhantomData;

/// Read-only cursor over a model's raw bytes
///
/// Implements [`Read`] and [`Seek`] so records can be decoded sequentially,
/// while still exposing the whole buffer for table bounds checks.
#[derive(Debug, Clone)]
pub struct ByteBufferView<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> ByteBufferView<'a> {
    /// Create a view positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Total size of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw pointer to the first byte
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// The whole underlying buffer
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// A fresh view over the same bytes positioned at `offset`
    pub fn at(&self, offset: u64) -> Self {
        Self {
            data: self.data,
            pos: offset,
        }
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset..end)
    }
}

impl Read for ByteBufferView<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let remaining = &self.data[start..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ByteBufferView<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => (self.data.len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            )),
        }
    }
}

/// A fixed-size record that can be read from the model buffer
pub trait Record: Sized {
    /// Size of one record in bytes
    const SIZE: usize;

    /// Parse one record from the reader
    fn parse<R: Read>(reader: &mut R) -> Result<Self>;
}

impl Record for u8 {
    const SIZE: usize = 1;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u8()?)
    }
}

impl Record for u16 {
    const SIZE: usize = 2;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl Record for i16 {
    const SIZE: usize = 2;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_i16::<LittleEndian>()?)
    }
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl Record for f32 {
    const SIZE: usize = 4;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(reader.read_f32::<LittleEndian>()?)
    }
}

impl Record for Vec2 {
    const SIZE: usize = 8;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(read_vec2(reader)?)
    }
}

impl Record for Vec3 {
    const SIZE: usize = 12;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(read_vec3(reader)?)
    }
}

impl Record for Quat {
    const SIZE: usize = 16;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let x = reader.read_f32::<LittleEndian>()?;
        let y = reader.read_f32::<LittleEndian>()?;
        let z = reader.read_f32::<LittleEndian>()?;
        let w = reader.read_f32::<LittleEndian>()?;
        Ok(Self::from_xyzw(x, y, z, w))
    }
}

impl Record for [u8; 4] {
    const SIZE: usize = 4;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut v = [0u8; 4];
        reader.read_exact(&mut v)?;
        Ok(v)
    }
}

/// Quaternion stored as four signed 16-bit components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedQuat(pub [i16; 4]);

impl Record for PackedQuat {
    const SIZE: usize = 8;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut v = [0i16; 4];
        reader.read_i16_into::<LittleEndian>(&mut v)?;
        Ok(Self(v))
    }
}

/// Read a little-endian `Vec2`
pub fn read_vec2<R: Read>(reader: &mut R) -> io::Result<Vec2> {
    let x = reader.read_f32::<LittleEndian>()?;
    let y = reader.read_f32::<LittleEndian>()?;
    Ok(Vec2::new(x, y))
}

/// Read a little-endian `Vec3`
pub fn read_vec3<R: Read>(reader: &mut R) -> io::Result<Vec3> {
    let x = reader.read_f32::<LittleEndian>()?;
    let y = reader.read_f32::<LittleEndian>()?;
    let z = reader.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

/// A reference to an array in the model buffer
#[derive(Debug, PartialEq, Eq)]
pub struct TableArray<T> {
    /// Number of elements in the array
    pub count: u32,
    /// Offset from the start of the buffer to the array
    pub offset: u32,
    _phantom: PhantomData<T>,
}

// Manual impls so `T` needs no bounds.
impl<T> Clone for TableArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TableArray<T> {}

impl<T> Default for TableArray<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<T> TableArray<T> {
    /// Create a new array reference
    pub const fn new(count: u32, offset: u32) -> Self {
        Self {
            count,
            offset,
            _phantom: PhantomData,
        }
    }

    /// Parse an array reference from a reader
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_u32::<LittleEndian>()?;
        let offset = reader.read_u32::<LittleEndian>()?;
        Ok(Self::new(count, offset))
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Convert this reference to a reference of another type
    pub fn convert<U>(&self) -> TableArray<U> {
        TableArray::new(self.count, self.offset)
    }

    /// Verify that `count` records of `record_size` bytes fit in a buffer of `len` bytes
    pub fn check_bounds(&self, table: &'static str, record_size: usize, len: usize) -> Result<()> {
        let out_of_bounds = || M2Error::OutOfBounds {
            table,
            offset: self.offset,
            count: self.count,
            record_size,
            len,
        };
        let size = (self.count as usize)
            .checked_mul(record_size)
            .ok_or_else(out_of_bounds)?;
        let end = (self.offset as usize)
            .checked_add(size)
            .ok_or_else(out_of_bounds)?;
        if end > len {
            return Err(out_of_bounds());
        }
        Ok(())
    }
}

impl<T: Record> TableArray<T> {
    /// Read every element of the array
    ///
    /// Empty arrays are skipped without looking at their offset.
    pub fn read(&self, buffer: &ByteBufferView<'_>, table: &'static str) -> Result<Vec<T>> {
        read_table(buffer, self, table)
    }
}

impl<T> Record for TableArray<T> {
    const SIZE: usize = 8;

    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Self::parse(reader)
    }
}

/// Reads the records referenced by `array`
pub fn read_table<T: Record>(
    buffer: &ByteBufferView<'_>,
    array: &TableArray<T>,
    table: &'static str,
) -> Result<Vec<T>> {
    if array.is_empty() {
        return Ok(Vec::new());
    }

    array.check_bounds(table, T::SIZE, buffer.len())?;

    let mut reader = buffer.at(u64::from(array.offset));
    let mut result = Vec::with_capacity(array.count as usize);
    for _ in 0..array.count {
        result.push(T::parse(&mut reader)?);
    }

    Ok(result)
}

/// Read a table that is allowed to be missing or broken, logging instead of failing
pub fn read_table_lenient<T: Record>(
    buffer: &ByteBufferView<'_>,
    array: &TableArray<T>,
    table: &'static str,
) -> Vec<T> {
    match read_table(buffer, array, table) {
        Ok(values) => values,
        Err(err) => {
            log::warn!("Skipping table '{}': {}", table, err);
            Vec::new()
        }
    }
}
