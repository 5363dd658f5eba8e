use anyhow::{Result, ensure};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Reads typed values from a byte slice in little-endian order.
///
/// Used to take apart frame payloads after the framing layer has buffered
/// the complete announced byte count.
///
/// # Examples
///
/// ```
/// use relievo_core::io::ValueReader;
///
/// let mut reader = ValueReader::new(&[0x01, 0x02]);
/// assert_eq!(reader.read_u16().unwrap(), 0x0201);
/// assert!(reader.is_empty());
/// ```
pub struct ValueReader<'a> {
	cursor: Cursor<&'a [u8]>,
	len: u64,
}

impl<'a> ValueReader<'a> {
	pub fn new(slice: &'a [u8]) -> ValueReader<'a> {
		ValueReader {
			len: slice.len() as u64,
			cursor: Cursor::new(slice),
		}
	}

	pub fn remaining(&self) -> u64 {
		self.len - self.cursor.position()
	}

	pub fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.cursor.read_u8()?)
	}

	pub fn read_u16(&mut self) -> Result<u16> {
		Ok(self.cursor.read_u16::<LittleEndian>()?)
	}

	pub fn read_u32(&mut self) -> Result<u32> {
		Ok(self.cursor.read_u32::<LittleEndian>()?)
	}

	pub fn read_i16(&mut self) -> Result<i16> {
		Ok(self.cursor.read_i16::<LittleEndian>()?)
	}

	pub fn read_i32(&mut self) -> Result<i32> {
		Ok(self.cursor.read_i32::<LittleEndian>()?)
	}

	pub fn read_f64(&mut self) -> Result<f64> {
		Ok(self.cursor.read_f64::<LittleEndian>()?)
	}

	/// Skips padding bytes without interpreting them.
	pub fn skip(&mut self, count: u64) -> Result<()> {
		ensure!(
			self.remaining() >= count,
			"cannot skip {count} bytes, only {} remaining",
			self.remaining()
		);
		self.cursor.set_position(self.cursor.position() + count);
		Ok(())
	}

	pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
		let mut vec = vec![0u8; length];
		std::io::Read::read_exact(&mut self.cursor, &mut vec)?;
		Ok(vec)
	}

	pub fn read_string(&mut self, length: usize) -> Result<String> {
		Ok(String::from_utf8(self.read_bytes(length)?)?)
	}

	/// Reads all remaining bytes.
	pub fn read_rest(&mut self) -> Vec<u8> {
		let position = self.cursor.position() as usize;
		let rest = self.cursor.get_ref()[position..].to_vec();
		self.cursor.set_position(self.len);
		rest
	}
}
