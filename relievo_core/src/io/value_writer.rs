use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};

/// Writes typed values to a growable buffer in little-endian order.
///
/// Frame producers assemble the complete payload with this type before
/// anything touches a socket, so a frame is always written in one piece.
#[derive(Default)]
pub struct ValueWriter {
	buffer: Vec<u8>,
}

impl ValueWriter {
	pub fn new() -> ValueWriter {
		ValueWriter::default()
	}

	pub fn with_capacity(capacity: usize) -> ValueWriter {
		ValueWriter {
			buffer: Vec::with_capacity(capacity),
		}
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	pub fn write_u8(&mut self, value: u8) -> Result<()> {
		Ok(self.buffer.write_u8(value)?)
	}

	pub fn write_u16(&mut self, value: u16) -> Result<()> {
		Ok(self.buffer.write_u16::<LittleEndian>(value)?)
	}

	pub fn write_u32(&mut self, value: u32) -> Result<()> {
		Ok(self.buffer.write_u32::<LittleEndian>(value)?)
	}

	pub fn write_i16(&mut self, value: i16) -> Result<()> {
		Ok(self.buffer.write_i16::<LittleEndian>(value)?)
	}

	pub fn write_i32(&mut self, value: i32) -> Result<()> {
		Ok(self.buffer.write_i32::<LittleEndian>(value)?)
	}

	pub fn write_f64(&mut self, value: f64) -> Result<()> {
		Ok(self.buffer.write_f64::<LittleEndian>(value)?)
	}

	/// Writes `count` zero bytes of padding.
	pub fn write_pad(&mut self, count: usize) -> Result<()> {
		self.buffer.extend(std::iter::repeat_n(0u8, count));
		Ok(())
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		self.buffer.extend_from_slice(bytes);
		Ok(())
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.buffer
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_integers_le() -> Result<()> {
		let mut writer = ValueWriter::new();
		writer.write_u16(0x0201)?;
		writer.write_u32(0x06050403)?;
		assert_eq!(writer.into_vec(), vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
		Ok(())
	}

	#[test]
	fn test_write_f64_le() -> Result<()> {
		let mut writer = ValueWriter::new();
		writer.write_f64(1.0)?;
		assert_eq!(writer.into_vec(), vec![0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
		Ok(())
	}

	#[test]
	fn test_write_pad() -> Result<()> {
		let mut writer = ValueWriter::new();
		writer.write_u8(7)?;
		writer.write_pad(3)?;
		assert_eq!(writer.into_vec(), vec![7, 0, 0, 0]);
		Ok(())
	}

	#[test]
	fn test_round_trip_with_reader() -> Result<()> {
		let mut writer = ValueWriter::new();
		writer.write_i16(-300)?;
		writer.write_i32(70_000)?;
		writer.write_f64(-12.5)?;
		let buffer = writer.into_vec();

		let mut reader = crate::io::ValueReader::new(&buffer);
		assert_eq!(reader.read_i16()?, -300);
		assert_eq!(reader.read_i32()?, 70_000);
		assert_eq!(reader.read_f64()?, -12.5);
		Ok(())
	}
}
