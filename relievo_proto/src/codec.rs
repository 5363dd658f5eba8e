use crate::frame::Frame;
use anyhow::{Context, Result, anyhow};
use relievo_core::{ErrorKind, io::ValueWriter};
use std::io::{Read, Write};

/// Upper bound on a single frame, length prefix included. Anything larger is
/// treated as a length overflow and aborts the connection.
pub const MAX_FRAME_LEN: u32 = 1 << 28;

/// Minimum frame size: the length prefix plus the type tag.
const MIN_FRAME_LEN: u32 = 5;

/// Serializes a frame to its on-wire bytes: length, tag, payload.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
	let mut payload = ValueWriter::new();
	frame.write_payload(&mut payload)?;
	let payload = payload.into_vec();

	let total = MIN_FRAME_LEN as usize + payload.len();
	let mut w = ValueWriter::with_capacity(total);
	w.write_u32(total as u32)?;
	w.write_u8(frame.tag())?;
	w.write_bytes(&payload)?;
	Ok(w.into_vec())
}

/// Reads one complete frame.
///
/// The length prefix is validated before anything else is interpreted, and
/// the full announced byte count is buffered before the payload is decoded.
/// Any failure here means the frame boundary is lost, so callers must close
/// the connection and not reuse it.
pub fn read_frame(reader: &mut impl Read) -> Result<Frame> {
	let mut length_bytes = [0u8; 4];
	reader
		.read_exact(&mut length_bytes)
		.map_err(|e| anyhow!(ErrorKind::BadFrame).context(format!("short read on frame length: {e}")))?;
	let length = u32::from_le_bytes(length_bytes);
	if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&length) {
		return Err(anyhow!(ErrorKind::BadFrame).context(format!("frame length {length} out of bounds")));
	}

	let mut body = vec![0u8; length as usize - 4];
	reader
		.read_exact(&mut body)
		.map_err(|e| anyhow!(ErrorKind::BadFrame).context(format!("truncated frame: {e}")))?;

	Frame::from_payload(body[0], &body[1..])
		.map_err(|e| anyhow!(ErrorKind::BadFrame).context(format!("bad frame: {e:#}")))
}

/// Writes one complete frame. Atomic from the caller's point of view as long
/// as all writers of the underlying socket hold its send-lock.
pub fn write_frame(writer: &mut impl Write, frame: &Frame) -> Result<()> {
	let bytes = encode_frame(frame)?;
	writer.write_all(&bytes).context("failed to write frame")?;
	writer.flush().context("failed to flush frame")?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frame::{Init, Png, ReqEdge, SendEdge, Status, Tiff, TiffPayload};
	use pretty_assertions::assert_eq;
	use relievo_core::{
		ColorScheme, GLOBAL_JOB_ID, GeoBBox, JobStatus, Projection, Quadrant, UiState,
	};
	use std::io::Cursor;

	fn round_trip(frame: Frame) -> Frame {
		let bytes = encode_frame(&frame).unwrap();
		let decoded = read_frame(&mut Cursor::new(&bytes)).unwrap();
		assert_eq!(decoded, frame);
		// serialize → deserialize → serialize is byte-identical
		assert_eq!(encode_frame(&decoded).unwrap(), bytes);
		decoded
	}

	#[test]
	fn test_init_round_trip() {
		let scheme = ColorScheme::parse("Absolute\n0 1 2 3\n800 4 5 6\nW 9 9 9\n", true).unwrap();
		round_trip(Frame::Init(Init {
			scheme,
			worker_index: 3,
			relief: Some(Quadrant::NorthWest),
			projection: Projection::Mercator,
			scale: 0.5,
		}));
	}

	#[test]
	fn test_nodes_round_trip() {
		round_trip(Frame::Nodes(vec![
			"10.0.0.1".to_string(),
			"worker-two.example".to_string(),
		]));
		round_trip(Frame::Nodes(vec![]));
	}

	#[test]
	fn test_tiff_round_trip() {
		round_trip(Frame::Tiff(Tiff {
			job_id: 2,
			payload: TiffPayload::Data {
				name: "N10E020.tif".to_string(),
				bytes: vec![0x49, 0x49, 0x2A, 0x00, 0xFF],
			},
		}));
		round_trip(Frame::Tiff(Tiff {
			job_id: 3,
			payload: TiffPayload::Url("http://tiles.example/N10E021.tif".to_string()),
		}));
		round_trip(Frame::Tiff(Tiff {
			job_id: 0,
			payload: TiffPayload::Empty,
		}));
	}

	#[test]
	fn test_status_round_trip_and_layout() {
		let frame = Frame::Status(Status {
			status: JobStatus::Loaded,
			job_id: 7,
			sender_id: 1,
			bbox: GeoBBox::from_edges(11.0, 10.0, 20.0, 21.0),
		});
		let bytes = encode_frame(&frame).unwrap();
		// fixed layout: 4 length + 1 tag + 1 status + 2 job + 2 sender + 6 pad + 4 doubles
		assert_eq!(bytes.len(), 48);
		assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 48);
		assert_eq!(bytes[4], 0x04);
		assert_eq!(bytes[5], JobStatus::Loaded.code());
		assert_eq!(u16::from_le_bytes(bytes[6..8].try_into().unwrap()), 7);
		assert_eq!(f64::from_le_bytes(bytes[16..24].try_into().unwrap()), 11.0);
		round_trip(frame);
	}

	#[test]
	fn test_global_status_round_trip() {
		round_trip(Frame::Status(Status {
			status: JobStatus::Rendering,
			job_id: GLOBAL_JOB_ID,
			sender_id: 0,
			bbox: GeoBBox::from_edges(0.0, 0.0, 0.0, 0.0),
		}));
	}

	#[test]
	fn test_req_edge_layout() {
		let bytes = encode_frame(&Frame::ReqEdge(ReqEdge {
			quadrant: Quadrant::East,
			requesting_job_id: 0,
			requested_job_id: 1,
		}))
		.unwrap();
		assert_eq!(bytes.len(), 16);
		assert_eq!(bytes[4], 0x05);
		assert_eq!(bytes[5], Quadrant::East.code());
	}

	#[test]
	fn test_send_edge_round_trip() {
		round_trip(Frame::SendEdge(SendEdge {
			quadrant: Quadrant::South,
			requesting_job_id: 4,
			requested_job_id: 9,
			cells: vec![-9999, 0, 1, 8848],
		}));
	}

	#[test]
	fn test_send_edge_cell_count_must_match() {
		let mut bytes = encode_frame(&Frame::SendEdge(SendEdge {
			quadrant: Quadrant::South,
			requesting_job_id: 4,
			requested_job_id: 9,
			cells: vec![1, 2, 3],
		}))
		.unwrap();
		// corrupt the announced cell count
		bytes[10] = 99;
		assert!(read_frame(&mut Cursor::new(&bytes)).is_err());
	}

	#[test]
	fn test_min_max_round_trip() {
		let frame = round_trip(Frame::MinMax { min: -414, max: 8848 });
		assert_eq!(encode_frame(&frame).unwrap().len(), 16);
	}

	#[test]
	fn test_png_round_trip() {
		round_trip(Frame::Png(Png {
			job_id: 1,
			img_height: 1201,
			img_width: 1201,
			bbox: GeoBBox::from_edges(11.0, 10.0, 20.0, 21.0),
			bytes: vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3],
		}));
	}

	#[test]
	fn test_end_and_ui_round_trip() {
		round_trip(Frame::End);
		round_trip(Frame::UiUpdate {
			job_id: 12,
			state: UiState::Rendering,
		});
	}

	#[test]
	fn test_unknown_tag_is_bad_frame() {
		let mut bytes = encode_frame(&Frame::End).unwrap();
		bytes[4] = 0xFF;
		let err = read_frame(&mut Cursor::new(&bytes)).unwrap_err();
		assert_eq!(relievo_core::error::exit_code(&err), ErrorKind::BadFrame.exit_code());
	}

	#[test]
	fn test_truncated_frame_is_bad_frame() {
		let bytes = encode_frame(&Frame::MinMax { min: 0, max: 0 }).unwrap();
		let err = read_frame(&mut Cursor::new(&bytes[..bytes.len() - 2])).unwrap_err();
		assert_eq!(relievo_core::error::exit_code(&err), ErrorKind::BadFrame.exit_code());
	}

	#[test]
	fn test_length_overflow_is_bad_frame() {
		let mut bytes = encode_frame(&Frame::End).unwrap();
		bytes[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
		assert!(read_frame(&mut Cursor::new(&bytes)).is_err());

		let mut bytes = encode_frame(&Frame::End).unwrap();
		bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
		assert!(read_frame(&mut Cursor::new(&bytes)).is_err());
	}

	#[test]
	fn test_short_read_is_bad_frame() {
		assert!(read_frame(&mut Cursor::new(&[0x10u8, 0x00])).is_err());
	}
}
