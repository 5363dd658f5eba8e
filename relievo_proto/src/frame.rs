use anyhow::{Context, Result, bail, ensure};
use relievo_core::{
	ColorScheme, ColorStop, GeoBBox, JobStatus, Projection, Quadrant, Rgb, UiState,
	io::{ValueReader, ValueWriter},
};

/// Frame type tags. The byte values are protocol-visible.
pub mod tag {
	pub const INIT: u8 = 0x01;
	pub const NODES: u8 = 0x02;
	pub const TIFF: u8 = 0x03;
	pub const STATUS_CHANGE: u8 = 0x04;
	pub const REQ_EDGE: u8 = 0x05;
	pub const SEND_EDGE: u8 = 0x06;
	pub const MIN_MAX: u8 = 0x07;
	pub const PNG: u8 = 0x08;
	pub const END: u8 = 0x09;
	pub const UI_UPDATE: u8 = 0x10;
}

/// Tiff frame contents marker: raw file bytes follow.
const PACKET_HAS_DATA: u8 = 0x01;
/// Tiff frame contents marker: the name is a URL the worker fetches itself.
const PACKET_HAS_URL: u8 = 0x02;
/// Tiff frame contents marker: the job stream is over.
const PACKET_IS_EMPTY: u8 = 0x03;

/// Primary → worker session setup: color scheme, render options and the
/// worker's own index into the node list.
#[derive(Debug, Clone, PartialEq)]
pub struct Init {
	pub scheme: ColorScheme,
	pub worker_index: u8,
	pub relief: Option<Quadrant>,
	pub projection: Projection,
	pub scale: f64,
}

/// Primary → worker job transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tiff {
	pub job_id: u16,
	pub payload: TiffPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TiffPayload {
	/// The GeoTIFF travels inside the frame.
	Data { name: String, bytes: Vec<u8> },
	/// The worker downloads the GeoTIFF itself.
	Url(String),
	/// No more jobs; the worker may move on to the exchange phase.
	Empty,
}

/// A job or worker state announcement. `job_id` equal to
/// [`relievo_core::GLOBAL_JOB_ID`] marks a worker-global update.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
	pub status: JobStatus,
	pub job_id: u16,
	pub sender_id: u16,
	pub bbox: GeoBBox,
}

/// Request for one halo slice of a remote tile. The quadrant names the slice
/// of the *owner* tile; the reply lands in the mirror quadrant of the
/// requesting tile's halo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReqEdge {
	pub quadrant: Quadrant,
	pub requesting_job_id: u16,
	pub requested_job_id: u16,
}

/// Reply to [`ReqEdge`], carrying the elevation cells of the slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEdge {
	pub quadrant: Quadrant,
	pub requesting_job_id: u16,
	pub requested_job_id: u16,
	pub cells: Vec<i16>,
}

/// A rendered tile returned to the primary.
#[derive(Debug, Clone, PartialEq)]
pub struct Png {
	pub job_id: u16,
	pub img_height: u32,
	pub img_width: u32,
	pub bbox: GeoBBox,
	pub bytes: Vec<u8>,
}

/// One frame of the wire protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
	Init(Init),
	Nodes(Vec<String>),
	Tiff(Tiff),
	Status(Status),
	ReqEdge(ReqEdge),
	SendEdge(SendEdge),
	MinMax { min: i32, max: i32 },
	Png(Png),
	End,
	UiUpdate { job_id: u16, state: UiState },
}

impl Frame {
	pub fn tag(&self) -> u8 {
		match self {
			Frame::Init(_) => tag::INIT,
			Frame::Nodes(_) => tag::NODES,
			Frame::Tiff(_) => tag::TIFF,
			Frame::Status(_) => tag::STATUS_CHANGE,
			Frame::ReqEdge(_) => tag::REQ_EDGE,
			Frame::SendEdge(_) => tag::SEND_EDGE,
			Frame::MinMax { .. } => tag::MIN_MAX,
			Frame::Png(_) => tag::PNG,
			Frame::End => tag::END,
			Frame::UiUpdate { .. } => tag::UI_UPDATE,
		}
	}

	/// Serializes the payload that follows the length prefix and type tag.
	pub fn write_payload(&self, w: &mut ValueWriter) -> Result<()> {
		match self {
			Frame::Init(init) => {
				let scheme = &init.scheme;
				ensure!(!scheme.stops().is_empty(), "color scheme has no stops");
				w.write_u8(u8::from(scheme.absolute))?;
				w.write_u8(u8::from(scheme.show_water))?;
				w.write_u8(scheme.stops().len() as u8)?;
				w.write_u8(init.worker_index)?;
				w.write_u8(init.relief.map_or(0, Quadrant::code))?;
				w.write_u8(init.projection.code())?;
				w.write_pad(5)?;
				w.write_f64(init.scale)?;
				if scheme.show_water {
					let water = scheme.water.as_ref().context("show_water set but no water color")?;
					write_color_record(w, water)?;
				}
				for stop in scheme.stops() {
					write_color_record(w, stop)?;
				}
			}
			Frame::Nodes(nodes) => {
				w.write_pad(1)?;
				w.write_u16(nodes.len() as u16)?;
				for node in nodes {
					w.write_u16(node.len() as u16)?;
					w.write_bytes(node.as_bytes())?;
				}
			}
			Frame::Tiff(tiff) => {
				let (contents, name, bytes): (u8, &str, &[u8]) = match &tiff.payload {
					TiffPayload::Data { name, bytes } => (PACKET_HAS_DATA, name, bytes),
					TiffPayload::Url(url) => (PACKET_HAS_URL, url, &[]),
					TiffPayload::Empty => (PACKET_IS_EMPTY, "", &[]),
				};
				w.write_u8(contents)?;
				w.write_u16(name.len() as u16)?;
				w.write_u32(bytes.len() as u32)?;
				w.write_u16(tiff.job_id)?;
				w.write_pad(2)?;
				w.write_bytes(name.as_bytes())?;
				w.write_bytes(bytes)?;
			}
			Frame::Status(status) => {
				w.write_u8(status.status.code())?;
				w.write_u16(status.job_id)?;
				w.write_u16(status.sender_id)?;
				w.write_pad(6)?;
				write_bbox(w, &status.bbox)?;
			}
			Frame::ReqEdge(req) => {
				w.write_u8(req.quadrant.code())?;
				w.write_u16(req.requesting_job_id)?;
				w.write_u16(req.requested_job_id)?;
				w.write_pad(6)?;
			}
			Frame::SendEdge(send) => {
				w.write_u8(send.quadrant.code())?;
				w.write_u16(send.requesting_job_id)?;
				w.write_u16(send.requested_job_id)?;
				w.write_u32(send.cells.len() as u32)?;
				w.write_pad(2)?;
				for cell in &send.cells {
					w.write_i16(*cell)?;
				}
			}
			Frame::MinMax { min, max } => {
				w.write_pad(3)?;
				w.write_i32(*min)?;
				w.write_i32(*max)?;
			}
			Frame::Png(png) => {
				w.write_u16(png.job_id)?;
				w.write_pad(1)?;
				w.write_u32(png.img_height)?;
				w.write_u32(png.img_width)?;
				write_bbox(w, &png.bbox)?;
				w.write_bytes(&png.bytes)?;
			}
			Frame::End => {}
			Frame::UiUpdate { job_id, state } => {
				w.write_u8(state.code())?;
				w.write_u16(*job_id)?;
			}
		}
		Ok(())
	}

	/// Deserializes a payload. The framing layer guarantees that `payload`
	/// holds the complete announced byte count.
	pub fn from_payload(frame_tag: u8, payload: &[u8]) -> Result<Frame> {
		let mut r = ValueReader::new(payload);
		Ok(match frame_tag {
			tag::INIT => {
				let absolute = r.read_u8()? != 0;
				let show_water = r.read_u8()? != 0;
				let num_colors = r.read_u8()?;
				let worker_index = r.read_u8()?;
				let relief = match r.read_u8()? {
					0 => None,
					code => Some(Quadrant::from_code(code)?),
				};
				let projection = Projection::from_code(r.read_u8()?)?;
				r.skip(5)?;
				let scale = r.read_f64()?;
				let water = if show_water {
					Some(read_color_record(&mut r)?)
				} else {
					None
				};
				let mut stops = Vec::with_capacity(num_colors as usize);
				for _ in 0..num_colors {
					stops.push(read_color_record(&mut r)?);
				}
				Frame::Init(Init {
					scheme: ColorScheme::from_parts(absolute, show_water, stops, water)?,
					worker_index,
					relief,
					projection,
					scale,
				})
			}
			tag::NODES => {
				r.skip(1)?;
				let num_nodes = r.read_u16()?;
				let mut nodes = Vec::with_capacity(num_nodes as usize);
				for _ in 0..num_nodes {
					let length = r.read_u16()?;
					nodes.push(r.read_string(length as usize)?);
				}
				Frame::Nodes(nodes)
			}
			tag::TIFF => {
				let contents = r.read_u8()?;
				let name_length = r.read_u16()?;
				let file_size = r.read_u32()?;
				let job_id = r.read_u16()?;
				r.skip(2)?;
				let name = r.read_string(name_length as usize)?;
				let payload = match contents {
					PACKET_HAS_DATA => TiffPayload::Data {
						name,
						bytes: r.read_bytes(file_size as usize)?,
					},
					PACKET_HAS_URL => TiffPayload::Url(name),
					PACKET_IS_EMPTY => TiffPayload::Empty,
					other => bail!("unknown tiff contents marker {other}"),
				};
				Frame::Tiff(Tiff { job_id, payload })
			}
			tag::STATUS_CHANGE => {
				let status = JobStatus::from_code(r.read_u8()?)?;
				let job_id = r.read_u16()?;
				let sender_id = r.read_u16()?;
				r.skip(6)?;
				Frame::Status(Status {
					status,
					job_id,
					sender_id,
					bbox: read_bbox(&mut r)?,
				})
			}
			tag::REQ_EDGE => {
				let quadrant = Quadrant::from_code(r.read_u8()?)?;
				let requesting_job_id = r.read_u16()?;
				let requested_job_id = r.read_u16()?;
				Frame::ReqEdge(ReqEdge {
					quadrant,
					requesting_job_id,
					requested_job_id,
				})
			}
			tag::SEND_EDGE => {
				let quadrant = Quadrant::from_code(r.read_u8()?)?;
				let requesting_job_id = r.read_u16()?;
				let requested_job_id = r.read_u16()?;
				let data_cells = r.read_u32()?;
				r.skip(2)?;
				ensure!(
					u64::from(data_cells) * 2 == r.remaining(),
					"send-edge announces {data_cells} cells but carries {} bytes",
					r.remaining()
				);
				let mut cells = Vec::with_capacity(data_cells as usize);
				for _ in 0..data_cells {
					cells.push(r.read_i16()?);
				}
				Frame::SendEdge(SendEdge {
					quadrant,
					requesting_job_id,
					requested_job_id,
					cells,
				})
			}
			tag::MIN_MAX => {
				r.skip(3)?;
				Frame::MinMax {
					min: r.read_i32()?,
					max: r.read_i32()?,
				}
			}
			tag::PNG => {
				let job_id = r.read_u16()?;
				r.skip(1)?;
				let img_height = r.read_u32()?;
				let img_width = r.read_u32()?;
				let bbox = read_bbox(&mut r)?;
				Frame::Png(Png {
					job_id,
					img_height,
					img_width,
					bbox,
					bytes: r.read_rest(),
				})
			}
			tag::END => Frame::End,
			tag::UI_UPDATE => {
				let state = UiState::from_code(r.read_u8()?)?;
				Frame::UiUpdate {
					job_id: r.read_u16()?,
					state,
				}
			}
			other => bail!("unknown frame type 0x{other:02X}"),
		})
	}
}

fn write_color_record(w: &mut ValueWriter, stop: &ColorStop) -> Result<()> {
	w.write_i32(stop.elevation)?;
	w.write_u8(stop.color.r)?;
	w.write_u8(stop.color.g)?;
	w.write_u8(stop.color.b)?;
	w.write_pad(1)?;
	w.write_f64(stop.alpha)
}

fn read_color_record(r: &mut ValueReader) -> Result<ColorStop> {
	let elevation = r.read_i32()?;
	let color = Rgb {
		r: r.read_u8()?,
		g: r.read_u8()?,
		b: r.read_u8()?,
	};
	r.skip(1)?;
	Ok(ColorStop {
		elevation,
		color,
		alpha: r.read_f64()?,
	})
}

// Wire order is top, bottom, left, right.
fn write_bbox(w: &mut ValueWriter, bbox: &GeoBBox) -> Result<()> {
	w.write_f64(bbox.north)?;
	w.write_f64(bbox.south)?;
	w.write_f64(bbox.west)?;
	w.write_f64(bbox.east)
}

fn read_bbox(r: &mut ValueReader) -> Result<GeoBBox> {
	let top = r.read_f64()?;
	let bottom = r.read_f64()?;
	let left = r.read_f64()?;
	let right = r.read_f64()?;
	Ok(GeoBBox::from_edges(top, bottom, left, right))
}
