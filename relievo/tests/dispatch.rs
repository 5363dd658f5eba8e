//! Dispatcher behavior against a scripted worker over real TCP.

use relievo::dispatch::{self, DispatchOptions};
use relievo_core::{ColorScheme, GeoBBox, JobStatus, Projection, UiState, progress::UiDrain};
use relievo_proto::{Conn, Frame, Png, Status, TiffPayload};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn options(port: u16) -> DispatchOptions {
	DispatchOptions {
		scheme: ColorScheme::parse("Absolute\n0 0 0 0\n1000 200 200 200\n", false).unwrap(),
		relief: None,
		projection: Projection::Equirectangular,
		scale: 1.0,
		primary_port: port,
	}
}

fn job_bbox(job_id: u16) -> GeoBBox {
	GeoBBox::from_edges(11.0, 10.0, 20.0 + f64::from(job_id), 21.0 + f64::from(job_id))
}

fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> String {
	let path = dir.join(name);
	std::fs::write(&path, bytes).unwrap();
	path.to_string_lossy().into_owned()
}

/// Speaks the worker side of the protocol: acknowledge every job, then
/// return one PNG per job (unless listed in `fail`), then wait for End.
fn scripted_worker(listener: TcpListener, fail: Vec<u16>) -> thread::JoinHandle<()> {
	thread::spawn(move || {
		let (stream, addr) = listener.accept().unwrap();
		let conn = Conn::from_stream(stream, addr.to_string());

		let Frame::Init(init) = conn.recv().unwrap() else {
			panic!("expected init");
		};
		assert_eq!(init.worker_index, 0);
		assert_eq!(init.scale, 1.0);
		assert!(init.scheme.absolute);
		let Frame::Nodes(nodes) = conn.recv().unwrap() else {
			panic!("expected nodes");
		};
		assert_eq!(nodes.len(), 1);

		let mut owned = Vec::new();
		loop {
			let Frame::Tiff(tiff) = conn.recv().unwrap() else {
				panic!("expected tiff");
			};
			match tiff.payload {
				TiffPayload::Empty => break,
				TiffPayload::Data { name, bytes } => {
					assert!(!name.is_empty());
					assert!(!bytes.is_empty());
					conn
						.send(&Frame::UiUpdate {
							job_id: tiff.job_id,
							state: UiState::Processing,
						})
						.unwrap();
					let (status, keep) = if fail.contains(&tiff.job_id) {
						(JobStatus::Lost, false)
					} else {
						(JobStatus::Loaded, true)
					};
					conn
						.send(&Frame::Status(Status {
							status,
							job_id: tiff.job_id,
							sender_id: 0,
							bbox: job_bbox(tiff.job_id),
						}))
						.unwrap();
					if keep {
						owned.push(tiff.job_id);
					}
				}
				TiffPayload::Url(url) => panic!("unexpected url source {url}"),
			}
		}

		for &job_id in &owned {
			conn
				.send(&Frame::UiUpdate {
					job_id,
					state: UiState::Rendering,
				})
				.unwrap();
			conn
				.send(&Frame::Png(Png {
					job_id,
					img_height: 3,
					img_width: 4,
					bbox: job_bbox(job_id),
					bytes: vec![0x89, b'P', b'N', b'G', job_id as u8],
				}))
				.unwrap();
			conn
				.send(&Frame::Status(Status {
					status: JobStatus::Complete,
					job_id,
					sender_id: 0,
					bbox: job_bbox(job_id),
				}))
				.unwrap();
		}

		loop {
			match conn.recv() {
				Ok(Frame::End) => break,
				Ok(_) => {}
				Err(_) => break,
			}
		}
	})
}

#[test]
fn test_dispatch_two_jobs_one_worker() {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	let worker = scripted_worker(listener, vec![]);

	let dir = tempfile::tempdir().unwrap();
	let sources = vec![
		write_source(dir.path(), "a.tif", &[1, 2, 3]),
		write_source(dir.path(), "b.tif", &[4, 5, 6, 7]),
	];
	let tiles = dispatch::run_distributed(
		&sources,
		&["127.0.0.1".to_string()],
		&options(port),
		&dir.path().join("tiles"),
		Arc::new(UiDrain),
	)
	.unwrap();
	worker.join().unwrap();

	assert_eq!(tiles.len(), 2);
	let mut job_ids: Vec<u16> = tiles.iter().map(|t| t.job_id).collect();
	job_ids.sort_unstable();
	assert_eq!(job_ids, vec![0, 1]);
	for tile in &tiles {
		assert_eq!((tile.width, tile.height), (4, 3));
		assert_eq!(tile.bbox, job_bbox(tile.job_id));
		let bytes = std::fs::read(&tile.path).unwrap();
		assert_eq!(bytes, vec![0x89, b'P', b'N', b'G', tile.job_id as u8]);
	}
}

#[test]
fn test_lost_job_does_not_block_completion() {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	let worker = scripted_worker(listener, vec![0]);

	let dir = tempfile::tempdir().unwrap();
	let sources = vec![
		write_source(dir.path(), "bad.tif", &[0xBA, 0xD0]),
		write_source(dir.path(), "good.tif", &[1, 1, 1]),
	];
	let tiles = dispatch::run_distributed(
		&sources,
		&["127.0.0.1".to_string()],
		&options(port),
		&dir.path().join("tiles"),
		Arc::new(UiDrain),
	)
	.unwrap();
	worker.join().unwrap();

	assert_eq!(tiles.len(), 1);
	assert_eq!(tiles[0].job_id, 1);
}

#[test]
fn test_missing_source_file_loses_the_worker() {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	// the worker will see the connection drop and exit on the recv error
	let worker = thread::spawn(move || {
		let (stream, addr) = listener.accept().unwrap();
		let conn = Conn::from_stream(stream, addr.to_string());
		while conn.recv().is_ok() {}
	});

	let dir = tempfile::tempdir().unwrap();
	let tiles = dispatch::run_distributed(
		&["/no/such/source.tif".to_string()],
		&["127.0.0.1".to_string()],
		&options(port),
		&dir.path().join("tiles"),
		Arc::new(UiDrain),
	)
	.unwrap();
	worker.join().unwrap();
	assert!(tiles.is_empty());
}
