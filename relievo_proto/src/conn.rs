use crate::{Frame, codec};
use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use relievo_core::ErrorKind;
use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

/// A framed connection with send-side serialization.
///
/// Several threads may produce frames for the same socket (status updates,
/// edge replies, PNG returns); the send-lock guarantees each frame reaches
/// the wire in one piece. Frames are fully buffered *before* the lock is
/// taken, so the lock is never held across file reads or encoding work.
///
/// Reading is not locked: every connection has exactly one reader thread.
#[derive(Debug)]
pub struct Conn {
	stream: TcpStream,
	send_lock: Mutex<()>,
	peer: String,
}

impl Conn {
	/// Resolves `host` and connects to `port`, trying each resolved address
	/// in order.
	pub fn connect(host: &str, port: u16) -> Result<Conn> {
		let addrs: Vec<_> = (host, port)
			.to_socket_addrs()
			.map_err(|e| anyhow!(ErrorKind::ResolveFailure).context(format!("resolving {host}: {e}")))?
			.collect();

		for addr in &addrs {
			if let Ok(stream) = TcpStream::connect(addr) {
				log::debug!("connected to {host}:{port} at {addr}");
				return Ok(Conn::from_stream(stream, format!("{host}:{port}")));
			}
		}
		Err(anyhow!(ErrorKind::ConnectFailure).context(format!("connecting to {host}:{port}")))
	}

	/// Wraps an already-established stream (the accepting side).
	pub fn from_stream(stream: TcpStream, peer: String) -> Conn {
		Conn {
			stream,
			send_lock: Mutex::new(()),
			peer,
		}
	}

	pub fn peer(&self) -> &str {
		&self.peer
	}

	/// Sends one frame, atomically with respect to other senders.
	pub fn send(&self, frame: &Frame) -> Result<()> {
		let bytes = codec::encode_frame(frame)?;
		let _guard = self.send_lock.lock();
		(&self.stream)
			.write_all(&bytes)
			.with_context(|| format!("sending frame to {}", self.peer))?;
		Ok(())
	}

	/// Receives one frame. Must only be called from the connection's reader
	/// thread.
	pub fn recv(&self) -> Result<Frame> {
		codec::read_frame(&mut (&self.stream)).with_context(|| format!("receiving frame from {}", self.peer))
	}

	/// Closes both directions, forcing any blocked reader to exit.
	pub fn shutdown(&self) {
		let _ = self.stream.shutdown(Shutdown::Both);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;
	use std::sync::Arc;
	use std::thread;

	#[test]
	fn test_send_and_recv_over_tcp() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = thread::spawn(move || {
			let (stream, addr) = listener.accept().unwrap();
			let conn = Conn::from_stream(stream, addr.to_string());
			let frame = conn.recv().unwrap();
			conn.send(&frame).unwrap();
		});

		let conn = Conn::connect("127.0.0.1", port).unwrap();
		let sent = Frame::MinMax { min: -10, max: 99 };
		conn.send(&sent).unwrap();
		assert_eq!(conn.recv().unwrap(), sent);
		server.join().unwrap();
	}

	#[test]
	fn test_concurrent_senders_do_not_interleave() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let server = thread::spawn(move || {
			let (stream, addr) = listener.accept().unwrap();
			let conn = Conn::from_stream(stream, addr.to_string());
			let mut count = [0usize; 2];
			for _ in 0..40 {
				match conn.recv().unwrap() {
					Frame::MinMax { min: 0, max: 0 } => count[0] += 1,
					Frame::End => count[1] += 1,
					other => panic!("unexpected frame {other:?}"),
				}
			}
			assert_eq!(count, [20, 20]);
		});

		let conn = Arc::new(Conn::connect("127.0.0.1", port).unwrap());
		let mut senders = Vec::new();
		for variant in 0..2 {
			let conn = Arc::clone(&conn);
			senders.push(thread::spawn(move || {
				for _ in 0..20 {
					let frame = if variant == 0 {
						Frame::MinMax { min: 0, max: 0 }
					} else {
						Frame::End
					};
					conn.send(&frame).unwrap();
				}
			}));
		}
		for sender in senders {
			sender.join().unwrap();
		}
		server.join().unwrap();
	}

	#[test]
	fn test_connect_failure_kinds() {
		let err = Conn::connect("host.invalid.relievo", 1).unwrap_err();
		let code = relievo_core::error::exit_code(&err);
		// resolution may fail or resolve to nothing depending on the resolver
		assert!(code == ErrorKind::ResolveFailure.exit_code() || code == ErrorKind::ConnectFailure.exit_code());
	}
}
