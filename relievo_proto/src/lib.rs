//! Wire protocol of the relievo renderer.
//!
//! Every message on every socket is a *frame*: a 32-bit little-endian length
//! (counting the whole frame, length included), one type tag byte, and a
//! type-specific payload. The [`codec`] module never interprets a payload
//! before the announced byte count is fully buffered, and [`Conn`]
//! serializes concurrent frame producers on a socket with one send-lock.

mod codec;
mod conn;
mod frame;

pub use codec::{MAX_FRAME_LEN, encode_frame, read_frame, write_frame};
pub use conn::Conn;
pub use frame::{Frame, Init, Png, ReqEdge, SendEdge, Status, Tiff, TiffPayload, tag};
