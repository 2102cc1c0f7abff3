//! Length-prefixed framing shared by the UDP sink and the command server
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ UTF-8 JSON               │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! - **Oversized frame**: rejected, the connection is closed by the caller
//! - **Read timeout**: not an error; [`FrameReader`] keeps the partial frame

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// Length prefix size
pub const LENGTH_PREFIX: usize = 4;

/// Append one frame (`len || payload`) to `buffer`
pub fn encode_frame(payload: &[u8], buffer: &mut Vec<u8>) {
    buffer.clear();
    buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buffer.extend_from_slice(payload);
}

/// Write one frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let mut frame = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    encode_frame(payload, &mut frame);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Incremental reader for length-prefixed frames
///
/// Bytes received before a read timeout are kept, so a frame split across
/// several timed-out reads is reassembled instead of being lost.
pub struct FrameReader {
    buffer: Vec<u8>,
    filled: usize,
    max_len: usize,
}

impl FrameReader {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: vec![0; LENGTH_PREFIX],
            filled: 0,
            max_len,
        }
    }

    /// Bytes already received toward the next frame
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Continue reading the current frame
    ///
    /// Returns `Ok(Some(payload))` once the whole frame has arrived and
    /// `Ok(None)` if the read timed out first, so the caller can check its
    /// shutdown flag and call again. End of stream is
    /// `io::ErrorKind::UnexpectedEof`.
    pub fn read_frame<R: Read>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        loop {
            let end = if self.filled < LENGTH_PREFIX {
                LENGTH_PREFIX
            } else {
                let len = self.declared_len();
                if len > self.max_len {
                    self.filled = 0;
                    return Err(Error::CommandValidation(format!(
                        "frame of {} bytes exceeds {} byte limit",
                        len, self.max_len
                    )));
                }
                let total = LENGTH_PREFIX + len;
                if self.buffer.len() < total {
                    self.buffer.resize(total, 0);
                }
                if self.filled == total {
                    self.filled = 0;
                    return Ok(Some(&self.buffer[LENGTH_PREFIX..total]));
                }
                total
            };

            match reader.read(&mut self.buffer[self.filled..end]) {
                Ok(0) => return Err(Error::Io(io::ErrorKind::UnexpectedEof.into())),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn declared_len(&self) -> usize {
        let prefix = [self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]];
        u32::from_be_bytes(prefix) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Hands out scripted chunks; `None` is a read timeout
    struct Chunked(VecDeque<Option<Vec<u8>>>);

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Some(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.0.push_front(Some(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(None) => Err(io::ErrorKind::WouldBlock.into()),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_frame_layout() {
        let mut buf = Vec::new();
        encode_frame(b"{}", &mut buf);
        assert_eq!(buf, vec![0, 0, 0, 2, b'{', b'}']);
    }

    #[test]
    fn test_read_back_written_frames() {
        let mut out = Vec::new();
        write_frame(&mut out, br#"{"method":"haltApplication"}"#).unwrap();
        write_frame(&mut out, b"").unwrap();
        write_frame(&mut out, b"[]").unwrap();

        let mut cursor = Cursor::new(out);
        let mut frames = FrameReader::new(1024);
        assert_eq!(
            frames.read_frame(&mut cursor).unwrap(),
            Some(&br#"{"method":"haltApplication"}"#[..])
        );
        assert_eq!(frames.read_frame(&mut cursor).unwrap(), Some(&b""[..]));
        assert_eq!(frames.read_frame(&mut cursor).unwrap(), Some(&b"[]"[..]));
    }

    #[test]
    fn test_timeout_inside_prefix_keeps_progress() {
        let mut reader = Chunked(VecDeque::from([
            Some(vec![0, 0]),
            None,
            Some(vec![0, 3, b'a']),
            None,
            Some(vec![b'b', b'c']),
        ]));
        let mut frames = FrameReader::new(1024);

        assert_eq!(frames.read_frame(&mut reader).unwrap(), None);
        assert_eq!(frames.pending(), 2);
        assert_eq!(frames.read_frame(&mut reader).unwrap(), None);
        assert_eq!(frames.pending(), 5);
        assert_eq!(frames.read_frame(&mut reader).unwrap(), Some(&b"abc"[..]));
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut cursor = Cursor::new(vec![0, 1, 0, 1]);
        let mut frames = FrameReader::new(64 * 1024);
        let err = frames.read_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::CommandValidation(_)));
    }

    #[test]
    fn test_truncated_frame_is_eof() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 8, b'{']);
        let mut frames = FrameReader::new(1024);
        match frames.read_frame(&mut cursor) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
