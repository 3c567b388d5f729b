// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A reference transport adapter: a 3-byte big-endian record mark in
//! front of each message, with the high bit of the first byte as a
//! close-connection flag. `Endpoint` never sees these bytes — a framer
//! strips them on the way in and re-adds them on the way out.

use std::io::{self, Read, Write};

use crate::error::Error;

const CLOSE_FLAG: u8 = 0x80;

/// Largest payload a 23-bit record-mark length field can carry.
pub const MAX_FRAME_LEN: usize = 0x7f_ffff;

/// Builds the 3-byte record mark for `payload_len`, with the close flag
/// set as requested.
fn encode_mark(payload_len: usize, close: bool) -> Result<[u8; 3], Error> {
    if payload_len > MAX_FRAME_LEN {
        return Err(Error::SchemaViolation(format!(
            "frame of {payload_len} bytes exceeds the 3-byte record mark's {MAX_FRAME_LEN}-byte limit"
        )));
    }
    let len = payload_len as u32;
    let mut mark = [
        ((len >> 16) & 0xff) as u8,
        ((len >> 8) & 0xff) as u8,
        (len & 0xff) as u8,
    ];
    if close {
        mark[0] |= CLOSE_FLAG;
    }
    Ok(mark)
}

/// Reads back `(payload_len, close)` from a 3-byte record mark.
fn decode_mark(mark: [u8; 3]) -> (usize, bool) {
    let close = mark[0] & CLOSE_FLAG != 0;
    let len = (((mark[0] & !CLOSE_FLAG) as usize) << 16)
        | ((mark[1] as usize) << 8)
        | mark[2] as usize;
    (len, close)
}

/// Reads exactly one length-prefixed frame from `stream`, returning its
/// payload and whether the close flag was set. `Ok(None)` on a clean EOF
/// before any bytes of the next frame arrive.
pub fn read_frame<S: Read>(stream: &mut S) -> io::Result<Option<(Vec<u8>, bool)>> {
    let mut mark = [0u8; 3];
    match stream.read_exact(&mut mark) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let (len, close) = decode_mark(mark);
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Ok(Some((payload, close)))
}

/// Writes one length-prefixed frame to `stream`.
pub fn write_frame<S: Write>(stream: &mut S, payload: &[u8], close: bool) -> Result<(), Error> {
    let mark = encode_mark(payload.len(), close)?;
    stream.write_all(&mark)?;
    stream.write_all(payload)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_roundtrips_length_and_close_flag() {
        let mark = encode_mark(12345, false).unwrap();
        assert_eq!(decode_mark(mark), (12345, false));
        let mark = encode_mark(0, true).unwrap();
        assert_eq!(decode_mark(mark), (0, true));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        assert!(encode_mark(MAX_FRAME_LEN + 1, false).is_err());
        assert!(encode_mark(MAX_FRAME_LEN, false).is_ok());
    }

    #[test]
    fn read_write_frame_over_a_socketpair_pipe() {
        let (mut a, mut b) = pipe::pipe().unwrap();
        write_frame(&mut a, b"hello", false).unwrap();
        let (payload, close) = read_frame(&mut b).unwrap().unwrap();
        assert_eq!(payload, b"hello");
        assert!(!close);
    }

    #[test]
    fn read_frame_reports_clean_eof() {
        let (a, mut b) = pipe::pipe().unwrap();
        drop(a);
        assert!(read_frame(&mut b).unwrap().is_none());
    }
}
