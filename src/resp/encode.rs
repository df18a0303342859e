// Wire encoding. Every frame is a one-byte type prefix followed by a CRLF
// terminated line; bulk strings and arrays put their length on that line and
// append a payload.

use crate::{
    BulkString, RespArray, RespEncode, RespNull, RespNullArray, RespNullBulkString, SimpleError,
    SimpleString,
};

// worst case request arrays are small; bulk strings size themselves
const ARRAY_BUF_CAP: usize = 256;

fn line(prefix: u8, body: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 3);
    buf.push(prefix);
    buf.extend_from_slice(body.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

fn push_header(buf: &mut Vec<u8>, prefix: u8, len: usize) {
    buf.push(prefix);
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
}

impl RespEncode for SimpleString {
    fn encode(self) -> Vec<u8> {
        line(b'+', &self.0)
    }
}

impl RespEncode for SimpleError {
    fn encode(self) -> Vec<u8> {
        line(b'-', &self.0)
    }
}

// ":-5\r\n", never ":+5\r\n"
impl RespEncode for i64 {
    fn encode(self) -> Vec<u8> {
        line(b':', &self.to_string())
    }
}

impl RespEncode for BulkString {
    fn encode(self) -> Vec<u8> {
        let payload = self.into_inner();
        let mut buf = Vec::with_capacity(payload.len() + 24);
        push_header(&mut buf, b'$', payload.len());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl RespEncode for RespNullBulkString {
    fn encode(self) -> Vec<u8> {
        b"$-1\r\n".to_vec()
    }
}

impl RespEncode for RespArray {
    fn encode(self) -> Vec<u8> {
        let frames = self.into_inner();
        let mut buf = Vec::with_capacity(ARRAY_BUF_CAP);
        push_header(&mut buf, b'*', frames.len());
        for frame in frames {
            buf.append(&mut frame.encode());
        }
        buf
    }
}

impl RespEncode for RespNullArray {
    fn encode(self) -> Vec<u8> {
        b"*-1\r\n".to_vec()
    }
}

impl RespEncode for RespNull {
    fn encode(self) -> Vec<u8> {
        b"_\r\n".to_vec()
    }
}
