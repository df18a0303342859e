// Incremental decoding.
//
// Every decoder first measures its frame with `expect_length`, which only
// looks at the buffer, and only then splits those bytes off. A frame that has
// not fully arrived therefore fails with NotComplete and leaves the buffer
// exactly as it was.

use crate::{
    BulkString, RespArray, RespDecode, RespError, RespFrame, RespNull, RespNullArray,
    RespNullBulkString, SimpleError, SimpleString,
};
use bytes::{Buf, BytesMut};

const CRLF: &[u8] = b"\r\n";

// Same ceilings as proto-max-bulk-len and proto-inline-max-size in redis.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;
const MAX_LINE_LEN: usize = 64 * 1024;

// Arrays nested deeper than this are rejected before any recursion past it.
const MAX_DEPTH: usize = 128;

/// The first line of a frame: `<prefix><body>\r\n`.
struct Line<'a> {
    body: &'a [u8],
    /// Bytes taken by the whole line, prefix and CRLF included.
    size: usize,
}

fn read_line<'a>(buf: &'a [u8], prefix: &str) -> Result<Line<'a>, RespError> {
    let Some(&first) = buf.first() else {
        return Err(RespError::NotComplete);
    };
    if !buf.starts_with(prefix.as_bytes()) {
        return Err(RespError::UnknownType(first));
    }
    // only the first MAX_LINE_LEN bytes can hold the terminator
    let window = &buf[..buf.len().min(MAX_LINE_LEN + CRLF.len())];
    let end = match window.windows(CRLF.len()).position(|w| w == CRLF) {
        Some(end) => end,
        None if window.len() == MAX_LINE_LEN + CRLF.len() => {
            return Err(RespError::InvalidLength(format!(
                "line longer than {} bytes",
                MAX_LINE_LEN
            )))
        }
        None => return Err(RespError::NotComplete),
    };
    Ok(Line {
        body: &buf[prefix.len()..end],
        size: end + CRLF.len(),
    })
}

fn parse_i64(body: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            RespError::InvalidLength(format!("{:?} is not an integer", String::from_utf8_lossy(body)))
        })
}

// `$-1` and `*-1` are nulls; any other negative count is an error.
fn read_count(line: &Line) -> Result<usize, RespError> {
    let n = parse_i64(line.body)?;
    usize::try_from(n).map_err(|_| RespError::InvalidLength(format!("negative length: {}", n)))
}

fn is_null_header(buf: &[u8], prefix: &str) -> Result<bool, RespError> {
    Ok(read_line(buf, prefix)?.body == b"-1")
}

fn null_length(buf: &[u8], prefix: &str, body: &[u8], what: &str) -> Result<usize, RespError> {
    let line = read_line(buf, prefix)?;
    if line.body != body {
        return Err(RespError::OutOfBounds(format!(
            "expected {}, got {:?}",
            what,
            String::from_utf8_lossy(line.body)
        )));
    }
    Ok(line.size)
}

fn line_text(frame: &[u8], prefix: &str) -> String {
    String::from_utf8_lossy(&frame[prefix.len()..frame.len() - CRLF.len()]).into_owned()
}

// NotComplete is a signal to read more, so it reaches the codec unwrapped.
fn at_index(index: usize) -> impl FnOnce(RespError) -> RespError {
    move |e| match e {
        e @ (RespError::NotComplete | RespError::TooDeep(_)) => e,
        e => RespError::Nested {
            index,
            source: Box::new(e),
        },
    }
}

impl RespDecode for RespFrame {
    const PREFIX: &'static str = "";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let frame: RespFrame = match buf.first() {
            None => return Err(RespError::NotComplete),
            Some(b'+') => SimpleString::decode(buf)?.into(),
            Some(b'-') => SimpleError::decode(buf)?.into(),
            Some(b':') => i64::decode(buf)?.into(),
            Some(b'_') => RespNull::decode(buf)?.into(),
            Some(b'$') if is_null_header(buf, "$")? => RespNullBulkString::decode(buf)?.into(),
            Some(b'$') => BulkString::decode(buf)?.into(),
            Some(b'*') if is_null_header(buf, "*")? => RespNullArray::decode(buf)?.into(),
            Some(b'*') => RespArray::decode(buf)?.into(),
            Some(&other) => return Err(RespError::UnknownType(other)),
        };
        Ok(frame)
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        frame_length(buf, 0)
    }
}

fn frame_length(buf: &[u8], depth: usize) -> Result<usize, RespError> {
    match buf.first() {
        None => Err(RespError::NotComplete),
        Some(b'+') => SimpleString::expect_length(buf),
        Some(b'-') => SimpleError::expect_length(buf),
        Some(b':') => i64::expect_length(buf),
        Some(b'_') => RespNull::expect_length(buf),
        Some(b'$') if is_null_header(buf, "$")? => RespNullBulkString::expect_length(buf),
        Some(b'$') => BulkString::expect_length(buf),
        Some(b'*') if is_null_header(buf, "*")? => RespNullArray::expect_length(buf),
        Some(b'*') => array_length(buf, depth),
        Some(&other) => Err(RespError::UnknownType(other)),
    }
}

fn array_length(buf: &[u8], depth: usize) -> Result<usize, RespError> {
    if depth >= MAX_DEPTH {
        return Err(RespError::TooDeep(MAX_DEPTH));
    }
    let line = read_line(buf, RespArray::PREFIX)?;
    let count = read_count(&line)?;

    let mut size = line.size;
    for index in 0..count {
        size += frame_length(&buf[size..], depth + 1).map_err(at_index(index))?;
    }
    Ok(size)
}

impl RespDecode for SimpleString {
    const PREFIX: &'static str = "+";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let size = Self::expect_length(buf)?;
        let frame = buf.split_to(size);
        Ok(SimpleString(line_text(&frame, Self::PREFIX)))
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        Ok(read_line(buf, Self::PREFIX)?.size)
    }
}

impl RespDecode for SimpleError {
    const PREFIX: &'static str = "-";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let size = Self::expect_length(buf)?;
        let frame = buf.split_to(size);
        Ok(SimpleError(line_text(&frame, Self::PREFIX)))
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        Ok(read_line(buf, Self::PREFIX)?.size)
    }
}

impl RespDecode for i64 {
    const PREFIX: &'static str = ":";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let line = read_line(buf, Self::PREFIX)?;
        let (n, size) = (parse_i64(line.body)?, line.size);
        buf.advance(size);
        Ok(n)
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        let line = read_line(buf, Self::PREFIX)?;
        parse_i64(line.body)?;
        Ok(line.size)
    }
}

impl RespDecode for RespNull {
    const PREFIX: &'static str = "_";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let size = Self::expect_length(buf)?;
        buf.advance(size);
        Ok(RespNull)
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        null_length(buf, Self::PREFIX, b"", "null")
    }
}

impl RespDecode for RespNullBulkString {
    const PREFIX: &'static str = "$";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let size = Self::expect_length(buf)?;
        buf.advance(size);
        Ok(RespNullBulkString)
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        null_length(buf, Self::PREFIX, b"-1", "null bulk string")
    }
}

impl RespDecode for RespNullArray {
    const PREFIX: &'static str = "*";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let size = Self::expect_length(buf)?;
        buf.advance(size);
        Ok(RespNullArray)
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        null_length(buf, Self::PREFIX, b"-1", "null array")
    }
}

impl RespDecode for BulkString {
    const PREFIX: &'static str = "$";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let header = read_line(buf, Self::PREFIX)?.size;
        let size = Self::expect_length(buf)?;
        let mut frame = buf.split_to(size);
        frame.advance(header);
        frame.truncate(frame.len() - CRLF.len());
        Ok(BulkString(frame.to_vec()))
    }

    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        let line = read_line(buf, Self::PREFIX)?;
        let len = read_count(&line)?;
        if len > MAX_BULK_LEN {
            return Err(RespError::InvalidLength(format!(
                "bulk length {} exceeds {}",
                len, MAX_BULK_LEN
            )));
        }

        let size = line.size + len + CRLF.len();
        if buf.len() < size {
            return Err(RespError::NotComplete);
        }
        if &buf[size - CRLF.len()..size] != CRLF {
            return Err(RespError::OutOfBounds(format!(
                "bulk string data is longer than declared length {}",
                len
            )));
        }
        Ok(size)
    }
}

impl RespDecode for RespArray {
    const PREFIX: &'static str = "*";

    fn decode(buf: &mut BytesMut) -> Result<Self, RespError> {
        let line = read_line(buf, Self::PREFIX)?;
        let (count, header) = (read_count(&line)?, line.size);
        let size = Self::expect_length(buf)?;

        let mut frame = buf.split_to(size);
        frame.advance(header);
        let frames = (0..count)
            .map(|index| RespFrame::decode(&mut frame).map_err(at_index(index)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RespArray(frames))
    }

    // Measuring first bounds the depth, so decoding the elements below
    // cannot recurse further than MAX_DEPTH either.
    fn expect_length(buf: &[u8]) -> Result<usize, RespError> {
        array_length(buf, 0)
    }
}
