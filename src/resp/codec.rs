// Frames a byte stream into RespFrames for tokio_util::codec::Framed / FramedRead.
// Both the connection handler and AOF replay read through this codec.

use crate::{RespDecode, RespEncode, RespError, RespFrame};
use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Default, Clone, Copy)]
pub struct RespFrameCodec;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("{0}")]
    Resp(#[from] RespError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// The stream ended with a partial frame still buffered.
    pub fn is_unexpected_end(&self) -> bool {
        matches!(self, CodecError::Resp(RespError::UnexpectedEnd))
    }
}

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = item.encode();
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RespFrame>, Self::Error> {
        match RespFrame::decode(src) {
            Ok(frame) => Ok(Some(frame)),
            Err(RespError::NotComplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RespFrame>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(RespError::UnexpectedEnd.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BulkString, SimpleString};
    use anyhow::Result;

    #[test]
    fn test_codec_waits_for_more_bytes() -> Result<()> {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&b"$5\r\nhel"[..]);
        assert!(codec.decode(&mut buf)?.is_none());

        buf.extend_from_slice(b"lo\r\n");
        let frame = codec.decode(&mut buf)?;
        assert_eq!(frame, Some(RespFrame::from(BulkString::new(b"hello".to_vec()))));
        Ok(())
    }

    #[test]
    fn test_codec_eof_mid_frame() {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n"[..]);
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(err.is_unexpected_end());
    }

    #[test]
    fn test_codec_eof_on_boundary() -> Result<()> {
        let mut codec = RespFrameCodec;
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf)?.is_none());
        Ok(())
    }

    #[test]
    fn test_codec_encode() -> Result<()> {
        let mut codec = RespFrameCodec;
        let mut dst = BytesMut::new();
        codec.encode(SimpleString::new("PONG").into(), &mut dst)?;
        assert_eq!(&dst[..], b"+PONG\r\n");
        Ok(())
    }
}
