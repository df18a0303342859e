// Parsing and execution of client commands.
// A request is an array whose first element names the command; the remaining
// elements are handed to the command's TryFrom impl, which checks arity and
// argument types before anything touches the backend.

mod engine;
mod map;
mod ping;

use crate::{Backend, BulkString, RespArray, RespFrame, SimpleError, SimpleString};
use enum_dispatch::enum_dispatch;
use lazy_static::lazy_static;
use thiserror::Error;

pub use engine::{Engine, Execution};

lazy_static! {
    static ref RESP_OK: RespFrame = SimpleString::new("OK").into();
    static ref RESP_PONG: RespFrame = SimpleString::new("PONG").into();
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    // the name is kept for logging, the client only sees the fixed message
    #[error("unknown command")]
    UnknownCommand(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<CommandError> for RespFrame {
    fn from(e: CommandError) -> Self {
        SimpleError::new(e.to_string()).into()
    }
}

#[enum_dispatch]
pub trait CommandExecutor {
    fn execute(self, backend: &Backend) -> RespFrame;
}

#[enum_dispatch(CommandExecutor)]
#[derive(Debug)]
pub enum Command {
    Ping(Ping),
    Get(Get),
    Set(Set),
    Del(Del),
}

#[derive(Debug)]
pub struct Ping {
    message: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct Get {
    key: String,
}

#[derive(Debug)]
pub struct Set {
    key: String,
    value: RespFrame,
}

#[derive(Debug)]
pub struct Del {
    keys: Vec<String>,
}

impl Command {
    /// Resolves `name` (case-insensitive) and validates `args` for that command.
    pub fn parse(name: &[u8], args: Vec<RespFrame>) -> Result<Self, CommandError> {
        match name.to_ascii_lowercase().as_slice() {
            b"ping" => Ok(Ping::try_from(args)?.into()),
            b"get" => Ok(Get::try_from(args)?.into()),
            b"set" => Ok(Set::try_from(args)?.into()),
            b"del" => Ok(Del::try_from(args)?.into()),
            _ => Err(CommandError::UnknownCommand(
                String::from_utf8_lossy(name).into_owned(),
            )),
        }
    }

    /// Commands that mutate the backend and therefore belong in the AOF.
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set(_) | Command::Del(_))
    }
}

// Mirrors Command::is_write before the request is consumed by parsing.
pub(crate) fn is_write_request(request: &RespArray) -> bool {
    match request.first() {
        Some(RespFrame::BulkString(name)) => {
            matches!(name.to_ascii_lowercase().as_slice(), b"set" | b"del")
        }
        _ => false,
    }
}

impl TryFrom<RespArray> for Command {
    type Error = CommandError;
    fn try_from(v: RespArray) -> Result<Self, Self::Error> {
        let (name, args) = split_request(v)?;
        Command::parse(&name, args)
    }
}

pub(crate) fn split_request(v: RespArray) -> Result<(BulkString, Vec<RespFrame>), CommandError> {
    let mut frames = v.into_inner().into_iter();
    match frames.next() {
        Some(RespFrame::BulkString(name)) => Ok((name, frames.collect())),
        Some(_) => Err(CommandError::InvalidRequest(
            "command name must be a bulk string".to_string(),
        )),
        None => Err(CommandError::InvalidRequest("empty command".to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

fn validate_arity(
    args: &[RespFrame],
    name: &'static str,
    arity: Arity,
) -> Result<(), CommandError> {
    let ok = match arity {
        Arity::Exactly(n) => args.len() == n,
        Arity::AtLeast(n) => args.len() >= n,
    };
    if ok {
        Ok(())
    } else {
        Err(CommandError::WrongArity(name))
    }
}

fn extract_key(frame: RespFrame) -> Result<String, CommandError> {
    match frame {
        RespFrame::BulkString(key) => String::from_utf8(key.into_inner())
            .map_err(|_| CommandError::InvalidArgument("invalid key".to_string())),
        _ => Err(CommandError::InvalidArgument("invalid key".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RespDecode, RespNull};
    use anyhow::Result;
    use bytes::BytesMut;

    #[test]
    fn test_command() -> Result<()> {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"*2\r\n$3\r\nget\r\n$5\r\nhello\r\n");

        let frame = RespArray::decode(&mut buf)?;
        let cmd: Command = frame.try_into()?;

        let backend = Backend::new();

        let ret = cmd.execute(&backend);
        assert_eq!(ret, RespFrame::Null(RespNull));

        Ok(())
    }

    #[test]
    fn test_command_name_is_case_insensitive() -> Result<()> {
        for name in ["GET", "get", "GeT"] {
            let cmd = Command::parse(name.as_bytes(), vec![RespFrame::from("k")])?;
            assert!(matches!(cmd, Command::Get(_)));
        }
        Ok(())
    }

    #[test]
    fn test_unknown_command() {
        let ret = Command::parse(b"flushall", vec![]);
        assert_eq!(
            ret.unwrap_err(),
            CommandError::UnknownCommand("flushall".to_string())
        );
        let frame: RespFrame = CommandError::UnknownCommand("flushall".to_string()).into();
        assert_eq!(frame, RespFrame::Error(SimpleError::new("unknown command")));
    }

    #[test]
    fn test_request_shape() {
        let ret = Command::try_from(RespArray::new(Vec::<RespFrame>::new()));
        assert!(matches!(ret, Err(CommandError::InvalidRequest(_))));

        let ret = Command::try_from(RespArray::new(vec![RespFrame::Integer(1)]));
        assert!(matches!(ret, Err(CommandError::InvalidRequest(_))));
    }

    #[test]
    fn test_is_write() -> Result<()> {
        let set = Command::parse(b"SET", vec!["k".into(), "v".into()])?;
        let del = Command::parse(b"del", vec!["k".into()])?;
        let get = Command::parse(b"get", vec!["k".into()])?;
        let ping = Command::parse(b"ping", vec![])?;
        assert!(set.is_write());
        assert!(del.is_write());
        assert!(!get.is_write());
        assert!(!ping.is_write());

        assert!(is_write_request(&RespArray::new(vec![RespFrame::from("Set")])));
        assert!(!is_write_request(&RespArray::new(vec![RespFrame::from("get")])));
        Ok(())
    }

    #[test]
    fn test_arity_error_message() {
        let frame: RespFrame = CommandError::WrongArity("GET").into();
        assert_eq!(
            frame,
            RespFrame::Error(SimpleError::new("wrong number of arguments for 'GET'"))
        );
    }
}
