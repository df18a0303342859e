use super::{CommandExecutor, Ping, RESP_PONG};
use crate::{cmd::CommandError, Backend, BulkString, RespFrame};

// PING            -> +PONG
// PING a b c      -> $5\r\na b c\r\n
impl CommandExecutor for Ping {
    fn execute(self, _backend: &Backend) -> RespFrame {
        match self.message {
            Some(message) => BulkString::new(message).into(),
            None => RESP_PONG.clone(),
        }
    }
}

impl TryFrom<Vec<RespFrame>> for Ping {
    type Error = CommandError;
    fn try_from(args: Vec<RespFrame>) -> Result<Self, Self::Error> {
        if args.is_empty() {
            return Ok(Ping { message: None });
        }

        let mut message = Vec::new();
        for (i, arg) in args.into_iter().enumerate() {
            let RespFrame::BulkString(part) = arg else {
                return Err(CommandError::InvalidArgument(
                    "Invalid PING argument".to_string(),
                ));
            };
            if i > 0 {
                message.push(b' ');
            }
            message.extend_from_slice(&part);
        }

        Ok(Ping {
            message: Some(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimpleError, SimpleString};
    use anyhow::Result;

    #[test]
    fn test_ping_without_args() -> Result<()> {
        let cmd = Ping::try_from(Vec::<RespFrame>::new())?;
        let ret = cmd.execute(&Backend::new());
        assert_eq!(ret, RespFrame::SimpleString(SimpleString::new("PONG")));
        Ok(())
    }

    #[test]
    fn test_ping_joins_args() -> Result<()> {
        let cmd = Ping::try_from(vec![RespFrame::from("hello"), RespFrame::from("world")])?;
        let ret = cmd.execute(&Backend::new());
        assert_eq!(ret, RespFrame::BulkString(BulkString::new("hello world")));

        let cmd = Ping::try_from(vec![RespFrame::from("")])?;
        let ret = cmd.execute(&Backend::new());
        assert_eq!(ret, RespFrame::BulkString(BulkString::new("")));
        Ok(())
    }

    #[test]
    fn test_ping_rejects_non_bulk_argument() {
        let ret = Ping::try_from(vec![RespFrame::from("hi"), RespFrame::Integer(3)]);
        let frame: RespFrame = ret.unwrap_err().into();
        assert_eq!(
            frame,
            RespFrame::Error(SimpleError::new("Invalid PING argument"))
        );
    }
}
