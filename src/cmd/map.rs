use super::{extract_key, validate_arity, Arity, CommandExecutor, Del, Get, Set, RESP_OK};
use crate::{cmd::CommandError, Backend, RespFrame, RespNull};

impl CommandExecutor for Get {
    fn execute(self, backend: &Backend) -> RespFrame {
        match backend.get(&self.key) {
            Some(value) => value,
            None => RespFrame::Null(RespNull),
        }
    }
}

impl CommandExecutor for Set {
    fn execute(self, backend: &Backend) -> RespFrame {
        backend.set(self.key, self.value);
        RESP_OK.clone()
    }
}

impl CommandExecutor for Del {
    fn execute(self, backend: &Backend) -> RespFrame {
        let removed = self.keys.iter().filter(|key| backend.delete(key)).count();
        RespFrame::Integer(removed as i64)
    }
}

impl TryFrom<Vec<RespFrame>> for Get {
    type Error = CommandError;
    fn try_from(args: Vec<RespFrame>) -> Result<Self, Self::Error> {
        validate_arity(&args, "GET", Arity::Exactly(1))?;

        let mut args = args.into_iter();
        match args.next() {
            Some(key) => Ok(Get {
                key: extract_key(key)?,
            }),
            None => Err(CommandError::WrongArity("GET")),
        }
    }
}

impl TryFrom<Vec<RespFrame>> for Set {
    type Error = CommandError;
    fn try_from(args: Vec<RespFrame>) -> Result<Self, Self::Error> {
        validate_arity(&args, "SET", Arity::Exactly(2))?;

        let mut args = args.into_iter();
        match (args.next(), args.next()) {
            (Some(key), Some(value)) => Ok(Set {
                key: extract_key(key)?,
                value,
            }),
            _ => Err(CommandError::WrongArity("SET")),
        }
    }
}

impl TryFrom<Vec<RespFrame>> for Del {
    type Error = CommandError;
    fn try_from(args: Vec<RespFrame>) -> Result<Self, Self::Error> {
        validate_arity(&args, "DEL", Arity::AtLeast(1))?;

        let keys = args
            .into_iter()
            .map(extract_key)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Del { keys })
    }
}
