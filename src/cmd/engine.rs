use super::{is_write_request, Command, CommandError, CommandExecutor};
use crate::{Backend, RespFrame};
use tracing::debug;

/// Owns the keyspace and runs commands against it.
///
/// The engine never does I/O. Logging a write to the AOF is left to the caller,
/// which learns about it through [`Execution::record`].
#[derive(Debug, Clone, Default)]
pub struct Engine {
    backend: Backend,
}

/// Result of running one client request.
#[derive(Debug)]
pub struct Execution {
    pub response: RespFrame,
    /// The request as received, present only for a write that was accepted.
    pub record: Option<RespFrame>,
}

impl Execution {
    fn rejected(e: CommandError) -> Self {
        debug!("Rejected request: {}", e);
        Execution {
            response: e.into(),
            record: None,
        }
    }
}

impl Engine {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Runs command `name` with `args`; errors come back as error frames.
    pub fn dispatch(&self, name: &[u8], args: Vec<RespFrame>) -> RespFrame {
        self.try_dispatch(name, args).unwrap_or_else(RespFrame::from)
    }

    pub fn try_dispatch(&self, name: &[u8], args: Vec<RespFrame>) -> Result<RespFrame, CommandError> {
        let cmd = Command::parse(name, args)?;
        debug!("Executing command: {:?}", cmd);
        Ok(cmd.execute(&self.backend))
    }

    /// Runs a whole decoded request frame.
    pub fn execute(&self, frame: RespFrame) -> Execution {
        let request = match frame {
            RespFrame::Array(request) => request,
            other => {
                return Execution::rejected(CommandError::InvalidRequest(format!(
                    "expected an array of bulk strings, got {}",
                    frame_kind(&other)
                )))
            }
        };

        let record = is_write_request(&request).then(|| request.clone());
        match Command::try_from(request) {
            Ok(cmd) => {
                debug!("Executing command: {:?}", cmd);
                let write = cmd.is_write();
                let response = cmd.execute(&self.backend);
                Execution {
                    response,
                    record: record.filter(|_| write).map(RespFrame::from),
                }
            }
            Err(e) => Execution::rejected(e),
        }
    }
}

fn frame_kind(frame: &RespFrame) -> &'static str {
    match frame {
        RespFrame::SimpleString(_) => "simple string",
        RespFrame::Error(_) => "error",
        RespFrame::Integer(_) => "integer",
        RespFrame::BulkString(_) => "bulk string",
        RespFrame::NullBulkString(_) => "null bulk string",
        RespFrame::Array(_) => "array",
        RespFrame::NullArray(_) => "null array",
        RespFrame::Null(_) => "null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BulkString, RespArray, RespNull, SimpleError, SimpleString};

    fn request(parts: &[&str]) -> RespFrame {
        RespArray::new(
            parts
                .iter()
                .map(|p| RespFrame::from(*p))
                .collect::<Vec<_>>(),
        )
        .into()
    }

    fn args(parts: &[&str]) -> Vec<RespFrame> {
        parts.iter().map(|p| RespFrame::from(*p)).collect()
    }

    fn error(msg: &str) -> RespFrame {
        RespFrame::Error(SimpleError::new(msg))
    }

    #[test]
    fn test_dispatch_set_then_get() {
        let engine = Engine::default();
        assert_eq!(
            engine.dispatch(b"SET", args(&["k", "v"])),
            RespFrame::SimpleString(SimpleString::new("OK"))
        );
        assert_eq!(
            engine.dispatch(b"get", args(&["k"])),
            RespFrame::BulkString(BulkString::new("v"))
        );
        assert_eq!(
            engine.dispatch(b"GET", args(&["missing"])),
            RespFrame::Null(RespNull)
        );
    }

    #[test]
    fn test_dispatch_del_counts_removed_keys() {
        let engine = Engine::default();
        engine.dispatch(b"SET", args(&["a", "1"]));
        assert_eq!(engine.dispatch(b"DEL", args(&["a", "b"])), RespFrame::Integer(1));
        assert_eq!(engine.dispatch(b"DEL", args(&["a", "b"])), RespFrame::Integer(0));
    }

    #[test]
    fn test_dispatch_arity_errors_leave_keyspace_alone() {
        let engine = Engine::default();
        engine.dispatch(b"SET", args(&["k", "v"]));

        assert_eq!(
            engine.dispatch(b"GET", args(&[])),
            error("wrong number of arguments for 'GET'")
        );
        assert_eq!(
            engine.dispatch(b"SET", args(&["k"])),
            error("wrong number of arguments for 'SET'")
        );
        assert_eq!(
            engine.dispatch(b"SET", args(&["k", "v2", "extra"])),
            error("wrong number of arguments for 'SET'")
        );
        assert_eq!(
            engine.dispatch(b"DEL", args(&[])),
            error("wrong number of arguments for 'DEL'")
        );

        assert_eq!(engine.backend().len(), 1);
        assert_eq!(
            engine.backend().get("k"),
            Some(RespFrame::BulkString(BulkString::new("v")))
        );
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let engine = Engine::default();
        assert_eq!(engine.dispatch(b"INCR", args(&["k"])), error("unknown command"));
        assert!(matches!(
            engine.try_dispatch(b"INCR", args(&["k"])),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_dispatch_ping() {
        let engine = Engine::default();
        assert_eq!(
            engine.dispatch(b"PING", args(&[])),
            RespFrame::SimpleString(SimpleString::new("PONG"))
        );
        assert_eq!(
            engine.dispatch(b"ping", args(&["a", "b"])),
            RespFrame::BulkString(BulkString::new("a b"))
        );
        assert!(engine.backend().is_empty());
    }

    #[test]
    fn test_execute_records_only_accepted_writes() {
        let engine = Engine::default();

        let set = request(&["set", "k", "v"]);
        let ret = engine.execute(set.clone());
        assert_eq!(ret.record, Some(set));

        let del = request(&["DEL", "nope"]);
        let ret = engine.execute(del.clone());
        assert_eq!(ret.response, RespFrame::Integer(0));
        assert_eq!(ret.record, Some(del));

        let ret = engine.execute(request(&["GET", "k"]));
        assert_eq!(ret.response, RespFrame::BulkString(BulkString::new("v")));
        assert!(ret.record.is_none());

        let ret = engine.execute(request(&["SET", "k"]));
        assert_eq!(ret.response, error("wrong number of arguments for 'SET'"));
        assert!(ret.record.is_none());
    }

    #[test]
    fn test_execute_rejects_malformed_requests() {
        let engine = Engine::default();

        let ret = engine.execute(RespFrame::Integer(42));
        assert!(matches!(ret.response, RespFrame::Error(_)));
        assert!(ret.record.is_none());

        let ret = engine.execute(RespArray::new(vec![RespFrame::Integer(1)]).into());
        assert!(matches!(ret.response, RespFrame::Error(_)));

        let ret = engine.execute(RespArray::new(Vec::<RespFrame>::new()).into());
        assert!(matches!(ret.response, RespFrame::Error(_)));
    }
}
