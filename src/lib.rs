mod aof;
mod backend;
pub mod cmd;
mod config;
pub mod network;
mod resp;

pub use aof::{Aof, AofError, ReplayStats};
pub use backend::*;
pub use cmd::{Engine, Execution};
pub use config::*;
pub use resp::*;
