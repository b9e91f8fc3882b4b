use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::LockedStore;

/// Any of the sorted set commands (`ZADD`, `ZRANGE`, ...).
///
/// Their names and arities are registered so that clients get the usual arity errors, but
/// sorted sets have no semantics yet and every call is answered with an error.
#[derive(Debug, PartialEq)]
pub struct SortedSetCommand {
    pub command: String,
}

impl Executable for SortedSetCommand {
    fn exec(self, _store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        Err(CommandError::SortedSetUnsupported(self.command))
    }
}

impl TryFrom<&mut CommandParser> for SortedSetCommand {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let command = parser.command().to_string();
        parser.rest_bytes();

        Ok(Self { command })
    }
}
