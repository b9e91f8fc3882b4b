use crate::commands::CommandError;
use crate::frame::Frame;
use crate::store::LockedStore;

/// A parsed command that can run against the store. The caller holds the store lock for the
/// whole call.
pub trait Executable {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError>;
}
