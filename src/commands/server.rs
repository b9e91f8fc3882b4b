use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::LockedStore;

/// Returns `PONG`. Mostly used by clients to check that the connection is still alive.
///
/// Ref: <https://redis.io/docs/latest/commands/ping/>
#[derive(Debug, PartialEq)]
pub struct Ping;

impl Executable for Ping {
    fn exec(self, _store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        Ok(Frame::Simple("PONG".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = CommandError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

/// Return the number of keys in the currently-selected database.
///
/// Ref: <https://redis.io/docs/latest/commands/dbsize/>
#[derive(Debug, PartialEq)]
pub struct DBSize;

impl Executable for DBSize {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        Ok(Frame::Integer(store.size() as i64))
    }
}

impl TryFrom<&mut CommandParser> for DBSize {
    type Error = CommandError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

/// Delete all the keys of all the existing databases. There is a single database, so this is
/// the same as `FLUSHDB`.
///
/// Ref: <https://redis.io/docs/latest/commands/flushall/>
#[derive(Debug, PartialEq)]
pub struct FlushAll;

impl Executable for FlushAll {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        store.flush();
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for FlushAll {
    type Error = CommandError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

/// Ref: <https://redis.io/docs/latest/commands/flushdb/>
#[derive(Debug, PartialEq)]
pub struct FlushDb;

impl Executable for FlushDb {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        store.flush();
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for FlushDb {
    type Error = CommandError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_utils::{request, run};
    use crate::commands::Command;
    use crate::store::Store;
    use tokio::time::{self, Duration};

    #[test]
    fn parse_ping() {
        let cmd = Command::try_from(request(&["PING"])).unwrap();
        assert_eq!(cmd, Command::Ping(Ping));
    }

    #[tokio::test]
    async fn ping() {
        let store = Store::new();

        assert_eq!(run(&store, &["PING"]), Frame::Simple("PONG".to_string()));
        assert_eq!(
            run(&store, &["PING", "hello"]),
            Frame::Error("ERR wrong number of arguments for 'ping' command".to_string())
        );
    }

    #[tokio::test]
    async fn dbsize_ignores_expired_keys() {
        time::pause();
        let store = Store::new();

        assert_eq!(run(&store, &["DBSIZE"]), Frame::Integer(0));

        run(&store, &["MSET", "a", "1", "b", "2"]);
        run(&store, &["SET", "c", "3", "PX", "10"]);
        assert_eq!(run(&store, &["DBSIZE"]), Frame::Integer(3));

        time::advance(Duration::from_millis(20)).await;
        assert_eq!(run(&store, &["DBSIZE"]), Frame::Integer(2));
    }

    #[tokio::test]
    async fn flush_clears_every_type() {
        let store = Store::new();
        run(&store, &["SET", "a", "1"]);
        run(&store, &["RPUSH", "b", "x"]);
        run(&store, &["HSET", "c", "f", "v"]);
        run(&store, &["SADD", "d", "m"]);

        assert_eq!(run(&store, &["FLUSHALL"]), Frame::ok());
        assert_eq!(run(&store, &["DBSIZE"]), Frame::Integer(0));

        run(&store, &["SET", "a", "1"]);
        assert_eq!(run(&store, &["FLUSHDB"]), Frame::ok());
        assert_eq!(run(&store, &["EXISTS", "a"]), Frame::Integer(0));
    }
}
