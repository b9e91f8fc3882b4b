pub mod executable;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod server;
pub mod sets;
pub mod sorted_sets;
pub mod strings;

use bytes::Bytes;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::OnceLock;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::codec::Request;
use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::{LockedStore, Store, WrongTypeError};

/// Errors reported back to the client as an error reply. The connection stays open.
///
/// The `Display` output of each variant is the exact text sent over the wire.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR wrong number of arguments for {0}")]
    OddPairs(&'static str),
    #[error(transparent)]
    WrongType(#[from] WrongTypeError),
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR {0} is not an integer or out of range")]
    NotAnInteger(&'static str),
    #[error("ERR value is not a valid float")]
    NotAFloat,
    #[error("ERR invalid expire time")]
    InvalidExpireTime,
    #[error("ERR no such key")]
    NoSuchKey,
    #[error("ERR index out of range")]
    IndexOutOfRange,
    #[error("ERR BITOP NOT must be called with a single source key.")]
    BitopNotArity,
    #[error("ERR increment or decrement would overflow")]
    Overflow,
    #[error("ERR increment would produce NaN or Infinity")]
    NanOrInfinity,
    #[error("ERR string exceeds maximum allowed size (512MB)")]
    StringTooLong,
    #[error("ERR sorted set command '{0}' is not supported")]
    SortedSetUnsupported(String),
}

impl From<CommandError> for Frame {
    fn from(err: CommandError) -> Self {
        Frame::Error(err.to_string())
    }
}

/// An entry of the command table.
///
/// `arity` counts the arguments after the command name: `n >= 0` requires exactly `n`
/// arguments, `-m` requires at least `m`.
pub struct CommandEntry {
    pub name: &'static str,
    pub arity: i32,
    parse: fn(&mut CommandParser) -> Result<Command, CommandError>,
}

impl CommandEntry {
    pub fn accepts(&self, count: usize) -> bool {
        match usize::try_from(self.arity) {
            Ok(exact) => count == exact,
            Err(_) => count >= self.arity.unsigned_abs() as usize,
        }
    }
}

fn parse_as<T>(parser: &mut CommandParser) -> Result<Command, CommandError>
where
    T: for<'a> TryFrom<&'a mut CommandParser, Error = CommandError> + Into<Command>,
{
    T::try_from(parser).map(Into::into)
}

macro_rules! command_table {
    (
        $($name:literal => $module:ident::$variant:ident, $arity:literal;)*
        reserved {
            $($reserved:literal, $reserved_arity:literal;)*
        }
    ) => {
        #[derive(Debug, PartialEq)]
        pub enum Command {
            $($variant($module::$variant),)*
            SortedSet(sorted_sets::SortedSetCommand),
        }

        impl Executable for Command {
            fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
                match self {
                    $(Command::$variant(cmd) => cmd.exec(store),)*
                    Command::SortedSet(cmd) => cmd.exec(store),
                }
            }
        }

        $(
            impl From<$module::$variant> for Command {
                fn from(cmd: $module::$variant) -> Self {
                    Command::$variant(cmd)
                }
            }
        )*

        impl From<sorted_sets::SortedSetCommand> for Command {
            fn from(cmd: sorted_sets::SortedSetCommand) -> Self {
                Command::SortedSet(cmd)
            }
        }

        pub static COMMAND_TABLE: &[CommandEntry] = &[
            $(CommandEntry {
                name: $name,
                arity: $arity,
                parse: parse_as::<$module::$variant>,
            },)*
            $(CommandEntry {
                name: $reserved,
                arity: $reserved_arity,
                parse: parse_as::<sorted_sets::SortedSetCommand>,
            },)*
        ];
    };
}

command_table! {
    // Strings
    "append" => strings::Append, 2;
    "bitcount" => strings::Bitcount, -1;
    "bitop" => strings::Bitop, -3;
    "bitpos" => strings::Bitpos, -2;
    "decr" => strings::Decr, 1;
    "decrby" => strings::DecrBy, 2;
    "get" => strings::Get, 1;
    "getbit" => strings::Getbit, 2;
    "getrange" => strings::Getrange, 3;
    "getset" => strings::Getset, 2;
    "incr" => strings::Incr, 1;
    "incrby" => strings::IncrBy, 2;
    "incrbyfloat" => strings::IncrByFloat, 2;
    "mget" => strings::Mget, -1;
    "mset" => strings::Mset, -2;
    "msetnx" => strings::Msetnx, -2;
    "psetex" => strings::Psetex, 3;
    "set" => strings::Set, -2;
    "setbit" => strings::Setbit, 3;
    "setex" => strings::Setex, 3;
    "setnx" => strings::Setnx, 2;
    "setrange" => strings::Setrange, 3;
    "strlen" => strings::Strlen, 1;

    // Lists
    "lindex" => lists::Lindex, 2;
    "linsert" => lists::Linsert, 4;
    "llen" => lists::Llen, 1;
    "lpop" => lists::Lpop, 1;
    "lpush" => lists::Lpush, -2;
    "lpushx" => lists::Lpushx, 2;
    "lrange" => lists::Lrange, 3;
    "lrem" => lists::Lrem, 3;
    "lset" => lists::Lset, 3;
    "ltrim" => lists::Ltrim, 3;
    "rpop" => lists::Rpop, 1;
    "rpoplpush" => lists::Rpoplpush, 2;
    "rpush" => lists::Rpush, -2;
    "rpushx" => lists::Rpushx, 2;

    // Hashes
    "hdel" => hashes::Hdel, -2;
    "hexists" => hashes::Hexists, 2;
    "hget" => hashes::Hget, 2;
    "hgetall" => hashes::Hgetall, 1;
    "hincrby" => hashes::HincrBy, 3;
    "hincrbyfloat" => hashes::HincrByFloat, 3;
    "hkeys" => hashes::Hkeys, 1;
    "hlen" => hashes::Hlen, 1;
    "hmget" => hashes::Hmget, -2;
    "hmset" => hashes::Hmset, -3;
    "hset" => hashes::Hset, 3;
    "hsetnx" => hashes::Hsetnx, 3;
    "hstrlen" => hashes::Hstrlen, 2;
    "hvals" => hashes::Hvals, 1;

    // Sets
    "sadd" => sets::Sadd, -2;
    "scard" => sets::Scard, 1;
    "sdiff" => sets::Sdiff, -1;
    "sdiffstore" => sets::SdiffStore, -2;
    "sinter" => sets::Sinter, -1;
    "sinterstore" => sets::SinterStore, -2;
    "sismember" => sets::Sismember, 2;
    "smembers" => sets::Smembers, 1;
    "smove" => sets::Smove, 3;
    "srem" => sets::Srem, -2;
    "sunion" => sets::Sunion, -1;
    "sunionstore" => sets::SunionStore, -2;

    // Keys
    "del" => keys::Del, -1;
    "exists" => keys::Exists, -1;
    "expire" => keys::Expire, 2;
    "keys" => keys::Keys, 1;
    "persist" => keys::Persist, 1;
    "pexpire" => keys::Pexpire, 2;
    "pttl" => keys::Pttl, 1;
    "ttl" => keys::Ttl, 1;
    "type" => keys::Type, 1;

    // Server
    "dbsize" => server::DBSize, 0;
    "flushall" => server::FlushAll, 0;
    "flushdb" => server::FlushDb, 0;
    "ping" => server::Ping, 0;

    reserved {
        "zadd", -3;
        "zcard", 1;
        "zcount", 3;
        "zincrby", 3;
        "zinterstore", -3;
        "zlexcount", 3;
        "zrange", -3;
        "zrangebylex", -3;
        "zrangebyscore", -3;
        "zrank", 2;
        "zrem", -2;
        "zremrangebylex", 3;
        "zremrangebyrank", 3;
        "zremrangebyscore", 3;
        "zrevrange", -3;
        "zrevrangebylex", -3;
        "zrevrangebyscore", -3;
        "zrevrank", 2;
        "zscore", 2;
        "zunionstore", -3;
    }
}

/// Looks up a lowercase command name in the command table.
pub fn lookup(name: &str) -> Option<&'static CommandEntry> {
    static INDEX: OnceLock<HashMap<&'static str, &'static CommandEntry>> = OnceLock::new();

    INDEX
        .get_or_init(|| COMMAND_TABLE.iter().map(|entry| (entry.name, entry)).collect())
        .get(name)
        .copied()
}

impl TryFrom<Request> for Command {
    type Error = CommandError;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        let Some(entry) = lookup(&request.name) else {
            return Err(CommandError::UnknownCommand(request.name));
        };

        if !entry.accepts(request.args.len()) {
            return Err(CommandError::WrongArity(request.name));
        }

        let parser = &mut CommandParser::new(request.name, request.args);
        (entry.parse)(parser)
    }
}

/// Validates and parses `request`, then runs it while holding the store lock.
///
/// Every command runs under the same lock, so command execution is serialized across all
/// keys and connections.
pub fn dispatch(request: Request, store: &Store) -> Frame {
    let command = match Command::try_from(request) {
        Ok(command) => command,
        Err(err) => return err.into(),
    };

    let mut store = store.lock();
    command.exec(&mut store).unwrap_or_else(Frame::from)
}

pub struct CommandParser {
    command: String,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    pub(crate) fn new(command: String, args: Vec<Bytes>) -> Self {
        Self {
            command,
            parts: args.into_iter(),
        }
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }

    pub(crate) fn remaining(&self) -> usize {
        self.parts.len()
    }

    pub(crate) fn next_bytes(&mut self) -> Result<Bytes, CommandError> {
        self.parts.next().ok_or(CommandError::Syntax)
    }

    /// Keys are binary safe and taken as raw bytes.
    pub(crate) fn next_key(&mut self) -> Result<Bytes, CommandError> {
        self.next_bytes()
    }

    /// Reads a keyword argument. Keywords are ASCII, so anything else is a syntax error.
    pub(crate) fn next_string(&mut self) -> Result<String, CommandError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes)
            .map(|s| s.to_string())
            .map_err(|_| CommandError::Syntax)
    }

    pub(crate) fn next_integer(&mut self) -> Result<i64, CommandError> {
        let bytes = self.next_bytes()?;
        parse_integer(&bytes).ok_or(CommandError::NotAnInteger("value"))
    }

    pub(crate) fn next_float(&mut self) -> Result<f64, CommandError> {
        let bytes = self.next_bytes()?;
        parse_float(&bytes).ok_or(CommandError::NotAFloat)
    }

    /// Returns the next argument lowercased, or `None` when all arguments were consumed.
    pub(crate) fn next_option(&mut self) -> Result<Option<String>, CommandError> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        self.next_string().map(|s| Some(s.to_lowercase()))
    }

    pub(crate) fn rest_bytes(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }

    pub(crate) fn rest_keys(&mut self) -> Vec<Bytes> {
        self.rest_bytes()
    }
}

pub(crate) fn parse_integer(bytes: &[u8]) -> Option<i64> {
    str::from_utf8(bytes).ok()?.parse().ok()
}

pub(crate) fn parse_float(bytes: &[u8]) -> Option<f64> {
    str::from_utf8(bytes).ok()?.parse().ok()
}

/// Resolves the inclusive `start..=end` bounds of a range command over a sequence of `len`
/// elements. Negative bounds count from the end, `start` is clamped at 0 and `end` at the last
/// element. Returns `None` when the range selects nothing.
pub(crate) fn inclusive_range(len: usize, start: i64, end: i64) -> Option<RangeInclusive<usize>> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);

    let start = if start < 0 {
        start.saturating_add(len).max(0)
    } else {
        start
    };
    let end = if end < 0 { end.saturating_add(len) } else { end };
    let end = end.min(len - 1);

    if start > end {
        return None;
    }
    Some(start as usize..=end as usize)
}

/// Formats a float the shortest way that parses back to the same value, without exponent.
pub(crate) fn format_float(value: f64) -> String {
    value.to_string()
}
