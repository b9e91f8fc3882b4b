use bytes::Bytes;
use glob_match::glob_match;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::LockedStore;

/// Removes the specified keys. A key is ignored if it does not exist. Returns the number of keys
/// that were removed.
///
/// Ref: <https://redis.io/docs/latest/commands/del/>
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl Executable for Del {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let removed = self
            .keys
            .iter()
            .filter(|key| store.remove(key).is_some())
            .count();

        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

/// Returns the number of the given keys that exist. A key mentioned twice is counted twice.
///
/// Ref: <https://redis.io/docs/latest/commands/exists/>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub keys: Vec<Bytes>,
}

impl Executable for Exists {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let count = self.keys.iter().filter(|key| store.exists(key)).count();
        Ok(Frame::Integer(count as i64))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

/// Returns the string representation of the type of the value stored at `key`: `string`,
/// `list`, `set`, `zset` or `hash`. A missing key reports `none`.
///
/// Ref: <https://redis.io/docs/latest/commands/type/>
#[derive(Debug, PartialEq)]
pub struct Type {
    pub key: Bytes,
}

impl Executable for Type {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let type_name = store.get(&self.key).map_or("none", |value| value.type_name());
        Ok(Frame::Simple(type_name.to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Type {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns all keys matching a glob-style `pattern`, in no particular order. Keys and pattern
/// are matched as text, with invalid UTF-8 replaced by U+FFFD.
///
/// Ref: <https://redis.io/docs/latest/commands/keys/>
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: Bytes,
}

impl Executable for Keys {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let pattern = String::from_utf8_lossy(&self.pattern);
        let keys = store
            .keys()
            .filter(|key| glob_match(&pattern, &String::from_utf8_lossy(key)))
            .map(|key| Frame::Bulk(key.clone()))
            .collect();

        Ok(Frame::Array(keys))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_bytes()?;
        Ok(Self { pattern })
    }
}

fn expire(
    store: &mut LockedStore<'_>,
    key: &[u8],
    millis: Option<i64>,
) -> Result<Frame, CommandError> {
    let millis = millis.ok_or(CommandError::InvalidExpireTime)?;

    if !store.exists(key) {
        return Ok(Frame::Integer(0));
    }

    if millis <= 0 {
        store.remove(key);
    } else {
        store.set_ttl(key, millis);
    }

    Ok(Frame::Integer(1))
}

/// Set a timeout on `key` in seconds. After the timeout has expired, the key will
/// automatically be deleted. A non-positive timeout deletes the key right away.
///
/// Returns 1 if the timeout was set and 0 when the key does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/expire/>
#[derive(Debug, PartialEq)]
pub struct Expire {
    pub key: Bytes,
    pub seconds: i64,
}

impl Executable for Expire {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        expire(store, &self.key, self.seconds.checked_mul(1000))
    }
}

impl TryFrom<&mut CommandParser> for Expire {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let seconds = parser.next_integer()?;

        Ok(Self { key, seconds })
    }
}

/// This command works exactly like `EXPIRE` but the time to live of the key is specified in
/// milliseconds instead of seconds.
///
/// Ref: <https://redis.io/docs/latest/commands/pexpire/>
#[derive(Debug, PartialEq)]
pub struct Pexpire {
    pub key: Bytes,
    pub millis: i64,
}

impl Executable for Pexpire {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        expire(store, &self.key, Some(self.millis))
    }
}

impl TryFrom<&mut CommandParser> for Pexpire {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let millis = parser.next_integer()?;

        Ok(Self { key, millis })
    }
}

/// TTL returns the remaining time to live of a key that has a timeout, rounded to the nearest
/// second. Returns -2 if the key does not exist and -1 if the key exists but has no associated
/// expire.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl/>
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: Bytes,
}

impl Executable for Ttl {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let ttl = match store.ttl(&self.key) {
            None => -2,
            Some(None) => -1,
            Some(Some(ttl)) => ((ttl.as_millis() + 500) / 1000) as i64,
        };
        Ok(Frame::Integer(ttl))
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Like `TTL` this command returns the remaining time to live of a key that has an expire set,
/// with the sole difference that it is reported in milliseconds.
///
/// Ref: <https://redis.io/docs/latest/commands/pttl/>
#[derive(Debug, PartialEq)]
pub struct Pttl {
    pub key: Bytes,
}

impl Executable for Pttl {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let ttl = match store.ttl(&self.key) {
            None => -2,
            Some(None) => -1,
            Some(Some(ttl)) => ttl.as_millis() as i64,
        };
        Ok(Frame::Integer(ttl))
    }
}

impl TryFrom<&mut CommandParser> for Pttl {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Remove the existing timeout on `key`. Returns 1 if a timeout was removed.
///
/// Ref: <https://redis.io/docs/latest/commands/persist/>
#[derive(Debug, PartialEq)]
pub struct Persist {
    pub key: Bytes,
}

impl Executable for Persist {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        match store.ttl(&self.key) {
            Some(Some(_)) => {
                store.set_ttl(&self.key, 0);
                Ok(Frame::Integer(1))
            }
            _ => Ok(Frame::Integer(0)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Persist {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::test_utils::{bulk, bulks, request, run, sorted};
    use crate::commands::{dispatch, Command};
    use crate::store::Store;
    use tokio::time::{self, Duration};

    #[test]
    fn parse_del_with_multiple_keys() {
        let cmd = Command::try_from(request(&["DEL", "foo", "bar", "baz"])).unwrap();

        assert_eq!(
            cmd,
            Command::Del(Del {
                keys: vec![Bytes::from("foo"), Bytes::from("bar"), Bytes::from("baz")]
            })
        );
    }

    #[test]
    fn parse_keys_with_wildcard_pattern() {
        let cmd = Command::try_from(request(&["KEYS", "*"])).unwrap();

        assert_eq!(
            cmd,
            Command::Keys(Keys {
                pattern: Bytes::from("*")
            })
        );
    }

    #[tokio::test]
    async fn del_and_exists() {
        let store = Store::new();
        run(&store, &["MSET", "a", "1", "b", "2"]);
        run(&store, &["SADD", "s", "x"]);

        assert_eq!(run(&store, &["EXISTS", "a", "a", "s", "nope"]), Frame::Integer(3));
        assert_eq!(run(&store, &["DEL", "a", "s", "nope"]), Frame::Integer(2));
        assert_eq!(run(&store, &["EXISTS", "a", "b", "s"]), Frame::Integer(1));
    }

    #[tokio::test]
    async fn type_of_each_value() {
        let store = Store::new();
        run(&store, &["SET", "string", "v"]);
        run(&store, &["LPUSH", "list", "v"]);
        run(&store, &["HSET", "hash", "f", "v"]);
        run(&store, &["SADD", "set", "v"]);

        for (key, expected) in [
            ("string", "string"),
            ("list", "list"),
            ("hash", "hash"),
            ("set", "set"),
            ("missing", "none"),
        ] {
            assert_eq!(
                run(&store, &["TYPE", key]),
                Frame::Simple(expected.to_string())
            );
        }
    }

    #[tokio::test]
    async fn keys_matches_glob_patterns() {
        let store = Store::new();
        run(&store, &["MSET", "firstname", "Jack", "lastname", "Stuntman", "age", "35"]);

        assert_eq!(
            sorted(run(&store, &["KEYS", "*name*"])),
            bulks(&["firstname", "lastname"])
        );
        assert_eq!(run(&store, &["KEYS", "a??"]), bulks(&["age"]));
        assert_eq!(
            sorted(run(&store, &["KEYS", "*"])),
            bulks(&["age", "firstname", "lastname"])
        );
        assert_eq!(run(&store, &["KEYS", "nothing*"]), bulks(&[]));
    }

    #[tokio::test]
    async fn ttl_and_pttl() {
        time::pause();
        let store = Store::new();
        run(&store, &["SET", "plain", "v"]);
        run(&store, &["SET", "timed", "v"]);

        assert_eq!(run(&store, &["TTL", "missing"]), Frame::Integer(-2));
        assert_eq!(run(&store, &["PTTL", "missing"]), Frame::Integer(-2));
        assert_eq!(run(&store, &["TTL", "plain"]), Frame::Integer(-1));
        assert_eq!(run(&store, &["PTTL", "plain"]), Frame::Integer(-1));

        assert_eq!(run(&store, &["EXPIRE", "timed", "10"]), Frame::Integer(1));
        time::advance(Duration::from_millis(2400)).await;

        assert_eq!(run(&store, &["TTL", "timed"]), Frame::Integer(8));
        assert_eq!(run(&store, &["PTTL", "timed"]), Frame::Integer(7600));
    }

    #[tokio::test]
    async fn expire_and_pexpire() {
        time::pause();
        let store = Store::new();
        run(&store, &["SET", "a", "v"]);
        run(&store, &["RPUSH", "b", "v"]);

        assert_eq!(run(&store, &["EXPIRE", "missing", "10"]), Frame::Integer(0));
        assert_eq!(run(&store, &["EXPIRE", "a", "1"]), Frame::Integer(1));
        assert_eq!(run(&store, &["PEXPIRE", "b", "1500"]), Frame::Integer(1));

        time::advance(Duration::from_millis(1100)).await;
        assert_eq!(run(&store, &["GET", "a"]), Frame::Null);
        assert_eq!(run(&store, &["LLEN", "b"]), Frame::Integer(1));

        time::advance(Duration::from_millis(500)).await;
        assert_eq!(run(&store, &["EXISTS", "b"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn non_positive_expire_deletes_the_key() {
        let store = Store::new();
        run(&store, &["MSET", "a", "1", "b", "2"]);

        assert_eq!(run(&store, &["EXPIRE", "a", "0"]), Frame::Integer(1));
        assert_eq!(run(&store, &["PEXPIRE", "b", "-10"]), Frame::Integer(1));
        assert_eq!(run(&store, &["EXISTS", "a", "b"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn expire_errors() {
        let store = Store::new();
        run(&store, &["SET", "a", "v"]);

        assert_eq!(
            run(&store, &["EXPIRE", "a", "soon"]),
            Frame::Error("ERR value is not an integer or out of range".into())
        );
        assert_eq!(
            run(&store, &["EXPIRE", "a", &i64::MAX.to_string()]),
            Frame::Error("ERR invalid expire time".into())
        );
        assert_eq!(run(&store, &["GET", "a"]), bulk("v"));
    }

    #[tokio::test]
    async fn persist() {
        time::pause();
        let store = Store::new();
        run(&store, &["SET", "a", "v", "EX", "1"]);
        run(&store, &["SET", "b", "v"]);

        assert_eq!(run(&store, &["PERSIST", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, &["PERSIST", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, &["PERSIST", "b"]), Frame::Integer(0));
        assert_eq!(run(&store, &["PERSIST", "missing"]), Frame::Integer(0));

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(run(&store, &["GET", "a"]), bulk("v"));
        assert_eq!(run(&store, &["TTL", "a"]), Frame::Integer(-1));
    }

    #[tokio::test]
    async fn keys_are_binary_safe() {
        let store = Store::new();
        let key = Bytes::from_static(b"\xff\x00key");
        let raw = |name: &str, args: &[Bytes]| {
            let request = Request {
                name: name.to_string(),
                args: args.to_vec(),
            };
            dispatch(request, &store)
        };

        assert_eq!(raw("set", &[key.clone(), Bytes::from("v")]), Frame::ok());
        assert_eq!(raw("get", &[key.clone()]), bulk("v"));
        assert_eq!(raw("get", &[Bytes::from_static(b"\xfe\x00key")]), Frame::Null);
        assert_eq!(
            raw("keys", &[Bytes::from("*key")]),
            Frame::Array(vec![Frame::Bulk(key.clone())])
        );
        assert_eq!(raw("del", &[key]), Frame::Integer(1));
        assert_eq!(run(&store, &["KEYS", "*"]), bulks(&[]));
    }

    #[tokio::test]
    async fn non_utf8_option_is_a_syntax_error() {
        let store = Store::new();
        let reply = dispatch(
            Request {
                name: "set".to_string(),
                args: vec![Bytes::from("k"), Bytes::from("v"), Bytes::from_static(b"\xff")],
            },
            &store,
        );

        assert_eq!(reply, Frame::Error("ERR syntax error".into()));
        assert_eq!(run(&store, &["EXISTS", "k"]), Frame::Integer(0));
    }
}
