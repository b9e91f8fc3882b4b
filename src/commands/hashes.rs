use bytes::Bytes;
use itertools::Itertools;

use crate::commands::executable::Executable;
use crate::commands::{format_float, parse_float, parse_integer, CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::LockedStore;

/// Sets `field` in the hash stored at `key` to `value`, creating the hash when needed.
///
/// Returns 1 when `field` is a new field in the hash and 0 when an existing field was
/// overwritten.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
#[derive(Debug, PartialEq)]
pub struct Hset {
    pub key: Bytes,
    pub field: Bytes,
    pub value: Bytes,
}

impl Executable for Hset {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let hash = store.hash_entry(&self.key)?;
        let created = hash.insert(self.field, self.value).is_none();

        Ok(Frame::Integer(i64::from(created)))
    }
}

impl TryFrom<&mut CommandParser> for Hset {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, field, value })
    }
}

/// Sets `field` only if it does not exist yet.
///
/// Ref: <https://redis.io/docs/latest/commands/hsetnx/>
#[derive(Debug, PartialEq)]
pub struct Hsetnx {
    pub key: Bytes,
    pub field: Bytes,
    pub value: Bytes,
}

impl Executable for Hsetnx {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let hash = store.hash_entry(&self.key)?;
        if hash.contains_key(&self.field) {
            return Ok(Frame::Integer(0));
        }

        hash.insert(self.field, self.value);
        Ok(Frame::Integer(1))
    }
}

impl TryFrom<&mut CommandParser> for Hsetnx {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, field, value })
    }
}

/// Sets the specified fields to their respective values in the hash stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/hmset/>
#[derive(Debug, PartialEq)]
pub struct Hmset {
    pub key: Bytes,
    pub pairs: Vec<(Bytes, Bytes)>,
}

impl Executable for Hmset {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        store.hash_entry(&self.key)?.extend(self.pairs);
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Hmset {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        if parser.remaining() % 2 != 0 {
            return Err(CommandError::OddPairs("HMSET"));
        }
        let pairs = parser.rest_bytes().into_iter().tuples().collect();

        Ok(Self { key, pairs })
    }
}

/// Returns the value associated with `field` in the hash stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/hget/>
#[derive(Debug, PartialEq)]
pub struct Hget {
    pub key: Bytes,
    pub field: Bytes,
}

impl Executable for Hget {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store
            .get_hash(&self.key)?
            .and_then(|hash| hash.get(&self.field))
            .cloned();

        Ok(value.map(Frame::Bulk).unwrap_or(Frame::Null))
    }
}

impl TryFrom<&mut CommandParser> for Hget {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;

        Ok(Self { key, field })
    }
}

/// Returns the values associated with the specified fields, `nil` for every field that does
/// not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/hmget/>
#[derive(Debug, PartialEq)]
pub struct Hmget {
    pub key: Bytes,
    pub fields: Vec<Bytes>,
}

impl Executable for Hmget {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let hash = store.get_hash(&self.key)?;

        let values = self
            .fields
            .iter()
            .map(|field| match hash.and_then(|hash| hash.get(field)) {
                Some(value) => Frame::Bulk(value.clone()),
                None => Frame::Null,
            })
            .collect();

        Ok(Frame::Array(values))
    }
}

impl TryFrom<&mut CommandParser> for Hmget {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let fields = parser.rest_bytes();

        Ok(Self { key, fields })
    }
}

/// Removes the specified fields from the hash stored at `key`. Removing the last field deletes
/// the key. Returns the number of fields that were removed.
///
/// Ref: <https://redis.io/docs/latest/commands/hdel/>
#[derive(Debug, PartialEq)]
pub struct Hdel {
    pub key: Bytes,
    pub fields: Vec<Bytes>,
}

impl Executable for Hdel {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(hash) = store.get_hash_mut(&self.key)? else {
            return Ok(Frame::Integer(0));
        };

        let removed = self
            .fields
            .iter()
            .filter(|field| hash.remove(*field).is_some())
            .count();
        store.remove_if_empty(&self.key);

        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for Hdel {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let fields = parser.rest_bytes();

        Ok(Self { key, fields })
    }
}

/// Ref: <https://redis.io/docs/latest/commands/hexists/>
#[derive(Debug, PartialEq)]
pub struct Hexists {
    pub key: Bytes,
    pub field: Bytes,
}

impl Executable for Hexists {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let exists = store
            .get_hash(&self.key)?
            .is_some_and(|hash| hash.contains_key(&self.field));

        Ok(Frame::Integer(i64::from(exists)))
    }
}

impl TryFrom<&mut CommandParser> for Hexists {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;

        Ok(Self { key, field })
    }
}

/// Ref: <https://redis.io/docs/latest/commands/hlen/>
#[derive(Debug, PartialEq)]
pub struct Hlen {
    pub key: Bytes,
}

impl Executable for Hlen {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let len = store.get_hash(&self.key)?.map_or(0, |hash| hash.len());
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Hlen {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns the string length of the value associated with `field`, 0 when the field or the key
/// does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/hstrlen/>
#[derive(Debug, PartialEq)]
pub struct Hstrlen {
    pub key: Bytes,
    pub field: Bytes,
}

impl Executable for Hstrlen {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let len = store
            .get_hash(&self.key)?
            .and_then(|hash| hash.get(&self.field))
            .map_or(0, |value| value.len());

        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Hstrlen {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;

        Ok(Self { key, field })
    }
}

/// Returns all field names in the hash stored at `key`, in no particular order.
///
/// Ref: <https://redis.io/docs/latest/commands/hkeys/>
#[derive(Debug, PartialEq)]
pub struct Hkeys {
    pub key: Bytes,
}

impl Executable for Hkeys {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let fields = store
            .get_hash(&self.key)?
            .map(|hash| hash.keys().cloned().map(Frame::Bulk).collect())
            .unwrap_or_default();

        Ok(Frame::Array(fields))
    }
}

impl TryFrom<&mut CommandParser> for Hkeys {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns all values in the hash stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/hvals/>
#[derive(Debug, PartialEq)]
pub struct Hvals {
    pub key: Bytes,
}

impl Executable for Hvals {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let values = store
            .get_hash(&self.key)?
            .map(|hash| hash.values().cloned().map(Frame::Bulk).collect())
            .unwrap_or_default();

        Ok(Frame::Array(values))
    }
}

impl TryFrom<&mut CommandParser> for Hvals {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns all fields and values of the hash stored at `key`, flattened as field, value, field,
/// value and so on.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
#[derive(Debug, PartialEq)]
pub struct Hgetall {
    pub key: Bytes,
}

impl Executable for Hgetall {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let entries = store
            .get_hash(&self.key)?
            .map(|hash| {
                hash.iter()
                    .flat_map(|(field, value)| {
                        [Frame::Bulk(field.clone()), Frame::Bulk(value.clone())]
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Frame::Array(entries))
    }
}

impl TryFrom<&mut CommandParser> for Hgetall {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Increments the number stored at `field` in the hash stored at `key` by `increment`. A
/// missing field counts as 0.
///
/// Ref: <https://redis.io/docs/latest/commands/hincrby/>
#[derive(Debug, PartialEq)]
pub struct HincrBy {
    pub key: Bytes,
    pub field: Bytes,
    pub increment: i64,
}

impl Executable for HincrBy {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let current = match store
            .get_hash(&self.key)?
            .and_then(|hash| hash.get(&self.field))
        {
            Some(value) => parse_integer(value).ok_or(CommandError::NotAnInteger("value"))?,
            None => 0,
        };

        let value = current
            .checked_add(self.increment)
            .ok_or(CommandError::Overflow)?;
        store
            .hash_entry(&self.key)?
            .insert(self.field, Bytes::from(value.to_string()));

        Ok(Frame::Integer(value))
    }
}

impl TryFrom<&mut CommandParser> for HincrBy {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;
        let increment = parser.next_integer()?;

        Ok(Self {
            key,
            field,
            increment,
        })
    }
}

/// Increment the floating point number stored at `field` by `increment`. The new value is
/// returned as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/hincrbyfloat/>
#[derive(Debug, PartialEq)]
pub struct HincrByFloat {
    pub key: Bytes,
    pub field: Bytes,
    pub increment: f64,
}

impl Executable for HincrByFloat {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let current = match store
            .get_hash(&self.key)?
            .and_then(|hash| hash.get(&self.field))
        {
            Some(value) => parse_float(value).ok_or(CommandError::NotAFloat)?,
            None => 0.0,
        };

        let value = current + self.increment;
        if !value.is_finite() {
            return Err(CommandError::NanOrInfinity);
        }

        let value = Bytes::from(format_float(value));
        store
            .hash_entry(&self.key)?
            .insert(self.field, value.clone());

        Ok(Frame::Bulk(value))
    }
}

impl TryFrom<&mut CommandParser> for HincrByFloat {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let field = parser.next_bytes()?;
        let increment = parser.next_float()?;

        Ok(Self {
            key,
            field,
            increment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_utils::{bulk, bulks, request, run, sorted};
    use crate::commands::Command;
    use crate::store::Store;

    #[test]
    fn parse_hmset_command() {
        let cmd = Command::try_from(request(&["HMSET", "h", "a", "1", "b", "2"])).unwrap();

        assert_eq!(
            cmd,
            Command::Hmset(Hmset {
                key: Bytes::from("h"),
                pairs: vec![
                    (Bytes::from("a"), Bytes::from("1")),
                    (Bytes::from("b"), Bytes::from("2")),
                ],
            })
        );
    }

    #[test]
    fn hmset_odd_pairs() {
        let err = Command::try_from(request(&["HMSET", "h", "a", "1", "b"])).unwrap_err();

        assert_eq!(err.to_string(), "ERR wrong number of arguments for HMSET");
    }

    #[tokio::test]
    async fn hset_reports_new_fields() {
        let store = Store::new();

        assert_eq!(run(&store, &["HSET", "h", "f", "1"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HSET", "h", "f", "2"]), Frame::Integer(0));
        assert_eq!(run(&store, &["HGET", "h", "f"]), bulk("2"));
        assert_eq!(run(&store, &["HGET", "h", "missing"]), Frame::Null);
        assert_eq!(run(&store, &["HGET", "missing", "f"]), Frame::Null);
    }

    #[tokio::test]
    async fn hsetnx() {
        let store = Store::new();

        assert_eq!(run(&store, &["HSETNX", "h", "f", "1"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HSETNX", "h", "f", "2"]), Frame::Integer(0));
        assert_eq!(run(&store, &["HGET", "h", "f"]), bulk("1"));
    }

    #[tokio::test]
    async fn hmset_and_hmget() {
        let store = Store::new();

        assert_eq!(run(&store, &["HMSET", "h", "a", "1", "b", "2"]), Frame::ok());
        assert_eq!(
            run(&store, &["HMGET", "h", "a", "nope", "b"]),
            Frame::Array(vec![bulk("1"), Frame::Null, bulk("2")])
        );
        assert_eq!(
            run(&store, &["HMGET", "missing", "a"]),
            Frame::Array(vec![Frame::Null])
        );
    }

    #[tokio::test]
    async fn hdel_removes_key_with_last_field() {
        let store = Store::new();
        run(&store, &["HMSET", "h", "a", "1", "b", "2"]);

        assert_eq!(run(&store, &["HDEL", "h", "a", "nope"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HLEN", "h"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HDEL", "h", "b"]), Frame::Integer(1));
        assert_eq!(run(&store, &["EXISTS", "h"]), Frame::Integer(0));
        assert_eq!(run(&store, &["HDEL", "h", "b"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn hexists_hlen_hstrlen() {
        let store = Store::new();
        run(&store, &["HSET", "h", "f", "hello"]);

        assert_eq!(run(&store, &["HEXISTS", "h", "f"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HEXISTS", "h", "g"]), Frame::Integer(0));
        assert_eq!(run(&store, &["HLEN", "h"]), Frame::Integer(1));
        assert_eq!(run(&store, &["HLEN", "missing"]), Frame::Integer(0));
        assert_eq!(run(&store, &["HSTRLEN", "h", "f"]), Frame::Integer(5));
        assert_eq!(run(&store, &["HSTRLEN", "h", "g"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn hkeys_hvals_hgetall() {
        let store = Store::new();
        run(&store, &["HMSET", "h", "a", "1", "b", "2"]);

        assert_eq!(sorted(run(&store, &["HKEYS", "h"])), bulks(&["a", "b"]));
        assert_eq!(sorted(run(&store, &["HVALS", "h"])), bulks(&["1", "2"]));

        let Frame::Array(entries) = run(&store, &["HGETALL", "h"]) else {
            panic!("HGETALL must reply with an array");
        };
        let mut pairs: Vec<_> = entries
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("$a".to_string(), "$1".to_string()),
                ("$b".to_string(), "$2".to_string())
            ]
        );

        assert_eq!(run(&store, &["HKEYS", "missing"]), bulks(&[]));
        assert_eq!(run(&store, &["HVALS", "missing"]), bulks(&[]));
        assert_eq!(run(&store, &["HGETALL", "missing"]), bulks(&[]));
    }

    #[tokio::test]
    async fn hincrby() {
        let store = Store::new();

        assert_eq!(run(&store, &["HINCRBY", "h", "f", "5"]), Frame::Integer(5));
        assert_eq!(run(&store, &["HINCRBY", "h", "f", "-7"]), Frame::Integer(-2));
        assert_eq!(run(&store, &["HGET", "h", "f"]), bulk("-2"));
    }

    #[tokio::test]
    async fn hincrby_errors_do_not_create_the_hash() {
        let store = Store::new();

        assert_eq!(
            run(&store, &["HINCRBY", "h", "f", "x"]),
            Frame::Error("ERR value is not an integer or out of range".into())
        );
        assert_eq!(run(&store, &["EXISTS", "h"]), Frame::Integer(0));

        run(&store, &["HSET", "h", "word", "abc"]);
        assert_eq!(
            run(&store, &["HINCRBY", "h", "word", "1"]),
            Frame::Error("ERR value is not an integer or out of range".into())
        );

        run(&store, &["HSET", "h", "max", &i64::MAX.to_string()]);
        assert_eq!(
            run(&store, &["HINCRBY", "h", "max", "1"]),
            Frame::Error("ERR increment or decrement would overflow".into())
        );
    }

    #[tokio::test]
    async fn hincrbyfloat() {
        let store = Store::new();
        run(&store, &["HSET", "h", "f", "10.50"]);

        assert_eq!(run(&store, &["HINCRBYFLOAT", "h", "f", "0.1"]), bulk("10.6"));
        assert_eq!(run(&store, &["HINCRBYFLOAT", "h", "g", "2"]), bulk("2"));
        assert_eq!(
            run(&store, &["HINCRBYFLOAT", "h", "f", "abc"]),
            Frame::Error("ERR value is not a valid float".into())
        );
        assert_eq!(run(&store, &["HGET", "h", "f"]), bulk("10.6"));
    }

    #[tokio::test]
    async fn hash_commands_on_wrong_type() {
        let store = Store::new();
        run(&store, &["SET", "k", "v"]);

        for command in [
            &["HSET", "k", "f", "v"][..],
            &["HGET", "k", "f"][..],
            &["HGETALL", "k"][..],
            &["HINCRBY", "k", "f", "1"][..],
        ] {
            assert_eq!(
                run(&store, command),
                Frame::Error(
                    "WRONGTYPE Operation against a key holding the wrong kind of value".into()
                )
            );
        }
    }
}
