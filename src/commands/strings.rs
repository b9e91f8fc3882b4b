use bytes::Bytes;
use std::ops::RangeInclusive;
use std::str::FromStr;
use strum_macros::EnumString;
use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{format_float, parse_float, parse_integer, CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::{LockedStore, Value};

/// Strings are limited to 512MB.
const MAX_STRING_LEN: usize = 512 * 1024 * 1024;

/// Get the value of `key`. If the key does not exist the special value `nil` is returned. An
/// error is returned if the value stored at `key` is not a string.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: Bytes,
}

impl Executable for Get {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        match store.get_string(&self.key)? {
            Some(value) => Ok(Frame::Bulk(value.clone())),
            None => Ok(Frame::Null),
        }
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

#[derive(Debug, PartialEq)]
pub enum SetCondition {
    /// Only set the key if it does not already exist.
    Nx,
    /// Only set the key if it already exists.
    Xx,
}

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten,
/// regardless of its type, and any previous time to live is discarded.
///
/// Options: `EX seconds`, `PX milliseconds`, `NX` and `XX`.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: Option<Duration>,
    pub condition: Option<SetCondition>,
}

impl Executable for Set {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let exists = store.exists(&self.key);

        match self.condition {
            Some(SetCondition::Nx) if exists => return Ok(Frame::Null),
            Some(SetCondition::Xx) if !exists => return Ok(Frame::Null),
            _ => {}
        }

        match self.ttl {
            Some(ttl) => store.set_with_ttl(self.key, self.value, ttl),
            None => store.set(self.key, self.value),
        }

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        let mut ttl = None;
        let mut condition = None;

        while let Some(option) = parser.next_option()? {
            match option.as_str() {
                "nx" | "xx" => {
                    if condition.is_some() {
                        return Err(CommandError::Syntax);
                    }
                    condition = Some(if option == "nx" {
                        SetCondition::Nx
                    } else {
                        SetCondition::Xx
                    });
                }
                "ex" | "px" => {
                    if ttl.is_some() {
                        return Err(CommandError::Syntax);
                    }
                    let amount = parser.next_integer()?;
                    let millis = if option == "ex" {
                        amount.checked_mul(1000)
                    } else {
                        Some(amount)
                    };
                    ttl = Some(expire_duration(millis)?);
                }
                _ => return Err(CommandError::Syntax),
            }
        }

        Ok(Self {
            key,
            value,
            ttl,
            condition,
        })
    }
}

fn expire_duration(millis: Option<i64>) -> Result<Duration, CommandError> {
    millis
        .and_then(|ms| u64::try_from(ms).ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or(CommandError::InvalidExpireTime)
}

/// Set `key` to hold string `value` if `key` does not exist. Returns 1 if the key was set and
/// 0 otherwise.
///
/// Ref: <https://redis.io/docs/latest/commands/setnx/>
#[derive(Debug, PartialEq)]
pub struct Setnx {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Setnx {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        if store.exists(&self.key) {
            return Ok(Frame::Integer(0));
        }

        store.set(self.key, self.value);
        Ok(Frame::Integer(1))
    }
}

impl TryFrom<&mut CommandParser> for Setnx {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

/// Set `key` to hold the string `value` and set it to time out after the given number of
/// seconds. Arguments are read as `SETEX key seconds value`.
///
/// Ref: <https://redis.io/docs/latest/commands/setex/>
#[derive(Debug, PartialEq)]
pub struct Setex {
    pub key: Bytes,
    pub ttl: Duration,
    pub value: Bytes,
}

impl Executable for Setex {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        store.set_with_ttl(self.key, self.value, self.ttl);
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Setex {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let seconds = parser.next_integer()?;
        let value = parser.next_bytes()?;
        let ttl = expire_duration(seconds.checked_mul(1000))?;

        Ok(Self { key, ttl, value })
    }
}

/// Works exactly like `SETEX` with the sole difference that the expire time is specified in
/// milliseconds instead of seconds: `PSETEX key milliseconds value`.
///
/// Ref: <https://redis.io/docs/latest/commands/psetex/>
#[derive(Debug, PartialEq)]
pub struct Psetex {
    pub key: Bytes,
    pub ttl: Duration,
    pub value: Bytes,
}

impl Executable for Psetex {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        store.set_with_ttl(self.key, self.value, self.ttl);
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Psetex {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let millis = parser.next_integer()?;
        let value = parser.next_bytes()?;
        let ttl = expire_duration(Some(millis))?;

        Ok(Self { key, ttl, value })
    }
}

/// Atomically sets `key` to `value` and returns the old value stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/getset/>
#[derive(Debug, PartialEq)]
pub struct Getset {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Getset {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let previous = store.get_string(&self.key)?.cloned();
        store.set(self.key, self.value);

        Ok(previous.map(Frame::Bulk).unwrap_or(Frame::Null))
    }
}

impl TryFrom<&mut CommandParser> for Getset {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

/// If `key` already exists and is a string, this command appends the value at the end of the
/// string. If `key` does not exist it is created and set as an empty string, so `APPEND` will
/// be similar to `SET` in this special case.
///
/// Ref: <https://redis.io/docs/latest/commands/append/>
#[derive(Debug, PartialEq)]
pub struct Append {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Append {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let current = store.get_string(&self.key)?;
        let len = current.map_or(0, |value| value.len()) + self.value.len();
        if len > MAX_STRING_LEN {
            return Err(CommandError::StringTooLong);
        }

        let mut value = Vec::with_capacity(len);
        value.extend_from_slice(current.map(|v| &v[..]).unwrap_or_default());
        value.extend_from_slice(&self.value);

        store.update(&self.key, Value::String(Bytes::from(value)));

        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Append {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

/// Returns the length of the string value stored at `key`, or 0 when the key does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/strlen/>
#[derive(Debug, PartialEq)]
pub struct Strlen {
    pub key: Bytes,
}

impl Executable for Strlen {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let len = store.get_string(&self.key)?.map_or(0, |value| value.len());
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Strlen {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

fn incr_by(store: &mut LockedStore<'_>, key: &[u8], increment: i64) -> Result<Frame, CommandError> {
    let current = match store.get_string(key)? {
        Some(value) => parse_integer(value).ok_or(CommandError::NotAnInteger("value"))?,
        None => 0,
    };

    let value = current
        .checked_add(increment)
        .ok_or(CommandError::Overflow)?;
    store.update(key, Value::String(Bytes::from(value.to_string())));

    Ok(Frame::Integer(value))
}

/// Increments the number stored at `key` by one. If the key does not exist, it is set to 0
/// before performing the operation.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub key: Bytes,
}

impl Executable for Incr {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        incr_by(store, &self.key, 1)
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Increments the number stored at `key` by `increment`.
///
/// Ref: <https://redis.io/docs/latest/commands/incrby/>
#[derive(Debug, PartialEq)]
pub struct IncrBy {
    pub key: Bytes,
    pub increment: i64,
}

impl Executable for IncrBy {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        incr_by(store, &self.key, self.increment)
    }
}

impl TryFrom<&mut CommandParser> for IncrBy {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let increment = parser.next_integer()?;

        Ok(Self { key, increment })
    }
}

/// Decrements the number stored at `key` by one.
///
/// Ref: <https://redis.io/docs/latest/commands/decr/>
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub key: Bytes,
}

impl Executable for Decr {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        incr_by(store, &self.key, -1)
    }
}

impl TryFrom<&mut CommandParser> for Decr {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Decrements the number stored at `key` by `decrement`.
///
/// Ref: <https://redis.io/docs/latest/commands/decrby/>
#[derive(Debug, PartialEq)]
pub struct DecrBy {
    pub key: Bytes,
    pub decrement: i64,
}

impl Executable for DecrBy {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let increment = self
            .decrement
            .checked_neg()
            .ok_or(CommandError::Overflow)?;
        incr_by(store, &self.key, increment)
    }
}

impl TryFrom<&mut CommandParser> for DecrBy {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let decrement = parser.next_integer()?;

        Ok(Self { key, decrement })
    }
}

/// Increment the string representing a floating point number stored at `key` by the specified
/// increment. If the key does not exist, it is set to 0 before performing the operation.
///
/// The result is written without exponent and without trailing zeros.
///
/// Ref: <https://redis.io/docs/latest/commands/incrbyfloat/>
#[derive(Debug, PartialEq)]
pub struct IncrByFloat {
    pub key: Bytes,
    pub increment: f64,
}

impl Executable for IncrByFloat {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let current = match store.get_string(&self.key)? {
            Some(value) => parse_float(value).ok_or(CommandError::NotAFloat)?,
            None => 0.0,
        };

        let value = current + self.increment;
        if !value.is_finite() {
            return Err(CommandError::NanOrInfinity);
        }

        let value = Bytes::from(format_float(value));
        store.update(&self.key, Value::String(value.clone()));

        Ok(Frame::Bulk(value))
    }
}

impl TryFrom<&mut CommandParser> for IncrByFloat {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let increment = parser.next_float()?;

        Ok(Self { key, increment })
    }
}

/// Returns the values of all specified keys. For every key that does not hold a string value
/// or does not exist, the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/mget/>
#[derive(Debug, PartialEq)]
pub struct Mget {
    pub keys: Vec<Bytes>,
}

impl Executable for Mget {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let values = self
            .keys
            .iter()
            .map(|key| match store.get(key) {
                Some(Value::String(value)) => Frame::Bulk(value.clone()),
                _ => Frame::Null,
            })
            .collect();

        Ok(Frame::Array(values))
    }
}

impl TryFrom<&mut CommandParser> for Mget {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

fn parse_pairs(
    parser: &mut CommandParser,
    command: &'static str,
) -> Result<Vec<(Bytes, Bytes)>, CommandError> {
    if parser.remaining() % 2 != 0 {
        return Err(CommandError::OddPairs(command));
    }

    let mut pairs = Vec::with_capacity(parser.remaining() / 2);
    while parser.remaining() > 0 {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;
        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Sets the given keys to their respective values. Replaces existing values with new values.
///
/// Ref: <https://redis.io/docs/latest/commands/mset/>
#[derive(Debug, PartialEq)]
pub struct Mset {
    pub pairs: Vec<(Bytes, Bytes)>,
}

impl Executable for Mset {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        for (key, value) in self.pairs {
            store.set(key, value);
        }

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Mset {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pairs = parse_pairs(parser, "MSET")?;
        Ok(Self { pairs })
    }
}

/// Sets the given keys to their respective values. `MSETNX` will not perform any operation at
/// all even if just a single key already exists.
///
/// Ref: <https://redis.io/docs/latest/commands/msetnx/>
#[derive(Debug, PartialEq)]
pub struct Msetnx {
    pub pairs: Vec<(Bytes, Bytes)>,
}

impl Executable for Msetnx {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        if self.pairs.iter().any(|(key, _)| store.exists(key)) {
            return Ok(Frame::Integer(0));
        }

        for (key, value) in self.pairs {
            store.set(key, value);
        }

        Ok(Frame::Integer(1))
    }
}

impl TryFrom<&mut CommandParser> for Msetnx {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pairs = parse_pairs(parser, "MSETNX")?;
        Ok(Self { pairs })
    }
}

/// Returns the substring of the string value stored at `key`, determined by the offsets start
/// and end (both are inclusive). Negative offsets can be used in order to provide an offset
/// starting from the end of the string. So -1 means the last character, -2 the penultimate and
/// so forth. Out of range requests are limited to the actual length of the string.
///
/// Ref: <https://redis.io/docs/latest/commands/getrange/>
#[derive(Debug, PartialEq)]
pub struct Getrange {
    pub key: Bytes,
    pub start: i64,
    pub end: i64,
}

impl Executable for Getrange {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store.get_string(&self.key)?.cloned().unwrap_or_default();
        let len = value.len() as i64;

        let start = if self.start < 0 {
            self.start.saturating_add(len).max(0)
        } else {
            self.start
        };
        let end = if self.end < 0 {
            self.end.saturating_add(len)
        } else {
            self.end
        };
        // Exclusive from here on.
        let end = end.saturating_add(1);

        if end < start || start >= len {
            return Ok(Frame::Bulk(Bytes::new()));
        }
        let end = end.min(len);

        Ok(Frame::Bulk(value.slice(start as usize..end as usize)))
    }
}

impl TryFrom<&mut CommandParser> for Getrange {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let start = parser.next_integer()?;
        let end = parser.next_integer()?;

        Ok(Self { key, start, end })
    }
}

/// Overwrites part of the string stored at `key`, starting at the specified offset, for the
/// entire length of `value`. If the offset is larger than the current length of the string,
/// the string is padded with zero-bytes to make offset fit. Non-existing keys are considered
/// empty strings.
///
/// Ref: <https://redis.io/docs/latest/commands/setrange/>
#[derive(Debug, PartialEq)]
pub struct Setrange {
    pub key: Bytes,
    pub offset: usize,
    pub value: Bytes,
}

impl Executable for Setrange {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let current = store.get_string(&self.key)?;

        if self.value.is_empty() {
            let len = current.map_or(0, |value| value.len());
            return Ok(Frame::Integer(len as i64));
        }

        let end = self
            .offset
            .checked_add(self.value.len())
            .filter(|end| *end <= MAX_STRING_LEN)
            .ok_or(CommandError::StringTooLong)?;

        let mut buf = current.map(|value| value.to_vec()).unwrap_or_default();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[self.offset..end].copy_from_slice(&self.value);

        let len = buf.len();
        store.update(&self.key, Value::String(Bytes::from(buf)));

        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Setrange {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let offset = parser
            .next_integer()
            .ok()
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(CommandError::NotAnInteger("offset"))?;
        let value = parser.next_bytes()?;

        Ok(Self { key, offset, value })
    }
}

fn parse_bit_offset(parser: &mut CommandParser) -> Result<u64, CommandError> {
    parser
        .next_integer()
        .ok()
        .and_then(|offset| u64::try_from(offset).ok())
        .filter(|offset| *offset < (MAX_STRING_LEN as u64) * 8)
        .ok_or(CommandError::NotAnInteger("bit offset"))
}

fn parse_bit(parser: &mut CommandParser) -> Result<bool, CommandError> {
    match parser.next_integer() {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        _ => Err(CommandError::NotAnInteger("bit")),
    }
}

/// Returns the bit value at `offset` in the string value stored at `key`. Bits past the end of
/// the string, or of a missing key, are 0.
///
/// Ref: <https://redis.io/docs/latest/commands/getbit/>
#[derive(Debug, PartialEq)]
pub struct Getbit {
    pub key: Bytes,
    pub offset: u64,
}

impl Executable for Getbit {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store.get_string(&self.key)?;

        let byte = (self.offset / 8) as usize;
        let bit = value
            .and_then(|value| value.get(byte))
            .map_or(0, |byte| (byte >> (7 - self.offset % 8)) & 1);

        Ok(Frame::Integer(i64::from(bit)))
    }
}

impl TryFrom<&mut CommandParser> for Getbit {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let offset = parse_bit_offset(parser)?;

        Ok(Self { key, offset })
    }
}

/// Sets or clears the bit at `offset` in the string value stored at `key`, growing the string
/// with zero bytes when needed. Returns the original bit value.
///
/// Ref: <https://redis.io/docs/latest/commands/setbit/>
#[derive(Debug, PartialEq)]
pub struct Setbit {
    pub key: Bytes,
    pub offset: u64,
    pub value: bool,
}

impl Executable for Setbit {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let byte = (self.offset / 8) as usize;
        let mask = 1u8 << (7 - self.offset % 8);

        let mut buf = store
            .get_string(&self.key)?
            .map(|value| value.to_vec())
            .unwrap_or_default();
        if buf.len() <= byte {
            buf.resize(byte + 1, 0);
        }

        let previous = buf[byte] & mask != 0;
        if self.value {
            buf[byte] |= mask;
        } else {
            buf[byte] &= !mask;
        }

        store.update(&self.key, Value::String(Bytes::from(buf)));

        Ok(Frame::Integer(i64::from(previous)))
    }
}

impl TryFrom<&mut CommandParser> for Setbit {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let offset = parse_bit_offset(parser)?;
        let value = parse_bit(parser)?;

        Ok(Self { key, offset, value })
    }
}

/// Resolves the byte range of `BITCOUNT` and `BITPOS`. Unlike list ranges, a negative `end`
/// past the start of the string is clamped to the first byte.
fn byte_range(len: usize, start: i64, end: i64) -> Option<RangeInclusive<usize>> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolve = |index: i64| {
        if index < 0 {
            index.saturating_add(len).max(0)
        } else {
            index
        }
    };

    let start = resolve(start);
    let end = resolve(end).min(len - 1);
    if start > end {
        return None;
    }
    Some(start as usize..=end as usize)
}

/// Count the number of set bits in a string, optionally limited to a byte range.
///
/// Ref: <https://redis.io/docs/latest/commands/bitcount/>
#[derive(Debug, PartialEq)]
pub struct Bitcount {
    pub key: Bytes,
    pub range: Option<(i64, i64)>,
}

impl Executable for Bitcount {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(value) = store.get_string(&self.key)? else {
            return Ok(Frame::Integer(0));
        };

        let (start, end) = self.range.unwrap_or((0, -1));
        let count = byte_range(value.len(), start, end).map_or(0, |range| {
            value[range]
                .iter()
                .map(|byte| i64::from(byte.count_ones()))
                .sum()
        });

        Ok(Frame::Integer(count))
    }
}

impl TryFrom<&mut CommandParser> for Bitcount {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let range = match parser.remaining() {
            0 => None,
            2 => Some((parser.next_integer()?, parser.next_integer()?)),
            _ => return Err(CommandError::Syntax),
        };

        Ok(Self { key, range })
    }
}

/// Return the position of the first bit set to 1 or 0 in a string.
///
/// When looking for a 0 bit without an explicit end, a string made only of 1 bits reports the
/// first bit past its end, as if it were padded with zeros.
///
/// Ref: <https://redis.io/docs/latest/commands/bitpos/>
#[derive(Debug, PartialEq)]
pub struct Bitpos {
    pub key: Bytes,
    pub bit: bool,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl Executable for Bitpos {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(value) = store.get_string(&self.key)? else {
            return Ok(Frame::Integer(if self.bit { -1 } else { 0 }));
        };

        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(-1);
        let Some(range) = byte_range(value.len(), start, end) else {
            return Ok(Frame::Integer(-1));
        };
        let last = *range.end();

        for index in range {
            let byte = if self.bit { value[index] } else { !value[index] };
            if byte != 0 {
                let position = index * 8 + byte.leading_zeros() as usize;
                return Ok(Frame::Integer(position as i64));
            }
        }

        if !self.bit && self.end.is_none() {
            return Ok(Frame::Integer(((last + 1) * 8) as i64));
        }
        Ok(Frame::Integer(-1))
    }
}

impl TryFrom<&mut CommandParser> for Bitpos {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let bit = parse_bit(parser)?;

        let (start, end) = match parser.remaining() {
            0 => (None, None),
            1 => (Some(parser.next_integer()?), None),
            2 => (Some(parser.next_integer()?), Some(parser.next_integer()?)),
            _ => return Err(CommandError::Syntax),
        };

        Ok(Self {
            key,
            bit,
            start,
            end,
        })
    }
}

#[derive(Debug, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum BitOperation {
    And,
    Or,
    Xor,
    Not,
}

/// Perform a bitwise operation between multiple keys and store the result in the destination
/// key. Returns the length of the stored string.
///
/// `AND`, `OR` and `XOR` start from the longest source string and fold every other source over
/// its leading bytes. `NOT` takes exactly one source key.
///
/// Ref: <https://redis.io/docs/latest/commands/bitop/>
#[derive(Debug, PartialEq)]
pub struct Bitop {
    pub operation: BitOperation,
    pub destination: Bytes,
    pub keys: Vec<Bytes>,
}

impl Executable for Bitop {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let mut values = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            values.push(store.get_string(key)?.cloned().unwrap_or_default());
        }

        let fold: fn(u8, u8) -> u8 = match self.operation {
            BitOperation::And => |a, b| a & b,
            BitOperation::Or => |a, b| a | b,
            BitOperation::Xor => |a, b| a ^ b,
            BitOperation::Not => {
                let result = values[0].iter().map(|byte| !byte).collect();
                return Ok(store_bitop_result(store, self.destination, result));
            }
        };

        let longest = values.iter().map(Bytes::len).max().unwrap_or_default();
        let base = values
            .iter()
            .position(|value| value.len() == longest)
            .unwrap_or_default();

        let mut result = values[base].to_vec();
        for (index, value) in values.iter().enumerate() {
            if index == base {
                continue;
            }
            for (target, byte) in result.iter_mut().zip(value.iter()) {
                *target = fold(*target, *byte);
            }
        }

        Ok(store_bitop_result(store, self.destination, result))
    }
}

fn store_bitop_result(store: &mut LockedStore<'_>, destination: Bytes, result: Vec<u8>) -> Frame {
    if result.is_empty() {
        store.remove(&destination);
        return Frame::Integer(0);
    }

    let len = result.len();
    store.set(destination, Bytes::from(result));
    Frame::Integer(len as i64)
}

impl TryFrom<&mut CommandParser> for Bitop {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let operation = parser.next_string()?;
        let operation = BitOperation::from_str(&operation).map_err(|_| CommandError::Syntax)?;
        let destination = parser.next_key()?;
        let keys = parser.rest_keys();

        if operation == BitOperation::Not && keys.len() != 1 {
            return Err(CommandError::BitopNotArity);
        }

        Ok(Self {
            operation,
            destination,
            keys,
        })
    }
}
