use bytes::Bytes;
use std::str::FromStr;
use strum_macros::EnumString;

use crate::commands::executable::Executable;
use crate::commands::{inclusive_range, CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::LockedStore;

/// Resolves a possibly negative list index against `len`.
fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let index = if index < 0 {
        index.saturating_add(len as i64)
    } else {
        index
    };
    usize::try_from(index).ok().filter(|index| *index < len)
}

/// Insert all the specified values at the head of the list stored at `key`. If `key` does not
/// exist, it is created as empty list before performing the push operations. Elements are
/// inserted one after the other, so `LPUSH mylist a b c` leaves `c` as the first element.
///
/// Ref: <https://redis.io/docs/latest/commands/lpush/>
#[derive(Debug, PartialEq)]
pub struct Lpush {
    pub key: Bytes,
    pub values: Vec<Bytes>,
}

impl Executable for Lpush {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let list = store.list_entry(&self.key)?;
        for value in self.values {
            list.push_front(value);
        }

        Ok(Frame::Integer(list.len() as i64))
    }
}

impl TryFrom<&mut CommandParser> for Lpush {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let values = parser.rest_bytes();

        Ok(Self { key, values })
    }
}

/// Insert all the specified values at the tail of the list stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/rpush/>
#[derive(Debug, PartialEq)]
pub struct Rpush {
    pub key: Bytes,
    pub values: Vec<Bytes>,
}

impl Executable for Rpush {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let list = store.list_entry(&self.key)?;
        list.extend(self.values);

        Ok(Frame::Integer(list.len() as i64))
    }
}

impl TryFrom<&mut CommandParser> for Rpush {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let values = parser.rest_bytes();

        Ok(Self { key, values })
    }
}

/// Inserts `value` at the head of the list stored at `key`, only if `key` already exists and
/// holds a list. Returns 0 when nothing was pushed.
///
/// Ref: <https://redis.io/docs/latest/commands/lpushx/>
#[derive(Debug, PartialEq)]
pub struct Lpushx {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Lpushx {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        match store.get_list_mut(&self.key)? {
            Some(list) => {
                list.push_front(self.value);
                Ok(Frame::Integer(list.len() as i64))
            }
            None => Ok(Frame::Integer(0)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Lpushx {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

/// Inserts `value` at the tail of the list stored at `key`, only if `key` already exists and
/// holds a list.
///
/// Ref: <https://redis.io/docs/latest/commands/rpushx/>
#[derive(Debug, PartialEq)]
pub struct Rpushx {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Rpushx {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        match store.get_list_mut(&self.key)? {
            Some(list) => {
                list.push_back(self.value);
                Ok(Frame::Integer(list.len() as i64))
            }
            None => Ok(Frame::Integer(0)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Rpushx {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

/// Removes and returns the first element of the list stored at `key`. Popping the last element
/// deletes the key.
///
/// Ref: <https://redis.io/docs/latest/commands/lpop/>
#[derive(Debug, PartialEq)]
pub struct Lpop {
    pub key: Bytes,
}

impl Executable for Lpop {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store
            .get_list_mut(&self.key)?
            .and_then(|list| list.pop_front());
        store.remove_if_empty(&self.key);

        Ok(value.map(Frame::Bulk).unwrap_or(Frame::Null))
    }
}

impl TryFrom<&mut CommandParser> for Lpop {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Removes and returns the last element of the list stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/rpop/>
#[derive(Debug, PartialEq)]
pub struct Rpop {
    pub key: Bytes,
}

impl Executable for Rpop {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store
            .get_list_mut(&self.key)?
            .and_then(|list| list.pop_back());
        store.remove_if_empty(&self.key);

        Ok(value.map(Frame::Bulk).unwrap_or(Frame::Null))
    }
}

impl TryFrom<&mut CommandParser> for Rpop {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns the length of the list stored at `key`, 0 if the key does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/llen/>
#[derive(Debug, PartialEq)]
pub struct Llen {
    pub key: Bytes,
}

impl Executable for Llen {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let len = store.get_list(&self.key)?.map_or(0, |list| list.len());
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Llen {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Returns the element at `index` in the list stored at `key`. Negative indices count from the
/// tail, -1 being the last element. Out of range indices return `nil`.
///
/// Ref: <https://redis.io/docs/latest/commands/lindex/>
#[derive(Debug, PartialEq)]
pub struct Lindex {
    pub key: Bytes,
    pub index: i64,
}

impl Executable for Lindex {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let value = store.get_list(&self.key)?.and_then(|list| {
            let index = resolve_index(list.len(), self.index)?;
            list.get(index).cloned()
        });

        Ok(value.map(Frame::Bulk).unwrap_or(Frame::Null))
    }
}

impl TryFrom<&mut CommandParser> for Lindex {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let index = parser.next_integer()?;

        Ok(Self { key, index })
    }
}

/// Sets the list element at `index` to `value`. Unlike `LINDEX`, a missing key or an out of
/// range index is an error.
///
/// Ref: <https://redis.io/docs/latest/commands/lset/>
#[derive(Debug, PartialEq)]
pub struct Lset {
    pub key: Bytes,
    pub index: i64,
    pub value: Bytes,
}

impl Executable for Lset {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let list = store
            .get_list_mut(&self.key)?
            .ok_or(CommandError::NoSuchKey)?;

        let slot = resolve_index(list.len(), self.index)
            .and_then(|index| list.get_mut(index))
            .ok_or(CommandError::IndexOutOfRange)?;
        *slot = self.value;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Lset {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let index = parser.next_integer()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, index, value })
    }
}

/// Returns the specified elements of the list stored at `key`. The offsets `start` and `stop`
/// are zero-based indexes and both are inclusive.
///
/// Ref: <https://redis.io/docs/latest/commands/lrange/>
#[derive(Debug, PartialEq)]
pub struct Lrange {
    pub key: Bytes,
    pub start: i64,
    pub end: i64,
}

impl Executable for Lrange {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(list) = store.get_list(&self.key)? else {
            return Ok(Frame::Array(vec![]));
        };

        let values = match inclusive_range(list.len(), self.start, self.end) {
            Some(range) => list.range(range).cloned().map(Frame::Bulk).collect(),
            None => vec![],
        };

        Ok(Frame::Array(values))
    }
}

impl TryFrom<&mut CommandParser> for Lrange {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let start = parser.next_integer()?;
        let end = parser.next_integer()?;

        Ok(Self { key, start, end })
    }
}

/// Trim an existing list so that it will contain only the specified inclusive range of
/// elements. A range that selects nothing removes the key.
///
/// Ref: <https://redis.io/docs/latest/commands/ltrim/>
#[derive(Debug, PartialEq)]
pub struct Ltrim {
    pub key: Bytes,
    pub start: i64,
    pub end: i64,
}

impl Executable for Ltrim {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(list) = store.get_list_mut(&self.key)? else {
            return Ok(Frame::ok());
        };

        match inclusive_range(list.len(), self.start, self.end) {
            Some(range) => {
                list.truncate(range.end() + 1);
                list.drain(..*range.start());
            }
            None => list.clear(),
        }
        store.remove_if_empty(&self.key);

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Ltrim {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let start = parser.next_integer()?;
        let end = parser.next_integer()?;

        Ok(Self { key, start, end })
    }
}

#[derive(Debug, PartialEq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum InsertPosition {
    Before,
    After,
}

/// Inserts `value` in the list stored at `key` either before or after the first element equal
/// to `pivot`.
///
/// Returns the list length after the insert, -1 when the pivot was not found and 0 when the key
/// does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/linsert/>
#[derive(Debug, PartialEq)]
pub struct Linsert {
    pub key: Bytes,
    pub position: InsertPosition,
    pub pivot: Bytes,
    pub value: Bytes,
}

impl Executable for Linsert {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(list) = store.get_list_mut(&self.key)? else {
            return Ok(Frame::Integer(0));
        };

        let Some(index) = list.iter().position(|item| *item == self.pivot) else {
            return Ok(Frame::Integer(-1));
        };

        let index = match self.position {
            InsertPosition::Before => index,
            InsertPosition::After => index + 1,
        };
        list.insert(index, self.value);

        Ok(Frame::Integer(list.len() as i64))
    }
}

impl TryFrom<&mut CommandParser> for Linsert {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let position = parser.next_string()?;
        let position = InsertPosition::from_str(&position).map_err(|_| CommandError::Syntax)?;
        let pivot = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        Ok(Self {
            key,
            position,
            pivot,
            value,
        })
    }
}

/// Removes the first `count` occurrences of elements equal to `value` from the list stored at
/// `key`.
///
/// * `count > 0`: remove elements moving from head to tail.
/// * `count < 0`: remove elements moving from tail to head.
/// * `count = 0`: remove all elements equal to `value`.
///
/// Ref: <https://redis.io/docs/latest/commands/lrem/>
#[derive(Debug, PartialEq)]
pub struct Lrem {
    pub key: Bytes,
    pub count: i64,
    pub value: Bytes,
}

impl Executable for Lrem {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(list) = store.get_list_mut(&self.key)? else {
            return Ok(Frame::Integer(0));
        };

        let limit = match self.count {
            0 => usize::MAX,
            count => usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX),
        };

        let mut removed = 0;
        if self.count >= 0 {
            let mut index = 0;
            while index < list.len() && removed < limit {
                if list[index] == self.value {
                    list.remove(index);
                    removed += 1;
                } else {
                    index += 1;
                }
            }
        } else {
            let mut index = list.len();
            while index > 0 && removed < limit {
                index -= 1;
                if list[index] == self.value {
                    list.remove(index);
                    removed += 1;
                }
            }
        }
        store.remove_if_empty(&self.key);

        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for Lrem {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let count = parser.next_integer()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, count, value })
    }
}

/// Atomically pops the last element of the `source` list and pushes it to the tail of the
/// `destination` list, creating it when needed. Returns the moved element, or `nil` when the
/// source does not exist.
///
/// Ref: <https://redis.io/docs/latest/commands/rpoplpush/>
#[derive(Debug, PartialEq)]
pub struct Rpoplpush {
    pub source: Bytes,
    pub destination: Bytes,
}

impl Executable for Rpoplpush {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        if store.get_list(&self.source)?.is_none() {
            return Ok(Frame::Null);
        }
        // Both keys are type checked before anything is popped.
        store.get_list(&self.destination)?;

        let Some(value) = store
            .get_list_mut(&self.source)?
            .and_then(|list| list.pop_back())
        else {
            return Ok(Frame::Null);
        };

        store.list_entry(&self.destination)?.push_back(value.clone());
        store.remove_if_empty(&self.source);

        Ok(Frame::Bulk(value))
    }
}

impl TryFrom<&mut CommandParser> for Rpoplpush {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let source = parser.next_key()?;
        let destination = parser.next_key()?;

        Ok(Self {
            source,
            destination,
        })
    }
}
