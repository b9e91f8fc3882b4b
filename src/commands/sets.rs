use bytes::Bytes;
use std::collections::{HashMap, HashSet};

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::{LockedStore, Value};

fn members_frame<'a>(members: impl IntoIterator<Item = &'a Bytes>) -> Frame {
    Frame::Array(members.into_iter().cloned().map(Frame::Bulk).collect())
}

/// Add the specified members to the set stored at `key`. Returns the number of members that
/// were not already part of the set.
///
/// Ref: <https://redis.io/docs/latest/commands/sadd/>
#[derive(Debug, PartialEq)]
pub struct Sadd {
    pub key: Bytes,
    pub members: Vec<Bytes>,
}

impl Executable for Sadd {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let set = store.set_entry(&self.key)?;
        let added = self
            .members
            .into_iter()
            .filter(|member| set.insert(member.clone()))
            .count();

        Ok(Frame::Integer(added as i64))
    }
}

impl TryFrom<&mut CommandParser> for Sadd {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let members = parser.rest_bytes();

        Ok(Self { key, members })
    }
}

/// Remove the specified members from the set stored at `key`. Removing the last member deletes
/// the key.
///
/// Ref: <https://redis.io/docs/latest/commands/srem/>
#[derive(Debug, PartialEq)]
pub struct Srem {
    pub key: Bytes,
    pub members: Vec<Bytes>,
}

impl Executable for Srem {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(set) = store.get_set_mut(&self.key)? else {
            return Ok(Frame::Integer(0));
        };

        let removed = self
            .members
            .iter()
            .filter(|member| set.remove(*member))
            .count();
        store.remove_if_empty(&self.key);

        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for Srem {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let members = parser.rest_bytes();

        Ok(Self { key, members })
    }
}

/// Returns the set cardinality of the set stored at `key`.
///
/// Ref: <https://redis.io/docs/latest/commands/scard/>
#[derive(Debug, PartialEq)]
pub struct Scard {
    pub key: Bytes,
}

impl Executable for Scard {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let len = store.get_set(&self.key)?.map_or(0, |set| set.len());
        Ok(Frame::Integer(len as i64))
    }
}

impl TryFrom<&mut CommandParser> for Scard {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Ref: <https://redis.io/docs/latest/commands/sismember/>
#[derive(Debug, PartialEq)]
pub struct Sismember {
    pub key: Bytes,
    pub member: Bytes,
}

impl Executable for Sismember {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let is_member = store
            .get_set(&self.key)?
            .is_some_and(|set| set.contains(&self.member));

        Ok(Frame::Integer(i64::from(is_member)))
    }
}

impl TryFrom<&mut CommandParser> for Sismember {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        let member = parser.next_bytes()?;

        Ok(Self { key, member })
    }
}

/// Returns all the members of the set value stored at `key`, in no particular order.
///
/// Ref: <https://redis.io/docs/latest/commands/smembers/>
#[derive(Debug, PartialEq)]
pub struct Smembers {
    pub key: Bytes,
}

impl Executable for Smembers {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        match store.get_set(&self.key)? {
            Some(set) => Ok(members_frame(set)),
            None => Ok(Frame::Array(vec![])),
        }
    }
}

impl TryFrom<&mut CommandParser> for Smembers {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_key()?;
        Ok(Self { key })
    }
}

/// Move `member` from the set at `source` to the set at `destination`, creating the destination
/// when needed. Returns 1 if the member was moved and 0 when it is not part of the source.
///
/// Ref: <https://redis.io/docs/latest/commands/smove/>
#[derive(Debug, PartialEq)]
pub struct Smove {
    pub source: Bytes,
    pub destination: Bytes,
    pub member: Bytes,
}

impl Executable for Smove {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let Some(source) = store.get_set(&self.source)? else {
            return Ok(Frame::Integer(0));
        };
        let is_member = source.contains(&self.member);
        store.get_set(&self.destination)?;

        if !is_member {
            return Ok(Frame::Integer(0));
        }

        if let Some(source) = store.get_set_mut(&self.source)? {
            source.remove(&self.member);
        }
        store.set_entry(&self.destination)?.insert(self.member);
        store.remove_if_empty(&self.source);

        Ok(Frame::Integer(1))
    }
}

impl TryFrom<&mut CommandParser> for Smove {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let source = parser.next_key()?;
        let destination = parser.next_key()?;
        let member = parser.next_bytes()?;

        Ok(Self {
            source,
            destination,
            member,
        })
    }
}

// Missing keys behave as empty sets. A key holding another type fails the whole operation.

fn union(store: &LockedStore<'_>, keys: &[Bytes]) -> Result<HashSet<Bytes>, CommandError> {
    let mut result = HashSet::new();
    for key in keys {
        if let Some(set) = store.get_set(key)? {
            result.extend(set.iter().cloned());
        }
    }
    Ok(result)
}

fn intersection(store: &LockedStore<'_>, keys: &[Bytes]) -> Result<HashSet<Bytes>, CommandError> {
    let mut appearances: HashMap<&Bytes, usize> = HashMap::new();
    for key in keys {
        if let Some(set) = store.get_set(key)? {
            for member in set {
                *appearances.entry(member).or_default() += 1;
            }
        }
    }

    Ok(appearances
        .into_iter()
        .filter(|(_, count)| *count == keys.len())
        .map(|(member, _)| member.clone())
        .collect())
}

fn difference(store: &LockedStore<'_>, keys: &[Bytes]) -> Result<HashSet<Bytes>, CommandError> {
    let Some((first, rest)) = keys.split_first() else {
        return Ok(HashSet::new());
    };

    let others = union(store, rest)?;
    let result = store
        .get_set(first)?
        .map(|set| set.difference(&others).cloned().collect())
        .unwrap_or_default();

    Ok(result)
}

/// Replaces `destination` with `result` and returns the resulting cardinality. An empty result
/// leaves `destination` deleted.
fn store_result(
    store: &mut LockedStore<'_>,
    destination: Bytes,
    result: HashSet<Bytes>,
) -> Result<Frame, CommandError> {
    store.get_set(&destination)?;

    let len = result.len();
    if result.is_empty() {
        store.remove(&destination);
    } else {
        store.put(destination, Value::Set(result));
    }

    Ok(Frame::Integer(len as i64))
}

/// Returns the members of the set resulting from the difference between the first set and all
/// the successive sets.
///
/// Ref: <https://redis.io/docs/latest/commands/sdiff/>
#[derive(Debug, PartialEq)]
pub struct Sdiff {
    pub keys: Vec<Bytes>,
}

impl Executable for Sdiff {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = difference(store, &self.keys)?;
        Ok(members_frame(&result))
    }
}

impl TryFrom<&mut CommandParser> for Sdiff {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

/// Like `SDIFF`, but the result is stored in `destination`.
///
/// Ref: <https://redis.io/docs/latest/commands/sdiffstore/>
#[derive(Debug, PartialEq)]
pub struct SdiffStore {
    pub destination: Bytes,
    pub keys: Vec<Bytes>,
}

impl Executable for SdiffStore {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = difference(store, &self.keys)?;
        store_result(store, self.destination, result)
    }
}

impl TryFrom<&mut CommandParser> for SdiffStore {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let destination = parser.next_key()?;
        let keys = parser.rest_keys();

        Ok(Self { destination, keys })
    }
}

/// Returns the members of the set resulting from the intersection of all the given sets.
///
/// Ref: <https://redis.io/docs/latest/commands/sinter/>
#[derive(Debug, PartialEq)]
pub struct Sinter {
    pub keys: Vec<Bytes>,
}

impl Executable for Sinter {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = intersection(store, &self.keys)?;
        Ok(members_frame(&result))
    }
}

impl TryFrom<&mut CommandParser> for Sinter {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

/// Ref: <https://redis.io/docs/latest/commands/sinterstore/>
#[derive(Debug, PartialEq)]
pub struct SinterStore {
    pub destination: Bytes,
    pub keys: Vec<Bytes>,
}

impl Executable for SinterStore {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = intersection(store, &self.keys)?;
        store_result(store, self.destination, result)
    }
}

impl TryFrom<&mut CommandParser> for SinterStore {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let destination = parser.next_key()?;
        let keys = parser.rest_keys();

        Ok(Self { destination, keys })
    }
}

/// Returns the members of the set resulting from the union of all the given sets.
///
/// Ref: <https://redis.io/docs/latest/commands/sunion/>
#[derive(Debug, PartialEq)]
pub struct Sunion {
    pub keys: Vec<Bytes>,
}

impl Executable for Sunion {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = union(store, &self.keys)?;
        Ok(members_frame(&result))
    }
}

impl TryFrom<&mut CommandParser> for Sunion {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest_keys();
        Ok(Self { keys })
    }
}

/// Ref: <https://redis.io/docs/latest/commands/sunionstore/>
#[derive(Debug, PartialEq)]
pub struct SunionStore {
    pub destination: Bytes,
    pub keys: Vec<Bytes>,
}

impl Executable for SunionStore {
    fn exec(self, store: &mut LockedStore<'_>) -> Result<Frame, CommandError> {
        let result = union(store, &self.keys)?;
        store_result(store, self.destination, result)
    }
}

impl TryFrom<&mut CommandParser> for SunionStore {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let destination = parser.next_key()?;
        let keys = parser.rest_keys();

        Ok(Self { destination, keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_utils::{bulks, run, sorted};
    use crate::store::Store;

    fn wrong_type() -> Frame {
        Frame::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
    }

    fn algebra_store() -> Store {
        let store = Store::new();
        run(&store, &["SADD", "sa", "1", "2", "3"]);
        run(&store, &["SADD", "sb", "2", "3", "4"]);
        store
    }

    #[tokio::test]
    async fn sadd_counts_new_members() {
        let store = Store::new();

        assert_eq!(run(&store, &["SADD", "s", "a", "b", "a"]), Frame::Integer(2));
        assert_eq!(run(&store, &["SADD", "s", "b", "c"]), Frame::Integer(1));
        assert_eq!(run(&store, &["SCARD", "s"]), Frame::Integer(3));
        assert_eq!(
            sorted(run(&store, &["SMEMBERS", "s"])),
            bulks(&["a", "b", "c"])
        );
    }

    #[tokio::test]
    async fn srem_removes_key_with_last_member() {
        let store = Store::new();
        run(&store, &["SADD", "s", "a", "b"]);

        assert_eq!(run(&store, &["SREM", "s", "a", "x"]), Frame::Integer(1));
        assert_eq!(run(&store, &["SREM", "s", "b"]), Frame::Integer(1));
        assert_eq!(run(&store, &["EXISTS", "s"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SREM", "s", "b"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn sismember_scard_smembers_on_missing_key() {
        let store = Store::new();
        run(&store, &["SADD", "s", "a"]);

        assert_eq!(run(&store, &["SISMEMBER", "s", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, &["SISMEMBER", "s", "b"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SISMEMBER", "missing", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SCARD", "missing"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SMEMBERS", "missing"]), bulks(&[]));
    }

    #[tokio::test]
    async fn smove() {
        let store = Store::new();
        run(&store, &["SADD", "src", "a", "b"]);

        assert_eq!(run(&store, &["SMOVE", "src", "dst", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, &["SMOVE", "src", "dst", "x"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SMOVE", "missing", "dst", "a"]), Frame::Integer(0));
        assert_eq!(run(&store, &["SMEMBERS", "dst"]), bulks(&["a"]));

        assert_eq!(run(&store, &["SMOVE", "src", "dst", "b"]), Frame::Integer(1));
        assert_eq!(run(&store, &["EXISTS", "src"]), Frame::Integer(0));
        assert_eq!(sorted(run(&store, &["SMEMBERS", "dst"])), bulks(&["a", "b"]));
    }

    #[tokio::test]
    async fn smove_to_wrong_type_keeps_member() {
        let store = Store::new();
        run(&store, &["SADD", "src", "a"]);
        run(&store, &["SET", "dst", "v"]);

        assert_eq!(run(&store, &["SMOVE", "src", "dst", "a"]), wrong_type());
        assert_eq!(run(&store, &["SISMEMBER", "src", "a"]), Frame::Integer(1));
    }

    #[tokio::test]
    async fn smove_within_the_same_set() {
        let store = Store::new();
        run(&store, &["SADD", "s", "a"]);

        assert_eq!(run(&store, &["SMOVE", "s", "s", "a"]), Frame::Integer(1));
        assert_eq!(run(&store, &["SMEMBERS", "s"]), bulks(&["a"]));
    }

    #[tokio::test]
    async fn set_algebra() {
        let store = algebra_store();

        assert_eq!(run(&store, &["SDIFF", "sa", "sb"]), bulks(&["1"]));
        assert_eq!(sorted(run(&store, &["SINTER", "sa", "sb"])), bulks(&["2", "3"]));
        assert_eq!(
            sorted(run(&store, &["SUNION", "sa", "sb"])),
            bulks(&["1", "2", "3", "4"])
        );
    }

    #[tokio::test]
    async fn set_algebra_with_missing_keys() {
        let store = algebra_store();

        assert_eq!(
            sorted(run(&store, &["SDIFF", "sa", "missing"])),
            bulks(&["1", "2", "3"])
        );
        assert_eq!(run(&store, &["SDIFF", "missing", "sa"]), bulks(&[]));
        assert_eq!(run(&store, &["SINTER", "sa", "missing"]), bulks(&[]));
        assert_eq!(
            sorted(run(&store, &["SUNION", "missing", "sb"])),
            bulks(&["2", "3", "4"])
        );
    }

    #[tokio::test]
    async fn set_algebra_with_wrong_type_fails() {
        let store = algebra_store();
        run(&store, &["SET", "string", "v"]);

        assert_eq!(run(&store, &["SDIFF", "sa", "string"]), wrong_type());
        assert_eq!(run(&store, &["SINTER", "missing", "string"]), wrong_type());
        assert_eq!(run(&store, &["SUNION", "sa", "string"]), wrong_type());
    }

    #[tokio::test]
    async fn store_variants_replace_destination() {
        let store = algebra_store();
        run(&store, &["SADD", "dst", "old"]);

        assert_eq!(
            run(&store, &["SUNIONSTORE", "dst", "sa", "sb"]),
            Frame::Integer(4)
        );
        assert_eq!(
            sorted(run(&store, &["SMEMBERS", "dst"])),
            bulks(&["1", "2", "3", "4"])
        );

        assert_eq!(
            run(&store, &["SINTERSTORE", "dst", "sa", "sb"]),
            Frame::Integer(2)
        );
        assert_eq!(sorted(run(&store, &["SMEMBERS", "dst"])), bulks(&["2", "3"]));

        assert_eq!(
            run(&store, &["SDIFFSTORE", "dst", "sa", "sb"]),
            Frame::Integer(1)
        );
        assert_eq!(run(&store, &["SMEMBERS", "dst"]), bulks(&["1"]));

        assert_eq!(
            run(&store, &["SINTERSTORE", "dst", "sa", "missing"]),
            Frame::Integer(0)
        );
        assert_eq!(run(&store, &["EXISTS", "dst"]), Frame::Integer(0));
    }

    #[tokio::test]
    async fn store_variant_can_use_destination_as_source() {
        let store = algebra_store();

        assert_eq!(
            run(&store, &["SUNIONSTORE", "sa", "sa", "sb"]),
            Frame::Integer(4)
        );
        assert_eq!(run(&store, &["SCARD", "sa"]), Frame::Integer(4));
    }

    #[tokio::test]
    async fn store_variant_refuses_non_set_destination() {
        let store = algebra_store();
        run(&store, &["SET", "dst", "v"]);

        assert_eq!(run(&store, &["SUNIONSTORE", "dst", "sa"]), wrong_type());
        assert_eq!(run(&store, &["TYPE", "dst"]), Frame::Simple("string".into()));
    }
}
