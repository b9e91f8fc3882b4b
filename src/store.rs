use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strum_macros::IntoStaticStr;
use thiserror::Error as ThisError;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Duration, Instant};

/// The Store is responsible for managing typed values by key, with optional time-to-live
/// settings for each key. Expired keys are removed by a background task that takes the same
/// lock as commands do, so an expiry never interleaves with a running command.
///
/// The store is shared and cloned cheaply using reference counting. All access goes through
/// [`InnerStore::lock`], which is the single serialization point for every command.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
            ttls: BTreeSet::new(),
        };

        let waker = Notify::new();
        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker,
        });

        tokio::spawn({
            let inner = inner.clone();
            async move { remove_expired_keys(inner).await }
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Notify,
}

impl InnerStore {
    pub fn lock(&self) -> LockedStore<'_> {
        // Poisoning is ignored, the map stays usable after a panicking command.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LockedStore {
            state,
            waker: &self.waker,
        }
    }
}

/// Keys are binary safe, any byte string names a key.
pub type Key = Bytes;

/// The payload of a key. Each variant is one of the supported data types.
#[derive(Clone, Debug, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    /// Reserved, no command creates sorted sets yet.
    #[strum(serialize = "zset")]
    SortedSet,
}

impl Value {
    /// The type name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    /// Whether the value is an empty container. Strings are never considered empty.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::List(list) => list.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::String(_) | Value::SortedSet => false,
        }
    }
}

pub struct Node {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Node {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

struct State {
    keys: HashMap<Key, Node>,
    ttls: BTreeSet<(Instant, Key)>,
}

#[derive(Debug, ThisError, PartialEq)]
#[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
pub struct WrongTypeError;

/// A view of the store while its lock is held.
pub struct LockedStore<'a> {
    state: MutexGuard<'a, State>,
    waker: &'a Notify,
}

impl<'a> LockedStore<'a> {
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        let now = Instant::now();
        self.state
            .keys
            .get(key)
            .filter(|node| !node.is_expired(now))
            .map(|node| &node.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.evict_if_expired(key);
        self.state.keys.get_mut(key).map(|node| &mut node.value)
    }

    /// Stores `value` under `key` as a brand new node, dropping any previous value and TTL.
    pub fn put(&mut self, key: Key, value: Value) {
        self.remove(&key);
        self.state.keys.insert(
            key,
            Node {
                value,
                expires_at: None,
            },
        );
    }

    pub fn set(&mut self, key: Key, data: Bytes) {
        self.put(key, Value::String(data));
    }

    pub fn set_with_ttl(&mut self, key: Key, data: Bytes, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.put(key.clone(), Value::String(data));
        self.schedule(&key, Some(expires_at));
    }

    /// Replaces the payload of `key` while keeping its TTL. Creates the node when absent.
    pub fn update(&mut self, key: &[u8], value: Value) {
        match self.get_mut(key) {
            Some(current) => *current = value,
            None => self.put(Bytes::copy_from_slice(key), value),
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Node> {
        let state = &mut *self.state;
        let node = state.keys.remove(key)?;
        if let Some(expires_at) = node.expires_at {
            state.ttls.remove(&(expires_at, Bytes::copy_from_slice(key)));
        }

        let now = Instant::now();
        if node.is_expired(now) {
            return None;
        }
        Some(node)
    }

    /// Removes `key` when it holds an empty list, hash or set.
    pub fn remove_if_empty(&mut self, key: &[u8]) -> bool {
        let is_empty = self
            .state
            .keys
            .get(key)
            .is_some_and(|node| node.value.is_empty_container());

        if is_empty {
            self.remove(key);
        }
        is_empty
    }

    pub fn flush(&mut self) {
        self.state.keys.clear();
        self.state.ttls.clear();
    }

    /// Sets the time to live of `key` in milliseconds. A positive value (re)schedules the
    /// expiry, anything else clears it. Returns `false` when the key does not exist.
    pub fn set_ttl(&mut self, key: &[u8], ttl_ms: i64) -> bool {
        if !self.exists(key) {
            return false;
        }

        let expires_at = u64::try_from(ttl_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        self.schedule(key, expires_at);
        true
    }

    /// Returns `None` when the key does not exist, `Some(None)` when it has no expiry and the
    /// remaining time to live otherwise.
    pub fn ttl(&self, key: &[u8]) -> Option<Option<Duration>> {
        let now = Instant::now();
        let node = self.state.keys.get(key).filter(|node| !node.is_expired(now))?;

        Some(
            node.expires_at
                .map(|expires_at| expires_at.saturating_duration_since(now)),
        )
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.keys().count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        let now = Instant::now();
        self.state
            .keys
            .iter()
            .filter(move |(_, node)| !node.is_expired(now))
            .map(|(key, _)| key)
    }

    pub fn get_string(&self, key: &[u8]) -> Result<Option<&Bytes>, WrongTypeError> {
        match self.get(key) {
            Some(Value::String(data)) => Ok(Some(data)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    pub fn get_list(&self, key: &[u8]) -> Result<Option<&VecDeque<Bytes>>, WrongTypeError> {
        match self.get(key) {
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    pub fn get_list_mut(
        &mut self,
        key: &[u8],
    ) -> Result<Option<&mut VecDeque<Bytes>>, WrongTypeError> {
        match self.get_mut(key) {
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    /// Returns the list stored at `key`, creating an empty one when the key does not exist.
    pub fn list_entry(&mut self, key: &[u8]) -> Result<&mut VecDeque<Bytes>, WrongTypeError> {
        if !self.exists(key) {
            self.put(Bytes::copy_from_slice(key), Value::List(VecDeque::new()));
        }
        match self.get_mut(key) {
            Some(Value::List(list)) => Ok(list),
            _ => Err(WrongTypeError),
        }
    }

    pub fn get_hash(&self, key: &[u8]) -> Result<Option<&HashMap<Bytes, Bytes>>, WrongTypeError> {
        match self.get(key) {
            Some(Value::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    pub fn get_hash_mut(
        &mut self,
        key: &[u8],
    ) -> Result<Option<&mut HashMap<Bytes, Bytes>>, WrongTypeError> {
        match self.get_mut(key) {
            Some(Value::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    /// Returns the hash stored at `key`, creating an empty one when the key does not exist.
    pub fn hash_entry(&mut self, key: &[u8]) -> Result<&mut HashMap<Bytes, Bytes>, WrongTypeError> {
        if !self.exists(key) {
            self.put(Bytes::copy_from_slice(key), Value::Hash(HashMap::new()));
        }
        match self.get_mut(key) {
            Some(Value::Hash(hash)) => Ok(hash),
            _ => Err(WrongTypeError),
        }
    }

    pub fn get_set(&self, key: &[u8]) -> Result<Option<&HashSet<Bytes>>, WrongTypeError> {
        match self.get(key) {
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    pub fn get_set_mut(&mut self, key: &[u8]) -> Result<Option<&mut HashSet<Bytes>>, WrongTypeError> {
        match self.get_mut(key) {
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(WrongTypeError),
            None => Ok(None),
        }
    }

    /// Returns the set stored at `key`, creating an empty one when the key does not exist.
    pub fn set_entry(&mut self, key: &[u8]) -> Result<&mut HashSet<Bytes>, WrongTypeError> {
        if !self.exists(key) {
            self.put(Bytes::copy_from_slice(key), Value::Set(HashSet::new()));
        }
        match self.get_mut(key) {
            Some(Value::Set(set)) => Ok(set),
            _ => Err(WrongTypeError),
        }
    }

    pub fn remove_expired_keys(&mut self) -> Option<Instant> {
        let now = Instant::now();

        let expired_keys: Vec<(Instant, Key)> = self
            .state
            .ttls
            .iter()
            .take_while(|(expires_at, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (when, key) in expired_keys {
            self.state.keys.remove(&key);
            self.state.ttls.remove(&(when, key));
        }

        self.state
            .ttls
            .iter()
            .next()
            .map(|&(expires_at, _)| expires_at)
    }

    fn evict_if_expired(&mut self, key: &[u8]) {
        let now = Instant::now();
        let expired = self
            .state
            .keys
            .get(key)
            .is_some_and(|node| node.is_expired(now));

        if expired {
            self.remove(key);
        }
    }

    /// Replaces the expiry of an existing node, keeping the TTL index in sync.
    fn schedule(&mut self, key: &[u8], expires_at: Option<Instant>) {
        let state = &mut *self.state;
        let Some(node) = state.keys.get_mut(key) else {
            return;
        };

        if let Some(previous) = node.expires_at.take() {
            state.ttls.remove(&(previous, Bytes::copy_from_slice(key)));
        }

        let Some(expires_at) = expires_at else {
            return;
        };
        node.expires_at = Some(expires_at);
        state.ttls.insert((expires_at, Bytes::copy_from_slice(key)));

        let next_to_expire = state.ttls.iter().next().map(|(_, next)| &next[..]);
        if next_to_expire == Some(key) {
            self.waker.notify_one();
        }
    }
}

async fn remove_expired_keys(store: Arc<InnerStore>) {
    loop {
        let next_expiration = store.lock().remove_expired_keys();

        if let Some(next_expiration) = next_expiration {
            tokio::select! {
                _ = sleep_until(next_expiration) => {}
                _ = store.waker.notified() => {}
            }
        } else {
            store.waker.notified().await;
        }
    }
}
