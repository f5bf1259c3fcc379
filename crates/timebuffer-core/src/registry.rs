//! Key → slot directory

use crate::slot::BufferSlot;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Endpoint role on a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => f.write_str("reader"),
            Role::Writer => f.write_str("writer"),
        }
    }
}

/// Process-unique endpoint identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EndpointId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Channel key: a user-supplied name inside a scope
///
/// The scope keeps independent graphs from sharing names. Rendered as
/// `scope.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    scope: String,
    name: String,
}

impl Key {
    pub fn new(scope: &str, name: &str) -> Self {
        Self {
            scope: scope.to_string(),
            name: name.to_string(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// An empty name binds nothing
    pub fn is_unbound(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope, self.name)
    }
}

struct Entry {
    slot: Arc<BufferSlot>,
    reader: Option<EndpointId>,
    writer: Option<EndpointId>,
}

impl Entry {
    fn holder(&mut self, role: Role) -> &mut Option<EndpointId> {
        match role {
            Role::Reader => &mut self.reader,
            Role::Writer => &mut self.writer,
        }
    }

    fn is_vacant(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}

/// Directory of live slots
///
/// A slot is created on the first bind to its key and dropped from the
/// directory when its last endpoint unbinds. Each key admits one reader and
/// one writer. The directory lock is never held while a slot is locked, so a
/// reader waiting on one key does not stall binds on another.
pub struct Registry {
    entries: Mutex<HashMap<Key, Entry>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Process-wide registry, created on first use
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.get_or_init(Registry::new).clone()
    }

    /// Bind `id` as `role` on `key`, creating the slot if needed
    pub fn bind(&self, key: &Key, role: Role, id: EndpointId) -> Result<Arc<BufferSlot>> {
        if key.is_unbound() {
            return Err(Error::Unbound(role));
        }
        let mut entries = self.entries.lock();
        Self::bind_locked(&mut entries, key, role, id)
    }

    /// Release `role` on `key` if `id` holds it
    pub fn unbind(&self, key: &Key, role: Role, id: EndpointId) {
        let mut entries = self.entries.lock();
        Self::unbind_locked(&mut entries, key, role, id);
    }

    /// Move `id` from `old` to `new`
    ///
    /// On collision nothing changes and `id` keeps its binding on `old`.
    pub fn rename(
        &self,
        old: &Key,
        new: &Key,
        role: Role,
        id: EndpointId,
    ) -> Result<Arc<BufferSlot>> {
        if new.is_unbound() {
            return Err(Error::Unbound(role));
        }
        let mut entries = self.entries.lock();
        if old != new {
            Self::check_vacant(&mut entries, new, role, id)?;
            Self::unbind_locked(&mut entries, old, role, id);
        }
        Self::bind_locked(&mut entries, new, role, id)
    }

    /// Whether a reader is bound on `key`
    pub fn has_reader(&self, key: &Key) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.reader.is_some())
    }

    /// Whether a writer is bound on `key`
    pub fn has_writer(&self, key: &Key) -> bool {
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.writer.is_some())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Slot for `key`, if any endpoint is bound to it
    pub fn slot(&self, key: &Key) -> Option<Arc<BufferSlot>> {
        self.entries.lock().get(key).map(|e| Arc::clone(&e.slot))
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check_vacant(
        entries: &mut HashMap<Key, Entry>,
        key: &Key,
        role: Role,
        id: EndpointId,
    ) -> Result<()> {
        match entries.get_mut(key).and_then(|e| *e.holder(role)) {
            Some(holder) if holder != id => Err(Error::NameCollision {
                key: key.to_string(),
                role,
            }),
            _ => Ok(()),
        }
    }

    fn bind_locked(
        entries: &mut HashMap<Key, Entry>,
        key: &Key,
        role: Role,
        id: EndpointId,
    ) -> Result<Arc<BufferSlot>> {
        Self::check_vacant(entries, key, role, id)?;
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!(%key, "slot created");
            Entry {
                slot: Arc::new(BufferSlot::new(&key.to_string())),
                reader: None,
                writer: None,
            }
        });
        *entry.holder(role) = Some(id);
        debug!(%key, %role, endpoint = id.get(), "endpoint bound");
        Ok(Arc::clone(&entry.slot))
    }

    fn unbind_locked(entries: &mut HashMap<Key, Entry>, key: &Key, role: Role, id: EndpointId) {
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        let holder = entry.holder(role);
        if *holder != Some(id) {
            return;
        }
        *holder = None;
        debug!(%key, %role, endpoint = id.get(), "endpoint unbound");
        if entry.is_vacant() {
            entries.remove(key);
            debug!(%key, "slot removed");
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .finish()
    }
}
