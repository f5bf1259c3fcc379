//! RAII registry binding

use crate::registry::{EndpointId, Key, Registry, Role};
use crate::slot::BufferSlot;
use crate::{Error, Result};
use std::sync::Arc;

/// An endpoint's claim on a key
///
/// Holds the slot while bound and releases the role on drop, so the registry
/// forgets a slot once both of its endpoints are gone.
pub(crate) struct Binding {
    registry: Arc<Registry>,
    id: EndpointId,
    role: Role,
    key: Key,
    /// None while the name is empty
    slot: Option<Arc<BufferSlot>>,
}

impl Binding {
    /// Claim `role` on `scope.name`; an empty name stays unbound
    pub(crate) fn new(registry: Arc<Registry>, scope: &str, name: &str, role: Role) -> Result<Self> {
        let id = EndpointId::next();
        let key = Key::new(scope, name);
        let slot = if key.is_unbound() {
            None
        } else {
            Some(registry.bind(&key, role, id)?)
        };
        Ok(Self {
            registry,
            id,
            role,
            key,
            slot,
        })
    }

    pub(crate) fn id(&self) -> EndpointId {
        self.id
    }

    pub(crate) fn key(&self) -> &Key {
        &self.key
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.slot.is_some()
    }

    /// Bound slot, or `Unbound`
    pub(crate) fn slot(&self) -> Result<&Arc<BufferSlot>> {
        self.slot.as_ref().ok_or(Error::Unbound(self.role))
    }

    /// Move to another name in the same scope
    ///
    /// On collision the current binding is kept.
    pub(crate) fn rename(&mut self, name: &str) -> Result<()> {
        let new = Key::new(self.key.scope(), name);
        if new.is_unbound() {
            self.release();
        } else if self.slot.is_some() {
            self.slot = Some(self.registry.rename(&self.key, &new, self.role, self.id)?);
        } else {
            self.slot = Some(self.registry.bind(&new, self.role, self.id)?);
        }
        self.key = new;
        Ok(())
    }

    fn release(&mut self) {
        if self.slot.take().is_some() {
            self.registry.unbind(&self.key, self.role, self.id);
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_unbinds() {
        let registry = Registry::new();
        let binding = Binding::new(Arc::clone(&registry), "g", "fb", Role::Reader).unwrap();
        assert!(binding.is_bound());
        assert!(registry.has_reader(binding.key()));
        drop(binding);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_leaves_unbound() {
        let registry = Registry::new();
        let binding = Binding::new(Arc::clone(&registry), "g", "", Role::Writer).unwrap();
        assert!(!binding.is_bound());
        assert_eq!(binding.slot().unwrap_err(), Error::Unbound(Role::Writer));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_rename_through_empty_name() {
        let registry = Registry::new();
        let mut binding = Binding::new(Arc::clone(&registry), "g", "a", Role::Reader).unwrap();

        binding.rename("").unwrap();
        assert!(!binding.is_bound());
        assert!(registry.is_empty());

        binding.rename("b").unwrap();
        assert!(binding.is_bound());
        assert_eq!(registry.keys(), vec![Key::new("g", "b")]);
    }

    #[test]
    fn test_failed_rename_keeps_key() {
        let registry = Registry::new();
        let _other = Binding::new(Arc::clone(&registry), "g", "b", Role::Reader).unwrap();
        let mut binding = Binding::new(Arc::clone(&registry), "g", "a", Role::Reader).unwrap();

        assert!(binding.rename("b").is_err());
        assert_eq!(binding.key().name(), "a");
        assert!(registry.has_reader(&Key::new("g", "a")));
    }
}
