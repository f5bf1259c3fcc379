//! Write side of a time buffer

use crate::binding::Binding;
use crate::config::WriterConfig;
use crate::payload::{Payload, RenderScale};
use crate::registry::{EndpointId, Key, Registry, Role};
use crate::{Error, Frame, Result};
use std::sync::Arc;

/// Publishes the frame N result for the paired reader's frame N+1
pub struct WriterEndpoint {
    binding: Binding,
    config: WriterConfig,
}

impl WriterEndpoint {
    /// Create a writer in `scope`, bound to `config.name` unless it is empty
    pub fn new(registry: Arc<Registry>, scope: &str, config: WriterConfig) -> Result<Self> {
        let binding = Binding::new(registry, scope, &config.name, Role::Writer)?;
        Ok(Self { binding, config })
    }

    pub fn id(&self) -> EndpointId {
        self.binding.id()
    }

    pub fn key(&self) -> &Key {
        self.binding.key()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Rebind under another name; an empty name unbinds
    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.binding.rename(name)?;
        self.config.name = name.to_string();
        Ok(())
    }

    /// Whether a reader is bound to the same key
    pub fn has_counterpart(&self) -> bool {
        self.is_bound() && self.binding.registry().has_reader(self.key())
    }

    /// Hand `payload`, rendered at `scale`, to the reader's next frame
    ///
    /// Fails with [`Error::MissingCounterpart`] when no reader shares the key,
    /// and with [`Error::OrderingViolation`] unless the reader has primed the
    /// slot for `frame + 1` and nothing was published for it yet.
    pub fn publish(&self, frame: Frame, payload: Payload, scale: RenderScale) -> Result<()> {
        let slot = self.binding.slot()?;
        if !self.has_counterpart() {
            return Err(Error::MissingCounterpart(self.key().to_string()));
        }
        let generation = slot.next_generation(frame)?;
        slot.publish(payload.with_render_scale(scale), generation)
    }
}

impl std::fmt::Debug for WriterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterEndpoint")
            .field("key", self.key())
            .finish()
    }
}
