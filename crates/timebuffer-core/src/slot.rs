//! Single-slot rendezvous shared by one reader and one writer

use crate::config::WaitStrategy;
use crate::payload::Payload;
use crate::{Error, Frame, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Observable state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never primed, or reset
    Uninit,
    /// Waiting for the writer to produce this generation
    Primed(Frame),
    /// Holding the payload for this generation
    Ready(Frame),
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Uninit => write!(f, "uninitialized"),
            SlotState::Primed(g) => write!(f, "primed for frame {}", g),
            SlotState::Ready(g) => write!(f, "ready at frame {}", g),
        }
    }
}

#[derive(Default)]
struct SlotInner {
    /// None until first primed
    generation: Option<Frame>,
    pending: bool,
    /// Last published payload, kept across priming
    payload: Option<Payload>,
}

impl SlotInner {
    fn state(&self) -> SlotState {
        match self.generation {
            None => SlotState::Uninit,
            Some(g) if self.pending => SlotState::Primed(g),
            Some(g) => SlotState::Ready(g),
        }
    }
}

/// Shared channel state for one key
///
/// Every transition happens under the slot mutex and either completes or
/// leaves the slot untouched. Payload bytes are moved in on publish and
/// copied out on consume while the lock is held.
pub struct BufferSlot {
    key: String,
    inner: Mutex<SlotInner>,
    /// Signalled on publish and reset
    changed: Condvar,
}

impl BufferSlot {
    pub(crate) fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            inner: Mutex::new(SlotInner::default()),
            changed: Condvar::new(),
        }
    }

    /// Get key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lock the slot for a multi-step operation
    pub(crate) fn lock(&self) -> SlotGuard<'_> {
        SlotGuard {
            slot: self,
            inner: self.inner.lock(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().state()
    }

    pub fn generation(&self) -> Option<Frame> {
        self.inner.lock().generation
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending
    }

    /// Whether any payload has been published since the last reset
    pub fn has_payload(&self) -> bool {
        self.inner.lock().payload.is_some()
    }

    /// Generation after `frame`; the last representable frame has none
    pub(crate) fn next_generation(&self, frame: Frame) -> Result<Frame> {
        frame.checked_add(1).ok_or_else(|| Error::OrderingViolation {
            key: self.key.clone(),
            frame,
            reason: format!("no frame follows {}", frame),
        })
    }

    /// Any state → Uninit
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Any state → Primed(generation)
    pub fn prime(&self, generation: Frame) {
        self.lock().prime(generation);
    }

    /// Primed(expected) → Ready(expected)
    pub fn publish(&self, payload: Payload, expected: Frame) -> Result<()> {
        self.lock().publish(payload, expected)
    }

    /// Ready(expected) → Primed(expected + 1), returning a copy of the payload
    pub fn consume(&self, expected: Frame) -> Result<Payload> {
        self.lock().consume(expected)
    }
}

impl fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlot")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

/// Locked view of a slot
pub(crate) struct SlotGuard<'a> {
    slot: &'a BufferSlot,
    inner: MutexGuard<'a, SlotInner>,
}

impl SlotGuard<'_> {
    pub(crate) fn state(&self) -> SlotState {
        self.inner.state()
    }

    /// Last published payload, whatever its generation
    pub(crate) fn stored(&self) -> Option<&Payload> {
        self.inner.payload.as_ref()
    }

    pub(crate) fn reset(&mut self) {
        *self.inner = SlotInner::default();
        debug!(key = %self.slot.key, "slot reset");
        self.slot.changed.notify_all();
    }

    pub(crate) fn prime(&mut self, generation: Frame) {
        self.inner.generation = Some(generation);
        self.inner.pending = true;
        debug!(key = %self.slot.key, generation, "slot primed");
    }

    pub(crate) fn publish(&mut self, payload: Payload, expected: Frame) -> Result<()> {
        let state = self.inner.state();
        if state != SlotState::Primed(expected) {
            return Err(self.violation(
                expected,
                format!("cannot publish generation {} while {}", expected, state),
            ));
        }
        self.inner.payload = Some(payload);
        self.inner.pending = false;
        debug!(key = %self.slot.key, generation = expected, "slot ready");
        self.slot.changed.notify_all();
        Ok(())
    }

    pub(crate) fn next_generation(&self, frame: Frame) -> Result<Frame> {
        self.slot.next_generation(frame)
    }

    pub(crate) fn consume(&mut self, expected: Frame) -> Result<Payload> {
        let next = self.next_generation(expected)?;
        let state = self.inner.state();
        let payload = match (&self.inner.payload, state) {
            (Some(payload), SlotState::Ready(g)) if g == expected => payload.clone(),
            _ => {
                return Err(self.violation(
                    expected,
                    format!("cannot consume generation {} while {}", expected, state),
                ))
            }
        };
        self.prime(next);
        Ok(payload)
    }

    /// Release the lock for at most `slice`, then reacquire it
    pub(crate) fn wait(&mut self, slice: Duration, strategy: WaitStrategy) {
        trace!(key = %self.slot.key, ?slice, "waiting for writer");
        match strategy {
            WaitStrategy::Notify => {
                self.slot.changed.wait_for(&mut self.inner, slice);
            }
            WaitStrategy::Poll => {
                MutexGuard::unlocked(&mut self.inner, || std::thread::sleep(slice));
            }
        }
    }

    fn violation(&self, frame: Frame, reason: String) -> Error {
        Error::OrderingViolation {
            key: self.slot.key.clone(),
            frame,
            reason,
        }
    }
}
