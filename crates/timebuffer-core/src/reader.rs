//! Read side of a time buffer

use crate::binding::Binding;
use crate::cancel::CancelToken;
use crate::config::{OrderingPolicy, ReaderConfig, WaitStrategy};
use crate::payload::{Payload, RenderScale};
use crate::registry::{EndpointId, Key, Registry, Role};
use crate::slot::{SlotGuard, SlotState};
use crate::{Error, Frame, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// First wait slice while the writer has not produced the frame
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Upper bound on a single wait slice
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(1000);

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RETRY_DELAY)
}

/// Longest wait slice an acquire bounded by `timeout` can reach
///
/// Slices start at [`INITIAL_RETRY_DELAY`] and double up to
/// [`MAX_RETRY_DELAY`]. A timeout is noticed at most one such slice late.
pub fn longest_retry_slice(timeout: Duration) -> Duration {
    let mut waited = Duration::ZERO;
    let mut delay = INITIAL_RETRY_DELAY;
    while waited + delay < timeout {
        waited += delay;
        delay = next_delay(delay);
    }
    delay
}

/// Consumes, at frame N, what the paired writer published at frame N-1
pub struct ReaderEndpoint {
    binding: Binding,
    config: ReaderConfig,
}

impl ReaderEndpoint {
    /// Create a reader in `scope`, bound to `config.name` unless it is empty
    pub fn new(registry: Arc<Registry>, scope: &str, config: ReaderConfig) -> Result<Self> {
        let binding = Binding::new(registry, scope, &config.name, Role::Reader)?;
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

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn set_start_frame(&mut self, start_frame: Frame) {
        self.config.start_frame = start_frame;
    }

    pub fn set_policy(&mut self, policy: OrderingPolicy) {
        self.config.policy = policy;
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.config.timeout_ms = timeout_ms;
    }

    pub fn set_wait(&mut self, wait: WaitStrategy) {
        self.config.wait = wait;
    }

    /// Rebind under another name; an empty name unbinds
    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.binding.rename(name)?;
        self.config.name = name.to_string();
        Ok(())
    }

    /// Whether a writer is bound to the same key
    pub fn has_counterpart(&self) -> bool {
        self.is_bound() && self.binding.registry().has_writer(self.key())
    }

    /// Slot state, or None while unbound
    pub fn state(&self) -> Option<SlotState> {
        self.binding.slot().ok().map(|slot| slot.state())
    }

    /// Return the channel to its uninitialized state
    pub fn reset(&self) {
        if let Ok(slot) = self.binding.slot() {
            slot.reset();
        }
    }

    /// Fetch the payload published for `frame - 1`
    ///
    /// Frames at or before the start frame get an empty payload without
    /// waiting; the start frame also primes the channel for the frame after
    /// it. Later frames wait while the writer has not produced the frame yet.
    /// Generation or render-scale mismatches and timeouts go through the
    /// configured [`OrderingPolicy`]. The render scale is compared against the
    /// stored payload before every wait, so a scale change is reported at once
    /// instead of after the timeout. A cancelled token aborts the wait with
    /// [`Error::Cancelled`] and leaves the slot as it was.
    pub fn acquire(
        &self,
        frame: Frame,
        scale: RenderScale,
        cancel: Option<&CancelToken>,
    ) -> Result<Payload> {
        let slot = self.binding.slot()?;
        let start_frame = self.config.start_frame;
        if frame <= start_frame {
            if frame == start_frame {
                slot.prime(slot.next_generation(start_frame)?);
            }
            return Ok(Payload::default());
        }

        let timeout = match self.config.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        let began = Instant::now();
        let mut delay = INITIAL_RETRY_DELAY;
        let mut guard = slot.lock();

        loop {
            let state = guard.state();
            let current = matches!(
                state,
                SlotState::Primed(g) | SlotState::Ready(g) if g == frame
            );
            if !current {
                let err = self.violation(frame, format!("slot is {}", state));
                return self.recover(&mut guard, frame, err);
            }
            let stored = guard.stored().map(|p| p.render_scale());
            if let Some(stored) = stored.filter(|s| *s != scale) {
                let err = self.violation(
                    frame,
                    format!("stored at scale {:?}, requested {:?}", stored, scale),
                );
                return self.recover(&mut guard, frame, err);
            }
            if let SlotState::Ready(_) = state {
                return guard.consume(frame);
            }

            let mut slice = delay;
            if let Some(timeout) = timeout {
                let elapsed = began.elapsed();
                if elapsed >= timeout {
                    let err = Error::Timeout {
                        key: self.key().to_string(),
                        frame,
                        timeout_ms: self.config.timeout_ms,
                    };
                    return self.recover(&mut guard, frame, err);
                }
                slice = slice.min(timeout - elapsed);
            }
            guard.wait(slice, self.config.wait);
            if cancel.is_some_and(CancelToken::is_cancelled) {
                debug!(key = %self.key(), frame, "acquire cancelled");
                return Err(Error::Cancelled);
            }
            delay = next_delay(delay);
        }
    }

    /// Apply the ordering policy to a violation or timeout
    fn recover(&self, guard: &mut SlotGuard<'_>, frame: Frame, err: Error) -> Result<Payload> {
        match self.config.policy {
            OrderingPolicy::Error => Err(err),
            OrderingPolicy::Black => {
                let next = guard.next_generation(frame)?;
                warn!(key = %self.key(), frame, error = %err, "substituting empty payload");
                guard.prime(next);
                Ok(Payload::default())
            }
            OrderingPolicy::Last => {
                let Some(last) = guard.stored().cloned() else {
                    return Err(err);
                };
                let next = guard.next_generation(frame)?;
                warn!(key = %self.key(), frame, error = %err, "reusing last stored payload");
                guard.prime(next);
                Ok(last)
            }
        }
    }

    fn violation(&self, frame: Frame, reason: String) -> Error {
        Error::OrderingViolation {
            key: self.key().to_string(),
            frame,
            reason,
        }
    }
}

impl std::fmt::Debug for ReaderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderEndpoint")
            .field("key", self.key())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, Precision};
    use crate::payload::{Descriptor, Rect};
    use crate::Status;

    fn reader(registry: &Arc<Registry>, config: ReaderConfig) -> ReaderEndpoint {
        ReaderEndpoint::new(Arc::clone(registry), "test", config).unwrap()
    }

    fn payload(fill: u8) -> Payload {
        let desc = Descriptor::new(Rect::new(0, 0, 1, 1), ChannelLayout::Rgba, Precision::UInt8);
        Payload::new(desc, vec![fill; 4]).unwrap()
    }

    /// Slot published for `generation`
    fn ready(reader: &ReaderEndpoint, generation: Frame, p: Payload) {
        let slot = reader.binding.slot().unwrap();
        slot.prime(generation);
        slot.publish(p, generation).unwrap();
    }

    #[test]
    fn test_before_start_frame_is_empty() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb").with_start_frame(5));

        assert!(r.acquire(3, RenderScale::IDENTITY, None).unwrap().is_empty());
        assert_eq!(r.state(), Some(SlotState::Uninit));

        assert!(r.acquire(5, RenderScale::IDENTITY, None).unwrap().is_empty());
        assert_eq!(r.state(), Some(SlotState::Primed(6)));
    }

    #[test]
    fn test_unbound_reader() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::default());
        assert!(!r.is_bound());
        assert_eq!(r.state(), None);
        let err = r.acquire(1, RenderScale::IDENTITY, None).unwrap_err();
        assert_eq!(err, Error::Unbound(Role::Reader));
    }

    #[test]
    fn test_consume_ready_frame() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb"));
        ready(&r, 2, payload(4));

        let out = r.acquire(2, RenderScale::IDENTITY, None).unwrap();
        assert_eq!(out.data(), &[4; 4]);
        assert_eq!(r.state(), Some(SlotState::Primed(3)));
    }

    #[test]
    fn test_generation_mismatch_error_policy() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb"));
        ready(&r, 2, payload(4));

        let err = r.acquire(4, RenderScale::IDENTITY, None).unwrap_err();
        assert_eq!(err.status(), Status::OrderingViolation);
        assert_eq!(r.state(), Some(SlotState::Ready(2)));
    }

    #[test]
    fn test_generation_mismatch_black_policy() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Black),
        );
        ready(&r, 2, payload(4));

        let out = r.acquire(4, RenderScale::IDENTITY, None).unwrap();
        assert!(out.is_empty());
        assert_eq!(r.state(), Some(SlotState::Primed(5)));
    }

    #[test]
    fn test_generation_mismatch_last_policy() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Last),
        );
        ready(&r, 2, payload(4));

        let out = r.acquire(9, RenderScale::IDENTITY, None).unwrap();
        assert_eq!(out.data(), &[4; 4]);
        assert_eq!(r.state(), Some(SlotState::Primed(10)));
    }

    #[test]
    fn test_last_policy_without_payload_fails() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Last),
        );
        let err = r.acquire(3, RenderScale::IDENTITY, None).unwrap_err();
        assert!(matches!(err, Error::OrderingViolation { .. }));
        assert_eq!(r.state(), Some(SlotState::Uninit));
    }

    #[test]
    fn test_scale_mismatch() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb"));
        ready(&r, 2, payload(4));

        let half = RenderScale::new(0.5, 0.5, 1.0);
        let err = r.acquire(2, half, None).unwrap_err();
        assert_eq!(err.status(), Status::OrderingViolation);
        assert_eq!(r.state(), Some(SlotState::Ready(2)));

        assert!(r.acquire(2, RenderScale::IDENTITY, None).is_ok());
    }

    #[test]
    fn test_scale_mismatch_black_policy() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Black),
        );
        ready(&r, 2, payload(4));

        let out = r.acquire(2, RenderScale::new(0.5, 0.5, 1.0), None).unwrap();
        assert!(out.is_empty());
        assert_eq!(r.state(), Some(SlotState::Primed(3)));
    }

    #[test]
    fn test_scale_mismatch_last_policy() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Last),
        );
        ready(&r, 2, payload(4));

        let out = r.acquire(2, RenderScale::new(0.5, 0.5, 1.0), None).unwrap();
        assert_eq!(out.data(), &[4; 4]);
        assert_eq!(out.render_scale(), RenderScale::IDENTITY);
        assert_eq!(r.state(), Some(SlotState::Primed(3)));
    }

    #[test]
    fn test_scale_change_while_primed_fails_without_waiting() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb").with_timeout_ms(5000));
        ready(&r, 2, payload(4));
        r.acquire(2, RenderScale::IDENTITY, None).unwrap();
        assert_eq!(r.state(), Some(SlotState::Primed(3)));

        let start = Instant::now();
        let err = r.acquire(3, RenderScale::new(0.5, 0.5, 1.0), None).unwrap_err();
        assert!(matches!(err, Error::OrderingViolation { frame: 3, .. }));
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(r.state(), Some(SlotState::Primed(3)));
    }

    #[test]
    fn test_scale_change_while_primed_black_policy_heals() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb")
                .with_policy(OrderingPolicy::Black)
                .with_timeout_ms(5000),
        );
        ready(&r, 2, payload(4));
        r.acquire(2, RenderScale::IDENTITY, None).unwrap();

        let half = RenderScale::new(0.5, 0.5, 1.0);
        let start = Instant::now();
        assert!(r.acquire(3, half, None).unwrap().is_empty());
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(r.state(), Some(SlotState::Primed(4)));

        // 新比例的数据到达后恢复正常
        let slot = r.binding.slot().unwrap();
        slot.publish(payload(7).with_render_scale(half), 4).unwrap();
        assert_eq!(r.acquire(4, half, None).unwrap().data(), &[7; 4]);
    }

    #[test]
    fn test_last_start_frame_has_no_successor() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb").with_start_frame(Frame::MAX));

        assert!(r.acquire(Frame::MAX - 1, RenderScale::IDENTITY, None).unwrap().is_empty());
        let err = r.acquire(Frame::MAX, RenderScale::IDENTITY, None).unwrap_err();
        assert!(matches!(err, Error::OrderingViolation { frame: Frame::MAX, .. }));
        assert_eq!(r.state(), Some(SlotState::Uninit));
    }

    #[test]
    fn test_black_policy_at_last_frame_reports_violation() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb").with_policy(OrderingPolicy::Black),
        );
        ready(&r, 2, payload(4));

        let err = r.acquire(Frame::MAX, RenderScale::IDENTITY, None).unwrap_err();
        assert_eq!(err.status(), Status::OrderingViolation);
        assert_eq!(r.state(), Some(SlotState::Ready(2)));
    }

    #[test]
    fn test_retry_slices_double_up_to_cap() {
        assert_eq!(longest_retry_slice(Duration::ZERO), INITIAL_RETRY_DELAY);
        assert_eq!(longest_retry_slice(Duration::from_millis(5)), Duration::from_millis(5));
        assert_eq!(longest_retry_slice(Duration::from_millis(6)), Duration::from_millis(10));
        assert_eq!(longest_retry_slice(Duration::from_millis(60)), Duration::from_millis(40));
        assert_eq!(longest_retry_slice(Duration::from_secs(3600)), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_timeout_error_policy() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb").with_timeout_ms(30));
        r.acquire(1, RenderScale::IDENTITY, None).unwrap();

        let start = Instant::now();
        let err = r.acquire(2, RenderScale::IDENTITY, None).unwrap_err();
        assert!(matches!(err, Error::Timeout { timeout_ms: 30, .. }));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(r.state(), Some(SlotState::Primed(2)));
    }

    #[test]
    fn test_timeout_black_policy_advances() {
        let registry = Registry::new();
        let r = reader(
            &registry,
            ReaderConfig::new("fb")
                .with_timeout_ms(10)
                .with_policy(OrderingPolicy::Black)
                .with_wait(WaitStrategy::Poll),
        );
        r.acquire(1, RenderScale::IDENTITY, None).unwrap();

        assert!(r.acquire(2, RenderScale::IDENTITY, None).unwrap().is_empty());
        assert_eq!(r.state(), Some(SlotState::Primed(3)));
    }

    #[test]
    fn test_cancelled_wait_leaves_slot() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb"));
        r.acquire(1, RenderScale::IDENTITY, None).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let err = r.acquire(2, RenderScale::IDENTITY, Some(&token)).unwrap_err();
        assert_eq!(err, Error::Cancelled);
        assert_eq!(r.state(), Some(SlotState::Primed(2)));
    }

    #[test]
    fn test_reset_then_restart() {
        let registry = Registry::new();
        let r = reader(&registry, ReaderConfig::new("fb"));
        ready(&r, 2, payload(4));

        r.reset();
        r.reset();
        assert_eq!(r.state(), Some(SlotState::Uninit));

        assert!(r.acquire(1, RenderScale::IDENTITY, None).unwrap().is_empty());
        assert_eq!(r.state(), Some(SlotState::Primed(2)));
    }

    #[test]
    fn test_rename_and_settings() {
        let registry = Registry::new();
        let mut r = reader(&registry, ReaderConfig::new("a"));
        r.rename("b").unwrap();
        assert_eq!(r.key().name(), "b");
        assert_eq!(r.config().name, "b");
        assert!(registry.has_reader(&Key::new("test", "b")));

        r.set_policy(OrderingPolicy::Last);
        r.set_timeout_ms(12);
        r.set_start_frame(0);
        assert_eq!(r.config().policy, OrderingPolicy::Last);
        assert_eq!(r.config().timeout_ms, 12);
        assert_eq!(r.config().start_frame, 0);
    }
}
