//! Real-time safe event reporting.
//!
//! The audio thread must not format strings or touch the logger, so it pushes
//! small `Copy` events into a fixed ring instead. A background task drains the
//! ring and forwards each event to the `log` facade.

use crate::error::ConfigurationError;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RtEvent {
    /// A block was passed through because the host buffer did not match the
    /// prepared configuration.
    Configuration(ConfigurationError),
    /// A new parameter snapshot reached the audio thread.
    SettingsApplied { threshold_db: f32, ratio: f32 },
}

/// Single-producer ring. The audio thread is the only producer; `drain` is
/// guarded so at most one consumer runs at a time.
pub struct EventRing {
    head: AtomicUsize,
    tail: AtomicUsize,
    draining: AtomicBool,
    dropped: AtomicUsize,
    buf: Box<[UnsafeCell<Option<RtEvent>>]>,
}

// SAFETY: slots are written only by the producer before publishing `head`, and
// read only by the single active consumer before publishing `tail`.
unsafe impl Sync for EventRing {}

impl Default for EventRing {
    fn default() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }
}

impl EventRing {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = capacity.max(1) + 1;
        let buf = (0..slots)
            .map(|_| UnsafeCell::new(None))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            draining: AtomicBool::new(false),
            dropped: AtomicUsize::new(0),
            buf,
        }
    }

    /// Wait-free. Returns `false` (and counts a drop) when the ring is full.
    pub fn push(&self, event: RtEvent) -> bool {
        let cap = self.buf.len();
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % cap;
        if next == self.tail.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        unsafe {
            *self.buf[head].get() = Some(event);
        }
        self.head.store(next, Ordering::Release);
        true
    }

    fn pop(&self) -> Option<RtEvent> {
        let cap = self.buf.len();
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let event = unsafe { (*self.buf[tail].get()).take() };
        self.tail.store((tail + 1) % cap, Ordering::Release);
        event
    }

    /// Hand every queued event to `sink`. Returns how many were delivered.
    /// If another drain is already running this returns 0 immediately.
    pub fn drain(&self, mut sink: impl FnMut(RtEvent)) -> usize {
        if self.draining.swap(true, Ordering::Acquire) {
            return 0;
        }
        let mut count = 0;
        while let Some(event) = self.pop() {
            sink(event);
            count += 1;
        }
        self.draining.store(false, Ordering::Release);
        count
    }

    /// Forward queued events to the logger. Not for the audio thread.
    pub fn drain_to_log(&self) -> usize {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("{} audio-thread events were dropped", dropped);
        }
        self.drain(|event| match event {
            RtEvent::Configuration(err) => {
                log::warn!("block passed through unprocessed: {}", err)
            }
            RtEvent::SettingsApplied {
                threshold_db,
                ratio,
            } => log::debug!(
                "settings applied: threshold {:.1} dB, ratio {:.1}:1",
                threshold_db,
                ratio
            ),
        })
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let ring = EventRing::with_capacity(4);
        assert!(ring.push(RtEvent::Configuration(ConfigurationError::NotPrepared)));
        assert!(ring.push(RtEvent::SettingsApplied {
            threshold_db: -12.0,
            ratio: 4.0
        }));

        let mut seen = Vec::new();
        assert_eq!(ring.drain(|e| seen.push(e)), 2);
        assert_eq!(
            seen,
            vec![
                RtEvent::Configuration(ConfigurationError::NotPrepared),
                RtEvent::SettingsApplied {
                    threshold_db: -12.0,
                    ratio: 4.0
                },
            ]
        );
        assert_eq!(ring.drain(|_| {}), 0);
    }

    #[test]
    fn test_full_ring_drops() {
        let ring = EventRing::with_capacity(2);
        let ev = RtEvent::Configuration(ConfigurationError::NoChannels);
        assert!(ring.push(ev));
        assert!(ring.push(ev));
        assert!(!ring.push(ev));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.drain_to_log(), 2);
        assert_eq!(ring.dropped(), 0);
        assert!(ring.push(ev));
    }

    #[test]
    fn test_push_does_not_allocate() {
        let ring = EventRing::default();
        assert_no_alloc::assert_no_alloc(|| {
            for _ in 0..(EVENT_CAPACITY + 10) {
                ring.push(RtEvent::Configuration(ConfigurationError::NotPrepared));
            }
        });
        assert_eq!(ring.dropped(), 10);
    }
}
