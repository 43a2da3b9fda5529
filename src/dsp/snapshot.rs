//! Lock-free parameter hand-off between control threads and the audio thread.
//!
//! Floats are stored as their bit patterns in `AtomicU32`s and guarded by a
//! sequence counter. Writers make the counter odd while storing and even when
//! done. The audio thread reads once per block and keeps its previous snapshot
//! if it raced a writer; it never spins or blocks.

use crate::settings::CompressorSettings;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, Ordering};

pub struct SharedSettings {
    sequence: AtomicU32,
    threshold_db: AtomicU32,
    attack_ms: AtomicU32,
    release_ms: AtomicU32,
    ratio: AtomicU32,
    bypassed: AtomicBool,
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(CompressorSettings::default())
    }
}

impl SharedSettings {
    pub fn new(settings: CompressorSettings) -> Self {
        Self {
            sequence: AtomicU32::new(0),
            threshold_db: AtomicU32::new(settings.threshold_db.to_bits()),
            attack_ms: AtomicU32::new(settings.attack_ms.to_bits()),
            release_ms: AtomicU32::new(settings.release_ms.to_bits()),
            ratio: AtomicU32::new(settings.ratio.to_bits()),
            bypassed: AtomicBool::new(false),
        }
    }

    /// Publish a new parameter set. Safe to call from any thread.
    pub fn store(&self, settings: CompressorSettings) {
        // Claim the write slot: move the sequence from even to odd.
        let mut seq = self.sequence.load(Ordering::Relaxed);
        loop {
            if seq & 1 == 1 {
                std::hint::spin_loop();
                seq = self.sequence.load(Ordering::Relaxed);
                continue;
            }
            match self.sequence.compare_exchange_weak(
                seq,
                seq.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => seq = current,
            }
        }

        self.threshold_db
            .store(settings.threshold_db.to_bits(), Ordering::Relaxed);
        self.attack_ms
            .store(settings.attack_ms.to_bits(), Ordering::Relaxed);
        self.release_ms
            .store(settings.release_ms.to_bits(), Ordering::Relaxed);
        self.ratio.store(settings.ratio.to_bits(), Ordering::Relaxed);

        self.sequence
            .store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Single read attempt. Returns `None` when the stored set has not changed
    /// since `last_seen`, or when a writer is in the middle of publishing.
    pub fn try_load(&self, last_seen: u32) -> Option<(u32, CompressorSettings)> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 || before == last_seen {
            return None;
        }

        let settings = CompressorSettings {
            threshold_db: f32::from_bits(self.threshold_db.load(Ordering::Relaxed)),
            attack_ms: f32::from_bits(self.attack_ms.load(Ordering::Relaxed)),
            release_ms: f32::from_bits(self.release_ms.load(Ordering::Relaxed)),
            ratio: f32::from_bits(self.ratio.load(Ordering::Relaxed)),
        };

        fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        if after != before {
            return None;
        }
        Some((before, settings))
    }

    /// Blocking-free read for non-real-time callers: retries until a clean
    /// snapshot is obtained.
    pub fn load(&self) -> CompressorSettings {
        loop {
            // `u32::MAX` is odd, so it never equals a published sequence.
            if let Some((_, settings)) = self.try_load(u32::MAX) {
                return settings;
            }
            std::hint::spin_loop();
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Relaxed);
    }

    pub fn bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_store_then_load() {
        let shared = SharedSettings::default();
        let next = CompressorSettings::new(-12.0, 10.0, 100.0, 4.0);
        shared.store(next);
        assert_eq!(shared.load(), next);
    }

    #[test]
    fn test_try_load_reports_only_changes() {
        let shared = SharedSettings::default();
        let (seq, first) = shared.try_load(u32::MAX).expect("initial snapshot");
        assert_eq!(first, CompressorSettings::default());
        assert!(shared.try_load(seq).is_none());

        shared.store(CompressorSettings::new(-30.0, 5.0, 5.0, 10.0));
        let (seq2, second) = shared.try_load(seq).expect("new snapshot");
        assert_ne!(seq, seq2);
        assert_eq!(second.ratio, 10.0);
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let shared = Arc::new(SharedSettings::default());
        let a = CompressorSettings::new(-10.0, 10.0, 10.0, 2.0);
        let b = CompressorSettings::new(-50.0, 400.0, 400.0, 50.0);

        let writers: Vec<_> = [a, b]
            .into_iter()
            .map(|s| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        shared.store(s);
                    }
                })
            })
            .collect();

        let mut observed = 0;
        while observed < 1_000 {
            if let Some((_, s)) = shared.try_load(u32::MAX) {
                assert!(s == a || s == b || s == CompressorSettings::default());
                observed += 1;
            }
        }

        for w in writers {
            w.join().unwrap();
        }
        let last = shared.load();
        assert!(last == a || last == b);
    }

    #[test]
    fn test_bypass_flag() {
        let shared = SharedSettings::default();
        assert!(!shared.bypassed());
        shared.set_bypassed(true);
        assert!(shared.bypassed());
    }
}
