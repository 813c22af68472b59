/*!
 * Spin Flags
 *
 * Word-sized locks that live inside shared memory. They can't be parking_lot
 * primitives because every module loaded into the process sees the same bytes,
 * so the lock state must be a plain integer with a stable layout.
 */

use super::config::SpinConfig;
use std::hint;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

/// 32-bit lock word, 0 = unlocked, 1 = locked
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct SpinFlag(AtomicI32);

const UNLOCKED: i32 = 0;
const LOCKED: i32 = 1;

impl SpinFlag {
    pub const fn new() -> Self {
        Self(AtomicI32::new(UNLOCKED))
    }

    /// Single compare-and-swap attempt
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.0
            .compare_exchange(UNLOCKED, LOCKED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Spins until acquired using the default backoff
    #[inline]
    pub fn lock(&self) {
        self.lock_with(&SpinConfig::default());
    }

    /// Spins until acquired
    ///
    /// Backs off exponentially with `spin_loop` hints, then yields between
    /// attempts once `max_spins` rounds have passed.
    pub fn lock_with(&self, config: &SpinConfig) {
        let mut rounds = 0u32;
        let mut backoff = 1u32;

        while !self.try_lock() {
            // Wait on a plain load so contended waiters don't bounce the cache line
            while self.is_locked() {
                if rounds < config.max_spins {
                    for _ in 0..backoff {
                        hint::spin_loop();
                    }
                    backoff = (backoff << 1).min(config.backoff_limit.max(1));
                    rounds += 1;
                } else {
                    thread::yield_now();
                }
            }
        }
    }

    /// Releases the flag
    ///
    /// Unlocking a flag that isn't held is a programming error, caught in debug builds.
    #[inline]
    pub fn unlock(&self) {
        let previous = self.0.swap(UNLOCKED, Ordering::Release);
        debug_assert_eq!(
            previous, LOCKED,
            "Attempted to unlock a spin flag that wasn't locked"
        );
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.0.load(Ordering::Acquire) != UNLOCKED
    }

    /// Acquires the flag and returns a guard that releases it on drop
    #[inline]
    pub fn guard(&self) -> SpinGuard<'_> {
        self.lock();
        SpinGuard { flag: self }
    }

    /// Same as [`SpinFlag::guard`] with explicit backoff tuning
    #[inline]
    pub fn guard_with(&self, config: &SpinConfig) -> SpinGuard<'_> {
        self.lock_with(config);
        SpinGuard { flag: self }
    }

    /// Non-blocking [`SpinFlag::guard`]
    #[inline]
    pub fn try_guard(&self) -> Option<SpinGuard<'_>> {
        self.try_lock().then(|| SpinGuard { flag: self })
    }
}

/// RAII guard for a held [`SpinFlag`]
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct SpinGuard<'a> {
    flag: &'a SpinFlag,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.flag.unlock();
    }
}
