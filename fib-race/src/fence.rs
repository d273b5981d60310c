//! Hardware barriers used by the native fixture.
//!
//! The updaters need a lightweight barrier that keeps load-load, load-store
//! and store-store order but lets a store drift past a later load (Power's
//! `lwsync`). The checker uses the stronger instruction-synchronization barrier
//! (Power's `isync`). On aarch64 both are emitted directly; other targets fall
//! back to the closest `std` fence. Every variant is also a compiler barrier.

#[cfg(target_arch = "aarch64")]
mod imp {
    use std::arch::asm;

    #[inline(always)]
    pub fn lightweight() {
        // SAFETY: barrier instructions touch no registers or memory of ours.
        unsafe { asm!("dmb ishld", "dmb ishst", options(nostack, preserves_flags)) }
    }

    #[inline(always)]
    pub fn sync() {
        // SAFETY: as above.
        unsafe { asm!("dmb ish", "isb", options(nostack, preserves_flags)) }
    }
}

#[cfg(not(target_arch = "aarch64"))]
mod imp {
    use std::sync::atomic;
    use std::sync::atomic::Ordering;

    #[inline(always)]
    pub fn lightweight() {
        atomic::fence(Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn sync() {
        atomic::fence(Ordering::SeqCst);
    }
}

/// The `lwsync`-class barrier between the updaters' accesses.
#[inline(always)]
pub fn lightweight() {
    imp::lightweight()
}

/// The `isync`-class barrier between the checker's two reads.
#[inline(always)]
pub fn sync() {
    imp::sync()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::atomic::Ordering;

    use super::*;

    #[test]
    fn fences_leave_single_thread_order_intact() {
        let cell = AtomicU64::new(1);
        cell.store(2, Ordering::Relaxed);
        lightweight();
        assert_eq!(cell.load(Ordering::Relaxed), 2);
        sync();
        cell.store(3, Ordering::Relaxed);
        assert_eq!(cell.load(Ordering::Relaxed), 3);
    }
}
