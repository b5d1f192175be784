//! ## valv-hardware::provider
//! **Region provider backends**
//!
//! The [`RegionProvider`] trait is the narrow capability the allocator is
//! constructed with: register a buffer, deregister it, nothing else. Two
//! backends live here: [`NoopProvider`] for environments with no hardware
//! context, and [`SimProvider`] for tests and deterministic simulation.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::RegionError;
use crate::region::RawRegion;

/// Capability for binding buffers to a hardware transfer context.
///
/// Implementations must tolerate `register`/`deregister` being called from
/// any thread; callers guarantee each successful registration is
/// deregistered exactly once.
pub trait RegionProvider: Send + Sync {
    /// Registers `len` bytes at `addr`, returning the raw registration
    /// record on success.
    fn register(&self, addr: NonNull<u8>, len: usize) -> Result<RawRegion, RegionError>;

    /// Releases a registration previously returned by [`Self::register`].
    fn deregister(&self, region: &RawRegion) -> Result<(), RegionError>;
}

/// Provider for environments with no hardware memory context.
///
/// Registration always reports [`RegionError::ContextUnavailable`], which
/// the allocator tolerates by degrading to software-only mode.
#[derive(Debug, Default)]
pub struct NoopProvider;

impl NoopProvider {
    pub fn new() -> Self {
        NoopProvider
    }
}

impl RegionProvider for NoopProvider {
    fn register(&self, _addr: NonNull<u8>, _len: usize) -> Result<RawRegion, RegionError> {
        Err(RegionError::ContextUnavailable)
    }

    fn deregister(&self, _region: &RawRegion) -> Result<(), RegionError> {
        Ok(())
    }
}

/// Simulated hardware context with synthetic keys and region accounting.
///
/// Keys are drawn from an atomic counter; active registrations are kept in a
/// map so tests can assert that every obtained handle is deregistered
/// exactly once.
pub struct SimProvider {
    next_key: AtomicU32,
    active: Mutex<HashMap<u32, RawRegion>>,
    fail_registration: bool,
}

impl SimProvider {
    pub fn new() -> Self {
        Self {
            next_key: AtomicU32::new(1),
            active: Mutex::new(HashMap::new()),
            fail_registration: false,
        }
    }

    /// A provider whose registrations always fail, for exercising the
    /// software-only fallback.
    pub fn failing() -> Self {
        Self {
            fail_registration: true,
            ..Self::new()
        }
    }

    /// Number of currently registered regions.
    pub fn active_regions(&self) -> usize {
        self.active.lock().len()
    }
}

impl Default for SimProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionProvider for SimProvider {
    fn register(&self, addr: NonNull<u8>, len: usize) -> Result<RawRegion, RegionError> {
        if self.fail_registration {
            return Err(RegionError::RegistrationFailed(
                "simulated registration failure".into(),
            ));
        }

        let lkey = self.next_key.fetch_add(1, Ordering::Relaxed);
        let region = RawRegion {
            addr: addr.as_ptr() as usize,
            len,
            lkey,
            // Remote keys live in a separate namespace on real hardware.
            rkey: lkey | 0x8000_0000,
        };
        self.active.lock().insert(lkey, region);
        Ok(region)
    }

    fn deregister(&self, region: &RawRegion) -> Result<(), RegionError> {
        self.active
            .lock()
            .remove(&region.lkey)
            .map(|_| ())
            .ok_or(RegionError::UnknownRegion(region.lkey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr_of(buf: &mut [u8]) -> NonNull<u8> {
        NonNull::new(buf.as_mut_ptr()).unwrap()
    }

    #[test]
    fn noop_provider_reports_unavailable() {
        let provider = NoopProvider::new();
        let mut buf = vec![0u8; 64];
        let err = provider.register(addr_of(&mut buf), buf.len()).unwrap_err();
        assert!(matches!(err, RegionError::ContextUnavailable));
    }

    #[test]
    fn sim_provider_tracks_active_regions() {
        let provider = SimProvider::new();
        let mut buf = vec![0u8; 256];

        let region = provider.register(addr_of(&mut buf), buf.len()).unwrap();
        assert_eq!(provider.active_regions(), 1);
        assert_eq!(region.addr, buf.as_ptr() as usize);
        assert_eq!(region.len, 256);

        provider.deregister(&region).unwrap();
        assert_eq!(provider.active_regions(), 0);
    }

    #[test]
    fn sim_provider_rejects_unknown_deregistration() {
        let provider = SimProvider::new();
        let bogus = RawRegion {
            addr: 0x1000,
            len: 64,
            lkey: 999,
            rkey: 999 | 0x8000_0000,
        };
        let err = provider.deregister(&bogus).unwrap_err();
        assert!(matches!(err, RegionError::UnknownRegion(999)));
    }

    #[test]
    fn failing_provider_never_registers() {
        let provider = SimProvider::failing();
        let mut buf = vec![0u8; 64];
        assert!(provider.register(addr_of(&mut buf), buf.len()).is_err());
        assert_eq!(provider.active_regions(), 0);
    }
}
