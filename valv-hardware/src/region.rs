//! ## valv-hardware::region
//! **Registered memory regions and their handles**
//!
//! A [`RegionHandle`] is the sole coupling point between a superblock and
//! the transport layer: it exposes the address range and the local/remote
//! keys a transport embeds in zero-copy transfer descriptors, and it
//! deregisters the region exactly once when dropped.

use std::ptr::NonNull;
use std::sync::Arc;

use tracing::warn;

use crate::error::RegionError;
use crate::provider::RegionProvider;

/// The raw registration record returned by a [`RegionProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegion {
    /// Base address of the registered range.
    pub addr: usize,
    /// Length of the registered range in bytes.
    pub len: usize,
    /// Key for local access descriptors.
    pub lkey: u32,
    /// Key for remote access descriptors.
    pub rkey: u32,
}

/// An owned registration of one buffer with one hardware context.
///
/// The handle only exists if registration succeeded, and deregisters its
/// region when dropped. There is deliberately no other way to deregister:
/// a superblock that never obtained a handle has nothing to release.
pub struct RegionHandle {
    raw: RawRegion,
    provider: Arc<dyn RegionProvider>,
}

impl RegionHandle {
    /// Registers `len` bytes at `addr` with the given provider.
    pub fn register(
        provider: Arc<dyn RegionProvider>,
        addr: NonNull<u8>,
        len: usize,
    ) -> Result<Self, RegionError> {
        let raw = provider.register(addr, len)?;
        Ok(Self { raw, provider })
    }

    /// Base address of the registered range.
    pub fn addr(&self) -> usize {
        self.raw.addr
    }

    /// Length of the registered range in bytes.
    pub fn len(&self) -> usize {
        self.raw.len
    }

    /// Whether the registered range is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// Local access key for transfer descriptors.
    pub fn lkey(&self) -> u32 {
        self.raw.lkey
    }

    /// Remote access key for transfer descriptors.
    pub fn rkey(&self) -> u32 {
        self.raw.rkey
    }
}

impl Drop for RegionHandle {
    fn drop(&mut self) {
        if let Err(err) = self.provider.deregister(&self.raw) {
            warn!(%err, lkey = self.raw.lkey, "hardware region deregistration failed");
        }
    }
}

impl std::fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionHandle").field("raw", &self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimProvider;

    fn buffer_ptr(buf: &mut [u8]) -> NonNull<u8> {
        NonNull::new(buf.as_mut_ptr()).unwrap()
    }

    #[test]
    fn handle_deregisters_exactly_once_on_drop() {
        let provider = Arc::new(SimProvider::new());
        let mut buf = vec![0u8; 4096];

        let handle = RegionHandle::register(
            provider.clone() as Arc<dyn RegionProvider>,
            buffer_ptr(&mut buf),
            buf.len(),
        )
        .unwrap();
        assert_eq!(provider.active_regions(), 1);
        assert_eq!(handle.len(), 4096);

        drop(handle);
        assert_eq!(provider.active_regions(), 0);
    }

    #[test]
    fn failed_registration_produces_no_handle() {
        let provider = Arc::new(SimProvider::failing());
        let mut buf = vec![0u8; 64];

        let result = RegionHandle::register(
            provider.clone() as Arc<dyn RegionProvider>,
            buffer_ptr(&mut buf),
            buf.len(),
        );
        assert!(result.is_err());
        assert_eq!(provider.active_regions(), 0);
    }

    #[test]
    fn keys_are_distinct_per_registration() {
        let provider = Arc::new(SimProvider::new());
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];

        let ha = RegionHandle::register(
            provider.clone() as Arc<dyn RegionProvider>,
            buffer_ptr(&mut a),
            a.len(),
        )
        .unwrap();
        let hb = RegionHandle::register(
            provider.clone() as Arc<dyn RegionProvider>,
            buffer_ptr(&mut b),
            b.len(),
        )
        .unwrap();

        assert_ne!(ha.lkey(), hb.lkey());
        assert_ne!(ha.rkey(), hb.rkey());
        assert_ne!(ha.lkey(), ha.rkey());
    }
}
