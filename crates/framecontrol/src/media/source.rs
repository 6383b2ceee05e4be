//! Media sources and the addresses they resolve to.
//!
//! An in-memory blob needs a locally allocated address before a media
//! pipeline can open it; that address is owned by a [`LocalAddress`] guard
//! and released exactly once when the guard drops. Remote locators are used
//! as-is and never released here.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::{TempDir, TempPath};

use crate::error::{PlayerError, Result};

/// What the host asked us to play.
#[derive(Clone)]
pub enum MediaSource {
    /// Caller-owned bytes, e.g. an uploaded file.
    Blob { name: String, bytes: Arc<[u8]> },
    /// A path or URL the media pipeline can open directly.
    Locator(String),
}

impl MediaSource {
    pub fn blob(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        MediaSource::Blob {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn locator(address: impl Into<String>) -> Self {
        MediaSource::Locator(address.into())
    }

    /// Read a local file into a blob source.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(Self::blob(name, bytes))
    }

    /// Display name: the file name for blobs, the address for locators.
    pub fn name(&self) -> &str {
        match self {
            MediaSource::Blob { name, .. } => name,
            MediaSource::Locator(address) => address,
        }
    }

    /// Size in bytes, known only for blobs.
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            MediaSource::Blob { bytes, .. } => Some(bytes.len()),
            MediaSource::Locator(_) => None,
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, MediaSource::Blob { .. })
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Blob { name, bytes } => f
                .debug_struct("Blob")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
            MediaSource::Locator(address) => f.debug_tuple("Locator").field(address).finish(),
        }
    }
}

/// Allocates temporary local addresses for blob sources.
pub trait AddressAllocator: Send + Sync {
    fn allocate(&self, name: &str, bytes: &[u8]) -> Result<String>;
    fn release(&self, address: &str);
}

/// Backs each blob with a file in a private temporary directory.
pub struct TempFileAllocator {
    dir: TempDir,
    live: Mutex<HashMap<String, TempPath>>,
}

impl TempFileAllocator {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("framecontrol-").tempdir()?;
        Ok(Self {
            dir,
            live: Mutex::new(HashMap::new()),
        })
    }

    /// Number of addresses currently allocated.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

impl AddressAllocator for TempFileAllocator {
    fn allocate(&self, name: &str, bytes: &[u8]) -> Result<String> {
        // Keep the extension so container sniffing has a hint
        let suffix = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("blob-")
            .suffix(&suffix)
            .tempfile_in(self.dir.path())?;
        file.write_all(bytes)?;
        file.flush()?;
        let path = file.into_temp_path();
        let address = path.to_string_lossy().into_owned();
        if let Ok(mut live) = self.live.lock() {
            live.insert(address.clone(), path);
        }
        Ok(address)
    }

    fn release(&self, address: &str) {
        let removed = self
            .live
            .lock()
            .ok()
            .and_then(|mut live| live.remove(address));
        match removed {
            // TempPath deletes the file on drop
            Some(path) => drop(path),
            None => log::warn!("Release of unknown local address {address}"),
        }
    }
}

/// A locally allocated address, released when dropped.
pub struct LocalAddress {
    address: String,
    allocator: Arc<dyn AddressAllocator>,
}

impl LocalAddress {
    pub fn as_str(&self) -> &str {
        &self.address
    }
}

impl Drop for LocalAddress {
    fn drop(&mut self) {
        log::debug!("Releasing local address {}", self.address);
        self.allocator.release(&self.address);
    }
}

impl fmt::Debug for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalAddress").field(&self.address).finish()
    }
}

/// The playable address of a source.
#[derive(Debug)]
pub enum ResolvedAddress {
    /// Allocated by us for a blob; released on drop.
    Local(LocalAddress),
    /// Supplied by the caller; never released here.
    Remote(String),
}

impl ResolvedAddress {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedAddress::Local(local) => local.as_str(),
            ResolvedAddress::Remote(address) => address,
        }
    }
}

/// Resolve a source to an address a media backend can open.
pub fn resolve(
    source: &MediaSource,
    allocator: &Arc<dyn AddressAllocator>,
) -> Result<ResolvedAddress> {
    match source {
        MediaSource::Blob { name, bytes } => {
            let address = allocator.allocate(name, bytes)?;
            log::debug!("Allocated local address {address} for '{name}'");
            Ok(ResolvedAddress::Local(LocalAddress {
                address,
                allocator: allocator.clone(),
            }))
        }
        MediaSource::Locator(address) if address.trim().is_empty() => {
            Err(PlayerError::Load("empty media address".to_string()))
        }
        MediaSource::Locator(address) => Ok(ResolvedAddress::Remote(address.clone())),
    }
}
