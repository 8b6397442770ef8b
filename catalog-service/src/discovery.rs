//! Discovery driver seam
//!
//! On-disk scanning and peer-session ingestion live outside the catalog
//! core. A host plugs a [`DiscoveryDriver`] into the facade; `force_rescan`
//! runs it in a background task while the catalog owns the Idle/Working
//! state machine and fans progress out on the discovery channel.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifies one rescan pass.
///
/// Completion events carry the session id so callers that discarded a scan
/// can ignore late completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    pub id: String,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of one completed discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    /// Entry points and candidates the driver looked at.
    pub entries_seen: u64,
    /// New catalog entities the driver produced.
    pub entries_added: u64,
}

/// A host-provided bulk discovery implementation.
#[async_trait]
pub trait DiscoveryDriver: Send + Sync {
    /// Walks the configured entry points, reporting each through `progress`
    /// and feeding candidates back through the catalog's add operations.
    ///
    /// The driver owns its traversal; the catalog only tracks the working
    /// state and broadcasts progress.
    async fn discover(
        &self,
        session: ScanSession,
        progress: mpsc::Sender<String>,
    ) -> Result<DiscoveryStats>;
}
