use std::sync::Arc;

use tariff_client::domain::TariffSnapshot;
use tokio::sync::watch;

/// Last-known-good snapshot.
///
/// The pair is replaced as one value, so readers never see a day rate from
/// one refresh next to a night rate from another.
#[derive(Clone)]
pub struct SnapshotStore {
    tx: Arc<watch::Sender<Option<Arc<TariffSnapshot>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Arc<TariffSnapshot>> {
        self.tx.borrow().clone()
    }

    /// Swap in `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: TariffSnapshot) -> Option<Arc<TariffSnapshot>> {
        self.tx.send_replace(Some(Arc::new(snapshot)))
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
