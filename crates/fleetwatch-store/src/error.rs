/// Errors returned by a [`StoreHandle`](crate::StoreHandle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store task has stopped; the action was not processed.
    #[error("store is closed")]
    Closed,
}
