use aqueduct_shared::ChangeNotification;

/// Change events published by a graph store after successful writes.
///
/// Stores that publish through an external transport do not implement this;
/// their events come back through ingress instead.
pub trait ChangeFeed: Send + Sync {
    /// Take every change recorded since the last call, oldest first.
    fn drain_changes(&self) -> Vec<ChangeNotification>;
}
