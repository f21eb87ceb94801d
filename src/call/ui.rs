use std::sync::Arc;

use super::media::{LocalTracks, MediaTrack};

/// UI-update capability. Every method is a non-blocking notification; the
/// call task never waits on the UI.
pub trait CallUi: Send + Sync {
    /// Show the local capture in the self-view
    fn attach_local(&self, tracks: &LocalTracks);

    /// Show an arrived remote track
    fn attach_remote_track(&self, track: Arc<dyn MediaTrack>);

    /// Drop the remote view on teardown
    fn clear_remote(&self);

    fn set_local_label(&self, name: &str);
    fn set_remote_label(&self, name: &str);
    fn clear_labels(&self);

    /// Call-duration display
    fn timer_started(&self);
    fn timer_stopped(&self);

    /// Name entry is hidden while a call is live
    fn hide_name_entry(&self);
    fn show_name_entry(&self);

    /// User-visible notice (precondition failures and the like)
    fn notice(&self, message: &str);
}
