use std::sync::Arc;

use async_trait::async_trait;

use super::state::CallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One captured media track. The enabled flag is the mute surface: a
/// disabled track keeps its slot in the connection but carries nothing.
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
}

/// Locally captured tracks, shared between the preview, the peer
/// connection, and the mute toggles.
#[derive(Clone)]
pub struct LocalTracks {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalTracks {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter()
    }

    pub fn audio(&self) -> Option<&Arc<dyn MediaTrack>> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video(&self) -> Option<&Arc<dyn MediaTrack>> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Video)
    }

    /// Flip the enabled flag of the first track of the given kind.
    /// Returns the new state, or None if no such track was captured.
    pub fn toggle(&self, kind: TrackKind) -> Option<bool> {
        let track = self.tracks.iter().find(|t| t.kind() == kind)?;
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        Some(enabled)
    }
}

/// Media-capture capability (camera and microphone access).
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, video: bool, audio: bool) -> Result<LocalTracks, CallError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlagTrack {
        kind: TrackKind,
        enabled: AtomicBool,
    }

    impl FlagTrack {
        fn new(kind: TrackKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                enabled: AtomicBool::new(true),
            })
        }
    }

    impl MediaTrack for FlagTrack {
        fn kind(&self) -> TrackKind {
            self.kind
        }
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
    }

    #[test]
    fn toggle_flips_and_restores() {
        let tracks = LocalTracks::new(vec![
            FlagTrack::new(TrackKind::Audio),
            FlagTrack::new(TrackKind::Video),
        ]);

        assert_eq!(tracks.toggle(TrackKind::Audio), Some(false));
        assert!(!tracks.audio().unwrap().is_enabled());
        // Video untouched
        assert!(tracks.video().unwrap().is_enabled());

        assert_eq!(tracks.toggle(TrackKind::Audio), Some(true));
        assert!(tracks.audio().unwrap().is_enabled());
    }

    #[test]
    fn toggle_without_track_is_none() {
        let tracks = LocalTracks::new(vec![FlagTrack::new(TrackKind::Audio)]);
        assert_eq!(tracks.toggle(TrackKind::Video), None);
    }
}
