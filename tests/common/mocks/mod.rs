//! Mock implementations for external dependencies

use async_trait::async_trait;
use mockall::mock;

use tunebot::commands::music::{
    audio_sources::{Resolution, TrackResolver},
    utils::error::MusicResult,
};

mock! {
    /// Resolver returning whatever the test sets up.
    pub Resolver {}

    #[async_trait]
    impl TrackResolver for Resolver {
        async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Resolution>;
    }
}
