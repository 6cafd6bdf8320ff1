pub mod spotdl;
pub mod ytdlp;

// Re-export engines for easy access
pub use spotdl::SpotDlEngine;
pub use ytdlp::YtDlpEngine;

use super::{MediaEngine, SourcePlatform};

/// The engine responsible for `platform`, if any.
pub fn engine_for(platform: SourcePlatform, concurrency: u8) -> Option<Box<dyn MediaEngine>> {
    match platform {
        SourcePlatform::Spotify => Some(Box::new(SpotDlEngine::new(concurrency))),
        SourcePlatform::YouTube => Some(Box::new(YtDlpEngine::new(concurrency))),
        SourcePlatform::Unknown => None,
    }
}
