pub mod media;
pub mod raster;
pub mod sampler;
pub mod still_frames;

pub use media::{MediaSource, TrackDefaults, TrackSettings};
pub use raster::{lock_surface, RasterBuffer, RasterSnapshot, ScanSurface, SharedSurface};
pub use sampler::frame_sampler;
pub use still_frames::StillFrameSource;
