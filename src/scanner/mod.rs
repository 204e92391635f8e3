pub mod controller;
pub mod decoder;
mod error;
pub mod feedback;
pub mod loop_worker;
pub mod resolver;

pub use controller::ScannerController;
pub use decoder::{CodeDecoder, Decoded, QrDecoder};
pub use error::ScanError;
pub use feedback::{
    ChannelFeedback, ChimeFeedback, DetectionError, DetectionFeedback, FanoutFeedback,
    LogFeedback, ScanEvent,
};
pub use loop_worker::{Detector, DetectorConfig, NextTick, ScanStats, TickOutcome};
pub use resolver::{Resolution, Resolver};
