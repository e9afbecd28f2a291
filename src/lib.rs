pub mod cli;
pub mod crop;
pub mod export;
pub mod geometry;
pub mod panic_handler;
pub mod preview;
pub mod render;
pub mod segments;
pub mod session;
pub mod settings;
pub mod split_lines;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crop::{CropError, plan_crops};
pub use geometry::{CropRegion, PageGeometry};
pub use segments::{Segment, SegmentColor, SegmentError, derive_segments};
pub use session::{Command, EditSession, Effect, SegmentKey, SessionError};
pub use settings::Settings;
pub use split_lines::{LineId, PresetError, SplitLine, SplitLineRegistry};
