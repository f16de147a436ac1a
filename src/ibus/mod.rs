//! iBUS protocol: frame codec and stream synchronization

mod frame;
mod ring;
mod scanner;

pub use frame::{checksum, ControlFrame, CHANNEL_COUNT, FRAME_LEN, HEADER};
pub use scanner::FrameScanner;
