//! Frame bucketing for Ager.
//!
//! Range submissions are grouped into frames: fixed-length windows of wall
//! clock time. A frame is identified by the formatted start of its window,
//! so bucketing is "round down to a multiple of `frame_length` seconds since
//! epoch, then format".
//!
//! A `frame_length` of 0 or 1 means real time. Those partitions still need a
//! frame to file intervals under, so they bucket per second.

use ager_types::{FrameId, ParseFrameError};

/// Check if a frame length means real-time resolution.
pub fn is_real_time(frame_length: u32) -> bool {
    frame_length <= 1
}

/// Map a timestamp (seconds since epoch) to the id of the frame containing it.
pub fn bucket(timestamp: i64, frame_length: u32) -> Result<FrameId, ParseFrameError> {
    let length = i64::from(frame_length.max(1));
    FrameId::from_timestamp(timestamp - timestamp.rem_euclid(length))
}
