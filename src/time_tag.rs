//! OSC time tags
//!
//! Time tags share the NTP format: 64-bit fixed point, top 32 bits counting
//! seconds since midnight 1900-01-01 and bottom 32 bits counting fractional
//! parts of a second (units of 1/2^32 s). The value `{0, 1}` tells the
//! receiver to process immediately; `{0xFFFFFFFF, 0xFFFFFFFF}` means never.

use crate::constants::{SECONDS_FROM_1900_TO_1970, USEC_TO_FRACTION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const FRACT_TO_MS: f64 = 1000.0 / 4294967296.0;
const MS_TO_FRACT: f64 = 4294967296.0 / 1000.0;

/// 64-bit fixed-point timestamp used for bundle scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTag {
    /// Seconds since 1900-01-01
    pub seconds: u32,
    /// Fractional seconds in units of 1/2^32 s
    pub fraction: u32,
}

impl TimeTag {
    /// Time tag telling the receiver to process the bundle immediately
    pub fn immediately() -> Self {
        Self {
            seconds: 0,
            fraction: 1,
        }
    }

    /// Time tag meaning "never"
    pub fn infinite() -> Self {
        Self {
            seconds: 0xffff_ffff,
            fraction: 0xffff_ffff,
        }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let now = Utc::now();
        let seconds = now.timestamp() as u64 + SECONDS_FROM_1900_TO_1970;
        let usec = now.timestamp_subsec_micros();
        Self {
            seconds: seconds as u32,
            // wraps for usec near one million, matching the reference
            fraction: usec.wrapping_mul(USEC_TO_FRACTION),
        }
    }

    /// True for the special `{0, 1}` immediate tag
    pub fn is_immediate(&self) -> bool {
        self.seconds == 0 && self.fraction == 1
    }

    /// This tag offset by `msec_offset` milliseconds (may be negative)
    ///
    /// Fractional carry propagates into the seconds word; both words wrap
    /// modulo 2^32.
    pub fn offset_ms(self, msec_offset: f64) -> Self {
        let secs_off = (msec_offset * 0.001).floor();
        let msec = msec_offset - secs_off * 1000.0;
        let mut sec = self.seconds as i64 + secs_off as i64;
        let mut fract = ((self.fraction as f64 * FRACT_TO_MS + msec) * MS_TO_FRACT) as i64;

        sec += fract >> 32;
        fract %= 0xffff_ffff;

        Self {
            seconds: (sec % 0xffff_ffff) as u32,
            fraction: fract as u32,
        }
    }

    /// Signed offset between this tag and `reference`, in milliseconds
    pub fn difference_ms(self, reference: Self) -> f64 {
        let d_sec = self.seconds as f64 - reference.seconds as f64;
        let d_ms = (self.fraction as f64 - reference.fraction as f64) * FRACT_TO_MS;
        d_sec * 1000.0 + d_ms
    }

    /// Network byte order encoding: seconds word, then fraction word
    pub fn to_be_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.seconds.to_be_bytes());
        out[4..].copy_from_slice(&self.fraction.to_be_bytes());
        out
    }

    /// Decode from network byte order
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self {
            seconds: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            fraction: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Clock the encoder reads when stamping bundles
///
/// Injectable so that tests can fix time and so that several encoder
/// instances can share one [`LockstepClock`] and agree on a common base.
pub trait TimeSource {
    /// Current time as a tag
    fn now(&self) -> TimeTag;
}

/// Reads the wall clock on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn now(&self) -> TimeTag {
        TimeTag::now()
    }
}

/// Wall-clock reference captured once, advanced by a monotonic clock
///
/// Avoids OS clock jitter between packets: every reading is the fixed start
/// tag offset by the monotonic time elapsed since construction.
#[derive(Debug, Clone)]
pub struct LockstepClock {
    start_tag: TimeTag,
    start: Instant,
}

impl LockstepClock {
    /// Capture the current wall clock as the shared reference point
    pub fn new() -> Self {
        Self {
            start_tag: TimeTag::now(),
            start: Instant::now(),
        }
    }
}

impl Default for LockstepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for LockstepClock {
    fn now(&self) -> TimeTag {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.start_tag.offset_ms(elapsed_ms)
    }
}
