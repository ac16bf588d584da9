//! Wire-format and limit constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Wire format
// =============================================================================

/// Literal 8-byte marker opening every bundle: "#bundle" plus its terminator.
pub const BUNDLE_HEADER: &[u8; 8] = b"#bundle\0";

/// Strings and blobs are padded to multiples of this many bytes.
pub const ALIGN: usize = 4;

// =============================================================================
// Limits
// =============================================================================

/// Maximum depth of bundles within bundles, shared by encoder and decoder.
pub const MAX_BUNDLE_NESTING: usize = 32;

/// Largest packet the decoder accepts (one UDP datagram).
pub const MAX_PACKET_SIZE: usize = 65536;

/// Default capacity of the encoder's packet buffer.
pub const DEFAULT_PACKET_CAPACITY: usize = 64000;

// =============================================================================
// Time tags
// =============================================================================

/// Offset between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const SECONDS_FROM_1900_TO_1970: u64 = 2_208_988_800;

/// Converts microseconds to 32-bit fractional seconds: 2^32 / 1_000_000.
pub const USEC_TO_FRACTION: u32 = 4295;

// =============================================================================
// Heuristic type guessing
// =============================================================================
//
// Untyped senders predate type-tag strings, so the decoder guesses types
// from raw 4-byte groups. These thresholds are kept bit-for-bit compatible
// with the legacy untyped decode; do not tune them.

/// Smallest value accepted as a plausible integer.
pub const HEURISTIC_INT_MIN: i32 = -1000;

/// Largest value accepted as a plausible integer.
pub const HEURISTIC_INT_MAX: i32 = 1_000_000;

/// Smallest value accepted as a plausible float.
pub const HEURISTIC_FLOAT_MIN: f32 = -1000.0;

/// Largest value accepted as a plausible float.
pub const HEURISTIC_FLOAT_MAX: f32 = 1_000_000.0;

/// Positive floats below this are treated as subnormal noise, not values.
pub const SMALLEST_POSITIVE_FLOAT: f32 = 0.000001;
