//! oscpack - Open Sound Control packet codec
//!
//! Builds and decodes OSC 1.0 binary packets: messages, nested bundles,
//! NTP-style time tags, and the standard argument types (int32, float32,
//! string, blob) plus a handful of extended tags.
//!
//! The three layers, lowest to highest:
//!   - [`PacketBuilder`]: stateful byte-level writer with length
//!     backpatching for bundle nesting
//!   - [`decode_packet`]: recursive parser delivering [`DecodedMessage`]s
//!     through a callback, with a heuristic fallback for untyped packets
//!   - [`Encoder`]: send-path wrapper handling tag synthesis, argument
//!     coercion, address prefixes, and bundle time stamping

pub mod argument;
pub mod builder;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod parser;
pub mod time_tag;

pub use argument::{Argument, DecodedMessage};
pub use builder::PacketBuilder;
pub use encoder::Encoder;
pub use error::{OscError, Result};
pub use parser::decode_packet;
pub use time_tag::{LockstepClock, TimeSource, TimeTag, WallClock};
