//! Centralized error types for the codec
//!
//! All codec errors are represented by the `OscError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, OscError>`.
//!
//! Builder errors leave the packet buffer in its last valid state; the
//! caller abandons or resets the packet. Parser errors abort decoding of
//! the current message or bundle level only — messages already emitted to
//! the sink are not retracted.

use std::fmt;

/// All codec errors
#[derive(Debug, Clone, PartialEq)]
pub enum OscError {
    // === Structural (builder) ===
    /// Tried to open a bundle inside a single-message packet
    BundleInMessagePacket,
    /// Tried to write into a packet that is already finished
    PacketFinished,
    /// Tried to write a second address into a one-message packet
    NotABundle,
    /// Bundle nesting exceeds `MAX_BUNDLE_NESTING`
    NestingTooDeep { depth: usize },
    /// Tried to close a bundle when none is open
    NoBundleOpen,

    // === Capacity ===
    /// Write would exceed the remaining buffer capacity
    Overflow { needed: usize, available: usize },

    // === Type contract ===
    /// Written argument does not match the declared type tag
    TypeMismatch { declared: char, written: char },
    /// The type-tag string declares more arguments than were written
    ArgumentsMissing { next: char },
    /// An argument was written past the end of the type-tag string
    ArgumentsExhausted { written: char },
    /// Declared tag count does not match the supplied argument count
    TagCountMismatch { tags: usize, args: usize },
    /// A blob tag must be the last tag of its message
    BlobNotLast,
    /// Only one blob per message is supported
    MultipleBlobs,
    /// A composite byte cell is out of range for its position
    ByteOutOfRange { index: usize, value: i32 },
    /// Type-tag character the encoder cannot produce
    UnknownTypeTag { tag: char },

    // === Encoder usage ===
    /// Address prefix must begin with '/'
    BadPrefix { prefix: String },
    /// Refusing to send a message with an empty address
    EmptyMessage,

    // === Malformed data (parser) ===
    /// Packet length is not a multiple of 4
    PacketSize { size: usize },
    /// Packet exceeds `MAX_PACKET_SIZE`
    PacketTooBig { size: usize },
    /// Bundle is too small to hold its time tag
    BundleTooSmall { size: usize },
    /// Bundle element length is not a multiple of 4
    BadElementSize { size: u32 },
    /// Bundle element overruns the bytes remaining in its bundle
    ElementOverrun { size: u32, remaining: usize },
    /// Address string is missing, unterminated, or does not start with '/'
    BadAddress,
    /// String argument is unterminated or incorrectly padded
    BadString,
    /// Type-tag character the decoder does not recognize
    UnrecognizedTypeTag { tag: char },
    /// Argument data ends before the declared argument does
    TruncatedArgument { tag: char },
}

impl std::error::Error for OscError {}

impl fmt::Display for OscError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BundleInMessagePacket => {
                write!(f, "Can't open a bundle in a one-message packet")
            }
            Self::PacketFinished => {
                write!(f, "This packet is finished; can't write anything else")
            }
            Self::NotABundle => {
                write!(f, "This packet is not a bundle; can't write another address")
            }
            Self::NestingTooDeep { depth } => {
                write!(f, "Bundles nested too deeply ({})", depth)
            }
            Self::NoBundleOpen => write!(f, "Can't close bundle: no bundle is open"),
            Self::Overflow { needed, available } => {
                write!(
                    f,
                    "Buffer overflow: need {} bytes, {} available",
                    needed, available
                )
            }
            Self::TypeMismatch { declared, written } => {
                write!(
                    f,
                    "Type tag declared '{}' but a '{}' argument was written",
                    declared, written
                )
            }
            Self::ArgumentsMissing { next } => {
                write!(f, "Type tag '{}' expected another argument", next)
            }
            Self::ArgumentsExhausted { written } => {
                write!(
                    f,
                    "Type tag expected no more arguments, got '{}'",
                    written
                )
            }
            Self::TagCountMismatch { tags, args } => {
                write!(
                    f,
                    "Tag count {} doesn't match argument count {}",
                    tags, args
                )
            }
            Self::BlobNotLast => write!(f, "Blob must be the last item in the message"),
            Self::MultipleBlobs => write!(f, "Only one blob per message"),
            Self::ByteOutOfRange { index, value } => {
                write!(f, "Composite byte {} out of range ({})", index, value)
            }
            Self::UnknownTypeTag { tag } => write!(f, "Unknown type tag '{}'", tag),
            Self::BadPrefix { prefix } => write!(f, "Bad path prefix: '{}'", prefix),
            Self::EmptyMessage => write!(f, "Not sending empty message"),
            Self::PacketSize { size } => {
                write!(f, "Packet size ({}) not a multiple of 4 bytes", size)
            }
            Self::PacketTooBig { size } => write!(f, "Packet size ({}) over maximum", size),
            Self::BundleTooSmall { size } => {
                write!(f, "Bundle message too small ({} bytes) for time tag", size)
            }
            Self::BadElementSize { size } => {
                write!(f, "Bad size count {} in bundle (not a multiple of 4)", size)
            }
            Self::ElementOverrun { size, remaining } => {
                write!(
                    f,
                    "Bad size count {} in bundle (only {} bytes left)",
                    size, remaining
                )
            }
            Self::BadAddress => write!(f, "Bad message address string"),
            Self::BadString => write!(f, "Malformed string argument"),
            Self::UnrecognizedTypeTag { tag } => {
                write!(f, "Unrecognized type tag '{}'", tag)
            }
            Self::TruncatedArgument { tag } => {
                write!(f, "Argument data truncated for type tag '{}'", tag)
            }
        }
    }
}

/// Alias for Result with OscError
pub type Result<T> = std::result::Result<T, OscError>;
