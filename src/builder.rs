//! Single-packet construction state machine
//!
//! A [`PacketBuilder`] assembles one packet at a time into an owned,
//! fixed-capacity buffer. The caller drives it with discrete calls:
//! open a bundle (or not), write an address, write arguments, close. Length
//! prefixes for messages and nested bundles are reserved as placeholders
//! and backpatched once their byte extent is known.
//!
//! Every write bounds-checks the remaining capacity before touching the
//! buffer, so a failed call leaves the packet in its last valid state.

use crate::constants::{ALIGN, BUNDLE_HEADER, MAX_BUNDLE_NESTING};
use crate::error::{OscError, Result};
use crate::time_tag::TimeTag;

/// Construction state of the packet
///
/// `Empty -> OneMessageArgs` for a bare single-message packet, or
/// `Empty -> NeedCount <-> GetArgs -> Done` for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing written yet
    Empty,
    /// Packet is a single message; gathering its arguments
    OneMessageArgs,
    /// A bundle is open; expecting an address or a nested bundle
    NeedCount,
    /// Gathering arguments of a message inside a bundle
    GetArgs,
    /// All bundles closed; nothing more can be written
    Done,
}

/// Declared type-tag string of the current message, consumed one
/// character per argument write
struct TypeCursor {
    tags: Vec<char>,
    next: usize,
}

impl TypeCursor {
    fn pending(&self) -> Option<char> {
        self.tags.get(self.next).copied()
    }
}

/// Incremental builder for one outgoing packet
pub struct PacketBuilder {
    buf: Vec<u8>,
    capacity: usize,
    state: State,
    bundle_depth: usize,
    /// Offset of the length prefix of the message currently being written
    msg_size_offset: Option<usize>,
    /// Offsets of the length prefixes of open nested bundles, innermost last
    bundle_size_offsets: Vec<usize>,
    type_cursor: Option<TypeCursor>,
    /// True between writing an untagged address and its first argument;
    /// a first string argument starting with ',' must then be escaped
    first_untyped_arg: bool,
}

impl PacketBuilder {
    /// Create a builder with a fixed packet capacity in bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            state: State::Empty,
            bundle_depth: 0,
            msg_size_offset: None,
            bundle_size_offsets: Vec::new(),
            type_cursor: None,
            first_untyped_arg: false,
        }
    }

    /// Clear the packet and return to the empty state, keeping the buffer
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Empty;
        self.bundle_depth = 0;
        self.msg_size_offset = None;
        self.bundle_size_offsets.clear();
        self.type_cursor = None;
        self.first_untyped_arg = false;
    }

    /// True if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when the buffer holds a complete packet ready to transmit
    pub fn is_done(&self) -> bool {
        !self.buf.is_empty()
            && (self.state == State::Done || self.state == State::OneMessageArgs)
    }

    /// Packet bytes written so far
    pub fn packet(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Current bundle nesting depth
    pub fn bundle_depth(&self) -> usize {
        self.bundle_depth
    }

    fn free_space(&self) -> usize {
        self.capacity - self.buf.len()
    }

    fn check_overflow(&self, needed: usize) -> Result<()> {
        if needed > self.free_space() {
            return Err(OscError::Overflow {
                needed,
                available: self.free_space(),
            });
        }
        Ok(())
    }

    /// Check one argument write against the declared tag string.
    /// `written` is the canonical kind character of the argument being
    /// written; integers also satisfy the 'r', 'c' and 'm' declarations.
    fn check_type_tag(&mut self, written: char) -> Result<()> {
        let Some(cursor) = self.type_cursor.as_mut() else {
            return Ok(());
        };
        match cursor.pending() {
            None => Err(OscError::ArgumentsExhausted { written }),
            Some(declared) => {
                let matches = declared == written
                    || (written == 'i' && matches!(declared, 'r' | 'c' | 'm'));
                if matches {
                    cursor.next += 1;
                    Ok(())
                } else {
                    Err(OscError::TypeMismatch { declared, written })
                }
            }
        }
    }

    /// Fail if the current message still expects arguments per its tag string
    fn check_tags_consumed(&self) -> Result<()> {
        if let Some(cursor) = &self.type_cursor {
            if let Some(next) = cursor.pending() {
                return Err(OscError::ArgumentsMissing { next });
            }
        }
        Ok(())
    }

    /// Backpatch the length prefix of the message just completed
    fn patch_message_size(&mut self) {
        if let Some(offset) = self.msg_size_offset.take() {
            let size = (self.buf.len() - offset - 4) as u32;
            self.buf[offset..offset + 4].copy_from_slice(&size.to_be_bytes());
        }
    }

    /// Open a (possibly nested) bundle stamped with `time_tag`
    pub fn open_bundle(&mut self, time_tag: TimeTag) -> Result<()> {
        if self.state == State::OneMessageArgs {
            return Err(OscError::BundleInMessagePacket);
        }
        if self.state == State::Done {
            return Err(OscError::PacketFinished);
        }
        if self.bundle_depth + 1 >= MAX_BUNDLE_NESTING {
            return Err(OscError::NestingTooDeep {
                depth: self.bundle_depth + 1,
            });
        }
        self.check_tags_consumed()?;

        // 8 bytes marker + 8 bytes time tag, plus a length prefix
        // when nested inside another bundle
        let nested = self.state != State::Empty;
        self.check_overflow(if nested { 20 } else { 16 })?;

        if self.state == State::GetArgs {
            self.patch_message_size();
        }
        if nested {
            self.bundle_size_offsets.push(self.buf.len());
            self.buf.extend_from_slice(&0xaaaa_aaaau32.to_be_bytes());
        }

        self.buf.extend_from_slice(BUNDLE_HEADER);
        self.buf.extend_from_slice(&time_tag.to_be_bytes());

        self.bundle_depth += 1;
        self.state = State::NeedCount;
        self.first_untyped_arg = false;
        self.type_cursor = None;
        Ok(())
    }

    /// Close the innermost open bundle, backpatching pending lengths
    pub fn close_bundle(&mut self) -> Result<()> {
        if self.bundle_depth == 0 {
            return Err(OscError::NoBundleOpen);
        }
        self.check_tags_consumed()?;

        if self.state == State::GetArgs {
            self.patch_message_size();
        }

        if self.bundle_depth == 1 {
            // Outermost bundle carries no length prefix
            self.state = State::Done;
        } else if let Some(offset) = self.bundle_size_offsets.pop() {
            let size = (self.buf.len() - offset - 4) as u32;
            self.buf[offset..offset + 4].copy_from_slice(&size.to_be_bytes());
            self.state = State::NeedCount;
        }

        self.bundle_depth -= 1;
        self.first_untyped_arg = false;
        self.type_cursor = None;
        Ok(())
    }

    /// Start a message with the given address and no declared types
    ///
    /// On an empty buffer this turns the packet into a bare single
    /// message; inside a bundle a 4-byte length placeholder is reserved
    /// and backpatched when the message completes.
    pub fn write_address(&mut self, name: &str) -> Result<()> {
        if self.state == State::OneMessageArgs {
            return Err(OscError::NotABundle);
        }
        if self.state == State::Done {
            return Err(OscError::PacketFinished);
        }
        self.check_tags_consumed()?;

        let padded = effective_string_length(name);
        if self.state == State::Empty {
            self.check_overflow(padded)?;
            self.state = State::OneMessageArgs;
        } else {
            // NeedCount or GetArgs
            self.check_overflow(4 + padded)?;
            if self.state == State::GetArgs {
                self.patch_message_size();
            }
            self.msg_size_offset = Some(self.buf.len());
            self.buf.extend_from_slice(&0xbbbb_bbbbu32.to_be_bytes());
            self.state = State::GetArgs;
        }

        write_padded_string(&mut self.buf, name);
        self.type_cursor = None;
        self.first_untyped_arg = true;
        Ok(())
    }

    /// Start a message with an explicit type-tag string (without the
    /// leading comma); each subsequent argument write is validated
    /// against it
    pub fn write_address_and_types(&mut self, name: &str, types: &str) -> Result<()> {
        if self.state == State::OneMessageArgs {
            return Err(OscError::NotABundle);
        }
        if self.state == State::Done {
            return Err(OscError::PacketFinished);
        }
        self.check_tags_consumed()?;

        let addr_padded = effective_string_length(name);
        // +1 for the comma prefix
        let types_padded = aligned_length(types.len() + 1 + 1);
        let prefix = if self.state == State::Empty { 0 } else { 4 };
        self.check_overflow(prefix + addr_padded + types_padded)?;

        self.write_address(name)?;

        let start = self.buf.len();
        self.buf.push(b',');
        self.buf.extend_from_slice(types.as_bytes());
        pad_to_alignment(&mut self.buf, start);

        self.type_cursor = Some(TypeCursor {
            tags: types.chars().collect(),
            next: 0,
        });
        self.first_untyped_arg = false;
        Ok(())
    }

    /// Append a 4-byte big-endian integer argument
    pub fn write_int_arg(&mut self, arg: i32) -> Result<()> {
        self.check_overflow(4)?;
        self.check_type_tag('i')?;
        self.buf.extend_from_slice(&arg.to_be_bytes());
        self.first_untyped_arg = false;
        Ok(())
    }

    /// Append a 4-byte big-endian float argument (bit pattern)
    pub fn write_float_arg(&mut self, arg: f32) -> Result<()> {
        self.check_overflow(4)?;
        self.check_type_tag('f')?;
        self.buf.extend_from_slice(&arg.to_bits().to_be_bytes());
        self.first_untyped_arg = false;
        Ok(())
    }

    /// Append a null-terminated, 4-byte-aligned string argument
    ///
    /// The first argument of an untagged message gets an extra leading
    /// comma when it itself starts with one, so the decoder cannot
    /// mistake it for a type-tag string.
    pub fn write_string_arg(&mut self, arg: &str) -> Result<()> {
        self.check_type_tag('s')?;

        if self.first_untyped_arg && arg.starts_with(',') {
            self.check_overflow(aligned_length(arg.len() + 1 + 1))?;
            let start = self.buf.len();
            self.buf.push(b',');
            self.buf.extend_from_slice(arg.as_bytes());
            pad_to_alignment(&mut self.buf, start);
        } else {
            self.check_overflow(effective_string_length(arg))?;
            write_padded_string(&mut self.buf, arg);
        }

        self.first_untyped_arg = false;
        Ok(())
    }

    /// Append a blob: 4-byte big-endian byte count, the raw bytes, then
    /// padding to a 4-byte boundary
    pub fn write_blob_arg(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_overflow(4 + aligned_blob_length(bytes.len()))?;
        self.check_type_tag('b')?;
        self.buf
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        let start = self.buf.len();
        self.buf.extend_from_slice(bytes);
        pad_blob_to_alignment(&mut self.buf, start);
        self.first_untyped_arg = false;
        Ok(())
    }

    /// Consume one payload-less tag ('T', 'F', 'N' or 'I') without
    /// writing any bytes
    pub fn write_null_arg(&mut self, tag: char) -> Result<()> {
        self.check_type_tag(tag)?;
        self.first_untyped_arg = false;
        Ok(())
    }
}

/// Encoded length of a string: its bytes, the terminator, and padding
/// up to the next multiple of 4
fn effective_string_length(s: &str) -> usize {
    aligned_length(s.len() + 1)
}

fn aligned_length(len: usize) -> usize {
    (len + ALIGN - 1) / ALIGN * ALIGN
}

/// Blob data needs no terminator, only alignment
fn aligned_blob_length(len: usize) -> usize {
    (len + ALIGN - 1) / ALIGN * ALIGN
}

/// Append `s`, a terminator, and padding so the region starting at the
/// current length is a multiple of 4 bytes
fn write_padded_string(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    buf.extend_from_slice(s.as_bytes());
    pad_to_alignment(buf, start);
}

/// Append at least one null, then more until `buf.len() - start` is
/// a multiple of 4
fn pad_to_alignment(buf: &mut Vec<u8>, start: usize) {
    buf.push(0);
    while (buf.len() - start) % ALIGN != 0 {
        buf.push(0);
    }
}

/// Append nulls (possibly none) until `buf.len() - start` is a multiple of 4
fn pad_blob_to_alignment(buf: &mut Vec<u8>, start: usize) {
    while (buf.len() - start) % ALIGN != 0 {
        buf.push(0);
    }
}
