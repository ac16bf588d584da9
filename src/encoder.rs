//! High-level packet assembly
//!
//! [`Encoder`] wraps a [`PacketBuilder`] with the send-path conveniences a
//! host integration needs: an optional address prefix, automatic type-tag
//! synthesis, explicit-tag sends with argument coercion, bundle handling
//! with a configurable time-tag offset, and an injectable clock.
//!
//! Finished packets are returned as owned [`Bytes`], so a caller reacting
//! to one packet (for example echoing it back through the same encoder)
//! can immediately start the next without touching an in-progress buffer.

use crate::argument::Argument;
use crate::builder::PacketBuilder;
use crate::constants::DEFAULT_PACKET_CAPACITY;
use crate::error::{OscError, Result};
use crate::time_tag::{TimeSource, TimeTag, WallClock};
use bytes::Bytes;
use tracing::debug;

/// Stateful encoder producing one packet per completed message or bundle
pub struct Encoder {
    builder: PacketBuilder,
    clock: Box<dyn TimeSource>,
    prefix: Option<String>,
    typetags: bool,
    /// Bundle time-tag offset in microseconds from "now";
    /// `None` stamps bundles as immediate
    time_tag_offset_us: Option<i64>,
}

impl Encoder {
    /// Encoder with the default packet capacity and the wall clock
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PACKET_CAPACITY)
    }

    /// Encoder with an explicit packet capacity in bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            builder: PacketBuilder::new(capacity),
            clock: Box::new(WallClock),
            prefix: None,
            typetags: true,
            time_tag_offset_us: None,
        }
    }

    /// Replace the clock read when stamping bundle time tags
    pub fn set_clock(&mut self, clock: impl TimeSource + 'static) {
        self.clock = Box::new(clock);
    }

    /// Set a path prefix applied to every outgoing address; an empty
    /// string clears it
    pub fn set_prefix(&mut self, prefix: &str) -> Result<()> {
        if prefix.is_empty() {
            self.prefix = None;
            return Ok(());
        }
        if !prefix.starts_with('/') {
            return Err(OscError::BadPrefix {
                prefix: prefix.to_string(),
            });
        }
        self.prefix = Some(prefix.to_string());
        Ok(())
    }

    /// Enable or disable type-tag synthesis for [`send`](Self::send)
    pub fn set_typetags(&mut self, on: bool) {
        debug!(typetags = on, "setting typetags");
        self.typetags = on;
    }

    /// Offset in microseconds applied to bundle time tags; `None` stamps
    /// bundles as "process immediately"
    pub fn set_time_tag_offset(&mut self, offset_us: Option<i64>) {
        self.time_tag_offset_us = offset_us;
    }

    /// Current bundle nesting depth
    pub fn bundle_depth(&self) -> usize {
        self.builder.bundle_depth()
    }

    /// Open a bundle stamped per the configured offset and clock
    ///
    /// On failure the in-progress packet is abandoned.
    pub fn open_bundle(&mut self) -> Result<()> {
        let tt = match self.time_tag_offset_us {
            None => TimeTag::immediately(),
            Some(offset_us) => self.clock.now().offset_ms(offset_us as f64 * 0.001),
        };
        if let Err(e) = self.builder.open_bundle(tt) {
            self.builder.reset();
            return Err(e);
        }
        Ok(())
    }

    /// Close the innermost bundle; returns the finished packet when the
    /// outermost bundle closes
    pub fn close_bundle(&mut self) -> Result<Option<Bytes>> {
        self.builder.close_bundle().map_err(|e| {
            self.builder.reset();
            e
        })?;
        Ok(self.finish_if_done())
    }

    /// Append one message, synthesizing its type-tag string from the
    /// arguments (or writing a bare address with typetags disabled)
    ///
    /// Outside a bundle this completes a single-message packet and
    /// returns it; inside a bundle it returns `None` until the bundle
    /// closes.
    pub fn send(&mut self, address: &str, args: &[Argument]) -> Result<Option<Bytes>> {
        if address.is_empty() {
            return Err(OscError::EmptyMessage);
        }
        let address = self.apply_prefix(address);

        let result = if self.typetags {
            self.write_tagged(&address, args)
        } else {
            self.write_untagged(&address, args)
        };
        if let Err(e) = result {
            self.builder.reset();
            return Err(e);
        }
        Ok(self.finish_if_done())
    }

    /// Append one message with an explicit type-tag string (no leading
    /// comma), coercing argument cells to the declared types
    ///
    /// Payload-less tags ('T', 'F', 'N', 'I') consume no cells. A 'b'
    /// packs all remaining cells into one blob and must be the last tag;
    /// an 'm' packs four byte cells into one 4-byte argument.
    pub fn send_typed(
        &mut self,
        address: &str,
        types: &str,
        args: &[Argument],
    ) -> Result<Option<Bytes>> {
        if address.is_empty() {
            return Err(OscError::EmptyMessage);
        }
        let address = self.apply_prefix(address);

        if let Err(e) = self.write_explicitly_typed(&address, types, args) {
            self.builder.reset();
            return Err(e);
        }
        Ok(self.finish_if_done())
    }

    fn apply_prefix(&self, address: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, address),
            None => address.to_string(),
        }
    }

    fn finish_if_done(&mut self) -> Option<Bytes> {
        if self.builder.is_done() {
            let packet = Bytes::copy_from_slice(self.builder.packet());
            self.builder.reset();
            Some(packet)
        } else {
            None
        }
    }

    /// Tag synthesis: one character per cell up to and including the
    /// first blob byte; the blob swallows every remaining cell
    fn write_tagged(&mut self, address: &str, args: &[Argument]) -> Result<()> {
        let mut tags = String::new();
        for arg in args {
            match arg.tag() {
                Some('b') => {
                    tags.push('b');
                    break;
                }
                Some(t) => tags.push(t),
                None => {} // unclassified cells are skipped
            }
        }
        self.builder.write_address_and_types(address, &tags)?;
        self.write_cells(args)
    }

    fn write_untagged(&mut self, address: &str, args: &[Argument]) -> Result<()> {
        self.builder.write_address(address)?;
        self.write_cells(args)
    }

    fn write_cells(&mut self, args: &[Argument]) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            match arg {
                Argument::Int(v) => self.builder.write_int_arg(*v)?,
                Argument::Float(v) => self.builder.write_float_arg(*v)?,
                Argument::String(s) => self.builder.write_string_arg(s)?,
                Argument::BlobByte(_) => {
                    // all remaining cells form one blob
                    let bytes = collect_blob(&args[i..])?;
                    return self.builder.write_blob_arg(&bytes);
                }
                Argument::Untyped => {}
            }
        }
        Ok(())
    }

    fn write_explicitly_typed(
        &mut self,
        address: &str,
        types: &str,
        args: &[Argument],
    ) -> Result<()> {
        let tags: Vec<char> = types.chars().collect();

        // Count how many cells the tag string will consume
        let mut cells_needed = 0usize;
        let mut blobs = 0usize;
        for &c in &tags {
            match c {
                'T' | 'F' | 'N' | 'I' => {}
                'm' => cells_needed += 4,
                'b' => blobs += 1,
                _ => cells_needed += 1,
            }
        }
        if blobs > 1 {
            return Err(OscError::MultipleBlobs);
        }
        let count_ok = if blobs == 0 {
            cells_needed == args.len()
        } else {
            // the blob takes whatever is left, but at least the rest
            cells_needed <= args.len()
        };
        if !count_ok {
            return Err(OscError::TagCountMismatch {
                tags: cells_needed,
                args: args.len(),
            });
        }

        self.builder.write_address_and_types(address, types)?;

        let mut next = 0usize;
        for (ti, &tag) in tags.iter().enumerate() {
            match tag {
                'T' | 'F' | 'N' | 'I' => self.builder.write_null_arg(tag)?,
                'b' => {
                    if ti != tags.len() - 1 {
                        return Err(OscError::BlobNotLast);
                    }
                    let bytes = collect_blob(&args[next..])?;
                    next = args.len();
                    self.builder.write_blob_arg(&bytes)?;
                }
                'm' => {
                    let packed = pack_composite(&args[next..next + 4])?;
                    next += 4;
                    self.builder.write_int_arg(packed)?;
                }
                'i' => {
                    self.builder.write_int_arg(coerce_int(&args[next]))?;
                    next += 1;
                }
                'f' => {
                    self.builder.write_float_arg(coerce_float(&args[next]))?;
                    next += 1;
                }
                's' => {
                    self.builder.write_string_arg(&coerce_string(&args[next]))?;
                    next += 1;
                }
                _ => return Err(OscError::UnknownTypeTag { tag }),
            }
        }
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Every cell of a blob must be a byte
fn collect_blob(args: &[Argument]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let v = match arg {
            Argument::BlobByte(b) => *b as i32,
            Argument::Int(v) => *v,
            Argument::Float(f) if f.fract() == 0.0 => *f as i32,
            _ => return Err(OscError::ByteOutOfRange { index: i, value: -1 }),
        };
        if !(-128..=255).contains(&v) {
            return Err(OscError::ByteOutOfRange { index: i, value: v });
        }
        bytes.push(v as u8);
    }
    Ok(bytes)
}

/// Pack four byte cells into one big-endian word: status bytes may use
/// eight bits, data bytes only seven
fn pack_composite(args: &[Argument]) -> Result<i32> {
    let mut parts = [0i32; 4];
    for (i, arg) in args.iter().enumerate() {
        let v = coerce_int(arg);
        let limit = if i < 2 { 0xff } else { 0x7f };
        if v != (v & limit) {
            return Err(OscError::ByteOutOfRange { index: i, value: v });
        }
        parts[i] = v;
    }
    Ok((parts[0] << 24) + (parts[1] << 16) + (parts[2] << 8) + parts[3])
}

fn coerce_int(arg: &Argument) -> i32 {
    match arg {
        Argument::Int(v) => *v,
        Argument::Float(f) => *f as i32,
        Argument::String(s) => s.trim().parse().unwrap_or(0),
        Argument::BlobByte(b) => *b as i32,
        Argument::Untyped => 0,
    }
}

fn coerce_float(arg: &Argument) -> f32 {
    match arg {
        Argument::Int(v) => *v as f32,
        Argument::Float(f) => *f,
        Argument::String(s) => s.trim().parse().unwrap_or(0.0),
        Argument::BlobByte(b) => *b as f32,
        Argument::Untyped => 0.0,
    }
}

fn coerce_string(arg: &Argument) -> String {
    match arg {
        Argument::Int(v) => format!("{:.6}", *v as f64),
        Argument::Float(f) => format!("{:.6}", f),
        Argument::String(s) => s.clone(),
        Argument::BlobByte(b) => format!("{:.6}", *b as f64),
        Argument::Untyped => String::new(),
    }
}
