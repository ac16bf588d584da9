//! Recursive packet decoder
//!
//! [`decode_packet`] validates a received byte buffer and emits one
//! [`DecodedMessage`] per message through a caller-supplied sink, walking
//! nested bundles recursively. Bundle time tags are mapped to a
//! caller-relative delay by a resolver closure; messages outside any
//! bundle carry a delay of 0.
//!
//! A malformed element aborts decoding of its own bundle level only:
//! messages already handed to the sink stay delivered, the error
//! propagates out of the recursion, and independent decode calls cannot
//! interfere with each other.

use crate::argument::{Argument, DecodedMessage};
use crate::constants::{
    ALIGN, BUNDLE_HEADER, HEURISTIC_FLOAT_MAX, HEURISTIC_FLOAT_MIN, HEURISTIC_INT_MAX,
    HEURISTIC_INT_MIN, MAX_BUNDLE_NESTING, MAX_PACKET_SIZE, SMALLEST_POSITIVE_FLOAT,
};
use crate::error::{OscError, Result};
use crate::time_tag::TimeTag;
use tracing::{debug, warn};

/// Decode one received packet, emitting each message to `on_message`
///
/// `resolve_delay` maps a bundle time tag to a scheduling delay in
/// milliseconds relative to the caller's clock; the immediate tag
/// `{0, 1}` resolves to 0 without consulting it.
pub fn decode_packet(
    buf: &[u8],
    resolve_delay: impl Fn(TimeTag) -> f64,
    mut on_message: impl FnMut(DecodedMessage),
) -> Result<()> {
    if buf.len() > MAX_PACKET_SIZE {
        return Err(OscError::PacketTooBig { size: buf.len() });
    }
    decode_element(buf, 0, 0.0, &resolve_delay, &mut on_message)
}

/// One packet or bundle element; recursion depth and the enclosing
/// bundle's delay are passed down explicitly
fn decode_element(
    buf: &[u8],
    depth: usize,
    delay_ms: f64,
    resolve_delay: &impl Fn(TimeTag) -> f64,
    on_message: &mut impl FnMut(DecodedMessage),
) -> Result<()> {
    if buf.len() % ALIGN != 0 {
        return Err(OscError::PacketSize { size: buf.len() });
    }

    if buf.len() >= 8 && &buf[..8] == BUNDLE_HEADER {
        return decode_bundle(buf, depth, resolve_delay, on_message);
    }

    if buf.len() == 24 && buf.starts_with(b"#time\0") {
        // legacy clock-sync packet, recognized but not interpreted
        debug!("ignoring #time message");
        return Ok(());
    }

    decode_message(buf, delay_ms, on_message)
}

fn decode_bundle(
    buf: &[u8],
    depth: usize,
    resolve_delay: &impl Fn(TimeTag) -> f64,
    on_message: &mut impl FnMut(DecodedMessage),
) -> Result<()> {
    if buf.len() < 16 {
        return Err(OscError::BundleTooSmall { size: buf.len() });
    }
    let depth = depth + 1;
    if depth > MAX_BUNDLE_NESTING {
        return Err(OscError::NestingTooDeep { depth });
    }

    let mut tag_bytes = [0u8; 8];
    tag_bytes.copy_from_slice(&buf[8..16]);
    let time_tag = TimeTag::from_be_bytes(tag_bytes);
    let delay_ms = if time_tag.is_immediate() {
        0.0
    } else {
        resolve_delay(time_tag)
    };

    // Elements: 4-byte big-endian length, then that many bytes each
    let mut i = 16;
    while i < buf.len() {
        let size = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        if size % ALIGN as u32 != 0 {
            return Err(OscError::BadElementSize { size });
        }
        let remaining = buf.len() - i - 4;
        if size as usize > remaining {
            return Err(OscError::ElementOverrun { size, remaining });
        }
        let element = &buf[i + 4..i + 4 + size as usize];
        decode_element(element, depth, delay_ms, resolve_delay, on_message)?;
        i += 4 + size as usize;
    }
    Ok(())
}

fn decode_message(
    buf: &[u8],
    delay_ms: f64,
    on_message: &mut impl FnMut(DecodedMessage),
) -> Result<()> {
    let args_start = data_after_aligned_string(buf, 0).ok_or(OscError::BadAddress)?;
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    if nul == 0 || buf[0] != b'/' {
        return Err(OscError::BadAddress);
    }
    let address = String::from_utf8_lossy(&buf[..nul]).into_owned();

    let mut args = Vec::new();
    let data = &buf[args_start..];
    if !data.is_empty() {
        if data[0] == b',' && data.get(1) != Some(&b',') {
            // Starts with a single comma: a type-tag string, unless it
            // fails the aligned-string check, in which case the comma was
            // probably data after all
            if is_nice_string(data, 0) {
                decode_tagged_args(data, &mut args)?;
            } else {
                decode_guessed_args(data, false, &mut args);
            }
        } else {
            // A doubled comma escapes a literal comma as the first
            // argument byte
            let skip_comma = data.starts_with(b",,");
            decode_guessed_args(data, skip_comma, &mut args);
        }
    }

    on_message(DecodedMessage {
        address,
        args,
        delay_ms,
    });
    Ok(())
}

/// Decode arguments driven by an explicit type-tag string
fn decode_tagged_args(data: &[u8], args: &mut Vec<Argument>) -> Result<()> {
    let mut p = data_after_aligned_string(data, 0).ok_or(OscError::BadString)?;
    let tags = &data[1..data.iter().position(|&b| b == 0).unwrap_or(data.len())];

    for &tag in tags {
        let tag = tag as char;
        match tag {
            'b' => {
                if p + 4 > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                let count =
                    u32::from_be_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]]) as usize;
                p += 4;
                if p + count > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                for &byte in &data[p..p + count] {
                    args.push(Argument::BlobByte(byte));
                }
                // skip the blob's alignment padding
                p += count + (ALIGN - count % ALIGN) % ALIGN;
            }
            'm' => {
                // 4-part composite value, exposed byte by byte
                if p + 4 > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                for &byte in &data[p..p + 4] {
                    args.push(Argument::BlobByte(byte));
                }
                p += 4;
            }
            'i' | 'r' | 'c' => {
                if p + 4 > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                let v = i32::from_be_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]]);
                args.push(Argument::Int(v));
                p += 4;
            }
            'f' => {
                if p + 4 > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                let bits = u32::from_be_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]]);
                args.push(Argument::Float(f32::from_bits(bits)));
                p += 4;
            }
            'h' | 't' | 'd' => {
                // 64-bit values are skipped, not decoded
                if p + 8 > data.len() {
                    return Err(OscError::TruncatedArgument { tag });
                }
                warn!(tag = %tag, "64-bit argument skipped (not implemented)");
                p += 8;
            }
            's' | 'S' => {
                if !is_nice_string(data, p) {
                    return Err(OscError::BadString);
                }
                let nul = p + data[p..].iter().position(|&b| b == 0).unwrap_or(0);
                args.push(Argument::String(
                    String::from_utf8_lossy(&data[p..nul]).into_owned(),
                ));
                p = data_after_aligned_string(data, p).ok_or(OscError::BadString)?;
            }
            'T' => args.push(Argument::Float(1.0)),
            'F' => args.push(Argument::Float(0.0)),
            'N' => args.push(Argument::Float(0.0)),
            'I' => args.push(Argument::String("INF".into())),
            _ => return Err(OscError::UnrecognizedTypeTag { tag }),
        }
    }
    Ok(())
}

/// Best-effort decode of untyped argument bytes, 4 bytes at a time
///
/// Each group is tried in order as a plausible small integer, a plausible
/// float, then an aligned string; unclassifiable groups are reported and
/// skipped, matching the legacy untyped decode.
fn decode_guessed_args(data: &[u8], skip_comma: bool, args: &mut Vec<Argument>) {
    let groups = data.len() / 4;
    let mut i = 0;

    while i < groups {
        let at = i * 4;
        let int_val = i32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let float_val = f32::from_bits(int_val as u32);

        if (HEURISTIC_INT_MIN..=HEURISTIC_INT_MAX).contains(&int_val) {
            args.push(Argument::Int(int_val));
            i += 1;
        } else if float_val >= HEURISTIC_FLOAT_MIN
            && float_val <= HEURISTIC_FLOAT_MAX
            && (float_val <= 0.0 || float_val >= SMALLEST_POSITIVE_FLOAT)
        {
            args.push(Argument::Float(float_val));
            i += 1;
        } else if is_nice_string(data, at) {
            let next = data_after_aligned_string(data, at).unwrap_or(data.len());
            let nul = at + data[at..].iter().position(|&b| b == 0).unwrap_or(0);
            // drop the escape comma the encoder added in front of a
            // leading-comma first argument
            let start = if i == 0 && skip_comma { at + 1 } else { at };
            args.push(Argument::String(
                String::from_utf8_lossy(&data[start..nul]).into_owned(),
            ));
            i += (next - at) / 4;
        } else {
            warn!("indeterminate type 0x{:08x}, skipping", int_val);
            i += 1;
        }
    }
}

/// Offset of the first byte after a null-terminated, 4-byte-aligned
/// string starting at `start`, or `None` if the string is unterminated
/// or incorrectly padded
fn data_after_aligned_string(data: &[u8], start: usize) -> Option<usize> {
    if (data.len() - start) % ALIGN != 0 {
        return None;
    }
    let nul = start + data[start..].iter().position(|&b| b == 0)?;
    let mut i = nul + 1;
    while (i - start) % ALIGN != 0 {
        if data[i] != 0 {
            return None;
        }
        i += 1;
    }
    Some(i)
}

/// Is the region at `start` a well-formed aligned string: a terminator,
/// then null padding to a multiple of 4? Any non-zero byte may precede
/// the terminator so that UTF-8 content is accepted.
fn is_nice_string(data: &[u8], start: usize) -> bool {
    data_after_aligned_string(data, start).is_some()
}
