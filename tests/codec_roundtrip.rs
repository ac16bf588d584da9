//! End-to-end codec tests
//!
//! Every packet here goes through the full encode path and back through
//! the decoder, checking that addresses, arguments and bundle timing
//! survive the wire format.

use oscpack::{decode_packet, Argument, DecodedMessage, Encoder, TimeSource, TimeTag};
use proptest::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

/// Clock pinned to a fixed tag so bundle stamps are predictable
struct FixedClock(TimeTag);

impl TimeSource for FixedClock {
    fn now(&self) -> TimeTag {
        self.0
    }
}

/// Decode a packet, collecting every delivered message
fn decode_all(packet: &[u8]) -> Vec<DecodedMessage> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut messages = Vec::new();
    decode_packet(packet, |tt| tt.difference_ms(TimeTag::now()), |m| {
        messages.push(m)
    })
    .expect("packet should decode");
    messages
}

// =============================================================================
// Message round trips
// =============================================================================

#[test]
fn test_message_round_trip() {
    let mut enc = Encoder::new();
    let packet = enc
        .send(
            "/mixer/channel/3",
            &[
                Argument::Int(-42),
                Argument::Float(0.5),
                Argument::String("mute".to_string()),
            ],
        )
        .unwrap()
        .unwrap();

    let messages = decode_all(&packet);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].address, "/mixer/channel/3");
    assert_eq!(
        messages[0].args,
        vec![
            Argument::Int(-42),
            Argument::Float(0.5),
            Argument::String("mute".to_string()),
        ]
    );
    assert_eq!(messages[0].delay_ms, 0.0);
}

#[test]
fn test_blob_round_trip() {
    let mut enc = Encoder::new();
    let packet = enc
        .send_typed(
            "/sysex",
            "b",
            &[
                Argument::BlobByte(0xf0),
                Argument::BlobByte(0x43),
                Argument::BlobByte(0xf7),
            ],
        )
        .unwrap()
        .unwrap();

    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![
            Argument::BlobByte(0xf0),
            Argument::BlobByte(0x43),
            Argument::BlobByte(0xf7),
        ]
    );
}

#[test]
fn test_composite_round_trip() {
    // a composite 4-byte argument comes back as four byte cells
    let mut enc = Encoder::new();
    let packet = enc
        .send_typed(
            "/midi",
            "m",
            &[
                Argument::Int(0x90),
                Argument::Int(0x3c),
                Argument::Int(0x40),
                Argument::Int(0x00),
            ],
        )
        .unwrap()
        .unwrap();

    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![
            Argument::BlobByte(0x90),
            Argument::BlobByte(0x3c),
            Argument::BlobByte(0x40),
            Argument::BlobByte(0x00),
        ]
    );
}

#[test]
fn test_leading_comma_string_round_trip() {
    // a string argument starting with ',' in an untyped message is
    // escaped on the wire and restored on decode
    let mut enc = Encoder::new();
    enc.set_typetags(false);
    let packet = enc
        .send("/label", &[Argument::String(",hello".to_string())])
        .unwrap()
        .unwrap();

    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![Argument::String(",hello".to_string())]
    );
}

#[test]
fn test_utf8_string_round_trip() {
    // strings are not limited to ASCII; multi-byte UTF-8 must survive
    // both the tagged and the heuristic decode path
    let mut enc = Encoder::new();
    let packet = enc
        .send("/label", &[Argument::String("caf\u{e9}".to_string())])
        .unwrap()
        .unwrap();
    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![Argument::String("caf\u{e9}".to_string())]
    );

    let mut enc = Encoder::new();
    enc.set_typetags(false);
    let packet = enc
        .send("/label", &[Argument::String("\u{3053}\u{3093}".to_string())])
        .unwrap()
        .unwrap();
    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![Argument::String("\u{3053}\u{3093}".to_string())]
    );
}

#[test]
fn test_untyped_is_decoded_heuristically() {
    let mut enc = Encoder::new();
    enc.set_typetags(false);
    let packet = enc
        .send(
            "/raw",
            &[
                Argument::Int(100),
                Argument::Float(3.5),
                Argument::String("on".to_string()),
            ],
        )
        .unwrap()
        .unwrap();

    let messages = decode_all(&packet);
    assert_eq!(
        messages[0].args,
        vec![
            Argument::Int(100),
            Argument::Float(3.5),
            Argument::String("on".to_string()),
        ]
    );
}

// =============================================================================
// Bundles and timing
// =============================================================================

#[test]
fn test_bundle_round_trip_preserves_order() {
    let mut enc = Encoder::new();
    enc.open_bundle().unwrap();
    enc.send("/a", &[Argument::Int(1)]).unwrap();
    enc.open_bundle().unwrap();
    enc.send("/b", &[Argument::Int(2)]).unwrap();
    enc.close_bundle().unwrap();
    enc.send("/c", &[Argument::Int(3)]).unwrap();
    let packet = enc.close_bundle().unwrap().unwrap();

    let messages = decode_all(&packet);
    let addresses: Vec<&str> = messages.iter().map(|m| m.address.as_str()).collect();
    assert_eq!(addresses, vec!["/a", "/b", "/c"]);
}

#[test]
fn test_immediate_bundle_has_zero_delay() {
    let mut enc = Encoder::new();
    enc.open_bundle().unwrap();
    enc.send("/now", &[]).unwrap();
    let packet = enc.close_bundle().unwrap().unwrap();

    let messages = decode_all(&packet);
    assert_eq!(messages[0].delay_ms, 0.0);
}

#[test]
fn test_offset_bundle_delay_resolves() {
    let base = TimeTag {
        seconds: 3_900_000_000,
        fraction: 0,
    };
    let mut enc = Encoder::new();
    enc.set_clock(FixedClock(base));
    enc.set_time_tag_offset(Some(250_000)); // 250 ms ahead
    enc.open_bundle().unwrap();
    enc.send("/later", &[]).unwrap();
    let packet = enc.close_bundle().unwrap().unwrap();

    // resolve against the same fixed reference the encoder used
    let mut messages = Vec::new();
    decode_packet(&packet, |tt| tt.difference_ms(base), |m| messages.push(m)).unwrap();
    assert!((messages[0].delay_ms - 250.0).abs() < 0.01);
}

#[test]
fn test_inner_bundle_delay_overrides_outer() {
    let base = TimeTag {
        seconds: 3_900_000_000,
        fraction: 0,
    };
    // outer at +100 ms, inner immediate (delay falls back to 0)
    let mut enc = Encoder::new();
    enc.set_time_tag_offset(Some(100_000));
    enc.set_clock(FixedClock(base));
    enc.open_bundle().unwrap();
    enc.send("/outer", &[]).unwrap();
    enc.set_time_tag_offset(None);
    enc.open_bundle().unwrap();
    enc.send("/inner", &[]).unwrap();
    enc.close_bundle().unwrap();
    let packet = enc.close_bundle().unwrap().unwrap();

    let mut messages = Vec::new();
    decode_packet(&packet, |tt| tt.difference_ms(base), |m| messages.push(m)).unwrap();
    assert!((messages[0].delay_ms - 100.0).abs() < 0.01);
    assert_eq!(messages[1].delay_ms, 0.0);
}

// =============================================================================
// Properties
// =============================================================================

fn arb_address() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z0-9_]{1,8}){0,3}".prop_map(|s| format!("/{}", s))
}

fn arb_argument() -> impl Strategy<Value = Argument> {
    prop_oneof![
        any::<i32>().prop_map(Argument::Int),
        // NaN never compares equal, and the heuristic tests don't apply
        // here since these packets carry type tags
        prop::num::f32::NORMAL.prop_map(Argument::Float),
        "[a-zA-Z0-9 _.-]{0,24}".prop_map(Argument::String),
        // arbitrary non-control Unicode, so multi-byte UTF-8 strings are
        // part of the tested input domain
        "\\PC{0,12}".prop_map(Argument::String),
    ]
}

proptest! {
    #[test]
    fn prop_tagged_message_round_trips(
        address in arb_address(),
        args in prop::collection::vec(arb_argument(), 0..8),
    ) {
        let mut enc = Encoder::new();
        let packet = enc.send(&address, &args).unwrap().unwrap();

        let messages = decode_all(&packet);
        prop_assert_eq!(messages.len(), 1);
        prop_assert_eq!(&messages[0].address, &address);
        prop_assert_eq!(&messages[0].args, &args);
    }

    #[test]
    fn prop_bundled_messages_round_trip(
        addresses in prop::collection::vec(arb_address(), 1..6),
    ) {
        let mut enc = Encoder::new();
        enc.open_bundle().unwrap();
        for (i, address) in addresses.iter().enumerate() {
            enc.send(address, &[Argument::Int(i as i32)]).unwrap();
        }
        let packet = enc.close_bundle().unwrap().unwrap();

        let messages = decode_all(&packet);
        prop_assert_eq!(messages.len(), addresses.len());
        for (i, m) in messages.iter().enumerate() {
            prop_assert_eq!(&m.address, &addresses[i]);
            prop_assert_eq!(&m.args, &vec![Argument::Int(i as i32)]);
        }
    }
}
