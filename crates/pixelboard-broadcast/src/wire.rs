//! Binary wire format for draw events on the pub/sub channel.
//!
//! Each message is a protobuf record of five signed 32-bit fields tagged
//! 1 through 5: x, y, r, g, b. Color channels travel as int32 in [0, 255];
//! the receiver clamps them back to bytes. Alpha is not carried and is
//! materialized as 255 on receipt, so live events always render opaque.

use pixelboard_types::{Draw, Rgba};
use prost::Message;

/// The pub/sub channel draw events travel on.
pub const DRAW_CHANNEL: &str = "draw-events";

/// The on-channel draw record.
#[derive(Clone, PartialEq, Message)]
pub struct DrawEvent {
    #[prost(int32, tag = "1")]
    pub x: i32,
    #[prost(int32, tag = "2")]
    pub y: i32,
    #[prost(int32, tag = "3")]
    pub r: i32,
    #[prost(int32, tag = "4")]
    pub g: i32,
    #[prost(int32, tag = "5")]
    pub b: i32,
}

/// Encode a draw for publication.
#[must_use]
pub fn encode_draw(draw: Draw) -> Vec<u8> {
    DrawEvent {
        x: draw.x,
        y: draw.y,
        r: i32::from(draw.rgb.r),
        g: i32::from(draw.rgb.g),
        b: i32::from(draw.rgb.b),
    }
    .encode_to_vec()
}

/// Decode a channel payload back into a draw.
///
/// # Errors
///
/// Returns [`prost::DecodeError`] if the payload is not a valid record.
pub fn decode_draw(payload: &[u8]) -> Result<Draw, prost::DecodeError> {
    let event = DrawEvent::decode(payload)?;
    Ok(Draw {
        x: event.x,
        y: event.y,
        rgb: Rgba {
            r: clamp_channel(event.r),
            g: clamp_channel(event.g),
            b: clamp_channel(event.b),
            a: 255,
        },
    })
}

/// Clamp an int32 color channel to a byte.
fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let draw = Draw {
            x: -42,
            y: 1_000_000,
            rgb: Rgba::opaque(0, 128, 255),
        };
        let decoded = decode_draw(&encode_draw(draw)).unwrap();
        assert_eq!(decoded, draw);
    }

    #[test]
    fn decode_clamps_out_of_range_channels() {
        let event = DrawEvent {
            x: 1,
            y: 2,
            r: -5,
            g: 300,
            b: 255,
        };
        let decoded = decode_draw(&event.encode_to_vec()).unwrap();
        assert_eq!(decoded.rgb, Rgba::opaque(0, 255, 255));
    }

    #[test]
    fn decode_materializes_opaque_alpha() {
        let draw = Draw {
            x: 0,
            y: 0,
            rgb: Rgba {
                r: 1,
                g: 2,
                b: 3,
                a: 0,
            },
        };
        let decoded = decode_draw(&encode_draw(draw)).unwrap();
        assert_eq!(decoded.rgb.a, 255);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_draw(&[0xff, 0xff, 0xff, 0xff]).is_err());
    }
}
