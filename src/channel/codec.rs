// ASCII command frames
//
// Wheel frame: "/<left>,<right>n"     (integers, clamped to +-255)
// Pose frame:  "/<x>,<y>,<theta>n"    (two decimals, theta in degrees)
//
// 'n' is a literal terminator character, not a newline.

use crate::control::WheelCommand;
use crate::messages::Pose;

const FRAME_START: char = '/';
const FRAME_END: char = 'n';
const FIELD_SEPARATOR: char = ',';

/// Actuator limit for one wheel, in either direction
pub const WHEEL_LIMIT: i32 = 255;

/// Error types for inbound frames
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("Datagram is not valid UTF-8")]
    NotUtf8,

    #[error("Frame does not start with '/'")]
    MissingStart,

    #[error("Frame does not end with 'n'")]
    MissingTerminator,

    #[error("Frame has {0} fields, expected 2 or 3")]
    FieldCount(usize),

    #[error("Invalid number {0:?}")]
    Number(String),
}

/// A decoded inbound frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Wheels { left: i32, right: i32 },
    Pose { x: f64, y: f64, heading_deg: f64 },
}

/// Clamp to the actuator range, then truncate toward zero
pub fn clamp_wheel(value: f64) -> i32 {
    value.clamp(-WHEEL_LIMIT as f64, WHEEL_LIMIT as f64) as i32
}

pub fn encode_wheels(command: &WheelCommand) -> String {
    format!(
        "{}{}{}{}{}",
        FRAME_START,
        clamp_wheel(command.left),
        FIELD_SEPARATOR,
        clamp_wheel(command.right),
        FRAME_END
    )
}

pub fn encode_pose(pose: &Pose) -> String {
    // Fixed two decimals ("90.00"), not shortest form ("90.0"); peers must parse as float
    format!(
        "{}{:.2}{}{:.2}{}{:.2}{}",
        FRAME_START,
        pose.x,
        FIELD_SEPARATOR,
        pose.y,
        FIELD_SEPARATOR,
        pose.heading.to_degrees(),
        FRAME_END
    )
}

/// Decode one frame from a datagram
pub fn decode(datagram: &[u8]) -> Result<Frame, DecodeError> {
    let text = std::str::from_utf8(datagram).map_err(|_| DecodeError::NotUtf8)?;
    let body = text
        .strip_prefix(FRAME_START)
        .ok_or(DecodeError::MissingStart)?
        .strip_suffix(FRAME_END)
        .ok_or(DecodeError::MissingTerminator)?;

    let fields: Vec<&str> = body.split(FIELD_SEPARATOR).collect();
    match fields.as_slice() {
        [left, right] => Ok(Frame::Wheels {
            left: parse_field(left)?,
            right: parse_field(right)?,
        }),
        [x, y, heading] => Ok(Frame::Pose {
            x: parse_field(x)?,
            y: parse_field(y)?,
            heading_deg: parse_field(heading)?,
        }),
        other => Err(DecodeError::FieldCount(other.len())),
    }
}

fn parse_field<T: std::str::FromStr>(raw: &str) -> Result<T, DecodeError> {
    raw.parse().map_err(|_| DecodeError::Number(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_wheel() {
        assert_eq!(clamp_wheel(300.0), 255);
        assert_eq!(clamp_wheel(-300.0), -255);
        assert_eq!(clamp_wheel(255.9), 255);
        assert_eq!(clamp_wheel(12.7), 12);
        assert_eq!(clamp_wheel(-12.7), -12);
        assert_eq!(clamp_wheel(f64::INFINITY), 255);
    }

    #[test]
    fn test_encode_wheels_clamps() {
        let payload = encode_wheels(&WheelCommand::new(300.0, -300.0));
        assert_eq!(payload, "/255,-255n");
        assert_eq!(encode_wheels(&WheelCommand::zero()), "/0,0n");
    }

    #[test]
    fn test_encode_pose_two_decimals() {
        let pose = Pose::from_degrees(123.456, 78.9, 45.0);
        assert_eq!(encode_pose(&pose), "/123.46,78.90,45.00n");
        // No clamping in pose frames
        assert_eq!(encode_pose(&Pose::new(1000.0, -5.0, 0.0)), "/1000.00,-5.00,0.00n");
    }

    #[test]
    fn test_decode_frames() {
        assert_eq!(decode(b"/255,-255n"), Ok(Frame::Wheels { left: 255, right: -255 }));
        assert_eq!(
            decode(b"/1.5,2.25,-90.00n"),
            Ok(Frame::Pose { x: 1.5, y: 2.25, heading_deg: -90.0 })
        );
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode(b"255,-255n"), Err(DecodeError::MissingStart));
        assert_eq!(decode(b"/255,-255\n"), Err(DecodeError::MissingTerminator));
        assert_eq!(decode(b"/1n"), Err(DecodeError::FieldCount(1)));
        assert_eq!(decode(b"/1,2,3,4n"), Err(DecodeError::FieldCount(4)));
        assert_eq!(decode(b"/a,bn"), Err(DecodeError::Number("a".to_string())));
        assert_eq!(decode(&[0x2F, 0xFF, 0x6E]), Err(DecodeError::NotUtf8));
    }
}
