//! iBUS control frame codec
//!
//! Frame format: `[0x20 0x40] [14 x u16 LE channels] [u16 LE checksum]`
//!
//! The checksum is `(0xFFFF - sum(bytes[0..30])) mod 0x10000`. Together with
//! the fixed header it acts as a cheap frame-sync and corruption filter:
//! a frame that fails either check must be discarded, never forwarded.

/// Total frame length in bytes
pub const FRAME_LEN: usize = 32;

/// Two-byte frame header
pub const HEADER: [u8; 2] = [0x20, 0x40];

/// Number of channel values per frame
pub const CHANNEL_COUNT: usize = 14;

/// Decoded iBUS control frame
///
/// Channel values are conventionally in the 1000-2000 range (servo
/// microseconds) but the codec does not enforce that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    pub channels: [u16; CHANNEL_COUNT],
}

impl ControlFrame {
    /// Create a frame from channel values
    pub fn new(channels: [u16; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Decode and validate a raw frame
    ///
    /// Returns `None` unless the input is exactly 32 bytes, starts with the
    /// header, and the checksum holds.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FRAME_LEN || bytes[..2] != HEADER {
            return None;
        }

        let expected = u16::from_le_bytes([bytes[30], bytes[31]]);
        if checksum(&bytes[..30]) != expected {
            return None;
        }

        let mut channels = [0u16; CHANNEL_COUNT];
        for (i, ch) in channels.iter_mut().enumerate() {
            let off = 2 + 2 * i;
            *ch = u16::from_le_bytes([bytes[off], bytes[off + 1]]);
        }
        Some(Self { channels })
    }

    /// Encode into the 32-byte wire representation
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[..2].copy_from_slice(&HEADER);
        for (i, ch) in self.channels.iter().enumerate() {
            let off = 2 + 2 * i;
            out[off..off + 2].copy_from_slice(&ch.to_le_bytes());
        }
        let crc = checksum(&out[..30]);
        out[30..].copy_from_slice(&crc.to_le_bytes());
        out
    }
}

/// iBUS 16-bit checksum: ones'-complement style byte sum
#[inline]
pub fn checksum(data: &[u8]) -> u16 {
    let sum = data
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    0xFFFFu16.wrapping_sub(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> ControlFrame {
        let mut channels = [1500u16; CHANNEL_COUNT];
        channels[0] = 1000;
        channels[1] = 2000;
        channels[13] = 1234;
        ControlFrame::new(channels)
    }

    #[test]
    fn test_round_trip() {
        let frame = sample_frame();
        let bytes = frame.encode();
        assert_eq!(bytes.len(), FRAME_LEN);
        assert_eq!(&bytes[..2], &HEADER);
        assert_eq!(ControlFrame::decode(&bytes), Some(frame));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let bytes = sample_frame().encode();
        assert_eq!(ControlFrame::decode(&bytes[..31]), None);
        let mut long = bytes.to_vec();
        long.push(0);
        assert_eq!(ControlFrame::decode(&long), None);
        assert_eq!(ControlFrame::decode(&[]), None);
    }

    #[test]
    fn test_rejects_wrong_header() {
        let mut bytes = sample_frame().encode();
        bytes[0] = 0x21;
        assert_eq!(ControlFrame::decode(&bytes), None);

        let mut bytes = sample_frame().encode();
        bytes[1] = 0x41;
        assert_eq!(ControlFrame::decode(&bytes), None);
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let good = sample_frame().encode();
        for i in 2..30 {
            let mut bad = good;
            bad[i] ^= 0x01;
            assert_eq!(
                ControlFrame::decode(&bad),
                None,
                "corruption at byte {} not detected",
                i
            );
        }
    }

    #[test]
    fn test_checksum_value() {
        // All-zero payload after header: sum = 0x20 + 0x40 = 0x60
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..2].copy_from_slice(&HEADER);
        assert_eq!(checksum(&bytes[..30]), 0xFFFF - 0x60);
    }

    #[test]
    fn test_channel_extraction() {
        let frame = sample_frame();
        let decoded = ControlFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.channels[0], 1000);
        assert_eq!(decoded.channels[1], 2000);
        assert_eq!(decoded.channels[13], 1234);
    }
}
