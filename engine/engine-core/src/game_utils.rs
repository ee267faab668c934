//! Shared utilities for two-player game implementations
//!
//! This module provides common functionality used by the rule engine, the
//! search, and the example store to keep value conventions consistent.

use crate::typed::Player;

/// Express a value known from `reference`'s perspective from `viewer`'s.
///
/// Zero-sum: the value is unchanged for the same side and negated for the
/// other.
///
/// # Example
/// ```
/// use engine_core::game_utils::relative_value;
/// use engine_core::Player;
///
/// assert_eq!(relative_value(1.0, Player::One, Player::One), 1.0);
/// assert_eq!(relative_value(1.0, Player::One, Player::Two), -1.0);
/// ```
#[inline]
pub fn relative_value(value: f32, reference: Player, viewer: Player) -> f32 {
    if reference == viewer {
        value
    } else {
        -value
    }
}

/// Encode multiple f32 slices to bytes in little-endian format.
///
/// # Arguments
/// * `out` - Output buffer to append bytes to
/// * `slices` - Iterator of f32 slices to encode
///
/// # Example
/// ```
/// use engine_core::game_utils::encode_f32_slices;
///
/// let own = [1.0f32, 0.0, 0.0];
/// let opp = [0.0f32, 1.0];
///
/// let mut buf = Vec::new();
/// encode_f32_slices(&mut buf, [&own[..], &opp[..]]);
/// assert_eq!(buf.len(), 20);
/// ```
pub fn encode_f32_slices<'a>(out: &mut Vec<u8>, slices: impl IntoIterator<Item = &'a [f32]>) {
    for slice in slices {
        for &value in slice {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Decode a little-endian f32 buffer written by [`encode_f32_slices`].
///
/// Returns `None` when the buffer length is not a multiple of 4.
pub fn decode_f32_slice(buf: &[u8]) -> Option<Vec<f32>> {
    if buf.len() % 4 != 0 {
        return None;
    }
    Some(
        buf.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_value_same_side() {
        assert_eq!(relative_value(0.25, Player::Two, Player::Two), 0.25);
        assert_eq!(relative_value(-1.0, Player::One, Player::One), -1.0);
    }

    #[test]
    fn test_relative_value_other_side() {
        assert_eq!(relative_value(0.25, Player::Two, Player::One), -0.25);
        assert_eq!(relative_value(-1.0, Player::One, Player::Two), 1.0);
    }

    #[test]
    fn test_encode_f32_slices() {
        let board = [1.0f32, 0.0];
        let legal = [1.0f32];
        let player = [0.0f32, 1.0];

        let mut buf = Vec::new();
        encode_f32_slices(&mut buf, [&board[..], &legal[..], &player[..]]);

        // 5 floats * 4 bytes = 20 bytes
        assert_eq!(buf.len(), 20);

        let first = f32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(first, 1.0);

        let last = f32::from_le_bytes(buf[16..20].try_into().unwrap());
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_encode_f32_slices_empty() {
        let mut buf = Vec::new();
        encode_f32_slices(&mut buf, std::iter::empty::<&[f32]>());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_f32_slice() {
        let values = [0.5f32, -2.0, 1e-4];
        let mut buf = Vec::new();
        encode_f32_slices(&mut buf, [&values[..]]);
        assert_eq!(decode_f32_slice(&buf).unwrap(), values.to_vec());
    }

    #[test]
    fn test_decode_f32_slice_rejects_ragged() {
        assert!(decode_f32_slice(&[0u8; 7]).is_none());
        assert_eq!(decode_f32_slice(&[]).unwrap(), Vec::<f32>::new());
    }
}
