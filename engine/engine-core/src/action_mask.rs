//! Legality bitset over a fixed-size discrete action space.

/// Fixed-width bitset marking which actions are legal in a position.
///
/// The width equals the game's action space size, so masks for different
/// phases of the same game are always the same length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionMask {
    words: Vec<u64>,
    len: usize,
}

impl ActionMask {
    /// Create an all-illegal mask of `len` actions.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Build a mask from an iterator of legal action indices.
    ///
    /// Indices outside `0..len` are ignored.
    pub fn from_actions(len: usize, actions: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::new(len);
        for action in actions {
            if action < len {
                mask.set(action);
            }
        }
        mask
    }

    /// Width of the action space.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the action space itself is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mark `action` legal.
    #[inline]
    pub fn set(&mut self, action: usize) {
        debug_assert!(action < self.len, "action {action} out of range");
        self.words[action / 64] |= 1u64 << (action % 64);
    }

    /// Mark `action` illegal.
    #[inline]
    pub fn clear(&mut self, action: usize) {
        if action < self.len {
            self.words[action / 64] &= !(1u64 << (action % 64));
        }
    }

    /// Check whether `action` is legal. Out-of-range indices are never legal.
    #[inline]
    pub fn contains(&self, action: usize) -> bool {
        action < self.len && self.words[action / 64] & (1u64 << (action % 64)) != 0
    }

    /// Number of legal actions.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when no action is legal.
    pub fn none(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Iterate legal action indices in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(i * 64 + tz)
            })
        })
    }

    /// Legality as a dense 0.0/1.0 vector, the layout evaluators expect.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.len)
            .map(|a| if self.contains(a) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_contains() {
        let mut mask = ActionMask::new(576);
        assert!(mask.none());
        mask.set(0);
        mask.set(63);
        mask.set(64);
        mask.set(575);

        assert!(mask.contains(0));
        assert!(mask.contains(63));
        assert!(mask.contains(64));
        assert!(mask.contains(575));
        assert!(!mask.contains(1));
        assert!(!mask.contains(576));
        assert_eq!(mask.count(), 4);
    }

    #[test]
    fn test_iter_ones_ascending() {
        let mask = ActionMask::from_actions(200, [130, 5, 64, 199, 5]);
        let ones: Vec<usize> = mask.iter_ones().collect();
        assert_eq!(ones, vec![5, 64, 130, 199]);
    }

    #[test]
    fn test_from_actions_ignores_out_of_range() {
        let mask = ActionMask::from_actions(10, [3, 10, 42]);
        assert_eq!(mask.count(), 1);
        assert!(mask.contains(3));
    }

    #[test]
    fn test_clear() {
        let mut mask = ActionMask::from_actions(24, 0..24);
        mask.clear(7);
        assert_eq!(mask.count(), 23);
        assert!(!mask.contains(7));
    }

    #[test]
    fn test_to_f32_vec() {
        let mask = ActionMask::from_actions(4, [1, 3]);
        assert_eq!(mask.to_f32_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    }
}
