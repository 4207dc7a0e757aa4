/*!
 * Payload Transform
 * Pure element-wise function every Relay applies to its working buffer
 */

use crate::core::types::Word;
use std::fmt;

/// Side-effect-free element-wise transform
pub trait Transform: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn map_word(&self, word: Word) -> Word;

    /// Apply in place over a whole message
    fn apply(&self, words: &mut [Word]) {
        for word in words.iter_mut() {
            *word = self.map_word(*word);
        }
    }
}

/// Doubles every element, wrapping on overflow
#[derive(Debug, Clone, Copy, Default)]
pub struct Doubling;

impl Transform for Doubling {
    fn name(&self) -> &'static str {
        "doubling"
    }

    #[inline]
    fn map_word(&self, word: Word) -> Word {
        word.wrapping_mul(2)
    }
}

/// Value every Sink slot holds after `relays` applications to `fill`
pub fn expected_after(transform: &dyn Transform, fill: Word, relays: usize) -> Word {
    (0..relays).fold(fill, |word, _| transform.map_word(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct AddOne;

    impl Transform for AddOne {
        fn name(&self) -> &'static str {
            "add_one"
        }

        fn map_word(&self, word: Word) -> Word {
            word.wrapping_add(1)
        }
    }

    #[test]
    fn test_doubling_applies_in_place() {
        let mut words = vec![1, -3, 0, 1 << 29];
        Doubling.apply(&mut words);
        assert_eq!(words, vec![2, -6, 0, 1 << 30]);
    }

    #[test]
    fn test_doubling_wraps() {
        assert_eq!(Doubling.map_word(1 << 30), Word::MIN);
        assert_eq!(Doubling.map_word(Word::MIN), 0);
    }

    #[test]
    fn test_expected_after_relays() {
        // N = 5: three relays between Source and Sink
        assert_eq!(expected_after(&Doubling, 1, 3), 8);
        assert_eq!(expected_after(&Doubling, 1, 0), 1);
        // Past 31 doublings every bit has shifted out.
        assert_eq!(expected_after(&Doubling, 1, 98), 0);
        assert_eq!(expected_after(&AddOne, 1, 3), 4);
    }

    #[test]
    fn test_default_apply_uses_map_word() {
        let mut words = vec![0; 8];
        AddOne.apply(&mut words);
        assert!(words.iter().all(|&w| w == 1));
    }

    proptest! {
        #[test]
        fn prop_doubling_apply_matches_map_word(
            words in proptest::collection::vec(any::<Word>(), 0..256)
        ) {
            let mut applied = words.clone();
            Doubling.apply(&mut applied);
            let mapped: Vec<Word> = words.iter().map(|&w| Doubling.map_word(w)).collect();
            prop_assert_eq!(applied, mapped);
        }

        #[test]
        fn prop_relays_double_fill(relays in 0usize..30) {
            prop_assert_eq!(expected_after(&Doubling, 1, relays), 1 << relays);
        }
    }
}
