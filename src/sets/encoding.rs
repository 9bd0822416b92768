//! Byte and base64 serialization of packed membership.
//!
//! The wire form is little-endian regardless of host byte order: byte `k`
//! holds membership bits `[8k, 8k + 8)`, and the text form is the standard
//! base64 encoding of those bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::errors::{Result, SetError};
use crate::sets::packed::{PackedSet, WORD_BITS};

const BYTE_BITS: usize = 8;
const WORD_BYTES: usize = WORD_BITS / BYTE_BITS;

impl PackedSet {
    /// Serializes the membership as little-endian bytes.
    ///
    /// The output holds `ceil(tracked_bits / 8)` bytes: full words
    /// contribute all eight of their bytes, and the final partial word
    /// contributes only as many bytes as its used bits need.
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_bytes = self.tracked_bits().div_ceil(BYTE_BITS);
        let mut bytes = vec![0u8; num_bytes];

        for (i, chunk) in bytes.chunks_mut(WORD_BYTES).enumerate() {
            let word = self.word(i).to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }

        bytes
    }

    /// Serializes the membership as base64 text, the persisted and
    /// transmissible form. Stable across platforms.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }
}

/// Decodes a base64 membership payload into words for a population of the
/// given size.
///
/// The decoded bit count must lie in the half-open byte-granularity window
/// `[population_size, population_size + 8)`; anything else fails with
/// [`SetError::IncompatibleEncoding`]. Bytes are interpreted little-endian
/// into words, so the result is identical on any host.
pub(crate) fn decode_base64(encoded: &str, population_size: usize) -> Result<Vec<u64>> {
    let bytes = BASE64.decode(encoded)?;
    decode_bytes(&bytes, population_size)
}

pub(crate) fn decode_bytes(bytes: &[u8], population_size: usize) -> Result<Vec<u64>> {
    let decoded_bits = bytes.len() * BYTE_BITS;
    if decoded_bits < population_size || decoded_bits >= population_size + BYTE_BITS {
        return Err(SetError::IncompatibleEncoding {
            decoded_bits,
            population_size,
        });
    }

    let mut words = vec![0u64; population_size.div_ceil(WORD_BITS)];
    for (i, chunk) in bytes.chunks(WORD_BYTES).enumerate() {
        let mut buffer = [0u8; WORD_BYTES];
        buffer[..chunk.len()].copy_from_slice(chunk);
        words[i] = u64::from_le_bytes(buffer);
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_little_endian_within_each_word() {
        let set = PackedSet::from_words("test", vec![0x0807_0605_0403_0201], 64).unwrap();
        assert_eq!(set.to_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn partial_last_word_contributes_only_needed_bytes() {
        // 90 tracked bits => 12 bytes, 4 of them from the second word.
        let set = PackedSet::from_words("test", vec![u64::MAX, u64::MAX], 90).unwrap();
        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..11], &[0xFF; 11]);
        assert_eq!(bytes[11], 0x03);
    }

    #[test]
    fn full_last_word_contributes_all_eight_bytes() {
        let set = PackedSet::from_words("test", vec![u64::MAX, u64::MAX], 128).unwrap();
        assert_eq!(set.to_bytes(), vec![0xFF; 16]);
    }

    #[test]
    fn empty_set_serializes_to_no_bytes() {
        let set = PackedSet::from_words("test", Vec::new(), 0).unwrap();
        assert!(set.to_bytes().is_empty());
        assert_eq!(set.to_base64(), "");
    }

    #[test]
    fn ninety_member_full_set_encodes_to_known_text() {
        let set = PackedSet::from_words("test", vec![u64::MAX, u64::MAX], 90).unwrap();
        assert_eq!(set.to_base64(), "//////////////8D");
    }

    #[test]
    fn known_text_decodes_to_expected_words() {
        let words = decode_base64("//////////////8D", 90).unwrap();
        assert_eq!(words, vec![u64::MAX, 0x03FF_FFFF]);
    }

    #[test]
    fn round_trip_preserves_words() {
        for population in [1usize, 7, 8, 9, 63, 64, 65, 90, 128, 129] {
            let mut set = PackedSet::from_words(
                "test",
                vec![0xDEAD_BEEF_0123_4567; population.div_ceil(64)],
                population,
            )
            .unwrap();
            set.clear_bit(0);

            let decoded = decode_base64(&set.to_base64(), population).unwrap();
            assert_eq!(decoded, set.to_words(), "population {}", population);
        }
    }

    #[test]
    fn decoded_bit_count_below_population_is_rejected() {
        // 11 bytes = 88 bits, too few for 90 members.
        let encoded = BASE64.encode([0u8; 11]);
        assert!(matches!(
            decode_base64(&encoded, 90),
            Err(SetError::IncompatibleEncoding {
                decoded_bits: 88,
                population_size: 90
            })
        ));
    }

    #[test]
    fn decoded_bit_count_beyond_tolerance_is_rejected() {
        // 13 bytes = 104 bits; the window for 90 members ends at 97.
        let encoded = BASE64.encode([0u8; 13]);
        assert!(matches!(
            decode_base64(&encoded, 90),
            Err(SetError::IncompatibleEncoding {
                decoded_bits: 104,
                population_size: 90
            })
        ));
    }

    #[test]
    fn tolerance_window_edges_are_accepted() {
        // 90 members: 12 bytes = 96 bits sits inside [90, 98).
        let encoded = BASE64.encode([0u8; 12]);
        assert_eq!(decode_base64(&encoded, 90).unwrap(), vec![0, 0]);

        // 96 members: exactly 96 bits, the lower edge.
        assert_eq!(decode_base64(&encoded, 96).unwrap(), vec![0, 0]);
    }

    #[test]
    fn garbage_text_is_rejected() {
        assert!(matches!(
            decode_base64("not base64!!", 16),
            Err(SetError::Base64(_))
        ));
    }

    #[test]
    fn stray_bits_in_the_final_byte_are_cleared_on_construction() {
        // 10 members decoded from 2 bytes: bits 10..16 are tolerated in the
        // encoding but must not survive into the set.
        let encoded = BASE64.encode([0xFF, 0xFF]);
        let set = PackedSet::from_base64("test", &encoded, 10).unwrap();
        assert_eq!(set.count(), 10);
        assert_eq!(set.to_words(), vec![0b11_1111_1111]);
    }
}
