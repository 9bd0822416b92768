use tracing::trace;

use crate::errors::{Result, SetError};
use crate::sets::naming;
use crate::sets::superset::SuperSet;

/// Number of membership bits packed into one storage word.
pub const WORD_BITS: usize = 64;

/// Geometric factor applied to the word storage when it must expand.
const GROWTH_FACTOR: f64 = 1.2;

/// A growable set of membership bits packed into 64-bit words.
///
/// Bit `b` of word `i` (least-significant bit first) records whether the
/// population member at index `i * 64 + b` belongs to this set. A
/// `PackedSet` is meaningful only against the ordered population of the
/// [`SuperSet`] it was created through; the superset keeps every set it
/// owns sized to its population by calling [`PackedSet::add_capacity`]
/// whenever the population grows.
///
/// Storage may be over-allocated for growth headroom, but the unused high
/// bits of the last in-use word are always zero. Counting and byte
/// serialization rely on that.
pub struct PackedSet {
    name: String,
    words: Vec<u64>,
    tracked_bits: usize,
}

impl PackedSet {
    /// Creates a zero-filled set tracking `tracked_bits` population positions.
    pub(crate) fn blank(name: &str, tracked_bits: usize) -> Self {
        let mut set = PackedSet {
            name: name.to_string(),
            words: Vec::new(),
            tracked_bits: 0,
        };
        set.add_capacity(tracked_bits);
        set
    }

    /// Creates a set with every one of its `tracked_bits` positions set to 1.
    pub(crate) fn filled(name: &str, tracked_bits: usize) -> Self {
        let mut set = PackedSet::blank(name, tracked_bits);
        for word in &mut set.words {
            *word = u64::MAX;
        }
        set.mask_unused_bits();
        set
    }

    /// Creates a set from preset membership words, as produced by
    /// [`PackedSet::to_words`] on a set over the same population.
    ///
    /// Fails with [`SetError::InsufficientCapacity`] when the array holds
    /// fewer words than the population needs. Extra words are kept as
    /// growth headroom; stray bits beyond the tracked range are cleared.
    pub(crate) fn from_words(name: &str, words: Vec<u64>, population_size: usize) -> Result<Self> {
        let required = population_size.div_ceil(WORD_BITS);
        if words.len() < required {
            return Err(SetError::InsufficientCapacity {
                required,
                provided: words.len(),
            });
        }

        let mut set = PackedSet {
            name: name.to_string(),
            words,
            tracked_bits: population_size,
        };
        set.mask_unused_bits();
        Ok(set)
    }

    /// Creates a set by decoding a base64-encoded little-endian membership
    /// payload, the inverse of [`PackedSet::to_base64`].
    pub(crate) fn from_base64(name: &str, encoded: &str, population_size: usize) -> Result<Self> {
        let words = super::encoding::decode_base64(encoded, population_size)?;
        PackedSet::from_words(name, words, population_size)
    }

    /// Creates a blank set and adds every given member to it.
    ///
    /// Fails with [`SetError::UnknownMember`] when a member is absent from
    /// the superset's population.
    pub(crate) fn with_members<T: PartialEq>(
        name: &str,
        superset: &SuperSet<T>,
        members: &[T],
    ) -> Result<Self> {
        let mut set = PackedSet::blank(name, superset.population_size());
        for member in members {
            let index = superset
                .index_of(member)
                .ok_or(SetError::UnknownMember)?;
            set.set_bit(index);
        }
        Ok(set)
    }

    /// The name of this set, which also keys it in the superset registry
    /// when registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consumes the set and gives it a new name. Intended for sets that
    /// are not (yet) registered, such as algebra results; registered sets
    /// are renamed through the superset so the registry key stays in sync.
    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub(crate) fn set_raw_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// The number of population positions this set currently accounts for.
    pub fn tracked_bits(&self) -> usize {
        self.tracked_bits
    }

    /// The in-use prefix of the backing storage, excluding growth headroom.
    pub fn words(&self) -> &[u64] {
        &self.words[..self.words_in_use()]
    }

    /// A copy of the in-use membership words.
    pub fn to_words(&self) -> Vec<u64> {
        self.words().to_vec()
    }

    pub(crate) fn words_in_use(&self) -> usize {
        self.tracked_bits.div_ceil(WORD_BITS)
    }

    /// Word at `index`, treating anything beyond the backing storage as zero.
    pub(crate) fn word(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }

    fn last_word_index(&self) -> Option<usize> {
        self.words_in_use().checked_sub(1)
    }

    fn bits_in_last_word(&self) -> usize {
        match self.tracked_bits {
            0 => 0,
            n => (n - 1) % WORD_BITS + 1,
        }
    }

    /// A word with the `n` least significant bits set.
    fn lsb_mask(n: usize) -> u64 {
        if n == WORD_BITS {
            u64::MAX
        } else {
            (1u64 << n) - 1
        }
    }

    /// Clears the bits of the last in-use word beyond the tracked range.
    fn mask_unused_bits(&mut self) {
        if let Some(last) = self.last_word_index() {
            self.words[last] &= Self::lsb_mask(self.bits_in_last_word());
        }
    }

    /// Extends the tracked-bit count by `additional_bits`, growing the
    /// backing storage geometrically when the new last word falls outside
    /// it. Newly exposed bits are zero; storage never shrinks.
    pub fn add_capacity(&mut self, additional_bits: usize) {
        if additional_bits == 0 {
            return;
        }

        self.tracked_bits += additional_bits;

        let required_words = self.words_in_use();
        if required_words > self.words.len() {
            let grown = (required_words as f64 * GROWTH_FACTOR) as usize;
            let new_len = grown.max(required_words);
            self.words.resize(new_len, 0);
            trace!(
                set = %self.name,
                tracked_bits = self.tracked_bits,
                storage_words = new_len,
                "expanded membership storage"
            );
        }
    }

    /// Sets the membership bit at the given population index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a tracked position.
    pub fn set_bit(&mut self, index: usize) {
        assert!(index < self.tracked_bits);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    /// Clears the membership bit at the given population index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a tracked position.
    pub fn clear_bit(&mut self, index: usize) {
        assert!(index < self.tracked_bits);
        self.words[index / WORD_BITS] &= !(1u64 << (index % WORD_BITS));
    }

    /// Returns whether the membership bit at the given population index is set.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a tracked position.
    pub fn bit(&self, index: usize) -> bool {
        assert!(index < self.tracked_bits);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// As [`PackedSet::bit`], but positions beyond the tracked range read
    /// as unset. Used by views over the population of a superset that may
    /// have grown since this set was built.
    fn bit_or_unset(&self, index: usize) -> bool {
        self.word(index / WORD_BITS) & (1u64 << (index % WORD_BITS)) != 0
    }

    /// The Hamming weight over all in-use words, O(tracked bits / 64).
    ///
    /// Counts raw membership bits: logically deleted population members
    /// whose bits are still set are included. Mask against the superset's
    /// active members first when a live-only count is wanted.
    pub fn count(&self) -> usize {
        self.words().iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clears every membership bit. Tracked capacity is unchanged, so the
    /// set stays aligned with its superset's population.
    pub fn clear(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
    }

    /// Returns `true` when every tracked position is a member, with full
    /// words masked against the given active-members words. With no
    /// tracked positions the population is empty and `all` holds trivially.
    pub fn all(&self, active: &[u64]) -> bool {
        let Some(last) = self.last_word_index() else {
            return true;
        };

        for i in 0..last {
            let active_word = active.get(i).copied().unwrap_or(0);
            if self.word(i) & active_word != u64::MAX {
                return false;
            }
        }

        self.word(last) == Self::lsb_mask(self.bits_in_last_word())
    }

    /// Returns `true` when any tracked position is a member after masking
    /// against the given active-members words. More performant than
    /// [`PackedSet::count`] for an emptiness check.
    pub fn any(&self, active: &[u64]) -> bool {
        let Some(last) = self.last_word_index() else {
            return false;
        };

        (0..=last).any(|i| {
            let active_word = active.get(i).copied().unwrap_or(0);
            self.word(i) & active_word != 0
        })
    }

    /// Returns a new, unregistered set holding the intersection of this
    /// set (masked against the superset's active members) and `other`.
    /// Neither operand is modified; the caller decides whether to register
    /// the result.
    pub fn intersected_with<T>(&self, superset: &SuperSet<T>, other: &PackedSet) -> PackedSet {
        self.combined_with(superset, other, naming::INTERSECTION, |own, active, theirs| {
            own & active & theirs
        })
    }

    /// As [`PackedSet::intersected_with`], resolving the right operand by
    /// name through the superset registry.
    pub fn intersected_with_named<T>(
        &self,
        superset: &SuperSet<T>,
        set_name: &str,
    ) -> Result<PackedSet> {
        let other = superset.set(set_name)?;
        Ok(self.intersected_with(superset, other))
    }

    /// As [`PackedSet::intersected_with`], materializing the given members
    /// into a temporary unregistered set first.
    pub fn intersected_with_members<T: PartialEq>(
        &self,
        superset: &SuperSet<T>,
        members: &[T],
    ) -> Result<PackedSet> {
        let other = PackedSet::with_members("temp", superset, members)?;
        Ok(self.intersected_with(superset, &other))
    }

    /// Returns a new, unregistered set holding the union of this set
    /// (masked against the superset's active members) and `other`.
    pub fn unioned_with<T>(&self, superset: &SuperSet<T>, other: &PackedSet) -> PackedSet {
        self.combined_with(superset, other, naming::UNION, |own, active, theirs| {
            own & active | theirs
        })
    }

    /// As [`PackedSet::unioned_with`], resolving the right operand by name
    /// through the superset registry.
    pub fn unioned_with_named<T>(&self, superset: &SuperSet<T>, set_name: &str) -> Result<PackedSet> {
        let other = superset.set(set_name)?;
        Ok(self.unioned_with(superset, other))
    }

    /// As [`PackedSet::unioned_with`], materializing the given members into
    /// a temporary unregistered set first.
    pub fn unioned_with_members<T: PartialEq>(
        &self,
        superset: &SuperSet<T>,
        members: &[T],
    ) -> Result<PackedSet> {
        let other = PackedSet::with_members("temp", superset, members)?;
        Ok(self.unioned_with(superset, &other))
    }

    fn combined_with<T>(
        &self,
        superset: &SuperSet<T>,
        other: &PackedSet,
        operator: char,
        combine: fn(u64, u64, u64) -> u64,
    ) -> PackedSet {
        let active = superset.active_words();
        let in_use = self.words_in_use();

        let mut words = vec![0u64; in_use];
        for (i, word) in words.iter_mut().enumerate() {
            let active_word = active.get(i).copied().unwrap_or(0);
            *word = combine(self.word(i), active_word, other.word(i));
        }

        PackedSet {
            name: naming::composed_name(&self.name, operator, other.name()),
            words,
            tracked_bits: self.tracked_bits,
        }
    }

    /// Maps every population element to its liveness-masked membership
    /// flag: `true` only for members that are also active in the superset.
    ///
    /// Population positions added after this set was built read as
    /// non-members, so an unregistered algebra result stays usable when
    /// the population has since grown.
    pub fn to_map<T>(&self, superset: &SuperSet<T>) -> hashbrown::HashMap<T, bool>
    where
        T: Clone + Eq + core::hash::Hash,
    {
        superset
            .population()
            .iter()
            .enumerate()
            .map(|(i, member)| {
                (
                    member.clone(),
                    self.bit_or_unset(i) && superset.is_active_index(i),
                )
            })
            .collect()
    }

    /// Lazily yields the members of this set in population order, skipping
    /// logically deleted population members and positions added after this
    /// set was built. The iterator is restartable: calling this again
    /// yields the same sequence.
    pub fn iter_members<'a, T>(&'a self, superset: &'a SuperSet<T>) -> impl Iterator<Item = &'a T> {
        superset
            .population()
            .iter()
            .enumerate()
            .filter(move |&(i, _)| self.bit_or_unset(i) && superset.is_active_index(i))
            .map(|(_, member)| member)
    }

    /// Set difference has no defined behavior on this type.
    pub fn difference_from(&self, _other: &PackedSet) -> Result<PackedSet> {
        Err(SetError::Unsupported("set difference"))
    }

    /// Symmetric difference has no defined behavior on this type.
    pub fn symmetric_difference_with(&self, _other: &PackedSet) -> Result<PackedSet> {
        Err(SetError::Unsupported("symmetric difference"))
    }

    /// Subset testing has no defined behavior on this type.
    pub fn is_subset_of(&self, _other: &PackedSet) -> Result<bool> {
        Err(SetError::Unsupported("subset testing"))
    }

    /// Superset testing has no defined behavior on this type.
    pub fn is_superset_of(&self, _other: &PackedSet) -> Result<bool> {
        Err(SetError::Unsupported("superset testing"))
    }
}

impl std::fmt::Debug for PackedSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedSet")
            .field("name", &self.name)
            .field("tracked_bits", &self.tracked_bits)
            .field("words", &self.words())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_set_starts_with_all_bits_cleared() {
        for cap in [0usize, 1, 7, 63, 64, 65, 130] {
            let set = PackedSet::blank("test", cap);
            assert_eq!(set.tracked_bits(), cap);
            assert_eq!(set.count(), 0);
            for i in 0..cap {
                assert!(!set.bit(i), "bit {} should start cleared for cap {}", i, cap);
            }
        }
    }

    #[test]
    fn filled_set_has_every_tracked_bit_set() {
        for cap in [1usize, 63, 64, 65, 128, 130] {
            let set = PackedSet::filled("test", cap);
            assert_eq!(set.count(), cap, "cap {}", cap);
            for i in 0..cap {
                assert!(set.bit(i));
            }
        }
    }

    #[test]
    fn filled_set_keeps_unused_high_bits_zero() {
        let set = PackedSet::filled("test", 10);
        assert_eq!(set.to_words(), vec![0b11_1111_1111]);
    }

    #[test]
    fn set_and_clear_bits_across_word_boundaries() {
        let mut set = PackedSet::blank("test", 130);

        let positions = [0usize, 1, 63, 64, 65, 127, 128, 129];
        for &i in &positions {
            set.set_bit(i);
            assert!(set.bit(i), "bit {} should be set", i);
        }
        assert_eq!(set.count(), positions.len());

        for &i in &positions {
            set.clear_bit(i);
            assert!(!set.bit(i), "bit {} should be cleared", i);
        }
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn count_is_raw_hamming_weight() {
        let mut set = PackedSet::blank("test", 70);
        for i in (0..70).step_by(3) {
            set.set_bit(i);
        }
        assert_eq!(set.count(), 24);
    }

    #[test]
    #[should_panic]
    fn set_bit_beyond_tracked_range_panics() {
        let mut set = PackedSet::blank("test", 10);
        set.set_bit(10);
    }

    #[test]
    fn add_capacity_exposes_zeroed_bits() {
        let mut set = PackedSet::blank("test", 60);
        for i in 0..60 {
            set.set_bit(i);
        }

        set.add_capacity(20);

        assert_eq!(set.tracked_bits(), 80);
        assert_eq!(set.count(), 60);
        for i in 60..80 {
            assert!(!set.bit(i));
        }
    }

    #[test]
    fn add_capacity_grows_storage_across_many_words() {
        let mut set = PackedSet::blank("test", 0);
        for step in 1..=10 {
            set.add_capacity(64);
            set.set_bit(step * 64 - 1);
        }
        assert_eq!(set.tracked_bits(), 640);
        assert_eq!(set.count(), 10);
    }

    #[test]
    fn add_capacity_zero_is_a_no_op() {
        let mut set = PackedSet::blank("test", 12);
        set.set_bit(5);
        set.add_capacity(0);
        assert_eq!(set.tracked_bits(), 12);
        assert!(set.bit(5));
    }

    #[test]
    fn from_words_rejects_short_arrays() {
        let result = PackedSet::from_words("test", vec![0u64], 65);
        assert!(matches!(
            result,
            Err(SetError::InsufficientCapacity {
                required: 2,
                provided: 1
            })
        ));
    }

    #[test]
    fn from_words_accepts_exact_and_oversized_arrays() {
        let set = PackedSet::from_words("test", vec![0b101, 0], 65).unwrap();
        assert_eq!(set.tracked_bits(), 65);
        assert!(set.bit(0));
        assert!(set.bit(2));

        let oversized = PackedSet::from_words("test", vec![0b1, 0, 0, 0], 65).unwrap();
        assert_eq!(oversized.to_words().len(), 2);
    }

    #[test]
    fn from_words_clears_stray_bits_beyond_tracked_range() {
        let set = PackedSet::from_words("test", vec![u64::MAX], 10).unwrap();
        assert_eq!(set.count(), 10);
        assert_eq!(set.to_words(), vec![0b11_1111_1111]);
    }

    #[test]
    fn clear_zeroes_membership_but_keeps_capacity() {
        let mut set = PackedSet::filled("test", 70);
        set.clear();
        assert_eq!(set.tracked_bits(), 70);
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn all_on_empty_storage_is_true() {
        let set = PackedSet::blank("test", 0);
        assert!(set.all(&[]));
    }

    #[test]
    fn any_on_empty_storage_is_false() {
        let set = PackedSet::blank("test", 0);
        assert!(!set.any(&[]));
    }

    #[test]
    fn all_and_any_against_a_fully_active_mask() {
        let active = PackedSet::filled("active", 70);

        let mut set = PackedSet::blank("test", 70);
        assert!(!set.any(active.words()));
        assert!(!set.all(active.words()));

        for i in 0..70 {
            set.set_bit(i);
        }
        assert!(set.any(active.words()));
        assert!(set.all(active.words()));

        set.clear_bit(69);
        assert!(!set.all(active.words()));
        assert!(set.any(active.words()));
    }

    #[test]
    fn any_ignores_members_that_are_inactive() {
        let mut active = PackedSet::filled("active", 8);
        active.clear_bit(3);

        let mut set = PackedSet::blank("test", 8);
        set.set_bit(3);

        assert!(!set.any(active.words()));

        set.set_bit(4);
        assert!(set.any(active.words()));
    }

    #[test]
    fn renamed_replaces_the_name() {
        let set = PackedSet::blank("before", 4).renamed("after");
        assert_eq!(set.name(), "after");
    }

    #[test]
    fn unsupported_operations_say_so() {
        let a = PackedSet::blank("a", 4);
        let b = PackedSet::blank("b", 4);

        assert!(matches!(
            a.difference_from(&b),
            Err(SetError::Unsupported(_))
        ));
        assert!(matches!(
            a.symmetric_difference_with(&b),
            Err(SetError::Unsupported(_))
        ));
        assert!(matches!(a.is_subset_of(&b), Err(SetError::Unsupported(_))));
        assert!(matches!(
            a.is_superset_of(&b),
            Err(SetError::Unsupported(_))
        ));
    }

    #[test]
    fn debug_output_shows_name_and_words() {
        let mut set = PackedSet::blank("debugged", 8);
        set.set_bit(1);
        let rendered = format!("{set:?}");
        assert!(rendered.contains("debugged"));
        assert!(rendered.contains("tracked_bits: 8"));
    }
}
