use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use tracing::debug;

use crate::errors::{Result, SetError};
use crate::sets::packed::PackedSet;

/// Reserved registry name under which the active-members mask resolves.
pub const ACTIVE_MEMBERS_SET_NAME: &str = "__active_members";

/// The owner of an ordered population and the named [`PackedSet`]s over it.
///
/// The population is append-only: the index a member receives when first
/// added is permanent and is the bit position every owned set uses for it.
/// Removing a member is logical, recorded in the active-members mask; the
/// member keeps its index and its raw bits in every set, but is excluded
/// from masked aggregate views until reactivated.
///
/// Every set is created through the superset, never directly, so the
/// superset can keep each one's tracked capacity aligned with the
/// population as it grows.
///
/// # Examples
///
/// ```
/// use popset::sets::SuperSet;
///
/// let people = vec!["Allison".to_string(), "Bobby".to_string()];
/// let mut ss = SuperSet::new("people", "demo population", people);
///
/// ss.add_set("staff").unwrap();
/// ss.add_to_set("staff", &"Allison".to_string()).unwrap();
/// assert!(ss.set_contains("staff", &"Allison".to_string()).unwrap());
/// ```
pub struct SuperSet<T> {
    name: String,
    description: String,
    population: Vec<T>,
    active: PackedSet,
    sets: HashMap<String, PackedSet>,
}

impl<T> SuperSet<T> {
    /// The name of this superset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The description of this superset.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The population, in permanent index order. Includes logically
    /// deleted members.
    pub fn population(&self) -> &[T] {
        &self.population
    }

    /// The number of population positions every owned set tracks.
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    /// The active-members mask: the set of population positions that are
    /// live (not logically deleted).
    pub fn active_members(&self) -> &PackedSet {
        &self.active
    }

    /// The in-use words of the active-members mask, used to mask aggregate
    /// and algebraic operations.
    pub fn active_words(&self) -> &[u64] {
        self.active.words()
    }

    pub(crate) fn is_active_index(&self, index: usize) -> bool {
        self.active.bit(index)
    }

    /// Looks up a registered set by name. The reserved name resolves to
    /// the active-members mask.
    pub fn set(&self, set_name: &str) -> Result<&PackedSet> {
        if set_name == ACTIVE_MEMBERS_SET_NAME {
            return Ok(&self.active);
        }
        self.sets
            .get(set_name)
            .ok_or_else(|| SetError::UnknownSet(set_name.to_string()))
    }

    /// The names of every registered set, the active-members mask included.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ACTIVE_MEMBERS_SET_NAME).chain(self.sets.keys().map(String::as_str))
    }

    fn named_set_mut(&mut self, set_name: &str) -> Result<&mut PackedSet> {
        if set_name == ACTIVE_MEMBERS_SET_NAME {
            return Ok(&mut self.active);
        }
        self.sets
            .get_mut(set_name)
            .ok_or_else(|| SetError::UnknownSet(set_name.to_string()))
    }

    fn install(&mut self, set: PackedSet) -> Result<&mut PackedSet> {
        if set.name() == ACTIVE_MEMBERS_SET_NAME {
            return Err(SetError::DuplicateSetName(set.name().to_string()));
        }
        match self.sets.entry(set.name().to_string()) {
            Entry::Occupied(entry) => Err(SetError::DuplicateSetName(entry.key().clone())),
            Entry::Vacant(slot) => {
                debug!(set = %slot.key(), "registered set");
                Ok(slot.insert(set))
            }
        }
    }
}

impl<T: PartialEq> SuperSet<T> {
    /// Constructs a superset with an initial population.
    ///
    /// The population is stored as given, in order; every initial member
    /// starts active.
    pub fn new(name: &str, description: &str, population: Vec<T>) -> Self {
        let active = PackedSet::filled(ACTIVE_MEMBERS_SET_NAME, population.len());
        SuperSet {
            name: name.to_string(),
            description: description.to_string(),
            population,
            active,
            sets: HashMap::new(),
        }
    }

    /// The permanent population index of the given member, by value
    /// equality over first-insertion order.
    pub fn index_of(&self, member: &T) -> Option<usize> {
        self.population.iter().position(|p| p == member)
    }

    /// Returns whether the member is in the population and currently
    /// active. Members never added answer `false`.
    pub fn contains(&self, member: &T) -> bool {
        self.index_of(member)
            .is_some_and(|index| self.is_active_index(index))
    }

    /// Adds a member to the population, or reactivates it when it is
    /// already there.
    ///
    /// A new member is appended, which never renumbers existing members,
    /// and every owned set's capacity is extended to match; the new
    /// position starts unset in every set except the active-members mask.
    pub fn add_member(&mut self, member: T) {
        let index = match self.index_of(&member) {
            Some(index) => index,
            None => {
                self.population.push(member);
                let grown_to = self.population.len();
                self.active.add_capacity(1);
                for set in self.sets.values_mut() {
                    set.add_capacity(1);
                }
                debug!(
                    superset = %self.name,
                    population_size = grown_to,
                    "appended member to population"
                );
                grown_to - 1
            }
        };
        self.active.set_bit(index);
    }

    /// Adds every given member, equivalent to repeated [`SuperSet::add_member`].
    pub fn add_members(&mut self, members: Vec<T>) {
        for member in members {
            self.add_member(member);
        }
    }

    /// Logically deletes a member: clears its active bit. The member keeps
    /// its population index and its raw bits in every set.
    pub fn remove_member(&mut self, member: &T) -> Result<()> {
        let index = self.index_of(member).ok_or(SetError::UnknownMember)?;
        self.active.clear_bit(index);
        Ok(())
    }

    /// Registers a new, empty set under the given name.
    pub fn add_set(&mut self, set_name: &str) -> Result<&mut PackedSet> {
        let set = PackedSet::blank(set_name, self.population.len());
        self.install(set)
    }

    /// Registers a new set from preset membership words, as produced by
    /// [`PackedSet::to_words`] on a set over this population. The fastest
    /// way to populate a set.
    pub fn add_set_from_words(&mut self, set_name: &str, words: Vec<u64>) -> Result<&mut PackedSet> {
        let set = PackedSet::from_words(set_name, words, self.population.len())?;
        self.install(set)
    }

    /// Registers a new set from a base64 membership payload produced by
    /// [`PackedSet::to_base64`] over this population.
    pub fn add_set_from_base64(
        &mut self,
        set_name: &str,
        encoded: &str,
    ) -> Result<&mut PackedSet> {
        let set = PackedSet::from_base64(set_name, encoded, self.population.len())?;
        self.install(set)
    }

    /// Registers a new set holding the given members, each of which must
    /// exist in the population. The slowest way to populate a set.
    pub fn add_set_with_members(&mut self, set_name: &str, members: &[T]) -> Result<&mut PackedSet> {
        let set = PackedSet::with_members(set_name, self, members)?;
        self.install(set)
    }

    /// Registers an already-built set, typically an algebra result, under
    /// its own name. Its capacity is extended to the current population
    /// size first if it was built before the population last grew.
    pub fn register_set(&mut self, mut set: PackedSet) -> Result<&mut PackedSet> {
        let shortfall = self.population.len().saturating_sub(set.tracked_bits());
        set.add_capacity(shortfall);
        self.install(set)
    }

    /// Removes a registered set and returns it. The active-members mask is
    /// not removable.
    pub fn remove_set(&mut self, set_name: &str) -> Result<PackedSet> {
        let removed = self
            .sets
            .remove(set_name)
            .ok_or_else(|| SetError::UnknownSet(set_name.to_string()))?;
        debug!(set = %set_name, "removed set");
        Ok(removed)
    }

    /// Renames a registered set, re-keying the registry. The active-members
    /// mask is not renamable.
    pub fn rename_set(&mut self, current_name: &str, new_name: &str) -> Result<()> {
        if new_name == ACTIVE_MEMBERS_SET_NAME || self.sets.contains_key(new_name) {
            return Err(SetError::DuplicateSetName(new_name.to_string()));
        }
        let mut set = self
            .sets
            .remove(current_name)
            .ok_or_else(|| SetError::UnknownSet(current_name.to_string()))?;
        set.set_raw_name(new_name);
        self.sets.insert(new_name.to_string(), set);
        debug!(from = %current_name, to = %new_name, "renamed set");
        Ok(())
    }

    /// Adds a population member to a registered set.
    pub fn add_to_set(&mut self, set_name: &str, member: &T) -> Result<()> {
        let index = self.index_of(member);
        let set = self.named_set_mut(set_name)?;
        set.set_bit(index.ok_or(SetError::UnknownMember)?);
        Ok(())
    }

    /// Adds every given member to a registered set, one at a time.
    ///
    /// Best-effort on failure: members added before an unknown member is
    /// encountered stay added.
    pub fn add_all_to_set(&mut self, set_name: &str, members: &[T]) -> Result<()> {
        for member in members {
            self.add_to_set(set_name, member)?;
        }
        Ok(())
    }

    /// Removes a population member from a registered set.
    pub fn remove_from_set(&mut self, set_name: &str, member: &T) -> Result<()> {
        let index = self.index_of(member);
        let set = self.named_set_mut(set_name)?;
        set.clear_bit(index.ok_or(SetError::UnknownMember)?);
        Ok(())
    }

    /// Returns whether a registered set holds the given population member.
    pub fn set_contains(&self, set_name: &str, member: &T) -> Result<bool> {
        let set = self.set(set_name)?;
        let index = self.index_of(member).ok_or(SetError::UnknownMember)?;
        Ok(set.bit(index))
    }

    /// The number of active members, delegated to the active-members mask.
    pub fn count(&self) -> usize {
        self.active.count()
    }

    /// Whether every population member is active.
    pub fn all(&self) -> bool {
        self.active.all(self.active.words())
    }

    /// Whether any population member is active.
    pub fn any(&self) -> bool {
        self.active.any(self.active.words())
    }

    /// The active-members mask's in-use words, copied.
    pub fn to_words(&self) -> Vec<u64> {
        self.active.to_words()
    }

    /// The active-members mask, serialized as little-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.active.to_bytes()
    }

    /// The active-members mask, serialized as base64 text.
    pub fn to_base64(&self) -> String {
        self.active.to_base64()
    }

    /// Every population member mapped to its active flag.
    pub fn to_map(&self) -> HashMap<T, bool>
    where
        T: Clone + Eq + core::hash::Hash,
    {
        self.active.to_map(self)
    }

    /// The active members, in population order.
    pub fn iter_members(&self) -> impl Iterator<Item = &T> {
        self.active.iter_members(self)
    }

    /// Intersection of the active-members mask with the given set.
    pub fn intersected_with(&self, other: &PackedSet) -> PackedSet {
        self.active.intersected_with(self, other)
    }

    /// Intersection of the active-members mask with a registered set.
    pub fn intersected_with_named(&self, set_name: &str) -> Result<PackedSet> {
        self.active.intersected_with_named(self, set_name)
    }

    /// Union of the active-members mask with the given set.
    pub fn unioned_with(&self, other: &PackedSet) -> PackedSet {
        self.active.unioned_with(self, other)
    }

    /// Union of the active-members mask with a registered set.
    pub fn unioned_with_named(&self, set_name: &str) -> Result<PackedSet> {
        self.active.unioned_with_named(self, set_name)
    }

    /// Intersection of two registered sets, resolved by name.
    pub fn intersect_sets(&self, left_name: &str, right_name: &str) -> Result<PackedSet> {
        self.set(left_name)?.intersected_with_named(self, right_name)
    }

    /// Union of two registered sets, resolved by name.
    pub fn union_sets(&self, left_name: &str, right_name: &str) -> Result<PackedSet> {
        self.set(left_name)?.unioned_with_named(self, right_name)
    }
}
