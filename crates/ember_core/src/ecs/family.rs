//! # Archetype Identity
//!
//! A [`Family`] is the exact, sorted set of attachment ids (component and tag
//! ids) carried by an entity. Entities with equal Families share a Table.
//!
//! ## Allocation-free transitions
//!
//! Attaching or detaching a component moves an entity to "its Family plus one
//! id" or "its Family minus one id". Building that Family just to look it up
//! would allocate on every transition, so the lookup is done with borrowed
//! descriptors instead:
//!
//! ```text
//! Family [1, 4, 9]  .with(5)     -> With    { base, extra: 5 }    ~ [1, 4, 5, 9]
//! Family [1, 4, 9]  .without(4)  -> Without { base, missing: 4 }  ~ [1, 9]
//! IdSpan(&[1, 9])                                                 ~ [1, 9]
//! ```
//!
//! All four shapes hash the same id sequence the same way and compare against
//! a `Family` by walking both sorted sequences through
//! [`hashbrown::Equivalent`], so the World's archetype index can be probed
//! with any of them. A Family is only materialized on a miss.
//!
//! A Family is not `Clone`: each one is owned by exactly one archetype.

use std::hash::{Hash, Hasher};
use std::iter::{Copied, FusedIterator};
use std::slice;

use hashbrown::Equivalent;

/// Attachment id: the raw value of a component or tag id.
pub type AttachmentId = u64;

/// Feeds an id sequence into a hasher. Every shape goes through here.
#[inline]
fn hash_ids<H: Hasher>(len: usize, ids: impl Iterator<Item = AttachmentId>, state: &mut H) {
    state.write_usize(len);
    for id in ids {
        state.write_u64(id);
    }
}

/// Compares an id sequence of known length against a Family.
#[inline]
fn eq_ids(family: &Family, len: usize, ids: impl Iterator<Item = AttachmentId>) -> bool {
    family.len() == len && family.iter().eq(ids)
}

/// Immutable, sorted set of attachment ids identifying an archetype.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct Family {
    ids: Box<[AttachmentId]>,
}

impl Family {
    /// Builds a Family from an explicit id list.
    ///
    /// The ids are copied and sorted. Passing the same id twice is a caller
    /// error: debug builds assert, release builds keep one copy.
    #[must_use]
    pub fn new(ids: &[AttachmentId]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        debug_assert!(
            ids.windows(2).all(|w| w[0] != w[1]),
            "duplicate attachment id in family"
        );
        ids.dedup();
        Self {
            ids: ids.into_boxed_slice(),
        }
    }

    /// The Family with no attachments; every new entity starts here.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sorted attachment ids.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[AttachmentId] {
        &self.ids
    }

    /// Iterates over the ids in ascending order.
    #[inline]
    pub fn iter(&self) -> Copied<slice::Iter<'_, AttachmentId>> {
        self.ids.iter().copied()
    }

    /// Number of attachments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Checks if this is the empty Family.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks membership with a binary search.
    #[inline]
    #[must_use]
    pub fn has(&self, id: AttachmentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Position of `id` in [`Family::ids`], if present.
    #[inline]
    #[must_use]
    pub fn position(&self, id: AttachmentId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Describes this Family plus `id`. O(1), no allocation.
    #[inline]
    #[must_use]
    pub fn with(&self, id: AttachmentId) -> With<'_> {
        With {
            base: self,
            extra: id,
        }
    }

    /// Describes this Family minus `id`. O(1), no allocation.
    #[inline]
    #[must_use]
    pub fn without(&self, id: AttachmentId) -> Without<'_> {
        Without {
            base: self,
            missing: id,
        }
    }
}

impl Hash for Family {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ids(self.len(), self.iter(), state);
    }
}

impl FromIterator<AttachmentId> for Family {
    fn from_iter<I: IntoIterator<Item = AttachmentId>>(iter: I) -> Self {
        let ids: Vec<AttachmentId> = iter.into_iter().collect();
        Self::new(&ids)
    }
}

impl<'a> IntoIterator for &'a Family {
    type Item = AttachmentId;
    type IntoIter = Copied<slice::Iter<'a, AttachmentId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// RAW SPAN
// ============================================================================

/// Borrowed, already-sorted id slice usable as a lookup key.
#[derive(Clone, Copy, Debug)]
pub struct IdSpan<'a>(&'a [AttachmentId]);

impl<'a> IdSpan<'a> {
    /// Wraps a slice that must be sorted ascending without duplicates.
    #[must_use]
    pub fn new(ids: &'a [AttachmentId]) -> Self {
        debug_assert!(
            ids.windows(2).all(|w| w[0] < w[1]),
            "id span must be strictly ascending"
        );
        Self(ids)
    }

    /// The wrapped ids.
    #[must_use]
    pub fn ids(&self) -> &'a [AttachmentId] {
        self.0
    }
}

impl Hash for IdSpan<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ids(self.0.len(), self.0.iter().copied(), state);
    }
}

impl Equivalent<Family> for IdSpan<'_> {
    fn equivalent(&self, key: &Family) -> bool {
        key.ids() == self.0
    }
}

impl PartialEq<[AttachmentId]> for Family {
    fn eq(&self, other: &[AttachmentId]) -> bool {
        self.ids() == other
    }
}

// ============================================================================
// WITH DESCRIPTOR
// ============================================================================

/// "`base` plus `extra`", without materializing it.
#[derive(Clone, Copy, Debug)]
pub struct With<'a> {
    base: &'a Family,
    extra: AttachmentId,
}

impl<'a> With<'a> {
    /// The Family this descriptor extends.
    #[must_use]
    pub fn base(&self) -> &'a Family {
        self.base
    }

    /// The added id.
    #[must_use]
    pub fn extra(&self) -> AttachmentId {
        self.extra
    }

    /// Length of the described Family.
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len() + usize::from(!self.base.has(self.extra))
    }

    /// Always false: a With describes at least its extra id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the described ids in ascending order.
    #[must_use]
    pub fn iter(&self) -> WithIter<'a> {
        WithIter {
            ids: self.base.ids.iter(),
            extra: Some(self.extra),
        }
    }
}

/// Sorted merge of a base Family and one extra id.
#[derive(Clone, Debug)]
pub struct WithIter<'a> {
    ids: slice::Iter<'a, AttachmentId>,
    extra: Option<AttachmentId>,
}

impl Iterator for WithIter<'_> {
    type Item = AttachmentId;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match (self.ids.as_slice().first().copied(), self.extra) {
            (Some(head), Some(extra)) if extra < head => {
                self.extra = None;
                Some(extra)
            }
            (Some(head), Some(extra)) if extra == head => {
                self.extra = None;
                self.ids.next().copied()
            }
            (Some(_), _) => self.ids.next().copied(),
            (None, extra) => {
                self.extra = None;
                extra
            }
        }
    }
}

impl FusedIterator for WithIter<'_> {}

impl Hash for With<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ids(self.len(), self.iter(), state);
    }
}

impl Equivalent<Family> for With<'_> {
    fn equivalent(&self, key: &Family) -> bool {
        eq_ids(key, self.len(), self.iter())
    }
}

impl PartialEq<With<'_>> for Family {
    fn eq(&self, other: &With<'_>) -> bool {
        other.equivalent(self)
    }
}

impl From<With<'_>> for Family {
    fn from(with: With<'_>) -> Self {
        let ids = with.base.ids();
        if with.base.has(with.extra) {
            return Self {
                ids: with.base.ids.clone(),
            };
        }

        let split = ids.partition_point(|&id| id < with.extra);
        let mut merged = Vec::with_capacity(ids.len() + 1);
        merged.extend_from_slice(&ids[..split]);
        merged.push(with.extra);
        merged.extend_from_slice(&ids[split..]);
        Self {
            ids: merged.into_boxed_slice(),
        }
    }
}

// ============================================================================
// WITHOUT DESCRIPTOR
// ============================================================================

/// "`base` minus `missing`", without materializing it.
#[derive(Clone, Copy, Debug)]
pub struct Without<'a> {
    base: &'a Family,
    missing: AttachmentId,
}

impl<'a> Without<'a> {
    /// The Family this descriptor shrinks.
    #[must_use]
    pub fn base(&self) -> &'a Family {
        self.base
    }

    /// The removed id.
    #[must_use]
    pub fn missing(&self) -> AttachmentId {
        self.missing
    }

    /// Length of the described Family.
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len() - usize::from(self.base.has(self.missing))
    }

    /// Checks if the described Family is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the described ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = AttachmentId> + 'a {
        let missing = self.missing;
        self.base.iter().filter(move |&id| id != missing)
    }
}

impl Hash for Without<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ids(self.len(), self.iter(), state);
    }
}

impl Equivalent<Family> for Without<'_> {
    fn equivalent(&self, key: &Family) -> bool {
        eq_ids(key, self.len(), self.iter())
    }
}

impl PartialEq<Without<'_>> for Family {
    fn eq(&self, other: &Without<'_>) -> bool {
        other.equivalent(self)
    }
}

impl From<Without<'_>> for Family {
    fn from(without: Without<'_>) -> Self {
        if !without.base.has(without.missing) {
            return Self {
                ids: without.base.ids.clone(),
            };
        }

        let ids: Vec<AttachmentId> = without.iter().collect();
        Self {
            ids: ids.into_boxed_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_new_sorts() {
        let family = Family::new(&[9, 1, 4]);
        assert_eq!(family.ids(), &[1, 4, 9]);
        assert!(family.has(4));
        assert!(!family.has(5));
        assert_eq!(family.position(9), Some(2));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "duplicate attachment id")]
    fn test_new_rejects_duplicates() {
        let _ = Family::new(&[3, 1, 3]);
    }

    #[test]
    fn test_with_absent_id_merges() {
        let base = Family::new(&[1, 4, 9]);
        for extra in [0, 2, 5, 10] {
            let expected = Family::new(&[1, 4, 9, extra]);
            assert_eq!(base.with(extra).len(), 4);
            assert!(expected == base.with(extra));
            assert_eq!(Family::from(base.with(extra)), expected);
            assert_eq!(hash_of(&base.with(extra)), hash_of(&expected));
        }
    }

    #[test]
    fn test_with_present_id_is_identity() {
        let base = Family::new(&[1, 4, 9]);
        for extra in [1, 4, 9] {
            assert!(base == base.with(extra));
            assert_eq!(Family::from(base.with(extra)), base);
            assert_eq!(hash_of(&base.with(extra)), hash_of(&base));
        }
    }

    #[test]
    fn test_without_present_id_removes() {
        let base = Family::new(&[1, 4, 9]);
        let expected = Family::new(&[1, 9]);
        assert!(expected == base.without(4));
        assert_eq!(Family::from(base.without(4)), expected);
        assert_eq!(hash_of(&base.without(4)), hash_of(&expected));
    }

    #[test]
    fn test_without_absent_id_is_identity() {
        let base = Family::new(&[1, 4, 9]);
        assert!(base == base.without(5));
        assert_eq!(Family::from(base.without(5)), base);
        assert_eq!(hash_of(&base.without(5)), hash_of(&base));
    }

    #[test]
    fn test_with_on_empty_and_without_to_empty() {
        let empty = Family::empty();
        let single = Family::from(empty.with(7));
        assert_eq!(single.ids(), &[7]);
        assert!(empty == single.without(7));
        assert!(single.without(7).is_empty());
    }

    #[test]
    fn test_unequal_shapes() {
        let base = Family::new(&[1, 4]);
        assert!(!(Family::new(&[1, 4, 6]) == base.with(5)));
        assert!(!(Family::new(&[1]) == base.without(1)));
        assert!(!IdSpan::new(&[1, 5]).equivalent(&base));
    }

    #[test]
    fn test_span_hash_agrees() {
        let family = Family::new(&[2, 3, 5, 7]);
        let span = IdSpan::new(&[2, 3, 5, 7]);
        assert!(span.equivalent(&family));
        assert_eq!(hash_of(&span), hash_of(&family));
        assert!(family == *span.ids());
    }

    #[test]
    fn test_hashbrown_lookup_with_every_shape() {
        let mut map: hashbrown::HashMap<Family, usize> = hashbrown::HashMap::new();
        map.insert(Family::new(&[1, 2, 3]), 0);
        map.insert(Family::new(&[1, 3]), 1);

        let base = Family::new(&[1, 3]);
        assert_eq!(map.get(&base.with(2)), Some(&0));
        assert_eq!(map.get(&base.with(3)), Some(&1));

        let big = Family::new(&[1, 2, 3]);
        assert_eq!(map.get(&big.without(2)), Some(&1));
        assert_eq!(map.get(&IdSpan::new(&[1, 2, 3])), Some(&0));
        assert!(map.get(&big.without(1)).is_none());
    }

    #[test]
    fn test_with_iter_walks_merge() {
        let base = Family::new(&[10, 20, 30]);
        let ids: Vec<_> = base.with(25).iter().collect();
        assert_eq!(ids, vec![10, 20, 25, 30]);
        let ids: Vec<_> = base.with(20).iter().collect();
        assert_eq!(ids, vec![10, 20, 30]);
        let ids: Vec<_> = base.with(40).iter().collect();
        assert_eq!(ids, vec![10, 20, 30, 40]);
    }
}
