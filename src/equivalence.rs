//! Payload equality and hashing strategies.
//!
//! Every arena is parameterised by a [`PayloadEquivalence`] strategy. Node identity,
//! sibling lookup and the deduplication done by descendant enumeration all go through
//! it, so a payload type without (or with an unsuitable) `Eq`/`Hash` can still be
//! used as a tree payload.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Equality and hashing over payloads of type `T`.
///
/// Implementations must keep the two consistent: `equivalent(a, b)` implies
/// `hash_of(a) == hash_of(b)`.
pub trait PayloadEquivalence<T: ?Sized> {
    fn equivalent(a: &T, b: &T) -> bool;

    fn hash_of(value: &T) -> u64;
}

/// The payload type's own `Eq` and `Hash`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Intrinsic;

const HASH_SEED: u64 = 17;
const HASH_FACTOR: u64 = 23;

impl<T> PayloadEquivalence<T> for Intrinsic
where
    T: Eq + Hash + ?Sized,
{
    #[inline]
    fn equivalent(a: &T, b: &T) -> bool {
        a == b
    }

    #[inline]
    fn hash_of(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        HASH_SEED
            .wrapping_mul(HASH_FACTOR)
            .wrapping_add(hasher.finish())
    }
}

/// A payload (owned or borrowed) that hashes and compares through `Q`.
///
/// `K` is whatever holds the payload: `T` itself for [`PayloadKey`], `&T` for
/// [`PayloadRef`].
pub struct ByPayload<K, T: ?Sized, Q> {
    key: K,
    _marker: PhantomData<fn(&T) -> Q>,
}

/// Owned payload keyed by strategy `Q`. Used as the key of a node's children.
pub type PayloadKey<T, Q> = ByPayload<T, T, Q>;

/// Borrowed payload keyed by strategy `Q`.
pub type PayloadRef<'a, T, Q> = ByPayload<&'a T, T, Q>;

impl<K, T: ?Sized, Q> ByPayload<K, T, Q>
where
    K: Borrow<T>,
{
    pub fn new(key: K) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> &T {
        self.key.borrow()
    }

    pub fn into_inner(self) -> K {
        self.key
    }
}

impl<K, T: ?Sized, Q> PartialEq for ByPayload<K, T, Q>
where
    K: Borrow<T>,
    Q: PayloadEquivalence<T>,
{
    fn eq(&self, other: &Self) -> bool {
        Q::equivalent(self.key.borrow(), other.key.borrow())
    }
}

impl<K, T: ?Sized, Q> Eq for ByPayload<K, T, Q>
where
    K: Borrow<T>,
    Q: PayloadEquivalence<T>,
{
}

impl<K, T: ?Sized, Q> Hash for ByPayload<K, T, Q>
where
    K: Borrow<T>,
    Q: PayloadEquivalence<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(Q::hash_of(self.key.borrow()));
    }
}

/// Borrowed lookup key into maps keyed by [`ByPayload`], so lookups need no clone.
pub(crate) struct Lookup<'a, T: ?Sized, Q> {
    value: &'a T,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, T: ?Sized, Q> Lookup<'a, T, Q> {
    pub(crate) fn new(value: &'a T) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized, Q> Hash for Lookup<'_, T, Q>
where
    Q: PayloadEquivalence<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(Q::hash_of(self.value));
    }
}

impl<K, T: ?Sized, Q> indexmap::Equivalent<ByPayload<K, T, Q>> for Lookup<'_, T, Q>
where
    K: Borrow<T>,
    Q: PayloadEquivalence<T>,
{
    fn equivalent(&self, key: &ByPayload<K, T, Q>) -> bool {
        Q::equivalent(self.value, key.get())
    }
}

impl<K: Clone, T: ?Sized, Q> Clone for ByPayload<K, T, Q> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: fmt::Debug, T: ?Sized, Q> fmt::Debug for ByPayload<K, T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByPayload").field(&self.key).finish()
    }
}
