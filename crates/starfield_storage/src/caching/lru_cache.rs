use crate::SmallKeyBuildHasher;

use core::hash::{BuildHasher, Hash};
use std::collections::{hash_map, HashMap};

/// A cache that tracks the Least Recently Used element for next eviction.
///
/// For the purpose of fast, repeated random access, LRU order is only updated on insertion or by calling `touch`.
///
/// Eviction does not happen inline; the user must explicitly call `remove_lru` (or `remove` a key chosen with `iter_lru`). Thus
/// the cache may grow unbounded unless removals occur. This lets the owner decide when a budget is actually enforced, and skip
/// entries that must stay resident.
#[derive(Clone, Debug)]
pub struct LruCache<K, V, H> {
    store: HashMap<K, (V, usize), H>,
    order: LruList<K>,
}

/// An `LruCache` using the `ahash` hashing algorithm.
pub type SmallKeyLruCache<K, V> = LruCache<K, V, SmallKeyBuildHasher>;

impl<K, V, H> Default for LruCache<K, V, H>
where
    H: Default,
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, H> LruCache<K, V, H>
where
    K: Hash + Eq,
{
    pub fn with_hasher(hasher_builder: H) -> LruCache<K, V, H> {
        LruCache {
            store: HashMap::with_hasher(hasher_builder),
            order: LruList::new(),
        }
    }
}

impl<K, V, H> LruCache<K, V, H>
where
    K: Hash + Eq + Clone,
    H: BuildHasher,
{
    /// Borrow the value for `key`. This will not update the LRU order.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.store.get(key).map(|(val, _)| val)
    }

    /// Inserts a `new_val` for `key`, returning the old value if it exists. `key` becomes the most recently used.
    #[inline]
    pub fn insert(&mut self, key: K, new_val: V) -> Option<V> {
        let Self { store, order } = self;
        match store.entry(key.clone()) {
            hash_map::Entry::Occupied(occupied) => {
                let (old_val, i) = occupied.into_mut();
                order.move_to_front(*i);

                Some(std::mem::replace(old_val, new_val))
            }
            hash_map::Entry::Vacant(vacant) => {
                let new_i = order.push_front(key);
                vacant.insert((new_val, new_i));

                None
            }
        }
    }

    /// Marks `key` as most recently used. Returns `false` iff there is no entry for `key`.
    #[inline]
    pub fn touch(&mut self, key: &K) -> bool {
        if let Some((_, i)) = self.store.get(key) {
            self.order.move_to_front(*i);

            true
        } else {
            false
        }
    }

    /// The least-recently used entry, without removing it.
    #[inline]
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.iter_lru().next()
    }

    /// Iterate over all entries, from least to most recently used.
    #[inline]
    pub fn iter_lru(&self) -> impl '_ + Iterator<Item = (&K, &V)> {
        self.order
            .iter_from_back()
            .filter_map(move |key| self.store.get(key).map(|(val, _)| (key, val)))
    }

    /// Removes the least-recently used value.
    #[inline]
    pub fn remove_lru(&mut self) -> Option<(K, V)> {
        let key = self.order.pop_back()?;
        let (val, _) = self.store.remove(&key)?;

        Some((key, val))
    }

    /// Removes any trace of `key`, such that further accesses will return `None` until a new value is inserted.
    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.store.remove(key).map(|(val, i)| {
            self.order.remove(i);

            val
        })
    }

    /// Delete all entries.
    #[inline]
    pub fn clear(&mut self) {
        self.store.clear();
        self.order.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Doubly-linked list using Vec as storage.
#[derive(Clone, Debug)]
struct LruList<T> {
    entries: Vec<ListEntry<T>>,
}

#[derive(Clone, Debug)]
struct ListEntry<T> {
    value: Option<T>,
    next: usize,
    prev: usize,
}

/// Free and occupied cells are each linked into a cyclic list with one auxiliary cell.
/// Cell #0 is on the list of free cells, element #1 is on the list of occupied cells.
impl<T> LruList<T> {
    const FREE: usize = 0;
    const OCCUPIED: usize = 1;

    fn new() -> LruList<T> {
        let mut list = LruList {
            entries: Vec::with_capacity(2),
        };
        list.push_sentinels();

        list
    }

    fn push_sentinels(&mut self) {
        for sentinel in [Self::FREE, Self::OCCUPIED] {
            self.entries.push(ListEntry::<T> {
                value: None,
                next: sentinel,
                prev: sentinel,
            });
        }
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.entries[index].prev;
        let next = self.entries[index].next;
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    fn link_after(&mut self, index: usize, prev: usize) {
        let next = self.entries[prev].next;
        self.entries[index].prev = prev;
        self.entries[index].next = next;
        self.entries[prev].next = index;
        self.entries[next].prev = index;
    }

    fn move_to_front(&mut self, index: usize) {
        self.unlink(index);
        self.link_after(index, Self::OCCUPIED);
    }

    fn push_front(&mut self, value: T) -> usize {
        if self.entries[Self::FREE].next == Self::FREE {
            self.entries.push(ListEntry::<T> {
                value: None,
                next: Self::FREE,
                prev: Self::FREE,
            });
            self.entries[Self::FREE].next = self.entries.len() - 1;
        }
        let index = self.entries[Self::FREE].next;
        self.entries[index].value = Some(value);
        self.unlink(index);
        self.link_after(index, Self::OCCUPIED);

        index
    }

    fn remove(&mut self, index: usize) -> Option<T> {
        self.unlink(index);
        self.link_after(index, Self::FREE);

        self.entries[index].value.take()
    }

    fn pop_back(&mut self) -> Option<T> {
        let index = self.entries[Self::OCCUPIED].prev;
        if index == Self::OCCUPIED {
            return None;
        }

        self.remove(index)
    }

    fn iter_from_back(&self) -> impl '_ + Iterator<Item = &T> {
        let mut index = self.entries[Self::OCCUPIED].prev;

        std::iter::from_fn(move || {
            if index == Self::OCCUPIED {
                return None;
            }
            let entry = &self.entries[index];
            index = entry.prev;

            entry.value.as_ref()
        })
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.push_sentinels();
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
