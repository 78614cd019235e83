//! Defines the [`IndexHeap`] struct, a fixed-capacity binary min-heap of `u64`s.
//!
//! Slabs use it to track which of their slots are free, popping the minimum
//! makes slot reuse lowest-index-first.
//!
//! The heap lives in a single array. `array[..length]` is the heap proper
//! (parent of `i` is `(i - 1) / 2`, children are `2i + 1` and `2i + 2`) and
//! every slot in `array[length..]` holds the sentinel `capacity + 1`.
//! All traversals are bounded by `length`, the sentinel only marks vacated
//! slots for [`Display`](fmt::Display).

use core::fmt;
use core::mem::size_of;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeap {
    length: usize,
    array: Box<[u64]>,
}

impl IndexHeap {
    /// Creates an empty heap able to hold `capacity` values.
    pub fn new(capacity: usize) -> Result<Self> {
        let sentinel = capacity as u64 + 1;
        let mut array = Vec::new();
        array
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory {
                size: capacity.saturating_mul(size_of::<u64>()),
            })?;
        array.resize(capacity, sentinel);
        Ok(IndexHeap {
            length: 0,
            array: array.into_boxed_slice(),
        })
    }

    /// Creates a full heap out of `values`, the capacity is `values.len()`.
    /// This operation has a time complexity of *O*(n).
    pub fn from_array(values: &[u64]) -> Result<Self> {
        let mut heap = IndexHeap::new(values.len())?;
        heap.array.copy_from_slice(values);
        heap.length = values.len();
        heap.build();
        Ok(heap)
    }

    /// Creates a full heap holding `0..capacity`, the free slots of an empty slab.
    pub(crate) fn with_indices(capacity: usize) -> Result<Self> {
        let mut heap = IndexHeap::new(capacity)?;
        for (i, value) in heap.array.iter_mut().enumerate() {
            *value = i as u64;
        }
        heap.length = capacity;
        heap.build();
        Ok(heap)
    }

    /// Inserts `value` and returns the new length of the heap
    /// or [`Error::HeapOverflow`] if the heap is full, in which case it is left untouched.
    /// This operation has a time complexity of *O*(log n).
    pub fn insert(&mut self, value: u64) -> Result<usize> {
        if self.is_full() {
            return Err(Error::HeapOverflow {
                capacity: self.capacity(),
            });
        }
        self.array[self.length] = value;
        self.rise(self.length);
        self.length += 1;
        self.sink(0);
        Ok(self.length)
    }

    /// Removes and returns the minimum or `None` if the heap is empty.
    /// This operation has a time complexity of *O*(log n).
    pub fn pop_min(&mut self) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        let min = self.array[0];
        let end = self.length - 1;
        self.array.swap(0, end);
        self.array[end] = self.sentinel();
        self.length = end;
        self.sink(0);
        Some(min)
    }

    /// Returns the minimum without removing it.
    #[inline]
    pub fn peek(&self) -> Option<u64> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.length == self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.array.len()
    }

    /// The value marking unused slots of the backing array.
    #[inline]
    pub fn sentinel(&self) -> u64 {
        self.capacity() as u64 + 1
    }

    /// The live part of the backing array, in heap order.
    #[inline]
    pub fn as_slice(&self) -> &[u64] {
        &self.array[..self.length]
    }

    /// Heapifies each internal node from the last one up to the root,
    /// then sinks the root once more.
    fn build(&mut self) {
        for i in (0..self.length / 2).rev() {
            self.sink(i);
        }
        self.sink(0);
    }

    fn rise(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.array[index] >= self.array[parent] {
                break;
            }
            self.array.swap(index, parent);
            index = parent;
        }
    }

    fn sink(&mut self, mut index: usize) {
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;
            if left < self.length && self.array[left] < self.array[smallest] {
                smallest = left;
            }
            if right < self.length && self.array[right] < self.array[smallest] {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.array.swap(index, smallest);
            index = smallest;
        }
    }
}

/// Prints the whole backing array, unused slots are shown as `_`.
impl fmt::Display for IndexHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.array.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            if i >= self.length {
                f.write_str("_")?;
            } else {
                write!(f, "{value}")?;
            }
        }
        Ok(())
    }
}
