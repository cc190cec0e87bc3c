//! Stable per-task-group instance indices.
//!
//! A [`NameIndex`] is rebuilt for each task group on every pass from the
//! indices already in use and then hands out the lowest free index for each
//! new placement, keeping instance numbering dense.

use crate::name::alloc_name;
use crate::structs::Allocation;

const WORD_BITS: usize = u8::BITS as usize;

/// Fixed-size bit vector with byte-aligned storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u8>,
}

impl Bitmap {
    /// Creates a bitmap holding at least `size` bits, rounded up to a whole
    /// byte.
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; size.div_ceil(WORD_BITS)],
        }
    }

    /// Capacity in bits. Always a multiple of 8.
    pub fn size(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    pub fn set(&mut self, index: usize) {
        if index >= self.size() {
            self.grow(index + 1);
        }
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    pub fn check(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1 << (index % WORD_BITS)) != 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest unset bit, if any.
    pub fn first_unset(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u8::MAX)
            .map(|(i, word)| i * WORD_BITS + word.trailing_ones() as usize)
    }

    /// Grows to the next power of two that holds `min_size` bits.
    fn grow(&mut self, min_size: usize) {
        let size = min_size.next_power_of_two().max(WORD_BITS);
        self.words.resize(size.div_ceil(WORD_BITS), 0);
    }
}

/// Builds the in-use bitmap for a task group.
///
/// The size is the smallest power of two that is at least 8 and at least
/// `max(minimum_count, highest_index + 1)`. Allocations with malformed
/// names are left out of the in-use set.
pub fn bitmap_from<'a, I>(allocs: I, minimum_count: u32) -> Bitmap
where
    I: IntoIterator<Item = &'a Allocation>,
{
    let indexes: Vec<usize> = allocs
        .into_iter()
        .filter_map(Allocation::index)
        .map(|i| i as usize)
        .collect();

    let needed = indexes
        .iter()
        .map(|i| i + 1)
        .max()
        .unwrap_or(0)
        .max(minimum_count as usize);

    let mut bitmap = Bitmap::new(needed.next_power_of_two().max(WORD_BITS));
    for index in indexes {
        bitmap.set(index);
    }
    bitmap
}

/// Index allocator for one task group.
#[derive(Debug, Clone)]
pub struct NameIndex {
    job_id: String,
    task_group: String,
    bitmap: Bitmap,
}

impl NameIndex {
    /// Seeds the index with every allocation in `in_use`, sized for at
    /// least `minimum_count` instances.
    pub fn new<'a, I>(job_id: &str, task_group: &str, minimum_count: u32, in_use: I) -> Self
    where
        I: IntoIterator<Item = &'a Allocation>,
    {
        Self {
            job_id: job_id.to_string(),
            task_group: task_group.to_string(),
            bitmap: bitmap_from(in_use, minimum_count),
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn is_used(&self, index: u32) -> bool {
        self.bitmap.check(index as usize)
    }

    /// Claims a specific index, e.g. one reused by a replacement.
    pub fn claim(&mut self, index: u32) {
        self.bitmap.set(index as usize);
    }

    /// Returns the lowest unused index and marks it used.
    ///
    /// The bitmap is sized for the group's count up front; if a caller asks
    /// for more indices than that, the bitmap doubles rather than failing.
    pub fn next_free(&mut self) -> u32 {
        let index = match self.bitmap.first_unset() {
            Some(index) => index,
            None => self.bitmap.size(),
        };
        self.bitmap.set(index);
        index as u32
    }

    /// Claims the next free index and returns it with its allocation name.
    pub fn next_name(&mut self) -> (u32, String) {
        let index = self.next_free();
        (index, alloc_name(&self.job_id, &self.task_group, index))
    }
}
