//! Chunked column storage and type-erased column access.
//!
//! [`Column<T>`] stores the values of one component type for every entity of
//! an archetype, densely, in fixed-capacity chunks of [`CHUNK_SIZE`] rows:
//!
//! ```text
//! chunks[0]: [v0 .. v511]      full
//! chunks[1]: [v512 .. v900]    last chunk, partially filled
//! ```
//!
//! Row `r` lives in chunk `r / CHUNK_SIZE` at offset `r % CHUNK_SIZE`. All
//! chunks except the last are full; the last chunk holds exactly the remaining
//! rows, so a chunk slice never exposes an unused slot.
//!
//! # Core operations
//!
//! - **Append**: [`Column::push`] writes into the last chunk and allocates a
//!   new chunk when the last one is full.
//! - **Remove**: [`Column::swap_remove`] moves the last row into the removed
//!   slot and shrinks by one. `O(1)`, keeps the column dense, does not keep
//!   row order.
//! - **Transfer**: [`ErasedColumn::push_from`] swap-removes a row from a
//!   column of the same type in another archetype and appends it here.
//!
//! # Type erasure
//!
//! Archetypes hold heterogeneous columns as `Box<dyn ErasedColumn>`. The
//! trait mirrors the typed operations and adds raw value read/write for
//! collaborators (serializers) that only know a [`ComponentId`](crate::engine::types::ComponentId).

use std::any::{type_name, Any};

use crate::engine::error::ColumnError;
use crate::engine::types::CHUNK_SIZE;

/// Dense, chunked storage for one component type.
#[derive(Debug)]
pub struct Column<T> {
    chunks: Vec<Vec<T>>,
    length: usize,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self { chunks: Vec::new(), length: 0 }
    }
}

impl<T> Column<T> {
    /// Number of populated rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the column holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of allocated chunks.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    fn locate(row: usize) -> (usize, usize) {
        (row / CHUNK_SIZE, row % CHUNK_SIZE)
    }

    /// Appends a value and returns its row.
    pub fn push(&mut self, value: T) -> usize {
        let needs_chunk = self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.len() == CHUNK_SIZE);
        if needs_chunk {
            self.chunks.push(Vec::with_capacity(CHUNK_SIZE));
        }
        if let Some(last) = self.chunks.last_mut() {
            last.push(value);
        }
        let row = self.length;
        self.length += 1;
        row
    }

    /// Removes `row` by moving the last row into its slot.
    ///
    /// ## Panics
    /// Panics if `row` is out of bounds.
    pub fn swap_remove(&mut self, row: usize) -> T {
        assert!(row < self.length, "row {row} out of bounds (length {})", self.length);
        let mut last_value = self.pop_last();
        if row != self.length {
            let (chunk, offset) = Self::locate(row);
            std::mem::swap(&mut self.chunks[chunk][offset], &mut last_value);
        }
        last_value
    }

    fn pop_last(&mut self) -> T {
        let last = self.chunks.last_mut().expect("non-empty column has a chunk");
        let value = last.pop().expect("last chunk is never empty");
        if last.is_empty() {
            self.chunks.pop();
        }
        self.length -= 1;
        value
    }

    /// Value at `row`.
    #[inline]
    pub fn get(&self, row: usize) -> Option<&T> {
        if row >= self.length {
            return None;
        }
        let (chunk, offset) = Self::locate(row);
        Some(&self.chunks[chunk][offset])
    }

    /// Mutable value at `row`.
    #[inline]
    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        if row >= self.length {
            return None;
        }
        let (chunk, offset) = Self::locate(row);
        Some(&mut self.chunks[chunk][offset])
    }

    /// Populated rows of chunk `chunk`. Empty for chunks past the end.
    #[inline]
    pub fn chunk(&self, chunk: usize) -> &[T] {
        match self.chunks.get(chunk) {
            Some(rows) => rows.as_slice(),
            None => &[],
        }
    }

    /// Mutable populated rows of chunk `chunk`.
    #[inline]
    pub fn chunk_mut(&mut self, chunk: usize) -> &mut [T] {
        match self.chunks.get_mut(chunk) {
            Some(rows) => rows.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Mutable chunks in storage order.
    #[inline]
    pub fn chunks_mut(&mut self) -> ChunksMut<'_, T> {
        ChunksMut { chunks: self.chunks.iter_mut() }
    }

    /// Iterates every populated row in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }
}

/// Iterator over the mutable chunk slices of a [`Column<T>`].
#[derive(Debug)]
pub struct ChunksMut<'a, T> {
    chunks: std::slice::IterMut<'a, Vec<T>>,
}

impl<'a, T> Iterator for ChunksMut<'a, T> {
    type Item = &'a mut [T];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(Vec::as_mut_slice)
    }
}

/// Object-safe view of a [`Column<T>`] for heterogeneous archetype storage.
pub trait ErasedColumn: Any + Send + Sync {
    /// Number of populated rows.
    fn len(&self) -> usize;

    /// Human-readable element type name.
    fn element_type_name(&self) -> &'static str;

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Appends a default-initialized row.
    fn push_default(&mut self) -> usize;

    /// Swap-removes `row` from `source` (same element type) and appends the
    /// value here. Returns the new row.
    ///
    /// ## Panics
    /// Panics if `source` has a different element type.
    fn push_from(&mut self, source: &mut dyn ErasedColumn, row: usize) -> usize;

    /// Swap-removes `row` and drops its value.
    fn swap_remove_drop(&mut self, row: usize);

    /// Borrow of the value at `row` as `&dyn Any`.
    fn value_any(&self, row: usize) -> Option<&dyn Any>;

    /// Cloned value at `row`.
    fn read_value(&self, row: usize) -> Result<Box<dyn Any + Send>, ColumnError>;

    /// Overwrites the value at `row`.
    fn write_value(&mut self, row: usize, value: Box<dyn Any + Send>) -> Result<(), ColumnError>;
}

impl<T: Clone + Default + Send + Sync + 'static> ErasedColumn for Column<T> {
    fn len(&self) -> usize {
        self.length
    }

    fn element_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn push_default(&mut self) -> usize {
        self.push(T::default())
    }

    fn push_from(&mut self, source: &mut dyn ErasedColumn, row: usize) -> usize {
        let source = source
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .unwrap_or_else(|| panic!("push_from: source column is not `{}`", type_name::<T>()));
        let value = source.swap_remove(row);
        self.push(value)
    }

    fn swap_remove_drop(&mut self, row: usize) {
        self.swap_remove(row);
    }

    fn value_any(&self, row: usize) -> Option<&dyn Any> {
        self.get(row).map(|value| value as &dyn Any)
    }

    fn read_value(&self, row: usize) -> Result<Box<dyn Any + Send>, ColumnError> {
        self.get(row)
            .map(|value| Box::new(value.clone()) as Box<dyn Any + Send>)
            .ok_or(ColumnError::RowOutOfBounds { row, length: self.length })
    }

    fn write_value(&mut self, row: usize, value: Box<dyn Any + Send>) -> Result<(), ColumnError> {
        let length = self.length;
        let slot = self
            .get_mut(row)
            .ok_or(ColumnError::RowOutOfBounds { row, length })?;
        let value = value
            .downcast::<T>()
            .map_err(|_| ColumnError::TypeMismatch { expected: type_name::<T>() })?;
        *slot = *value;
        Ok(())
    }
}

/// Constructor of an empty erased column for one component type.
pub type ColumnFactory = fn() -> Box<dyn ErasedColumn>;

/// Creates an empty erased column of element type `T`.
pub fn new_column<T: Clone + Default + Send + Sync + 'static>() -> Box<dyn ErasedColumn> {
    Box::new(Column::<T>::default())
}
