//! # Columnar Archetype Storage
//!
//! One [`Table`] per Family. Memory layout is Structure of Arrays:
//!
//! ```text
//! entities:  [E0, E1, E2, ...]
//! column 0:  [P0, P1, P2, ...]   <- size_of(P) * capacity bytes
//! column 1:  [V0, V1, V2, ...]   <- size_of(V) * capacity bytes
//! ```
//!
//! Row `n` of every column belongs to `entities[n]`. Columns are ordered like
//! the ids of the Table's Family, so the World maps an attachment id to a
//! column with `Family::position`.
//!
//! The Table stores raw bytes. It knows each column's [`ComponentMeta`] and
//! calls its drop hook for every value it destroys; moving values in and out
//! is a bitwise copy.

// SAFETY: This module requires unsafe for type-erased column memory.
// All unsafe blocks are documented with the invariant they rely on.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::ptr::{self, NonNull};

use bytemuck::Pod;

use super::component::ComponentMeta;
use super::entity::EntityId;

/// Smallest non-zero row capacity.
const MIN_CAPACITY: usize = 4;

/// Raw storage for one component type.
struct Column {
    meta: ComponentMeta,
    /// Start of `capacity` slots. Dangling (but aligned) until first growth
    /// and for zero-sized components.
    data: NonNull<u8>,
}

impl Column {
    fn new(meta: ComponentMeta) -> Self {
        Self {
            meta,
            data: NonNull::new(meta.align() as *mut u8).unwrap_or(NonNull::dangling()),
        }
    }

    fn array_layout(&self, rows: usize) -> Layout {
        let bytes = self
            .meta
            .size()
            .checked_mul(rows)
            .expect("table column size overflow");
        Layout::from_size_align(bytes, self.meta.align()).expect("invalid column layout")
    }

    #[inline]
    fn ptr(&self, row: usize) -> *mut u8 {
        // Pointer arithmetic only; stays within (or one past) the allocation
        // for every row < capacity.
        self.data.as_ptr().wrapping_add(row * self.meta.size())
    }

    /// Moves the first `len` rows into a fresh allocation of `new_cap` rows.
    ///
    /// # Safety
    ///
    /// `old_cap` must be the capacity this column was last grown to, and
    /// `len <= old_cap < new_cap`.
    unsafe fn grow(&mut self, len: usize, old_cap: usize, new_cap: usize) {
        if self.meta.size() == 0 {
            return;
        }

        let new_layout = self.array_layout(new_cap);
        // SAFETY: size > 0 and new_cap > 0, so the layout is non-zero.
        let raw = unsafe { alloc(new_layout) };
        let Some(new_data) = NonNull::new(raw) else {
            handle_alloc_error(new_layout)
        };

        if old_cap > 0 {
            // SAFETY: the old allocation holds `len` initialized rows and the
            // new one has room for at least that many; they do not overlap.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.data.as_ptr(),
                    new_data.as_ptr(),
                    len * self.meta.size(),
                );
                dealloc(self.data.as_ptr(), self.array_layout(old_cap));
            }
        }

        self.data = new_data;
    }

    /// Drops rows `from..to` in place.
    ///
    /// # Safety
    ///
    /// Every row in the range must be initialized and is uninitialized after.
    unsafe fn drop_rows(&mut self, from: usize, to: usize) {
        if !self.meta.needs_drop() {
            return;
        }
        for row in from..to {
            // SAFETY: forwarded from the caller.
            unsafe { self.meta.drop_in_place(self.ptr(row)) };
        }
    }

    /// Frees the allocation without touching values.
    ///
    /// # Safety
    ///
    /// `capacity` must be the capacity this column was last grown to.
    unsafe fn free(&mut self, capacity: usize) {
        if self.meta.size() > 0 && capacity > 0 {
            // SAFETY: allocated in `grow` with exactly this layout.
            unsafe { dealloc(self.data.as_ptr(), self.array_layout(capacity)) };
        }
    }
}

/// Columnar storage for every entity of one archetype.
///
/// # Example
///
/// ```rust
/// use ember_core::{ComponentMeta, EntityId, Table};
///
/// let mut table = Table::new(&[ComponentMeta::of::<u32>()]);
/// // SAFETY: the new row is initialized right away.
/// let row = unsafe { table.insert(EntityId::new(0, 0)) };
/// unsafe { table.write(0, row, 7u32) };
/// assert_eq!(unsafe { *table.get::<u32>(0, row) }, 7);
/// assert_eq!(table.remove(row), None);
/// ```
pub struct Table {
    columns: Vec<Column>,
    /// Owner of each row; its length is the row count.
    entities: Vec<EntityId>,
    /// Rows every column has room for.
    capacity: usize,
}

impl Table {
    /// Creates an empty table with one column per meta, in order.
    #[must_use]
    pub fn new(metas: &[ComponentMeta]) -> Self {
        Self {
            columns: metas.iter().copied().map(Column::new).collect(),
            entities: Vec::new(),
            capacity: 0,
        }
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Checks if the table has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Rows the columns can hold before reallocating.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Metadata of column `col`.
    #[inline]
    #[must_use]
    pub fn meta(&self, col: usize) -> Option<&ComponentMeta> {
        self.columns.get(col).map(|column| &column.meta)
    }

    /// Entity owning `row`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, row: usize) -> Option<EntityId> {
        self.entities.get(row).copied()
    }

    /// Entity ids in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Ensures room for at least `rows` rows, doubling capacity.
    pub fn reserve_rows(&mut self, rows: usize) {
        if rows <= self.capacity {
            return;
        }

        let new_cap = rows.max(self.capacity * 2).max(MIN_CAPACITY);
        let len = self.len();
        for column in &mut self.columns {
            // SAFETY: `self.capacity` is the capacity every column was last
            // grown to, and len <= capacity < new_cap.
            unsafe { column.grow(len, self.capacity, new_cap) };
        }
        tracing::trace!(from = self.capacity, to = new_cap, "table grown");
        self.capacity = new_cap;
    }

    /// Sets the row count to `rows`.
    ///
    /// Growing reallocates (amortized) and appends rows owned by
    /// [`EntityId::NULL`]; shrinking drops the trailing rows and keeps the
    /// allocation.
    ///
    /// # Safety
    ///
    /// When growing, the caller must initialize every column of every new
    /// row before the table is read, shrunk, or dropped.
    pub unsafe fn resize(&mut self, rows: usize) {
        let len = self.len();
        if rows > len {
            self.reserve_rows(rows);
            self.entities.resize(rows, EntityId::NULL);
        } else {
            for column in &mut self.columns {
                // SAFETY: rows..len are initialized rows being discarded.
                unsafe { column.drop_rows(rows, len) };
            }
            self.entities.truncate(rows);
        }
    }

    /// Appends one row owned by `entity` and returns its index.
    ///
    /// # Safety
    ///
    /// The row is uninitialized; the caller must write every column at the
    /// returned row before the table is read, shrunk, or dropped.
    pub unsafe fn insert(&mut self, entity: EntityId) -> usize {
        let row = self.len();
        // SAFETY: forwarded to the caller.
        unsafe { self.resize(row + 1) };
        self.entities[row] = entity;
        row
    }

    /// Destroys `row` and moves the last row into its place.
    ///
    /// # Returns
    ///
    /// The entity that now owns `row`, if a row was moved. The caller must
    /// update whatever index pointed at that entity's old (last) row.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len`.
    pub fn remove(&mut self, row: usize) -> Option<EntityId> {
        assert!(row < self.len(), "row {row} out of range for table of {} rows", self.len());
        for column in &mut self.columns {
            // SAFETY: row < len, so it holds an initialized value.
            unsafe { column.drop_rows(row, row + 1) };
        }
        self.swap_remove_forget(row)
    }

    /// Like [`Table::remove`] but does not drop the row's values.
    ///
    /// Used after the values have been moved into another table. Values
    /// that were not moved out are leaked.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len`.
    pub fn swap_remove_forget(&mut self, row: usize) -> Option<EntityId> {
        assert!(row < self.len(), "row {row} out of range for table of {} rows", self.len());
        let last = self.len() - 1;
        if row != last {
            for column in &self.columns {
                // SAFETY: both rows are < len and distinct; row `last` is
                // about to be discarded so its bytes move rather than copy.
                unsafe {
                    ptr::copy_nonoverlapping(column.ptr(last), column.ptr(row), column.meta.size());
                }
            }
        }
        self.entities.swap_remove(row);
        (row != last).then(|| self.entities[row])
    }

    /// Drops every value of column `col` and removes the column, shifting
    /// later columns left.
    ///
    /// # Panics
    ///
    /// Panics if `col >= column_count`.
    pub fn remove_column(&mut self, col: usize) {
        assert!(col < self.columns.len(), "column {col} out of range");
        let mut column = self.columns.remove(col);
        // SAFETY: all rows < len are initialized; the column is discarded.
        unsafe {
            column.drop_rows(0, self.len());
            column.free(self.capacity);
        }
    }

    /// Raw pointer to the cell at (`col`, `row`).
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of range.
    #[inline]
    #[must_use]
    pub fn cell_ptr(&self, col: usize, row: usize) -> *mut u8 {
        debug_assert!(row < self.capacity.max(1), "row {row} past capacity");
        self.columns[col].ptr(row)
    }

    /// Writes `value` into an uninitialized cell.
    ///
    /// # Safety
    ///
    /// Column `col` must store `T`, `row < len`, and the cell must not hold
    /// a live value (it would be leaked).
    #[inline]
    pub unsafe fn write<T>(&mut self, col: usize, row: usize, value: T) {
        debug_assert_eq!(self.columns[col].meta.size(), std::mem::size_of::<T>());
        // SAFETY: forwarded from the caller.
        unsafe { self.cell_ptr(col, row).cast::<T>().write(value) };
    }

    /// Copies raw bytes into an uninitialized cell.
    ///
    /// # Safety
    ///
    /// `row < len`, the cell must not hold a live value, and `bytes` must be
    /// a valid value of the column's component type.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len()` differs from the column's component size.
    pub unsafe fn write_bytes(&mut self, col: usize, row: usize, bytes: &[u8]) {
        let size = self.columns[col].meta.size();
        assert_eq!(bytes.len(), size, "byte length does not match column");
        // SAFETY: forwarded from the caller; the source is a distinct slice.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.cell_ptr(col, row), size) };
    }

    /// Borrows the value at (`col`, `row`).
    ///
    /// # Safety
    ///
    /// Column `col` must store `T` and `row < len`.
    #[inline]
    #[must_use]
    pub unsafe fn get<T>(&self, col: usize, row: usize) -> &T {
        // SAFETY: forwarded from the caller.
        unsafe { &*self.cell_ptr(col, row).cast::<T>() }
    }

    /// Mutably borrows the value at (`col`, `row`).
    ///
    /// # Safety
    ///
    /// Column `col` must store `T` and `row < len`.
    #[inline]
    pub unsafe fn get_mut<T>(&mut self, col: usize, row: usize) -> &mut T {
        // SAFETY: forwarded from the caller.
        unsafe { &mut *self.cell_ptr(col, row).cast::<T>() }
    }

    /// Drops the value at (`col`, `row`), leaving the cell uninitialized.
    ///
    /// # Safety
    ///
    /// `row < len` and the cell must hold a live value. The row must be
    /// forgotten or rewritten before anything else reads it.
    pub unsafe fn drop_cell(&mut self, col: usize, row: usize) {
        let column = &mut self.columns[col];
        // SAFETY: forwarded from the caller.
        unsafe { column.drop_rows(row, row + 1) };
    }

    /// Bitwise-moves one cell into a cell of another table.
    ///
    /// # Safety
    ///
    /// Both columns must store the same component type, the source cell must
    /// be live (and is logically moved-from afterwards), and the destination
    /// cell must be uninitialized.
    pub unsafe fn move_cell_to(&self, col: usize, row: usize, dst: &mut Table, dst_col: usize, dst_row: usize) {
        let size = self.columns[col].meta.size();
        debug_assert_eq!(size, dst.columns[dst_col].meta.size());
        // SAFETY: distinct tables never share allocations.
        unsafe { ptr::copy_nonoverlapping(self.cell_ptr(col, row), dst.cell_ptr(dst_col, dst_row), size) };
    }

    /// Views column `col` as raw bytes, `len * size` long.
    ///
    /// # Safety
    ///
    /// The column's values must contain no padding or uninitialized bytes.
    #[must_use]
    pub unsafe fn column_bytes(&self, col: usize) -> &[u8] {
        let column = &self.columns[col];
        let bytes = self.len() * column.meta.size();
        if bytes == 0 {
            return &[];
        }
        // SAFETY: the first `len` rows are initialized; the caller vouches
        // for the absence of padding.
        unsafe { std::slice::from_raw_parts(column.data.as_ptr(), bytes) }
    }

    /// Views column `col` as a typed slice of plain data.
    ///
    /// # Safety
    ///
    /// Column `col` must store `T`.
    #[must_use]
    pub unsafe fn column_pod<T: Pod>(&self, col: usize) -> &[T] {
        if std::mem::size_of::<T>() == 0 || self.is_empty() {
            return &[];
        }
        // SAFETY: `T: Pod` has no padding; the column stores `T`.
        bytemuck::cast_slice(unsafe { self.column_bytes(col) })
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let len = self.len();
        for column in &mut self.columns {
            // SAFETY: rows < len are initialized; `capacity` matches the last
            // growth of every column.
            unsafe {
                column.drop_rows(0, len);
                column.free(self.capacity);
            }
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field(
                "columns",
                &self.columns.iter().map(|c| c.meta.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn two_column_table() -> Table {
        Table::new(&[ComponentMeta::of::<u64>(), ComponentMeta::of::<[f32; 3]>()])
    }

    fn push_row(table: &mut Table, n: u32) -> usize {
        unsafe {
            let row = table.insert(EntityId::new(n, 0));
            table.write(0, row, u64::from(n));
            table.write(1, row, [n as f32; 3]);
            row
        }
    }

    #[test]
    fn test_table_creation() {
        let table = two_column_table();
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = two_column_table();
        for n in 0..10 {
            assert_eq!(push_row(&mut table, n), n as usize);
        }
        assert_eq!(table.len(), 10);
        assert!(table.capacity() >= 10);
        unsafe {
            assert_eq!(*table.get::<u64>(0, 7), 7);
            assert_eq!(*table.get::<[f32; 3]>(1, 3), [3.0; 3]);
        }
    }

    #[test]
    fn test_swap_remove_moves_last_row() {
        let mut table = two_column_table();
        for n in 0..5 {
            push_row(&mut table, n);
        }

        let moved = table.remove(1);
        assert_eq!(moved, Some(EntityId::new(4, 0)));
        assert_eq!(table.len(), 4);
        unsafe {
            assert_eq!(*table.get::<u64>(0, 1), 4);
            assert_eq!(*table.get::<[f32; 3]>(1, 1), [4.0; 3]);
        }
        assert_eq!(table.entity_at(1), Some(EntityId::new(4, 0)));
    }

    #[test]
    fn test_remove_last_row_moves_nothing() {
        let mut table = two_column_table();
        for n in 0..3 {
            push_row(&mut table, n);
        }
        assert_eq!(table.remove(2), None);
        assert_eq!(table.entities(), &[EntityId::new(0, 0), EntityId::new(1, 0)]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_remove_out_of_range_panics() {
        let mut table = two_column_table();
        push_row(&mut table, 0);
        table.remove(1);
    }

    #[test]
    fn test_drop_hooks_run() {
        let drops = Rc::new(Cell::new(0));
        let mut table = Table::new(&[ComponentMeta::of::<DropCounter>()]);
        for n in 0..4 {
            unsafe {
                let row = table.insert(EntityId::new(n, 0));
                table.write(0, row, DropCounter(Rc::clone(&drops)));
            }
        }

        table.remove(0);
        assert_eq!(drops.get(), 1);

        unsafe { table.resize(1) };
        assert_eq!(drops.get(), 3);
        assert!(table.capacity() >= 4);

        drop(table);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn test_swap_remove_forget_does_not_drop() {
        let drops = Rc::new(Cell::new(0));
        let mut table = Table::new(&[ComponentMeta::of::<DropCounter>()]);
        let row = unsafe {
            let row = table.insert(EntityId::new(0, 0));
            table.write(0, row, DropCounter(Rc::clone(&drops)));
            row
        };

        // Move the value out first, as an archetype transition would.
        let value = unsafe { table.cell_ptr(0, row).cast::<DropCounter>().read() };
        table.swap_remove_forget(row);
        assert_eq!(drops.get(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_remove_column_shifts() {
        let mut table = Table::new(&[
            ComponentMeta::of::<u8>(),
            ComponentMeta::of::<u16>(),
            ComponentMeta::of::<u32>(),
        ]);
        unsafe {
            let row = table.insert(EntityId::new(0, 0));
            table.write(0, row, 1u8);
            table.write(1, row, 2u16);
            table.write(2, row, 3u32);
        }

        table.remove_column(1);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.meta(1).unwrap().size(), 4);
        unsafe { assert_eq!(*table.get::<u32>(1, 0), 3) };
    }

    #[test]
    fn test_zero_sized_columns() {
        struct Marker;
        let mut table = Table::new(&[ComponentMeta::of::<Marker>(), ComponentMeta::of::<u32>()]);
        for n in 0..100 {
            unsafe {
                let row = table.insert(EntityId::new(n, 0));
                table.write(0, row, Marker);
                table.write(1, row, n);
            }
        }
        table.remove(10);
        unsafe { assert_eq!(*table.get::<u32>(1, 10), 99) };
    }

    #[test]
    fn test_column_pod_view() {
        let mut table = Table::new(&[ComponentMeta::of::<u32>()]);
        for n in 0..6u32 {
            unsafe {
                let row = table.insert(EntityId::new(n, 0));
                table.write_bytes(0, row, bytemuck::bytes_of(&(n * 10)));
            }
        }
        let values = unsafe { table.column_pod::<u32>(0) };
        assert_eq!(values, &[0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_relocated_row_readable_in_every_column() {
        let mut table = two_column_table();
        let n = 9;
        for i in 0..n {
            push_row(&mut table, i);
        }
        let k = 3;
        table.remove(k);
        assert_eq!(table.len(), (n - 1) as usize);
        unsafe {
            assert_eq!(*table.get::<u64>(0, k), u64::from(n - 1));
            assert_eq!(*table.get::<[f32; 3]>(1, k), [(n - 1) as f32; 3]);
        }
    }
}
