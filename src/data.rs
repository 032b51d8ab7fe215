//! Data containers
//!
//! `Matrix` borrows the caller's training or prediction data in column-major order,
//! `RowMajorMatrix` owns rows that are built up one instance at a time, such as
//! synthetic samples or class-probability outputs.
use serde::{Deserialize, Serialize};

/// Contiguous Column Major Matrix data container.
///
/// This structure holds a dense matrix of values in a single contiguous memory block,
/// in column-major order (Fortran-style).
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Indices into the data row-wise.
    pub index: Vec<usize>,
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
    stride1: usize,
    stride2: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix {
            data,
            index: (0..rows).collect(),
            rows,
            cols,
            stride1: rows,
            stride2: 1,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        let mut idx = self.stride2 * i;
        idx += j * self.stride1;
        idx
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        let i = self.item_index(0, col);
        let j = self.item_index(self.rows, col);
        &self.data[i..j]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }

    /// Gather the values of one column at the given rows.
    pub fn gather_col(&self, col: usize, rows: &[usize]) -> Vec<T> {
        let column = self.get_col(col);
        rows.iter().map(|i| column[*i]).collect()
    }
}

/// A lightweight row major matrix that owns its data. It is suited for
/// appending rows to, such as when generating synthetic instances one at a
/// time, or when building up per-row outputs to return to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMajorMatrix<T> {
    /// The raw data in row-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> RowMajorMatrix<T> {
    /// Create a new RowMajorMatrix.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Self {
        RowMajorMatrix { data, rows, cols }
    }

    /// A matrix with no rows and `cols` columns.
    pub fn empty(cols: usize) -> Self {
        RowMajorMatrix {
            data: Vec::new(),
            rows: 0,
            cols,
        }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[i * self.cols + j]
    }

    /// Borrow a full row.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over the rows of the matrix.
    pub fn row_iter(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact panics on a zero chunk size.
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Add rows to the matrix, this can be multiple
    /// rows, if they are in sequential order in the items.
    pub fn append_row(&mut self, items: Vec<T>) {
        assert!(self.cols > 0 && items.len() % self.cols == 0);
        let new_rows = items.len() / self.cols;
        self.rows += new_rows;
        self.data.extend(items);
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

impl<T: Copy> RowMajorMatrix<T> {
    /// Copy the contents into a column-major buffer, suitable for
    /// wrapping in a [`Matrix`].
    pub fn to_column_major(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.data.len());
        for j in 0..self.cols {
            for i in 0..self.rows {
                out.push(*self.get(i, j));
            }
        }
        out
    }
}
