use crate::error::{MfErr, Result};

/// A user-item interaction matrix in compressed sparse row layout.
///
/// Rows are users and columns are items. Matrices without explicit values hold
/// implicit feedback, every stored entry is an observed interaction with target `1`.
///
/// Besides the CSR arrays the matrix keeps two derived indices: the owning row
/// of every entry and the entries grouped by column. They let the update kernel
/// walk the interactions of a single user or a single item without searching.
#[derive(Debug, Clone)]
pub struct SparseInteractionMatrix {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Box<[usize]>,
    col_idx: Box<[usize]>,
    values: Option<Box<[f32]>>,
    row_idx: Box<[usize]>,
    col_ptr: Box<[usize]>,
    col_entries: Box<[usize]>,
}

impl SparseInteractionMatrix {
    /// Creates a new implicit feedback `SparseInteractionMatrix`.
    ///
    /// # Arguments
    /// * `n_rows` - The amount of users.
    /// * `n_cols` - The amount of items.
    /// * `row_ptr` - Offsets into `col_idx`, of length `n_rows + 1`.
    /// * `col_idx` - The item of every stored interaction.
    ///
    /// # Returns
    /// A new matrix or a `MfErr::Construction` if the data is malformed.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
    ) -> Result<Self> {
        Self::build(n_rows, n_cols, row_ptr, col_idx, None)
    }

    /// Creates a new `SparseInteractionMatrix` holding an explicit value per entry.
    ///
    /// # Arguments
    /// * `n_rows` - The amount of users.
    /// * `n_cols` - The amount of items.
    /// * `row_ptr` - Offsets into `col_idx`, of length `n_rows + 1`.
    /// * `col_idx` - The item of every stored interaction.
    /// * `values` - The target value of every stored interaction.
    ///
    /// # Returns
    /// A new matrix or a `MfErr::Construction` if the data is malformed.
    pub fn with_values(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f32>,
    ) -> Result<Self> {
        Self::build(n_rows, n_cols, row_ptr, col_idx, Some(values))
    }

    /// Creates a new `SparseInteractionMatrix` from unordered `(user, item, value)` triplets.
    ///
    /// Triplets are stably sorted by user then item, duplicated pairs are kept.
    ///
    /// # Arguments
    /// * `n_rows` - The amount of users.
    /// * `n_cols` - The amount of items.
    /// * `triplets` - The interactions.
    /// * `implicit` - Whether to drop the values and treat every entry as an observation.
    ///
    /// # Returns
    /// A new matrix or a `MfErr::Construction` if any index is out of bounds.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        triplets: &[(usize, usize, f32)],
        implicit: bool,
    ) -> Result<Self> {
        if let Some(&(u, i, _)) = triplets.iter().find(|&&(u, i, _)| u >= n_rows || i >= n_cols) {
            return Err(MfErr::construction(format!(
                "interaction ({u}, {i}) is outside of a {n_rows}x{n_cols} matrix"
            )));
        }

        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(u, i, _)| (u, i));

        let mut row_ptr = vec![0; n_rows + 1];
        for &(u, _, _) in &sorted {
            row_ptr[u + 1] += 1;
        }
        for u in 0..n_rows {
            row_ptr[u + 1] += row_ptr[u];
        }

        let col_idx = sorted.iter().map(|&(_, i, _)| i).collect();
        let values = (!implicit).then(|| sorted.iter().map(|&(_, _, v)| v).collect());

        Self::build(n_rows, n_cols, row_ptr, col_idx, values)
    }

    fn build(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Option<Vec<f32>>,
    ) -> Result<Self> {
        let nnz = col_idx.len();

        if row_ptr.len() != n_rows + 1 {
            return Err(MfErr::construction(format!(
                "row_ptr has {} offsets, expected n_rows + 1 = {}",
                row_ptr.len(),
                n_rows + 1
            )));
        }

        if row_ptr[0] != 0 {
            return Err(MfErr::construction(format!(
                "row_ptr must start at 0, got {}",
                row_ptr[0]
            )));
        }

        if let Some(u) = row_ptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(MfErr::construction(format!(
                "row_ptr decreases at row {u}: {} > {}",
                row_ptr[u],
                row_ptr[u + 1]
            )));
        }

        if row_ptr[n_rows] != nnz {
            return Err(MfErr::construction(format!(
                "row_ptr ends at {}, but there are {nnz} column indices",
                row_ptr[n_rows]
            )));
        }

        if let Some(e) = col_idx.iter().position(|&i| i >= n_cols) {
            return Err(MfErr::construction(format!(
                "column index {} at entry {e} is out of range [0, {n_cols})",
                col_idx[e]
            )));
        }

        if let Some(values) = &values {
            if values.len() != nnz {
                return Err(MfErr::construction(format!(
                    "got {} values for {nnz} entries",
                    values.len()
                )));
            }

            if let Some(e) = values.iter().position(|v| !v.is_finite()) {
                return Err(MfErr::construction(format!("value at entry {e} is not finite")));
            }
        }

        let mut row_idx = Vec::with_capacity(nnz);
        for (u, w) in row_ptr.windows(2).enumerate() {
            row_idx.extend(std::iter::repeat_n(u, w[1] - w[0]));
        }

        let (col_ptr, col_entries) = column_index(n_cols, &col_idx);

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr: row_ptr.into_boxed_slice(),
            col_idx: col_idx.into_boxed_slice(),
            values: values.map(Vec::into_boxed_slice),
            row_idx: row_idx.into_boxed_slice(),
            col_ptr,
            col_entries,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// The amount of stored interactions.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// Whether the matrix only holds implicit observations.
    pub fn is_implicit(&self) -> bool {
        self.values.is_none()
    }

    /// Returns the entry id range of row `u`.
    ///
    /// # Panics
    /// If `u` is not a valid row.
    pub fn row_range(&self, u: usize) -> std::ops::Range<usize> {
        self.row_ptr[u]..self.row_ptr[u + 1]
    }

    /// Returns the items user `u` interacted with.
    ///
    /// # Panics
    /// If `u` is not a valid row.
    pub fn row(&self, u: usize) -> &[usize] {
        &self.col_idx[self.row_range(u)]
    }

    /// Returns the ids of the entries stored in column `i`, in ascending order.
    ///
    /// # Panics
    /// If `i` is not a valid column.
    pub fn col_entries(&self, i: usize) -> &[usize] {
        &self.col_entries[self.col_ptr[i]..self.col_ptr[i + 1]]
    }

    /// The row owning entry `e`.
    #[inline]
    pub fn entry_row(&self, e: usize) -> usize {
        self.row_idx[e]
    }

    /// The column of entry `e`.
    #[inline]
    pub fn entry_col(&self, e: usize) -> usize {
        self.col_idx[e]
    }

    /// The value the model should reconstruct for entry `e`.
    #[inline]
    pub fn target(&self, e: usize) -> f32 {
        match &self.values {
            Some(values) => values[e],
            None => 1.,
        }
    }

    /// The mean target value, `0` for an empty matrix.
    pub fn mean_target(&self) -> f32 {
        match &self.values {
            _ if self.nnz() == 0 => 0.,
            Some(values) => {
                let sum: f64 = values.iter().map(|&v| v as f64).sum();
                (sum / values.len() as f64) as f32
            }
            None => 1.,
        }
    }

    /// Iterates over every stored interaction as `(user, item, target)`.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.nnz()).map(|e| (self.row_idx[e], self.col_idx[e], self.target(e)))
    }
}

/// Groups entry ids by column with a counting sort, keeping ascending entry order.
fn column_index(n_cols: usize, col_idx: &[usize]) -> (Box<[usize]>, Box<[usize]>) {
    let mut col_ptr = vec![0; n_cols + 1];
    for &i in col_idx {
        col_ptr[i + 1] += 1;
    }
    for i in 0..n_cols {
        col_ptr[i + 1] += col_ptr[i];
    }

    let mut next = col_ptr.clone();
    let mut col_entries = vec![0; col_idx.len()];
    for (e, &i) in col_idx.iter().enumerate() {
        col_entries[next[i]] = e;
        next[i] += 1;
    }

    (col_ptr.into_boxed_slice(), col_entries.into_boxed_slice())
}
