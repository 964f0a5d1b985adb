use itertools::Itertools;
use nalgebra::DMatrix;
use std::convert::AsRef;
use std::mem;
use std::ops::{Add, Mul};

#[allow(non_camel_case_types)]
type float = f64;

/// Coordinate (triplet) form of a sparse matrix.
///
/// Entries pushed with a value of zero are kept so the sparsity pattern of a Jacobian does not
/// depend on the point it was evaluated at. Duplicate entries are summed when the matrix is built.
#[derive(Clone, Debug)]
pub struct Builder {
    coords: Vec<(usize, usize, float)>,
    nrows: usize,
    ncols: usize,
}

impl Builder {
    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Builder {
        Builder {
            coords: Vec::with_capacity(nnz),
            nrows,
            ncols,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn coords(&self) -> &[(usize, usize, float)] {
        &self.coords
    }

    pub fn clear(&mut self) {
        self.coords.clear();
    }

    #[inline]
    pub fn push(&mut self, row: usize, col: usize, val: float) {
        debug_assert!(row < self.nrows, "row {} out of bounds", row);
        debug_assert!(col < self.ncols, "column {} out of bounds", col);
        self.coords.push((row, col, val));
    }

    /// Returns `self^T * v`.
    pub fn transpose_mul_vec(&self, v: &[float]) -> Vec<float> {
        assert_eq!(v.len(), self.nrows);
        let mut out = vec![0.0; self.ncols];
        for &(r, c, val) in &self.coords {
            out[c] += val * v[r];
        }
        out
    }

    /// Returns the upper triangle of `self^T * self`.
    ///
    /// Every pair of entries sharing a row contributes one product, so this is cheap when rows
    /// hold only a handful of entries.
    pub fn gram_upper(&self) -> Builder {
        let mut by_row = self.coords.clone();
        by_row.sort_unstable_by_key(|&(r, c, _)| (r, c));
        let by_row: Vec<_> = by_row
            .into_iter()
            .coalesce(|l, r| {
                if l.0 == r.0 && l.1 == r.1 {
                    Ok((l.0, l.1, l.2 + r.2))
                } else {
                    Err((l, r))
                }
            })
            .collect();

        let mut gram = Builder::with_capacity(self.ncols, self.ncols, by_row.len() * 2);
        for (_, row) in &by_row.into_iter().group_by(|&(r, _, _)| r) {
            let row: Vec<_> = row.collect();
            // Columns within a row are ascending so (ci, cj) is always in the upper triangle
            for (i, &(_, ci, vi)) in row.iter().enumerate() {
                for &(_, cj, vj) in &row[i..] {
                    gram.push(ci, cj, vi * vj);
                }
            }
        }
        gram
    }

    pub fn build_csc(&mut self) -> CscMatrix {
        // Sort and sum any duplicates in the same cell
        let mut coords = mem::replace(&mut self.coords, Vec::new());
        coords.sort_unstable_by_key(|&(r, c, _)| (c, r));
        self.coords = coords
            .into_iter()
            .coalesce(|l, r| {
                if l.0 == r.0 && l.1 == r.1 {
                    Ok((l.0, l.1, l.2 + r.2))
                } else {
                    Err((l, r))
                }
            })
            .collect();

        let mut indptr = vec![0; self.ncols + 1];
        let mut indices = vec![0; self.coords.len()];
        let mut data = vec![0.0; self.coords.len()];

        // Fill in CSC column start and end pointer and row index
        let mut last_c = 0;
        for (i, &(r, c, val)) in self.coords.iter().enumerate() {
            while last_c < c {
                last_c += 1;
                indptr[last_c] = i;
            }
            indices[i] = r;
            data[i] = val;
        }
        // Set the remaining column index pointers to one past the end of the data array
        while last_c < self.ncols {
            last_c += 1;
            indptr[last_c] = self.coords.len();
        }

        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        }
    }
}

impl AsRef<Builder> for Builder {
    fn as_ref(&self) -> &Builder {
        self
    }
}

impl Add for Builder {
    type Output = Builder;

    fn add(self, other: Builder) -> Builder {
        add(&[self, other])
    }
}

impl Mul<float> for Builder {
    type Output = Builder;

    fn mul(mut self, other: float) -> Builder {
        for &mut (_, _, ref mut val) in &mut self.coords {
            *val = other * (*val);
        }
        self
    }
}

pub fn eye(n: usize) -> Builder {
    let mut builder = Builder::with_capacity(n, n, n);
    for i in 0..n {
        builder.coords.push((i, i, 1.0));
    }
    builder
}

pub fn add<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let (nrows, ncols) = blocks
        .get(0)
        .map(|b| b.as_ref().shape())
        .unwrap_or((0, 0));
    let mut acc = preallocate_for_merge(blocks, nrows, ncols);
    for block in blocks {
        let block = block.as_ref();
        assert_eq!(
            nrows, block.nrows,
            "matrices being added must have the same number of rows"
        );
        assert_eq!(
            ncols, block.ncols,
            "matrices being added must have the same number of columns"
        );
        block_merge(&mut acc, block, 0, 0);
    }
    acc
}

pub fn vstack<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let ncols = blocks.get(0).map(|b| b.as_ref().ncols).unwrap_or(0);
    let mut acc = preallocate_for_merge(blocks, 0, ncols);
    for block in blocks {
        let block = block.as_ref();
        assert_eq!(
            ncols, block.ncols,
            "vstack requires matrices to have the same number of columns"
        );
        let row_shift = acc.nrows;
        block_merge(&mut acc, block, row_shift, 0);
        acc.nrows += block.nrows;
    }
    acc
}

fn preallocate_for_merge<B: AsRef<Builder>>(blocks: &[B], nrows: usize, ncols: usize) -> Builder {
    let nnz = blocks.iter().map(|b| b.as_ref().coords.len()).sum();
    Builder::with_capacity(nrows, ncols, nnz)
}

fn block_merge(left: &mut Builder, right: &Builder, row_shift: usize, col_shift: usize) {
    left.coords.extend(
        right
            .coords
            .iter()
            .map(|&(r, c, val)| (r + row_shift, c + col_shift, val)),
    );
}

#[derive(Clone, Debug)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<float>,
}

impl CscMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[float] {
        &self.data
    }

    /// Returns true if no stored entry lies below the diagonal.
    pub fn is_upper_tri(&self) -> bool {
        (0..self.ncols).all(|c| {
            self.indices[self.indptr[c]..self.indptr[c + 1]]
                .iter()
                .all(|&r| r <= c)
        })
    }

    pub fn to_dense(&self) -> DMatrix<float> {
        let mut mat = DMatrix::zeros(self.nrows, self.ncols);

        for c in 0..self.ncols {
            for i in self.indptr[c]..self.indptr[c + 1] {
                let r = self.indices[i];
                mat[(r, c)] = self.data[i];
            }
        }

        mat
    }
}
