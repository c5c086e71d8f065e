use ldmoments_core::{Moment, MomentIndex};
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Accumulates `(row, moment, value)` entries.
///
/// Columns are looked up by name in `cols`, so callers
/// may use any index order. Duplicate entries are summed.
pub(crate) struct Assembler<'a> {
    cols: &'a MomentIndex,
    coo: CooMatrix<f64>,
}

impl<'a> Assembler<'a> {
    pub(crate) fn new(nrows: usize, ncols: usize, cols: &'a MomentIndex) -> Self {
        Self {
            cols,
            coo: CooMatrix::new(nrows, ncols),
        }
    }

    pub(crate) fn add(
        &mut self,
        row: usize,
        col: Moment,
        value: f64,
    ) -> Result<(), ldmoments_core::Error> {
        if value != 0.0 {
            let j = self.cols.position(col)?;
            self.coo.push(row, j, value);
        }
        Ok(())
    }

    pub(crate) fn into_csr(self) -> CsrMatrix<f64> {
        CsrMatrix::from(&self.coo)
    }

    pub(crate) fn into_dense(self) -> DMatrix<f64> {
        let mut rv = DMatrix::zeros(self.coo.nrows(), self.coo.ncols());
        for (i, j, v) in self.coo.triplet_iter() {
            rv[(i, j)] += *v;
        }
        rv
    }
}
