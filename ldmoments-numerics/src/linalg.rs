use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::Lu as SparseLu;
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::NumericsError;

pub(crate) fn check_shape(
    a: &CsrMatrix<f64>,
    nrows: usize,
    ncols: usize,
) -> Result<(), NumericsError> {
    for (expected, found) in [(nrows, a.nrows()), (ncols, a.ncols())] {
        if expected != found {
            return Err(ldmoments_core::Error::DimensionMismatch { expected, found }.into());
        }
    }
    Ok(())
}

fn combine(
    diagonal: f64,
    scale: f64,
    terms: &[&CsrMatrix<f64>],
    n: usize,
) -> Result<CsrMatrix<f64>, NumericsError> {
    let mut coo = CooMatrix::new(n, n);
    if diagonal != 0.0 {
        for i in 0..n {
            coo.push(i, i, diagonal);
        }
    }
    for a in terms {
        check_shape(a, n, n)?;
        for (i, j, v) in a.triplet_iter() {
            coo.push(i, j, scale * v);
        }
    }
    Ok(CsrMatrix::from(&coo))
}

/// `I + scale * sum(terms)`.
pub(crate) fn identity_plus(
    scale: f64,
    terms: &[&CsrMatrix<f64>],
    n: usize,
) -> Result<CsrMatrix<f64>, NumericsError> {
    combine(1.0, scale, terms, n)
}

/// The sum of square sparse operators.
pub(crate) fn sparse_sum(
    terms: &[&CsrMatrix<f64>],
    n: usize,
) -> Result<CsrMatrix<f64>, NumericsError> {
    combine(0.0, 1.0, terms, n)
}

/// Sparse LU factors of an LD system.
pub(crate) struct SparseFactors {
    lu: SparseLu<usize, f64>,
    n: usize,
}

pub(crate) fn sparse_factorize(
    a: &CsrMatrix<f64>,
    what: &str,
) -> Result<SparseFactors, NumericsError> {
    let singular = || NumericsError::SingularMatrix(what.to_string());
    // CSR storage holds no duplicate entries.
    let triplets = a
        .triplet_iter()
        .map(|(i, j, v)| Triplet::new(i, j, *v))
        .collect::<Vec<_>>();
    let m = SparseColMat::<usize, f64>::try_new_from_triplets(a.nrows(), a.ncols(), &triplets)
        .map_err(|_| singular())?;
    let lu = m.as_ref().sp_lu().map_err(|_| singular())?;
    Ok(SparseFactors { lu, n: a.nrows() })
}

pub(crate) fn sparse_solve(
    factors: &SparseFactors,
    b: &DVector<f64>,
    what: &str,
) -> Result<DVector<f64>, NumericsError> {
    if b.len() != factors.n {
        return Err(ldmoments_core::Error::DimensionMismatch {
            expected: factors.n,
            found: b.len(),
        }
        .into());
    }
    let rhs = Mat::from_fn(b.len(), 1, |i, _| b[i]);
    let x = factors.lu.solve(rhs.as_ref());
    let x = DVector::from_fn(b.len(), |i, _| x[(i, 0)]);
    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err(NumericsError::SingularMatrix(what.to_string()))
    }
}

pub(crate) fn factorize(a: DMatrix<f64>, what: &str) -> Result<LU<f64, Dyn, Dyn>, NumericsError> {
    let lu = a.lu();
    if lu.is_invertible() {
        Ok(lu)
    } else {
        Err(NumericsError::SingularMatrix(what.to_string()))
    }
}

pub(crate) fn solve(
    lu: &LU<f64, Dyn, Dyn>,
    b: &DVector<f64>,
    what: &str,
) -> Result<DVector<f64>, NumericsError> {
    match lu.solve(b) {
        Some(x) if x.iter().all(|v| v.is_finite()) => Ok(x),
        _ => Err(NumericsError::SingularMatrix(what.to_string())),
    }
}

pub(crate) fn invert(a: DMatrix<f64>, what: &str) -> Result<DMatrix<f64>, NumericsError> {
    a.try_inverse()
        .ok_or_else(|| NumericsError::SingularMatrix(what.to_string()))
}
