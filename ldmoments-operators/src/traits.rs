use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use crate::OperatorError;

/// Builds the linear operators of the moment system
/// for a fixed number of populations.
///
/// Heterozygosity operators are dense (their size is
/// `n(n+1)/2`), LD operators are sparse.
///
/// Implementations must be deterministic: identical
/// arguments give identical matrices. Integrators rely
/// on this to reuse factorizations between steps.
pub trait OperatorBuilder {
    fn num_pops(&self) -> usize;

    /// Drift acting on heterozygosities, for relative sizes `sizes`.
    fn drift_h(&self, sizes: &[f64]) -> Result<DMatrix<f64>, OperatorError>;

    /// Drift acting on LD statistics, for relative sizes `sizes`.
    fn drift_ld(&self, sizes: &[f64]) -> Result<CsrMatrix<f64>, OperatorError>;

    /// Constant mutation input to heterozygosities.
    fn mutation_h(&self, theta: f64) -> Result<DVector<f64>, OperatorError>;

    /// Mutation input to LD statistics. The matrix maps
    /// heterozygosities to LD statistics.
    fn mutation_ld(&self, theta: f64) -> Result<CsrMatrix<f64>, OperatorError>;

    /// Recombination acting on LD statistics.
    fn recombination(&self, rho: f64) -> Result<CsrMatrix<f64>, OperatorError>;

    /// Migration acting on heterozygosities.
    fn migration_h(&self, migration: &DMatrix<f64>) -> Result<DMatrix<f64>, OperatorError>;

    /// Migration acting on LD statistics.
    fn migration_ld(&self, migration: &DMatrix<f64>) -> Result<CsrMatrix<f64>, OperatorError>;

    fn het_len(&self) -> usize {
        ldmoments_core::num_het_moments(self.num_pops())
    }

    fn ld_len(&self) -> usize {
        ldmoments_core::num_ld_moments(self.num_pops())
    }
}
