//! Steady states of the moment system under constant
//! demography.

use ldmoments_operators::{MomentOperators, OperatorBuilder};
use nalgebra::{DMatrix, DVector};

use crate::linalg::{factorize, solve, sparse_factorize, sparse_solve, sparse_sum};
use crate::NumericsError;

/// Equilibrium statistics: one LD vector per
/// recombination rate, and the heterozygosities.
#[derive(Clone, Debug, PartialEq)]
pub struct SteadyState {
    pub ld: Vec<DVector<f64>>,
    pub h: DVector<f64>,
}

impl SteadyState {
    /// The LD vectors in order, with the heterozygosity
    /// vector appended last.
    pub fn into_vec(self) -> Vec<DVector<f64>> {
        let mut rv = self.ld;
        rv.push(self.h);
        rv
    }
}

pub(crate) fn check_theta(theta: f64) -> Result<(), NumericsError> {
    if theta.is_finite() && theta > 0.0 {
        Ok(())
    } else {
        Err(NumericsError::InvalidParameter(format!(
            "theta must be positive, got {}",
            theta
        )))
    }
}

pub(crate) fn check_rho(rho: &[f64]) -> Result<(), NumericsError> {
    match rho.iter().find(|r| !r.is_finite() || **r < 0.0) {
        Some(r) => Err(NumericsError::InvalidParameter(format!(
            "recombination rates must be non-negative, got {}",
            r
        ))),
        None => Ok(()),
    }
}

pub(crate) fn check_selfing(selfing: &[f64]) -> Result<(), NumericsError> {
    match selfing
        .iter()
        .find(|f| !f.is_finite() || !(0.0..=1.0).contains(*f))
    {
        Some(f) => Err(NumericsError::InvalidParameter(format!(
            "selfing rates must be between 0 and 1, got {}",
            f
        ))),
        None => Ok(()),
    }
}

/// Solve `(D + R_k + M) Y_k = -U H` for each recombination
/// rate with a sparse LU, reusing drift, migration and
/// mutation terms.
fn solve_ld<B: OperatorBuilder>(
    ops: &B,
    sizes: &[f64],
    migration: Option<&DMatrix<f64>>,
    theta: f64,
    rho: &[f64],
    h: &DVector<f64>,
) -> Result<Vec<DVector<f64>>, NumericsError> {
    if rho.is_empty() {
        return Ok(vec![]);
    }
    let n = ops.ld_len();
    let drift = ops.drift_ld(sizes)?;
    let mig = migration.map(|m| ops.migration_ld(m)).transpose()?;
    let rhs = -(&ops.mutation_ld(theta)? * h);
    rho.iter()
        .map(|r| {
            let recombination = ops.recombination(*r)?;
            let mut terms = vec![&drift, &recombination];
            if let Some(m) = mig.as_ref() {
                terms.push(m);
            }
            let lu = sparse_factorize(&sparse_sum(&terms, n)?, "equilibrium LD system")?;
            sparse_solve(&lu, &rhs, "equilibrium LD system")
        })
        .collect()
}

/// Equilibrium heterozygosity of one population:
/// `theta * (1 - f/2)` for selfing rate `f`.
pub fn steady_state_h(theta: f64, selfing: Option<f64>) -> Result<DVector<f64>, NumericsError> {
    check_theta(theta)?;
    let f = selfing.unwrap_or(0.0);
    check_selfing(&[f])?;
    Ok(DVector::from_element(1, theta * (1.0 - f / 2.0)))
}

/// Equilibrium of one population of relative size one.
///
/// An empty `rho` returns heterozygosities only.
///
/// # Examples
///
/// ```
/// use ldmoments_numerics::equilibrium::steady_state;
///
/// let ss = steady_state(0.001, &[0.0, 1.0], None).unwrap();
/// assert_eq!(ss.ld.len(), 2);
/// assert_eq!(ss.h[0], 0.001);
/// ```
pub fn steady_state(
    theta: f64,
    rho: &[f64],
    selfing: Option<f64>,
) -> Result<SteadyState, NumericsError> {
    check_rho(rho)?;
    let h = steady_state_h(theta, selfing)?;
    let mut ops = MomentOperators::new(1);
    if let Some(f) = selfing {
        ops = ops.with_selfing(&[f])?;
    }
    let ld = solve_ld(&ops, &[1.0], None, theta, rho, &h)?;
    Ok(SteadyState { ld, h })
}

/// Equilibrium of two populations with relative sizes
/// `nus` exchanging migrants.
///
/// `migration = [m01, m10]`, where `m01` is the rate of
/// migration into population 0 from population 1. Both
/// rates must be positive for a steady state to exist.
pub fn steady_state_two_pop(
    nus: [f64; 2],
    migration: [f64; 2],
    theta: f64,
    rho: &[f64],
    selfing: Option<[f64; 2]>,
) -> Result<SteadyState, NumericsError> {
    check_theta(theta)?;
    check_rho(rho)?;
    if let Some(nu) = nus.iter().find(|x| !x.is_finite() || **x <= 0.0) {
        return Err(NumericsError::InvalidParameter(format!(
            "relative population sizes must be positive, got {}",
            nu
        )));
    }
    if let Some(m) = migration.iter().find(|x| !x.is_finite() || **x <= 0.0) {
        return Err(NumericsError::InvalidParameter(format!(
            "migration rates must be positive, got {}",
            m
        )));
    }
    let mut ops = MomentOperators::new(2);
    if let Some(f) = selfing {
        check_selfing(&f)?;
        ops = ops.with_selfing(&f)?;
    }
    let m = DMatrix::from_row_slice(2, 2, &[0.0, migration[0], migration[1], 0.0]);

    let a = ops.drift_h(&nus)? + ops.migration_h(&m)?;
    let u = ops.mutation_h(theta)?;
    let lu = factorize(a, "equilibrium heterozygosity system")?;
    let h = solve(&lu, &(-u), "equilibrium heterozygosity system")?;

    let ld = solve_ld(&ops, &nus, Some(&m), theta, rho, &h)?;
    Ok(SteadyState { ld, h })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_vec_puts_h_last() {
        let ss = steady_state(0.01, &[1.0, 2.0], None).unwrap();
        let h = ss.h.clone();
        let v = ss.into_vec();
        assert_eq!(v.len(), 3);
        assert_eq!(v[2], h);
        assert_eq!(v[0].len(), 3);
    }

    #[test]
    fn test_selfing_scales_h() {
        let h = steady_state_h(0.002, Some(0.5)).unwrap();
        assert!((h[0] - 0.0015).abs() < 1e-18);
        assert!(steady_state_h(0.002, Some(-0.5)).is_err());
    }

    #[test]
    fn test_no_rho_is_h_only() {
        let ss = steady_state(0.001, &[], None).unwrap();
        assert!(ss.ld.is_empty());
        assert_eq!(ss.h.as_slice(), &[0.001]);
    }
}
