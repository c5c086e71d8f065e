use std::sync::Arc;

use ldmoments_core::{moment_index, Moment, MomentIndex};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use crate::assembly::Assembler;
use crate::{check_len, OperatorBuilder, OperatorError};

/// The operators of the two-locus moment system.
///
/// Per-population selfing rates and frozen flags are
/// fixed at construction. A frozen population (for
/// example an ancient sample) has no drift, mutation,
/// recombination or migration of its own.
///
/// # Examples
///
/// ```
/// use ldmoments_operators::{MomentOperators, OperatorBuilder};
///
/// let ops = MomentOperators::new(1);
/// let d = ops.drift_ld(&[1.0]).unwrap();
/// assert_eq!(d.nrows(), 3);
/// let u = ops.mutation_h(0.001).unwrap();
/// assert_eq!(u[0], 0.001);
/// ```
#[derive(Clone, Debug)]
pub struct MomentOperators {
    index: Arc<MomentIndex>,
    selfing: Vec<f64>,
    frozen: Vec<bool>,
}

impl MomentOperators {
    pub fn new(num_pops: usize) -> Self {
        Self {
            index: moment_index(num_pops),
            selfing: vec![0.0; num_pops],
            frozen: vec![false; num_pops],
        }
    }

    /// Set per-population selfing rates, each in `[0, 1]`.
    pub fn with_selfing(mut self, selfing: &[f64]) -> Result<Self, OperatorError> {
        check_len(self.num_pops(), selfing.len())?;
        if let Some(f) = selfing
            .iter()
            .find(|f| !f.is_finite() || !(0.0..=1.0).contains(*f))
        {
            return Err(OperatorError::InvalidArgument(format!(
                "selfing rates must be between 0 and 1, got {}",
                f
            )));
        }
        self.selfing = selfing.to_vec();
        Ok(self)
    }

    /// Mark populations as frozen.
    pub fn with_frozen(mut self, frozen: &[bool]) -> Result<Self, OperatorError> {
        check_len(self.num_pops(), frozen.len())?;
        self.frozen = frozen.to_vec();
        Ok(self)
    }

    pub fn index(&self) -> &MomentIndex {
        &self.index
    }

    // 1/nu_i, or zero for frozen populations
    fn drift_rates(&self, sizes: &[f64]) -> Result<Vec<f64>, OperatorError> {
        check_len(self.num_pops(), sizes.len())?;
        sizes
            .iter()
            .zip(self.frozen.iter())
            .map(|(nu, frozen)| {
                if !nu.is_finite() || *nu <= 0.0 {
                    Err(OperatorError::InvalidArgument(format!(
                        "relative population sizes must be positive, got {}",
                        nu
                    )))
                } else if *frozen {
                    Ok(0.0)
                } else {
                    Ok(1.0 / nu)
                }
            })
            .collect()
    }

    // Mutation input to H_ii is theta * (1 - f_i / 2).
    fn mutation_weight(&self, pop: usize) -> f64 {
        if self.frozen[pop] {
            0.0
        } else {
            1.0 - self.selfing[pop] / 2.0
        }
    }

    // Recombination is reduced by the inbreeding
    // coefficient F = f / (2 - f).
    fn recombination_weight(&self, pop: usize) -> f64 {
        if self.frozen[pop] {
            0.0
        } else {
            let f = self.selfing[pop];
            1.0 - f / (2.0 - f)
        }
    }

    fn het_input(&self, theta: f64, i: usize, j: usize) -> f64 {
        theta / 2.0 * (self.mutation_weight(i) + self.mutation_weight(j))
    }

    fn migration_rates(&self, migration: &DMatrix<f64>) -> Result<DMatrix<f64>, OperatorError> {
        let n = self.num_pops();
        check_len(n, migration.nrows())?;
        check_len(n, migration.ncols())?;
        let mut rv = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let m = migration[(i, j)];
                if !m.is_finite() || m < 0.0 {
                    return Err(OperatorError::InvalidArgument(format!(
                        "migration rates must be non-negative, got {} for ({}, {})",
                        m, i, j
                    )));
                }
                if !self.frozen[i] && !self.frozen[j] {
                    rv[(i, j)] = m;
                }
            }
        }
        Ok(rv)
    }

    fn check_rate(name: &str, value: f64) -> Result<(), OperatorError> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(OperatorError::InvalidArgument(format!(
                "{} must be non-negative, got {}",
                name, value
            )))
        }
    }
}

impl OperatorBuilder for MomentOperators {
    fn num_pops(&self) -> usize {
        self.index.num_pops()
    }

    fn drift_h(&self, sizes: &[f64]) -> Result<DMatrix<f64>, OperatorError> {
        let w = self.drift_rates(sizes)?;
        let n = self.index.het_len();
        let mut a = Assembler::new(n, n, &self.index);
        for (row, m) in self.index.het_names().iter().enumerate() {
            if let Moment::H(i, j) = *m {
                if i == j {
                    a.add(row, *m, -w[i])?;
                }
            }
        }
        Ok(a.into_dense())
    }

    fn drift_ld(&self, sizes: &[f64]) -> Result<CsrMatrix<f64>, OperatorError> {
        let w = self.drift_rates(sizes)?;
        let n = self.index.ld_len();
        let mut a = Assembler::new(n, n, &self.index);
        for (row, m) in self.index.ld_names().iter().enumerate() {
            match *m {
                Moment::DD(i, j) if i == j => {
                    a.add(row, *m, -3.0 * w[i])?;
                    a.add(row, Moment::Dz(i, i, i), w[i])?;
                    a.add(row, Moment::Pi2(i, i, i, i), w[i])?;
                }
                Moment::DD(i, j) => a.add(row, *m, -(w[i] + w[j]))?,
                Moment::Dz(i, j, k) => {
                    let mut decay = w[i];
                    if i == j {
                        decay += 2.0 * w[i];
                    }
                    if i == k {
                        decay += 2.0 * w[i];
                    }
                    a.add(row, *m, -decay)?;
                    if j == k {
                        a.add(row, Moment::DD(i, j), 4.0 * w[j])?;
                    }
                }
                Moment::Pi2(i, j, k, l) => {
                    let mut decay = 0.0;
                    if i == j {
                        decay += w[i];
                    }
                    if k == l {
                        decay += w[k];
                    }
                    a.add(row, *m, -decay)?;
                    if i == k {
                        a.add(row, Moment::Dz(i, j, l), 0.25 * w[i])?;
                    }
                    if i == l {
                        a.add(row, Moment::Dz(i, j, k), 0.25 * w[i])?;
                    }
                    if j == k {
                        a.add(row, Moment::Dz(j, i, l), 0.25 * w[j])?;
                    }
                    if j == l {
                        a.add(row, Moment::Dz(j, i, k), 0.25 * w[j])?;
                    }
                }
                Moment::H(..) => (),
            }
        }
        Ok(a.into_csr())
    }

    fn mutation_h(&self, theta: f64) -> Result<DVector<f64>, OperatorError> {
        Self::check_rate("theta", theta)?;
        Ok(DVector::from_iterator(
            self.index.het_len(),
            self.index.het_names().iter().map(|m| match *m {
                Moment::H(i, j) => self.het_input(theta, i, j),
                _ => 0.0,
            }),
        ))
    }

    fn mutation_ld(&self, theta: f64) -> Result<CsrMatrix<f64>, OperatorError> {
        Self::check_rate("theta", theta)?;
        let mut a = Assembler::new(self.index.ld_len(), self.index.het_len(), &self.index);
        for (row, m) in self.index.ld_names().iter().enumerate() {
            // New mutations at one locus pick up the
            // heterozygosity of the other locus.
            if let Moment::Pi2(i, j, k, l) = *m {
                a.add(row, Moment::H(k, l), 0.25 * self.het_input(theta, i, j))?;
                a.add(row, Moment::H(i, j), 0.25 * self.het_input(theta, k, l))?;
            }
        }
        Ok(a.into_csr())
    }

    fn recombination(&self, rho: f64) -> Result<CsrMatrix<f64>, OperatorError> {
        Self::check_rate("rho", rho)?;
        let n = self.index.ld_len();
        let mut a = Assembler::new(n, n, &self.index);
        for (row, m) in self.index.ld_names().iter().enumerate() {
            match *m {
                Moment::DD(i, j) => a.add(
                    row,
                    *m,
                    -rho / 2.0 * (self.recombination_weight(i) + self.recombination_weight(j)),
                )?,
                Moment::Dz(i, _, _) => {
                    a.add(row, *m, -rho / 2.0 * self.recombination_weight(i))?
                }
                _ => (),
            }
        }
        Ok(a.into_csr())
    }

    fn migration_h(&self, migration: &DMatrix<f64>) -> Result<DMatrix<f64>, OperatorError> {
        let rates = self.migration_rates(migration)?;
        let num_pops = self.num_pops();
        let n = self.index.het_len();
        let mut a = Assembler::new(n, n, &self.index);
        for (row, m) in self.index.het_names().iter().enumerate() {
            if let Moment::H(i, j) = *m {
                for l in 0..num_pops {
                    let r = rates[(i, l)];
                    a.add(row, Moment::H(l, j), r)?;
                    a.add(row, *m, -r)?;
                    let r = rates[(j, l)];
                    a.add(row, Moment::H(i, l), r)?;
                    a.add(row, *m, -r)?;
                }
            }
        }
        Ok(a.into_dense())
    }

    fn migration_ld(&self, migration: &DMatrix<f64>) -> Result<CsrMatrix<f64>, OperatorError> {
        let rates = self.migration_rates(migration)?;
        let num_pops = self.num_pops();
        let n = self.index.ld_len();
        let mut a = Assembler::new(n, n, &self.index);
        for (row, m) in self.index.ld_names().iter().enumerate() {
            match *m {
                Moment::DD(i, j) => {
                    // Each D factor moves towards the source
                    // population and gains (p_l - p_i)(q_l - q_i).
                    for (x, y) in [(i, j), (j, i)] {
                        for l in 0..num_pops {
                            let r = rates[(x, l)];
                            if r == 0.0 {
                                continue;
                            }
                            a.add(row, Moment::DD(l, y), r)?;
                            a.add(row, *m, -r)?;
                            a.add(row, Moment::Dz(y, x, x), r / 4.0)?;
                            a.add(row, Moment::Dz(y, x, l), -r / 4.0)?;
                            a.add(row, Moment::Dz(y, l, x), -r / 4.0)?;
                            a.add(row, Moment::Dz(y, l, l), r / 4.0)?;
                        }
                    }
                }
                Moment::Dz(i, j, k) => {
                    for l in 0..num_pops {
                        let r = rates[(i, l)];
                        if r != 0.0 {
                            a.add(row, Moment::Dz(l, j, k), r)?;
                            a.add(row, *m, -r)?;
                            a.add(row, Moment::Pi2(i, j, i, k), 4.0 * r)?;
                            a.add(row, Moment::Pi2(i, j, l, k), -4.0 * r)?;
                            a.add(row, Moment::Pi2(l, j, i, k), -4.0 * r)?;
                            a.add(row, Moment::Pi2(l, j, l, k), 4.0 * r)?;
                        }
                        let r = rates[(j, l)];
                        a.add(row, Moment::Dz(i, l, k), r)?;
                        a.add(row, *m, -r)?;
                        let r = rates[(k, l)];
                        a.add(row, Moment::Dz(i, j, l), r)?;
                        a.add(row, *m, -r)?;
                    }
                }
                Moment::Pi2(i, j, k, l) => {
                    for s in 0..num_pops {
                        let r = rates[(i, s)];
                        a.add(row, Moment::Pi2(s, j, k, l), r)?;
                        a.add(row, *m, -r)?;
                        let r = rates[(j, s)];
                        a.add(row, Moment::Pi2(i, s, k, l), r)?;
                        a.add(row, *m, -r)?;
                        let r = rates[(k, s)];
                        a.add(row, Moment::Pi2(i, j, s, l), r)?;
                        a.add(row, *m, -r)?;
                        let r = rates[(l, s)];
                        a.add(row, Moment::Pi2(i, j, k, s), r)?;
                        a.add(row, *m, -r)?;
                    }
                }
                Moment::H(..) => (),
            }
        }
        Ok(a.into_csr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(m: &CsrMatrix<f64>) -> DMatrix<f64> {
        let mut rv = DMatrix::zeros(m.nrows(), m.ncols());
        for (i, j, v) in m.triplet_iter() {
            rv[(i, j)] += *v;
        }
        rv
    }

    #[test]
    fn test_one_population_drift() {
        let ops = MomentOperators::new(1);
        let d = dense(&ops.drift_ld(&[2.0]).unwrap());
        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[-1.5, 0.5, 0.5, 2.0, -2.5, 0.0, 0.0, 0.5, -1.0],
        );
        assert_eq!(d, expected);
        let dh = ops.drift_h(&[2.0]).unwrap();
        assert_eq!(dh[(0, 0)], -0.5);
    }

    #[test]
    fn test_one_population_recombination() {
        let ops = MomentOperators::new(1);
        let r = dense(&ops.recombination(4.0).unwrap());
        assert_eq!(r[(0, 0)], -4.0);
        assert_eq!(r[(1, 1)], -2.0);
        assert_eq!(r[(2, 2)], 0.0);
    }

    #[test]
    fn test_one_population_mutation() {
        let ops = MomentOperators::new(1);
        let u = dense(&ops.mutation_ld(0.01).unwrap());
        assert_eq!(u.shape(), (3, 1));
        assert_eq!(u[(2, 0)], 0.005);
        assert_eq!(u[(0, 0)], 0.0);
    }

    #[test]
    fn test_selfing() {
        let ops = MomentOperators::new(1).with_selfing(&[0.5]).unwrap();
        let u = ops.mutation_h(1.0).unwrap();
        assert_eq!(u[0], 0.75);
        let r = dense(&ops.recombination(1.0).unwrap());
        assert!((r[(0, 0)] + 2.0 / 3.0).abs() < 1e-15);
        assert!(MomentOperators::new(1).with_selfing(&[1.5]).is_err());
        assert!(MomentOperators::new(1).with_selfing(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn test_frozen_population_is_constant() {
        let ops = MomentOperators::new(2)
            .with_frozen(&[false, true])
            .unwrap();
        let index = moment_index(2);
        let d = dense(&ops.drift_ld(&[1.0, 1.0]).unwrap());
        let r = dense(&ops.recombination(1.0).unwrap());
        let row = index.position(Moment::DD(1, 1)).unwrap();
        assert!(d.row(row).iter().all(|x| *x == 0.0));
        assert!(r.row(row).iter().all(|x| *x == 0.0));
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let mh = ops.migration_h(&m).unwrap();
        assert!(mh.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_invalid_sizes() {
        let ops = MomentOperators::new(2);
        assert!(ops.drift_ld(&[1.0]).is_err());
        assert!(ops.drift_ld(&[1.0, 0.0]).is_err());
        assert!(ops.drift_h(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_invalid_migration() {
        let ops = MomentOperators::new(2);
        let m = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 1.0, 0.0]);
        assert!(ops.migration_ld(&m).is_err());
        let m = DMatrix::from_row_slice(1, 1, &[0.0]);
        assert!(ops.migration_h(&m).is_err());
    }
}
