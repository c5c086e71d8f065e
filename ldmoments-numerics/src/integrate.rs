//! Semi-implicit time integration of the moment system.
//!
//! Each step of length `dt` applies the Crank-Nicolson
//! update
//!
//! `y <- (I - dt/2 A)^-1 [(I + dt/2 A) y + dt U h]`
//!
//! to every LD channel and to the heterozygosities,
//! where `A` is drift plus recombination plus migration.
//! LD channels are driven by the heterozygosities from
//! the start of the step.

use std::fmt;
use std::sync::Arc;

use ldmoments_operators::{MomentOperators, OperatorBuilder};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

use crate::equilibrium::{check_rho, check_selfing, check_theta};
use crate::linalg::{identity_plus, invert, sparse_factorize, sparse_solve, SparseFactors};
use crate::NumericsError;

/// Relative sizes of the populations during an epoch.
#[derive(Clone)]
pub enum PopulationSizes {
    Constant(Vec<f64>),
    /// Sizes as a function of time elapsed since the
    /// start of the epoch.
    Varying(Arc<dyn Fn(f64) -> Vec<f64> + Send + Sync>),
}

impl PopulationSizes {
    /// Sizes at elapsed time `t`.
    pub fn at(&self, t: f64) -> Vec<f64> {
        match self {
            PopulationSizes::Constant(s) => s.clone(),
            PopulationSizes::Varying(f) => f(t),
        }
    }
}

impl fmt::Debug for PopulationSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulationSizes::Constant(s) => f.debug_tuple("Constant").field(s).finish(),
            PopulationSizes::Varying(_) => f.write_str("Varying(..)"),
        }
    }
}

/// When the step operators of the previous step may be
/// reused.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CachePolicy {
    /// Reuse only if `dt` and every size are unchanged.
    #[default]
    Exact,
    /// Reuse while `dt` is unchanged and every size is
    /// within the given relative change of the sizes the
    /// operators were built with.
    RelativeTolerance(f64),
}

/// Default integration step, in units of `2N` generations.
pub const DEFAULT_TIME_STEP: f64 = 0.001;
/// Default scaled mutation rate `4Nu`.
pub const DEFAULT_THETA: f64 = 0.001;

/// Validated parameters of one epoch.
///
/// Built by [`EpochBuilder`].
#[derive(Clone, Debug)]
pub struct Epoch {
    num_pops: usize,
    sizes: PopulationSizes,
    duration: f64,
    dt: f64,
    theta: f64,
    rho: Vec<f64>,
    migration: Option<DMatrix<f64>>,
    selfing: Option<Vec<f64>>,
    frozen: Option<Vec<bool>>,
    cache_policy: CachePolicy,
}

/// Build an [`Epoch`].
///
/// # Examples
///
/// ```
/// use ldmoments_numerics::EpochBuilder;
///
/// let epoch = EpochBuilder::default()
///     .constant_sizes(&[2.0])
///     .duration(0.1)
///     .rho(&[1.0])
///     .build()
///     .unwrap();
/// assert_eq!(epoch.num_pops(), 1);
/// assert_eq!(epoch.time_step(), 0.001);
/// ```
#[derive(Clone, Debug)]
pub struct EpochBuilder {
    sizes: Option<PopulationSizes>,
    duration: f64,
    dt: f64,
    theta: f64,
    rho: Vec<f64>,
    migration: Option<DMatrix<f64>>,
    selfing: Option<Vec<f64>>,
    frozen: Option<Vec<bool>>,
    cache_policy: CachePolicy,
}

impl Default for EpochBuilder {
    fn default() -> Self {
        Self {
            sizes: None,
            duration: 0.0,
            dt: DEFAULT_TIME_STEP,
            theta: DEFAULT_THETA,
            rho: vec![],
            migration: None,
            selfing: None,
            frozen: None,
            cache_policy: CachePolicy::default(),
        }
    }
}

impl EpochBuilder {
    pub fn constant_sizes(self, sizes: &[f64]) -> Self {
        self.sizes(PopulationSizes::Constant(sizes.to_vec()))
    }

    pub fn varying_sizes<F>(self, f: F) -> Self
    where
        F: Fn(f64) -> Vec<f64> + Send + Sync + 'static,
    {
        self.sizes(PopulationSizes::Varying(Arc::new(f)))
    }

    pub fn sizes(mut self, sizes: PopulationSizes) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn time_step(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    /// Recombination rates, one LD channel each. Empty
    /// means heterozygosities only.
    pub fn rho(mut self, rho: &[f64]) -> Self {
        self.rho = rho.to_vec();
        self
    }

    /// `migration[(i, j)]` is the rate of migration into
    /// `i` from `j`. The diagonal is ignored.
    pub fn migration(mut self, migration: DMatrix<f64>) -> Self {
        self.migration = Some(migration);
        self
    }

    pub fn selfing(mut self, selfing: &[f64]) -> Self {
        self.selfing = Some(selfing.to_vec());
        self
    }

    pub fn frozen(mut self, frozen: &[bool]) -> Self {
        self.frozen = Some(frozen.to_vec());
        self
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    fn invalid(message: String) -> NumericsError {
        NumericsError::InvalidParameter(message)
    }

    fn check_len(what: &str, expected: usize, found: usize) -> Result<(), NumericsError> {
        if expected == found {
            Ok(())
        } else {
            Err(Self::invalid(format!(
                "{} has {} entries for {} population(s)",
                what, found, expected
            )))
        }
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// [`NumericsError::InvalidParameter`] if sizes are
    /// missing or not positive, the duration is negative,
    /// `dt`, theta, a recombination rate, a migration
    /// rate, a selfing rate or the cache tolerance is out
    /// of range, or any per-population parameter has the
    /// wrong length.
    pub fn build(self) -> Result<Epoch, NumericsError> {
        let sizes = self
            .sizes
            .ok_or_else(|| Self::invalid("population sizes are required".to_string()))?;
        let initial = sizes.at(0.0);
        let num_pops = initial.len();
        if num_pops == 0 {
            return Err(Self::invalid("at least one population is required".to_string()));
        }
        if let Some(nu) = initial.iter().find(|x| !x.is_finite() || **x <= 0.0) {
            return Err(Self::invalid(format!(
                "relative population sizes must be positive, got {}",
                nu
            )));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(Self::invalid(format!(
                "duration must be non-negative, got {}",
                self.duration
            )));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(Self::invalid(format!(
                "time step must be positive, got {}",
                self.dt
            )));
        }
        check_theta(self.theta)?;
        check_rho(&self.rho)?;
        if let Some(m) = self.migration.as_ref() {
            Self::check_len("migration matrix", num_pops, m.nrows())?;
            Self::check_len("migration matrix", num_pops, m.ncols())?;
            for i in 0..num_pops {
                for j in (0..num_pops).filter(|j| *j != i) {
                    let r = m[(i, j)];
                    if !r.is_finite() || r < 0.0 {
                        return Err(Self::invalid(format!(
                            "migration rates must be non-negative, got {}",
                            r
                        )));
                    }
                }
            }
        }
        if let Some(f) = self.selfing.as_ref() {
            Self::check_len("selfing", num_pops, f.len())?;
            check_selfing(f)?;
        }
        if let Some(f) = self.frozen.as_ref() {
            Self::check_len("frozen", num_pops, f.len())?;
        }
        if let CachePolicy::RelativeTolerance(tol) = self.cache_policy {
            if !tol.is_finite() || tol < 0.0 {
                return Err(Self::invalid(format!(
                    "cache tolerance must be non-negative, got {}",
                    tol
                )));
            }
        }
        Ok(Epoch {
            num_pops,
            sizes,
            duration: self.duration,
            dt: self.dt,
            theta: self.theta,
            rho: self.rho,
            migration: self.migration,
            selfing: self.selfing,
            frozen: self.frozen,
            cache_policy: self.cache_policy,
        })
    }
}

/// Summary of one integration call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IntegrationReport {
    pub steps: usize,
    /// Number of times the step operators were
    /// assembled and factorized.
    pub factorizations: usize,
}

impl Epoch {
    pub fn num_pops(&self) -> usize {
        self.num_pops
    }

    pub fn sizes(&self) -> &PopulationSizes {
        &self.sizes
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    pub fn migration(&self) -> Option<&DMatrix<f64>> {
        self.migration.as_ref()
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// `true` if any off-diagonal migration rate is positive.
    pub fn has_migration(&self) -> bool {
        self.migration.as_ref().map_or(false, |m| {
            m.iter()
                .enumerate()
                .any(|(k, r)| k % m.nrows() != k / m.nrows() && *r > 0.0)
        })
    }

    /// The operators for this epoch's selfing rates and
    /// frozen populations.
    pub fn operators(&self) -> Result<MomentOperators, NumericsError> {
        let mut ops = MomentOperators::new(self.num_pops);
        if let Some(f) = self.selfing.as_ref() {
            ops = ops.with_selfing(f)?;
        }
        if let Some(f) = self.frozen.as_ref() {
            ops = ops.with_frozen(f)?;
        }
        Ok(ops)
    }

    /// Integrate with [`Epoch::operators`].
    pub fn integrate(
        &self,
        ld: &mut [DVector<f64>],
        h: &mut DVector<f64>,
    ) -> Result<IntegrationReport, NumericsError> {
        integrate(&self.operators()?, self, ld, h)
    }
}

struct CacheKey {
    dt: f64,
    sizes: Vec<f64>,
}

impl CacheKey {
    fn matches(&self, dt: f64, sizes: &[f64], policy: CachePolicy) -> bool {
        if dt != self.dt || sizes.len() != self.sizes.len() {
            return false;
        }
        match policy {
            CachePolicy::Exact => sizes == self.sizes.as_slice(),
            CachePolicy::RelativeTolerance(tol) => sizes
                .iter()
                .zip(self.sizes.iter())
                .all(|(s, s0)| (s - s0).abs() <= tol * s0.abs()),
        }
    }
}

struct LdStep {
    explicit: CsrMatrix<f64>,
    implicit: SparseFactors,
}

/// Step operators for one `(dt, sizes)` combination.
/// Owned by a single integration call.
struct StepCache {
    key: Option<CacheKey>,
    explicit_h: DMatrix<f64>,
    implicit_h: DMatrix<f64>,
    ld: Vec<LdStep>,
}

// Operators that do not depend on dt or sizes.
struct FixedTerms {
    mutation_h: DVector<f64>,
    mutation_ld: Option<CsrMatrix<f64>>,
    recombination: Vec<CsrMatrix<f64>>,
    migration_h: Option<DMatrix<f64>>,
    migration_ld: Option<CsrMatrix<f64>>,
}

impl FixedTerms {
    fn new<B: OperatorBuilder>(ops: &B, epoch: &Epoch) -> Result<Self, NumericsError> {
        let has_ld = !epoch.rho.is_empty();
        let migration = if epoch.has_migration() {
            epoch.migration.as_ref()
        } else {
            None
        };
        Ok(Self {
            mutation_h: ops.mutation_h(epoch.theta)?,
            mutation_ld: if has_ld {
                Some(ops.mutation_ld(epoch.theta)?)
            } else {
                None
            },
            recombination: epoch
                .rho
                .iter()
                .map(|r| ops.recombination(*r))
                .collect::<Result<Vec<_>, _>>()?,
            migration_h: migration.map(|m| ops.migration_h(m)).transpose()?,
            migration_ld: match migration {
                Some(m) if has_ld => Some(ops.migration_ld(m)?),
                _ => None,
            },
        })
    }
}

impl StepCache {
    fn new() -> Self {
        Self {
            key: None,
            explicit_h: DMatrix::zeros(0, 0),
            implicit_h: DMatrix::zeros(0, 0),
            ld: vec![],
        }
    }

    fn is_fresh(&self, dt: f64, sizes: &[f64], policy: CachePolicy) -> bool {
        self.key
            .as_ref()
            .map_or(false, |k| k.matches(dt, sizes, policy))
    }

    fn rebuild<B: OperatorBuilder>(
        &mut self,
        ops: &B,
        fixed: &FixedTerms,
        dt: f64,
        sizes: Vec<f64>,
    ) -> Result<(), NumericsError> {
        self.key = None;
        let nh = ops.het_len();
        let mut a = ops.drift_h(&sizes)?;
        if let Some(m) = fixed.migration_h.as_ref() {
            a += m;
        }
        let eye = DMatrix::<f64>::identity(nh, nh);
        self.explicit_h = &eye + &a * (dt / 2.0);
        self.implicit_h = invert(&eye - &a * (dt / 2.0), "implicit heterozygosity step")?;

        self.ld.clear();
        if !fixed.recombination.is_empty() {
            let n = ops.ld_len();
            let drift = ops.drift_ld(&sizes)?;
            for r in fixed.recombination.iter() {
                let mut terms = vec![&drift, r];
                if let Some(m) = fixed.migration_ld.as_ref() {
                    terms.push(m);
                }
                let explicit = identity_plus(dt / 2.0, &terms, n)?;
                let implicit = identity_plus(-dt / 2.0, &terms, n)?;
                self.ld.push(LdStep {
                    explicit,
                    implicit: sparse_factorize(&implicit, "implicit LD step")?,
                });
            }
        }
        self.key = Some(CacheKey { dt, sizes });
        Ok(())
    }

    fn step(
        &self,
        fixed: &FixedTerms,
        dt: f64,
        ys: &mut [DVector<f64>],
        h: &mut DVector<f64>,
    ) -> Result<(), NumericsError> {
        if let Some(u) = fixed.mutation_ld.as_ref() {
            let input = (u * &*h) * dt;
            for (y, s) in ys.iter_mut().zip(self.ld.iter()) {
                let rhs = &s.explicit * &*y + &input;
                *y = sparse_solve(&s.implicit, &rhs, "implicit LD step")?;
            }
        }
        let rhs = &self.explicit_h * &*h + &fixed.mutation_h * dt;
        *h = &self.implicit_h * rhs;
        Ok(())
    }
}

fn check_state<B: OperatorBuilder>(
    ops: &B,
    epoch: &Epoch,
    ld: &[DVector<f64>],
    h: &DVector<f64>,
) -> Result<(), NumericsError> {
    let mismatch = |expected: usize, found: usize| -> NumericsError {
        ldmoments_core::Error::DimensionMismatch { expected, found }.into()
    };
    if ops.num_pops() != epoch.num_pops {
        return Err(mismatch(epoch.num_pops, ops.num_pops()));
    }
    if ld.len() != epoch.rho.len() {
        return Err(NumericsError::InvalidParameter(format!(
            "{} LD vector(s) for {} recombination rate(s)",
            ld.len(),
            epoch.rho.len()
        )));
    }
    if h.len() != ops.het_len() {
        return Err(mismatch(ops.het_len(), h.len()));
    }
    if let Some(y) = ld.iter().find(|y| y.len() != ops.ld_len()) {
        return Err(mismatch(ops.ld_len(), y.len()));
    }
    Ok(())
}

const STEP_TOLERANCE: f64 = 1e-9;

/// Number of steps of length at most `dt` covering
/// `duration`. A ratio within a relative [`STEP_TOLERANCE`]
/// of an integer counts as that integer.
fn step_count(duration: f64, dt: f64) -> usize {
    let ratio = duration / dt;
    let nearest = ratio.round();
    let n = if (ratio - nearest).abs() <= STEP_TOLERANCE * ratio.max(1.0) {
        nearest
    } else {
        ratio.ceil()
    };
    n.max(1.0) as usize
}

/// Advance `ld` (one vector per recombination rate of
/// `epoch`) and `h` by the duration of `epoch`.
///
/// The step operators are rebuilt only when `dt` or the
/// sizes at the step midpoint change, as decided by the
/// epoch's [`CachePolicy`]. Step `k` starts at `k * dt`
/// and the final step is shortened so that the steps add
/// up to the duration. A final step within a relative
/// `1e-9` of `dt` is taken at `dt`.
///
/// On error, `ld` and `h` are unchanged.
///
/// # Errors
///
/// * Dimension errors if the state does not match the
///   epoch or `ops`.
/// * Invalid sizes returned by a size function.
/// * [`NumericsError::SingularMatrix`] if an implicit
///   step cannot be solved.
/// * [`NumericsError::NonFiniteState`] if the result
///   contains NaN or infinite values.
pub fn integrate<B: OperatorBuilder>(
    ops: &B,
    epoch: &Epoch,
    ld: &mut [DVector<f64>],
    h: &mut DVector<f64>,
) -> Result<IntegrationReport, NumericsError> {
    check_state(ops, epoch, ld, h)?;
    let mut report = IntegrationReport::default();
    if epoch.duration == 0.0 {
        return Ok(report);
    }
    let fixed = FixedTerms::new(ops, epoch)?;
    let mut ys = ld.to_vec();
    let mut hv = h.clone();
    let mut cache = StepCache::new();
    let steps = step_count(epoch.duration, epoch.dt);
    for k in 0..steps {
        let elapsed = k as f64 * epoch.dt;
        let dt = if k + 1 == steps {
            let rest = epoch.duration - elapsed;
            if (rest - epoch.dt).abs() <= epoch.dt * STEP_TOLERANCE {
                epoch.dt
            } else {
                rest
            }
        } else {
            epoch.dt
        };
        let sizes = epoch.sizes.at(elapsed + dt / 2.0);
        if !cache.is_fresh(dt, &sizes, epoch.cache_policy) {
            log::debug!(
                "assembling step operators: dt = {}, sizes = {:?}, t = {}",
                dt,
                sizes,
                elapsed
            );
            cache.rebuild(ops, &fixed, dt, sizes)?;
            report.factorizations += 1;
        }
        cache.step(&fixed, dt, &mut ys, &mut hv)?;
        report.steps += 1;
    }
    if !hv.iter().chain(ys.iter().flat_map(|y| y.iter())).all(|x| x.is_finite()) {
        return Err(NumericsError::NonFiniteState {
            steps: report.steps,
        });
    }
    ld.clone_from_slice(&ys);
    *h = hv;
    log::debug!(
        "integrated T = {} in {} step(s) with {} factorization(s)",
        epoch.duration,
        report.steps,
        report.factorizations
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validation() {
        assert!(EpochBuilder::default().duration(1.0).build().is_err());
        let b = || EpochBuilder::default().constant_sizes(&[1.0, 2.0]).duration(1.0);
        assert!(b().build().is_ok());
        assert!(b().duration(-1.0).build().is_err());
        assert!(b().time_step(0.0).build().is_err());
        assert!(b().theta(0.0).build().is_err());
        assert!(b().rho(&[1.0, -1.0]).build().is_err());
        assert!(b().selfing(&[0.1]).build().is_err());
        assert!(b().selfing(&[0.1, 1.1]).build().is_err());
        assert!(b().frozen(&[true]).build().is_err());
        assert!(b()
            .migration(DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 0.0, 0.0]))
            .build()
            .is_err());
        assert!(b()
            .cache_policy(CachePolicy::RelativeTolerance(-0.1))
            .build()
            .is_err());
        assert!(EpochBuilder::default()
            .constant_sizes(&[1.0, 0.0])
            .build()
            .is_err());
        assert!(EpochBuilder::default()
            .varying_sizes(|t| vec![1.0 - t])
            .duration(0.5)
            .build()
            .is_ok());
    }

    #[test]
    fn test_has_migration_ignores_diagonal() {
        let epoch = EpochBuilder::default()
            .constant_sizes(&[1.0, 1.0])
            .migration(DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 3.0]))
            .build()
            .unwrap();
        assert!(!epoch.has_migration());
        let epoch = EpochBuilder::default()
            .constant_sizes(&[1.0, 1.0])
            .migration(DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 0.0]))
            .build()
            .unwrap();
        assert!(epoch.has_migration());
    }

    #[test]
    fn test_cache_key() {
        let key = CacheKey {
            dt: 0.1,
            sizes: vec![1.0, 2.0],
        };
        assert!(key.matches(0.1, &[1.0, 2.0], CachePolicy::Exact));
        assert!(!key.matches(0.1, &[1.0, 2.0 + 1e-12], CachePolicy::Exact));
        assert!(!key.matches(0.2, &[1.0, 2.0], CachePolicy::Exact));
        let tol = CachePolicy::RelativeTolerance(1e-3);
        assert!(key.matches(0.1, &[1.0005, 2.0], tol));
        assert!(!key.matches(0.1, &[1.01, 2.0], tol));
        assert!(!StepCache::new().is_fresh(0.1, &[1.0, 2.0], CachePolicy::Exact));
    }

    #[test]
    fn test_default_policy_is_exact() {
        assert_eq!(CachePolicy::default(), CachePolicy::Exact);
    }

    #[test]
    fn test_step_count() {
        assert_eq!(step_count(10.0, 1e-4), 100_000);
        assert_eq!(step_count(100.0, 1e-3), 100_000);
        assert_eq!(step_count(0.1, 0.001), 100);
        assert_eq!(step_count(0.0105, 0.001), 11);
        assert_eq!(step_count(0.3, 0.001), 300);
        assert_eq!(step_count(0.0004, 0.001), 1);
    }
}
