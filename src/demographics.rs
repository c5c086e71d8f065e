//! Standard demographic models.
//!
//! Times are in units of `2N` generations of the
//! ancestral population and sizes are relative to it.
//! Every model starts from the one-population
//! equilibrium.

use ldmoments_numerics::{EpochBuilder, DEFAULT_THETA};
use nalgebra::DMatrix;

use crate::{LdError, LdStats};

/// Parameters shared by all models.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelOptions {
    /// Scaled mutation rate `4Nu`.
    pub theta: f64,
    /// Recombination rates. Empty means heterozygosities
    /// only.
    pub rho: Vec<f64>,
    /// Ids given to the populations of the result.
    pub pop_ids: Option<Vec<String>>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            rho: vec![],
            pop_ids: None,
        }
    }
}

impl ModelOptions {
    fn epoch(&self) -> EpochBuilder {
        EpochBuilder::default().theta(self.theta).rho(&self.rho)
    }

    fn name(&self, y: LdStats) -> Result<LdStats, LdError> {
        match self.pop_ids.as_ref() {
            Some(ids) => y.with_pop_ids(ids),
            None => Ok(y),
        }
    }
}

/// One-population models.
pub mod one_pop {
    use super::*;

    fn equilibrium(options: &ModelOptions) -> Result<LdStats, LdError> {
        LdStats::steady_state(options.theta, &options.rho)
    }

    /// The standard neutral model.
    ///
    /// # Examples
    ///
    /// ```
    /// use ldmoments::demographics::{one_pop, ModelOptions};
    ///
    /// let y = one_pop::snm(&ModelOptions::default()).unwrap();
    /// assert_eq!(y.h()[0], 0.001);
    /// ```
    pub fn snm(options: &ModelOptions) -> Result<LdStats, LdError> {
        options.name(equilibrium(options)?)
    }

    /// An instantaneous size change to `nu`, `t` time
    /// units ago.
    pub fn two_epoch(nu: f64, t: f64, options: &ModelOptions) -> Result<LdStats, LdError> {
        let mut y = equilibrium(options)?;
        y.integrate(&options.epoch().constant_sizes(&[nu]).duration(t).build()?)?;
        options.name(y)
    }

    /// Size `nu1` for `t1`, then size `nu2` for `t2`.
    pub fn three_epoch(
        nu1: f64,
        nu2: f64,
        t1: f64,
        t2: f64,
        options: &ModelOptions,
    ) -> Result<LdStats, LdError> {
        let mut y = equilibrium(options)?;
        y.integrate(&options.epoch().constant_sizes(&[nu1]).duration(t1).build()?)?;
        y.integrate(&options.epoch().constant_sizes(&[nu2]).duration(t2).build()?)?;
        options.name(y)
    }

    /// Exponential size change from 1 to `nu_f` over `t`.
    pub fn growth(nu_f: f64, t: f64, options: &ModelOptions) -> Result<LdStats, LdError> {
        if !nu_f.is_finite() || nu_f <= 0.0 {
            return Err(ldmoments_numerics::NumericsError::InvalidParameter(format!(
                "final size must be positive, got {}",
                nu_f
            ))
            .into());
        }
        let mut y = equilibrium(options)?;
        let rate = if t > 0.0 { nu_f.ln() / t } else { 0.0 };
        let epoch = options
            .epoch()
            .varying_sizes(move |s| vec![(rate * s).exp()])
            .duration(t)
            .build()?;
        y.integrate(&epoch)?;
        options.name(y)
    }
}

/// Two-population models.
pub mod two_pop {
    use super::*;

    /// A split of the equilibrium population with no
    /// subsequent change.
    pub fn snm(options: &ModelOptions) -> Result<LdStats, LdError> {
        let y = LdStats::steady_state(options.theta, &options.rho)?.split(0, None)?;
        options.name(y)
    }

    /// Split into populations of sizes `nu1` and `nu2`
    /// `t` time units ago, with symmetric migration `m`.
    pub fn split_mig(
        nu1: f64,
        nu2: f64,
        t: f64,
        m: f64,
        options: &ModelOptions,
    ) -> Result<LdStats, LdError> {
        let mut y = LdStats::steady_state(options.theta, &options.rho)?.split(0, None)?;
        let epoch = options
            .epoch()
            .constant_sizes(&[nu1, nu2])
            .migration(DMatrix::from_row_slice(2, 2, &[0.0, m, m, 0.0]))
            .duration(t)
            .build()?;
        y.integrate(&epoch)?;
        options.name(y)
    }
}
