use std::sync::Arc;

use ldmoments_core::{moment_index, Moment, MomentIndex};
use ldmoments_numerics::{Epoch, IntegrationReport, SteadyState};
use ldmoments_operators::PopulationMap;
use nalgebra::DVector;

use crate::LdError;

/// Expected two-locus statistics of a set of populations.
///
/// Holds one LD vector per recombination rate and the
/// heterozygosity vector, ordered as in
/// [`ldmoments_core::ld_names`] and [`ldmoments_core::het_names`].
///
/// # Examples
///
/// ```
/// use ldmoments::prelude::*;
///
/// let y = LdStats::steady_state(0.001, &[0.0, 1.0]).unwrap();
/// let y = y.split(0, None).unwrap();
/// assert_eq!(y.num_pops(), 2);
/// assert_eq!(y.get(Moment::H(0, 1)).unwrap(), vec![0.001]);
/// ```
#[derive(Clone, Debug)]
pub struct LdStats {
    ld: Vec<DVector<f64>>,
    h: DVector<f64>,
    index: Arc<MomentIndex>,
    pop_ids: Option<Vec<String>>,
}

impl LdStats {
    /// Create from LD vectors and heterozygosities of
    /// `num_pops` populations.
    ///
    /// # Errors
    ///
    /// [`LdError::IndexError`] if a vector has the wrong length.
    pub fn new(ld: Vec<DVector<f64>>, h: DVector<f64>, num_pops: usize) -> Result<Self, LdError> {
        let index = moment_index(num_pops);
        let check = |expected: usize, found: usize| {
            if expected == found {
                Ok(())
            } else {
                Err(ldmoments_core::Error::DimensionMismatch { expected, found })
            }
        };
        check(index.het_len(), h.len())?;
        for y in ld.iter() {
            check(index.ld_len(), y.len())?;
        }
        Ok(Self {
            ld,
            h,
            index,
            pop_ids: None,
        })
    }

    /// One population at equilibrium.
    pub fn steady_state(theta: f64, rho: &[f64]) -> Result<Self, LdError> {
        Self::from_steady_state(ldmoments_numerics::steady_state(theta, rho, None)?)
    }

    /// Wrap the output of an equilibrium solver.
    pub fn from_steady_state(ss: SteadyState) -> Result<Self, LdError> {
        let num_pops = (1..)
            .find(|n| ldmoments_core::num_het_moments(*n) >= ss.h.len())
            .unwrap_or(1);
        Self::new(ss.ld, ss.h, num_pops)
    }

    /// Attach one id per population.
    pub fn with_pop_ids<S: AsRef<str>>(mut self, ids: &[S]) -> Result<Self, LdError> {
        if ids.len() != self.num_pops() {
            return Err(LdError::PopulationIds(format!(
                "{} id(s) for {} population(s)",
                ids.len(),
                self.num_pops()
            )));
        }
        self.pop_ids = Some(ids.iter().map(|s| s.as_ref().to_string()).collect());
        Ok(self)
    }

    /// Number of populations.
    pub fn num_pops(&self) -> usize {
        self.index.num_pops()
    }

    /// Population ids, if any.
    pub fn pop_ids(&self) -> Option<&[String]> {
        self.pop_ids.as_deref()
    }

    /// The LD vectors, one per recombination rate.
    pub fn ld(&self) -> &[DVector<f64>] {
        &self.ld
    }

    /// The heterozygosities.
    pub fn h(&self) -> &DVector<f64> {
        &self.h
    }

    /// Number of recombination rates.
    pub fn num_channels(&self) -> usize {
        self.ld.len()
    }

    /// The LD and heterozygosity statistic names.
    pub fn names(&self) -> (&[Moment], &[Moment]) {
        (self.index.ld_names(), self.index.het_names())
    }

    /// The value of `moment`: one per LD vector for LD
    /// statistics, a single value for heterozygosities.
    pub fn get(&self, moment: Moment) -> Result<Vec<f64>, LdError> {
        let i = self.index.position(moment)?;
        if moment.is_ld() {
            Ok(self.ld.iter().map(|y| y[i]).collect())
        } else {
            Ok(vec![self.h[i]])
        }
    }

    /// `DD / pi2` within population `pop`, per LD vector.
    pub fn sigma_d2(&self, pop: usize) -> Result<Vec<f64>, LdError> {
        let dd = self.get(Moment::DD(pop, pop))?;
        let pi2 = self.get(Moment::Pi2(pop, pop, pop, pop))?;
        Ok(dd.iter().zip(pi2.iter()).map(|(a, b)| a / b).collect())
    }

    /// Advance the statistics through `epoch`.
    ///
    /// On error the statistics are unchanged.
    pub fn integrate(&mut self, epoch: &Epoch) -> Result<IntegrationReport, LdError> {
        Ok(epoch.integrate(&mut self.ld, &mut self.h)?)
    }

    fn transform(&self, map: &PopulationMap, pop_ids: Option<Vec<String>>) -> Result<Self, LdError> {
        Ok(Self {
            ld: map.apply_ld(&self.ld)?,
            h: map.apply_h(&self.h)?,
            index: moment_index(map.output_pops()),
            pop_ids,
        })
    }

    fn check_pop(&self, pop: usize) -> Result<(), LdError> {
        if pop < self.num_pops() {
            Ok(())
        } else {
            Err(ldmoments_core::Error::PopulationIndex {
                index: pop,
                num_pops: self.num_pops(),
            }
            .into())
        }
    }

    fn ids_without(&self, remove: &[usize]) -> Option<Vec<String>> {
        self.pop_ids.as_ref().map(|ids| {
            ids.iter()
                .enumerate()
                .filter(|(i, _)| !remove.contains(i))
                .map(|(_, id)| id.clone())
                .collect()
        })
    }

    fn ids_with(&self, remove: &[usize], new_id: &str) -> Option<Vec<String>> {
        self.ids_without(remove).map(|mut ids| {
            ids.push(new_id.to_string());
            ids
        })
    }

    /// Split `pop` in two. The copy is appended last.
    ///
    /// With `new_ids = Some([a, b])`, `pop` is renamed `a`
    /// and the copy is named `b`. Without new ids, existing
    /// population ids are dropped.
    pub fn split(&self, pop: usize, new_ids: Option<[&str; 2]>) -> Result<Self, LdError> {
        self.check_pop(pop)?;
        let pop_ids = match (new_ids, self.pop_ids.as_ref()) {
            (Some([a, b]), Some(ids)) => {
                let mut ids = ids.clone();
                ids[pop] = a.to_string();
                ids.push(b.to_string());
                Some(ids)
            }
            (Some([a, b]), None) if self.num_pops() == 1 => {
                Some(vec![a.to_string(), b.to_string()])
            }
            (Some(_), None) => {
                return Err(LdError::PopulationIds(
                    "new ids given for populations without ids".to_string(),
                ))
            }
            (None, _) => None,
        };
        log::debug!("splitting population {} of {}", pop, self.num_pops());
        self.transform(&PopulationMap::split(self.num_pops(), pop)?, pop_ids)
    }

    /// Exchange populations `i` and `j`.
    pub fn swap_pops(&self, i: usize, j: usize) -> Result<Self, LdError> {
        let pop_ids = self.pop_ids.clone().map(|mut ids| {
            if i < ids.len() && j < ids.len() {
                ids.swap(i, j);
            }
            ids
        });
        self.transform(&PopulationMap::swap(self.num_pops(), i, j)?, pop_ids)
    }

    /// Remove the populations in `remove`.
    ///
    /// # Errors
    ///
    /// Removing every population or an index out of range.
    pub fn marginalize(&self, remove: &[usize]) -> Result<Self, LdError> {
        let map = PopulationMap::marginalize(self.num_pops(), remove)?;
        self.transform(&map, self.ids_without(remove))
    }

    /// Append a population made of a fraction `f` of `a`
    /// and `1 - f` of `b`. Its id is `new_id`, or `"Adm"`.
    pub fn admix(&self, a: usize, b: usize, f: f64, new_id: Option<&str>) -> Result<Self, LdError> {
        let map = PopulationMap::admix(self.num_pops(), a, b, f)?;
        log::debug!("admixing populations {} and {} with f = {}", a, b, f);
        self.transform(&map, self.ids_with(&[], new_id.unwrap_or("Adm")))
    }

    /// Replace `a` and `b` by their admixture, placed
    /// last. Its id is `new_id`, or `"Merged"`.
    pub fn merge(&self, a: usize, b: usize, f: f64, new_id: Option<&str>) -> Result<Self, LdError> {
        let map = PopulationMap::merge(self.num_pops(), a, b, f)?;
        log::debug!("merging populations {} and {} with f = {}", a, b, f);
        self.transform(&map, self.ids_with(&[a, b], new_id.unwrap_or("Merged")))
    }

    /// Replace a fraction `f` of `to` by migrants from `from`.
    pub fn pulse_migrate(&self, from: usize, to: usize, f: f64) -> Result<Self, LdError> {
        let map = PopulationMap::pulse(self.num_pops(), from, to, f)?;
        self.transform(&map, self.pop_ids.clone())
    }
}
