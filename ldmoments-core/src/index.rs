use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::{het_names, ld_names, Error, Moment};

/// Position lookup for the statistics of a fixed
/// number of populations.
#[derive(Debug)]
pub struct MomentIndex {
    num_pops: usize,
    ld: Vec<Moment>,
    het: Vec<Moment>,
    lookup: HashMap<Moment, usize>,
}

impl MomentIndex {
    pub fn new(num_pops: usize) -> Self {
        let ld = ld_names(num_pops);
        let het = het_names(num_pops);
        let lookup = ld
            .iter()
            .enumerate()
            .chain(het.iter().enumerate())
            .map(|(i, m)| (*m, i))
            .collect();
        Self {
            num_pops,
            ld,
            het,
            lookup,
        }
    }

    pub fn num_pops(&self) -> usize {
        self.num_pops
    }

    pub fn ld_names(&self) -> &[Moment] {
        &self.ld
    }

    pub fn het_names(&self) -> &[Moment] {
        &self.het
    }

    pub fn ld_len(&self) -> usize {
        self.ld.len()
    }

    pub fn het_len(&self) -> usize {
        self.het.len()
    }

    /// Position of `moment` in its vector.
    ///
    /// LD statistics index the LD vector and `H` the
    /// heterozygosity vector. Any index order is accepted.
    ///
    /// # Examples
    ///
    /// ```
    /// use ldmoments_core::{Moment, MomentIndex};
    ///
    /// let index = MomentIndex::new(2);
    /// assert_eq!(index.position(Moment::Dz(1, 1, 0)).unwrap(), 7);
    /// assert_eq!(index.position(Moment::H(1, 0)).unwrap(), 1);
    /// assert!(index.position(Moment::DD(0, 2)).is_err());
    /// ```
    pub fn position(&self, moment: Moment) -> Result<usize, Error> {
        self.lookup
            .get(&moment.canonical())
            .copied()
            .ok_or(Error::MomentOutOfRange {
                moment,
                num_pops: self.num_pops,
            })
    }
}

fn cache() -> &'static Mutex<HashMap<usize, Arc<MomentIndex>>> {
    static CACHE: OnceLock<Mutex<HashMap<usize, Arc<MomentIndex>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Shared [`MomentIndex`] for `num_pops` populations.
///
/// The enumeration depends only on `num_pops`, so each
/// index is built once per process.
pub fn moment_index(num_pops: usize) -> Arc<MomentIndex> {
    // The map holds no invariant that a panicking holder could break.
    let mut guard = cache().lock().unwrap_or_else(|e| e.into_inner());
    guard
        .entry(num_pops)
        .or_insert_with(|| Arc::new(MomentIndex::new(num_pops)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoized() {
        let a = moment_index(3);
        let b = moment_index(3);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.ld_len(), 45);
        assert_eq!(a.het_len(), 6);
    }

    #[test]
    fn test_positions_follow_names() {
        let index = MomentIndex::new(3);
        for (i, m) in index.ld_names().iter().enumerate() {
            assert_eq!(index.position(*m).unwrap(), i);
        }
        for (i, m) in index.het_names().iter().enumerate() {
            assert_eq!(index.position(*m).unwrap(), i);
        }
    }
}
