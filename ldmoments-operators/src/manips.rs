use ldmoments_core::{moment_index, Moment};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::assembly::Assembler;
use crate::{check_len, check_population, OperatorError};

type Sources = Vec<(usize, f64)>;

/// Describes a new set of populations as mixtures of
/// an old set.
///
/// Output population `i` is composed of the input
/// populations listed in `sources[i]`, with weights
/// summing to one. Splits, swaps, marginalization,
/// admixture and merges are all population maps; the
/// induced maps on statistics are linear.
///
/// Writing `a = 1 - 2p` and `b = 1 - 2q`, the allele
/// frequencies of a mixture are the mixtures of the
/// frequencies, while
///
/// `D = sum_s c_s D_s + 1/8 sum_s sum_t c_s c_t (a_s - a_t)(b_s - b_t)`.
///
/// # Examples
///
/// ```
/// use ldmoments_operators::PopulationMap;
/// use nalgebra::DVector;
///
/// let split = PopulationMap::split(1, 0).unwrap();
/// let h = split.apply_h(&DVector::from_vec(vec![0.001])).unwrap();
/// assert_eq!(h.as_slice(), &[0.001, 0.001, 0.001]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationMap {
    input_pops: usize,
    sources: Vec<Sources>,
}

impl PopulationMap {
    /// Create a map from `input_pops` populations.
    ///
    /// # Errors
    ///
    /// * Any source index is out of range.
    /// * Any weight is negative or not finite.
    /// * The weights of an output population do not sum to one.
    pub fn new(input_pops: usize, sources: Vec<Sources>) -> Result<Self, OperatorError> {
        for s in sources.iter() {
            for (pop, weight) in s.iter() {
                check_population(*pop, input_pops)?;
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(OperatorError::InvalidArgument(format!(
                        "mixture weights must be non-negative, got {}",
                        weight
                    )));
                }
            }
            let total: f64 = s.iter().map(|(_, w)| w).sum();
            if (total - 1.0).abs() > 1e-12 {
                return Err(OperatorError::InvalidArgument(format!(
                    "mixture weights must sum to 1, got {}",
                    total
                )));
            }
        }
        Ok(Self {
            input_pops,
            sources,
        })
    }

    fn identity(num_pops: usize) -> Vec<Sources> {
        (0..num_pops).map(|i| vec![(i, 1.0)]).collect()
    }

    fn check_fraction(f: f64) -> Result<(), OperatorError> {
        if f.is_finite() && (0.0..=1.0).contains(&f) {
            Ok(())
        } else {
            Err(OperatorError::InvalidArgument(format!(
                "admixture fraction must be between 0 and 1, got {}",
                f
            )))
        }
    }

    fn check_distinct(a: usize, b: usize) -> Result<(), OperatorError> {
        if a == b {
            Err(OperatorError::InvalidArgument(format!(
                "populations must differ, got {} twice",
                a
            )))
        } else {
            Ok(())
        }
    }

    /// Append a copy of `pop` as the last population.
    pub fn split(num_pops: usize, pop: usize) -> Result<Self, OperatorError> {
        check_population(pop, num_pops)?;
        let mut sources = Self::identity(num_pops);
        sources.push(vec![(pop, 1.0)]);
        Self::new(num_pops, sources)
    }

    /// Exchange populations `i` and `j`.
    pub fn swap(num_pops: usize, i: usize, j: usize) -> Result<Self, OperatorError> {
        check_population(i, num_pops)?;
        check_population(j, num_pops)?;
        let mut sources = Self::identity(num_pops);
        sources.swap(i, j);
        Self::new(num_pops, sources)
    }

    /// Remove the populations in `remove`, keeping the
    /// order of the others.
    pub fn marginalize(num_pops: usize, remove: &[usize]) -> Result<Self, OperatorError> {
        for pop in remove {
            check_population(*pop, num_pops)?;
        }
        let sources = Self::identity(num_pops)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !remove.contains(i))
            .map(|(_, s)| s)
            .collect::<Vec<_>>();
        if sources.is_empty() {
            return Err(OperatorError::InvalidArgument(
                "cannot marginalize all populations".to_string(),
            ));
        }
        Self::new(num_pops, sources)
    }

    /// Append a population made of a fraction `f` of `a`
    /// and `1 - f` of `b`.
    pub fn admix(num_pops: usize, a: usize, b: usize, f: f64) -> Result<Self, OperatorError> {
        check_population(a, num_pops)?;
        check_population(b, num_pops)?;
        Self::check_distinct(a, b)?;
        Self::check_fraction(f)?;
        let mut sources = Self::identity(num_pops);
        sources.push(vec![(a, f), (b, 1.0 - f)]);
        Self::new(num_pops, sources)
    }

    /// Replace `a` and `b` by a single population made of
    /// a fraction `f` of `a` and `1 - f` of `b`, placed last.
    pub fn merge(num_pops: usize, a: usize, b: usize, f: f64) -> Result<Self, OperatorError> {
        let admix = Self::admix(num_pops, a, b, f)?;
        let sources = admix
            .sources
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != a && *i != b)
            .map(|(_, s)| s)
            .collect();
        Self::new(num_pops, sources)
    }

    /// Replace `to` by a mixture of a fraction `f` of
    /// `from` and `1 - f` of `to`.
    pub fn pulse(num_pops: usize, from: usize, to: usize, f: f64) -> Result<Self, OperatorError> {
        check_population(from, num_pops)?;
        check_population(to, num_pops)?;
        Self::check_distinct(from, to)?;
        Self::check_fraction(f)?;
        let mut sources = Self::identity(num_pops);
        sources[to] = vec![(from, f), (to, 1.0 - f)];
        Self::new(num_pops, sources)
    }

    pub fn input_pops(&self) -> usize {
        self.input_pops
    }

    pub fn output_pops(&self) -> usize {
        self.sources.len()
    }

    fn pairs(&self, pop: usize) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let s = &self.sources[pop];
        s.iter().flat_map(move |(x, cx)| {
            s.iter()
                .filter(move |(y, _)| y != x)
                .map(move |(y, cy)| (*x, *y, cx * cy))
        })
    }

    // Terms of E[D_s (a_u - a_v)(b_u - b_v)]
    fn dz_difference(s: usize, u: usize, v: usize) -> [(Moment, f64); 4] {
        [
            (Moment::Dz(s, u, u), 1.0),
            (Moment::Dz(s, u, v), -1.0),
            (Moment::Dz(s, v, u), -1.0),
            (Moment::Dz(s, v, v), 1.0),
        ]
    }

    // Terms of (h_su - h_sv - h_tu + h_tv) for one locus
    fn h_difference(s: usize, t: usize, u: usize, v: usize) -> [((usize, usize), f64); 4] {
        [((s, u), 1.0), ((s, v), -1.0), ((t, u), -1.0), ((t, v), 1.0)]
    }

    fn expand(&self, moment: Moment, out: &mut Vec<(Moment, f64)>) {
        let src = &self.sources;
        match moment {
            Moment::H(i, j) => {
                for (s, cs) in src[i].iter() {
                    for (t, ct) in src[j].iter() {
                        out.push((Moment::H(*s, *t), cs * ct));
                    }
                }
            }
            Moment::Pi2(i, j, k, l) => {
                for (s, cs) in src[i].iter() {
                    for (t, ct) in src[j].iter() {
                        for (u, cu) in src[k].iter() {
                            for (v, cv) in src[l].iter() {
                                out.push((Moment::Pi2(*s, *t, *u, *v), cs * ct * cu * cv));
                            }
                        }
                    }
                }
            }
            Moment::Dz(i, j, k) => {
                for (s, cs) in src[i].iter() {
                    for (t, ct) in src[j].iter() {
                        for (u, cu) in src[k].iter() {
                            out.push((Moment::Dz(*s, *t, *u), cs * ct * cu));
                        }
                    }
                }
                for (s, t, c) in self.pairs(i) {
                    for (x, cx) in src[j].iter() {
                        for (y, cy) in src[k].iter() {
                            let c = 2.0 * c * cx * cy;
                            out.push((Moment::Pi2(s, *x, s, *y), c));
                            out.push((Moment::Pi2(s, *x, t, *y), -c));
                            out.push((Moment::Pi2(t, *x, s, *y), -c));
                            out.push((Moment::Pi2(t, *x, t, *y), c));
                        }
                    }
                }
            }
            Moment::DD(i, j) => {
                for (s, cs) in src[i].iter() {
                    for (t, ct) in src[j].iter() {
                        out.push((Moment::DD(*s, *t), cs * ct));
                    }
                }
                for (x, y) in [(i, j), (j, i)] {
                    for (s, cs) in src[x].iter() {
                        for (u, v, c) in self.pairs(y) {
                            for (m, sign) in Self::dz_difference(*s, u, v) {
                                out.push((m, sign * cs * c / 8.0));
                            }
                        }
                    }
                }
                for (s, t, c1) in self.pairs(i) {
                    for (u, v, c2) in self.pairs(j) {
                        let c = c1 * c2 / 4.0;
                        for ((a0, a1), sa) in Self::h_difference(s, t, u, v) {
                            for ((b0, b1), sb) in Self::h_difference(s, t, u, v) {
                                out.push((Moment::Pi2(a0, a1, b0, b1), c * sa * sb));
                            }
                        }
                    }
                }
            }
        }
    }

    fn matrix(&self, ld: bool) -> Result<CsrMatrix<f64>, OperatorError> {
        let from = moment_index(self.input_pops);
        let to = moment_index(self.output_pops());
        let (names, ncols) = if ld {
            (to.ld_names(), from.ld_len())
        } else {
            (to.het_names(), from.het_len())
        };
        let mut a = Assembler::new(names.len(), ncols, &from);
        let mut terms = vec![];
        for (row, m) in names.iter().enumerate() {
            terms.clear();
            self.expand(*m, &mut terms);
            for (col, value) in terms.iter() {
                a.add(row, *col, *value)?;
            }
        }
        Ok(a.into_csr())
    }

    /// The matrix mapping input to output heterozygosities.
    pub fn h_matrix(&self) -> Result<CsrMatrix<f64>, OperatorError> {
        self.matrix(false)
    }

    /// The matrix mapping input to output LD statistics.
    pub fn ld_matrix(&self) -> Result<CsrMatrix<f64>, OperatorError> {
        self.matrix(true)
    }

    pub fn apply_h(&self, h: &DVector<f64>) -> Result<DVector<f64>, OperatorError> {
        check_len(ldmoments_core::num_het_moments(self.input_pops), h.len())?;
        Ok(&self.h_matrix()? * h)
    }

    /// Apply the map to each LD vector in `ys`.
    pub fn apply_ld(&self, ys: &[DVector<f64>]) -> Result<Vec<DVector<f64>>, OperatorError> {
        let expected = ldmoments_core::num_ld_moments(self.input_pops);
        for y in ys {
            check_len(expected, y.len())?;
        }
        let a = self.ld_matrix()?;
        Ok(ys.iter().map(|y| &a * y).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ld_copies_by_type() {
        let map = PopulationMap::split(1, 0).unwrap();
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let ys = map.apply_ld(&[y]).unwrap();
        let index = moment_index(2);
        for (m, x) in index.ld_names().iter().zip(ys[0].iter()) {
            let expected = match m {
                Moment::DD(..) => 1.0,
                Moment::Dz(..) => 2.0,
                _ => 3.0,
            };
            assert_eq!(*x, expected);
        }
    }

    #[test]
    fn test_split_het_twice() {
        let h = DVector::from_vec(vec![1.0]);
        let h = PopulationMap::split(1, 0).unwrap().apply_h(&h).unwrap();
        assert_eq!(h.len(), 3);
        let h = PopulationMap::split(2, 1).unwrap().apply_h(&h).unwrap();
        assert_eq!(h.len(), 6);
        assert!(h.iter().all(|x| *x == 1.0));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(PopulationMap::split(1, 1).is_err());
        assert!(PopulationMap::admix(2, 0, 1, 1.5).is_err());
        assert!(PopulationMap::admix(2, 0, 0, 0.5).is_err());
        assert!(PopulationMap::admix(2, 0, 2, 0.5).is_err());
        assert!(PopulationMap::merge(2, 0, 1, -0.1).is_err());
        assert!(PopulationMap::pulse(2, 1, 1, 0.1).is_err());
        assert!(PopulationMap::marginalize(1, &[0]).is_err());
        assert!(PopulationMap::marginalize(3, &[0, 1, 2]).is_err());
        assert!(PopulationMap::marginalize(3, &[3]).is_err());
        assert!(PopulationMap::new(2, vec![vec![(0, 0.5), (1, 0.4)]]).is_err());
    }

    #[test]
    fn test_admix_of_identical_populations_is_a_copy() {
        // Two copies of one population mix back into that population.
        let index = moment_index(1);
        let y = DVector::from_vec(vec![0.3, 0.2, 0.7]);
        let h = DVector::from_vec(vec![0.01]);
        let split = PopulationMap::split(1, 0).unwrap();
        let ys = split.apply_ld(&[y.clone()]).unwrap();
        let h2 = split.apply_h(&h).unwrap();
        let merge = PopulationMap::merge(2, 0, 1, 0.3).unwrap();
        let back = merge.apply_ld(&ys).unwrap();
        let hb = merge.apply_h(&h2).unwrap();
        assert_eq!(back[0].len(), index.ld_len());
        for (a, b) in back[0].iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-14);
        }
        assert!((hb[0] - h[0]).abs() < 1e-16);
    }

    #[test]
    fn test_merge_dimensions() {
        let merge = PopulationMap::merge(3, 0, 2, 0.5).unwrap();
        assert_eq!(merge.output_pops(), 2);
        assert_eq!(merge.ld_matrix().unwrap().nrows(), 15);
        assert_eq!(merge.ld_matrix().unwrap().ncols(), 45);
    }
}
