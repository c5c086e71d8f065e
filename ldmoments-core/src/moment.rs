use std::fmt;
use std::str::FromStr;

/// A named two-locus statistic.
///
/// Indexes refer to populations:
///
/// * `DD(i, j)`: `E[D_i D_j]`
/// * `Dz(i, j, k)`: `E[D_i (1 - 2p_j)(1 - 2q_k)]`
/// * `Pi2(i, j, k, l)`: the product of the locus-A heterozygosity
///   between `i` and `j` and the locus-B heterozygosity between `k` and `l`
/// * `H(i, j)`: single-locus heterozygosity between `i` and `j`
///
/// Several index orders describe the same statistic.
/// [`Moment::canonical`] picks the one used by the
/// name lists.
///
/// # Examples
///
/// ```
/// use ldmoments_core::Moment;
///
/// let m: Moment = "pi2_1_1_0_1".parse().unwrap();
/// assert_eq!(m, Moment::Pi2(0, 1, 1, 1));
/// assert_eq!(m.to_string(), "pi2_0_1_1_1");
/// ```
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
pub enum Moment {
    DD(usize, usize),
    Dz(usize, usize, usize),
    Pi2(usize, usize, usize, usize),
    H(usize, usize),
}

#[inline]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Moment {
    /// Return the canonical index order of this statistic.
    pub fn canonical(self) -> Self {
        match self {
            Moment::DD(i, j) => {
                let (i, j) = ordered(i, j);
                Moment::DD(i, j)
            }
            Moment::Dz(i, j, k) => {
                let (j, k) = ordered(j, k);
                Moment::Dz(i, j, k)
            }
            Moment::Pi2(i, j, k, l) => {
                let first = ordered(i, j);
                let second = ordered(k, l);
                let (first, second) = if first <= second {
                    (first, second)
                } else {
                    (second, first)
                };
                Moment::Pi2(first.0, first.1, second.0, second.1)
            }
            Moment::H(i, j) => {
                let (i, j) = ordered(i, j);
                Moment::H(i, j)
            }
        }
    }

    /// `true` for `DD`, `Dz` and `pi2`.
    pub fn is_ld(&self) -> bool {
        !matches!(self, Moment::H(..))
    }

    /// The population indexes, in slot order.
    pub fn populations(&self) -> Vec<usize> {
        match *self {
            Moment::DD(i, j) | Moment::H(i, j) => vec![i, j],
            Moment::Dz(i, j, k) => vec![i, j, k],
            Moment::Pi2(i, j, k, l) => vec![i, j, k, l],
        }
    }

    /// The largest population index referenced.
    pub fn max_population(&self) -> usize {
        self.populations().into_iter().max().unwrap_or(0)
    }

    fn prefix(&self) -> &'static str {
        match self {
            Moment::DD(..) => "DD",
            Moment::Dz(..) => "Dz",
            Moment::Pi2(..) => "pi2",
            Moment::H(..) => "H",
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())?;
        for p in self.populations() {
            write!(f, "_{}", p)?;
        }
        Ok(())
    }
}

impl FromStr for Moment {
    type Err = crate::Error;

    /// Parse a name such as `Dz_1_0_0`. The result is canonical.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || crate::Error::UnknownMoment(s.to_string());
        let mut fields = s.split('_');
        let prefix = fields.next().ok_or_else(unknown)?;
        let pops = fields
            .map(|x| x.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| unknown())?;
        let moment = match (prefix, pops.as_slice()) {
            ("DD", &[i, j]) => Moment::DD(i, j),
            ("Dz", &[i, j, k]) => Moment::Dz(i, j, k),
            ("pi2", &[i, j, k, l]) => Moment::Pi2(i, j, k, l),
            ("H", &[i, j]) => Moment::H(i, j),
            _ => return Err(unknown()),
        };
        Ok(moment.canonical())
    }
}
