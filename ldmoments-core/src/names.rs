use crate::Moment;

/// The LD statistics for `num_pops` populations, in vector order.
///
/// All `DD` come first, then `Dz`, then `pi2`.
///
/// # Examples
///
/// ```
/// let names = ldmoments_core::ld_names(1);
/// let names = names.iter().map(|m| m.to_string()).collect::<Vec<_>>();
/// assert_eq!(names, ["DD_0_0", "Dz_0_0_0", "pi2_0_0_0_0"]);
/// ```
pub fn ld_names(num_pops: usize) -> Vec<Moment> {
    let mut rv = Vec::with_capacity(num_ld_moments(num_pops));
    for i in 0..num_pops {
        for j in i..num_pops {
            rv.push(Moment::DD(i, j));
        }
    }
    for i in 0..num_pops {
        for j in 0..num_pops {
            for k in j..num_pops {
                rv.push(Moment::Dz(i, j, k));
            }
        }
    }
    for i in 0..num_pops {
        for j in i..num_pops {
            for k in i..num_pops {
                for l in k..num_pops {
                    if k == i && l < j {
                        continue;
                    }
                    rv.push(Moment::Pi2(i, j, k, l));
                }
            }
        }
    }
    rv
}

/// The heterozygosity statistics for `num_pops` populations.
pub fn het_names(num_pops: usize) -> Vec<Moment> {
    let mut rv = Vec::with_capacity(num_het_moments(num_pops));
    for i in 0..num_pops {
        for j in i..num_pops {
            rv.push(Moment::H(i, j));
        }
    }
    rv
}

/// Length of [`het_names`].
pub fn num_het_moments(num_pops: usize) -> usize {
    num_pops * (num_pops + 1) / 2
}

/// Length of [`ld_names`].
pub fn num_ld_moments(num_pops: usize) -> usize {
    let pairs = num_het_moments(num_pops);
    pairs + num_pops * pairs + pairs * (pairs + 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(ld_names(1).len(), 3);
        assert_eq!(ld_names(2).len(), 15);
        assert_eq!(ld_names(3).len(), 45);
        for n in 0..6 {
            assert_eq!(ld_names(n).len(), num_ld_moments(n));
            assert_eq!(het_names(n).len(), num_het_moments(n));
        }
    }

    #[test]
    fn test_two_population_order() {
        let names = ld_names(2)
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "DD_0_0",
                "DD_0_1",
                "DD_1_1",
                "Dz_0_0_0",
                "Dz_0_0_1",
                "Dz_0_1_1",
                "Dz_1_0_0",
                "Dz_1_0_1",
                "Dz_1_1_1",
                "pi2_0_0_0_0",
                "pi2_0_0_0_1",
                "pi2_0_0_1_1",
                "pi2_0_1_0_1",
                "pi2_0_1_1_1",
                "pi2_1_1_1_1",
            ]
        );
    }

    #[test]
    fn test_names_are_canonical() {
        for n in 1..5 {
            for m in ld_names(n).into_iter().chain(het_names(n)) {
                assert_eq!(m, m.canonical());
            }
        }
    }
}
