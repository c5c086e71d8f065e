use approx::assert_relative_eq;
use ldmoments::demographics::{one_pop, two_pop, ModelOptions};
use ldmoments::prelude::*;

fn options(theta: f64, rho: &[f64], ids: &[&str]) -> ModelOptions {
    ModelOptions {
        theta,
        rho: rho.to_vec(),
        pop_ids: if ids.is_empty() {
            None
        } else {
            Some(ids.iter().map(|s| s.to_string()).collect())
        },
    }
}

fn split_mig_ab() -> LdStats {
    two_pop::split_mig(1.0, 2.0, 0.1, 2.0, &options(0.001, &[1.0], &["A", "B"])).unwrap()
}

fn assert_stats_close(a: &LdStats, b: &LdStats) {
    assert_eq!(a.num_pops(), b.num_pops());
    assert_eq!(a.num_channels(), b.num_channels());
    for (x, y) in a.ld().iter().zip(b.ld().iter()) {
        for (u, v) in x.iter().zip(y.iter()) {
            assert_relative_eq!(*u, *v, epsilon = 1e-25, max_relative = 1e-10);
        }
    }
    for (u, v) in a.h().iter().zip(b.h().iter()) {
        assert_relative_eq!(*u, *v, max_relative = 1e-10);
    }
}

#[test]
fn test_split_one_population() {
    let y = one_pop::snm(&options(0.001, &[0.0, 10.0], &["A"])).unwrap();
    let y2 = y.split(0, Some(["B", "C"])).unwrap();
    assert_eq!(y2.pop_ids().unwrap(), &["B", "C"]);
    let (names, _) = y2.names();
    for (c, channel) in y2.ld().iter().enumerate() {
        for (m, x) in names.iter().zip(channel.iter()) {
            let expected = match m {
                Moment::DD(..) => y.ld()[c][0],
                Moment::Dz(..) => y.ld()[c][1],
                _ => y.ld()[c][2],
            };
            assert_eq!(*x, expected);
        }
    }
    assert_eq!(
        y2.get(Moment::DD(0, 0)).unwrap(),
        y.get(Moment::DD(0, 0)).unwrap()
    );
}

#[test]
fn test_split_two_populations() {
    let y = split_mig_ab();
    let ys = y.split(1, Some(["C", "D"])).unwrap();
    assert_eq!(ys.pop_ids().unwrap(), &["A", "C", "D"]);
    assert_eq!(
        ys.get("DD_1_2".parse().unwrap()).unwrap(),
        y.get("DD_1_1".parse().unwrap()).unwrap()
    );
    assert_eq!(
        ys.get("pi2_0_1_0_2".parse().unwrap()).unwrap(),
        y.get("pi2_0_1_0_1".parse().unwrap()).unwrap()
    );
}

#[test]
fn test_swap_pops() {
    let rho = [0.0, 1.0, 2.0];
    let mut y = one_pop::snm(&options(0.01, &rho, &[]))
        .unwrap()
        .split(0, None)
        .unwrap()
        .split(1, None)
        .unwrap();
    let epoch = EpochBuilder::default()
        .constant_sizes(&[1.0, 2.0, 3.0])
        .duration(0.01)
        .theta(0.01)
        .rho(&rho)
        .build()
        .unwrap();
    y.integrate(&epoch).unwrap();
    let back = y.swap_pops(0, 1).unwrap().swap_pops(0, 1).unwrap();
    assert_eq!(back.ld(), y.ld());
    assert_eq!(back.h(), y.h());

    let y = y.with_pop_ids(&["A", "B", "C"]).unwrap();
    assert_eq!(y.swap_pops(1, 2).unwrap().pop_ids().unwrap(), &["A", "C", "B"]);
}

#[test]
fn test_marginalize() {
    let y = one_pop::snm(&ModelOptions::default()).unwrap();
    assert!(y.marginalize(&[0]).is_err());
    let y = y.split(0, None).unwrap().split(0, None).unwrap();
    assert!(y.marginalize(&[0, 1, 2]).is_err());
    assert!(y.marginalize(&[3]).is_err());
    assert_eq!(y.marginalize(&[0, 2]).unwrap().num_pops(), 1);

    let y = y
        .split(0, None)
        .unwrap()
        .split(0, None)
        .unwrap()
        .with_pop_ids(&["a", "b", "c", "d", "e"])
        .unwrap();
    assert_eq!(
        y.marginalize(&[0, 2]).unwrap().pop_ids().unwrap(),
        &["b", "d", "e"]
    );
}

#[test]
fn test_merge() {
    let y = split_mig_ab();
    assert!(y.merge(0, 1, 1.5, None).is_err());
    assert!(y.merge(0, 0, 0.5, None).is_err());
    assert!(y.merge(0, 2, 0.5, None).is_err());
    let y1 = y.merge(0, 1, 0.5, None).unwrap();
    assert_eq!(y1.num_pops(), 1);
    assert_eq!(y1.pop_ids().unwrap(), &["Merged"]);
    let y2 = y.merge(0, 1, 0.1, Some("XX")).unwrap();
    assert_eq!(y2.pop_ids().unwrap(), &["XX"]);
}

#[test]
fn test_admix() {
    let y = split_mig_ab();
    assert!(y.admix(0, 1, 1.5, None).is_err());
    assert!(y.admix(0, 0, 0.5, None).is_err());
    assert!(y.admix(0, 2, 0.5, None).is_err());
    let y1 = y.admix(0, 1, 0.5, None).unwrap();
    assert_eq!(y1.num_pops(), 3);
    assert_eq!(y1.pop_ids().unwrap(), &["A", "B", "Adm"]);

    let y2 = y.admix(0, 1, 0.1, Some("XX")).unwrap();
    assert_eq!(y2.pop_ids().unwrap()[2], "XX");
    let y3 = y.merge(0, 1, 0.1, Some("XX")).unwrap();
    let y2 = y2.marginalize(&[0, 1]).unwrap();
    assert_stats_close(&y2, &y3);
    assert_eq!(y2.pop_ids(), y3.pop_ids());
}

#[test]
fn test_pulse_migrate() {
    let y = split_mig_ab();
    assert!(y.pulse_migrate(0, 1, 1.5).is_err());
    assert!(y.pulse_migrate(0, 0, 0.5).is_err());
    assert!(y.pulse_migrate(0, 2, 0.5).is_err());
    let y1 = y.pulse_migrate(0, 1, 0.1).unwrap();
    assert_eq!(y1.num_pops(), 2);
    assert_eq!(y1.pop_ids().unwrap(), &["A", "B"]);
    let y2 = y.merge(0, 1, 0.1, None).unwrap();
    let y1 = y1.marginalize(&[0]).unwrap();
    assert_stats_close(&y1, &y2);
}

#[test]
fn test_one_population_models() {
    let y = one_pop::snm(&ModelOptions::default()).unwrap();
    assert_eq!(y.num_channels(), 0);
    assert_eq!(y.h()[0], 0.001);

    let y0 = one_pop::snm(&options(0.001, &[0.0], &[])).unwrap();
    let y1 = one_pop::snm(&options(0.001, &[1.0], &[])).unwrap();
    let y01 = one_pop::snm(&options(0.001, &[0.0, 1.0], &[])).unwrap();
    assert_eq!(y0.ld()[0], y01.ld()[0]);
    assert_eq!(y1.ld()[0], y01.ld()[1]);

    let opts = options(0.001, &[1.0], &["XX"]);
    let snm = one_pop::snm(&opts).unwrap();
    assert_stats_close(&one_pop::two_epoch(1.0, 0.1, &opts).unwrap(), &snm);
    assert_stats_close(&one_pop::three_epoch(1.0, 1.0, 0.1, 0.1, &opts).unwrap(), &snm);
    assert_stats_close(&one_pop::growth(1.0, 0.1, &opts).unwrap(), &snm);
    assert_eq!(one_pop::two_epoch(2.0, 0.3, &opts).unwrap().pop_ids().unwrap(), &["XX"]);
}

#[test]
fn test_size_changes_move_diversity() {
    let opts = options(0.001, &[1.0], &[]);
    let bottleneck = one_pop::two_epoch(0.1, 0.1, &opts).unwrap();
    assert!(bottleneck.h()[0] < 0.001);
    let expansion = one_pop::growth(10.0, 0.1, &opts).unwrap();
    assert!(expansion.h()[0] > 0.001);
    // Bottlenecks raise LD relative to diversity.
    let snm = one_pop::snm(&opts).unwrap();
    assert!(bottleneck.sigma_d2(0).unwrap()[0] > snm.sigma_d2(0).unwrap()[0]);
}

#[test]
fn test_sigma_d2_at_equilibrium() {
    let rho = [0.0, 1.0, 10.0];
    let y = LdStats::steady_state(0.001, &rho).unwrap();
    for (s, r) in y.sigma_d2(0).unwrap().iter().zip(rho.iter()) {
        assert_relative_eq!(*s, (10.0 + r) / (22.0 + 13.0 * r + r * r), max_relative = 1e-10);
    }
    assert!(y.sigma_d2(1).is_err());
}

#[test]
fn test_two_population_snm() {
    let y = two_pop::snm(&options(0.002, &[2.0], &["A", "B"])).unwrap();
    assert!(y.h().iter().all(|x| *x == 0.002));
    assert_eq!(y.pop_ids().unwrap(), &["A", "B"]);
    let dd = y.get(Moment::DD(0, 1)).unwrap();
    assert_eq!(dd, y.get(Moment::DD(0, 0)).unwrap());
}

#[test]
fn test_integrate_leaves_state_on_error() {
    let mut y = one_pop::snm(&options(0.001, &[1.0], &[])).unwrap();
    let before = y.clone();
    let epoch = EpochBuilder::default()
        .constant_sizes(&[1.0, 1.0])
        .duration(0.1)
        .rho(&[1.0])
        .build()
        .unwrap();
    assert!(y.integrate(&epoch).is_err());
    assert_eq!(y.ld(), before.ld());
    assert_eq!(y.h(), before.h());
}

proptest::proptest! {
    #[test]
    fn test_merge_is_symmetric_in_fraction(f in 0.0..1.0f64) {
        let y = split_mig_ab();
        let a = y.merge(0, 1, f, None).unwrap();
        let b = y.merge(1, 0, 1.0 - f, None).unwrap();
        assert_stats_close(&a, &b);
    }
}
