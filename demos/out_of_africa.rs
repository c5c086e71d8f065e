use clap::Parser;
use ldmoments::prelude::*;
use nalgebra::DMatrix;

#[derive(Parser)]
#[command(about = "Two-locus statistics under a three-population out-of-Africa model")]
struct Args {
    /// Reference effective population size
    #[arg(long, default_value_t = 7310.0)]
    n0: f64,
    /// Per-base mutation rate per generation
    #[arg(long, default_value_t = 2.36e-8)]
    mutation_rate: f64,
    /// Scaled recombination rates, 4Nr
    #[arg(long, value_delimiter = ',', default_value = "0.0")]
    rho: Vec<f64>,
    /// Integration time step
    #[arg(long, default_value_t = 0.001)]
    time_step: f64,
}

struct Parameters {
    t_af: f64,
    t_b: f64,
    t_f: f64,
    nu_af: f64,
    nu_b: f64,
    nu_eu0: f64,
    nu_as0: f64,
    nu_euf: f64,
    nu_asf: f64,
    m_af_b: f64,
    m_af_eu: f64,
    m_af_as: f64,
    m_eu_as: f64,
}

// Gutenkunst et al. (2009)
const OOA: Parameters = Parameters {
    t_af: 0.265,
    t_b: 0.342 - 0.265,
    t_f: 0.405 - 0.342,
    nu_af: 1.98,
    nu_b: 0.255,
    nu_eu0: 0.141,
    nu_as0: 0.0752,
    nu_euf: 4.65,
    nu_asf: 6.22,
    m_af_b: 1.1,
    m_af_eu: 0.183,
    m_af_as: 0.57,
    m_eu_as: 0.227,
};

fn out_of_africa(p: &Parameters, theta: f64, rho: &[f64], dt: f64) -> Result<LdStats, LdError> {
    let epoch = || EpochBuilder::default().theta(theta).rho(rho).time_step(dt);

    let mut y = LdStats::steady_state(theta, rho)?;
    y.integrate(&epoch().constant_sizes(&[p.nu_af]).duration(p.t_af).build()?)?;

    let mut y = y.split(0, Some(["YRI", "B"]))?;
    y.integrate(
        &epoch()
            .constant_sizes(&[p.nu_af, p.nu_b])
            .migration(DMatrix::from_row_slice(
                2,
                2,
                &[0.0, p.m_af_b, p.m_af_b, 0.0],
            ))
            .duration(p.t_b)
            .build()?,
    )?;

    let mut y = y.split(1, Some(["CEU", "CHB"]))?;
    let (nu_af, nu_eu0, nu_as0) = (p.nu_af, p.nu_eu0, p.nu_as0);
    let r_eu = (p.nu_euf / p.nu_eu0).ln() / p.t_f;
    let r_as = (p.nu_asf / p.nu_as0).ln() / p.t_f;
    y.integrate(
        &epoch()
            .varying_sizes(move |t| {
                vec![nu_af, nu_eu0 * (r_eu * t).exp(), nu_as0 * (r_as * t).exp()]
            })
            .migration(DMatrix::from_row_slice(
                3,
                3,
                &[
                    0.0, p.m_af_eu, p.m_af_as, //
                    p.m_af_eu, 0.0, p.m_eu_as, //
                    p.m_af_as, p.m_eu_as, 0.0,
                ],
            ))
            .duration(p.t_f)
            .build()?,
    )?;
    Ok(y)
}

fn main() -> Result<(), LdError> {
    let args = Args::parse();
    let theta = 4.0 * args.n0 * args.mutation_rate;

    let y = out_of_africa(&OOA, theta, &args.rho, args.time_step)?;

    let ids = y.pop_ids().map(|ids| ids.to_vec()).unwrap_or_default();
    let h = |i: usize, j: usize| -> Result<f64, LdError> { Ok(y.get(Moment::H(i, j))?[0]) };

    println!("theta = {}", theta);
    for i in 0..y.num_pops() {
        println!("H[{}] = {:e}", ids[i], h(i, i)?);
    }
    for i in 0..y.num_pops() {
        for j in (i + 1)..y.num_pops() {
            println!(
                "H[{}, {}] / sqrt(H[{}] H[{}]) = {:.6}",
                ids[i],
                ids[j],
                ids[i],
                ids[j],
                h(i, j)? / (h(i, i)? * h(j, j)?).sqrt()
            );
        }
    }
    for i in 0..y.num_pops() {
        let sd2 = y.sigma_d2(i)?;
        for (r, s) in args.rho.iter().zip(sd2.iter()) {
            println!("sigma_d^2[{}] (rho = {}) = {:.6}", ids[i], r, s);
        }
    }
    Ok(())
}
