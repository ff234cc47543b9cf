// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The ADM1 anaerobic digester.
//!
//! The hydrogen-ion concentration, the six dissociated ions and the
//! dissolved hydrogen are algebraic states: they are recomputed from the
//! other states at every derivative evaluation with Newton-Raphson solves,
//! warm-started from the previous solution.

use std::cell::Cell;

use ode_solvers::System;

use super::interface::{adm_to_asm, asm_to_adm, AdmStream, InterfaceParams};
use crate::integration::{self, IntegratorOptions, State};
use crate::newton::{self, NewtonOutcome};
use crate::process_unit::{ProcessUnit, Solver, StepOutput, StepWarning, UnitControl};
use crate::stream::{ensure_inputs, ensure_timestep};
use crate::{Error, Stream, UnitCategory};

/// The number of digester states.
pub const ADM1_STATES: usize = 42;

/// The number of values in [`DigesterOutput::to_array`].
pub const DIGESTER_OUTPUT_LEN: usize = 51;

/// Names the digester states, in storage order.
///
/// Organic components are in kg COD/m³; inorganic carbon, inorganic
/// nitrogen, cations, anions and ions in kmol/m³.  The gas states are the
/// headspace concentrations of hydrogen and methane in kg COD/m³ and of
/// carbon dioxide in kmol/m³.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Adm1 {
    Ssu = 0,
    Saa,
    Sfa,
    Sva,
    Sbu,
    Spro,
    Sac,
    Sh2,
    Sch4,
    Sic,
    Sin,
    Si,
    Xc,
    Xch,
    Xpr,
    Xli,
    Xsu,
    Xaa,
    Xfa,
    Xc4,
    Xpro,
    Xac,
    Xh2,
    Xi,
    Scat,
    San,
    SvaIon,
    SbuIon,
    SproIon,
    SacIon,
    Shco3,
    Snh3,
    GasH2,
    GasCh4,
    GasCo2,
    Q,
    Temp,
    Sd1,
    Sd2,
    Sd3,
    Xd4,
    Xd5,
}

impl Adm1 {
    /// The seven biomass populations.
    pub const BIOMASS: [Adm1; 7] = [
        Adm1::Xsu,
        Adm1::Xaa,
        Adm1::Xfa,
        Adm1::Xc4,
        Adm1::Xpro,
        Adm1::Xac,
        Adm1::Xh2,
    ];

    pub const DUMMIES: [Adm1; 5] = [Adm1::Sd1, Adm1::Sd2, Adm1::Sd3, Adm1::Xd4, Adm1::Xd5];

    /// The number of liquid components carried by streams.
    pub const LIQUID: usize = 26;
}

/// Kinetic, stoichiometric and physico-chemical digester parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Adm1Params {
    // Composite disintegration products.
    pub f_si_xc: f64,
    pub f_xi_xc: f64,
    pub f_ch_xc: f64,
    pub f_pr_xc: f64,
    pub f_li_xc: f64,
    // Nitrogen contents, kmol N/kg COD.
    pub n_xc: f64,
    pub n_i: f64,
    pub n_aa: f64,
    pub n_bac: f64,
    // Carbon contents, kmol C/kg COD.
    pub c_xc: f64,
    pub c_si: f64,
    pub c_ch: f64,
    pub c_pr: f64,
    pub c_li: f64,
    pub c_xi: f64,
    pub c_su: f64,
    pub c_aa: f64,
    pub c_fa: f64,
    pub c_va: f64,
    pub c_bu: f64,
    pub c_pro: f64,
    pub c_ac: f64,
    pub c_bac: f64,
    pub c_ch4: f64,
    // Product fractions.
    pub f_fa_li: f64,
    pub f_h2_su: f64,
    pub f_bu_su: f64,
    pub f_pro_su: f64,
    pub f_ac_su: f64,
    pub f_h2_aa: f64,
    pub f_va_aa: f64,
    pub f_bu_aa: f64,
    pub f_pro_aa: f64,
    pub f_ac_aa: f64,
    // Yields.
    pub y_su: f64,
    pub y_aa: f64,
    pub y_fa: f64,
    pub y_c4: f64,
    pub y_pro: f64,
    pub y_ac: f64,
    pub y_h2: f64,
    // First order rates, 1/d.
    pub k_dis: f64,
    pub k_hyd_ch: f64,
    pub k_hyd_pr: f64,
    pub k_hyd_li: f64,
    // Uptake.
    pub k_m_su: f64,
    pub k_s_su: f64,
    pub k_m_aa: f64,
    pub k_s_aa: f64,
    pub k_m_fa: f64,
    pub k_s_fa: f64,
    pub k_m_c4: f64,
    pub k_s_c4: f64,
    pub k_m_pro: f64,
    pub k_s_pro: f64,
    pub k_m_ac: f64,
    pub k_s_ac: f64,
    pub k_m_h2: f64,
    pub k_s_h2: f64,
    // Inhibition.
    pub k_s_in: f64,
    pub k_ih2_fa: f64,
    pub k_ih2_c4: f64,
    pub k_ih2_pro: f64,
    pub k_i_nh3: f64,
    pub ph_ul_aa: f64,
    pub ph_ll_aa: f64,
    pub ph_ul_ac: f64,
    pub ph_ll_ac: f64,
    pub ph_ul_h2: f64,
    pub ph_ll_h2: f64,
    /// Decay rates of the populations in [`Adm1::BIOMASS`], 1/d.
    pub k_dec: [f64; 7],
    /// Gas constant, bar m³/(kmol K).
    pub r: f64,
    /// Reference temperature of the equilibrium constants, K.
    pub t_base: f64,
    pub pk_w_base: f64,
    pub pk_a_va_base: f64,
    pub pk_a_bu_base: f64,
    pub pk_a_pro_base: f64,
    pub pk_a_ac_base: f64,
    pub pk_a_co2_base: f64,
    pub pk_a_in_base: f64,
    /// Atmospheric pressure, bar.
    pub p_atm: f64,
    /// Gas-liquid transfer coefficient, 1/d.
    pub kla: f64,
    pub k_h_h2o_base: f64,
    pub k_h_co2_base: f64,
    pub k_h_ch4_base: f64,
    pub k_h_h2_base: f64,
    /// Headspace outlet friction coefficient, m³/(d bar).
    pub k_p: f64,
}

impl Default for Adm1Params {
    fn default() -> Self {
        Self {
            f_si_xc: 0.1,
            f_xi_xc: 0.2,
            f_ch_xc: 0.2,
            f_pr_xc: 0.2,
            f_li_xc: 0.3,
            n_xc: 0.0376 / 14.0,
            n_i: 0.06 / 14.0,
            n_aa: 0.007,
            n_bac: 0.08 / 14.0,
            c_xc: 0.02786,
            c_si: 0.03,
            c_ch: 0.0313,
            c_pr: 0.03,
            c_li: 0.022,
            c_xi: 0.03,
            c_su: 0.0313,
            c_aa: 0.03,
            c_fa: 0.0217,
            c_va: 0.024,
            c_bu: 0.025,
            c_pro: 0.0268,
            c_ac: 0.0313,
            c_bac: 0.0313,
            c_ch4: 0.0156,
            f_fa_li: 0.95,
            f_h2_su: 0.19,
            f_bu_su: 0.13,
            f_pro_su: 0.27,
            f_ac_su: 0.41,
            f_h2_aa: 0.06,
            f_va_aa: 0.23,
            f_bu_aa: 0.26,
            f_pro_aa: 0.05,
            f_ac_aa: 0.40,
            y_su: 0.1,
            y_aa: 0.08,
            y_fa: 0.06,
            y_c4: 0.06,
            y_pro: 0.04,
            y_ac: 0.05,
            y_h2: 0.06,
            k_dis: 0.5,
            k_hyd_ch: 10.0,
            k_hyd_pr: 10.0,
            k_hyd_li: 10.0,
            k_m_su: 30.0,
            k_s_su: 0.5,
            k_m_aa: 50.0,
            k_s_aa: 0.3,
            k_m_fa: 6.0,
            k_s_fa: 0.4,
            k_m_c4: 20.0,
            k_s_c4: 0.2,
            k_m_pro: 13.0,
            k_s_pro: 0.1,
            k_m_ac: 8.0,
            k_s_ac: 0.15,
            k_m_h2: 35.0,
            k_s_h2: 7.0e-6,
            k_s_in: 1.0e-4,
            k_ih2_fa: 5.0e-6,
            k_ih2_c4: 1.0e-5,
            k_ih2_pro: 3.5e-6,
            k_i_nh3: 0.0018,
            ph_ul_aa: 5.5,
            ph_ll_aa: 4.0,
            ph_ul_ac: 7.0,
            ph_ll_ac: 6.0,
            ph_ul_h2: 6.0,
            ph_ll_h2: 5.0,
            k_dec: [0.02; 7],
            r: 0.083145,
            t_base: 298.15,
            pk_w_base: 14.0,
            pk_a_va_base: 4.86,
            pk_a_bu_base: 4.82,
            pk_a_pro_base: 4.88,
            pk_a_ac_base: 4.76,
            pk_a_co2_base: 6.35,
            pk_a_in_base: 9.25,
            p_atm: 1.013,
            kla: 200.0,
            k_h_h2o_base: 0.0313,
            k_h_co2_base: 0.035,
            k_h_ch4_base: 0.0014,
            k_h_h2_base: 7.8e-4,
            k_p: 5.0e4,
        }
    }
}

/// Configuration of an [`Adm1Digester`].
#[derive(Clone, Debug, PartialEq)]
pub struct DigesterConfig {
    /// Liquid volume, m³.
    pub liquid_volume: f64,
    /// Headspace volume, m³.
    pub gas_volume: f64,
    /// Operating temperature, K.
    pub operating_temperature: f64,
    pub initial_state: [f64; ADM1_STATES],
    /// Initial hydrogen-ion concentration, kmol/m³.
    pub initial_s_h: f64,
    /// pH assumed by the inflow interface before the first step.
    pub initial_ph: f64,
    pub params: Adm1Params,
    pub interface: InterfaceParams,
    pub integrator: IntegratorOptions,
}

impl Default for DigesterConfig {
    fn default() -> Self {
        Self {
            liquid_volume: 3400.0,
            gas_volume: 300.0,
            operating_temperature: 308.15,
            initial_state: [
                0.0124, 0.0055, 0.1074, 0.0123, 0.0140, 0.0176, 0.0893, 2.5055e-7, 0.0555,
                0.0951, 0.0945, 0.1309, 0.1079, 0.0205, 0.0842, 0.0436, 0.3122, 0.9317,
                0.3384, 0.3258, 0.1011, 0.6772, 0.2848, 17.2162, 3.5659e-43, 0.0052, 0.0123,
                0.0140, 0.0175, 0.0890, 0.0857, 0.0019, 1.1032e-5, 1.6535, 0.0135, 178.4674,
                35.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            ],
            initial_s_h: 5.4562e-8,
            initial_ph: 7.0,
            params: Adm1Params::default(),
            interface: InterfaceParams::default(),
            integrator: IntegratorOptions::default(),
        }
    }
}

/// Statistics of one algebraic solver over a step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveStats {
    /// Number of solves performed.
    pub solves: usize,
    /// Largest iteration count of a single solve.
    pub max_iterations: usize,
    /// Largest absolute residual a solve stopped at.
    pub max_residual: f64,
    /// Number of solves that stopped at the iteration budget.
    pub failures: usize,
}

impl SolveStats {
    fn record(&mut self, outcome: &NewtonOutcome) {
        self.solves += 1;
        self.max_iterations = self.max_iterations.max(outcome.iterations);
        self.max_residual = self.max_residual.max(outcome.residual.abs());
        if !outcome.converged {
            self.failures += 1;
        }
    }

    pub fn converged(&self) -> bool {
        self.failures == 0
    }
}

/// Worst-case statistics of the pH and dissolved hydrogen solves during
/// the last step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveDiagnostics {
    pub ph: SolveStats,
    pub hydrogen: SolveStats,
}

impl SolveDiagnostics {
    fn warnings(&self) -> Vec<StepWarning> {
        [(Solver::Ph, &self.ph), (Solver::Hydrogen, &self.hydrogen)]
            .into_iter()
            .filter(|(_, stats)| !stats.converged())
            .map(|(solver, stats)| {
                tracing::warn!(
                    %solver,
                    failures = stats.failures,
                    iterations = stats.max_iterations,
                    residual = stats.max_residual,
                    "Digester solve did not converge, using the last iterate."
                );
                StepWarning::NonConvergence {
                    solver,
                    iterations: stats.max_iterations,
                    residual: stats.max_residual,
                }
            })
            .collect()
    }
}

/// Everything the digester reports after a step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DigesterOutput {
    /// The liquid components, in [`Adm1`] order.
    pub liquid: [f64; Adm1::LIQUID],
    pub flow: f64,
    /// Temperature, °C.
    pub temperature: f64,
    pub dummies: [f64; 5],
    pub ph: f64,
    pub s_h: f64,
    pub s_va_ion: f64,
    pub s_bu_ion: f64,
    pub s_pro_ion: f64,
    pub s_ac_ion: f64,
    pub s_hco3: f64,
    pub s_co2: f64,
    pub s_nh3: f64,
    pub s_nh4: f64,
    /// Headspace concentrations of H2, CH4 and CO2.
    pub gas: [f64; 3],
    /// Partial pressures of H2, CH4 and CO2, bar.
    pub partial_pressures: [f64; 3],
    /// Total headspace pressure including water vapour, bar.
    pub pressure: f64,
    /// Biogas flow normalised to atmospheric pressure, m³/d.
    pub gas_flow: f64,
}

impl DigesterOutput {
    /// Returns the output as a flat vector: liquid components, flow,
    /// temperature, dummies, pH, S_H+, the ions, S_CO2, S_NH3, S_NH4+, gas
    /// concentrations, partial pressures, total pressure and gas flow.
    pub fn to_array(&self) -> [f64; DIGESTER_OUTPUT_LEN] {
        let mut out = [0.0; DIGESTER_OUTPUT_LEN];
        out[..Adm1::LIQUID].copy_from_slice(&self.liquid);
        let rest = [self.flow, self.temperature]
            .into_iter()
            .chain(self.dummies)
            .chain([
                self.ph,
                self.s_h,
                self.s_va_ion,
                self.s_bu_ion,
                self.s_pro_ion,
                self.s_ac_ion,
                self.s_hco3,
                self.s_co2,
                self.s_nh3,
                self.s_nh4,
            ])
            .chain(self.gas)
            .chain(self.partial_pressures)
            .chain([self.pressure, self.gas_flow]);
        for (slot, value) in out[Adm1::LIQUID..].iter_mut().zip(rest) {
            *slot = value;
        }
        out
    }

    /// Returns the liquid phase as a stream for the outflow interface.
    pub fn stream(&self) -> AdmStream {
        let mut values = [0.0; ADM1_STATES];
        values[..Adm1::LIQUID].copy_from_slice(&self.liquid);
        let mut stream = AdmStream::new(values);
        stream[Adm1::Q] = self.flow;
        stream[Adm1::Temp] = self.temperature;
        for (c, v) in Adm1::DUMMIES.iter().zip(self.dummies) {
            stream[*c] = v;
        }
        stream
    }
}

/// Temperature dependent equilibrium constants.
#[derive(Clone, Debug)]
pub(crate) struct Equilibria {
    k_w: f64,
    k_a_va: f64,
    k_a_bu: f64,
    k_a_pro: f64,
    k_a_ac: f64,
    k_a_co2: f64,
    k_a_in: f64,
    k_h_h2: f64,
    k_h_ch4: f64,
    k_h_co2: f64,
    p_gas_h2o: f64,
    /// R T, bar m³/kmol.
    rt: f64,
}

impl Equilibria {
    pub(crate) fn new(p: &Adm1Params, t_op: f64) -> Self {
        let factor = (1.0 / p.t_base - 1.0 / t_op) / (100.0 * p.r);
        let pk = |pk: f64| 10f64.powf(-pk);
        Self {
            k_w: pk(p.pk_w_base) * (55900.0 * factor).exp(),
            k_a_va: pk(p.pk_a_va_base),
            k_a_bu: pk(p.pk_a_bu_base),
            k_a_pro: pk(p.pk_a_pro_base),
            k_a_ac: pk(p.pk_a_ac_base),
            k_a_co2: pk(p.pk_a_co2_base) * (7646.0 * factor).exp(),
            k_a_in: pk(p.pk_a_in_base) * (51965.0 * factor).exp(),
            k_h_h2: p.k_h_h2_base * (-4180.0 * factor).exp(),
            k_h_ch4: p.k_h_ch4_base * (-14240.0 * factor).exp(),
            k_h_co2: p.k_h_co2_base * (-19410.0 * factor).exp(),
            p_gas_h2o: p.k_h_h2o_base * (5290.0 * (1.0 / p.t_base - 1.0 / t_op)).exp(),
            rt: p.r * t_op,
        }
    }
}

/// The totals that enter the charge balance.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ChargeTotals {
    pub va: f64,
    pub bu: f64,
    pub pro: f64,
    pub ac: f64,
    pub ic: f64,
    pub inorganic_n: f64,
    pub cat: f64,
    pub an: f64,
}

impl ChargeTotals {
    fn from_state(x: &[f64]) -> Self {
        Self {
            va: x[Adm1::Sva as usize],
            bu: x[Adm1::Sbu as usize],
            pro: x[Adm1::Spro as usize],
            ac: x[Adm1::Sac as usize],
            ic: x[Adm1::Sic as usize],
            inorganic_n: x[Adm1::Sin as usize],
            cat: x[Adm1::Scat as usize],
            an: x[Adm1::San as usize],
        }
    }
}

/// Dissociated ions at a given hydrogen-ion concentration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Ions {
    pub va: f64,
    pub bu: f64,
    pub pro: f64,
    pub ac: f64,
    pub hco3: f64,
    pub nh3: f64,
}

impl Ions {
    fn new(t: &ChargeTotals, eq: &Equilibria, s_h: f64) -> Self {
        let dissociated = |k: f64, total: f64| k * total / (k + s_h);
        Self {
            va: dissociated(eq.k_a_va, t.va),
            bu: dissociated(eq.k_a_bu, t.bu),
            pro: dissociated(eq.k_a_pro, t.pro),
            ac: dissociated(eq.k_a_ac, t.ac),
            hco3: dissociated(eq.k_a_co2, t.ic),
            nh3: dissociated(eq.k_a_in, t.inorganic_n),
        }
    }
}

/// Residual of the charge balance at hydrogen-ion concentration `s_h`.
pub(crate) fn charge_residual(t: &ChargeTotals, eq: &Equilibria, s_h: f64) -> f64 {
    let ions = Ions::new(t, eq, s_h);
    t.cat + (t.inorganic_n - ions.nh3) + s_h
        - ions.hco3
        - ions.ac / 64.0
        - ions.pro / 112.0
        - ions.bu / 160.0
        - ions.va / 208.0
        - eq.k_w / s_h
        - t.an
}

/// Derivative of [`charge_residual`] with respect to `s_h`.
pub(crate) fn charge_gradient(t: &ChargeTotals, eq: &Equilibria, s_h: f64) -> f64 {
    let slope = |k: f64, total: f64| k * total / ((k + s_h) * (k + s_h));
    1.0 + slope(eq.k_a_in, t.inorganic_n)
        + slope(eq.k_a_co2, t.ic)
        + slope(eq.k_a_ac, t.ac) / 64.0
        + slope(eq.k_a_pro, t.pro) / 112.0
        + slope(eq.k_a_bu, t.bu) / 160.0
        + slope(eq.k_a_va, t.va) / 208.0
        + eq.k_w / (s_h * s_h)
}

/// Solves the charge balance for the hydrogen-ion concentration.
pub(crate) fn solve_ph(t: &ChargeTotals, eq: &Equilibria, guess: f64) -> NewtonOutcome {
    newton::solve_positive(
        guess,
        |s_h| charge_residual(t, eq, s_h),
        |s_h| charge_gradient(t, eq, s_h),
    )
}

/// The dissolved hydrogen balance with everything that does not depend on
/// S_h2 evaluated.
///
/// `residual(s) = fixed - (dilution + kla) s + Σ aᵢ / (1 + s / Kᵢ)
///                - uptake s / (k_s + s)`
#[derive(Clone, Debug)]
pub(crate) struct HydrogenBalance {
    fixed: f64,
    dilution: f64,
    kla: f64,
    /// Hydrogen-inhibited production terms and their inhibition constants.
    inhibited: [(f64, f64); 3],
    uptake: f64,
    k_s: f64,
}

impl HydrogenBalance {
    pub(crate) fn residual(&self, s: f64) -> f64 {
        self.fixed - (self.dilution + self.kla) * s
            + self
                .inhibited
                .iter()
                .map(|(a, k)| a / (1.0 + s / k))
                .sum::<f64>()
            - self.uptake * s / (self.k_s + s)
    }

    pub(crate) fn gradient(&self, s: f64) -> f64 {
        -(self.dilution + self.kla)
            - self
                .inhibited
                .iter()
                .map(|(a, k)| a / k / ((1.0 + s / k) * (1.0 + s / k)))
                .sum::<f64>()
            - self.uptake * self.k_s / ((self.k_s + s) * (self.k_s + s))
    }

    pub(crate) fn solve(&self, guess: f64) -> NewtonOutcome {
        newton::solve_positive(guess, |s| self.residual(s), |s| self.gradient(s))
    }
}

/// Last solutions of the algebraic equations.
#[derive(Clone, Copy, Debug)]
struct WarmStart {
    s_h: f64,
    s_h2: f64,
}

/// Partial and total headspace pressures, and the resulting gas flow.
#[derive(Clone, Copy, Debug, Default)]
struct Headspace {
    h2: f64,
    ch4: f64,
    co2: f64,
    total: f64,
    q_gas: f64,
}

/// Algebraic states and derived quantities at one point of the state
/// space.
#[derive(Clone, Copy, Debug)]
struct Speciated {
    s_h: f64,
    ions: Ions,
    s_h2: f64,
    headspace: Headspace,
    /// Inhibition of sugar/amino acid, LCFA, C4, propionate, acetate and
    /// hydrogen uptake.
    inhibition: [f64; 6],
}

/// Biogas flow leaving the headspace, m³/d.  Zero while the headspace
/// pressure does not exceed `p_atm`.
pub fn gas_flow(pressure: f64, p_atm: f64, k_p: f64) -> f64 {
    (k_p * (pressure - p_atm)).max(0.0)
}

fn hill(s_h: f64, upper: f64, lower: f64) -> f64 {
    let limit = 10f64.powf(-(upper + lower) / 2.0);
    let n = 3.0 / (upper - lower);
    limit.powf(n) / (s_h.powf(n) + limit.powf(n))
}

struct Adm1Rhs<'a> {
    p: &'a Adm1Params,
    eq: Equilibria,
    input: &'a AdmStream,
    liquid_volume: f64,
    gas_volume: f64,
    /// Carried across evaluations, since the stepper only lends `&self`.
    warm: Cell<WarmStart>,
    diagnostics: Cell<SolveDiagnostics>,
}

impl System<f64, State> for Adm1Rhs<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        let mut warm = self.warm.get();
        let mut diagnostics = self.diagnostics.get();
        self.derivatives(y.as_slice(), dy.as_mut_slice(), &mut warm, &mut diagnostics);
        self.warm.set(warm);
        self.diagnostics.set(diagnostics);
    }
}

impl Adm1Rhs<'_> {
    fn clamped(y: &[f64]) -> [f64; ADM1_STATES] {
        let mut x = [0.0; ADM1_STATES];
        for (x, y) in x.iter_mut().zip(y) {
            *x = y.max(0.0);
        }
        x
    }

    /// Solves for the algebraic states at `x`, a state with negative values
    /// clamped to zero.
    fn speciate(
        &self,
        x: &[f64; ADM1_STATES],
        warm: &mut WarmStart,
        diagnostics: &mut SolveDiagnostics,
    ) -> Speciated {
        let p = self.p;
        let c = |s: Adm1| x[s as usize];

        let totals = ChargeTotals::from_state(x);
        let ph = solve_ph(&totals, &self.eq, warm.s_h);
        diagnostics.ph.record(&ph);
        warm.s_h = ph.value;
        let s_h = ph.value;
        let ions = Ions::new(&totals, &self.eq, s_h);

        let i_in_lim = 1.0 / (1.0 + p.k_s_in / c(Adm1::Sin));
        let i_nh3 = 1.0 / (1.0 + ions.nh3 / p.k_i_nh3);
        let base = hill(s_h, p.ph_ul_aa, p.ph_ll_aa) * i_in_lim;
        let acetate = hill(s_h, p.ph_ul_ac, p.ph_ll_ac) * i_in_lim * i_nh3;
        let hydrogen = hill(s_h, p.ph_ul_h2, p.ph_ll_h2) * i_in_lim;

        let rt = self.eq.rt;
        let mut headspace = Headspace {
            h2: c(Adm1::GasH2) * rt / 16.0,
            ch4: c(Adm1::GasCh4) * rt / 64.0,
            co2: c(Adm1::GasCo2) * rt,
            ..Default::default()
        };
        headspace.total = headspace.h2 + headspace.ch4 + headspace.co2 + self.eq.p_gas_h2o;
        headspace.q_gas = gas_flow(headspace.total, p.p_atm, p.k_p);

        let monod = |k_m: f64, s: Adm1, k_s: f64| k_m * c(s) / (k_s + c(s));
        let c4_share = |s: Adm1| c(s) / (c(Adm1::Sva) + c(Adm1::Sbu) + 1e-6);
        let balance = HydrogenBalance {
            fixed: self.input.flow() / self.liquid_volume * self.input[Adm1::Sh2]
                + (1.0 - p.y_su) * p.f_h2_su * monod(p.k_m_su, Adm1::Ssu, p.k_s_su)
                    * c(Adm1::Xsu)
                    * base
                + (1.0 - p.y_aa) * p.f_h2_aa * monod(p.k_m_aa, Adm1::Saa, p.k_s_aa)
                    * c(Adm1::Xaa)
                    * base
                + p.kla * 16.0 * self.eq.k_h_h2 * headspace.h2,
            dilution: self.input.flow() / self.liquid_volume,
            kla: p.kla,
            inhibited: [
                (
                    (1.0 - p.y_fa) * 0.3 * monod(p.k_m_fa, Adm1::Sfa, p.k_s_fa) * c(Adm1::Xfa)
                        * base,
                    p.k_ih2_fa,
                ),
                (
                    (1.0 - p.y_c4)
                        * (0.15
                            * monod(p.k_m_c4, Adm1::Sva, p.k_s_c4)
                            * c4_share(Adm1::Sva)
                            + 0.2 * monod(p.k_m_c4, Adm1::Sbu, p.k_s_c4) * c4_share(Adm1::Sbu))
                        * c(Adm1::Xc4)
                        * base,
                    p.k_ih2_c4,
                ),
                (
                    (1.0 - p.y_pro) * 0.43 * monod(p.k_m_pro, Adm1::Spro, p.k_s_pro)
                        * c(Adm1::Xpro)
                        * base,
                    p.k_ih2_pro,
                ),
            ],
            uptake: p.k_m_h2 * c(Adm1::Xh2) * hydrogen,
            k_s: p.k_s_h2,
        };
        let h2 = balance.solve(warm.s_h2);
        diagnostics.hydrogen.record(&h2);
        warm.s_h2 = h2.value;
        let s_h2 = h2.value;

        Speciated {
            s_h,
            ions,
            s_h2,
            headspace,
            inhibition: [
                base,
                base / (1.0 + s_h2 / p.k_ih2_fa),
                base / (1.0 + s_h2 / p.k_ih2_c4),
                base / (1.0 + s_h2 / p.k_ih2_pro),
                acetate,
                hydrogen,
            ],
        }
    }

    fn derivatives(
        &self,
        y: &[f64],
        dy: &mut [f64],
        warm: &mut WarmStart,
        diagnostics: &mut SolveDiagnostics,
    ) {
        let p = self.p;
        let x = Self::clamped(y);
        let sp = self.speciate(&x, warm, diagnostics);
        let c = |s: Adm1| x[s as usize];
        let s_h2 = sp.s_h2;
        let inhib = sp.inhibition;

        let proc1 = p.k_dis * c(Adm1::Xc);
        let proc2 = p.k_hyd_ch * c(Adm1::Xch);
        let proc3 = p.k_hyd_pr * c(Adm1::Xpr);
        let proc4 = p.k_hyd_li * c(Adm1::Xli);
        let uptake = |k_m: f64, s: Adm1, k_s: f64, biomass: Adm1, inhibition: f64| {
            k_m * c(s) / (k_s + c(s)) * c(biomass) * inhibition
        };
        let proc5 = uptake(p.k_m_su, Adm1::Ssu, p.k_s_su, Adm1::Xsu, inhib[0]);
        let proc6 = uptake(p.k_m_aa, Adm1::Saa, p.k_s_aa, Adm1::Xaa, inhib[0]);
        let proc7 = uptake(p.k_m_fa, Adm1::Sfa, p.k_s_fa, Adm1::Xfa, inhib[1]);
        let vfa = c(Adm1::Sva) + c(Adm1::Sbu) + 1e-6;
        let proc8 = uptake(p.k_m_c4, Adm1::Sva, p.k_s_c4, Adm1::Xc4, inhib[2]) * c(Adm1::Sva) / vfa;
        let proc9 = uptake(p.k_m_c4, Adm1::Sbu, p.k_s_c4, Adm1::Xc4, inhib[2]) * c(Adm1::Sbu) / vfa;
        let proc10 = uptake(p.k_m_pro, Adm1::Spro, p.k_s_pro, Adm1::Xpro, inhib[3]);
        let proc11 = uptake(p.k_m_ac, Adm1::Sac, p.k_s_ac, Adm1::Xac, inhib[4]);
        let proc12 = p.k_m_h2 * s_h2 / (p.k_s_h2 + s_h2) * c(Adm1::Xh2) * inhib[5];
        let mut decay = [0.0; 7];
        for (d, (k, biomass)) in decay.iter_mut().zip(p.k_dec.iter().zip(Adm1::BIOMASS)) {
            *d = k * c(biomass);
        }
        let total_decay: f64 = decay.iter().sum();

        let gas = &sp.headspace;
        let proct8 = p.kla * (s_h2 - 16.0 * self.eq.k_h_h2 * gas.h2);
        let proct9 = p.kla * (c(Adm1::Sch4) - 64.0 * self.eq.k_h_ch4 * gas.ch4);
        let proct10 = p.kla * ((c(Adm1::Sic) - sp.ions.hco3) - self.eq.k_h_co2 * gas.co2);

        // Carbon released by each process.
        let stoich1 = -p.c_xc
            + p.f_si_xc * p.c_si
            + p.f_ch_xc * p.c_ch
            + p.f_pr_xc * p.c_pr
            + p.f_li_xc * p.c_li
            + p.f_xi_xc * p.c_xi;
        let stoich2 = -p.c_ch + p.c_su;
        let stoich3 = -p.c_pr + p.c_aa;
        let stoich4 = -p.c_li + (1.0 - p.f_fa_li) * p.c_su + p.f_fa_li * p.c_fa;
        let stoich5 = -p.c_su
            + (1.0 - p.y_su) * (p.f_bu_su * p.c_bu + p.f_pro_su * p.c_pro + p.f_ac_su * p.c_ac)
            + p.y_su * p.c_bac;
        let stoich6 = -p.c_aa
            + (1.0 - p.y_aa)
                * (p.f_va_aa * p.c_va
                    + p.f_bu_aa * p.c_bu
                    + p.f_pro_aa * p.c_pro
                    + p.f_ac_aa * p.c_ac)
            + p.y_aa * p.c_bac;
        let stoich7 = -p.c_fa + (1.0 - p.y_fa) * 0.7 * p.c_ac + p.y_fa * p.c_bac;
        let stoich8 = -p.c_va
            + (1.0 - p.y_c4) * 0.54 * p.c_pro
            + (1.0 - p.y_c4) * 0.31 * p.c_ac
            + p.y_c4 * p.c_bac;
        let stoich9 = -p.c_bu + (1.0 - p.y_c4) * 0.8 * p.c_ac + p.y_c4 * p.c_bac;
        let stoich10 = -p.c_pro + (1.0 - p.y_pro) * 0.57 * p.c_ac + p.y_pro * p.c_bac;
        let stoich11 = -p.c_ac + (1.0 - p.y_ac) * p.c_ch4 + p.y_ac * p.c_bac;
        let stoich12 = (1.0 - p.y_h2) * p.c_ch4 + p.y_h2 * p.c_bac;
        let stoich13 = -p.c_bac + p.c_xc;

        let mut reaction = [0.0; Adm1::Xi as usize + 1];
        reaction[Adm1::Ssu as usize] = proc2 + (1.0 - p.f_fa_li) * proc4 - proc5;
        reaction[Adm1::Saa as usize] = proc3 - proc6;
        reaction[Adm1::Sfa as usize] = p.f_fa_li * proc4 - proc7;
        reaction[Adm1::Sva as usize] = (1.0 - p.y_aa) * p.f_va_aa * proc6 - proc8;
        reaction[Adm1::Sbu as usize] =
            (1.0 - p.y_su) * p.f_bu_su * proc5 + (1.0 - p.y_aa) * p.f_bu_aa * proc6 - proc9;
        reaction[Adm1::Spro as usize] = (1.0 - p.y_su) * p.f_pro_su * proc5
            + (1.0 - p.y_aa) * p.f_pro_aa * proc6
            + (1.0 - p.y_c4) * 0.54 * proc8
            - proc10;
        reaction[Adm1::Sac as usize] = (1.0 - p.y_su) * p.f_ac_su * proc5
            + (1.0 - p.y_aa) * p.f_ac_aa * proc6
            + (1.0 - p.y_fa) * 0.7 * proc7
            + (1.0 - p.y_c4) * 0.31 * proc8
            + (1.0 - p.y_c4) * 0.8 * proc9
            + (1.0 - p.y_pro) * 0.57 * proc10
            - proc11;
        reaction[Adm1::Sch4 as usize] =
            (1.0 - p.y_ac) * proc11 + (1.0 - p.y_h2) * proc12 - proct9;
        reaction[Adm1::Sic as usize] = -stoich1 * proc1
            - stoich2 * proc2
            - stoich3 * proc3
            - stoich4 * proc4
            - stoich5 * proc5
            - stoich6 * proc6
            - stoich7 * proc7
            - stoich8 * proc8
            - stoich9 * proc9
            - stoich10 * proc10
            - stoich11 * proc11
            - stoich12 * proc12
            - stoich13 * total_decay
            - proct10;
        reaction[Adm1::Sin as usize] =
            (p.n_xc - p.f_xi_xc * p.n_i - p.f_si_xc * p.n_i - p.f_pr_xc * p.n_aa) * proc1
                - p.y_su * p.n_bac * proc5
                + (p.n_aa - p.y_aa * p.n_bac) * proc6
                - p.y_fa * p.n_bac * proc7
                - p.y_c4 * p.n_bac * (proc8 + proc9)
                - p.y_pro * p.n_bac * proc10
                - p.y_ac * p.n_bac * proc11
                - p.y_h2 * p.n_bac * proc12
                + (p.n_bac - p.n_xc) * total_decay;
        reaction[Adm1::Si as usize] = p.f_si_xc * proc1;
        reaction[Adm1::Xc as usize] = -proc1 + total_decay;
        reaction[Adm1::Xch as usize] = p.f_ch_xc * proc1 - proc2;
        reaction[Adm1::Xpr as usize] = p.f_pr_xc * proc1 - proc3;
        reaction[Adm1::Xli as usize] = p.f_li_xc * proc1 - proc4;
        reaction[Adm1::Xsu as usize] = p.y_su * proc5 - decay[0];
        reaction[Adm1::Xaa as usize] = p.y_aa * proc6 - decay[1];
        reaction[Adm1::Xfa as usize] = p.y_fa * proc7 - decay[2];
        reaction[Adm1::Xc4 as usize] = p.y_c4 * (proc8 + proc9) - decay[3];
        reaction[Adm1::Xpro as usize] = p.y_pro * proc10 - decay[4];
        reaction[Adm1::Xac as usize] = p.y_ac * proc11 - decay[5];
        reaction[Adm1::Xh2 as usize] = p.y_h2 * proc12 - decay[6];
        reaction[Adm1::Xi as usize] = p.f_xi_xc * proc1;

        dy.fill(0.0);
        let dilution = self.input.flow() / self.liquid_volume;
        let inflow = self.input.values();
        for (i, r) in reaction.iter().enumerate() {
            dy[i] = dilution * (inflow[i] - y[i]) + r;
        }
        for ion in [Adm1::Scat, Adm1::San] {
            let i = ion as usize;
            dy[i] = dilution * (inflow[i] - y[i]);
        }
        // Solved algebraically.
        dy[Adm1::Sh2 as usize] = 0.0;

        let transfer = self.liquid_volume / self.gas_volume;
        let outflow = gas.q_gas / self.gas_volume;
        dy[Adm1::GasH2 as usize] = -c(Adm1::GasH2) * outflow + proct8 * transfer;
        dy[Adm1::GasCh4 as usize] = -c(Adm1::GasCh4) * outflow + proct9 * transfer;
        dy[Adm1::GasCo2 as usize] = -c(Adm1::GasCo2) * outflow + proct10 * transfer;
    }
}

/// An anaerobic digester.
///
/// As a process unit, it takes and returns activated sludge streams,
/// converted through [`asm_to_adm`] and [`adm_to_asm`].  The inflow
/// conversion uses the pH of the previous step.
#[derive(Clone, Debug)]
pub struct Adm1Digester {
    config: DigesterConfig,
    state: [f64; ADM1_STATES],
    s_h: f64,
    ph: f64,
    diagnostics: SolveDiagnostics,
    output: DigesterOutput,
    step_hint: f64,
}

impl Adm1Digester {
    /// Creates a digester from the given configuration.
    pub fn new(config: DigesterConfig) -> Result<Self, Error> {
        for (name, value) in [
            ("Liquid volume", config.liquid_volume),
            ("Gas volume", config.gas_volume),
            ("Operating temperature", config.operating_temperature),
            ("Initial S_h", config.initial_s_h),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_parameter(format!(
                    "{name} must be positive, got {value}."
                )));
            }
        }

        Ok(Self {
            state: config.initial_state,
            s_h: config.initial_s_h,
            ph: config.initial_ph,
            diagnostics: SolveDiagnostics::default(),
            output: DigesterOutput::default(),
            step_hint: config.integrator.initial_step,
            config,
        })
    }

    pub fn config(&self) -> &DigesterConfig {
        &self.config
    }

    /// Returns the pH after the last step, or the initial pH.
    pub fn ph(&self) -> f64 {
        self.ph
    }

    /// Returns the output of the last step.
    pub fn output(&self) -> &DigesterOutput {
        &self.output
    }

    /// Returns the solver statistics of the last step.
    pub fn diagnostics(&self) -> &SolveDiagnostics {
        &self.diagnostics
    }

    /// Advances the digester by `dt` days with an inflow in the digester
    /// representation.
    ///
    /// Non-converged solves never fail the step.  They are reported as
    /// warnings, and the last iterate is used.
    pub fn digest(
        &mut self,
        input: &AdmStream,
        dt: f64,
    ) -> Result<(DigesterOutput, Vec<StepWarning>), Error> {
        ensure_timestep("ADM1Digester", dt)?;
        if !input.values().iter().all(|v| v.is_finite()) {
            return Err(Error::invalid_stream(
                "ADM1Digester received a non-finite value on input port 0.",
            ));
        }

        let t_op = self.config.operating_temperature;
        let rhs = Adm1Rhs {
            p: &self.config.params,
            eq: Equilibria::new(&self.config.params, t_op),
            input,
            liquid_volume: self.config.liquid_volume,
            gas_volume: self.config.gas_volume,
            warm: Cell::new(WarmStart {
                s_h: self.s_h,
                s_h2: self.state[Adm1::Sh2 as usize],
            }),
            diagnostics: Cell::new(SolveDiagnostics::default()),
        };

        let mut y = self.state;
        let report = integration::integrate(
            &rhs,
            &mut y,
            dt,
            &mut self.step_hint,
            &self.config.integrator,
        );

        let mut warnings = Vec::new();
        if !report.is_complete() {
            tracing::warn!(
                outcome = ?report.outcome,
                accepted = report.accepted,
                "Digester integration did not reach the end of the timestep."
            );
            warnings.push(StepWarning::Instability(report.outcome));
        }

        let mut warm = rhs.warm.get();
        let mut diagnostics = rhs.diagnostics.get();

        let sp = rhs.speciate(&Adm1Rhs::clamped(&y), &mut warm, &mut diagnostics);
        y[Adm1::Sh2 as usize] = sp.s_h2;
        let ions = [
            (Adm1::SvaIon, sp.ions.va),
            (Adm1::SbuIon, sp.ions.bu),
            (Adm1::SproIon, sp.ions.pro),
            (Adm1::SacIon, sp.ions.ac),
            (Adm1::Shco3, sp.ions.hco3),
            (Adm1::Snh3, sp.ions.nh3),
        ];
        for (slot, value) in ions {
            y[slot as usize] = value;
        }
        y[Adm1::Q as usize] = input.flow();
        y[Adm1::Temp as usize] = t_op - 273.15;
        for c in Adm1::DUMMIES {
            y[c as usize] = input[c];
        }

        self.state = y;
        self.s_h = sp.s_h;
        self.ph = -sp.s_h.log10();
        self.diagnostics = diagnostics;
        warnings.extend(diagnostics.warnings());

        let p = &self.config.params;
        let gas = sp.headspace;
        let mut liquid = [0.0; Adm1::LIQUID];
        liquid.copy_from_slice(&y[..Adm1::LIQUID]);
        self.output = DigesterOutput {
            liquid,
            flow: input.flow(),
            temperature: t_op - 273.15,
            dummies: Adm1::DUMMIES.map(|c| input[c]),
            ph: self.ph,
            s_h: sp.s_h,
            s_va_ion: sp.ions.va,
            s_bu_ion: sp.ions.bu,
            s_pro_ion: sp.ions.pro,
            s_ac_ion: sp.ions.ac,
            s_hco3: sp.ions.hco3,
            s_co2: y[Adm1::Sic as usize] - sp.ions.hco3,
            s_nh3: sp.ions.nh3,
            s_nh4: y[Adm1::Sin as usize] - sp.ions.nh3,
            gas: [
                y[Adm1::GasH2 as usize],
                y[Adm1::GasCh4 as usize],
                y[Adm1::GasCo2 as usize],
            ],
            partial_pressures: [gas.h2, gas.ch4, gas.co2],
            pressure: gas.total,
            gas_flow: gas.q_gas * gas.total / p.p_atm,
        };

        Ok((self.output.clone(), warnings))
    }
}

impl ProcessUnit for Adm1Digester {
    fn category(&self) -> UnitCategory {
        UnitCategory::Adm1Digester
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("ADM1Digester", inputs, 1)?;
        let inflow = &inputs[0];
        let t_op = self.config.operating_temperature;
        let adm_in = asm_to_adm(inflow, self.ph, t_op, &self.config.interface)?;
        let (out, warnings) = self.digest(&adm_in, dt)?;
        let asm_out = adm_to_asm(
            &out.stream(),
            self.ph,
            inflow.temperature(),
            t_op,
            &self.config.interface,
        )?;

        Ok(StepOutput {
            outputs: vec![asm_out],
            warnings,
        })
    }

    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        match control {
            UnitControl::OperatingTemperature(t) if t.is_finite() && *t > 0.0 => {
                self.config.operating_temperature = *t;
                Ok(())
            }
            UnitControl::OperatingTemperature(t) => Err(Error::invalid_parameter(format!(
                "Operating temperature must be positive, got {t}."
            ))),
            _ => Err(Error::invalid_parameter(format!(
                "ADM1Digester does not accept {control:?}."
            ))),
        }
    }

    /// The 42 digester states in [`Adm1`] order.
    fn state(&self) -> Vec<f64> {
        self.state.to_vec()
    }
}
