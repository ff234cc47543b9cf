// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A completely mixed activated sludge reactor running the ASM1 biokinetic
//! model.

use ode_solvers::System;

use crate::integration::{self, IntegratorOptions, State};
use crate::process_unit::{ProcessUnit, StepOutput, StepWarning, UnitControl};
use crate::stream::{ensure_inputs, ensure_timestep, STREAM_LEN};
use crate::{Asm1, Error, Stream, UnitCategory};

/// Kinetic and stoichiometric parameters of ASM1, at 15 °C.
#[derive(Clone, Debug, PartialEq)]
pub struct Asm1Params {
    /// Maximum heterotrophic growth rate, 1/d.
    pub mu_h: f64,
    /// Half-saturation coefficient for heterotrophs, g COD/m³.
    pub k_s: f64,
    /// Oxygen half-saturation coefficient for heterotrophs, g O2/m³.
    pub k_oh: f64,
    /// Nitrate half-saturation coefficient for denitrifiers, g N/m³.
    pub k_no: f64,
    /// Heterotrophic decay rate, 1/d.
    pub b_h: f64,
    /// Maximum autotrophic growth rate, 1/d.
    pub mu_a: f64,
    /// Ammonia half-saturation coefficient for autotrophs, g N/m³.
    pub k_nh: f64,
    /// Oxygen half-saturation coefficient for autotrophs, g O2/m³.
    pub k_oa: f64,
    /// Autotrophic decay rate, 1/d.
    pub b_a: f64,
    /// Anoxic growth correction factor.
    pub ny_g: f64,
    /// Ammonification rate, m³/(g COD·d).
    pub k_a: f64,
    /// Maximum specific hydrolysis rate, g X_S/(g X_BH COD·d).
    pub k_h: f64,
    /// Half-saturation coefficient for hydrolysis, g X_S/g X_BH COD.
    pub k_x: f64,
    /// Anoxic hydrolysis correction factor.
    pub ny_h: f64,
    /// Heterotrophic yield, g X_BH COD/g COD.
    pub y_h: f64,
    /// Autotrophic yield, g X_BA COD/g N.
    pub y_a: f64,
    /// Fraction of biomass leading to particulate products.
    pub f_p: f64,
    /// Nitrogen content of biomass, g N/g COD.
    pub i_xb: f64,
    /// Nitrogen content of particulate products, g N/g COD.
    pub i_xp: f64,
    /// COD to TSS conversion factors for `X_I`, `X_S`, `X_BH`, `X_BA`, `X_P`.
    pub tss_factors: [f64; 5],
}

impl Default for Asm1Params {
    fn default() -> Self {
        Self {
            mu_h: 4.0,
            k_s: 10.0,
            k_oh: 0.2,
            k_no: 0.5,
            b_h: 0.3,
            mu_a: 0.5,
            k_nh: 1.0,
            k_oa: 0.4,
            b_a: 0.05,
            ny_g: 0.8,
            k_a: 0.05,
            k_h: 3.0,
            k_x: 0.1,
            ny_h: 0.8,
            y_h: 0.67,
            y_a: 0.24,
            f_p: 0.08,
            i_xb: 0.08,
            i_xp: 0.06,
            tss_factors: [0.75; 5],
        }
    }
}

/// Configuration of an [`Asm1Reactor`].
#[derive(Clone, Debug, PartialEq)]
pub struct Asm1ReactorConfig {
    /// Reactor volume, m³.
    pub volume: f64,
    /// Oxygen transfer coefficient, 1/d.  A negative value holds the
    /// dissolved oxygen at its absolute value.
    pub kla: f64,
    /// External carbon flow added to the inflow, m³/d.
    pub carbon_dose: f64,
    /// COD concentration of the external carbon source, g COD/m³.
    pub carbon_source_concentration: f64,
    /// Integrate the reactor temperature instead of passing the influent
    /// temperature through.
    pub temperature_model: bool,
    /// Integrate the auxiliary tracer components.
    pub activate_dummies: bool,
    /// State at time zero.
    pub initial_state: Stream,
    /// Closed-loop dissolved oxygen control.  When set, `kla` is ignored.
    pub oxygen_control: Option<OxygenControl>,
    pub params: Asm1Params,
    pub integrator: IntegratorOptions,
}

impl Asm1ReactorConfig {
    /// Returns a configuration with the given volume and oxygen transfer
    /// coefficient, and defaults for everything else.
    pub fn new(volume: f64, kla: f64) -> Self {
        let mut initial_state = Stream::zeros();
        for c in Asm1::STATES {
            initial_state[c] = 1.0;
        }
        initial_state[Asm1::Temp] = 15.0;

        Self {
            volume,
            kla,
            carbon_dose: 0.0,
            carbon_source_concentration: 400_000.0,
            temperature_model: false,
            activate_dummies: false,
            initial_state,
            oxygen_control: None,
            params: Asm1Params::default(),
            integrator: IntegratorOptions::default(),
        }
    }
}

/// A PI controller holding the dissolved oxygen at a setpoint by
/// manipulating KLa.
///
/// The controller is continuous: its integral term is integrated together
/// with the reactor content.  Saturation of KLa feeds back into the integral
/// through the tracking time when `anti_windup` is set.
#[derive(Clone, Debug, PartialEq)]
pub struct OxygenControl {
    /// Dissolved oxygen setpoint, g O2/m³.
    pub setpoint: f64,
    /// Proportional gain, (1/d)/(g O2/m³).
    pub gain: f64,
    /// Integral time, d.
    pub integral_time: f64,
    /// Tracking time of the anti-windup feedback, d.
    pub tracking_time: f64,
    /// KLa at zero error and zero integral, 1/d.
    pub kla_offset: f64,
    pub kla_min: f64,
    pub kla_max: f64,
    pub anti_windup: bool,
    /// Integral term at time zero, 1/d.
    pub initial_integral: f64,
}

impl Default for OxygenControl {
    fn default() -> Self {
        Self {
            setpoint: 2.0,
            gain: 25.0,
            integral_time: 0.002,
            tracking_time: 0.001,
            kla_offset: 120.0,
            kla_min: 0.0,
            kla_max: 360.0,
            anti_windup: true,
            initial_integral: 0.0,
        }
    }
}

impl OxygenControl {
    fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("Integral time", self.integral_time),
            ("Tracking time", self.tracking_time),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_parameter(format!(
                    "{name} must be positive, got {value}."
                )));
            }
        }
        if !(self.kla_min >= 0.0 && self.kla_max >= self.kla_min && self.kla_max.is_finite()) {
            return Err(Error::invalid_parameter(format!(
                "KLa limits must satisfy 0 <= min <= max, got [{}, {}].",
                self.kla_min, self.kla_max
            )));
        }
        if !(self.setpoint.is_finite() && self.setpoint >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Oxygen setpoint must be non-negative, got {}.",
                self.setpoint
            )));
        }
        if !(self.gain.is_finite() && self.kla_offset.is_finite() && self.initial_integral.is_finite())
        {
            return Err(Error::invalid_parameter(
                "Oxygen controller gains must be finite.",
            ));
        }
        Ok(())
    }

    /// Returns the requested KLa before and after saturation.
    fn command(&self, so: f64, integral: f64) -> (f64, f64) {
        let raw = self.kla_offset + self.gain * (self.setpoint - so) + integral;
        (raw, raw.clamp(self.kla_min, self.kla_max))
    }

    /// Rate of change of the integral term.
    fn integral_rate(&self, so: f64, integral: f64) -> f64 {
        let (raw, kla) = self.command(so, integral);
        let mut rate = self.gain * (self.setpoint - so) / self.integral_time;
        if self.anti_windup {
            rate += (kla - raw) / self.tracking_time;
        }
        rate
    }
}

/// Oxygen saturation concentration at the given temperature, g O2/m³.
pub(crate) fn oxygen_saturation(temp: f64) -> f64 {
    let t = (temp + 273.15) / 100.0;
    0.9997743214 * 8.0 / 10.5
        * (56.12 * 6791.5 * (-66.7354 + 87.4755 / t + 24.4526 * t.ln()).exp())
}

/// Rescales a rate constant from its 15 °C value, given its value at 10 °C.
fn temperature_corrected(value: f64, value_at_10: f64, temp: f64) -> f64 {
    value * ((value / value_at_10).ln() / 5.0 * (temp - 15.0)).exp()
}

/// Mixes the external carbon source into the inflow.
fn add_carbon(inflow: &Stream, dose: f64, concentration: f64) -> Stream {
    let q = inflow.flow();
    let total = q + dose;
    if dose <= 0.0 || total <= 0.0 {
        return *inflow;
    }

    let mut out = *inflow;
    for c in Asm1::ALL {
        match c {
            Asm1::Q | Asm1::Temp => {}
            Asm1::Ss => out[c] = (inflow[c] * q + concentration * dose) / total,
            _ => out[c] = inflow[c] * q / total,
        }
    }
    out[Asm1::Q] = total;
    out
}

/// The ASM1 right-hand side, for a state laid out like a [`Stream`].  With
/// oxygen control, the controller's integral term follows as one more
/// element.
struct Asm1Rhs<'a> {
    params: &'a Asm1Params,
    inflow: &'a Stream,
    volume: f64,
    kla: f64,
    oxygen_control: Option<&'a OxygenControl>,
    temperature_model: bool,
    activate_dummies: bool,
}

impl Asm1Rhs<'_> {
    fn derivatives(&self, y: &[f64], dy: &mut [f64]) {
        let p = self.params;
        let temp = if self.temperature_model {
            y[Asm1::Temp.index()]
        } else {
            self.inflow[Asm1::Temp]
        };

        let mu_h = temperature_corrected(p.mu_h, 3.0, temp);
        let b_h = temperature_corrected(p.b_h, 0.2, temp);
        let mu_a = temperature_corrected(p.mu_a, 0.3, temp);
        let b_a = temperature_corrected(p.b_a, 0.03, temp);
        let k_h = temperature_corrected(p.k_h, 2.5, temp);
        let k_a = temperature_corrected(p.k_a, 0.04, temp);
        let so_sat = oxygen_saturation(temp);
        let commanded = match self.oxygen_control {
            Some(ctl) => ctl.command(y[Asm1::So.index()], y[STREAM_LEN]).1,
            None => self.kla,
        };
        let fixed_oxygen = self.oxygen_control.is_none() && self.kla < 0.0;
        let kla = commanded * 1.024f64.powf(temp - 15.0);

        // Rates only ever see non-negative concentrations.
        let c = |component: Asm1| y[component.index()].max(0.0);
        let (ss, xs, xbh, xba) = (c(Asm1::Ss), c(Asm1::Xs), c(Asm1::Xbh), c(Asm1::Xba));
        let so = if fixed_oxygen {
            self.kla.abs()
        } else {
            c(Asm1::So)
        };
        let (sno, snh, snd, xnd) = (c(Asm1::Sno), c(Asm1::Snh), c(Asm1::Snd), c(Asm1::Xnd));

        let monod_s = ss / (p.k_s + ss);
        let aerobic = so / (p.k_oh + so);
        let anoxic = p.k_oh / (p.k_oh + so) * sno / (p.k_no + sno);

        let proc1 = mu_h * monod_s * aerobic * xbh;
        let proc2 = mu_h * monod_s * anoxic * p.ny_g * xbh;
        let proc3 = mu_a * snh / (p.k_nh + snh) * so / (p.k_oa + so) * xba;
        let proc4 = b_h * xbh;
        let proc5 = b_a * xba;
        let proc6 = k_a * snd * xbh;
        let proc7 = if xbh > 0.0 {
            let ratio = xs / xbh;
            k_h * ratio / (p.k_x + ratio) * (aerobic + p.ny_h * anoxic) * xbh
        } else {
            0.0
        };
        let proc8 = if xs > 0.0 { proc7 * xnd / xs } else { 0.0 };

        let mut reac = [0.0; STREAM_LEN];
        reac[Asm1::Ss.index()] = -(proc1 + proc2) / p.y_h + proc7;
        reac[Asm1::Xs.index()] = (1.0 - p.f_p) * (proc4 + proc5) - proc7;
        reac[Asm1::Xbh.index()] = proc1 + proc2 - proc4;
        reac[Asm1::Xba.index()] = proc3 - proc5;
        reac[Asm1::Xp.index()] = p.f_p * (proc4 + proc5);
        reac[Asm1::So.index()] =
            -(1.0 - p.y_h) / p.y_h * proc1 - (4.57 - p.y_a) / p.y_a * proc3;
        reac[Asm1::Sno.index()] = -(1.0 - p.y_h) / (2.86 * p.y_h) * proc2 + proc3 / p.y_a;
        reac[Asm1::Snh.index()] =
            -p.i_xb * (proc1 + proc2) - (p.i_xb + 1.0 / p.y_a) * proc3 + proc6;
        reac[Asm1::Snd.index()] = -proc6 + proc8;
        reac[Asm1::Xnd.index()] = (p.i_xb - p.f_p * p.i_xp) * (proc4 + proc5) - proc8;
        reac[Asm1::Salk.index()] = -p.i_xb / 14.0 * proc1
            + ((1.0 - p.y_h) / (14.0 * 2.86 * p.y_h) - p.i_xb / 14.0) * proc2
            - (p.i_xb / 14.0 + 1.0 / (7.0 * p.y_a)) * proc3
            + proc6 / 14.0;

        let dilution = self.inflow.flow() / self.volume;
        let transport = |component: Asm1| dilution * (self.inflow[component] - y[component.index()]);

        dy.fill(0.0);
        for component in Asm1::STATES {
            dy[component.index()] = transport(component) + reac[component.index()];
        }
        if fixed_oxygen {
            dy[Asm1::So.index()] = 0.0;
        } else {
            dy[Asm1::So.index()] += kla * (so_sat - y[Asm1::So.index()]);
        }
        if self.temperature_model {
            dy[Asm1::Temp.index()] = transport(Asm1::Temp);
        }
        if self.activate_dummies {
            for component in Asm1::DUMMIES {
                dy[component.index()] = transport(component);
            }
        }
        if let Some(ctl) = self.oxygen_control {
            dy[STREAM_LEN] = ctl.integral_rate(y[Asm1::So.index()], y[STREAM_LEN]);
        }
    }
}

impl System<f64, State> for Asm1Rhs<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        self.derivatives(y.as_slice(), dy.as_mut_slice())
    }
}

/// A completely mixed ASM1 reactor.
///
/// The output stream is the reactor content, with TSS recomputed from the
/// particulate components and the flow of the inflow.
#[derive(Clone, Debug)]
pub struct Asm1Reactor {
    config: Asm1ReactorConfig,
    state: Stream,
    /// Integral term of the oxygen controller.
    integral: f64,
    step_hint: f64,
}

impl Asm1Reactor {
    /// Creates a reactor from the given configuration.
    pub fn new(config: Asm1ReactorConfig) -> Result<Self, Error> {
        if !(config.volume.is_finite() && config.volume > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Reactor volume must be positive, got {}.",
                config.volume
            )));
        }
        if !config.kla.is_finite() {
            return Err(Error::invalid_parameter("KLa must be finite."));
        }
        if !(config.carbon_dose.is_finite() && config.carbon_dose >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Carbon dose must be non-negative, got {}.",
                config.carbon_dose
            )));
        }
        if !config.initial_state.is_finite() {
            return Err(Error::invalid_stream(
                "Reactor initial state must be finite.",
            ));
        }
        if let Some(ctl) = &config.oxygen_control {
            ctl.validate()?;
        }

        let mut state = config.initial_state;
        if config.kla < 0.0 && config.oxygen_control.is_none() {
            state[Asm1::So] = config.kla.abs();
        }
        Ok(Self {
            integral: config
                .oxygen_control
                .as_ref()
                .map_or(0.0, |ctl| ctl.initial_integral),
            step_hint: config.integrator.initial_step,
            config,
            state,
        })
    }

    /// Returns the configuration of the reactor, including current controls.
    pub fn config(&self) -> &Asm1ReactorConfig {
        &self.config
    }

    /// Returns the current reactor content.
    pub fn content(&self) -> &Stream {
        &self.state
    }

    /// Returns the KLa in effect at the current state, at 15 °C.
    pub fn kla(&self) -> f64 {
        match &self.config.oxygen_control {
            Some(ctl) => ctl.command(self.state[Asm1::So], self.integral).1,
            None => self.config.kla,
        }
    }

    /// Returns the integral term of the oxygen controller, or `None` if the
    /// reactor has none.
    pub fn controller_integral(&self) -> Option<f64> {
        self.config.oxygen_control.as_ref().map(|_| self.integral)
    }

    fn fixed_oxygen(&self) -> bool {
        self.config.oxygen_control.is_none() && self.config.kla < 0.0
    }
}

impl ProcessUnit for Asm1Reactor {
    fn category(&self) -> UnitCategory {
        UnitCategory::Asm1Reactor
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("ASM1Reactor", inputs, 1)?;
        ensure_timestep("ASM1Reactor", dt)?;

        let cfg = &self.config;
        let inflow = add_carbon(&inputs[0], cfg.carbon_dose, cfg.carbon_source_concentration);
        let rhs = Asm1Rhs {
            params: &cfg.params,
            inflow: &inflow,
            volume: cfg.volume,
            kla: cfg.kla,
            oxygen_control: cfg.oxygen_control.as_ref(),
            temperature_model: cfg.temperature_model,
            activate_dummies: cfg.activate_dummies,
        };

        let mut y = self.state.values().to_vec();
        if cfg.oxygen_control.is_some() {
            y.push(self.integral);
        }
        let mut warnings = Vec::new();
        let report = integration::integrate(&rhs, &mut y, dt, &mut self.step_hint, &cfg.integrator);
        self.state.values_mut().copy_from_slice(&y[..STREAM_LEN]);
        if let Some(integral) = y.get(STREAM_LEN) {
            self.integral = *integral;
        }
        if !report.is_complete() {
            tracing::warn!(
                outcome = ?report.outcome,
                accepted = report.accepted,
                "ASM1 reactor integration did not reach the end of the timestep."
            );
            warnings.push(StepWarning::Instability(report.outcome));
        }

        let fixed_oxygen = self.fixed_oxygen();
        let cfg = &self.config;
        if fixed_oxygen {
            self.state[Asm1::So] = cfg.kla.abs();
        }
        self.state[Asm1::Tss] = self.state.particulate_tss(&cfg.params.tss_factors);
        self.state[Asm1::Q] = inflow.flow();
        if !cfg.temperature_model {
            self.state[Asm1::Temp] = inflow.temperature();
        }
        if !cfg.activate_dummies {
            for c in Asm1::DUMMIES {
                self.state[c] = 0.0;
            }
        }

        Ok(StepOutput {
            outputs: vec![self.state],
            warnings,
        })
    }

    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        match control {
            UnitControl::Kla(kla) if kla.is_finite() && self.config.oxygen_control.is_none() => {
                self.config.kla = *kla;
                if *kla < 0.0 {
                    self.state[Asm1::So] = kla.abs();
                }
                Ok(())
            }
            UnitControl::DoSetpoint(setpoint) if setpoint.is_finite() && *setpoint >= 0.0 => {
                match self.config.oxygen_control.as_mut() {
                    Some(ctl) => {
                        ctl.setpoint = *setpoint;
                        Ok(())
                    }
                    None => Err(Error::invalid_parameter(format!(
                        "ASM1Reactor does not accept {control:?}."
                    ))),
                }
            }
            UnitControl::CarbonDose(dose) if dose.is_finite() && *dose >= 0.0 => {
                self.config.carbon_dose = *dose;
                Ok(())
            }
            _ => Err(Error::invalid_parameter(format!(
                "ASM1Reactor does not accept {control:?}."
            ))),
        }
    }

    /// The reactor content, followed by the controller's integral term when
    /// the reactor has oxygen control.
    fn state(&self) -> Vec<f64> {
        let mut state = self.state.values().to_vec();
        if let Some(integral) = self.controller_integral() {
            state.push(integral);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn influent() -> Stream {
        Stream::new([
            30.0, 69.5, 51.2, 202.32, 28.17, 0.0, 0.0, 0.0, 0.0, 31.56, 6.95, 10.59, 7.0,
            211.2675, 18446.0, 15.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ])
    }

    #[test]
    fn test_oxygen_saturation() {
        assert!((oxygen_saturation(15.0) - 8.0).abs() < 1e-6);
        assert!(oxygen_saturation(20.0) < oxygen_saturation(15.0));
    }

    #[test]
    fn test_temperature_correction() {
        assert_eq!(temperature_corrected(4.0, 3.0, 15.0), 4.0);
        assert!((temperature_corrected(4.0, 3.0, 10.0) - 3.0).abs() < 1e-12);
        assert!(temperature_corrected(4.0, 3.0, 20.0) > 4.0);
    }

    #[test]
    fn test_anoxic_reactor() -> Result<(), Error> {
        let mut config = Asm1ReactorConfig::new(1000.0, 0.0);
        config.initial_state[Asm1::So] = 0.0;
        config.initial_state[Asm1::Sno] = 0.0;
        config.initial_state[Asm1::Ss] = 100.0;
        let mut reactor = Asm1Reactor::new(config)?;

        let dt = 15.0 / 1440.0;
        let mut xbh = reactor.content()[Asm1::Xbh];
        let mut ss = reactor.content()[Asm1::Ss];
        for _ in 0..(20 * 96) {
            let out = reactor.step(&[influent()], dt)?;
            assert!(out.warnings.is_empty());
            let out = out.outputs[0];

            assert!(out[Asm1::Xbh] >= xbh - 1e-9);
            assert!(out[Asm1::Ss] <= ss + 1e-9);
            assert!(out[Asm1::Xbh] <= influent()[Asm1::Xbh]);
            assert!(Asm1::STATES.iter().all(|c| out[*c] >= -1e-9));
            xbh = out[Asm1::Xbh];
            ss = out[Asm1::Ss];
        }

        // Washout toward the inflow, less decay.
        let dilution = 18446.0 / 1000.0;
        let expected_xbh = 28.17 * dilution / (dilution + 0.3);
        assert!((xbh - expected_xbh).abs() / expected_xbh < 1e-3);
        assert!(ss < 100.0 && (ss - 69.5).abs() < 1.0);

        let out = reactor.content();
        assert_eq!(out.flow(), 18446.0);
        assert_eq!(out.temperature(), 15.0);
        let tss = 0.75
            * (out[Asm1::Xi] + out[Asm1::Xs] + out[Asm1::Xbh] + out[Asm1::Xba] + out[Asm1::Xp]);
        assert!((out[Asm1::Tss] - tss).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_aerated_reactor() -> Result<(), Error> {
        // Without biomass, the dissolved oxygen settles where aeration
        // balances washout.
        let mut clean_water = Stream::zeros();
        clean_water[Asm1::Si] = 30.0;
        clean_water[Asm1::Temp] = 15.0;
        let clean_water = clean_water.with_flow(18446.0);
        let mut config = Asm1ReactorConfig::new(1333.0, 240.0);
        config.initial_state = Stream::zeros();
        config.initial_state[Asm1::Temp] = 15.0;
        let mut reactor = Asm1Reactor::new(config)?;
        for _ in 0..100 {
            reactor.step(&[clean_water], 0.01)?;
        }
        let dilution = 18446.0 / 1333.0;
        let expected = 240.0 * oxygen_saturation(15.0) / (240.0 + dilution);
        assert!((reactor.content()[Asm1::So] - expected).abs() < 1e-4);
        assert!((reactor.content()[Asm1::Si] - 30.0).abs() < 1e-6);

        // Respiration pulls it below that balance.
        let mut reactor = Asm1Reactor::new(Asm1ReactorConfig::new(1333.0, 240.0))?;
        for _ in 0..200 {
            reactor.step(&[influent()], 0.01)?;
        }
        let out = reactor.content();
        assert!(out[Asm1::So] > 0.0 && out[Asm1::So] < expected);
        assert!(out[Asm1::Ss] < influent()[Asm1::Ss]);
        assert!(out.is_finite());

        Ok(())
    }

    fn controlled(control: OxygenControl) -> Result<Asm1Reactor, Error> {
        Asm1Reactor::new(Asm1ReactorConfig {
            oxygen_control: Some(control),
            ..Asm1ReactorConfig::new(1333.0, 0.0)
        })
    }

    #[test]
    fn test_oxygen_control() -> Result<(), Error> {
        let mut reactor = controlled(OxygenControl::default())?;
        for _ in 0..100 {
            let out = reactor.step(&[influent()], 0.01)?;
            assert!(out.warnings.is_empty());
        }
        assert!((reactor.content()[Asm1::So] - 2.0).abs() < 0.02);
        let kla_at_two = reactor.kla();
        assert!(kla_at_two > 0.0 && kla_at_two < 360.0);
        assert_eq!(reactor.state().len(), STREAM_LEN + 1);

        reactor.apply_control(&UnitControl::DoSetpoint(1.0))?;
        for _ in 0..100 {
            reactor.step(&[influent()], 0.01)?;
        }
        assert!((reactor.content()[Asm1::So] - 1.0).abs() < 0.02);
        assert!(reactor.kla() < kla_at_two);

        Ok(())
    }

    #[test]
    fn test_oxygen_control_saturation() -> Result<(), Error> {
        // Out of reach even at full aeration.
        let unreachable = OxygenControl {
            setpoint: 7.9,
            ..Default::default()
        };
        let mut tracked = controlled(unreachable.clone())?;
        let mut wound_up = controlled(OxygenControl {
            anti_windup: false,
            ..unreachable
        })?;
        for _ in 0..100 {
            tracked.step(&[influent()], 0.01)?;
            wound_up.step(&[influent()], 0.01)?;
        }

        assert_eq!(tracked.kla(), 360.0);
        assert_eq!(wound_up.kla(), 360.0);
        assert!(tracked.content()[Asm1::So] < 7.9);
        let (Some(tracked_integral), Some(wound_up_integral)) =
            (tracked.controller_integral(), wound_up.controller_integral())
        else {
            panic!("both reactors have a controller");
        };
        assert!(tracked_integral < 360.0);
        assert!(wound_up_integral > 1000.0);

        // The tracked controller leaves saturation as soon as the setpoint
        // is back in reach.
        tracked.apply_control(&UnitControl::DoSetpoint(2.0))?;
        tracked.step(&[influent()], 0.01)?;
        assert!(tracked.kla() < 360.0);

        Ok(())
    }

    #[test]
    fn test_fixed_oxygen() -> Result<(), Error> {
        let mut reactor = Asm1Reactor::new(Asm1ReactorConfig::new(1000.0, -2.0))?;
        for _ in 0..10 {
            let out = reactor.step(&[influent()], 0.01)?.outputs[0];
            assert_eq!(out[Asm1::So], 2.0);
        }

        reactor.apply_control(&UnitControl::Kla(-1.5))?;
        let out = reactor.step(&[influent()], 0.01)?.outputs[0];
        assert_eq!(out[Asm1::So], 1.5);

        Ok(())
    }

    #[test]
    fn test_carbon_addition() {
        let inflow = influent();
        let dosed = add_carbon(&inflow, 2.0, 400_000.0);

        assert_eq!(dosed.flow(), 18448.0);
        assert_eq!(dosed.temperature(), 15.0);
        let ss_mass = inflow[Asm1::Ss] * inflow.flow() + 2.0 * 400_000.0;
        assert!((dosed[Asm1::Ss] * dosed.flow() - ss_mass).abs() < 1e-6);
        for c in [Asm1::Si, Asm1::Xi, Asm1::Snh, Asm1::Tss] {
            assert!((dosed[c] * dosed.flow() - inflow[c] * inflow.flow()).abs() < 1e-6);
        }

        assert_eq!(add_carbon(&inflow, 0.0, 400_000.0), inflow);
    }

    #[test]
    fn test_invalid_configuration() -> Result<(), Error> {
        assert!(Asm1Reactor::new(Asm1ReactorConfig::new(0.0, 10.0)).is_err_and(
            |e| e == Error::invalid_parameter("Reactor volume must be positive, got 0.")
        ));

        let mut reactor = Asm1Reactor::new(Asm1ReactorConfig::new(1000.0, 10.0))?;
        assert!(reactor.step(&[influent()], -1.0).is_err_and(|e| e
            == Error::invalid_parameter("ASM1Reactor requires a positive timestep, got -1.")));
        assert!(reactor
            .apply_control(&UnitControl::ReturnFlow(1.0))
            .is_err_and(|e| e
                == Error::invalid_parameter("ASM1Reactor does not accept ReturnFlow(1.0).")));
        assert!(reactor
            .apply_control(&UnitControl::DoSetpoint(2.0))
            .is_err_and(|e| e
                == Error::invalid_parameter("ASM1Reactor does not accept DoSetpoint(2.0).")));

        let mut reactor = controlled(OxygenControl::default())?;
        assert!(reactor
            .apply_control(&UnitControl::Kla(100.0))
            .is_err_and(|e| e
                == Error::invalid_parameter("ASM1Reactor does not accept Kla(100.0).")));
        assert!(controlled(OxygenControl {
            kla_max: -1.0,
            ..Default::default()
        })
        .is_err_and(|e| e
            == Error::invalid_parameter(
                "KLa limits must satisfy 0 <= min <= max, got [0, -1]."
            )));

        Ok(())
    }
}
