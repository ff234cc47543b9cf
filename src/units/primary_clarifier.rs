// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A primary clarifier after Otterpohl and Freund: a completely mixed tank
//! whose particulate removal efficiency follows from the hydraulic retention
//! time.

use ode_solvers::System;

use crate::integration::{self, IntegratorOptions, State};
use crate::process_unit::{ProcessUnit, StepOutput, StepWarning};
use crate::stream::{ensure_inputs, ensure_timestep};
use crate::{Asm1, Error, Stream, UnitCategory};

/// Configuration of a [`PrimaryClarifier`].
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryClarifierConfig {
    /// Volume, m³.
    pub volume: f64,
    /// Correction factor applied to the COD removal efficiency.
    pub efficiency_correction: f64,
    /// Ratio of particulate to total COD.
    pub particulate_cod_ratio: f64,
    /// Time constant of the flow smoothing used for the retention time, d.
    pub smoothing_time: f64,
    /// Primary sludge flow as a share of the inflow.
    pub sludge_fraction: f64,
    /// Integrate the tank temperature instead of passing the influent
    /// temperature through.
    pub temperature_model: bool,
    pub activate_dummies: bool,
    /// Tank content at time zero.  The flow slot holds the smoothed flow.
    pub initial_state: Stream,
    /// Factors converting XI, XS, XBH, XBA and XP to TSS.
    pub tss_factors: [f64; 5],
    pub integrator: IntegratorOptions,
}

impl Default for PrimaryClarifierConfig {
    fn default() -> Self {
        let mut initial_state = Stream::zeros();
        initial_state[Asm1::Si] = 28.0670;
        initial_state[Asm1::Ss] = 59.0473;
        initial_state[Asm1::Xi] = 94.3557;
        initial_state[Asm1::Xs] = 356.8434;
        initial_state[Asm1::Xbh] = 50.8946;
        initial_state[Asm1::Xba] = 0.0946;
        initial_state[Asm1::Xp] = 0.6531;
        initial_state[Asm1::So] = 0.0175;
        initial_state[Asm1::Sno] = 0.1174;
        initial_state[Asm1::Snh] = 34.9215;
        initial_state[Asm1::Snd] = 5.5457;
        initial_state[Asm1::Xnd] = 15.8132;
        initial_state[Asm1::Salk] = 7.6965;
        initial_state[Asm1::Tss] = 377.1311;
        initial_state[Asm1::Q] = 21086.0;
        initial_state[Asm1::Temp] = 14.8581;

        Self {
            volume: 900.0,
            efficiency_correction: 0.65,
            particulate_cod_ratio: 0.85,
            smoothing_time: 0.125,
            sludge_fraction: 0.007,
            temperature_model: false,
            activate_dummies: false,
            initial_state,
            tss_factors: [0.75; 5],
            integrator: IntegratorOptions::default(),
        }
    }
}

/// Mixing of the tank content, with the smoothed flow in the flow slot.
struct PrimaryClarifierRhs<'a> {
    inflow: &'a Stream,
    volume: f64,
    smoothing_time: f64,
    temperature_model: bool,
    activate_dummies: bool,
}

impl System<f64, State> for PrimaryClarifierRhs<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        dy.fill(0.0);
        let dilution = self.inflow.flow() / self.volume;
        let mut mix = |c: Asm1| dy[c.index()] = dilution * (self.inflow[c] - y[c.index()]);
        for c in Asm1::STATES {
            mix(c);
        }
        if self.temperature_model {
            mix(Asm1::Temp);
        }
        if self.activate_dummies {
            for c in Asm1::DUMMIES {
                mix(c);
            }
        }
        let q = Asm1::Q.index();
        dy[q] = (self.inflow.flow() - y[q]) / self.smoothing_time;
    }
}

/// A primary clarifier.
///
/// Output ports: 0 is the clarified overflow, 1 the primary sludge.
#[derive(Clone, Debug)]
pub struct PrimaryClarifier {
    config: PrimaryClarifierConfig,
    state: Stream,
    removal_percent: f64,
    step_hint: f64,
}

impl PrimaryClarifier {
    pub fn new(config: PrimaryClarifierConfig) -> Result<Self, Error> {
        for (name, value) in [
            ("Primary clarifier volume", config.volume),
            ("Flow smoothing time", config.smoothing_time),
            ("Particulate COD ratio", config.particulate_cod_ratio),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_parameter(format!(
                    "{name} must be positive, got {value}."
                )));
            }
        }
        if !(config.sludge_fraction > 0.0 && config.sludge_fraction < 1.0) {
            return Err(Error::invalid_parameter(format!(
                "Primary sludge fraction must be in (0, 1), got {}.",
                config.sludge_fraction
            )));
        }
        if !config.initial_state.is_finite() {
            return Err(Error::invalid_stream(
                "Primary clarifier initial state must be finite.",
            ));
        }

        Ok(Self {
            state: config.initial_state,
            removal_percent: 0.0,
            step_hint: config.integrator.initial_step,
            config,
        })
    }

    pub fn config(&self) -> &PrimaryClarifierConfig {
        &self.config
    }

    /// Returns the tank content.  The flow is the smoothed inflow.
    pub fn content(&self) -> &Stream {
        &self.state
    }

    /// Returns the share of the settleable components removed with the
    /// sludge in the last step, in percent.
    pub fn removal_percent(&self) -> f64 {
        self.removal_percent
    }

    /// Removal efficiency of the settleable components at the given smoothed
    /// flow, in percent.
    fn removal_efficiency(&self, smoothed_flow: f64) -> f64 {
        let cfg = &self.config;
        let retention_minutes = cfg.volume / (smoothed_flow + 0.001) * 24.0 * 60.0;
        let cod_removal = cfg.efficiency_correction
            * (2.88 * cfg.particulate_cod_ratio - 0.118)
            * (1.45 + 6.15 * retention_minutes.ln());
        (cod_removal / cfg.particulate_cod_ratio).clamp(0.0, 100.0)
    }

    /// Advances the clarifier by `dt` days and returns overflow and sludge.
    pub fn clarify(
        &mut self,
        inflow: &Stream,
        dt: f64,
    ) -> Result<(Stream, Stream, Vec<StepWarning>), Error> {
        ensure_inputs("PrimaryClarifier", std::slice::from_ref(inflow), 1)?;
        ensure_timestep("PrimaryClarifier", dt)?;

        let cfg = &self.config;
        if !cfg.temperature_model {
            self.state[Asm1::Temp] = inflow.temperature();
        }
        let rhs = PrimaryClarifierRhs {
            inflow,
            volume: cfg.volume,
            smoothing_time: cfg.smoothing_time,
            temperature_model: cfg.temperature_model,
            activate_dummies: cfg.activate_dummies,
        };
        let report = integration::integrate(
            &rhs,
            self.state.values_mut(),
            dt,
            &mut self.step_hint,
            &cfg.integrator,
        );

        let mut warnings = Vec::new();
        if !report.is_complete() {
            tracing::warn!(
                outcome = ?report.outcome,
                "Primary clarifier integration did not reach the end of the timestep."
            );
            warnings.push(StepWarning::Instability(report.outcome));
        }
        if !cfg.activate_dummies {
            for c in Asm1::DUMMIES {
                self.state[c] = 0.0;
            }
        }

        let q_in = inflow.flow().max(0.0);
        if q_in <= 0.0 {
            return Ok((Stream::zeros(), Stream::zeros(), warnings));
        }

        self.removal_percent = self.removal_efficiency(self.state.flow());
        let cfg = &self.config;
        let q_sludge = cfg.sludge_fraction * q_in;
        let thickening = q_in / q_sludge;

        let mut overflow = Stream::zeros();
        let mut sludge = Stream::zeros();
        for c in Asm1::STATES.into_iter().chain(Asm1::DUMMIES) {
            let remaining = if Asm1::PARTICULATES.contains(&c) {
                1.0 - self.removal_percent / 100.0
            } else {
                1.0
            };
            let content = self.state[c].max(0.0);
            overflow[c] = remaining * content;
            sludge[c] = ((1.0 - remaining) * thickening + remaining) * content;
        }
        overflow[Asm1::Tss] = overflow.particulate_tss(&cfg.tss_factors);
        sludge[Asm1::Tss] = sludge.particulate_tss(&cfg.tss_factors);
        overflow[Asm1::Temp] = self.state.temperature();
        sludge[Asm1::Temp] = self.state.temperature();

        Ok((
            overflow.with_flow(q_in - q_sludge),
            sludge.with_flow(q_sludge),
            warnings,
        ))
    }
}

impl ProcessUnit for PrimaryClarifier {
    fn category(&self) -> UnitCategory {
        UnitCategory::PrimaryClarifier
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        2
    }

    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("PrimaryClarifier", inputs, 1)?;
        let (overflow, sludge, warnings) = self.clarify(&inputs[0], dt)?;
        Ok(StepOutput {
            outputs: vec![overflow, sludge],
            warnings,
        })
    }

    fn state(&self) -> Vec<f64> {
        self.state.values().to_vec()
    }
}
