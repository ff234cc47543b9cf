// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A completely mixed sludge storage tank of variable volume, without
//! reactions.

use super::combiner::Combiner;
use ode_solvers::System;

use crate::integration::{self, IntegratorOptions, State};
use crate::process_unit::{ProcessUnit, StepOutput, StepWarning, UnitControl};
use crate::stream::{ensure_inputs, ensure_timestep, STREAM_LEN};
use crate::{Asm1, Error, Stream, UnitCategory};

/// Configuration of a [`Storage`] tank.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageConfig {
    /// Total volume, m³.
    pub volume: f64,
    /// Initial liquid volume, m³.
    pub initial_volume: f64,
    /// Initial tank content.  Flow is ignored.
    pub initial_content: Stream,
    /// Requested outflow, m³/d.
    pub outflow: f64,
    /// Mix the temperature of the inflow into the tank content.
    pub temperature_model: bool,
    pub activate_dummies: bool,
    pub integrator: IntegratorOptions,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let mut initial_content = Stream::zeros();
        initial_content[Asm1::Si] = 140.1528;
        initial_content[Asm1::Ss] = 260.0720;
        initial_content[Asm1::Xi] = 363.7842;
        initial_content[Asm1::Xs] = 57.1637;
        initial_content[Asm1::Xp] = 13.7743;
        initial_content[Asm1::Snh] = 1568.5;
        initial_content[Asm1::Snd] = 0.4786;
        initial_content[Asm1::Xnd] = 2.2039;
        initial_content[Asm1::Salk] = 106.8816;
        initial_content[Asm1::Tss] = 326.0416;
        initial_content[Asm1::Temp] = 14.8581;

        Self {
            volume: 160.0,
            initial_volume: 80.0,
            initial_content,
            outflow: 0.0,
            temperature_model: false,
            activate_dummies: false,
            integrator: IntegratorOptions::default(),
        }
    }
}

/// Index of the liquid volume in the integrated state, after the stream
/// components.
const VOLUME: usize = STREAM_LEN;

/// Volume and mixing balance of the tank content, for a state holding the
/// stream components followed by the liquid volume.
struct StorageRhs<'a> {
    inflow: &'a Stream,
    q_in: f64,
    q_out: f64,
    temperature_model: bool,
    activate_dummies: bool,
}

impl System<f64, State> for StorageRhs<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        dy.fill(0.0);
        dy[VOLUME] = self.q_in - self.q_out;
        if y[VOLUME] <= 0.0 {
            return;
        }
        let exchange = self.q_in / y[VOLUME];
        let inflow = self.inflow.values();
        let mut mix = |i: usize| dy[i] = exchange * (inflow[i] - y[i]);
        for i in 0..=Asm1::Tss as usize {
            mix(i);
        }
        if self.temperature_model {
            mix(Asm1::Temp as usize);
        }
        if self.activate_dummies {
            for c in Asm1::DUMMIES {
                mix(c as usize);
            }
        }
    }
}

/// A sludge storage tank.
///
/// Above 90 % of its volume, the inflow bypasses the tank unless the
/// requested outflow can take it.  Below 10 %, the outflow stops.  The bypass
/// is mixed into the single output stream.
#[derive(Clone, Debug)]
pub struct Storage {
    config: StorageConfig,
    state: [f64; STREAM_LEN + 1],
    step_hint: f64,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Result<Self, Error> {
        if !(config.volume.is_finite() && config.volume > 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Storage volume must be positive, got {}.",
                config.volume
            )));
        }
        if !(0.0..=config.volume).contains(&config.initial_volume) {
            return Err(Error::invalid_parameter(format!(
                "Initial storage volume must be between 0 and {}, got {}.",
                config.volume, config.initial_volume
            )));
        }
        Self::check_outflow(config.outflow)?;

        let mut state = [0.0; STREAM_LEN + 1];
        state[..STREAM_LEN].copy_from_slice(config.initial_content.values());
        state[Asm1::Q as usize] = 0.0;
        state[VOLUME] = config.initial_volume;
        Ok(Self {
            step_hint: config.integrator.initial_step,
            config,
            state,
        })
    }

    fn check_outflow(outflow: f64) -> Result<(), Error> {
        if !(outflow.is_finite() && outflow >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Storage outflow must be non-negative, got {outflow}."
            )));
        }
        Ok(())
    }

    /// Returns the current liquid volume, m³.
    pub fn liquid_volume(&self) -> f64 {
        self.state[VOLUME]
    }

    /// Returns the flows into the tank, out of the tank and around it.
    fn route(&self, inflow: f64) -> (f64, f64, f64) {
        let volume = self.state[VOLUME];
        let full = 0.9 * self.config.volume;
        let empty = 0.1 * self.config.volume;
        let requested = self.config.outflow;

        if volume <= empty {
            (inflow, 0.0, 0.0)
        } else if volume >= full && inflow > requested {
            (0.0, 0.0, inflow)
        } else {
            (inflow, requested, 0.0)
        }
    }
}

impl ProcessUnit for Storage {
    fn category(&self) -> UnitCategory {
        UnitCategory::Storage
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Storage", inputs, 1)?;
        ensure_timestep("Storage", dt)?;
        let inflow = &inputs[0];
        let (q_in, q_out, q_bypass) = self.route(inflow.flow().max(0.0));

        let temperature_model = self.config.temperature_model;
        let activate_dummies = self.config.activate_dummies;
        let rhs = StorageRhs {
            inflow,
            q_in,
            q_out,
            temperature_model,
            activate_dummies,
        };
        let mut state = self.state;
        let report = integration::integrate(
            &rhs,
            &mut state,
            dt,
            &mut self.step_hint,
            &self.config.integrator,
        );

        let mut warnings = Vec::new();
        if !report.is_complete() {
            tracing::warn!(
                outcome = ?report.outcome,
                "Storage integration did not reach the end of the timestep."
            );
            warnings.push(StepWarning::Instability(report.outcome));
        }
        state[VOLUME] = state[VOLUME].clamp(0.0, self.config.volume);
        self.state = state;

        let mut stored = Stream::zeros();
        stored
            .values_mut()
            .copy_from_slice(&self.state[..STREAM_LEN]);
        stored[Asm1::Q] = q_out;
        if !temperature_model {
            stored[Asm1::Temp] = inflow.temperature();
        }
        if !activate_dummies {
            for c in Asm1::DUMMIES {
                stored[c] = 0.0;
            }
        }
        let bypass = inflow.with_flow(q_bypass);

        Ok(StepOutput {
            outputs: vec![Combiner::combine(&[stored, bypass])],
            warnings,
        })
    }

    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        match control {
            UnitControl::StorageOutflow(outflow) => {
                Self::check_outflow(*outflow)?;
                self.config.outflow = *outflow;
                Ok(())
            }
            _ => Err(Error::invalid_parameter(format!(
                "Storage does not accept {control:?}."
            ))),
        }
    }

    /// The tank content followed by the liquid volume.
    fn state(&self) -> Vec<f64> {
        self.state.to_vec()
    }
}
