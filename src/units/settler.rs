// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A one-dimensional, layered secondary clarifier with the double-exponential
//! settling velocity function and the flux limiter of Takács et al. (1991).

use ode_solvers::System;

use crate::integration::{self, IntegratorOptions, State};
use crate::process_unit::{ProcessUnit, StepOutput, StepWarning, UnitControl};
use crate::stream::{ensure_inputs, ensure_timestep};
use crate::{Asm1, Error, Stream, UnitCategory};

/// Settling parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlerParams {
    /// Maximum practical settling velocity, m/d.
    pub v0_max: f64,
    /// Maximum Vesilind settling velocity, m/d.
    pub v0: f64,
    /// Hindered zone settling parameter, m³/g.
    pub r_h: f64,
    /// Flocculant zone settling parameter, m³/g.
    pub r_p: f64,
    /// Non-settleable fraction of the influent solids.
    pub f_ns: f64,
    /// Threshold concentration above which clarification layers are flux
    /// limited, g/m³.
    pub x_t: f64,
    /// Concentration that marks the top of the sludge blanket, g/m³.
    pub sludge_blanket_threshold: f64,
}

impl Default for SettlerParams {
    fn default() -> Self {
        Self {
            v0_max: 250.0,
            v0: 474.0,
            r_h: 0.000576,
            r_p: 0.00286,
            f_ns: 0.00228,
            x_t: 3000.0,
            sludge_blanket_threshold: 3000.0,
        }
    }
}

/// How dissolved components travel through the settler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolubleTransport {
    /// Dissolved components leave with the concentrations they entered with.
    #[default]
    PassThrough,
    /// Dissolved components are carried by the bulk flow through every layer,
    /// as in the IWA/COST benchmark settler.
    Layered,
}

/// Configuration of a [`Settler`].
#[derive(Clone, Debug, PartialEq)]
pub struct SettlerConfig {
    /// Surface area, m².
    pub area: f64,
    /// Total height, m.
    pub height: f64,
    /// Number of layers.
    pub layers: usize,
    /// Layer that receives the feed, counted from the bottom starting at 1.
    pub feed_layer: usize,
    /// Return sludge flow, m³/d.
    pub return_flow: f64,
    /// Waste sludge flow, m³/d.
    pub waste_flow: f64,
    pub transport: SolubleTransport,
    /// Integrate the temperature through the layers.  Only used with
    /// [`SolubleTransport::Layered`].
    pub temperature_model: bool,
    /// Initial TSS of every layer, bottom layer first, g/m³.
    pub initial_tss: Vec<f64>,
    /// Initial dissolved components and temperature, used in every layer.
    pub initial_solubles: Stream,
    pub params: SettlerParams,
    pub integrator: IntegratorOptions,
}

impl Default for SettlerConfig {
    fn default() -> Self {
        let mut initial_solubles = Stream::zeros();
        initial_solubles[Asm1::Si] = 28.0643;
        initial_solubles[Asm1::Ss] = 0.6734;
        initial_solubles[Asm1::So] = 1.3748;
        initial_solubles[Asm1::Sno] = 9.1948;
        initial_solubles[Asm1::Snh] = 0.1585;
        initial_solubles[Asm1::Snd] = 0.5594;
        initial_solubles[Asm1::Salk] = 4.5646;
        initial_solubles[Asm1::Temp] = 14.8581;

        Self {
            area: 1500.0,
            height: 4.0,
            layers: 10,
            feed_layer: 6,
            return_flow: 18446.0,
            waste_flow: 385.0,
            transport: SolubleTransport::default(),
            temperature_model: false,
            initial_tss: vec![
                7348.3, 3710.6, 423.2035, 423.2035, 423.2035, 423.2035, 81.0276, 34.2948,
                20.8756, 14.3255,
            ],
            initial_solubles,
            params: SettlerParams::default(),
            integrator: IntegratorOptions::default(),
        }
    }
}

/// Components that are resolved per layer, in the order of the state
/// blocks.
const LAYERED: [Asm1; 12] = [
    Asm1::Si,
    Asm1::Ss,
    Asm1::So,
    Asm1::Sno,
    Asm1::Snh,
    Asm1::Snd,
    Asm1::Salk,
    Asm1::Tss,
    Asm1::Temp,
    Asm1::Sd1,
    Asm1::Sd2,
    Asm1::Sd3,
];
const TSS_BLOCK: usize = 7;
const TEMP_BLOCK: usize = 8;

/// Negative layer concentrations are replaced by this value before
/// computing fluxes.
const CLAMP: f64 = 1e-5;

/// Everything a settler produces in one step.
#[derive(Clone, Debug, PartialEq)]
pub struct SettlerOutput {
    pub effluent: Stream,
    pub return_sludge: Stream,
    pub waste_sludge: Stream,
    /// Layer TSS, bottom layer first.
    pub layer_tss: Vec<f64>,
    /// Height of the sludge blanket above the bottom, m.
    pub sludge_blanket_height: f64,
    pub warnings: Vec<StepWarning>,
}

/// Bulk velocities through the settler.
struct Velocities {
    feed: f64,
    up: f64,
    down: f64,
}

struct SettlerRhs<'a> {
    params: &'a SettlerParams,
    inflow: &'a Stream,
    layers: usize,
    /// Feed layer index, counted from the top starting at 0.
    feed: usize,
    layer_height: f64,
    velocities: Velocities,
    layered_solubles: bool,
    temperature_model: bool,
}

impl SettlerRhs<'_> {
    /// Computes the derivatives of the state, which holds one block of
    /// `layers` values per entry of [`LAYERED`], top layer first.
    fn derivatives(&self, y: &[f64], dy: &mut [f64]) {
        let n = self.layers;
        let p = self.params;
        let x = |i: usize| if y[i] < 0.0 { CLAMP } else { y[i] };

        dy.fill(0.0);

        // Gravitational flux leaving each layer, before limiting.
        let tss = TSS_BLOCK * n;
        let floor = p.f_ns * self.inflow[Asm1::Tss];
        let settling: Vec<f64> = (0..n)
            .map(|i| {
                let conc = x(tss + i);
                let vs = p.v0 * ((-p.r_h * (conc - floor)).exp() - (-p.r_p * (conc - floor)).exp());
                vs.clamp(0.0, p.v0_max) * conc
            })
            .collect();

        // `flux[i]` is the limited flux from layer `i - 1` into layer `i`;
        // nothing settles into the top layer or out of the bottom one.
        let mut flux = vec![0.0; n + 1];
        for i in 0..n - 1 {
            flux[i + 1] = if i < self.feed && x(tss + i + 1) <= p.x_t {
                settling[i]
            } else {
                settling[i].min(settling[i + 1])
            };
        }

        let v = &self.velocities;
        let h = self.layer_height;
        let mut transport = |block: usize, inflow: f64, with_flux: bool| {
            let base = block * n;
            for i in 0..n {
                let c = x(base + i);
                let bulk = if i < self.feed {
                    v.up * (x(base + i + 1) - c)
                } else if i == self.feed {
                    v.feed * inflow - (v.up + v.down) * c
                } else {
                    v.down * (x(base + i - 1) - c)
                };
                let settled = if with_flux { flux[i] - flux[i + 1] } else { 0.0 };
                dy[base + i] = (bulk + settled) / h;
            }
        };

        transport(TSS_BLOCK, self.inflow[Asm1::Tss], true);
        if self.layered_solubles {
            for (block, component) in LAYERED.iter().enumerate() {
                if block == TSS_BLOCK || (block == TEMP_BLOCK && !self.temperature_model) {
                    continue;
                }
                transport(block, self.inflow[*component], false);
            }
        }
    }
}

impl System<f64, State> for SettlerRhs<'_> {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        self.derivatives(y.as_slice(), dy.as_mut_slice())
    }
}

/// A layered secondary clarifier.
///
/// Output ports: 0 is the effluent (top layer), 1 the return sludge and 2 the
/// waste sludge (both from the bottom layer).
#[derive(Clone, Debug)]
pub struct Settler {
    config: SettlerConfig,
    /// One block of `layers` values per entry of [`LAYERED`], top layer
    /// first.
    state: Vec<f64>,
    step_hint: f64,
}

impl Settler {
    /// Creates a settler from the given configuration.
    pub fn new(config: SettlerConfig) -> Result<Self, Error> {
        for (name, value) in [("area", config.area), ("height", config.height)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_parameter(format!(
                    "Settler {name} must be positive, got {value}."
                )));
            }
        }
        if config.layers < 2 {
            return Err(Error::invalid_parameter(format!(
                "A settler needs at least 2 layers, got {}.",
                config.layers
            )));
        }
        if config.feed_layer == 0 || config.feed_layer > config.layers {
            return Err(Error::invalid_parameter(format!(
                "Feed layer must be between 1 and {}, got {}.",
                config.layers, config.feed_layer
            )));
        }
        Self::check_flow("Return", config.return_flow)?;
        Self::check_flow("Waste", config.waste_flow)?;
        if config.initial_tss.len() != config.layers {
            return Err(Error::invalid_parameter(format!(
                "Expected {} initial layer concentrations, got {}.",
                config.layers,
                config.initial_tss.len()
            )));
        }

        let n = config.layers;
        let mut state = vec![0.0; LAYERED.len() * n];
        for (block, component) in LAYERED.iter().enumerate() {
            for i in 0..n {
                state[block * n + i] = if block == TSS_BLOCK {
                    config.initial_tss[n - 1 - i]
                } else {
                    config.initial_solubles[*component]
                };
            }
        }

        Ok(Self {
            step_hint: config.integrator.initial_step,
            config,
            state,
        })
    }

    fn check_flow(name: &str, flow: f64) -> Result<(), Error> {
        if !(flow.is_finite() && flow >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "{name} flow must be non-negative, got {flow}."
            )));
        }
        Ok(())
    }

    /// Returns the configuration of the settler, including current controls.
    pub fn config(&self) -> &SettlerConfig {
        &self.config
    }

    /// Returns the TSS of every layer, bottom layer first.
    pub fn layer_tss(&self) -> Vec<f64> {
        let n = self.config.layers;
        self.state[TSS_BLOCK * n..(TSS_BLOCK + 1) * n]
            .iter()
            .rev()
            .copied()
            .collect()
    }

    /// Returns the height of the sludge blanket above the settler floor.
    ///
    /// The blanket top lies in the deepest layer whose TSS is below the
    /// threshold, interpolated from the neighbouring layers.
    pub fn sludge_blanket_height(&self) -> f64 {
        let n = self.config.layers;
        let h = self.config.height / n as f64;
        let threshold = self.config.params.sludge_blanket_threshold;
        // top layer first
        let tss = &self.state[TSS_BLOCK * n..(TSS_BLOCK + 1) * n];

        let Some(clear) = tss.iter().rposition(|x| *x < threshold) else {
            return h * n as f64;
        };
        let sludge_layers = n - 1 - clear;
        let ratio = |num: f64, den: f64| if den != 0.0 { num / den } else { 0.0 };

        if sludge_layers == n - 1 {
            sludge_layers as f64 * h + h * ratio(tss[0], tss[1])
        } else if sludge_layers == 0 {
            h * ratio(tss[n - 1] + tss[n - 2], threshold - tss[n - 2])
        } else {
            sludge_layers as f64 * h
                + h * ratio(tss[clear] + tss[clear - 1], tss[clear + 1] - tss[clear - 1])
        }
    }

    /// Advances the settler by `dt` days.
    pub fn settle(&mut self, inflow: &Stream, dt: f64) -> Result<SettlerOutput, Error> {
        ensure_inputs("Settler", std::slice::from_ref(inflow), 1)?;
        ensure_timestep("Settler", dt)?;

        let cfg = &self.config;
        let n = cfg.layers;
        let mut warnings = Vec::new();

        let q_in = inflow.flow().max(0.0);
        let (mut q_r, mut q_w) = (cfg.return_flow, cfg.waste_flow);
        let requested = q_r + q_w;
        if requested > q_in {
            tracing::warn!(
                requested,
                available = q_in,
                "Settler underflow exceeds the inflow, scaling it down."
            );
            let scale = if requested > 0.0 { q_in / requested } else { 0.0 };
            q_r *= scale;
            q_w *= scale;
            warnings.push(StepWarning::UnderflowClamped {
                requested,
                available: q_in,
            });
        }
        let q_u = q_r + q_w;
        let q_e = if requested > q_in { 0.0 } else { q_in - q_u };

        let layered_solubles = cfg.transport == SolubleTransport::Layered;
        let rhs = SettlerRhs {
            params: &cfg.params,
            inflow,
            layers: n,
            feed: n - cfg.feed_layer,
            layer_height: cfg.height / n as f64,
            velocities: Velocities {
                feed: q_in / cfg.area,
                up: q_e / cfg.area,
                down: q_u / cfg.area,
            },
            layered_solubles,
            temperature_model: cfg.temperature_model,
        };

        let report = integration::integrate(
            &rhs,
            &mut self.state,
            dt,
            &mut self.step_hint,
            &cfg.integrator,
        );
        if !report.is_complete() {
            tracing::warn!(
                outcome = ?report.outcome,
                accepted = report.accepted,
                "Settler integration did not reach the end of the timestep."
            );
            warnings.push(StepWarning::Instability(report.outcome));
        }
        for value in self.state.iter_mut() {
            *value = value.max(0.0);
        }

        let cfg = &self.config;
        let layer_stream = |i: usize| {
            let mut s = Stream::zeros();
            for (block, component) in LAYERED.iter().enumerate() {
                let layered = block == TSS_BLOCK
                    || (layered_solubles && (block != TEMP_BLOCK || cfg.temperature_model));
                s[*component] = if layered {
                    self.state[block * n + i]
                } else {
                    inflow[*component]
                };
            }
            let tss_in = inflow[Asm1::Tss];
            for c in Asm1::PARTICULATES {
                s[c] = if tss_in != 0.0 {
                    s[Asm1::Tss] / tss_in * inflow[c]
                } else {
                    0.0
                };
            }
            s
        };

        let effluent = layer_stream(0).with_flow(q_e);
        let bottom = layer_stream(n - 1);

        Ok(SettlerOutput {
            effluent,
            return_sludge: bottom.with_flow(q_r),
            waste_sludge: bottom.with_flow(q_w),
            layer_tss: self.layer_tss(),
            sludge_blanket_height: self.sludge_blanket_height(),
            warnings,
        })
    }
}

impl ProcessUnit for Settler {
    fn category(&self) -> UnitCategory {
        UnitCategory::Settler
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        3
    }

    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Settler", inputs, 1)?;
        let out = self.settle(&inputs[0], dt)?;
        Ok(StepOutput {
            outputs: vec![out.effluent, out.return_sludge, out.waste_sludge],
            warnings: out.warnings,
        })
    }

    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        match control {
            UnitControl::ReturnFlow(flow) => {
                Self::check_flow("Return", *flow)?;
                self.config.return_flow = *flow;
                Ok(())
            }
            UnitControl::WasteFlow(flow) => {
                Self::check_flow("Waste", *flow)?;
                self.config.waste_flow = *flow;
                Ok(())
            }
            _ => Err(Error::invalid_parameter(format!(
                "Settler does not accept {control:?}."
            ))),
        }
    }

    /// Layer TSS, bottom layer first.
    fn state(&self) -> Vec<f64> {
        self.layer_tss()
    }
}
