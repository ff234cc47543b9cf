// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A stream splitter.

use crate::process_unit::{ProcessUnit, StepOutput, UnitControl};
use crate::stream::ensure_inputs;
use crate::{Error, Stream, UnitCategory};

/// How a [`Splitter`] divides its inflow.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitMode {
    /// Divide the flow proportionally to the given ratios, one per output
    /// port.  The ratios are normalised by their sum.
    Ratios(Vec<f64>),
    /// Send up to the given flow, in m³/d, to port 0 and anything above it to
    /// port 1.
    Threshold(f64),
}

/// Splits one stream into several streams with identical concentrations.
#[derive(Clone, Debug)]
pub struct Splitter {
    mode: SplitMode,
}

fn check_ratios(ratios: &[f64]) -> Result<(), Error> {
    if ratios.is_empty() {
        return Err(Error::invalid_parameter(
            "A splitter needs at least one output ratio.",
        ));
    }
    if let Some(r) = ratios.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
        return Err(Error::invalid_parameter(format!(
            "Split ratios must be non-negative, got {r}."
        )));
    }
    Ok(())
}

/// Returns the part of `input` carried by `flow`.  A branch without flow
/// carries nothing at all.
fn branch(input: &Stream, flow: f64) -> Stream {
    if flow > 0.0 {
        input.with_flow(flow)
    } else {
        Stream::zeros()
    }
}

impl Splitter {
    /// Creates a splitter that divides its inflow by the given ratios.
    pub fn ratios(ratios: Vec<f64>) -> Result<Self, Error> {
        check_ratios(&ratios)?;
        Ok(Self {
            mode: SplitMode::Ratios(ratios),
        })
    }

    /// Creates a two-way splitter that bypasses flow above `threshold`.
    pub fn threshold(threshold: f64) -> Result<Self, Error> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Splitter threshold must be non-negative, got {threshold}."
            )));
        }
        Ok(Self {
            mode: SplitMode::Threshold(threshold),
        })
    }

    /// Returns the split mode.
    pub fn mode(&self) -> &SplitMode {
        &self.mode
    }

    /// Splits `input` according to the configured mode.
    pub fn split(&self, input: &Stream) -> Vec<Stream> {
        let q = input.flow().max(0.0);
        match &self.mode {
            SplitMode::Ratios(ratios) => {
                let sum: f64 = ratios.iter().sum();
                ratios
                    .iter()
                    .map(|r| {
                        let share = if sum > 0.0 { r / sum } else { 0.0 };
                        branch(input, q * share)
                    })
                    .collect()
            }
            SplitMode::Threshold(threshold) => {
                let below = q.min(*threshold);
                vec![branch(input, below), branch(input, q - below)]
            }
        }
    }
}

impl ProcessUnit for Splitter {
    fn category(&self) -> UnitCategory {
        UnitCategory::Splitter
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        match &self.mode {
            SplitMode::Ratios(ratios) => ratios.len(),
            SplitMode::Threshold(_) => 2,
        }
    }

    fn step(&mut self, inputs: &[Stream], _dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Splitter", inputs, 1)?;
        Ok(StepOutput::new(self.split(&inputs[0])))
    }

    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        match (&mut self.mode, control) {
            (SplitMode::Ratios(current), UnitControl::SplitRatios(ratios)) => {
                if ratios.len() != current.len() {
                    return Err(Error::invalid_parameter(format!(
                        "Expected {} split ratios, got {}.",
                        current.len(),
                        ratios.len()
                    )));
                }
                check_ratios(ratios)?;
                current.clone_from(ratios);
                Ok(())
            }
            _ => Err(Error::invalid_parameter(format!(
                "Splitter does not accept {control:?}."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Asm1;

    fn input(flow: f64) -> Stream {
        let mut s = Stream::zeros().with_flow(flow);
        s[Asm1::Ss] = 69.5;
        s[Asm1::Xbh] = 28.17;
        s[Asm1::Temp] = 15.0;
        s
    }

    #[test]
    fn test_ratio_conservation() -> Result<(), Error> {
        let mut splitter = Splitter::ratios(vec![0.3, 0.7])?;
        let out = splitter.step(&[input(1000.0)], 0.01)?.outputs;

        assert_eq!(out.len(), 2);
        assert!((out[0].flow() + out[1].flow() - 1000.0).abs() < 1e-9);
        assert!((out[0].flow() - 300.0).abs() < 1e-9);
        for s in &out {
            assert_eq!(s.with_flow(1000.0), input(1000.0));
        }

        Ok(())
    }

    #[test]
    fn test_ratio_normalisation() -> Result<(), Error> {
        let splitter = Splitter::ratios(vec![1.0, 1.0, 2.0])?;
        let out = splitter.split(&input(400.0));
        let flows = out.iter().map(Stream::flow).collect::<Vec<_>>();
        assert_eq!(flows, vec![100.0, 100.0, 200.0]);

        let splitter = Splitter::ratios(vec![0.0, 0.0])?;
        let out = splitter.split(&input(400.0));
        assert!(out.iter().all(|s| s.flow() == 0.0));

        Ok(())
    }

    #[test]
    fn test_threshold() -> Result<(), Error> {
        let splitter = Splitter::threshold(500.0)?;

        let out = splitter.split(&input(800.0));
        assert_eq!((out[0].flow(), out[1].flow()), (500.0, 300.0));

        let out = splitter.split(&input(200.0));
        assert_eq!((out[0].flow(), out[1].flow()), (200.0, 0.0));

        let out = splitter.split(&input(0.0));
        assert_eq!((out[0].flow(), out[1].flow()), (0.0, 0.0));

        Ok(())
    }

    #[test]
    fn test_empty_branches() -> Result<(), Error> {
        let splitter = Splitter::threshold(500.0)?;
        let out = splitter.split(&input(200.0));
        assert_eq!(out, vec![input(200.0), Stream::zeros()]);

        let out = splitter.split(&input(500.0));
        assert_eq!(out, vec![input(500.0), Stream::zeros()]);

        let splitter = Splitter::ratios(vec![0.0, 1.0, 0.0])?;
        let out = splitter.split(&input(400.0));
        assert_eq!(out, vec![Stream::zeros(), input(400.0), Stream::zeros()]);

        let out = splitter.split(&input(0.0));
        assert!(out.iter().all(|s| *s == Stream::zeros()));

        Ok(())
    }

    #[test]
    fn test_controls() -> Result<(), Error> {
        let mut splitter = Splitter::ratios(vec![0.5, 0.5])?;
        splitter.apply_control(&UnitControl::SplitRatios(vec![0.1, 0.9]))?;
        assert_eq!(splitter.mode(), &SplitMode::Ratios(vec![0.1, 0.9]));

        assert!(splitter
            .apply_control(&UnitControl::SplitRatios(vec![1.0]))
            .is_err_and(|e| e == Error::invalid_parameter("Expected 2 split ratios, got 1.")));
        assert!(splitter
            .apply_control(&UnitControl::SplitRatios(vec![1.0, -1.0]))
            .is_err_and(|e| e == Error::invalid_parameter("Split ratios must be non-negative, got -1.")));
        assert!(splitter
            .apply_control(&UnitControl::Kla(10.0))
            .is_err_and(|e| e == Error::invalid_parameter("Splitter does not accept Kla(10.0).")));

        Ok(())
    }
}
