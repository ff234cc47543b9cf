// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the [`Stream`] type, the fixed-layout vector that
//! represents a wastewater or sludge flow at an instant, and the [`Asm1`]
//! enum that names its components.

use std::ops::{Index, IndexMut};

use crate::Error;

/// The number of scalars in a [`Stream`].
pub const STREAM_LEN: usize = 21;

/// Names the components of a [`Stream`], in storage order.
///
/// Concentrations are in g COD/m³ (or g N/m³, g O2/m³ for nitrogen and
/// oxygen), alkalinity in mol HCO3/m³, flow in m³/d and temperature in °C.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Asm1 {
    /// Soluble inert organic matter.
    Si = 0,
    /// Readily biodegradable substrate.
    Ss,
    /// Particulate inert organic matter.
    Xi,
    /// Slowly biodegradable substrate.
    Xs,
    /// Active heterotrophic biomass.
    Xbh,
    /// Active autotrophic biomass.
    Xba,
    /// Particulate products arising from biomass decay.
    Xp,
    /// Dissolved oxygen.
    So,
    /// Nitrate and nitrite nitrogen.
    Sno,
    /// Ammonium and ammonia nitrogen.
    Snh,
    /// Soluble biodegradable organic nitrogen.
    Snd,
    /// Particulate biodegradable organic nitrogen.
    Xnd,
    /// Alkalinity.
    Salk,
    /// Total suspended solids.
    Tss,
    /// Flow rate.
    Q,
    /// Temperature.
    Temp,
    Sd1,
    Sd2,
    Sd3,
    Xd4,
    Xd5,
}

impl Asm1 {
    /// All components, in storage order.
    pub const ALL: [Asm1; STREAM_LEN] = [
        Asm1::Si,
        Asm1::Ss,
        Asm1::Xi,
        Asm1::Xs,
        Asm1::Xbh,
        Asm1::Xba,
        Asm1::Xp,
        Asm1::So,
        Asm1::Sno,
        Asm1::Snh,
        Asm1::Snd,
        Asm1::Xnd,
        Asm1::Salk,
        Asm1::Tss,
        Asm1::Q,
        Asm1::Temp,
        Asm1::Sd1,
        Asm1::Sd2,
        Asm1::Sd3,
        Asm1::Xd4,
        Asm1::Xd5,
    ];

    /// The 13 biokinetic state variables.
    pub const STATES: [Asm1; 13] = [
        Asm1::Si,
        Asm1::Ss,
        Asm1::Xi,
        Asm1::Xs,
        Asm1::Xbh,
        Asm1::Xba,
        Asm1::Xp,
        Asm1::So,
        Asm1::Sno,
        Asm1::Snh,
        Asm1::Snd,
        Asm1::Xnd,
        Asm1::Salk,
    ];

    /// Components carried by solids, which separating units concentrate.
    pub const PARTICULATES: [Asm1; 8] = [
        Asm1::Xi,
        Asm1::Xs,
        Asm1::Xbh,
        Asm1::Xba,
        Asm1::Xp,
        Asm1::Xnd,
        Asm1::Xd4,
        Asm1::Xd5,
    ];

    /// Dissolved components, which separating units leave untouched.
    pub const SOLUBLES: [Asm1; 10] = [
        Asm1::Si,
        Asm1::Ss,
        Asm1::So,
        Asm1::Sno,
        Asm1::Snh,
        Asm1::Snd,
        Asm1::Salk,
        Asm1::Sd1,
        Asm1::Sd2,
        Asm1::Sd3,
    ];

    /// The five particulate COD components that make up TSS.
    pub const TSS_COMPONENTS: [Asm1; 5] = [Asm1::Xi, Asm1::Xs, Asm1::Xbh, Asm1::Xba, Asm1::Xp];

    /// The five auxiliary tracer components.
    pub const DUMMIES: [Asm1; 5] = [Asm1::Sd1, Asm1::Sd2, Asm1::Sd3, Asm1::Xd4, Asm1::Xd5];

    /// Returns the storage position of the component.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A wastewater or sludge flow at an instant.
///
/// Streams are plain values: units read the streams they are given and
/// produce new ones, they never share them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stream([f64; STREAM_LEN]);

impl Stream {
    /// Creates a stream from its 21 components, in [`Asm1`] order.
    pub const fn new(values: [f64; STREAM_LEN]) -> Self {
        Self(values)
    }

    /// Creates a stream with every component set to zero.
    pub const fn zeros() -> Self {
        Self([0.0; STREAM_LEN])
    }

    /// Returns the components as a slice, in [`Asm1`] order.
    pub fn values(&self) -> &[f64; STREAM_LEN] {
        &self.0
    }

    /// Returns the components as a mutable slice, in [`Asm1`] order.
    pub fn values_mut(&mut self) -> &mut [f64; STREAM_LEN] {
        &mut self.0
    }

    /// Returns the flow rate, in m³/d.
    pub fn flow(&self) -> f64 {
        self.0[Asm1::Q.index()]
    }

    /// Returns the temperature, in °C.
    pub fn temperature(&self) -> f64 {
        self.0[Asm1::Temp.index()]
    }

    /// Returns a copy of the stream with the flow rate replaced.
    pub fn with_flow(mut self, flow: f64) -> Self {
        self.0[Asm1::Q.index()] = flow;
        self
    }

    /// Computes TSS from the particulate COD components, weighting each of
    /// [`Asm1::TSS_COMPONENTS`] with the matching conversion factor.
    pub fn particulate_tss(&self, factors: &[f64; 5]) -> f64 {
        Asm1::TSS_COMPONENTS
            .iter()
            .zip(factors)
            .map(|(c, f)| f * self[*c])
            .sum()
    }

    /// Returns `true` if every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::zeros()
    }
}

impl From<[f64; STREAM_LEN]> for Stream {
    fn from(values: [f64; STREAM_LEN]) -> Self {
        Self(values)
    }
}

impl TryFrom<&[f64]> for Stream {
    type Error = Error;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let values: [f64; STREAM_LEN] = values.try_into().map_err(|_| {
            Error::invalid_stream(format!(
                "Expected {STREAM_LEN} stream components, got {}.",
                values.len()
            ))
        })?;
        Ok(Self(values))
    }
}

impl Index<Asm1> for Stream {
    type Output = f64;

    fn index(&self, component: Asm1) -> &Self::Output {
        &self.0[component.index()]
    }
}

impl IndexMut<Asm1> for Stream {
    fn index_mut(&mut self, component: Asm1) -> &mut Self::Output {
        &mut self.0[component.index()]
    }
}

/// Checks that a unit received the expected number of input streams, and
/// that none of them carries non-finite values.
pub(crate) fn ensure_inputs(unit: &str, inputs: &[Stream], expected: usize) -> Result<(), Error> {
    if inputs.len() != expected {
        return Err(Error::invalid_stream(format!(
            "{unit} expects {expected} input stream(s), got {}.",
            inputs.len()
        )));
    }
    for (port, input) in inputs.iter().enumerate() {
        if !input.is_finite() {
            return Err(Error::invalid_stream(format!(
                "{unit} received a non-finite value on input port {port}."
            )));
        }
    }
    Ok(())
}

/// Checks that the given timestep is positive and finite.
pub(crate) fn ensure_timestep(unit: &str, dt: f64) -> Result<(), Error> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(Error::invalid_parameter(format!(
            "{unit} requires a positive timestep, got {dt}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexing() {
        let mut s = Stream::zeros();
        s[Asm1::Ss] = 69.5;
        s[Asm1::Q] = 18446.0;
        s[Asm1::Temp] = 15.0;

        assert_eq!(s.values()[1], 69.5);
        assert_eq!(s.flow(), 18446.0);
        assert_eq!(s.temperature(), 15.0);
        assert_eq!(s.with_flow(10.0).flow(), 10.0);
        assert_eq!(s[Asm1::Xd5], 0.0);
        assert!(Asm1::ALL.iter().enumerate().all(|(i, c)| c.index() == i));
    }

    #[test]
    fn test_try_from() {
        let values = vec![1.0; 21];
        assert_eq!(
            Stream::try_from(values.as_slice()),
            Ok(Stream::new([1.0; 21]))
        );

        let values = vec![1.0; 20];
        assert_eq!(
            Stream::try_from(values.as_slice()),
            Err(Error::invalid_stream("Expected 21 stream components, got 20."))
        );
    }

    #[test]
    fn test_particulate_tss() {
        let mut s = Stream::zeros();
        s[Asm1::Xi] = 100.0;
        s[Asm1::Xbh] = 20.0;
        s[Asm1::Snh] = 500.0;
        assert!((s.particulate_tss(&[0.75; 5]) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_input_checks() {
        let good = Stream::zeros().with_flow(1.0);
        assert!(ensure_inputs("Combiner:1", &[good, good], 2).is_ok());
        assert!(ensure_inputs("Combiner:1", &[good], 2).is_err_and(|e| e
            == Error::invalid_stream("Combiner:1 expects 2 input stream(s), got 1.")));

        let mut bad = good;
        bad[Asm1::Ss] = f64::NAN;
        assert!(ensure_inputs("Splitter:3", &[bad], 1).is_err_and(|e| e
            == Error::invalid_stream(
                "Splitter:3 received a non-finite value on input port 0."
            )));

        assert!(ensure_timestep("Settler:7", 0.0).is_err_and(|e| e
            == Error::invalid_parameter("Settler:7 requires a positive timestep, got 0.")));
    }
}
