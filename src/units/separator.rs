// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! An ideal solids separator, used for sludge thickening and dewatering.
//!
//! A fixed share of the incoming solids leaves with the underflow at a fixed
//! solids content.  Dissolved components and temperature are not affected.

use crate::process_unit::{ProcessUnit, StepOutput};
use crate::stream::ensure_inputs;
use crate::{Asm1, Error, Stream, UnitCategory};

/// Parameters of a [`Separator`].
#[derive(Clone, Debug, PartialEq)]
pub struct SeparatorParams {
    /// Solids content of the underflow, in percent.
    pub solids_percent: f64,
    /// Share of the incoming solids that leave with the underflow, in
    /// percent.
    pub removal_percent: f64,
    /// Factors converting XI, XS, XBH, XBA and XP to TSS.
    pub tss_factors: [f64; 5],
}

impl SeparatorParams {
    /// Gravity thickener: 7 % solids, 98 % removal.
    pub fn thickener() -> Self {
        Self {
            solids_percent: 7.0,
            removal_percent: 98.0,
            tss_factors: [0.75; 5],
        }
    }

    /// Dewatering: 28 % solids, 98 % removal.
    pub fn dewatering() -> Self {
        Self {
            solids_percent: 28.0,
            ..Self::thickener()
        }
    }
}

/// An ideal separator.
///
/// Output ports: 0 is the thickened underflow, 1 the overflow (the reject
/// water for dewatering).
#[derive(Clone, Debug)]
pub struct Separator {
    category: UnitCategory,
    params: SeparatorParams,
}

/// Components concentrated into the underflow.
const SEPARATED: [Asm1; 8] = [
    Asm1::Xi,
    Asm1::Xs,
    Asm1::Xbh,
    Asm1::Xba,
    Asm1::Xp,
    Asm1::Xnd,
    Asm1::Xd4,
    Asm1::Xd5,
];

impl Separator {
    /// Creates a separator.  `category` must be either
    /// [`UnitCategory::Thickener`] or [`UnitCategory::Dewatering`].
    pub fn new(category: UnitCategory, params: SeparatorParams) -> Result<Self, Error> {
        if !matches!(category, UnitCategory::Thickener | UnitCategory::Dewatering) {
            return Err(Error::invalid_parameter(format!(
                "A separator can't be a {category}."
            )));
        }
        for (name, value) in [
            ("Solids percentage", params.solids_percent),
            ("Removal percentage", params.removal_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(Error::invalid_parameter(format!(
                    "{name} must be in (0, 100], got {value}."
                )));
            }
        }
        Ok(Self { category, params })
    }

    pub fn thickener() -> Self {
        Self {
            category: UnitCategory::Thickener,
            params: SeparatorParams::thickener(),
        }
    }

    pub fn dewatering() -> Self {
        Self {
            category: UnitCategory::Dewatering,
            params: SeparatorParams::dewatering(),
        }
    }

    pub fn params(&self) -> &SeparatorParams {
        &self.params
    }

    /// Splits `input` into underflow and overflow.
    ///
    /// When the feed is already at or above the target solids content, or
    /// carries no solids, all of it leaves with the underflow.
    pub fn separate(&self, input: &Stream) -> (Stream, Stream) {
        let p = &self.params;
        let tss_in = input.particulate_tss(&p.tss_factors);
        let thickening = if tss_in > 0.0 {
            p.solids_percent * 10000.0 / tss_in
        } else {
            0.0
        };

        if thickening <= 1.0 {
            let mut underflow = *input;
            underflow[Asm1::Tss] = tss_in;
            return (underflow, Stream::zeros());
        }

        let underflow_share = p.removal_percent / (100.0 * thickening);
        let thinning = (1.0 - p.removal_percent / 100.0) / (1.0 - underflow_share);

        let mut underflow = *input;
        let mut overflow = *input;
        for c in SEPARATED {
            underflow[c] = input[c] * thickening;
            overflow[c] = input[c] * thinning;
        }
        underflow[Asm1::Tss] = tss_in * thickening;
        overflow[Asm1::Tss] = tss_in * thinning;
        underflow[Asm1::Q] = input.flow() * underflow_share;
        overflow[Asm1::Q] = input.flow() * (1.0 - underflow_share);

        (underflow, overflow)
    }
}

impl ProcessUnit for Separator {
    fn category(&self) -> UnitCategory {
        self.category
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        2
    }

    fn step(&mut self, inputs: &[Stream], _dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs(&self.category.to_string(), inputs, 1)?;
        let (underflow, overflow) = self.separate(&inputs[0]);
        Ok(StepOutput::new(vec![underflow, overflow]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waste_sludge() -> Stream {
        let mut s = Stream::zeros();
        s[Asm1::Si] = 28.0;
        s[Asm1::Ss] = 0.7;
        s[Asm1::Xi] = 1500.0;
        s[Asm1::Xs] = 90.0;
        s[Asm1::Xbh] = 3500.0;
        s[Asm1::Xba] = 200.0;
        s[Asm1::Xp] = 900.0;
        s[Asm1::Snh] = 1.5;
        s[Asm1::Xnd] = 6.0;
        s[Asm1::Temp] = 14.8;
        s[Asm1::Tss] = s.particulate_tss(&[0.75; 5]);
        s.with_flow(300.0)
    }

    #[test]
    fn test_thickener_balances() -> Result<(), Error> {
        let input = waste_sludge();
        let mut thickener = Separator::thickener();
        let out = thickener.step(&[input], 0.01)?.outputs;
        let (underflow, overflow) = (out[0], out[1]);

        assert!((underflow.flow() + overflow.flow() - input.flow()).abs() < 1e-9);
        assert!((underflow[Asm1::Tss] - 70000.0).abs() < 1e-6);

        let solids = |s: &Stream| s.flow() * s[Asm1::Tss];
        assert!((solids(&underflow) - 0.98 * solids(&input)).abs() < 1e-6 * solids(&input));
        assert!((solids(&underflow) + solids(&overflow) - solids(&input)).abs() < 1e-6 * solids(&input));
        for c in SEPARATED {
            let mass_in = input.flow() * input[c];
            let mass_out = underflow.flow() * underflow[c] + overflow.flow() * overflow[c];
            assert!((mass_in - mass_out).abs() <= 1e-9 * mass_in.max(1.0));
        }

        for c in [Asm1::Si, Asm1::Ss, Asm1::Snh, Asm1::Temp] {
            assert_eq!(underflow[c], input[c]);
            assert_eq!(overflow[c], input[c]);
        }

        Ok(())
    }

    #[test]
    fn test_dewatering_target() {
        let dewatering = Separator::dewatering();
        let (underflow, _) = dewatering.separate(&waste_sludge());
        assert!((underflow[Asm1::Tss] - 280000.0).abs() < 1e-6);
    }

    #[test]
    fn test_thick_feed() {
        let thickener = Separator::thickener();
        let mut input = waste_sludge();
        for c in Asm1::TSS_COMPONENTS {
            input[c] *= 20.0;
        }
        let (underflow, overflow) = thickener.separate(&input);
        assert_eq!(underflow.flow(), input.flow());
        assert_eq!(underflow[Asm1::Tss], input.particulate_tss(&[0.75; 5]));
        assert_eq!(overflow, Stream::zeros());

        let (underflow, overflow) = thickener.separate(&Stream::zeros().with_flow(10.0));
        assert_eq!(underflow.flow(), 10.0);
        assert_eq!(overflow, Stream::zeros());
    }

    #[test]
    fn test_invalid_params() {
        assert!(
            Separator::new(UnitCategory::Settler, SeparatorParams::thickener())
                .is_err_and(|e| e == Error::invalid_parameter("A separator can't be a Settler."))
        );
        assert!(Separator::new(
            UnitCategory::Dewatering,
            SeparatorParams {
                removal_percent: 0.0,
                ..SeparatorParams::dewatering()
            }
        )
        .is_err_and(|e| e
            == Error::invalid_parameter("Removal percentage must be in (0, 100], got 0.")));
    }
}
