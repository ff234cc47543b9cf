// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Conversions between the activated sludge (ASM1) and anaerobic digestion
//! (ADM1) stream representations.
//!
//! Both directions preserve COD and nitrogen.  Charge is balanced through the
//! inorganic carbon and the cation/anion pool on the way in, and through the
//! alkalinity on the way out, using the digester pH.

use std::ops::{Index, IndexMut};

use super::adm1::{Adm1, ADM1_STATES};
use crate::{Asm1, Error, Stream};

/// Parameters of the ASM1/ADM1 interfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceParams {
    /// COD equivalent of nitrate, g COD/g N.
    pub cod_equiv: f64,
    /// N content of amino acids and proteins.
    pub fnaa: f64,
    /// N content of composites.
    pub fnxc: f64,
    /// N content of biomass.
    pub fnbac: f64,
    /// N content of particulate inerts.
    pub fxni: f64,
    /// N content of soluble inerts on the ASM1 side.
    pub fsni: f64,
    /// N content of soluble inerts on the ADM1 side.
    pub fsni_adm: f64,
    /// Lipid fraction of the non-nitrogenous slowly biodegradable substrate.
    pub frlixs: f64,
    /// Lipid fraction of the non-nitrogenous biomass.
    pub frlibac: f64,
    /// Anaerobically degradable fraction of activated sludge biomass.
    pub frxs_adm: f64,
    /// Fraction of ASM1 inerts degradable in the digester.
    pub fdegrade_adm: f64,
    /// Aerobically degradable fraction of digester biomass.
    pub frxs_as: f64,
    /// Fraction of ADM1 inerts degradable in activated sludge.
    pub fdegrade_as: f64,
    /// Gas constant, bar m³/(kmol K).
    pub r: f64,
    /// Reference temperature of the acid-base constants, K.
    pub t_base: f64,
    pub pk_w_base: f64,
    pub pk_a_va_base: f64,
    pub pk_a_bu_base: f64,
    pub pk_a_pro_base: f64,
    pub pk_a_ac_base: f64,
    pub pk_a_co2_base: f64,
    pub pk_a_in_base: f64,
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            cod_equiv: 40.0 / 14.0,
            fnaa: 0.007 * 14.0,
            fnxc: 0.0376,
            fnbac: 0.08,
            fxni: 0.06,
            fsni: 0.0,
            fsni_adm: 0.06,
            frlixs: 0.7,
            frlibac: 0.4,
            frxs_adm: 0.68,
            fdegrade_adm: 0.0,
            frxs_as: 0.79,
            fdegrade_as: 0.0,
            r: 0.083145,
            t_base: 298.15,
            pk_w_base: 14.0,
            pk_a_va_base: 4.86,
            pk_a_bu_base: 4.82,
            pk_a_pro_base: 4.88,
            pk_a_ac_base: 4.76,
            pk_a_co2_base: 6.35,
            pk_a_in_base: 9.25,
        }
    }
}

/// A stream in the digester representation.
///
/// Uses the digester state layout of [`Adm1`]: the liquid components in
/// kg COD/m³ (kmol/m³ for inorganic carbon, nitrogen and ions), followed by
/// the ion and gas slots (zero on streams), the flow in m³/d, the temperature
/// in °C and the dummy states.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmStream([f64; ADM1_STATES]);

impl Default for AdmStream {
    fn default() -> Self {
        Self([0.0; ADM1_STATES])
    }
}

impl AdmStream {
    pub fn new(values: [f64; ADM1_STATES]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; ADM1_STATES] {
        &self.0
    }

    pub fn flow(&self) -> f64 {
        self[Adm1::Q]
    }

    pub fn temperature(&self) -> f64 {
        self[Adm1::Temp]
    }
}

impl Index<Adm1> for AdmStream {
    type Output = f64;

    fn index(&self, component: Adm1) -> &f64 {
        &self.0[component as usize]
    }
}

impl IndexMut<Adm1> for AdmStream {
    fn index_mut(&mut self, component: Adm1) -> &mut f64 {
        &mut self.0[component as usize]
    }
}

/// Charge contributions per unit concentration at a given pH.
struct Speciation {
    va: f64,
    bu: f64,
    pro: f64,
    ac: f64,
    co2: f64,
    nitrogen: f64,
    /// Temperature corrected pK_w.
    pk_w: f64,
}

const ALPHA_NH: f64 = 1.0 / 14000.0;
const ALPHA_ALK: f64 = -0.001;
const ALPHA_NO: f64 = -1.0 / 14000.0;

impl Speciation {
    fn new(ph: f64, t_op: f64, p: &InterfaceParams) -> Self {
        let factor = (1.0 / p.t_base - 1.0 / t_op) / (100.0 * p.r);
        let corrected = |base: f64, enthalpy: f64| base - (enthalpy * factor).exp().log10();
        let pk_a_co2 = corrected(p.pk_a_co2_base, 7646.0);
        let pk_a_in = corrected(p.pk_a_in_base, 51965.0);
        let acid = |weight: f64, pk_a: f64| -1.0 / weight / (1.0 + 10f64.powf(pk_a - ph));

        Self {
            va: acid(208.0, p.pk_a_va_base),
            bu: acid(160.0, p.pk_a_bu_base),
            pro: acid(112.0, p.pk_a_pro_base),
            ac: acid(64.0, p.pk_a_ac_base),
            co2: acid(1.0, pk_a_co2),
            nitrogen: 10f64.powf(pk_a_in - ph) / (1.0 + 10f64.powf(pk_a_in - ph)),
            pk_w: corrected(p.pk_w_base, 55900.0),
        }
    }

    /// Charge carried by the volatile fatty acids and inorganic nitrogen of
    /// a digester stream.
    fn organic_charge(&self, s: &AdmStream) -> f64 {
        s[Adm1::Sva] * self.va
            + s[Adm1::Sbu] * self.bu
            + s[Adm1::Spro] * self.pro
            + s[Adm1::Sac] * self.ac
            + s[Adm1::Sin] * self.nitrogen
    }
}

/// Maps as much of `demand` (in g COD/m³) as the nitrogen `pools` allow into
/// a component with N content `n_content`, drawing from the pools in order.
/// Returns the mapped COD; `demand` keeps what could not be mapped.
fn draw_nitrogen(demand: &mut f64, n_content: f64, pools: [&mut f64; 3]) -> f64 {
    let mut mapped = 0.0;
    for pool in pools {
        if *pool < *demand * n_content {
            mapped += *pool / n_content;
            *demand -= *pool / n_content;
            *pool = 0.0;
        } else {
            mapped += *demand;
            *pool -= *demand * n_content;
            *demand = 0.0;
            break;
        }
    }
    mapped
}

/// Converts an activated sludge stream into the digester representation.
///
/// `ph` is the digester pH used for the charge balance and `t_op` the
/// digester temperature in K.
pub fn asm_to_adm(
    input: &Stream,
    ph: f64,
    t_op: f64,
    p: &InterfaceParams,
) -> Result<AdmStream, Error> {
    let mut si = input[Asm1::Si];
    let mut ss = input[Asm1::Ss];
    let mut xs = input[Asm1::Xs];
    let mut xbh = input[Asm1::Xbh];
    let mut xba = input[Asm1::Xba];
    let mut snh = input[Asm1::Snh];
    let mut snd = input[Asm1::Snd];
    let mut xnd = input[Asm1::Xnd];

    // Oxygen and nitrate are consumed by SS, XS, XBH and XBA in that order.
    // Consumed biomass releases its nitrogen as ammonium.
    let mut demand = input[Asm1::So] + p.cod_equiv * input[Asm1::Sno];
    for (pool, nitrogen) in [
        (&mut ss, 0.0),
        (&mut xs, 0.0),
        (&mut xbh, p.fnbac),
        (&mut xba, p.fnbac),
    ] {
        let used = pool.min(demand);
        *pool -= used;
        demand -= used;
        snh += used * nitrogen;
    }
    if demand > 0.0 {
        tracing::warn!(
            remaining = demand,
            "Not enough COD to consume the electron acceptors entering the digester."
        );
    }

    // Soluble organic N goes into amino acids, remaining SS into sugars.
    let sorgn = snd / p.fnaa;
    let aa = if sorgn >= ss {
        snd -= ss * p.fnaa;
        std::mem::take(&mut ss)
    } else {
        ss -= sorgn;
        snd = 0.0;
        sorgn
    };

    // Particulate organic N goes into proteins, remaining XS into lipids
    // and carbohydrates.
    let xorgn = xnd / p.fnaa;
    let (mut xpr, mut xli, mut xch);
    if xorgn >= xs {
        xpr = xs;
        xnd -= xs * p.fnaa;
        xli = 0.0;
        xch = 0.0;
    } else {
        xpr = xorgn;
        xli = p.frlixs * (xs - xorgn);
        xch = (1.0 - p.frlixs) * (xs - xorgn);
        xnd = 0.0;
    }

    // Biomass becomes inerts and proteins, with any COD left without
    // nitrogen going to lipids and carbohydrates.
    let biomass = xbh + xba;
    let biomass_nobio = biomass * (1.0 - p.frxs_adm);
    let biomass_bion = biomass * p.fnbac - biomass_nobio * p.fxni;
    if biomass_bion < 0.0 {
        return Err(Error::invalid_stream(
            "Not enough biomass N to map the requested inert part.",
        ));
    }
    if biomass_bion / p.fnaa <= biomass - biomass_nobio {
        let mut from_biomass = biomass_bion / p.fnaa;
        let mut remaining = biomass - biomass_nobio - from_biomass;
        if xnd / p.fnaa > remaining {
            from_biomass += remaining;
            xnd -= remaining * p.fnaa;
            remaining = 0.0;
        } else {
            from_biomass += xnd / p.fnaa;
            remaining -= xnd / p.fnaa;
            xnd = 0.0;
        }
        xpr += from_biomass;
        xli += p.frlibac * remaining;
        xch += (1.0 - p.frlibac) * remaining;
    } else {
        xpr += biomass - biomass_nobio;
        xnd += biomass * p.fnbac - biomass_nobio * p.fxni - (biomass - biomass_nobio) * p.fnaa;
    }

    let inert_x = (1.0 - p.fdegrade_adm) * (input[Asm1::Xi] + input[Asm1::Xp]);

    // Degradable inerts become composites, as far as nitrogen allows.
    let mut xc = 0.0;
    if p.fdegrade_adm > 0.0 {
        let mut non_inert = p.fdegrade_adm * (input[Asm1::Xi] + input[Asm1::Xp]);
        if p.fxni < p.fnxc {
            xc = non_inert * p.fxni / p.fnxc;
            non_inert -= xc;
            xc += draw_nitrogen(&mut non_inert, p.fnxc, [&mut xnd, &mut snd, &mut snh]);
            if non_inert > 0.0 {
                tracing::warn!(
                    cod = non_inert,
                    "Nitrogen shortage when converting degradable inerts."
                );
                xli += 0.5 * non_inert;
                xch += 0.5 * non_inert;
            }
        } else {
            xc = non_inert;
            xnd += non_inert * (p.fxni - p.fnxc);
        }
    }

    // Soluble inerts, with the nitrogen difference drawn from or released to
    // the organic and ammonium pools.
    let mut inert_s;
    if p.fsni < p.fsni_adm {
        inert_s = si * p.fsni / p.fsni_adm;
        si -= inert_s;
        inert_s += draw_nitrogen(&mut si, p.fsni_adm, [&mut snd, &mut xnd, &mut snh]);
        if si > 0.0 {
            tracing::warn!(cod = si, "Nitrogen shortage when converting soluble inerts.");
            ss += si;
        }
    } else {
        inert_s = si;
        snd += si * (p.fsni - p.fsni_adm);
    }

    let mut out = AdmStream::default();
    out[Adm1::Ssu] = ss / 1000.0;
    out[Adm1::Saa] = aa / 1000.0;
    out[Adm1::Sin] = (snh + snd + xnd) / 14000.0;
    out[Adm1::Si] = inert_s / 1000.0;
    out[Adm1::Xc] = xc / 1000.0;
    out[Adm1::Xch] = xch / 1000.0;
    out[Adm1::Xpr] = xpr / 1000.0;
    out[Adm1::Xli] = xli / 1000.0;
    out[Adm1::Xi] = (biomass_nobio + inert_x) / 1000.0;
    out[Adm1::Q] = input.flow();
    out[Adm1::Temp] = t_op - 273.15;
    for (adm, asm) in Adm1::DUMMIES.iter().zip(Asm1::DUMMIES) {
        out[*adm] = input[asm];
    }

    // Charge balance: inorganic carbon carries the alkalinity, and the
    // cation/anion pool closes the balance including H+ and OH-.
    let alpha = Speciation::new(ph, t_op, p);
    out[Adm1::Sic] = (input[Asm1::Sno] * ALPHA_NO
        + input[Asm1::Snh] * ALPHA_NH
        + input[Asm1::Salk] * ALPHA_ALK
        - alpha.organic_charge(&out))
        / alpha.co2;
    let cat_minus_an = alpha.organic_charge(&out)
        + out[Adm1::Sic] * alpha.co2
        + 10f64.powf(-alpha.pk_w + ph)
        - 10f64.powf(-ph);
    if cat_minus_an > 0.0 {
        out[Adm1::Scat] = cat_minus_an;
    } else {
        out[Adm1::San] = -cat_minus_an;
    }

    Ok(out)
}

/// Converts a digester stream back into the activated sludge
/// representation.
///
/// `ph` is the digester pH, `t_ww` the temperature in °C assigned to the
/// returned stream and `t_op` the digester temperature in K.  Dissolved
/// hydrogen and methane are assumed to be stripped.
pub fn adm_to_asm(
    input: &AdmStream,
    ph: f64,
    t_ww: f64,
    t_op: f64,
    p: &InterfaceParams,
) -> Result<Stream, Error> {
    let mut s_in = input[Adm1::Sin];
    let mut s_i = input[Adm1::Si];

    // Biomass becomes slowly biodegradable substrate and inert products.
    let biomass = 1000.0 * Adm1::BIOMASS.iter().map(|c| input[*c]).sum::<f64>();
    let mut biomass_nobio = biomass * (1.0 - p.frxs_as);
    let mut biomass_bion = biomass * p.fnbac - biomass_nobio * p.fxni;
    let xp = if biomass_bion < 0.0 {
        tracing::warn!("Not enough biomass N to map the inert part of the digester biomass.");
        biomass_nobio = biomass * p.fnbac / p.fxni;
        biomass_bion = 0.0;
        biomass_nobio
    } else {
        biomass_nobio
    };
    let mut xs_biomass = if biomass_bion / p.fnxc <= biomass - biomass_nobio {
        let from_biomass = biomass_bion / p.fnxc;
        let remaining = biomass - biomass_nobio - from_biomass;
        if s_in * 14000.0 / p.fnaa < remaining {
            return Err(Error::invalid_stream(
                "Not enough nitrogen to map the requested XS part of biomass.",
            ));
        }
        from_biomass + remaining
    } else {
        biomass - biomass_nobio
    };
    s_in += (biomass * p.fnbac - xp * p.fxni - xs_biomass * p.fnxc) / 14000.0;

    // Degradable inerts become substrate as far as nitrogen allows.
    let mut inert_x = (1.0 - p.fdegrade_as) * input[Adm1::Xi] * 1000.0;
    let mut xs_inert = 0.0;
    if p.fdegrade_as > 0.0 {
        let mut non_inert = p.fdegrade_as * input[Adm1::Xi] * 1000.0;
        if p.fxni < p.fnxc {
            xs_inert = non_inert * p.fxni / p.fnxc;
            non_inert -= xs_inert;
            let available = s_in * 14000.0;
            if available < non_inert * p.fnxc {
                tracing::warn!("Nitrogen shortage when converting degradable digester inerts.");
                xs_inert += available / p.fnxc;
                non_inert -= available / p.fnxc;
                s_in = 0.0;
                inert_x += non_inert;
            } else {
                xs_inert += non_inert;
                s_in -= non_inert * p.fnxc / 14000.0;
            }
        } else {
            xs_inert = non_inert;
            s_in += non_inert * (p.fxni - p.fnxc) / 14000.0;
        }
    }
    xs_biomass += xs_inert;

    // Soluble inerts map one to one on COD.
    let inert_s;
    if p.fsni_adm < p.fsni {
        let mut mapped = s_i * p.fsni_adm / p.fsni;
        s_i -= mapped;
        if s_in * 14.0 < s_i * p.fsni {
            return Err(Error::invalid_stream(
                "Not enough nitrogen to map the requested inert part of SI.",
            ));
        }
        mapped += s_i;
        s_in -= s_i * p.fsni / 14.0;
        inert_s = mapped;
    } else {
        inert_s = s_i;
        s_in += s_i * (p.fsni_adm - p.fsni) / 14.0;
    }

    let mut out = Stream::zeros();
    out[Asm1::Si] = inert_s * 1000.0;
    out[Asm1::Ss] = 1000.0
        * [Adm1::Ssu, Adm1::Saa, Adm1::Sfa, Adm1::Sva, Adm1::Sbu, Adm1::Spro, Adm1::Sac]
            .iter()
            .map(|c| input[*c])
            .sum::<f64>();
    out[Asm1::Xi] = inert_x;
    out[Asm1::Xs] = 1000.0
        * (input[Adm1::Xc] + input[Adm1::Xch] + input[Adm1::Xpr] + input[Adm1::Xli])
        + xs_biomass;
    out[Asm1::Xp] = xp;
    out[Asm1::Snh] = s_in * 14000.0;
    out[Asm1::Snd] = p.fnaa * 1000.0 * input[Adm1::Saa];
    out[Asm1::Xnd] = p.fnxc * xs_biomass
        + p.fnxc * 1000.0 * input[Adm1::Xc]
        + p.fnaa * 1000.0 * input[Adm1::Xpr];
    out[Asm1::Tss] = 0.75
        * Asm1::TSS_COMPONENTS
            .iter()
            .map(|c| out[*c])
            .sum::<f64>();
    out[Asm1::Q] = input.flow();
    out[Asm1::Temp] = t_ww;
    for (asm, adm) in Asm1::DUMMIES.iter().zip(Adm1::DUMMIES) {
        out[*asm] = input[adm];
    }

    let alpha = Speciation::new(ph, t_op, p);
    out[Asm1::Salk] = (alpha.organic_charge(input) + input[Adm1::Sic] * alpha.co2
        - out[Asm1::Sno] * ALPHA_NO
        - out[Asm1::Snh] * ALPHA_NH)
        / ALPHA_ALK;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T_OP: f64 = 308.15;

    fn sludge() -> Stream {
        let mut s = Stream::zeros();
        s[Asm1::Si] = 28.0;
        s[Asm1::Ss] = 50.0;
        s[Asm1::Xi] = 10000.0;
        s[Asm1::Xs] = 30000.0;
        s[Asm1::Xbh] = 16000.0;
        s[Asm1::Xba] = 500.0;
        s[Asm1::Xp] = 2500.0;
        s[Asm1::So] = 0.5;
        s[Asm1::Sno] = 1.0;
        s[Asm1::Snh] = 30.0;
        s[Asm1::Snd] = 2.0;
        s[Asm1::Xnd] = 1500.0;
        s[Asm1::Salk] = 7.0;
        s[Asm1::Tss] = s.particulate_tss(&[0.75; 5]);
        s[Asm1::Temp] = 14.0;
        s[Asm1::Sd1] = 1.5;
        s.with_flow(178.0)
    }

    fn asm_cod(s: &Stream) -> f64 {
        [Asm1::Si, Asm1::Ss, Asm1::Xi, Asm1::Xs, Asm1::Xbh, Asm1::Xba, Asm1::Xp]
            .iter()
            .map(|c| s[*c])
            .sum()
    }

    fn asm_nitrogen(s: &Stream, p: &InterfaceParams) -> f64 {
        s[Asm1::Snh]
            + s[Asm1::Snd]
            + s[Asm1::Xnd]
            + p.fnbac * (s[Asm1::Xbh] + s[Asm1::Xba])
            + p.fxni * (s[Asm1::Xi] + s[Asm1::Xp])
            + p.fsni * s[Asm1::Si]
    }

    fn adm_cod(s: &AdmStream) -> f64 {
        1000.0
            * [
                Adm1::Ssu,
                Adm1::Saa,
                Adm1::Sfa,
                Adm1::Sva,
                Adm1::Sbu,
                Adm1::Spro,
                Adm1::Sac,
                Adm1::Si,
                Adm1::Xc,
                Adm1::Xch,
                Adm1::Xpr,
                Adm1::Xli,
                Adm1::Xi,
            ]
            .iter()
            .chain(Adm1::BIOMASS.iter())
            .map(|c| s[*c])
            .sum::<f64>()
    }

    fn adm_nitrogen(s: &AdmStream, p: &InterfaceParams) -> f64 {
        14000.0 * s[Adm1::Sin]
            + 1000.0
                * (p.fnaa * (s[Adm1::Saa] + s[Adm1::Xpr])
                    + p.fnxc * s[Adm1::Xc]
                    + p.fxni * s[Adm1::Xi]
                    + p.fsni_adm * s[Adm1::Si]
                    + p.fnbac * Adm1::BIOMASS.iter().map(|c| s[*c]).sum::<f64>())
    }

    #[test]
    fn test_asm_to_adm_balances() -> Result<(), Error> {
        let p = InterfaceParams::default();
        let input = sludge();
        let out = asm_to_adm(&input, 7.0, T_OP, &p)?;

        // The oxygen and nitrate demand is the only COD lost.
        let demand = input[Asm1::So] + p.cod_equiv * input[Asm1::Sno];
        assert!((asm_cod(&input) - demand - adm_cod(&out)).abs() < 1e-6);
        assert!((asm_nitrogen(&input, &p) - adm_nitrogen(&out, &p)).abs() < 1e-6);

        assert_eq!(out.flow(), 178.0);
        assert!((out.temperature() - 35.0).abs() < 1e-12);
        assert_eq!(out[Adm1::Sd1], 1.5);
        assert!(out[Adm1::Sic] > 0.0);
        assert!(out[Adm1::Scat] == 0.0 || out[Adm1::San] == 0.0);
        assert!(out.values().iter().all(|v| v.is_finite() && *v >= 0.0));

        Ok(())
    }

    #[test]
    fn test_electron_acceptor_demand() -> Result<(), Error> {
        let p = InterfaceParams::default();
        let mut input = sludge();
        input[Asm1::Ss] = 10.0;
        input[Asm1::Xs] = 0.0;
        input[Asm1::So] = 2.0;
        input[Asm1::Sno] = 10.0;
        let out = asm_to_adm(&input, 7.0, T_OP, &p)?;

        // SS is exhausted first, then heterotrophs are consumed.
        let demand = 2.0 + p.cod_equiv * 10.0;
        assert_eq!(out[Adm1::Ssu], 0.0);
        assert_eq!(out[Adm1::Saa], 0.0);
        assert!((asm_cod(&input) - demand - adm_cod(&out)).abs() < 1e-6);
        assert!((asm_nitrogen(&input, &p) - adm_nitrogen(&out, &p)).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_insufficient_biomass_nitrogen() {
        let p = InterfaceParams {
            frxs_adm: 0.0,
            fxni: 0.1,
            ..Default::default()
        };
        assert!(asm_to_adm(&sludge(), 7.0, T_OP, &p).is_err_and(|e| e
            == Error::invalid_stream("Not enough biomass N to map the requested inert part.")));
    }

    #[test]
    fn test_adm_to_asm_balances() -> Result<(), Error> {
        let p = InterfaceParams::default();
        let mut input = AdmStream::default();
        let values = [
            (Adm1::Ssu, 0.0124),
            (Adm1::Saa, 0.0055),
            (Adm1::Sfa, 0.1074),
            (Adm1::Sva, 0.0123),
            (Adm1::Sbu, 0.0140),
            (Adm1::Spro, 0.0176),
            (Adm1::Sac, 0.0893),
            (Adm1::Sh2, 2.5055e-7),
            (Adm1::Sch4, 0.0555),
            (Adm1::Sic, 0.0951),
            (Adm1::Sin, 0.0945),
            (Adm1::Si, 0.1309),
            (Adm1::Xc, 0.1079),
            (Adm1::Xch, 0.0205),
            (Adm1::Xpr, 0.0842),
            (Adm1::Xli, 0.0436),
            (Adm1::Xsu, 0.3122),
            (Adm1::Xaa, 0.9317),
            (Adm1::Xfa, 0.3384),
            (Adm1::Xc4, 0.3258),
            (Adm1::Xpro, 0.1011),
            (Adm1::Xac, 0.6772),
            (Adm1::Xh2, 0.2848),
            (Adm1::Xi, 17.2162),
            (Adm1::San, 0.0052),
            (Adm1::Q, 178.4674),
            (Adm1::Temp, 35.0),
        ];
        for (c, v) in values {
            input[c] = v;
        }
        let out = adm_to_asm(&input, 7.26, 14.0, T_OP, &p)?;

        let stripped = 1000.0 * (input[Adm1::Sh2] + input[Adm1::Sch4]);
        assert!((adm_cod(&input) - asm_cod(&out)).abs() < 1e-6);
        assert!(stripped > 0.0);
        assert!((adm_nitrogen(&input, &p) - asm_nitrogen(&out, &p)).abs() < 1e-6);

        assert_eq!(out[Asm1::Xbh], 0.0);
        assert_eq!(out[Asm1::Xba], 0.0);
        assert_eq!(out.flow(), 178.4674);
        assert_eq!(out.temperature(), 14.0);
        assert!(
            (out[Asm1::Tss] - 0.75 * (out[Asm1::Xi] + out[Asm1::Xs] + out[Asm1::Xp])).abs()
                < 1e-9
        );
        assert!(out[Asm1::Salk] > 0.0);
        assert!(out.values().iter().all(|v| v.is_finite() && *v >= 0.0));

        Ok(())
    }

    #[test]
    fn test_adm_to_asm_nitrogen_shortage() {
        let p = InterfaceParams::default();
        let mut input = AdmStream::default();
        input[Adm1::Xac] = 1.0;
        input[Adm1::Q] = 100.0;
        let p = InterfaceParams { fnbac: 0.01, ..p };
        assert!(adm_to_asm(&input, 7.0, 15.0, T_OP, &p).is_err_and(|e| e
            == Error::invalid_stream(
                "Not enough nitrogen to map the requested XS part of biomass."
            )));
    }
}
