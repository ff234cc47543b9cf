// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The Benchmark Simulation Model no. 2 layout: the BSM1 activated sludge
//! line behind a primary clarifier, with the sludge line of a thickener, an
//! anaerobic digester, dewatering and a reject water storage tank.
//!
//! Flows above [`BYPASS_THRESHOLD`] skip the primary clarifier and go
//! straight to the activated sludge line.  Thickener overflow and stored
//! reject water return ahead of the primary clarifier.

use crate::units::{
    Adm1Digester, Asm1Reactor, Asm1ReactorConfig, Combiner, DigesterConfig, Influent,
    OxygenControl, PrimaryClarifier, PrimaryClarifierConfig, Separator, Settler, SettlerConfig,
    Sink, Splitter, Storage, StorageConfig,
};
use crate::{Asm1, Error, PlantGraphConfig, Stream};

use super::{Plant, PlantBuilder, UnitHandle};

/// Influent flow above which the excess bypasses the primary clarifier,
/// m³/d.
pub const BYPASS_THRESHOLD: f64 = 60000.0;
/// Internal recycle from the last reactor to the first, m³/d.
pub const INTERNAL_RECYCLE: f64 = 61944.0;
/// Return sludge flow from the settler underflow, m³/d.
pub const RETURN_FLOW: f64 = 20648.0;
/// Waste sludge flow, m³/d.
pub const WASTE_FLOW: f64 = 300.0;

/// Reactor volumes, m³.
pub const REACTOR_VOLUMES: [f64; 5] = [1500.0, 1500.0, 3000.0, 3000.0, 3000.0];
/// Oxygen transfer coefficients, 1/d.
pub const REACTOR_KLA: [f64; 5] = [0.0, 0.0, 120.0, 120.0, 60.0];
/// The reactor carrying the oxygen sensor in [`closed_loop`].
pub const CONTROLLED_REACTOR: usize = 3;

/// A BSM2 plant together with the handles of its notable units.
pub struct Bsm2 {
    pub plant: Plant,
    pub influent: UnitHandle,
    pub primary_clarifier: UnitHandle,
    pub reactors: [UnitHandle; 5],
    pub settler: UnitHandle,
    pub thickener: UnitHandle,
    pub digester: UnitHandle,
    pub dewatering: UnitHandle,
    pub storage: UnitHandle,
    pub effluent: UnitHandle,
    pub sludge: UnitHandle,
}

/// The flow-weighted average of the BSM2 dynamic influent.
pub fn constant_influent() -> Stream {
    let mut s = Stream::zeros();
    s[Asm1::Si] = 27.2262;
    s[Asm1::Ss] = 58.1762;
    s[Asm1::Xi] = 92.4991;
    s[Asm1::Xs] = 363.9430;
    s[Asm1::Xbh] = 50.6832;
    s[Asm1::Snh] = 23.8595;
    s[Asm1::Snd] = 5.6516;
    s[Asm1::Xnd] = 16.1298;
    s[Asm1::Salk] = 7.0;
    s[Asm1::Tss] = 380.3399;
    s[Asm1::Temp] = 14.8581;
    s.with_flow(20648.3616)
}

fn initial_mixed_liquor() -> Stream {
    let mut s = Stream::zeros();
    s[Asm1::Si] = 28.0643;
    s[Asm1::Ss] = 3.0503;
    s[Asm1::Xi] = 1532.3;
    s[Asm1::Xs] = 63.0433;
    s[Asm1::Xbh] = 2245.1;
    s[Asm1::Xba] = 166.6699;
    s[Asm1::Xp] = 964.8992;
    s[Asm1::So] = 0.0093;
    s[Asm1::Sno] = 3.9350;
    s[Asm1::Snh] = 6.8924;
    s[Asm1::Snd] = 0.9580;
    s[Asm1::Xnd] = 3.8453;
    s[Asm1::Salk] = 5.4213;
    s[Asm1::Tss] = 3729.0;
    s[Asm1::Temp] = 14.8581;
    s
}

/// Builds the open-loop BSM2 plant, with fixed aeration in every reactor.
pub fn open_loop() -> Result<Bsm2, Error> {
    build(None)
}

/// Builds the BSM2 plant with a PI controller holding the dissolved oxygen
/// of the fourth reactor at `control.setpoint`.  The other reactors keep
/// their fixed aeration.
pub fn closed_loop(control: OxygenControl) -> Result<Bsm2, Error> {
    build(Some(control))
}

fn build(oxygen_control: Option<OxygenControl>) -> Result<Bsm2, Error> {
    let mut builder = PlantBuilder::new();

    let influent = builder.add_unit(Influent::new());
    let bypass = builder.add_unit(Splitter::threshold(BYPASS_THRESHOLD)?);
    // Influent, thickener overflow, stored reject water.
    let pre_primary = builder.add_unit(Combiner::new(3)?);
    let primary_clarifier =
        builder.add_unit(PrimaryClarifier::new(PrimaryClarifierConfig::default())?);
    // Primary effluent, bypass, internal recycle, return sludge.
    let reactor_feed = builder.add_unit(Combiner::new(4)?);
    builder
        .connect(influent, 0, bypass, 0)
        .connect(bypass, 0, pre_primary, 0)
        .connect(pre_primary, 0, primary_clarifier, 0)
        .connect(primary_clarifier, 0, reactor_feed, 0)
        .connect(bypass, 1, reactor_feed, 1);

    let mut reactors = [reactor_feed; 5];
    let mut previous = reactor_feed;
    for (i, reactor) in reactors.iter_mut().enumerate() {
        let config = Asm1ReactorConfig {
            initial_state: initial_mixed_liquor(),
            oxygen_control: oxygen_control
                .clone()
                .filter(|_| i == CONTROLLED_REACTOR),
            ..Asm1ReactorConfig::new(REACTOR_VOLUMES[i], REACTOR_KLA[i])
        };
        *reactor = builder.add_unit(Asm1Reactor::new(config)?);
        builder.connect(previous, 0, *reactor, 0);
        previous = *reactor;
    }

    let recycle = builder.add_unit(Splitter::threshold(INTERNAL_RECYCLE)?);
    let settler = builder.add_unit(Settler::new(SettlerConfig {
        return_flow: RETURN_FLOW,
        waste_flow: WASTE_FLOW,
        ..Default::default()
    })?);
    let effluent = builder.add_unit(Sink::new());
    builder
        .connect(previous, 0, recycle, 0)
        .connect_feedback(recycle, 0, reactor_feed, 2)
        .connect(recycle, 1, settler, 0)
        .connect(settler, 0, effluent, 0)
        .connect_feedback(settler, 1, reactor_feed, 3);

    let thickener = builder.add_unit(Separator::thickener());
    // Thickened waste sludge, primary sludge.
    let digester_feed = builder.add_unit(Combiner::new(2)?);
    let digester = builder.add_unit(Adm1Digester::new(DigesterConfig::default())?);
    let dewatering = builder.add_unit(Separator::dewatering());
    let sludge = builder.add_unit(Sink::new());
    let storage = builder.add_unit(Storage::new(StorageConfig::default())?);
    builder
        .connect(settler, 2, thickener, 0)
        .connect(thickener, 0, digester_feed, 0)
        .connect_feedback(thickener, 1, pre_primary, 1)
        .connect(primary_clarifier, 1, digester_feed, 1)
        .connect(digester_feed, 0, digester, 0)
        .connect(digester, 0, dewatering, 0)
        .connect(dewatering, 0, sludge, 0)
        .connect(dewatering, 1, storage, 0)
        .connect_feedback(storage, 0, pre_primary, 2);

    let plant = builder.build(PlantGraphConfig::default())?;

    Ok(Bsm2 {
        plant,
        influent,
        primary_clarifier,
        reactors,
        settler,
        thickener,
        digester,
        dewatering,
        storage,
        effluent,
        sludge,
    })
}
