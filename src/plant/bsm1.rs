// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The Benchmark Simulation Model no. 1 layout: two anoxic and three aerobic
//! ASM1 reactors in series, followed by a 10-layer secondary settler, with
//! an internal nitrate recycle and a return sludge recycle.

use crate::units::{
    Asm1Reactor, Asm1ReactorConfig, Combiner, Influent, Settler, SettlerConfig, Sink, Splitter,
};
use crate::{Asm1, Error, PlantGraphConfig, Stream};

use super::{Plant, PlantBuilder, UnitHandle};

/// Internal recycle from the last reactor to the first, m³/d.
pub const INTERNAL_RECYCLE: f64 = 55338.0;
/// Return sludge flow from the settler underflow, m³/d.
pub const RETURN_FLOW: f64 = 18446.0;
/// Waste sludge flow, m³/d.
pub const WASTE_FLOW: f64 = 385.0;

/// Reactor volumes, m³.
pub const REACTOR_VOLUMES: [f64; 5] = [1000.0, 1000.0, 1333.0, 1333.0, 1333.0];
/// Oxygen transfer coefficients, 1/d.
pub const REACTOR_KLA: [f64; 5] = [0.0, 0.0, 240.0, 240.0, 84.0];

/// A BSM1 plant together with the handles of its notable units.
pub struct Bsm1 {
    pub plant: Plant,
    pub influent: UnitHandle,
    pub reactors: [UnitHandle; 5],
    pub settler: UnitHandle,
    pub effluent: UnitHandle,
    pub waste: UnitHandle,
}

/// The constant BSM1 influent.
pub fn constant_influent() -> Stream {
    let mut s = Stream::zeros();
    s[Asm1::Si] = 30.0;
    s[Asm1::Ss] = 69.5;
    s[Asm1::Xi] = 51.2;
    s[Asm1::Xs] = 202.32;
    s[Asm1::Xbh] = 28.17;
    s[Asm1::Snh] = 31.56;
    s[Asm1::Snd] = 6.95;
    s[Asm1::Xnd] = 10.59;
    s[Asm1::Salk] = 7.0;
    s[Asm1::Tss] = 211.2675;
    s[Asm1::Temp] = 15.0;
    s.with_flow(18446.0)
}

/// A mixed-liquor state the reactors start from.
fn initial_mixed_liquor() -> Stream {
    let mut s = Stream::zeros();
    s[Asm1::Si] = 30.0;
    s[Asm1::Ss] = 2.0;
    s[Asm1::Xi] = 1149.0;
    s[Asm1::Xs] = 55.0;
    s[Asm1::Xbh] = 2552.0;
    s[Asm1::Xba] = 149.0;
    s[Asm1::Xp] = 450.0;
    s[Asm1::So] = 1.0;
    s[Asm1::Sno] = 8.0;
    s[Asm1::Snh] = 3.0;
    s[Asm1::Snd] = 0.8;
    s[Asm1::Xnd] = 4.0;
    s[Asm1::Salk] = 4.5;
    s[Asm1::Tss] = 3266.0;
    s[Asm1::Temp] = 15.0;
    s
}

/// Builds the open-loop BSM1 plant.
///
/// Units: the influent, a three-way combiner (influent, internal recycle,
/// return sludge), five reactors, a splitter sending the internal recycle
/// back, the settler, and sinks for the effluent and the waste sludge.  Both
/// recycles are feedback connections.
pub fn open_loop() -> Result<Bsm1, Error> {
    let mut builder = PlantBuilder::new();

    let influent = builder.add_unit(Influent::new());
    let combiner = builder.add_unit(Combiner::new(3)?);
    builder.connect(influent, 0, combiner, 0);

    let mut reactors = [combiner; 5];
    let mut previous = combiner;
    for (i, reactor) in reactors.iter_mut().enumerate() {
        let config = Asm1ReactorConfig {
            initial_state: initial_mixed_liquor(),
            ..Asm1ReactorConfig::new(REACTOR_VOLUMES[i], REACTOR_KLA[i])
        };
        *reactor = builder.add_unit(Asm1Reactor::new(config)?);
        builder.connect(previous, 0, *reactor, 0);
        previous = *reactor;
    }

    let splitter = builder.add_unit(Splitter::threshold(INTERNAL_RECYCLE)?);
    let settler = builder.add_unit(Settler::new(SettlerConfig {
        return_flow: RETURN_FLOW,
        waste_flow: WASTE_FLOW,
        ..Default::default()
    })?);
    let effluent = builder.add_unit(Sink::new());
    let waste = builder.add_unit(Sink::new());

    builder
        .connect(previous, 0, splitter, 0)
        .connect_feedback(splitter, 0, combiner, 1)
        .connect(splitter, 1, settler, 0)
        .connect(settler, 0, effluent, 0)
        .connect_feedback(settler, 1, combiner, 2)
        .connect(settler, 2, waste, 0);

    let plant = builder.build(PlantGraphConfig::default())?;

    Ok(Bsm1 {
        plant,
        influent,
        reactors,
        settler,
        effluent,
        waste,
    })
}
