// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The process units a plant is assembled from.

mod adm1;
mod asm1;
mod boundary;
mod combiner;
mod interface;
mod primary_clarifier;
mod separator;
mod settler;
mod splitter;
mod storage;

pub use adm1::{
    gas_flow, Adm1, Adm1Digester, Adm1Params, DigesterConfig, DigesterOutput, SolveDiagnostics,
    SolveStats, ADM1_STATES, DIGESTER_OUTPUT_LEN,
};
pub use asm1::{Asm1Params, Asm1Reactor, Asm1ReactorConfig, OxygenControl};
pub use boundary::{Influent, Sink};
pub use combiner::Combiner;
pub use interface::{adm_to_asm, asm_to_adm, AdmStream, InterfaceParams};
pub use primary_clarifier::{PrimaryClarifier, PrimaryClarifierConfig};
pub use separator::{Separator, SeparatorParams};
pub use settler::{Settler, SettlerConfig, SettlerOutput, SettlerParams, SolubleTransport};
pub use splitter::{SplitMode, Splitter};
pub use storage::{Storage, StorageConfig};
