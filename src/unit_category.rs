// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module defines the `UnitCategory` enum, which represents the
//! category of a process unit.

use crate::graph_traits::Node;
use std::fmt::Display;

/// Represents the category of a process unit in a plant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitCategory {
    /// The plant influent.  Every plant has exactly one.
    Influent,
    /// A terminal stream: effluent, wasted sludge, reject water.
    Sink,
    Combiner,
    Splitter,
    PrimaryClarifier,
    Asm1Reactor,
    Settler,
    Adm1Digester,
    Thickener,
    Dewatering,
    Storage,
}

impl Display for UnitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitCategory::Influent => write!(f, "Influent"),
            UnitCategory::Sink => write!(f, "Sink"),
            UnitCategory::Combiner => write!(f, "Combiner"),
            UnitCategory::Splitter => write!(f, "Splitter"),
            UnitCategory::PrimaryClarifier => write!(f, "PrimaryClarifier"),
            UnitCategory::Asm1Reactor => write!(f, "ASM1Reactor"),
            UnitCategory::Settler => write!(f, "Settler"),
            UnitCategory::Adm1Digester => write!(f, "ADM1Digester"),
            UnitCategory::Thickener => write!(f, "Thickener"),
            UnitCategory::Dewatering => write!(f, "Dewatering"),
            UnitCategory::Storage => write!(f, "Storage"),
        }
    }
}

/// Predicates for checking the unit category of a `Node`.
pub(crate) trait CategoryPredicates: Node {
    fn is_influent(&self) -> bool {
        self.category() == UnitCategory::Influent
    }

    fn is_sink(&self) -> bool {
        self.category() == UnitCategory::Sink
    }
}

impl<T: Node> CategoryPredicates for T {}
