// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains the traits that need to be implemented by the types
//! that represent a node and an edge.

use crate::unit_category::UnitCategory;

/**
This trait needs to be implemented by the type that represents a node.

Read more about why this is necessary [here][crate#the-node-and-edge-traits].

<details>
<summary>Example implementation for a unit description loaded by an application:</summary>

```ignore
impl wwtp_bsm::Node for app::UnitSpec {
    fn unit_id(&self) -> u64 {
        self.id
    }

    fn category(&self) -> wwtp_bsm::UnitCategory {
        match self.kind {
            app::UnitKind::Influent => wwtp_bsm::UnitCategory::Influent,
            app::UnitKind::Effluent | app::UnitKind::Sludge => wwtp_bsm::UnitCategory::Sink,
            app::UnitKind::Mixer => wwtp_bsm::UnitCategory::Combiner,
            app::UnitKind::Bioreactor => wwtp_bsm::UnitCategory::Asm1Reactor,
            app::UnitKind::Clarifier => wwtp_bsm::UnitCategory::Settler,
            // ...
        }
    }

    fn input_ports(&self) -> usize {
        self.inlets.len()
    }

    fn output_ports(&self) -> usize {
        self.outlets.len()
    }
}
```

</details>
*/
pub trait Node {
    /// Returns the ID of the unit.
    fn unit_id(&self) -> u64;

    /// Returns the category of the unit.
    fn category(&self) -> UnitCategory;

    /// Returns the number of streams the unit consumes per step.
    fn input_ports(&self) -> usize;

    /// Returns the number of streams the unit produces per step.
    fn output_ports(&self) -> usize;
}

/**
This trait needs to be implemented by the type that represents an edge.

Read more about why this is necessary [here][crate#the-node-and-edge-traits].

An edge carries the stream produced on one output port of its source unit to
one input port of its destination unit.  Edges marked as feedback deliver the
value their source produced in the *previous* step, which is what allows
recycle loops in a plant to be evaluated in a single pass.

<details>
<summary>Example implementation:</summary>

```ignore
impl wwtp_bsm::Edge for app::Pipe {
    fn source(&self) -> u64 {
        self.from.unit
    }

    fn destination(&self) -> u64 {
        self.to.unit
    }

    fn source_port(&self) -> usize {
        self.from.port
    }

    fn destination_port(&self) -> usize {
        self.to.port
    }

    fn is_feedback(&self) -> bool {
        self.recycle
    }
}
```

</details>
*/
pub trait Edge {
    /// Returns the ID of the source unit.
    fn source(&self) -> u64;

    /// Returns the ID of the destination unit.
    fn destination(&self) -> u64;

    /// Returns the output port of the source unit.
    fn source_port(&self) -> usize {
        0
    }

    /// Returns the input port of the destination unit.
    fn destination_port(&self) -> usize {
        0
    }

    /// Returns `true` if the edge closes a recycle loop.
    fn is_feedback(&self) -> bool {
        false
    }
}
