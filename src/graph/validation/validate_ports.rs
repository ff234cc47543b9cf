// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for validating that the ports of every unit in a [`PlantGraph`]
//! are connected.

use crate::{unit_category::CategoryPredicates, Edge, Error, Node};

use super::PlantGraphValidator;

impl<N, E> PlantGraphValidator<'_, N, E>
where
    N: Node,
    E: Edge,
{
    /// Validates that every input port of every unit is fed.
    ///
    /// Output ports may be left open, in which case their streams are
    /// discarded.  That is legitimate for sinks only, so it is logged for
    /// other units.
    pub(super) fn validate_ports(&self) -> Result<(), Error> {
        for node in self.pg.units() {
            let id = node.unit_id();

            let mut fed = vec![false; node.input_ports()];
            for connection in self.pg.incoming(id)? {
                if let Some(port) = fed.get_mut(connection.destination_port()) {
                    *port = true;
                }
            }
            if let Some(port) = fed.iter().position(|f| !f) {
                return Err(Error::invalid_graph(format!(
                    "{}:{id} has no connection to input port {port}.",
                    node.category()
                )));
            }

            if node.is_sink() {
                continue;
            }
            let mut used = vec![false; node.output_ports()];
            for connection in self.pg.outgoing(id)? {
                if let Some(port) = used.get_mut(connection.source_port()) {
                    *port = true;
                }
            }
            for port in used.iter().enumerate().filter(|(_, u)| !**u).map(|(p, _)| p) {
                tracing::warn!(
                    unit = %node.category(),
                    id,
                    port,
                    "Output port is not connected. Its stream will be discarded."
                );
            }
        }

        Ok(())
    }
}
