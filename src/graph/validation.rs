// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for validating a [`PlantGraph`].

mod validate_graph;
mod validate_ports;

use crate::{Edge, Error, Node, PlantGraph};

pub(crate) struct PlantGraphValidator<'a, N, E>
where
    N: Node,
    E: Edge,
{
    pg: &'a PlantGraph<N, E>,
    root: &'a N,
}

impl<N, E> PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    pub(super) fn validate(&self) -> Result<(), Error> {
        let Ok(root) = self.unit(self.root_id) else {
            return Err(Error::internal(format!(
                "Influent unit not found with detected unit ID: {}.",
                self.root_id
            )));
        };

        let validator = PlantGraphValidator { pg: self, root };

        validator.validate_acyclicity(root, vec![])?;
        if !self.config.allow_unconnected_units {
            validator.validate_connected_graph(root)?;
        }
        validator.validate_ports()?;
        validator.validate_boundaries()?;

        Ok(())
    }
}
