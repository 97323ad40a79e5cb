//! Tensor reduction node.

use tracing::debug;

use crate::attributes::{self, Attributes, ReductionAttributes, Slot};
use crate::backend::{Backend, ReductionConfig, ReductionIo};
use crate::context::Context;
use crate::error::{GraphError, GraphResult};
use crate::tensor::{Dimensions, TensorArena, UidAllocator};

use super::{
    materialize_slot_tensors, resolved_uid, Node, NodeKind, OperationSink, TensorRegistry,
};

/// Reduces X into Y with the configured reduction operator. Y dims default
/// to X dims when unset; reduced extents must be supplied by the caller.
pub struct ReductionNode {
    attributes: ReductionAttributes,
}

impl ReductionNode {
    pub fn new(attributes: ReductionAttributes) -> Self {
        ReductionNode { attributes }
    }

    pub fn attributes(&self) -> &ReductionAttributes {
        &self.attributes
    }
}

impl<B: Backend> Node<B> for ReductionNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Reduction
    }

    fn name(&self) -> &str {
        &self.attributes.name
    }

    fn pre_validate(&self, arena: &TensorArena) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "validating reduction node");
        let name = self.attributes.name.as_str();
        attributes::require_slot(name, Slot::X, self.attributes.x)?;
        attributes::require_slot(name, Slot::Y, self.attributes.y)?;
        self.attributes.validate_inputs(arena)
    }

    fn expand_and_infer(
        &mut self,
        arena: &mut TensorArena,
        context: &Context,
    ) -> GraphResult<Vec<Box<dyn Node<B>>>> {
        debug!(node = %self.attributes.name, "inferring properties for reduction node");
        attributes::fill_from_context(&mut self.attributes, context, arena);

        let name = self.attributes.name.as_str();
        let x = attributes::require_slot(name, Slot::X, self.attributes.x)?;
        let y = attributes::require_slot(name, Slot::Y, self.attributes.y)?;

        let x_dims = Dimensions::from_slice(arena.get(x).dims());
        let y_descriptor = arena.get_mut(y);
        if !y_descriptor.has_dims() {
            y_descriptor.set_dims(x_dims.as_slice());
        }
        attributes::default_unset_strides(&self.attributes, arena);

        Ok(Vec::new())
    }

    fn post_validate(&self, arena: &TensorArena) -> GraphResult<()> {
        attributes::validate_resolved_outputs(&self.attributes, arena)
    }

    fn materialize_tensors(
        &self,
        arena: &mut TensorArena,
        backend: &B,
        uids: &mut UidAllocator,
        registry: &mut TensorRegistry<B>,
    ) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "building reduction node tensors");
        materialize_slot_tensors(&self.attributes, arena, backend, uids, registry)
    }

    fn emit_operations(
        &self,
        arena: &TensorArena,
        backend: &B,
        registry: &TensorRegistry<B>,
        sink: &mut OperationSink<B>,
    ) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "building reduction node operations");
        let name = self.attributes.name.as_str();
        let mode = self.attributes.mode.ok_or_else(|| {
            GraphError::invalid_input(format!("node `{name}` has no reduction mode set"))
        })?;

        let descriptor = backend.create_reduction_descriptor(&ReductionConfig {
            compute_type: self.attributes.compute_data_type,
            mode,
        })?;

        let x = attributes::require_slot(name, Slot::X, self.attributes.x)?;
        let y = attributes::require_slot(name, Slot::Y, self.attributes.y)?;

        let operation = backend.create_reduction_operation(
            &descriptor,
            ReductionIo {
                x: registry.handle(resolved_uid(arena, x)?)?,
                y: registry.handle(resolved_uid(arena, y)?)?,
            },
        )?;
        sink.push_operation(operation);
        sink.mark_involved(attributes::non_virtual_uids(&self.attributes, arena));
        Ok(())
    }

    fn attributes_json(&self) -> GraphResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.attributes)?)
    }
}
