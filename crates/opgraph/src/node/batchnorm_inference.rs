//! Batch-normalization inference node.

use tracing::debug;

use crate::attributes::{self, Attributes, BatchnormInferenceAttributes, Slot};
use crate::backend::{Backend, NormInferenceIo};
use crate::context::Context;
use crate::error::GraphResult;
use crate::tensor::{Dimensions, TensorArena, UidAllocator};

use super::{
    materialize_slot_tensors, resolved_uid, Node, NodeKind, OperationSink, TensorRegistry,
};

/// Applies per-channel scale and bias to an input normalized with
/// precomputed statistics. Y dims default to X dims; Y strides default to
/// the channels-last rule.
pub struct BatchnormInferenceNode {
    attributes: BatchnormInferenceAttributes,
}

impl BatchnormInferenceNode {
    pub fn new(attributes: BatchnormInferenceAttributes) -> Self {
        BatchnormInferenceNode { attributes }
    }

    pub fn attributes(&self) -> &BatchnormInferenceAttributes {
        &self.attributes
    }
}

impl<B: Backend> Node<B> for BatchnormInferenceNode {
    fn kind(&self) -> NodeKind {
        NodeKind::BatchnormInference
    }

    fn name(&self) -> &str {
        &self.attributes.name
    }

    fn pre_validate(&self, arena: &TensorArena) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "validating batchnorm inference node");
        let name = self.attributes.name.as_str();
        attributes::require_slot(name, Slot::X, self.attributes.x)?;
        attributes::require_slot(name, Slot::Scale, self.attributes.scale)?;
        attributes::require_slot(name, Slot::Bias, self.attributes.bias)?;
        attributes::require_slot(name, Slot::Mean, self.attributes.mean)?;
        attributes::require_slot(name, Slot::InvVariance, self.attributes.inv_variance)?;
        attributes::require_slot(name, Slot::Y, self.attributes.y)?;
        self.attributes.validate_inputs(arena)
    }

    fn expand_and_infer(
        &mut self,
        arena: &mut TensorArena,
        context: &Context,
    ) -> GraphResult<Vec<Box<dyn Node<B>>>> {
        debug!(node = %self.attributes.name, "inferring properties for batchnorm inference node");
        attributes::fill_from_context(&mut self.attributes, context, arena);

        let name = self.attributes.name.as_str();
        let x = attributes::require_slot(name, Slot::X, self.attributes.x)?;
        let y = attributes::require_slot(name, Slot::Y, self.attributes.y)?;

        // Only infer properties the caller left unset.
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
        debug!(node = %self.attributes.name, "building batchnorm inference node tensors");
        materialize_slot_tensors(&self.attributes, arena, backend, uids, registry)
    }

    fn emit_operations(
        &self,
        arena: &TensorArena,
        backend: &B,
        registry: &TensorRegistry<B>,
        sink: &mut OperationSink<B>,
    ) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "building batchnorm inference node operations");
        let name = self.attributes.name.as_str();
        let x = attributes::require_slot(name, Slot::X, self.attributes.x)?;
        let mean = attributes::require_slot(name, Slot::Mean, self.attributes.mean)?;
        let inv_variance =
            attributes::require_slot(name, Slot::InvVariance, self.attributes.inv_variance)?;
        let scale = attributes::require_slot(name, Slot::Scale, self.attributes.scale)?;
        let bias = attributes::require_slot(name, Slot::Bias, self.attributes.bias)?;
        let y = attributes::require_slot(name, Slot::Y, self.attributes.y)?;

        let operation = backend.create_norm_inference_operation(NormInferenceIo {
            x: registry.handle(resolved_uid(arena, x)?)?,
            mean: registry.handle(resolved_uid(arena, mean)?)?,
            inv_variance: registry.handle(resolved_uid(arena, inv_variance)?)?,
            scale: registry.handle(resolved_uid(arena, scale)?)?,
            bias: registry.handle(resolved_uid(arena, bias)?)?,
            y: registry.handle(resolved_uid(arena, y)?)?,
        })?;
        sink.push_operation(operation);
        sink.mark_involved(attributes::non_virtual_uids(&self.attributes, arena));
        Ok(())
    }

    fn attributes_json(&self) -> GraphResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.attributes)?)
    }
}
