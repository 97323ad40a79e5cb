//! Convolution backward-data ("dgrad") node.

use tracing::debug;

use crate::attributes::{self, Attributes, ConvBackwardDataAttributes, Slot};
use crate::backend::{Backend, ConvBackwardDataIo, ConvolutionConfig, ConvolutionMode};
use crate::context::Context;
use crate::error::GraphResult;
use crate::tensor::{TensorArena, UidAllocator};

use super::{
    materialize_slot_tensors, resolved_uid, Node, NodeKind, OperationSink, TensorRegistry,
};

/// Computes the data gradient DX from DY and the filter W.
///
/// The inverse mapping from (W, DY) to the DX shape is not unique, so DX
/// dimensions are never inferred; the caller must supply them. Only the DX
/// strides are defaulted, and only once the dims are known.
pub struct ConvBackwardDataNode {
    attributes: ConvBackwardDataAttributes,
}

impl ConvBackwardDataNode {
    pub fn new(attributes: ConvBackwardDataAttributes) -> Self {
        ConvBackwardDataNode { attributes }
    }

    pub fn attributes(&self) -> &ConvBackwardDataAttributes {
        &self.attributes
    }
}

impl<B: Backend> Node<B> for ConvBackwardDataNode {
    fn kind(&self) -> NodeKind {
        NodeKind::ConvBackwardData
    }

    fn name(&self) -> &str {
        &self.attributes.name
    }

    fn pre_validate(&self, arena: &TensorArena) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "validating conv backward-data node");
        let name = self.attributes.name.as_str();
        attributes::require_slot(name, Slot::Dy, self.attributes.dy)?;
        attributes::require_slot(name, Slot::W, self.attributes.w)?;
        attributes::require_slot(name, Slot::Dx, self.attributes.dx)?;
        self.attributes.validate_inputs(arena)
    }

    fn expand_and_infer(
        &mut self,
        arena: &mut TensorArena,
        context: &Context,
    ) -> GraphResult<Vec<Box<dyn Node<B>>>> {
        debug!(node = %self.attributes.name, "inferring properties for conv backward-data node");
        attributes::fill_from_context(&mut self.attributes, context, arena);

        // No dim inference: (W, DY) -> DX is not invertible. Strides still
        // default once the caller-supplied dims are in place.
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
        debug!(node = %self.attributes.name, "building conv backward-data node tensors");
        materialize_slot_tensors(&self.attributes, arena, backend, uids, registry)
    }

    fn emit_operations(
        &self,
        arena: &TensorArena,
        backend: &B,
        registry: &TensorRegistry<B>,
        sink: &mut OperationSink<B>,
    ) -> GraphResult<()> {
        debug!(node = %self.attributes.name, "building conv backward-data node operations");
        let descriptor = backend.create_convolution_descriptor(&ConvolutionConfig {
            compute_type: self.attributes.compute_data_type,
            mode: ConvolutionMode::CrossCorrelation,
            spatial_stride: self.attributes.stride.clone(),
            pre_padding: self.attributes.padding.clone(),
            post_padding: self.attributes.padding.clone(),
            dilation: self.attributes.dilation.clone(),
        })?;

        let name = self.attributes.name.as_str();
        let dx = attributes::require_slot(name, Slot::Dx, self.attributes.dx)?;
        let w = attributes::require_slot(name, Slot::W, self.attributes.w)?;
        let dy = attributes::require_slot(name, Slot::Dy, self.attributes.dy)?;

        let operation = backend.create_conv_backward_data_operation(
            &descriptor,
            ConvBackwardDataIo {
                dx: registry.handle(resolved_uid(arena, dx)?)?,
                w: registry.handle(resolved_uid(arena, w)?)?,
                dy: registry.handle(resolved_uid(arena, dy)?)?,
            },
            1.0,
            0.0,
        )?;
        sink.push_operation(operation);
        sink.mark_involved(attributes::non_virtual_uids(&self.attributes, arena));
        Ok(())
    }

    fn attributes_json(&self) -> GraphResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.attributes)?)
    }
}
