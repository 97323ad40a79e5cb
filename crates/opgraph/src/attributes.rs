//! Per-operator attribute bags: named tensor slots plus scalar parameters.
//!
//! Each node wraps exactly one bag. Slots are explicit `Option<TensorId>`
//! fields: absent (`None`) is a valid state for optional slots and is
//! distinct from "present but not yet resolved". Bags serialize in their
//! abstract, pre-resolution form for graph caching and debugging.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::ReductionMode;
use crate::context::Context;
use crate::datatype::DataType;
use crate::error::{GraphError, GraphResult};
use crate::tensor::{TensorArena, TensorId, Uid};

/// Logical slot names across all operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    X,
    Scale,
    Bias,
    Mean,
    InvVariance,
    Y,
    Dy,
    W,
    Dx,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::X => "X",
            Slot::Scale => "SCALE",
            Slot::Bias => "BIAS",
            Slot::Mean => "MEAN",
            Slot::InvVariance => "INV_VARIANCE",
            Slot::Y => "Y",
            Slot::Dy => "DY",
            Slot::W => "W",
            Slot::Dx => "DX",
        };
        f.write_str(name)
    }
}

/// Common surface every attribute bag exposes to the node machinery.
pub trait Attributes {
    fn name(&self) -> &str;

    fn compute_data_type(&self) -> Option<DataType>;

    fn set_compute_data_type(&mut self, data_type: DataType);

    /// Input slots in declaration order, including absent ones.
    fn inputs(&self) -> Vec<(Slot, Option<TensorId>)>;

    /// Output slots in declaration order, including absent ones.
    fn outputs(&self) -> Vec<(Slot, Option<TensorId>)>;

    /// Operator-specific structural invariants checked during
    /// pre-validation. Slot presence is checked separately by the node.
    fn validate_inputs(&self, _arena: &TensorArena) -> GraphResult<()> {
        Ok(())
    }
}

/// Fails with `InvalidInput` when a required slot was left absent.
pub(crate) fn require_slot(
    node: &str,
    slot: Slot,
    id: Option<TensorId>,
) -> GraphResult<TensorId> {
    id.ok_or_else(|| {
        GraphError::invalid_input(format!("node `{node}` is missing required tensor `{slot}`"))
    })
}

/// Pulls unset properties from the graph context.
///
/// The attribute compute type falls back to the context compute type, then
/// to the intermediate type. Tensors without an element type take the
/// intermediate type when virtual and the I/O type otherwise.
pub(crate) fn fill_from_context(
    attributes: &mut (impl Attributes + ?Sized),
    context: &Context,
    arena: &mut TensorArena,
) {
    if attributes.compute_data_type().is_none() {
        if let Some(data_type) = context
            .compute_data_type()
            .or_else(|| context.intermediate_data_type())
        {
            attributes.set_compute_data_type(data_type);
        }
    }

    let slots: Vec<_> = attributes
        .inputs()
        .into_iter()
        .chain(attributes.outputs())
        .collect();
    for (_, id) in slots {
        let Some(id) = id else { continue };
        let descriptor = arena.get_mut(id);
        if descriptor.data_type().is_some() {
            continue;
        }
        let default = if descriptor.is_virtual() {
            context.intermediate_data_type()
        } else {
            context.io_data_type()
        };
        if let Some(data_type) = default {
            descriptor.set_data_type(data_type);
        }
    }
}

/// Assigns default channels-last strides to every present slot tensor
/// whose dims are known but whose strides were left unset. This is the
/// single stride normalization point; strides are never recomputed once
/// set. Tensors with unresolved dims are skipped and surface in
/// post-validation instead.
pub(crate) fn default_unset_strides(
    attributes: &(impl Attributes + ?Sized),
    arena: &mut TensorArena,
) {
    for (_, id) in attributes
        .inputs()
        .into_iter()
        .chain(attributes.outputs())
    {
        let Some(id) = id else { continue };
        let descriptor = arena.get_mut(id);
        if descriptor.has_dims() && !descriptor.has_strides() {
            let strides = crate::layout::default_channels_last_strides(descriptor.dims());
            descriptor.set_strides(strides);
        }
    }
}

/// Post-expansion check that every present output slot carries fully
/// determined dims and strides.
pub(crate) fn validate_resolved_outputs(
    attributes: &(impl Attributes + ?Sized),
    arena: &TensorArena,
) -> GraphResult<()> {
    for (slot, id) in attributes.outputs() {
        let Some(id) = id else { continue };
        let descriptor = arena.get(id);
        if !descriptor.has_dims() {
            return Err(GraphError::invalid_input(format!(
                "output tensor `{slot}` of node `{}` has unresolved dimensions",
                attributes.name()
            )));
        }
        if !descriptor.has_strides() {
            return Err(GraphError::invalid_input(format!(
                "output tensor `{slot}` of node `{}` has unresolved strides",
                attributes.name()
            )));
        }
    }
    Ok(())
}

/// Uids of every present, non-virtual slot tensor. Only meaningful after
/// materialization has assigned uids.
pub(crate) fn non_virtual_uids(
    attributes: &(impl Attributes + ?Sized),
    arena: &TensorArena,
) -> Vec<Uid> {
    attributes
        .inputs()
        .into_iter()
        .chain(attributes.outputs())
        .filter_map(|(_, id)| id)
        .filter_map(|id| {
            let descriptor = arena.get(id);
            if descriptor.is_virtual() {
                None
            } else {
                descriptor.uid()
            }
        })
        .collect()
}

/// Attributes of a batch-normalization inference node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchnormInferenceAttributes {
    pub name: String,
    pub compute_data_type: Option<DataType>,
    pub x: Option<TensorId>,
    pub scale: Option<TensorId>,
    pub bias: Option<TensorId>,
    pub mean: Option<TensorId>,
    pub inv_variance: Option<TensorId>,
    pub y: Option<TensorId>,
}

impl Attributes for BatchnormInferenceAttributes {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_data_type(&self) -> Option<DataType> {
        self.compute_data_type
    }

    fn set_compute_data_type(&mut self, data_type: DataType) {
        self.compute_data_type = Some(data_type);
    }

    fn inputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![
            (Slot::X, self.x),
            (Slot::Scale, self.scale),
            (Slot::Bias, self.bias),
            (Slot::Mean, self.mean),
            (Slot::InvVariance, self.inv_variance),
        ]
    }

    fn outputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![(Slot::Y, self.y)]
    }
}

/// Attributes of a convolution backward-data ("dgrad") node.
///
/// Padding, stride, and dilation are ordered per spatial axis; the spatial
/// dimension count is the padding length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvBackwardDataAttributes {
    pub name: String,
    pub compute_data_type: Option<DataType>,
    pub padding: Vec<i64>,
    pub stride: Vec<i64>,
    pub dilation: Vec<i64>,
    pub dy: Option<TensorId>,
    pub w: Option<TensorId>,
    pub dx: Option<TensorId>,
}

impl Attributes for ConvBackwardDataAttributes {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_data_type(&self) -> Option<DataType> {
        self.compute_data_type
    }

    fn set_compute_data_type(&mut self, data_type: DataType) {
        self.compute_data_type = Some(data_type);
    }

    fn inputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![(Slot::Dy, self.dy), (Slot::W, self.w)]
    }

    fn outputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![(Slot::Dx, self.dx)]
    }

    fn validate_inputs(&self, _arena: &TensorArena) -> GraphResult<()> {
        if self.padding.is_empty() {
            return Err(GraphError::invalid_input(format!(
                "node `{}` has no padding; spatial dimension count cannot be derived",
                self.name
            )));
        }
        let spatial = self.padding.len();
        if self.stride.len() != spatial || self.dilation.len() != spatial {
            return Err(GraphError::invalid_input(format!(
                "node `{}` spatial parameter lengths disagree: padding {}, stride {}, dilation {}",
                self.name,
                spatial,
                self.stride.len(),
                self.dilation.len()
            )));
        }
        Ok(())
    }
}

/// Attributes of a tensor reduction node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReductionAttributes {
    pub name: String,
    pub compute_data_type: Option<DataType>,
    pub mode: Option<ReductionMode>,
    pub x: Option<TensorId>,
    pub y: Option<TensorId>,
}

impl Attributes for ReductionAttributes {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_data_type(&self) -> Option<DataType> {
        self.compute_data_type
    }

    fn set_compute_data_type(&mut self, data_type: DataType) {
        self.compute_data_type = Some(data_type);
    }

    fn inputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![(Slot::X, self.x)]
    }

    fn outputs(&self) -> Vec<(Slot, Option<TensorId>)> {
        vec![(Slot::Y, self.y)]
    }

    fn validate_inputs(&self, _arena: &TensorArena) -> GraphResult<()> {
        if self.mode.is_none() {
            return Err(GraphError::invalid_input(format!(
                "node `{}` has no reduction mode set",
                self.name
            )));
        }
        Ok(())
    }
}
