//! Graph assembler: orders nodes, drives the phase pipeline, and collects
//! the emitted backend operations.
//!
//! A [`Graph`] owns the tensor arena, the shared context, and the node
//! list. [`Graph::build`] consumes the graph: every node runs
//! pre-validate, expand-and-infer, then post-validate (sub-nodes of a
//! composite complete the full sequence, depth-first, before their
//! parent's post-validate), after which each leaf materializes its
//! tensors and emits its operations. The first failure aborts the build,
//! wrapped with the node name and phase.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::attributes::{
    BatchnormInferenceAttributes, ConvBackwardDataAttributes, ReductionAttributes,
};
use crate::backend::Backend;
use crate::context::Context;
use crate::error::{GraphResult, Phase};
use crate::node::{
    BatchnormInferenceNode, ConvBackwardDataNode, Node, OperationSink, ReductionNode,
    TensorRegistry,
};
use crate::tensor::{TensorArena, TensorDescriptor, TensorId, Uid, UidAllocator};

/// Mutable graph under construction.
pub struct Graph<B: Backend> {
    context: Context,
    arena: TensorArena,
    nodes: Vec<Box<dyn Node<B>>>,
}

impl<B: Backend> Graph<B> {
    pub fn new(context: Context) -> Self {
        Graph {
            context,
            arena: TensorArena::new(),
            nodes: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Adds a caller-facing tensor and returns its handle.
    pub fn tensor(&mut self, descriptor: TensorDescriptor) -> TensorId {
        self.arena.insert(descriptor)
    }

    pub fn descriptor(&self, id: TensorId) -> &TensorDescriptor {
        self.arena.get(id)
    }

    /// Mutable descriptor access, for callers that must supply properties
    /// the frontend cannot infer (e.g. the dgrad output dims).
    pub fn descriptor_mut(&mut self, id: TensorId) -> &mut TensorDescriptor {
        self.arena.get_mut(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Appends an externally constructed node.
    pub fn push_node(&mut self, node: Box<dyn Node<B>>) {
        self.nodes.push(node);
    }

    /// Adds a batch-normalization inference node. When the caller left the
    /// Y slot absent, an unresolved output descriptor is synthesized; its
    /// properties are inferred during expansion.
    pub fn batchnorm_inference(&mut self, mut attributes: BatchnormInferenceAttributes) -> TensorId {
        let y = attributes.y.unwrap_or_else(|| {
            self.arena
                .insert(TensorDescriptor::new(format!("{}::Y", attributes.name)))
        });
        attributes.y = Some(y);
        self.nodes
            .push(Box::new(BatchnormInferenceNode::new(attributes)));
        y
    }

    /// Adds a convolution backward-data node. A synthesized DX descriptor
    /// starts with no dims; the caller must set them via
    /// [`descriptor_mut`](Graph::descriptor_mut) before building, as the
    /// frontend never infers them.
    pub fn conv_backward_data(&mut self, mut attributes: ConvBackwardDataAttributes) -> TensorId {
        let dx = attributes.dx.unwrap_or_else(|| {
            self.arena
                .insert(TensorDescriptor::new(format!("{}::DX", attributes.name)))
        });
        attributes.dx = Some(dx);
        self.nodes
            .push(Box::new(ConvBackwardDataNode::new(attributes)));
        dx
    }

    /// Adds a reduction node, synthesizing the Y descriptor when absent.
    pub fn reduction(&mut self, mut attributes: ReductionAttributes) -> TensorId {
        let y = attributes.y.unwrap_or_else(|| {
            self.arena
                .insert(TensorDescriptor::new(format!("{}::Y", attributes.name)))
        });
        attributes.y = Some(y);
        self.nodes.push(Box::new(ReductionNode::new(attributes)));
        y
    }

    /// Serializes the abstract (pre-resolution) graph: context, tensor
    /// descriptors, and each node's kind and attribute bag. Intended for
    /// caching and debugging, not for resuming a build.
    pub fn to_json(&self) -> GraphResult<serde_json::Value> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                Ok(json!({
                    "kind": node.kind(),
                    "name": node.name(),
                    "attributes": node.attributes_json()?,
                }))
            })
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(json!({
            "context": self.context,
            "tensors": &self.arena,
            "nodes": nodes,
        }))
    }

    /// Runs the full pipeline and lowers the graph onto `backend`.
    pub fn build(mut self, backend: &B) -> GraphResult<OperationGraph<B>> {
        debug!(nodes = self.nodes.len(), "building operation graph");

        let mut leaves: Vec<Box<dyn Node<B>>> = Vec::new();
        for node in std::mem::take(&mut self.nodes) {
            leaves.extend(validate_and_expand(node, &mut self.arena, &self.context)?);
        }

        let mut uids = UidAllocator::new();
        let mut registry = TensorRegistry::new();
        let mut sink = OperationSink::new();
        for node in &leaves {
            let name = node.name().to_string();
            node.materialize_tensors(&mut self.arena, backend, &mut uids, &mut registry)
                .map_err(|err| err.in_phase(&name, Phase::CreateTensors))?;
            node.emit_operations(&self.arena, backend, &registry, &mut sink)
                .map_err(|err| err.in_phase(&name, Phase::CreateOperations))?;
        }

        let (operations, uids_involved) = sink.into_parts();
        debug!(
            operations = operations.len(),
            tensors = registry.len(),
            "operation graph complete"
        );
        Ok(OperationGraph {
            operations,
            tensors: registry.into_handles(),
            uids_involved,
            arena: self.arena,
        })
    }
}

/// Validates and expands one node, returning the leaves to emit. Sub-nodes
/// of a composite run the full sequence depth-first before the parent's
/// post-validation; a composite itself is replaced by its leaves.
fn validate_and_expand<B: Backend>(
    mut node: Box<dyn Node<B>>,
    arena: &mut TensorArena,
    context: &Context,
) -> GraphResult<Vec<Box<dyn Node<B>>>> {
    let name = node.name().to_string();
    node.pre_validate(arena)
        .map_err(|err| err.in_phase(&name, Phase::PreValidate))?;
    let sub_nodes = node
        .expand_and_infer(arena, context)
        .map_err(|err| err.in_phase(&name, Phase::ExpandAndInfer))?;

    let composite = !sub_nodes.is_empty();
    let mut leaves = Vec::new();
    for sub_node in sub_nodes {
        leaves.extend(validate_and_expand(sub_node, arena, context)?);
    }

    node.post_validate(arena)
        .map_err(|err| err.in_phase(&name, Phase::PostValidate))?;

    if composite {
        Ok(leaves)
    } else {
        Ok(vec![node])
    }
}

/// Immutable result of a successful build: the emitted operations, the
/// uid-indexed backend tensors, the uids participating in real operations,
/// and the resolved descriptors.
pub struct OperationGraph<B: Backend> {
    operations: Vec<Arc<B::Operation>>,
    tensors: BTreeMap<Uid, B::TensorHandle>,
    uids_involved: BTreeSet<Uid>,
    arena: TensorArena,
}

impl<B: Backend> OperationGraph<B> {
    /// Operations in emission order. Shareable across threads.
    pub fn operations(&self) -> &[Arc<B::Operation>] {
        &self.operations
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn tensor(&self, uid: Uid) -> Option<&B::TensorHandle> {
        self.tensors.get(&uid)
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Uids of tensors bound into real (non-virtual) operations.
    pub fn uids_involved_in_operations(&self) -> &BTreeSet<Uid> {
        &self.uids_involved
    }

    /// Resolved descriptors, for inspecting inferred dims and strides.
    pub fn arena(&self) -> &TensorArena {
        &self.arena
    }
}

impl<B: Backend> fmt::Debug for OperationGraph<B>
where
    B::TensorHandle: fmt::Debug,
    B::Operation: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationGraph")
            .field("operations", &self.operations)
            .field("tensors", &self.tensors)
            .field("uids_involved", &self.uids_involved)
            .finish()
    }
}
