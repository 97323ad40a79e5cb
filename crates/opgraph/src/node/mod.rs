//! The four-phase node contract and the machinery shared by all variants.
//!
//! A node wraps one attribute bag and moves through four ordered phases:
//! read-only pre-validation, property expansion/inference, read-only
//! post-validation, and side-effecting emission (tensor materialization
//! followed by operation construction). The assembler drives the phases;
//! nodes only ever see the arena, context, and registries it threads in.

mod batchnorm_inference;
mod conv_dgrad;
mod reduction;

pub use batchnorm_inference::BatchnormInferenceNode;
pub use conv_dgrad::ConvBackwardDataNode;
pub use reduction::ReductionNode;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::attributes::Attributes;
use crate::backend::Backend;
use crate::context::Context;
use crate::error::{GraphError, GraphResult};
use crate::tensor::{TensorArena, TensorId, Uid, UidAllocator};

/// Operator kind tag, used for dispatch-free inspection and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    BatchnormInference,
    ConvBackwardData,
    Reduction,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::BatchnormInference => "batchnorm_inference",
            NodeKind::ConvBackwardData => "conv_backward_data",
            NodeKind::Reduction => "reduction",
        };
        f.write_str(name)
    }
}

/// Uid-indexed map of backend tensor handles, shared by all nodes of one
/// build. Entries are written once at first registration and read-only
/// afterwards.
pub struct TensorRegistry<B: Backend> {
    handles: BTreeMap<Uid, B::TensorHandle>,
}

impl<B: Backend> TensorRegistry<B> {
    pub fn new() -> Self {
        TensorRegistry {
            handles: BTreeMap::new(),
        }
    }

    pub fn handle(&self, uid: Uid) -> GraphResult<&B::TensorHandle> {
        self.handles.get(&uid).ok_or_else(|| {
            GraphError::invalid_input(format!("no materialized tensor for uid {uid}"))
        })
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.handles.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub(crate) fn insert(&mut self, uid: Uid, handle: B::TensorHandle) {
        self.handles.insert(uid, handle);
    }

    pub(crate) fn into_handles(self) -> BTreeMap<Uid, B::TensorHandle> {
        self.handles
    }
}

impl<B: Backend> Default for TensorRegistry<B> {
    fn default() -> Self {
        TensorRegistry::new()
    }
}

/// Accumulates emitted operations and the uids of tensors participating in
/// real (non-virtual) operations.
pub struct OperationSink<B: Backend> {
    operations: Vec<Arc<B::Operation>>,
    uids_involved: BTreeSet<Uid>,
}

impl<B: Backend> OperationSink<B> {
    pub fn new() -> Self {
        OperationSink {
            operations: Vec::new(),
            uids_involved: BTreeSet::new(),
        }
    }

    pub fn push_operation(&mut self, operation: B::Operation) {
        self.operations.push(Arc::new(operation));
    }

    pub fn mark_involved(&mut self, uids: impl IntoIterator<Item = Uid>) {
        self.uids_involved.extend(uids);
    }

    pub fn operations(&self) -> &[Arc<B::Operation>] {
        &self.operations
    }

    pub(crate) fn into_parts(self) -> (Vec<Arc<B::Operation>>, BTreeSet<Uid>) {
        (self.operations, self.uids_involved)
    }
}

impl<B: Backend> Default for OperationSink<B> {
    fn default() -> Self {
        OperationSink::new()
    }
}

/// One operator's graph unit.
///
/// Implementations are leaf or composite: a composite node returns its
/// decomposition from [`expand_and_infer`](Node::expand_and_infer) and the
/// assembler recurses, emitting only leaves. All three shipped variants
/// are leaves and return an empty decomposition.
pub trait Node<B: Backend> {
    fn kind(&self) -> NodeKind;

    fn name(&self) -> &str;

    /// Read-only check that required slots are present and attribute-level
    /// structural invariants hold.
    fn pre_validate(&self, arena: &TensorArena) -> GraphResult<()>;

    /// Defaulting and inference pass: fills unset properties from the
    /// context, infers output dims where the mapping is unique, and
    /// assigns default strides. Returns sub-nodes for composite variants.
    fn expand_and_infer(
        &mut self,
        arena: &mut TensorArena,
        context: &Context,
    ) -> GraphResult<Vec<Box<dyn Node<B>>>>;

    /// Read-only check that every output tensor is fully resolved.
    fn post_validate(&self, arena: &TensorArena) -> GraphResult<()>;

    /// Registers every present slot tensor in the shared registry,
    /// allocating a uid on first sight of each descriptor.
    fn materialize_tensors(
        &self,
        arena: &mut TensorArena,
        backend: &B,
        uids: &mut UidAllocator,
        registry: &mut TensorRegistry<B>,
    ) -> GraphResult<()>;

    /// Builds the node's backend operations from resolved tensors and
    /// attribute parameters.
    fn emit_operations(
        &self,
        arena: &TensorArena,
        backend: &B,
        registry: &TensorRegistry<B>,
        sink: &mut OperationSink<B>,
    ) -> GraphResult<()>;

    /// Serializes the attribute bag in its abstract, pre-resolution form.
    fn attributes_json(&self) -> GraphResult<serde_json::Value>;
}

/// Registers one descriptor, reusing its uid and registry entry when it was
/// seen before. Idempotent per descriptor identity.
pub(crate) fn register_tensor<B: Backend>(
    arena: &mut TensorArena,
    id: TensorId,
    backend: &B,
    uids: &mut UidAllocator,
    registry: &mut TensorRegistry<B>,
) -> GraphResult<()> {
    let descriptor = arena.get_mut(id);
    let uid = match descriptor.uid() {
        Some(uid) => uid,
        None => {
            let uid = uids.allocate();
            descriptor.assign_uid(uid);
            uid
        }
    };
    if !registry.contains(uid) {
        let handle = backend.create_tensor(arena.get(id))?;
        registry.insert(uid, handle);
    }
    Ok(())
}

/// Default materialization: walk every present input and output slot.
pub(crate) fn materialize_slot_tensors<B: Backend>(
    attributes: &(impl Attributes + ?Sized),
    arena: &mut TensorArena,
    backend: &B,
    uids: &mut UidAllocator,
    registry: &mut TensorRegistry<B>,
) -> GraphResult<()> {
    for (_, id) in attributes
        .inputs()
        .into_iter()
        .chain(attributes.outputs())
    {
        if let Some(id) = id {
            register_tensor(arena, id, backend, uids, registry)?;
        }
    }
    Ok(())
}

/// Looks up the uid a slot tensor received during materialization.
pub(crate) fn resolved_uid(arena: &TensorArena, id: TensorId) -> GraphResult<Uid> {
    arena.get(id).uid().ok_or_else(|| {
        GraphError::invalid_input(format!(
            "tensor `{}` was not materialized before operation emission",
            arena.get(id).name()
        ))
    })
}
