//! Typed operator-graph construction frontend.
//!
//! Callers describe neural-network operators as nodes with named
//! input/output tensor slots, then [`Graph::build`](graph::Graph::build)
//! expands each node into concrete backend operations bound to
//! dimension-and-stride-resolved tensors. Resolution runs in four ordered
//! phases per node (pre-validate, expand-and-infer, post-validate, emit)
//! with structured errors instead of panics and a serializable abstract
//! form of the graph prior to resolution.
//!
//! The compute backend is abstract: anything implementing
//! [`Backend`](backend::Backend) can receive the emitted descriptors. The
//! `opgraph-backend-ref` crate provides a reference implementation used by
//! the tests and examples.

pub mod attributes;
pub mod backend;
pub mod context;
pub mod datatype;
pub mod error;
pub mod graph;
pub mod layout;
pub mod node;
pub mod tensor;

pub use attributes::{
    Attributes, BatchnormInferenceAttributes, ConvBackwardDataAttributes, ReductionAttributes,
    Slot,
};
pub use backend::{
    Backend, BackendError, BackendResult, ConvBackwardDataIo, ConvolutionConfig, ConvolutionMode,
    NormInferenceIo, ReductionConfig, ReductionIo, ReductionMode,
};
pub use context::Context;
pub use datatype::DataType;
pub use error::{GraphError, GraphResult, Phase};
pub use graph::{Graph, OperationGraph};
pub use node::{
    BatchnormInferenceNode, ConvBackwardDataNode, Node, NodeKind, OperationSink, ReductionNode,
    TensorRegistry,
};
pub use tensor::{Dimensions, TensorArena, TensorDescriptor, TensorId, Uid, UidAllocator};
