//! Contract between the graph frontend and a compute backend.
//!
//! The frontend resolves tensor properties and translates attribute bags
//! into descriptor configs and tensor bindings; the backend turns those
//! into whatever operation objects its runtime executes. Backend failures
//! carry a numeric status code and are converted into
//! [`GraphError::Backend`](crate::error::GraphError) the moment they cross
//! back into the frontend, so no backend error type ever escapes further.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datatype::DataType;
use crate::tensor::TensorDescriptor;

/// Result alias for backend builder calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure reported by a backend builder, with the backend's own status code.
#[derive(Debug, Clone, Error)]
#[error("{message} (status {status})")]
pub struct BackendError {
    pub status: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(status: i32, message: impl Into<String>) -> Self {
        BackendError {
            status,
            message: message.into(),
        }
    }
}

/// Correlation mode of a convolution descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvolutionMode {
    CrossCorrelation,
    Convolution,
}

/// Reduction operator applied across tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionMode {
    Add,
    Mul,
    Min,
    Max,
    Amax,
    Avg,
}

/// Parameters for a convolution descriptor. The spatial dimension count is
/// implied by the padding length; stride, both paddings, and dilation must
/// all have that length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionConfig {
    pub compute_type: Option<DataType>,
    pub mode: ConvolutionMode,
    pub spatial_stride: Vec<i64>,
    pub pre_padding: Vec<i64>,
    pub post_padding: Vec<i64>,
    pub dilation: Vec<i64>,
}

impl ConvolutionConfig {
    pub fn spatial_dim_count(&self) -> usize {
        self.pre_padding.len()
    }
}

/// Parameters for a reduction descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    pub compute_type: Option<DataType>,
    pub mode: ReductionMode,
}

/// Tensor bindings for a batch-normalization inference operation.
pub struct NormInferenceIo<'a, H> {
    pub x: &'a H,
    pub mean: &'a H,
    pub inv_variance: &'a H,
    pub scale: &'a H,
    pub bias: &'a H,
    pub y: &'a H,
}

/// Tensor bindings for a convolution backward-data operation.
pub struct ConvBackwardDataIo<'a, H> {
    pub dx: &'a H,
    pub w: &'a H,
    pub dy: &'a H,
}

/// Tensor bindings for a reduction operation.
pub struct ReductionIo<'a, H> {
    pub x: &'a H,
    pub y: &'a H,
}

/// Builder surface a compute backend exposes to the graph frontend.
///
/// Every method performs backend-side validation and fails with a
/// [`BackendError`] carrying the backend's status code. Operation objects
/// are immutable once built and shareable across threads; construction
/// itself is not required to be reentrant.
pub trait Backend {
    /// Backend-resident tensor descriptor handle.
    type TensorHandle;
    /// Built convolution descriptor, consumed by conv operations.
    type ConvolutionDescriptor;
    /// Built reduction descriptor, consumed by reduction operations.
    type ReductionDescriptor;
    /// Finished operation object.
    type Operation: Send + Sync;

    fn backend_name(&self) -> &str;

    /// Creates a backend tensor from a fully resolved descriptor.
    fn create_tensor(&self, descriptor: &TensorDescriptor) -> BackendResult<Self::TensorHandle>;

    fn create_convolution_descriptor(
        &self,
        config: &ConvolutionConfig,
    ) -> BackendResult<Self::ConvolutionDescriptor>;

    fn create_reduction_descriptor(
        &self,
        config: &ReductionConfig,
    ) -> BackendResult<Self::ReductionDescriptor>;

    /// Builds a normalization-forward operation in batch mode, inference
    /// phase.
    fn create_norm_inference_operation(
        &self,
        io: NormInferenceIo<'_, Self::TensorHandle>,
    ) -> BackendResult<Self::Operation>;

    /// Builds a convolution backward-data operation with the given scale
    /// factors.
    fn create_conv_backward_data_operation(
        &self,
        descriptor: &Self::ConvolutionDescriptor,
        io: ConvBackwardDataIo<'_, Self::TensorHandle>,
        alpha: f32,
        beta: f32,
    ) -> BackendResult<Self::Operation>;

    fn create_reduction_operation(
        &self,
        descriptor: &Self::ReductionDescriptor,
        io: ReductionIo<'_, Self::TensorHandle>,
    ) -> BackendResult<Self::Operation>;
}
