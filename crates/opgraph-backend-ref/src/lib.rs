//! Reference backend for the graph frontend.
//!
//! Implements the [`Backend`] contract with plain-data records instead of
//! driver handles: every builder call validates its inputs structurally
//! and returns an inspectable descriptor, so integration tests can assert
//! on exactly what the frontend emitted and can provoke genuine backend
//! failures (unset compute types, arity mismatches) without a device.

use serde::Serialize;

use opgraph::backend::{
    Backend, BackendError, BackendResult, ConvBackwardDataIo, ConvolutionConfig, ConvolutionMode,
    NormInferenceIo, ReductionConfig, ReductionIo, ReductionMode,
};
use opgraph::datatype::DataType;
use opgraph::tensor::{TensorDescriptor, Uid};

/// Status code reported for structurally invalid builder inputs.
pub const STATUS_BAD_PARAM: i32 = 3;
/// Status code reported for configurations the reference backend rejects.
pub const STATUS_NOT_SUPPORTED: i32 = 9;

fn bad_param(message: impl Into<String>) -> BackendError {
    BackendError::new(STATUS_BAD_PARAM, message)
}

/// Backend-resident tensor record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefTensor {
    pub uid: Uid,
    pub name: String,
    pub dims: Vec<i64>,
    pub strides: Vec<i64>,
    pub data_type: DataType,
    pub is_virtual: bool,
}

impl RefTensor {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// Built convolution descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefConvolutionDescriptor {
    pub compute_type: DataType,
    pub mode: ConvolutionMode,
    pub spatial_dim_count: usize,
    pub spatial_stride: Vec<i64>,
    pub pre_padding: Vec<i64>,
    pub post_padding: Vec<i64>,
    pub dilation: Vec<i64>,
}

/// Built reduction descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefReductionDescriptor {
    pub compute_type: DataType,
    pub mode: ReductionMode,
}

/// Finished operation record, tagged by kind and binding tensor uids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RefOperation {
    NormInference {
        x: Uid,
        mean: Uid,
        inv_variance: Uid,
        scale: Uid,
        bias: Uid,
        y: Uid,
    },
    ConvBackwardData {
        descriptor: RefConvolutionDescriptor,
        dx: Uid,
        w: Uid,
        dy: Uid,
        alpha: f32,
        beta: f32,
    },
    Reduction {
        descriptor: RefReductionDescriptor,
        x: Uid,
        y: Uid,
    },
}

/// The reference backend. Stateless; every builder call is a pure
/// validation plus record construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefBackend;

impl RefBackend {
    pub fn new() -> Self {
        RefBackend
    }
}

impl Backend for RefBackend {
    type TensorHandle = RefTensor;
    type ConvolutionDescriptor = RefConvolutionDescriptor;
    type ReductionDescriptor = RefReductionDescriptor;
    type Operation = RefOperation;

    fn backend_name(&self) -> &str {
        "ref"
    }

    fn create_tensor(&self, descriptor: &TensorDescriptor) -> BackendResult<RefTensor> {
        let uid = descriptor
            .uid()
            .ok_or_else(|| bad_param(format!("tensor `{}` has no uid", descriptor.name())))?;
        if descriptor.dims().is_empty() {
            return Err(bad_param(format!(
                "tensor `{}` has no dimensions",
                descriptor.name()
            )));
        }
        if descriptor.strides().len() != descriptor.dims().len() {
            return Err(bad_param(format!(
                "tensor `{}` has {} strides for {} dimensions",
                descriptor.name(),
                descriptor.strides().len(),
                descriptor.dims().len()
            )));
        }
        if descriptor.dims().iter().any(|&extent| extent <= 0) {
            return Err(bad_param(format!(
                "tensor `{}` has a non-positive dimension",
                descriptor.name()
            )));
        }
        let data_type = descriptor
            .data_type()
            .ok_or_else(|| bad_param(format!("tensor `{}` has no data type", descriptor.name())))?;
        Ok(RefTensor {
            uid,
            name: descriptor.name().to_string(),
            dims: descriptor.dims().to_vec(),
            strides: descriptor.strides().to_vec(),
            data_type,
            is_virtual: descriptor.is_virtual(),
        })
    }

    fn create_convolution_descriptor(
        &self,
        config: &ConvolutionConfig,
    ) -> BackendResult<RefConvolutionDescriptor> {
        let compute_type = config
            .compute_type
            .ok_or_else(|| bad_param("convolution descriptor has no compute type"))?;
        let spatial = config.spatial_dim_count();
        if spatial == 0 {
            return Err(bad_param("convolution descriptor has zero spatial dims"));
        }
        if config.spatial_stride.len() != spatial
            || config.post_padding.len() != spatial
            || config.dilation.len() != spatial
        {
            return Err(bad_param(format!(
                "convolution parameter lengths disagree: stride {}, pre-padding {}, post-padding {}, dilation {}",
                config.spatial_stride.len(),
                config.pre_padding.len(),
                config.post_padding.len(),
                config.dilation.len()
            )));
        }
        if config.spatial_stride.iter().any(|&s| s < 1) || config.dilation.iter().any(|&d| d < 1) {
            return Err(bad_param("convolution stride and dilation must be >= 1"));
        }
        if config.pre_padding.iter().any(|&p| p < 0) || config.post_padding.iter().any(|&p| p < 0) {
            return Err(bad_param("convolution padding must be >= 0"));
        }
        Ok(RefConvolutionDescriptor {
            compute_type,
            mode: config.mode,
            spatial_dim_count: spatial,
            spatial_stride: config.spatial_stride.clone(),
            pre_padding: config.pre_padding.clone(),
            post_padding: config.post_padding.clone(),
            dilation: config.dilation.clone(),
        })
    }

    fn create_reduction_descriptor(
        &self,
        config: &ReductionConfig,
    ) -> BackendResult<RefReductionDescriptor> {
        let compute_type = config
            .compute_type
            .ok_or_else(|| bad_param("reduction descriptor has no compute type"))?;
        Ok(RefReductionDescriptor {
            compute_type,
            mode: config.mode,
        })
    }

    fn create_norm_inference_operation(
        &self,
        io: NormInferenceIo<'_, RefTensor>,
    ) -> BackendResult<RefOperation> {
        if io.x.dims != io.y.dims {
            return Err(bad_param(format!(
                "normalization output dims {:?} do not match input dims {:?}",
                io.y.dims, io.x.dims
            )));
        }
        for (label, tensor) in [
            ("MEAN", io.mean),
            ("INV_VARIANCE", io.inv_variance),
            ("BIAS", io.bias),
        ] {
            if tensor.dims != io.scale.dims {
                return Err(bad_param(format!(
                    "normalization parameter `{label}` dims {:?} do not match SCALE dims {:?}",
                    tensor.dims, io.scale.dims
                )));
            }
        }
        Ok(RefOperation::NormInference {
            x: io.x.uid,
            mean: io.mean.uid,
            inv_variance: io.inv_variance.uid,
            scale: io.scale.uid,
            bias: io.bias.uid,
            y: io.y.uid,
        })
    }

    fn create_conv_backward_data_operation(
        &self,
        descriptor: &RefConvolutionDescriptor,
        io: ConvBackwardDataIo<'_, RefTensor>,
        alpha: f32,
        beta: f32,
    ) -> BackendResult<RefOperation> {
        let expected_rank = descriptor.spatial_dim_count + 2;
        for (label, tensor) in [("DX", io.dx), ("W", io.w), ("DY", io.dy)] {
            if tensor.rank() != expected_rank {
                return Err(bad_param(format!(
                    "convolution operand `{label}` has rank {}, expected {expected_rank}",
                    tensor.rank()
                )));
            }
        }
        Ok(RefOperation::ConvBackwardData {
            descriptor: descriptor.clone(),
            dx: io.dx.uid,
            w: io.w.uid,
            dy: io.dy.uid,
            alpha,
            beta,
        })
    }

    fn create_reduction_operation(
        &self,
        descriptor: &RefReductionDescriptor,
        io: ReductionIo<'_, RefTensor>,
    ) -> BackendResult<RefOperation> {
        if io.x.rank() != io.y.rank() {
            return Err(bad_param(format!(
                "reduction output rank {} does not match input rank {}",
                io.y.rank(),
                io.x.rank()
            )));
        }
        Ok(RefOperation::Reduction {
            descriptor: *descriptor,
            x: io.x.uid,
            y: io.y.uid,
        })
    }
}
