use opgraph::backend::{Backend, ConvolutionConfig, ConvolutionMode, NormInferenceIo};
use opgraph::DataType;
use opgraph_backend_ref::{RefBackend, RefTensor, STATUS_BAD_PARAM};

fn tensor(uid: i64, name: &str, dims: &[i64]) -> RefTensor {
    RefTensor {
        uid,
        name: name.to_string(),
        dims: dims.to_vec(),
        strides: vec![1; dims.len()],
        data_type: DataType::Float,
        is_virtual: false,
    }
}

fn conv_config() -> ConvolutionConfig {
    ConvolutionConfig {
        compute_type: Some(DataType::Float),
        mode: ConvolutionMode::CrossCorrelation,
        spatial_stride: vec![1, 1],
        pre_padding: vec![1, 1],
        post_padding: vec![1, 1],
        dilation: vec![1, 1],
    }
}

#[test]
fn convolution_descriptor_requires_compute_type() {
    let backend = RefBackend::new();
    let config = ConvolutionConfig {
        compute_type: None,
        ..conv_config()
    };
    let err = backend.create_convolution_descriptor(&config).unwrap_err();
    assert_eq!(err.status, STATUS_BAD_PARAM);
    assert!(err.message.contains("compute type"));
}

#[test]
fn convolution_descriptor_rejects_arity_mismatch() {
    let backend = RefBackend::new();
    let config = ConvolutionConfig {
        dilation: vec![1],
        ..conv_config()
    };
    let err = backend.create_convolution_descriptor(&config).unwrap_err();
    assert_eq!(err.status, STATUS_BAD_PARAM);
}

#[test]
fn convolution_descriptor_rejects_zero_stride() {
    let backend = RefBackend::new();
    let config = ConvolutionConfig {
        spatial_stride: vec![0, 1],
        ..conv_config()
    };
    let err = backend.create_convolution_descriptor(&config).unwrap_err();
    assert_eq!(err.status, STATUS_BAD_PARAM);
}

#[test]
fn norm_inference_rejects_output_shape_mismatch() {
    let backend = RefBackend::new();
    let x = tensor(0, "x", &[8, 64, 32, 32]);
    let scale = tensor(1, "scale", &[1, 64, 1, 1]);
    let bias = tensor(2, "bias", &[1, 64, 1, 1]);
    let mean = tensor(3, "mean", &[1, 64, 1, 1]);
    let inv_variance = tensor(4, "inv_variance", &[1, 64, 1, 1]);
    let y = tensor(5, "y", &[8, 64, 16, 16]);

    let err = backend
        .create_norm_inference_operation(NormInferenceIo {
            x: &x,
            mean: &mean,
            inv_variance: &inv_variance,
            scale: &scale,
            bias: &bias,
            y: &y,
        })
        .unwrap_err();
    assert_eq!(err.status, STATUS_BAD_PARAM);
    assert!(err.message.contains("do not match"));
}
