use opgraph::{
    BatchnormInferenceAttributes, Context, ConvBackwardDataAttributes, DataType, Graph,
    ReductionAttributes, ReductionMode, TensorArena, TensorDescriptor,
};
use opgraph_backend_ref::RefBackend;

#[test]
fn batchnorm_attributes_round_trip() {
    let mut arena = TensorArena::new();
    let x = arena.insert(TensorDescriptor::new("x").with_dims([8, 64, 32, 32]));
    let scale = arena.insert(TensorDescriptor::new("scale"));
    let attributes = BatchnormInferenceAttributes {
        name: "bn0".into(),
        compute_data_type: Some(DataType::Float),
        x: Some(x),
        scale: Some(scale),
        bias: Some(scale),
        ..Default::default()
    };

    let document = serde_json::to_value(&attributes).expect("attributes serialize");
    let parsed: BatchnormInferenceAttributes =
        serde_json::from_value(document).expect("attributes deserialize");
    assert_eq!(parsed, attributes);
}

#[test]
fn conv_attributes_round_trip_preserves_parameters() {
    let mut arena = TensorArena::new();
    let dy = arena.insert(TensorDescriptor::new("dy"));
    let w = arena.insert(TensorDescriptor::new("w"));
    let attributes = ConvBackwardDataAttributes {
        name: "dgrad0".into(),
        padding: vec![1, 1],
        stride: vec![2, 2],
        dilation: vec![1, 1],
        dy: Some(dy),
        w: Some(w),
        ..Default::default()
    };

    let document = serde_json::to_value(&attributes).expect("attributes serialize");
    let parsed: ConvBackwardDataAttributes =
        serde_json::from_value(document).expect("attributes deserialize");
    assert_eq!(parsed, attributes);
    // The DX slot stays explicitly absent through the round trip.
    assert_eq!(parsed.dx, None);
}

#[test]
fn reduction_attributes_round_trip() {
    let attributes = ReductionAttributes {
        name: "sum0".into(),
        mode: Some(ReductionMode::Add),
        ..Default::default()
    };

    let document = serde_json::to_value(&attributes).expect("attributes serialize");
    let parsed: ReductionAttributes =
        serde_json::from_value(document).expect("attributes deserialize");
    assert_eq!(parsed, attributes);
}

#[test]
fn graph_document_captures_abstract_form() {
    let context = Context::new().with_io_data_type(DataType::Float);
    let mut graph = Graph::<RefBackend>::new(context);
    let x = graph.tensor(TensorDescriptor::new("x").with_dims([8, 64, 32, 32]));
    let scale = graph.tensor(TensorDescriptor::new("scale").with_dims([1, 64, 1, 1]));
    let bias = graph.tensor(TensorDescriptor::new("bias").with_dims([1, 64, 1, 1]));
    let mean = graph.tensor(TensorDescriptor::new("mean").with_dims([1, 64, 1, 1]));
    let inv_variance = graph.tensor(TensorDescriptor::new("inv_variance").with_dims([1, 64, 1, 1]));
    let y = graph.batchnorm_inference(BatchnormInferenceAttributes {
        name: "bn0".into(),
        x: Some(x),
        scale: Some(scale),
        bias: Some(bias),
        mean: Some(mean),
        inv_variance: Some(inv_variance),
        ..Default::default()
    });

    let document = graph.to_json().expect("graph serializes");

    assert_eq!(document["nodes"][0]["kind"], "BatchnormInference");
    assert_eq!(document["nodes"][0]["name"], "bn0");
    assert_eq!(document["nodes"][0]["attributes"]["name"], "bn0");
    let tensors = document["tensors"]["entries"]
        .as_array()
        .expect("tensor entries present");
    assert_eq!(tensors.len(), 6);
    // Pre-resolution: the synthesized output has no dims yet and no uid.
    let y_entry = &tensors[y.index()];
    assert!(y_entry["dims"].as_array().expect("dims array").is_empty());
    assert!(y_entry["uid"].is_null());
}
