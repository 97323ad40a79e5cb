use opgraph::{
    BatchnormInferenceAttributes, BatchnormInferenceNode, Context, ConvBackwardDataAttributes,
    ConvBackwardDataNode, DataType, Graph, GraphError, Phase, ReductionAttributes, ReductionNode,
    TensorDescriptor, TensorId,
};
use opgraph_backend_ref::RefBackend;

fn context() -> Context {
    Context::new()
        .with_compute_data_type(DataType::Float)
        .with_intermediate_data_type(DataType::Float)
        .with_io_data_type(DataType::Float)
}

fn input(graph: &mut Graph<RefBackend>, name: &str, dims: &[i64]) -> TensorId {
    graph.tensor(TensorDescriptor::new(name).with_dims(dims))
}

fn assert_invalid_input(err: GraphError, node: &str, phase: Phase, needle: &str) {
    match err {
        GraphError::Phase {
            node: failing_node,
            phase: failing_phase,
            source,
        } => {
            assert_eq!(failing_node, node);
            assert_eq!(failing_phase, phase);
            match *source {
                GraphError::InvalidInput(message) => assert!(
                    message.contains(needle),
                    "message `{message}` does not mention `{needle}`"
                ),
                other => panic!("expected InvalidInput, got: {other}"),
            }
        }
        other => panic!("expected a phase-wrapped error, got: {other}"),
    }
}

#[test]
fn batchnorm_rejects_missing_mean() {
    let mut graph = Graph::<RefBackend>::new(context());
    let x = input(&mut graph, "x", &[8, 64, 32, 32]);
    let scale = input(&mut graph, "scale", &[1, 64, 1, 1]);
    let bias = input(&mut graph, "bias", &[1, 64, 1, 1]);
    let inv_variance = input(&mut graph, "inv_variance", &[1, 64, 1, 1]);
    let y = graph.tensor(TensorDescriptor::new("y"));
    graph.push_node(Box::new(BatchnormInferenceNode::new(
        BatchnormInferenceAttributes {
            name: "bn0".into(),
            x: Some(x),
            scale: Some(scale),
            bias: Some(bias),
            inv_variance: Some(inv_variance),
            y: Some(y),
            ..Default::default()
        },
    )));

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "bn0", Phase::PreValidate, "MEAN");
}

#[test]
fn missing_slot_is_reported_independent_of_other_slots() {
    // Every other slot absent as well: the check fails on the first
    // missing slot without inspecting the rest.
    let mut graph = Graph::<RefBackend>::new(context());
    let x = input(&mut graph, "x", &[8, 64, 32, 32]);
    graph.push_node(Box::new(BatchnormInferenceNode::new(
        BatchnormInferenceAttributes {
            name: "bn0".into(),
            x: Some(x),
            ..Default::default()
        },
    )));

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "bn0", Phase::PreValidate, "SCALE");
}

#[test]
fn dgrad_rejects_missing_filter() {
    let mut graph = Graph::<RefBackend>::new(context());
    let dy = input(&mut graph, "dy", &[8, 64, 30, 30]);
    let dx = graph.tensor(TensorDescriptor::new("dx").with_dims([8, 64, 32, 32]));
    graph.push_node(Box::new(ConvBackwardDataNode::new(
        ConvBackwardDataAttributes {
            name: "dgrad0".into(),
            padding: vec![1, 1],
            stride: vec![1, 1],
            dilation: vec![1, 1],
            dy: Some(dy),
            dx: Some(dx),
            ..Default::default()
        },
    )));

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "dgrad0", Phase::PreValidate, "W");
}

#[test]
fn dgrad_rejects_disagreeing_spatial_parameters() {
    let mut graph = Graph::<RefBackend>::new(context());
    let dy = input(&mut graph, "dy", &[8, 64, 30, 30]);
    let w = input(&mut graph, "w", &[64, 64, 3, 3]);
    let dx = graph.tensor(TensorDescriptor::new("dx").with_dims([8, 64, 32, 32]));
    graph.push_node(Box::new(ConvBackwardDataNode::new(
        ConvBackwardDataAttributes {
            name: "dgrad0".into(),
            padding: vec![1, 1],
            stride: vec![1],
            dilation: vec![1, 1],
            dy: Some(dy),
            w: Some(w),
            dx: Some(dx),
            ..Default::default()
        },
    )));

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "dgrad0", Phase::PreValidate, "spatial parameter lengths");
}

#[test]
fn dgrad_without_output_dims_fails_post_validation() {
    let mut graph = Graph::<RefBackend>::new(context());
    let dy = input(&mut graph, "dy", &[8, 64, 30, 30]);
    let w = input(&mut graph, "w", &[64, 64, 3, 3]);
    let _dx = graph.conv_backward_data(ConvBackwardDataAttributes {
        name: "dgrad0".into(),
        padding: vec![1, 1],
        stride: vec![1, 1],
        dilation: vec![1, 1],
        dy: Some(dy),
        w: Some(w),
        ..Default::default()
    });

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "dgrad0", Phase::PostValidate, "unresolved dimensions");
}

#[test]
fn reduction_rejects_missing_input() {
    let mut graph = Graph::<RefBackend>::new(context());
    let y = graph.tensor(TensorDescriptor::new("y").with_dims([8, 1, 32, 32]));
    graph.push_node(Box::new(ReductionNode::new(ReductionAttributes {
        name: "sum0".into(),
        mode: Some(opgraph::ReductionMode::Add),
        y: Some(y),
        ..Default::default()
    })));

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "sum0", Phase::PreValidate, "X");
}

#[test]
fn reduction_rejects_missing_mode() {
    let mut graph = Graph::<RefBackend>::new(context());
    let x = input(&mut graph, "x", &[8, 64, 32, 32]);
    let _y = graph.reduction(ReductionAttributes {
        name: "sum0".into(),
        x: Some(x),
        ..Default::default()
    });

    let err = graph.build(&RefBackend::new()).unwrap_err();
    assert_invalid_input(err, "sum0", Phase::PreValidate, "reduction mode");
}
