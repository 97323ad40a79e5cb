//! Builds a small batchnorm-inference graph against the reference backend,
//! printing the abstract graph document and the emitted operations.

use anyhow::Result;
use opgraph::{BatchnormInferenceAttributes, Context, DataType, Graph, TensorDescriptor};
use opgraph_backend_ref::RefBackend;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let context = Context::new()
        .with_compute_data_type(DataType::Float)
        .with_intermediate_data_type(DataType::Half)
        .with_io_data_type(DataType::Float);
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

    println!(
        "abstract graph:\n{}",
        serde_json::to_string_pretty(&graph.to_json()?)?
    );

    let built = graph.build(&RefBackend::new())?;
    let y_descriptor = built.arena().get(y);
    println!(
        "resolved Y: dims {:?}, strides {:?}",
        y_descriptor.dims(),
        y_descriptor.strides()
    );
    for operation in built.operations() {
        println!("operation: {operation:?}");
    }
    Ok(())
}
