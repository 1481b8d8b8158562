use ipu_canonicalization::dtype::VarType;
use ipu_canonicalization::ir::{AttributeValue, Graph, NodeId, OpDesc, VarDesc};
use ipu_canonicalization::{CanonicalizationPass, CanonicalizeError, HandlerRegistry};
use rstest::rstest;

/// Slot name, variable name and static shape of one argument.
type Arg = (&'static str, &'static str, &'static [i64]);

struct Source {
    graph: Graph,
    op: NodeId,
    outputs: Vec<NodeId>,
    consumer: NodeId,
}

/// Insert one variable per argument, grouped by slot in declaration order.
fn add_args(graph: &mut Graph, args: &[Arg]) -> Vec<(&'static str, Vec<NodeId>)> {
    let mut slots: Vec<(&'static str, Vec<NodeId>)> = Vec::new();
    for (slot, name, shape) in args.iter().copied() {
        let var = graph.add_var(VarDesc::new(name.to_string()).with_shape(shape.to_vec()));
        match slots.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, vars)) => vars.push(var),
            None => slots.push((slot, vec![var])),
        }
    }
    slots
}

/// Build `op` with its arguments and a downstream `consume` operation reading every output.
fn source(op: OpDesc, inputs: &[Arg], outputs: &[Arg]) -> Source {
    let mut graph = Graph::new();
    let input_slots = add_args(&mut graph, inputs);
    let output_slots = add_args(&mut graph, outputs);

    let inputs: Vec<(&str, &[NodeId])> = input_slots
        .iter()
        .map(|(slot, vars)| (*slot, vars.as_slice()))
        .collect();
    let outputs: Vec<(&str, &[NodeId])> = output_slots
        .iter()
        .map(|(slot, vars)| (*slot, vars.as_slice()))
        .collect();
    let op = graph.add_op_with_io(op, &inputs, &outputs).unwrap();

    let output_vars: Vec<NodeId> = output_slots.into_iter().flat_map(|(_, vars)| vars).collect();
    let consumer = graph
        .add_op_with_io(OpDesc::new("consume"), &[("X", &output_vars)], &[])
        .unwrap();

    Source {
        graph,
        op,
        outputs: output_vars,
        consumer,
    }
}

fn run(graph: &mut Graph) -> Result<(), CanonicalizeError> {
    CanonicalizationPass::new()
        .ignore_op("consume")
        .run(graph, &HandlerRegistry::with_default_handlers())
        .map(|_| ())
}

fn fill_constant() -> Source {
    source(
        OpDesc::new("fill_constant")
            .with_attr("dtype", VarType::FP32 as i32)
            .with_attr("shape", vec![2i64, 3])
            .with_attr("value", 1.0f32),
        &[],
        &[("Out", "out", &[2, 3])],
    )
}

fn gaussian_random() -> Source {
    source(
        OpDesc::new("gaussian_random")
            .with_attr("shape", vec![4i64])
            .with_attr("dtype", VarType::FP32 as i32)
            .with_attr("mean", 0.0f32)
            .with_attr("std", 1.0f32),
        &[],
        &[("Out", "out", &[4])],
    )
}

fn uniform_random() -> Source {
    source(
        OpDesc::new("uniform_random")
            .with_attr("shape", vec![4i64])
            .with_attr("dtype", VarType::FP32 as i32)
            .with_attr("min", 0.0f32)
            .with_attr("max", 1.0f32),
        &[],
        &[("Out", "out", &[4])],
    )
}

fn transpose2() -> Source {
    source(
        OpDesc::new("transpose2").with_attr("axis", vec![1i32, 0]),
        &[("X", "x", &[2, 3])],
        &[("Out", "out", &[3, 2])],
    )
}

fn reshape2() -> Source {
    source(
        OpDesc::new("reshape2").with_attr("shape", vec![6i32]),
        &[("X", "x", &[2, 3])],
        &[("Out", "out", &[6])],
    )
}

fn gather() -> Source {
    source(
        OpDesc::new("gather"),
        &[("X", "x", &[5, 3]), ("Index", "index", &[2])],
        &[("Out", "out", &[2, 3])],
    )
}

fn squeeze2() -> Source {
    source(
        OpDesc::new("squeeze2").with_attr("axes", Vec::<i32>::new()),
        &[("X", "x", &[1, 3])],
        &[("Out", "out", &[3])],
    )
}

fn cast() -> Source {
    source(
        OpDesc::new("cast").with_attr("out_dtype", VarType::FP16 as i32),
        &[("X", "x", &[3])],
        &[("Out", "out", &[3])],
    )
}

fn lookup_table() -> Source {
    source(
        OpDesc::new("lookup_table"),
        &[("W", "w", &[10, 4]), ("Ids", "ids", &[2, 1])],
        &[("Out", "out", &[2, 4])],
    )
}

fn unsqueeze2() -> Source {
    source(
        OpDesc::new("unsqueeze2").with_attr("axes", vec![0i32]),
        &[("X", "x", &[3])],
        &[("Out", "out", &[1, 3])],
    )
}

fn concat() -> Source {
    source(
        OpDesc::new("concat").with_attr("axis", 0i32),
        &[("X", "a", &[2]), ("X", "b", &[3])],
        &[("Out", "out", &[5])],
    )
}

fn stack() -> Source {
    source(
        OpDesc::new("stack").with_attr("axis", 0i32),
        &[("X", "a", &[2]), ("X", "b", &[2])],
        &[("Y", "y", &[2, 2])],
    )
}

fn shape() -> Source {
    source(
        OpDesc::new("shape"),
        &[("Input", "input", &[2, 3])],
        &[("Out", "out", &[2])],
    )
}

fn slice() -> Source {
    source(
        OpDesc::new("slice")
            .with_attr("starts", vec![0i32])
            .with_attr("ends", vec![5i32])
            .with_attr("axes", vec![0i32]),
        &[("Input", "input", &[8])],
        &[("Out", "out", &[5])],
    )
}

#[rstest]
#[case::fill_constant(fill_constant(), "Constant")]
#[case::gaussian_random(gaussian_random(), "RandomNormal")]
#[case::uniform_random(uniform_random(), "RandomUniform")]
#[case::transpose2(transpose2(), "Transpose")]
#[case::reshape2(reshape2(), "Reshape")]
#[case::gather(gather(), "Gather")]
#[case::squeeze2(squeeze2(), "Squeeze")]
#[case::cast(cast(), "Cast")]
#[case::lookup_table(lookup_table(), "Gather")]
#[case::unsqueeze2(unsqueeze2(), "Unsqueeze")]
#[case::concat(concat(), "Concat")]
#[case::stack(stack(), "Concat")]
#[case::shape(shape(), "Shape")]
#[case::slice(slice(), "Slice")]
fn consumers_see_the_replacement(#[case] source: Source, #[case] target: &str) {
    let Source {
        mut graph,
        op,
        outputs,
        consumer,
    } = source;

    run(&mut graph).unwrap();

    assert!(!graph.contains(op));
    assert_eq!(graph.node(consumer).unwrap().inputs(), outputs.as_slice());

    let producers: Vec<NodeId> = outputs
        .iter()
        .map(|var| {
            let producers = graph.node(*var).unwrap().inputs();
            assert_eq!(producers.len(), 1, "output {var} has a single producer");
            producers[0]
        })
        .collect();
    let replacement = producers[0];
    assert!(producers.iter().all(|p| *p == replacement));
    assert_eq!(graph.op(replacement).unwrap().op_type, target);
    assert_eq!(graph.node(replacement).unwrap().outputs().len(), outputs.len());
    graph.validate_edges().unwrap();
}

#[test]
fn no_host_operation_survives() {
    let mut graph = Graph::new();
    let ids = graph.add_var(VarDesc::new("ids".into()).with_shape(vec![8, 1]));
    let w = graph.add_var(VarDesc::new("w".into()).with_shape(vec![100, 16]));
    let emb = graph.add_var(VarDesc::new("emb".into()).with_shape(vec![8, 16]));
    let flat = graph.add_var(VarDesc::new("flat".into()).with_shape(vec![128]));
    let xshape = graph.add_var(VarDesc::new("xshape".into()));
    let half = graph.add_var(VarDesc::new("half".into()).with_shape(vec![128]));
    graph
        .add_op_with_io(OpDesc::new("feed"), &[], &[("Out", &[ids])])
        .unwrap();
    graph
        .add_op_with_io(
            OpDesc::new("cast").with_attr("out_dtype", VarType::FP16 as i32),
            &[("X", &[flat])],
            &[("Out", &[half])],
        )
        .unwrap();
    graph
        .add_op_with_io(
            OpDesc::new("reshape2")
                .with_attr("shape", vec![-1i32])
                .with_attr("ipu_stage", 1i32),
            &[("X", &[emb])],
            &[("Out", &[flat]), ("XShape", &[xshape])],
        )
        .unwrap();
    graph
        .add_op_with_io(
            OpDesc::new("lookup_table").with_attr("ipu_stage", 0i32),
            &[("W", &[w]), ("Ids", &[ids])],
            &[("Out", &[emb])],
        )
        .unwrap();
    graph
        .add_op_with_io(OpDesc::new("fetch"), &[("X", &[half])], &[])
        .unwrap();

    let report = CanonicalizationPass::new()
        .run(&mut graph, &HandlerRegistry::with_default_handlers())
        .unwrap();

    assert_eq!(report.rewritten, 3);
    assert!(!graph.contains(xshape));
    let mut types: Vec<String> = graph
        .iter()
        .filter_map(|(_, node)| node.op())
        .map(|op| op.op_type.clone())
        .collect();
    types.sort();
    assert_eq!(
        types,
        ["Cast", "Constant", "Gather", "Reshape", "Squeeze", "feed", "fetch"]
    );

    // Every operation emitted for the reshape is placed on its stage.
    let reshape = graph.node(flat).unwrap().inputs()[0];
    let shape_const = graph.node(graph.node(reshape).unwrap().inputs()[1]).unwrap().inputs()[0];
    for op in [reshape, shape_const] {
        assert_eq!(
            graph.op(op).unwrap().attrs.get("ipu_stage"),
            Some(&AttributeValue::Int32(1))
        );
    }
    graph.validate_edges().unwrap();
}

#[test]
fn graph_survives_json_round_trip_after_rewrite() {
    let Source { mut graph, .. } = slice();

    run(&mut graph).unwrap();
    let json = serde_json::to_string(&graph).unwrap();
    let restored: Graph = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, graph);
}

#[test]
fn failing_handler_aborts_the_pass() {
    let Source { mut graph, op, .. } = source(
        OpDesc::new("fill_constant")
            .with_attr("dtype", VarType::BOOL as i32)
            .with_attr("shape", vec![2i64])
            .with_attr("value", 1.0f32),
        &[],
        &[("Out", "out", &[2])],
    );

    let err = run(&mut graph).unwrap_err();

    assert!(matches!(err, CanonicalizeError::UnsupportedFeature(_)));
    assert!(graph.contains(op));
}

#[test]
fn slice_ends_from_rewritten_fill_constant() {
    let mut graph = Graph::new();
    let input = graph.add_var(VarDesc::new("input".into()).with_shape(vec![8, 6]));
    let ends = graph.add_var(
        VarDesc::new("ends".into())
            .with_shape(vec![2])
            .with_dtype(VarType::INT32 as i32),
    );
    let out = graph.add_var(VarDesc::new("out".into()).with_shape(vec![5, 4]));
    graph
        .add_op_with_io(OpDesc::new("feed"), &[], &[("Out", &[input])])
        .unwrap();
    graph
        .add_op_with_io(
            OpDesc::new("slice")
                .with_attr("starts", vec![0i32, 1])
                .with_attr("ends", Vec::<i32>::new())
                .with_attr("axes", vec![0i32, 1]),
            &[("Input", &[input]), ("EndsTensor", &[ends])],
            &[("Out", &[out])],
        )
        .unwrap();
    graph
        .add_op_with_io(
            OpDesc::new("fill_constant")
                .with_attr("dtype", VarType::INT32 as i32)
                .with_attr("shape", vec![2i64])
                .with_attr("value", 5.0f32),
            &[],
            &[("Out", &[ends])],
        )
        .unwrap();
    graph
        .add_op_with_io(OpDesc::new("fetch"), &[("X", &[out])], &[])
        .unwrap();

    let report = CanonicalizationPass::new()
        .run(&mut graph, &HandlerRegistry::with_default_handlers())
        .unwrap();

    assert_eq!(report.rewritten, 2);
    let slice = graph.node(out).unwrap().inputs()[0];
    assert_eq!(graph.op(slice).unwrap().op_type, "Slice");
    let operands = graph.node(slice).unwrap().inputs().to_vec();
    assert_eq!(operands.len(), 5);
    assert_eq!(operands[0], input);
    assert_eq!(operands[2], ends);

    let constant = |var: NodeId| {
        let producer = graph.node(var).unwrap().inputs()[0];
        graph.op(producer).unwrap().clone()
    };
    assert_eq!(
        constant(operands[1]).attrs["value"],
        AttributeValue::Int32s(vec![0, 1])
    );
    assert_eq!(
        constant(ends).attrs["value"],
        AttributeValue::Int32s(vec![5, 5])
    );
    assert_eq!(
        constant(operands[3]).attrs["value"],
        AttributeValue::Int32s(vec![0, 1])
    );
    let steps = constant(operands[4]);
    assert_eq!(steps.op_type, "Constant");
    assert_eq!(steps.attrs["value"], AttributeValue::Int32s(vec![1, 1]));
    graph.validate_edges().unwrap();
}

#[test]
fn half_recorded_edge_in_json_is_malformed() {
    // v lists fetch as a consumer but fetch does not list v as an input.
    let json = r#"{
        "nodes": [
            {"Variable": {"var": {"name": "v"}, "inputs": [1], "outputs": [2]}},
            {"Operation": {"op": {"op_type": "feed", "outputs": {"Out": ["v"]}}, "inputs": [], "outputs": [0]}},
            {"Operation": {"op": {"op_type": "fetch", "inputs": {"X": ["v"]}}, "inputs": [], "outputs": []}}
        ]
    }"#;
    let mut graph: Graph = serde_json::from_str(json).unwrap();

    let err = run(&mut graph).unwrap_err();

    assert!(matches!(err, CanonicalizeError::MalformedGraph(_)));
    assert!(matches!(
        graph.topological_ops(),
        Err(CanonicalizeError::MalformedGraph(_))
    ));
}
