//! Deterministic stand-ins for the four artifacts.
//!
//! Each stub reads the row by trained column name, so a wrong column map
//! fails the same way a real model would: loudly, at inference time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};

use crate::classifier::{Classifier, Label, ModelOutput};
use crate::features::{FeatureRow, FeatureValue};
use crate::registry::ModelRegistry;

type Respond = Box<dyn Fn(&FeatureRow) -> anyhow::Result<ModelOutput> + Send + Sync>;

pub(crate) struct StubClassifier {
    classes: Vec<Label>,
    calls: AtomicUsize,
    respond: Respond,
}

impl StubClassifier {
    pub(crate) fn new(
        classes: Vec<Label>,
        respond: impl Fn(&FeatureRow) -> anyhow::Result<ModelOutput> + Send + Sync + 'static,
    ) -> Self {
        StubClassifier {
            classes,
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn fixed(classes: Vec<Label>, label: Label, probabilities: Vec<f32>) -> Self {
        Self::new(classes, move |_| {
            Ok(ModelOutput {
                label: label.clone(),
                probabilities: probabilities.clone(),
            })
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for StubClassifier {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn run(&self, row: &FeatureRow) -> anyhow::Result<ModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(row)
    }
}

pub(crate) struct Stubs {
    pub(crate) iris: Arc<StubClassifier>,
    pub(crate) penguins: Arc<StubClassifier>,
    pub(crate) titanic: Arc<StubClassifier>,
    pub(crate) german_credit: Arc<StubClassifier>,
}

impl Stubs {
    pub(crate) fn new() -> Self {
        Stubs {
            iris: Arc::new(StubClassifier::new(vec![], iris)),
            penguins: Arc::new(StubClassifier::new(
                ["Adelie", "Chinstrap", "Gentoo"]
                    .iter()
                    .map(|s| Label::Name(s.to_string()))
                    .collect(),
                penguins,
            )),
            titanic: Arc::new(StubClassifier::new(vec![Label::Index(0), Label::Index(1)], titanic)),
            german_credit: Arc::new(StubClassifier::new(
                vec![Label::Name("bad".into()), Label::Name("good".into())],
                german_credit,
            )),
        }
    }

    pub(crate) fn registry(&self) -> ModelRegistry {
        ModelRegistry::new(
            self.iris.clone(),
            self.penguins.clone(),
            self.titanic.clone(),
            self.german_credit.clone(),
        )
        .expect("stub registry is consistent")
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.iris.calls() + self.penguins.calls() + self.titanic.calls() + self.german_credit.calls()
    }
}

fn number(row: &FeatureRow, column: &str) -> anyhow::Result<f64> {
    match row.get(column) {
        Some(FeatureValue::Float(x)) => Ok(*x),
        Some(FeatureValue::Int(i)) => Ok(*i as f64),
        other => Err(anyhow!("column '{column}': expected a number, got {other:?}")),
    }
}

fn category<'a>(row: &'a FeatureRow, column: &str, known: &[&str]) -> anyhow::Result<&'a str> {
    match row.get(column) {
        Some(FeatureValue::Str(s)) if known.contains(&s.as_str()) => Ok(s.as_str()),
        Some(FeatureValue::Str(s)) => bail!("found unknown category '{s}' in column '{column}'"),
        other => bail!("column '{column}': expected a string, got {other:?}"),
    }
}

fn argmax(probabilities: &[f32]) -> usize {
    probabilities
        .iter()
        .enumerate()
        .fold(0, |best, (ix, p)| if *p > probabilities[best] { ix } else { best })
}

// Class means of the canonical Iris dataset.
const IRIS_CENTROIDS: [[f64; 4]; 3] = [
    [5.006, 3.428, 1.462, 0.246],
    [5.936, 2.770, 4.260, 1.326],
    [6.588, 2.974, 5.552, 2.026],
];

fn iris(row: &FeatureRow) -> anyhow::Result<ModelOutput> {
    let x = [
        number(row, "sepal length (cm)")?,
        number(row, "sepal width (cm)")?,
        number(row, "petal length (cm)")?,
        number(row, "petal width (cm)")?,
    ];
    let weights: Vec<f64> = IRIS_CENTROIDS
        .iter()
        .map(|c| {
            let distance = c.iter().zip(&x).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
            (-distance).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    let probabilities: Vec<f32> = weights.iter().map(|w| (w / total) as f32).collect();
    let label = Label::Index(argmax(&probabilities) as i64);
    Ok(ModelOutput { label, probabilities })
}

fn penguins(row: &FeatureRow) -> anyhow::Result<ModelOutput> {
    let bill_length = number(row, "bill_length_mm")?;
    number(row, "bill_depth_mm")?;
    let flipper_length = number(row, "flipper_length_mm")?;
    number(row, "body_mass_g")?;

    let (species, probabilities) = if flipper_length >= 206.0 {
        ("Gentoo", vec![0.1, 0.1, 0.8])
    } else if bill_length >= 44.0 {
        ("Chinstrap", vec![0.1, 0.8, 0.1])
    } else {
        ("Adelie", vec![0.8, 0.1, 0.1])
    };
    Ok(ModelOutput {
        label: Label::Name(species.to_string()),
        probabilities,
    })
}

fn titanic(row: &FeatureRow) -> anyhow::Result<ModelOutput> {
    let pclass = number(row, "pclass")?;
    let sex = category(row, "sex", &["female", "male"])?;
    let age = number(row, "age")?;
    for column in ["sibsp", "parch", "fare"] {
        number(row, column)?;
    }
    category(row, "embarked", &["C", "Q", "S"])?;

    let class_term = match pclass as i64 {
        1 => 1.0,
        2 => 0.0,
        _ => -1.0,
    };
    let sex_term = if sex == "female" { 2.5 } else { -1.5 };
    let score = sex_term + class_term - 0.02 * (age - 30.0);
    let survived = 1.0 / (1.0 + (-score).exp());

    let probabilities = vec![(1.0 - survived) as f32, survived as f32];
    let label = Label::Index(argmax(&probabilities) as i64);
    Ok(ModelOutput { label, probabilities })
}

fn german_credit(row: &FeatureRow) -> anyhow::Result<ModelOutput> {
    number(row, "Unnamed: 0")?;
    number(row, "Credit amount")?;
    let duration = number(row, "Duration")?;
    if row.get("Saving accounts").is_none() {
        bail!("column 'Saving accounts' not found");
    }
    let checking = row
        .get("Checking account")
        .ok_or_else(|| anyhow!("column 'Checking account' not found"))?;

    let good = checking.is_missing() || duration <= 24.0;
    let probabilities = if good { vec![0.28, 0.72] } else { vec![0.64, 0.36] };
    let label = Label::Name(if good { "good" } else { "bad" }.to_string());
    Ok(ModelOutput { label, probabilities })
}

/// Small ai.onnx.ml graphs laid out the way the exported artifacts are:
/// categories through a `CategoryMapper`, everything cast to float,
/// concatenated and fed to a `TreeEnsembleClassifier` with zipmap off.
pub(crate) mod graphs {
    use tract_onnx::pb;

    const FLOAT: i32 = 1;
    const INT64: i32 = 7;
    const STRING: i32 = 8;

    // AttributeProto.AttributeType codes
    const ATTR_INT: i32 = 2;
    const ATTR_STRING: i32 = 3;
    const ATTR_FLOATS: i32 = 6;
    const ATTR_INTS: i32 = 7;
    const ATTR_STRINGS: i32 = 8;

    /// How one named column enters the graph.
    pub(crate) enum Input<'a> {
        Float,
        Int,
        Category(&'a [&'a str]),
    }

    pub(crate) enum Labels<'a> {
        Strings(&'a [&'a str]),
        Ints(&'a [i64]),
    }

    /// A single depth-one tree: class weights for `x[feature] <= threshold`
    /// and for everything above it.
    pub(crate) struct Stump<'a> {
        pub(crate) feature: i64,
        pub(crate) threshold: f32,
        pub(crate) low: &'a [f32],
        pub(crate) high: &'a [f32],
        pub(crate) labels: Labels<'a>,
    }

    /// One `[1, width]` float input straight into the tree ensemble.
    pub(crate) fn packed(width: i64, stump: &Stump) -> pb::ModelProto {
        model(
            vec![value_info("float_input", FLOAT, &[1, width])],
            vec![tree_ensemble("float_input", stump)],
            stump,
        )
    }

    /// One `[1, 1]` input per column, in the given order.
    pub(crate) fn named(columns: &[(&str, Input)], stump: &Stump) -> pb::ModelProto {
        let mut inputs = Vec::new();
        let mut nodes = Vec::new();
        let mut features = Vec::new();

        for (name, input) in columns {
            let feature = format!("{name}_f");
            match input {
                Input::Float => {
                    inputs.push(value_info(name, FLOAT, &[1, 1]));
                    features.push(name.to_string());
                }
                Input::Int => {
                    inputs.push(value_info(name, INT64, &[1, 1]));
                    nodes.push(cast(name, &feature));
                    features.push(feature);
                }
                Input::Category(vocabulary) => {
                    let code = format!("{name}_code");
                    let ids: Vec<i64> = (0..vocabulary.len() as i64).collect();
                    inputs.push(value_info(name, STRING, &[1, 1]));
                    nodes.push(node(
                        "CategoryMapper",
                        "ai.onnx.ml",
                        vec![name.to_string()],
                        vec![code.clone()],
                        vec![
                            strings("cats_strings", vocabulary),
                            ints("cats_int64s", &ids),
                            int("default_int64", -1),
                            string("default_string", "_Unused"),
                        ],
                    ));
                    nodes.push(cast(&code, &feature));
                    features.push(feature);
                }
            }
        }

        nodes.push(node("Concat", "", features, vec!["features".to_string()], vec![int("axis", 1)]));
        nodes.push(tree_ensemble("features", stump));
        model(inputs, nodes, stump)
    }

    fn model(input: Vec<pb::ValueInfoProto>, node: Vec<pb::NodeProto>, stump: &Stump) -> pb::ModelProto {
        let label_type = match stump.labels {
            Labels::Strings(_) => STRING,
            Labels::Ints(_) => INT64,
        };
        pb::ModelProto {
            ir_version: 8,
            opset_import: vec![opset("", 13), opset("ai.onnx.ml", 1)],
            graph: Some(pb::GraphProto {
                name: "classifier".to_string(),
                node,
                input,
                output: vec![
                    value_info("label", label_type, &[]),
                    value_info("probabilities", FLOAT, &[]),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn tree_ensemble(input: &str, stump: &Stump) -> pb::NodeProto {
        let n = stump.low.len();
        let classes: Vec<i64> = (0..n as i64).collect();
        let labels = match stump.labels {
            Labels::Strings(labels) => strings("classlabels_strings", labels),
            Labels::Ints(labels) => ints("classlabels_int64s", labels),
        };
        node(
            "TreeEnsembleClassifier",
            "ai.onnx.ml",
            vec![input.to_string()],
            vec!["label".to_string(), "probabilities".to_string()],
            vec![
                ints("nodes_treeids", &[0, 0, 0]),
                ints("nodes_nodeids", &[0, 1, 2]),
                ints("nodes_featureids", &[stump.feature, 0, 0]),
                floats("nodes_values", &[stump.threshold, 0.0, 0.0]),
                floats("nodes_hitrates", &[1.0, 1.0, 1.0]),
                strings("nodes_modes", &["BRANCH_LEQ", "LEAF", "LEAF"]),
                ints("nodes_truenodeids", &[1, 0, 0]),
                ints("nodes_falsenodeids", &[2, 0, 0]),
                ints("nodes_missing_value_tracks_true", &[0, 0, 0]),
                ints("class_treeids", &vec![0i64; 2 * n]),
                ints("class_nodeids", &[vec![1i64; n], vec![2i64; n]].concat()),
                ints("class_ids", &[classes.clone(), classes].concat()),
                floats("class_weights", &[stump.low, stump.high].concat()),
                string("post_transform", "NONE"),
                labels,
            ],
        )
    }

    fn cast(input: &str, output: &str) -> pb::NodeProto {
        node(
            "Cast",
            "",
            vec![input.to_string()],
            vec![output.to_string()],
            vec![int("to", i64::from(FLOAT))],
        )
    }

    fn node(
        op_type: &str,
        domain: &str,
        input: Vec<String>,
        output: Vec<String>,
        attribute: Vec<pb::AttributeProto>,
    ) -> pb::NodeProto {
        pb::NodeProto {
            name: output[0].clone(),
            op_type: op_type.to_string(),
            domain: domain.to_string(),
            input,
            output,
            attribute,
            ..Default::default()
        }
    }

    fn value_info(name: &str, elem_type: i32, dims: &[i64]) -> pb::ValueInfoProto {
        let shape = (!dims.is_empty()).then(|| pb::TensorShapeProto {
            dim: dims
                .iter()
                .map(|size| pb::tensor_shape_proto::Dimension {
                    value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(*size)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        });
        pb::ValueInfoProto {
            name: name.to_string(),
            r#type: Some(pb::TypeProto {
                value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                    elem_type,
                    shape,
                    ..Default::default()
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn opset(domain: &str, version: i64) -> pb::OperatorSetIdProto {
        pb::OperatorSetIdProto {
            domain: domain.to_string(),
            version,
            ..Default::default()
        }
    }

    fn attribute(name: &str, r#type: i32) -> pb::AttributeProto {
        pb::AttributeProto {
            name: name.to_string(),
            r#type,
            ..Default::default()
        }
    }

    fn int(name: &str, value: i64) -> pb::AttributeProto {
        pb::AttributeProto {
            i: value,
            ..attribute(name, ATTR_INT)
        }
    }

    fn string(name: &str, value: &str) -> pb::AttributeProto {
        pb::AttributeProto {
            s: value.as_bytes().to_vec(),
            ..attribute(name, ATTR_STRING)
        }
    }

    fn ints(name: &str, values: &[i64]) -> pb::AttributeProto {
        pb::AttributeProto {
            ints: values.to_vec(),
            ..attribute(name, ATTR_INTS)
        }
    }

    fn floats(name: &str, values: &[f32]) -> pb::AttributeProto {
        pb::AttributeProto {
            floats: values.to_vec(),
            ..attribute(name, ATTR_FLOATS)
        }
    }

    fn strings(name: &str, values: &[&str]) -> pb::AttributeProto {
        pb::AttributeProto {
            strings: values.iter().map(|s| s.as_bytes().to_vec()).collect(),
            ..attribute(name, ATTR_STRINGS)
        }
    }

    pub(crate) const PENGUIN_CLASSES: &[&str] = &["Adelie", "Chinstrap", "Gentoo"];

    /// Flipper length above 206 mm reads as Gentoo.
    pub(crate) fn penguins(width: i64) -> pb::ModelProto {
        packed(
            width,
            &Stump {
                feature: 2,
                threshold: 206.0,
                low: &[0.8, 0.1, 0.1],
                high: &[0.1, 0.1, 0.8],
                labels: Labels::Strings(PENGUIN_CLASSES),
            },
        )
    }

    /// Women survive.
    pub(crate) fn titanic() -> pb::ModelProto {
        named(
            &[
                ("pclass", Input::Int),
                ("sex", Input::Category(&["female", "male"])),
                ("age", Input::Float),
                ("sibsp", Input::Int),
                ("parch", Input::Int),
                ("fare", Input::Float),
                ("embarked", Input::Category(&["C", "Q", "S"])),
            ],
            &Stump {
                feature: 1,
                threshold: 0.5,
                low: &[0.1, 0.9],
                high: &[0.8, 0.2],
                labels: Labels::Ints(&[0, 1]),
            },
        )
    }

    /// Applicants without a savings account read as good risks.
    pub(crate) fn german_credit(savings: &[&str]) -> pb::ModelProto {
        named(
            &[
                ("Unnamed: 0", Input::Int),
                ("Age", Input::Int),
                ("Sex", Input::Category(&["female", "male"])),
                ("Job", Input::Int),
                ("Housing", Input::Category(&["free", "own", "rent"])),
                ("Saving accounts", Input::Category(savings)),
                ("Checking account", Input::Category(&["", "little", "moderate", "rich"])),
                ("Credit amount", Input::Int),
                ("Duration", Input::Int),
                ("Purpose", Input::Category(&["business", "car", "education", "radio/TV"])),
            ],
            &Stump {
                feature: 5,
                threshold: 0.5,
                low: &[0.3, 0.7],
                high: &[0.6, 0.4],
                labels: Labels::Strings(&["bad", "good"]),
            },
        )
    }
}
