//! ONNX-backed classifiers run through tract.
//!
//! Artifacts are exported with the zipmap stage disabled, so output 0 is the
//! label tensor and output 1 the `[1, n_classes]` probability tensor. String
//! columns are encoded inside the graph by an ai.onnx.ml `CategoryMapper`
//! whose vocabulary is read back at load time.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use anyhow::{anyhow, bail};
use tract_onnx::pb;
use tract_onnx::prelude::*;

use crate::classifier::{Classifier, Label, ModelOutput};
use crate::error::LoadError;
use crate::features::{ColumnMap, FeatureRow, FeatureValue};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// TensorProto.DataType codes
const ONNX_FLOAT: i32 = 1;
const ONNX_INT32: i32 = 6;
const ONNX_INT64: i32 = 7;
const ONNX_STRING: i32 = 8;
const ONNX_DOUBLE: i32 = 11;

/// Fed to string inputs when an optional field was not supplied. Every
/// optional string column must list it in its vocabulary.
pub const MISSING_CATEGORY: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F64,
    I32,
    I64,
    Str,
}

impl ElementType {
    fn from_onnx(code: i32) -> Option<Self> {
        match code {
            ONNX_FLOAT => Some(ElementType::F32),
            ONNX_DOUBLE => Some(ElementType::F64),
            ONNX_INT32 => Some(ElementType::I32),
            ONNX_INT64 => Some(ElementType::I64),
            ONNX_STRING => Some(ElementType::Str),
            _ => None,
        }
    }

    fn datum_type(self) -> DatumType {
        match self {
            ElementType::F32 => f32::datum_type(),
            ElementType::F64 => f64::datum_type(),
            ElementType::I32 => i32::datum_type(),
            ElementType::I64 => i64::datum_type(),
            ElementType::Str => String::datum_type(),
        }
    }
}

/// One `[1, 1]` graph input fed from the column of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedInput {
    pub name: String,
    pub element: ElementType,
    /// Categories the graph can encode; only set for string inputs.
    pub categories: Option<BTreeSet<String>>,
}

/// How a feature row is laid out over the graph inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLayout {
    /// One `[1, n]` tensor holding every column in column-map order.
    Packed(ElementType),
    /// One `[1, 1]` tensor per column, in graph input order.
    Named(Vec<NamedInput>),
}

/// A declared graph input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInput {
    pub name: String,
    /// ONNX element type code, when the input is a typed tensor.
    pub elem_type: Option<i32>,
    /// Declared dimensions; `None` for symbolic or unknown ones.
    pub dims: Vec<Option<i64>>,
}

pub struct OnnxClassifier {
    plan: Plan,
    layout: InputLayout,
    classes: Vec<Label>,
}

impl OnnxClassifier {
    /// Loads and compiles the artifact, checking its inputs against the
    /// trained columns.
    pub fn load(path: &Path, columns: &ColumnMap) -> Result<Self, LoadError> {
        if !path.is_file() {
            return Err(LoadError::Missing {
                path: path.to_path_buf(),
            });
        }
        let proto = tract_onnx::onnx()
            .proto_model_for_path(path)
            .map_err(|err| LoadError::Artifact {
                path: path.to_path_buf(),
                reason: format!("{err:#}"),
            })?;
        Self::from_proto(path, &proto, columns)
    }

    /// Builds a classifier from an already decoded model. `path` only names
    /// the artifact in errors.
    pub fn from_proto(path: &Path, proto: &pb::ModelProto, columns: &ColumnMap) -> Result<Self, LoadError> {
        let artifact = |err: anyhow::Error| LoadError::Artifact {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        };
        let graph = proto
            .graph
            .as_ref()
            .ok_or_else(|| artifact(anyhow!("artifact has no graph")))?;

        let layout = input_layout(&graph_inputs(graph), &category_vocabularies(graph), columns).map_err(|reason| {
            LoadError::Schema {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        let classes = class_registry(graph);
        let plan = compile(proto, &layout, columns.len()).map_err(artifact)?;

        Ok(Self { plan, layout, classes })
    }

    fn inputs(&self, row: &FeatureRow) -> TractResult<TVec<TValue>> {
        match &self.layout {
            InputLayout::Packed(element) => {
                let values: Vec<&FeatureValue> = row.values().collect();
                Ok(tvec!(input_tensor(*element, "packed", &values)?.into()))
            }
            InputLayout::Named(named) => named
                .iter()
                .map(|input| -> TractResult<TValue> {
                    let value = row
                        .get(&input.name)
                        .ok_or_else(|| anyhow!("row has no column '{}'", input.name))?;
                    if let Some(categories) = &input.categories {
                        let category = as_category(value);
                        if !categories.contains(&category) {
                            bail!("found unknown category '{category}' in column '{}'", input.name);
                        }
                    }
                    Ok(input_tensor(input.element, &input.name, &[value])?.into())
                })
                .collect(),
        }
    }
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn run(&self, row: &FeatureRow) -> anyhow::Result<ModelOutput> {
        let outputs = self.plan.run(self.inputs(row)?)?;
        if outputs.len() < 2 {
            bail!("expected label and probability outputs, got {}", outputs.len());
        }

        let label = first_label(&outputs[0])?;
        let probabilities = outputs[1].cast_to::<f32>()?.as_slice::<f32>()?.to_vec();

        Ok(ModelOutput { label, probabilities })
    }
}

fn compile(proto: &pb::ModelProto, layout: &InputLayout, width: usize) -> TractResult<Plan> {
    let mut model = tract_onnx::onnx().model_for_proto_model(proto)?;
    match layout {
        InputLayout::Packed(element) => {
            model = model.with_input_fact(0, InferenceFact::dt_shape(element.datum_type(), tvec!(1, width)))?;
        }
        InputLayout::Named(named) => {
            for (ix, input) in named.iter().enumerate() {
                model = model.with_input_fact(ix, InferenceFact::dt_shape(input.element.datum_type(), tvec!(1, 1)))?;
            }
        }
    }
    model.into_optimized()?.into_runnable()
}

/// Graph inputs that are fed at run time (initializers excluded).
pub fn graph_inputs(graph: &pb::GraphProto) -> Vec<GraphInput> {
    let initializers: HashSet<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();
    graph
        .input
        .iter()
        .filter(|input| !initializers.contains(input.name.as_str()))
        .map(|input| {
            let tensor = tensor_type(input);
            GraphInput {
                name: input.name.clone(),
                elem_type: tensor.map(|t| t.elem_type),
                dims: tensor.map(tensor_dims).unwrap_or_default(),
            }
        })
        .collect()
}

fn tensor_type(input: &pb::ValueInfoProto) -> Option<&pb::type_proto::Tensor> {
    match input.r#type.as_ref()?.value.as_ref()? {
        pb::type_proto::Value::TensorType(tensor) => Some(tensor),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn tensor_dims(tensor: &pb::type_proto::Tensor) -> Vec<Option<i64>> {
    let Some(shape) = &tensor.shape else {
        return Vec::new();
    };
    shape
        .dim
        .iter()
        .map(|dim| match &dim.value {
            Some(pb::tensor_shape_proto::dimension::Value::DimValue(size)) => Some(*size),
            _ => None,
        })
        .collect()
}

/// Vocabulary of every `CategoryMapper`, keyed by the tensor it encodes.
pub fn category_vocabularies(graph: &pb::GraphProto) -> HashMap<String, BTreeSet<String>> {
    graph
        .node
        .iter()
        .filter(|node| node.op_type == "CategoryMapper")
        .filter_map(|node| {
            let input = node.input.first()?;
            let strings = node.attribute.iter().find(|a| a.name == "cats_strings")?;
            let vocabulary: BTreeSet<String> = strings
                .strings
                .iter()
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .collect();
            Some((input.clone(), vocabulary))
        })
        .collect()
}

/// Matches declared graph inputs against the trained columns.
///
/// A single input that is not itself one of the columns takes the whole row
/// packed; otherwise every column must be a graph input and vice versa.
/// String inputs must be encoded by a `CategoryMapper`, and optional string
/// columns must map [`MISSING_CATEGORY`].
pub fn input_layout(
    inputs: &[GraphInput],
    vocabularies: &HashMap<String, BTreeSet<String>>,
    columns: &ColumnMap,
) -> Result<InputLayout, String> {
    let names = columns.names();
    let element = |input: &GraphInput| {
        input
            .elem_type
            .and_then(ElementType::from_onnx)
            .ok_or_else(|| format!("input '{}' has an unsupported element type", input.name))
    };

    match inputs {
        [] => Err("artifact declares no inputs".to_string()),
        [single] if !names.contains(&single.name.as_str()) => {
            if let Some(Some(width)) = single.dims.last() {
                if usize::try_from(*width).ok() != Some(names.len()) {
                    return Err(format!(
                        "input '{}' is {width} wide, expected {} columns",
                        single.name,
                        names.len()
                    ));
                }
            }
            match element(single)? {
                ElementType::Str => Err(format!("input '{}' packs {} columns as strings", single.name, names.len())),
                packed => Ok(InputLayout::Packed(packed)),
            }
        }
        _ => {
            let declared: HashSet<&str> = inputs.iter().map(|input| input.name.as_str()).collect();
            let expected: HashSet<&str> = names.iter().copied().collect();

            let mut missing: Vec<&str> = names.iter().copied().filter(|c| !declared.contains(c)).collect();
            let mut unexpected: Vec<&str> = inputs
                .iter()
                .map(|input| input.name.as_str())
                .filter(|name| !expected.contains(name))
                .collect();
            if !missing.is_empty() || !unexpected.is_empty() {
                missing.sort_unstable();
                unexpected.sort_unstable();
                return Err(format!("missing inputs {missing:?}, unexpected inputs {unexpected:?}"));
            }

            inputs
                .iter()
                .map(|input| -> Result<NamedInput, String> {
                    let kind = element(input)?;
                    let categories = match kind {
                        ElementType::Str => {
                            let vocabulary = vocabularies
                                .get(&input.name)
                                .ok_or_else(|| format!("string input '{}' is not encoded by a CategoryMapper", input.name))?;
                            if columns.is_optional(&input.name) && !vocabulary.contains(MISSING_CATEGORY) {
                                return Err(format!(
                                    "optional input '{}' has no '{MISSING_CATEGORY}' category for missing values",
                                    input.name
                                ));
                            }
                            Some(vocabulary.clone())
                        }
                        _ => None,
                    };
                    Ok(NamedInput {
                        name: input.name.clone(),
                        element: kind,
                        categories,
                    })
                })
                .collect::<Result<Vec<_>, String>>()
                .map(InputLayout::Named)
        }
    }
}

/// Class labels declared on the classifier node, in probability order.
pub fn class_registry(graph: &pb::GraphProto) -> Vec<Label> {
    for node in &graph.node {
        for attribute in &node.attribute {
            match attribute.name.as_str() {
                "classlabels_strings" if !attribute.strings.is_empty() => {
                    return attribute
                        .strings
                        .iter()
                        .map(|raw| Label::Name(String::from_utf8_lossy(raw).into_owned()))
                        .collect();
                }
                "classlabels_int64s" | "classlabels_ints" if !attribute.ints.is_empty() => {
                    return attribute.ints.iter().map(|ix| Label::Index(*ix)).collect();
                }
                _ => {}
            }
        }
    }
    Vec::new()
}

fn input_tensor(element: ElementType, input: &str, values: &[&FeatureValue]) -> TractResult<Tensor> {
    let shape = (1, values.len());
    let tensor = match element {
        ElementType::F32 => {
            let data = values
                .iter()
                .map(|v| as_float(input, v).map(|x| x as f32))
                .collect::<TractResult<Vec<_>>>()?;
            Tensor::from(tract_ndarray::Array2::from_shape_vec(shape, data)?)
        }
        ElementType::F64 => {
            let data = values.iter().map(|v| as_float(input, v)).collect::<TractResult<Vec<_>>>()?;
            Tensor::from(tract_ndarray::Array2::from_shape_vec(shape, data)?)
        }
        ElementType::I32 => {
            let data = values
                .iter()
                .map(|v| as_int(input, v).and_then(|x| Ok(i32::try_from(x)?)))
                .collect::<TractResult<Vec<_>>>()?;
            Tensor::from(tract_ndarray::Array2::from_shape_vec(shape, data)?)
        }
        ElementType::I64 => {
            let data = values.iter().map(|v| as_int(input, v)).collect::<TractResult<Vec<_>>>()?;
            Tensor::from(tract_ndarray::Array2::from_shape_vec(shape, data)?)
        }
        ElementType::Str => {
            let data = values.iter().map(|v| as_category(v)).collect::<Vec<_>>();
            Tensor::from(tract_ndarray::Array2::from_shape_vec(shape, data)?)
        }
    };
    Ok(tensor)
}

fn as_float(input: &str, value: &FeatureValue) -> TractResult<f64> {
    match value {
        FeatureValue::Float(x) => Ok(*x),
        FeatureValue::Int(i) => Ok(*i as f64),
        FeatureValue::Missing => Ok(f64::NAN),
        FeatureValue::Str(s) => bail!("input '{input}' expects a number, got '{s}'"),
    }
}

fn as_int(input: &str, value: &FeatureValue) -> TractResult<i64> {
    match value {
        FeatureValue::Int(i) => Ok(*i),
        FeatureValue::Float(x) if x.fract() == 0.0 => Ok(*x as i64),
        other => bail!("input '{input}' expects an integer, got {other:?}"),
    }
}

fn as_category(value: &FeatureValue) -> String {
    match value {
        FeatureValue::Str(s) => s.clone(),
        FeatureValue::Int(i) => i.to_string(),
        FeatureValue::Float(x) => x.to_string(),
        FeatureValue::Missing => MISSING_CATEGORY.to_string(),
    }
}

fn first_label(tensor: &Tensor) -> TractResult<Label> {
    let label = if tensor.datum_type() == DatumType::String {
        tensor.as_slice::<String>()?.first().cloned().map(Label::Name)
    } else {
        let indices = tensor.cast_to::<i64>()?;
        let first = indices.as_slice::<i64>()?.first().copied();
        first.map(Label::Index)
    };
    label.ok_or_else(|| anyhow!("model produced an empty label tensor"))
}
