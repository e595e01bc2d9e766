use std::fmt;

use serde::Serialize;

use crate::features::FeatureRow;

/// A predicted class: either a bare index into a lookup table or a
/// label the model already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Label {
    Index(i64),
    Name(String),
}

impl Label {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Label::Index(ix) => usize::try_from(*ix).ok(),
            Label::Name(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Index(ix) => write!(f, "{ix}"),
            Label::Name(name) => f.write_str(name),
        }
    }
}

/// Result of a single forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub label: Label,
    pub probabilities: Vec<f32>,
}

/// A loaded, immutable classifier shared by every worker.
pub trait Classifier: Send + Sync {
    /// Class registry carried by the artifact, in probability order.
    /// Empty when the artifact does not expose one.
    fn classes(&self) -> &[Label];

    /// Runs the model once, yielding both the label and the distribution.
    fn run(&self, row: &FeatureRow) -> anyhow::Result<ModelOutput>;

    fn predict(&self, row: &FeatureRow) -> anyhow::Result<Label> {
        Ok(self.run(row)?.label)
    }

    fn predict_proba(&self, row: &FeatureRow) -> anyhow::Result<Vec<f32>> {
        Ok(self.run(row)?.probabilities)
    }
}
