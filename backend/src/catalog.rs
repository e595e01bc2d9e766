//! The four served models: artifact file, trained column layout, and how
//! their labels are resolved and reported.

use std::fmt;
use std::str::FromStr;

use crate::features::{column, optional_column, Column, ColumnMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    Iris,
    Penguins,
    Titanic,
    GermanCredit,
}

impl ModelId {
    /// Listing order of `GET /models`.
    pub const ALL: [ModelId; 4] = [
        ModelId::Iris,
        ModelId::Penguins,
        ModelId::Titanic,
        ModelId::GermanCredit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Iris => "iris",
            ModelId::Penguins => "penguins",
            ModelId::Titanic => "titanic",
            ModelId::GermanCredit => "german_credit",
        }
    }

    pub fn spec(self) -> &'static ModelSpec {
        match self {
            ModelId::Iris => &IRIS,
            ModelId::Penguins => &PENGUINS,
            ModelId::Titanic => &TITANIC,
            ModelId::GermanCredit => &GERMAN_CREDIT,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ModelId::ALL.into_iter().find(|id| id.as_str() == name).ok_or(())
    }
}

/// How a raw model label becomes a class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStrategy {
    /// The model returns a class index into this table.
    Lookup(&'static [&'static str]),
    /// The model returns its own label; class names come from its registry.
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `class_name` plus the full `probabilities` map.
    Distribution,
    /// Only the highest class `probability`.
    MaxProbability,
}

#[derive(Debug)]
pub struct ModelSpec {
    pub id: ModelId,
    pub artifact: &'static str,
    pub columns: ColumnMap,
    pub labels: LabelStrategy,
    pub response: ResponseShape,
}

pub const IRIS_CLASSES: &[&str] = &["setosa", "versicolor", "virginica"];
pub const TITANIC_CLASSES: &[&str] = &["not survived", "survived"];

static IRIS_COLUMNS: [Column; 4] = [
    column("sepal_length", "sepal length (cm)"),
    column("sepal_width", "sepal width (cm)"),
    column("petal_length", "petal length (cm)"),
    column("petal_width", "petal width (cm)"),
];

static PENGUINS_COLUMNS: [Column; 4] = [
    column("bill_length_mm", "bill_length_mm"),
    column("bill_depth_mm", "bill_depth_mm"),
    column("flipper_length_mm", "flipper_length_mm"),
    column("body_mass_g", "body_mass_g"),
];

static TITANIC_COLUMNS: [Column; 7] = [
    column("pclass", "pclass"),
    column("sex", "sex"),
    column("age", "age"),
    column("sibsp", "sibsp"),
    column("parch", "parch"),
    column("fare", "fare"),
    column("embarked", "embarked"),
];

// Training frame came straight from the CSV: spaces in names and the
// leftover index column.
static GERMAN_CREDIT_COLUMNS: [Column; 10] = [
    column("Unnamed_0", "Unnamed: 0"),
    column("Age", "Age"),
    column("Sex", "Sex"),
    column("Job", "Job"),
    column("Housing", "Housing"),
    optional_column("Saving_accounts", "Saving accounts"),
    optional_column("Checking_account", "Checking account"),
    column("Credit_amount", "Credit amount"),
    column("Duration", "Duration"),
    column("Purpose", "Purpose"),
];

pub static IRIS: ModelSpec = ModelSpec {
    id: ModelId::Iris,
    artifact: "iris_best_model.onnx",
    columns: ColumnMap::new(&IRIS_COLUMNS),
    labels: LabelStrategy::Lookup(IRIS_CLASSES),
    response: ResponseShape::Distribution,
};

pub static PENGUINS: ModelSpec = ModelSpec {
    id: ModelId::Penguins,
    artifact: "penguins_rf_model.onnx",
    columns: ColumnMap::new(&PENGUINS_COLUMNS),
    labels: LabelStrategy::Native,
    response: ResponseShape::Distribution,
};

pub static TITANIC: ModelSpec = ModelSpec {
    id: ModelId::Titanic,
    artifact: "titanic_rf_model.onnx",
    columns: ColumnMap::new(&TITANIC_COLUMNS),
    labels: LabelStrategy::Lookup(TITANIC_CLASSES),
    response: ResponseShape::Distribution,
};

pub static GERMAN_CREDIT: ModelSpec = ModelSpec {
    id: ModelId::GermanCredit,
    artifact: "german_credit.onnx",
    columns: ColumnMap::new(&GERMAN_CREDIT_COLUMNS),
    labels: LabelStrategy::Native,
    response: ResponseShape::MaxProbability,
};
