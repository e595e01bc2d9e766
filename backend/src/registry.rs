use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::catalog::{LabelStrategy, ModelId, ModelSpec, ResponseShape};
use crate::classifier::Classifier;
use crate::error::LoadError;
use crate::inference::OnnxClassifier;

/// The four models, loaded once at startup and shared read-only by every
/// worker.
#[derive(Clone)]
pub struct ModelRegistry {
    iris: Arc<dyn Classifier>,
    penguins: Arc<dyn Classifier>,
    titanic: Arc<dyn Classifier>,
    german_credit: Arc<dyn Classifier>,
}

impl ModelRegistry {
    /// Loads every artifact from `dir`. Any failure is fatal for the process.
    pub fn load(dir: &Path) -> Result<Self, LoadError> {
        let load = |id: ModelId| -> Result<Arc<dyn Classifier>, LoadError> {
            let spec = id.spec();
            let path = dir.join(spec.artifact);
            let classifier = OnnxClassifier::load(&path, &spec.columns)?;
            info!(
                "Loaded model '{}' from {} ({} columns, {} registered classes)",
                id,
                path.display(),
                spec.columns.len(),
                classifier.classes().len()
            );
            Ok(Arc::new(classifier))
        };

        Self::new(
            load(ModelId::Iris)?,
            load(ModelId::Penguins)?,
            load(ModelId::Titanic)?,
            load(ModelId::GermanCredit)?,
        )
    }

    pub fn new(
        iris: Arc<dyn Classifier>,
        penguins: Arc<dyn Classifier>,
        titanic: Arc<dyn Classifier>,
        german_credit: Arc<dyn Classifier>,
    ) -> Result<Self, LoadError> {
        let registry = ModelRegistry {
            iris,
            penguins,
            titanic,
            german_credit,
        };
        for id in ModelId::ALL {
            registry.check(id.spec())?;
        }
        Ok(registry)
    }

    pub fn get(&self, id: ModelId) -> &Arc<dyn Classifier> {
        match id {
            ModelId::Iris => &self.iris,
            ModelId::Penguins => &self.penguins,
            ModelId::Titanic => &self.titanic,
            ModelId::GermanCredit => &self.german_credit,
        }
    }

    /// Class names in probability order.
    pub fn class_names(&self, id: ModelId) -> Vec<String> {
        match id.spec().labels {
            LabelStrategy::Lookup(names) => names.iter().map(|n| n.to_string()).collect(),
            LabelStrategy::Native => self.get(id).classes().iter().map(|c| c.to_string()).collect(),
        }
    }

    fn check(&self, spec: &ModelSpec) -> Result<(), LoadError> {
        let classes = self.get(spec.id).classes();
        let reason = match spec.labels {
            LabelStrategy::Native if spec.response == ResponseShape::Distribution && classes.is_empty() => {
                "artifact carries no class registry".to_string()
            }
            LabelStrategy::Lookup(names) if !classes.is_empty() && classes.len() != names.len() => {
                format!("artifact declares {} classes, expected {}", classes.len(), names.len())
            }
            _ => return Ok(()),
        };
        Err(LoadError::Registry {
            model: spec.id.as_str(),
            reason,
        })
    }
}
