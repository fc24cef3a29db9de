//! The authoritative model behind the projection.
//!
//! [`ModelSource`] answers lookups for events that arrive without a value;
//! [`ModelWriter`] receives client writes. [`StaticModel`] implements both
//! over an in-memory [`Environment`].

use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;

use twinlink_core::{ElementValue, Environment, ModelElement, Reference};

use crate::error::{Result, SyncError};

/// Read access to the backing model.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// The element at `reference`, if it exists.
    async fn get(&self, reference: &Reference) -> Option<ModelElement>;

    /// The whole model.
    async fn environment(&self) -> Environment;
}

/// Receives values written by graph clients.
#[async_trait]
pub trait ModelWriter: Send + Sync {
    async fn write_value(&self, reference: &Reference, value: ElementValue) -> Result<()>;
}

/// An in-memory model.
#[derive(Default)]
pub struct StaticModel {
    env: RwLock<Environment>,
}

impl StaticModel {
    pub fn new(env: Environment) -> Self {
        Self {
            env: RwLock::new(env),
        }
    }

    /// Read an environment from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let env: Environment = serde_json::from_str(&text)?;
        tracing::info!(
            path = %path.display(),
            shells = env.asset_administration_shells.len(),
            submodels = env.submodels.len(),
            "Model loaded"
        );
        Ok(Self::new(env))
    }

    /// Mutate the model in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Environment) -> R) -> R {
        f(&mut self.env.write())
    }

    pub fn snapshot(&self) -> Environment {
        self.env.read().clone()
    }
}

#[async_trait]
impl ModelSource for StaticModel {
    async fn get(&self, reference: &Reference) -> Option<ModelElement> {
        self.env.read().find(reference)
    }

    async fn environment(&self) -> Environment {
        self.snapshot()
    }
}

#[async_trait]
impl ModelWriter for StaticModel {
    async fn write_value(&self, reference: &Reference, value: ElementValue) -> Result<()> {
        let mut env = self.env.write();
        let element = env
            .find_element_mut(reference)
            .ok_or_else(|| SyncError::NotFound(reference.to_string()))?;
        element.apply_value(value)?;
        tracing::debug!(reference = %reference, "Model value written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinlink_core::{DataTypeDef, Key, KeyType, Property, SubmodelElement, Submodel};

    fn model() -> StaticModel {
        let mut sm = Submodel::new("urn:sm:1", "Data");
        sm.submodel_elements
            .push(SubmodelElement::Property(Property::new("P", DataTypeDef::Int, "1")));
        StaticModel::new(Environment {
            submodels: vec![sm],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_write_then_get() {
        let model = model();
        let p = Reference::submodel("urn:sm:1").child(Key::id_short(KeyType::Property, "P"));
        model
            .write_value(&p, ElementValue::Property { value: Some("7".into()) })
            .await
            .unwrap();

        match model.get(&p).await {
            Some(ModelElement::SubmodelElement(SubmodelElement::Property(p))) => {
                assert_eq!(p.value.as_deref(), Some("7"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env.json");
        std::fs::write(
            &path,
            r#"{ "submodels": [ { "id": "urn:sm:1", "idShort": "Data", "submodelElements": [] } ] }"#,
        )
        .unwrap();

        let model = StaticModel::load(&path).unwrap();
        assert_eq!(model.snapshot().submodels.len(), 1);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(StaticModel::load(&missing), Err(SyncError::Io(_))));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            StaticModel::load(&broken),
            Err(SyncError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_write_unknown_element() {
        let model = model();
        let missing = Reference::submodel("urn:sm:1").child(Key::id_short(KeyType::Property, "X"));
        let err = model
            .write_value(&missing, ElementValue::Property { value: None })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
