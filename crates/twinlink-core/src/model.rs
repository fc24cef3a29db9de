//! Domain model: shells, submodels, submodel elements and concept descriptions.
//!
//! The element variant set is closed ([`SubmodelElement`]); every consumer
//! matches on it exhaustively. All types round-trip through JSON with the
//! `modelType` tag on elements so environments can be loaded from files.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::types::{
    AssetKind, DataTypeDef, EntityType, Key, KeyType, LangString, ModelingKind, Reference,
};

// ── Common data ───────────────────────────────────────────────────

/// Attributes shared by every referable element.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementBase {
    #[serde(default)]
    pub id_short: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub kind: ModelingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<Qualifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded_data_specifications: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<LangString>,
}

impl ElementBase {
    pub fn new(id_short: impl Into<String>) -> Self {
        Self {
            id_short: id_short.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Qualifier {
    #[serde(rename = "type")]
    pub qualifier_type: String,
    #[serde(default)]
    pub value_type: DataTypeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

// ── Submodel elements ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub value_type: DataTypeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

impl Property {
    pub fn new(
        id_short: impl Into<String>,
        value_type: DataTypeDef,
        value: impl Into<String>,
    ) -> Self {
        Self {
            base: ElementBase::new(id_short),
            value_type,
            value: Some(value.into()),
            value_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub value_type: DataTypeDef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiLanguageProperty {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub value: Vec<LangString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<Reference>,
}

/// Binary content; serialized as base64 text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, with = "base64_bytes")]
    pub value: Vec<u8>,
}

/// Path or URI to externally stored content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceElement {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Reference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub first: Reference,
    pub second: Reference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedRelationshipElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub first: Reference,
    pub second: Reference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_subject_id: Option<Reference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_asset_id: Option<SpecificAssetId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasicEvent {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Reference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationVariable {
    pub value: SubmodelElement,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_variables: Vec<OperationVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_variables: Vec<OperationVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inoutput_variables: Vec<OperationVariable>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    #[serde(flatten)]
    pub base: ElementBase,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelElementCollection {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub ordered: bool,
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default)]
    pub value: Vec<SubmodelElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmodelElementList {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default = "default_true")]
    pub order_relevant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_value_list_element: Option<KeyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type_list_element: Option<DataTypeDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_id_list_element: Option<Reference>,
    #[serde(default)]
    pub value: Vec<SubmodelElement>,
}

impl Default for SubmodelElementList {
    fn default() -> Self {
        Self {
            base: ElementBase::default(),
            order_relevant: true,
            type_value_list_element: None,
            value_type_list_element: None,
            semantic_id_list_element: None,
            value: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Closed union of all submodel element variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "modelType")]
pub enum SubmodelElement {
    Property(Property),
    Range(Range),
    MultiLanguageProperty(MultiLanguageProperty),
    Blob(Blob),
    File(File),
    ReferenceElement(ReferenceElement),
    RelationshipElement(RelationshipElement),
    AnnotatedRelationshipElement(AnnotatedRelationshipElement),
    Entity(Entity),
    BasicEvent(BasicEvent),
    Operation(Operation),
    Capability(Capability),
    SubmodelElementCollection(SubmodelElementCollection),
    SubmodelElementList(SubmodelElementList),
}

impl SubmodelElement {
    pub fn base(&self) -> &ElementBase {
        match self {
            SubmodelElement::Property(e) => &e.base,
            SubmodelElement::Range(e) => &e.base,
            SubmodelElement::MultiLanguageProperty(e) => &e.base,
            SubmodelElement::Blob(e) => &e.base,
            SubmodelElement::File(e) => &e.base,
            SubmodelElement::ReferenceElement(e) => &e.base,
            SubmodelElement::RelationshipElement(e) => &e.base,
            SubmodelElement::AnnotatedRelationshipElement(e) => &e.base,
            SubmodelElement::Entity(e) => &e.base,
            SubmodelElement::BasicEvent(e) => &e.base,
            SubmodelElement::Operation(e) => &e.base,
            SubmodelElement::Capability(e) => &e.base,
            SubmodelElement::SubmodelElementCollection(e) => &e.base,
            SubmodelElement::SubmodelElementList(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            SubmodelElement::Property(e) => &mut e.base,
            SubmodelElement::Range(e) => &mut e.base,
            SubmodelElement::MultiLanguageProperty(e) => &mut e.base,
            SubmodelElement::Blob(e) => &mut e.base,
            SubmodelElement::File(e) => &mut e.base,
            SubmodelElement::ReferenceElement(e) => &mut e.base,
            SubmodelElement::RelationshipElement(e) => &mut e.base,
            SubmodelElement::AnnotatedRelationshipElement(e) => &mut e.base,
            SubmodelElement::Entity(e) => &mut e.base,
            SubmodelElement::BasicEvent(e) => &mut e.base,
            SubmodelElement::Operation(e) => &mut e.base,
            SubmodelElement::Capability(e) => &mut e.base,
            SubmodelElement::SubmodelElementCollection(e) => &mut e.base,
            SubmodelElement::SubmodelElementList(e) => &mut e.base,
        }
    }

    pub fn id_short(&self) -> &str {
        &self.base().id_short
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            SubmodelElement::Property(_) => KeyType::Property,
            SubmodelElement::Range(_) => KeyType::Range,
            SubmodelElement::MultiLanguageProperty(_) => KeyType::MultiLanguageProperty,
            SubmodelElement::Blob(_) => KeyType::Blob,
            SubmodelElement::File(_) => KeyType::File,
            SubmodelElement::ReferenceElement(_) => KeyType::ReferenceElement,
            SubmodelElement::RelationshipElement(_) => KeyType::RelationshipElement,
            SubmodelElement::AnnotatedRelationshipElement(_) => {
                KeyType::AnnotatedRelationshipElement
            }
            SubmodelElement::Entity(_) => KeyType::Entity,
            SubmodelElement::BasicEvent(_) => KeyType::BasicEvent,
            SubmodelElement::Operation(_) => KeyType::Operation,
            SubmodelElement::Capability(_) => KeyType::Capability,
            SubmodelElement::SubmodelElementCollection(_) => KeyType::SubmodelElementCollection,
            SubmodelElement::SubmodelElementList(_) => KeyType::SubmodelElementList,
        }
    }

    /// Key addressing this element under its parent by idShort.
    pub fn key(&self) -> Key {
        Key::id_short(self.key_type(), self.id_short())
    }

    /// Nested elements, in declared order.
    pub fn children(&self) -> &[SubmodelElement] {
        match self {
            SubmodelElement::SubmodelElementCollection(c) => &c.value,
            SubmodelElement::SubmodelElementList(l) => &l.value,
            SubmodelElement::Entity(e) => &e.statements,
            SubmodelElement::AnnotatedRelationshipElement(a) => &a.annotations,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<SubmodelElement>> {
        match self {
            SubmodelElement::SubmodelElementCollection(c) => Some(&mut c.value),
            SubmodelElement::SubmodelElementList(l) => Some(&mut l.value),
            SubmodelElement::Entity(e) => Some(&mut e.statements),
            SubmodelElement::AnnotatedRelationshipElement(a) => Some(&mut a.annotations),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SubmodelElement::SubmodelElementList(_))
    }

    /// The current value of a value-bearing element.
    pub fn value(&self) -> Option<ElementValue> {
        match self {
            SubmodelElement::Property(p) => Some(ElementValue::Property {
                value: p.value.clone(),
            }),
            SubmodelElement::Range(r) => Some(ElementValue::Range {
                min: r.min.clone(),
                max: r.max.clone(),
            }),
            SubmodelElement::MultiLanguageProperty(m) => Some(ElementValue::MultiLanguage {
                value: m.value.clone(),
            }),
            SubmodelElement::Blob(b) => Some(ElementValue::Blob {
                content_type: b.content_type.clone(),
                value: b.value.clone(),
            }),
            SubmodelElement::File(f) => Some(ElementValue::File {
                content_type: f.content_type.clone(),
                value: f.value.clone(),
            }),
            SubmodelElement::ReferenceElement(r) => Some(ElementValue::Reference {
                value: r.value.clone(),
            }),
            SubmodelElement::RelationshipElement(r) => Some(ElementValue::Relationship {
                first: r.first.clone(),
                second: r.second.clone(),
            }),
            SubmodelElement::AnnotatedRelationshipElement(r) => Some(ElementValue::Relationship {
                first: r.first.clone(),
                second: r.second.clone(),
            }),
            SubmodelElement::Entity(e) => Some(ElementValue::Entity {
                entity_type: e.entity_type,
                global_asset_id: e.global_asset_id.clone(),
            }),
            _ => None,
        }
    }

    /// Replace the value of this element in place.
    pub fn apply_value(&mut self, value: ElementValue) -> Result<()> {
        let expected = self.key_type().as_str();
        match (self, value) {
            (SubmodelElement::Property(p), ElementValue::Property { value }) => p.value = value,
            (SubmodelElement::Range(r), ElementValue::Range { min, max }) => {
                r.min = min;
                r.max = max;
            }
            (SubmodelElement::MultiLanguageProperty(m), ElementValue::MultiLanguage { value }) => {
                m.value = value
            }
            (SubmodelElement::Blob(b), ElementValue::Blob { content_type, value }) => {
                b.content_type = content_type;
                b.value = value;
            }
            (SubmodelElement::File(f), ElementValue::File { content_type, value }) => {
                f.content_type = content_type;
                f.value = value;
            }
            (SubmodelElement::ReferenceElement(r), ElementValue::Reference { value }) => {
                r.value = value
            }
            (
                SubmodelElement::RelationshipElement(r),
                ElementValue::Relationship { first, second },
            ) => {
                r.first = first;
                r.second = second;
            }
            (
                SubmodelElement::AnnotatedRelationshipElement(r),
                ElementValue::Relationship { first, second },
            ) => {
                r.first = first;
                r.second = second;
            }
            (
                SubmodelElement::Entity(e),
                ElementValue::Entity {
                    entity_type,
                    global_asset_id,
                },
            ) => {
                e.entity_type = entity_type;
                e.global_asset_id = global_asset_id;
            }
            (_, value) => {
                return Err(ModelError::ValueMismatch {
                    expected,
                    found: value.kind(),
                })
            }
        }
        Ok(())
    }
}

// ── Element values ────────────────────────────────────────────────

/// The value part of a value-bearing element, as carried by value-change
/// notifications and client writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ElementValue {
    Property {
        value: Option<String>,
    },
    Range {
        min: Option<String>,
        max: Option<String>,
    },
    MultiLanguage {
        value: Vec<LangString>,
    },
    #[serde(rename_all = "camelCase")]
    Blob {
        content_type: String,
        #[serde(with = "base64_bytes")]
        value: Vec<u8>,
    },
    #[serde(rename_all = "camelCase")]
    File {
        content_type: String,
        value: Option<String>,
    },
    Reference {
        value: Option<Reference>,
    },
    Relationship {
        first: Reference,
        second: Reference,
    },
    #[serde(rename_all = "camelCase")]
    Entity {
        entity_type: EntityType,
        global_asset_id: Option<Reference>,
    },
}

impl ElementValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ElementValue::Property { .. } => "Property",
            ElementValue::Range { .. } => "Range",
            ElementValue::MultiLanguage { .. } => "MultiLanguage",
            ElementValue::Blob { .. } => "Blob",
            ElementValue::File { .. } => "File",
            ElementValue::Reference { .. } => "Reference",
            ElementValue::Relationship { .. } => "Relationship",
            ElementValue::Entity { .. } => "Entity",
        }
    }
}

// ── Identifiables ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submodel {
    pub id: String,
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub submodel_elements: Vec<SubmodelElement>,
}

impl Submodel {
    pub fn new(id: impl Into<String>, id_short: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: ElementBase::new(id_short),
            submodel_elements: Vec::new(),
        }
    }

    pub fn reference(&self) -> Reference {
        Reference::submodel(self.id.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetInformation {
    #[serde(default)]
    pub asset_kind: AssetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specific_asset_ids: Vec<SpecificAssetId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetAdministrationShell {
    pub id: String,
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub asset_information: AssetInformation,
    #[serde(default)]
    pub submodels: Vec<Reference>,
}

impl AssetAdministrationShell {
    pub fn new(id: impl Into<String>, id_short: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: ElementBase::new(id_short),
            asset_information: AssetInformation::default(),
            submodels: Vec::new(),
        }
    }

    pub fn reference(&self) -> Reference {
        Reference::shell(self.id.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptDescription {
    pub id: String,
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub is_case_of: Vec<Reference>,
}

impl ConceptDescription {
    pub fn new(id: impl Into<String>, id_short: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: ElementBase::new(id_short),
            is_case_of: Vec::new(),
        }
    }

    pub fn reference(&self) -> Reference {
        Reference::concept_description(self.id.clone())
    }
}

/// Any element a change notification can carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ModelElement {
    Shell(AssetAdministrationShell),
    Submodel(Submodel),
    ConceptDescription(ConceptDescription),
    SubmodelElement(SubmodelElement),
    Qualifier(Qualifier),
}

impl ModelElement {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelElement::Shell(_) => "AssetAdministrationShell",
            ModelElement::Submodel(_) => "Submodel",
            ModelElement::ConceptDescription(_) => "ConceptDescription",
            ModelElement::SubmodelElement(e) => e.key_type().as_str(),
            ModelElement::Qualifier(_) => "Qualifier",
        }
    }
}

/// The complete model: shells, submodels and concept descriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default)]
    pub asset_administration_shells: Vec<AssetAdministrationShell>,
    #[serde(default)]
    pub submodels: Vec<Submodel>,
    #[serde(default)]
    pub concept_descriptions: Vec<ConceptDescription>,
}

impl Environment {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Look up the element at `reference`.
    pub fn find(&self, reference: &Reference) -> Option<ModelElement> {
        let (first, rest) = reference.keys().split_first()?;
        match first.key_type {
            KeyType::AssetAdministrationShell if rest.is_empty() => self
                .asset_administration_shells
                .iter()
                .find(|s| s.id == first.value)
                .cloned()
                .map(ModelElement::Shell),
            KeyType::ConceptDescription if rest.is_empty() => self
                .concept_descriptions
                .iter()
                .find(|c| c.id == first.value)
                .cloned()
                .map(ModelElement::ConceptDescription),
            KeyType::Submodel => {
                let submodel = self.submodels.iter().find(|s| s.id == first.value)?;
                if rest.is_empty() {
                    return Some(ModelElement::Submodel(submodel.clone()));
                }
                find_in(&submodel.submodel_elements, rest)
                    .cloned()
                    .map(ModelElement::SubmodelElement)
            }
            _ => None,
        }
    }

    /// Mutable access to the submodel element at `reference`.
    pub fn find_element_mut(&mut self, reference: &Reference) -> Option<&mut SubmodelElement> {
        let (first, rest) = reference.keys().split_first()?;
        if first.key_type != KeyType::Submodel || rest.is_empty() {
            return None;
        }
        let submodel = self.submodels.iter_mut().find(|s| s.id == first.value)?;
        find_in_mut(&mut submodel.submodel_elements, rest)
    }
}

/// Resolve a key against a sibling slice: by position for numeric keys in
/// lists, otherwise by idShort.
fn position(elements: &[SubmodelElement], key: &Key, in_list: bool) -> Option<usize> {
    if in_list {
        if let Ok(index) = key.value.parse::<usize>() {
            return (index < elements.len()).then_some(index);
        }
    }
    elements.iter().position(|e| e.id_short() == key.value)
}

fn find_in<'a>(elements: &'a [SubmodelElement], keys: &[Key]) -> Option<&'a SubmodelElement> {
    let mut current = elements;
    let mut in_list = false;
    let mut found = None;
    for key in keys {
        let element = &current[position(current, key, in_list)?];
        in_list = element.is_list();
        current = element.children();
        found = Some(element);
    }
    found
}

fn find_in_mut<'a>(
    elements: &'a mut Vec<SubmodelElement>,
    keys: &[Key],
) -> Option<&'a mut SubmodelElement> {
    let (key, rest) = keys.split_first()?;
    find_step_mut(elements, key, rest, false)
}

fn find_step_mut<'a>(
    elements: &'a mut Vec<SubmodelElement>,
    key: &Key,
    rest: &[Key],
    in_list: bool,
) -> Option<&'a mut SubmodelElement> {
    let index = position(elements, key, in_list)?;
    let element = &mut elements[index];
    match rest.split_first() {
        None => Some(element),
        Some((next, rest)) => {
            let is_list = element.is_list();
            let children = element.children_mut()?;
            find_step_mut(children, next, rest, is_list)
        }
    }
}

// ── Serde helpers ─────────────────────────────────────────────────

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_env() -> Environment {
        let mut sm = Submodel::new("urn:sm:1", "Sensors");
        let mut coll = SubmodelElementCollection {
            base: ElementBase::new("Coll"),
            ..Default::default()
        };
        coll.value.push(SubmodelElement::Property(Property::new(
            "Temp",
            DataTypeDef::Double,
            "21.5",
        )));
        let list = SubmodelElementList {
            base: ElementBase::new("Readings"),
            value: vec![
                SubmodelElement::Property(Property::new("r0", DataTypeDef::Int, "1")),
                SubmodelElement::Property(Property::new("r1", DataTypeDef::Int, "2")),
            ],
            ..Default::default()
        };
        sm.submodel_elements
            .push(SubmodelElement::SubmodelElementCollection(coll));
        sm.submodel_elements
            .push(SubmodelElement::SubmodelElementList(list));
        Environment {
            submodels: vec![sm],
            ..Default::default()
        }
    }

    #[test]
    fn find_nested_and_list_elements() {
        let env = sample_env();
        let temp = Reference::submodel("urn:sm:1")
            .child(Key::id_short(KeyType::SubmodelElementCollection, "Coll"))
            .child(Key::id_short(KeyType::Property, "Temp"));
        match env.find(&temp) {
            Some(ModelElement::SubmodelElement(SubmodelElement::Property(p))) => {
                assert_eq!(p.value.as_deref(), Some("21.5"))
            }
            other => panic!("unexpected: {other:?}"),
        }

        let second = Reference::submodel("urn:sm:1")
            .child(Key::id_short(KeyType::SubmodelElementList, "Readings"))
            .child(Key::id_short(KeyType::Property, "1"));
        match env.find(&second) {
            Some(ModelElement::SubmodelElement(e)) => assert_eq!(e.id_short(), "r1"),
            other => panic!("unexpected: {other:?}"),
        }

        let missing = Reference::submodel("urn:sm:1")
            .child(Key::id_short(KeyType::Property, "Nope"));
        assert!(env.find(&missing).is_none());
    }

    #[test]
    fn apply_value_in_place() {
        let mut env = sample_env();
        let temp = Reference::submodel("urn:sm:1")
            .child(Key::id_short(KeyType::SubmodelElementCollection, "Coll"))
            .child(Key::id_short(KeyType::Property, "Temp"));
        let element = env.find_element_mut(&temp).unwrap();
        element
            .apply_value(ElementValue::Property {
                value: Some("30".into()),
            })
            .unwrap();
        let err = element
            .apply_value(ElementValue::Range { min: None, max: None })
            .unwrap_err();
        assert!(matches!(err, ModelError::ValueMismatch { .. }));
        assert_eq!(
            env.find(&temp).and_then(|e| match e {
                ModelElement::SubmodelElement(e) => e.value(),
                _ => None,
            }),
            Some(ElementValue::Property {
                value: Some("30".into())
            })
        );
    }

    #[test]
    fn element_json_uses_model_type_tag() {
        let json = r#"{
            "modelType": "Blob",
            "idShort": "Image",
            "contentType": "image/png",
            "value": "AQID"
        }"#;
        let element: SubmodelElement = serde_json::from_str(json).unwrap();
        match &element {
            SubmodelElement::Blob(b) => {
                assert_eq!(b.base.id_short, "Image");
                assert_eq!(b.value, vec![1, 2, 3]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let back = serde_json::to_value(&element).unwrap();
        assert_eq!(back["modelType"], "Blob");
        assert_eq!(back["value"], "AQID");
    }

    #[test]
    fn environment_parses_from_json() {
        let json = r#"{
            "assetAdministrationShells": [
                { "id": "urn:aas:1", "idShort": "Pump", "submodels": [] }
            ],
            "submodels": [
                {
                    "id": "urn:sm:1",
                    "idShort": "Data",
                    "semanticId": { "keys": [ { "type": "GlobalReference", "value": "urn:cd:1", "idType": "IRI" } ] },
                    "submodelElements": [
                        { "modelType": "Property", "idShort": "P1", "valueType": "xs:int", "value": "5" }
                    ]
                }
            ]
        }"#;
        let env = Environment::from_json(json).unwrap();
        assert_eq!(env.asset_administration_shells[0].base.id_short, "Pump");
        assert_eq!(env.submodels[0].submodel_elements.len(), 1);
        assert!(env.submodels[0].base.semantic_id.is_some());
    }
}
