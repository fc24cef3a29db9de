//! Value bindings: which field of which element a graph node exposes.

use twinlink_core::{ElementValue, Reference, SubmodelElement};
use twinlink_graph::{DataType, Variant};

use crate::error::{Result, SyncError};
use crate::value::ValueBridge;

/// The element field a bound node reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    PropertyValue,
    RangeMin,
    RangeMax,
    MultiLanguageValue,
    ContentType,
    BlobValue,
    FileValue,
    ReferenceValue,
    RelationshipFirst,
    RelationshipSecond,
    EntityType,
    EntityGlobalAssetId,
    Operation,
}

impl ValueKind {
    /// Fields projected as a reference subtree (key texts plus key objects).
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueKind::ReferenceValue
                | ValueKind::RelationshipFirst
                | ValueKind::RelationshipSecond
                | ValueKind::EntityGlobalAssetId
        )
    }
}

/// Node → element binding used to bridge reads, writes and invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBinding {
    pub kind: ValueKind,
    /// The element owning the field.
    pub reference: Reference,
    /// The submodel the element lives in, if any.
    pub submodel: Option<Reference>,
    /// Snapshot of the element, refreshed on value changes.
    pub element: SubmodelElement,
}

impl ValueBinding {
    pub fn new(
        kind: ValueKind,
        reference: Reference,
        submodel: Option<Reference>,
        element: SubmodelElement,
    ) -> Self {
        Self {
            kind,
            reference,
            submodel,
            element,
        }
    }
}

fn wrong_element(kind: ValueKind, element: &SubmodelElement) -> SyncError {
    SyncError::Validation(format!(
        "{kind:?} binding does not apply to a {}",
        element.key_type()
    ))
}

/// Graph data type of a bound field.
pub fn data_type(bridge: &ValueBridge, kind: ValueKind, element: &SubmodelElement) -> DataType {
    match (kind, element) {
        (ValueKind::PropertyValue, SubmodelElement::Property(p)) => {
            bridge.data_type_for(p.value_type)
        }
        (ValueKind::RangeMin | ValueKind::RangeMax, SubmodelElement::Range(r)) => {
            bridge.data_type_for(r.value_type)
        }
        (ValueKind::MultiLanguageValue, _) => DataType::LocalizedText,
        (ValueKind::BlobValue, _) => DataType::ByteString,
        (ValueKind::Operation, _) => DataType::BaseDataType,
        _ => DataType::String,
    }
}

/// Current graph value of a bound field.
pub fn read(bridge: &ValueBridge, kind: ValueKind, element: &SubmodelElement) -> Result<Variant> {
    Ok(match (kind, element) {
        (ValueKind::PropertyValue, SubmodelElement::Property(p)) => {
            bridge.to_variant(p.value_type, p.value.as_deref())?
        }
        (ValueKind::RangeMin, SubmodelElement::Range(r)) => {
            bridge.to_variant(r.value_type, r.min.as_deref())?
        }
        (ValueKind::RangeMax, SubmodelElement::Range(r)) => {
            bridge.to_variant(r.value_type, r.max.as_deref())?
        }
        (ValueKind::MultiLanguageValue, SubmodelElement::MultiLanguageProperty(m)) => {
            bridge.lang_strings(&m.value)
        }
        (ValueKind::ContentType, SubmodelElement::Blob(b)) => {
            Variant::from(b.content_type.as_str())
        }
        (ValueKind::ContentType, SubmodelElement::File(f)) => {
            Variant::from(f.content_type.as_str())
        }
        (ValueKind::BlobValue, SubmodelElement::Blob(b)) => Variant::ByteString(b.value.clone()),
        (ValueKind::FileValue, SubmodelElement::File(f)) => Variant::from(f.value.clone()),
        (ValueKind::ReferenceValue, SubmodelElement::ReferenceElement(r)) => {
            bridge.reference_variant(r.value.as_ref())
        }
        (ValueKind::RelationshipFirst, SubmodelElement::RelationshipElement(r)) => {
            bridge.reference_variant(Some(&r.first))
        }
        (ValueKind::RelationshipFirst, SubmodelElement::AnnotatedRelationshipElement(r)) => {
            bridge.reference_variant(Some(&r.first))
        }
        (ValueKind::RelationshipSecond, SubmodelElement::RelationshipElement(r)) => {
            bridge.reference_variant(Some(&r.second))
        }
        (ValueKind::RelationshipSecond, SubmodelElement::AnnotatedRelationshipElement(r)) => {
            bridge.reference_variant(Some(&r.second))
        }
        (ValueKind::EntityType, SubmodelElement::Entity(e)) => {
            Variant::from(e.entity_type.as_str())
        }
        (ValueKind::EntityGlobalAssetId, SubmodelElement::Entity(e)) => {
            bridge.reference_variant(e.global_asset_id.as_ref())
        }
        (ValueKind::Operation, SubmodelElement::Operation(_)) => Variant::Null,
        (kind, element) => return Err(wrong_element(kind, element)),
    })
}

/// The element value that results from writing `value` into the field.
pub fn write(
    bridge: &ValueBridge,
    kind: ValueKind,
    element: &SubmodelElement,
    value: &Variant,
) -> Result<ElementValue> {
    let current = element
        .value()
        .ok_or_else(|| wrong_element(kind, element))?;

    Ok(match (kind, element, current) {
        (ValueKind::PropertyValue, SubmodelElement::Property(p), _) => ElementValue::Property {
            value: bridge.from_variant(p.value_type, value)?,
        },
        (ValueKind::RangeMin, SubmodelElement::Range(r), ElementValue::Range { max, .. }) => {
            ElementValue::Range {
                min: bridge.from_variant(r.value_type, value)?,
                max,
            }
        }
        (ValueKind::RangeMax, SubmodelElement::Range(r), ElementValue::Range { min, .. }) => {
            ElementValue::Range {
                min,
                max: bridge.from_variant(r.value_type, value)?,
            }
        }
        (ValueKind::MultiLanguageValue, _, ElementValue::MultiLanguage { .. }) => {
            ElementValue::MultiLanguage {
                value: bridge.to_lang_strings(value)?,
            }
        }
        (ValueKind::ContentType, _, ElementValue::Blob { value: bytes, .. }) => ElementValue::Blob {
            content_type: bridge.to_text(value)?.unwrap_or_default(),
            value: bytes,
        },
        (ValueKind::ContentType, _, ElementValue::File { value: path, .. }) => ElementValue::File {
            content_type: bridge.to_text(value)?.unwrap_or_default(),
            value: path,
        },
        (ValueKind::BlobValue, _, ElementValue::Blob { content_type, .. }) => ElementValue::Blob {
            content_type,
            value: bridge.to_bytes(value)?,
        },
        (ValueKind::FileValue, _, ElementValue::File { content_type, .. }) => ElementValue::File {
            content_type,
            value: bridge.to_text(value)?,
        },
        (ValueKind::ReferenceValue, _, ElementValue::Reference { .. }) => ElementValue::Reference {
            value: bridge.to_reference(value)?,
        },
        (ValueKind::RelationshipFirst, _, ElementValue::Relationship { second, .. }) => {
            ElementValue::Relationship {
                first: required_reference(bridge, value)?,
                second,
            }
        }
        (ValueKind::RelationshipSecond, _, ElementValue::Relationship { first, .. }) => {
            ElementValue::Relationship {
                first,
                second: required_reference(bridge, value)?,
            }
        }
        (ValueKind::EntityType, _, ElementValue::Entity { global_asset_id, .. }) => {
            let text = bridge.to_text(value)?.unwrap_or_default();
            ElementValue::Entity {
                entity_type: text.parse()?,
                global_asset_id,
            }
        }
        (ValueKind::EntityGlobalAssetId, _, ElementValue::Entity { entity_type, .. }) => {
            ElementValue::Entity {
                entity_type,
                global_asset_id: bridge.to_reference(value)?,
            }
        }
        (kind, element, _) => return Err(wrong_element(kind, element)),
    })
}

/// The reference held by a reference-valued field.
pub fn reference_field(kind: ValueKind, element: &SubmodelElement) -> Option<&Reference> {
    match (kind, element) {
        (ValueKind::ReferenceValue, SubmodelElement::ReferenceElement(r)) => r.value.as_ref(),
        (ValueKind::RelationshipFirst, SubmodelElement::RelationshipElement(r)) => Some(&r.first),
        (ValueKind::RelationshipFirst, SubmodelElement::AnnotatedRelationshipElement(r)) => {
            Some(&r.first)
        }
        (ValueKind::RelationshipSecond, SubmodelElement::RelationshipElement(r)) => Some(&r.second),
        (ValueKind::RelationshipSecond, SubmodelElement::AnnotatedRelationshipElement(r)) => {
            Some(&r.second)
        }
        (ValueKind::EntityGlobalAssetId, SubmodelElement::Entity(e)) => e.global_asset_id.as_ref(),
        _ => None,
    }
}

fn required_reference(bridge: &ValueBridge, value: &Variant) -> Result<Reference> {
    bridge
        .to_reference(value)?
        .ok_or_else(|| SyncError::value_format("reference", "a relationship end cannot be empty"))
}
