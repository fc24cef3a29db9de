//! Core identity and value-type primitives for the shell model.
//!
//! A [`Reference`] is the canonical, value-compared key path that identifies
//! one element of the model. It is the primary key of every index in the
//! projection engine, so equality and hashing are purely structural.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

// ── Keys ──────────────────────────────────────────────────────────

/// The kind of model element a key segment points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum KeyType {
    AssetAdministrationShell,
    Submodel,
    ConceptDescription,
    SubmodelElement,
    SubmodelElementCollection,
    SubmodelElementList,
    Property,
    MultiLanguageProperty,
    Range,
    Blob,
    File,
    ReferenceElement,
    RelationshipElement,
    AnnotatedRelationshipElement,
    Entity,
    BasicEvent,
    Operation,
    Capability,
    DataElement,
    GlobalReference,
    FragmentReference,
    Referable,
    Identifiable,
}

impl KeyType {
    pub const ALL: [KeyType; 23] = [
        KeyType::AssetAdministrationShell,
        KeyType::Submodel,
        KeyType::ConceptDescription,
        KeyType::SubmodelElement,
        KeyType::SubmodelElementCollection,
        KeyType::SubmodelElementList,
        KeyType::Property,
        KeyType::MultiLanguageProperty,
        KeyType::Range,
        KeyType::Blob,
        KeyType::File,
        KeyType::ReferenceElement,
        KeyType::RelationshipElement,
        KeyType::AnnotatedRelationshipElement,
        KeyType::Entity,
        KeyType::BasicEvent,
        KeyType::Operation,
        KeyType::Capability,
        KeyType::DataElement,
        KeyType::GlobalReference,
        KeyType::FragmentReference,
        KeyType::Referable,
        KeyType::Identifiable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::AssetAdministrationShell => "AssetAdministrationShell",
            KeyType::Submodel => "Submodel",
            KeyType::ConceptDescription => "ConceptDescription",
            KeyType::SubmodelElement => "SubmodelElement",
            KeyType::SubmodelElementCollection => "SubmodelElementCollection",
            KeyType::SubmodelElementList => "SubmodelElementList",
            KeyType::Property => "Property",
            KeyType::MultiLanguageProperty => "MultiLanguageProperty",
            KeyType::Range => "Range",
            KeyType::Blob => "Blob",
            KeyType::File => "File",
            KeyType::ReferenceElement => "ReferenceElement",
            KeyType::RelationshipElement => "RelationshipElement",
            KeyType::AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
            KeyType::Entity => "Entity",
            KeyType::BasicEvent => "BasicEvent",
            KeyType::Operation => "Operation",
            KeyType::Capability => "Capability",
            KeyType::DataElement => "DataElement",
            KeyType::GlobalReference => "GlobalReference",
            KeyType::FragmentReference => "FragmentReference",
            KeyType::Referable => "Referable",
            KeyType::Identifiable => "Identifiable",
        }
    }

    /// Whether this key addresses an identifiable root (shell, submodel,
    /// concept description) rather than a nested referable.
    pub fn is_identifiable(&self) -> bool {
        matches!(
            self,
            KeyType::AssetAdministrationShell
                | KeyType::Submodel
                | KeyType::ConceptDescription
                | KeyType::Identifiable
        )
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ModelError::InvalidKey(format!("unknown key type: {s}")))
    }
}

/// How the value of a key is to be interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum IdKind {
    #[default]
    IdShort,
    #[serde(rename = "IRI")]
    Iri,
    #[serde(rename = "IRDI")]
    Irdi,
    Custom,
    FragmentId,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::IdShort => "IdShort",
            IdKind::Iri => "IRI",
            IdKind::Irdi => "IRDI",
            IdKind::Custom => "Custom",
            IdKind::FragmentId => "FragmentId",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            IdKind::IdShort,
            IdKind::Iri,
            IdKind::Irdi,
            IdKind::Custom,
            IdKind::FragmentId,
        ]
        .into_iter()
        .find(|k| k.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| ModelError::InvalidKey(format!("unknown id kind: {s}")))
    }
}

/// One segment of a [`Reference`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub value: String,
    #[serde(default)]
    pub id_type: IdKind,
}

impl Key {
    pub fn new(key_type: KeyType, id_type: IdKind, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
            id_type,
        }
    }

    /// Key addressing a nested referable by its idShort.
    pub fn id_short(key_type: KeyType, value: impl Into<String>) -> Self {
        Self::new(key_type, IdKind::IdShort, value)
    }

    /// Key addressing an identifiable by IRI.
    pub fn iri(key_type: KeyType, value: impl Into<String>) -> Self {
        Self::new(key_type, IdKind::Iri, value)
    }
}

/// Text form: `(KeyType)[IdKind]value`.
impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}{}", self.key_type, bracketed(self.id_type), self.value)
    }
}

fn bracketed(id: IdKind) -> String {
    format!("[{id}]")
}

impl FromStr for Key {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ModelError::InvalidKey(s.to_string());

        let rest = s.strip_prefix('(').ok_or_else(invalid)?;
        let (key_type, rest) = rest.split_once(')').ok_or_else(invalid)?;
        let rest = rest.strip_prefix('[').ok_or_else(invalid)?;
        let (id_type, value) = rest.split_once(']').ok_or_else(invalid)?;

        Ok(Key {
            key_type: key_type.parse()?,
            value: value.to_string(),
            id_type: id_type.parse()?,
        })
    }
}

// ── References ────────────────────────────────────────────────────

/// Ordered, immutable key path identifying one element in the model.
///
/// Two references are equal when their key sequences are equal; the model
/// source may hand out fresh instances for the same element across updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Reference {
    keys: Vec<Key>,
}

impl Reference {
    pub fn new(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    pub fn from_key(key: Key) -> Self {
        Self { keys: vec![key] }
    }

    /// Reference to an Asset Administration Shell by id.
    pub fn shell(id: impl Into<String>) -> Self {
        Self::from_key(Key::iri(KeyType::AssetAdministrationShell, id))
    }

    /// Reference to a submodel by id.
    pub fn submodel(id: impl Into<String>) -> Self {
        Self::from_key(Key::iri(KeyType::Submodel, id))
    }

    /// Reference to a concept description by id.
    pub fn concept_description(id: impl Into<String>) -> Self {
        Self::from_key(Key::iri(KeyType::ConceptDescription, id))
    }

    /// External (global) reference, as used for semantic ids.
    pub fn global(value: impl Into<String>) -> Self {
        Self::from_key(Key::iri(KeyType::GlobalReference, value))
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first(&self) -> Option<&Key> {
        self.keys.first()
    }

    pub fn last(&self) -> Option<&Key> {
        self.keys.last()
    }

    /// A new reference extended by one key.
    pub fn child(&self, key: Key) -> Reference {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        keys.extend_from_slice(&self.keys);
        keys.push(key);
        Reference { keys }
    }

    /// The reference with its last key removed, or `None` for roots.
    pub fn parent(&self) -> Option<Reference> {
        if self.keys.len() <= 1 {
            return None;
        }
        Some(Reference {
            keys: self.keys[..self.keys.len() - 1].to_vec(),
        })
    }

    /// True if `prefix` is this reference or one of its ancestors.
    pub fn starts_with(&self, prefix: &Reference) -> bool {
        self.keys.len() >= prefix.keys.len() && self.keys[..prefix.keys.len()] == prefix.keys[..]
    }

    /// The owning submodel, when the path is rooted at one.
    pub fn submodel_root(&self) -> Option<Reference> {
        match self.keys.first() {
            Some(k) if k.key_type == KeyType::Submodel => Some(Reference::from_key(k.clone())),
            _ => None,
        }
    }

    /// Compare by key values only, ignoring key and id kinds.
    pub fn values_eq(&self, other: &Reference) -> bool {
        self.keys.len() == other.keys.len()
            && self
                .keys
                .iter()
                .zip(&other.keys)
                .all(|(a, b)| a.value == b.value)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Reference::default());
        }

        // Keys start with '(' so only split where a new key begins.
        let mut keys = Vec::new();
        let mut start = 0;
        for (pos, _) in s.match_indices(", (") {
            keys.push(s[start..pos].parse()?);
            start = pos + 2;
        }
        keys.push(s[start..].parse()?);
        Ok(Reference { keys })
    }
}

// ── Value types ───────────────────────────────────────────────────

/// Domain value-type tag (XSD data type definitions plus `langString`).
///
/// Unknown tags are read as [`DataTypeDef::String`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum DataTypeDef {
    #[default]
    String,
    Boolean,
    Decimal,
    Integer,
    Int,
    Long,
    Short,
    Byte,
    UnsignedInt,
    UnsignedLong,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    NonNegativeInteger,
    NegativeInteger,
    NonPositiveInteger,
    Float,
    Double,
    DateTime,
    Date,
    Time,
    Duration,
    GDay,
    GMonth,
    GMonthDay,
    GYear,
    GYearMonth,
    AnyUri,
    Base64Binary,
    HexBinary,
    LangString,
}

impl DataTypeDef {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataTypeDef::String => "xs:string",
            DataTypeDef::Boolean => "xs:boolean",
            DataTypeDef::Decimal => "xs:decimal",
            DataTypeDef::Integer => "xs:integer",
            DataTypeDef::Int => "xs:int",
            DataTypeDef::Long => "xs:long",
            DataTypeDef::Short => "xs:short",
            DataTypeDef::Byte => "xs:byte",
            DataTypeDef::UnsignedInt => "xs:unsignedInt",
            DataTypeDef::UnsignedLong => "xs:unsignedLong",
            DataTypeDef::UnsignedShort => "xs:unsignedShort",
            DataTypeDef::UnsignedByte => "xs:unsignedByte",
            DataTypeDef::PositiveInteger => "xs:positiveInteger",
            DataTypeDef::NonNegativeInteger => "xs:nonNegativeInteger",
            DataTypeDef::NegativeInteger => "xs:negativeInteger",
            DataTypeDef::NonPositiveInteger => "xs:nonPositiveInteger",
            DataTypeDef::Float => "xs:float",
            DataTypeDef::Double => "xs:double",
            DataTypeDef::DateTime => "xs:dateTime",
            DataTypeDef::Date => "xs:date",
            DataTypeDef::Time => "xs:time",
            DataTypeDef::Duration => "xs:duration",
            DataTypeDef::GDay => "xs:gDay",
            DataTypeDef::GMonth => "xs:gMonth",
            DataTypeDef::GMonthDay => "xs:gMonthDay",
            DataTypeDef::GYear => "xs:gYear",
            DataTypeDef::GYearMonth => "xs:gYearMonth",
            DataTypeDef::AnyUri => "xs:anyURI",
            DataTypeDef::Base64Binary => "xs:base64Binary",
            DataTypeDef::HexBinary => "xs:hexBinary",
            DataTypeDef::LangString => "rdf:langString",
        }
    }

    /// Parse a value-type tag, with or without its `xs:`/`rdf:` prefix.
    /// Unrecognized tags fall back to `String`.
    pub fn from_tag(tag: &str) -> Self {
        let lower = tag.trim().to_ascii_lowercase();
        let name = lower
            .strip_prefix("xs:")
            .or_else(|| lower.strip_prefix("rdf:"))
            .unwrap_or(&lower);

        match name {
            "boolean" => DataTypeDef::Boolean,
            "decimal" => DataTypeDef::Decimal,
            "integer" => DataTypeDef::Integer,
            "int" => DataTypeDef::Int,
            "long" => DataTypeDef::Long,
            "short" => DataTypeDef::Short,
            "byte" => DataTypeDef::Byte,
            "unsignedint" => DataTypeDef::UnsignedInt,
            "unsignedlong" => DataTypeDef::UnsignedLong,
            "unsignedshort" => DataTypeDef::UnsignedShort,
            "unsignedbyte" => DataTypeDef::UnsignedByte,
            "positiveinteger" => DataTypeDef::PositiveInteger,
            "nonnegativeinteger" => DataTypeDef::NonNegativeInteger,
            "negativeinteger" => DataTypeDef::NegativeInteger,
            "nonpositiveinteger" => DataTypeDef::NonPositiveInteger,
            "float" => DataTypeDef::Float,
            "double" => DataTypeDef::Double,
            "datetime" => DataTypeDef::DateTime,
            "date" => DataTypeDef::Date,
            "time" => DataTypeDef::Time,
            "duration" => DataTypeDef::Duration,
            "gday" => DataTypeDef::GDay,
            "gmonth" => DataTypeDef::GMonth,
            "gmonthday" => DataTypeDef::GMonthDay,
            "gyear" => DataTypeDef::GYear,
            "gyearmonth" => DataTypeDef::GYearMonth,
            "anyuri" => DataTypeDef::AnyUri,
            "base64binary" => DataTypeDef::Base64Binary,
            "hexbinary" => DataTypeDef::HexBinary,
            "langstring" => DataTypeDef::LangString,
            "string" => DataTypeDef::String,
            other => {
                tracing::debug!(value_type = %other, "Unknown value type, using string");
                DataTypeDef::String
            }
        }
    }
}

impl fmt::Display for DataTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DataTypeDef {
    fn from(value: String) -> Self {
        DataTypeDef::from_tag(&value)
    }
}

impl From<DataTypeDef> for String {
    fn from(value: DataTypeDef) -> Self {
        value.as_str().to_string()
    }
}

// ── Small enums ───────────────────────────────────────────────────

/// A text in one language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LangString {
    pub language: String,
    pub text: String,
}

impl LangString {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ModelingKind {
    Template,
    #[default]
    Instance,
}

impl ModelingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelingKind::Template => "Template",
            ModelingKind::Instance => "Instance",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EntityType {
    #[default]
    CoManagedEntity,
    SelfManagedEntity,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::CoManagedEntity => "CoManagedEntity",
            EntityType::SelfManagedEntity => "SelfManagedEntity",
        }
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CoManagedEntity" => Ok(EntityType::CoManagedEntity),
            "SelfManagedEntity" => Ok(EntityType::SelfManagedEntity),
            other => Err(ModelError::InvalidValue(format!("unknown entity type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AssetKind {
    Type,
    #[default]
    Instance,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Type => "Type",
            AssetKind::Instance => "Instance",
        }
    }
}
