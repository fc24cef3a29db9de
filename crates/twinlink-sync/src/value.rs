//! Conversion between domain-typed lexical values and graph-native values.
//!
//! Domain values travel as strings tagged with a [`DataTypeDef`]; the graph
//! stores them as typed [`Variant`]s. Every conversion is fallible and
//! reports [`SyncError::ValueFormat`] with the offending type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};

use twinlink_core::{DataTypeDef, LangString, Reference};
use twinlink_graph::{DataType, LocalizedText, Variant};

use crate::error::{Result, SyncError};

/// Converts values in both directions.
#[derive(Debug, Clone, Copy)]
pub struct ValueBridge {
    default_offset: FixedOffset,
}

impl Default for ValueBridge {
    fn default() -> Self {
        Self {
            default_offset: Utc.fix(),
        }
    }
}

impl ValueBridge {
    /// Bridge that reads zone-less date-times at `offset_minutes` east of UTC.
    pub fn new(offset_minutes: i32) -> Self {
        let default_offset =
            FixedOffset::east_opt(offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
        Self { default_offset }
    }

    /// Graph data type used for a domain value type.
    pub fn data_type_for(&self, value_type: DataTypeDef) -> DataType {
        match value_type {
            DataTypeDef::Boolean => DataType::Boolean,
            DataTypeDef::Byte => DataType::SByte,
            DataTypeDef::UnsignedByte => DataType::Byte,
            DataTypeDef::Short => DataType::Int16,
            DataTypeDef::UnsignedShort => DataType::UInt16,
            DataTypeDef::Int => DataType::Int32,
            DataTypeDef::UnsignedInt => DataType::UInt32,
            DataTypeDef::Long => DataType::Int64,
            DataTypeDef::UnsignedLong => DataType::UInt64,
            DataTypeDef::Float => DataType::Float,
            DataTypeDef::Double => DataType::Double,
            DataTypeDef::DateTime => DataType::DateTime,
            DataTypeDef::Base64Binary | DataTypeDef::HexBinary => DataType::ByteString,
            DataTypeDef::LangString => DataType::LocalizedText,
            DataTypeDef::String
            | DataTypeDef::Decimal
            | DataTypeDef::Integer
            | DataTypeDef::PositiveInteger
            | DataTypeDef::NonNegativeInteger
            | DataTypeDef::NegativeInteger
            | DataTypeDef::NonPositiveInteger
            | DataTypeDef::Date
            | DataTypeDef::Time
            | DataTypeDef::Duration
            | DataTypeDef::GDay
            | DataTypeDef::GMonth
            | DataTypeDef::GMonthDay
            | DataTypeDef::GYear
            | DataTypeDef::GYearMonth
            | DataTypeDef::AnyUri => DataType::String,
        }
    }

    // ── Domain → graph ────────────────────────────────────────────

    /// Convert a lexical domain value. `None` becomes `Null`, as does an
    /// empty string for every non-textual type.
    pub fn to_variant(&self, value_type: DataTypeDef, value: Option<&str>) -> Result<Variant> {
        let Some(raw) = value else {
            return Ok(Variant::Null);
        };
        let data_type = self.data_type_for(value_type);
        let text = raw.trim();
        if text.is_empty() && data_type != DataType::String {
            return Ok(Variant::Null);
        }

        let bad = |e: &dyn std::fmt::Display| {
            SyncError::value_format(value_type, format!("{raw:?}: {e}"))
        };

        Ok(match value_type {
            DataTypeDef::Boolean => {
                Variant::Boolean(parse_bool(text).ok_or_else(|| bad(&"not a boolean"))?)
            }
            DataTypeDef::Byte => Variant::SByte(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::UnsignedByte => Variant::Byte(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::Short => Variant::Int16(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::UnsignedShort => Variant::UInt16(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::Int => Variant::Int32(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::UnsignedInt => Variant::UInt32(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::Long => Variant::Int64(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::UnsignedLong => Variant::UInt64(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::Float => Variant::Float(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::Double => Variant::Double(text.parse().map_err(|e| bad(&e))?),
            DataTypeDef::DateTime => Variant::DateTime(
                self.parse_date_time(text)
                    .ok_or_else(|| bad(&"not a date-time"))?,
            ),
            DataTypeDef::Base64Binary => {
                Variant::ByteString(STANDARD.decode(text).map_err(|e| bad(&e))?)
            }
            DataTypeDef::HexBinary => Variant::ByteString(hex::decode(text).map_err(|e| bad(&e))?),
            DataTypeDef::LangString => Variant::LocalizedText(parse_lang_string(raw)),
            DataTypeDef::Decimal => {
                if !is_decimal(text) {
                    return Err(bad(&"not a decimal"));
                }
                Variant::String(text.to_string())
            }
            DataTypeDef::Integer
            | DataTypeDef::PositiveInteger
            | DataTypeDef::NonNegativeInteger
            | DataTypeDef::NegativeInteger
            | DataTypeDef::NonPositiveInteger => {
                if !integer_in_range(value_type, text) {
                    return Err(bad(&"not an integer in range"));
                }
                Variant::String(text.to_string())
            }
            _ => Variant::String(raw.to_string()),
        })
    }

    /// Zone-aware values keep their offset; zone-less ones use the default.
    fn parse_date_time(&self, text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        self.default_offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    // ── Graph → domain ────────────────────────────────────────────

    /// Convert a graph value back to its lexical domain form.
    ///
    /// String variants are accepted for every type and validated against it.
    pub fn from_variant(&self, value_type: DataTypeDef, value: &Variant) -> Result<Option<String>> {
        let mismatch = || {
            SyncError::value_format(
                value_type,
                format!("cannot take a {:?} value", value.data_type()),
            )
        };

        let text = match (value_type, value) {
            (_, Variant::Null) => return Ok(None),
            (_, Variant::String(s)) => {
                self.to_variant(value_type, Some(s))?;
                s.clone()
            }
            (DataTypeDef::Boolean, Variant::Boolean(b)) => b.to_string(),
            (DataTypeDef::Byte, Variant::SByte(n)) => n.to_string(),
            (DataTypeDef::UnsignedByte, Variant::Byte(n)) => n.to_string(),
            (DataTypeDef::Short, Variant::Int16(n)) => n.to_string(),
            (DataTypeDef::UnsignedShort, Variant::UInt16(n)) => n.to_string(),
            (DataTypeDef::Int, Variant::Int32(n)) => n.to_string(),
            (DataTypeDef::UnsignedInt, Variant::UInt32(n)) => n.to_string(),
            (DataTypeDef::Long, Variant::Int64(n)) => n.to_string(),
            (DataTypeDef::UnsignedLong, Variant::UInt64(n)) => n.to_string(),
            (DataTypeDef::Float, Variant::Float(f)) => format_float(f64::from(*f), f.to_string()),
            (DataTypeDef::Double, Variant::Double(f)) => format_float(*f, f.to_string()),
            (DataTypeDef::DateTime, Variant::DateTime(dt)) => {
                dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            }
            (DataTypeDef::Base64Binary, Variant::ByteString(bytes)) => STANDARD.encode(bytes),
            (DataTypeDef::HexBinary, Variant::ByteString(bytes)) => hex::encode(bytes),
            (DataTypeDef::LangString, Variant::LocalizedText(lt)) => format_lang_string(lt),
            _ => return Err(mismatch()),
        };
        Ok(Some(text))
    }

    // ── Composite values ──────────────────────────────────────────

    pub fn lang_strings(&self, values: &[LangString]) -> Variant {
        Variant::Array(
            values
                .iter()
                .map(|l| Variant::LocalizedText(LocalizedText::new(&l.language, &l.text)))
                .collect(),
        )
    }

    pub fn to_lang_strings(&self, value: &Variant) -> Result<Vec<LangString>> {
        let items = match value {
            Variant::Null => return Ok(Vec::new()),
            Variant::Array(items) => items.as_slice(),
            single @ Variant::LocalizedText(_) => std::slice::from_ref(single),
            _ => return Err(SyncError::value_format("langString[]", "expected localized texts")),
        };
        items
            .iter()
            .map(|item| match item {
                Variant::LocalizedText(lt) => Ok(LangString::new(&lt.locale, &lt.text)),
                _ => Err(SyncError::value_format("langString[]", "expected localized texts")),
            })
            .collect()
    }

    /// A reference as an array of key texts.
    pub fn reference_variant(&self, reference: Option<&Reference>) -> Variant {
        Variant::Array(
            reference
                .map(|r| r.keys().iter().map(|k| Variant::String(k.to_string())).collect())
                .unwrap_or_default(),
        )
    }

    /// Parse an array of key texts. An empty array means "no reference".
    pub fn to_reference(&self, value: &Variant) -> Result<Option<Reference>> {
        let items = match value {
            Variant::Null => return Ok(None),
            Variant::Array(items) => items,
            _ => return Err(SyncError::value_format("reference", "expected an array of keys")),
        };
        if items.is_empty() {
            return Ok(None);
        }
        let keys = items
            .iter()
            .map(|item| match item {
                Variant::String(s) => Ok(s.parse()?),
                _ => Err(SyncError::value_format("reference", "keys must be strings")),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Reference::new(keys)))
    }

    pub fn to_bytes(&self, value: &Variant) -> Result<Vec<u8>> {
        match value {
            Variant::Null => Ok(Vec::new()),
            Variant::ByteString(bytes) => Ok(bytes.clone()),
            Variant::String(s) => STANDARD
                .decode(s.trim())
                .map_err(|e| SyncError::value_format(DataTypeDef::Base64Binary, e.to_string())),
            _ => Err(SyncError::value_format("ByteString", "expected bytes")),
        }
    }

    pub fn to_text(&self, value: &Variant) -> Result<Option<String>> {
        self.from_variant(DataTypeDef::String, value)
    }
}

// ── Lexical helpers ───────────────────────────────────────────────

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ if text.eq_ignore_ascii_case("true") => Some(true),
        _ if text.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn format_float(value: f64, display: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "INF" } else { "-INF" };
        text.to_string()
    } else {
        display
    }
}

/// `text@lang`, split at the last `@`.
fn parse_lang_string(raw: &str) -> LocalizedText {
    match raw.rsplit_once('@') {
        Some((text, lang))
            if !lang.is_empty() && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            LocalizedText::new(lang, text)
        }
        _ => LocalizedText::new("", raw),
    }
}

fn format_lang_string(lt: &LocalizedText) -> String {
    if lt.locale.is_empty() {
        lt.text.clone()
    } else {
        format!("{}@{}", lt.text, lt.locale)
    }
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(text: &str) -> bool {
    let (_, body) = split_sign(text);
    match body.split_once('.') {
        Some((int, frac)) => {
            (is_digits(int) || int.is_empty())
                && (is_digits(frac) || frac.is_empty())
                && !(int.is_empty() && frac.is_empty())
        }
        None => is_digits(body),
    }
}

fn integer_in_range(value_type: DataTypeDef, text: &str) -> bool {
    let (negative, digits) = split_sign(text);
    if !is_digits(digits) {
        return false;
    }
    let zero = digits.bytes().all(|b| b == b'0');
    match value_type {
        DataTypeDef::PositiveInteger => !negative && !zero,
        DataTypeDef::NonNegativeInteger => !negative || zero,
        DataTypeDef::NegativeInteger => negative && !zero,
        DataTypeDef::NonPositiveInteger => negative || zero,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use twinlink_core::{Key, KeyType};

    fn bridge() -> ValueBridge {
        ValueBridge::default()
    }

    #[test]
    fn test_type_mapping() {
        let b = bridge();
        assert_eq!(b.data_type_for(DataTypeDef::Int), DataType::Int32);
        assert_eq!(b.data_type_for(DataTypeDef::UnsignedByte), DataType::Byte);
        assert_eq!(b.data_type_for(DataTypeDef::Byte), DataType::SByte);
        assert_eq!(b.data_type_for(DataTypeDef::HexBinary), DataType::ByteString);
        assert_eq!(b.data_type_for(DataTypeDef::Decimal), DataType::String);
        assert_eq!(b.data_type_for(DataTypeDef::GYearMonth), DataType::String);
    }

    #[test]
    fn test_scalar_conversions() {
        let b = bridge();
        assert_eq!(
            b.to_variant(DataTypeDef::Int, Some("42")).unwrap(),
            Variant::Int32(42)
        );
        assert_eq!(
            b.to_variant(DataTypeDef::Boolean, Some("1")).unwrap(),
            Variant::Boolean(true)
        );
        assert_eq!(
            b.to_variant(DataTypeDef::HexBinary, Some("0aff")).unwrap(),
            Variant::ByteString(vec![0x0a, 0xff])
        );
        assert_eq!(b.to_variant(DataTypeDef::Int, None).unwrap(), Variant::Null);
        assert_eq!(b.to_variant(DataTypeDef::Int, Some("")).unwrap(), Variant::Null);
        assert_eq!(
            b.to_variant(DataTypeDef::String, Some("")).unwrap(),
            Variant::String(String::new())
        );
    }

    #[test]
    fn test_format_errors() {
        let b = bridge();
        let err = b.to_variant(DataTypeDef::Int, Some("abc")).unwrap_err();
        assert!(matches!(err, SyncError::ValueFormat { .. }));
        assert!(b.to_variant(DataTypeDef::UnsignedByte, Some("300")).is_err());
        assert!(b.to_variant(DataTypeDef::Decimal, Some("1.2.3")).is_err());
        assert!(b.to_variant(DataTypeDef::PositiveInteger, Some("0")).is_err());
        assert!(b.to_variant(DataTypeDef::NonPositiveInteger, Some("0")).is_ok());
        assert!(b.to_variant(DataTypeDef::DateTime, Some("yesterday")).is_err());
        assert!(b
            .from_variant(DataTypeDef::Int, &Variant::Boolean(true))
            .is_err());
    }

    #[test]
    fn test_zone_less_date_time_uses_default_offset() {
        let b = ValueBridge::new(120);
        let v = b
            .to_variant(DataTypeDef::DateTime, Some("2024-05-01T12:00:00"))
            .unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(v, Variant::DateTime(expected));

        let zoned = b
            .to_variant(DataTypeDef::DateTime, Some("2024-05-01T12:00:00Z"))
            .unwrap();
        assert_eq!(
            zoned,
            Variant::DateTime(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_special_floats() {
        let b = bridge();
        let inf = b.to_variant(DataTypeDef::Double, Some("INF")).unwrap();
        assert_eq!(
            b.from_variant(DataTypeDef::Double, &inf).unwrap().as_deref(),
            Some("INF")
        );
        let nan = b.to_variant(DataTypeDef::Float, Some("NaN")).unwrap();
        assert_eq!(
            b.from_variant(DataTypeDef::Float, &nan).unwrap().as_deref(),
            Some("NaN")
        );
    }

    #[test]
    fn test_lang_string_and_references() {
        let b = bridge();
        let v = b.to_variant(DataTypeDef::LangString, Some("Hallo@de")).unwrap();
        assert_eq!(v, Variant::LocalizedText(LocalizedText::new("de", "Hallo")));
        assert_eq!(
            b.from_variant(DataTypeDef::LangString, &v).unwrap().as_deref(),
            Some("Hallo@de")
        );

        let texts = vec![LangString::new("en", "Pump"), LangString::new("de", "Pumpe")];
        let arr = b.lang_strings(&texts);
        assert_eq!(b.to_lang_strings(&arr).unwrap(), texts);

        let r = Reference::submodel("urn:sm:1").child(Key::id_short(KeyType::Property, "P"));
        let rv = b.reference_variant(Some(&r));
        assert_eq!(b.to_reference(&rv).unwrap(), Some(r));
        assert_eq!(b.to_reference(&Variant::Array(vec![])).unwrap(), None);
    }

    proptest! {
        #[test]
        fn prop_int_round_trip(n in any::<i32>()) {
            let b = bridge();
            let text = n.to_string();
            let v = b.to_variant(DataTypeDef::Int, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::Int, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_long_round_trip(n in any::<i64>()) {
            let b = bridge();
            let text = n.to_string();
            let v = b.to_variant(DataTypeDef::Long, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::Long, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_decimal_round_trip(text in "-?[0-9]{1,12}(\\.[0-9]{1,6})?") {
            let b = bridge();
            let v = b.to_variant(DataTypeDef::Decimal, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::Decimal, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_double_round_trip(f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
            let b = bridge();
            let text = f.to_string();
            let v = b.to_variant(DataTypeDef::Double, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::Double, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_bool_round_trip(flag in any::<bool>()) {
            let b = bridge();
            let text = flag.to_string();
            let v = b.to_variant(DataTypeDef::Boolean, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::Boolean, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_string_round_trip(text in ".*") {
            let b = bridge();
            let v = b.to_variant(DataTypeDef::String, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::String, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_date_time_round_trip(secs in 0i64..4_102_444_800) {
            let b = bridge();
            let dt = Utc.timestamp_opt(secs, 0).unwrap();
            let text = dt.to_rfc3339_opts(SecondsFormat::Secs, true);
            let v = b.to_variant(DataTypeDef::DateTime, Some(&text)).unwrap();
            prop_assert_eq!(b.from_variant(DataTypeDef::DateTime, &v).unwrap(), Some(text));
        }

        #[test]
        fn prop_bytes_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let b = bridge();
            let text = STANDARD.encode(&bytes);
            let v = b.to_variant(DataTypeDef::Base64Binary, Some(&text)).unwrap();
            if bytes.is_empty() {
                prop_assert_eq!(v, Variant::Null);
            } else {
                prop_assert_eq!(&v, &Variant::ByteString(bytes.clone()));
                prop_assert_eq!(b.from_variant(DataTypeDef::Base64Binary, &v).unwrap(), Some(text));
            }
        }
    }
}
