// SPDX-License-Identifier: Apache-2.0

//! Positional arguments passed to contract methods and the values they return.

use crate::account::AccountId;
use itertools::Itertools;
use primitive_types::U256;
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("negative integer {0} cannot be used as an argument")]
    Negative(i64),
    #[error("invalid hex literal '{0}'")]
    Hex(String),
    #[error("integer literal '{0}' does not fit in 256 bits")]
    Overflow(String),
    #[error("missing argument {0}")]
    Missing(usize),
    #[error("argument {index}: expected {expected}, found {found}")]
    Mismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },
    #[error("argument {index}: {value} does not fit in {bits} bits")]
    OutOfRange { index: usize, value: U256, bits: usize },
    #[error("expected {expected} arguments, found {found}")]
    Arity { expected: usize, found: usize },
}

/// A dynamically typed argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Uint(U256),
    Bytes(Vec<u8>),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Parse a value from its textual form.
    ///
    /// Decimal digits are unsigned integers, `0x` prefixed literals are byte
    /// strings, `true` and `false` are booleans. Everything else is a string.
    pub fn parse(text: &str) -> Result<Value, ValueError> {
        match text {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => (),
        }

        if let Some(digits) = text.strip_prefix("0x") {
            return hex::decode(digits)
                .map(Value::Bytes)
                .map_err(|_| ValueError::Hex(text.to_owned()));
        }

        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            return U256::from_dec_str(text)
                .map(Value::Uint)
                .map_err(|_| ValueError::Overflow(text.to_owned()));
        }

        Ok(Value::Str(text.to_owned()))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Uint(_) => "uint",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            Value::Str(v) => write!(f, "{v}"),
            Value::List(v) => write!(f, "[{}]", v.iter().join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v.into())
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        Value::Uint(v.into())
    }
}

impl From<U256> for Value {
    fn from(v: U256) -> Self {
        Value::Uint(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 32]> for Value {
    fn from(v: [u8; 32]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&AccountId> for Value {
    fn from(v: &AccountId) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Unit => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Uint(v) if v.bits() <= 64 => serializer.serialize_u64(v.low_u64()),
            Value::Uint(v) => serializer.collect_str(v),
            Value::Bytes(_) | Value::Str(_) => serializer.collect_str(self),
            Value::List(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for elem in v {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned integer, boolean, string or array")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        u64::try_from(v)
            .map(Value::from)
            .map_err(|_| E::custom(ValueError::Negative(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Value::parse(v).map_err(E::custom)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Unit)
    }

    /// Arrays of bare integers up to 255 are byte strings, as in
    /// `[0x26, 0x70, ...]`. Quoted numbers keep an array a list.
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut elems = Vec::new();
        let mut bytes = Vec::new();
        let mut all_bytes = true;

        while let Some(elem) = seq.next_element::<Element>()? {
            match elem.byte {
                Some(b) => bytes.push(b),
                None => all_bytes = false,
            }
            elems.push(elem.value);
        }

        if all_bytes && !bytes.is_empty() {
            Ok(Value::Bytes(bytes))
        } else {
            Ok(Value::List(elems))
        }
    }
}

/// An array element, and its byte value if it was written as a bare integer
/// that fits in one.
struct Element {
    value: Value,
    byte: Option<u8>,
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element { value, byte: None }
    }
}

struct ElementVisitor;

impl<'de> Visitor<'de> for ElementVisitor {
    type Value = Element;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        ValueVisitor.expecting(f)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Element, E> {
        ValueVisitor.visit_bool(v).map(Element::from)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Element, E> {
        Ok(Element {
            value: ValueVisitor.visit_i64(v)?,
            byte: u8::try_from(v).ok(),
        })
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Element, E> {
        Ok(Element {
            value: ValueVisitor.visit_u64(v)?,
            byte: u8::try_from(v).ok(),
        })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Element, E> {
        ValueVisitor.visit_str(v).map(Element::from)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Element, E> {
        ValueVisitor.visit_unit().map(Element::from)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Element, A::Error> {
        ValueVisitor.visit_seq(seq).map(Element::from)
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ElementVisitor)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Typed access to a positional argument list.
#[derive(Clone, Copy)]
pub struct Args<'a>(&'a [Value]);

impl<'a> Args<'a> {
    pub fn new(args: &'a [Value]) -> Self {
        Args(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn expect_len(&self, expected: usize) -> Result<(), ValueError> {
        if self.0.len() != expected {
            return Err(ValueError::Arity {
                expected,
                found: self.0.len(),
            });
        }

        Ok(())
    }

    fn get(&self, index: usize) -> Result<&'a Value, ValueError> {
        self.0.get(index).ok_or(ValueError::Missing(index))
    }

    fn mismatch(index: usize, expected: &'static str, found: &Value) -> ValueError {
        ValueError::Mismatch {
            index,
            expected,
            found: found.kind().to_owned(),
        }
    }

    pub fn uint(&self, index: usize) -> Result<U256, ValueError> {
        let value = self.get(index)?;

        value
            .as_uint()
            .ok_or_else(|| Self::mismatch(index, "uint", value))
    }

    /// An unsigned integer that must fit in `bits` bits.
    pub fn uint_bits(&self, index: usize, bits: usize) -> Result<U256, ValueError> {
        let value = self.uint(index)?;

        if value.bits() > bits {
            return Err(ValueError::OutOfRange { index, value, bits });
        }

        Ok(value)
    }

    pub fn u16(&self, index: usize) -> Result<u16, ValueError> {
        self.uint_bits(index, 16).map(|v| v.low_u32() as u16)
    }

    pub fn u32(&self, index: usize) -> Result<u32, ValueError> {
        self.uint_bits(index, 32).map(|v| v.low_u32())
    }

    pub fn u64(&self, index: usize) -> Result<u64, ValueError> {
        self.uint_bits(index, 64).map(|v| v.low_u64())
    }

    pub fn u128(&self, index: usize) -> Result<u128, ValueError> {
        self.uint_bits(index, 128).map(|v| v.low_u128())
    }

    /// Exactly 32 bytes, as a `bytes32` argument.
    pub fn bytes32(&self, index: usize) -> Result<[u8; 32], ValueError> {
        let value = self.get(index)?;

        value
            .as_bytes()
            .and_then(|b| <[u8; 32]>::try_from(b).ok())
            .ok_or_else(|| Self::mismatch(index, "bytes32", value))
    }

    pub fn account(&self, index: usize) -> Result<AccountId, ValueError> {
        let value = self.get(index)?;

        match value {
            Value::Str(s) => {
                AccountId::new(s.as_str()).map_err(|_| Self::mismatch(index, "account", value))
            }
            _ => Err(Self::mismatch(index, "account", value)),
        }
    }
}

/// Read a native currency amount given either as an integer or as a decimal
/// string, for amounts that overflow a TOML integer.
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    match value.as_uint() {
        Some(v) if v.bits() <= 128 => Ok(v.low_u128()),
        _ => Err(de::Error::custom(format!(
            "amount must be an unsigned 128 bit integer, found {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text() {
        assert_eq!(Value::parse("9200"), Ok(Value::from(9200u64)));
        assert_eq!(Value::parse("true"), Ok(Value::Bool(true)));
        assert_eq!(Value::parse("0x2670"), Ok(Value::Bytes(vec![0x26, 0x70])));
        assert_eq!(Value::parse("0x"), Ok(Value::Bytes(vec![])));
        assert_eq!(
            Value::parse("lax1ghvqzvmpxwarcqhkmd6d5f3lrzept59wvj0feg"),
            Ok(Value::Str("lax1ghvqzvmpxwarcqhkmd6d5f3lrzept59wvj0feg".into()))
        );
        assert_eq!(Value::parse("0xabc"), Err(ValueError::Hex("0xabc".into())));
        assert!(matches!(
            Value::parse(&"9".repeat(100)),
            Err(ValueError::Overflow(_))
        ));
    }

    #[test]
    fn display() {
        assert_eq!(Value::from(200000000000u64).to_string(), "200000000000");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(
            Value::List(vec![Value::from(1u32), Value::Bool(false)]).to_string(),
            "[1, false]"
        );
    }

    #[test]
    fn deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            args: Vec<Value>,
        }

        let doc: Doc = toml::from_str(
            r#"args = [1, "0xff", [38, 112], "big", true, 300, [1, 256], ["1", "2"], []]"#,
        )
        .unwrap();

        assert_eq!(
            doc.args,
            vec![
                Value::from(1u32),
                Value::Bytes(vec![0xff]),
                Value::Bytes(vec![38, 112]),
                Value::Str("big".into()),
                Value::Bool(true),
                Value::from(300u32),
                Value::List(vec![Value::from(1u32), Value::from(256u32)]),
                Value::List(vec![Value::from(1u32), Value::from(2u32)]),
                Value::List(Vec::new()),
            ]
        );

        assert!(toml::from_str::<Doc>("args = [-1]").is_err());
    }

    #[test]
    fn serialize_to_json() {
        let value = Value::List(vec![
            Value::from(7u32),
            Value::Uint(U256::MAX),
            Value::Bytes(vec![1, 2]),
            Value::Bool(true),
        ]);

        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            format!(r#"[7,"{}","0x0102",true]"#, U256::MAX)
        );
    }

    #[test]
    fn typed_args() {
        let values = [
            Value::from(9200u32),
            Value::from(200000000000u64),
            Value::from(70000u32),
            Value::Bytes(vec![0u8; 32]),
        ];
        let args = Args::new(&values);

        assert_eq!(args.u32(0), Ok(9200));
        assert_eq!(args.u128(1), Ok(200000000000));
        assert_eq!(
            args.u16(2),
            Err(ValueError::OutOfRange {
                index: 2,
                value: U256::from(70000u32),
                bits: 16
            })
        );
        assert_eq!(args.bytes32(3), Ok([0u8; 32]));
        assert_eq!(args.u32(4), Err(ValueError::Missing(4)));
        assert_eq!(
            args.bytes32(0),
            Err(ValueError::Mismatch {
                index: 0,
                expected: "bytes32",
                found: "uint".into()
            })
        );
        assert_eq!(
            args.expect_len(2),
            Err(ValueError::Arity {
                expected: 2,
                found: 4
            })
        );
    }
}
