use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetShape {
    Hosts,
    Records,
    RawRecords,
}

impl DatasetShape {
    /// Lookup order used when an object carries more than one recognized key.
    pub const PRECEDENCE: [DatasetShape; 3] = [
        DatasetShape::Hosts,
        DatasetShape::Records,
        DatasetShape::RawRecords,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            DatasetShape::Hosts => "hosts",
            DatasetShape::Records => "records",
            DatasetShape::RawRecords => "raw_records",
        }
    }
}

impl fmt::Display for DatasetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("unrecognized dataset shape: top-level {0} (expected an object or an array)")]
    Unrecognized(&'static str),
    #[error("`{key}` must be an array, found {found}")]
    NotASequence { key: &'static str, found: &'static str },
}

/// A dataset in exactly one canonical shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetPayload {
    Hosts(Vec<Value>),
    Records(Vec<Value>),
    RawRecords(Vec<Value>),
}

impl DatasetPayload {
    /// Decodes any recognized input variant.
    ///
    /// Keyed objects (`hosts`/`records`/`raw_records`) keep their shape, a bare
    /// array becomes `hosts`, and any other object is wrapped as a one-element
    /// `hosts` sequence.
    pub fn decode(value: &Value) -> Result<DatasetPayload, ShapeError> {
        match value {
            Value::Array(items) => Ok(DatasetPayload::Hosts(items.clone())),
            Value::Object(map) => {
                for shape in DatasetShape::PRECEDENCE {
                    let Some(inner) = map.get(shape.key()) else {
                        continue;
                    };
                    match inner {
                        Value::Null => continue,
                        Value::Array(items) => {
                            return Ok(DatasetPayload::from_parts(shape, items.clone()));
                        }
                        other => {
                            return Err(ShapeError::NotASequence {
                                key: shape.key(),
                                found: kind_name(other),
                            });
                        }
                    }
                }
                Ok(DatasetPayload::Hosts(vec![value.clone()]))
            }
            other => Err(ShapeError::Unrecognized(kind_name(other))),
        }
    }

    /// Wraps anything as `hosts`, falling back to a one-element sequence when
    /// the value has no recognizable shape. Used when validation is off.
    pub fn decode_or_wrap(value: &Value) -> DatasetPayload {
        DatasetPayload::decode(value).unwrap_or_else(|_| DatasetPayload::Hosts(vec![value.clone()]))
    }

    pub fn from_parts(shape: DatasetShape, items: Vec<Value>) -> DatasetPayload {
        match shape {
            DatasetShape::Hosts => DatasetPayload::Hosts(items),
            DatasetShape::Records => DatasetPayload::Records(items),
            DatasetShape::RawRecords => DatasetPayload::RawRecords(items),
        }
    }

    pub fn shape(&self) -> DatasetShape {
        match self {
            DatasetPayload::Hosts(_) => DatasetShape::Hosts,
            DatasetPayload::Records(_) => DatasetShape::Records,
            DatasetPayload::RawRecords(_) => DatasetShape::RawRecords,
        }
    }

    pub fn items(&self) -> &[Value] {
        match self {
            DatasetPayload::Hosts(items)
            | DatasetPayload::Records(items)
            | DatasetPayload::RawRecords(items) => items,
        }
    }

    pub fn items_mut(&mut self) -> &mut Vec<Value> {
        match self {
            DatasetPayload::Hosts(items)
            | DatasetPayload::Records(items)
            | DatasetPayload::RawRecords(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(
            self.shape().key().to_string(),
            Value::Array(self.items().to_vec()),
        );
        Value::Object(map)
    }
}

impl Serialize for DatasetPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.shape().key(), self.items())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for DatasetPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        DatasetPayload::decode(&value).map_err(D::Error::custom)
    }
}

pub(crate) fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_shapes_keep_their_key() {
        let p = DatasetPayload::decode(&json!({"records": [{"ip": "1.2.3.4"}]})).expect("decode");
        assert_eq!(p.shape(), DatasetShape::Records);
        assert_eq!(p.len(), 1);

        let p = DatasetPayload::decode(&json!({"raw_records": []})).expect("decode");
        assert_eq!(p.shape(), DatasetShape::RawRecords);
        assert!(p.is_empty());
    }

    #[test]
    fn bare_array_is_hosts_and_bare_object_is_wrapped() {
        let p = DatasetPayload::decode(&json!([{"ip": "a"}, {"ip": "b"}])).expect("decode");
        assert_eq!(p, DatasetPayload::Hosts(vec![json!({"ip": "a"}), json!({"ip": "b"})]));

        let p = DatasetPayload::decode(&json!({"ip": "a"})).expect("decode");
        assert_eq!(p, DatasetPayload::Hosts(vec![json!({"ip": "a"})]));
    }

    #[test]
    fn hosts_wins_over_records() {
        let p = DatasetPayload::decode(&json!({"records": [1], "hosts": [2, 3]})).expect("decode");
        assert_eq!(p.shape(), DatasetShape::Hosts);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn null_key_falls_through_to_next_shape() {
        let p = DatasetPayload::decode(&json!({"hosts": null, "records": [1]})).expect("decode");
        assert_eq!(p.shape(), DatasetShape::Records);
    }

    #[test]
    fn scalars_and_non_array_keys_are_rejected() {
        assert_eq!(
            DatasetPayload::decode(&json!(42)),
            Err(ShapeError::Unrecognized("number"))
        );
        assert_eq!(
            DatasetPayload::decode(&json!({"hosts": "nope"})),
            Err(ShapeError::NotASequence {
                key: "hosts",
                found: "string"
            })
        );
    }

    #[test]
    fn serializes_under_canonical_key() {
        let p = DatasetPayload::RawRecords(vec![json!({"port": 22})]);
        assert_eq!(
            serde_json::to_value(&p).expect("serialize"),
            json!({"raw_records": [{"port": 22}]})
        );
        let back: DatasetPayload =
            serde_json::from_value(json!({"raw_records": [{"port": 22}]})).expect("deserialize");
        assert_eq!(back, p);
    }
}
