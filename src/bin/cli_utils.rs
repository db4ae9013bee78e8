use anyhow::Result;
use geolite2::DataValue;
use serde_json::json;
use std::collections::HashMap;

/// Convert a decoded record into JSON for display
pub fn data_value_to_json(data: &DataValue) -> serde_json::Value {
    match data {
        DataValue::String(s) => json!(s),
        DataValue::Double(d) => json!(d),
        DataValue::Bytes(b) => json!(b),
        DataValue::Uint16(u) => json!(u),
        DataValue::Uint32(u) => json!(u),
        DataValue::Uint64(u) => json!(u),
        DataValue::Uint128(u) => json!(u.to_string()),
        DataValue::Int32(i) => json!(i),
        DataValue::Bool(b) => json!(b),
        DataValue::Float(f) => json!(f),
        DataValue::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), data_value_to_json(v));
            }
            json!(map)
        }
        DataValue::Array(items) => {
            json!(items.iter().map(data_value_to_json).collect::<Vec<_>>())
        }
        // Decoded records never contain raw pointers
        DataValue::Pointer(_) => json!(null),
    }
}

/// Convert a JSON object into a record for the builder
pub fn json_to_data_map(json: &serde_json::Value) -> Result<HashMap<String, DataValue>> {
    match json {
        serde_json::Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| Ok((k.clone(), json_to_data_value(v)?)))
            .collect::<Result<HashMap<_, _>>>(),
        _ => anyhow::bail!("Expected JSON object for record data"),
    }
}

pub fn json_to_data_value(json: &serde_json::Value) -> Result<DataValue> {
    match json {
        serde_json::Value::Null => Ok(DataValue::Bytes(vec![])),
        serde_json::Value::Bool(b) => Ok(DataValue::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(DataValue::Uint64(u))
            } else if let Some(i) = n.as_i64() {
                Ok(DataValue::Int32(i as i32))
            } else {
                Ok(DataValue::Double(n.as_f64().unwrap_or(0.0)))
            }
        }
        serde_json::Value::String(s) => Ok(DataValue::String(s.clone())),
        serde_json::Value::Array(items) => Ok(DataValue::Array(
            items
                .iter()
                .map(json_to_data_value)
                .collect::<Result<Vec<_>>>()?,
        )),
        serde_json::Value::Object(obj) => Ok(DataValue::Map(
            obj.iter()
                .map(|(k, v)| Ok((k.clone(), json_to_data_value(v)?)))
                .collect::<Result<HashMap<_, _>>>()?,
        )),
    }
}

/// Format the matched network in CIDR notation
pub fn format_cidr(query_ip: &str, prefix_len: u8) -> String {
    format!("{}/{}", query_ip, prefix_len)
}
