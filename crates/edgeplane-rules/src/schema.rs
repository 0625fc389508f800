//! Workflow input schemas.
//!
//! A workflow's `input_schema` maps each required key to a typed node:
//!
//! ```yaml
//! input_schema:
//!   name: { type: string }
//!   mgmt:
//!     type: object
//!     properties:
//!       gateway: { type: ipv4 }
//!       subnet:  { type: cidrv4 }
//!   dns:
//!     type: array
//!     items: { type: ipaddress }
//! ```
//!
//! Every key is required. Validation collects every violation; it never
//! stops at the first one.

use serde_json::{Map, Value};

use crate::net;

/// Leaf value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    IpAddress,
    Ipv4,
    Ipv6,
    Cidr,
    CidrV4,
    CidrV6,
}

impl ScalarType {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ScalarType::String,
            "integer" => ScalarType::Integer,
            "ipaddress" => ScalarType::IpAddress,
            "ipv4" => ScalarType::Ipv4,
            "ipv6" => ScalarType::Ipv6,
            "cidr" => ScalarType::Cidr,
            "cidrv4" => ScalarType::CidrV4,
            "cidrv6" => ScalarType::CidrV6,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::IpAddress => "ipaddress",
            ScalarType::Ipv4 => "ipv4",
            ScalarType::Ipv6 => "ipv6",
            ScalarType::Cidr => "cidr",
            ScalarType::CidrV4 => "cidrv4",
            ScalarType::CidrV6 => "cidrv6",
        }
    }

    /// Syntax check for address types; `None` for plain strings and integers.
    fn accepts(self, text: &str) -> Option<bool> {
        match self {
            ScalarType::String | ScalarType::Integer => None,
            ScalarType::IpAddress => Some(net::is_ip(text)),
            ScalarType::Ipv4 => Some(net::is_ipv4(text)),
            ScalarType::Ipv6 => Some(net::is_ipv6(text)),
            ScalarType::Cidr => Some(net::is_cidr(text)),
            ScalarType::CidrV4 => Some(net::is_cidrv4(text)),
            ScalarType::CidrV6 => Some(net::is_cidrv6(text)),
        }
    }

    fn noun(self) -> &'static str {
        match self {
            ScalarType::IpAddress => "IP address",
            ScalarType::Ipv4 => "IPv4 address",
            ScalarType::Ipv6 => "IPv6 address",
            ScalarType::Cidr => "CIDR",
            ScalarType::CidrV4 => "IPv4 CIDR",
            ScalarType::CidrV6 => "IPv6 CIDR",
            ScalarType::String | ScalarType::Integer => self.name(),
        }
    }

    fn check(self, value: Option<&Value>, path: &str, out: &mut Vec<String>) {
        if self == ScalarType::Integer {
            if !value.is_some_and(|v| v.is_i64() || v.is_u64()) {
                out.push(format!(
                    "Missing or invalid required value of type integer: {path}"
                ));
            }
            return;
        }

        let Some(text) = value.and_then(Value::as_str) else {
            out.push(format!(
                "Missing required value of type {}: {path}",
                self.name()
            ));
            return;
        };
        if self.accepts(text) == Some(false) {
            out.push(format!(
                "The value \"{text}\" for key {path} is not a valid {}.",
                self.noun()
            ));
        }
    }
}

/// A defect in the schema document itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaFault {
    NotMapping,
    MissingType,
    MissingProperties,
    MissingItems,
    UnknownType(String),
}

impl SchemaFault {
    fn message(&self, path: &str) -> String {
        match self {
            SchemaFault::NotMapping => format!("Bad input_schema; expected a mapping for key: {path}"),
            SchemaFault::MissingType => format!("Bad input_schema; missing type for key: {path}"),
            SchemaFault::MissingProperties => {
                format!("Bad input_schema; missing properties for key: {path}")
            }
            SchemaFault::MissingItems => format!("Bad input_schema; missing items for key: {path}"),
            SchemaFault::UnknownType(t) => format!("Unknown schema type {t} for key: {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object(Schema),
    Array(Box<SchemaNode>),
    Scalar(ScalarType),
    Malformed(SchemaFault),
}

impl SchemaNode {
    pub fn parse(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return SchemaNode::Malformed(SchemaFault::NotMapping);
        };
        let Some(type_name) = map.get("type").and_then(Value::as_str) else {
            return SchemaNode::Malformed(SchemaFault::MissingType);
        };
        match type_name {
            "object" => match map.get("properties").and_then(Value::as_object) {
                Some(properties) => SchemaNode::Object(Schema::from_map(properties)),
                None => SchemaNode::Malformed(SchemaFault::MissingProperties),
            },
            "array" => match map.get("items") {
                Some(items) => SchemaNode::Array(Box::new(SchemaNode::parse(items))),
                None => SchemaNode::Malformed(SchemaFault::MissingItems),
            },
            other => match ScalarType::from_name(other) {
                Some(scalar) => SchemaNode::Scalar(scalar),
                None => SchemaNode::Malformed(SchemaFault::UnknownType(other.to_string())),
            },
        }
    }

    fn check(&self, value: Option<&Value>, path: &str, out: &mut Vec<String>) {
        match self {
            SchemaNode::Malformed(fault) => out.push(fault.message(path)),
            SchemaNode::Scalar(scalar) => scalar.check(value, path, out),
            SchemaNode::Object(schema) => {
                let nested = value.and_then(Value::as_object);
                if nested.is_none() {
                    out.push(format!("Missing required object: {path}"));
                }
                // Still walk the properties so a missing object reports
                // at least as much as a present but empty one.
                schema.check(nested, &format!("{path}."), out);
            }
            SchemaNode::Array(items) => {
                let Some(elements) = value.and_then(Value::as_array) else {
                    out.push(format!("Missing required list: {path}"));
                    return;
                };
                match items.as_ref() {
                    SchemaNode::Array(_) => {
                        out.push(format!("Arrays of arrays not allowed: {path}"));
                    }
                    SchemaNode::Malformed(fault) => out.push(fault.message(&format!("{path}.items"))),
                    item => {
                        for (i, element) in elements.iter().enumerate() {
                            item.check(Some(element), &format!("{path}[{i}]"), out);
                        }
                    }
                }
            }
        }
    }
}

/// The set of required keys at one level of the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, SchemaNode)>,
}

impl Schema {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut fields: Vec<_> = map
            .iter()
            .map(|(key, node)| (key.clone(), SchemaNode::parse(node)))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a payload; a non-mapping payload is treated as empty.
    pub fn validate(&self, payload: &Value) -> Vec<String> {
        let mut out = Vec::new();
        self.check(payload.as_object(), "", &mut out);
        out
    }

    fn check(&self, input: Option<&Map<String, Value>>, prefix: &str, out: &mut Vec<String>) {
        for (key, node) in &self.fields {
            let value = input.and_then(|map| map.get(key)).filter(|v| !v.is_null());
            node.check(value, &format!("{prefix}{key}"), out);
        }
    }
}

/// Validate `payload` against an optional `input_schema` stanza.
pub fn validate_input(schema: Option<&Value>, payload: &Value) -> Vec<String> {
    match schema {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => Schema::from_map(map).validate(payload),
        Some(_) => vec!["Bad input_schema; expected a mapping".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn network_schema() -> Value {
        json!({
            "name": { "type": "string" },
            "replicas": { "type": "integer" },
            "mgmt": {
                "type": "object",
                "properties": {
                    "gateway": { "type": "ipv4" },
                    "subnet": { "type": "cidrv4" },
                }
            },
            "dns": { "type": "array", "items": { "type": "ipaddress" } },
            "hosts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": { "addr": { "type": "ipv6" } }
                }
            },
        })
    }

    fn valid_payload() -> Value {
        json!({
            "name": "edge-a",
            "replicas": 3,
            "mgmt": { "gateway": "10.0.0.1", "subnet": "10.0.0.0/24" },
            "dns": ["8.8.8.8", "2001:4860:4860::8888"],
            "hosts": [ { "addr": "::1" }, { "addr": "fe80::2" } ],
        })
    }

    #[test]
    fn valid_payload_has_no_violations() {
        let v = validate_input(Some(&network_schema()), &valid_payload());
        assert!(v.is_empty(), "unexpected violations: {v:?}");
    }

    #[test]
    fn absent_schema_accepts_anything() {
        assert!(validate_input(None, &json!({"x": 1})).is_empty());
    }

    #[test]
    fn violations_carry_dotted_and_indexed_paths() {
        let payload = json!({
            "name": 7,
            "replicas": "three",
            "mgmt": { "gateway": "10.0.0.300", "subnet": "10.0.0.0/33" },
            "dns": ["8.8.8.8", "dns.google"],
            "hosts": [ { "addr": "::1" }, { "addr": "1.2.3.4" } ],
        });
        let v = validate_input(Some(&network_schema()), &payload);
        assert_eq!(
            v,
            vec![
                "The value \"dns.google\" for key dns[1] is not a valid IP address.".to_string(),
                "The value \"1.2.3.4\" for key hosts[1].addr is not a valid IPv6 address.".to_string(),
                "The value \"10.0.0.300\" for key mgmt.gateway is not a valid IPv4 address.".to_string(),
                "The value \"10.0.0.0/33\" for key mgmt.subnet is not a valid IPv4 CIDR.".to_string(),
                "Missing required value of type string: name".to_string(),
                "Missing or invalid required value of type integer: replicas".to_string(),
            ]
        );
    }

    #[test]
    fn missing_object_also_reports_its_properties() {
        let v = validate_input(Some(&network_schema()), &json!({}));
        assert!(v.contains(&"Missing required object: mgmt".to_string()));
        assert!(v.contains(&"Missing required value of type ipv4: mgmt.gateway".to_string()));
        assert!(v.contains(&"Missing required list: dns".to_string()));
        assert_eq!(v.len(), 7);
    }

    #[test]
    fn removing_fields_never_reduces_violation_count() {
        let schema = network_schema();
        let mut payload = json!({
            "name": "edge-a",
            "replicas": 3,
            "mgmt": {},
            "dns": [],
            "hosts": [],
        });
        let mut previous = validate_input(Some(&schema), &payload).len();
        for key in ["mgmt", "name", "dns", "replicas", "hosts"] {
            payload.as_object_mut().unwrap().remove(key);
            let now = validate_input(Some(&schema), &payload).len();
            assert!(now >= previous, "removing {key} went from {previous} to {now}");
            previous = now;
        }
    }

    #[test]
    fn removing_an_object_reports_every_property_as_missing() {
        let schema = network_schema();
        let mut payload = valid_payload();
        payload["mgmt"] = json!({ "gateway": "10.0.0.300", "subnet": "10.0.0.0/33" });
        let present = validate_input(Some(&schema), &payload);
        assert_eq!(present.len(), 2);

        payload.as_object_mut().unwrap().remove("mgmt");
        let removed = validate_input(Some(&schema), &payload);
        assert_eq!(
            removed,
            vec![
                "Missing required object: mgmt".to_string(),
                "Missing required value of type ipv4: mgmt.gateway".to_string(),
                "Missing required value of type cidrv4: mgmt.subnet".to_string(),
            ]
        );
        assert!(removed.len() >= present.len());
    }

    #[test]
    fn removing_a_list_reports_it_once() {
        let schema = network_schema();
        let mut payload = valid_payload();

        // One bad element: removal does not lower the count.
        payload["dns"] = json!(["8.8.8.8", "dns.google"]);
        assert_eq!(validate_input(Some(&schema), &payload).len(), 1);
        let mut without = payload.clone();
        without.as_object_mut().unwrap().remove("dns");
        assert_eq!(
            validate_input(Some(&schema), &without),
            vec!["Missing required list: dns".to_string()]
        );

        // Per-element faults are not carried over to the missing list, so
        // dropping a list with several bad elements reports fewer.
        payload["dns"] = json!(["dns.google", "resolver", "8.8.8.8"]);
        assert_eq!(validate_input(Some(&schema), &payload).len(), 2);
        assert_eq!(validate_input(Some(&schema), &without).len(), 1);
    }

    #[test]
    fn schema_defects_are_reported_not_fatal() {
        let schema = json!({
            "a": { "type": "object" },
            "b": { "type": "array" },
            "c": { "kind": "string" },
            "d": { "type": "float" },
            "e": { "type": "array", "items": { "type": "array", "items": { "type": "string" } } },
            "f": "string",
            "g": { "type": "array", "items": { "type": "matrix" } },
        });
        let payload = json!({ "e": [[1]], "g": [1, 2] });
        let v = validate_input(Some(&schema), &payload);
        assert_eq!(
            v,
            vec![
                "Bad input_schema; missing properties for key: a".to_string(),
                "Bad input_schema; missing items for key: b".to_string(),
                "Bad input_schema; missing type for key: c".to_string(),
                "Unknown schema type float for key: d".to_string(),
                "Arrays of arrays not allowed: e".to_string(),
                "Bad input_schema; expected a mapping for key: f".to_string(),
                "Unknown schema type matrix for key: g.items".to_string(),
            ]
        );
    }

    #[test]
    fn null_values_count_as_missing() {
        let schema = json!({ "name": { "type": "string" } });
        assert_eq!(validate_input(Some(&schema), &json!({ "name": null })).len(), 1);
    }

    #[test]
    fn non_mapping_schema_is_one_violation() {
        let v = validate_input(Some(&json!(["x"])), &json!({}));
        assert_eq!(v, vec!["Bad input_schema; expected a mapping".to_string()]);
    }
}
