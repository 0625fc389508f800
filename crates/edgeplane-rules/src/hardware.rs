//! Hardware compatibility rules.
//!
//! A Blueprint's `hardware_profile` stanza is a tree of `and`/`or` groups
//! whose leaves count the Edgesite's nodes by hardware UUID or hardware
//! name pattern:
//!
//! ```yaml
//! hardware_profile:
//!   or:
//!     - uuid: 2ac6b2e4-...
//!       min: 3
//!     - and:
//!         - name: "Dell.*"
//!           min: 1
//!         - name: "HPE.*"
//!           max: 2
//! ```

use edgeplane_catalog::Hardware;
use regex::Regex;
use serde_json::Value;

const DEFAULT_MIN: i64 = 1;
const DEFAULT_MAX: i64 = 1_000_000;

/// What a counting leaf matches a node's hardware against.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Hardware profile UUID, compared case-insensitively.
    Uuid(String),
    /// Pattern that must match the whole hardware name.
    Name { pattern: String, regex: Regex },
}

impl Selector {
    fn matches(&self, hardware: &Hardware) -> bool {
        match self {
            Selector::Uuid(uuid) => hardware.uuid.to_string().eq_ignore_ascii_case(uuid),
            Selector::Name { regex, .. } => regex.is_match(&hardware.name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum HardwareRule {
    And(Vec<HardwareRule>),
    Or(Vec<HardwareRule>),
    Count {
        selector: Selector,
        min: i64,
        max: i64,
    },
    /// A rule that could not be understood; evaluates to this violation.
    Malformed(String),
}

impl HardwareRule {
    pub fn parse(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return HardwareRule::Malformed("Bad rule: expected a mapping".to_string());
        };

        if let Some(children) = map.get("and") {
            return match children.as_array() {
                Some(list) => HardwareRule::And(list.iter().map(HardwareRule::parse).collect()),
                None => HardwareRule::Malformed("Bad rule: and must be a list".to_string()),
            };
        }
        if let Some(children) = map.get("or") {
            return match children.as_array() {
                Some(list) => HardwareRule::Or(list.iter().map(HardwareRule::parse).collect()),
                None => HardwareRule::Malformed("Bad rule: or must be a list".to_string()),
            };
        }

        let min = match opt_int(map.get("min")) {
            0 => DEFAULT_MIN,
            n => n,
        };
        let max = match opt_int(map.get("max")) {
            0 => DEFAULT_MAX,
            n => n,
        };

        let selector = match (opt_string(map.get("uuid")), opt_string(map.get("name"))) {
            (Some(_), Some(_)) => {
                return HardwareRule::Malformed(
                    "Bad rule: uuid and name cannot be used together".to_string(),
                );
            }
            (None, None) => {
                return HardwareRule::Malformed("Bad rule: no and, or, uuid, or name".to_string());
            }
            (Some(uuid), None) => Selector::Uuid(uuid),
            (None, Some(pattern)) => match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => Selector::Name { pattern, regex },
                Err(e) => {
                    return HardwareRule::Malformed(format!(
                        "Bad rule: invalid hardware name RE {pattern}: {e}"
                    ));
                }
            },
        };

        HardwareRule::Count { selector, min, max }
    }

    /// Evaluate against the hardware of every node in an Edgesite.
    ///
    /// `and` reports every child's violations; `or` passes as soon as one
    /// child passes and otherwise reports all of them.
    pub fn evaluate(&self, hardware: &[Hardware]) -> Vec<String> {
        match self {
            HardwareRule::And(children) => children
                .iter()
                .flat_map(|child| child.evaluate(hardware))
                .collect(),
            HardwareRule::Or(children) => {
                let mut violations = Vec::new();
                for child in children {
                    let found = child.evaluate(hardware);
                    if found.is_empty() {
                        return Vec::new();
                    }
                    violations.extend(found);
                }
                violations
            }
            HardwareRule::Count { selector, min, max } => {
                let count = hardware.iter().filter(|hw| selector.matches(hw)).count() as i64;
                let what = match selector {
                    Selector::Uuid(uuid) => format!("hardware UUID of {uuid}"),
                    Selector::Name { pattern, .. } => format!("hardware name RE of {pattern}"),
                };
                let mut violations = Vec::new();
                if count < *min {
                    violations.push(format!(
                        "The number of nodes matching the {what} is less than the minimum of {min}"
                    ));
                }
                if count > *max {
                    violations.push(format!(
                        "The number of nodes matching the {what} is greater than the maximum of {max}"
                    ));
                }
                violations
            }
            HardwareRule::Malformed(reason) => vec![reason.clone()],
        }
    }
}

/// Check an optional `hardware_profile` stanza. No rule means compatible.
pub fn check_hardware(rule: Option<&Value>, hardware: &[Hardware]) -> Vec<String> {
    match rule {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => HardwareRule::parse(value).evaluate(hardware),
    }
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn hw(uuid: Uuid, name: &str) -> Hardware {
        Hardware {
            uuid,
            name: name.to_string(),
            description: String::new(),
            yaml: Value::Null,
            created_at: 0,
        }
    }

    fn site(profiles: &[(&Hardware, usize)]) -> Vec<Hardware> {
        profiles
            .iter()
            .flat_map(|(h, n)| std::iter::repeat_n((*h).clone(), *n))
            .collect()
    }

    #[test]
    fn absent_rule_is_compatible() {
        assert!(check_hardware(None, &[]).is_empty());
        assert!(check_hardware(Some(&Value::Null), &[]).is_empty());
    }

    #[test]
    fn uuid_leaf_counts_case_insensitively() {
        let id = Uuid::new_v4();
        let dell = hw(id, "Dell R740");
        let nodes = site(&[(&dell, 2)]);
        let upper = id.to_string().to_uppercase();

        let rule = json!({ "uuid": upper, "min": 2 });
        assert!(check_hardware(Some(&rule), &nodes).is_empty());

        let rule = json!({ "uuid": id.to_string(), "min": 3 });
        assert_eq!(
            check_hardware(Some(&rule), &nodes),
            vec![format!(
                "The number of nodes matching the hardware UUID of {id} is less than the minimum of 3"
            )]
        );
    }

    #[test]
    fn zero_bounds_fall_back_to_defaults() {
        let dell = hw(Uuid::new_v4(), "Dell");
        let rule = json!({ "name": "Dell", "min": 0, "max": 0 });

        assert!(check_hardware(Some(&rule), &site(&[(&dell, 1)])).is_empty());
        assert_eq!(check_hardware(Some(&rule), &[]).len(), 1);
    }

    #[test]
    fn name_regex_must_match_whole_name() {
        let nodes = site(&[(&hw(Uuid::new_v4(), "Dell R740"), 1)]);

        let partial = json!({ "name": "Dell" });
        assert_eq!(check_hardware(Some(&partial), &nodes).len(), 1);

        let full = json!({ "name": "Dell.*" });
        assert!(check_hardware(Some(&full), &nodes).is_empty());
    }

    #[test]
    fn maximum_is_enforced() {
        let nodes = site(&[(&hw(Uuid::new_v4(), "HPE"), 3)]);
        let rule = json!({ "name": "HPE", "max": 2 });
        assert_eq!(
            check_hardware(Some(&rule), &nodes),
            vec![
                "The number of nodes matching the hardware name RE of HPE is greater than the maximum of 2"
                    .to_string()
            ]
        );
    }

    #[test]
    fn and_concatenates_child_violations() {
        let rule = json!({ "and": [ { "name": "A" }, { "name": "B" } ] });
        assert_eq!(check_hardware(Some(&rule), &[]).len(), 2);
    }

    #[test]
    fn or_passes_on_first_satisfied_child() {
        let nodes = site(&[(&hw(Uuid::new_v4(), "B"), 1)]);
        let rule = json!({ "or": [ { "name": "A" }, { "name": "B" } ] });
        assert!(check_hardware(Some(&rule), &nodes).is_empty());
    }

    #[test]
    fn or_reports_every_child_when_none_pass() {
        let rule = json!({ "or": [ { "name": "A" }, { "name": "B", "min": 2 }, { "uuid": "x" } ] });
        let violations = check_hardware(Some(&rule), &[]);
        assert_eq!(violations.len(), 3);
        assert!(violations[1].ends_with("minimum of 2"));
    }

    #[test]
    fn malformed_leaves_are_violations_not_failures() {
        let rule = json!({ "and": [
            { "uuid": "x", "name": "y" },
            { "min": 3 },
            "not a mapping",
            { "name": "(" },
            { "or": "nope" },
        ]});
        let violations = check_hardware(Some(&rule), &[]);
        assert_eq!(violations.len(), 5);
        assert_eq!(violations[0], "Bad rule: uuid and name cannot be used together");
        assert_eq!(violations[1], "Bad rule: no and, or, uuid, or name");
        assert!(violations[3].starts_with("Bad rule: invalid hardware name RE ("));
    }

    #[test]
    fn rules_parse_from_yaml() {
        let doc: Value = serde_yaml::from_str(
            "or:\n  - name: 'Dell.*'\n    min: 2\n  - and:\n      - name: HPE\n      - name: Cisco\n",
        )
        .unwrap();
        let nodes = site(&[(&hw(Uuid::new_v4(), "Dell R640"), 1)]);
        assert_eq!(check_hardware(Some(&doc), &nodes).len(), 3);
    }
}
