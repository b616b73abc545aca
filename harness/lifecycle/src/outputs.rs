use crate::error::{self, Result};
use serde::Deserialize;
use serde_json::Value;
use snafu::OptionExt;
use std::collections::BTreeMap;

/// The outputs of an applied unit, keyed by output name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outputs {
    values: BTreeMap<String, Value>,
}

/// One entry of `output -json`.
#[derive(Deserialize)]
struct OutputEntry {
    value: Value,
}

impl Outputs {
    /// Parses the document printed by `terraform output -json`.
    pub fn from_output_json(json: &str) -> serde_json::Result<Self> {
        let entries: BTreeMap<String, OutputEntry> = serde_json::from_str(json)?;
        Ok(entries
            .into_iter()
            .map(|(name, entry)| (name, entry.value))
            .collect())
    }

    pub fn insert<S, V>(&mut self, name: S, value: V)
    where
        S: Into<String>,
        V: Into<Value>,
    {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Renders an output the way the provisioning CLI prints it in plain mode: strings as-is,
    /// lists as `[a b c]`, null as the empty string.
    pub fn string(&self, name: &str) -> Result<String> {
        let value = self
            .values
            .get(name)
            .context(error::MissingOutputSnafu { name })?;
        Ok(render(value))
    }

    /// Reads a list output. Accepts a JSON array or a bracketed string such as `[a b c]`.
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        let value = self
            .values
            .get(name)
            .context(error::MissingOutputSnafu { name })?;
        match value {
            Value::Array(items) => Ok(items.iter().map(render).collect()),
            Value::String(s) => Ok(parse_bracketed_list(s)),
            other => error::OutputTypeSnafu {
                name,
                expected: "a list",
                value: other.to_string(),
            }
            .fail(),
        }
    }
}

impl FromIterator<(String, Value)> for Outputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("[{}]", items.join(" "))
        }
        other => other.to_string(),
    }
}

/// Splits a bracketed, space-separated list such as `[10.0.0.0/19 10.0.32.0/19]`.
pub fn parse_bracketed_list(s: &str) -> Vec<String> {
    let s = s.trim();
    let s = s.strip_prefix('[').unwrap_or(s);
    let s = s.strip_suffix(']').unwrap_or(s);
    s.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OUTPUT_JSON: &str = r#"{
        "cluster_endpoint": {"sensitive": false, "type": "string", "value": "https://ABC.gr7.eu-central-1.eks.amazonaws.com"},
        "private_vpc_cidr_blocks": {"sensitive": false, "type": ["list", "string"], "value": ["10.192.0.0/19", "10.192.32.0/19", "10.192.64.0/19"]},
        "access_entries": {"sensitive": false, "type": ["map", "string"], "value": {"admin": "arn"}},
        "nothing": {"sensitive": false, "type": "string", "value": null}
    }"#;

    #[test]
    fn parses_output_json() {
        let outputs = Outputs::from_output_json(OUTPUT_JSON).unwrap();
        assert_eq!(
            outputs.string("cluster_endpoint").unwrap(),
            "https://ABC.gr7.eu-central-1.eks.amazonaws.com"
        );
        assert_eq!(
            outputs.string("private_vpc_cidr_blocks").unwrap(),
            "[10.192.0.0/19 10.192.32.0/19 10.192.64.0/19]"
        );
        assert_eq!(outputs.string("access_entries").unwrap(), r#"{"admin":"arn"}"#);
        assert_eq!(outputs.string("nothing").unwrap(), "");
        assert_eq!(outputs.names().count(), 4);
    }

    #[test]
    fn missing_output_is_an_error() {
        let outputs = Outputs::default();
        assert!(matches!(
            outputs.string("vpc_id"),
            Err(crate::Error::MissingOutput { .. })
        ));
    }

    #[test]
    fn lists_from_arrays_and_strings() {
        let mut outputs = Outputs::default();
        outputs.insert("array", json!(["subnet-a", "subnet-b"]));
        outputs.insert("flat", "[subnet-a subnet-b]");
        outputs.insert("number", 3);
        assert_eq!(outputs.list("array").unwrap(), vec!["subnet-a", "subnet-b"]);
        assert_eq!(outputs.list("flat").unwrap(), vec!["subnet-a", "subnet-b"]);
        assert!(matches!(
            outputs.list("number"),
            Err(crate::Error::OutputType { .. })
        ));
    }

    #[test]
    fn bracketed_list_edges() {
        assert!(parse_bracketed_list("[]").is_empty());
        assert!(parse_bracketed_list("").is_empty());
        assert_eq!(parse_bracketed_list(" [a]  "), vec!["a"]);
        assert_eq!(parse_bracketed_list("a b"), vec!["a", "b"]);
    }
}
