//! Validated query parameters and the wire-parameter builder.

use crate::config::{ENV_API_KEY, ENV_PASSWORD, ENV_USER};
use crate::error::ToolError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Action verb the records API expects for reads.
pub const SELECT_ACTION: &str = "select";

/// A validated request for leave records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    entity_id: u32,
    report_id: Option<u32>,
    limit: u32,
    selected_fields: Vec<String>,
    filters: Option<Map<String, Value>>,
}

impl QuerySpec {
    /// Build a spec, rejecting a zero limit or an empty field selection.
    ///
    /// Field ids are trimmed and de-duplicated; first occurrence wins, so the
    /// selection keeps the caller's order.
    pub fn new(
        entity_id: u32,
        report_id: Option<u32>,
        limit: u32,
        selected_fields: impl IntoIterator<Item = impl Into<String>>,
        filters: Option<Map<String, Value>>,
    ) -> Result<Self, ToolError> {
        if limit == 0 {
            return Err(ToolError::InvalidQuery(
                "el límite debe ser mayor que cero".to_string(),
            ));
        }

        let mut fields: Vec<String> = Vec::new();
        for field in selected_fields {
            let field: String = field.into();
            let field = field.trim();
            if !field.is_empty() && !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
        if fields.is_empty() {
            return Err(ToolError::InvalidQuery(
                "se debe seleccionar al menos un campo".to_string(),
            ));
        }

        Ok(Self {
            entity_id,
            report_id,
            limit,
            selected_fields: fields,
            filters,
        })
    }

    pub fn entity_id(&self) -> u32 {
        self.entity_id
    }

    pub fn report_id(&self) -> Option<u32> {
        self.report_id
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn selected_fields(&self) -> &[String] {
        &self.selected_fields
    }

    pub fn filters(&self) -> Option<&Map<String, Value>> {
        self.filters.as_ref()
    }

    /// The selection as the API wants it: `"651,665,653,912"`.
    pub fn select_fields_param(&self) -> String {
        self.selected_fields.join(",")
    }
}

/// Split a comma-separated field list (`"651, 665,912"`).
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The three records-API secrets.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            match v {
                Some(_) => "<set>",
                None => "<unset>",
            }
        }
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("username", &mask(&self.username))
            .field("password", &mask(&self.password))
            .finish()
    }
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_key: Some(api_key.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// All three secrets, or the env var names of the missing ones.
    pub fn require(&self) -> Result<(&str, &str, &str), ToolError> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }

        match (
            present(&self.api_key),
            present(&self.username),
            present(&self.password),
        ) {
            (Some(key), Some(user), Some(pass)) => Ok((key, user, pass)),
            (key, user, pass) => {
                let mut missing = Vec::new();
                if key.is_none() {
                    missing.push(ENV_API_KEY);
                }
                if user.is_none() {
                    missing.push(ENV_USER);
                }
                if pass.is_none() {
                    missing.push(ENV_PASSWORD);
                }
                Err(ToolError::Configuration { missing })
            }
        }
    }
}

/// Flat, ordered form parameters for one API call.
#[derive(Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct WireParams(Vec<(String, String)>);

impl WireParams {
    fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl fmt::Debug for WireParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.0 {
            if k == "key" || k == "password" {
                map.entry(k, &"<redacted>");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

/// Turn a query into wire parameters.
///
/// Credentials are checked first; nothing else runs when one is missing.
/// `reports_id` and `filters` are omitted entirely when absent.
pub fn build(spec: &QuerySpec, credentials: &Credentials) -> Result<WireParams, ToolError> {
    let (key, username, password) = credentials.require()?;

    let mut params = WireParams::default();
    params.push("key", key);
    params.push("username", username);
    params.push("password", password);
    params.push("action", SELECT_ACTION);
    params.push("entity_id", spec.entity_id.to_string());
    params.push("limit", spec.limit.to_string());
    params.push("select_fields", spec.select_fields_param());

    if let Some(report_id) = spec.report_id {
        params.push("reports_id", report_id.to_string());
    }

    if let Some(filters) = spec.filters.as_ref() {
        // Form-encoded associative array: filters[<field>]=<value>
        for (field, value) in filters {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.push(format!("filters[{field}]"), value);
        }
    }

    tracing::debug!(params = ?params, "built records API parameters");
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("secret-key", "bot", "hunter2")
    }

    fn default_spec() -> QuerySpec {
        QuerySpec::new(43, Some(3930), 10, ["651", "665", "653", "912"], None).unwrap()
    }

    #[test]
    fn builds_required_parameters_in_order() {
        let params = build(&default_spec(), &creds()).unwrap();
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(
            keys,
            vec![
                "key",
                "username",
                "password",
                "action",
                "entity_id",
                "limit",
                "select_fields",
                "reports_id"
            ]
        );
        assert_eq!(params.get("action"), Some("select"));
        assert_eq!(params.get("entity_id"), Some("43"));
        assert_eq!(params.get("limit"), Some("10"));
        assert_eq!(params.get("select_fields"), Some("651,665,653,912"));
        assert_eq!(params.get("reports_id"), Some("3930"));
    }

    #[test]
    fn omits_report_and_filters_when_absent() {
        let spec = QuerySpec::new(43, None, 5, ["912"], None).unwrap();
        let params = build(&spec, &creds()).unwrap();
        assert!(!params.contains_key("reports_id"));
        assert!(!params.keys().any(|k| k.starts_with("filters")));
    }

    #[test]
    fn encodes_filters_as_bracketed_pairs() {
        let filters = json!({"912": "Ana Gil", "651": 2023, "653": null})
            .as_object()
            .cloned();
        let spec = QuerySpec::new(43, None, 5, ["912"], filters).unwrap();
        let params = build(&spec, &creds()).unwrap();
        assert_eq!(params.get("filters[912]"), Some("Ana Gil"));
        assert_eq!(params.get("filters[651]"), Some("2023"));
        assert!(!params.contains_key("filters[653]"));
    }

    #[test]
    fn missing_or_blank_credentials_are_configuration_errors() {
        let partial = Credentials {
            api_key: Some("k".to_string()),
            username: Some("   ".to_string()),
            password: None,
        };
        let err = build(&default_spec(), &partial).unwrap_err();
        assert_eq!(
            err,
            ToolError::Configuration {
                missing: vec!["RUKOVODITEL_USER", "RUKOVODITEL_PASSWORD"]
            }
        );
    }

    #[test]
    fn rejects_zero_limit_and_empty_selection() {
        assert!(matches!(
            QuerySpec::new(43, None, 0, ["912"], None),
            Err(ToolError::InvalidQuery(_))
        ));
        assert!(matches!(
            QuerySpec::new(43, None, 1, [" ", ""], None),
            Err(ToolError::InvalidQuery(_))
        ));
    }

    #[test]
    fn selection_is_trimmed_and_deduplicated() {
        let spec = QuerySpec::new(43, None, 1, parse_field_list(" 912, 651,912 ,,"), None).unwrap();
        assert_eq!(spec.selected_fields(), ["912", "651"]);
        assert_eq!(spec.select_fields_param(), "912,651");
    }

    #[test]
    fn debug_output_never_leaks_secrets() {
        let params = build(&default_spec(), &creds()).unwrap();
        let rendered = format!("{params:?} {:?}", creds());
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("bot"));
    }
}
