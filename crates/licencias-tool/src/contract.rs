//! The tool as the LLM sees it: name, description, argument schema and the
//! defaults applied to whatever arguments the model sends.

use crate::catalog;
use crate::error::ToolError;
use crate::query::{parse_field_list, QuerySpec};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const TOOL_NAME: &str = "consulta_licencias_encargados";

pub const TOOL_DESCRIPTION: &str = "Consulta licencias y permisos de encargados en el sistema \
Rukovoditel. Devuelve los registros con empleado, fecha de inicio, fecha de finalización y \
fecha de reincorporación, junto con metadatos de la consulta.";

/// Leave/license entity in the records API.
pub const DEFAULT_ENTITY_ID: u32 = 43;
/// Report that lists leaves of managers.
pub const DEFAULT_REPORT_ID: u32 = 3930;
pub const DEFAULT_LIMIT: u32 = 10;

/// Arguments accepted from the model. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolArgs {
    #[serde(default = "default_entity_id", deserialize_with = "lenient_u32")]
    pub entity_id: u32,
    #[serde(
        default = "default_report_id",
        deserialize_with = "lenient_opt_u32"
    )]
    pub reports_id: Option<u32>,
    #[serde(default = "default_limit", deserialize_with = "lenient_u32")]
    pub limit: u32,
    #[serde(default = "default_select_fields")]
    pub select_fields: FieldSelection,
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
}

/// Field selection as either `"651,912"` or `["651", "912"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSelection {
    Joined(String),
    List(Vec<String>),
}

impl FieldSelection {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            FieldSelection::Joined(s) => parse_field_list(s),
            FieldSelection::List(items) => items.clone(),
        }
    }
}

impl Default for ToolArgs {
    fn default() -> Self {
        Self {
            entity_id: DEFAULT_ENTITY_ID,
            reports_id: default_report_id(),
            limit: DEFAULT_LIMIT,
            select_fields: default_select_fields(),
            filters: None,
        }
    }
}

impl ToolArgs {
    /// Parse the JSON argument string of a tool call.
    ///
    /// An empty string (some models send that for "no arguments") means all
    /// defaults.
    pub fn from_json(raw: &str) -> Result<Self, ToolError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| ToolError::InvalidQuery(format!("argumentos inválidos: {e}")))
    }

    pub fn into_spec(self) -> Result<QuerySpec, ToolError> {
        let fields = self.select_fields.to_vec();
        let filters = self.filters.filter(|f| !f.is_empty());
        QuerySpec::new(self.entity_id, self.reports_id, self.limit, fields, filters)
    }
}

/// JSON schema of [`ToolArgs`], for the tool-calling request.
pub fn args_schema() -> Value {
    let fields_help = catalog::entries()
        .iter()
        .map(|f| format!("{}={}", f.id, f.name))
        .collect::<Vec<_>>()
        .join(", ");

    serde_json::json!({
        "type": "object",
        "properties": {
            "entity_id": {
                "type": "integer",
                "description": "ID de la entidad a consultar",
                "default": DEFAULT_ENTITY_ID
            },
            "reports_id": {
                "type": ["integer", "null"],
                "description": "ID del reporte a utilizar",
                "default": DEFAULT_REPORT_ID
            },
            "limit": {
                "type": "integer",
                "minimum": 1,
                "description": "Límite de registros a obtener",
                "default": DEFAULT_LIMIT
            },
            "select_fields": {
                "type": "string",
                "description": format!(
                    "IDs de campos a seleccionar, separados por comas ({fields_help})"
                ),
                "default": catalog::DEFAULT_SELECT_FIELDS.to_string()
            },
            "filters": {
                "type": ["object", "null"],
                "description": "Filtros adicionales para la consulta (ID de campo -> valor)",
                "additionalProperties": true
            }
        }
    })
}

fn default_entity_id() -> u32 {
    DEFAULT_ENTITY_ID
}

fn default_report_id() -> Option<u32> {
    Some(DEFAULT_REPORT_ID)
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_select_fields() -> FieldSelection {
    FieldSelection::Joined(catalog::DEFAULT_SELECT_FIELDS.to_string())
}

/// Models often quote numbers; accept `10` and `"10"` alike.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("número fuera de rango: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| serde::de::Error::custom(format!("no es un número: {s:?}"))),
        other => Err(serde::de::Error::custom(format!("se esperaba un número, llegó {other}"))),
    }
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        other => lenient_u32(other).map(Some).map_err(serde::de::Error::custom),
    }
}
