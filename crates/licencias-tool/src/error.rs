//! Failure taxonomy of the tool pipeline.
//!
//! The `Display` text of each variant is what the LLM (and, through it, the
//! user) gets in `resultado.error`, so it is written in Spanish. The
//! diagnostic text for `metadata.error` comes from [`ToolError::diagnostic`].

/// Maximum number of body characters kept when a response is not JSON.
pub const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    /// One or more of the three records-API credentials is missing or empty.
    #[error("Faltan credenciales de Rukovoditel")]
    Configuration { missing: Vec<&'static str> },

    /// The query itself is unusable (zero limit, empty selection, bad args).
    #[error("Consulta inválida: {0}")]
    InvalidQuery(String),

    /// Connection refused, timeout, DNS failure or a non-2xx status.
    #[error("Error al comunicarse con la API: {0}")]
    Transport(String),

    /// 2xx answer whose body is not JSON.
    #[error("La respuesta de la API no es JSON válido")]
    Decode { body_preview: String, truncated: bool },

    /// The HTTP client could not be constructed.
    #[error("No se pudo inicializar el cliente HTTP: {0}")]
    HttpClient(String),
}

impl ToolError {
    pub fn decode(body: &str) -> Self {
        let truncated = body.chars().count() > BODY_PREVIEW_CHARS;
        ToolError::Decode {
            body_preview: body.chars().take(BODY_PREVIEW_CHARS).collect(),
            truncated,
        }
    }

    /// Short text for `metadata.error`.
    pub fn diagnostic(&self) -> String {
        match self {
            ToolError::Configuration { missing } => {
                format!("Configuración incompleta: {}", missing.join(", "))
            }
            ToolError::InvalidQuery(reason) => reason.clone(),
            ToolError::Transport(cause) => cause.clone(),
            ToolError::Decode { .. } => "Error al decodificar JSON".to_string(),
            ToolError::HttpClient(cause) => cause.clone(),
        }
    }
}
