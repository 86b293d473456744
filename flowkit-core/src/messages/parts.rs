//! Message part types.
//!
//! A [`Part`] is a tagged union: exactly one [`PartKind`] variant is
//! populated, plus optional free-form metadata. Metadata is how later
//! pipeline stages tag parts they inserted (for example the output
//! instructions carry `purpose: "output"`).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Free-form key/value metadata attached to parts and messages.
pub type Metadata = serde_json::Map<String, JsonValue>;

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Name of the tool to invoke.
    pub name: String,
    /// Input arguments.
    #[serde(default)]
    pub input: JsonValue,
    /// Correlation reference chosen by the model, echoed on the response.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<String>,
}

impl ToolRequest {
    /// Create a new tool request.
    pub fn new(name: impl Into<String>, input: JsonValue) -> Self {
        Self {
            name: name.into(),
            input,
            reference: None,
        }
    }

    /// Set the correlation reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// The result of a tool invocation, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Name of the tool that produced the output.
    pub name: String,
    /// Tool output.
    #[serde(default)]
    pub output: JsonValue,
    /// Reference copied from the originating request.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<String>,
}

impl ToolResponse {
    /// Create a new tool response.
    pub fn new(name: impl Into<String>, output: JsonValue) -> Self {
        Self {
            name: name.into(),
            output,
            reference: None,
        }
    }

    /// Build the response for a given request, carrying its name and reference.
    pub fn for_request(request: &ToolRequest, output: JsonValue) -> Self {
        Self {
            name: request.name.clone(),
            output,
            reference: request.reference.clone(),
        }
    }
}

/// The populated variant of a [`Part`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PartKind {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
        /// Content type of the text, if not plain.
        #[serde(rename = "contentType", skip_serializing_if = "Option::is_none", default)]
        content_type: Option<String>,
    },
    /// A media reference (URL or data URI).
    Media {
        /// Location of the media.
        url: String,
        /// MIME type of the media.
        #[serde(rename = "contentType", skip_serializing_if = "Option::is_none", default)]
        content_type: Option<String>,
    },
    /// A tool invocation requested by the model.
    ToolRequest(ToolRequest),
    /// The output of a tool invocation.
    ToolResponse(ToolResponse),
    /// Raw JSON text, one structured value per part.
    Json {
        /// The JSON document text.
        json: String,
    },
}

/// One element of a message's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// The populated variant.
    #[serde(flatten)]
    pub kind: PartKind,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Metadata>,
}

impl Part {
    /// Create a part from a kind without metadata.
    #[must_use]
    pub fn new(kind: PartKind) -> Self {
        Self {
            kind,
            metadata: None,
        }
    }

    /// Create a plain text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(PartKind::Text {
            text: text.into(),
            content_type: None,
        })
    }

    /// Create a text part with an explicit content type.
    pub fn text_with_type(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::new(PartKind::Text {
            text: text.into(),
            content_type: Some(content_type.into()),
        })
    }

    /// Create a media part.
    pub fn media(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::new(PartKind::Media {
            url: url.into(),
            content_type,
        })
    }

    /// Create a tool request part.
    pub fn tool_request(request: ToolRequest) -> Self {
        Self::new(PartKind::ToolRequest(request))
    }

    /// Create a tool response part.
    pub fn tool_response(response: ToolResponse) -> Self {
        Self::new(PartKind::ToolResponse(response))
    }

    /// Create a JSON part.
    pub fn json(json: impl Into<String>) -> Self {
        Self::new(PartKind::Json { json: json.into() })
    }

    /// Return a copy of this part with one metadata entry set.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether this is a text part.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, PartKind::Text { .. })
    }

    /// Whether this is a media part.
    pub fn is_media(&self) -> bool {
        matches!(self.kind, PartKind::Media { .. })
    }

    /// Whether this is a tool request part.
    pub fn is_tool_request(&self) -> bool {
        matches!(self.kind, PartKind::ToolRequest(_))
    }

    /// Whether this is a tool response part.
    pub fn is_tool_response(&self) -> bool {
        matches!(self.kind, PartKind::ToolResponse(_))
    }

    /// Whether this is a JSON part.
    pub fn is_json(&self) -> bool {
        matches!(self.kind, PartKind::Json { .. })
    }

    /// Text content, for text parts.
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// JSON text, for JSON parts.
    pub fn as_json(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Json { json } => Some(json),
            _ => None,
        }
    }

    /// The tool request, for tool request parts.
    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        match &self.kind {
            PartKind::ToolRequest(req) => Some(req),
            _ => None,
        }
    }

    /// The tool response, for tool response parts.
    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        match &self.kind {
            PartKind::ToolResponse(resp) => Some(resp),
            _ => None,
        }
    }

    /// Declared content type, for text and media parts.
    pub fn content_type(&self) -> Option<&str> {
        match &self.kind {
            PartKind::Text { content_type, .. } | PartKind::Media { content_type, .. } => {
                content_type.as_deref()
            }
            _ => None,
        }
    }

    /// Whether the part carries JSON content: a JSON part, or a text part
    /// typed `application/json`.
    pub fn is_json_content(&self) -> bool {
        if self.is_json() {
            return true;
        }
        self.content_type()
            .and_then(|ct| ct.parse::<mime::Mime>().ok())
            .is_some_and(|m| m.essence_str() == mime::APPLICATION_JSON.essence_str())
    }

    /// Look up a metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Whether the part's `purpose` metadata equals `purpose`.
    pub fn has_purpose(&self, purpose: &str) -> bool {
        self.metadata_value("purpose")
            .and_then(JsonValue::as_str)
            .is_some_and(|p| p == purpose)
    }
}

impl From<&str> for Part {
    fn from(text: &str) -> Self {
        Part::text(text)
    }
}

impl From<String> for Part {
    fn from(text: String) -> Self {
        Part::text(text)
    }
}
