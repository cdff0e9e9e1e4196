use axum::body::Bytes;
use base64::{engine::general_purpose, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MODEL_ID: &str = "gpt-4o-mini";
pub const MAX_OUTPUT_TOKENS: u32 = 500;
pub const ANALYSIS_PROMPT: &str = concat!(
    "Analiza este logo. Devuelve únicamente un JSON puro con: ",
    r##"{ "colores": ["#hex1", "#hex2"], "diagnostico": "...", "sugerencias": ["...", "..."] }"##,
);

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// An uploaded image as received from the caller. The bytes are never decoded.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl Upload {
    /// Uses the declared content type, falling back to sniffing the magic bytes.
    pub fn new(bytes: Bytes, declared_mime_type: Option<&str>) -> Self {
        let mime_type = match declared_mime_type {
            Some(mime) if !mime.trim().is_empty() => mime.to_string(),
            _ => image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .unwrap_or_else(|_| FALLBACK_MIME_TYPE.to_string()),
        };

        Upload { bytes, mime_type }
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Serialize)]
pub struct ResponsesRequest {
    model: &'static str,
    input: Vec<InputMessage>,
    text: TextOptions,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent {
    InputText { text: &'static str },
    InputImage { image_url: String },
}

#[derive(Serialize)]
struct TextOptions {
    format: TextFormat,
}

#[derive(Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ResponsesRequest {
    pub fn for_upload(upload: &Upload) -> Self {
        ResponsesRequest {
            model: MODEL_ID,
            input: vec![InputMessage {
                role: "user",
                content: vec![
                    InputContent::InputText {
                        text: ANALYSIS_PROMPT,
                    },
                    InputContent::InputImage {
                        image_url: upload.data_uri(),
                    },
                ],
            }],
            text: TextOptions {
                format: TextFormat {
                    kind: "json_object",
                },
            },
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// The parts of a Responses API reply the adapter looks at. Every level is
/// optional and a field of the wrong JSON type reads as absent, so only a body
/// that is not JSON at all fails to parse.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderReply {
    #[serde(default, deserialize_with = "lenient_list")]
    output: Option<Vec<Option<OutputItem>>>,
    #[serde(default, deserialize_with = "lenient")]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default, deserialize_with = "lenient_list")]
    content: Option<Vec<Option<ContentItem>>>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default, deserialize_with = "lenient")]
    message: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

// Keeps element positions: an element of the wrong shape becomes `None`.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<Option<T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

impl ProviderReply {
    /// Parses a reply body. Valid JSON that is not an object carries no
    /// usable fields and yields an empty reply.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Text of the first `output_text` item in the first output element.
    pub fn output_text(&self) -> Option<&str> {
        self.output
            .as_ref()?
            .first()?
            .as_ref()?
            .content
            .as_ref()?
            .iter()
            .flatten()
            .find(|item| item.kind.as_deref() == Some("output_text"))?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref()?.message.as_deref()
    }
}
