use super::synthesis_repository::SynthesisRepository;
use crate::domain::synthesis::{SynthesisError, SynthesisErrorKind};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-tts";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Gemini `generateContent` text-to-speech client
pub struct GeminiSynthesisRepository {
    client: Client,
    api_base: String,
    model: String,
}

impl GeminiSynthesisRepository {
    pub fn new(api_base: String, model: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl SynthesisRepository for GeminiSynthesisRepository {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        credential: &str,
    ) -> Result<Vec<u8>, SynthesisError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![TextPart { text: text.trim() }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice },
                    },
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", credential)])
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &message));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            SynthesisError::new(
                SynthesisErrorKind::ServerError,
                format!("malformed synthesis response: {}", e),
            )
        })?;

        let encoded = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.inline_data)
            .map(|inline| inline.data)
            .ok_or_else(|| {
                SynthesisError::new(
                    SynthesisErrorKind::ServerError,
                    "synthesis response carried no audio",
                )
            })?;

        BASE64_STANDARD.decode(encoded).map_err(|e| {
            SynthesisError::new(
                SynthesisErrorKind::ServerError,
                format!("audio payload is not valid base64: {}", e),
            )
        })
    }
}

/// Map a non-success HTTP status onto the error taxonomy
fn status_error(status: StatusCode, message: &str) -> SynthesisError {
    let (kind, message) = match status.as_u16() {
        400 => (
            SynthesisErrorKind::InvalidRequest,
            format!("Invalid request: {}", message),
        ),
        401 => (
            SynthesisErrorKind::Unauthorized,
            "API key is invalid or expired".to_string(),
        ),
        403 => (
            SynthesisErrorKind::QuotaOrForbidden,
            "API key hit its quota or access was denied".to_string(),
        ),
        429 => (
            SynthesisErrorKind::RateLimited,
            "Rate limit exceeded for API key".to_string(),
        ),
        500 => (
            SynthesisErrorKind::ServerError,
            "Server error from synthesis API".to_string(),
        ),
        503 => (
            SynthesisErrorKind::Unavailable,
            "Service unavailable, synthesis API is overloaded".to_string(),
        ),
        code if status.is_server_error() => (
            SynthesisErrorKind::ServerError,
            format!("Error {}: {}", code, message),
        ),
        code => (
            SynthesisErrorKind::InvalidRequest,
            format!("Error {}: {}", code, message),
        ),
    };
    SynthesisError::new(kind, message)
}

fn transport_error(err: reqwest::Error) -> SynthesisError {
    if err.is_timeout() {
        SynthesisError::new(
            SynthesisErrorKind::Timeout,
            "Request timeout while calling synthesis API",
        )
    } else if err.is_connect() || err.is_request() {
        SynthesisError::new(
            SynthesisErrorKind::NetworkError,
            format!("Network error, cannot reach synthesis API: {}", err),
        )
    } else {
        SynthesisError::new(
            SynthesisErrorKind::NetworkError,
            format!("Synthesis request failed: {}", err),
        )
    }
}
