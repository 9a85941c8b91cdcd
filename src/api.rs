use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::preferences::{CategoryKind, PreferenceStore};
use crate::profile::{Intensity, Role};
use crate::settings::SamplingParams;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Room code used for the solo generation path.
pub const SOLO_ROOM: &str = "SOLO";

// region:  --- Wire types

#[derive(Debug, Clone, Serialize)]
struct RoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    room_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomJoined {
    pub room_code: String,
    #[serde(default)]
    pub role: Option<String>, // "host" or "partner"
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomStatus {
    pub room_code: String,
    pub partners_connected: u32,
    #[serde(default)]
    pub partner_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseAck {
    pub status: String,
}

/// A participant's selection state as the backend stores it: flat item lists
/// per category, active items only (wants first, then okay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub role: Role,
    pub intensity: Intensity,
    pub inventory: Vec<String>,
    pub outfit: Vec<String>,
    pub kinks: Vec<String>,
}

impl SyncPayload {
    pub fn from_preferences(prefs: &PreferenceStore, role: Role, intensity: Intensity) -> Self {
        Self {
            role,
            intensity,
            inventory: prefs.groups(CategoryKind::Toys).active(),
            outfit: prefs.groups(CategoryKind::Outfits).active(),
            kinks: prefs.groups(CategoryKind::Kinks).active(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncAck {
    pub status: String,
    #[serde(default)]
    pub partners_ready: u32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    solo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<SyncPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendMerged {
    #[serde(default)]
    pub toys: Vec<String>,
    #[serde(default)]
    pub kinks: Vec<String>,
    #[serde(default)]
    pub outfits: Vec<String>,
}

/// Both fields are optional: depending on the deployment the backend either
/// generates the scene itself or hands back merged data for local assembly.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub merged_data: Option<BackendMerged>,
    #[serde(default)]
    pub intensity: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub context_length: u32,
    pub repeat_penalty: f64,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: Option<String>, params: &SamplingParams) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            top_k: params.top_k,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            context_length: params.context_length,
            repeat_penalty: params.repeat_penalty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize)]
struct TtsRequest {
    text: String,
    voice: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TtsResponse {
    audio: String, // base64
    #[serde(default)]
    #[allow(dead_code)]
    format: Option<String>,
}

// `/stt` answers with either field depending on the engine behind it.
#[derive(Debug, Clone, Deserialize)]
struct SttResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTags {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelFiles {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct LoadModelRequest {
    filename: String,
    model_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadModelResponse {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// endregion:  --- Wire types

/// Client for the generation backend. Stateless apart from the participant
/// identity, so it can be shared across timer tasks; the session coordinator
/// owns the room code.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: format!("user_{}", Uuid::new_v4().simple()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Identity this client syncs selections under. Generated once per
    /// client.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    // Non-2xx responses carry `{detail}`; surface that, falling back to the
    // bare status code.
    async fn check<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.detail)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(ApiError::Backend(detail));
        }
        Ok(response.json::<T>().await?)
    }

    // region:  --- Rooms

    pub async fn create_room(&self) -> Result<RoomJoined, ApiError> {
        let response = self
            .http
            .post(self.url("/room"))
            .json(&RoomRequest { room_code: None })
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn join_room(&self, room_code: &str) -> Result<RoomJoined, ApiError> {
        let response = self
            .http
            .post(self.url("/room"))
            .json(&RoomRequest {
                room_code: Some(room_code.trim().to_uppercase()),
            })
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn room_status(&self, room_code: &str) -> Result<RoomStatus, ApiError> {
        let response = self
            .http
            .get(self.url(&format!("/room/{}", room_code.to_uppercase())))
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn close_room(&self, room_code: &str) -> Result<CloseAck, ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/room/{}", room_code.to_uppercase())))
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn sync_selection(
        &self,
        room_code: &str,
        payload: &SyncPayload,
    ) -> Result<SyncAck, ApiError> {
        let response = self
            .http
            .post(self.url(&format!(
                "/sync/{}/{}",
                room_code.to_uppercase(),
                self.user_id
            )))
            .json(payload)
            .send()
            .await?;
        Self::check(response).await
    }

    // endregion:  --- Rooms

    // region:  --- Generation

    /// Ask the backend to merge and generate for a paired room.
    pub async fn generate_in_room(&self, room_code: &str) -> Result<GenerateResponse, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/generate/{}", room_code.to_uppercase())))
            .json(&GenerateRequest {
                solo: false,
                user_data: None,
            })
            .send()
            .await?;
        Self::check(response).await
    }

    /// Generate from a directly supplied payload, outside any room.
    pub async fn generate_solo(&self, payload: &SyncPayload) -> Result<GenerateResponse, ApiError> {
        let response = self
            .http
            .post(self.url(&format!("/generate/{SOLO_ROOM}")))
            .json(&GenerateRequest {
                solo: true,
                user_data: Some(payload.clone()),
            })
            .send()
            .await?;
        Self::check(response).await
    }

    /// Free-form continuation: prompt plus sampling parameters.
    pub async fn generate_text(&self, request: &LlmRequest) -> Result<LlmResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/llm"))
            .json(request)
            .send()
            .await?;
        Self::check(response).await
    }

    // endregion:  --- Generation

    // region:  --- Voice

    /// Returns decoded audio bytes ready for playback.
    pub async fn text_to_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .http
            .post(self.url("/tts"))
            .json(&TtsRequest {
                text: text.to_string(),
                voice: voice.to_string(),
            })
            .send()
            .await?;
        let body: TtsResponse = Self::check(response).await?;
        Ok(BASE64.decode(body.audio)?)
    }

    /// Upload recorded audio, get a transcript back.
    pub async fn speech_to_text(&self, wav_bytes: Vec<u8>) -> Result<String, ApiError> {
        let part = multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/stt"))
            .multipart(form)
            .send()
            .await?;
        let body: SttResponse = Self::check(response).await?;
        Ok(body.text.or(body.transcript).unwrap_or_default())
    }

    // endregion:  --- Voice

    // region:  --- Models

    pub async fn model_tags(&self) -> Result<ModelTags, ApiError> {
        let response = self.http.get(self.url("/models/tags")).send().await?;
        Self::check(response).await
    }

    pub async fn model_files(&self) -> Result<ModelFiles, ApiError> {
        let response = self.http.get(self.url("/models/files")).send().await?;
        Self::check(response).await
    }

    pub async fn load_model(
        &self,
        filename: &str,
        model_name: &str,
    ) -> Result<LoadModelResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/models/load"))
            .json(&LoadModelRequest {
                filename: filename.to_string(),
                model_name: model_name.to_string(),
            })
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Self::check(response).await
    }

    // endregion:  --- Models
}
