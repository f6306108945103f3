//! Wire types for the `v1beta` `BidiGenerateContent` WebSocket protocol.
//!
//! Client messages serialize with camelCase field names. Server messages
//! deserialize tolerantly: every field is optional so an unrecognized or
//! partial payload still decodes and can be forwarded untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Client -> server ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
    ToolResponse(BidiGenerateContentToolResponse),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_vad_signal: Option<bool>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Audio,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Serialize, Debug)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
pub struct Part {
    pub text: String,
}

/// A toolset entry for the session `setup`. Declarations come from the
/// application; the schema is plain JSON so callers can shape parameters
/// without mirroring the full OpenAPI schema type here.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Debug, Clone)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    pub audio: Blob,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentToolResponse {
    pub function_responses: Vec<FunctionResult>,
}

/// The answer to one [`FunctionCall`], echoing its `id` and `name`. Error
/// outcomes travel inside `response` under an `"error"` key; the wire shape
/// is identical either way.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub id: String,
    pub name: String,
    pub response: Map<String, Value>,
}

// --- Server -> client ---

/// The union of everything the server sends. Exactly one of the optional
/// branches is populated per message in practice.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ServerToolCall>,
    pub voice_activity: Option<VoiceActivity>,
    pub voice_activity_detection_signal: Option<Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<ServerTurn>,
    pub interrupted: Option<bool>,
    pub turn_complete: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ServerTurn {
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerPart {
    pub text: Option<String>,
    pub inline_data: Option<ServerBlob>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerBlob {
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerToolCall {
    pub function_calls: Vec<FunctionCall>,
}

/// One function invocation requested by the model. Immutable once decoded;
/// the `id` must be echoed in the matching [`FunctionResult`].
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceActivity {
    pub voice_activity_type: Option<String>,
}

/// What a [`LiveServerMessage`] means to a consumer. Relays route on this
/// while forwarding the raw payload itself, so the variants carry only what
/// routing needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    SetupComplete,
    Audio,
    Text,
    Interrupted,
    ToolCall(Vec<FunctionCall>),
    VoiceActivity,
    Unknown,
}

impl LiveServerMessage {
    /// Classifies the message from whichever branch is populated. An
    /// interruption wins over any partial turn content delivered with it.
    pub fn classify(&self) -> ServerEvent {
        if let Some(tool_call) = &self.tool_call {
            return ServerEvent::ToolCall(tool_call.function_calls.clone());
        }
        if let Some(content) = &self.server_content {
            if content.interrupted == Some(true) {
                return ServerEvent::Interrupted;
            }
            if let Some(turn) = &content.model_turn {
                if turn.parts.iter().any(|p| p.inline_data.is_some()) {
                    return ServerEvent::Audio;
                }
                if turn.parts.iter().any(|p| p.text.is_some()) {
                    return ServerEvent::Text;
                }
            }
            return ServerEvent::Unknown;
        }
        if self.setup_complete.is_some() {
            return ServerEvent::SetupComplete;
        }
        if self.voice_activity.is_some() || self.voice_activity_detection_signal.is_some() {
            return ServerEvent::VoiceActivity;
        }
        ServerEvent::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serializes_with_camel_case_wire_names() {
        let setup = ClientMessage::Setup(BidiGenerateContentSetup {
            model: "models/gemini-live-2.5-flash-native-audio".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: "Puck".to_string(),
                        },
                    },
                }),
            },
            system_instruction: Some(Content {
                parts: vec![Part {
                    text: "You are a helpful assistant.".to_string(),
                }],
            }),
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: "get_current_weather".to_string(),
                    description: "Get the current weather".to_string(),
                    parameters: json!({"type": "object"}),
                }],
            }],
            explicit_vad_signal: Some(true),
        });

        let value: Value = serde_json::to_value(&setup).unwrap();
        assert_eq!(
            value["setup"]["model"],
            "models/gemini-live-2.5-flash-native-audio"
        );
        assert_eq!(
            value["setup"]["generationConfig"]["responseModalities"],
            json!(["AUDIO"])
        );
        assert_eq!(
            value["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert_eq!(
            value["setup"]["systemInstruction"]["parts"][0]["text"],
            "You are a helpful assistant."
        );
        assert_eq!(
            value["setup"]["tools"][0]["functionDeclarations"][0]["name"],
            "get_current_weather"
        );
        assert_eq!(value["setup"]["explicitVadSignal"], true);
    }

    #[test]
    fn test_setup_omits_absent_optional_fields() {
        let setup = ClientMessage::Setup(BidiGenerateContentSetup {
            model: "models/m".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: None,
            },
            system_instruction: None,
            tools: vec![],
            explicit_vad_signal: None,
        });

        let value: Value = serde_json::to_value(&setup).unwrap();
        let obj = value["setup"].as_object().unwrap();
        assert!(!obj.contains_key("systemInstruction"));
        assert!(!obj.contains_key("tools"));
        assert!(!obj.contains_key("explicitVadSignal"));
        assert!(
            !value["setup"]["generationConfig"]
                .as_object()
                .unwrap()
                .contains_key("speechConfig")
        );
    }

    #[test]
    fn test_realtime_input_wraps_audio_blob() {
        let msg = ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Blob {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: "AAAA".to_string(),
            },
        });
        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value["realtimeInput"]["audio"]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert_eq!(value["realtimeInput"]["audio"]["data"], "AAAA");
    }

    #[test]
    fn test_tool_response_carries_all_results() {
        let mut response = Map::new();
        response.insert("weather".to_string(), json!("Sunny"));
        let msg = ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
            function_responses: vec![FunctionResult {
                id: "call-1".to_string(),
                name: "get_current_weather".to_string(),
                response,
            }],
        });
        let value: Value = serde_json::to_value(&msg).unwrap();
        let responses = value["toolResponse"]["functionResponses"]
            .as_array()
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], "call-1");
        assert_eq!(responses[0]["name"], "get_current_weather");
        assert_eq!(responses[0]["response"]["weather"], "Sunny");
    }

    #[test]
    fn test_classifies_setup_complete() {
        let msg: LiveServerMessage = serde_json::from_value(json!({"setupComplete": {}})).unwrap();
        assert_eq!(msg.classify(), ServerEvent::SetupComplete);
    }

    #[test]
    fn test_classifies_audio_turn() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "UE9X"}}
                    ]
                }
            }
        }))
        .unwrap();
        assert_eq!(msg.classify(), ServerEvent::Audio);
    }

    #[test]
    fn test_classifies_text_turn() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "serverContent": {"modelTurn": {"parts": [{"text": "hello"}]}}
        }))
        .unwrap();
        assert_eq!(msg.classify(), ServerEvent::Text);
    }

    #[test]
    fn test_interruption_wins_over_turn_content() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "serverContent": {
                "interrupted": true,
                "modelTurn": {"parts": [{"text": "cut off"}]}
            }
        }))
        .unwrap();
        assert_eq!(msg.classify(), ServerEvent::Interrupted);
    }

    #[test]
    fn test_classifies_tool_call_with_args() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "toolCall": {
                "functionCalls": [
                    {"id": "fc-1", "name": "get_current_weather", "args": {"location": "Paris"}}
                ]
            }
        }))
        .unwrap();
        match msg.classify() {
            ServerEvent::ToolCall(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "fc-1");
                assert_eq!(calls[0].name, "get_current_weather");
                assert_eq!(calls[0].args["location"], json!("Paris"));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_classifies_voice_activity_variants() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "voiceActivity": {"voiceActivityType": "ACTIVITY_START"}
        }))
        .unwrap();
        assert_eq!(msg.classify(), ServerEvent::VoiceActivity);

        let msg: LiveServerMessage =
            serde_json::from_value(json!({"voiceActivityDetectionSignal": {}})).unwrap();
        assert_eq!(msg.classify(), ServerEvent::VoiceActivity);
    }

    #[test]
    fn test_unrecognized_payload_is_unknown() {
        let msg: LiveServerMessage =
            serde_json::from_value(json!({"usageMetadata": {"totalTokenCount": 42}})).unwrap();
        assert_eq!(msg.classify(), ServerEvent::Unknown);
    }

    #[test]
    fn test_bare_turn_complete_is_unknown() {
        let msg: LiveServerMessage =
            serde_json::from_value(json!({"serverContent": {"turnComplete": true}})).unwrap();
        assert_eq!(msg.classify(), ServerEvent::Unknown);
    }

    #[test]
    fn test_function_call_tolerates_missing_fields() {
        let msg: LiveServerMessage = serde_json::from_value(json!({
            "toolCall": {"functionCalls": [{"name": "get_current_weather"}]}
        }))
        .unwrap();
        match msg.classify() {
            ServerEvent::ToolCall(calls) => {
                assert_eq!(calls[0].id, "");
                assert!(calls[0].args.is_empty());
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }
}
