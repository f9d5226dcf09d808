//! Model inference via the Gemini `generateContent` API with function calling.

use crate::config::{schema::MODEL_API_KEY_ENV, SqlTalkConfig};
use crate::model::ChatModel;
use crate::tools::ToolSpec;
use crate::types::*;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini client for a single configured model.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    http: reqwest::Client,
}

// -- Gemini request/response types ------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<ContentPayload<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolPayload<'a>>,
    generation_config: GenerationConfigPayload,
}

#[derive(Debug, Serialize)]
struct ContentPayload<'a> {
    role: &'static str,
    parts: Vec<PartPayload<'a>>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePayload<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionCallPayload<'a> {
    name: &'a str,
    args: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct FunctionResponsePayload<'a> {
    name: &'a str,
    response: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolPayload<'a> {
    function_declarations: Vec<FunctionDeclarationPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclarationPayload<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfigPayload {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsagePayload>,
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    function_call: Option<FunctionCallResponse>,
}

#[derive(Debug, Deserialize)]
struct FunctionCallResponse {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsagePayload {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GeminiClient {
    /// Create a new Gemini client from the runtime configuration.
    pub fn new(config: &SqlTalkConfig) -> Result<Self> {
        let api_key = config.resolved_model_api_key();
        if api_key.is_empty() {
            bail!(
                "No Gemini API key: set model_api_key in the config or {}",
                MODEL_API_KEY_ENV
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            base_url: config.model_api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            http,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, conversation: &[Content], tools: &[ToolSpec]) -> Result<ModelResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = build_request(conversation, tools, self.temperature);

        debug!(
            "Gemini request to {} ({} messages)",
            self.model,
            conversation.len()
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Gemini generateContent failed ({}): {}", status, body);
        }

        let body: GenerateResponse = resp.json().await.context("Failed to parse Gemini response")?;
        parse_response(body)
    }
}

fn build_request<'a>(
    conversation: &'a [Content],
    tools: &'a [ToolSpec],
    temperature: f32,
) -> GenerateRequest<'a> {
    let contents = conversation
        .iter()
        .map(|c| ContentPayload {
            // Function responses travel in user-role contents.
            role: match c.role {
                ContentRole::User | ContentRole::Function => "user",
                ContentRole::Model => "model",
            },
            parts: c.parts.iter().map(part_payload).collect(),
        })
        .collect();

    let tools = if tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolPayload {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclarationPayload {
                    name: &t.name,
                    description: &t.description,
                    parameters: declared_parameters(&t.parameters),
                })
                .collect(),
        }]
    };

    GenerateRequest {
        contents,
        tools,
        generation_config: GenerationConfigPayload { temperature },
    }
}

fn part_payload(part: &Part) -> PartPayload<'_> {
    match part {
        Part::Text(text) => PartPayload {
            text: Some(text.as_str()),
            ..Default::default()
        },
        Part::FunctionCall { name, args } => PartPayload {
            function_call: Some(FunctionCallPayload {
                name: name.as_str(),
                args,
            }),
            ..Default::default()
        },
        Part::FunctionResponse { name, response } => PartPayload {
            function_response: Some(FunctionResponsePayload {
                name: name.as_str(),
                response,
            }),
            ..Default::default()
        },
    }
}

/// Gemini rejects OBJECT schemas without properties, so omit those entirely.
fn declared_parameters(parameters: &serde_json::Value) -> Option<&serde_json::Value> {
    match parameters.get("properties").and_then(|p| p.as_object()) {
        Some(props) if !props.is_empty() => Some(parameters),
        _ => None,
    }
}

/// Turn the first candidate into an explicit final-text or tool-call reply.
fn parse_response(body: GenerateResponse) -> Result<ModelResponse> {
    let usage = body
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            candidate_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = body.candidates.into_iter().next() else {
        bail!(
            "Gemini returned no candidates (prompt feedback: {})",
            body.prompt_feedback.unwrap_or_default()
        );
    };
    let finish_reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut calls = Vec::new();
    let mut text = String::new();
    for part in parts {
        if let Some(call) = part.function_call {
            calls.push(call);
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if let Some(call) = calls.into_iter().next() {
        if !text.trim().is_empty() {
            debug!("Dropping text alongside function call: {}", text);
        }
        let arguments = if call.args.is_null() {
            serde_json::json!({})
        } else {
            call.args
        };
        return Ok(ModelResponse {
            reply: ModelReply::ToolCall(ToolCallRequest {
                name: call.name,
                arguments,
            }),
            usage,
        });
    }

    if text.trim().is_empty() {
        warn!("Gemini reply without text or function call ({})", finish_reason);
        bail!(
            "Gemini reply contained neither text nor a function call (finish reason: {})",
            finish_reason
        );
    }

    Ok(ModelResponse {
        reply: ModelReply::FinalText(text),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ModelResponse> {
        parse_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn function_call_part_becomes_tool_call() {
        let resp = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "list_tables", "args": {"dataset_id": "p.d"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 3, "totalTokenCount": 13}
        }))
        .unwrap();

        assert_eq!(
            resp.reply,
            ModelReply::ToolCall(ToolCallRequest {
                name: "list_tables".into(),
                arguments: json!({"dataset_id": "p.d"}),
            })
        );
        assert_eq!(resp.usage.total_tokens, 13);
    }

    #[test]
    fn text_parts_are_joined_into_final_text() {
        let resp = parse(json!({
            "candidates": [{"content": {"parts": [{"text": "There are "}, {"text": "two tables."}]}}]
        }))
        .unwrap();
        assert_eq!(resp.reply, ModelReply::FinalText("There are two tables.".into()));
    }

    #[test]
    fn missing_args_default_to_empty_object() {
        let resp = parse(json!({
            "candidates": [{"content": {"parts": [{"functionCall": {"name": "list_datasets"}}]}}]
        }))
        .unwrap();
        match resp.reply {
            ModelReply::ToolCall(req) => assert_eq!(req.arguments, json!({})),
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn empty_reply_is_an_error_not_a_final_answer() {
        let err = parse(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        assert!(parse(json!({"candidates": []})).is_err());
    }

    #[test]
    fn request_declares_every_tool_and_omits_empty_parameters() {
        let tools = catalog::tool_definitions();
        let conversation = vec![
            Content::user_text("What tables are there?"),
            Content::model_call(&ToolCallRequest {
                name: "list_datasets".into(),
                arguments: json!({}),
            }),
            Content::function_response(&ToolCallResult {
                name: "list_datasets".into(),
                arguments: json!({}),
                payload: json!("p.d"),
                success: true,
            }),
        ];

        let v = serde_json::to_value(build_request(&conversation, &tools, 0.0)).unwrap();

        let decls = v["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(decls.len(), tools.len());
        assert!(decls[0].get("parameters").is_none());
        assert_eq!(decls[1]["parameters"]["required"], json!(["dataset_id"]));

        assert_eq!(v["contents"][1]["role"], "model");
        assert_eq!(v["contents"][1]["parts"][0]["functionCall"]["name"], "list_datasets");
        assert_eq!(v["contents"][2]["role"], "user");
        assert_eq!(
            v["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"content": "p.d"})
        );
        assert_eq!(v["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn client_requires_api_key() {
        let cfg = SqlTalkConfig {
            model_api_key: String::new(),
            ..Default::default()
        };
        if std::env::var(MODEL_API_KEY_ENV).is_err() {
            assert!(GeminiClient::new(&cfg).is_err());
        }

        let cfg = SqlTalkConfig {
            model_api_key: "test-key".into(),
            ..Default::default()
        };
        assert_eq!(GeminiClient::new(&cfg).unwrap().name(), "gemini-1.5-pro-001");
    }
}
