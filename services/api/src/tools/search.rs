//! Zero Trust knowledge base search backed by the Vertex AI RAG Engine.
//!
//! Retrieval goes through the regional `retrieveContexts` REST endpoint.
//! All RAG settings are read from the environment at call time, so a
//! deployment without a knowledge base still boots and simply answers this
//! tool with error results.

use super::{ToolHandler, error_response};
use anyhow::Context;
use async_trait::async_trait;
use gemini_live::FunctionDeclaration;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{info, warn};

const TOP_K: u32 = 5;
const VECTOR_DISTANCE_THRESHOLD: f64 = 0.5;
/// Retrieval is answered inline during a live turn; a hung call must fail
/// instead of stalling the session's downlink.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DESCRIPTION: &str = "\
Retrieves information from the internal knowledge base specifically related to Zero Trust Architecture.

IMPORTANT: When generating the 'query' argument, follow these rules:
1. Reformulate the prompt to a concise, fully specified and context-independent query.
2. Include time information to the query if the prompt is time sensitive.
3. Include location information to the query if the prompt is location sensitive.
4. Never ask for clarification.";

pub struct SearchTool {
    http: reqwest::Client,
    timeout: Duration,
}

impl SearchTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    async fn retrieve(&self, query: &str) -> anyhow::Result<Map<String, Value>> {
        let settings = RagSettings::from_env()?;
        let url = match &settings.endpoint {
            Some(base) => format!(
                "{base}/v1/projects/{project}/locations/{location}:retrieveContexts",
                project = settings.project,
                location = settings.location,
            ),
            None => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}:retrieveContexts",
                location = settings.location,
                project = settings.project,
            ),
        };
        let corpus = format!(
            "projects/{}/locations/{}/ragCorpora/{}",
            settings.project, settings.location, settings.corpus_id
        );
        let body = json!({
            "vertexRagStore": {
                "ragResources": [{"ragCorpus": corpus}]
            },
            "query": {
                "text": query,
                "ragRetrievalConfig": {
                    "topK": TOP_K,
                    "filter": {"vectorDistanceThreshold": VECTOR_DISTANCE_THRESHOLD}
                }
            }
        });

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(&settings.access_token)
            .json(&body)
            .send()
            .await
            .context("retrieveContexts request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("retrieveContexts returned {status}: {detail}");
        }
        let parsed: RetrieveContextsResponse = response
            .json()
            .await
            .context("retrieveContexts response decode failed")?;

        info!(
            count = parsed.contexts.contexts.len(),
            "retrieved knowledge base contexts"
        );
        Ok(contexts_payload(parsed))
    }
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "search_zero_trust_docs".to_string(),
            description: DESCRIPTION.to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "query": {
                        "type": "STRING",
                        "description": "The reformulated search query for Zero Trust information."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: &Map<String, Value>) -> Map<String, Value> {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return error_response("query argument is required and must be a string");
        };

        info!(%query, "executing search_zero_trust_docs");

        match self.retrieve(query).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "knowledge base search failed");
                error_response(&err.to_string())
            }
        }
    }
}

struct RagSettings {
    project: String,
    location: String,
    corpus_id: String,
    access_token: String,
    endpoint: Option<String>,
}

impl RagSettings {
    /// RAG_LOCATION falls back to GOOGLE_CLOUD_LOCATION, covering setups
    /// where the live session and the RAG corpus live in different regions.
    /// RAG_API_URL, when set, replaces the regional Vertex endpoint.
    fn from_env() -> anyhow::Result<Self> {
        let project = non_empty_var("GOOGLE_CLOUD_PROJECT");
        let location = non_empty_var("RAG_LOCATION").or_else(|| non_empty_var("GOOGLE_CLOUD_LOCATION"));
        let corpus_id = non_empty_var("RAG_CORPUS_ID");
        let access_token = non_empty_var("GOOGLE_ACCESS_TOKEN");
        let endpoint = non_empty_var("RAG_API_URL");

        match (project, location, corpus_id, access_token) {
            (Some(project), Some(location), Some(corpus_id), Some(access_token)) => Ok(Self {
                project,
                location,
                corpus_id,
                access_token,
                endpoint,
            }),
            _ => anyhow::bail!(
                "Missing RAG environment variables (GOOGLE_CLOUD_PROJECT, RAG_LOCATION/GOOGLE_CLOUD_LOCATION, RAG_CORPUS_ID, or GOOGLE_ACCESS_TOKEN)"
            ),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RetrieveContextsResponse {
    contexts: ContextList,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ContextList {
    contexts: Vec<RagContext>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RagContext {
    text: String,
    source_uri: String,
    score: Option<f64>,
}

fn contexts_payload(response: RetrieveContextsResponse) -> Map<String, Value> {
    let contexts: Vec<Value> = response
        .contexts
        .contexts
        .iter()
        .map(|ctx| {
            json!({
                "text": ctx.text,
                "source_uri": ctx.source_uri,
                "distance": ctx.score.unwrap_or(0.0),
            })
        })
        .collect();
    let mut payload = Map::new();
    payload.insert("contexts".to_string(), Value::Array(contexts));
    payload
}
