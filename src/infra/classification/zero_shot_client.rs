use crate::core::classification::{Category, ClassificationProvider, ClassifierError, LabelScore};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const HYPOTHESIS_TEMPLATE: &str = "This text contains {}.";

/// Client for a Hugging Face style zero-shot classification endpoint
/// (e.g. the hosted inference API running `facebook/bart-large-mnli`).
pub struct HuggingFaceZeroShotClient {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

/// The endpoint answers with one object for a single input, or a list of
/// objects when it batches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotScores),
    Batch(Vec<ZeroShotScores>),
}

#[derive(Debug, Deserialize)]
struct ZeroShotScores {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl HuggingFaceZeroShotClient {
    pub fn new(endpoint: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_token,
        }
    }
}

/// Turn a raw response body into label/score pairs.
pub fn parse_zero_shot_response(body: &str) -> Result<Vec<LabelScore>, ClassifierError> {
    let response: ZeroShotResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

    let scores = match response {
        ZeroShotResponse::Single(scores) => scores,
        ZeroShotResponse::Batch(mut batch) => {
            if batch.is_empty() {
                return Err(ClassifierError::InvalidResponse(
                    "Empty batch response".to_string(),
                ));
            }
            batch.swap_remove(0)
        }
    };

    if scores.labels.len() != scores.scores.len() {
        return Err(ClassifierError::InvalidResponse(format!(
            "{} labels but {} scores",
            scores.labels.len(),
            scores.scores.len()
        )));
    }

    Ok(scores
        .labels
        .into_iter()
        .zip(scores.scores)
        .map(|(label, score)| LabelScore { label, score })
        .collect())
}

#[async_trait]
impl ClassificationProvider for HuggingFaceZeroShotClient {
    async fn score_labels(
        &self,
        text: &str,
        labels: &[Category],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        let candidate_labels: Vec<&str> = labels.iter().map(|c| c.label()).collect();
        let payload = json!({
            "inputs": text,
            "parameters": {
                "candidate_labels": candidate_labels,
                "multi_label": true,
                "hypothesis_template": HYPOTHESIS_TEMPLATE,
            },
        });

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&payload);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(ClassifierError::Http(format!("{} - {}", status, body)));
        }

        parse_zero_shot_response(&body)
    }
}
