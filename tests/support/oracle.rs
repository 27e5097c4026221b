#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use storygap::error::LlmError;
use storygap::llm::{CompletionFuture, CompletionRequest, ModelChain, Provider};
use storygap::story::{GenerationClient, PipelineOptions, StoryGapPipeline};
use storygap::{Difficulty, StoryGapRequest, WordSet};

/// Replays canned oracle replies in order, then answers with prose that
/// never parses.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Corrective feedback sent with the given call (0-based), if any.
    pub fn feedback(&self, call: usize) -> Option<String> {
        self.requests.lock().unwrap()[call]
            .messages
            .get(2)
            .map(|m| m.content.clone())
    }

    pub fn request(&self, call: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[call].clone()
    }
}

impl Provider for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("I would rather write a poem.".to_string()))
        })
    }
}

pub fn exercise_reply(gap: &str, solution: &str) -> Result<String, LlmError> {
    Ok(serde_json::json!({ "gap_text": gap, "solution_text": solution }).to_string())
}

pub fn oracle_down() -> Result<String, LlmError> {
    Err(LlmError::Request {
        model: "scripted-model".into(),
        message: "503 Service Unavailable".into(),
    })
}

pub fn pipeline(oracle: &Arc<ScriptedOracle>) -> StoryGapPipeline {
    let chain = ModelChain::new(oracle.clone(), vec!["scripted-model".into()]);
    StoryGapPipeline::new(GenerationClient::new(chain), PipelineOptions::default())
}

pub fn request(words: &[&str], difficulty: Difficulty) -> StoryGapRequest {
    let words = WordSet::new(words.iter().map(ToString::to_string).collect()).unwrap();
    StoryGapRequest::new(words, difficulty)
}
