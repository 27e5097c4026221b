#[path = "support/oracle.rs"]
mod oracle;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use oracle::{ScriptedOracle, exercise_reply, oracle_down, pipeline, request};
use storygap::error::LlmError;
use storygap::llm::{CompletionFuture, CompletionRequest, ModelChain, Provider};
use storygap::story::text::count_blanks;
use storygap::story::{GenerationClient, PipelineOptions, StoryGapPipeline};
use storygap::{Difficulty, ExerciseError};

fn whale_owl() -> Result<String, LlmError> {
    Ok(serde_json::json!({
        "gap_text": "A ______ swam far. An ______ hooted at night.",
        "solution_text": "A whale swam far. An owl hooted at night.",
        "used_words": ["whale", "owl"],
        "gaps_meta": [
            {"index": 1, "correct": "whale", "why_unique": "only a whale swims in this sea",
             "rejects": [{"word": "owl", "reason": "owls do not swim"}]},
            {"index": 2, "correct": "owl", "why_unique": "hooting", "rejects": ["whale"]}
        ]
    })
    .to_string())
}

fn whale_twice() -> Result<String, LlmError> {
    exercise_reply(
        "A ______ swam far. The ______ dived deep.",
        "A whale swam far. The whale dived deep.",
    )
}

#[tokio::test]
async fn example_word_set_succeeds_on_first_attempt() {
    let oracle = ScriptedOracle::new(vec![whale_owl()]);
    let exercise = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();

    assert_eq!(count_blanks(&exercise.gap_text), 2);
    assert_eq!(exercise.used_words, vec!["whale", "owl"]);
    assert_eq!(exercise.gaps_meta.len(), 2);
    assert_eq!(exercise.gaps_meta[0].rejects[0].word, "owl");
    assert_eq!(exercise.gaps_meta[1].rejects[0].word, "whale");
    assert_eq!(oracle.calls(), 1);
    assert!(oracle.feedback(0).is_none());
}

#[tokio::test]
async fn missing_word_is_named_in_retry_feedback() {
    let oracle = ScriptedOracle::new(vec![whale_twice(), whale_owl()]);
    let exercise = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();

    assert_eq!(exercise.solution_text, "A whale swam far. An owl hooted at night.");
    assert_eq!(oracle.calls(), 2);
    let feedback = oracle.feedback(1).unwrap();
    assert!(feedback.contains("must_be_once"));
    assert!(feedback.contains("Missing words: \"owl\""));
}

#[tokio::test]
async fn persistent_failure_returns_diagnostics_after_three_calls() {
    let oracle = ScriptedOracle::new(vec![whale_twice(), whale_twice(), whale_twice()]);
    let err = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Yellow))
        .await
        .unwrap_err();

    assert_eq!(oracle.calls(), 3);
    assert!(err.retryable());
    assert_eq!(err.http_status(), 422);
    let ExerciseError::ModelOutputInvalid {
        reason,
        missing_words,
        counts,
        attempts,
        ..
    } = err
    else {
        panic!("expected model_output_invalid");
    };
    assert_eq!(reason, "must_be_once");
    assert_eq!(missing_words, vec!["owl"]);
    assert_eq!(counts["whale"], 2);
    assert_eq!(attempts, 3);

    let last = oracle.feedback(2).unwrap();
    assert!(last.contains("5 to 8 words"));
    assert!(!oracle.feedback(1).unwrap().contains("5 to 8 words"));
}

#[tokio::test]
async fn oracle_outage_is_generation_failed() {
    let oracle = ScriptedOracle::new(vec![oracle_down(), oracle_down(), oracle_down()]);
    let err = pipeline(&oracle)
        .run(&request(&["whale"], Difficulty::Red))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "generation_failed");
    assert_eq!(err.http_status(), 502);
    assert_eq!(err.to_json()["retryable"], true);
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn placeholder_text_triggers_one_retry() {
    let oracle = ScriptedOracle::new(vec![
        exercise_reply(
            "The word is ______. An ______ hooted at night.",
            "The word is whale. An owl hooted at night.",
        ),
        whale_owl(),
    ]);
    let exercise = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();

    assert!(!exercise.solution_text.to_lowercase().contains("the word is"));
    assert_eq!(oracle.calls(), 2);
    assert!(oracle.feedback(1).unwrap().contains("The word is"));
}

#[tokio::test]
async fn worst_case_makes_at_most_five_calls() {
    let placeholder_and_modal = || {
        exercise_reply(
            "The word is ______. We must to see an ______.",
            "The word is whale. We must to see an owl.",
        )
    };
    let oracle = ScriptedOracle::new(vec![
        whale_twice(),
        whale_twice(),
        placeholder_and_modal(),
        placeholder_and_modal(),
    ]);
    let exercise = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();

    // The grammar retry gets unparseable prose, so the validated text stays.
    assert_eq!(exercise.solution_text, "The word is whale. We must to see an owl.");
    assert_eq!(oracle.calls(), 5);
}

#[tokio::test]
async fn result_follows_request_order_not_oracle_echo() {
    let oracle = ScriptedOracle::new(vec![Ok(serde_json::json!({
        "gap_text": "An ______ hooted. A ______ swam.",
        "solution_text": "An owl hooted. A whale swam.",
        "used_words": ["whale", "owl"]
    })
    .to_string())]);
    let exercise = pipeline(&oracle)
        .run(&request(&["owl", "whale"], Difficulty::Green))
        .await
        .unwrap();

    assert_eq!(exercise.used_words, vec!["owl", "whale"]);
    let correct: Vec<&str> = exercise.gaps_meta.iter().map(|g| g.correct.as_str()).collect();
    assert_eq!(correct, vec!["owl", "whale"]);
    let indices: Vec<usize> = exercise.gaps_meta.iter().map(|g| g.index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn solution_only_reply_gets_blanks_rebuilt() {
    let oracle = ScriptedOracle::new(vec![Ok(
        "Here you go:\n{\"solution_text\": \"A whale swam far. An owl hooted at night.\"}".into(),
    )]);
    let exercise = pipeline(&oracle)
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();
    assert_eq!(exercise.gap_text, "A ______ swam far. An ______ hooted at night.");
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn leaked_phrase_component_is_retried_with_isolation_hint() {
    let oracle = ScriptedOracle::new(vec![
        exercise_reply(
            "Every person has ______. Human rights protect ______.",
            "Every person has equal rights. Human rights protect human dignity.",
        ),
        exercise_reply(
            "Every citizen has ______ under the law. Prisoners keep their ______.",
            "Every citizen has equal rights under the law. Prisoners keep their human dignity.",
        ),
    ]);
    let exercise = pipeline(&oracle)
        .run(&request(&["equal rights", "human dignity"], Difficulty::Red))
        .await
        .unwrap();

    assert!(exercise.solution_text.starts_with("Every citizen"));
    let feedback = oracle.feedback(1).unwrap();
    assert!(feedback.contains("Overlapping phrases \"equal rights\" and \"human dignity\""));
    assert!(feedback.contains("Isolate every multi-word phrase"));
}

#[tokio::test]
async fn difficulty_controls_sampling() {
    let oracle = ScriptedOracle::new(vec![whale_owl(), whale_owl()]);
    let p = pipeline(&oracle);
    p.run(&request(&["whale", "owl"], Difficulty::Green)).await.unwrap();
    p.run(&request(&["whale", "owl"], Difficulty::Red)).await.unwrap();

    let green = oracle.request(0);
    let red = oracle.request(1);
    assert!(red.temperature < green.temperature);
    assert!(red.max_output_tokens > green.max_output_tokens);
}

/// Serves only the backup model; the primary is unknown to the endpoint.
struct BackupOnly {
    calls: AtomicUsize,
}

impl Provider for BackupOnly {
    fn name(&self) -> &str {
        "backup-only"
    }

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.model == "primary" {
                Err(LlmError::ModelNotFound {
                    model: request.model.clone(),
                })
            } else {
                whale_owl()
            }
        })
    }
}

#[tokio::test]
async fn unknown_primary_model_falls_back_within_one_attempt() {
    let provider = Arc::new(BackupOnly {
        calls: AtomicUsize::new(0),
    });
    let chain = ModelChain::new(provider.clone(), vec!["primary".into(), "backup".into()]);
    let pipeline = StoryGapPipeline::new(GenerationClient::new(chain), PipelineOptions::default());

    let exercise = pipeline
        .run(&request(&["whale", "owl"], Difficulty::Green))
        .await
        .unwrap();
    assert_eq!(exercise.used_words, vec!["whale", "owl"]);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}
