use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parley_core::{GenerationParams, ParleyError, Result, StopCause};
use parley_runtime::{Engine, EngineClient, ModelTokenizer, ScriptedModel, TokenModel};

/// Word-level tokenizer split on whitespace, so token counts are word counts.
fn mock_tokenizer() -> ModelTokenizer {
    let json = r#"{
        "version": "1.0",
        "model": {
            "type": "WordLevel",
            "vocab": {"[UNK]": 0, "</s>": 1, "hello": 2, "world": 3, "END": 4, "Tuesday": 5},
            "unk_token": "[UNK]"
        },
        "pre_tokenizer": {"type": "WhitespaceSplit"}
    }"#;
    ModelTokenizer::from_json(json).unwrap()
}

fn spawn_engine(model: Box<dyn TokenModel>) -> EngineClient {
    let tokenizer = Arc::new(mock_tokenizer());
    let (client, rx) = EngineClient::channel(16);
    tokio::spawn(Engine::new(tokenizer, model, rx).run());
    client
}

fn params(max_tokens: usize) -> GenerationParams {
    GenerationParams {
        max_tokens,
        stop: Vec::new(),
    }
}

struct BrokenModel;

impl TokenModel for BrokenModel {
    fn next_token(&mut self, _prompt: &[u32], _generated: &[u32]) -> Result<u32> {
        Err(ParleyError::GenerationFailed("out of memory".into()))
    }
}

/// Never emits eos; counts how many tokens it was asked for.
struct CountingModel {
    calls: Arc<AtomicUsize>,
}

impl TokenModel for CountingModel {
    fn next_token(&mut self, _prompt: &[u32], _generated: &[u32]) -> Result<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(2)
    }
}

#[test]
fn test_eos_fallback_resolves_from_vocab() {
    let tokenizer = mock_tokenizer();
    assert_eq!(tokenizer.eos_token_id(), 1);
    assert_eq!(tokenizer.with_eos_token_id(4).eos_token_id(), 4);
}

#[tokio::test]
async fn test_scripted_reply_ends_with_eos() {
    let client = spawn_engine(Box::new(ScriptedModel::new(vec![2, 3], 1)));

    let pending = client
        .submit("req-1", "<s> hello there".to_string(), params(16))
        .await
        .unwrap();
    let out = pending.wait().await.unwrap();

    assert_eq!(out.text, "hello world");
    assert_eq!(out.stop_cause, StopCause::EndOfSequence);
    assert_eq!(out.prompt_token_count, 3);
    assert_eq!(out.completion_token_count, 2);
}

#[tokio::test]
async fn test_max_tokens_reports_length() {
    let client = spawn_engine(Box::new(ScriptedModel::new(vec![2, 3, 5], 1)));

    let out = client
        .submit("req-1", "hello".to_string(), params(2))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(out.text, "hello world");
    assert_eq!(out.stop_cause, StopCause::Length);
    assert_eq!(out.completion_token_count, 2);
}

#[tokio::test]
async fn test_zero_budget_generates_nothing() {
    let client = spawn_engine(Box::new(ScriptedModel::new(vec![2], 1)));

    let out = client
        .submit("req-1", "hello world".to_string(), params(0))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(out.text, "");
    assert_eq!(out.stop_cause, StopCause::Length);
    assert_eq!(out.prompt_token_count, 2);
    assert_eq!(out.completion_token_count, 0);
}

#[tokio::test]
async fn test_stop_string_truncates_output() {
    let client = spawn_engine(Box::new(ScriptedModel::new(vec![2, 4, 3], 1)));

    let out = client
        .submit(
            "req-1",
            "hi".to_string(),
            GenerationParams {
                max_tokens: 16,
                stop: vec!["END".to_string()],
            },
        )
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(out.text, "hello ");
    assert_eq!(out.stop_cause, StopCause::StopString);
    assert_eq!(out.completion_token_count, 2);
}

#[tokio::test]
async fn test_cancelled_request_never_yields_result() {
    let tokenizer = Arc::new(mock_tokenizer());
    let (client, rx) = EngineClient::channel(4);

    let pending = client
        .submit("req-1", "hello".to_string(), params(16))
        .await
        .unwrap();
    pending.cancel();

    // Engine starts only after the cancel, so it must observe it.
    tokio::spawn(Engine::new(tokenizer, Box::new(ScriptedModel::new(vec![2], 1)), rx).run());

    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, ParleyError::Cancelled));
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let client = spawn_engine(Box::new(BrokenModel));

    let err = client
        .submit("req-1", "hello".to_string(), params(4))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap_err();

    assert!(matches!(err, ParleyError::GenerationFailed(msg) if msg.contains("out of memory")));
}

#[tokio::test]
async fn test_closed_engine_is_unavailable() {
    let (client, rx) = EngineClient::channel(1);
    drop(rx);

    let err = client
        .submit("req-1", "hello".to_string(), params(4))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ParleyError::EngineUnavailable));
}

#[tokio::test]
async fn test_concurrent_submissions_are_all_served() {
    let client = spawn_engine(Box::new(ScriptedModel::new(vec![5], 1)));

    let mut waits = Vec::new();
    for i in 0..4 {
        let client = client.clone();
        waits.push(tokio::spawn(async move {
            client
                .submit(format!("req-{i}"), "hello world".to_string(), params(8))
                .await?
                .wait()
                .await
        }));
    }

    for handle in waits {
        let out = handle.await.unwrap().unwrap();
        assert_eq!(out.text, "Tuesday");
        assert_eq!(out.prompt_token_count, 2);
    }
}

#[tokio::test]
async fn test_dropped_request_frees_the_engine() {
    let calls = Arc::new(AtomicUsize::new(0));
    let client = spawn_engine(Box::new(CountingModel {
        calls: calls.clone(),
    }));

    let pending = client
        .submit("long", "hello".to_string(), params(1_000_000))
        .await
        .unwrap();
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    drop(pending);

    let out = client
        .submit("next", "hello".to_string(), params(3))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(out.stop_cause, StopCause::Length);
    assert_eq!(out.completion_token_count, 3);
    assert!(calls.load(Ordering::SeqCst) < 1_000);
}
