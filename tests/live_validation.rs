use std::{env, sync::Once};

use docuquery::{config, embedding, generation};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("EMBEDDING_PROVIDER", "openai");
        set_default_env("EMBEDDING_MODEL", "text-embedding-3-small");
        set_default_env("CHAT_MODEL", "gpt-3.5-turbo");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY and network access"]
async fn live_openai_embedding_roundtrip() {
    init_config_once();
    let config = config::get_config();
    let client = embedding::build_embedding_client(config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec![
            "docuquery live embedding".to_string(),
            "second input".to_string(),
        ])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 2, "expected embedding per input chunk");
    assert!(!vectors[0].is_empty());
    assert_eq!(vectors[0].len(), vectors[1].len(), "embedding dimension mismatch");
}

#[tokio::test]
#[ignore = "Requires OPENAI_API_KEY and network access"]
async fn live_openai_chat_completion() {
    init_config_once();
    let config = config::get_config();
    let client = generation::build_chat_client(config).expect("chat client");
    let answer = client
        .complete("Answer with the single word: pong")
        .await
        .expect("failed to request completion from provider");
    assert!(answer.to_lowercase().contains("pong"), "unexpected answer: {answer}");
}
