//! Tests for definition lookup against a mock `/query` service: caching,
//! cache keys, retries, stale fallback, and the no-definition path.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pinyin_tutor::definition::*;
use pinyin_tutor::i18n::Language;
use pinyin_tutor::lessons::Difficulty;

fn fast_policy() -> LookupPolicy {
    LookupPolicy {
        retry_delay: Duration::from_millis(10),
        ..LookupPolicy::default()
    }
}

fn found(definition: &str, examples: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": { "definition": definition, "examples": examples },
    }))
}

// ---------------------------------------------------------------------------
// Success and caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lookup_posts_word_lang_and_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({
            "word": "天",
            "lang": "en",
            "difficulty": "beginner",
        })))
        .respond_with(found("sky; heaven", &["天空很蓝。"]))
        .expect(1)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    let state = client.lookup("天", Language::En, Difficulty::Beginner).await;

    assert_eq!(state.display_text(Language::En), "sky; heaven");
    assert_eq!(state.examples(), ["天空很蓝。".to_string()]);
}

#[tokio::test]
async fn test_second_lookup_within_window_uses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("person", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    let a = client.lookup("人", Language::En, Difficulty::Beginner).await;
    let b = client.lookup("人", Language::En, Difficulty::Beginner).await;

    assert_eq!(a, b);
    assert_eq!(client.network_calls(), 1);
    assert_eq!(client.cached_len(), 1);
}

#[tokio::test]
async fn test_cache_key_includes_language_and_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("地", &[]))
        .expect(3)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    client.lookup("地", Language::En, Difficulty::Beginner).await;
    client.lookup("地", Language::Zh, Difficulty::Beginner).await;
    client.lookup("地", Language::En, Difficulty::Advanced).await;
    client.lookup("地", Language::Zh, Difficulty::Beginner).await;

    assert_eq!(client.network_calls(), 3);
}

#[tokio::test]
async fn test_stale_entry_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("fire", &[]))
        .expect(2)
        .mount(&server)
        .await;

    let policy = LookupPolicy {
        stale_after: Duration::ZERO,
        ..fast_policy()
    };
    let client = DefinitionClient::new(&server.uri(), policy);
    client.lookup("火", Language::En, Difficulty::Beginner).await;
    client.lookup("火", Language::En, Difficulty::Beginner).await;
    assert_eq!(client.network_calls(), 2);
}

#[tokio::test]
async fn test_expired_entries_evicted_when_other_words_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("x", &[]))
        .mount(&server)
        .await;

    let policy = LookupPolicy {
        stale_after: Duration::ZERO,
        evict_after: Duration::from_millis(1),
        ..fast_policy()
    };
    let client = DefinitionClient::new(&server.uri(), policy);
    for word in ["一", "二", "三", "四", "五"] {
        client.lookup(word, Language::En, Difficulty::Beginner).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.lookup("六", Language::En, Difficulty::Beginner).await;

    assert_eq!(client.cached_len(), 1);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_retries_then_absent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    let state = client.lookup("水", Language::Zh, Difficulty::Beginner).await;

    assert_eq!(state, DefinitionState::Absent);
    assert_eq!(state.display_text(Language::Zh), no_definition_text(Language::Zh));
    assert_eq!(client.network_calls(), 3);
    assert_eq!(client.cached_len(), 0);
}

#[tokio::test]
async fn test_retry_recovers_after_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("wood", &[]))
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    let state = client.lookup("木", Language::En, Difficulty::Beginner).await;

    assert_eq!(state.display_text(Language::En), "wood");
    assert_eq!(client.network_calls(), 2);
}

#[tokio::test]
async fn test_unsuccessful_response_is_absent_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "not found",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    assert_eq!(
        client.lookup("龘", Language::En, Difficulty::Beginner).await,
        DefinitionState::Absent
    );
    assert_eq!(
        client.lookup("龘", Language::En, Difficulty::Beginner).await,
        DefinitionState::Absent
    );
    assert_eq!(client.network_calls(), 1);
}

#[tokio::test]
async fn test_failed_refetch_falls_back_to_stale_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("metal; gold", &[]))
        .mount(&server)
        .await;

    let policy = LookupPolicy {
        stale_after: Duration::ZERO,
        retries: 0,
        ..fast_policy()
    };
    let client = DefinitionClient::new(&server.uri(), policy);
    client.lookup("金", Language::En, Difficulty::Beginner).await;

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let state = client.lookup("金", Language::En, Difficulty::Beginner).await;
    assert_eq!(state.display_text(Language::En), "metal; gold");
}

#[tokio::test]
async fn test_empty_word_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(found("x", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    assert_eq!(
        client.lookup("  ", Language::En, Difficulty::Beginner).await,
        DefinitionState::Absent
    );
    assert_eq!(client.network_calls(), 0);
}

// ---------------------------------------------------------------------------
// Popup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_popup_renders_examples() {
    colored::control::set_override(false);
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(found("earth", &["土地", "土豆"]))
        .mount(&server)
        .await;

    let client = DefinitionClient::new(&server.uri(), fast_policy());
    let mut popup = WordPopup::loading("土", "tǔ");
    assert_eq!(popup.state, DefinitionState::Loading);
    popup.resolve(client.lookup("土", Language::En, Difficulty::Beginner).await);

    let text = popup.render(Language::En);
    assert!(text.contains("tǔ"));
    assert!(text.contains("earth"));
    assert!(text.contains("1. 土地"));
    assert!(text.contains("2. 土豆"));
}
