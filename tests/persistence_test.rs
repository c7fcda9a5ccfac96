//! REST conversation store against a mocked PostgREST endpoint.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use avatarbot::core::session::{SessionStatus, TranscriptMessage};
use avatarbot::persistence::{
    ConversationPatch, ConversationStore, RestConversationStore, StoreError,
};

const API_KEY: &str = "service-role-key";

async fn mock_store() -> (MockServer, RestConversationStore) {
    let server = MockServer::start().await;
    let store = RestConversationStore::new(server.uri(), API_KEY);
    (server, store)
}

#[tokio::test]
async fn find_by_room_returns_matching_row() {
    let (server, store) = mock_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .and(query_param("select", "*"))
        .and(query_param("room_url", "eq.https://rooms.example/a"))
        .and(header("apikey", API_KEY))
        .and(header("authorization", format!("Bearer {API_KEY}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "room_url": "https://rooms.example/a", "status": "active"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let row = store
        .find_by_room("https://rooms.example/a")
        .await
        .unwrap()
        .expect("row present");
    assert_eq!(row.id, 7);
    assert_eq!(row.status, SessionStatus::Active);
}

#[tokio::test]
async fn find_by_room_with_no_match_returns_none() {
    let (server, store) = mock_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let row = store.find_by_room("https://rooms.example/b").await.unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn find_by_room_with_duplicates_uses_first() {
    let (server, store) = mock_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "room_url": "r"},
            {"id": 2, "room_url": "r"}
        ])))
        .mount(&server)
        .await;

    let row = store.find_by_room("r").await.unwrap().unwrap();
    assert_eq!(row.id, 1);
}

#[tokio::test]
async fn update_patches_row_by_id() {
    let (server, store) = mock_store().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .and(query_param("id", "eq.7"))
        .and(header("apikey", API_KEY))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let patch = ConversationPatch::closing(vec![TranscriptMessage::user("bye")], None);
    store.update(7, patch).await.unwrap();
}

#[tokio::test]
async fn server_error_surfaces_status_and_body() {
    let (server, store) = mock_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database on fire"))
        .mount(&server)
        .await;

    let err = store.find_by_room("r").await.unwrap_err();
    match err {
        StoreError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database on fire");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn update_error_status_is_an_error() {
    let (server, store) = mock_store().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = store
        .update(1, ConversationPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 401, .. }));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (server, store) = mock_store().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = store.find_by_room("r").await.unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));
}
