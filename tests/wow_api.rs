mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use reqwest::Client;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wowbot::commands::music::audio_sources::wow_api::WowApi;
use wowbot::commands::music::utils::music_manager::MusicError;

use common::fixtures;

#[tokio::test]
async fn random_asks_for_requested_count() {
    common::init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wows/random"))
        .and(query_param("results", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::wows(&server.uri(), 3)))
        .expect(1)
        .mount(&server)
        .await;

    let api = WowApi::new(Client::new(), &server.uri()).unwrap();
    let clips = api.random(3).await.unwrap();

    assert_eq!(clips.len(), 3);
    assert_eq!(clips[0].full_line, "Wow number 1.");
    assert_eq!(clips[0].character, "John Beckwith");
    assert_eq!(clips[2].audio, format!("{}/audio/3.mp3", server.uri()));
}

#[tokio::test]
async fn server_errors_are_network_errors() {
    common::init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wows/random"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let api = WowApi::new(Client::new(), &server.uri()).unwrap();
    assert_matches!(api.random(1).await, Err(MusicError::NetworkError(_)));
}

#[tokio::test]
async fn malformed_bodies_are_network_errors() {
    common::init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wows/random"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
        .mount(&server)
        .await;

    let api = WowApi::new(Client::new(), &server.uri()).unwrap();
    assert_matches!(api.random(1).await, Err(MusicError::NetworkError(_)));
}

#[tokio::test]
async fn unreachable_api_is_network_error() {
    common::init();
    // Nothing listens on the discard port.
    let api = WowApi::new(Client::new(), "http://127.0.0.1:9/").unwrap();
    assert_matches!(api.random(1).await, Err(MusicError::NetworkError(_)));
}
