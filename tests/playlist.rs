// Playlist store client against a mock store.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ytqueue::error::PlaylistError;
use ytqueue::playlist::PlaylistClient;
use ytqueue::Track;

fn playlist(id: &str, name: &str, tracks: Value) -> Value {
    json!({
        "_id": id,
        "name": name,
        "tracks": tracks,
        "createdAt": "2024-03-01T10:00:00Z",
        "updatedAt": "2024-03-02T10:00:00Z"
    })
}

fn stored_track(id: &str) -> Value {
    json!({
        "videoId": id,
        "title": format!("Song {id}"),
        "artist": "Band",
        "thumbnail": "https://i.ytimg.com/vi/x/mqdefault.jpg",
        "addedAt": "2024-03-01T10:00:00Z"
    })
}

#[tokio::test]
async fn lists_playlists_in_store_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            playlist("p2", "Newer", json!([stored_track("a")])),
            playlist("p1", "Older", json!([])),
        ])))
        .mount(&server)
        .await;

    let playlists = PlaylistClient::new(server.uri()).unwrap().list().await.unwrap();
    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0].name, "Newer");
    assert_eq!(playlists[0].tracks[0].video_id, "a");
    assert!(playlists[1].tracks.is_empty());
}

#[tokio::test]
async fn create_sends_an_empty_track_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/playlists"))
        .and(body_partial_json(json!({ "name": "Road trip", "tracks": [] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(playlist("p1", "Road trip", json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let created = PlaylistClient::new(server.uri()).unwrap().create("Road trip").await.unwrap();
    assert_eq!(created.id, "p1");
}

#[tokio::test]
async fn missing_playlists_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Playlist not found" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/playlists/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = PlaylistClient::new(server.uri()).unwrap();
    assert!(matches!(client.get("nope").await, Err(PlaylistError::NotFound(id)) if id == "nope"));
    assert!(matches!(client.delete("nope").await, Err(PlaylistError::NotFound(_))));
}

#[tokio::test]
async fn add_track_appends_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist("p1", "Mix", json!([stored_track("a")]))))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/playlists/p1"))
        .and(body_partial_json(json!({ "name": "Mix" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist(
            "p1",
            "Mix",
            json!([stored_track("a"), stored_track("b")]),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlaylistClient::new(server.uri()).unwrap();

    // Already there: no update
    let unchanged = client.add_track("p1", &Track::new("a", "Song a", "Band", "")).await.unwrap();
    assert_eq!(unchanged.tracks.len(), 1);

    let updated = client.add_track("p1", &Track::new("b", "Song b", "Band", "")).await.unwrap();
    assert_eq!(updated.tracks.len(), 2);
}

#[tokio::test]
async fn delete_accepts_any_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/playlists/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Playlist deleted" })))
        .expect(1)
        .mount(&server)
        .await;

    PlaylistClient::new(server.uri()).unwrap().delete("p1").await.unwrap();
}

#[tokio::test]
async fn remove_track_drops_only_that_track() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/p1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(playlist("p1", "Mix", json!([stored_track("a"), stored_track("b")]))),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/playlists/p1"))
        .and(body_partial_json(json!({ "name": "Mix", "tracks": [{ "videoId": "b" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist("p1", "Mix", json!([stored_track("b")]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = PlaylistClient::new(server.uri()).unwrap();

    // Not in the playlist: no update
    let unchanged = client.remove_track("p1", "zzz").await.unwrap();
    assert_eq!(unchanged.tracks.len(), 2);

    let updated = client.remove_track("p1", "a").await.unwrap();
    assert_eq!(updated.tracks.len(), 1);
    assert_eq!(updated.tracks[0].video_id, "b");
}
