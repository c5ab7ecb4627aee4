// Client for the remote playlist store.
//
//   GET    /playlists        all playlists
//   POST   /playlists        create { name, tracks: [] }
//   GET    /playlists/{id}
//   PUT    /playlists/{id}   replace name and tracks
//   DELETE /playlists/{id}
//
// Tracks are embedded as {videoId, title, artist, thumbnail, addedAt},
// which is exactly how Track serializes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PlaylistError;
use crate::player::queue::Track;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn contains(&self, video_id: &str) -> bool {
        self.tracks.iter().any(|t| t.video_id == video_id)
    }
}

#[derive(Debug, Serialize)]
struct PlaylistBody<'a> {
    name: &'a str,
    tracks: &'a [Track],
}

pub struct PlaylistClient {
    http: Client,
    base_url: String,
}

impl PlaylistClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PlaylistError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(PlaylistClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/playlists/{}", self.base_url, id),
            None => format!("{}/playlists", self.base_url),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, id: Option<&str>) -> Result<T, PlaylistError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else if status == StatusCode::NOT_FOUND {
            Err(PlaylistError::NotFound(id.unwrap_or_default().to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(PlaylistError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    // In the order the store returns them (newest first).
    pub async fn list(&self) -> Result<Vec<Playlist>, PlaylistError> {
        let playlists: Vec<Playlist> = self.send(self.http.get(self.url(None)), None).await?;
        debug!(count = playlists.len(), "fetched playlists");
        Ok(playlists)
    }

    pub async fn create(&self, name: &str) -> Result<Playlist, PlaylistError> {
        let body = PlaylistBody { name, tracks: &[] };
        let playlist: Playlist = self.send(self.http.post(self.url(None)).json(&body), None).await?;
        info!(id = %playlist.id, name, "playlist created");
        Ok(playlist)
    }

    pub async fn get(&self, id: &str) -> Result<Playlist, PlaylistError> {
        self.send(self.http.get(self.url(Some(id))), Some(id)).await
    }

    pub async fn update(&self, id: &str, name: &str, tracks: &[Track]) -> Result<Playlist, PlaylistError> {
        let body = PlaylistBody { name, tracks };
        self.send(self.http.put(self.url(Some(id))).json(&body), Some(id))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), PlaylistError> {
        // The body, if any, is just a confirmation message
        let response = self.http.delete(self.url(Some(id))).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlaylistError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlaylistError::Status {
                status: status.as_u16(),
                message,
            });
        }
        info!(id, "playlist deleted");
        Ok(())
    }

    // Appends the track unless the playlist already has it. Returns the
    // playlist as stored afterwards.
    pub async fn add_track(&self, id: &str, track: &Track) -> Result<Playlist, PlaylistError> {
        let mut playlist = self.get(id).await?;
        if playlist.contains(&track.video_id) {
            debug!(id, video_id = %track.video_id, "track already in playlist");
            return Ok(playlist);
        }
        playlist.tracks.push(track.clone());
        self.update(id, &playlist.name, &playlist.tracks).await
    }

    pub async fn remove_track(&self, id: &str, video_id: &str) -> Result<Playlist, PlaylistError> {
        let mut playlist = self.get(id).await?;
        if !playlist.contains(video_id) {
            debug!(id, video_id, "track not in playlist");
            return Ok(playlist);
        }
        playlist.tracks.retain(|t| t.video_id != video_id);
        self.update(id, &playlist.name, &playlist.tracks).await
    }
}
