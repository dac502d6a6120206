//! Spotify Web API client implementing [`MusicService`].

use super::{Device, MusicService};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Spotify Web API client authenticated with a user access token.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    base_url: String,
    access_token: String,
    http: reqwest::Client,
}

// -- Request / response types -----------------------------------------------

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    device_ids: [&'a str; 1],
    play: bool,
}

/// Search result kinds, in the order they are preferred.
const SEARCH_KINDS: &[(&str, &str)] = &[
    ("tracks", "track"),
    ("episodes", "episode"),
    ("albums", "album"),
    ("playlists", "playlist"),
    ("artists", "artist"),
];

#[derive(Debug, Clone, PartialEq)]
struct SearchHit {
    uri: String,
    kind: &'static str,
    description: String,
}

impl SearchHit {
    fn from_item(kind: &'static str, item: &Value) -> Option<Self> {
        let uri = item.get("uri")?.as_str()?.to_string();
        let name = item.get("name").and_then(Value::as_str).unwrap_or("unknown");

        let mut description = format!("{} '{}'", kind, name);
        let artists = artist_names(item);
        if !artists.is_empty() {
            description.push_str(&format!(" by {}", artists.join(", ")));
        }
        if let Some(show) = item.pointer("/show/name").and_then(Value::as_str) {
            description.push_str(&format!(" from '{}'", show));
        }
        if let Some(album) = item.pointer("/album/name").and_then(Value::as_str) {
            description.push_str(&format!(" (album '{}')", album));
        }

        Some(Self {
            uri,
            kind,
            description,
        })
    }

    /// Tracks and episodes are played by URI, everything else as a context.
    fn play_body(&self) -> Value {
        match self.kind {
            "track" | "episode" => json!({ "uris": [self.uri] }),
            _ => json!({ "context_uri": self.uri }),
        }
    }
}

fn artist_names(item: &Value) -> Vec<String> {
    item.get("artists")
        .and_then(Value::as_array)
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Pick the preferred non-null item from a search response.
fn best_hit(results: &Value) -> Option<SearchHit> {
    SEARCH_KINDS.iter().find_map(|(section, kind)| {
        results
            .pointer(&format!("/{}/items", section))
            .and_then(Value::as_array)?
            .iter()
            .filter(|item| !item.is_null())
            .find_map(|item| SearchHit::from_item(*kind, item))
    })
}

/// Condense the `/me/player` payload to what the model needs.
fn summarize_playback(state: &Value) -> String {
    let item = state.get("item").unwrap_or(&Value::Null);
    json!({
        "is_playing": state.get("is_playing"),
        "track": item.get("name"),
        "artists": artist_names(item),
        "album": item.pointer("/album/name"),
        "show": item.pointer("/show/name"),
        "progress_ms": state.get("progress_ms"),
        "duration_ms": item.get("duration_ms"),
        "shuffle_state": state.get("shuffle_state"),
        "repeat_state": state.get("repeat_state"),
        "device": state.pointer("/device/name"),
        "volume_percent": state.pointer("/device/volume_percent"),
    })
    .to_string()
}

impl SpotifyClient {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    /// Send a player command and fail on any non-success status.
    async fn command(&self, req: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let resp = req
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Spotify {} request failed", what))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Spotify {} failed ({}): {}", what, status, body);
        }
        Ok(resp)
    }

    async fn search(&self, query: &str, types: &str) -> Result<SearchHit> {
        debug!("Spotify search ({}): {}", types, query);
        let resp = self
            .command(
                self.http
                    .get(self.url("search"))
                    .query(&[("q", query), ("type", types), ("limit", "1")]),
                "search",
            )
            .await?;

        let results: Value = resp.json().await.context("Failed to parse search response")?;
        match best_hit(&results) {
            Some(hit) => Ok(hit),
            None => bail!("Nothing found on Spotify for '{}'", query),
        }
    }

    fn empty_put(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.put(self.url(path)).header(CONTENT_LENGTH, "0")
    }

    fn empty_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path)).header(CONTENT_LENGTH, "0")
    }
}

#[async_trait]
impl MusicService for SpotifyClient {
    async fn play(&self, query: &str) -> Result<String> {
        let hit = self
            .search(query, "track,episode,album,playlist,artist")
            .await?;
        self.command(
            self.http.put(self.url("me/player/play")).json(&hit.play_body()),
            "play",
        )
        .await?;
        Ok(format!("Successfully started playback of: {}", hit.description))
    }

    async fn queue_add(&self, query: &str) -> Result<String> {
        let hit = self.search(query, "track").await?;
        self.command(
            self.empty_post("me/player/queue").query(&[("uri", hit.uri.as_str())]),
            "queue",
        )
        .await?;
        Ok(format!("Added to queue: {}", hit.description))
    }

    async fn pause(&self) -> Result<()> {
        self.command(self.empty_put("me/player/pause"), "pause").await?;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.command(self.http.put(self.url("me/player/play")).json(&json!({})), "resume")
            .await?;
        Ok(())
    }

    async fn next(&self) -> Result<()> {
        self.command(self.empty_post("me/player/next"), "next").await?;
        Ok(())
    }

    async fn previous(&self) -> Result<()> {
        self.command(self.empty_post("me/player/previous"), "previous")
            .await?;
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let resp = self
            .command(self.http.get(self.url("me/player/devices")), "devices")
            .await?;
        let body: DevicesResponse = resp.json().await.context("Failed to parse devices")?;
        Ok(body.devices)
    }

    async fn now_playing(&self) -> Result<Option<String>> {
        let resp = self
            .command(self.http.get(self.url("me/player")), "playback state")
            .await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let state: Value = resp.json().await.context("Failed to parse playback state")?;
        if state.get("item").map(Value::is_null).unwrap_or(true) {
            return Ok(None);
        }
        Ok(Some(summarize_playback(&state)))
    }

    async fn set_shuffle(&self, on: bool) -> Result<()> {
        let state = if on { "true" } else { "false" };
        self.command(
            self.empty_put("me/player/shuffle").query(&[("state", state)]),
            "shuffle",
        )
        .await?;
        Ok(())
    }

    async fn transfer_playback(&self, device_id: &str) -> Result<()> {
        self.command(
            self.http.put(self.url("me/player")).json(&TransferRequest {
                device_ids: [device_id],
                play: true,
            }),
            "transfer playback",
        )
        .await?;
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<()> {
        self.command(
            self.empty_put("me/player/volume")
                .query(&[("volume_percent", percent.to_string())]),
            "volume",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_hit_prefers_tracks_and_skips_nulls() {
        let results = json!({
            "tracks": {"items": [null, {
                "uri": "spotify:track:1",
                "name": "Sexbomb",
                "artists": [{"name": "Tom Jones"}, {"name": "Mousse T."}],
                "album": {"name": "Reload"}
            }]},
            "playlists": {"items": [{"uri": "spotify:playlist:9", "name": "Sexbomb Mix"}]}
        });

        let hit = best_hit(&results).unwrap();
        assert_eq!(hit.uri, "spotify:track:1");
        assert_eq!(
            hit.description,
            "track 'Sexbomb' by Tom Jones, Mousse T. (album 'Reload')"
        );
        assert_eq!(hit.play_body(), json!({"uris": ["spotify:track:1"]}));
    }

    #[test]
    fn albums_play_as_context() {
        let results = json!({
            "tracks": {"items": []},
            "albums": {"items": [{"uri": "spotify:album:7", "name": "Back in Black"}]}
        });
        let hit = best_hit(&results).unwrap();
        assert_eq!(hit.play_body(), json!({"context_uri": "spotify:album:7"}));
        assert!(best_hit(&json!({})).is_none());
    }

    #[test]
    fn devices_deserialize_from_player_api() {
        let body: DevicesResponse = serde_json::from_value(json!({
            "devices": [{
                "id": "abc",
                "is_active": true,
                "is_private_session": false,
                "is_restricted": false,
                "name": "DESKTOP-BA78E2S",
                "type": "Computer",
                "volume_percent": 45,
                "supports_volume": true
            }]
        }))
        .unwrap();
        assert_eq!(body.devices[0].kind, "Computer");
        assert_eq!(body.devices[0].volume_percent, Some(45));
    }

    #[test]
    fn playback_summary_is_compact_json() {
        let summary = summarize_playback(&json!({
            "is_playing": true,
            "shuffle_state": false,
            "device": {"name": "iPhone", "volume_percent": 80},
            "item": {"name": "Highway to Hell", "artists": [{"name": "AC/DC"}], "album": {"name": "Highway to Hell"}}
        }));
        let parsed: Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed["track"], "Highway to Hell");
        assert_eq!(parsed["artists"], json!(["AC/DC"]));
        assert_eq!(parsed["device"], "iPhone");
    }
}
