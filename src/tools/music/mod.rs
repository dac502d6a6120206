//! Music service controller tool.
//!
//! The tool turns `{command, query}` inputs into calls on a [`MusicService`].
//! Natural-language arguments (device descriptions, volume phrases) are
//! resolved here so every service implementation gets plain values.

pub mod spotify;

pub use spotify::SpotifyClient;

use super::traits::{Tool, ToolError, ToolInput, ToolOutput};
use super::user_line;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A playback device as reported by the music service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub supports_volume: bool,
    pub volume_percent: Option<u8>,
}

/// The opaque music service the tool drives.
#[async_trait]
pub trait MusicService: Send + Sync {
    /// Search for `query` and start playing the best hit. Returns what is playing.
    async fn play(&self, query: &str) -> Result<String>;

    /// Search for a track and append it to the queue. Returns what was queued.
    async fn queue_add(&self, query: &str) -> Result<String>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn next(&self) -> Result<()>;

    async fn previous(&self) -> Result<()>;

    async fn devices(&self) -> Result<Vec<Device>>;

    /// Summary of the current playback state, `None` when nothing is playing.
    async fn now_playing(&self) -> Result<Option<String>>;

    async fn set_shuffle(&self, on: bool) -> Result<()>;

    async fn transfer_playback(&self, device_id: &str) -> Result<()>;

    async fn set_volume(&self, percent: u8) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MusicCommand {
    PlayNow,
    QueueAdd,
    Pause,
    Continue,
    Skip,
    Previous,
    GetDevices,
    GetPlaying,
    SetShuffle,
    SetPlaybackDevice,
    SetVolume,
}

/// (command, name, description, query description)
const COMMANDS: &[(MusicCommand, &str, &str, &str)] = &[
    (MusicCommand::PlayNow, "playNow",
     "Starts playing track, album, playlist or artist. This is the default way of playing a song etc.",
     "(str): The track, artist, playlist or whatever else the user wants to be played"),
    (MusicCommand::QueueAdd, "queueAdd",
     "Adds track to the end of the queue, only works with single tracks, not albums, not artists, etc.",
     "(str): The track the user wants to add to the queue"),
    (MusicCommand::Pause, "pause", "Pauses whatever is playing right now.", "None"),
    (MusicCommand::Continue, "continue", "Continues playing whatever was playing before.", "None"),
    (MusicCommand::Skip, "skip", "Skips the current track.", "None"),
    (MusicCommand::Previous, "previous", "Reverts to previous track.", "None"),
    (MusicCommand::GetDevices, "getDevices",
     "Gets a list of currently available devices for playback. Returns their ID, name, volume, if they can be controlled and if they are active right now.",
     "None"),
    (MusicCommand::GetPlaying, "getPlaying",
     "Gets all kind of information about what and how is currently playing. Song name, artist, shuffle state and so on.",
     "None"),
    (MusicCommand::SetShuffle, "setShuffle", "Sets shuffle mode on or off.",
     "(bool): 'true' sets shuffle on, 'false' turn shuffle off."),
    (MusicCommand::SetPlaybackDevice, "setPlaybackDevice", "Sets the current playback device.",
     "(str): The device name, id, type or whatever else describes the target device well in natural language, like 'pc', 'smartphone', 'web player', etc."),
    (MusicCommand::SetVolume, "setVolume", "Sets the current playback device's volume.",
     "(str): Natural language description of how to set/change the volume, like 'louder', 'mute', 'turn the volume up', '60%', 'thats too loud', etc."),
];

impl MusicCommand {
    fn parse(name: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(_, n, _, _)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(c, _, _, _)| *c)
    }

    fn needs_query(self) -> bool {
        matches!(
            self,
            Self::PlayNow | Self::QueueAdd | Self::SetShuffle | Self::SetPlaybackDevice | Self::SetVolume
        )
    }
}

/// Device type aliases users say vs. what the service reports.
const DEVICE_ALIASES: &[(&str, &str)] = &[
    ("pc", "computer"),
    ("desktop", "computer"),
    ("laptop", "computer"),
    ("mac", "computer"),
    ("phone", "smartphone"),
    ("handy", "smartphone"),
    ("iphone", "smartphone"),
    ("mobile", "smartphone"),
    ("tablet", "tablet"),
    ("speaker", "speaker"),
    ("tv", "tv"),
];

/// Pick the device that best matches a natural-language description.
fn select_device<'a>(devices: &'a [Device], query: &str) -> Option<&'a Device> {
    let query = query.trim().to_lowercase();
    let tokens: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .collect();

    let score = |device: &Device| -> u32 {
        let name = device.name.to_lowercase();
        let kind = device.kind.to_lowercase();
        let mut score = 0;
        if device.id.as_deref().map(|id| id.eq_ignore_ascii_case(&query)).unwrap_or(false) {
            score += 10;
        }
        if name == query {
            score += 5;
        } else if name.contains(&query) {
            score += 3;
        }
        for token in &tokens {
            if name.contains(token) {
                score += 2;
            }
            let alias = DEVICE_ALIASES
                .iter()
                .find(|(said, _)| said == token)
                .map(|(_, reported)| *reported)
                .unwrap_or(*token);
            if kind == alias {
                score += 2;
            }
        }
        score
    };

    let mut best: Option<(&Device, u32)> = None;
    for device in devices.iter().filter(|d| !d.is_restricted && d.id.is_some()) {
        let s = score(device);
        if s > 0 && best.map(|(_, b)| s > b).unwrap_or(true) {
            best = Some((device, s));
        }
    }
    best.map(|(d, _)| d)
}

/// Step used for relative changes without an amount, and as the level
/// restored by "unmute" when playback is silent.
const VOLUME_STEP: i32 = 20;

/// Interpret a volume phrase relative to the current volume.
fn resolve_volume(current: u8, query: &str) -> Option<u8> {
    const DOWN: &[&str] = &["down", "quieter", "lower", "decrease", "softer", "less", "reduce"];
    const UP: &[&str] = &["up", "louder", "increase", "raise", "higher", "more", "boost"];

    let q = query.trim().to_lowercase();
    let words: Vec<&str> = q
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |set: &[&str]| words.iter().any(|w| set.iter().any(|s| s == w));
    let phrase = words.join(" ");
    let current = current as i32;

    if has(&["unmute", "unmuted"]) {
        return Some(current.clamp(VOLUME_STEP, 100) as u8);
    }
    if has(&["mute", "muted", "silent", "silence", "off"]) {
        return Some(0);
    }
    if has(&["max", "maximum", "full"]) {
        return Some(100);
    }

    let down = phrase.contains("too loud") || has(DOWN);
    let up = !down && (phrase.contains("too quiet") || has(UP));
    // Amounts above 100 cannot change the outcome after clamping.
    let number: Option<i32> = words
        .iter()
        .find(|w| w.chars().all(|c| c.is_ascii_digit()))
        .map(|digits| digits.parse::<u64>().map_or(100, |n| n.min(100)) as i32);

    let target = match number {
        Some(n) if has(&["by"]) && (up || down) => {
            if down {
                current - n
            } else {
                current + n
            }
        }
        Some(n) => n,
        None => {
            let step = if has(&["bit", "little", "slightly", "tad"]) {
                VOLUME_STEP / 2
            } else {
                VOLUME_STEP
            };
            if down {
                current - step
            } else if up {
                current + step
            } else {
                return None;
            }
        }
    };

    Some(target.clamp(0, 100) as u8)
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Tool that controls music playback.
pub struct MusicControl {
    service: Arc<dyn MusicService>,
}

impl MusicControl {
    pub fn new(service: Arc<dyn MusicService>) -> Self {
        Self { service }
    }

    async fn set_playback_device(&self, query: &str) -> Result<ToolOutput, ToolError> {
        let devices = self.service.devices().await?;
        let Some(device) = select_device(&devices, query) else {
            let names: Vec<String> = devices
                .iter()
                .map(|d| format!("'{}' ({})", d.name, d.kind))
                .collect();
            return Ok(ToolOutput::free(format!(
                "No playback device matches '{}'. Available devices: {}",
                query,
                if names.is_empty() { "none".to_string() } else { names.join(", ") }
            )));
        };

        let id = device.id.as_deref().unwrap_or_default();
        self.service.transfer_playback(id).await?;
        Ok(ToolOutput::free(format!(
            "Playback moved to '{}' ({}).",
            device.name, device.kind
        )))
    }

    async fn set_volume(&self, query: &str) -> Result<ToolOutput, ToolError> {
        let devices = self.service.devices().await?;
        let Some(device) = devices.iter().find(|d| d.is_active) else {
            return Ok(ToolOutput::free(
                "There is no active playback device to change the volume on.",
            ));
        };
        if !device.supports_volume {
            return Ok(ToolOutput::free(format!(
                "'{}' does not support remote volume control.",
                device.name
            )));
        }

        let current = device.volume_percent.unwrap_or(50);
        let target = resolve_volume(current, query).ok_or_else(|| {
            ToolError::InvalidToolInput(format!("could not understand volume change '{}'", query))
        })?;
        self.service.set_volume(target).await?;
        Ok(ToolOutput::free(format!(
            "Volume set from {}% to {}% on '{}'.",
            current, target, device.name
        )))
    }
}

#[async_trait]
impl Tool for MusicControl {
    fn name(&self) -> &str {
        "SpotifyControl"
    }

    fn when_to_use(&self) -> String {
        let mut text = String::from(
            "Use this tool when you need to do anything related to spotify.\n\
             This tool can do a bunch of different things via commands and queries.\n\
             - Available Commands -\n",
        );
        for (_, name, desc, query) in COMMANDS {
            text.push_str(&format!(
                "command: {}\nquery: {}\ndescription: {}\n\n",
                name, query, desc
            ));
        }
        text
    }

    fn examples(&self) -> String {
        let cases: &[(&str, &[(&str, &str)])] = &[
            (
                "play fest und flauschig, episode 'weihnachten im sauriersaal'",
                &[("playNow", "podcast episode, weihnachten im sauriersaal, Fest und Flauschig")],
            ),
            (
                "can you add superstition and we are family to the queue?",
                &[("queueAdd", "superstition"), ("queueAdd", "we are family")],
            ),
            (
                "i want to hear highway to hell on my smartphone",
                &[("setPlaybackDevice", "smartphone"), ("playNow", "highway to hell")],
            ),
            ("shuffle off", &[("setShuffle", "false")]),
            ("turn volume up a bit", &[("setVolume", "up a bit")]),
        ];

        cases
            .iter()
            .map(|(msg, calls)| {
                let calls: Vec<String> = calls
                    .iter()
                    .map(|(command, query)| {
                        format!(
                            "        {}",
                            serde_json::json!({
                                "name": "SpotifyControl",
                                "input": {"command": command, "query": query}
                            })
                        )
                    })
                    .collect();
                format!(
                    "<chat&tools>\n{}\n<response>\n{{\n    \"toolsToCall\": [\n{}\n    ]\n}}\n</response>\n",
                    user_line(msg),
                    calls.join(",\n")
                )
            })
            .collect()
    }

    fn answer_examples(&self) -> String {
        format!(
            "<chat&tools>\n{}\n{}\n<response>\nI'm now playing \"Sexbomb\" by Tom Jones and Mousse T. for you.\n</response>",
            user_line("play sexbomb"),
            serde_json::json!({
                "role": "SpotifyControl",
                "content": "Successfully started playback of: track 'Sexbomb' by Tom Jones, Mousse T. (album 'Reload')"
            })
        )
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput, ToolError> {
        let name = input.require("command")?;
        let command = MusicCommand::parse(&name).ok_or_else(|| {
            ToolError::InvalidToolInput(format!("'{}' is not a valid command for SpotifyControl", name))
        })?;

        let query = input.field("query");
        if command.needs_query() && query.is_none() {
            return Err(ToolError::InvalidToolInput(format!(
                "command '{}' requires a 'query'",
                name
            )));
        }
        let query = query.unwrap_or_default();
        debug!("Music command {:?} ({})", command, query);

        let text = match command {
            MusicCommand::PlayNow => self.service.play(&query).await?,
            MusicCommand::QueueAdd => self.service.queue_add(&query).await?,
            MusicCommand::Pause => {
                self.service.pause().await?;
                "Playback paused.".to_string()
            }
            MusicCommand::Continue => {
                self.service.resume().await?;
                "Playback continued.".to_string()
            }
            MusicCommand::Skip => {
                self.service.next().await?;
                "Skipped to the next track.".to_string()
            }
            MusicCommand::Previous => {
                self.service.previous().await?;
                "Went back to the previous track.".to_string()
            }
            MusicCommand::GetDevices => {
                let devices = self.service.devices().await?;
                serde_json::json!({ "devices": devices }).to_string()
            }
            MusicCommand::GetPlaying => self
                .service
                .now_playing()
                .await?
                .unwrap_or_else(|| "Nothing is playing right now.".to_string()),
            MusicCommand::SetShuffle => {
                let on = parse_switch(&query).ok_or_else(|| {
                    ToolError::InvalidToolInput(format!(
                        "setShuffle expects true or false, got '{}'",
                        query
                    ))
                })?;
                self.service.set_shuffle(on).await?;
                format!("Shuffle is now {}.", if on { "on" } else { "off" })
            }
            MusicCommand::SetPlaybackDevice => return self.set_playback_device(&query).await,
            MusicCommand::SetVolume => return self.set_volume(&query).await,
        };

        Ok(ToolOutput::free(text))
    }
}
