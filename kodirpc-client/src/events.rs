//! Typed table of the notifications Kodi is known to send
//!
//! Each notification name gets a zero-sized marker type implementing
//! [`Notification`], which ties the wire name to the payload type its
//! `params.data` decodes into. Handlers registered through
//! [`crate::EventDispatcher::on`] receive the decoded payload.
//!
//! The table is additive: names that are not listed here can still be
//! subscribed to by string through [`crate::EventDispatcher::register`], and
//! adding a marker never changes how other names are dispatched.
//!
//! Item descriptions (`item` members) vary by media type and are passed
//! through as raw JSON.
//!
//! ```rust
//! use kodirpc_client::events::{Notification, PlayerOnPlay};
//!
//! assert_eq!(PlayerOnPlay::METHOD, "Player.OnPlay");
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A notification name paired with its payload type
pub trait Notification {
    /// Exact, case-sensitive method name on the wire
    const METHOD: &'static str;
    /// Shape of `params.data`
    type Data: DeserializeOwned + Send + 'static;
}

/// Active player reference carried by player notifications
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerRef {
    /// Player id, -1 when no player is involved
    pub playerid: i64,
    /// Playback speed, 0 when paused
    #[serde(default)]
    pub speed: Option<i64>,
}

/// Payload of `Player.OnPlay`, `Player.OnPause` and `Player.OnSpeedChanged`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerData {
    /// Item being played
    #[serde(default)]
    pub item: Option<serde_json::Value>,
    /// Player that changed
    pub player: PlayerRef,
}

/// Time value as Kodi reports it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlayerTime {
    /// Whole hours
    pub hours: u32,
    /// Minutes, 0 to 59
    pub minutes: u32,
    /// Seconds, 0 to 59
    pub seconds: u32,
    /// Milliseconds, 0 to 999
    pub milliseconds: u32,
}

/// Player state after a seek
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeekPlayer {
    /// Player that seeked
    pub playerid: i64,
    /// Playback speed, 0 when paused
    #[serde(default)]
    pub speed: Option<i64>,
    /// New position
    #[serde(default)]
    pub time: Option<PlayerTime>,
    /// Distance jumped
    #[serde(default)]
    pub seekoffset: Option<PlayerTime>,
}

/// Payload of `Player.OnSeek`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeekData {
    /// Item being played
    #[serde(default)]
    pub item: Option<serde_json::Value>,
    /// Player position after the seek
    pub player: SeekPlayer,
}

/// Payload of `Player.OnStop`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StopData {
    /// Item that was playing
    #[serde(default)]
    pub item: Option<serde_json::Value>,
    /// True when playback reached the end of the item
    #[serde(default)]
    pub end: bool,
}

/// Payload of `Player.OnPropertyChanged`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertyChangedData {
    /// Player whose properties changed
    pub player: PlayerRef,
    /// Changed properties, keyed by property name
    pub property: serde_json::Value,
}

/// Payload of `Application.OnVolumeChanged`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VolumeChangedData {
    /// True when audio is muted
    pub muted: bool,
    /// Volume level, 0 to 100
    pub volume: f64,
}

/// Payload of `Input.OnInputRequested`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputRequestedData {
    /// Dialog heading
    pub title: String,
    /// Keyboard, number, date, time, ip or password
    #[serde(rename = "type")]
    pub kind: String,
    /// Prefilled text
    #[serde(default)]
    pub value: String,
}

/// Payload of the library `OnRemove` and `OnUpdate` notifications
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LibraryItemData {
    /// Library id of the item
    pub id: i64,
    /// Media type, e.g. `movie`, `episode`, `song`
    #[serde(rename = "type")]
    pub kind: String,
    /// New play count, video updates only
    #[serde(default)]
    pub playcount: Option<i64>,
}

/// Payload of `Playlist.OnAdd`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaylistAddData {
    /// Item that was added
    #[serde(default)]
    pub item: Option<serde_json::Value>,
    /// Playlist that grew
    pub playlistid: i64,
    /// Position of the new item
    #[serde(default)]
    pub position: Option<i64>,
}

/// Payload of `Playlist.OnClear`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaylistClearData {
    /// Playlist that was emptied
    pub playlistid: i64,
}

/// Payload of `Playlist.OnRemove`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaylistRemoveData {
    /// Playlist that shrank
    pub playlistid: i64,
    /// Position the item was removed from
    pub position: i64,
}

/// Payload-less events keep whatever Kodi sends, usually `null`
pub type Opaque = serde_json::Value;

macro_rules! notifications {
    ($($name:ident => $method:literal : $data:ty;)*) => {
        $(
            #[doc = concat!("`", $method, "`")]
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name;

            impl Notification for $name {
                const METHOD: &'static str = $method;
                type Data = $data;
            }
        )*

        /// Every notification name declared in this module
        pub const KNOWN_METHODS: &[&str] = &[$($method),*];
    };
}

notifications! {
    ApplicationOnVolumeChanged => "Application.OnVolumeChanged": VolumeChangedData;
    AudioLibraryOnCleanFinished => "AudioLibrary.OnCleanFinished": Opaque;
    AudioLibraryOnCleanStarted => "AudioLibrary.OnCleanStarted": Opaque;
    AudioLibraryOnRemove => "AudioLibrary.OnRemove": LibraryItemData;
    AudioLibraryOnScanFinished => "AudioLibrary.OnScanFinished": Opaque;
    AudioLibraryOnScanStarted => "AudioLibrary.OnScanStarted": Opaque;
    AudioLibraryOnUpdate => "AudioLibrary.OnUpdate": LibraryItemData;
    GuiOnScreensaverActivated => "GUI.OnScreensaverActivated": Opaque;
    GuiOnScreensaverDeactivated => "GUI.OnScreensaverDeactivated": Opaque;
    InputOnInputFinished => "Input.OnInputFinished": Opaque;
    InputOnInputRequested => "Input.OnInputRequested": InputRequestedData;
    PlayerOnPause => "Player.OnPause": PlayerData;
    PlayerOnPlay => "Player.OnPlay": PlayerData;
    PlayerOnPropertyChanged => "Player.OnPropertyChanged": PropertyChangedData;
    PlayerOnSeek => "Player.OnSeek": SeekData;
    PlayerOnSpeedChanged => "Player.OnSpeedChanged": PlayerData;
    PlayerOnStop => "Player.OnStop": StopData;
    PlaylistOnAdd => "Playlist.OnAdd": PlaylistAddData;
    PlaylistOnClear => "Playlist.OnClear": PlaylistClearData;
    PlaylistOnRemove => "Playlist.OnRemove": PlaylistRemoveData;
    SystemOnLowBattery => "System.OnLowBattery": Opaque;
    SystemOnQuit => "System.OnQuit": Opaque;
    SystemOnRestart => "System.OnRestart": Opaque;
    SystemOnSleep => "System.OnSleep": Opaque;
    SystemOnWake => "System.OnWake": Opaque;
    VideoLibraryOnCleanFinished => "VideoLibrary.OnCleanFinished": Opaque;
    VideoLibraryOnCleanStarted => "VideoLibrary.OnCleanStarted": Opaque;
    VideoLibraryOnRemove => "VideoLibrary.OnRemove": LibraryItemData;
    VideoLibraryOnScanFinished => "VideoLibrary.OnScanFinished": Opaque;
    VideoLibraryOnScanStarted => "VideoLibrary.OnScanStarted": Opaque;
    VideoLibraryOnUpdate => "VideoLibrary.OnUpdate": LibraryItemData;
}
