//! Inbound commands and outbound messages
//!
//! Commands arrive as `{"cmd": "<name>", "options": {...}}`; outbound
//! messages are tagged by `action`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skstream_core::course::Route;
use skstream_core::mode::PlaybackOptions;
use skstream_core::notify::{Notification, NotificationData};
use skstream_core::settings::SettingsOptions;
use skstream_core::snapshot::UpdateMessage;
use skstream_core::StreamError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOptions {
    /// Empty when not given; the worker rejects the open
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub subscribe: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub playback_options: Option<PlaybackOptions>,
    /// Settings carried along with the open, including `playback`
    #[serde(flatten)]
    pub settings: SettingsOptions,
}

impl OpenOptions {
    pub fn is_playback(&self) -> bool {
        self.settings.playback.unwrap_or(false)
    }

    /// URL and subscribe policy for the transport
    pub fn stream_target(&self) -> (String, Option<String>) {
        match (&self.playback_options, self.is_playback()) {
            (Some(opts), true) => (opts.playback_url(&self.url), opts.subscribe.clone()),
            _ => (self.url.clone(), self.subscribe.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlarmOptions {
    pub raise: bool,
    #[serde(rename = "type")]
    pub alarm_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl AlarmOptions {
    /// Notification path, `notifications.` prefixed when missing
    pub fn path(&self) -> String {
        if self.alarm_type.starts_with("notifications.") {
            self.alarm_type.clone()
        } else {
            format!("notifications.{}", self.alarm_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(OpenOptions),
    Close,
    Subscribe { context: String, path: Vec<Value> },
    Settings(SettingsOptions),
    Alarm(AlarmOptions),
    Vessel { context: String, name: String },
    Auth { token: Option<String> },
    Routes(Vec<Route>),
}

#[derive(Deserialize)]
struct RawCommand {
    cmd: String,
    #[serde(default)]
    options: Value,
}

#[derive(Deserialize)]
struct SubscribeOptions {
    context: String,
    #[serde(default)]
    path: Vec<Value>,
}

#[derive(Deserialize)]
struct VesselOptions {
    context: String,
    name: String,
}

#[derive(Deserialize)]
struct AuthOptions {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct RoutesOptions {
    #[serde(default)]
    routes: Vec<Route>,
}

impl Command {
    pub fn parse(text: &str) -> Result<Command, StreamError> {
        let raw: RawCommand = serde_json::from_str(text)?;
        let options = match raw.options {
            Value::Null => Value::Object(Default::default()),
            options => options,
        };

        let command = match raw.cmd.as_str() {
            "open" => Command::Open(serde_json::from_value(options)?),
            "close" => Command::Close,
            "subscribe" => {
                let opts: SubscribeOptions = serde_json::from_value(options)?;
                Command::Subscribe {
                    context: opts.context,
                    path: opts.path,
                }
            }
            "settings" => Command::Settings(serde_json::from_value(options)?),
            "alarm" => Command::Alarm(serde_json::from_value(options)?),
            "vessel" => {
                let opts: VesselOptions = serde_json::from_value(options)?;
                Command::Vessel {
                    context: opts.context,
                    name: opts.name,
                }
            }
            "auth" => {
                let opts: AuthOptions = serde_json::from_value(options)?;
                Command::Auth { token: opts.token }
            }
            "routes" => {
                let opts: RoutesOptions = serde_json::from_value(options)?;
                Command::Routes(opts.routes)
            }
            other => {
                return Err(StreamError::InvalidMessage(format!(
                    "unknown command '{}'",
                    other
                )))
            }
        };
        Ok(command)
    }
}

/// Messages posted back to the application
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Outbound {
    Open {
        playback: bool,
    },
    Close {
        /// The close was requested by a command rather than the server
        result: bool,
        playback: bool,
    },
    Error {
        result: String,
        playback: bool,
    },
    Hello {
        #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
        self_id: Option<String>,
        result: Value,
        playback: bool,
    },
    Response {
        result: Value,
    },
    Update(UpdateMessage),
    Notification {
        #[serde(rename = "type")]
        kind: String,
        data: NotificationData,
        playback: bool,
    },
}

impl Outbound {
    pub fn notification(notification: Notification, playback: bool) -> Self {
        Outbound::Notification {
            kind: notification.kind,
            data: notification.data,
            playback,
        }
    }

    /// Action tag, for logging
    pub fn action(&self) -> &'static str {
        match self {
            Outbound::Open { .. } => "open",
            Outbound::Close { .. } => "close",
            Outbound::Error { .. } => "error",
            Outbound::Hello { .. } => "hello",
            Outbound::Response { .. } => "response",
            Outbound::Update(_) => "update",
            Outbound::Notification { .. } => "notification",
        }
    }
}
