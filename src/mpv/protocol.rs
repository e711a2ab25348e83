//! MPV JSON IPC protocol types.
//!
//! Reference: https://mpv.io/manual/master/#json-ipc

use serde::Deserialize;
use serde_json::Value;

/// Command sent to MPV via IPC.
///
/// The template is the JSON object text up to, but not including, the
/// `request_id` member and the closing brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpvCommand {
  name: &'static str,
  template: &'static str,
}

impl MpvCommand {
  pub const PAUSE_TOGGLE: Self = Self::new("pauseToggle", r#"{"command": ["cycle", "pause"]"#);
  pub const PAUSE_ON: Self = Self::new(
    "pauseOn",
    r#"{"command": ["set_property", "pause", true]"#,
  );
  pub const PAUSE_OFF: Self = Self::new(
    "pauseOff",
    r#"{"command": ["set_property", "pause", false]"#,
  );

  pub const OSC_ON: Self = Self::new(
    "oscOn",
    r#"{"command": ["script-message", "osc-visibility", "always"]"#,
  );
  pub const OSC_OFF: Self = Self::new(
    "oscOff",
    r#"{"command": ["script-message", "osc-visibility", "never"]"#,
  );

  pub const PLAYLIST_PREV: Self = Self::new("playlistPrev", r#"{"command": ["playlist-prev"]"#);
  pub const PLAYLIST_NEXT: Self = Self::new("playlistNext", r#"{"command": ["playlist-next"]"#);

  pub const CHAPTER_PREV: Self = Self::new("chapterPrev", r#"{"command": ["add", "chapter", -1]"#);
  pub const CHAPTER_NEXT: Self = Self::new("chapterNext", r#"{"command": ["add", "chapter", 1]"#);

  pub const PRESS_LEFT: Self = Self::new("pressLeft", r#"{"command": ["keypress", "LEFT"]"#);
  pub const PRESS_RIGHT: Self = Self::new("pressRight", r#"{"command": ["keypress", "RIGHT"]"#);

  /// Every command the remote exposes, in control-page order.
  pub const ALL: [Self; 11] = [
    Self::PAUSE_TOGGLE,
    Self::PAUSE_ON,
    Self::PAUSE_OFF,
    Self::OSC_OFF,
    Self::OSC_ON,
    Self::PLAYLIST_PREV,
    Self::PLAYLIST_NEXT,
    Self::CHAPTER_PREV,
    Self::CHAPTER_NEXT,
    Self::PRESS_LEFT,
    Self::PRESS_RIGHT,
  ];

  const fn new(name: &'static str, template: &'static str) -> Self {
    Self { name, template }
  }

  /// Short camelCase name, also used as the HTTP route segment.
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Look up a command by its name.
  pub fn by_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|cmd| cmd.name == name)
  }

  /// Build the wire line for this command (without the trailing newline).
  pub fn wire_line(&self, request_id: u32) -> String {
    format!("{}, \"request_id\": {}}}", self.template, request_id)
  }
}

/// Response from MPV for a command.
#[derive(Debug, Clone, Deserialize)]
pub struct MpvResponse {
  /// "success" or error message.
  pub error: String,
  /// Response data (command-specific).
  #[serde(default)]
  pub data: Option<Value>,
  /// Matching request ID.
  pub request_id: u32,
}

impl MpvResponse {
  /// Parse a raw response line.
  pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(line)
  }

  /// Check if the command succeeded.
  pub fn is_success(&self) -> bool {
    self.error == "success"
  }
}

/// Event sent by MPV (property changes, playback events, etc.).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpvEvent {
  /// Event name (e.g., "pause", "end-file", "client-message").
  pub name: String,
  /// The raw line as received.
  pub line: String,
}

/// Message received from MPV IPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpvMessage {
  /// Reply to a command, still in its raw form.
  Response { request_id: u32, line: String },
  Event(MpvEvent),
  /// Neither an event nor a usable reply.
  Malformed(String),
}

impl MpvMessage {
  /// Classify a line from MPV.
  ///
  /// `event` takes precedence over `request_id`.
  pub fn parse(line: &str) -> Self {
    let value: Value = match serde_json::from_str(line) {
      Ok(v) => v,
      Err(e) => return MpvMessage::Malformed(format!("invalid JSON: {}", e)),
    };

    if let Some(event) = value.get("event") {
      return match event.as_str() {
        Some(name) => MpvMessage::Event(MpvEvent {
          name: name.to_string(),
          line: line.to_string(),
        }),
        None => MpvMessage::Malformed("event is not a string".to_string()),
      };
    }

    match value.get("request_id") {
      Some(id) => match id.as_u64().and_then(|id| u32::try_from(id).ok()) {
        Some(request_id) => MpvMessage::Response {
          request_id,
          line: line.to_string(),
        },
        None => MpvMessage::Malformed(format!("request_id out of range: {}", id)),
      },
      None => MpvMessage::Malformed("neither event nor request_id present".to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pause_toggle_wire_line() {
    assert_eq!(
      MpvCommand::PAUSE_TOGGLE.wire_line(7),
      r#"{"command": ["cycle", "pause"], "request_id": 7}"#
    );
  }

  #[test]
  fn test_every_wire_line_is_json() {
    for cmd in MpvCommand::ALL {
      let line = cmd.wire_line(u32::MAX);
      let value: Value = serde_json::from_str(&line).unwrap();
      assert!(value["command"].is_array(), "{}", cmd.name());
      assert_eq!(value["request_id"], u32::MAX);
    }
  }

  #[test]
  fn test_chapter_step_is_numeric() {
    let value: Value = serde_json::from_str(&MpvCommand::CHAPTER_PREV.wire_line(1)).unwrap();
    assert_eq!(value["command"][2], -1);
  }

  #[test]
  fn test_lookup_by_name() {
    assert_eq!(MpvCommand::by_name("pressLeft"), Some(MpvCommand::PRESS_LEFT));
    assert_eq!(MpvCommand::by_name("quit"), None);
  }

  #[test]
  fn test_response_parsing() {
    let json = r#"{"request_id": 7, "error": "success"}"#;
    assert_eq!(
      MpvMessage::parse(json),
      MpvMessage::Response {
        request_id: 7,
        line: json.to_string()
      }
    );

    let response = MpvResponse::parse(json).unwrap();
    assert!(response.is_success());
    assert!(response.data.is_none());
  }

  #[test]
  fn test_event_parsing() {
    let json = r#"{"event": "pause", "data": null}"#;
    match MpvMessage::parse(json) {
      MpvMessage::Event(e) => {
        assert_eq!(e.name, "pause");
        assert_eq!(e.line, json);
      }
      other => panic!("Expected event, got {:?}", other),
    }
  }

  #[test]
  fn test_event_wins_over_request_id() {
    let json = r#"{"event": "property-change", "request_id": 3}"#;
    assert!(matches!(MpvMessage::parse(json), MpvMessage::Event(_)));
  }

  #[test]
  fn test_malformed_lines() {
    for line in [
      "not json",
      r#"{"data": 1}"#,
      r#"{"request_id": -1}"#,
      r#"{"request_id": 4294967296}"#,
      r#"{"request_id": "7"}"#,
      r#"{"event": 5}"#,
    ] {
      assert!(
        matches!(MpvMessage::parse(line), MpvMessage::Malformed(_)),
        "{}",
        line
      );
    }
  }

  #[test]
  fn test_error_response_is_not_success() {
    let response =
      MpvResponse::parse(r#"{"request_id": 2, "error": "property unavailable"}"#).unwrap();
    assert!(!response.is_success());
    assert_eq!(response.request_id, 2);
  }
}
