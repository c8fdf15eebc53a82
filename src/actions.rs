//! User actions: "Send Command" and "Send HEX encoded Command"

use crate::config::Choice;
use crate::network::payload::{self, Terminator};
use serde::Serialize;

/// An action invoked by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendAction {
    /// Literal text with `%hh` escapes
    Send { command: String, end: Terminator },
    /// Hex digit string
    SendHex { command: String, end: Terminator },
}

impl SendAction {
    pub fn send(command: impl Into<String>) -> Self {
        SendAction::Send {
            command: command.into(),
            end: Terminator::Lf,
        }
    }

    pub fn send_hex(command: impl Into<String>) -> Self {
        SendAction::SendHex {
            command: command.into(),
            end: Terminator::None,
        }
    }

    pub fn with_end(self, end: Terminator) -> Self {
        match self {
            SendAction::Send { command, .. } => SendAction::Send { command, end },
            SendAction::SendHex { command, .. } => SendAction::SendHex { command, end },
        }
    }

    pub fn command(&self) -> &str {
        match self {
            SendAction::Send { command, .. } | SendAction::SendHex { command, .. } => command,
        }
    }

    /// Build the wire bytes from already substituted command text
    pub fn build(&self, command: &str) -> Option<Vec<u8>> {
        match self {
            SendAction::Send { end, .. } => payload::build_literal(command, *end),
            SendAction::SendHex { end, .. } => payload::build_hex(command, *end),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionOption {
    Textinput {
        id: &'static str,
        label: &'static str,
        tooltip: &'static str,
        default: &'static str,
        #[serde(rename = "useVariables")]
        use_variables: bool,
    },
    Dropdown {
        id: &'static str,
        label: &'static str,
        default: String,
        choices: Vec<Choice>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub options: Vec<ActionOption>,
}

/// Terminator choices offered in the action forms
pub fn terminator_choices() -> Vec<Choice> {
    Terminator::all()
        .iter()
        .map(|t| Choice::new(t.name(), t.label()))
        .collect()
}

fn end_option(default: Terminator) -> ActionOption {
    ActionOption::Dropdown {
        id: "id_end",
        label: "Command End Character:",
        default: default.name().to_string(),
        choices: terminator_choices(),
    }
}

pub fn action_definitions() -> Vec<ActionDefinition> {
    vec![
        ActionDefinition {
            id: "send",
            name: "Send Command",
            options: vec![
                ActionOption::Textinput {
                    id: "id_send",
                    label: "Command:",
                    tooltip: "Use %hh to insert Hex codes",
                    default: "",
                    use_variables: true,
                },
                end_option(Terminator::Lf),
            ],
        },
        ActionDefinition {
            id: "send_hex",
            name: "Send HEX encoded Command",
            options: vec![
                ActionOption::Textinput {
                    id: "id_send_hex",
                    label: "Command:",
                    tooltip: "Decoding stops at first non-valid hex digit",
                    default: "",
                    use_variables: true,
                },
                end_option(Terminator::None),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_terminators() {
        assert_eq!(
            SendAction::send("x"),
            SendAction::Send {
                command: "x".into(),
                end: Terminator::Lf
            }
        );
        assert_eq!(
            SendAction::send_hex("00"),
            SendAction::SendHex {
                command: "00".into(),
                end: Terminator::None
            }
        );
    }

    #[test]
    fn test_build_dispatches_on_mode() {
        let action = SendAction::send("%41").with_end(Terminator::Cr);
        assert_eq!(action.build("%41"), Some(vec![0x41, b'\r']));

        let action = SendAction::send_hex("41").with_end(Terminator::CrLf);
        assert_eq!(action.build("41"), Some(vec![0x41, b'\r', b'\n']));
        assert_eq!(action.build(""), None);
    }

    #[test]
    fn test_definitions_serialize() {
        let json = serde_json::to_value(action_definitions()).unwrap();
        assert_eq!(json[0]["id"], "send");
        assert_eq!(json[0]["options"][1]["default"], "lf");
        assert_eq!(json[1]["options"][1]["default"], "none");
        assert_eq!(json[1]["options"][1]["choices"].as_array().unwrap().len(), 6);
    }
}
