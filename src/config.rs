//! Module configuration
//!
//! The configuration record is replaced wholesale on every edit. It can be
//! loaded from a JSON file using the same field names the configuration form
//! uses (`host`, `port`, `prot`, ...).

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 7000;

const HOST_PATTERN: &str = r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$|^(?:(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])\.)*(?:[A-Za-z]|[A-Za-z][A-Za-z0-9-]*[A-Za-z0-9])$";

fn host_regex() -> &'static Regex {
    static HOST_RE: OnceLock<Regex> = OnceLock::new();
    HOST_RE.get_or_init(|| Regex::new(HOST_PATTERN).expect("host pattern is valid"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing host")]
    MissingHost,

    #[error("Invalid host '{0}'")]
    InvalidHost(String),

    #[error("Invalid port {0}, expected 1-65535")]
    InvalidPort(u32),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// How a received TCP response is stored in `tcp_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseConversion {
    /// Raw bytes
    #[default]
    None,
    /// Lowercase hex string
    Hex,
    /// UTF-8 text
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u32,
    #[serde(rename = "prot")]
    pub protocol: Protocol,
    #[serde(rename = "saveresponse")]
    pub save_response: bool,
    #[serde(rename = "convertresponse")]
    pub convert_response: ResponseConversion,
    /// Open a new TCP connection for every send instead of keeping one
    #[serde(rename = "ondemand")]
    pub on_demand: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT as u32,
            protocol: Protocol::Tcp,
            save_response: false,
            convert_response: ResponseConversion::None,
            on_demand: false,
        }
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u32),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl ModuleConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Check host and port. Does not touch the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if !host_regex().is_match(host) {
            return Err(ConfigError::InvalidHost(host.to_string()));
        }
        self.port_u16()?;
        Ok(())
    }

    pub fn port_u16(&self) -> Result<u16, ConfigError> {
        match u16::try_from(self.port) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidPort(self.port)),
        }
    }

    /// Whether the TCP response is captured into `tcp_response`
    pub fn saves_tcp_response(&self) -> bool {
        self.protocol == Protocol::Tcp && self.save_response
    }

    pub fn uses_on_demand(&self) -> bool {
        self.protocol == Protocol::Tcp && self.on_demand
    }
}

/// Kind of input a configuration field is edited with
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    StaticText { value: String },
    Textinput {
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        regex: Option<String>,
    },
    Dropdown {
        default: String,
        choices: Vec<Choice>,
    },
    Checkbox { default: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

impl Choice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One entry of the configuration form
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(skip)]
    visible: Option<fn(&ModuleConfig) -> bool>,
}

impl ConfigField {
    pub fn is_visible(&self, config: &ModuleConfig) -> bool {
        self.visible.map_or(true, |f| f(config))
    }
}

fn is_tcp(config: &ModuleConfig) -> bool {
    config.protocol == Protocol::Tcp
}

const INFO_TEXT: &str = "Generic TCP/UDP sending is a last resort. Devices with a dedicated \
module get ready made actions, presets and feedback; raw commands get none of that.";

/// Describe the configuration form
pub fn config_fields() -> Vec<ConfigField> {
    vec![
        ConfigField {
            id: "info",
            label: "Information",
            width: Some(12),
            kind: FieldKind::StaticText {
                value: INFO_TEXT.to_string(),
            },
            visible: None,
        },
        ConfigField {
            id: "host",
            label: "Target Host name or IP",
            width: Some(8),
            kind: FieldKind::Textinput {
                default: None,
                regex: Some(HOST_PATTERN.to_string()),
            },
            visible: None,
        },
        ConfigField {
            id: "port",
            label: "Target Port",
            width: Some(4),
            kind: FieldKind::Textinput {
                default: Some(DEFAULT_PORT.to_string()),
                regex: Some(r"^\d{1,5}$".to_string()),
            },
            visible: None,
        },
        ConfigField {
            id: "prot",
            label: "Connect with TCP / UDP",
            width: None,
            kind: FieldKind::Dropdown {
                default: Protocol::Tcp.to_string(),
                choices: vec![Choice::new("tcp", "TCP"), Choice::new("udp", "UDP")],
            },
            visible: None,
        },
        ConfigField {
            id: "saveresponse",
            label: "Save TCP Response",
            width: None,
            kind: FieldKind::Checkbox { default: false },
            visible: Some(is_tcp),
        },
        ConfigField {
            id: "convertresponse",
            label: "Convert TCP Response Format",
            width: None,
            kind: FieldKind::Dropdown {
                default: "none".to_string(),
                choices: vec![
                    Choice::new("none", "No conversion"),
                    Choice::new("hex", "To Hex"),
                    Choice::new("string", "To String"),
                ],
            },
            visible: Some(ModuleConfig::saves_tcp_response),
        },
        ConfigField {
            id: "ondemand",
            label: "Connect on demand (new TCP connection per send)",
            width: None,
            kind: FieldKind::Checkbox { default: false },
            visible: Some(is_tcp),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config(host: &str, port: u32) -> ModuleConfig {
        ModuleConfig {
            host: host.to_string(),
            port,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = ModuleConfig::default();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.protocol, Protocol::Tcp);
        assert!(!cfg.save_response);
        assert_eq!(cfg.convert_response, ResponseConversion::None);
    }

    #[test]
    fn test_validate_host() {
        assert!(config("192.168.1.20", 23).validate().is_ok());
        assert!(config("projector", 23).validate().is_ok());
        assert!(config("mixer.stage.local", 23).validate().is_ok());
        assert!(matches!(
            config("", 23).validate(),
            Err(ConfigError::MissingHost)
        ));
        assert!(matches!(
            config("bad host", 23).validate(),
            Err(ConfigError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_validate_port() {
        assert!(matches!(
            config("10.0.0.1", 0).validate(),
            Err(ConfigError::InvalidPort(0))
        ));
        assert!(matches!(
            config("10.0.0.1", 65536).validate(),
            Err(ConfigError::InvalidPort(65536))
        ));
        assert_eq!(config("10.0.0.1", 65535).port_u16().unwrap(), 65535);
    }

    #[test]
    fn test_parse_stored_form() {
        let cfg: ModuleConfig = serde_json::from_str(
            r#"{"host":"10.0.0.9","port":"9993","prot":"tcp","saveresponse":true,"convertresponse":"hex"}"#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9993);
        assert!(cfg.saves_tcp_response());
        assert_eq!(cfg.convert_response, ResponseConversion::Hex);
        assert!(!cfg.on_demand);

        let cfg: ModuleConfig =
            serde_json::from_str(r#"{"host":"10.0.0.9","port":5000,"prot":"udp","saveresponse":true}"#)
                .unwrap();
        assert_eq!(cfg.protocol, Protocol::Udp);
        assert!(!cfg.saves_tcp_response());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"host":"relay","ondemand":true}}"#).unwrap();

        let cfg = ModuleConfig::load(file.path()).unwrap();
        assert_eq!(cfg.host, "relay");
        assert_eq!(cfg.port, 7000);
        assert!(cfg.uses_on_demand());
    }

    #[test]
    fn test_load_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            ModuleConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_field_visibility() {
        let fields = config_fields();
        let convert = fields.iter().find(|f| f.id == "convertresponse").unwrap();

        let mut cfg = config("10.0.0.1", 23);
        assert!(!convert.is_visible(&cfg));
        cfg.save_response = true;
        assert!(convert.is_visible(&cfg));
        cfg.protocol = Protocol::Udp;
        assert!(!convert.is_visible(&cfg));

        let host = fields.iter().find(|f| f.id == "host").unwrap();
        assert!(host.is_visible(&cfg));
    }

    #[test]
    fn test_fields_serialize() {
        let json = serde_json::to_value(config_fields()).unwrap();
        assert_eq!(json[3]["id"], "prot");
        assert_eq!(json[3]["type"], "dropdown");
        assert_eq!(json[4]["type"], "checkbox");
    }
}
