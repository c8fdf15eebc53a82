//! Command-line argument parsing for bytecast

use crate::config::{ModuleConfig, Protocol, ResponseConversion};
use crate::network::payload::Terminator;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "bytecast")]
#[command(author = "bytecast Contributors")]
#[command(version)]
#[command(about = "Send raw byte commands to a device over TCP or UDP", long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub debug: bool,

    /// Log file path
    #[arg(short, long, default_value = "bytecast.log")]
    pub log_file: PathBuf,

    /// JSON configuration file (host, port, prot, saveresponse, convertresponse, ondemand)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target host name or IP
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Target port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Transport protocol
    #[arg(short = 'P', long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Save the last TCP response into the tcp_response variable
    #[arg(short = 's', long)]
    pub save_response: bool,

    /// Format used for the saved TCP response
    #[arg(long, value_enum)]
    pub convert_response: Option<ResponseConversion>,

    /// Open a new TCP connection for every send
    #[arg(long)]
    pub on_demand: bool,

    /// How long one-shot commands wait for the connection, in milliseconds
    #[arg(short, long, default_value_t = 5000)]
    pub timeout: u64,

    /// Label the instance variables are published under
    #[arg(long, default_value = "generic")]
    pub label: String,

    /// Preset a variable for substitution, as label:name=value
    #[arg(long = "var", value_name = "LABEL:NAME=VALUE")]
    pub vars: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send a command; use %hh to insert hex codes
    Send {
        text: String,
        #[arg(short, long, value_enum, default_value_t = Terminator::Lf)]
        end: Terminator,
    },
    /// Send a hex encoded command; decoding stops at the first non-hex digit
    SendHex {
        hex: String,
        #[arg(short, long, value_enum, default_value_t = Terminator::None)]
        end: Terminator,
    },
    /// Read commands from stdin and keep the connection open
    Shell,
    /// Print the configuration fields and action definitions as JSON
    Describe,
}

impl Args {
    /// Apply command line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, mut config: ModuleConfig) -> ModuleConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port as u32;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if self.save_response {
            config.save_response = true;
        }
        if let Some(conversion) = self.convert_response {
            config.convert_response = conversion;
        }
        if self.on_demand {
            config.on_demand = true;
        }
        config
    }
}

/// Split `label:name=value`
pub fn parse_var(entry: &str) -> Option<(&str, &str, &str)> {
    let (reference, value) = entry.split_once('=')?;
    let (label, name) = reference.split_once(':')?;
    if label.is_empty() || name.is_empty() {
        return None;
    }
    Some((label, name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let args = Args::parse_from(["bytecast", "-H", "10.0.0.2", "send", "PWR%0D", "--end", "none"]);
        assert_eq!(args.host.as_deref(), Some("10.0.0.2"));
        match args.command {
            Command::Send { text, end } => {
                assert_eq!(text, "PWR%0D");
                assert_eq!(end, Terminator::None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_send_hex_default_end() {
        let args = Args::parse_from(["bytecast", "send-hex", "0a0b"]);
        assert!(matches!(
            args.command,
            Command::SendHex { end: Terminator::None, .. }
        ));
        assert_eq!(args.timeout, 5000);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "bytecast",
            "-p",
            "23",
            "--protocol",
            "udp",
            "--convert-response",
            "hex",
            "shell",
        ]);
        let base = ModuleConfig {
            host: "relay".into(),
            ..Default::default()
        };
        let config = args.apply_overrides(base);
        assert_eq!(config.host, "relay");
        assert_eq!(config.port, 23);
        assert_eq!(config.protocol, Protocol::Udp);
        assert_eq!(config.convert_response, ResponseConversion::Hex);
        assert!(!config.on_demand);
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(parse_var("custom:input=HDMI 1"), Some(("custom", "input", "HDMI 1")));
        assert_eq!(parse_var("custom:a=b=c"), Some(("custom", "a", "b=c")));
        assert_eq!(parse_var("noname=1"), None);
        assert_eq!(parse_var(":x=1"), None);
    }
}
