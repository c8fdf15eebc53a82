//! Interactive shell
//!
//! Reads commands from stdin while transport events are applied as they
//! arrive. Both sources feed a single loop, so the instance is only ever
//! touched from one task.

use crate::actions::SendAction;
use crate::app::display_value;
use crate::instance::{Instance, SendOutcome};
use crate::network::payload::Terminator;
use crate::network::TransportEvent;
use crate::variables::VariableValue;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
commands:
  send <text>          send literal text (%hh inserts a byte)
  hex <digits>         send hex encoded bytes
  end <terminator>     none | lf | crlf | cr | nul | lfcr
  status               show connection status
  get <label:name>     show a variable
  set <label:name> <value>
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Send(String),
    Hex(String),
    End(Terminator),
    Status,
    Get(String),
    Set { reference: String, value: String },
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.trim_start().split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (line.trim(), ""),
    };

    let command = match word {
        "send" => ShellCommand::Send(rest.to_string()),
        "hex" => ShellCommand::Hex(rest.trim().to_string()),
        "end" => ShellCommand::End(rest.trim().parse()?),
        "status" => ShellCommand::Status,
        "get" if !rest.trim().is_empty() => ShellCommand::Get(rest.trim().to_string()),
        "set" => match rest.trim_start().split_once(' ') {
            Some((reference, value)) if reference.contains(':') => ShellCommand::Set {
                reference: reference.to_string(),
                value: value.to_string(),
            },
            _ => return Err("usage: set <label:name> <value>".to_string()),
        },
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

/// Spawn a task forwarding stdin lines; the channel closes on EOF
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run(instance: &mut Instance) -> Result<()> {
    instance.start();
    let config = instance.config();
    println!(
        "{} -> {}:{} ({})",
        instance.label(),
        config.host,
        config.port,
        config.protocol
    );
    println!("status: {}", instance.status());

    let mut lines = spawn_line_reader();
    let mut literal_end = Terminator::Lf;
    let mut hex_end = Terminator::None;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let command = match parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match command {
                    ShellCommand::Quit => break,
                    ShellCommand::Help => println!("{}", HELP),
                    ShellCommand::Status => println!("status: {}", instance.status()),
                    ShellCommand::End(end) => {
                        literal_end = end;
                        hex_end = end;
                        println!("terminator: {}", end);
                    }
                    ShellCommand::Get(reference) => match instance.variables().get_ref(&reference) {
                        Some(value) => println!("{} = {}", reference, display_value(value)),
                        None => println!("{} is not set", reference),
                    },
                    ShellCommand::Set { reference, value } => {
                        if let Some((label, name)) = reference.split_once(':') {
                            instance.variables_mut().set(label, name, VariableValue::Text(value));
                        }
                    }
                    ShellCommand::Send(text) => {
                        report(instance.run_action(&SendAction::Send { command: text, end: literal_end }));
                    }
                    ShellCommand::Hex(digits) => {
                        report(instance.run_action(&SendAction::SendHex { command: digits, end: hex_end }));
                    }
                }
            }
            Some(event) = instance.next_event() => {
                let previous = instance.status().clone();
                if let TransportEvent::Data(data) = &event {
                    println!("<- {} bytes", data.len());
                }
                instance.handle_event(event);
                if instance.status() != &previous {
                    println!("status: {}", instance.status());
                }
            }
        }
    }

    instance.shutdown().await;
    Ok(())
}

fn report(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Sent(len) => println!("-> {} bytes", len),
        SendOutcome::Empty => println!("nothing to send"),
        SendOutcome::Dropped => println!("not connected, dropped"),
        SendOutcome::Pending(pending) => println!("-> on-demand send to {}", pending.target()),
    }
}
