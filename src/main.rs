//! bytecast - send raw byte commands to a device over TCP or UDP
//!
//! Features:
//! - Literal commands with `%hh` escapes, or hex encoded commands
//! - Selectable line terminator
//! - Persistent or on-demand TCP connections, or UDP
//! - Optional capture of the last TCP response

use anyhow::Result;
use bytecast::app::App;
use bytecast::cli::{Args, Command};
use bytecast::network::ErrorContext;
use bytecast::{actions::SendAction, logging, shell};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Describe = args.command {
        println!("{}", App::new(args)?.describe()?);
        return Ok(());
    }

    logging::init_logging(&args)?;

    tracing::info!("Starting bytecast v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Debug mode: {}", args.debug);

    let command = args.command.clone();
    let mut app = App::new(args)?;

    let result = match command {
        Command::Send { text, end } => app.run_once(SendAction::Send { command: text, end }).await,
        Command::SendHex { hex, end } => {
            app.run_once(SendAction::SendHex { command: hex, end }).await
        }
        Command::Shell => shell::run(&mut app.instance).await,
        Command::Describe => Ok(()),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        if let Some(ctx) = e.downcast_ref::<ErrorContext>() {
            eprintln!("{}", ctx);
            std::process::exit(ctx.error.code());
        }
        return Err(e);
    }

    tracing::info!("bytecast shutdown complete");
    Ok(())
}
