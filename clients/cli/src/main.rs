//! SecureChat CLI
//!
//! Drives SecureChat sessions from the command line: generate identities,
//! inspect the effective configuration and run a two-party conversation
//! through the JSON API.

use clap::{Parser, Subcommand};
use console::{style, Emoji};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use securechat_core::Identity;
use securechat_protocol::prelude::*;

mod config;

static KEY: Emoji<'_, '_> = Emoji("🔑 ", "[KEY] ");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
static SEND: Emoji<'_, '_> = Emoji("📤 ", "[SEND] ");
static RECV: Emoji<'_, '_> = Emoji("📥 ", "[RECV] ");

/// SecureChat CLI - end-to-end encrypted sessions
#[derive(Parser)]
#[command(name = "securechat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh identity and print its public key
    Identity {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config path
        #[arg(short, long)]
        write: bool,
    },

    /// Run a conversation between two local parties
    Demo {
        /// Messages per direction
        #[arg(short, long, default_value = "3")]
        messages: usize,

        /// Deliver each batch in reverse order
        #[arg(long)]
        out_of_order: bool,

        /// Print every wire message as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = config::load(cli.config.as_deref())?;

    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    config.validate()?;

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if cli.log_json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    match cli.command {
        Commands::Identity { json } => show_identity(json)?,
        Commands::Config { write } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            show_config(&config, write.then_some(path))?;
        }
        Commands::Demo {
            messages,
            out_of_order,
            json,
        } => run_demo(config, messages, out_of_order, json)?,
    }

    Ok(())
}

fn show_identity(json: bool) -> anyhow::Result<()> {
    let identity = Identity::generate();
    let public_key = identity.public_key();
    let fingerprint = identity.fingerprint();

    if json {
        let response = IdentityResponse {
            public_key: public_key.to_base64(),
            fingerprint: fingerprint.to_base64(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{} Identity generated", KEY);
    println!();
    println!("  Public key:  {}", style(public_key.to_base64()).cyan());
    println!("  Fingerprint: {}", style(fingerprint.to_display()).yellow());
    println!();
    println!(
        "{}",
        style("The private key is discarded when this command exits.").dim()
    );

    Ok(())
}

fn show_config(config: &ServiceConfig, write_to: Option<PathBuf>) -> anyhow::Result<()> {
    print!("{}", config::render(config)?);

    if let Some(path) = write_to {
        config.save(&path)?;
        println!();
        println!("{} Written to {}", CHECK, path.display());
    }

    Ok(())
}

fn run_demo(
    config: ServiceConfig,
    messages: usize,
    out_of_order: bool,
    json: bool,
) -> anyhow::Result<()> {
    let alice = ChatService::new(config.clone())?;
    let bob = ChatService::new(config)?;
    let alice_key = alice.get_identity().public_key;
    let bob_key = bob.get_identity().public_key;

    println!("{} Alice: {}", KEY, style(&alice_key).cyan());
    println!("{} Bob:   {}", KEY, style(&bob_key).cyan());
    println!();

    let initiated = alice.context().initiate_handshake(&HandshakeRequest {
        partner_key: bob_key.clone(),
        ephemeral_key: None,
    })?;
    let returned = bob.context().return_handshake(&HandshakeRequest {
        partner_key: alice_key.clone(),
        ephemeral_key: initiated.ephemeral_key,
    })?;
    let finalized = alice.context().finalize_handshake(&HandshakeRequest {
        partner_key: bob_key.clone(),
        ephemeral_key: returned.ephemeral_key,
    })?;

    match (&returned.check_value, &finalized.check_value) {
        (Some(bob_check), Some(alice_check)) if bob_check == alice_check => {
            println!("{} Handshake check values match: {}", CHECK, style(bob_check).yellow());
        }
        _ => {
            println!("{} Handshake check values differ", CROSS);
            anyhow::bail!("handshake check mismatch");
        }
    }
    println!();

    let parties = [("Alice", &alice, &bob_key), ("Bob", &bob, &alice_key)];
    for round in 0..2 {
        for (index, (name, from, to_key)) in parties.iter().enumerate() {
            let (peer_name, peer, _) = parties[1 - index];

            let mut batch = Vec::with_capacity(messages);
            for i in 0..messages {
                let text = format!("{} #{}.{}", name, round, i);
                let response = from.context().send(&MessageRequest {
                    partner_key: to_key.to_string(),
                    plaintext: text.clone(),
                })?;
                println!(
                    "{} {} -> {}: {} (counter {})",
                    SEND,
                    name,
                    peer_name,
                    text,
                    response.message.counter
                );
                if json {
                    println!("{}", serde_json::to_string(&response.message)?);
                }
                batch.push(response.message);
            }

            if out_of_order {
                batch.reverse();
            }

            for message in batch {
                let counter = message.counter;
                let response = peer.context().receive(&ReceiveMessageRequest { message })?;
                println!(
                    "{} {} got: {} (counter {})",
                    RECV,
                    peer_name,
                    style(response.plaintext.unwrap_or_default()).green(),
                    counter
                );
            }
        }
    }

    for (name, service) in [("Alice", &alice), ("Bob", &bob)] {
        for partner in service.context().partners() {
            debug!("{} has session with {} ({})", name, partner.name, partner.fingerprint);
        }
    }

    alice.context().end_session(&bob_key)?;
    bob.context().end_session(&alice_key)?;
    println!();
    println!("{} Sessions ended", CHECK);

    Ok(())
}
