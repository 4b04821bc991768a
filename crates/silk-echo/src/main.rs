//! Demo binary for the Silkroad session runtime.
//!
//! Wires a minimal handler registry to a TCP listener (Responder role) or
//! a TCP dialer (Initiator role), proving out the handshake and dispatch
//! path end to end. This binary is demonstration glue, not a product: it
//! does not know about any real application opcode schema.
//!
//! ```bash
//! # Terminal 1
//! silk-echo listen --bind 127.0.0.1:9000
//!
//! # Terminal 2
//! silk-echo dial --addr 127.0.0.1:9000
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use silk_core::env::SystemEnv;
use silk_core::handshake::HandshakeConfig;
use silk_proto::{Message, Opcode};
use silk_runtime::{Handler, HandlerRegistry, Session, SessionHandle};
use tokio::net::TcpStream;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Silkroad session runtime demo
#[derive(Parser, Debug)]
#[command(name = "silk-echo")]
#[command(about = "Minimal handshake + dispatch demo for the Silkroad session runtime")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Accept one inbound connection and run as the handshake Responder.
    Listen {
        /// Address to bind to.
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        bind: String,
    },
    /// Dial out and run as the handshake Initiator.
    Dial {
        /// Address to connect to.
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        addr: String,
    },
}

/// The opcode the demo's echo handler listens on.
const ECHO_OPCODE: Opcode = 0x2002;

/// Logs and echoes back any message sent to [`ECHO_OPCODE`].
struct EchoHandler;

#[async_trait]
impl Handler<TcpStream> for EchoHandler {
    async fn handle(&self, session: &SessionHandle<TcpStream>, msg: &Message) -> Result<(), String> {
        tracing::info!(opcode = format!("{:#06x}", msg.id()), len = msg.as_data_span().len(), "received");
        let mut reply = Message::new(ECHO_OPCODE);
        reply.write_bytes(msg.as_data_span());
        session.send(&reply).await.map_err(|e| e.to_string())
    }
}

fn registry() -> HandlerRegistry<TcpStream> {
    let mut registry = HandlerRegistry::new();
    registry.register_handler(ECHO_OPCODE, Arc::new(EchoHandler));
    registry
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let env = SystemEnv::new();

    match args.role {
        Role::Listen { bind } => {
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            tracing::info!(%bind, "listening");
            loop {
                let (stream, peer) = listener.accept().await?;
                tracing::info!(%peer, "accepted connection");
                let env = env.clone();
                tokio::spawn(async move {
                    let config = HandshakeConfig::default();
                    match Session::accept(stream, config, &env, registry()).await {
                        Ok(session) => {
                            if let Err(e) = session.run().await {
                                tracing::warn!(error = %e, "session ended with error");
                            }
                        },
                        Err(e) => tracing::warn!(error = %e, "handshake failed"),
                    }
                });
            }
        },
        Role::Dial { addr } => {
            let stream = TcpStream::connect(&addr).await?;
            tracing::info!(%addr, "connected");
            let session = Session::dial(stream, &env, registry()).await?;
            let handle = session.handle();
            let mut hello = Message::new(ECHO_OPCODE);
            hello.write_str("hello from silk-echo");
            handle.send(&hello).await?;
            session.run().await?;
            Ok(())
        },
    }
}
