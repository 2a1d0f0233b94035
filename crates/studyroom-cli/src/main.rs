//! studyroom CLI: user-facing binary for shared study sessions.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use clap::{Parser, Subcommand};
use studyroom_auth::CredentialIssuer;
use studyroom_daemon::{
    setup, Client, ClientError, ClientEvent, ClientStatus, Config, Relay, RelayEvent,
};
use studyroom_media::LogPlayer;
use studyroom_protocol::{tls, QuicTransport};
use studyroom_replica::{RadioCommand, TimerCommand};
use studyroom_types::{PeerId, StationId, Volume, STATIONS};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "studyroom",
    about = "Shared pomodoro timer and radio for study sessions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a relay that peers join.
    Relay {
        /// Directory holding relay.crt and relay.key. Generated if missing.
        #[arg(long)]
        cert_dir: Option<PathBuf>,

        /// Port to listen on, overriding [relay] port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Join a session and control it from stdin.
    Join {
        /// Session name, overriding [session] name.
        #[arg(short, long)]
        session: Option<String>,

        /// Participant name, overriding [identity] name.
        #[arg(short, long)]
        name: Option<String>,

        /// Relay address (host:port), overriding [session] relay.
        #[arg(short, long)]
        relay: Option<String>,

        /// Pinned relay certificate fingerprint.
        #[arg(long)]
        fingerprint: Option<String>,

        /// Pre-issued join token.
        #[arg(long)]
        token: Option<String>,
    },

    /// Issue a join token with the configured API secret.
    Token {
        /// Session the token is valid for.
        #[arg(short, long)]
        session: String,

        /// Participant the token is issued to.
        #[arg(short, long)]
        name: String,
    },

    /// Generate a TLS certificate for a relay.
    GenerateCert {
        /// Output directory for certificate files.
        #[arg(short, long, default_value = ".")]
        output: String,
    },

    /// Print the effective configuration as TOML.
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = setup::load_config(cli.config.as_deref()).map_err(with_hint)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.daemon.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Relay { cert_dir, port } => {
            if let Some(port) = port {
                config.relay.port = port;
            }
            run_relay(&config, cert_dir.unwrap_or_else(setup::config_dir)).await?;
        }
        Commands::Join {
            session,
            name,
            relay,
            fingerprint,
            token,
        } => {
            if let Some(session) = session {
                config.session.name = session;
            }
            if let Some(name) = name {
                config.identity.name = name;
            }
            if relay.is_some() {
                config.session.relay = relay;
            }
            if fingerprint.is_some() {
                config.session.fingerprint = fingerprint;
            }
            if token.is_some() {
                config.session.token = token;
            }
            run_peer(&config).await?;
        }
        Commands::Token { session, name } => {
            let creds = &config.credentials;
            let issuer = CredentialIssuer::new(
                &creds.api_key,
                &creds.api_secret,
                &creds.endpoint_url,
                Duration::from_secs(creds.token_ttl_secs),
            )
            .map_err(|e| with_hint(e.into()))?;
            let issued = issuer
                .issue_at(&session, &name, SystemTime::now())
                .map_err(|e| with_hint(e.into()))?;

            println!("Relay: {}", issued.endpoint_url);
            println!("Token: {}", issued.token);
        }
        Commands::GenerateCert { output } => {
            let hostname = hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "studyroom".to_string());

            tracing::info!(hostname = %hostname, output = %output, "generating TLS certificate");

            let cert = studyroom_auth::generate_certificate(&hostname)?;

            let cert_path = format!("{output}/relay.crt");
            let key_path = format!("{output}/relay.key");

            std::fs::write(&cert_path, &cert.cert_pem)?;
            std::fs::write(&key_path, &cert.key_pem)?;

            println!("Certificate: {cert_path}");
            println!("Private key: {key_path}");
            println!("Fingerprint: {}", cert.fingerprint);
        }
        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Attach the user-facing hint to an error.
fn with_hint(e: ClientError) -> anyhow::Error {
    anyhow::anyhow!("{e}\nhint: {}", e.hint())
}

async fn run_relay(config: &Config, cert_dir: PathBuf) -> anyhow::Result<()> {
    let (cert_pem, key_pem) = setup::load_or_generate_certs(&cert_dir).map_err(with_hint)?;
    let fingerprint = tls::pem_fingerprint(&cert_pem)?;

    let ip: IpAddr = config.relay.bind.parse()?;
    let transport = QuicTransport::bind(SocketAddr::new(ip, config.relay.port), &cert_pem, &key_pem)?;
    let verifier = setup::token_verifier(config).map_err(with_hint)?;

    let mut relay = Relay::new(transport, verifier);
    println!("Relay listening on {}", relay.local_addr()?);
    println!("Fingerprint: {fingerprint}");

    let shutdown = relay.event_sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(RelayEvent::Shutdown).await;
        }
    });

    relay.run().await.map_err(with_hint)
}

async fn run_peer(config: &Config) -> anyhow::Result<()> {
    let source = setup::credential_source(config).map_err(with_hint)?;
    let session = setup::connect(config, source.as_ref())
        .await
        .map_err(with_hint)?;

    let mut client = Client::new(
        Box::new(session),
        Box::new(LogPlayer::new()),
        config.replication.snapshot_ordering,
    );
    let events = client.event_sender();
    let mut status = client.status_receiver();
    let client_task = tokio::spawn(async move { client.run().await });

    println!("Joined {} as {}. Type `help` for commands.", config.session.name, config.identity.name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: Option<ClientStatus> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match parse_input(&line) {
                    Ok(Some(Input::Event(event))) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Input::Status)) => println!("{}", render(&status.borrow())),
                    Ok(Some(Input::Help)) => print_help(),
                    Ok(Some(Input::Quit)) => break,
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}"),
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if shown.as_ref().map_or(true, |prev| worth_showing(prev, &current)) {
                    println!("{}", render(&current));
                }
                if !current.connected && shown.as_ref().is_some_and(|prev| prev.connected) {
                    eprintln!("disconnected from relay");
                    break;
                }
                shown = Some(current);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = events.send(ClientEvent::Shutdown).await;
    client_task.await?.map_err(with_hint)
}

/// One line of user input.
#[derive(Debug)]
enum Input {
    Event(ClientEvent),
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let input = match verb {
        "start" => Input::Event(ClientEvent::Timer(TimerCommand::Start)),
        "pause" => Input::Event(ClientEvent::Timer(TimerCommand::Pause)),
        "skip" => Input::Event(ClientEvent::Timer(TimerCommand::SkipBreak)),
        "reset" => Input::Event(ClientEvent::Timer(TimerCommand::Reset)),
        "play" => Input::Event(ClientEvent::Radio(RadioCommand::Play)),
        "stop" => Input::Event(ClientEvent::Radio(RadioCommand::Pause)),
        "toggle" => Input::Event(ClientEvent::Radio(RadioCommand::Toggle)),
        "station" => {
            let id = arg.ok_or("usage: station <id>")?;
            let station = id.parse::<StationId>().map_err(|e| e.to_string())?;
            Input::Event(ClientEvent::Radio(RadioCommand::ChangeStation(station)))
        }
        "volume" => {
            let percent = arg.ok_or("usage: volume <0-100>")?;
            let percent: u8 = percent
                .parse()
                .map_err(|_| format!("not a volume: {percent}"))?;
            let volume = Volume::new(percent).map_err(|e| e.to_string())?;
            Input::Event(ClientEvent::Radio(RadioCommand::SetVolume(volume)))
        }
        "dismiss" => Input::Event(ClientEvent::DismissRadioError),
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command `{other}`, type `help`")),
    };
    Ok(Some(input))
}

fn print_help() {
    println!("timer:  start | pause | skip | reset");
    println!("radio:  play | stop | toggle | station <id> | volume <0-100> | dismiss");
    println!("other:  status | help | quit");
    let ids: Vec<&str> = STATIONS.iter().map(|s| s.id.as_str()).collect();
    println!("stations: {}", ids.join(", "));
}

/// Anything but the countdown moving.
fn worth_showing(prev: &ClientStatus, current: &ClientStatus) -> bool {
    prev.connected != current.connected
        || prev.members != current.members
        || prev.leader != current.leader
        || prev.radio != current.radio
        || prev.radio_error != current.radio_error
        || prev.last_rejection != current.last_rejection
        || prev.timer.mode != current.timer.mode
        || prev.timer.phase != current.timer.phase
        || prev.timer.completed_cycles != current.timer.completed_cycles
}

fn render(status: &ClientStatus) -> String {
    let members: Vec<&str> = status.members.iter().map(PeerId::as_str).collect();
    let leader = status.leader.as_ref().map_or("-", PeerId::as_str);
    let mut out = format!(
        "[{}] timer {} | radio {} | leader {leader} | members {}",
        status.self_id,
        status.timer,
        status.radio,
        members.join(", ")
    );
    if let Some(error) = &status.radio_error {
        out.push_str(&format!("\n  radio error: {error} (type `dismiss`)"));
    }
    if let Some(rejection) = &status.last_rejection {
        out.push_str(&format!("\n  refused: {rejection}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timer_and_radio_commands() {
        assert!(matches!(
            parse_input("start"),
            Ok(Some(Input::Event(ClientEvent::Timer(TimerCommand::Start))))
        ));
        assert!(matches!(
            parse_input("  stop  "),
            Ok(Some(Input::Event(ClientEvent::Radio(RadioCommand::Pause))))
        ));
        assert!(matches!(
            parse_input("station smooth-jazz"),
            Ok(Some(Input::Event(ClientEvent::Radio(RadioCommand::ChangeStation(
                StationId::SmoothJazz
            )))))
        ));
        assert!(matches!(
            parse_input("volume 40"),
            Ok(Some(Input::Event(ClientEvent::Radio(RadioCommand::SetVolume(v))))) if v.percent() == 40
        ));
        assert!(matches!(parse_input(""), Ok(None)));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_input("station").is_err());
        assert!(parse_input("station polka").is_err());
        assert!(parse_input("volume 101").is_err());
        assert!(parse_input("volume loud").is_err());
        assert!(parse_input("dance").is_err());
    }
}
