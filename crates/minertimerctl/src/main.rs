//! minertimerctl - control client for minertimerd
//!
//! ```text
//! minertimerctl status [--json]
//! minertimerctl add-time <15|30|60|minutes>
//! minertimerctl more-time
//! minertimerctl reset
//! minertimerctl simulate-midnight
//! minertimerctl watch
//! minertimerctl ping
//! ```

mod render;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use minertimer_api::{Command, Response, ResponsePayload, ResponseResult};
use minertimer_ipc::IpcClient;
use minertimer_util::default_socket_path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// minertimerctl - Inspect and adjust the daily play-time budget
#[derive(Parser, Debug)]
#[command(name = "minertimerctl", version)]
#[command(about = "Inspect and adjust the minertimerd play-time budget", long_about = None)]
struct Cli {
    /// Socket path for minertimerd (or set MINERTIMER_SOCKET env var)
    #[arg(short, long, env = "MINERTIMER_SOCKET")]
    socket: Option<PathBuf>,

    /// Admin password for privileged commands (or set MINERTIMER_PASSWORD)
    #[arg(short, long, env = "MINERTIMER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Show today's limit, played time and process state
    Status {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Raise today's limit (common amounts: 15, 30, 60)
    AddTime {
        #[arg(value_parser = parse_minutes)]
        minutes: f64,
    },

    /// Raise today's limit by the configured "more time" amount
    MoreTime,

    /// Zero today's played time
    Reset,

    /// Run the midnight rollover now
    SimulateMidnight,

    /// Stream events until interrupted
    Watch,

    /// Check that the daemon is reachable
    Ping,
}

fn parse_minutes(s: &str) -> std::result::Result<f64, String> {
    let minutes: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number of minutes"))?;
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(format!("minutes must be positive, got {s}"));
    }
    Ok(minutes)
}

impl Cli {
    fn password(&self) -> Result<String> {
        self.password
            .clone()
            .context("this command needs --password or MINERTIMER_PASSWORD")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let socket_path = cli.socket.clone().unwrap_or_else(default_socket_path);
    let mut client = IpcClient::connect(&socket_path)
        .await
        .with_context(|| format!("Cannot reach minertimerd at {}", socket_path.display()))?;

    let command = match &cli.command {
        Action::Status { .. } => Command::GetState,
        Action::AddTime { minutes } => Command::AddTime {
            minutes: *minutes,
            password: cli.password()?,
        },
        Action::MoreTime => Command::RequestMoreTime {
            password: cli.password()?,
        },
        Action::Reset => Command::ResetPlayedTime {
            password: cli.password()?,
        },
        Action::SimulateMidnight => Command::SimulateMidnight {
            password: cli.password()?,
        },
        Action::Ping => Command::Ping,
        Action::Watch => {
            let mut events = client.subscribe().await?;
            loop {
                let event = events.next().await?;
                println!("{}", render::event_line(&event));
            }
        }
    };

    let response = client.send(command).await?;
    let payload = into_payload(response)?;

    match (&cli.command, payload) {
        (Action::Status { json: true }, ResponsePayload::State(snapshot)) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        (_, payload) => println!("{}", render::payload(&payload)),
    }

    Ok(())
}

fn into_payload(response: Response) -> Result<ResponsePayload> {
    match response.result {
        ResponseResult::Ok(payload) => Ok(payload),
        ResponseResult::Err(e) => bail!("{:?}: {}", e.code, e.message),
    }
}
