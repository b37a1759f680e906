use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dockstream::DockerClient;
use dockstream::client::{Filters, LogStream};
use dockstream::config;

#[derive(Parser)]
#[command(name = "dockstream", version, about = "Query a container engine and follow its streams")]
struct Cli {
    /// Engine address, e.g. unix:///var/run/docker.sock or tcp://host:2375.
    #[arg(long, env = "DOCKER_HOST", global = true)]
    host: Option<String>,

    /// Directory holding `.dockstream.yaml`. Defaults to the current directory.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Engine-wide information.
    Info,
    /// Engine version.
    Version,
    /// List volumes.
    Volumes {
        /// Filter as key=value; repeatable.
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,
    },
    /// List containers.
    Containers {
        #[arg(long, short = 'a')]
        all: bool,
    },
    /// List images.
    Images {
        #[arg(long, short = 'a')]
        all: bool,
    },
    /// Print a container's logs.
    Logs {
        id: String,
        #[arg(long, short = 'f')]
        follow: bool,
        /// The container runs with a TTY, so output is not multiplexed.
        #[arg(long, short = 't')]
        tty: bool,
    },
    /// Stream engine events until interrupted.
    Events {
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let dir = match cli.config_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let mut cfg = config::load(&dir)?;
    if let Some(host) = cli.host {
        cfg.docker_host = host;
    }
    let client = DockerClient::from_config(&cfg)
        .with_context(|| format!("invalid engine address {:?}", cfg.docker_host))?;

    match cli.command {
        Command::Info => print_json(&client.info()?),
        Command::Version => print_json(&client.version()?),
        Command::Volumes { filters } => {
            let volumes = client.volume().list().filters(parse_filters(&filters)?).all()?;
            for v in volumes {
                println!("{:<12} {}", v.driver, v.name);
            }
            Ok(())
        }
        Command::Containers { all } => {
            for c in client.container().list(all)? {
                let id: String = c.id.chars().take(12).collect();
                println!("{id}  {:<30} {:<12} {}", c.image, c.state, c.names.join(","));
            }
            Ok(())
        }
        Command::Images { all } => {
            for image in client.image().list(all)? {
                let tags = image.repo_tags.unwrap_or_default();
                println!("{:<72} {}", image.id, tags.join(","));
            }
            Ok(())
        }
        Command::Logs { id, follow, tty } => {
            let logs = client.container().logs(&id).follow(follow);
            let (tx, rx) = mpsc::channel();
            let tx_done = tx.clone();
            let on_finish = move |ok| {
                let _ = tx_done.send(Output::Done(ok));
            };
            if tty {
                logs.stream(
                    move |chunk| {
                        let _ = tx.send(Output::Stdout(chunk));
                    },
                    on_finish,
                )?;
            } else {
                logs.frames(
                    move |frame| {
                        let out = match frame.stream {
                            LogStream::Stderr => Output::Stderr(frame.data),
                            LogStream::Stdout | LogStream::Stdin => Output::Stdout(frame.data),
                        };
                        let _ = tx.send(out);
                    },
                    on_finish,
                )?;
            }
            drain(rx)
        }
        Command::Events { filters } => {
            let mut events = client.events();
            for (key, value) in split_filters(&filters)? {
                events = events.filter(key, value);
            }
            let (tx, rx) = mpsc::channel();
            let tx_done = tx.clone();
            events.watch(
                move |ev| {
                    let line = format!("{} {} {}\n", ev.kind, ev.action, ev.actor.id);
                    let _ = tx.send(Output::Stdout(line.into_bytes()));
                },
                move |ok| {
                    let _ = tx_done.send(Output::Done(ok));
                },
            )?;
            drain(rx)
        }
    }
}

/// What a streaming command hands back to the main thread.
enum Output {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Done(bool),
}

fn drain(rx: mpsc::Receiver<Output>) -> Result<()> {
    for out in rx {
        match out {
            Output::Stdout(bytes) => std::io::stdout().write_all(&bytes)?,
            Output::Stderr(bytes) => std::io::stderr().write_all(&bytes)?,
            Output::Done(true) => return Ok(()),
            Output::Done(false) => bail!("stream ended with an error"),
        }
    }
    Ok(())
}

fn split_filters(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|f| {
            f.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("filter {f:?} is not key=value"))
        })
        .collect()
}

fn parse_filters(raw: &[String]) -> Result<Filters> {
    let mut filters = Filters::new();
    for (key, value) in split_filters(raw)? {
        filters.add(key, value);
    }
    Ok(filters)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
