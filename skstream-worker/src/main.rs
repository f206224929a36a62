use std::time::Duration;

use clap::Parser;
use miette::IntoDiagnostic;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use skstream_core::mode::PlaybackOptions;
use skstream_core::settings::SettingsOptions;
use skstream_worker::{
    Cli, Command, HttpTrackSource, OpenOptions, Outbound, Worker, WorkerError, WsTransport,
};

/// Open command built from the command line, if a URL was given
fn startup_open(args: &Cli) -> Option<Command> {
    let url = args.url.clone()?;
    Some(Command::Open(OpenOptions {
        url,
        subscribe: Some(args.subscribe.clone()),
        token: args.token.clone(),
        playback_options: args.playback.then(|| PlaybackOptions {
            start_time: args.start_time.clone(),
            playback_rate: args.playback_rate,
            subscribe: Some(args.subscribe.clone()),
        }),
        settings: SettingsOptions {
            interval: Some(args.interval),
            playback: Some(args.playback),
            ..Default::default()
        },
    }))
}

/// Read newline-delimited JSON commands from stdin
async fn read_commands(
    subsys: SubsystemHandle,
    commands: mpsc::Sender<Command>,
    outbound: mpsc::Sender<Outbound>,
) -> Result<(), WorkerError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::info!("Stdin: end of input");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Command::parse(line) {
                    Ok(command) => commands
                        .send(command)
                        .await
                        .map_err(|_| WorkerError::ChannelClosed)?,
                    Err(e) => {
                        log::warn!("Stdin: bad command: {}", e);
                        outbound
                            .send(Outbound::Error {
                                result: e.to_string(),
                                playback: false,
                            })
                            .await
                            .map_err(|_| WorkerError::ChannelClosed)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Write outbound messages to stdout, one JSON object per line
async fn write_outbound(
    subsys: SubsystemHandle,
    mut outbound: mpsc::Receiver<Outbound>,
) -> Result<(), WorkerError> {
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => break,
            message = outbound.recv() => {
                let Some(message) = message else {
                    break;
                };
                let mut line = serde_json::to_string(&message)?;
                line.push('\n');
                stdout.write_all(line.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let (command_tx, command_rx) = mpsc::channel(32);
    let (outbound_tx, outbound_rx) = mpsc::channel(64);

    if let Some(open) = startup_open(&args) {
        command_tx.send(open).await.into_diagnostic()?;
    }

    let worker = Worker::new(
        WsTransport::new(),
        HttpTrackSource::new(),
        command_rx,
        outbound_tx.clone(),
    );
    let no_stdin = args.no_stdin;

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("Worker", |subsys| async move {
            let result = worker.run(subsys.on_shutdown_requested()).await;
            subsys.request_shutdown();
            result
        }));
        s.start(SubsystemBuilder::new("stdout", |subsys| {
            write_outbound(subsys, outbound_rx)
        }));
        if no_stdin {
            s.start(SubsystemBuilder::new("stdin", |subsys| async move {
                // holds the command channel open until shutdown
                let _commands = command_tx;
                subsys.on_shutdown_requested().await;
                Ok::<(), WorkerError>(())
            }));
        } else {
            s.start(SubsystemBuilder::new("stdin", |subsys| {
                read_commands(subsys, command_tx, outbound_tx)
            }));
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .into_diagnostic()
}
