//! # Interactive player
//!
//! Search the catalogue and play results on the default audio device.
//!
//! Run with: `cargo run --example player_cli --package core-service --features audio-output`
//!
//! ```text
//! > search moonlight
//! > play 1
//! > seek 90
//! > download 1
//! ```

use anyhow::{bail, Context};
use core_runtime::config::CoreConfigBuilder;
use core_runtime::events::{CoreEvent, PlaybackEvent, RecvError};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::ui::{format_time, Key, KeyInput, ResultRow, SearchView, TransportView};
use core_service::{bootstrap_desktop, CoreService};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  search <query>     find tracks
  play <n>           play result n
  download <n>       save result n to the download directory
  p | space          play / pause
  seek <seconds>     jump to a position
  vol <0-100>        set the volume
  m                  mute / unmute
  status             show the player bar
  ping               check the server
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("warn"),
    )
    .context("failed to initialize logging")?;

    let config = CoreConfigBuilder::from_env()?.build()?;
    println!("Using {}", config.endpoints.base_url);

    let core = bootstrap_desktop(config).await?;
    spawn_event_printer(&core);

    let mut view = core.search_view();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        let outcome = match command {
            "" => Ok(()),
            "quit" | "q" => break,
            "help" | "?" => {
                println!("{HELP}");
                Ok(())
            }
            "search" | "s" => {
                core.search_into(&mut view, arg).await;
                print_results(&view);
                Ok(())
            }
            "play" => play(&core, &view, arg).await,
            "download" | "dl" => download(&core, &view, arg).await,
            "p" | "space" => core
                .handle_key(KeyInput::new(Key::Space))
                .await
                .map(|_| ())
                .map_err(Into::into),
            "m" => {
                core.controller().toggle_mute();
                Ok(())
            }
            "seek" => seek(&core, arg),
            "vol" => volume(&core, arg),
            "status" => {
                print_status(&core);
                Ok(())
            }
            "ping" => core
                .check_health()
                .await
                .map(|()| println!("Server is up"))
                .map_err(Into::into),
            other => {
                println!("unknown command '{other}', type 'help'");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("error: {e:#}");
        }
    }

    core.shutdown();
    Ok(())
}

fn row<'a>(view: &'a SearchView, arg: &str) -> anyhow::Result<&'a ResultRow> {
    let index: usize = arg.parse().context("expected a result number")?;
    match index.checked_sub(1).and_then(|i| view.rows().get(i)) {
        Some(row) => Ok(row),
        None => bail!("no result {index}, search first"),
    }
}

async fn play(core: &CoreService, view: &SearchView, arg: &str) -> anyhow::Result<()> {
    let row = row(view, arg)?;
    match core.play(&row.track).await {
        Ok(outcome) => {
            println!(
                "Playing {} ({:?}, {})",
                row.track.display_name(),
                outcome.source,
                outcome.codec.mime_type()
            );
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn download(core: &CoreService, view: &SearchView, arg: &str) -> anyhow::Result<()> {
    let row = row(view, arg)?;
    let path = core.download(&row.track.id).await?;
    println!("Saved {}", path.display());
    Ok(())
}

fn seek(core: &CoreService, arg: &str) -> anyhow::Result<()> {
    let seconds: f64 = arg.parse().context("expected seconds")?;
    let applied = core.controller().seek(seconds)?;
    println!("At {}", format_time(applied));
    Ok(())
}

fn volume(core: &CoreService, arg: &str) -> anyhow::Result<()> {
    let percent: f32 = arg.parse().context("expected 0-100")?;
    let applied = core.controller().set_volume(percent / 100.0);
    println!("Volume {:.0}%", applied * 100.0);
    Ok(())
}

fn print_results(view: &SearchView) {
    if let Some(text) = view.status_text() {
        println!("{text}");
    }
    for (i, row) in view.rows().iter().enumerate() {
        println!("{:>3}. {}", i + 1, row.track.display_name());
    }
}

fn print_status(core: &CoreService) {
    let bar = TransportView::from(&core.snapshot());
    if !bar.visible {
        println!("Nothing playing");
        return;
    }
    println!(
        "[{:?}] {}  {} / {}  vol {}% {:?}",
        bar.icon,
        bar.title.unwrap_or_default(),
        bar.position_label,
        bar.duration_label,
        bar.volume_percent,
        bar.volume_icon,
    );
    if let Some(error) = bar.error {
        println!("{error}");
    }
}

fn spawn_event_printer(core: &CoreService) {
    let mut events = core
        .events()
        .stream()
        .only(|event| matches!(event, CoreEvent::Playback(_)));
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match event {
                CoreEvent::Playback(PlaybackEvent::Completed { .. }) => println!("Track finished"),
                CoreEvent::Playback(PlaybackEvent::Blocked { .. }) => {
                    println!("Output refused to start, press 'p' to play")
                }
                CoreEvent::Playback(PlaybackEvent::Error { message, .. }) => println!("{message}"),
                _ => {}
            }
        }
    });
}
