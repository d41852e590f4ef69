mod cli;

use castbridge::{
    config,
    probe::{self, classify_path},
    remote::{self, PlayerCommand},
    stream::{MediaKind, Rotation, SessionServer, StreamDescriptor},
    tools::ToolRegistry,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "castbridge=trace,tower_http=debug".to_string()
        } else {
            "castbridge=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Cast {
            sources,
            rotation,
            subtitle,
            offset,
            no_remote,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_cast(
                sources,
                rotation,
                subtitle,
                offset,
                no_remote,
                cli.config.as_deref(),
            ))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("castbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// How the playlist should move after the current session.
enum Advance {
    Next,
    Prev,
    Quit,
}

/// What a movement request does at the current position.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Tear down the session and play this entry.
    Play(usize),
    /// Keep the current session running untouched.
    Stay,
    /// End playback.
    Quit,
}

fn apply_advance(index: usize, len: usize, advance: Advance) -> Step {
    match advance {
        Advance::Next if index + 1 < len => Step::Play(index + 1),
        Advance::Next => Step::Quit,
        Advance::Prev if index > 0 => Step::Play(index - 1),
        // Backing up past the first entry does nothing rather than restart it.
        Advance::Prev => Step::Stay,
        Advance::Quit => Step::Quit,
    }
}

async fn run_cast(
    sources: Vec<PathBuf>,
    rotation: u32,
    subtitle: Option<PathBuf>,
    offset: f64,
    no_remote: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config.validate()?;
    let eq = config.equalizer.gains()?;
    let rotation = Rotation::from_degrees(rotation)?;

    let registry = ToolRegistry::discover(&config.tools);
    let ffmpeg = registry.require("ffmpeg")?.to_path_buf();
    let ffprobe = registry.require("ffprobe").ok().map(Path::to_path_buf);

    // Drop sources we cannot serve up front so next/prev only ever lands on
    // playable entries.
    let mut playlist: Vec<(PathBuf, MediaKind)> = Vec::new();
    for source in sources {
        match classify_path(&source) {
            Some(kind) if source.exists() => playlist.push((source, kind)),
            Some(_) => tracing::warn!("skipping missing file: {}", source.display()),
            None => tracing::warn!("skipping unsupported file: {}", source.display()),
        }
    }
    if playlist.is_empty() {
        anyhow::bail!("no playable files given");
    }

    let advertise = match &config.server.advertise_host {
        Some(host) => Some(host.parse::<IpAddr>()?),
        None => None,
    };
    let server = SessionServer::new(ffmpeg, advertise);

    let (command_tx, mut command_rx) = mpsc::channel::<PlayerCommand>(16);
    let remote = if no_remote {
        None
    } else {
        Some(remote::start_remote_server(config.server.remote_port, command_tx).await?)
    };
    if let Some(ref remote) = remote {
        println!("Remote control: http://{}/", remote.addr());
    }

    let image_dwell = Duration::from_secs(config.playback.image_display_secs);
    let mut index = 0usize;
    let mut first = true;

    'playlist: loop {
        let (path, entry_kind) = &playlist[index];
        let source = path.to_string_lossy().into_owned();
        let mut kind = *entry_kind;
        let mut codec_hint = None;

        // The extension is only a first guess for containers; an mp4 full of
        // audiobook chapters has no video stream and must play as audio.
        if kind != MediaKind::Image {
            if let Some(ref ffprobe) = ffprobe {
                match probe::probe_media(ffprobe, &source).await {
                    Ok(info) => {
                        kind = probe::refine_kind(kind, &info);
                        codec_hint = info.audio_codec;
                    }
                    Err(e) => tracing::debug!("probe failed, trusting the extension: {e}"),
                }
            }
        }

        let mut descriptor = StreamDescriptor::new(source, kind)
            .with_rotation(rotation)
            .with_audio_codec_hint(codec_hint);
        if first && offset > 0.0 {
            descriptor = descriptor.with_start_offset(offset);
        }
        if kind == MediaKind::Video {
            if let Some(ref sub) = subtitle {
                descriptor = descriptor.with_subtitle(Some(sub.clone()));
            }
        }
        first = false;

        let url = server.start(descriptor, eq).await?;
        println!("[{}/{}] {} -> {}", index + 1, playlist.len(), path.display(), url);

        let auto_advance = kind == MediaKind::Image && config.playback.autoplay;
        loop {
            let advance =
                wait_for_advance(&mut command_rx, auto_advance.then_some(image_dwell)).await;
            match apply_advance(index, playlist.len(), advance) {
                Step::Play(next) => {
                    index = next;
                    break;
                }
                Step::Stay => tracing::debug!("already at the first entry"),
                Step::Quit => break 'playlist,
            }
        }
    }

    server.stop().await;
    if let Some(remote) = remote {
        remote.stop().await;
    }
    tracing::info!("playback finished");
    Ok(())
}

/// Block until something moves the playlist: a remote command, the image
/// dwell timer, or Ctrl-C. Commands the session cannot act on are logged
/// and ignored.
async fn wait_for_advance(
    commands: &mut mpsc::Receiver<PlayerCommand>,
    dwell: Option<Duration>,
) -> Advance {
    let timer = async {
        match dwell {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => return Advance::Next,
            _ = tokio::signal::ctrl_c() => return Advance::Quit,
            command = commands.recv() => match command {
                Some(PlayerCommand::Next) => return Advance::Next,
                Some(PlayerCommand::Prev) => return Advance::Prev,
                Some(other) => tracing::info!(?other, "command has no effect without a receiver session"),
                None => return Advance::Quit,
            },
        }
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let registry = ToolRegistry::discover(&config.tools);
    let ffprobe = registry.require("ffprobe")?;
    let info = probe::probe_media(ffprobe, &file.to_string_lossy()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File: {}", file.display());
        match classify_path(file) {
            Some(kind) => println!("Kind: {kind}"),
            None => println!("Kind: unsupported"),
        }
        if let Some(duration) = info.duration_secs {
            let secs = duration as u64;
            println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
        }
        if let Some(ref codec) = info.video_codec {
            print!("Video: {codec}");
            if let (Some(w), Some(h)) = (info.width, info.height) {
                print!(" {w}x{h}");
            }
            println!();
        }
        if let Some(ref codec) = info.audio_codec {
            println!("Audio: {codec}");
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let registry = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            config.validate()?;
            println!("✓ Configuration is valid");
            println!("  Remote port: {}", config.server.remote_port);
            println!(
                "  Equalizer: low {} / mid {} / high {}",
                config.equalizer.low, config.equalizer.mid, config.equalizer.high
            );
            println!("  Autoplay: {}", config.playback.autoplay);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Remote port: {}", config.server.remote_port);
        }
    }

    Ok(())
}
