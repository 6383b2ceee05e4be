use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use framecontrol::{Fps, MediaSource, Player, PlayerConfig, PlayerEvent, SharedPlayer};

const USAGE: &str = "usage: framecontrol <file-or-url> [--fps N] [--source-fps N] [--seconds S] [--png OUT]";

#[derive(Debug)]
struct Args {
    input: String,
    target_fps: Option<u32>,
    source_fps: Option<u32>,
    seconds: f64,
    png: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut input = None;
    let mut target_fps = None;
    let mut source_fps = None;
    let mut seconds = 5.0;
    let mut png = None;

    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().with_context(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--fps" => target_fps = Some(value("--fps")?.parse().context("invalid --fps")?),
            "--source-fps" => {
                source_fps = Some(value("--source-fps")?.parse().context("invalid --source-fps")?);
            }
            "--seconds" => seconds = parse_seconds(&value("--seconds")?)?,
            "--png" => png = Some(PathBuf::from(value("--png")?)),
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ if input.is_none() => input = Some(arg.clone()),
            _ => bail!("unexpected argument '{arg}'\n{USAGE}"),
        }
    }

    let Some(input) = input else {
        bail!("{USAGE}");
    };
    Ok(Args {
        input,
        target_fps,
        source_fps,
        seconds,
        png,
    })
}

fn parse_seconds(value: &str) -> Result<f64> {
    let secs: f64 = value.parse().context("invalid --seconds")?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("--seconds must be a finite, non-negative number, got {value}");
    }
    Ok(secs)
}

fn source_for(input: &str) -> Result<MediaSource> {
    let path = Path::new(input);
    if input.contains("://") || !path.exists() {
        return Ok(MediaSource::locator(input));
    }
    Ok(MediaSource::from_file(path)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = PlayerConfig::load();
    let mut player = Player::with_ffmpeg(config).context("failed to create player")?;
    let events = player.events();

    if let Some(fps) = args.source_fps {
        player.set_source_fps(Fps::new(fps)?);
    }
    if let Some(fps) = args.target_fps {
        player.set_target_fps(fps);
    }
    player.load(source_for(&args.input)?);
    log::info!(
        "Playing '{}' at {} over {} source (speed {:.4})",
        args.input,
        player.params().target_fps,
        player.params().source_fps,
        player.speed()
    );

    let shared: SharedPlayer = Arc::new(Mutex::new(player));
    let mut render = framecontrol::spawn_render_loop(&shared)?;

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds);
    let mut last_logged = Instant::now();
    let mut hinted = false;
    while Instant::now() < deadline {
        let Ok(event) = events.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match event {
            PlayerEvent::TimeUpdate {
                current_time,
                duration,
            } => {
                if last_logged.elapsed() >= Duration::from_secs(1) {
                    log::info!("{current_time:.2}s / {duration:.2}s");
                    last_logged = Instant::now();
                }
            }
            PlayerEvent::SurfaceResized { width, height } => {
                log::info!("Surface sized to {width}x{height}");
            }
            PlayerEvent::LoadFailed { source, reason } => {
                log::error!("{}: {source} ({reason})", framecontrol::player::LOAD_FAILED_MESSAGE);
                break;
            }
            PlayerEvent::StateChanged(state) => {
                log::info!("State: {state:?}");
                if !hinted {
                    if let Ok(p) = shared.lock() {
                        if let Some(fps) = p.suggested_source_fps() {
                            if fps != p.params().source_fps {
                                log::info!("Container reports {fps}; pass --source-fps to calibrate");
                            }
                            hinted = true;
                        }
                    }
                }
            }
        }
    }

    let ticks = render.stop();
    log::info!("Rendered {ticks} ticks");

    if let Some(path) = args.png {
        let p = shared.lock().map_err(|_| anyhow::anyhow!("player lock poisoned"))?;
        p.surface()
            .save_png(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("Saved last frame to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(|a| (*a).to_string()))
    }

    #[test]
    fn parses_flags_and_input() {
        let args = parse(&["clip.mp4", "--fps", "12", "--source-fps", "25", "--seconds", "2.5"]).unwrap();
        assert_eq!(args.input, "clip.mp4");
        assert_eq!(args.target_fps, Some(12));
        assert_eq!(args.source_fps, Some(25));
        assert_eq!(args.seconds, 2.5);
        assert!(args.png.is_none());
    }

    #[test]
    fn rejects_unusable_durations() {
        for bad in ["inf", "NaN", "-1", "soon"] {
            assert!(parse(&["clip.mp4", "--seconds", bad]).is_err(), "{bad}");
        }
        assert_eq!(parse(&["clip.mp4", "--seconds", "0"]).unwrap().seconds, 0.0);
    }

    #[test]
    fn input_is_required_and_unique() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.mp4", "b.mp4"]).is_err());
        assert!(parse(&["a.mp4", "--fps"]).is_err());
    }
}
