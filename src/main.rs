use anyhow::{Context, Result};
use clap::Parser;
use micrcam::capture::{FrameSource, ImageFileSource, WebcamSource};
use micrcam::ocr::{CommandGateway, OcrClient, ScanResults};
use micrcam::output::{PngFileSink, StillSink};
use micrcam::still::ToneParameters;
use micrcam::{run_with, PipelineConfig, RunOutcome, Session};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Replay a still image instead of opening a webcam
    #[arg(long)]
    input_image: Option<PathBuf>,

    /// Number of frames to serve from --input-image (forever if omitted)
    #[arg(long)]
    repeat: Option<u32>,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    capture_height: u32,

    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target frames per second (overrides stream.fps)
    #[arg(long)]
    fps: Option<u32>,

    /// Where captured stills are written
    #[arg(short, long, default_value = "check.png")]
    output: PathBuf,

    /// OCR program; receives the PNG on stdin and prints JSON results
    #[arg(long)]
    ocr_command: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Operator console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Brightness(i32),
    Contrast(i32),
    Save,
    Ocr,
    Resume,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = match parts.next()? {
            "b" => Command::Brightness(parts.next()?.parse().ok()?),
            "c" => Command::Contrast(parts.next()?.parse().ok()?),
            "s" => Command::Save,
            "o" => Command::Ocr,
            "r" => Command::Resume,
            "q" => Command::Quit,
            _ => return None,
        };
        parts.next().is_none().then_some(command)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("micrcam starting");

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.stream.fps = fps;
    }
    if let Some(command) = &args.ocr_command {
        config.ocr.command = Some(command.clone());
    }
    config.validate().context("Invalid configuration")?;
    tracing::info!("Target FPS: {}", config.stream.fps);

    let mut source: Box<dyn FrameSource> = match &args.input_image {
        Some(path) => Box::new(
            ImageFileSource::open(path, args.repeat).context("Failed to initialize image source")?,
        ),
        None => Box::new(
            WebcamSource::new(args.input_device, args.capture_width, args.capture_height)
                .context("Failed to initialize webcam capture")?,
        ),
    };

    let (width, height) = source.resolution();
    tracing::info!("Capture: {}x{}", width, height);
    let session = if args.input_image.is_some() {
        Session::for_stills(&config, width, height)
    } else {
        Session::new(&config, width, height)
    };
    let mut session = session.context("Failed to set up capture session")?;

    let mut ocr = match &config.ocr.command {
        Some(command) => {
            let gateway = CommandGateway::from_command_line(command)
                .context("Failed to set up OCR command")?
                .with_timeout(Duration::from_millis(config.ocr.timeout_ms));
            tracing::info!("OCR via `{}` for backends {:?}", command, config.ocr.backends);
            Some(OcrClient::new(gateway, &config.ocr))
        }
        None => {
            tracing::info!("No OCR command configured");
            None
        }
    };

    let mut sink = PngFileSink::new(&args.output);
    let input = spawn_input();
    println!("Streaming. Enter q to stop.");

    loop {
        let outcome = run_with(&mut source, &mut session, config.stream.fps, |session| {
            while let Ok(line) = input.try_recv() {
                match Command::parse(&line) {
                    Some(Command::Quit) => session.stop(),
                    Some(_) => println!("No still held yet; only q works while streaming"),
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {}", line.trim()),
                }
            }
        })?;

        match outcome {
            RunOutcome::Captured(rect) => {
                tracing::info!(
                    "Captured check at ({}, {}) {}x{}",
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height
                );
                save_still(&session, &mut sink)?;
                if !console(&mut session, &mut sink, ocr.as_mut(), &input)? {
                    break;
                }
                session.reset();
            }
            RunOutcome::Paused => session.reset(),
            RunOutcome::Stopped => {
                tracing::info!("Streaming stopped");
                break;
            }
            RunOutcome::Exhausted => {
                tracing::info!("No more frames, exiting");
                break;
            }
        }
    }

    Ok(())
}

/// Operator lines, read on a background thread so the capture loop never
/// blocks on stdin. The channel closes when stdin does.
fn spawn_input() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn save_still(session: &Session, sink: &mut PngFileSink) -> Result<()> {
    match session.held_still() {
        Some(still) => sink.write_still(still.image()),
        None => {
            tracing::warn!("No still held, nothing to save");
            Ok(())
        }
    }
}

/// Interactive loop over a held still. Returns `false` when the user quits.
fn console(
    session: &mut Session,
    sink: &mut PngFileSink,
    mut ocr: Option<&mut OcrClient<CommandGateway>>,
    input: &Receiver<String>,
) -> Result<bool> {
    println!("Check captured. Commands: b <n> brightness, c <n> contrast, s save, o ocr, r resume, q quit");

    let mut tone = session
        .held_still()
        .map(|still| still.tone())
        .unwrap_or_default();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let Ok(line) = input.recv() else {
            return Ok(false);
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Some(Command::Brightness(value)) => {
                tone = ToneParameters::new(value, tone.contrast());
                session.adjust_tone(tone);
                println!("brightness={} contrast={}", tone.brightness(), tone.contrast());
            }
            Some(Command::Contrast(value)) => {
                tone = ToneParameters::new(tone.brightness(), value);
                session.adjust_tone(tone);
                println!("brightness={} contrast={}", tone.brightness(), tone.contrast());
            }
            Some(Command::Save) => save_still(session, sink)?,
            Some(Command::Ocr) => match (ocr.as_deref_mut(), session.held_still()) {
                (Some(client), Some(still)) => print_results(&client.scan_still(still.image())),
                (None, _) => println!("No OCR command configured (use --ocr-command)"),
                (_, None) => println!("No still held"),
            },
            Some(Command::Resume) => return Ok(true),
            Some(Command::Quit) => return Ok(false),
            None => println!("Unknown command: {}", line.trim()),
        }
    }
}

fn print_results(results: &ScanResults) {
    for (backend, details) in results {
        println!("{backend}:");
        println!("  routing number: {}", details.routing_number);
        println!("  account number: {}", details.account_number);
        println!("  check number:   {}", details.check_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_console_commands() {
        assert_eq!(Command::parse("b 20"), Some(Command::Brightness(20)));
        assert_eq!(Command::parse(" c -15 "), Some(Command::Contrast(-15)));
        assert_eq!(Command::parse("s"), Some(Command::Save));
        assert_eq!(Command::parse("o"), Some(Command::Ocr));
        assert_eq!(Command::parse("r"), Some(Command::Resume));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(Command::parse("b"), None);
        assert_eq!(Command::parse("b bright"), None);
        assert_eq!(Command::parse("s now"), None);
        assert_eq!(Command::parse("x"), None);
    }
}
