use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use voice_chat_client::client::parse_tools_schema;
use voice_chat_client::voice::{
    AudioCapture, CaptureDevice, DEFAULT_CADENCE, Recorder, SilenceConfig, SilenceDetector, rms,
};
use voice_chat_client::{
    AudioPayload, ChatClient, Conversation, Message, Settings, SettingsStore, StreamEvent,
};

/// How long to wait for the server to accept a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Voicechat - talk to a remote assistant from the terminal
#[derive(Parser)]
#[command(name = "voicechat", version, about)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "VOICECHAT_SETTINGS")]
    settings: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a recorded audio file
    Ask {
        /// Audio file (wav, mp3, m4a, webm, ogg, flac)
        file: PathBuf,
        /// Reference clip for voice cloning
        #[arg(long)]
        voice_prompt: Option<PathBuf>,
        /// Print the final assistant message as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record from the microphone until silence (or Ctrl-C), then send
    Talk {
        /// Reference clip for voice cloning
        #[arg(long)]
        voice_prompt: Option<PathBuf>,
        /// Print the final assistant message as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Print the settings file location
    Path,
    /// Restore defaults
    Reset,
    /// Change a single setting
    Set {
        key: SettingKey,
        /// New value; pass "" to clear optional settings
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SettingKey {
    ServerUrl,
    SystemPrompt,
    Streaming,
    StreamPath,
    Model,
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,voice_chat_client=info",
        1 => "info,voice_chat_client=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut store = open_settings(cli.settings.as_deref())?;

    match cli.command {
        Command::Ask {
            file,
            voice_prompt,
            json,
        } => {
            let audio = AudioPayload::from_file(&file)?;
            let voice_prompt = load_voice_prompt(voice_prompt.as_deref())?;
            chat_turn(store.settings(), audio, voice_prompt, json).await
        }
        Command::Talk { voice_prompt, json } => {
            let voice_prompt = load_voice_prompt(voice_prompt.as_deref())?;
            let audio = record().await?;
            chat_turn(store.settings(), audio, voice_prompt, json).await
        }
        Command::Settings { action } => settings_command(&mut store, action),
        Command::TestMic { duration } => test_mic(duration).await,
    }
}

fn open_settings(path: Option<&Path>) -> anyhow::Result<SettingsStore> {
    let store = match path {
        Some(path) => SettingsStore::open(path),
        None => SettingsStore::open_default()?,
    };
    tracing::debug!(path = %store.path().display(), "loaded settings");
    Ok(store)
}

fn load_voice_prompt(path: Option<&Path>) -> anyhow::Result<Option<AudioPayload>> {
    Ok(path.map(AudioPayload::from_file).transpose()?)
}

/// Record one utterance from the default microphone
#[allow(clippy::future_not_send)]
async fn record() -> anyhow::Result<AudioPayload> {
    let mut recorder = Recorder::new(AudioCapture::new(), SilenceConfig::default());

    eprintln!("Listening... (stops after a pause, Ctrl-C to send early)");
    let cancel = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let recording = recorder.record_until_silent(DEFAULT_CADENCE, cancel).await?;

    if recording.samples == 0 {
        anyhow::bail!("nothing was recorded");
    }

    eprintln!(
        "Recorded {:.1}s ({})",
        recording.duration().as_secs_f32(),
        recording.stop_reason.label()
    );
    Ok(recording.into_payload())
}

/// Send one voice turn and print the reply as it streams in
async fn chat_turn(
    settings: &Settings,
    audio: AudioPayload,
    voice_prompt: Option<AudioPayload>,
    json: bool,
) -> anyhow::Result<()> {
    let client = ChatClient::with_connect_timeout(CONNECT_TIMEOUT)?;
    let mut conversation = Conversation::new(client);
    let mut stdout = std::io::stdout();

    let reply = conversation
        .send_audio(settings, audio, voice_prompt, |event| {
            if json {
                return;
            }
            match event {
                StreamEvent::TextDelta(text) => {
                    print!("{text}");
                    // Best effort; a closed stdout shows up on the next println
                    stdout.flush().ok();
                }
                StreamEvent::Error(message) => eprintln!("\nerror: {message}"),
                _ => {}
            }
        })
        .await?;

    let message = conversation
        .store()
        .get(reply)
        .ok_or_else(|| anyhow::anyhow!("assistant message {reply} missing from store"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(message)?);
    } else {
        print_summary(message);
    }
    Ok(())
}

fn print_summary(message: &Message) {
    println!();
    for call in &message.tool_calls {
        let id = call.id.as_deref().unwrap_or("-");
        println!("tool call [{id}] {}({})", call.name, call.arguments);
    }
    if let Some(url) = &message.audio_url {
        println!("audio: {url}");
    }
}

fn settings_command(store: &mut SettingsStore, action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(store.settings())?);
            println!("endpoint: {}", store.settings().endpoint());
        }
        SettingsAction::Path => println!("{}", store.path().display()),
        SettingsAction::Reset => {
            store.reset()?;
            println!("Settings reset to defaults");
        }
        SettingsAction::Set { key, value } => {
            set_setting(store, key, value)?;
            println!("Saved {}", store.path().display());
        }
    }
    Ok(())
}

fn set_setting(store: &mut SettingsStore, key: SettingKey, value: String) -> anyhow::Result<()> {
    match key {
        SettingKey::ServerUrl => {
            url::Url::parse(&value)?;
            store.update(|s| s.server_url = value)?;
        }
        SettingKey::SystemPrompt => store.update(|s| s.system_prompt = value)?,
        SettingKey::Streaming => {
            let enabled = parse_switch(&value)?;
            store.update(|s| s.streaming_enabled = enabled)?;
        }
        SettingKey::StreamPath => store.update(|s| s.stream_path = value)?,
        SettingKey::Model => store.update(|s| s.model_id = value)?,
        SettingKey::Tools => {
            parse_tools_schema(&value)?;
            store.update(|s| s.tools_schema = value)?;
        }
    }
    Ok(())
}

fn parse_switch(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => anyhow::bail!("expected on/off, got {other:?}"),
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new();
    capture.acquire()?;

    let mut detector = SilenceDetector::new(SilenceConfig::default());
    let threshold = detector.config().threshold;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("Silence threshold: {threshold:.3} RMS");
    println!("---");

    let tick = Duration::from_secs(1);
    for i in 0..duration {
        tokio::time::sleep(tick).await;

        let samples = capture.drain();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let fired = detector.observe(energy, tick);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        let mark = if fired {
            " <- would stop here"
        } else if energy < threshold {
            " (quiet)"
        } else {
            ""
        };

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]{}",
            i + 1,
            energy,
            peak,
            meter,
            mark
        );

        if fired {
            detector.reset();
        }
    }

    capture.release();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}
