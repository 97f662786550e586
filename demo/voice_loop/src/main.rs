mod config;
use config::AudioSettings;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::signal;
use tracing::{error, info};
use voxloop_audio::{LineRecognizer, LocalVoice, MicRecognizer};
use voxloop_core::telemetry::{init_tracing, DEFAULT_FILTER};
use voxloop_core::{ConfigFile, SpeechRecognizer, SpeechSynthesizer, Synthesizer, VoiceLoop};

/// How long shutdown waits on blocking work (a pending stdin read, a mic turn) before leaving it behind.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Listen, send what you said to the speech synthesis service, save the audio, say it back.
#[derive(Parser, Debug)]
#[command(name = "voice_loop", version, about)]
struct Cli {
    /// Synthesize this text once and exit instead of listening
    text: Option<String>,

    /// Config file (default: $VOXLOOP_CONFIG, then ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where the synthesized audio is written (overwritten every turn)
    #[arg(short, long, default_value = voxloop_core::sink::DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Read phrases from stdin instead of the microphone
    #[arg(long)]
    typed: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(DEFAULT_FILTER);

    let rt = runtime()?;
    let res = rt.block_on(run(cli));
    shutdown(rt);
    res
}

fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Dropping a runtime waits for every blocking task; a stdin read never finishes on its own.
fn shutdown(rt: Runtime) {
    rt.shutdown_timeout(SHUTDOWN_GRACE);
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ConfigFile::resolve_path(cli.config.as_deref());
    let file = ConfigFile::load(&config_path);

    // Required settings are checked up front; a bad config never reaches the loop.
    let synthesizer = Synthesizer::from_config(&file, &cli.output)?;
    info!(
        target = "voice_loop",
        config = %config_path.display(),
        server = %file.api()?.server_address,
        output = %cli.output.display(),
        "Configuration loaded"
    );

    if let Some(text) = cli.text {
        single_shot(&synthesizer, &text).await?;
        return Ok(());
    }

    let audio = AudioSettings::from_config(&file)?;
    let voice = LocalVoice::new(audio.voice);
    if cli.typed {
        info!(target = "voice_loop", "Typed mode: one phrase per line, Ctrl+D or Ctrl+C to quit");
        run_loop(LineRecognizer::stdin(), voice, synthesizer).await;
    } else {
        info!(target = "voice_loop", "Listening on the microphone, Ctrl+C to quit");
        run_loop(MicRecognizer::new(audio.recognizer), voice, synthesizer).await;
    }
    Ok(())
}

/// One synthesis for `TEXT`; the error becomes the process exit status.
async fn single_shot<S: SpeechSynthesizer>(synthesizer: &S, text: &str) -> voxloop_core::Result<()> {
    let out = synthesizer.synthesize(text).await.map_err(|e| {
        error!(target = "voice_loop", error = %e, "Synthesis failed");
        e
    })?;
    info!(
        target = "voice_loop",
        bytes = out.audio.len(),
        request_id = %out.request_id,
        "Done"
    );
    Ok(())
}

async fn run_loop<R: SpeechRecognizer>(recognizer: R, voice: LocalVoice, synthesizer: Synthesizer) {
    let mut voice_loop = VoiceLoop::new(recognizer, voice, synthesizer);
    tokio::select! {
        turns = voice_loop.run() => {
            info!(target = "voice_loop", turns, "Input closed, exiting");
        }
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!(target = "voice_loop", error = %e, "Failed to listen for Ctrl+C");
            }
            info!(target = "voice_loop", "Shutting down...");
        }
    }
}
