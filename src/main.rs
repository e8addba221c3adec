use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use chunked_speech::{
    logger, ChannelObserver, OpenAiTranscriptionClient, Outcome, ProgressObserver, SpeechConfig, SpeechSynthesizer,
};

/// Озвучивание текста и распознавание речи через OpenAI API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON файл конфигурации (по умолчанию - переменные окружения)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Озвучить текстовый файл
    Speak(SpeakCommand),

    /// Распознать аудиофайл
    Transcribe(TranscribeCommand),
}

#[derive(Parser, Debug)]
struct SpeakCommand {
    /// Текстовый файл или `-` для stdin
    #[arg(short, long)]
    input: PathBuf,

    /// Путь для сохранения MP3
    #[arg(short, long)]
    output: PathBuf,

    /// Голос TTS
    #[arg(long)]
    voice: Option<String>,

    /// Модель TTS
    #[arg(long)]
    model: Option<String>,

    /// Максимальный размер сегмента в символах
    #[arg(long)]
    max_chars: Option<usize>,

    /// Ограничение одновременных запросов
    #[arg(long)]
    max_concurrent: Option<usize>,
}

#[derive(Parser, Debug)]
struct TranscribeCommand {
    /// Аудиофайл
    #[arg(short, long)]
    input: PathBuf,

    /// Куда сохранить текст (по умолчанию - stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SpeechConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SpeechConfig::from_env()?,
    };

    // Ctrl-C отменяет все запросы текущей операции
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Speak(command) => speak(config, command, &cancel).await,
        Commands::Transcribe(command) => transcribe(config, command, &cancel).await,
    }
}

async fn speak(mut config: SpeechConfig, command: SpeakCommand, cancel: &CancellationToken) -> Result<()> {
    if let Some(voice) = command.voice {
        config.voice = voice;
    }
    if let Some(model) = command.model {
        config.model = model;
    }
    if let Some(max_chars) = command.max_chars {
        config.max_chars = max_chars;
    }
    if command.max_concurrent.is_some() {
        config.max_concurrent_requests = command.max_concurrent;
    }

    let text = read_text(&command.input)?;
    let synthesizer = SpeechSynthesizer::from_config(config)?;

    let (observer, mut progress_rx) = ChannelObserver::new();
    let observer: Arc<dyn ProgressObserver> = Arc::new(observer);
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            info!("Speech generation: {} segments ({:.0}%)", progress, progress.percent());
        }
    });

    let outcome = synthesizer.generate_speech(&text, cancel, Some(observer)).await;
    // Наблюдатель удален вместе с вызовом, канал закрывается
    progress_task.await.ok();

    match outcome {
        Ok(Outcome::Completed(audio)) => {
            tokio::fs::write(&command.output, &audio)
                .await
                .with_context(|| format!("Failed to write {}", command.output.display()))?;
            info!("Saved {} bytes of audio to {}", audio.len(), command.output.display());
            Ok(())
        }
        Ok(Outcome::Cancelled) => {
            warn!("Speech generation cancelled, nothing written");
            Ok(())
        }
        Err(e) => {
            error!("Speech generation failed: {}", e);
            Err(e.into())
        }
    }
}

async fn transcribe(config: SpeechConfig, command: TranscribeCommand, cancel: &CancellationToken) -> Result<()> {
    let client = OpenAiTranscriptionClient::from_config(&config)?;

    match client.transcribe_file(&command.input, cancel).await? {
        Outcome::Completed(transcription) => match &command.output {
            Some(path) => {
                tokio::fs::write(path, &transcription.text)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Saved transcription to {}", path.display());
                Ok(())
            }
            None => {
                println!("{}", transcription.text);
                Ok(())
            }
        },
        Outcome::Cancelled => {
            warn!("Transcription cancelled");
            Ok(())
        }
    }
}

fn read_text(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read text from stdin")?;
        return Ok(text);
    }

    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}
