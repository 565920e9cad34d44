mod console;
mod voice;

use std::{fs::File, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use singalong_core::{
    load_note_log, AppConfig, GameSession, JsonLinesSink, Layout, Notifier, PlaybackClock, Player,
    Rect, ScoreSheet, SimulatedMedia, SingalongError, Song, TitleState,
};
use tracing_subscriber::EnvFilter;

use crate::{
    console::{ConsoleLyrics, ConsolePitch, ConsoleScore, ConsoleTitle},
    voice::SyntheticVoice,
};

fn main() -> singalong_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Score { song, notes, part } => run_score(&song, &notes, part),
        Commands::Play {
            song,
            part,
            fps,
            video_rate,
            video_gap,
            events,
        } => run_play(
            config,
            PlayOptions {
                song,
                part,
                fps,
                video_rate,
                video_gap,
                events,
            },
        ),
    }
}

fn run_score(song: &PathBuf, notes: &PathBuf, part: usize) -> singalong_core::Result<()> {
    tracing::info!(?song, ?notes, part, "scoring detection log");

    let song = Song::load(song)?;
    let sheet = ScoreSheet::for_part(&song, part)?;
    let log = load_note_log(notes)?;
    if log.windows(2).any(|pair| pair[1].time < pair[0].time) {
        tracing::warn!("detection log is not in time order; late entries may be ignored");
    }

    let score = sheet.score(&log);
    tracing::info!(
        detections = log.len(),
        scored_beats = sheet.total_beats(),
        score,
        "scored"
    );
    println!("{score}");
    Ok(())
}

struct PlayOptions {
    song: PathBuf,
    part: usize,
    fps: u32,
    video_rate: f64,
    video_gap: Option<f64>,
    events: Option<PathBuf>,
}

fn run_play(config: AppConfig, options: PlayOptions) -> singalong_core::Result<()> {
    if options.fps == 0 {
        return Err(SingalongError::InvalidInput("fps must be positive"));
    }
    tracing::info!(song = ?options.song, part = options.part, fps = options.fps, "starting simulated session");

    let mut song = Song::load(&options.song)?;
    if let Some(gap) = options.video_gap {
        song.video_gap_seconds = gap;
    }
    let song = Arc::new(song);
    let part = song.part(options.part)?.clone();
    let end_seconds = part
        .notes()
        .map(|note| song.to_time_ms(note.end()))
        .fold(0.0, f64::max)
        / 1000.0
        + 1.0;

    let mut notifier = Notifier::tracing();
    if let Some(path) = &options.events {
        notifier.add_sink(Arc::new(JsonLinesSink::new(File::create(path)?)));
    }

    let video = song
        .video
        .as_ref()
        .map(|_| SimulatedMedia::new(options.video_rate));
    let mut session = GameSession::new(
        song.clone(),
        PlaybackClock::default(),
        video,
        config.clone(),
        notifier,
    );

    let player = Player::local(&song, options.part, &config.capture)?;
    let capture = player.capture().ok_or("local player has no capture handle")?;
    let index = session.add_player(player);

    let graph = session.graph_mut();
    graph.add_lyrics(Box::new(ConsoleLyrics::new(song.clone(), part.clone())));
    graph.add_notes(index, Box::new(ConsolePitch::new(song.clone())));
    graph.add_score(index, Box::new(ConsoleScore::new(index)));
    session.set_title_overlay(Box::new(ConsoleTitle::new(&song)));
    session.set_layout(Layout {
        lyrics: vec![Rect::new(0.0, 0.8, 1.0, 0.2)],
        notes: vec![Rect::new(0.0, 0.2, 1.0, 0.5)],
        scores: vec![Rect::new(0.8, 0.0, 0.2, 0.1)],
    });

    let frame = Duration::from_secs_f64(1.0 / f64::from(options.fps));
    let mut host = Duration::ZERO;

    session.prepare_video();
    session.media_ready();
    session.show_title();
    while matches!(
        session.title_state(),
        Some(TitleState::Showing | TitleState::Fading { .. })
    ) {
        host += frame;
        session.advance(host);
    }

    let mut voice = SyntheticVoice::new(song.clone(), part, &config.capture);
    session.start();
    while session.audio().time_seconds < end_seconds {
        host += frame;
        let delta = frame.as_secs_f64();
        session.audio_mut().advance(delta);
        if let Some(video) = session.video_mut() {
            video.advance(delta);
        }
        voice.sing_until(session.audio().time_seconds, &capture)?;
        session.advance(host);
    }
    session.stop();

    let scores = session.scores();
    tracing::info!(
        frames = session.frames_rendered(),
        video_enabled = session.video_enabled(),
        ?scores,
        "session finished"
    );
    for (player, score) in scores.iter().enumerate() {
        println!("player {player}: {score}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Karaoke timing and scoring core", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a recorded detection log against one part of a song.
    Score {
        /// Song description in JSON.
        #[arg(long)]
        song: PathBuf,
        /// JSON array of detected notes.
        #[arg(long)]
        notes: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        part: usize,
    },
    /// Run a headless session with a synthesized singer.
    Play {
        /// Song description in JSON.
        #[arg(long)]
        song: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        part: usize,
        /// Simulated display refresh rate.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Playback rate of the simulated video; values away from 1.0 provoke drift.
        #[arg(long, default_value_t = 1.0)]
        video_rate: f64,
        /// Overrides the song's video gap in seconds.
        #[arg(long, allow_hyphen_values = true)]
        video_gap: Option<f64>,
        /// Also write diagnostic events to this file as JSON lines.
        #[arg(long)]
        events: Option<PathBuf>,
    },
}
