mod config;
mod console;

use crate::config::{Backend, Config};
use crate::console::ConsoleSynthesisEngine;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;
use viva_core::feedback::{
    generate_feedback, FeedbackBackend, FeedbackReport, GeminiAnalyzer, RelayAnalyzer,
};
use viva_core::gateway::{RelayGateway, ResponseGateway};
use viva_core::gemini::{GeminiClient, GeminiGateway};
use viva_core::speech::{CancelHandle, SpeechOutput};
use viva_core::{
    Command, JobInterviewConfig, SessionConfig, SessionController, SubjectiveVivaConfig,
    TurnOutcome, UserProfile,
};

#[derive(Parser)]
#[command(name = "viva", about = "Mock interviews and viva voce practice in the terminal")]
struct Cli {
    /// Speak assistant turns aloud
    #[arg(long)]
    voice: bool,
    /// Percent-encoded JSON session configuration handed off from another
    /// surface; takes precedence over the subcommand
    #[arg(long)]
    handoff: Option<String>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a mock job interview
    Job {
        /// Position being interviewed for
        job_title: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        skills: String,
        #[arg(long, default_value = "mid-level")]
        level: String,
        /// "technical", "behavioral" or "mixed"
        #[arg(long, default_value = "mixed")]
        interview_type: String,
        #[arg(long)]
        notes: Option<String>,
        /// Name the interviewer should address you by
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a subjective viva voce examination
    Viva {
        subject: String,
        topic: String,
        #[arg(long, default_value = "undergraduate")]
        level: String,
        #[arg(long)]
        notes: Option<String>,
        /// Name the examiner should address you by
        #[arg(long)]
        name: Option<String>,
    },
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    if let Some(encoded) = &cli.handoff {
        return SessionConfig::from_handoff(encoded).context("Failed to decode --handoff payload");
    }
    let profile = |name: &Option<String>| {
        name.as_ref().map(|n| UserProfile {
            name: n.clone(),
            gender: String::new(),
        })
    };
    match &cli.mode {
        Some(Mode::Job {
            job_title,
            company,
            description,
            skills,
            level,
            interview_type,
            notes,
            name,
        }) => Ok(SessionConfig::Job(JobInterviewConfig {
            job_title: job_title.clone(),
            company: company.clone(),
            job_description: description.clone(),
            required_skills: skills.clone(),
            experience_level: level.clone(),
            interview_type: interview_type.clone(),
            additional_notes: notes.clone(),
            user_profile: profile(name),
        })),
        Some(Mode::Viva {
            subject,
            topic,
            level,
            notes,
            name,
        }) => Ok(SessionConfig::Viva(SubjectiveVivaConfig {
            subject: subject.clone(),
            topic: topic.clone(),
            subject_level: level.clone(),
            additional_notes: notes.clone(),
            has_project_document: false,
            file_details: None,
            user_profile: profile(name),
        })),
        None => anyhow::bail!("Provide a subcommand (job or viva) or a --handoff payload"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    let session_config = session_config(&args)?;

    if config.backend == Backend::Gemini && config.google_api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY is not set; the session will run on scripted fallbacks");
    }

    // --- 4. Initialize Backends ---
    let gateway: Box<dyn ResponseGateway> = match &config.backend {
        Backend::Gemini => Box::new(GeminiGateway::new(GeminiClient::new(
            config.google_api_key.clone(),
            config.chat_model.clone(),
        ))),
        Backend::Relay => Box::new(RelayGateway::new(
            config.relay_url.clone().unwrap_or_default(),
        )),
    };
    let analyzer: Box<dyn FeedbackBackend> = match &config.backend {
        Backend::Gemini => Box::new(GeminiAnalyzer::new(GeminiClient::new(
            config.google_api_key.clone(),
            config.chat_model.clone(),
        ))),
        Backend::Relay => Box::new(RelayAnalyzer::new(
            config.relay_url.clone().unwrap_or_default(),
        )),
    };

    // --- 5. Run the Session ---
    // The command channel decouples the session logic from playback.
    let (command_tx, command_rx) = mpsc::channel::<Command>(32);
    let playback = tokio::spawn(run_playback(command_rx));

    let mut session = SessionController::new(session_config).with_commands(command_tx);
    session.set_voice_mode(args.voice);

    tokio::select! {
        result = run_session(&mut session, gateway.as_ref()) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, ending the session");
        }
    }

    let transcript = session.transcript().to_vec();
    let completed = session.is_complete();
    let config_for_feedback = session.config().clone();
    // Dropping the controller closes the command channel, ending playback.
    drop(session);
    playback.await.ok();

    // --- 6. Feedback ---
    if completed {
        println!("\nGenerating feedback...");
        let report =
            generate_feedback(analyzer.as_ref(), &transcript, &config_for_feedback).await;
        print_report(&report);
    }

    Ok(())
}

async fn run_session(
    session: &mut SessionController,
    gateway: &dyn ResponseGateway,
) -> Result<()> {
    session.open(gateway).await;
    if let Some(message) = session.last_assistant_message() {
        println!("\ninterviewer> {}\n", message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !session.is_complete() {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let answer = line.trim();
        if answer == "/quit" {
            break;
        }
        match session.submit_user_response(gateway, answer).await {
            TurnOutcome::Rejected => {
                println!("(say something, or /quit to stop)");
                continue;
            }
            TurnOutcome::Answered | TurnOutcome::Recovered | TurnOutcome::Completed => {
                if let Some(message) = session.last_assistant_message() {
                    println!("\ninterviewer> {}\n", message.content);
                }
            }
        }
    }
    Ok(())
}

async fn run_playback(mut commands: mpsc::Receiver<Command>) {
    let output = SpeechOutput::new(ConsoleSynthesisEngine);
    while let Some(command) = commands.recv().await {
        match command {
            Command::Speak {
                text,
                resume_listening,
            } => {
                if let Err(error) = output.speak(&text, &CancelHandle::new()).await {
                    tracing::warn!(%error, "playback failed");
                }
                if resume_listening {
                    tracing::debug!("playback done, ready for the next answer");
                }
            }
            Command::SessionComplete(_) => {
                tracing::info!("session complete");
            }
        }
    }
}

fn print_report(report: &FeedbackReport) {
    println!("\n=== Feedback ===");
    println!("Overall score: {}/100", report.overall_score);
    println!("\nStrengths:");
    for item in &report.strengths {
        println!("  - {item}");
    }
    println!("\nAreas to improve:");
    for item in &report.improvements {
        println!("  - {item}");
    }
    println!("\n{}", report.detailed_feedback);
}
