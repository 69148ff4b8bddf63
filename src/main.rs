mod coach;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use meridian_core::coaching::{CoachMode, CoachingRequest, CoachingResponse};
use meridian_core::config::{self, Config};
use meridian_core::traits::ModelClient;
use meridian_providers::gemini::GeminiClient;
use meridian_providers::openai::OpenAiClient;
use meridian_store::{BaselineRecord, Store};

use coach::Coach;

#[derive(Parser)]
#[command(name = "meridian", version, about = "Meridian: multi-specialist health coaching")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "meridian.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the coach a question.
    Ask {
        /// The question to ask.
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
        /// Roster depth: "quick" or "deep".
        #[arg(long, default_value = "quick")]
        mode: String,
        /// Escalate specialist reasoning to the deep-think model tier.
        #[arg(long)]
        deep_think: bool,
        /// Free-text steer for the specialists (e.g. "focus on sleep").
        #[arg(long)]
        hint: Option<String>,
        /// Existing chat thread to continue.
        #[arg(long)]
        thread: Option<i64>,
        /// User id.
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
    /// Log a free-text progress update into the daily log.
    Log {
        /// The update text, e.g. "slept 6.5h, 15 min walk after lunch".
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
        /// User id.
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
    /// Record or update baseline intake. Coaching stays generic until
    /// a baseline exists.
    Intake {
        /// Primary goal, e.g. "lose 5 kg by June".
        #[arg(long)]
        goal: String,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long)]
        age: Option<i64>,
        #[arg(long)]
        sex: Option<String>,
        #[arg(long)]
        weight_kg: Option<f64>,
        #[arg(long)]
        waist_cm: Option<f64>,
        #[arg(long)]
        bp_systolic: Option<i64>,
        #[arg(long)]
        bp_diastolic: Option<i64>,
        #[arg(long)]
        resting_hr: Option<i64>,
        #[arg(long)]
        sleep_hours: Option<f64>,
        /// 1-10 self-ratings.
        #[arg(long)]
        energy: Option<i64>,
        #[arg(long)]
        mood: Option<i64>,
        #[arg(long)]
        stress: Option<i64>,
        #[arg(long)]
        sleep_quality: Option<i64>,
        #[arg(long)]
        motivation: Option<i64>,
        /// User id.
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
    /// Check configuration, model backend, and store health.
    Status {
        /// User id to check baseline state for.
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _guard = init_tracing(&cfg);

    match cli.command {
        Commands::Ask {
            question,
            mode,
            deep_think,
            hint,
            thread,
            user,
        } => {
            if question.is_empty() {
                anyhow::bail!("no question provided. Usage: meridian ask <question>");
            }
            let request = CoachingRequest {
                user_id: user,
                question: question.join(" "),
                mode: parse_mode(&mode)?,
                deep_think,
                context_hint: hint,
                thread_id: thread,
            };

            let coach = build_coach(&cfg).await?;
            let response = coach.answer_question(request).await?;
            print_response(&response);
        }
        Commands::Log { text, user } => {
            if text.is_empty() {
                anyhow::bail!("no update provided. Usage: meridian log <text>");
            }
            let coach = build_coach(&cfg).await?;
            match coach.log_update(user, &text.join(" ")).await? {
                None => println!("No loggable update found in that message."),
                Some(outcome) => {
                    println!(
                        "Logged for {} (parse status: {}).",
                        outcome.aggregate.date,
                        outcome.extraction.parse_status.as_str()
                    );
                    for signal in &outcome.extraction.signals {
                        match signal.value {
                            Some(value) => println!(
                                "  {}: {} ({} {})",
                                signal.event_type.as_str(),
                                signal.details,
                                value,
                                signal.unit.as_deref().unwrap_or("")
                            ),
                            None => println!(
                                "  {}: {}",
                                signal.event_type.as_str(),
                                signal.details
                            ),
                        }
                    }
                }
            }
        }
        Commands::Intake {
            goal,
            activity,
            age,
            sex,
            weight_kg,
            waist_cm,
            bp_systolic,
            bp_diastolic,
            resting_hr,
            sleep_hours,
            energy,
            mood,
            stress,
            sleep_quality,
            motivation,
            user,
        } => {
            let store = Store::new(&cfg.store).await?;
            let record = BaselineRecord {
                user_id: user,
                primary_goal: Some(goal),
                activity_level: activity,
                age_years: age,
                sex_at_birth: sex,
                weight_kg,
                waist_cm,
                bp_systolic,
                bp_diastolic,
                resting_hr_bpm: resting_hr,
                sleep_hours,
                energy_1_10: energy,
                mood_1_10: mood,
                stress_1_10: stress,
                sleep_quality_1_10: sleep_quality,
                motivation_1_10: motivation,
            };
            store.upsert_baseline(&record).await?;
            println!("Baseline saved for user {user}. Coaching is now personalized.");
        }
        Commands::Status { user } => {
            println!("Meridian status\n");
            println!("Config: {}", cli.config);
            println!("Model provider: {}", cfg.model.provider);

            match build_model_client(&cfg) {
                Ok(model) => {
                    let state = if model.is_available().await {
                        "reachable"
                    } else {
                        "unreachable"
                    };
                    println!("  {}: {state}", model.name());
                }
                Err(err) => println!("  model: {err}"),
            }

            match Store::new(&cfg.store).await {
                Ok(store) => {
                    let size_kb = store.db_size().await? / 1024;
                    println!("Store: ready ({}, {size_kb} KB)", cfg.store.db_path);
                    let baseline = store.get_baseline(user).await?;
                    match baseline {
                        Some(_) => println!("Baseline (user {user}): complete"),
                        None => println!(
                            "Baseline (user {user}): missing. Run `meridian intake --goal ...`"
                        ),
                    }
                }
                Err(err) => println!("Store: {err}"),
            }
        }
    }

    Ok(())
}

/// Send logs to a daily-rolling file under the data dir so stdout stays
/// clean for answers; fall back to stderr when the dir is unavailable.
fn init_tracing(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cfg.meridian.log_level.clone()));

    let log_dir = format!("{}/logs", config::shellexpand(&cfg.meridian.data_dir));
    match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "meridian.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn parse_mode(raw: &str) -> anyhow::Result<CoachMode> {
    match raw {
        "quick" => Ok(CoachMode::Quick),
        "deep" => Ok(CoachMode::Deep),
        other => anyhow::bail!("unsupported mode: {other} (expected \"quick\" or \"deep\")"),
    }
}

/// Build the configured model backend.
fn build_model_client(cfg: &Config) -> anyhow::Result<Arc<dyn ModelClient>> {
    match cfg.model.provider.as_str() {
        "openai" => {
            let model_cfg = cfg.model.openai.as_ref().cloned().unwrap_or_default();
            if model_cfg.api_key.is_empty() {
                anyhow::bail!(
                    "OpenAI is selected but api_key is empty. \
                     Set it under [model.openai] in the config file."
                );
            }
            Ok(Arc::new(OpenAiClient::from_config(
                &model_cfg,
                cfg.model.timeout_secs,
            )))
        }
        "gemini" => {
            let model_cfg = cfg.model.gemini.as_ref().cloned().unwrap_or_default();
            if model_cfg.api_key.is_empty() {
                anyhow::bail!(
                    "Gemini is selected but api_key is empty. \
                     Set it under [model.gemini] in the config file."
                );
            }
            Ok(Arc::new(GeminiClient::from_config(
                &model_cfg,
                cfg.model.timeout_secs,
            )))
        }
        other => anyhow::bail!("unsupported model provider: {other}"),
    }
}

async fn build_coach(cfg: &Config) -> anyhow::Result<Coach> {
    let model = build_model_client(cfg)?;
    if !model.is_available().await {
        anyhow::bail!(
            "model backend '{}' is not available. Check the api_key and network.",
            model.name()
        );
    }
    let store = Store::new(&cfg.store).await?;
    Ok(Coach::new(store, model, cfg))
}

fn print_response(response: &CoachingResponse) {
    println!("{}\n", response.answer);

    if !response.rationale_bullets.is_empty() {
        println!("Why:");
        for bullet in &response.rationale_bullets {
            println!("  - {bullet}");
        }
        println!();
    }
    if !response.recommended_actions.is_empty() {
        println!("Next steps:");
        for action in &response.recommended_actions {
            println!("  {}", action.title);
            for step in &action.steps {
                println!("    - {step}");
            }
        }
        println!();
    }
    if !response.suggested_questions.is_empty() {
        println!("You could ask:");
        for question in &response.suggested_questions {
            println!("  - {question}");
        }
        println!();
    }
    if !response.safety_flags.is_empty() {
        println!("Safety flags: {}", response.safety_flags.join(", "));
    }
    println!("{}", response.disclaimer);
    if let Some(thread_id) = response.thread_id {
        println!("(thread {thread_id}; pass --thread {thread_id} to continue it)");
    }
}
