//! # Tiro CLI
//!
//! Command-line front end for the Tiro English coach.
//!
//! Usage:
//!   tiro vocab [--words N]
//!   tiro converse --scenario <S> --process <P> [--max-rounds N]
//!   tiro topic [--difficulty D]
//!   tiro mode1 [--topic T] [--essay FILE] [--difficulty D] [--rounds N] [--export [DIR]]
//!   tiro mode2 --topic T [--difficulty D] [--rounds N] [--export [DIR]]
//!   tiro refine <seed> [--rounds N] [--markdown] [--json] [--export [DIR]]
//!
//! Examples:
//!   tiro vocab --words 8
//!   tiro converse --scenario "Hotel Check-in" --process "Reservation confirmation"
//!   tiro --provider openai mode2 --topic "My hometown" -d high --export
//!   tiro refine "Write a short story about a lighthouse" --rounds 2 --markdown

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tiro_agent::conversation::SCENE_INCOMPLETE;
use tiro_agent::vocab::NOT_IN_CONVERSATION;
use tiro_agent::{
    export_transcript, AgentConfig, AppConfig, Chat, Difficulty, MultiRound, TiroApp,
    TranscriptStyle, DEFAULT_ROUNDS,
};
use tiro_llm::{Error, ProviderConfig, ProviderType, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tiro")]
#[command(author, version, about = "Tiro - your English coach")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Chat backend: ollama or openai
    #[arg(long, global = true, env = "TIRO_PROVIDER", default_value = "ollama")]
    provider: ProviderType,

    /// Backend base URL
    #[arg(long, global = true, env = "TIRO_BASE_URL")]
    base_url: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "TIRO_MODEL")]
    model: Option<String>,

    /// API key for OpenAI-compatible backends
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding the agent prompt files
    #[arg(long, global = true, env = "TIRO_PROMPTS", default_value = "prompts")]
    prompts: PathBuf,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = 0.8)]
    temperature: f32,

    /// Maximum output tokens per reply
    #[arg(long, global = true, default_value_t = 8192)]
    max_tokens: usize,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors in the log
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn new words, then use them in a situation chat
    Vocab {
        /// Words per generation
        #[arg(short, long)]
        words: Option<usize>,
    },
    /// Role-play a scenario with Tiro
    Converse {
        #[arg(long)]
        scenario: String,
        #[arg(long)]
        process: String,
        /// Turns before the session feedback
        #[arg(long)]
        max_rounds: Option<usize>,
    },
    /// Generate an essay topic
    Topic {
        #[arg(short, long, default_value = "middle")]
        difficulty: Difficulty,
    },
    /// Tiro proposes the topic, your essay is critiqued and answered with model essays
    Mode1 {
        /// Topic to use instead of generating one
        #[arg(long)]
        topic: Option<String>,
        /// File containing your essay
        #[arg(long)]
        essay: Option<PathBuf>,
        #[arg(short, long, default_value = "middle")]
        difficulty: Difficulty,
        #[arg(short, long, default_value_t = 2)]
        rounds: usize,
        /// Save the report to a tiro-*.txt file (system temp dir if DIR is omitted)
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
    /// You propose the topic, Tiro writes, critiques and rewrites
    Mode2 {
        #[arg(long)]
        topic: String,
        #[arg(short, long, default_value = "middle")]
        difficulty: Difficulty,
        #[arg(short, long, default_value_t = 2)]
        rounds: usize,
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
    /// Alternate drafts and reflections over a seed prompt
    Refine {
        #[arg(required = true)]
        seed: Vec<String>,
        #[arg(short, long, default_value_t = DEFAULT_ROUNDS)]
        rounds: usize,
        /// Markdown headings instead of plain labels
        #[arg(long)]
        markdown: bool,
        /// Print the round records as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, value_name = "DIR", num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tiro_agent={default_level},tiro_llm={default_level},tiro={default_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn app_config(cli: &Cli) -> Result<AppConfig> {
    let mut provider = match cli.provider {
        ProviderType::Ollama => ProviderConfig::ollama(),
        ProviderType::OpenAI => {
            let key = cli.api_key.clone().ok_or_else(|| {
                Error::config_invalid("the openai provider needs --api-key or OPENAI_API_KEY")
            })?;
            ProviderConfig::openai(key)
        }
    };
    if let Some(url) = &cli.base_url {
        provider = provider.with_base_url(url);
    }
    if let Some(model) = &cli.model {
        provider = provider.with_model(model);
    }

    Ok(AppConfig {
        provider,
        agent: AgentConfig {
            model: cli.model.clone(),
            max_tokens: cli.max_tokens,
            temperature: cli.temperature,
            ..AgentConfig::default()
        },
        prompts_dir: cli.prompts.clone(),
        ..AppConfig::default()
    })
}

fn prompt_line() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Print a streamed reply as chunks arrive and return the full text
async fn print_stream<C: Chat>(agent: &C, input: String) -> Result<String> {
    let mut stream = agent.stream(vec![input]);
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        print!("{chunk}");
        std::io::stdout().flush()?;
        reply.push_str(&chunk);
    }
    println!();
    Ok(reply)
}

fn finish_report(report: &str, export: Option<Option<PathBuf>>) -> Result<()> {
    println!("{report}");
    if let Some(dir) = export {
        let path = export_transcript(report, dir.as_deref())?;
        println!("\nSaved to {}", path.display());
    }
    Ok(())
}

/// Optional `:gen` argument; must be a positive number
fn parse_word_count(arg: Option<&str>) -> Result<Option<usize>> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    match arg.parse::<usize>() {
        Ok(count) if count > 0 => Ok(Some(count)),
        _ => Err(Error::invalid_argument(format!(
            "word count must be a positive number, got '{arg}'"
        ))),
    }
}

async fn run_vocab(app: &mut TiroApp, words: Option<usize>, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    if let Some(count) = words {
        app.vocabulary.set_word_count(count)?;
    }
    println!("Vocabulary practice. Commands: :gen [n], :chat, :score, :reset, :quit");

    let mut display = String::new();
    prompt_line()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            None => {}
            Some(":quit") | Some(":q") => break,
            Some(":gen") => match parse_word_count(parts.next()) {
                Ok(count) => {
                    display = app.vocabulary.generate_vocabulary(count).await?;
                    println!("{display}");
                }
                Err(err) => eprintln!("{}", err.message()),
            },
            Some(":chat") => println!("{}", app.vocabulary.start_situation_chat().await?),
            Some(":score") => match app.vocabulary.evaluate_conversation() {
                Some(card) => println!("{card}"),
                None => println!("{NOT_IN_CONVERSATION}"),
            },
            Some(":reset") => {
                display.clear();
                println!("{}", app.vocabulary.restart());
            }
            Some(_) => {
                print_stream(&app.vocabulary, line.to_string()).await?;
                let marked = app.vocabulary.mark_used_words(&display, line);
                if marked != display {
                    display = marked;
                    println!("\n{display}");
                }
            }
        }
        prompt_line()?;
    }
    Ok(())
}

async fn run_converse(
    app: &mut TiroApp,
    scenario: &str,
    process: &str,
    max_rounds: Option<usize>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let overview = app.coach.set_scenario(scenario, process, max_rounds).await?;
    println!("{overview}");
    if overview == SCENE_INCOMPLETE {
        return Ok(());
    }
    println!("\n(:reset to end the scene, :quit to leave)");

    prompt_line()?;
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            ":quit" | ":q" => break,
            ":reset" => {
                println!("{}", app.coach.reset_scenario());
                break;
            }
            input => {
                let reply = app.coach.handle_conversation(input).await?;
                let ctx = app.coach.context();
                println!("{reply}\n[{}/{}]", ctx.rounds, ctx.max_rounds);
            }
        }
        prompt_line()?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = app_config(&cli)?;
    let mut app = TiroApp::from_config(&config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Commands::Vocab { words } => run_vocab(&mut app, words, &mut lines).await,
        Commands::Converse {
            scenario,
            process,
            max_rounds,
        } => run_converse(&mut app, &scenario, &process, max_rounds, &mut lines).await,
        Commands::Topic { difficulty } => {
            println!("{}", app.workshop.generate_topic(difficulty).await?);
            Ok(())
        }
        Commands::Mode1 {
            topic,
            essay,
            difficulty,
            rounds,
            export,
        } => {
            let topic = match topic {
                Some(topic) => topic,
                None => app.workshop.generate_topic(difficulty).await?,
            };
            let essay = match essay {
                Some(path) => std::fs::read_to_string(&path).map_err(|e| {
                    Error::from(e)
                        .with_operation("cli::mode1")
                        .with_context("essay", path.display().to_string())
                })?,
                None => String::new(),
            };
            let report = app.workshop.mode1(&topic, &essay, difficulty, rounds).await?;
            finish_report(&report, export)
        }
        Commands::Mode2 {
            topic,
            difficulty,
            rounds,
            export,
        } => {
            let report = app.workshop.mode2(&topic, difficulty, rounds).await?;
            finish_report(&report, export)
        }
        Commands::Refine {
            seed,
            rounds,
            markdown,
            json,
            export,
        } => {
            let seed = seed.join(" ");
            let transcript = MultiRound::new(app.workshop.writer(), app.workshop.reflector())
                .with_max_rounds(rounds)
                .run(&seed)
                .await?;
            if json {
                let out = serde_json::to_string_pretty(&transcript).map_err(|e| {
                    Error::new(tiro_llm::ErrorKind::SerializationFailed, "failed to encode transcript")
                        .set_source(e)
                })?;
                println!("{out}");
                return Ok(());
            }
            let style = if markdown {
                TranscriptStyle::Markdown
            } else {
                TranscriptStyle::Plain
            };
            finish_report(&transcript.render(style), export)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        tracing::debug!(error = ?err, "command failed");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
