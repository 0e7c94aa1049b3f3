use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use claimflow::api;
use claimflow::bridge::{AutomationBridge, BridgeSettings, LineChannel, SystemNavigator};
use claimflow::config::Config;
use claimflow::legal_form;
use claimflow::logging;
use claimflow::presenter::present;
use claimflow::steps::{ResumeInstruction, ResumeOutcome, Step, StepController, Transition};
use claimflow::store::{FileStore, KeyValueStore, Session, RESUME_KEY};

#[derive(Parser)]
#[command(name = "claimflow")]
#[command(about = "Onboarding wizard navigation and form-filling handoff for claim intake")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the wizard steps in order
    Steps,

    /// Manage the stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage the one-shot resume instruction
    Resume {
        #[command(subcommand)]
        action: ResumeAction,
    },

    /// Mount the wizard and navigate it
    Wizard {
        /// Step to navigate to; repeat to navigate several times
        #[arg(short, long = "goto")]
        goto: Vec<String>,
    },

    /// Hand legal-form data to the browser agent over stdin/stdout
    Submit {
        /// JSON file with the form fields
        #[arg(short, long)]
        payload: PathBuf,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Store an access token and optional ids
    Login {
        #[arg(long)]
        token: String,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        case_id: Option<String>,
    },
    /// Forget the session
    Logout,
    /// Print the session (token redacted)
    Show,
}

#[derive(Subcommand)]
enum ResumeAction {
    /// Write a resume instruction for the next mount
    Set {
        /// Step name (legacy aliases accepted)
        step: String,

        /// Mark the eligibility screen as done
        #[arg(long)]
        eligibility_done: bool,

        #[arg(long)]
        case_id: Option<String>,
    },
    /// Print the pending resume instruction
    Show,
    /// Delete the pending resume instruction
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration to .claimflow/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let succeeded = match cli.command {
        Commands::Steps => cmd_steps(),
        Commands::Session { action } => cmd_session(&config, action)?,
        Commands::Resume { action } => cmd_resume(&config, action)?,
        Commands::Wizard { goto } => cmd_wizard(&config, &goto).await?,
        Commands::Submit { payload } => cmd_submit(&config, &payload).await?,
        Commands::Config { action } => cmd_config(action)?,
    };

    if let Some(log_path) = &logging_handle.log_file_path {
        tracing::debug!(path = %log_path.display(), "Session log written");
    }
    drop(logging_handle);

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<FileStore> {
    FileStore::open(&config.state_path()).context("Failed to open state store")
}

fn cmd_steps() -> bool {
    for step in Step::ALL {
        let marker = if step.is_account_step() {
            " (skipped when signed in)"
        } else {
            ""
        };
        println!("{:>2}  {}{}", step.index(), step, marker);
    }
    true
}

fn cmd_session(config: &Config, action: SessionAction) -> Result<bool> {
    let store = open_store(config)?;

    match action {
        SessionAction::Login {
            token,
            user_id,
            case_id,
        } => {
            if token.trim().is_empty() {
                bail!("Access token must not be blank");
            }
            Session::login(&store, &token, user_id.as_deref(), case_id.as_deref())?;
            println!("Signed in");
        }
        SessionAction::Logout => {
            Session::logout(&store)?;
            println!("Signed out");
        }
        SessionAction::Show => {
            let session = Session::load(&store)?;
            println!(
                "Signed in: {}",
                if session.is_authenticated() { "yes" } else { "no" }
            );
            println!("User:      {}", session.user_id.as_deref().unwrap_or("-"));
            println!("Case:      {}", session.case_id.as_deref().unwrap_or("-"));
        }
    }

    Ok(true)
}

fn cmd_resume(config: &Config, action: ResumeAction) -> Result<bool> {
    let store = open_store(config)?;

    match action {
        ResumeAction::Set {
            step,
            eligibility_done,
            case_id,
        } => {
            let target =
                Step::canonicalize(&step).ok_or_else(|| anyhow!("Unknown step '{}'", step))?;
            let instruction = ResumeInstruction::new(target)
                .with_eligibility_done(eligibility_done)
                .with_case_id(case_id);
            store.set(RESUME_KEY, &instruction.encode())?;
            println!("Next mount resumes at {}", target);
        }
        ResumeAction::Show => match store.get(RESUME_KEY)? {
            Some(raw) => println!("{}", raw),
            None => println!("No resume instruction"),
        },
        ResumeAction::Clear => {
            store.remove(RESUME_KEY)?;
            println!("Resume instruction cleared");
        }
    }

    Ok(true)
}

async fn cmd_wizard(config: &Config, goto: &[String]) -> Result<bool> {
    let store: Arc<dyn KeyValueStore> = Arc::new(open_store(config)?);
    let backend = api::from_config(&config.backend)?;

    let (mut controller, outcome) =
        StepController::mount(store, backend.as_ref(), &config.wizard).await;

    match &outcome {
        ResumeOutcome::Instruction { step, .. } => {
            println!("Resumed at {} (resume instruction)", step)
        }
        ResumeOutcome::SavedProgress { step } => println!("Resumed at {} (saved progress)", step),
        ResumeOutcome::Fresh => println!("Starting at {}", controller.current_step()),
        ResumeOutcome::Fallback { reason } => {
            println!(
                "Starting at {} (resume data unusable: {})",
                controller.current_step(),
                reason
            );
        }
    }

    for target in goto {
        let line = match controller.go_to_step(target) {
            Transition::Moved { from, to } => format!("{} -> {}", from, to),
            Transition::Redirected { requested, to } => {
                format!("{} -> {} (already signed in)", requested, to)
            }
            Transition::Unchanged => format!("already at {}", controller.current_step()),
            Transition::Rejected(rejection) => format!("ignored {}: {:?}", target, rejection),
        };
        println!("{}", line);
    }

    let state = controller.state();
    println!(
        "Current step: {} (furthest reached: {})",
        state.current_step, Step::ALL[state.min_allowed_index]
    );
    if let Some(eligibility) = controller.eligibility() {
        println!("Eligibility: {} ({})", eligibility.status, eligibility.score);
    }

    Ok(true)
}

async fn cmd_submit(config: &Config, payload: &Path) -> Result<bool> {
    if config.bridge.form_url.trim().is_empty() {
        bail!(
            "bridge.form_url is not configured \
             (set it in config or CLAIMFLOW__BRIDGE__FORM_URL)"
        );
    }

    let raw = std::fs::read_to_string(payload)
        .with_context(|| format!("Failed to read {}", payload.display()))?;
    let fields: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", payload.display()))?;

    let store = open_store(config)?;
    let backend = api::from_config(&config.backend)?;
    let request = legal_form::prepare_request(&store, backend.as_ref(), fields).await?;

    let navigator = Arc::new(SystemNavigator::new(
        config.bridge.open_browser,
        config.bridge.waiting_route.clone(),
    ));
    let bridge = AutomationBridge::new(
        Arc::new(LineChannel::stdio()),
        navigator.clone(),
        BridgeSettings::from(&config.bridge),
    );

    let run = bridge.submit(request)?;
    let mut status = run.status();
    let printer = tokio::spawn(async move {
        loop {
            let view = present(&status.borrow_and_update());
            for line in view.lines() {
                eprintln!("{}", line);
            }
            if status.changed().await.is_err() {
                break;
            }
        }
    });

    let outcome = run.wait().await?;
    printer.await.ok();

    if let Some(route) = navigator.last_route() {
        eprintln!("Waiting for a decision: {}", route);
    }
    Ok(outcome.is_success())
}

fn cmd_config(action: ConfigAction) -> Result<bool> {
    match action {
        ConfigAction::Init { force } => {
            let path = Config::local_config_path();
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let written = Config::default().save()?;
            println!("Wrote {}", written.display());
        }
    }
    Ok(true)
}
