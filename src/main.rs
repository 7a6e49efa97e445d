use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use grantdesk::{
    ApplicationDraft, ApplicationForm, Backend, Config, CredentialForm, CredentialOutcome,
    DocumentSlot, IdentityService, SelectedFile, SessionStore,
};

#[derive(Parser)]
#[command(name = "grantdesk")]
#[command(about = "Apply for a business grant")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base URL of the hosted backend
    #[arg(long, global = true, value_name = "URL")]
    backend_url: Option<String>,

    /// Public API key of the hosted backend
    #[arg(long, global = true, value_name = "KEY")]
    anon_key: Option<String>,

    /// Use a local backend stored in this directory
    #[arg(long, global = true, value_name = "DIR")]
    local: Option<PathBuf>,

    /// Keep the signed-in session in this file between runs
    #[arg(long, global = true, value_name = "FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the application window (default)
    Gui {
        /// URL the app was opened from, e.g. the email confirmation link
        #[arg(value_name = "URL")]
        launch_url: Option<String>,
    },
    #[command(flatten)]
    Headless(Headless),
}

#[derive(Subcommand)]
enum Headless {
    /// Register an account; a confirmation link is sent by email
    SignUp(Credentials),
    /// End the stored session
    SignOut,
    /// Upload documents and submit an application without the window
    Submit(SubmitArgs),
}

#[derive(Args)]
struct Credentials {
    #[arg(long)]
    email: String,

    #[arg(long, env = "GRANTDESK_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
struct SubmitArgs {
    #[command(flatten)]
    credentials: Credentials,

    /// JSON file with the application fields
    #[arg(long, value_name = "FILE")]
    draft: PathBuf,

    #[arg(long, value_name = "FILE")]
    business_plan: PathBuf,

    #[arg(long, value_name = "FILE")]
    financial_statements: PathBuf,

    #[arg(long, value_name = "FILE")]
    supporting_documents: PathBuf,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "grantdesk=debug" } else { "grantdesk=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = Config::load()?;
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    if let Some(key) = args.anon_key {
        config.anon_key = key;
    }
    if let Some(dir) = args.local {
        config.local_dir = Some(dir);
    }
    if let Some(file) = args.session_file {
        config.session_file = Some(file);
    }

    match args.command.unwrap_or(Command::Gui { launch_url: None }) {
        Command::Gui { launch_url } => run_gui(config, launch_url),
        Command::Headless(command) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_command(config, command))
        }
    }
}

#[cfg(feature = "gui")]
fn run_gui(config: Config, launch_url: Option<String>) -> anyhow::Result<()> {
    grantdesk::gui::run(config, launch_url).context("Application window failed")
}

#[cfg(not(feature = "gui"))]
fn run_gui(_config: Config, _launch_url: Option<String>) -> anyhow::Result<()> {
    anyhow::bail!("Built without the gui feature; use a subcommand such as `submit`")
}

async fn run_command(config: Config, command: Headless) -> anyhow::Result<()> {
    let backend = Backend::connect(&config).await?;
    info!(backend = %backend.describe(), "Connected");
    match command {
        Headless::SignUp(credentials) => {
            let mut form = CredentialForm::new(credentials.email, credentials.password);
            form.toggle_mode();
            match form.submit(&backend, &config.redirect_url).await? {
                CredentialOutcome::SignedIn => println!("Account created and signed in"),
                CredentialOutcome::Registered(_) => {
                    if let Some(notice) = form.notice() {
                        println!("{}", notice.text());
                    }
                }
            }
        }
        Headless::SignOut => {
            backend.sign_out().await?;
            println!("Signed out");
        }
        Headless::Submit(submit) => submit_application(&config, &backend, submit).await?,
    }
    Ok(())
}

async fn submit_application(
    config: &Config,
    backend: &Backend,
    args: SubmitArgs,
) -> anyhow::Result<()> {
    let mut sessions = backend.subscribe();
    let mut store = SessionStore::load(backend).await;

    let wanted = args.credentials.email.trim().to_lowercase();
    let current = store.identity().map(|identity| identity.email.to_lowercase());
    if current.as_deref() != Some(wanted.as_str()) {
        let mut credentials =
            CredentialForm::new(args.credentials.email, args.credentials.password);
        credentials.submit(backend, &config.redirect_url).await?;
        store.apply(sessions.borrow_and_update().clone());
    }

    let raw = tokio::fs::read_to_string(&args.draft)
        .await
        .with_context(|| format!("Failed to read draft {:?}", args.draft))?;
    let draft: ApplicationDraft = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse draft {:?}", args.draft))?;

    let mut form = ApplicationForm::new(config.reset_delay);
    form.draft = draft;
    let documents = [
        (DocumentSlot::BusinessPlan, args.business_plan),
        (DocumentSlot::FinancialStatements, args.financial_statements),
        (DocumentSlot::SupportingDocuments, args.supporting_documents),
    ];
    for (slot, path) in documents {
        let file = SelectedFile::from_path(&path).await?;
        let url = form
            .upload_document(backend, store.session(), slot, file)
            .await
            .with_context(|| format!("Failed to upload {slot}"))?;
        info!(slot = slot.key(), %url, "Uploaded document");
    }

    form.submit(backend, &config.table, store.session()).await?;
    if let Some(notice) = form.notice() {
        println!("{}", notice.text());
    }
    Ok(())
}
