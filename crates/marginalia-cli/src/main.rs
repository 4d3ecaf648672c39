use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use marginalia_core::config_file::{self, ConfigFile, LlmConfig};
use marginalia_core::{
    ResolverConfig, build_word_index, extract_annotations, resolve_contexts,
    resolve_contexts_with_lines,
};
use marginalia_llm::{ChatClient, Paced, PacingPolicy, Provider, TextGenerator, select_provider};
use marginalia_pdf::PdfDocumentBackend;
use marginalia_reporting::{DEFAULT_ENGINE, compile_latex, find_latest_tex};
use tokio_util::sync::CancellationToken;

mod output;
mod pipeline;

use output::ColorMode;
use pipeline::OutputOptions;

/// Turn annotated PDFs into colloquium letters, grading letters and peer reviews
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Read configuration from this TOML file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct LlmArgs {
    /// Text-generation provider: groq or openai (default: whichever key is set, Groq first)
    #[arg(long)]
    provider: Option<String>,

    /// Groq API key
    #[arg(long)]
    groq_key: Option<String>,

    /// OpenAI API key
    #[arg(long)]
    openai_key: Option<String>,

    /// Model for rewriting, summaries and metadata
    #[arg(long)]
    model: Option<String>,

    /// Space requests for free-tier rate limits
    #[arg(long)]
    free_tier: bool,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Output folder (default: the PDF's folder)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Write the .tex file without compiling it
    #[arg(long)]
    no_compile: bool,

    /// LaTeX engine used for compilation
    #[arg(long)]
    engine: Option<String>,

    /// Place printed in the letter head
    #[arg(long)]
    place: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a colloquium evaluation letter from an annotated thesis
    Colloquium {
        /// Annotated thesis PDF
        pdf: PathBuf,
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Write a grading letter for a project report
    Project {
        /// Project report PDF
        pdf: PathBuf,
        #[command(flatten)]
        llm: LlmArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Signature image referenced in the letter
        #[arg(long)]
        signature: Option<String>,
    },

    /// Write a Markdown peer review from an annotated paper
    Review {
        /// Annotated paper PDF
        pdf: PathBuf,
        #[command(flatten)]
        llm: LlmArgs,
        /// Output folder (default: the PDF's folder)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Resolve annotation contexts without generating anything
    Contexts {
        /// Annotated PDF
        pdf: PathBuf,
        /// Attach line numbers
        #[arg(long)]
        lines: bool,
        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
        /// Treat short citation remarks as regular comments
        #[arg(long)]
        no_citation_filter: bool,
    },

    /// Compile the newest matching .tex file in a folder
    Compile {
        /// Folder to search
        folder: PathBuf,
        /// File name pattern
        #[arg(long, default_value = "bewertung_brief_*.tex")]
        pattern: String,
        /// LaTeX engine
        #[arg(long)]
        engine: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = match &cli.config {
        Some(path) => match config_file::load_from_path(path) {
            Some(c) => c,
            None => anyhow::bail!("Could not read config file {}", path.display()),
        },
        None => config_file::load_config(),
    };
    let resolver_config = file_config.resolver_config()?;
    let color = ColorMode(!cli.no_color);

    match cli.command {
        Command::Colloquium { pdf, llm, output } => {
            colloquium(&pdf, &llm, &output, &file_config, &resolver_config, color).await
        }
        Command::Project {
            pdf,
            llm,
            output,
            signature,
        } => project(&pdf, &llm, &output, signature, &file_config, color).await,
        Command::Review { pdf, llm, out } => {
            review(&pdf, &llm, out, &file_config, &resolver_config, color).await
        }
        Command::Contexts {
            pdf,
            lines,
            json,
            no_citation_filter,
        } => {
            let config = resolver_config.with_citation_filter(!no_citation_filter);
            contexts(&pdf, lines, json, &config, color)
        }
        Command::Compile {
            folder,
            pattern,
            engine,
        } => compile(&folder, &pattern, engine, &file_config, color),
    }
}

/// Logs go to stderr so results on stdout stay clean.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn ensure_pdf(pdf: &Path) -> anyhow::Result<()> {
    if !pdf.exists() {
        anyhow::bail!("File not found: {}", pdf.display());
    }
    Ok(())
}

/// Resolve provider, key and models: CLI flag > environment > config file.
fn build_generator(
    args: &LlmArgs,
    file: Option<&LlmConfig>,
    cancel: CancellationToken,
) -> anyhow::Result<Paced<ChatClient>> {
    let file = file.cloned().unwrap_or_default();

    let provider = args
        .provider
        .clone()
        .or_else(|| std::env::var("MARGINALIA_PROVIDER").ok())
        .or(file.provider);
    let provider = provider
        .map(|p| p.parse::<Provider>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let groq_key = args
        .groq_key
        .clone()
        .or_else(|| std::env::var("GROQ_API_KEY").ok());
    let openai_key = args
        .openai_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    let (provider, key) = match select_provider(provider, groq_key.as_deref(), openai_key.as_deref())
    {
        Ok(selected) => selected,
        Err(e) => anyhow::bail!(
            "{}. Set GROQ_API_KEY or OPENAI_API_KEY, or pass --groq-key / --openai-key.",
            e
        ),
    };

    let mut client = ChatClient::new(provider, key).with_temperature(file.temperature);
    if let Some(model) = args.model.clone().or(file.model) {
        client = client.with_model(model);
    }
    if let Some(model) = file.light_model {
        client = client.with_light_model(model);
    }
    if let Some(url) = file.base_url {
        client = client.with_base_url(url);
    }

    let mut policy = if args.free_tier || file.free_tier.unwrap_or(false) {
        PacingPolicy::free_tier()
    } else {
        PacingPolicy::default()
    };
    if let Some(n) = file.max_retries {
        policy = policy.with_max_retries(n);
    }

    tracing::info!(
        provider = %provider,
        model = client.model_for(marginalia_llm::ModelTier::Primary),
        free_tier = policy.min_interval.is_some(),
        "text generator ready"
    );
    Ok(Paced::new(client, policy).with_cancellation(cancel))
}

/// Cancellation token fired on Ctrl+C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });
    cancel
}

/// CLI flag > config file > default.
fn output_options(args: &OutputArgs, file: &ConfigFile) -> OutputOptions {
    let defaults = OutputOptions::default();
    let section = file.output.clone().unwrap_or_default();
    OutputOptions {
        out_dir: args.out.clone().or(section.out_dir.map(PathBuf::from)),
        compile: !args.no_compile && section.compile.unwrap_or(true),
        engine: args
            .engine
            .clone()
            .or(section.latex_engine)
            .unwrap_or(defaults.engine),
        place: args.place.clone().or(section.place).unwrap_or(defaults.place),
        signature: section.signature.unwrap_or(defaults.signature),
    }
}

fn rewrite_progress(color: ColorMode) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let template = if color.enabled() {
        "{spinner:.green} Rewriting comments [{bar:40.green/dim}] {pos}/{len}"
    } else {
        "Rewriting comments [{bar:40}] {pos}/{len}"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn announce(generator: &dyn TextGenerator, pdf: &Path) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "Processing {} with {}...", pdf.display(), generator.name());
}

async fn colloquium(
    pdf: &Path,
    llm: &LlmArgs,
    args: &OutputArgs,
    file: &ConfigFile,
    config: &ResolverConfig,
    color: ColorMode,
) -> anyhow::Result<()> {
    ensure_pdf(pdf)?;
    let generator = build_generator(llm, file.llm.as_ref(), ctrl_c_token())?;
    let options = output_options(args, file);
    announce(generator.inner(), pdf);

    let progress = rewrite_progress(color);
    let report = pipeline::colloquium::run(
        &PdfDocumentBackend::new(),
        &generator,
        pdf,
        config,
        &options,
        &progress,
    )
    .await?;

    let mut out = std::io::stdout();
    output::print_stats(&mut out, &report.stats, color)?;
    writeln!(
        out,
        "Rewrote {} comments (language: {})",
        report.rewritten_comments, report.language
    )?;
    if report.frequent_citation_issues {
        output::print_warning(&mut out, "Häufig fehlen Quellenangaben", color)?;
    }
    if report.frequent_language_issues {
        output::print_warning(&mut out, "Viele sprachliche Fehler", color)?;
    }
    output::print_written(&mut out, &report.written, color)?;
    Ok(())
}

async fn project(
    pdf: &Path,
    llm: &LlmArgs,
    args: &OutputArgs,
    signature: Option<String>,
    file: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<()> {
    ensure_pdf(pdf)?;
    let generator = build_generator(llm, file.llm.as_ref(), ctrl_c_token())?;
    let mut options = output_options(args, file);
    if let Some(signature) = signature {
        options.signature = signature;
    }
    announce(generator.inner(), pdf);

    let report =
        pipeline::project::run(&PdfDocumentBackend::new(), &generator, pdf, &options).await?;

    let mut out = std::io::stdout();
    writeln!(out, "Student: {} ({})", report.student_name, report.salutation)?;
    output::print_written(&mut out, &report.written, color)?;
    Ok(())
}

async fn review(
    pdf: &Path,
    llm: &LlmArgs,
    out_dir: Option<PathBuf>,
    file: &ConfigFile,
    config: &ResolverConfig,
    color: ColorMode,
) -> anyhow::Result<()> {
    ensure_pdf(pdf)?;
    let generator = build_generator(llm, file.llm.as_ref(), ctrl_c_token())?;
    let section = file.output.clone().unwrap_or_default();
    let options = OutputOptions {
        out_dir: out_dir.or(section.out_dir.map(PathBuf::from)),
        compile: false,
        ..Default::default()
    };
    announce(generator.inner(), pdf);

    let progress = rewrite_progress(color);
    let report = pipeline::review::run(
        &PdfDocumentBackend::new(),
        &generator,
        pdf,
        config,
        &options,
        &progress,
    )
    .await?;

    let mut out = std::io::stdout();
    output::print_stats(&mut out, &report.stats, color)?;
    writeln!(out, "Rewrote {} comments", report.comments)?;
    if color.enabled() {
        use owo_colors::OwoColorize;
        writeln!(out, "{} {}", "Written:".green(), report.path.display())?;
    } else {
        writeln!(out, "Written: {}", report.path.display())?;
    }
    Ok(())
}

fn contexts(
    pdf: &Path,
    lines: bool,
    json: bool,
    config: &ResolverConfig,
    color: ColorMode,
) -> anyhow::Result<()> {
    ensure_pdf(pdf)?;
    let backend = PdfDocumentBackend::new();
    let index = build_word_index(&backend, pdf)?;
    let annotations = extract_annotations(&backend, pdf, config)?;
    let contexts = if lines {
        let heights = marginalia_core::DocumentBackend::page_heights(&backend, pdf)?;
        resolve_contexts_with_lines(&index, &annotations, &heights, config)?
    } else {
        resolve_contexts(&index, &annotations, config)?
    };

    let mut out = std::io::stdout();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&contexts)?)?;
    } else {
        output::print_stats(&mut out, &annotations.stats, color)?;
        writeln!(out)?;
        output::print_contexts(&mut out, &contexts, color)?;
    }
    Ok(())
}

fn compile(
    folder: &Path,
    pattern: &str,
    engine: Option<String>,
    file: &ConfigFile,
    color: ColorMode,
) -> anyhow::Result<()> {
    let engine = engine
        .or_else(|| file.output.as_ref().and_then(|o| o.latex_engine.clone()))
        .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

    let Some(tex) = find_latest_tex(folder, pattern)? else {
        anyhow::bail!(
            "No file matching {} found in {}",
            pattern,
            folder.display()
        );
    };

    let mut out = std::io::stdout();
    writeln!(out, "Compiling {} with {}...", tex.display(), engine)?;
    let pdf = compile_latex(&tex, None, &engine)?;
    if color.enabled() {
        use owo_colors::OwoColorize;
        writeln!(out, "{} {}", "Compiled:".green(), pdf.display())?;
    } else {
        writeln!(out, "Compiled: {}", pdf.display())?;
    }
    Ok(())
}
