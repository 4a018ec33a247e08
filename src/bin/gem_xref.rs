use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gem_xref::annotator::XrefTable;
use gem_xref::app::{AnnotateResult, App, GprResult, IdResult, ResolveResult};
use gem_xref::config::{ConfigLoader, ResolvedConfig};
use gem_xref::domain::ElementKind;
use gem_xref::error::XrefError;
use gem_xref::model::Model;
use gem_xref::output::{JsonOutput, OutputMode, StderrProgress};
use gem_xref::registry::Registry;

#[derive(Parser)]
#[command(name = "gem-xref")]
#[command(about = "Canonical ids, identifiers.org resolution and cross-references for metabolic models")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Decompose an element id into its canonical parts")]
    Id(IdArgs),
    #[command(about = "Resolve a resource URL against the registry")]
    Resolve(ResolveArgs),
    #[command(about = "Parse a gene-product association rule")]
    Gpr(GprArgs),
    #[command(about = "Annotate a model stored as JSON")]
    Annotate(AnnotateArgs),
}

#[derive(Args)]
struct IdArgs {
    raw: String,

    #[arg(long, value_enum, default_value_t = ElementKind::Metabolite)]
    kind: ElementKind,
}

#[derive(Args)]
struct ResolveArgs {
    url: String,
}

#[derive(Args)]
struct GprArgs {
    rule: String,
}

#[derive(Args)]
struct AnnotateArgs {
    #[arg(long)]
    model: Utf8PathBuf,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<XrefError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &XrefError) -> u8 {
    match error {
        XrefError::InvalidIdentifier(_)
        | XrefError::InvalidKind(_)
        | XrefError::GprParse { .. }
        | XrefError::MissingConfig
        | XrefError::ConfigRead(_)
        | XrefError::ConfigParse(_)
        | XrefError::ModelRead(_)
        | XrefError::ModelParse(_)
        | XrefError::ReactionNotFound(_) => 2,
        XrefError::RegistryRead(_)
        | XrefError::RegistryParse(_)
        | XrefError::DuplicatePrefix(_)
        | XrefError::XrefTableRead(_)
        | XrefError::XrefTableParse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(XrefError::MissingConfig) => {
            debug!("no gem-xref.json found, using defaults");
            ResolvedConfig::default()
        }
        Err(err) => return Err(err.into()),
    };

    match cli.command {
        Commands::Id(args) => {
            let app = offline_app(&config)?;
            let result = app.id(&args.raw, args.kind)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_id(&result).into_diagnostic()?,
                OutputMode::Text => print_id(&result),
            }
        }
        Commands::Gpr(args) => {
            let app = offline_app(&config)?;
            let result = app.gpr(&args.rule)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_gpr(&result).into_diagnostic()?,
                OutputMode::Text => print_gpr(&result),
            }
        }
        Commands::Resolve(args) => {
            let app = full_app(&config)?;
            let result = app.resolve(&args.url);
            match output_mode {
                OutputMode::Json => JsonOutput::print_resolve(&result).into_diagnostic()?,
                OutputMode::Text => print_resolve(&result),
            }
        }
        Commands::Annotate(args) => {
            let app = full_app(&config)?;
            let mut model = Model::from_path(&args.model)?;
            let result = match output_mode {
                OutputMode::Json => app.annotate(&mut model, &JsonOutput)?,
                OutputMode::Text => app.annotate(&mut model, &StderrProgress)?,
            };
            let target = args.output.unwrap_or_else(|| args.model.clone());
            model.write_to(&target)?;
            info!(path = %target, "model written");
            match output_mode {
                OutputMode::Json => JsonOutput::print_annotate(&result).into_diagnostic()?,
                OutputMode::Text => print_annotate(&result, &target),
            }
        }
    }
    Ok(())
}

/// App for commands that never consult the registry or cross-reference table.
fn offline_app(config: &ResolvedConfig) -> Result<App<XrefTable>, XrefError> {
    Ok(App::new(
        Registry::load(Vec::new())?,
        XrefTable::default(),
        config.options,
    ))
}

fn full_app(config: &ResolvedConfig) -> Result<App<XrefTable>, XrefError> {
    let registry = Registry::from_path(&config.registry)?;
    let source = match &config.xrefs {
        Some(path) => XrefTable::from_path(path)?,
        None => XrefTable::default(),
    };
    Ok(App::new(registry, source, config.options))
}

fn print_id(result: &IdResult) {
    println!("{} ({})", result.encoded, result.kind);
    println!("  abbreviation: {}", result.abbreviation);
    if let Some(code) = &result.compartment_code {
        println!("  compartment:  {code}");
    }
    if let Some(code) = &result.tissue_code {
        println!("  tissue:       {code}");
    }
    if result.pseudo {
        println!("  pseudo reaction");
    }
    if !result.valid {
        println!("  warning: encoded id does not match the identifier grammar");
    }
}

fn print_resolve(result: &ResolveResult) {
    match &result.resolved {
        Some(uri) => println!("resolved: {uri}"),
        None => println!("resolved: no matching namespace"),
    }
    if let Some(uri) = &result.legacy_fixed {
        println!("legacy prefix fixed: {uri}");
    }
    if result.invalid_namespace {
        println!("namespace is blocklisted");
    } else if result.prefix.is_some() && !result.matches_pattern {
        println!("identifier does not match the namespace pattern");
    }
    match &result.checked {
        Some(url) => println!("kept as: {url}"),
        None => println!("dropped"),
    }
}

fn print_gpr(result: &GprResult) {
    println!("{}", result.canonical);
    for gene_product in &result.gene_products {
        println!("  {gene_product}");
    }
}

fn print_annotate(result: &AnnotateResult, target: &Utf8Path) {
    let summary = &result.summary;
    println!("model {} written to {target}", result.model_id);
    println!(
        "  rules: {} attached, {} failed",
        result.rules_attached, result.rules_failed
    );
    for (label, kind) in [
        ("species", &summary.species),
        ("reactions", &summary.reactions),
        ("gene products", &summary.gene_products),
    ] {
        println!(
            "  {label}: {} annotated, {} skipped, {} resources added",
            kind.annotated, kind.skipped, kind.resources_added
        );
    }
}
