use std::path::PathBuf;
use anyhow::bail;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use case_gen::generator::DescriptionGenerator;
use case_gen::orchestrator::{discover_cases, Orchestrator};
use case_gen::settings::{ConfigFile, GeneratorSettings};
use case_gen::test_case::TestCase;

#[derive(clap::Parser,Debug)]
#[command(author, version, about = "Generate Gadgetron test case run files", long_about = None)]
pub struct CaseGenArgs {
    #[command(subcommand)]
    pub action: CaseGenAction,
}

#[derive(clap::Subcommand,Debug)]
pub enum CaseGenAction {
    /// generate the run files for a single case file and print their digests
    Case(CaseArgs),
    /// generate every supported case in a directory and update testdata.json
    Generate(GenerateArgs),
    /// check every case in testdata.json against its recorded digests
    Validate(SettingsArgs),
    /// write default generator settings to edit
    NewSettings(NewSettingsArgs),
}

#[derive(Clone,clap::Args,Debug)]
pub struct SettingsArgs {
    /// generator settings file (defaults are used when omitted)
    #[clap(long)]
    settings:Option<PathBuf>,
    /// overrides the data root from the settings
    #[clap(long)]
    data_root:Option<PathBuf>,
}

#[derive(Clone,clap::Args,Debug)]
pub struct CaseArgs {
    cfg_file:PathBuf,
    case_dir:PathBuf,
    #[command(flatten)]
    settings:SettingsArgs,
}

#[derive(Clone,clap::Args,Debug)]
pub struct GenerateArgs {
    cases_dir:PathBuf,
    #[command(flatten)]
    settings:SettingsArgs,
}

#[derive(Clone,clap::Args,Debug)]
pub struct NewSettingsArgs {
    output_file:PathBuf,
}

fn load_settings(args:&SettingsArgs) -> anyhow::Result<GeneratorSettings> {
    let mut s = match &args.settings {
        Some(file) => GeneratorSettings::from_file(file)?,
        None => GeneratorSettings::default(),
    };
    if let Some(root) = &args.data_root {
        s.data_root = root.clone();
    }
    Ok(s)
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CaseGenArgs::parse();
    match args.action {
        CaseGenAction::Case(args) => {
            let settings = load_settings(&args.settings)?;
            let case = TestCase::open(&args.cfg_file)?;
            let deps = DescriptionGenerator::new(settings).generate(&case,&args.case_dir)?;
            println!("{}",serde_json::to_string_pretty(&deps)?);
        }
        CaseGenAction::Generate(args) => {
            let settings = load_settings(&args.settings)?;
            let cases = discover_cases(&args.cases_dir)?;
            let mut orchestrator = Orchestrator::new(settings)?;
            orchestrator.run(&cases)?;
        }
        CaseGenAction::Validate(args) => {
            let settings = load_settings(&args)?;
            let orchestrator = Orchestrator::new(settings)?;
            let failures = orchestrator.validate_all();
            for (name,e) in &failures {
                error!("{}: {}",name,e);
            }
            if !failures.is_empty() {
                bail!("{} of {} cases failed validation",failures.len(),orchestrator.testdata().cases.len());
            }
            info!("{} cases valid",orchestrator.testdata().cases.len());
        }
        CaseGenAction::NewSettings(args) => {
            GeneratorSettings::default().to_file(&args.output_file)?;
            let written = args.output_file.with_extension(GeneratorSettings::file_ext());
            info!("wrote {}",written.display());
        }
    }
    Ok(())
}
