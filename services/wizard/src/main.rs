use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use profile_wizard_core::directory::{self, DirectoryFilter, MEMBERS};
use profile_wizard_core::form::{
    EXPERIENCE_OPTIONS, INDUSTRY_OPTIONS, ProfileForm, ROLE_OPTIONS, SelectOption, option_label,
};
use profile_wizard_core::interview::{HttpInterviewScheduler, InterviewScheduler, submit_profile};
use profile_wizard_core::session::VoiceWizard;
use profile_wizard_core::steps::FormField;
use profile_wizard_native_utils::audio::EndpointConfig;
use profile_wizard_service::config::Config;
use profile_wizard_service::espeak::EspeakSynthesizer;
use profile_wizard_service::terminal;
use profile_wizard_service::whisper::{WhisperRecognizer, WhisperSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Voice-guided community profile wizard")]
struct Cli {
    /// Read settings from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Fill in the profile by answering spoken questions
    Voice {
        /// Submit the profile for the interview once the wizard closes
        #[arg(long)]
        submit: bool,
    },
    /// Submit a profile given on the command line
    Submit(SubmitArgs),
    /// Browse the member directory
    Members(MembersArgs),
    /// List audio input devices
    Devices,
}

#[derive(Args)]
struct SubmitArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    profession: String,
    #[arg(long, default_value = "", value_parser = parse_industry)]
    industry: String,
    #[arg(long, default_value = "", value_parser = parse_experience)]
    experience: String,
    #[arg(long, default_value = "", value_parser = parse_role)]
    role: String,
    #[arg(long, default_value = "")]
    project_category: String,
    #[arg(long, default_value = "")]
    looking_for: String,
    /// Interest keyword; repeat for more
    #[arg(long = "interest")]
    interests: Vec<String>,
}

fn parse_option(options: &[SelectOption], value: &str) -> Result<String, String> {
    if value.is_empty() || option_label(options, value).is_some() {
        return Ok(value.to_string());
    }
    let allowed: Vec<&str> = options.iter().map(|option| option.value).collect();
    Err(format!("expected one of: {}", allowed.join(", ")))
}

fn parse_industry(value: &str) -> Result<String, String> {
    parse_option(&INDUSTRY_OPTIONS, value)
}

fn parse_experience(value: &str) -> Result<String, String> {
    parse_option(&EXPERIENCE_OPTIONS, value)
}

fn parse_role(value: &str) -> Result<String, String> {
    parse_option(&ROLE_OPTIONS, value)
}

impl SubmitArgs {
    fn into_form(self) -> ProfileForm {
        let mut form = ProfileForm::default();
        for (field, value) in [
            (FormField::Name, self.name),
            (FormField::Location, self.location),
            (FormField::Profession, self.profession),
            (FormField::Industry, self.industry),
            (FormField::Experience, self.experience),
            (FormField::Role, self.role),
            (FormField::ProjectCategory, self.project_category),
            (FormField::LookingFor, self.looking_for),
        ] {
            form.apply_field_update(field, value);
        }
        for interest in &self.interests {
            form.add_interest(interest.trim());
        }
        form
    }
}

#[derive(Args)]
struct MembersArgs {
    /// Matches name, profession or interests
    #[arg(long, default_value = "")]
    search: String,
    /// Lower-case industry, e.g. technology
    #[arg(long)]
    industry: Option<String>,
    /// Role slug, e.g. product-owner
    #[arg(long)]
    role: Option<String>,
    /// Send a connection request to the member with this id
    #[arg(long)]
    connect: Option<String>,
    /// Print the industries and roles that can be filtered on, then exit
    #[arg(long)]
    filters: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    }
    .context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully.");

    match cli.command {
        CliCommand::Voice { submit: submit_after } => run_voice(&config, submit_after).await,
        CliCommand::Submit(args) => submit(&config, &args.into_form()).await,
        CliCommand::Members(args) => {
            list_members(args);
            Ok(())
        }
        CliCommand::Devices => {
            let devices = profile_wizard_native_utils::device::get_available_inputs()
                .context("Failed to list audio input devices")?;
            println!("{}", devices);
            Ok(())
        }
    }
}

async fn run_voice(config: &Config, submit_after: bool) -> Result<()> {
    let recognizer = WhisperRecognizer::new(WhisperSettings {
        url: config.transcription_url.clone(),
        model: config.transcription_model.clone(),
        api_key: config.openai_api_key.clone(),
        input_device: config.input_device.clone(),
        endpoint: EndpointConfig::default(),
    });
    let synthesizer = EspeakSynthesizer::new(&config.tts_binary, &config.tts_voice_marker).await;
    let wizard = VoiceWizard::new(Arc::new(recognizer), Arc::new(synthesizer));

    let mut form = ProfileForm::default();
    terminal::run_voice_wizard(&wizard, &mut form).await?;

    println!("{}", serde_json::to_string_pretty(&form)?);
    if submit_after {
        submit(config, &form).await?;
    }
    Ok(())
}

async fn submit(config: &Config, form: &ProfileForm) -> Result<()> {
    let scheduler = config
        .interview_endpoint
        .clone()
        .map(|endpoint| HttpInterviewScheduler::new(endpoint, config.interview_api_token.clone()));
    if scheduler.is_none() {
        tracing::info!("INTERVIEW_ENDPOINT is not set; the profile is not sent anywhere.");
    }

    let scheduler = scheduler.as_ref().map(|s| s as &dyn InterviewScheduler);
    let (notice, booking) = submit_profile(form, scheduler)
        .await
        .context("Failed to submit profile")?;
    println!("{}", terminal::render_notice(&notice));
    if let Some(booking) = booking {
        println!(
            "Interview reference: {}{}",
            booking.id,
            booking
                .message
                .map(|message| format!(" ({})", message))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn list_members(args: MembersArgs) {
    if args.filters {
        println!("{}", terminal::render_filters(&MEMBERS));
        return;
    }

    let filter = DirectoryFilter {
        search: args.search,
        industry: args.industry.map(|industry| industry.to_lowercase()),
        role: args.role,
    };

    let shown = filter.apply(&MEMBERS);
    for label in filter.active_labels() {
        println!("[{}]", label);
    }
    println!("{}", directory::summary(shown.len(), MEMBERS.len()));
    if shown.is_empty() {
        println!("{}", directory::NO_RESULTS);
    }
    for member in &shown {
        println!("{}", terminal::render_member(member));
    }

    if let Some(id) = args.connect {
        match directory::connect(&MEMBERS, &id) {
            Ok(notice) => println!("{}", terminal::render_notice(&notice)),
            Err(e) => eprintln!("{}", e),
        }
    }
}
