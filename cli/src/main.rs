use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use propdesk::config::ClientConfig;
use propdesk::form::{self, PropertyForm};
use propdesk::gateway::{FieldErrors, Gateway, GatewayError};
use propdesk::guard::GuardConfig;
use propdesk::services::{auth, property};
use propdesk::session::{self, FileStorage, SessionStore};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing password; pass --password or set PROPDESK_PASSWORD")]
    MissingPassword,
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("invalid property fields")]
    InvalidForm(FieldErrors),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "propdesk-cli", about = "Property listing API CLI")]
struct Cli {
    #[arg(long, env = "PROPDESK_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "PROPDESK_SESSION_FILE", default_value = ".propdesk/session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        email: String,
        #[arg(long, env = "PROPDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Register {
        name: String,
        email: String,
        #[arg(long, env = "PROPDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Defaults to the password.
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    Logout,
    /// Fetch the current user from the API.
    Whoami,
    /// Show the locally stored session.
    Status,
    /// Evaluate the route guard for a path using the stored signal.
    Guard { path: String },
    Properties(PropertiesCommand),
}

#[derive(Args, Debug)]
struct PropertiesCommand {
    #[command(subcommand)]
    command: PropertiesSubcommand,
}

#[derive(Subcommand, Debug)]
enum PropertiesSubcommand {
    List,
    Show { id: i64 },
    Create(PropertyFields),
    Update {
        id: i64,
        #[command(flatten)]
        fields: PropertyFields,
    },
    Delete { id: i64 },
}

/// Raw form fields; validation happens in `PropertyForm::to_input`.
#[derive(Args, Debug, Default)]
struct PropertyFields {
    #[arg(long = "type")]
    property_type: Option<String>,
    /// Comma-separated list.
    #[arg(long)]
    features: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    taxes: Option<String>,
    #[arg(long)]
    income: Option<String>,
    #[arg(long)]
    expenditure: Option<String>,
}

impl PropertyFields {
    fn apply(self, form: &mut PropertyForm) {
        let fields = [
            (self.property_type, &mut form.property_type),
            (self.features, &mut form.features),
            (self.price, &mut form.price),
            (self.taxes, &mut form.taxes),
            (self.income, &mut form.income),
            (self.expenditure, &mut form.expenditure),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let env_config = ClientConfig::from_env();
    let config = match cli.api_url {
        Some(url) => ClientConfig { timeouts: env_config.timeouts, ..ClientConfig::new(&url) },
        None => env_config,
    };
    tracing::debug!(api_url = %config.base_url, session_file = %cli.session_file.display(), "cli configured");
    let session = Arc::new(SessionStore::new(Arc::new(FileStorage::new(cli.session_file))));
    let gateway = Gateway::new(&config, session)?;

    match cli.command {
        Command::Login { email, password } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let result = auth::login(&gateway, &email, &password).await?;
            print_auth(&result);
            Ok(())
        }
        Command::Register { name, email, password, password_confirmation } => {
            let password = password.ok_or(CliError::MissingPassword)?;
            let registration = auth::Registration {
                name,
                email,
                password_confirmation: password_confirmation.unwrap_or_else(|| password.clone()),
                password,
            };
            let result = auth::register(&gateway, &registration).await?;
            print_auth(&result);
            Ok(())
        }
        Command::Logout => {
            auth::logout(&gateway)?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let user = auth::current_user(&gateway).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Status => {
            let snapshot = gateway.session().snapshot();
            println!("logged in: {}", snapshot.logged_in);
            println!("token:     {}", if snapshot.token.is_some() { "present" } else { "none" });
            match snapshot.user_id {
                Some(id) => println!("user id:   {id}"),
                None => println!("user id:   none"),
            }
            if let Some(expires) = gateway.session().signal_cookie().and_then(|c| c.expires_datetime()) {
                println!("signal expires: {expires}");
            }
            Ok(())
        }
        Command::Guard { path } => {
            let (path, query) = match path.split_once('?') {
                Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
                None => (path, None),
            };
            let guard = GuardConfig::default();
            let header = gateway.session().cookie_header();
            let decision = guard.decide(&path, session::has_signal(header.as_deref()));
            match decision.location(query.as_deref()) {
                Some(location) => println!("redirect {location}"),
                None => println!("allow"),
            }
            Ok(())
        }
        Command::Properties(properties) => run_properties(&gateway, properties).await,
    }
}

async fn run_properties(gateway: &Gateway, properties: PropertiesCommand) -> Result<(), CliError> {
    match properties.command {
        PropertiesSubcommand::List => {
            let list = property::list(gateway).await?;
            if list.is_empty() {
                println!("no properties");
            }
            for p in &list {
                println!(
                    "{}\t{}\t{}\t{}",
                    p.id,
                    p.property_type.as_deref().unwrap_or("—"),
                    form::format_money(p.price),
                    form::display_features(&p.features),
                );
            }
            Ok(())
        }
        PropertiesSubcommand::Show { id } => {
            let found = property::get(gateway, id).await?;
            print_json(&serde_json::to_value(found)?)
        }
        PropertiesSubcommand::Create(fields) => {
            let mut form = PropertyForm::default();
            fields.apply(&mut form);
            let input = form.to_input().map_err(CliError::InvalidForm)?;
            let created = property::create(gateway, &input).await?;
            print_json(&serde_json::to_value(created)?)
        }
        PropertiesSubcommand::Update { id, fields } => {
            let current = property::get(gateway, id).await?;
            let mut form = PropertyForm::from_property(&current);
            fields.apply(&mut form);
            let input = form.to_input().map_err(CliError::InvalidForm)?;
            let updated = property::update(gateway, id, &input).await?;
            print_json(&serde_json::to_value(updated)?)
        }
        PropertiesSubcommand::Delete { id } => {
            property::delete(gateway, id).await?;
            println!("deleted {id}");
            Ok(())
        }
    }
}

fn print_auth(result: &auth::AuthResult) {
    match &result.user {
        Some(user) => println!(
            "logged in as {} (id {})",
            user.email.as_deref().or(user.name.as_deref()).unwrap_or("user"),
            user.id
        ),
        None if result.token.is_some() => println!("logged in"),
        None => println!("no session returned"),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

/// Top-level message, then the first message of every invalid field.
fn report(err: &CliError) {
    if let CliError::Gateway(gateway_err) = err {
        if gateway_err.is_unauthorized() {
            let status = gateway_err.api().map(|api| api.status);
            tracing::warn!(?status, "API rejected the credentials; the stored session is kept until `logout`");
        }
    }
    for line in error_lines(err) {
        eprintln!("{line}");
    }
}

fn error_lines(err: &CliError) -> Vec<String> {
    let (message, fields) = match err {
        CliError::Gateway(GatewayError::Api(api)) => (api.message.clone(), api.field_errors.as_ref()),
        CliError::InvalidForm(errors) => (err.to_string(), Some(errors)),
        other => (other.to_string(), None),
    };
    let mut lines = vec![format!("error: {message}")];
    if let Some(fields) = fields {
        for field in fields.keys() {
            if let Some(first) = form::first_error(fields, field) {
                lines.push(format!("  {field}: {first}"));
            }
        }
    }
    lines
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
