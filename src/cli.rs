use crate::bootstrap::{self, SuperuserInput};
use crate::config::Config;
use crate::error::BootstrapError;
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "dryfruits", version, about = "Dry fruits business management service")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, env = "DRYFRUITS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify database connectivity and report migration state.
    Check,
    /// Create the configured database (fails if it already exists).
    CreateDatabase,
    /// Apply pending schema migrations.
    Migrate,
    /// List known migrations and whether each is applied.
    ShowMigrations,
    /// Provision an administrative account for the application and admin panel.
    CreateSuperuser(SuperuserArgs),
    /// Run the HTTP server.
    Serve,
    /// create-database, migrate, create-superuser and serve, stopping at the first error.
    Bootstrap(SuperuserArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SuperuserArgs {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    /// Read from the environment only; never pass it on the command line.
    #[arg(long, env = "DRYFRUITS_SUPERUSER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Fail instead of prompting for missing values.
    #[arg(long)]
    pub no_input: bool,
}

fn missing(field: &str) -> BootstrapError {
    BootstrapError::InvalidInput(format!("--{field} is required with --no-input"))
}

impl SuperuserArgs {
    /// Fills the gaps from interactive prompts unless `--no-input` is given.
    fn resolve(self) -> Result<SuperuserInput, BootstrapError> {
        let email = match self.email {
            Some(email) => email,
            None if self.no_input => return Err(missing("email")),
            None => Text::new("Email address:").prompt()?,
        };
        let first_name = match self.first_name {
            Some(name) => name,
            None if self.no_input => String::new(),
            None => Text::new("First name:").with_default("").prompt()?,
        };
        let last_name = match self.last_name {
            Some(name) => name,
            None if self.no_input => String::new(),
            None => Text::new("Last name:").with_default("").prompt()?,
        };
        let (password, password_confirm) = match self.password {
            Some(password) => (password.clone(), password),
            None if self.no_input => return Err(missing("password")),
            None => {
                let password = Password::new("Password:")
                    .with_display_mode(PasswordDisplayMode::Masked)
                    .without_confirmation()
                    .prompt()?;
                let confirm = Password::new("Password (again):")
                    .with_display_mode(PasswordDisplayMode::Masked)
                    .without_confirmation()
                    .prompt()?;
                (password, confirm)
            }
        };
        Ok(SuperuserInput {
            email,
            first_name,
            last_name,
            password,
            password_confirm,
        })
    }
}

async fn create_superuser(cfg: &Config, args: SuperuserArgs) -> Result<(), BootstrapError> {
    let input = args.resolve()?;
    let db = bootstrap::connect(cfg).await?;
    let created = bootstrap::create_superuser(&db, &input).await;
    db.close().await;
    let user = created?;
    println!("Superuser {} created successfully.", user.email);
    Ok(())
}

fn print_migrations(migrations: &[crate::db::MigrationState]) {
    for m in migrations {
        let mark = if m.is_applied() { "X" } else { " " };
        println!(
            " [{mark}] {:04}_{}{}",
            m.version,
            m.name,
            m.applied_at
                .as_deref()
                .map(|at| format!(" (applied {at})"))
                .unwrap_or_default()
        );
    }
}

pub async fn run(cli: Cli, cfg: Config) -> Result<(), BootstrapError> {
    match cli.command {
        Command::Check => {
            let report = bootstrap::check(&cfg).await?;
            println!("Database: {} (reachable)", report.database);
            print_migrations(&report.migrations);
            let pending = report.pending();
            if !pending.is_empty() {
                return Err(BootstrapError::SchemaNotMigrated { pending });
            }
            println!("System check identified no issues.");
        }
        Command::CreateDatabase => {
            bootstrap::create_database(&cfg).await?;
            println!("Database {} created.", cfg.database.name);
        }
        Command::Migrate => {
            let applied = bootstrap::migrate(&cfg).await?;
            if applied.is_empty() {
                println!("No migrations to apply.");
            } else {
                for version in applied {
                    println!("  Applying {version:04}... OK");
                }
            }
        }
        Command::ShowMigrations => {
            let report = bootstrap::check(&cfg).await?;
            print_migrations(&report.migrations);
        }
        Command::CreateSuperuser(args) => create_superuser(&cfg, args).await?,
        Command::Serve => {
            bootstrap::serve(&cfg, bootstrap::shutdown_signal()).await?;
        }
        Command::Bootstrap(args) => {
            let input = args.resolve()?;
            bootstrap::create_database(&cfg).await?;
            bootstrap::migrate(&cfg).await?;
            let db = bootstrap::connect(&cfg).await?;
            let created = bootstrap::create_superuser(&db, &input).await;
            db.close().await;
            let user = created?;
            info!(email = %user.email, "bootstrap: superuser ready");
            println!(
                "Starting development server at http://{}:{}/",
                cfg.basic.listen_addr, cfg.basic.listen_port
            );
            bootstrap::serve(&cfg, bootstrap::shutdown_signal()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["dryfruits", "--config", "x.toml", "migrate"]).unwrap();
        assert!(matches!(cli.command, Command::Migrate));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));

        let cli = Cli::try_parse_from([
            "dryfruits",
            "create-superuser",
            "--email",
            "admin@example.com",
            "--no-input",
        ])
        .unwrap();
        match cli.command {
            Command::CreateSuperuser(args) => {
                assert_eq!(args.email.as_deref(), Some("admin@example.com"));
                assert!(args.no_input);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_input_requires_values() {
        let args = SuperuserArgs {
            no_input: true,
            ..SuperuserArgs::default()
        };
        assert!(matches!(
            args.resolve(),
            Err(BootstrapError::InvalidInput(_))
        ));

        let args = SuperuserArgs {
            email: Some("admin@example.com".to_string()),
            password: Some("s3cret-pass".to_string()),
            no_input: true,
            ..SuperuserArgs::default()
        };
        let input = args.resolve().unwrap();
        assert_eq!(input.password, input.password_confirm);
        assert!(input.first_name.is_empty());
    }
}
