mod catalog_cmds;
mod company_cmds;
mod compile_cmd;
mod config;
mod serve_cmd;
mod task_cmds;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

use dissolve_db::pool;

use config::DissolveConfig;

#[derive(Parser)]
#[command(name = "dissolve", about = "Dissolution workflow schedule compiler")]
struct Cli {
    /// Database URL (overrides DISSOLVE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Step catalog TOML (overrides DISSOLVE_CATALOG env var)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a dissolve config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/dissolve")]
        db_url: String,
        /// Catalog TOML to use instead of the built-in playbook
        #[arg(long)]
        catalog_file: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the dissolve database
    DbInit,
    /// Company management
    Company {
        #[command(subcommand)]
        command: CompanyCommands,
    },
    /// Inspect or validate the step catalog (no database required)
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Compile a company's dissolution plan (no-op if already compiled)
    Compile {
        /// Company ID
        company_id: String,
    },
    /// Show a company's roadmap, one row per step
    Roadmap {
        /// Company ID
        company_id: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Serve the roadmap HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Print shell completions to stdout
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CompanyCommands {
    /// Record a company and its intake facts
    Create {
        /// Company name
        name: String,
        /// The company owns intellectual property
        #[arg(long = "ip")]
        intellectual_property: bool,
        /// The company intends to sell its assets
        #[arg(long)]
        asset_sale: bool,
        /// Offers for the assets have been received
        #[arg(long)]
        received_offers: bool,
        /// The company has outstanding financial obligations
        #[arg(long)]
        financial_obligations: bool,
        /// The company has employees
        #[arg(long)]
        employees: bool,
    },
    /// List all companies
    List,
    /// Show a company's facts and plan status
    Show {
        /// Company ID
        company_id: String,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Print the active catalog
    Show,
    /// Validate a catalog and flag edges to conditionally skipped steps
    Check {
        /// Catalog file to check (defaults to the active catalog)
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List a company's tasks
    List {
        /// Company ID
        company_id: String,
    },
    /// Mark a task as assigned
    Assign {
        /// Task ID
        task_id: String,
    },
    /// Record task progress
    Progress {
        /// Task ID
        task_id: String,
        /// Percent complete, 0-100
        progress: i32,
    },
}

/// Parse a UUID argument, naming the kind of ID in the error.
pub fn parse_id(kind: &str, raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid {kind} ID: {raw}"))
}

/// Execute the `dissolve init` command: write config file.
fn cmd_init(db_url: &str, catalog: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(ref catalog_path) = catalog {
        dissolve_core::StepTemplateCatalog::from_path(catalog_path)?;
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        schedule: config::ScheduleSection {
            catalog: catalog.clone(),
        },
    };

    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(catalog_path) = catalog {
        println!("  schedule.catalog = {}", catalog_path.display());
    }
    println!();
    println!("Next: run `dissolve db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `dissolve db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &DissolveConfig) -> anyhow::Result<()> {
    let bootstrap = pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let version = pool::run_migrations(&db_pool).await?;
    let summary = pool::summarize(&db_pool).await;
    db_pool.close().await;
    let summary = summary?;

    match bootstrap {
        pool::Bootstrap::Created => println!("Database created."),
        pool::Bootstrap::AlreadyPresent => println!("Database already present."),
    }
    println!("Schema version {version}.");
    println!("  companies:       {}", summary.companies);
    println!("  compiled plans:  {}", summary.compiled_plans);
    println!("  scheduled tasks: {}", summary.scheduled_tasks);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Commands that need no resolved configuration.
    let command = match cli.command {
        Commands::Init {
            db_url,
            catalog_file,
            force,
        } => return cmd_init(&db_url, catalog_file, force),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dissolve", &mut std::io::stdout());
            return Ok(());
        }
        other => other,
    };

    let resolved = DissolveConfig::resolve(cli.database_url.as_deref(), cli.catalog.as_deref())?;

    if let Commands::Catalog { command } = command {
        return catalog_cmds::run_catalog_command(command, &resolved);
    }
    if let Commands::DbInit = command {
        return cmd_db_init(&resolved).await;
    }

    let catalog = resolved.load_catalog()?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;

    let result = match command {
        Commands::Company { command } => company_cmds::run_company_command(command, &db_pool).await,
        Commands::Compile { company_id } => {
            compile_cmd::run_compile(&db_pool, &catalog, &company_id).await
        }
        Commands::Roadmap { company_id, json } => {
            compile_cmd::run_roadmap(&db_pool, &catalog, &company_id, json).await
        }
        Commands::Task { command } => task_cmds::run_task_command(command, &db_pool).await,
        Commands::Serve { bind, port } => {
            let state = serve_cmd::AppState {
                pool: db_pool.clone(),
                catalog: Arc::new(catalog),
            };
            serve_cmd::run_serve(state, &bind, port).await
        }
        Commands::Init { .. }
        | Commands::Completions { .. }
        | Commands::Catalog { .. }
        | Commands::DbInit => Ok(()),
    };

    db_pool.close().await;
    result
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_company_create_flags() {
        let cli = Cli::try_parse_from([
            "dissolve", "company", "create", "Acme", "--ip", "--employees",
        ])
        .unwrap();
        let Commands::Company {
            command:
                CompanyCommands::Create {
                    name,
                    intellectual_property,
                    asset_sale,
                    employees,
                    ..
                },
        } = cli.command
        else {
            panic!("expected company create");
        };
        assert_eq!(name, "Acme");
        assert!(intellectual_property);
        assert!(!asset_sale);
        assert!(employees);
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dissolve",
            "roadmap",
            "00000000-0000-0000-0000-000000000000",
            "--json",
            "--database-url",
            "postgresql://h:5432/d",
        ])
        .unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://h:5432/d"));
        assert!(matches!(cli.command, Commands::Roadmap { json: true, .. }));
    }

    #[test]
    fn parse_id_names_the_kind() {
        assert!(parse_id("task", "00000000-0000-0000-0000-000000000000").is_ok());
        let err = parse_id("company", "nope").unwrap_err();
        assert_eq!(err.to_string(), "invalid company ID: nope");
    }
}
