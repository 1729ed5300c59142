use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foodgram_backend::{
    actions::{create_tag, import_ingredients, set_user_role},
    catalog::parse_catalog,
    config::Config,
    schema::UserRole,
    validation::validate_tag,
    MIGRATOR,
};
use log::{error, info, warn};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

/// Administrative tasks run against the service database.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads the ingredient catalog from a `name,measurement_unit` CSV file
    ImportIngredients {
        #[arg(long)]
        path: PathBuf,
    },
    CreateTag {
        #[arg(long)]
        name: String,
        #[arg(long)]
        color: String,
        #[arg(long)]
        slug: String,
    },
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: UserRole,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args.command).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn connect(config: &Config) -> Result<Pool<Postgres>, Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

fn describe(error: potion::Error) -> String {
    error.info.unwrap_or_else(|| "Query failed".to_string())
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match command {
        Command::ImportIngredients { path } => {
            let content = tokio::fs::read_to_string(&path).await?;
            let rows = parse_catalog(&content)?;

            let pool = connect(&config).await?;
            let inserted = import_ingredients(&rows, &pool).await.map_err(describe)?;
            info!(
                "Imported {inserted} new ingredients ({} rows read from {})",
                rows.len(),
                path.display()
            );
        }
        Command::CreateTag { name, color, slug } => {
            validate_tag(&name, &color, &slug)?;

            let pool = connect(&config).await?;
            match create_tag(&name, &color, &slug, &pool).await.map_err(describe)? {
                Some(tag) => info!("Created tag {} ({})", tag.slug, tag.id),
                None => warn!("A tag with the same name, color or slug already exists"),
            }
        }
        Command::SetRole { email, role } => {
            let pool = connect(&config).await?;
            if set_user_role(&email, role.clone(), &pool).await.map_err(describe)? {
                info!("{email} is now {role:?}");
            } else {
                warn!("No user with email {email}");
            }
        }
    }

    Ok(())
}
