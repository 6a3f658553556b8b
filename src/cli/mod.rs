// Administrative CLI: run the server, apply the generated schema and
// mint super-admin accounts (the only way to create a root account).

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::auth::{ROLE_ADMIN, ROLE_ROOT};
use crate::database::manager::DatabaseManager;
use crate::registry;
use crate::services::AdminService;

#[derive(Parser)]
#[command(name = "campus", about = "Campus API administration")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create tables and indexes generated from the resource registry
    Init,

    /// Super admin account management
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Create a super admin account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Grant the root role (unlocks cross-tenant listings)
        #[arg(long)]
        root: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { port } => crate::handlers::serve(port).await,
            Command::Init => init().await,
            Command::Admin { command } => admin(command).await,
        }
    }
}

async fn init() -> anyhow::Result<()> {
    for spec in registry::RESOURCES {
        spec.validate().map_err(anyhow::Error::msg)?;
    }

    let pool = DatabaseManager::pool().await.context("connecting to database")?;
    let statements = registry::ddl();
    for statement in &statements {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .with_context(|| format!("applying: {}", first_line(statement)))?;
    }

    println!("Applied {} statements for {} resources", statements.len(), registry::RESOURCES.len());
    Ok(())
}

async fn admin(command: AdminCommand) -> anyhow::Result<()> {
    match command {
        AdminCommand::Create { name, email, password, root } => {
            let pool = DatabaseManager::pool().await.context("connecting to database")?;
            let service = AdminService::new(pool);
            let role = if root { ROLE_ROOT } else { ROLE_ADMIN };

            let (admin, token) = service
                .register(&name, &email, &password, role)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            println!("Created super admin {} ({})", admin.email, admin.role);
            println!("School id: {}", admin.school_id);
            println!("Token: {}", token);
            Ok(())
        }
    }
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement)
}
