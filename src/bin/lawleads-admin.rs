//! Operator tool for the lead-capture backend.
//!
//! Usage:
//!   lawleads-admin grant-admin --email ops@firm.com
//!   lawleads-admin seed-demo [--password Demo2024!]
//!   lawleads-admin signup --email a@b.com --password secret1 --firm-name Acme --firm-slug acme
//!   lawleads-admin login --email a@b.com --password secret1 [--route /acme/back/leads]
//!
//! Reads DATABASE_URL and JWT_SECRET from the environment (or .env).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lawleads_api::{
    config::Config,
    db::{self, postgres::PgStore, store::Stores},
    models::{
        account::SignupProfile,
        auth::{LoginRequest, SignupRequest},
        lead::NewLead,
        principal::Role,
    },
    portal::Portal,
    services::{
        auth::{normalize_email, AuthService},
        identity::LocalIdentityProvider,
        provisioning::ProvisioningQueue,
    },
};

#[derive(Parser)]
#[command(name = "lawleads-admin", about = "Operator commands for the lead-capture backend")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Give an existing account the admin role
    GrantAdmin {
        #[arg(long)]
        email: String,
    },
    /// Create the demo firms with a few leads each
    SeedDemo {
        #[arg(long, default_value = "Demo2024!")]
        password: String,
    },
    /// Sign up through the portal and print the navigation target
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        firm_name: String,
        #[arg(long)]
        firm_slug: String,
    },
    /// Sign in through the portal; with --route, also print the guard decision
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        route: Option<String>,
    },
}

const DEMO_FIRMS: &[(&str, &str, &str)] = &[
    ("Demo Law Firm", "demo", "demo@lawfirm.com"),
    ("Test Firm LLC", "test-firm", "test@example.com"),
    ("Smith & Jones", "smith-jones", "legal@smithjones.com"),
    ("Legal Consultants Group", "legal-consultants", "info@legalconsult.com"),
    ("Law Partners Association", "law-partners", "admin@lawpartners.com"),
];

const DEMO_LEADS: &[(&str, &str, &str)] = &[
    ("John Smith", "john.smith@example.com", "(555) 123-4567"),
    ("Sarah Johnson", "sarah.j@example.com", "(555) 987-6543"),
    ("Michael Davis", "mdavis@example.com", "(555) 555-5555"),
    ("Emily Wilson", "emily.wilson@example.com", "(555) 222-3333"),
    ("Robert Brown", "rbrown@example.com", "(555) 444-1111"),
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool).await?;
    let stores = Stores::from_backend(Arc::new(PgStore::new(pool)));

    match args.command {
        Command::GrantAdmin { email } => {
            let account = stores
                .accounts
                .find_by_email(&normalize_email(&email))
                .await?
                .with_context(|| format!("No account for {email}"))?;
            stores.memberships.set_role(account.id, Role::Admin).await?;
            println!("{} is now an admin", account.email);
        }
        Command::SeedDemo { password } => seed_demo(&stores, &password).await?,
        Command::Signup { email, password, firm_name, firm_slug } => {
            let portal = portal(&stores, &config);
            let form = SignupRequest { email, password, firm_name, firm_slug };
            let target = portal.sign_up(&form).await?;
            println!("{target}");
        }
        Command::Login { email, password, route } => {
            let portal = portal(&stores, &config);
            let target = portal.login(&LoginRequest { email, password }).await?;
            println!("{target}");
            if let Some(route) = route {
                let decision = portal.visit(&route).await;
                match decision.redirect_path() {
                    Some(to) => println!("{route}: {decision:?} -> {to}"),
                    None => println!("{route}: {decision:?}"),
                }
            }
        }
    }

    Ok(())
}

fn portal(stores: &Stores, config: &Config) -> Portal {
    let queue = ProvisioningQueue::start(stores.clone());
    let identity = Arc::new(LocalIdentityProvider::new(
        stores.accounts.clone(),
        queue,
        config.jwt_secret.clone(),
        config.jwt_expiry_seconds,
    ));
    Portal::new(identity, stores.clone(), config.signup_poll.clone())
}

async fn seed_demo(stores: &Stores, password: &str) -> Result<()> {
    println!("=== Seed demo firms ===");
    for (name, slug, email) in DEMO_FIRMS {
        if stores.firms.find_by_slug(slug).await?.is_some() {
            println!("  {slug}: already present, skipped");
            continue;
        }

        let account = match stores.accounts.find_by_email(email).await? {
            Some(account) => account,
            None => AuthService::create_plain_account(stores.accounts.as_ref(), email, password).await?,
        };
        let profile = SignupProfile { firm_name: name.to_string(), firm_slug: slug.to_string() };
        let firm = stores.firms.provision_for_account(account.id, email, &profile).await?;

        for (full_name, lead_email, phone) in DEMO_LEADS {
            let lead = NewLead {
                full_name: full_name.to_string(),
                email: lead_email.to_string(),
                phone: phone.to_string(),
            };
            stores.leads.insert(firm.id, &lead).await?;
        }
        println!("  {slug}: {name} <{email}> with {} leads", DEMO_LEADS.len());
    }
    Ok(())
}
