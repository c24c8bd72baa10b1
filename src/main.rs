//! # Notifications CLI
//!
//! Operates the notification store from the command line: run migrations,
//! create notifications, list or count what a principal can see, and mark
//! notifications read. Results are printed as JSON.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notifications::{
    config::{AppConfig, ConfigLoader},
    db,
    directory::InMemoryDirectory,
    events::EventBus,
    repositories::ObserverLinkRepository,
    telemetry::init_tracing,
    CreateNotification, EntityRef, NotificationFactory, NotificationStore, ObserverKind,
    ObserverRef, ObserverResolver, ReadFilter, Scope, TypeRegistry,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "notifications", version, about = "Polymorphic notification store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// List the variants registered through NOTIFY_VARIANTS
    Variants,
    /// Create a notification and attach its observers
    Create {
        /// Variant tag, e.g. `liked`
        #[arg(long)]
        variant: String,
        /// Observer as `user:<uuid>`, `role:<uuid>` or `permission:<uuid>` (repeatable)
        #[arg(long = "observer")]
        observers: Vec<ObserverRef>,
        /// Sender as `<kind>:<uuid>`
        #[arg(long)]
        sender: Option<EntityRef>,
        /// Subject as `<kind>:<uuid>`
        #[arg(long)]
        subject: Option<EntityRef>,
        /// JSON payload
        #[arg(long)]
        data: Option<String>,
    },
    /// List notifications visible to a principal, newest first
    List(VisibilityArgs),
    /// Count notifications visible to a principal
    Count(VisibilityArgs),
    /// Mark a notification read for a principal
    MarkRead {
        #[arg(long)]
        principal: Uuid,
        #[arg(long)]
        notification: Uuid,
    },
    /// Show the live observer links of a notification
    Observers {
        #[arg(long)]
        notification: Uuid,
        /// Restrict to `user`, `role` or `permission`
        #[arg(long)]
        kind: Option<ObserverKind>,
        /// Include soft-deleted links
        #[arg(long)]
        with_deleted: bool,
    },
}

#[derive(Debug, Args)]
struct VisibilityArgs {
    #[arg(long)]
    principal: Uuid,
    /// `unread`, `read` or `any`
    #[arg(long, default_value = "unread")]
    filter: ReadFilter,
    /// Restrict to one variant
    #[arg(long)]
    variant: Option<String>,
    /// Role held by the principal (repeatable)
    #[arg(long = "role")]
    roles: Vec<Uuid>,
    /// Permission granted to a role, as `<role-uuid>:<permission-uuid>` (repeatable)
    #[arg(long = "grant")]
    grants: Vec<RoleGrant>,
}

#[derive(Debug, Clone, Copy)]
struct RoleGrant {
    role: Uuid,
    permission: Uuid,
}

impl FromStr for RoleGrant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (role, permission) = value
            .split_once(':')
            .ok_or_else(|| format!("expected '<role>:<permission>', got '{value}'"))?;
        Ok(Self {
            role: Uuid::parse_str(role.trim()).map_err(|e| e.to_string())?,
            permission: Uuid::parse_str(permission.trim()).map_err(|e| e.to_string())?,
        })
    }
}

impl VisibilityArgs {
    fn directory(&self) -> InMemoryDirectory {
        let mut directory = InMemoryDirectory::new();
        for role in &self.roles {
            directory.grant_role(self.principal, *role);
        }
        for grant in &self.grants {
            directory.grant_permission(grant.role, grant.permission);
        }
        directory
    }

    fn scope(&self, registry: &TypeRegistry) -> Result<Scope> {
        match &self.variant {
            Some(tag) => Ok(Scope::Sub(registry.resolve(tag)?)),
            None => Ok(Scope::Super),
        }
    }
}

struct App {
    config: AppConfig,
    db: Arc<sea_orm::DatabaseConnection>,
    registry: Arc<TypeRegistry>,
}

impl App {
    async fn connect(config: AppConfig) -> Result<Self> {
        let registry = TypeRegistry::from_specs(&config.notifications, &config.variants)
            .context("registering configured variants")?;
        let db = db::init_pool(&config)
            .await
            .context("initializing database connection pool")?;
        Ok(Self {
            config,
            db: Arc::new(db),
            registry: Arc::new(registry),
        })
    }

    fn resolver(&self, directory: InMemoryDirectory) -> ObserverResolver {
        ObserverResolver::new(
            NotificationStore::new(self.db.clone(), self.registry.clone()),
            ObserverLinkRepository::new(self.db.clone()),
            Arc::new(directory),
            &self.config.notifications,
        )
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let app = App::connect(config).await?;

    match cli.command {
        Command::Migrate => {
            db::migrate(&app.db).await.context("running migrations")?;
            info!("Migrations applied");
        }
        Command::Variants => {
            let variants: Vec<JsonValue> = app
                .registry
                .variants()
                .iter()
                .map(|v| {
                    serde_json::json!({
                        "name": v.name(),
                        "tag": v.tag(),
                        "code": v.code(),
                        "discriminator": v.discriminator(app.registry.type_format()),
                    })
                })
                .collect();
            print_json(&variants)?;
        }
        Command::Create {
            variant,
            observers,
            sender,
            subject,
            data,
        } => {
            let data = data
                .as_deref()
                .map(serde_json::from_str::<JsonValue>)
                .transpose()
                .context("parsing --data as JSON")?;
            let events = Arc::new(EventBus::new(app.config.event_channel_capacity));
            let factory = NotificationFactory::new(app.db.clone(), app.registry.clone(), events);
            let notification = factory
                .create(CreateNotification {
                    variant,
                    observers,
                    sender,
                    subject,
                    data,
                })
                .await?;
            print_json(&notification)?;
        }
        Command::List(args) => {
            let scope = args.scope(&app.registry)?;
            let resolver = app.resolver(args.directory());
            let notifications = resolver.fetch(&scope, args.principal, args.filter).await?;
            print_json(&notifications)?;
        }
        Command::Count(args) => {
            let scope = args.scope(&app.registry)?;
            let resolver = app.resolver(args.directory());
            let count = resolver.count(&scope, args.principal, args.filter).await?;
            print_json(&serde_json::json!({ "count": count }))?;
        }
        Command::MarkRead {
            principal,
            notification,
        } => {
            let resolver = app.resolver(InMemoryDirectory::new());
            let link = resolver.mark_read(principal, notification).await?;
            print_json(&link)?;
        }
        Command::Observers {
            notification,
            kind,
            with_deleted,
        } => {
            let links = ObserverLinkRepository::new(app.db.clone());
            let views = if with_deleted {
                links.with_deleted(notification, kind).await?
            } else {
                links.observers_of(notification, kind).await?
            };
            print_json(&views)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing telemetry")?;

    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(profile = %config.profile, config = %redacted_json, "Loaded configuration");
    }

    run(cli, config).await
}
