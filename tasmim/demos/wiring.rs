//! Wiring a small application with providers.
//!
//! Run with `RUST_LOG=tasmim_container=debug` to see unification and
//! service creation.

use std::sync::Arc;

use tasmim::inventory;
use tasmim::prelude::*;

// === Define your types ===

struct Config {
    database_url: String,
}

struct Database {
    url: String,
    pool_size: i64,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        format!("[{} x{}] {sql}", self.url, self.pool_size)
    }
}

struct UserRepository {
    db: Arc<Database>,
    table: String,
    audited: bool,
}

impl UserRepository {
    fn find_user(&self, id: i64) -> String {
        self.db.query(&format!("SELECT * FROM {} WHERE id = {id}", self.table))
    }
}

// === Register their construction metadata ===

fn database() -> ClassDef {
    ClassDef::class("Database")
        .param("url")
        .param(ParamDef::new("pool_size").with_default(4))
        .constructor(|args| {
            Ok(Database {
                url: args.string(0)?,
                pool_size: args.int(1)?,
            })
        })
}

fn audited() -> ClassDef {
    ClassDef::interface("Audited")
}

fn repository() -> ClassDef {
    ClassDef::abstract_class("Repository")
        .implements("Audited")
        .param(ParamDef::new("db").with_type("Database"))
        .param("table")
}

fn user_repository() -> ClassDef {
    ClassDef::class("UserRepository")
        .extends("Repository")
        .param(ParamDef::new("db").with_type("Database"))
        .param(ParamDef::new("table").with_default("users"))
        .constructor(|args| {
            Ok(UserRepository {
                db: args.object::<Database>(0)?,
                table: args.string(1)?,
                audited: false,
            })
        })
        .setter("setAudited", |repo: &mut UserRepository, value: Value| {
            repo.audited = value.as_bool().unwrap_or(false);
            Ok(())
        })
}

inventory::submit! { ClassRegistration::new(database) }
inventory::submit! { ClassRegistration::new(repository) }
inventory::submit! { ClassRegistration::new(user_repository) }
inventory::submit! { ClassRegistration::new(audited) }

// === Group configuration into providers ===

struct StorageProvider {
    config: Config,
}

impl Provider for StorageProvider {
    fn define(&self, container: &mut Container) -> Result<()> {
        let config = container.config_mut()?;
        config.set_value("database.url", self.config.database_url.as_str());
        config.set_param("Database", "url", Container::lazy_value("database.url"));
        config.set_param("Repository", "db", Container::lazy_get("db"));
        config.set_setter("Audited", "setAudited", true);

        container.set("db", Container::lazy_new("Database"))?;
        container.set("users", Container::lazy_new("UserRepository"))
    }

    fn modify(&self, container: &Container) -> Result<()> {
        let db = container.get_as::<Database>("db")?;
        tracing::info!(url = %db.url, "Database ready");
        Ok(())
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("tasmim_container=debug")
        .init();

    let container = Container::builder()
        .provider(StorageProvider {
            config: Config {
                database_url: "postgres://localhost/app".to_string(),
            },
        })
        .build()?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    let users = container.get_as::<UserRepository>("users")?;
    println!("👤 {} (audited: {})", users.find_user(42), users.audited);

    // A one-off repository with a different table, sharing the same database
    let archive = container.new_instance_as::<UserRepository>(
        Blueprint::new("UserRepository").param("table", "archived_users"),
    )?;
    println!("🗄  {}", archive.find_user(7));
    assert!(Arc::ptr_eq(&users.db, &archive.db));

    println!("\n🎉 Everything works!");
    Ok(())
}
