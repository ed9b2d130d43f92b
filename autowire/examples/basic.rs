//! Basic example of the autowire container.

use std::sync::Arc;

use autowire::prelude::*;
use parking_lot::Mutex;

// === Define your types and their metadata ===

struct ConsoleLogger;

impl ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
}

struct Database {
    url: String,
    logger: Arc<ConsoleLogger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserService {
    db: Arc<Database>,
    logger: Mutex<Option<Arc<ConsoleLogger>>>,
}

impl UserService {
    fn get_user(&self, id: i64) -> String {
        if let Some(logger) = self.logger.lock().as_ref() {
            logger.log(&format!("Getting user {id}"));
        }
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

fn missing(target: &str, what: &str) -> ContainerError {
    ContainerError::invocation(target, format!("{what} missing"))
}

fn classes() -> Vec<ClassDefinition> {
    vec![
        ClassDefinition::new("ConsoleLogger").without_constructor(|| ConsoleLogger),
        ClassDefinition::new("Config").constructor(
            [ParameterDescriptor::new("url")
                .typed("string")
                .default_value("postgres://localhost/myapp")],
            |_, args| {
                let url = args.get(0).and_then(Value::as_str).ok_or_else(|| missing("Config", "url"))?;
                Ok(Config { database_url: url.to_string() })
            },
        ),
        ClassDefinition::new("Database").constructor(
            [
                ParameterDescriptor::new("config").typed("Config"),
                ParameterDescriptor::new("logger").typed("Logger"),
            ],
            |_, args| {
                let config = args.object::<Config>(0).ok_or_else(|| missing("Database", "config"))?;
                let logger = args.object::<ConsoleLogger>(1).ok_or_else(|| missing("Database", "logger"))?;
                Ok(Database { url: config.database_url.clone(), logger })
            },
        ),
        ClassDefinition::new("UserService")
            .constructor([ParameterDescriptor::new("db").typed("Database")], |_, args| {
                let db = args.object::<Database>(0).ok_or_else(|| missing("UserService", "db"))?;
                Ok(UserService { db, logger: Mutex::new(None) })
            })
            // receives the "Logger" entry after construction
            .capability::<UserService, _>("LoggerAware", |service, logger| {
                *service.logger.lock() = logger.downcast::<ConsoleLogger>();
                Ok(())
            })
            .method(MethodDefinition::public::<UserService, _>(
                "find",
                [ParameterDescriptor::new("id").typed("int")],
                |_, service, args| {
                    let id = args.get(0).and_then(Value::as_int).unwrap_or_default();
                    Ok(Value::from(service.get_user(id)))
                },
            )),
    ]
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("autowire_container=debug")
        .init();

    let container = classes()
        .into_iter()
        .fold(Container::builder(), ContainerBuilder::class)
        .alias(["Logger"], "ConsoleLogger")
        .build()?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    // === Shared instances ===
    let service = container.get("UserService")?;
    let service = service
        .downcast::<UserService>()
        .ok_or_else(|| missing("main", "UserService"))?;
    println!("👤 {}", service.get_user(42));

    // === Autowired method calls ===
    let found = container.call("UserService@find", Parameters::positional([7]))?;
    println!("👤 {}", found.as_str().unwrap_or_default());

    // === Fresh instances with overrides ===
    let config = container.make("Config", Parameters::named([("url", "sqlite::memory:")]))?;
    if let Some(config) = config.downcast::<Config>() {
        println!("📋 Config: database_url={}", config.database_url);
    }

    println!("\n🎉 Everything works!");
    Ok(())
}
