use clap::{Parser, Subcommand};
use std::sync::Arc;

mod domain;
mod application;
mod infrastructure;
mod plugins;

use application::messaging::MessageParser;
use application::services::{CommandService, PluginAdminService, SharedCommandService};
use domain::entities::{Content, PermissionLevel, User};
use domain::traits::Bot;
use infrastructure::adapters::ConsoleAdapter;
use infrastructure::config::Config;
use infrastructure::storage::JsonRegistryStore;
use plugins::PluginManager;

#[derive(Parser)]
#[command(name = "darkrai-bot")]
#[command(about = "A modular chat bot with runtime plugin management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Run one plugin admin command, e.g. `plugins list` or `plugins info example`
    Plugins {
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

/// Everything the chat loop needs, wired once at startup
struct App {
    config: Config,
    commands: SharedCommandService,
    admin: PluginAdminService,
}

impl App {
    fn build(config: Config) -> Self {
        let mut commands = CommandService::new(&config.bot.prefix);
        commands.register_defaults();
        let commands = commands.shared();

        let runtime = Arc::new(plugins::builtin::runtime(commands.clone(), &config.bot.name));
        let store = Arc::new(JsonRegistryStore::new(&config.plugins.registry_path));
        let manager = Arc::new(PluginManager::from_config(&config.plugins, runtime, store));
        let admin = PluginAdminService::new(manager, config.plugins.critical.clone(), &config.bot.prefix);

        Self { config, commands, admin }
    }

    fn manager(&self) -> &Arc<PluginManager> {
        self.admin.manager()
    }
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => with_runtime(run_bot(load_config(&cli.config))),
        Commands::Version => {
            println!("darkrai-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
        Commands::Plugins { args } => with_runtime(run_admin(load_config(&cli.config), args)),
    }
}

fn with_runtime<F: std::future::Future<Output = ()>>(fut: F) {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(fut),
        Err(e) => tracing::error!("Failed to start async runtime: {}", e),
    }
}

fn load_config(config_path: &str) -> Config {
    if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    }
}

async fn run_bot(config: Config) {
    tracing::info!("Starting {}", config.bot.name);
    let app = App::build(config);

    let results = app.manager().start(app.config.plugins.auto_load).await;
    for (name, ok) in &results {
        if !ok {
            tracing::warn!("Plugin {} failed to load at startup", name);
        }
    }
    let stats = app.manager().stats().await;
    tracing::info!(
        "Plugin system initialized: {}/{} loaded ({})",
        stats.loaded, stats.total, stats.success_rate
    );

    let bot = ConsoleAdapter::new(&app.config.bot.name);
    run_console_bot(&bot, &app).await;
}

/// One-shot admin command against the persisted registry
async fn run_admin(config: Config, args: Vec<String>) {
    let app = App::build(config);
    app.manager().restore().await;
    app.manager().discover().await;

    let reply = app.admin.handle(&args, PermissionLevel::Owner).await;
    println!("{}", reply);
}

async fn run_console_bot<B: Bot>(bot: &B, app: &App) {
    if let Err(e) = bot.start().await {
        tracing::error!("Failed to start bot: {}", e);
        return;
    }

    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let parser = MessageParser::new(&app.config.bot.prefix);

    while let Some(line) = bot.next_input().await {
        let message = parser
            .parse(&info.id, line, Some(User::new(&info.id).with_username(&info.name)))
            .with_platform("console");
        let level = app.config.permissions.level_for(message.sender_id());
        if let Some(sender) = &message.sender {
            tracing::debug!(
                "[{}] {} {} {} ({}): {:?}",
                message.platform,
                message.timestamp.format("%H:%M:%S"),
                message.id,
                sender,
                level,
                message.content
            );
        }

        let reply = match &message.content {
            Content::Empty => continue,
            Content::Text(text) => format!("Echo: {}", text),
            Content::Command { name, args } if PluginAdminService::matches(name) => {
                app.admin.handle(args, level).await
            }
            Content::Command { .. } => match app.commands.read().await.handle(&message, level) {
                Ok(Some(response)) => response,
                Ok(None) => continue,
                Err(e) => format!("Error: {}", e),
            },
        };

        if let Err(e) = bot.send_message(&message.chat_id, &reply).await {
            tracing::warn!("Failed to send reply: {}", e);
        }
    }

    tracing::info!("Input closed, shutting down");
}

fn init_config() {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render default config: {}", e),
    }
}
