use anyhow::Context;
use clap::{Parser, Subcommand};
use estante_kernel::settings::{DatabaseSettings, Settings};

#[derive(Debug, Parser)]
#[command(name = "estante", version, about = "Book catalog API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API until Ctrl-C
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load and validate configuration, then exit
    CheckConfig,
    /// Print the merged OpenAPI document
    Openapi,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load Estante settings")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            estante_telemetry::init(&settings.telemetry)?;
            runtime.block_on(estante_app::run(settings))
        }
        Command::CheckConfig => {
            let modules = runtime.block_on(async {
                let state = estante_app::AppState::from_settings(&settings).await?;
                let registry = estante_app::prepare(&state, &settings).await?;
                state.db.close().await;
                anyhow::Ok(registry.len())
            })?;
            println!(
                "configuration ok: env={:?} listen={}:{} modules={} users={} scopes={}",
                settings.environment,
                settings.server.host,
                settings.server.port,
                modules,
                settings.auth.users.len(),
                settings.throttle.rates.len()
            );
            Ok(())
        }
        Command::Openapi => {
            settings.database = DatabaseSettings::in_memory();
            let state = runtime.block_on(estante_app::AppState::from_settings(&settings))?;
            let registry = estante_app::registry(&state);
            let doc = estante_http::router::merged_openapi(&registry);
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
    }
}
