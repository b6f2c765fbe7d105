use std::process::ExitCode;
use std::sync::Arc;

use phoning::orm::{Db, auto_migrate};
use phoning::pipeline::Pipeline;
use phoning::router::{AppState, run};
use phoning::settings::Settings;
use phoning::sheets::{GoogleSheetsClient, SheetMirror};
use phoning::store::SqliteVolunteerStore;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if settings.debug {
        log::warn!("Debug mode enabled");
    }

    match start(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server exited with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(settings: Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = Arc::new(Db::connect(&settings.database_url).await?);
    auto_migrate(db.clone()).await?;

    // Credentials are resolved once; a bad key disables the mirror, not the service.
    let mirror = match &settings.sheets {
        Some(sheet) => match sheet.credentials.load() {
            Ok(credentials) => {
                log::info!(
                    "Mirroring submissions to spreadsheet {}",
                    sheet.spreadsheet_id
                );
                let client = GoogleSheetsClient::new(
                    credentials,
                    sheet.spreadsheet_id.clone(),
                    sheet.sheet_name.clone(),
                );
                Some(SheetMirror::new(Arc::new(client)))
            }
            Err(e) => {
                log::error!("Spreadsheet mirror disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let store = Arc::new(SqliteVolunteerStore::new(db.clone()));
    let state = AppState {
        db,
        pipeline: Pipeline::new(store, mirror),
        settings: Arc::new(settings),
    };
    run(state).await
}
