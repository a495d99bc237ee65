#![cfg(not(tarpaulin_include))]

use confgrid::app;
use confgrid::storage::Storage;
use std::env;

/// Main entry point for the configuration editor server.
///
/// # Arguments
/// * Optional first CLI argument: TCP port (default 3000)
///
/// # Environment
/// * `CONFGRID_DATA_DIR` - root of the org/module data tree (default `data/users`)
/// * `CONFGRID_MIRROR_DIR` - optional legacy mirror root written on every save
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let port: u16 = args.get(1).and_then(|p| p.parse().ok()).unwrap_or(3000);

    let data_dir = env::var("CONFGRID_DATA_DIR").unwrap_or_else(|_| "data/users".to_string());
    let mut storage = Storage::new(&data_dir);
    if let Ok(mirror_dir) = env::var("CONFGRID_MIRROR_DIR") {
        storage = storage.with_mirror(mirror_dir);
    }

    app::run(port, storage).await
}
