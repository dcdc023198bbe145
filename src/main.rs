mod aggregate {
    pub mod city;
    pub mod country;
    pub mod fixture;
    pub mod row;
}
mod db {
    pub mod checkpoint;
    pub mod util;
}
mod service {
    pub mod driver_service;
    pub mod file_service;
    pub mod fixture_service;
    pub mod log_service;
    pub mod sheet_service;
    pub mod var_service;
}
mod translate {
    pub mod client;
    pub mod page;
    pub mod pool;
    pub mod session;
    #[cfg(test)]
    pub mod testing;
}
mod error;
mod prelude;

use prelude::*;
use service::{
    fixture_service::run,
    log_service::set_logging,
    var_service::{get_log_level, Config},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    set_logging(get_log_level()?)?;
    let config = Config::from_env()?;

    tracing::info!(
        "Building fixtures from {} into {}",
        config.input_path.display(),
        config.output_dir.display()
    );
    if let Err(e) = run(&config).await {
        tracing::error!("Run failed: {:#}", e);
        return Err(e);
    }

    tracing::info!("Done");
    Ok(())
}
