use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{error, info, warn};

use wealthsplit::{
    app,
    config::Config,
    seed,
    store::{InMemoryStore, MongoStore, Store},
    telemetry, Ledger, Wealth,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init();

    let config = Config::from_env().map_err(|err| {
        error!(%err, "invalid configuration");
        std::io::Error::other(err)
    })?;

    let store: Arc<dyn Store> = match &config.mongodb {
        Some(mongo) => {
            info!(database = %mongo.database, "using mongodb store");
            let store = MongoStore::connect(&mongo.uri, &mongo.database)
                .await
                .map_err(|err| {
                    error!(%err, "failed to connect to mongodb");
                    std::io::Error::other(err)
                })?;
            Arc::new(store)
        }
        None => {
            warn!("MONGODB_URI not set; data lives in memory only");
            Arc::new(InMemoryStore::new())
        }
    };

    if config.seed_demo_data {
        seed::demo(store.as_ref())
            .await
            .map_err(std::io::Error::other)?;
    }

    let ledger = web::Data::new(Ledger::new(store.clone()));
    let wealth = web::Data::new(Wealth::new(store));
    let bind_addr = config.bind_addr.clone();
    let config = web::Data::new(config);

    info!(%bind_addr, "listening");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(app::cors(&config.cors_origins))
            .app_data(ledger.clone())
            .app_data(wealth.clone())
            .app_data(config.clone())
            .configure(app::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
