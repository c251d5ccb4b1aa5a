use std::{process, sync::Arc};

use clap::Parser;
use itertools::Itertools;
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use turf_rating::{
    args::Args,
    config::ServiceConfig,
    database::db::DbClient,
    messaging::RatingEventPublisher,
    service::RatingService,
    utils::progress_utils::progress_bar
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = ServiceConfig::from_env();
    info!(?config, "Loaded service configuration");

    let client = match DbClient::connect(&args.connection_string).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            process::exit(1);
        }
    };

    let mut service = RatingService::new(client.clone(), client.clone(), config);
    if args.publish {
        match connect_publisher().await {
            Some(publisher) => service = service.with_publisher(publisher),
            None => warn!("Publishing requested but no RabbitMQ publisher is available")
        }
    }

    let mut horse_ids = args.horse_ids.clone();
    if args.all_current {
        match client.get_rated_horse_ids().await {
            Ok(ids) => horse_ids.extend(ids),
            Err(e) => {
                error!(error = %e, "Failed to fetch rated horses");
                process::exit(1);
            }
        }
    }
    let horse_ids = horse_ids.into_iter().unique().collect_vec();

    recalculate(&service, &horse_ids).await;

    if args.statistics {
        match service.get_statistics().await {
            Ok(statistics) => match serde_json::to_string_pretty(&statistics) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "Failed to serialize statistics")
            },
            Err(e) => error!(code = e.code(), error = %e, "Failed to compute statistics")
        }
    }

    for (operation, summary) in service.monitor_summary() {
        info!(
            operation,
            count = summary.count,
            failures = summary.failures,
            average_ms = summary.average_ms,
            p95_ms = summary.p95_ms,
            "Operation summary"
        );
    }
}

fn init_tracing(log_level: &str) {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .try_init();
}

#[cfg(feature = "messaging")]
async fn connect_publisher() -> Option<Arc<dyn RatingEventPublisher>> {
    use turf_rating::messaging::{RabbitMqConfig, RabbitMqPublisher};

    let config = match RabbitMqConfig::from_env() {
        Ok(config) if config.enabled => config,
        Ok(_) => {
            info!("RabbitMQ publishing disabled (RABBITMQ_ENABLED is not set)");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Missing RabbitMQ configuration");
            return None;
        }
    };

    match RabbitMqPublisher::connect_from_config(&config).await {
        Ok(publisher) => Some(Arc::new(publisher)),
        Err(e) => {
            warn!(error = %e, "Failed to connect to RabbitMQ");
            None
        }
    }
}

#[cfg(not(feature = "messaging"))]
async fn connect_publisher() -> Option<Arc<dyn RatingEventPublisher>> {
    warn!("Built without the messaging feature");
    None
}

async fn recalculate(service: &RatingService, horse_ids: &[i32]) {
    if horse_ids.is_empty() {
        info!("No horses selected for recalculation");
        return;
    }

    info!(horses = horse_ids.len(), "Recalculating ratings");
    let bar = progress_bar(horse_ids.len() as u64, "Calculating ratings".to_string());

    let mut failed = 0;
    for &horse_id in horse_ids {
        if let Err(e) = service.on_new_race_result(horse_id).await {
            failed += 1;
            if e.is_client_error() || e.is_recoverable() {
                warn!(horse_id, code = e.code(), error = %e, "Skipped horse");
            } else {
                error!(horse_id, code = e.code(), error = %e, "Failed to calculate rating");
            }
        }
        bar.inc(1);
    }
    bar.finish();

    info!(succeeded = horse_ids.len() - failed, failed, "Recalculation complete");
}
