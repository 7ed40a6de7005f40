use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use payments_outbox::modules::payments::adapters::outbound::integration_events::payment_repository;
use payments_outbox::modules::payments::core::payment::PaymentMethod;
use payments_outbox::modules::payments::use_cases::complete_payment::command::CompletePayment;
use payments_outbox::modules::payments::use_cases::complete_payment::handler::CompletePaymentHandler;
use payments_outbox::modules::payments::use_cases::create_payment::command::CreatePayment;
use payments_outbox::modules::payments::use_cases::create_payment::handler::CreatePaymentHandler;
use payments_outbox::shared::core::clock::{Clock, SystemClock};
use payments_outbox::shared::infrastructure::event_bus::log::LogPublisher;
use payments_outbox::shared::infrastructure::persistence::in_memory::InMemoryDatabase;
use payments_outbox::shell::config::OutboxConfig;
use payments_outbox::shell::workers::OutboxWorkers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = OutboxConfig::from_env()?;
    tracing::info!(?config, "configuration loaded");

    // In-memory deps for now
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let database = Arc::new(
        InMemoryDatabase::new()
            .with_clock(clock.clone())
            .with_claim_timeout(config.claim_timeout),
    );
    let publisher = Arc::new(LogPublisher::new("payments.v1"));
    let repository = Arc::new(payment_repository(
        database.clone(),
        clock.clone(),
        config.max_attempts,
    ));

    let workers = OutboxWorkers::start(&config, database.clone(), publisher, clock.clone());

    let create = CreatePaymentHandler::new(repository.clone(), clock.clone());
    let complete = CompletePaymentHandler::new(repository, clock);
    let payment_id = create
        .handle(CreatePayment {
            order_id: Uuid::now_v7(),
            amount_minor: 4_999,
            currency: "EUR".to_string(),
            method: PaymentMethod::Card,
        })
        .await?;
    complete
        .handle(CompletePayment {
            payment_id,
            transaction_id: format!("demo-{}", Uuid::now_v7()),
        })
        .await?;
    tracing::info!(%payment_id, "demo payment completed; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    workers.stop().await;
    Ok(())
}
