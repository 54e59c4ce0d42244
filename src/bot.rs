use crate::api_client::{AirQualityClient, AirQualitySource};
use crate::config::Config;
use crate::handlers;
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::info;

pub async fn start_bot(bot: Bot, config: Config) -> Result<()> {
    info!("Bot is starting...");

    let source: Arc<dyn AirQualitySource> = Arc::new(AirQualityClient::from_config(&config)?);

    let handler = dptree::entry().branch(Update::filter_message().endpoint(
        move |bot: Bot, msg: Message| {
            let source = source.clone();
            async move { handlers::handle_message(bot, msg, source).await }
        },
    ));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
