#![warn(rust_2018_idioms)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use card_tokenizer::{CardTokenizer, Command, IdentityTransformer, Settings, VaultTokenizer};
use struct_log::StructLogBuilder;
use vault_transform::{RequestContext, Transformer, VaultClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    let _guard = StructLogBuilder::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .json_enabled(settings.json_log)
        .init()?;

    let values = read_values().await?;
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(settings.timeout_secs));

    let client = if settings.stub {
        tracing::info!("Using identity stub transformer");
        None
    } else {
        let client = VaultClient::from_env()
            .await
            .context("vault client setup failed")?;
        Some(Arc::new(client))
    };
    let transformer: Arc<dyn Transformer> = match &client {
        Some(client) => Arc::clone(client) as Arc<dyn Transformer>,
        None => Arc::new(IdentityTransformer),
    };

    let tokenizer = VaultTokenizer::new(transformer, &settings.role, &settings.transformation);
    let result = match settings.command {
        Command::Encode => tokenizer.encode(&ctx, &values).await,
        Command::Decode => tokenizer.decode(&ctx, &values).await,
    };

    if let Some(client) = &client {
        client.stop_renewal();
    }

    let mapping = result.inspect_err(|e| {
        tracing::error!(
            error = %e,
            reason = e.reason(),
            request_id = ctx.request_id(),
            "Tokenizer run failed"
        );
    })?;

    let sorted: BTreeMap<_, _> = mapping.into_iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    Ok(())
}

/// Non-empty, trimmed stdin lines.
async fn read_values() -> anyhow::Result<Vec<String>> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut values = Vec::new();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let value = line.trim();
        if !value.is_empty() {
            values.push(value.to_owned());
        }
    }
    Ok(values)
}
