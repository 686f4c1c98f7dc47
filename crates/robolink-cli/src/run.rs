//! Subcommand execution.

use crate::Command;
use anyhow::{Context, Result};
use robolink::{ItemHandle, ItemType, Link, LinkConfig};
use serde_json::json;
use tracing::{info, warn};

pub async fn execute(config: LinkConfig, command: Command) -> Result<()> {
    let link = Link::new(config);
    let station = link
        .ensure_connected()
        .await
        .context("connecting to station")?;

    match command {
        Command::Info => {
            print(&json!({
                "port": link.port().await,
                "protocol_version": station.protocol_version,
                "build": station.build,
            }));
        }
        Command::Item { name, item_type } => {
            let item = link.item(&name, item_type.map(ItemType::from_code)).await?;
            match item {
                Some(item) => print(&describe(&link, &item).await?),
                None => {
                    warn!("No item named {:?}", name);
                    print(&serde_json::Value::Null);
                }
            }
        }
        Command::Items { item_type } => {
            let items = link.items(item_type.map(ItemType::from_code)).await?;
            info!("{} items", items.len());
            for item in &items {
                print(&describe(&link, item).await?);
            }
        }
        Command::Param { name } => {
            let value = link.param(&name).await?;
            print(&json!({ "name": name, "value": value }));
        }
        Command::SetParam { name, value } => {
            link.set_param(&name, &value).await?;
            print(&json!({ "name": name, "value": value }));
        }
        Command::Command { name, value } => {
            let answer = link.command(&name, &value).await?;
            print(&json!({ "command": name, "answer": answer }));
        }
        Command::Events => stream_events(&link).await?,
    }

    if let Some(warning) = link.take_last_warning().await {
        warn!("Station reported: {}", warning);
    }
    link.disconnect().await;
    Ok(())
}

async fn describe(link: &Link, item: &ItemHandle) -> Result<serde_json::Value> {
    let name = link.item_name(item).await?;
    Ok(json!({
        "id": item.id(),
        "type": item.item_type().to_string(),
        "name": name,
    }))
}

async fn stream_events(link: &Link) -> Result<()> {
    let mut listener = link.open_events().await?.spawn();
    info!("Listening for events, press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = listener.recv() => match event {
                Some(event) => print(&serde_json::to_value(&event)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    listener.join().await.context("event channel")?;
    Ok(())
}

fn print(value: &serde_json::Value) {
    println!("{}", value);
}
