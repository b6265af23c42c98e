use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use inquire::error::InquireResult;
use serde::Serialize;

mod app;
mod catalog;
mod cli;
mod config;
mod lock;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use app::types::CollectionSummary;
use app::AppFactory;
use lock::FileLock;

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let paths = AppFactory::get_paths()?;
    let config = AppFactory::create_config(&paths)?;

    match args.command {
        cli::Command::Serve { addr } => {
            let _lock = FileLock::try_shared(&paths.base_path)
                .context("Cannot start the server")?;

            let service = AppFactory::create_query_service(&config, &paths);
            if !service.ready() {
                log::warn!("serving without an index, queries will answer 503 until it is built");
            }

            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            let state = web::SharedState::new(Arc::new(service), config.request_timeout());
            web::start_daemon(addr, state)
        }

        cli::Command::Build { catalog, yes } => {
            let _lock = FileLock::try_exclusive(&paths.base_path)
                .context("Cannot rebuild the index, stop the server and retry")?;

            let catalog_path = catalog.unwrap_or_else(|| config.resolved_catalog_path());

            let store = AppFactory::create_store(&paths);
            if !yes && store.exists(&config.collection)? {
                match inquire::prompt_confirmation(format!(
                    "Collection '{}' already exists and will be replaced. Continue?",
                    config.collection
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            let embedder = AppFactory::create_embedder(&config, &paths)?;
            let stats = AppFactory::create_index_builder(&config, embedder, &paths)
                .with_progress(true)
                .build(&catalog_path)
                .with_context(|| format!("Index build from {:?} failed", catalog_path))?;

            print_json(&stats)
        }

        cli::Command::Recommend {
            query,
            n,
            min_score,
        } => {
            let _lock = FileLock::try_shared(&paths.base_path)?;
            let service = AppFactory::create_query_service(&config, &paths);
            print_json(&service.recommend(&query, n, min_score)?)
        }

        cli::Command::Tag { tag, n } => {
            let _lock = FileLock::try_shared(&paths.base_path)?;
            let service = AppFactory::create_query_service(&config, &paths);
            print_json(&service.search_by_tag(&tag, n)?)
        }

        cli::Command::List {} => {
            let _lock = FileLock::try_shared(&paths.base_path)?;
            let service = AppFactory::create_query_service(&config, &paths);
            print_json(&service.list_all()?)
        }

        cli::Command::Collections {} => {
            let _lock = FileLock::try_shared(&paths.base_path)?;
            let store = AppFactory::create_store(&paths);
            let model_id = semantic::embeddings::model_id_hash(&config.semantic.model);

            let mut summaries = vec![];
            for name in store.list() {
                let info = store.describe(&name)?;
                summaries.push(CollectionSummary {
                    configured: name == config.collection,
                    model_matches: info.model_id == model_id,
                    locations: info.entry_count,
                    dimensions: info.dimensions,
                    name,
                });
            }

            print_json(&summaries)
        }
    }
}
