use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{Config, ConfigError};
use crate::models::{Item, TimeOfDay, group_by_time};
use crate::search::{
    FdaClient, LabelClient, LabelStatus, SearchAggregator, SearchError, SearchFilters, SearchSession,
    SearchSnapshot, SortOrder, SourceState, SourceStatus,
};
use crate::search::providers::http_client;
use crate::store::{ItemStore, StoreError};

#[derive(Parser)]
#[command(name = "refillr")]
#[command(about = "Track daily medications and supplements")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/item file)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show today's items grouped by time of day (default)
    List,
    /// Add a custom item
    Add {
        /// Item name
        name: String,
        #[arg(long)]
        brand: Option<String>,
        /// Dose, e.g. "400 mg"
        #[arg(long)]
        dose: Option<String>,
        /// morning, afternoon or evening
        #[arg(long, default_value = "morning")]
        time: TimeOfDay,
        /// Supplement label id this item came from
        #[arg(long)]
        label_id: Option<String>,
    },
    /// Add an item from a supplement label id
    AddLabel {
        id: String,
        #[arg(long, default_value = "morning")]
        time: TimeOfDay,
    },
    /// Change fields of an item
    Edit {
        /// Item id or unique id prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        dose: Option<String>,
        #[arg(long)]
        time: Option<TimeOfDay>,
    },
    /// Mark an item taken / not taken
    Toggle {
        /// Item id or unique id prefix
        id: String,
    },
    /// Remove an item
    Delete {
        /// Item id or unique id prefix
        id: String,
    },
    /// Uncheck every item
    Reset,
    /// Search supplement and drug labels
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Only labels from this brand
        #[arg(long)]
        brand: Option<String>,
        #[arg(long, value_enum)]
        status: Option<LabelStatus>,
        #[arg(long, value_enum)]
        sort: Option<SortOrder>,
    },
    /// Show one supplement label
    Label { id: String },
    /// Search as you type: each stdin line replaces the query
    Interactive,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("No item matches '{0}'")]
    NotFound(String),
    #[error("'{0}' matches more than one item")]
    Ambiguous(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

type Aggregator = SearchAggregator<LabelClient, FdaClient>;

/// Long-lived services shared by every command
pub struct Context {
    pub config: Config,
    pub store: ItemStore,
    labels: LabelClient,
    drugs: FdaClient,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, CliError> {
        let client = http_client(config.request_timeout())?;
        let store = ItemStore::new(config.get_store_path());
        let labels = LabelClient::new(client.clone(), config.proxy_base_url.clone());
        let drugs = FdaClient::new(client, config.fda_base_url.clone(), config.fda_api_key.clone());
        Ok(Self {
            config,
            store,
            labels,
            drugs,
        })
    }

    fn aggregator(&self, filters: SearchFilters) -> Aggregator {
        SearchAggregator::new(self.labels.clone(), self.drugs.clone())
            .with_timeout(self.config.request_timeout())
            .with_filters(filters)
    }

    /// Find an item by full id or unique id prefix
    async fn resolve(&self, id: &str) -> Result<Item, CliError> {
        let items = self.store.fetch_all().await?;
        if let Some(item) = items.iter().find(|i| i.id == id) {
            return Ok(item.clone());
        }
        let mut matches = items.into_iter().filter(|i| i.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(item), None) if !id.is_empty() => Ok(item),
            (Some(_), Some(_)) => Err(CliError::Ambiguous(id.to_string())),
            _ => Err(CliError::NotFound(id.to_string())),
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Handle the list command
pub async fn handle_list(ctx: &Context) -> Result<(), CliError> {
    let items = ctx.store.fetch_all().await?;
    for (time, group) in group_by_time(&items) {
        println!("{}", time);
        if group.is_empty() {
            println!("  (nothing)");
        }
        for item in group {
            let mark = if item.checked { "[x]" } else { "[ ]" };
            match item.subtitle() {
                Some(sub) => println!("  {} {}  {}  ({})", mark, short_id(&item.id), item.name, sub),
                None => println!("  {} {}  {}", mark, short_id(&item.id), item.name),
            }
        }
    }
    Ok(())
}

/// Handle the add command
pub async fn handle_add(
    ctx: &Context,
    name: String,
    brand: Option<String>,
    dose: Option<String>,
    time: TimeOfDay,
    label_id: Option<String>,
) -> Result<(), CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidArgument("name must not be empty".to_string()));
    }

    let mut item = Item::new(name, time);
    item.brand = non_empty(brand);
    item.dose_text = non_empty(dose);
    item.label_id = non_empty(label_id);

    ctx.store.upsert(item.clone()).await?;
    println!("Item added (ID: {})", item.id);
    Ok(())
}

/// Handle the add-label command
pub async fn handle_add_label(ctx: &Context, id: String, time: TimeOfDay) -> Result<(), CliError> {
    let detail = ctx.labels.label(&id).await?;
    let mut item = Item::from_label_detail(&detail, time);
    if item.label_id.is_none() {
        item.label_id = Some(id);
    }

    ctx.store.upsert(item.clone()).await?;
    println!("Added '{}' (ID: {})", item.name, item.id);
    Ok(())
}

/// Handle the edit command
pub async fn handle_edit(
    ctx: &Context,
    id: String,
    name: Option<String>,
    brand: Option<String>,
    dose: Option<String>,
    time: Option<TimeOfDay>,
) -> Result<(), CliError> {
    let mut item = ctx.resolve(&id).await?;
    if let Some(name) = non_empty(name) {
        item.name = name;
    }
    // an empty string clears the field
    if let Some(brand) = brand {
        item.brand = non_empty(Some(brand));
    }
    if let Some(dose) = dose {
        item.dose_text = non_empty(Some(dose));
    }
    if let Some(time) = time {
        item.time_of_day = time;
    }

    ctx.store.upsert(item.clone()).await?;
    println!("Item updated (ID: {})", item.id);
    Ok(())
}

/// Handle the toggle command
pub async fn handle_toggle(ctx: &Context, id: String) -> Result<(), CliError> {
    let item = ctx.resolve(&id).await?;
    match ctx.store.toggle(&item.id).await? {
        Some(item) if item.checked => println!("Took {}", item.name),
        Some(item) => println!("Unchecked {}", item.name),
        None => return Err(CliError::NotFound(id)),
    }
    Ok(())
}

/// Handle the delete command
pub async fn handle_delete(ctx: &Context, id: String) -> Result<(), CliError> {
    let item = ctx.resolve(&id).await?;
    ctx.store.delete(&item.id).await?;
    println!("Deleted {}", item.name);
    Ok(())
}

/// Handle the reset command
pub async fn handle_reset(ctx: &Context) -> Result<(), CliError> {
    let changed = ctx.store.reset_checks().await?;
    println!("Unchecked {} item(s)", changed);
    Ok(())
}

/// Handle the search command
pub async fn handle_search(
    ctx: &Context,
    query: Vec<String>,
    brand: Option<String>,
    status: Option<LabelStatus>,
    sort: Option<SortOrder>,
) -> Result<(), CliError> {
    let mut filters = ctx.config.search.clone();
    if let Some(brand) = brand {
        filters.brand = non_empty(Some(brand));
    }
    if let Some(status) = status {
        filters.status = status;
    }
    if let Some(sort) = sort {
        filters.sort = sort;
    }

    let aggregator = ctx.aggregator(filters);
    aggregator.search(&query.join(" ")).await;
    print_snapshot(&aggregator.snapshot());
    Ok(())
}

/// Handle the label command
pub async fn handle_label(ctx: &Context, id: String) -> Result<(), CliError> {
    let detail = ctx.labels.label(&id).await?;
    println!("{}", detail.full_name.as_deref().unwrap_or("label"));
    for (title, value) in [
        ("brand", detail.brand_name.clone()),
        ("type", detail.product_type.clone()),
        ("serving", detail.serving_text()),
    ] {
        if let Some(value) = value {
            println!("  {}: {}", title, value);
        }
    }
    let notes = detail.notes_text();
    if !notes.is_empty() {
        println!("{}", notes);
    }
    Ok(())
}

/// Handle the interactive command
pub async fn handle_interactive(ctx: &Context) -> Result<(), CliError> {
    let aggregator = Arc::new(ctx.aggregator(ctx.config.search.clone()));
    let session = SearchSession::new(Arc::clone(&aggregator)).with_quiet_period(ctx.config.debounce());

    let printed = Arc::new(AtomicU64::new(0));
    let mut updates = aggregator.subscribe();
    let printer = tokio::spawn({
        let printed = Arc::clone(&printed);
        async move {
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.is_loading() || snapshot.is_idle() {
                    continue;
                }
                if printed.swap(snapshot.epoch, Ordering::SeqCst) != snapshot.epoch {
                    print_snapshot(&snapshot);
                }
            }
        }
    });

    println!("Type to search, one query per line. Ctrl-D to finish.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        session.input(&line);
    }

    // input ended: run or wait out the last query
    let snapshot = session.finish().await;
    printer.abort();

    if !snapshot.is_idle() && printed.load(Ordering::SeqCst) != snapshot.epoch {
        print_snapshot(&snapshot);
    }
    session.close();
    Ok(())
}

fn status_note<T>(state: &SourceState<T>) -> &'static str {
    match state.status {
        SourceStatus::Idle => "",
        SourceStatus::Loading => " (searching…)",
        SourceStatus::Ready if state.results.is_empty() => " (no results)",
        SourceStatus::Ready => "",
        SourceStatus::Failed => " (unavailable)",
    }
}

fn print_snapshot(snapshot: &SearchSnapshot) {
    println!("supplements for '{}'{}", snapshot.query.trim(), status_note(&snapshot.supplements));
    for result in &snapshot.supplements.results {
        match result.subtitle() {
            Some(sub) => println!("  {}  {}  ({})", result.id, result.display_name(), sub),
            None => println!("  {}  {}", result.id, result.display_name()),
        }
    }

    println!("medications{}", status_note(&snapshot.drugs));
    for result in &snapshot.drugs.results {
        println!("  {}", result.headline());
        if let Some(sub) = result.subtitle() {
            println!("      {}", sub);
        }
        if let Some(detail) = &result.detail {
            let line = detail.lines().next().unwrap_or_default();
            println!("      {}", line);
        }
    }
}
