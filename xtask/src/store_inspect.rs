use std::io::Write;
use std::path::PathBuf;

use cideldill_codec::Cid;
use cideldill_store::SqliteStore;
use clap::Args;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreInspectError {
    #[error("store error: {0}")]
    Store(#[from] cideldill_store::StoreError),
    #[error("`{0}` is not a valid cid")]
    InvalidCid(String),
    #[error("cid `{0}` is not present in the store")]
    NotFound(String),
    #[error("failed to write output file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(long)]
    pub db: PathBuf,
}

pub fn stats(args: StatsArgs) -> Result<(), StoreInspectError> {
    let store = SqliteStore::open(&args.db)?;
    let stats = store.stats()?;
    println!("objects: {}", stats.count);
    println!("total_size_bytes: {}", stats.total_size_bytes);
    Ok(())
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub db: PathBuf,
}

pub fn list(args: ListArgs) -> Result<(), StoreInspectError> {
    let store = SqliteStore::open(&args.db)?;
    for entry in store.list_entries()? {
        println!("{}\t{}\t{}", entry.cid, entry.size_bytes, entry.created_at);
    }
    Ok(())
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    #[arg(long)]
    pub db: PathBuf,
    #[arg(long)]
    pub cid: String,
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn dump(args: DumpArgs) -> Result<(), StoreInspectError> {
    let store = SqliteStore::open(&args.db)?;
    let cid = Cid::parse(args.cid.clone()).map_err(|_| StoreInspectError::InvalidCid(args.cid.clone()))?;
    let bytes = store
        .get(&cid)?
        .ok_or_else(|| StoreInspectError::NotFound(args.cid.clone()))?;
    match args.out {
        Some(path) => {
            std::fs::File::create(path)?.write_all(&bytes)?;
        }
        None => {
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
