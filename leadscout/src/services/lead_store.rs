//! Durable lead store
//!
//! **Layout under the root folder:**
//! - `leads.json`: JSON array of leads, rewritten whole via `leads.json.tmp`
//!   and an atomic rename
//! - `processed_places.txt`: append-only ledger, one place id per line
//! - `images/`: saved positive samples
//!
//! Every mutation runs under one async mutex, so the pipeline and the review
//! operations never interleave writes. Every id in the leads file is also in
//! the ledger; `open` repairs that if a previous run died between the two
//! writes.

use crate::models::{Candidate, ImageSample};
use chrono::Utc;
use leadscout_common::config::{temp_path_for, RootFolderInitializer, IMAGES_DIRNAME};
use leadscout_common::models::{group_by_region, position_in_region, Lead, LeadUpdate, DEFAULT_LEAD_STATUS};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Leads file exists but is not a JSON array of leads
    #[error("Corrupt leads file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Serialization failed: {0}")]
    Serialize(String),

    /// No lead at the given (region, index)
    #[error("Lead not found: {region}[{index}]")]
    NotFound { region: String, index: usize },
}

struct StoreState {
    processed: HashSet<String>,
}

pub struct LeadStore {
    paths: RootFolderInitializer,
    state: Mutex<StoreState>,
}

impl LeadStore {
    /// Open (creating if needed) the store under `root`
    ///
    /// A missing leads file is initialized from `seed` when one is given and
    /// exists. A corrupt leads file fails the open.
    pub async fn open(root: &Path, seed: Option<&Path>) -> Result<Self, StoreError> {
        let paths = RootFolderInitializer::new(root.to_path_buf());
        tokio::fs::create_dir_all(paths.images_dir()).await?;

        let stale = temp_path_for(&paths.leads_path());
        if tokio::fs::metadata(&stale).await.is_ok() {
            tracing::warn!(path = %stale.display(), "Removing leftover temp file from an interrupted write");
            tokio::fs::remove_file(&stale).await?;
        }

        let leads_path = paths.leads_path();
        if tokio::fs::metadata(&leads_path).await.is_err() {
            if let Some(seed) = seed {
                initialize_from_seed(&leads_path, seed).await?;
            }
        }

        let processed = read_ledger(&paths.ledger_path()).await?;
        tracing::info!(
            processed = processed.len(),
            ledger = %paths.ledger_path().display(),
            "Loaded processed-place ledger"
        );

        let store = Self {
            paths,
            state: Mutex::new(StoreState { processed }),
        };
        store.repair_ledger().await?;
        Ok(store)
    }

    pub fn root_folder(&self) -> &Path {
        self.paths.root_folder()
    }

    pub fn leads_path(&self) -> PathBuf {
        self.paths.leads_path()
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.paths.ledger_path()
    }

    /// All leads in file order, review defaults applied
    pub async fn load(&self) -> Result<Vec<Lead>, StoreError> {
        let _guard = self.state.lock().await;
        read_leads(&self.paths.leads_path()).await
    }

    /// Append a lead for `candidate` unless one with its place id exists
    pub async fn append_if_new(&self, candidate: &Candidate, image_paths: Vec<String>) -> Result<bool, StoreError> {
        let _guard = self.state.lock().await;
        let path = self.paths.leads_path();

        let mut leads = read_leads(&path).await?;
        if leads.iter().any(|lead| lead.place_id == candidate.place_id) {
            tracing::debug!(place_id = %candidate.place_id, "Lead already stored");
            return Ok(false);
        }

        leads.push(lead_from_candidate(candidate, image_paths));
        write_leads(&path, &leads).await?;

        tracing::info!(
            place_id = %candidate.place_id,
            name = %candidate.name,
            total = leads.len(),
            "Lead saved"
        );
        Ok(true)
    }

    /// Record `place_id` as terminally processed
    pub async fn mark_processed(&self, place_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.processed.contains(place_id) {
            return Ok(());
        }

        append_ledger(&self.paths.ledger_path(), place_id).await?;
        state.processed.insert(place_id.to_string());
        Ok(())
    }

    pub async fn is_processed(&self, place_id: &str) -> bool {
        self.state.lock().await.processed.contains(place_id)
    }

    pub async fn processed_ids(&self) -> HashSet<String> {
        self.state.lock().await.processed.clone()
    }

    /// Persist a sample's bytes; returns the path relative to the root folder
    pub async fn save_image(&self, sample: &ImageSample) -> Result<String, StoreError> {
        let _guard = self.state.lock().await;
        let file_name = sample.file_name();
        let path = self.paths.images_dir().join(&file_name);
        write_atomic(&path, &sample.bytes).await?;
        Ok(format!("{}/{}", IMAGES_DIRNAME, file_name))
    }

    /// Leads grouped by region, regions in first-appearance order
    pub async fn grouped_by_region(&self) -> Result<Vec<(String, Vec<Lead>)>, StoreError> {
        Ok(group_by_region(&self.load().await?))
    }

    /// Apply a review edit to the `index`-th lead of `region`
    pub async fn update_lead(
        &self,
        region: &str,
        index: usize,
        update: LeadUpdate,
    ) -> Result<Lead, StoreError> {
        let _guard = self.state.lock().await;
        let path = self.paths.leads_path();

        let mut leads = read_leads(&path).await?;
        let position = position_in_region(&leads, region, index).ok_or_else(|| StoreError::NotFound {
            region: region.to_string(),
            index,
        })?;

        update.apply(&mut leads[position]);
        write_leads(&path, &leads).await?;

        tracing::info!(place_id = %leads[position].place_id, ?update, "Lead updated");
        Ok(leads[position].clone())
    }

    /// Remove the `index`-th lead of `region`
    ///
    /// The ledger keeps its id, so later runs never re-add it.
    pub async fn delete_lead(&self, region: &str, index: usize) -> Result<Lead, StoreError> {
        let _guard = self.state.lock().await;
        let path = self.paths.leads_path();

        let mut leads = read_leads(&path).await?;
        let position = position_in_region(&leads, region, index).ok_or_else(|| StoreError::NotFound {
            region: region.to_string(),
            index,
        })?;

        let removed = leads.remove(position);
        write_leads(&path, &leads).await?;

        tracing::info!(place_id = %removed.place_id, name = %removed.name, "Lead deleted");
        Ok(removed)
    }

    /// Append ledger entries for stored leads the ledger does not know about
    async fn repair_ledger(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let ledger_path = self.paths.ledger_path();
        let leads = read_leads(&self.paths.leads_path()).await?;

        let mut repaired = 0usize;
        for lead in &leads {
            if !state.processed.contains(&lead.place_id) {
                append_ledger(&ledger_path, &lead.place_id).await?;
                state.processed.insert(lead.place_id.clone());
                repaired += 1;
            }
        }

        if repaired > 0 {
            tracing::warn!(repaired, "Ledger was missing stored leads; added them");
        }
        Ok(())
    }
}

fn lead_from_candidate(candidate: &Candidate, image_paths: Vec<String>) -> Lead {
    Lead {
        place_id: candidate.place_id.clone(),
        name: candidate.name.clone(),
        address: candidate.address.clone(),
        phone: candidate.phone.clone(),
        maps_url: candidate.maps_url.clone(),
        region: candidate.region.clone(),
        image_paths,
        discovered_at: Some(Utc::now()),
        status: DEFAULT_LEAD_STATUS.to_string(),
        notes: String::new(),
        follow_up: false,
    }
}

async fn read_leads(path: &Path) -> Result<Vec<Lead>, StoreError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if content.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }

    serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

async fn write_leads(path: &Path, leads: &[Lead]) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(leads).map_err(|e| StoreError::Serialize(e.to_string()))?;
    write_atomic(path, &content).await
}

/// Write to `path.tmp`, sync, then rename over `path`; the temp file never survives a failure
async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let temp_path = temp_path_for(path);

    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        tracing::error!(path = %path.display(), error = %e, "Atomic write failed; previous file left intact");
        return Err(e.into());
    }
    Ok(())
}

async fn read_ledger(path: &Path) -> Result<HashSet<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(e.into()),
    }
}

async fn append_ledger(path: &Path, place_id: &str) -> Result<(), StoreError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{}\n", place_id).as_bytes()).await?;
    file.sync_data().await?;
    Ok(())
}

async fn initialize_from_seed(leads_path: &Path, seed: &Path) -> Result<(), StoreError> {
    if tokio::fs::metadata(seed).await.is_err() {
        tracing::warn!(seed = %seed.display(), "Seed dataset not found; starting with an empty lead list");
        return Ok(());
    }

    // Validate before copying so a bad seed never becomes the store
    let leads = read_leads(seed).await?;
    write_leads(leads_path, &leads).await?;
    tracing::info!(seed = %seed.display(), leads = leads.len(), "Initialized leads file from seed dataset");
    Ok(())
}
