use super::row::SourceRow;
use crate::db::checkpoint::Checkpoint;
use crate::prelude::*;
use crate::translate::pool::TranslationPool;
use crate::translate::session::BrowserSession;
use anyhow::anyhow;
use itertools::Itertools;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRecord {
    #[serde(skip)]
    pub key: u32,
    pub name: String,
    pub formal_name: String,
    pub iso2: String,
    pub iso3: String,
}

/// A keyed country still waiting for its translated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryDraft {
    pub key: u32,
    pub name: String,
    pub iso2: String,
    pub iso3: String,
}

/// Country name -> surrogate key. Exact string match, no normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryIndex(HashMap<String, u32>);

impl CountryIndex {
    pub fn key(&self, country: &str) -> Option<u32> {
        self.0.get(country).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Distinct non-empty country names in ascending order, keyed from 1. The
/// first row bearing a name supplies its ISO codes.
pub fn assign_keys(rows: &[SourceRow]) -> Vec<CountryDraft> {
    rows.iter()
        .filter(|row| row.has_country())
        .sorted_by(|a, b| a.country.cmp(&b.country))
        .dedup_by(|a, b| a.country == b.country)
        .zip(1..)
        .map(|(row, key)| CountryDraft {
            key,
            name: row.country.clone(),
            iso2: row.iso2.clone(),
            iso3: row.iso3.clone(),
        })
        .collect()
}

pub fn finalize(
    drafts: Vec<CountryDraft>,
    translations: &BTreeMap<String, String>,
) -> Result<(Vec<CountryRecord>, CountryIndex)> {
    let mut index = HashMap::with_capacity(drafts.len());
    let mut countries = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let formal_name = match translations.get(&draft.name) {
            Some(formal_name) => formal_name.clone(),
            None => {
                let err = format!("No translation collected for {:?}", draft.name);
                tracing::error!(err);
                return Err(anyhow!(err));
            }
        };

        index.insert(draft.name.clone(), draft.key);
        countries.push(CountryRecord {
            key: draft.key,
            name: draft.name,
            formal_name,
            iso2: draft.iso2,
            iso3: draft.iso3,
        });
    }

    Ok((countries, CountryIndex(index)))
}

/// Keys every country, translates each distinct name once and closes the
/// pool's sessions before returning.
pub async fn aggregate_countries<S: BrowserSession + 'static>(
    rows: &[SourceRow],
    mut pool: TranslationPool<S>,
    checkpoint: Option<&Checkpoint>,
    deadline: Option<Duration>,
) -> Result<(Vec<CountryRecord>, CountryIndex)> {
    let drafts = assign_keys(rows);
    tracing::info!("{} distinct countries", drafts.len());

    let mut translations = BTreeMap::new();
    if let Some(checkpoint) = checkpoint {
        let mut finished = match checkpoint.load().await {
            Ok(finished) => finished,
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        };
        for draft in &drafts {
            if let Some(translation) = finished.remove(&draft.name) {
                translations.insert(draft.name.clone(), translation);
            }
        }
        tracing::info!("{} translations restored from checkpoint", translations.len());
    }

    let pending = drafts
        .iter()
        .filter(|draft| !translations.contains_key(&draft.name))
        .map(|draft| draft.name.clone())
        .collect();
    translations.extend(pool.translate_and_close(pending, checkpoint, deadline).await?);

    finalize(drafts, &translations)
}
