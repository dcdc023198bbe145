use super::country::CountryIndex;
use super::row::SourceRow;
use crate::error::FixtureError;
use crate::prelude::*;
use anyhow::anyhow;
use rayon::prelude::*;
use serde::Serialize;
use std::{collections::HashSet, str::FromStr};
use unidecode::unidecode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityRecord {
    #[serde(skip)]
    pub key: u32,
    pub country: u32,
    pub name: String,
    pub is_capital: bool,
}

/// Order in which city candidates are visited, and so which duplicate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitySort {
    CountryThenName,
    NameOnly,
}

impl FromStr for CitySort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "country" => Ok(CitySort::CountryThenName),
            "name" => Ok(CitySort::NameOnly),
            other => Err(anyhow!("unknown city sort {:?}, expected country or name", other)),
        }
    }
}

/// ASCII transliteration with path separators removed.
pub fn normalize_name(raw: &str) -> String {
    unidecode(raw).replace(['/', '\\'], "").trim().to_string()
}

pub fn aggregate_cities(
    rows: &[SourceRow],
    countries: &CountryIndex,
    sort: CitySort,
) -> Result<Vec<CityRecord>> {
    let mut candidates: Vec<(&SourceRow, String)> = rows
        .par_iter()
        .filter(|row| row.has_country())
        .map(|row| (row, normalize_name(row.city_name())))
        .collect();

    match sort {
        CitySort::CountryThenName => candidates.sort_by(|(a, a_name), (b, b_name)| {
            a.country.cmp(&b.country).then_with(|| a_name.cmp(b_name))
        }),
        CitySort::NameOnly => candidates.sort_by(|(_, a_name), (_, b_name)| a_name.cmp(b_name)),
    }

    let mut seen: HashSet<(String, u32)> = HashSet::with_capacity(candidates.len());
    let mut cities = Vec::new();
    for (row, name) in candidates {
        let country = match countries.key(&row.country) {
            Some(country) => country,
            None => {
                tracing::error!("No country key for {:?} ({:?})", row.country, name);
                return Err(FixtureError::UnresolvedCountry {
                    country: row.country.clone(),
                    city: name,
                }
                .into());
            }
        };

        if name.is_empty() {
            tracing::debug!("Skipping nameless city row in {:?}", row.country);
            continue;
        }

        if !seen.insert((name.clone(), country)) {
            tracing::trace!("Dropping duplicate {:?} ({})", name, row.city);
            continue;
        }

        cities.push(CityRecord {
            key: cities.len() as u32 + 1,
            country,
            name,
            is_capital: row.is_capital(),
        });
    }

    tracing::info!("{} cities from {} rows", cities.len(), rows.len());
    Ok(cities)
}
