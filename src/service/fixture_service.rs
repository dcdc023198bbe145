use crate::aggregate::{
    city::{aggregate_cities, CityRecord},
    country::{aggregate_countries, CountryRecord},
    fixture::{build, model_tag, FixtureRecord},
    row::SourceRow,
};
use crate::db::checkpoint::Checkpoint;
use crate::prelude::*;
use crate::service::{file_service::write_json, sheet_service::read_rows, var_service::Config};
use crate::translate::{pool::TranslationPool, session::BrowserSession};
use std::path::{Path, PathBuf};

pub struct Fixtures {
    pub countries: Vec<FixtureRecord<CountryRecord>>,
    pub cities: Vec<FixtureRecord<CityRecord>>,
}

pub async fn run(config: &Config) -> Result<()> {
    let rows = read_rows(&config.input_path)?;

    let checkpoint = match &config.checkpoint_path {
        Some(path) => Some(
            Checkpoint::open(path, &config.translate.source_lang, &config.translate.target_lang)
                .await?,
        ),
        None => None,
    };

    let pool = TranslationPool::connect(&config.browser, &config.translate).await?;
    let fixtures = build_fixtures(&rows, pool, checkpoint.as_ref(), config).await;
    if let Some(checkpoint) = checkpoint {
        checkpoint.close().await;
    }

    write_fixtures(&config.output_dir, &fixtures?).await
}

pub async fn build_fixtures<S: BrowserSession + 'static>(
    rows: &[SourceRow],
    pool: TranslationPool<S>,
    checkpoint: Option<&Checkpoint>,
    config: &Config,
) -> Result<Fixtures> {
    let (countries, index) =
        aggregate_countries(rows, pool, checkpoint, config.translate.run_deadline).await?;
    tracing::info!("{} countries keyed", index.len());
    let cities = aggregate_cities(rows, &index, config.city_sort)?;

    let fixtures = Fixtures {
        countries: build(&model_tag(&config.fixture_app, "country"), countries),
        cities: build(&model_tag(&config.fixture_app, "city"), cities),
    };
    debug_assert!(fixtures.countries.iter().all(|f| f.pk == f.fields.key));
    debug_assert!(fixtures.cities.iter().all(|f| f.pk == f.fields.key));

    Ok(fixtures)
}

pub fn output_paths(output_dir: &Path) -> (PathBuf, PathBuf) {
    (output_dir.join("country.json"), output_dir.join("city.json"))
}

pub async fn write_fixtures(output_dir: &Path, fixtures: &Fixtures) -> Result<()> {
    let (country_path, city_path) = output_paths(output_dir);
    write_json(&country_path, &fixtures.countries).await?;
    write_json(&city_path, &fixtures.cities).await?;
    Ok(())
}
