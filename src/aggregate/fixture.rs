use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureRecord<T> {
    pub model: String,
    pub pk: u32,
    pub fields: T,
}

pub fn model_tag(app: &str, model: &str) -> String {
    format!("{}.{}", app, model)
}

/// Wraps records in order, numbering them from 1.
pub fn build<T>(model_tag: &str, records: impl IntoIterator<Item = T>) -> Vec<FixtureRecord<T>> {
    records
        .into_iter()
        .zip(1..)
        .map(|(fields, pk)| FixtureRecord {
            model: model_tag.to_string(),
            pk,
            fields,
        })
        .collect()
}
