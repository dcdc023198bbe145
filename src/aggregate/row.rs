/// One spreadsheet line, every cell as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    pub country: String,
    pub iso2: String,
    pub iso3: String,
    pub admin_name: String,
    pub city: String,
    pub city_ascii: String,
    pub capital: String,
}

impl SourceRow {
    pub fn has_country(&self) -> bool {
        !self.country.trim().is_empty()
    }

    /// The administrative division when present, the ASCII city name otherwise.
    pub fn city_name(&self) -> &str {
        match self.admin_name.trim().is_empty() {
            true => &self.city_ascii,
            false => &self.admin_name,
        }
    }

    pub fn is_capital(&self) -> bool {
        self.capital == "primary"
    }
}
