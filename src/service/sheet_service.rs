use crate::aggregate::row::SourceRow;
use crate::error::FixtureError;
use crate::prelude::*;
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;

const COLUMNS: [&str; 7] = [
    "country",
    "iso2",
    "iso3",
    "admin_name",
    "city",
    "city_ascii",
    "capital",
];

/// Rows of the workbook's first worksheet. Cell text is kept as written;
/// only header names are trimmed.
pub fn read_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let mut workbook = match open_workbook_auto(path) {
        Ok(workbook) => workbook,
        Err(e) => return Err(invalid(format!("Failed to open {}: {}", path.display(), e))),
    };

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(invalid(format!("Failed to read {}: {}", path.display(), e))),
        None => return Err(invalid(format!("{} has no worksheet", path.display()))),
    };

    let rows = rows_from_range(&range)?;
    tracing::info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn rows_from_range(range: &Range<Data>) -> Result<Vec<SourceRow>> {
    let mut lines = range.rows();
    let header: Vec<String> = match lines.next() {
        Some(header) => header.iter().map(|cell| cell_text(cell).trim().to_string()).collect(),
        None => return Err(invalid("Worksheet is empty".to_string())),
    };

    let mut positions = [0usize; COLUMNS.len()];
    for (position, column) in positions.iter_mut().zip(COLUMNS) {
        *position = match header.iter().position(|name| name.eq_ignore_ascii_case(column)) {
            Some(index) => index,
            None => return Err(invalid(format!("Missing column {:?}", column))),
        };
    }

    let rows = lines
        .filter(|cells| cells.iter().any(|cell| !cell_text(cell).trim().is_empty()))
        .map(|cells| {
            let field = |column: usize| {
                cells
                    .get(positions[column])
                    .map(cell_text)
                    .unwrap_or_default()
            };
            SourceRow {
                country: field(0),
                iso2: field(1),
                iso3: field(2),
                admin_name: field(3),
                city: field(4),
                city_ascii: field(5),
                capital: field(6),
            }
        })
        .collect();

    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

fn invalid(err: String) -> anyhow::Error {
    tracing::error!(err);
    FixtureError::InvalidInput(err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(cells: Vec<Vec<Data>>) -> Range<Data> {
        let height = cells.len() as u32;
        let width = cells.iter().map(|row| row.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    #[test]
    fn columns_are_found_by_header_name() {
        let range = range(vec![
            vec![
                s("city"),
                s("city_ascii"),
                s("lat"),
                s("country"),
                s("iso2"),
                s("iso3"),
                s("admin_name"),
                s("capital"),
            ],
            vec![
                s("São Paulo"),
                s("Sao Paulo"),
                Data::Float(-23.55),
                s("Brazil"),
                s("BR"),
                s("BRA"),
                s("São Paulo"),
                Data::Empty,
            ],
        ]);

        let rows = rows_from_range(&range).unwrap();

        assert_eq!(
            rows,
            vec![SourceRow {
                country: "Brazil".to_string(),
                iso2: "BR".to_string(),
                iso3: "BRA".to_string(),
                admin_name: "São Paulo".to_string(),
                city: "São Paulo".to_string(),
                city_ascii: "Sao Paulo".to_string(),
                capital: String::new(),
            }]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let header = vec![
            s("country"),
            s("iso2"),
            s("iso3"),
            s("admin_name"),
            s("city"),
            s("city_ascii"),
            s("capital"),
        ];
        let blank = vec![Data::Empty; 7];
        let chile = vec![
            s("Chile"),
            s("CL"),
            s("CHL"),
            s("Santiago"),
            s("Santiago"),
            s("Santiago"),
            s("primary"),
        ];
        let range = range(vec![header, blank, chile]);

        let rows = rows_from_range(&range).unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_capital());
    }

    #[test]
    fn cell_text_is_not_trimmed() {
        let header = vec![
            s(" country "),
            s("iso2"),
            s("iso3"),
            s("admin_name"),
            s("city"),
            s("city_ascii"),
            s("capital"),
        ];
        let padded = vec![
            s("Brazil "),
            s("BR"),
            s("BRA"),
            s("Bahia"),
            s("Salvador"),
            s("Salvador"),
            s("primary "),
        ];
        let exact = vec![
            s("Brazil"),
            s("BR"),
            s("BRA"),
            s("Distrito Federal"),
            s("Brasilia"),
            s("Brasilia"),
            s("primary"),
        ];
        let whitespace = vec![s("  "), Data::Empty, Data::Empty, s(" "), Data::Empty, Data::Empty, Data::Empty];
        let range = range(vec![header, padded, whitespace, exact]);

        let rows = rows_from_range(&range).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].country, "Brazil ");
        assert_eq!(rows[0].capital, "primary ");
        assert!(!rows[0].is_capital());
        assert!(rows[1].is_capital());
        let countries: std::collections::HashSet<&str> =
            rows.iter().map(|row| row.country.as_str()).collect();
        assert_eq!(countries.len(), 2);
    }

    #[test]
    fn missing_column_is_invalid_input() {
        let range = range(vec![vec![s("country"), s("iso2")], vec![s("Chile"), s("CL")]]);

        let err = rows_from_range(&range).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::InvalidInput(_))
        ));
        assert!(err.to_string().contains("iso3"));
    }

    #[test]
    fn unreadable_workbook_is_invalid_input() {
        let err = read_rows(Path::new("/nonexistent/worldcities.xlsx")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::InvalidInput(_))
        ));
    }
}
