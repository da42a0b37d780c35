use std::fmt;

use arrow_cast::display::{ArrayFormatter, FormatOptions};

use crate::frame::GeoDataFrame;
use crate::io::display::{format_geometry, DEFAULT_MAX_WIDTH};
use crate::series::GeoSeries;

/// Rows shown at each end of a table before eliding the middle.
const HEAD_TAIL_ROWS: usize = 5;

/// Row indices for a head and tail view of `len` rows. `None` marks the elided middle.
pub(crate) fn head_and_tail(len: usize, n: usize) -> Vec<Option<usize>> {
    if len <= n * 2 {
        (0..len).map(Some).collect()
    } else {
        (0..n)
            .map(Some)
            .chain(std::iter::once(None))
            .chain((len - n..len).map(Some))
            .collect()
    }
}

/// A plain text table: the first column right aligned, the rest left aligned, columns
/// separated by two spaces.
#[derive(Debug, Default)]
pub(crate) struct TextTable {
    headers: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub(crate) fn new(headers: Option<Vec<String>>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// A row of `...` in every column.
    pub(crate) fn push_ellipsis(&mut self) {
        let width = self.num_columns().max(1);
        self.rows.push(vec!["...".to_string(); width]);
    }

    fn num_columns(&self) -> usize {
        self.headers
            .iter()
            .chain(self.rows.iter())
            .map(|row| row.len())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num_columns = self.num_columns();
        let mut widths = vec![0; num_columns];
        for row in self.headers.iter().chain(self.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for row in self.headers.iter().chain(self.rows.iter()) {
            let mut line = String::new();
            for (i, width) in widths.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                if i == 0 {
                    line.push_str(&format!("{cell:>width$}"));
                } else {
                    line.push_str("  ");
                    line.push_str(&format!("{cell:<width$}"));
                }
            }
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

fn geometry_cell(series: &GeoSeries, i: usize) -> Result<String, fmt::Error> {
    Ok(match series.value(i).map_err(|_| fmt::Error)? {
        Some(geom) => format_geometry(&geom, DEFAULT_MAX_WIDTH),
        None => "null".to_string(),
    })
}

impl fmt::Display for GeoSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = TextTable::new(Some(vec!["#".to_string(), "geometry".to_string()]));
        for row in head_and_tail(self.len(), HEAD_TAIL_ROWS) {
            match row {
                Some(i) => table.push_row(vec![i.to_string(), geometry_cell(self, i)?]),
                None => table.push_ellipsis(),
            }
        }
        write!(f, "{table}")
    }
}

impl fmt::Display for GeoDataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = head_and_tail(self.len(), HEAD_TAIL_ROWS);

        writeln!(f, "Attributes")?;
        let mut headers = vec!["#".to_string()];
        headers.extend(self.column_names());
        let mut table = TextTable::new(Some(headers));
        let attributes = self.attributes().map_err(|_| fmt::Error)?;
        let options = FormatOptions::default().with_null("null");
        let formatters = attributes
            .columns()
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| fmt::Error)?;
        for row in rows.iter() {
            match row {
                Some(i) => {
                    let mut cells = vec![i.to_string()];
                    cells.extend(formatters.iter().map(|fmt| fmt.value(*i).to_string()));
                    table.push_row(cells);
                }
                None => table.push_ellipsis(),
            }
        }
        write!(f, "{table}")?;

        writeln!(f)?;
        writeln!(f, "Geometry")?;
        write!(f, "{}", self.geometry())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::frame::polygon_frame;
    use crate::test::series::point_series;

    #[test]
    fn head_and_tail_rows() {
        assert_eq!(head_and_tail(3, 5), vec![Some(0), Some(1), Some(2)]);
        let rows = head_and_tail(12, 5);
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[5], None);
        assert_eq!(rows[6], Some(7));
    }

    #[test]
    fn display_series() {
        let text = point_series().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#  geometry");
        assert_eq!(lines[1], "0  <POINT(0 0)>");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn display_long_series() {
        let wkt: Vec<String> = (0..12).map(|i| format!("POINT({i} 0)")).collect();
        let refs: Vec<&str> = wkt.iter().map(String::as_str).collect();
        let series = GeoSeries::try_from_wkt(&refs, None).unwrap();
        let text = series.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[6], "...  ...");
        assert_eq!(lines[11], " 11  <POINT(11 0)>");
    }

    #[test]
    fn display_frame() {
        let text = polygon_frame().to_string();
        assert!(text.starts_with("Attributes\n"));
        assert!(text.contains("0  0   low"));
        assert!(text.contains("2  2   null"));
        assert!(text.contains("\nGeometry\n"));
        assert!(text.contains("<POLYGON((0 0,2 0,2 2,0 2,0 0))>"));
    }
}
