use anyhow::Context;

/// Flat rendering of a normalized result: one header row plus one row per player.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub header: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(header: &'static [&'static str]) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(self.header)
            .context("write csv header failed")?;
        for row in &self.rows {
            wtr.write_record(row).context("write csv row failed")?;
        }
        wtr.into_inner()
            .map_err(|e| anyhow::anyhow!("flush csv writer failed: {}", e.error()))
    }
}

pub(crate) fn opt_cell<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_cells_that_need_it() {
        let mut t = CsvTable::new(&["Rank", "Player"]);
        t.push(vec!["1".to_string(), "Smith, John".to_string()]);
        let out = String::from_utf8(t.to_bytes().unwrap()).unwrap();
        assert_eq!(out, "Rank,Player\n1,\"Smith, John\"\n");
    }

    #[test]
    fn empty_table_still_has_header() {
        let t = CsvTable::new(&["A", "B"]);
        let out = String::from_utf8(t.to_bytes().unwrap()).unwrap();
        assert_eq!(out, "A,B\n");
    }
}
