// 📤 Export - Checklist as CSV (code,status)

use anyhow::{Context, Result};
use std::io::Write;

use crate::registry::Registry;

pub fn write_csv<W: Write>(registry: &Registry, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for entry in registry.entries() {
        wtr.serialize(entry).context("Failed to write CSV row")?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn to_csv_string(registry: &Registry) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(registry, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
