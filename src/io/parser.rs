use crate::core::structure::AtomRecord;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

/// Element assumed for `.dat` rows that only carry coordinates.
pub const DEFAULT_ELEMENT: &str = "C";

fn parse_float(s: &str) -> Result<f64> {
    s.parse::<f64>().with_context(|| format!("Failed to parse '{}' as float", s))
}

/// Reads host records from a file, picking the format from the extension.
pub fn read_records(path: &Path) -> Result<Vec<AtomRecord>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Could not read structure file: {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let records = match ext.as_str() {
        "xyz" => parse_xyz_str(&contents),
        "dat" | "txt" => parse_dat_str(&contents),
        other => bail!("Unsupported structure format '.{}' for {:?} (expected .xyz or .dat)", other, path),
    }
    .with_context(|| format!("Failed to parse {:?}", path))?;

    log::info!("read {} atoms from {:?}", records.len(), path);
    Ok(records)
}

/// XYZ: atom count, a comment line, then `El x y z` rows. Extra columns are ignored.
pub fn parse_xyz_str(contents: &str) -> Result<Vec<AtomRecord>> {
    let mut lines = contents.lines();
    let count_line = lines.next().ok_or_else(|| anyhow!("XYZ input is empty"))?;
    let count: usize = count_line
        .trim()
        .parse()
        .with_context(|| format!("XYZ header '{}' is not an atom count", count_line.trim()))?;
    lines.next().ok_or_else(|| anyhow!("XYZ input is missing its comment line"))?;

    let mut records = Vec::with_capacity(count);
    for (row, line) in lines.filter(|l| !l.trim().is_empty()).take(count).enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            bail!("XYZ row {} has {} columns, expected 'El x y z'", row + 1, parts.len());
        }
        records.push(AtomRecord::new(
            parts[0],
            parse_float(parts[1])?,
            parse_float(parts[2])?,
            parse_float(parts[3])?,
        ));
    }

    if records.len() != count {
        bail!("XYZ header declares {} atoms but {} rows were found", count, records.len());
    }
    Ok(records)
}

/// DAT: whitespace-separated `x y z` or `El x y z` rows. `#` comments and
/// rows that do not parse (column headers) are skipped.
pub fn parse_dat_str(contents: &str) -> Result<Vec<AtomRecord>> {
    let mut records = Vec::new();
    for (line_no, raw) in contents.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let numbers: Vec<f64> = parts.iter().filter_map(|p| p.parse::<f64>().ok()).collect();

        let record = match (parts.len(), numbers.len()) {
            (3, 3) => Some(AtomRecord::new(DEFAULT_ELEMENT, numbers[0], numbers[1], numbers[2])),
            (n, _) if n >= 4 && parts[0].parse::<f64>().is_err() => {
                match (parts[1].parse::<f64>(), parts[2].parse::<f64>(), parts[3].parse::<f64>()) {
                    (Ok(x), Ok(y), Ok(z)) => Some(AtomRecord::new(parts[0], x, y, z)),
                    _ => None,
                }
            }
            _ => None,
        };

        match record {
            Some(r) => records.push(r),
            None => log::debug!("skipping non-coordinate line {}: '{}'", line_no + 1, line),
        }
    }

    if records.is_empty() {
        bail!("No coordinate rows found in DAT input.");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xyz_rows_are_read_in_order() {
        let text = "3\nbenzene fragment\nC 0.0 0.0 0.0\nC 1.42 0.0 0.0\nN 2.0 1.0 -0.5 extra\n";
        let records = parse_xyz_str(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].element, "N");
        assert_eq!(records[2].position.z, -0.5);
    }

    #[test]
    fn xyz_count_mismatch_is_an_error() {
        assert!(parse_xyz_str("4\n\nC 0 0 0\n").is_err());
        assert!(parse_xyz_str("many\n\nC 0 0 0\n").is_err());
    }

    #[test]
    fn dat_skips_headers_and_defaults_element() {
        let text = "# tube\nx y z\n0.0 0.0 0.0\nSi 1.0 2.0 3.0 # tagged\n\n1.42 0 0\n";
        let records = parse_dat_str(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].element, "C");
        assert_eq!(records[1].element, "Si");
        assert_eq!(records[2].position.x, 1.42);
    }
}
