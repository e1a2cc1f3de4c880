use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use xraysim_data::{AttenuationRecord, ElementRecord, ElementWeight, TissueMaterialRecord, VersionRecord};

/// Data rows of a whitespace-separated table, with the header line dropped.
fn table_rows(path: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().map(str::to_string).collect())
        .collect()
}

fn number<T: std::str::FromStr>(word: &str, path: &Path) -> T {
    word.parse()
        .unwrap_or_else(|_| panic!("invalid number '{word}' in {}", path.display()))
}

pub fn parse_version(path: &Path) -> Vec<VersionRecord> {
    let content = std::fs::read_to_string(path).expect("failed to read version.txt");
    let mut records = Vec::new();
    for line in content.lines() {
        if line.starts_with('#') || line.trim().len() < 3 {
            continue;
        }
        let parts: Vec<&str> = line.splitn(3, "//").collect();
        if parts.len() == 3 {
            records.push(VersionRecord {
                tag: parts[0].trim().to_string(),
                date: parts[1].trim().to_string(),
                notes: parts[2].trim().to_string(),
            });
        }
    }
    records
}

/// Element metadata joined with the per-element mass attenuation tables.
pub fn parse_elements(elements_path: &Path, attenuation_path: &Path) -> Vec<ElementRecord> {
    let mut tables: BTreeMap<u16, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in table_rows(attenuation_path) {
        if row.len() < 3 {
            continue;
        }
        let z: u16 = number(&row[0], attenuation_path);
        let entry = tables.entry(z).or_default();
        entry.0.push(number(&row[1], attenuation_path));
        entry.1.push(number(&row[2], attenuation_path));
    }

    for (z, (energy, _)) in &tables {
        assert!(
            energy.windows(2).all(|w| w[0] <= w[1]),
            "energies of Z={z} are not sorted"
        );
    }

    let mut records = Vec::new();
    for row in table_rows(elements_path) {
        if row.len() < 5 {
            continue;
        }
        let atomic_number: u16 = number(&row[0], elements_path);
        let (energy, mass_attenuation) = tables.remove(&atomic_number).unwrap_or_default();
        records.push(ElementRecord {
            atomic_number,
            symbol: row[1].clone(),
            name: row[2].clone(),
            molar_mass: number(&row[3], elements_path),
            density: number(&row[4], elements_path),
            energy,
            mass_attenuation,
        });
    }

    if let Some(z) = tables.keys().next() {
        panic!("attenuation table for Z={z} has no element entry");
    }
    records
}

/// HU intervals; the header names the element of every weight column.
pub fn parse_tissue_materials(path: &Path, elements: &[ElementRecord]) -> Vec<TissueMaterialRecord> {
    let content = std::fs::read_to_string(path).expect("failed to read tissue_materials.txt");
    let header: Vec<&str> = content
        .lines()
        .next()
        .map(|line| line.split_whitespace().skip(2).collect())
        .unwrap_or_default();

    let symbol_to_z: HashMap<&str, u16> = elements
        .iter()
        .map(|e| (e.symbol.as_str(), e.atomic_number))
        .collect();
    let columns: Vec<u16> = header
        .iter()
        .map(|symbol| {
            *symbol_to_z
                .get(symbol)
                .unwrap_or_else(|| panic!("unknown element column '{symbol}'"))
        })
        .collect();

    let mut records = Vec::new();
    for row in table_rows(path) {
        if row.len() < 2 + columns.len() {
            continue;
        }
        let weights = columns
            .iter()
            .zip(&row[2..])
            .map(|(&atomic_number, word)| ElementWeight {
                atomic_number,
                weight: number(word, path),
            })
            .filter(|w| w.weight > 0.0)
            .collect();
        records.push(TissueMaterialRecord {
            min_hu: number(&row[0], path),
            max_hu: number(&row[1], path),
            weights,
        });
    }
    records
}

/// Water attenuation records; an optional third column is ignored.
pub fn parse_mu_water(path: &Path) -> Vec<AttenuationRecord> {
    let mut records: Vec<AttenuationRecord> = table_rows(path)
        .iter()
        .filter(|row| row.len() >= 2)
        .map(|row| AttenuationRecord {
            energy: number(&row[0], path),
            mu: number(&row[1], path),
        })
        .collect();
    records.sort_by(|a, b| a.energy.total_cmp(&b.energy));
    records
}
