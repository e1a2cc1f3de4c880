mod parsers;

use std::io::Write;
use std::path::Path;

use xraysim_data::SimDatabase;

fn main() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("generator crate lives inside the workspace");
    let data_dir = root.join("data_sources");

    if !data_dir.exists() {
        eprintln!(
            "Error: data_sources directory not found at {:?}",
            data_dir
        );
        std::process::exit(1);
    }

    println!("Parsing reference tables from {:?}...", data_dir);

    let version = parsers::parse_version(&data_dir.join("version.txt"));
    println!("  Version: {} entries", version.len());

    let elements = parsers::parse_elements(
        &data_dir.join("elements.txt"),
        &data_dir.join("mass_attenuation.txt"),
    );
    let tabulated = elements.iter().filter(|e| !e.energy.is_empty()).count();
    println!(
        "  Elements: {} entries ({} with attenuation tables)",
        elements.len(),
        tabulated
    );

    let tissue_materials =
        parsers::parse_tissue_materials(&data_dir.join("tissue_materials.txt"), &elements);
    println!("  Tissue materials: {} HU intervals", tissue_materials.len());

    let mu_water = parsers::parse_mu_water(&data_dir.join("mu_water.txt"));
    println!("  Water attenuation: {} energies", mu_water.len());

    let db = SimDatabase {
        version,
        elements,
        tissue_materials,
        mu_water,
    };

    println!("\nSerializing with postcard...");
    let serialized = postcard::to_allocvec(&db).expect("postcard serialization failed");
    println!("  Serialized size: {} bytes", serialized.len());

    println!("Compressing with zstd (level 19)...");
    let compressed = zstd::encode_all(&serialized[..], 19).expect("zstd compression failed");
    println!(
        "  Compressed size: {} bytes ({:.1}x)",
        compressed.len(),
        serialized.len() as f64 / compressed.len() as f64
    );

    let out_path = root.join("xraysim-lib").join("data").join("xraysim.bin.zst");
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create output directory");
    }
    let mut f = std::fs::File::create(&out_path).expect("failed to create output file");
    f.write_all(&compressed)
        .expect("failed to write compressed data");

    println!("\nWrote {:?}", out_path);

    println!("Verifying round-trip deserialization...");
    let decompressed = zstd::decode_all(&compressed[..]).expect("zstd decompression failed");
    assert_eq!(decompressed.len(), serialized.len());
    let db2: SimDatabase =
        postcard::from_bytes(&decompressed).expect("postcard deserialization failed");
    assert_eq!(db2.elements.len(), db.elements.len());
    assert_eq!(db2.mu_water.len(), db.mu_water.len());
    println!("  Round-trip OK!");
}
