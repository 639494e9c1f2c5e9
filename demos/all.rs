use capture2olb_rs::materialize_component;
use std::{env, fs, path::Path, time::Instant};

fn main() {
    env_logger::init();

    let xml_files: Vec<String> = env::args().skip(1).collect();
    if xml_files.is_empty() {
        eprintln!("usage: cargo run --example all -- <part.xml>...");
        return;
    }

    let start_time = Instant::now();
    for xml_file in &xml_files {
        let entry_start_time = Instant::now();
        let xml = match fs::read_to_string(xml_file) {
            Ok(xml) => xml,
            Err(e) => {
                eprintln!("Error reading {}: {}", xml_file, e);
                continue;
            }
        };
        let base_name = Path::new(xml_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN");

        match materialize_component(&xml, Path::new("example_lib"), base_name) {
            Ok(part) => match part.olb_path {
                Some(olb) => println!("Converted {} -> {:?}", xml_file, olb),
                None => println!("Kept XML only for {}: {:?}", xml_file, part.xml_path),
            },
            Err(e) => eprintln!("Error materializing {}: {}", xml_file, e),
        }

        println!("Processed entry in : {:?}", entry_start_time.elapsed());
    }
    println!(
        "Processed {:?} Entries in : {:?}",
        xml_files.len(),
        start_time.elapsed()
    );
}
