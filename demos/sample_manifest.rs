use log::info;
use speech_subset::sink::write_metadata;
use speech_subset::source::ManifestSource;
use speech_subset::{AcceptancePolicy, Label, RunSpec, Sampler, WavClipWriter};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    // Check if the manifest exists
    let manifest_path = Path::new("demos/manifest.jsonl");
    if !manifest_path.exists() {
        println!("Manifest not found. Please provide a JSON-lines manifest at demos/manifest.jsonl");
        return Ok(());
    }

    // Keep up to 20 clips between 1 and 10 seconds that have a transcript
    let policy = AcceptancePolicy::new(20)
        .with_duration_bounds(Some(1.0), Some(10.0))
        .require("transcript");
    let spec = RunSpec::new("demo", Label::Real)
        .with_source_name("demo manifest")
        .with_extra_field("language", "english");
    let sampler = Sampler::new(policy, spec)?;

    info!("Sampling {:?}...", manifest_path);
    let source = ManifestSource::open(manifest_path)?;
    let writer = WavClipWriter::new("demos/output/clips")?;
    let result = sampler.run(source, writer);

    println!("{}", result.summary());
    for failure in &result.failures {
        println!("  record {}: {}", failure.index, failure.reason);
    }

    if result.accepted_count() == 0 {
        println!("No clips accepted, skipping metadata");
        return Ok(());
    }

    let metadata_path = Path::new("demos/output/metadata.csv");
    write_metadata(metadata_path, &result.into_rows())?;
    println!("Metadata written to {}", metadata_path.display());

    Ok(())
}
