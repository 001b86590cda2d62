use ndarray::Array1;
use speech_subset::aggregate::scan_dataset;
use speech_subset::audio::save_audio;
use speech_subset::batch::run_job;
use speech_subset::config::JobConfig;
use speech_subset::Label;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn clip(path: &Path, seconds: f32) {
    let samples = (16_000.0 * seconds) as usize;
    let audio = Array1::from_shape_fn(samples, |i| ((i as f32) * 0.05).sin() * 0.3);
    save_audio(path, &audio, 16_000).unwrap();
}

/// Common Voice layout: `<lang>/train.tsv` plus `<lang>/clips/*.wav`
fn common_voice_fixture(root: &Path, lang: &str, durations: &[f32]) {
    let clips = root.join(lang).join("clips");
    fs::create_dir_all(&clips).unwrap();
    let mut tsv = String::from("client_id\tpath\tsentence\taccent\tlocale\n");
    for (i, &d) in durations.iter().enumerate() {
        let name = format!("{}_{}.wav", lang, i);
        clip(&clips.join(&name), d);
        tsv.push_str(&format!("spk{}\t{}\tsentence {}\t\t{}\n", i, name, i, lang));
    }
    fs::write(root.join(lang).join("train.tsv"), tsv).unwrap();
}

#[test]
fn multi_language_job_writes_clips_and_metadata() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    common_voice_fixture(&input, "en", &[0.5, 1.5, 2.0, 12.0, 3.0]);
    common_voice_fixture(&input, "es", &[1.0]);

    let out = tmp.path().join("datasets");
    let metadata = tmp.path().join("metadata").join("real.csv");
    let job = serde_json::json!({
        "output_dir": out,
        "metadata_path": metadata,
        "label": "real",
        "source_name": "CommonVoice",
        "policy": { "min_duration": 1.0, "max_duration": 10.0, "target_count": 2 },
        "batches": [
            { "name": "english",
              "source": { "kind": "common_voice", "tsv": input.join("en/train.tsv"), "clips_dir": input.join("en/clips") },
              "extra_fields": { "language": "english" } },
            { "name": "spanish",
              "source": { "kind": "common_voice", "tsv": input.join("es/train.tsv"), "clips_dir": input.join("es/clips") },
              "extra_fields": { "language": "spanish" } },
            { "name": "filipino",
              "source": { "kind": "common_voice", "tsv": input.join("tl/train.tsv"), "clips_dir": input.join("tl/clips") } }
        ]
    });
    let config: JobConfig = serde_json::from_value(job).unwrap();

    let report = run_job(&config).unwrap();

    assert_eq!(report.batches.len(), 3);
    let english = report.batches[0].outcome.as_ref().unwrap();
    assert!(english.is_complete());
    assert_eq!(english.records_seen, 3);
    let spanish = report.batches[1].outcome.as_ref().unwrap();
    assert_eq!(spanish.accepted_count(), 1);
    assert!(!spanish.is_complete());
    assert!(report.batches[2].outcome.is_err());

    assert!(out.join("english").join("english_0.wav").is_file());
    assert!(out.join("english").join("english_1.wav").is_file());
    assert!(!out.join("english").join("english_2.wav").exists());
    assert!(out.join("spanish").join("spanish_0.wav").is_file());

    assert!(report.metadata_written);
    let text = fs::read_to_string(&metadata).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(
        lines[0],
        "filename,label,duration,path,source,accent,language,speaker_id,transcript"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("english_0.wav,real,1.5,"));
    assert!(lines[1].ends_with(",CommonVoice,unknown,english,spk1,sentence 1"));
    assert!(lines[3].starts_with("spanish_0.wav,real,1,"));

    let scanned = scan_dataset(&out, Label::Real).unwrap();
    let names: Vec<_> = scanned.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, ["english_0.wav", "english_1.wav", "spanish_0.wav"]);
    assert_eq!(scanned[1].duration, Some(2.0));
}

#[test]
fn single_batch_manifest_job() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("codecfake");
    fs::create_dir_all(&input).unwrap();
    clip(&input.join("a.wav"), 1.0);
    clip(&input.join("b.wav"), 2.0);
    fs::write(
        input.join("manifest.jsonl"),
        concat!(
            r#"{"audio": "a.wav", "speaker_id": "p225", "codec_name": "encodec_24k"}"#, "\n",
            r#"{"audio": "missing.wav", "speaker_id": "p226", "codec_name": "dac"}"#, "\n",
            r#"{"audio": "b.wav", "codec_name": "speechtokenizer"}"#, "\n",
        ),
    )
    .unwrap();

    let metadata = tmp.path().join("fake.json");
    let job = serde_json::json!({
        "output_dir": tmp.path().join("fake_speech"),
        "metadata_path": metadata,
        "label": "fake",
        "source_name": "CodecFake",
        "prefix": "codecfake",
        "source": { "kind": "manifest", "path": input.join("manifest.jsonl") },
        "policy": { "target_count": 20 }
    });
    let config: JobConfig = serde_json::from_value(job).unwrap();

    let report = run_job(&config).unwrap();
    let result = report.batches[0].outcome.as_ref().unwrap();

    assert_eq!(result.accepted_count(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].index, 1);
    assert!(tmp.path().join("fake_speech").join("codecfake_1.wav").is_file());

    let rows: serde_json::Value = serde_json::from_str(&fs::read_to_string(&metadata).unwrap()).unwrap();
    assert_eq!(rows[0]["filename"], "codecfake_0.wav");
    assert_eq!(rows[0]["label"], "fake");
    assert_eq!(rows[0]["source"], "CodecFake");
    assert_eq!(rows[0]["speaker_id"], "p225");
    assert_eq!(rows[1]["codec_name"], "speechtokenizer");
    assert_eq!(rows[1]["duration"], 2.0);
}

#[test]
fn invalid_job_does_no_io() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("never");
    let job = serde_json::json!({
        "output_dir": out,
        "metadata_path": tmp.path().join("m.csv"),
        "label": "real",
        "prefix": "x",
        "source": { "kind": "manifest", "path": "whatever.jsonl" },
        "policy": { "min_duration": 5.0, "max_duration": 1.0, "target_count": 3 }
    });
    let config: JobConfig = serde_json::from_value(job).unwrap();

    assert!(run_job(&config).is_err());
    assert!(!out.exists());
    assert!(!tmp.path().join("m.csv").exists());
}
