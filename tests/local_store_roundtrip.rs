use object_transcoder::{
    models::{
        compression::{CompressionState, IS_COMPRESSED, TRANSCODE_STATUS},
        metadata::decode_text,
        staging::{Retention, StagingConfig},
    },
    services::{
        codec::GzipCodec,
        local_store::LocalStore,
        observer::RecordingObserver,
        pipeline::{LeaseConfig, TranscodeState, Transcoder},
        store::ObjectStore,
    },
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

const PATH: &str = "/zone/home/rods/run1/a.fastq";

#[tokio::test]
async fn full_cycle_over_the_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/catalog.db", dir.path().display());
    let store = Arc::new(LocalStore::open(&url, dir.path().join("objects")).await.unwrap());

    let content = b"@r\nACGT\n+\nIIII\n".repeat(1000);
    let upload = dir.path().join("upload.fastq");
    std::fs::write(&upload, &content).unwrap();
    store.make_directory("/zone/home/rods/run1").await.unwrap();
    store.put(&upload, PATH).await.unwrap();
    store.set_metadata(PATH, "SAMPLE", "s1", "").await.unwrap();

    let staging = StagingConfig {
        remote_dir: "/zone/home/rods/itmp".into(),
        local_dir: dir.path().join("scratch"),
    };
    let pipeline = Transcoder::new(store.clone(), Arc::new(GzipCodec::default())).with_lease(Some(
        LeaseConfig {
            owner: "worker-1".into(),
            ttl: Duration::from_secs(60),
        },
    ));
    pipeline.prepare_staging(&staging).await.unwrap();
    let cancel = CancellationToken::new();

    let outcome = pipeline
        .compress(
            PATH,
            &staging,
            Retention::delete_all(),
            &RecordingObserver::new(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(outcome.final_state, TranscodeState::CleanedUp);

    let metadata = pipeline.metadata(PATH).await.unwrap();
    let state = CompressionState::from_metadata(&metadata);
    assert!(state.is_compressed);
    assert_eq!(state.uncompressed_size, Some(content.len() as u64));
    assert_eq!(
        metadata.value(TRANSCODE_STATUS).map(ToString::to_string).as_deref(),
        Some("COMPLETE")
    );
    assert!(!metadata.contains("LOCK_OWNER"));
    assert_eq!(
        metadata.value("SAMPLE").map(ToString::to_string).as_deref(),
        Some("s1")
    );

    let outcome = pipeline
        .decompress(
            PATH,
            &staging,
            Retention::delete_all(),
            &RecordingObserver::new(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(outcome.integrity_verified, Some(true));

    let download = dir.path().join("download.fastq");
    store.get(PATH, &download).await.unwrap();
    assert_eq!(std::fs::read(&download).unwrap(), content);

    let listing = store.metadata_text(PATH).await.unwrap();
    let metadata = decode_text(&listing).unwrap();
    assert_eq!(
        metadata.value(IS_COMPRESSED).and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(
        metadata.value("SAMPLE").map(ToString::to_string).as_deref(),
        Some("s1")
    );
    assert!(!metadata.contains("LOCK_OWNER"));

    let paths: Vec<_> = store
        .objects()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.path)
        .collect();
    assert_eq!(paths, vec![PATH.to_string()]);
}
