use std::path::{Path, PathBuf};

use mef3::reader;
use mef3::{ChannelConfig, ChannelWriter, MefError};

const BASE_TIMESTAMP: i64 = 946_684_800_000_000;

fn ramp_signal(n: usize) -> (Vec<i64>, Vec<i32>) {
    let times = (0..n).map(|i| BASE_TIMESTAMP + i as i64 * 1000).collect();
    let samples = (0..n).map(|i| (i % 4096) as i32 - 2048).collect();
    (times, samples)
}

fn stream_config(secs_per_segment: u64) -> ChannelConfig {
    ChannelConfig {
        channel_name: "stream".to_string(),
        acquisition_channel_number: 7,
        secs_per_block: 1.0,
        block_interval: 1_000_000,
        sampling_frequency: 1000.0,
        anonymized_name: "anon".to_string(),
        num_secs_per_segment: secs_per_segment,
        ..ChannelConfig::default()
    }
}

fn segment_file(session_root: &Path, segment: i32, ext: &str) -> PathBuf {
    let base = format!("stream-{:06}", segment);
    session_root
        .join("stream.timd")
        .join(format!("{}.segd", base))
        .join(format!("{}.{}", base, ext))
}

#[test]
fn test_incremental_writes_match_bulk() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("chunked");

    let mut writer = ChannelWriter::create(&session, stream_config(0)).unwrap();
    let (times, samples) = ramp_signal(10_000);
    // 模拟实时数据流,每次写入一小段
    for (t_chunk, s_chunk) in times.chunks(137).zip(samples.chunks(137)) {
        writer.write(t_chunk, s_chunk, 1.0, 1000.0).unwrap();
    }
    writer.close().unwrap();

    let root = dir.path().join("chunked.mefd");
    let (_, md) = reader::read_segment_metadata(segment_file(&root, 0, "tmet")).unwrap();
    assert_eq!(md.number_of_blocks, 10);
    assert_eq!(md.number_of_samples, 10_000);
    assert_eq!(md.number_of_discontinuities, 1);

    let (_, entries) = reader::read_index_entries(segment_file(&root, 0, "tidx")).unwrap();
    assert_eq!(entries.len(), 10);
    for (k, entry) in entries.iter().enumerate() {
        assert_eq!(entry.start_sample, k as i64 * 1000);
        assert_eq!(entry.number_of_samples, 1000);
    }
}

#[test]
fn test_flush_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("flush");

    let mut writer = ChannelWriter::create(&session, stream_config(0)).unwrap();
    let (times, samples) = ramp_signal(500);
    writer.write(&times, &samples, 1.0, 1000.0).unwrap();

    writer.flush().unwrap();
    let root = dir.path().join("flush.mefd");
    let (_, entries) = reader::read_index_entries(segment_file(&root, 0, "tidx")).unwrap();
    assert_eq!(entries.len(), 1);

    // a second flush with nothing buffered writes nothing
    writer.flush().unwrap();
    let (_, entries) = reader::read_index_entries(segment_file(&root, 0, "tidx")).unwrap();
    assert_eq!(entries.len(), 1);

    // the block after a flush is discontinuous even with contiguous times
    let times2: Vec<i64> = (500..1000).map(|i| BASE_TIMESTAMP + i * 1000).collect();
    let samples2 = vec![5i32; 500];
    writer.write(&times2, &samples2, 1.0, 1000.0).unwrap();
    writer.close().unwrap();

    let (_, md) = reader::read_segment_metadata(segment_file(&root, 0, "tmet")).unwrap();
    assert_eq!(md.number_of_blocks, 2);
    assert_eq!(md.number_of_discontinuities, 2);
    let (_, entries) = reader::read_index_entries(segment_file(&root, 0, "tidx")).unwrap();
    assert_eq!(entries[1].flags & 1, 1);
    assert_eq!(entries[1].start_sample, 500);
}

#[test]
fn test_flush_before_any_write_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("idle");
    let mut writer = ChannelWriter::create(&session, stream_config(0)).unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();

    let root = dir.path().join("idle.mefd");
    let (_, md) = reader::read_segment_metadata(segment_file(&root, 0, "tmet")).unwrap();
    assert_eq!(md.number_of_blocks, 0);
    assert_eq!(md.number_of_samples, 0);
}

#[test]
fn test_segment_rollover() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("rollover");

    // 每2秒切换一个segment
    let mut writer = ChannelWriter::create(&session, stream_config(2)).unwrap();
    let (times, samples) = ramp_signal(5000);
    writer.write(&times, &samples, 1.0, 1000.0).unwrap();
    assert_eq!(writer.segment_number(), 1);
    writer.close().unwrap();

    let root = dir.path().join("rollover.mefd");

    let (header0, md0) = reader::read_segment_metadata(segment_file(&root, 0, "tmet")).unwrap();
    assert_eq!(header0.segment_number, 0);
    assert_eq!(md0.start_sample, 0);
    assert_eq!(md0.number_of_samples, 2000);
    assert_eq!(md0.number_of_blocks, 2);

    let (header1, md1) = reader::read_segment_metadata(segment_file(&root, 1, "tmet")).unwrap();
    assert_eq!(header1.segment_number, 1);
    assert_eq!(md1.start_sample, 2000);
    assert_eq!(md1.number_of_samples, 3000);
    assert_eq!(md1.number_of_blocks, 3);

    let (_, entries0) = reader::read_index_entries(segment_file(&root, 0, "tidx")).unwrap();
    assert_eq!(
        entries0.iter().map(|e| e.start_sample).collect::<Vec<_>>(),
        vec![0, 1000]
    );
    // index start samples restart inside each segment
    let (_, entries1) = reader::read_index_entries(segment_file(&root, 1, "tidx")).unwrap();
    assert_eq!(
        entries1.iter().map(|e| e.start_sample).collect::<Vec<_>>(),
        vec![0, 1000, 2000]
    );

    // each segment trio shares a level UUID; segments differ
    let data0 = reader::read_universal_header(segment_file(&root, 0, "tdat")).unwrap();
    let inds0 = reader::read_universal_header(segment_file(&root, 0, "tidx")).unwrap();
    let data1 = reader::read_universal_header(segment_file(&root, 1, "tdat")).unwrap();
    assert_eq!(data0.level_uuid, inds0.level_uuid);
    assert_eq!(data0.level_uuid, header0.level_uuid);
    assert_ne!(data0.level_uuid, data1.level_uuid);
    assert_ne!(data0.file_uuid, inds0.file_uuid);
    assert_eq!(data0.session_name, data1.session_name);
}

#[test]
fn test_append_continues_channel() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("appendable");

    let mut writer = ChannelWriter::create(&session, stream_config(0)).unwrap();
    let (times, samples) = ramp_signal(10_000);
    writer.write(&times, &samples, 1.0, 1000.0).unwrap();
    writer.close().unwrap();

    let mut writer =
        ChannelWriter::append(&session, "stream", 1, None, None, 0, false).unwrap();
    let times2: Vec<i64> = (0..1000).map(|i| BASE_TIMESTAMP + (10_000 + i) * 1000).collect();
    let samples2 = vec![42i32; 1000];
    writer.write(&times2, &samples2, 1.0, 1000.0).unwrap();
    writer.close().unwrap();

    let root = dir.path().join("appendable.mefd");
    let (header1, md1) = reader::read_segment_metadata(segment_file(&root, 1, "tmet")).unwrap();
    assert_eq!(header1.segment_number, 1);
    assert_eq!(header1.session_name, "appendable");
    assert_eq!(header1.channel_name, "stream");
    assert_eq!(md1.start_sample, 10_000);
    assert_eq!(md1.number_of_samples, 1000);
    // channel parameters carried over from segment 0
    assert_eq!(md1.sampling_frequency, 1000.0);
    assert_eq!(md1.block_interval, 1_000_000);
    assert_eq!(md1.acquisition_channel_number, 7);

    // the first appended block is discontinuous by definition
    let (_, entries1) = reader::read_index_entries(segment_file(&root, 1, "tidx")).unwrap();
    assert_eq!(entries1.len(), 1);
    assert_eq!(entries1[0].flags & 1, 1);
    assert_eq!(entries1[0].start_sample, 0);
    assert_eq!(md1.number_of_discontinuities, 1);
}

#[test]
fn test_append_rejects_nonpositive_segment() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("bad_append");
    match ChannelWriter::append(&session, "stream", 0, None, None, 0, false) {
        Err(MefError::InvalidSegmentNumber(0)) => {}
        other => panic!("expected InvalidSegmentNumber, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_empty_and_mismatched_writes() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("edge");
    let mut writer = ChannelWriter::create(&session, stream_config(0)).unwrap();

    writer.write(&[], &[], 1.0, 1000.0).unwrap();
    assert!(matches!(
        writer.write(&[BASE_TIMESTAMP], &[1, 2], 1.0, 1000.0),
        Err(MefError::InvalidFormat(_))
    ));
    writer.close().unwrap();
}

#[test]
fn test_password_policy_enforced_at_create() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = stream_config(0);
    config.level_2_password = Some("subject".to_string());
    assert!(matches!(
        ChannelWriter::create(dir.path().join("p1"), config),
        Err(MefError::PasswordPolicy(_))
    ));

    let mut config = stream_config(0);
    config.level_1_password = Some("same".to_string());
    config.level_2_password = Some("same".to_string());
    assert!(matches!(
        ChannelWriter::create(dir.path().join("p2"), config),
        Err(MefError::PasswordPolicy(_))
    ));

    let mut config = stream_config(0);
    config.level_1_password = Some("tech".to_string());
    config.level_2_password = Some("subject".to_string());
    let writer = ChannelWriter::create(dir.path().join("p3"), config).unwrap();
    writer.close().unwrap();

    // encrypted sessions carry validation fields and skip the manifest
    let root = dir.path().join("p3.mefd");
    let header = reader::read_universal_header(segment_file(&root, 0, "tmet")).unwrap();
    assert_ne!(header.level_1_password_validation, [0u8; 16]);
    assert_ne!(header.level_2_password_validation, [0u8; 16]);
    assert!(!root.join("p3.mefd").exists());
    let (_, md) = reader::read_segment_metadata(segment_file(&root, 0, "tmet")).unwrap();
    assert_eq!(md.section_2_encryption, 1);
    assert_eq!(md.section_3_encryption, 2);
}
