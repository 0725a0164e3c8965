//! Anonymization-mode behavior gets its own test binary: the recording
//! time offset is process-global, one-shot state, so nothing else may run
//! beside it.

use mef3::reader;
use mef3::{
    AnnotationWriter, ChannelConfig, ChannelWriter, RecordBody, TimeOffsetMode,
};

const BASE_TIMESTAMP: i64 = 946_684_800_000_000; // 2000-01-01 00:00:00 UTC

#[test]
fn test_offset_mode_end_to_end() {
    mef3::set_time_offset_mode(TimeOffsetMode::Apply);

    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("anon_session");
    let config = ChannelConfig {
        channel_name: "chan".to_string(),
        sampling_frequency: 1000.0,
        secs_per_block: 1.0,
        block_interval: 1_000_000,
        gmt_offset_hours: -6.0,
        anonymized_name: "anon".to_string(),
        num_secs_per_segment: 1,
        ..ChannelConfig::default()
    };

    let mut writer = ChannelWriter::create(&session, config).unwrap();
    let times: Vec<i64> = (0..2000).map(|i| BASE_TIMESTAMP + i * 1000).collect();
    let samples: Vec<i32> = (0..2000).map(|i| (i % 256) as i32).collect();
    writer.write(&times, &samples, 1.0, 1000.0).unwrap();
    writer.close().unwrap();

    // at GMT-6 the first block lands 18 hours into the anonymized local day
    let expected_start = -18 * 3600 * 1_000_000i64;
    let offset = mef3::globals::recording_time_offset().unwrap();
    assert_eq!(offset, BASE_TIMESTAMP - 18 * 3600 * 1_000_000);

    let root = dir.path().join("anon_session.mefd");
    let seg0 = root.join("chan.timd").join("chan-000000.segd");
    let (header0, md0) =
        reader::read_segment_metadata(seg0.join("chan-000000.tmet")).unwrap();
    assert_eq!(header0.start_time, expected_start);
    assert_eq!(md0.recording_time_offset, offset);
    assert_eq!(md0.gmt_offset, -6 * 3600);
    assert_eq!(md0.recording_duration, 1_000_000);

    // offset block times decrease as real time advances
    let (_, entries0) = reader::read_index_entries(seg0.join("chan-000000.tidx")).unwrap();
    assert_eq!(entries0.len(), 1);
    assert_eq!(entries0[0].start_time, expected_start);

    // the 1-second segment budget walks backwards through offset time
    let seg1 = root.join("chan.timd").join("chan-000001.segd");
    let (header1, md1) =
        reader::read_segment_metadata(seg1.join("chan-000001.tmet")).unwrap();
    assert_eq!(header1.segment_number, 1);
    assert_eq!(md1.start_sample, 1000);
    let (_, entries1) = reader::read_index_entries(seg1.join("chan-000001.tidx")).unwrap();
    assert_eq!(entries1[0].start_time, expected_start - 1_000_000);

    // record times share the session offset
    let mut records = AnnotationWriter::create_or_append(&session, -6.0, "anon").unwrap();
    records
        .write_record(BASE_TIMESTAMP + 500_000, &RecordBody::Note("mark".to_string()))
        .unwrap();
    records.close().unwrap();
    let rdat_header = reader::read_universal_header(root.join("anon_session.rdat")).unwrap();
    assert_eq!(rdat_header.start_time, expected_start - 500_000);
}
