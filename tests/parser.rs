//! Line parser behaviour on well-formed, degraded and broken input.

use memcload::error::ParseError;
use memcload::record::{AppsInstalled, DeviceType, Parsed, parse_line};

fn record(line: &str) -> AppsInstalled {
    match parse_line(line) {
        Ok(Parsed::Record(record)) => record,
        other => panic!("expected a record for {line:?}, got {other:?}"),
    }
}

#[test]
fn test_trailing_separator_and_spaces_in_apps() {
    let r = record("idfa\t1\t0\t0\t1423,   ");
    assert_eq!(r.device_type, DeviceType::Idfa);
    assert_eq!(r.device_id, "1");
    assert_eq!(r.lat, 0.0);
    assert_eq!(r.lon, 0.0);
    assert_eq!(r.apps, vec![1423]);
}

#[test]
fn test_bad_coordinates_and_non_numeric_app_degrade() {
    let r = record("adid\t1\ta\tb\t1,  2,  aaa, 42");
    assert_eq!(r.device_type, DeviceType::Adid);
    assert_eq!(r.device_id, "1");
    assert!(r.lat.is_nan());
    assert!(r.lon.is_nan());
    assert_eq!(r.apps, vec![1, 2, 42]);
}

#[test]
fn test_four_fields_is_malformed() {
    assert_eq!(
        parse_line("idfa\t1\t0\t0"),
        Err(ParseError::MalformedLine { fields: 4 })
    );
}

#[test]
fn test_unknown_device_type() {
    assert_eq!(
        parse_line("xxxx\t1\t0\t0\t1,2,3"),
        Err(ParseError::UnknownDeviceType("xxxx".to_string()))
    );
}

#[test]
fn test_empty_device_id() {
    assert_eq!(
        parse_line("gaid\t\t0\t0\t1,2,3"),
        Err(ParseError::MissingDeviceId)
    );
}

#[test]
fn test_blank_lines_are_skipped() {
    assert_eq!(parse_line(""), Ok(Parsed::Skip));
    assert_eq!(parse_line("   \r\n"), Ok(Parsed::Skip));
    assert_eq!(parse_line("\t\t"), Ok(Parsed::Skip));
}

#[test]
fn test_device_type_is_case_insensitive() {
    assert_eq!(record("GAID\tabc\t1.5\t-2.5\t7").device_type, DeviceType::Gaid);
    assert_eq!(record("Dvid\tabc\t1.5\t-2.5\t7").device_type, DeviceType::Dvid);
}

#[test]
fn test_one_bad_coordinate_voids_both() {
    let r = record("idfa\tx\t55.5\tnorth\t1");
    assert!(r.lat.is_nan());
    assert!(r.lon.is_nan());
}

#[test]
fn test_negative_app_ids_are_kept() {
    let r = record("     gaid\t1\t-100\t-1000\t-1,0,1   ");
    assert_eq!(r.device_type, DeviceType::Gaid);
    assert_eq!(r.lat, -100.0);
    assert_eq!(r.lon, -1000.0);
    assert_eq!(r.apps, vec![-1, 0, 1]);
}

#[test]
fn test_out_of_range_app_ids_are_dropped() {
    let r = record("idfa\tx\t1\t2\t2147483648,2147483647,-2147483649,-2147483648");
    assert_eq!(r.apps, vec![2147483647, -2147483648]);
}

#[test]
fn test_extra_columns_are_malformed() {
    assert_eq!(
        parse_line("dvid\tx\t1\t2\t3,4\textra\tcolumns"),
        Err(ParseError::MalformedLine { fields: 7 })
    );
    assert_eq!(
        parse_line("idfa\t1\t0\t0\t1,2\textra"),
        Err(ParseError::MalformedLine { fields: 6 })
    );
}

#[test]
fn test_routing_key() {
    let r = record("idfa\te7e1a50c0ec2747ca56cd9e1558c0d7c\t67.7\t-22.4\t1,2");
    let key = r.routing_key();
    assert_eq!(key.device_type, DeviceType::Idfa);
    assert_eq!(key.store_key(), "idfa:e7e1a50c0ec2747ca56cd9e1558c0d7c");
    assert_eq!(key.to_string(), key.store_key());
}

#[test]
fn test_parse_error_reasons() {
    let reasons: Vec<_> = ["idfa\t1", "zzz\t1\t0\t0\t1", "idfa\t\t0\t0\t1"]
        .into_iter()
        .map(|line| parse_line(line).unwrap_err().reason())
        .collect();
    assert_eq!(
        reasons,
        vec!["malformed_line", "unknown_device_type", "missing_device_id"]
    );
}
