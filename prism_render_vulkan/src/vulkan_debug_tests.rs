use super::*;

#[test]
fn test_stats_total() {
    let stats = ValidationStats { errors: 2, warnings: 3, info: 4, verbose: 1 };
    assert_eq!(stats.total(), 10);
    assert_eq!(ValidationStats::default().total(), 0);
}

#[test]
fn test_repeated_messages_are_counted() {
    assert_eq!(track_message("test-VUID-repeat"), 1);
    assert_eq!(track_message("test-VUID-repeat"), 2);
    assert_eq!(track_message("test-VUID-other"), 1);
    assert_eq!(track_message("test-VUID-repeat"), 3);
}
