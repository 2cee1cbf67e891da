//! Menu upload against the mock board, including failures mid-table.

use dispenser_core::{BusConfig, Error, PumpCalibration};
use dispenser_hardware::{
    BoardLink,
    mock::{MockBoard, SimulatedBoard},
};
use dispenser_protocol::{BoardFrame, MenuTable};
use rstest::rstest;

#[rstest]
#[case(1)]
#[case(10)]
#[case(50)]
#[case(96)]
#[tokio::test(start_paused = true)]
async fn test_failure_stops_upload_without_retry(#[case] failing_write: usize) {
    let (board, handle) = MockBoard::new();
    let link = BoardLink::new(board, BusConfig::default());
    handle.fail_from_write(failing_write);

    let result = link.initialize_menu(&MenuTable::test_pattern()).await;

    assert!(matches!(result, Err(Error::TransmitFailed { .. })));
    // Every frame before the failing one went out; nothing after it.
    assert_eq!(handle.written().len(), failing_write - 1);
    assert_eq!(handle.write_attempts(), failing_write);
}

#[tokio::test(start_paused = true)]
async fn test_frames_sent_before_failure_are_intact() {
    let (board, handle) = MockBoard::new();
    let bus = BusConfig::default();
    let link = BoardLink::new(board, bus);
    handle.fail_from_write(10);

    let table = MenuTable::test_pattern();
    assert!(link.initialize_menu(&table).await.is_err());

    let sent = handle.frames(&bus).unwrap();
    let expected: Vec<_> = table.frames().take(9).map(BoardFrame::Recipe).collect();
    assert_eq!(sent, expected);
}

#[tokio::test(start_paused = true)]
async fn test_reupload_after_failure_completes() {
    let (board, handle) = MockBoard::new();
    let bus = BusConfig::default();
    let link = BoardLink::new(board, bus);
    let table = MenuTable::test_pattern();

    handle.fail_from_write(40);
    assert!(link.initialize_menu(&table).await.is_err());

    handle.clear_write_failure();
    handle.clear_history();
    link.initialize_menu(&table).await.unwrap();

    let frames = handle.frames(&bus).unwrap();
    let received = MenuTable::from_frames(frames.into_iter().filter_map(|frame| match frame {
        BoardFrame::Recipe(recipe) => Some(recipe),
        _ => None,
    }))
    .unwrap();
    assert_eq!(received, table);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_board_stores_uploaded_table() {
    let bus = BusConfig::default();
    let (board, handle) = SimulatedBoard::new(bus, PumpCalibration::default());
    let link = BoardLink::new(board, bus);

    link.initialize_menu(&MenuTable::test_pattern()).await.unwrap();

    assert_eq!(handle.recipe_frames_received(), 96);
    assert_eq!(handle.stored_durations(0, 0), Some([51, 52, 53, 54, 55, 56, 57, 58]));
    assert_eq!(handle.stored_durations(23, 3), Some([74, 75, 76, 77, 78, 79, 80, 81]));
}
