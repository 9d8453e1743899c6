mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{setup_browser, setup_drive};
use datalab_file_browser::BrowserSettings;
use datalab_files_core::DatalabFileType;
use pretty_assertions::assert_eq;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_follows_focus() {
    let drive = setup_drive();
    let harness = setup_browser(vec![Arc::clone(&drive)], BrowserSettings::default());
    harness.browser.ready().await.unwrap();
    assert_eq!(drive.list_calls(), 1);

    sleep(Duration::from_secs(61)).await;
    assert_eq!(drive.list_calls(), 2);

    // Ticks keep coming while the document is hidden but do not list.
    harness.browser.set_document_focused(false);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(drive.list_calls(), 2);
    harness.browser.set_document_focused(true);

    harness.browser.blur_handler();
    assert!(!harness.browser.is_auto_refreshing());
    sleep(Duration::from_secs(180)).await;
    assert_eq!(drive.list_calls(), 2);

    harness.browser.focus_handler().await;
    assert!(harness.browser.is_auto_refreshing());
    assert_eq!(drive.list_calls(), 3);

    sleep(Duration::from_secs(61)).await;
    assert_eq!(drive.list_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_interval_is_configurable() {
    let drive = setup_drive();
    let settings = BrowserSettings {
        refresh_interval: Duration::from_secs(5),
        ..Default::default()
    };
    let harness = setup_browser(vec![Arc::clone(&drive)], settings);
    harness.browser.ready().await.unwrap();

    sleep(Duration::from_secs(16)).await;
    assert_eq!(drive.list_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_picks_up_new_items() {
    let drive = setup_drive();
    let mut harness = setup_browser(vec![Arc::clone(&drive)], BrowserSettings::default());
    harness.browser.ready().await.unwrap();
    harness.browser.set_selected_indices(vec![2]);
    harness.drain_events();

    sleep(Duration::from_secs(61)).await;
    assert!(harness.drain_events().is_empty());
    assert!(harness.browser.selected_file().is_some());

    drive.add("later.txt", DatalabFileType::File);
    sleep(Duration::from_secs(60)).await;

    assert_eq!(
        harness.file_names(),
        vec!["reports", "analysis.ipynb", "notes.txt", "later.txt"]
    );
    assert!(harness.browser.selected_file().is_none());
    assert_eq!(
        harness.drain_events(),
        vec![datalab_file_browser::BrowserEvent::FileListChanged { count: 4 }]
    );
}

#[tokio::test]
async fn test_dropping_browser_stops_refresh() {
    let drive = setup_drive();
    let harness = setup_browser(vec![Arc::clone(&drive)], BrowserSettings::default());
    harness.browser.ready().await.unwrap();
    assert!(harness.browser.is_auto_refreshing());

    let weak = Arc::downgrade(&harness.browser);
    drop(harness);
    tokio::task::yield_now().await;

    assert!(weak.upgrade().is_none());
}
