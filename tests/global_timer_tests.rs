//! Tests touching the process-wide cumulative timer
//!
//! They share `cumulative::global()`, so they run one at a time and compare
//! deltas rather than absolute totals.

use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use viscera::cumulative::{self, ManualTeardown, ProcessExit, TeardownRegistry};
use viscera::resolver::ModuleLoadResolver;
use viscera::workspace::StaticWorkspace;

const IMPORTER: &str = "file:///srv/app/src/main.js";

fn slow_loader(target: &str) -> viscera::Result<Value> {
    std::thread::sleep(Duration::from_millis(2));
    Ok(json!({ "default": target }))
}

#[test]
#[serial]
fn test_default_resolver_feeds_global_timer() {
    let before = cumulative::global().total_ns();
    let loads_before = cumulative::global().loads();

    let resolver = ModuleLoadResolver::new()
        .with_workspace(StaticWorkspace(vec![]))
        .with_teardown(Arc::new(ManualTeardown::new()));
    let value = resolver
        .profile_import("lodash", Some(IMPORTER), Some(&slow_loader), None)
        .unwrap();

    assert_eq!(value, json!("lodash"));
    assert_eq!(cumulative::global().loads(), loads_before + 1);
    assert!(cumulative::global().total_ns() >= before + 2_000_000);
}

#[test]
#[serial]
fn test_free_function_uses_global_timer() {
    let loads_before = cumulative::global().loads();
    let value = viscera::profile_import("./x.js", Some(IMPORTER), Some(&slow_loader)).unwrap();

    assert_eq!(value, json!("/srv/app/src/x.js"));
    assert_eq!(cumulative::global().loads(), loads_before + 1);
    assert!(cumulative::global().exit_report_registered());
}

#[test]
#[serial]
fn test_process_exit_accepts_hooks() {
    // The hook runs at process exit; registering must not block or panic
    ProcessExit.register(Box::new(|| {}));
    ProcessExit.register(Box::new(|| {}));
}

#[test]
#[serial]
fn test_global_report_line_format() {
    let line = cumulative::global().report_line();
    assert!(line.starts_with("Total cumulative dynamic import() time: "));
    assert!(line.ends_with("ms"));
    let number = line
        .trim_start_matches("Total cumulative dynamic import() time: ")
        .trim_end_matches("ms");
    assert_eq!(number.split('.').nth(1).map(str::len), Some(3));
}
