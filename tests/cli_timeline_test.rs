//! Integration tests for `almanac timeline` and `almanac metrics`.

mod common;

use common::{TestEnv, parse_stdout};
use predicates::prelude::*;

const RELEASES: &str = r#"{"releases": [
    {"version": "1.0.1", "date": "2025-03-01", "type": "main"},
    {"version": "1.0.2", "date": "2025-03-05", "type": "branch-start"},
    {"version": "1.0.2.1", "date": "2025-03-08", "type": "branch"},
    {"version": "1.0.3", "date": "2025-03-12", "type": "branch-merge"},
    {"version": "1.0.4", "date": "2025-03-20", "note": "主线版本(商店发布)"}
]}"#;

const METRICS_DOC: &str = "# Weekly summary

本月总计新报**42**个Bug，总计关闭**37**个Bug。

### 有效Bug透视图
| 模块 | P0 | P1 | 合计 |
| --- | --- | --- | --- |
| 总数 | 5 | 15 | 20 |

### 不含In Review的有效Bug透视图
| 模块 | P0 | P1 | 合计 |
| --- | --- | --- | --- |
| 总数 | 4 | 11 | 15 |
";

#[test]
fn test_timeline_from_releases_file() {
    let env = TestEnv::new();
    env.write("releases.json", RELEASES);

    let output = env.almanac().arg("timeline").output().unwrap();
    assert!(output.status.success());
    let json = parse_stdout(&output.stdout);

    assert_eq!(json["events"], 5);
    assert_eq!(json["source"], "file");
    assert!(json.get("saved").is_none());
    assert_eq!(json["width"], 1200.0);
    assert_eq!(json["nodes"].as_array().unwrap().len(), 5);

    let branches = json["branches"].as_array().unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0]["merged"], true);
    assert_eq!(branches[0]["dash_array"], "0");

    assert_eq!(json["nodes"][2]["y"], 320.0);
    assert_eq!(json["nodes"][4]["style"], "store-release");
    assert_eq!(json["nodes"][4]["store_release"], true);
    assert_eq!(json["nodes"][4]["date_label"], "3.20");
    assert!(
        json["main_line"]["d"]
            .as_str()
            .unwrap()
            .ends_with("L 1140 200")
    );
}

#[test]
fn test_timeline_explicit_input_and_width() {
    let env = TestEnv::new();
    env.write("data/events.json", RELEASES);

    let output = env
        .almanac()
        .args(["timeline", "--input", "data/events.json", "--width", "2000"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(parse_stdout(&output.stdout)["width"], 2000.0);
}

#[test]
fn test_timeline_missing_input_fails() {
    let env = TestEnv::new();
    env.almanac()
        .args(["timeline", "--input", "missing.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_timeline_without_any_source_is_empty() {
    let env = TestEnv::new();
    let output = env.almanac().args(["timeline", "--fetch"]).output().unwrap();
    assert!(output.status.success());
    let json = parse_stdout(&output.stdout);
    assert_eq!(json["events"], 0);
    assert_eq!(json["source"], "empty");
    assert_eq!(json["nodes"], serde_json::json!([]));
}

#[test]
fn test_timeline_fetch_without_credentials_uses_file() {
    let env = TestEnv::new();
    env.write("releases.json", RELEASES);
    let output = env.almanac().args(["timeline", "--fetch"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(parse_stdout(&output.stdout)["events"], 5);
}

#[test]
fn test_timeline_human() {
    let env = TestEnv::new();
    env.write("releases.json", RELEASES);
    env.almanac()
        .args(["-H", "timeline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 events from releases file"))
        .stdout(predicate::str::contains("branch 0 from 1.0.2 (merged)"));
}

#[test]
fn test_metrics_document() {
    let env = TestEnv::new();
    env.write("bug_data.md", METRICS_DOC);

    let output = env.almanac().args(["metrics", "bug_data.md"]).output().unwrap();
    assert!(output.status.success());
    let json = parse_stdout(&output.stdout);
    assert_eq!(json["monthly_new"], 42);
    assert_eq!(json["monthly_closed"], 37);
    assert_eq!(json["total_valid"], 15);
    assert_eq!(json["in_review"], 5);
}

#[test]
fn test_metrics_missing_file_is_all_zero() {
    let env = TestEnv::new();
    let output = env.almanac().args(["metrics", "nope.md"]).output().unwrap();
    assert!(output.status.success());
    let json = parse_stdout(&output.stdout);
    assert_eq!(json["monthly_new"], 0);
    assert_eq!(json["total_valid"], 0);
}
