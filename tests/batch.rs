use serde_json::{json, Value};
use std::fs;
use std::time::Duration;
use tempdir::TempDir;

use repo_snapshots::config::ApiConfig;
use repo_snapshots::http::mock::MockTransport;
use repo_snapshots::http::{Api, Response, Unlimited};
use repo_snapshots::poll::ThreadSleeper;
use repo_snapshots::{
    Driver, FsStore, GitHub, InputRow, Orchestrator, Poller, RepoId, RepositoryUnavailable,
    Resource, SnapshotStore,
};

const BASE: &str = "https://api.github.com";
const GRAPHQL: &str = "https://api.github.com/graphql";

fn orchestrator(mock: &MockTransport, temp: &TempDir) -> Orchestrator<FsStore> {
    let api = Api::new(mock.clone(), Unlimited, BASE, GRAPHQL);
    let cfg = ApiConfig {
        commit_details: false,
        ..Default::default()
    };

    Orchestrator::new(
        FsStore::new(temp.path()),
        GitHub::new(api, &cfg),
        Poller::new(2, Duration::from_millis(0), ThreadSleeper),
    )
}

/// Make `owner/name` look like a small but real repository.
fn publish(mock: &MockTransport, owner: &str, name: &str) {
    let repo = format!("{}/repos/{}/{}", BASE, owner, name);

    mock.on_get(
        &repo,
        vec![Response::ok(&json!({
            "full_name": format!("{}/{}", owner, name),
            "default_branch": "master",
            "stargazers_count": 12,
        }))],
    );
    mock.on_get(
        &format!("{}/commits", repo),
        vec![
            Response::ok(&json!([
                {
                    "sha": "b",
                    "commit": {
                        "author": {"name": "Alice", "date": "2020-03-01T00:00:00Z"},
                        "message": "Add CI workflow",
                    },
                    "author": {"login": "alice"},
                },
                {
                    "sha": "a",
                    "commit": {
                        "author": {"name": "Alice", "date": "2020-01-01T00:00:00Z"},
                        "message": "Initial commit",
                    },
                    "author": {"login": "alice"},
                },
            ])),
            Response::ok(&json!([])),
        ],
    );
    mock.on_get(
        &format!("{}/forks", repo),
        vec![
            Response::ok(&json!([{
                "created_at": "2021-01-01T00:00:00Z",
                "full_name": format!("someone/{}", name),
                "owner": {"login": "someone"},
            }])),
            Response::ok(&json!([])),
        ],
    );
    mock.on_get(
        &format!("{}/languages", repo),
        vec![Response::ok(&json!({"C++": 1000, "CMake": 20}))],
    );
    mock.on_get(
        &format!("{}/stats/commit_activity", repo),
        vec![
            Response::json(202, &json!({})),
            Response::ok(&json!([{"week": 1577577600, "total": 2, "days": [0, 1, 1, 0, 0, 0, 0]}])),
        ],
    );
}

fn read_all(temp: &TempDir, repo: &RepoId) -> Vec<(String, String)> {
    let dir = FsStore::new(temp.path()).repo_dir(repo);

    Resource::ALL
        .iter()
        .map(|r| {
            let contents = fs::read_to_string(dir.join(r.file_name())).unwrap();
            (r.file_name(), contents)
        })
        .collect()
}

fn row(full_name: &str) -> InputRow {
    InputRow::new(vec![("full_name", full_name)])
}

#[test]
fn running_twice_is_a_no_op() {
    let temp = TempDir::new("batch").unwrap();
    let mock = MockTransport::new();
    publish(&mock, "ros", "geometry2");
    let repo = RepoId::new("ros", "geometry2");
    let orch = orchestrator(&mock, &temp);

    let first = orch.run(&repo).unwrap();
    assert_eq!(first.written.len(), Resource::ALL.len());
    let requests_after_first_run = mock.requests().len();
    let snapshots = read_all(&temp, &repo);

    let second = orch.run(&repo).unwrap();

    assert!(second.already_complete());
    assert_eq!(mock.requests().len(), requests_after_first_run);
    assert_eq!(read_all(&temp, &repo), snapshots);
}

#[test]
fn snapshot_contents_are_normalized() {
    let temp = TempDir::new("batch").unwrap();
    let mock = MockTransport::new();
    publish(&mock, "ros", "geometry2");
    let repo = RepoId::new("ros", "geometry2");
    let orch = orchestrator(&mock, &temp);

    orch.run(&repo).unwrap();
    let store = orch.store();
    let get = |r: Resource| store.read(&repo, r).unwrap().unwrap();

    let info = get(Resource::GeneralInfo);
    assert_eq!(info.meta.owner, "ros");
    assert_eq!(info.meta.repo, "geometry2");
    assert_eq!(info.data["commits_count"], 2);
    assert_eq!(info.data["stargazers_count"], 12);

    assert_eq!(get(Resource::Forks).data[0]["owner"], "someone");
    assert_eq!(get(Resource::Languages).data, json!({"C++": 1000, "CMake": 20}));
    assert_eq!(
        get(Resource::WeeklyCommitActivity).data,
        json!([{"week": "2019-12-29", "total": 2}])
    );
    assert_eq!(get(Resource::Stars).data, json!([]));
    assert_eq!(get(Resource::Labels).data, json!({"count": 0, "labels": []}));
    assert_eq!(get(Resource::Contributing).data["found"], false);

    let firsts = get(Resource::FirstCommitsByAuthor).data;
    let firsts = firsts.as_array().unwrap();
    assert_eq!(firsts.len(), 1);
    assert_eq!(firsts[0]["author"], "alice");
    assert_eq!(firsts[0]["sha"], "a");
    assert_eq!(firsts[0]["commit_type"], "code");

    let raw: Value = serde_json::from_str(
        &fs::read_to_string(store.path(&repo, Resource::Commits)).unwrap(),
    )
    .unwrap();
    assert_eq!(raw["_meta"]["source"], "rest");
    assert_eq!(raw["_meta"]["endpoint"], "/repos/{owner}/{repo}/commits");
    assert!(raw["_meta"].get("truncated").is_none());
}

#[test]
fn only_the_missing_resource_is_refetched() {
    let temp = TempDir::new("batch").unwrap();
    let mock = MockTransport::new();
    publish(&mock, "ros", "geometry2");
    let repo = RepoId::new("ros", "geometry2");
    let orch = orchestrator(&mock, &temp);
    orch.run(&repo).unwrap();
    let before = read_all(&temp, &repo);

    let forks = orch.store().path(&repo, Resource::Forks);
    fs::remove_file(&forks).unwrap();
    let languages = orch.store().path(&repo, Resource::Languages);
    fs::write(&languages, "{ definitely not json").unwrap();
    let sent_before = mock.requests().len();

    let outcome = orch.run(&repo).unwrap();

    // the mock's fork listing is exhausted by now, so a single empty page
    assert_eq!(outcome.written, vec![Resource::Forks, Resource::Languages]);
    let refetched: Vec<String> = mock.requests()[sent_before..]
        .iter()
        .map(|r| r.url.clone())
        .collect();
    assert_eq!(
        refetched,
        vec![
            format!("{}/repos/ros/geometry2/forks", BASE),
            format!("{}/repos/ros/geometry2/languages", BASE),
        ]
    );

    let after = read_all(&temp, &repo);
    for (name, contents) in before {
        if name == "forks.json" || name == "languages.json" {
            continue;
        }
        let same = after.iter().find(|(n, _)| *n == name).unwrap();
        assert_eq!(same.1, contents, "{} changed", name);
    }
}

#[test]
fn one_bad_repository_doesnt_stop_the_batch() {
    let temp = TempDir::new("batch").unwrap();
    let mock = MockTransport::new();
    publish(&mock, "ros", "geometry2");
    publish(&mock, "ros-planning", "navigation2");
    let driver = Driver::new(orchestrator(&mock, &temp));
    let rows = vec![
        row("ros/geometry2"),
        row("ros/deleted"),
        row("ros-planning/navigation2"),
    ];

    let summary = driver.run(&rows);

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.total, 3);
    let (ref repo, ref err) = summary.failures[0];
    assert_eq!(*repo, RepoId::new("ros", "deleted"));
    assert!(err.downcast_ref::<RepositoryUnavailable>().is_some());

    let store = driver.orchestrator().store();
    let nav2 = RepoId::new("ros-planning", "navigation2");
    assert!(store.exists_and_valid(&nav2, Resource::FirstCommitsByAuthor));
    assert!(!store.repo_dir(&RepoId::new("ros", "deleted")).exists());
    assert_eq!(summary.tally(), "processed=2 skipped=0 failed=1 total_rows=3");
}

#[test]
fn unusable_rows_are_skipped() {
    let temp = TempDir::new("batch").unwrap();
    let mock = MockTransport::new();
    publish(&mock, "ros", "geometry2");
    let driver = Driver::new(orchestrator(&mock, &temp));
    let rows = vec![
        InputRow::new(vec![("name", "no identifier here")]),
        InputRow::new(vec![("html_url", "https://github.com/ros/geometry2.git")]),
        InputRow::new(vec![("url", "https://gitlab.com/ros/geometry2")]),
    ];

    let summary = driver.run(&rows);

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 1);
    assert!(summary.is_success());

    let again = driver.run(&rows);
    assert_eq!(again.processed, 1);
    assert_eq!(again.already_complete, 1);
}

#[test]
fn rows_are_read_from_csv() {
    let temp = TempDir::new("batch").unwrap();
    let csv = temp.path().join("repos.csv");
    fs::write(
        &csv,
        "full_name,html_url\nros/geometry2,\n,https://github.com/ros2/rclcpp/issues?q=1\n,\n",
    )
    .unwrap();

    let rows = repo_snapshots::repo::read_rows(&csv).unwrap();
    let ids: Vec<Option<RepoId>> = rows.iter().map(InputRow::repo_id).collect();

    assert_eq!(
        ids,
        vec![
            Some(RepoId::new("ros", "geometry2")),
            Some(RepoId::new("ros2", "rclcpp")),
            None,
        ]
    );
}
