use std::fs;
use std::io::Write;

use coffee_world::experiment::{write_curves_file, Experiment};
use coffee_world::{AgentKind, Error, ExperimentConfig};

#[test]
fn config_file_drives_an_experiment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "agent": "q-learning",
            "rows": 2,
            "cols": 3,
            "spill_probabilities": [[0.0, 0.1, 0.1], [0.0, 0.0, 0.0]],
            "episodes": 3000,
            "report_every": 1000,
            "epsilon": 0.1,
            "seed": 8
        }}"#
    )
    .unwrap();

    let config = ExperimentConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.agent, AgentKind::QLearning);
    assert_eq!(config.runs, 1);

    let reports = Experiment::new(config).unwrap().run().unwrap();
    assert_eq!(reports.len(), 1);
    let curve = &reports[0].curve;
    assert_eq!(curve.len(), 3);
    // Three moves and a drink at best, so at most 0.9^3.
    assert!(curve[2].mean_return > 0.4, "{:?}", curve);
    assert!(curve[2].mean_return <= 0.9f64.powi(3) + 1e-9);
}

#[test]
fn learning_curve_is_written_to_disk() {
    let config = ExperimentConfig {
        agent: AgentKind::Random,
        rows: 2,
        cols: 2,
        episodes: 100,
        runs: 3,
        report_every: 25,
        seed: Some(1),
        ..Default::default()
    };
    let reports = Experiment::new(config).unwrap().run().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curve.csv");
    write_curves_file(&reports, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "run,episode,mean_return");
    assert_eq!(lines.len(), 1 + 3 * 4);
    assert!(lines[1].starts_with("0,25,"));
    assert!(lines[12].starts_with("2,100,"));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ExperimentConfig::from_json_file(dir.path().join("absent.json"));
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn malformed_config_file_is_a_serialization_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ rows: ").unwrap();
    let result = ExperimentConfig::from_json_file(file.path());
    assert!(matches!(result, Err(Error::Serialization(_))));
}
