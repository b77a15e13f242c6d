use std::fs;

use fairbench_core::{BenchError, SeedPolicy};
use fairbench_sched::{load_plan, Plan, SimulatorSpec, DEFAULT_SCENARIOS};

const PLAN: &str = r#"
results_root: results
repetitions: 2
grid:
  scenarios: [AllBbr, RenoVsCubic]
  dimensions:
    - name: bottleneck
      values: [5Mbps, 10Mbps]
simulator:
  program: /bin/sh
  args: [fake_sim.sh]
scheduler:
  concurrency: 2
  timeout_secs: 30
seeds:
  policy: derived
  master: 42
"#;

#[test]
fn default_plan_covers_the_study() {
    let plan = Plan::with_defaults(SimulatorSpec::new("./ns3"), 5);
    assert_eq!(plan.grid.len(), 16);
    assert_eq!(plan.grid.scenarios, DEFAULT_SCENARIOS);
    plan.validate().expect("default plan is valid");

    let yaml = plan.to_yaml_string().expect("yaml");
    let parsed: Plan = serde_yaml::from_str(&yaml).expect("parse");
    assert_eq!(parsed, plan);
    assert_eq!(parsed.plan_hash().expect("hash"), plan.plan_hash().expect("hash"));
}

#[test]
fn plan_loads_relative_to_its_directory() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("plan.yaml");
    fs::write(&path, PLAN).expect("write plan");

    let plan = load_plan(&path).expect("load");
    assert_eq!(plan.repetitions, 2);
    assert_eq!(plan.grid.len(), 8);
    assert_eq!(plan.seeds, SeedPolicy::Derived { master: 42 });
    assert_eq!(plan.scheduler.concurrency, Some(2));
    assert_eq!(plan.scheduler.max_attempts, 1);
    assert_eq!(plan.layout().expect("layout").root(), temp.path().join("results"));
    assert_eq!(
        plan.resolved_simulator().expect("simulator").working_dir,
        Some(temp.path().to_path_buf())
    );
}

#[test]
fn invalid_plans_are_rejected() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("plan.yaml");
    for broken in [
        PLAN.replace("repetitions: 2", "repetitions: 0"),
        PLAN.replace("concurrency: 2", "concurrency: 0"),
        PLAN.replace("[AllBbr, RenoVsCubic]", "[AllBbr, AllBbr]"),
        PLAN.replace("[AllBbr, RenoVsCubic]", "[All_Bbr]"),
        PLAN.replace("[5Mbps, 10Mbps]", "[]"),
    ] {
        fs::write(&path, broken).expect("write plan");
        let err = load_plan(&path).unwrap_err();
        assert!(err.is_fatal(), "unexpected error {err}");
    }
}

#[test]
fn missing_plan_is_an_io_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let err = load_plan(temp.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, BenchError::Io(_)));
}

#[test]
fn malformed_yaml_names_the_plan_file() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("plan.yaml");
    fs::write(&path, "repetitions: [not, a, number]\n").expect("plan");
    match load_plan(&path).unwrap_err() {
        BenchError::Serde(info) => {
            assert_eq!(info.code, "yaml_decode");
            assert_eq!(info.context.get("path"), Some(&path.display().to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[cfg(unix)]
#[test]
fn run_plan_persists_its_summary() {
    use fairbench_sched::{run_plan, RunOpts, RunSummary, SUMMARY_FILE};

    let temp = tempfile::tempdir().expect("tmp dir");
    fs::write(
        temp.path().join("fake_sim.sh"),
        r#"for arg in "$@"; do
  case "$arg" in
    --outputFile=*) out="${arg#--outputFile=}" ;;
    --bottleneck=*) bw="${arg#--bottleneck=}" ;;
  esac
done
[ -n "$bw" ] || exit 2
printf 'Time,Flow0_Bps\n0.5,100\n' > "$out"
"#,
    )
    .expect("script");
    let path = temp.path().join("plan.yaml");
    fs::write(&path, PLAN).expect("write plan");
    let plan = load_plan(&path).expect("load");

    let summary = run_plan(&plan, &RunOpts::from_plan(&plan)).expect("run");
    assert_eq!(summary.succeeded, 16);
    assert!(summary.provenance.reproducible_seeds);
    assert_eq!(summary.provenance.plan_hash, plan.plan_hash().expect("hash"));
    assert!(temp
        .path()
        .join("results/AllBbr_bottleneck-10Mbps_asymmetric/run_002.csv")
        .is_file());

    let stored = RunSummary::load(&temp.path().join("results").join(SUMMARY_FILE)).expect("load");
    assert_eq!(stored, summary);
}
