use rand::{Rng, SeedableRng, rngs::StdRng};
use sparse_learner::{LearnerConfig, LinearModel, ModelErr, UpdateBatch};
use tempfile::tempdir;

const NR_CLASS: usize = 17;
const NR_TEMPLATES: usize = 4;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> LearnerConfig {
    LearnerConfig::new(NR_CLASS, NR_TEMPLATES)
}

fn random_features(rng: &mut StdRng) -> Vec<u64> {
    (0..NR_TEMPLATES)
        .map(|_| {
            // some slots stay absent
            if rng.random_bool(0.2) {
                0
            } else {
                rng.random_range(1..40)
            }
        })
        .collect()
}

fn train_random(model: &mut LinearModel, rng: &mut StdRng, examples: usize) {
    let mut batch = UpdateBatch::new();

    for _ in 0..examples {
        let features = random_features(rng);
        batch.clear();
        batch.add_features(rng.random_range(0..NR_CLASS), &features, 1.);
        batch.add_features(rng.random_range(0..NR_CLASS), &features, -1.);
        model.update(&batch).unwrap();
    }
}

#[test]
fn test_dump_load_reproduces_scores() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(7);
    let mut model = LinearModel::new(&config()).unwrap();
    train_random(&mut model, &mut rng, 300);

    let dir = tempdir().unwrap();
    let path = dir.path().join("model.tsv");
    let written = model.dump_to_path(&path, 0).unwrap();
    assert!(written > 0);

    let mut loaded = LinearModel::load_from_path(&config(), &path, 0).unwrap();

    for _ in 0..200 {
        let features = random_features(&mut rng);
        let expected = model.score_uncached(&features).to_vec();
        assert_eq!(loaded.score(&features), expected.as_slice());
    }
}

#[test]
fn test_dump_load_after_averaging() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(11);
    let mut model = LinearModel::new(&config()).unwrap();
    train_random(&mut model, &mut rng, 100);
    model.end_training().unwrap();

    let mut buf = Vec::new();
    model.dump(&mut buf, 0).unwrap();
    let mut loaded = LinearModel::load(&config(), buf.as_slice(), 0).unwrap();

    // averaged totals are integral for integral deltas
    for template in 0..NR_TEMPLATES as u64 {
        for feature in 1..40 {
            let mut features = vec![0; NR_TEMPLATES];
            features[template as usize] = feature;
            let expected = model.score_uncached(&features).to_vec();
            assert_eq!(loaded.score_uncached(&features), expected.as_slice());
        }
    }
}

#[test]
fn test_frequency_pruning_drops_rare_features() {
    init_logger();
    let mut model = LinearModel::new(&config()).unwrap();
    let mut batch = UpdateBatch::new();

    for _ in 0..3 {
        batch.clear();
        batch.add(2, 0, 100, 1.);
        model.update(&batch).unwrap();
    }
    batch.clear();
    batch.add(5, 1, 200, 4.);
    model.update(&batch).unwrap();

    let mut buf = Vec::new();
    model.dump(&mut buf, 2).unwrap();
    let mut loaded = LinearModel::load(&config(), buf.as_slice(), 0).unwrap();

    assert_eq!(loaded.nr_features(), 1);
    assert_eq!(loaded.score(&[100, 0])[2], 3.);
    assert_eq!(loaded.score(&[0, 200]), [0.; NR_CLASS]);
}

#[test]
fn test_all_zero_features_are_absent_after_round_trip() {
    let mut model = LinearModel::new(&config()).unwrap();
    let mut batch = UpdateBatch::new();
    batch.add(3, 0, 9, 1.);
    model.update(&batch).unwrap();
    batch.clear();
    batch.add(3, 0, 9, -1.);
    model.update(&batch).unwrap();

    let mut buf = Vec::new();
    assert_eq!(model.dump(&mut buf, 0).unwrap(), 0);
    assert!(buf.is_empty());

    let loaded = LinearModel::load(&config(), buf.as_slice(), 0).unwrap();
    assert_eq!(loaded.nr_features(), 0);
}

#[test]
fn test_load_reports_missing_file() {
    let dir = tempdir().unwrap();
    let err = LinearModel::load_from_path(&config(), dir.path().join("missing.tsv"), 0).unwrap_err();
    assert!(matches!(err, ModelErr::Io(_)));
}
