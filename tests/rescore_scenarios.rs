use ml_rescorer::models::{LinearModel, Model, ModelEvaluator, ModelRegistry};
use ml_rescorer::{
    AccessStrategy, Candidate, FeatureSpec, FieldAccessKind, InMemoryIndex, RescoreContext,
    RescoreError, RescoringEngine, ScoreComparator, Segment,
};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;

/// Hands out one prebuilt model for every path
struct FixedEvaluator(Arc<dyn Model>);

impl ModelEvaluator for FixedEvaluator {
    fn load(&self, _path: &Path) -> anyhow::Result<Arc<dyn Model>> {
        Ok(Arc::clone(&self.0))
    }
}

/// Counts inferences so tests can tell whether any document was scored
struct CountingModel {
    inner: LinearModel,
    calls: AtomicUsize,
}

impl Model for CountingModel {
    fn input_arity(&self) -> usize {
        self.inner.input_arity()
    }

    fn output_arity(&self) -> usize {
        self.inner.output_arity()
    }

    fn infer(&self, features: &[f64]) -> ml_rescorer::Result<f64> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.inner.infer(features)
    }
}

fn engine_with(model: Arc<dyn Model>) -> RescoringEngine {
    let registry = ModelRegistry::new("models", Box::new(FixedEvaluator(model)));
    RescoringEngine::new(Arc::new(registry), "lr.json")
}

fn sum_model() -> Arc<dyn Model> {
    Arc::new(LinearModel::new(vec![1.0, 1.0], 0.0))
}

/// Index from the worked example: ids 2 and 5 in the first segment, 9 in the second
fn scenario_index() -> InMemoryIndex {
    let mut index = InMemoryIndex::new(vec![Segment::new(0, 8), Segment::new(8, 8)]).unwrap();
    index
        .add_value("x", 5, 0.2)
        .add_value("y", 5, 0.3)
        .add_value("x", 2, 0.1)
        .add_value("y", 2, 0.1)
        .add_value("x", 9, 1.0)
        .add_value("y", 9, 1.0);
    index
}

fn scenario_window() -> Vec<Candidate> {
    vec![
        Candidate::new(5, 1.0),
        Candidate::new(2, 0.9),
        Candidate::new(9, 0.5),
    ]
}

fn ids(candidates: &[Candidate]) -> Vec<u32> {
    candidates.iter().map(|c| c.doc_id).collect()
}

#[test]
fn sum_model_reorders_window() {
    let engine = engine_with(sum_model());
    let index = scenario_index();
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());

    let rescored = engine
        .rescore(scenario_window(), &context, index.segments(), &index)
        .unwrap();

    assert_eq!(ids(&rescored), vec![9, 5, 2]);
    let score_of = |id| rescored.iter().find(|c| c.doc_id == id).unwrap().score;
    assert!((score_of(5) - 0.5).abs() < 1e-6);
    assert!((score_of(2) - 0.2).abs() < 1e-6);
    assert!((score_of(9) - 2.0).abs() < 1e-6);
}

#[test]
fn candidates_beyond_window_trail_unchanged() {
    let engine = engine_with(sum_model());
    let index = scenario_index();
    let context = RescoreContext::new(2, FeatureSpec::parse("x|y").unwrap());

    let rescored = engine
        .rescore(scenario_window(), &context, index.segments(), &index)
        .unwrap();

    // 5 -> 0.5 and 2 -> 0.2 are reordered between themselves, 9 keeps 0.5
    assert_eq!(ids(&rescored), vec![5, 2, 9]);
    assert_eq!(rescored[2], Candidate::new(9, 0.5));
    assert!(rescored[0].is_rescored());
}

#[test]
fn arity_mismatch_fails_before_reading_documents() {
    let model = Arc::new(CountingModel {
        inner: LinearModel::new(vec![1.0, 1.0], 0.0),
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(Arc::clone(&model) as Arc<dyn Model>);
    // No field data at all: any storage access would fail differently.
    let index = InMemoryIndex::new(vec![Segment::new(0, 16)]).unwrap();
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y|z").unwrap());

    let result = engine.rescore(scenario_window(), &context, index.segments(), &index);

    assert!(matches!(result, Err(RescoreError::InferenceShape(_))));
    assert_eq!(model.calls.load(AtomicOrdering::SeqCst), 0);
}

#[test]
fn missing_field_fails_whole_request() {
    let model = Arc::new(CountingModel {
        inner: LinearModel::new(vec![1.0, 1.0], 0.0),
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(Arc::clone(&model) as Arc<dyn Model>);
    let mut index = scenario_index();
    index.add_value("x", 11, 0.4);
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());

    let mut window = scenario_window();
    window.push(Candidate::new(11, 0.1));

    match engine.rescore(window, &context, index.segments(), &index) {
        Err(RescoreError::FieldAccess(err)) => {
            assert_eq!(err.doc_id, 11);
            assert_eq!(err.field, "y");
            assert_eq!(err.kind, FieldAccessKind::Missing);
        }
        other => panic!("expected missing field error, got {:?}", other),
    }
    assert_eq!(model.calls.load(AtomicOrdering::SeqCst), 0);
}

#[test]
fn multi_valued_field_is_rejected() {
    let engine = engine_with(sum_model());
    let mut index = scenario_index();
    index.add_value("y", 9, 4.0);
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());

    match engine.rescore(scenario_window(), &context, index.segments(), &index) {
        Err(RescoreError::FieldAccess(err)) => {
            assert_eq!(err.doc_id, 9);
            assert_eq!(err.kind, FieldAccessKind::MultiValued);
        }
        other => panic!("expected multi-valued field error, got {:?}", other),
    }
}

/// Sums its inputs but fails on the given call
struct FlakyModel {
    fail_on: usize,
    calls: AtomicUsize,
}

impl Model for FlakyModel {
    fn input_arity(&self) -> usize {
        2
    }

    fn output_arity(&self) -> usize {
        1
    }

    fn infer(&self, features: &[f64]) -> ml_rescorer::Result<f64> {
        let call = self.calls.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(RescoreError::Inference("runtime rejected input".to_string()));
        }
        Ok(features.iter().sum())
    }
}

#[test]
fn inference_failure_fails_whole_request() {
    let model = Arc::new(FlakyModel {
        fail_on: 2,
        calls: AtomicUsize::new(0),
    });
    let engine = engine_with(Arc::clone(&model) as Arc<dyn Model>);
    let index = scenario_index();
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());

    match engine.rescore(scenario_window(), &context, index.segments(), &index) {
        Err(RescoreError::Inference(message)) => assert_eq!(message, "runtime rejected input"),
        other => panic!("expected inference error, got {:?}", other),
    }
    // The first document was scored, but nothing is handed back.
    assert_eq!(model.calls.load(AtomicOrdering::SeqCst), 2);

    // Later calls succeed; the next request rescores the full window.
    let rescored = engine
        .rescore(scenario_window(), &context, index.segments(), &index)
        .unwrap();
    assert_eq!(ids(&rescored), vec![9, 5, 2]);
    assert!(rescored.iter().all(Candidate::is_rescored));
}

#[test]
fn feature_order_is_positional() {
    // Asymmetric model: 10 * first + second
    let engine = engine_with(Arc::new(LinearModel::new(vec![10.0, 1.0], 0.0)));
    let index = scenario_index();

    let forward = engine
        .rescore(
            scenario_window(),
            &RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap()),
            index.segments(),
            &index,
        )
        .unwrap();
    let swapped = engine
        .rescore(
            scenario_window(),
            &RescoreContext::new(10, FeatureSpec::parse("y|x").unwrap()),
            index.segments(),
            &index,
        )
        .unwrap();

    let score = |rescored: &[Candidate], id| rescored.iter().find(|c| c.doc_id == id).unwrap().score;
    assert!((score(&forward[..], 5) - 2.3).abs() < 1e-5);
    assert!((score(&swapped[..], 5) - 3.2).abs() < 1e-5);
}

#[test]
fn model_load_failure_surfaces_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ModelRegistry::new(
        dir.path(),
        Box::new(ml_rescorer::models::LinearEvaluator),
    ));
    let engine = RescoringEngine::new(Arc::clone(&registry), "lr.json");
    let index = scenario_index();
    let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());

    let result = engine.rescore(scenario_window(), &context, index.segments(), &index);
    assert!(matches!(result, Err(RescoreError::ModelLoad { .. })));

    std::fs::write(
        dir.path().join("lr.json"),
        r#"{"inputs": ["x", "y"], "weights": [1.0, 1.0]}"#,
    )
    .unwrap();

    let rescored = engine
        .rescore(scenario_window(), &context, index.segments(), &index)
        .unwrap();
    assert_eq!(ids(&rescored), vec![9, 5, 2]);
    assert!(registry.is_loaded("lr.json"));
}

#[test]
fn concurrent_requests_share_one_model() {
    let loads = Arc::new(AtomicUsize::new(0));

    struct SlowEvaluator(Arc<AtomicUsize>);
    impl ModelEvaluator for SlowEvaluator {
        fn load(&self, _path: &Path) -> anyhow::Result<Arc<dyn Model>> {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(LinearModel::new(vec![1.0, 1.0], 0.0)))
        }
    }

    let registry = Arc::new(ModelRegistry::new(
        "models",
        Box::new(SlowEvaluator(Arc::clone(&loads))),
    ));
    let index = Arc::new(scenario_index());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = RescoringEngine::new(Arc::clone(&registry), "lr.json").with_strategy(
                if i % 2 == 0 {
                    AccessStrategy::FieldMajor
                } else {
                    AccessStrategy::DocumentMajor
                },
            );
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let context = RescoreContext::new(10, FeatureSpec::parse("x|y").unwrap());
                ids(&engine
                    .rescore(scenario_window(), &context, index.segments(), &*index)
                    .unwrap())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), vec![9, 5, 2]);
    }
    assert_eq!(loads.load(AtomicOrdering::SeqCst), 1);
}

/// Shuffled hits with distinct doc ids, one feature value per document
/// and a window size that may exceed the number of hits
fn random_fixture() -> impl Strategy<Value = (Vec<(u32, f32)>, Vec<f64>, usize)> {
    (
        prop::collection::btree_map(0u32..30, 0.0f32..1.0, 0..20),
        prop::collection::vec(prop::sample::select(vec![-1.0, 0.0, 0.5, 1.0, 2.0]), 30),
        0usize..25,
    )
        .prop_flat_map(|(hits, features, window_size)| {
            let hits: Vec<(u32, f32)> = hits.into_iter().collect();
            (Just(hits).prop_shuffle(), Just(features), Just(window_size))
        })
}

fn fixture_index(features: &[f64]) -> InMemoryIndex {
    let segments = vec![Segment::new(0, 10), Segment::new(10, 10), Segment::new(20, 10)];
    let mut index = InMemoryIndex::new(segments).unwrap();
    for (doc, value) in features.iter().enumerate() {
        index.add_value("f", doc as u32, *value);
    }
    index
}

proptest! {
    #[test]
    fn rescore_properties((hits, features, window_size) in random_fixture()) {
        let engine = engine_with(Arc::new(LinearModel::new(vec![1.0], 0.0)));
        let index = fixture_index(&features);
        let context = RescoreContext::new(window_size, FeatureSpec::parse("f").unwrap());
        let window: Vec<Candidate> = hits.iter().map(|&(doc, score)| Candidate::new(doc, score)).collect();

        let rescored = engine.rescore(window.clone(), &context, index.segments(), &index).unwrap();

        // Same length and same document set
        prop_assert_eq!(rescored.len(), window.len());
        let before: BTreeSet<u32> = window.iter().map(|c| c.doc_id).collect();
        let after: BTreeSet<u32> = rescored.iter().map(|c| c.doc_id).collect();
        prop_assert_eq!(before, after);

        // Suffix keeps scores and relative order
        let end = window.len().min(window_size);
        prop_assert_eq!(&rescored[end..], &window[end..]);

        // Prefix is totally ordered, checked pairwise
        let prefix = &rescored[..end];
        for i in 0..prefix.len() {
            for j in (i + 1)..prefix.len() {
                let (a, b) = (&prefix[i], &prefix[j]);
                prop_assert!(
                    a.score > b.score || (a.score == b.score && a.doc_id < b.doc_id),
                    "{:?} precedes {:?}", a, b
                );
                prop_assert_eq!(ScoreComparator::compare(a, b), Ordering::Less);
            }
        }

        // Deterministic model gives identical output on a second run
        let again = engine.rescore(window, &context, index.segments(), &index).unwrap();
        prop_assert_eq!(rescored, again);
    }
}
