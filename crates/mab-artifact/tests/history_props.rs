//! Property tests over artifact histories and the durable layout.

use mab_artifact::{decode_collection, encode_collection, Artifact, ArtifactStatus};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Generate(bool),
    Edit(String),
    Resolve(bool),
}

fn any_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<bool>().prop_map(Step::Generate),
        "[a-z ]{1,16}".prop_map(Step::Edit),
        any::<bool>().prop_map(Step::Resolve),
    ]
}

fn drive(artifact: &mut Artifact, step: &Step) {
    // Rejected events are expected here; they must leave the artifact alone.
    let _ = match step {
        Step::Generate(true) => artifact.complete_generation("<html>ok</html>"),
        Step::Generate(false) => artifact.fail_generation("failed"),
        Step::Edit(text) => artifact.submit_edit(text.clone()).map(|_| ()),
        Step::Resolve(true) => artifact.complete_edit("<html>new</html>", "updated"),
        Step::Resolve(false) => artifact.fail_edit("sorry"),
    };
}

proptest! {
    #[test]
    fn prop_history_never_shrinks(steps in prop::collection::vec(any_step(), 0..32)) {
        let mut artifact = Artifact::new("seed");
        let mut last_len = 0;
        for step in &steps {
            let before = artifact.history().to_vec();
            drive(&mut artifact, step);
            prop_assert!(artifact.history().len() >= last_len);
            // existing turns are never rewritten
            prop_assert_eq!(&artifact.history()[..before.len()], &before[..]);
            last_len = artifact.history().len();
        }
    }

    #[test]
    fn prop_failure_reason_only_when_failed(steps in prop::collection::vec(any_step(), 0..16)) {
        let mut artifact = Artifact::new("seed");
        for step in &steps {
            drive(&mut artifact, step);
            prop_assert_eq!(
                artifact.failure_reason().is_some(),
                artifact.status() == ArtifactStatus::Failed
            );
        }
    }

    #[test]
    fn prop_encode_decode_is_fixed_point(steps in prop::collection::vec(any_step(), 0..16), n in 0usize..4) {
        let mut collection = Vec::new();
        for i in 0..n {
            let mut artifact = Artifact::new(format!("app {i}"));
            for step in &steps {
                drive(&mut artifact, step);
            }
            collection.push(artifact);
        }

        let first = encode_collection(&collection).unwrap();
        let decoded = decode_collection(&first).unwrap();
        prop_assert!(decoded.unreadable.is_empty());
        let second = encode_collection(&decoded.artifacts).unwrap();
        prop_assert_eq!(first, second);
    }
}
