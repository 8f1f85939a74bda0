//! Property tests: arbitrary edit bursts against a live session.

use mab_artifact::{ArtifactStatus, Speaker, Turn};
use mab_core::{ProviderError, EDIT_APOLOGY, EDIT_CONFIRMATION};
use mab_test_utils::{setup_test_session, ScriptedProvider};
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every edit contributes exactly one user turn followed by one
    /// assistant turn, in submission order, whatever the provider answers.
    #[test]
    fn prop_edit_burst_resolves_in_order(outcomes in prop::collection::vec(any::<bool>(), 0..8)) {
        runtime().block_on(async {
            let provider = Arc::new(ScriptedProvider::new().succeed("<html>v0</html>"));
            for (i, ok) in outcomes.iter().enumerate() {
                if *ok {
                    provider.push_ok(format!("<html>v{}</html>", i + 1));
                } else {
                    provider.push_err(ProviderError::Transport("flaky".into()));
                }
            }
            let (session, _blob) = setup_test_session(provider.clone()).await;

            let id = session.create("seed").unwrap();
            for i in 0..outcomes.len() {
                session.edit(id, format!("edit {i}")).unwrap();
            }
            session.settle_all().await;

            let artifact = session.artifact(id).unwrap();
            prop_assert_eq!(artifact.status(), ArtifactStatus::Ready);
            prop_assert_eq!(provider.max_in_flight(), 1);
            prop_assert_eq!(artifact.history().len(), outcomes.len() * 2);

            let mut expected_body = "<html>v0</html>".to_string();
            for (i, ok) in outcomes.iter().enumerate() {
                let pair = &artifact.history()[i * 2..i * 2 + 2];
                prop_assert_eq!(&pair[0], &Turn::user(format!("edit {i}")));
                prop_assert_eq!(pair[1].speaker, Speaker::Assistant);
                if *ok {
                    prop_assert_eq!(&pair[1].text, EDIT_CONFIRMATION);
                    expected_body = format!("<html>v{}</html>", i + 1);
                } else {
                    prop_assert_eq!(&pair[1].text, EDIT_APOLOGY);
                }
            }
            prop_assert_eq!(artifact.body(), expected_body.as_str());
            Ok(())
        })?;
    }
}
