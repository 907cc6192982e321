//! TC-005: Translation orchestrator — select a backend, strip fences from
//! each increment, and forward it immediately.

use super::error::PipelineError;
use super::fence;
use super::types::{PartialTranslation, SourceProgram, Translation};
use crate::backends::{BackendKind, TranslationBackend};
use futures::stream::BoxStream;
use futures::StreamExt;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cleaned cumulative snapshots, in backend order.
pub type CleanStream = BoxStream<'static, Result<PartialTranslation, PipelineError>>;

/// Registry of backends keyed by variant.
#[derive(Default)]
pub struct Orchestrator {
    backends: IndexMap<BackendKind, Arc<dyn TranslationBackend>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orchestrator with every configured variant registered.
    pub fn from_config(config: &crate::core::types::BackendsConfig) -> Self {
        let mut orchestrator = Self::new();
        for backend in crate::backends::build_backends(config) {
            orchestrator.register(backend);
        }
        orchestrator
    }

    /// Register (or replace) the backend for its variant.
    pub fn register(&mut self, backend: Arc<dyn TranslationBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    /// Registered variants, in registration order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }

    /// Resolve a selector to a registered backend. Fails closed.
    pub fn select(&self, selector: &str) -> Result<Arc<dyn TranslationBackend>, PipelineError> {
        let kind: BackendKind = selector.parse()?;
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidSelection(selector.to_string()))
    }

    /// Start a translation. Each raw snapshot is fence-stripped and yielded
    /// as soon as it arrives; a backend failure becomes one
    /// `TranslationChannelFailure` item. Cancelling `cancel` ends the stream
    /// and drops the upstream connection.
    pub async fn translate(
        &self,
        source: &SourceProgram,
        selector: &str,
        cancel: CancellationToken,
    ) -> Result<CleanStream, PipelineError> {
        let backend = self.select(selector)?;
        let name = backend.kind().label().to_string();
        tracing::info!(backend = %name, model = %backend.model(), "starting translation");

        let channel_failure = |name: &str, message: String| PipelineError::TranslationChannelFailure {
            backend: name.to_string(),
            message,
        };

        let raw = tokio::select! {
            opened = backend.stream_translate(source) => {
                opened.map_err(|e| channel_failure(&name, e.to_string()))?
            }
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        };

        let cleaned = raw
            .map(move |item| match item {
                Ok(partial) => Ok(PartialTranslation(fence::strip(partial.as_str()))),
                Err(e) => Err(channel_failure(&name, e.to_string())),
            })
            .take_until(cancel.cancelled_owned())
            .boxed();
        Ok(cleaned)
    }
}

/// Drain a cleaned stream into the final translation. A failure anywhere is
/// returned as the failure, never as a partial success.
pub async fn drain(
    backend: &str,
    mut stream: CleanStream,
    cancel: &CancellationToken,
) -> Result<Translation, PipelineError> {
    let mut code = String::new();
    let mut increments = 0usize;
    while let Some(item) = stream.next().await {
        code = item?.into_string();
        increments += 1;
    }
    if cancel.is_cancelled() {
        tracing::info!(increments, "translation cancelled");
        return Err(PipelineError::Cancelled);
    }
    tracing::debug!(increments, bytes = code.len(), "translation drained");
    Ok(Translation {
        backend: backend.to_string(),
        code,
        increments,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backends::{accumulate, BackendError, TranslationStream};
    use async_trait::async_trait;
    use futures::stream;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Backend replaying canned fragments, optionally failing after them.
    pub(crate) struct ScriptedBackend {
        pub kind: BackendKind,
        pub fragments: Vec<String>,
        pub fail_after: bool,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub(crate) fn new(kind: BackendKind, fragments: &[&str]) -> Self {
            Self {
                kind,
                fragments: fragments.iter().map(|s| s.to_string()).collect(),
                fail_after: false,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn stream_translate(
            &self,
            _source: &SourceProgram,
        ) -> Result<TranslationStream, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut items: Vec<Result<String, BackendError>> =
                self.fragments.iter().cloned().map(Ok).collect();
            if self.fail_after {
                items.push(Err(BackendError::Network("connection reset".into())));
            }
            let delay = self.delay;
            let fragments = stream::iter(items)
                .then(move |item| async move {
                    if let Some(d) = delay {
                        tokio::time::sleep(d).await;
                    }
                    item
                })
                .boxed();
            Ok(accumulate(fragments))
        }
    }

    fn orchestrator_with(backend: ScriptedBackend) -> (Orchestrator, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let mut o = Orchestrator::new();
        o.register(backend.clone());
        (o, backend)
    }

    #[tokio::test]
    async fn test_tc005_strips_each_increment_in_order() {
        let (o, _) = orchestrator_with(ScriptedBackend::new(
            BackendKind::Gpt,
            &["```cpp\n", "int main() {", " return 0; }\n", "```"],
        ));
        let items: Vec<String> = o
            .translate(&"print(1)".into(), "GPT", CancellationToken::new())
            .await
            .unwrap()
            .map(|r| r.unwrap().into_string())
            .collect()
            .await;
        assert_eq!(
            items,
            vec![
                "",
                "int main() {",
                "int main() { return 0; }\n",
                "int main() { return 0; }\n"
            ]
        );
    }

    #[tokio::test]
    async fn test_tc005_invalid_selection_touches_no_backend() {
        let (o, backend) = orchestrator_with(ScriptedBackend::new(BackendKind::Gpt, &["x"]));
        let err = o
            .translate(&"x".into(), "Gemini", CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::InvalidSelection(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tc005_known_kind_not_registered() {
        let (o, _) = orchestrator_with(ScriptedBackend::new(BackendKind::Gpt, &["x"]));
        let err = o
            .translate(&"x".into(), "Claude", CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::InvalidSelection(ref s) if s == "Claude"));
    }

    #[tokio::test]
    async fn test_tc005_channel_failure_after_increments() {
        let mut scripted = ScriptedBackend::new(BackendKind::Claude, &["a", "b"]);
        scripted.fail_after = true;
        let (o, _) = orchestrator_with(scripted);
        let items: Vec<_> = o
            .translate(&"x".into(), "claude", CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        match &items[2] {
            Err(PipelineError::TranslationChannelFailure { backend, message }) => {
                assert_eq!(backend, "Claude");
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected channel failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tc005_drain_failure_is_not_partial_success() {
        let mut scripted = ScriptedBackend::new(BackendKind::Gpt, &["int"]);
        scripted.fail_after = true;
        let (o, _) = orchestrator_with(scripted);
        let cancel = CancellationToken::new();
        let stream = o.translate(&"x".into(), "GPT", cancel.clone()).await.unwrap();
        let err = drain("GPT", stream, &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::TranslationChannelFailure { .. }));
    }

    #[tokio::test]
    async fn test_tc005_drain_collects_final() {
        let (o, _) = orchestrator_with(ScriptedBackend::new(
            BackendKind::Gpt,
            &["```cpp\nint", " x;\n```"],
        ));
        let cancel = CancellationToken::new();
        let stream = o.translate(&"x".into(), "GPT", cancel.clone()).await.unwrap();
        let t = drain("GPT", stream, &cancel).await.unwrap();
        assert_eq!(t.code, "int x;\n");
        assert_eq!(t.increments, 2);
        assert_eq!(t.backend, "GPT");
    }

    #[tokio::test]
    async fn test_tc005_cancel_mid_stream() {
        let mut scripted = ScriptedBackend::new(BackendKind::Gpt, &["a", "b", "c", "d", "e"]);
        scripted.delay = Some(Duration::from_millis(50));
        let (o, _) = orchestrator_with(scripted);
        let cancel = CancellationToken::new();
        let mut stream = o.translate(&"x".into(), "GPT", cancel.clone()).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.as_str(), "a");
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_tc005_drain_reports_cancel() {
        let mut scripted = ScriptedBackend::new(BackendKind::Gpt, &["a", "b", "c"]);
        scripted.delay = Some(Duration::from_millis(200));
        let (o, _) = orchestrator_with(scripted);
        let cancel = CancellationToken::new();
        let stream = o.translate(&"x".into(), "GPT", cancel.clone()).await.unwrap();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = drain("GPT", stream, &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn test_tc005_from_config_registers_all() {
        let o = Orchestrator::from_config(&Default::default());
        assert_eq!(o.kinds(), BackendKind::ALL.to_vec());
        assert!(o.select("GPT").is_ok());
        assert!(o.select("Claude").is_ok());
        assert!(o.select("nope").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_tc005_n_in_n_out(fragments in proptest::collection::vec("[`a-z\\n ]{0,8}", 0..12)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let refs: Vec<&str> = fragments.iter().map(|s| s.as_str()).collect();
            let (o, _) = orchestrator_with(ScriptedBackend::new(BackendKind::Gpt, &refs));
            let items: Vec<String> = rt.block_on(async {
                o.translate(&"x".into(), "GPT", CancellationToken::new())
                    .await
                    .unwrap()
                    .map(|r| r.unwrap().into_string())
                    .collect()
                    .await
            });

            prop_assert_eq!(items.len(), fragments.len());
            let mut cumulative = String::new();
            for (item, fragment) in items.iter().zip(&fragments) {
                cumulative.push_str(fragment);
                prop_assert_eq!(item, &fence::strip(&cumulative));
            }
        }
    }
}
