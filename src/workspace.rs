//! The current report and its rendered surface.
//!
//! A [`Workspace`] holds at most one [`Snapshot`] and replaces it
//! atomically. Every analysis takes a ticket before it starts; when the
//! responses arrive out of order, only a response newer than the applied
//! one replaces the snapshot.

use crate::client::{BackendClient, Extractor, SessionContext};
use crate::error::{EngineError, ExportError};
use crate::export::{self, Artifact, ExportLayout, Rasterizer};
use crate::normalize::{normalize_text, NormalizedReport};
use crate::report::{render_surface, RenderedSurface, ReportDocument};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Sequence number of an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// An immutable report together with its rendering.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ticket: Ticket,
    pub normalized: NormalizedReport,
    pub surface: RenderedSurface,
    /// Evaluation time the surface was rendered for.
    pub as_of: DateTime<Utc>,
}

impl Snapshot {
    /// Aggregates and recommendation for this snapshot.
    pub fn document(&self) -> ReportDocument<'_> {
        ReportDocument::build(&self.normalized, self.as_of)
    }
}

/// Result of applying an analysis response.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(Arc<Snapshot>),
    /// A newer response was already applied; this one was discarded.
    Stale,
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct Workspace {
    next_ticket: AtomicU64,
    state: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            next_ticket: AtomicU64::new(1),
            state,
        }
    }

    /// Take the ticket for a new analysis request.
    pub fn begin(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::SeqCst))
    }

    /// The current snapshot, if a report has been applied.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.state.borrow().clone()
    }

    /// Render `normalized` and make it current, unless a newer ticket has
    /// already been applied.
    pub fn apply(
        &self,
        ticket: Ticket,
        normalized: NormalizedReport,
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        if self.is_stale(ticket) {
            debug!("Discarding stale response for ticket {:?}", ticket);
            return ApplyOutcome::Stale;
        }

        let surface = render_surface(&ReportDocument::build(&normalized, now));
        let snapshot = Arc::new(Snapshot {
            ticket,
            normalized,
            surface,
            as_of: now,
        });

        let mut applied = false;
        self.state.send_if_modified(|current| {
            if current.as_ref().map_or(true, |c| c.ticket < ticket) {
                *current = Some(snapshot.clone());
                applied = true;
            }
            applied
        });

        if applied {
            info!(
                "Report {} is now current ({:?})",
                snapshot.normalized.report.id, ticket
            );
            ApplyOutcome::Applied(snapshot)
        } else {
            debug!("Discarding stale response for ticket {:?}", ticket);
            ApplyOutcome::Stale
        }
    }

    /// Normalize an extraction reply and apply it. A schema error leaves
    /// the current snapshot untouched.
    pub fn apply_text(
        &self,
        ticket: Ticket,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, EngineError> {
        let normalized = normalize_text(text)?;
        Ok(self.apply(ticket, normalized, now))
    }

    /// Run the analysis and extraction collaborators for `session` and
    /// apply the result.
    pub async fn analyze(
        &self,
        backend: &BackendClient,
        extractor: &Extractor,
        session: &SessionContext,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, EngineError> {
        let ticket = self.begin();
        let preliminary = backend.analyze(session).await?;
        let reply = extractor.extract(&preliminary).await?;
        self.apply_text(ticket, &reply, now)
    }

    /// Print-ready document of the current snapshot.
    pub fn print(&self, layout: &ExportLayout) -> Result<Artifact, ExportError> {
        let snapshot = self.current();
        export::print_artifact(snapshot.as_ref().map(|s| &s.surface), layout)
    }

    /// Archive the current snapshot.
    ///
    /// The snapshot is taken when this is called, not when the returned
    /// future is first polled; the rasterizer then runs on a blocking task.
    pub fn archive(
        &self,
        rasterizer: Arc<dyn Rasterizer>,
        layout: ExportLayout,
    ) -> impl Future<Output = Result<Artifact, ExportError>> + Send + 'static {
        let snapshot = self.current();
        async move {
            tokio::task::spawn_blocking(move || {
                export::archive(
                    snapshot.as_ref().map(|s| &s.surface),
                    rasterizer.as_ref(),
                    &layout,
                )
            })
            .await
            .map_err(|e| ExportError::Backend(format!("export task failed: {}", e)))?
        }
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        self.state
            .borrow()
            .as_ref()
            .map_or(false, |current| current.ticket >= ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::serve_once;
    use crate::config::{BackendConfig, ModelConfig};
    use crate::error::{SchemaError, TransportError};
    use crate::export::raster::fixtures::png;
    use crate::export::RasterOptions;
    use crate::report::fixtures::{now, sample};

    struct StubRasterizer;

    impl Rasterizer for StubRasterizer {
        fn rasterize(&self, _html: &str, _options: &RasterOptions) -> Result<Vec<u8>, ExportError> {
            Ok(png(1588, 3000, 2, 0))
        }
    }

    fn with_id(id: &str) -> NormalizedReport {
        let mut normalized = sample();
        normalized.report.id = id.to_string();
        normalized
    }

    fn current_id(workspace: &Workspace) -> Option<String> {
        workspace.current().map(|s| s.normalized.report.id.clone())
    }

    #[test]
    fn test_apply_replaces_snapshot() {
        let workspace = Workspace::new();
        assert!(workspace.current().is_none());

        let ticket = workspace.begin();
        let outcome = workspace.apply(ticket, with_id("RFP-A"), now());
        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
        assert_eq!(current_id(&workspace).as_deref(), Some("RFP-A"));

        let snapshot = workspace.current().unwrap();
        assert_eq!(snapshot.surface.report_id, "RFP-A");
    }

    #[test]
    fn test_stale_response_discarded() {
        let workspace = Workspace::new();
        let first = workspace.begin();
        let second = workspace.begin();
        assert!(first < second);

        // The later request answers first.
        assert!(matches!(
            workspace.apply(second, with_id("RFP-NEW"), now()),
            ApplyOutcome::Applied(_)
        ));
        assert!(matches!(
            workspace.apply(first, with_id("RFP-OLD"), now()),
            ApplyOutcome::Stale
        ));
        assert_eq!(current_id(&workspace).as_deref(), Some("RFP-NEW"));
    }

    #[test]
    fn test_schema_error_keeps_snapshot() {
        let workspace = Workspace::new();
        let ticket = workspace.begin();
        workspace.apply(ticket, with_id("RFP-A"), now());

        let ticket = workspace.begin();
        let err = workspace
            .apply_text(ticket, r#"{"id": "RFP-B"}"#, now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Schema(SchemaError::MissingChecks)));
        assert!(!err.is_retryable());
        assert_eq!(current_id(&workspace).as_deref(), Some("RFP-A"));
    }

    #[tokio::test]
    async fn test_failed_analysis_keeps_snapshot() {
        let workspace = Workspace::new();
        let ticket = workspace.begin();
        workspace.apply(ticket, with_id("RFP-A"), now());

        let (url, _server) =
            serve_once(500, r#"{"error": "Session not found or expired"}"#).await;
        let backend = BackendClient::new(&BackendConfig {
            api_url: url,
            timeout_seconds: 5,
            ..Default::default()
        })
        .unwrap();
        let extractor = Extractor::new(ModelConfig::default()).unwrap();
        let session = SessionContext::new("42").unwrap();

        let err = workspace
            .analyze(&backend, &extractor, &session, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transport(TransportError::Status { status: 500, .. })
        ));
        assert!(err.is_retryable());
        assert_eq!(current_id(&workspace).as_deref(), Some("RFP-A"));

        // A retry that succeeds still replaces the report.
        let ticket = workspace.begin();
        assert!(matches!(
            workspace.apply(ticket, with_id("RFP-B"), now()),
            ApplyOutcome::Applied(_)
        ));
        assert_eq!(current_id(&workspace).as_deref(), Some("RFP-B"));
    }

    #[test]
    fn test_export_without_report() {
        tokio_test::block_on(async {
            let workspace = Workspace::new();
            let err = workspace
                .archive(Arc::new(StubRasterizer), ExportLayout::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ExportError::NotRendered));
            assert!(matches!(
                workspace.print(&ExportLayout::default()),
                Err(ExportError::NotRendered)
            ));
        });
    }

    #[test]
    fn test_export_uses_snapshot_at_start() {
        tokio_test::block_on(async {
            let workspace = Workspace::new();
            let ticket = workspace.begin();
            workspace.apply(ticket, with_id("RFP-A"), now());

            let export = workspace.archive(Arc::new(StubRasterizer), ExportLayout::default());

            // A newer report lands before the export task is polled.
            let ticket = workspace.begin();
            workspace.apply(ticket, with_id("RFP-B"), now());

            let artifact = export.await.unwrap();
            assert_eq!(artifact.file_name, "RFP-A-report.pdf");
            assert_eq!(current_id(&workspace).as_deref(), Some("RFP-B"));
            assert_eq!(artifact.pages, 2);
        });
    }
}
