//! End-to-end extraction: text → prompt → gateway → resolve → gate.

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{info, instrument, warn};

use texcal_shared::{ApiKey, ExtractionGateway, ExtractionPayload, Result, TexcalError};

use crate::clock::{Clock, Reference};
use crate::gate::{self, GateDecision};
use crate::prompt;
use crate::resolver;
use crate::schedule::Fallback;

/// Result of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    /// Date relative expressions were resolved against.
    pub reference_date: NaiveDate,
    /// Accept/reject outcome.
    pub decision: GateDecision,
    /// Defaults and repairs applied while resolving.
    pub fallbacks: Vec<Fallback>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the pipeline has produced an outcome.
    fn done(&self, extraction: &Extraction);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _extraction: &Extraction) {}
}

/// Resolve and gate an already-retrieved payload. No I/O.
pub fn evaluate<Tz: TimeZone>(
    payload: &ExtractionPayload,
    raw_text: &str,
    reference: &Reference<Tz>,
) -> Extraction {
    let resolution = resolver::resolve(payload, raw_text, reference);
    Extraction {
        reference_date: reference.date,
        decision: gate::gate(resolution.schedule),
        fallbacks: resolution.fallbacks,
    }
}

/// The extraction service, built from its collaborators.
///
/// Holds no mutable state, so one value can serve concurrent invocations.
pub struct ExtractionPipeline<G, C> {
    gateway: G,
    clock: C,
    credential: ApiKey,
}

impl<G, C> ExtractionPipeline<G, C>
where
    G: ExtractionGateway,
    C: Clock,
{
    pub fn new(gateway: G, clock: C, credential: ApiKey) -> Self {
        Self {
            gateway,
            clock,
            credential,
        }
    }

    /// Run the full pipeline on one piece of text.
    ///
    /// 1. Build the instruction for today's date
    /// 2. Fetch the extraction (the only suspending step)
    /// 3. Resolve fields with defaults
    /// 4. Gate on confidence
    ///
    /// Gateway failures abort with [`TexcalError::Gateway`] and nothing is
    /// resolved. Dropping the future cancels the gateway call.
    #[instrument(
        skip_all,
        fields(
            invocation = %uuid::Uuid::now_v7(),
            gateway = self.gateway.name(),
            chars = text.chars().count(),
        )
    )]
    pub async fn run(&self, text: &str, progress: &dyn ProgressReporter) -> Result<Extraction> {
        if text.trim().is_empty() {
            return Err(TexcalError::EmptyInput);
        }

        // --- Phase 1: Prompt ---
        let reference = self.clock.reference();
        let instruction = prompt::build_instruction(reference.date);

        // --- Phase 2: Gateway ---
        progress.phase("Asking the extraction model");
        let payload = self
            .gateway
            .fetch_extraction(&self.credential, &instruction, text)
            .await
            .inspect_err(|e| {
                warn!(
                    kind = e.kind(),
                    status = e.status(),
                    detail_len = e.detail_len(),
                    "extraction gateway failed"
                )
            })?;

        // --- Phase 3 + 4: Resolve and gate ---
        progress.phase("Resolving schedule");
        let extraction = evaluate(&payload, text, &reference);

        info!(
            reference_date = %extraction.reference_date,
            accepted = extraction.decision.is_accepted(),
            fallbacks = extraction.fallbacks.len(),
            "extraction complete"
        );

        progress.done(&extraction);
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use texcal_shared::GatewayError;

    use super::*;
    use crate::clock::FixedClock;

    /// Gateway double that returns a canned payload JSON or error.
    struct StubGateway {
        reply: fn() -> std::result::Result<ExtractionPayload, GatewayError>,
        calls: AtomicUsize,
        last_instruction: Mutex<Option<String>>,
    }

    impl StubGateway {
        fn new(reply: fn() -> std::result::Result<ExtractionPayload, GatewayError>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_instruction: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ExtractionGateway for StubGateway {
        async fn fetch_extraction(
            &self,
            credential: &ApiKey,
            instruction: &str,
            _user_text: &str,
        ) -> std::result::Result<ExtractionPayload, GatewayError> {
            assert_eq!(credential.expose(), "sk-test");
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_instruction.lock().unwrap() = Some(instruction.to_string());
            (self.reply)()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn pipeline(gateway: StubGateway) -> ExtractionPipeline<StubGateway, FixedClock<FixedOffset>> {
        let clock = FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            FixedOffset::east_opt(9 * 3600).unwrap(),
        );
        ExtractionPipeline::new(gateway, clock, ApiKey::new("sk-test"))
    }

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[tokio::test]
    async fn accepted_all_day_event() {
        let p = pipeline(StubGateway::new(|| {
            Ok(ExtractionPayload::from_json(
                r#"{"title":"Picnic","start_date":"2024-06-15","all_day":false,"confidence":0.9}"#,
            )
            .unwrap())
        }));

        let extraction = p.run("Picnic on Saturday!", &SilentProgress).await.unwrap();
        let schedule = extraction.decision.accepted().expect("accepted");
        assert!(schedule.all_day());
        assert_eq!(schedule.start(), at("2024-06-15T00:00:00+09:00"));
        assert_eq!(schedule.end(), at("2024-06-16T00:00:00+09:00"));
        assert_eq!(schedule.title(), "Picnic");
        assert_eq!(extraction.reference_date.to_string(), "2024-06-10");
    }

    #[tokio::test]
    async fn low_confidence_is_rejected_not_failed() {
        let p = pipeline(StubGateway::new(|| {
            Ok(ExtractionPayload::from_json(r#"{"confidence":0.2}"#).unwrap())
        }));

        let extraction = p.run("let's do it later", &SilentProgress).await.unwrap();
        assert_eq!(
            extraction.decision,
            GateDecision::Rejected { confidence: 0.2 }
        );
        assert!(extraction.fallbacks.contains(&Fallback::StartDateDefaulted));
    }

    #[tokio::test]
    async fn gateway_rejection_aborts() {
        let gateway = StubGateway::new(|| {
            Err(GatewayError::RequestRejected {
                status: 401,
                body: "invalid api key".into(),
            })
        });
        let p = pipeline(gateway);

        let err = p.run("meeting at 3pm", &SilentProgress).await.unwrap_err();
        match err {
            TexcalError::Gateway(GatewayError::RequestRejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected RequestRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_input_never_reaches_gateway() {
        let p = pipeline(StubGateway::new(|| Ok(ExtractionPayload::default())));

        let err = p.run("  \n\t", &SilentProgress).await.unwrap_err();
        assert!(matches!(err, TexcalError::EmptyInput));
        assert_eq!(p.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn instruction_carries_reference_date() {
        let p = pipeline(StubGateway::new(|| Ok(ExtractionPayload::default())));

        p.run("dinner tomorrow", &SilentProgress).await.unwrap();
        let instruction = p.gateway.last_instruction.lock().unwrap().clone().unwrap();
        assert!(instruction.contains("2024-06-10"));
        assert_eq!(p.gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let p = pipeline(StubGateway::new(|| {
            Ok(ExtractionPayload::from_json(r#"{"start_time":"10:00","confidence":0.8}"#).unwrap())
        }));

        let (a, b) = tokio::join!(
            p.run("standup at ten", &SilentProgress),
            p.run("standup at ten", &SilentProgress),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(p.gateway.calls.load(Ordering::SeqCst), 2);
    }

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn gateway_failure_log_omits_model_content() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let p = pipeline(StubGateway::new(|| {
            Err(GatewayError::envelope(
                "message content is not a JSON object (got: dinner with Mina at 7)",
            ))
        }));
        let err = p.run("dinner with Mina at 7", &SilentProgress).await.unwrap_err();
        assert!(matches!(
            err,
            TexcalError::Gateway(GatewayError::EnvelopeParse(_))
        ));

        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("extraction gateway failed"));
        assert!(logged.contains("envelope_parse"));
        assert!(!logged.contains("Mina"));
    }

    #[test]
    fn evaluate_without_gateway() {
        let reference = Reference {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            zone: FixedOffset::east_opt(9 * 3600).unwrap(),
        };
        let payload = ExtractionPayload::from_json(
            r#"{"start_date":"","end_date":"2024-06-20","start_time":"14:00","end_time":"16:00","confidence":0.95}"#,
        )
        .unwrap();

        let extraction = evaluate(&payload, "conference", &reference);
        let schedule = extraction.decision.accepted().unwrap();
        assert!(!schedule.all_day());
        assert_eq!(schedule.start(), at("2024-06-10T14:00:00+09:00"));
        assert_eq!(schedule.end(), at("2024-06-20T16:00:00+09:00"));
    }
}
