//! Text aggregation: rasterise a source, OCR every page, keep the text in order.
//!
//! Pages are sent one at a time by default. With `concurrency > 1` up to that
//! many calls are in flight, but `buffered` still yields results in page
//! order and `try_collect` stops at the first error in that order, so the
//! observable behaviour is the same as the sequential loop: the first failing
//! page aborts the request and no partial text is returned.

use crate::config::PipelineConfig;
use crate::error::{OcrServiceError, PipelineError};
use crate::output::{AggregatedText, ConversionStats, OcrResult, PageImage, SourceDocument};
use crate::pipeline::encode;
use crate::pipeline::ocr::TextDetector;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives a [`Rasterizer`] and a [`TextDetector`] over one source.
#[derive(Clone)]
pub struct Aggregator {
    rasterizer: Arc<dyn Rasterizer>,
    detector: Arc<dyn TextDetector>,
    ocr_timeout: Duration,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Aggregator {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, detector: Arc<dyn TextDetector>) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            rasterizer,
            detector,
            ocr_timeout: Duration::from_secs(defaults.ocr_timeout_secs),
            concurrency: defaults.concurrency,
            progress: None,
        }
    }

    /// Take timeout, fan-out and callback from a pipeline configuration.
    pub fn from_config(
        config: &PipelineConfig,
        rasterizer: Arc<dyn Rasterizer>,
        detector: Arc<dyn TextDetector>,
    ) -> Self {
        Self {
            rasterizer,
            detector,
            ocr_timeout: Duration::from_secs(config.ocr_timeout_secs),
            concurrency: config.concurrency.max(1),
            progress: config.progress_callback.clone(),
        }
    }

    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Rasterise `source` and return the text of every page that has some.
    pub async fn aggregate(
        &self,
        source: &SourceDocument,
    ) -> Result<AggregatedText, PipelineError> {
        self.aggregate_with_stats(source).await.map(|(text, _)| text)
    }

    /// Like [`Aggregator::aggregate`], also returning timings and page counts.
    pub async fn aggregate_with_stats(
        &self,
        source: &SourceDocument,
    ) -> Result<(AggregatedText, ConversionStats), PipelineError> {
        let render_start = Instant::now();
        let pages = self.rasterizer.rasterize(source).await?;
        let pages = check_page_order(pages)?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;

        let total_pages = pages.len();
        info!(
            "OCR of '{}': {} page(s) via {}",
            source.file_name(),
            total_pages,
            self.detector.name()
        );
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(total_pages);
        }

        let ocr_start = Instant::now();
        let results: Vec<OcrResult> = stream::iter(
            pages
                .into_iter()
                .map(|page| self.recognise_page(page, total_pages)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        let text = AggregatedText::from_results(results);
        if let Some(ref cb) = self.progress {
            cb.on_conversion_complete(total_pages, text.len());
        }
        info!(
            "OCR complete: text on {}/{} page(s) in {}ms",
            text.len(),
            total_pages,
            ocr_duration_ms
        );

        let stats = ConversionStats {
            total_pages,
            text_pages: text.len(),
            render_duration_ms,
            ocr_duration_ms,
            total_duration_ms: render_duration_ms + ocr_duration_ms,
        };
        Ok((text, stats))
    }

    async fn recognise_page(
        &self,
        page: PageImage,
        total_pages: usize,
    ) -> Result<OcrResult, PipelineError> {
        let page_num = page.index;

        if let Some(ref cb) = self.progress {
            if cb.is_cancelled() {
                info!("Cancelled before page {}", page_num);
                return Err(PipelineError::Cancelled { page: page_num });
            }
            cb.on_page_start(page_num, total_pages);
        }

        let encoded = encode::encode_page(&page).map_err(|e| {
            PipelineError::Internal(format!("page {} could not be encoded: {}", page_num, e))
        })?;
        drop(page);

        let call = self.detector.detect_text(&encoded);
        let outcome = match tokio::time::timeout(self.ocr_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(OcrServiceError::Timeout {
                secs: self.ocr_timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(text) => {
                debug!(
                    "Page {}/{}: {}",
                    page_num,
                    total_pages,
                    if text.is_some() { "text found" } else { "no text" }
                );
                if let Some(ref cb) = self.progress {
                    cb.on_page_complete(
                        page_num,
                        total_pages,
                        text.as_ref().map_or(0, |t| t.len()),
                    );
                }
                Ok(OcrResult {
                    page_index: page_num,
                    text,
                })
            }
            Err(source) => {
                warn!("Page {}/{}: OCR failed: {}", page_num, total_pages, source);
                if let Some(ref cb) = self.progress {
                    cb.on_page_error(page_num, total_pages, &source.to_string());
                }
                Err(PipelineError::OcrService {
                    page: page_num,
                    source,
                })
            }
        }
    }
}

/// Sort pages by index and require exactly `1..=N`.
fn check_page_order(mut pages: Vec<PageImage>) -> Result<Vec<PageImage>, PipelineError> {
    pages.sort_by_key(|p| p.index);
    for (pos, page) in pages.iter().enumerate() {
        if page.index != pos + 1 {
            return Err(PipelineError::Internal(format!(
                "rasteriser produced page index {} at position {}",
                page.index,
                pos + 1
            )));
        }
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SourceFormat;
    use crate::pipeline::encode::EncodedPage;
    use crate::progress::ConversionProgressCallback;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbImage};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubRasterizer {
        indices: Vec<usize>,
    }

    impl StubRasterizer {
        fn pages(n: usize) -> Arc<Self> {
            Arc::new(Self {
                indices: (1..=n).collect(),
            })
        }
    }

    #[async_trait]
    impl Rasterizer for StubRasterizer {
        async fn rasterize(
            &self,
            _source: &SourceDocument,
        ) -> Result<Vec<PageImage>, PipelineError> {
            Ok(self
                .indices
                .iter()
                .map(|&index| PageImage {
                    index,
                    image: DynamicImage::ImageRgb8(RgbImage::new(2, 2)),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct ScriptedDetector {
        answers: HashMap<usize, Result<Option<String>, OcrServiceError>>,
        delays_ms: HashMap<usize, u64>,
        calls: AtomicUsize,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedDetector {
        fn answer(mut self, page: usize, answer: Result<Option<&str>, OcrServiceError>) -> Self {
            self.answers
                .insert(page, answer.map(|t| t.map(str::to_string)));
            self
        }

        fn delay(mut self, page: usize, ms: u64) -> Self {
            self.delays_ms.insert(page, ms);
            self
        }
    }

    #[async_trait]
    impl TextDetector for ScriptedDetector {
        async fn detect_text(&self, page: &EncodedPage) -> Result<Option<String>, OcrServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(page.index);
            if let Some(ms) = self.delays_ms.get(&page.index) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.answers
                .get(&page.index)
                .cloned()
                .unwrap_or_else(|| Ok(Some(format!("text {}", page.index))))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn source() -> SourceDocument {
        SourceDocument::new("uploads/doc.pdf", SourceFormat::Pdf)
    }

    #[tokio::test]
    async fn absent_page_is_omitted() {
        let detector = Arc::new(ScriptedDetector::default().answer(2, Ok(None)));
        let agg = Aggregator::new(StubRasterizer::pages(3), detector.clone());

        let text = agg.aggregate(&source()).await.unwrap();
        assert_eq!(text.pages(), vec![1, 3]);
        assert_eq!(text.as_slice()[0].text, "text 1");
        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_on_page_two_aborts() {
        let detector = Arc::new(ScriptedDetector::default().answer(
            2,
            Err(OcrServiceError::Quota {
                detail: "exhausted".into(),
            }),
        ));
        let agg = Aggregator::new(StubRasterizer::pages(3), detector.clone());

        let err = agg.aggregate(&source()).await.unwrap_err();
        match err {
            PipelineError::OcrService { page, source } => {
                assert_eq!(page, 2);
                assert!(matches!(source, OcrServiceError::Quota { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2, "page 3 must not be sent");
    }

    #[tokio::test]
    async fn pages_are_sent_in_order() {
        let detector = Arc::new(ScriptedDetector::default());
        let rasterizer = Arc::new(StubRasterizer {
            indices: vec![3, 1, 2],
        });
        let agg = Aggregator::new(rasterizer, detector.clone());

        let text = agg.aggregate(&source()).await.unwrap();
        assert_eq!(text.pages(), vec![1, 2, 3]);
        assert_eq!(*detector.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn gap_in_page_indices_is_rejected() {
        let rasterizer = Arc::new(StubRasterizer {
            indices: vec![1, 3],
        });
        let agg = Aggregator::new(rasterizer, Arc::new(ScriptedDetector::default()));
        assert!(matches!(
            agg.aggregate(&source()).await,
            Err(PipelineError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_results_keep_page_order() {
        let detector = Arc::new(
            ScriptedDetector::default()
                .delay(1, 80)
                .delay(2, 40)
                .delay(3, 0),
        );
        let agg = Aggregator::new(StubRasterizer::pages(3), detector).with_concurrency(3);

        let text = agg.aggregate(&source()).await.unwrap();
        assert_eq!(text.pages(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let detector = Arc::new(ScriptedDetector::default().delay(1, 2_000));
        let agg = Aggregator::new(StubRasterizer::pages(1), detector)
            .with_ocr_timeout(Duration::from_millis(50));

        let err = agg.aggregate(&source()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OcrService {
                page: 1,
                source: OcrServiceError::Timeout { .. }
            }
        ));
    }

    struct CancelAfterFirst {
        completed: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for CancelAfterFirst {
        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.completed.load(Ordering::SeqCst) >= 1
        }
    }

    #[tokio::test]
    async fn cancellation_between_pages() {
        let detector = Arc::new(ScriptedDetector::default());
        let cb = Arc::new(CancelAfterFirst {
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        let agg = Aggregator::new(StubRasterizer::pages(3), detector.clone())
            .with_progress(cb.clone() as ProgressCallback);

        let err = agg.aggregate(&source()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { page: 2 }));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_is_reported_to_callback() {
        let detector = Arc::new(ScriptedDetector::default().answer(
            1,
            Err(OcrServiceError::Auth {
                status: 403,
                detail: "bad key".into(),
            }),
        ));
        let cb = Arc::new(CancelAfterFirst {
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        let agg = Aggregator::new(StubRasterizer::pages(2), detector)
            .with_progress(cb.clone() as ProgressCallback);

        assert!(agg.aggregate(&source()).await.is_err());
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stats_count_pages() {
        let detector = Arc::new(ScriptedDetector::default().answer(1, Ok(None)));
        let agg = Aggregator::new(StubRasterizer::pages(2), detector);
        let (_, stats) = agg.aggregate_with_stats(&source()).await.unwrap();
        assert_eq!(stats.total_pages, 2);
        assert_eq!(stats.text_pages, 1);
    }

    #[tokio::test]
    async fn empty_document_yields_empty_text() {
        let agg = Aggregator::new(StubRasterizer::pages(0), Arc::new(ScriptedDetector::default()));
        assert!(agg.aggregate(&source()).await.unwrap().is_empty());
    }
}
