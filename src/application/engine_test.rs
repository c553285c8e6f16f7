#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::StreamExt;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    use crate::application::{Engine, RequestSlot};
    use crate::domain::entities::{
        CancelCause, DownloadData, ErrorCause, ImageFrom, Outcome, RequestLevel, RequestResult,
        Status,
    };
    use crate::domain::errors::{DecodeError, DownloadError, ProcessError};
    use crate::domain::ports::{
        BitmapProvider, DecodeOptions, Decoded, Decoder, DownloadResponse, Downloader,
        MockDownloader, MockImageProcessor, RequestListener,
    };
    use crate::infrastructure::config::EngineConfig;
    use crate::infrastructure::decode::ImageDecoder;
    use crate::infrastructure::executor::ExecutorConfig;
    use crate::infrastructure::request::RequestHandle;

    const URI: &str = "http://x/img.jpg";
    const MAX_SIZE_KEY: &str = "http://x/img.jpg\u{1f}MaxSize(100x100)";

    fn png(width: u32, height: u32) -> Bytes {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255])));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    /// Serves the same body for every URI, counting opens. Opens block until
    /// the gate has permits.
    struct CountingDownloader {
        body: Bytes,
        opens: AtomicUsize,
        gate: Semaphore,
        send_length: bool,
    }

    impl CountingDownloader {
        fn new(body: Bytes, permits: usize, send_length: bool) -> Arc<Self> {
            Arc::new(Self {
                body,
                opens: AtomicUsize::new(0),
                gate: Semaphore::new(permits),
                send_length,
            })
        }

        fn open_gate(body: Bytes) -> Arc<Self> {
            Self::new(body, Semaphore::MAX_PERMITS, true)
        }

        fn closed_gate(body: Bytes) -> Arc<Self> {
            Self::new(body, 0, true)
        }

        /// Streams the body without announcing its length.
        fn chunked(body: Bytes) -> Arc<Self> {
            Self::new(body, Semaphore::MAX_PERMITS, false)
        }

        fn release(&self) {
            self.gate.add_permits(1000);
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Downloader for CountingDownloader {
        async fn open(&self, _uri: &str) -> Result<DownloadResponse, DownloadError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await.map_err(|_| DownloadError::Canceled)?;
            let chunks: Vec<Result<Bytes, DownloadError>> = self
                .body
                .chunks(16)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();
            Ok(DownloadResponse {
                content_length: self.send_length.then_some(self.body.len() as u64),
                content_type: Some("image/png".to_string()),
                body: futures_util::stream::iter(chunks).boxed(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Started,
        Completed(ImageFrom),
        Error(ErrorCause),
        Canceled(CancelCause),
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingListener {
        fn terminal_count(&self) -> usize {
            self.events
                .lock()
                .iter()
                .filter(|event| !matches!(event, Event::Started))
                .count()
        }
    }

    impl RequestListener for RecordingListener {
        fn on_started(&self) {
            self.events.lock().push(Event::Started);
        }

        fn on_completed(&self, result: RequestResult) {
            self.events.lock().push(Event::Completed(result.image_from()));
        }

        fn on_error(&self, cause: ErrorCause) {
            self.events.lock().push(Event::Error(cause));
        }

        fn on_canceled(&self, cause: CancelCause) {
            self.events.lock().push(Event::Canceled(cause));
        }
    }

    /// Wraps the default decoder and counts decodes.
    #[derive(Default)]
    struct CountingDecoder {
        decodes: AtomicUsize,
    }

    impl Decoder for CountingDecoder {
        fn decode(
            &self,
            data: &[u8],
            options: &DecodeOptions,
            pool: &dyn BitmapProvider,
        ) -> Result<Decoded, DecodeError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            ImageDecoder.decode(data, options, pool)
        }
    }

    fn config(dir: &TempDir) -> EngineConfig {
        EngineConfig {
            cache_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        }
    }

    async fn engine_with(downloader: Arc<dyn Downloader>) -> (Engine, TempDir) {
        engine_with_config(downloader, |_| {}).await
    }

    async fn engine_with_config(
        downloader: Arc<dyn Downloader>,
        adjust: impl FnOnce(&mut EngineConfig),
    ) -> (Engine, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        adjust(&mut config);
        let engine = Engine::builder(config)
            .downloader(downloader)
            .build()
            .await
            .unwrap();
        (engine, dir)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn outcome(handle: &RequestHandle) -> Outcome {
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("request did not finish in time")
    }

    fn completed_from(outcome: &Outcome) -> Option<ImageFrom> {
        match outcome {
            Outcome::Completed(result) => Some(result.image_from()),
            Outcome::Failed(_) | Outcome::Canceled(_) => None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_identical_requests_share_one_download() {
        let downloader = CountingDownloader::closed_gate(png(400, 200));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let handles: Vec<RequestHandle> = (0..5)
            .map(|_| engine.display(URI).max_size(100, 100).commit())
            .collect();

        wait_until(|| downloader.opens() == 1).await;
        wait_until(|| handles[1..].iter().all(|h| h.status() == Status::WaitLoad)).await;
        downloader.release();

        for handle in &handles {
            let outcome = outcome(handle).await;
            assert!(outcome.is_completed(), "unexpected {outcome:?}");
        }
        assert_eq!(downloader.opens(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_identical_displays_decode_once() {
        let downloader = CountingDownloader::closed_gate(png(400, 200));
        let decoder = Arc::new(CountingDecoder::default());
        let dir = TempDir::new().unwrap();
        let engine = Engine::builder(config(&dir))
            .downloader(downloader.clone())
            .decoder(decoder.clone())
            .build()
            .await
            .unwrap();

        let handles: Vec<RequestHandle> = (0..4)
            .map(|_| engine.display(URI).max_size(100, 100).commit())
            .collect();
        wait_until(|| downloader.opens() == 1).await;
        wait_until(|| handles[1..].iter().all(|h| h.status() == Status::WaitLoad)).await;
        downloader.release();

        for handle in &handles {
            assert!(outcome(handle).await.is_completed());
        }
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(downloader.opens(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_max_size_display_with_follower() {
        let downloader = CountingDownloader::closed_gate(png(400, 200));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let leader = engine.display(URI).max_size(100, 100).commit();
        wait_until(|| downloader.opens() == 1).await;
        let follower = engine.display(URI).max_size(100, 100).commit();
        wait_until(|| follower.status() == Status::WaitLoad).await;
        downloader.release();

        let Outcome::Completed(RequestResult::Display(leader_result)) = outcome(&leader).await else {
            panic!("leader did not complete");
        };
        let Outcome::Completed(RequestResult::Display(follower_result)) = outcome(&follower).await
        else {
            panic!("follower did not complete");
        };

        assert_eq!(leader_result.from, ImageFrom::Network);
        assert_eq!(follower_result.from, ImageFrom::MemoryCache);
        assert!(Arc::ptr_eq(&leader_result.image, &follower_result.image));

        let bitmap = leader_result.image.bitmap();
        assert_eq!((bitmap.width(), bitmap.height()), (100, 50));
        assert_eq!(leader_result.image.info().width, 400);

        assert_eq!(leader.memory_cache_key(), MAX_SIZE_KEY);
        assert!(engine.memory_cache().peek(MAX_SIZE_KEY).is_some());
        assert!(engine.disk_cache().exist(URI).await);
        assert_eq!(downloader.opens(), 1);

        assert_eq!(
            leader.history(),
            vec![
                Status::WaitDispatch,
                Status::StartDispatch,
                Status::WaitDownload,
                Status::StartDownload,
                Status::CheckDiskCache,
                Status::Connecting,
                Status::ReadData,
                Status::WaitLoad,
                Status::StartLoad,
                Status::CheckMemoryCache,
                Status::Decoding,
                Status::Processing,
                Status::WaitDisplay,
                Status::Completed,
            ]
        );
        assert_eq!(
            follower.history(),
            vec![
                Status::WaitDispatch,
                Status::StartDispatch,
                Status::WaitLoad,
                Status::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_repeat_display_hits_memory_cache() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let first = outcome(&engine.display(URI).commit()).await;
        assert_eq!(completed_from(&first), Some(ImageFrom::Network));

        let second = outcome(&engine.display(URI).commit()).await;
        assert_eq!(completed_from(&second), Some(ImageFrom::MemoryCache));
        assert_eq!(downloader.opens(), 1);
    }

    #[tokio::test]
    async fn test_load_after_download_reads_disk_cache() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let download = outcome(&engine.download(URI).commit()).await;
        let Outcome::Completed(RequestResult::Download(result)) = download else {
            panic!("download did not complete");
        };
        assert_eq!(result.from, ImageFrom::Network);
        assert!(matches!(result.data, DownloadData::DiskCache(_)));

        let load = outcome(&engine.load(URI).commit()).await;
        assert_eq!(completed_from(&load), Some(ImageFrom::DiskCache));
        assert_eq!(downloader.opens(), 1);
    }

    #[tokio::test]
    async fn test_unsized_body_larger_than_disk_cache_stays_in_memory() {
        let body = png(64, 64);
        let downloader = CountingDownloader::chunked(body.clone());
        let (engine, _dir) =
            engine_with_config(downloader.clone(), |config| config.disk_cache_size = 50).await;
        assert!(body.len() > 50);

        let load = outcome(&engine.load(URI).commit()).await;
        assert_eq!(completed_from(&load), Some(ImageFrom::Network));

        let download = outcome(&engine.download(URI).commit()).await;
        let Outcome::Completed(RequestResult::Download(result)) = download else {
            panic!("download did not complete");
        };
        let DownloadData::Bytes(bytes) = result.data else {
            panic!("expected bytes held in memory");
        };
        assert_eq!(bytes, body);
        assert!(!engine.disk_cache().exist(URI).await);
        assert_eq!(downloader.opens(), 2);

        let leftovers: Vec<String> = std::fs::read_dir(engine.disk_cache().dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "leftover temp files {leftovers:?}");
    }

    #[tokio::test]
    async fn test_unsized_body_within_disk_cache_is_stored() {
        let downloader = CountingDownloader::chunked(png(20, 20));
        let (engine, _dir) = engine_with(downloader).await;

        let download = outcome(&engine.download(URI).commit()).await;
        let Outcome::Completed(RequestResult::Download(result)) = download else {
            panic!("download did not complete");
        };
        assert!(matches!(result.data, DownloadData::DiskCache(_)));
        assert!(engine.disk_cache().exist(URI).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overflowed_download_queue_cancels_oldest_waiting() {
        let downloader = CountingDownloader::closed_gate(png(8, 8));
        let (engine, _dir) = engine_with_config(downloader.clone(), |config| {
            config.executor = ExecutorConfig {
                download_workers: 1,
                queue_capacity: 1,
                ..ExecutorConfig::default()
            };
        })
        .await;
        let dropped_listener = Arc::new(RecordingListener::default());

        let running = engine.download("http://x/a.png").commit();
        wait_until(|| downloader.opens() == 1).await;
        let dropped = engine
            .download("http://x/b.png")
            .listener(dropped_listener.clone())
            .commit();
        wait_until(|| dropped.status() == Status::WaitDownload).await;
        let admitted = engine.download("http://x/c.png").commit();

        assert!(matches!(outcome(&dropped).await, Outcome::Canceled(CancelCause::Discarded)));
        assert_eq!(
            *dropped_listener.events.lock(),
            vec![Event::Started, Event::Canceled(CancelCause::Discarded)]
        );

        downloader.release();
        assert!(outcome(&running).await.is_completed());
        assert!(outcome(&admitted).await.is_completed());
        assert_eq!(downloader.opens(), 2);
    }

    #[tokio::test]
    async fn test_download_error_fails_request() {
        let mut downloader = MockDownloader::new();
        downloader.expect_open().times(1).returning(|_| {
            Err(DownloadError::Status {
                status: 404,
                reason: "Not Found".to_string(),
            })
        });
        let (engine, _dir) = engine_with(Arc::new(downloader)).await;
        let listener = Arc::new(RecordingListener::default());

        let handle = engine.display(URI).listener(listener.clone()).commit();

        assert!(matches!(outcome(&handle).await, Outcome::Failed(ErrorCause::DownloadError)));
        assert_eq!(
            *listener.events.lock(),
            vec![Event::Started, Event::Error(ErrorCause::DownloadError)]
        );
        assert!(!engine.disk_cache().exist(URI).await);
    }

    #[tokio::test]
    async fn test_undecodable_body_fails_decode() {
        let downloader = CountingDownloader::open_gate(Bytes::from_static(b"definitely not an image"));
        let (engine, _dir) = engine_with(downloader).await;

        let load = outcome(&engine.load(URI).commit()).await;
        assert!(matches!(load, Outcome::Failed(ErrorCause::DecodeFailed)));

        // The bytes themselves were fine to cache.
        let download = outcome(&engine.download(URI).commit()).await;
        assert_eq!(completed_from(&download), Some(ImageFrom::DiskCache));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_is_idempotent() {
        let downloader = CountingDownloader::closed_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;
        let listener = Arc::new(RecordingListener::default());

        let handle = engine.display(URI).listener(listener.clone()).commit();
        wait_until(|| downloader.opens() == 1).await;

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.cancel_with(CancelCause::BeReplaced));
        downloader.release();

        assert!(matches!(outcome(&handle).await, Outcome::Canceled(CancelCause::Normal)));
        assert_eq!(handle.status(), Status::Canceled);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(listener.terminal_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_level_stops_display() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let handle = engine.display(URI).request_level(RequestLevel::Memory).commit();
        assert!(matches!(
            outcome(&handle).await,
            Outcome::Canceled(CancelCause::RequestLevelIsMemory)
        ));
        assert_eq!(downloader.opens(), 0);
    }

    #[tokio::test]
    async fn test_local_level_stops_before_network() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        let handle = engine.load(URI).request_level(RequestLevel::Local).commit();
        assert!(matches!(
            outcome(&handle).await,
            Outcome::Canceled(CancelCause::RequestLevelIsLocal)
        ));
        assert_eq!(downloader.opens(), 0);
    }

    #[tokio::test]
    async fn test_local_level_served_from_disk_cache() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;
        assert!(outcome(&engine.download(URI).commit()).await.is_completed());

        let handle = engine.load(URI).request_level(RequestLevel::Local).commit();
        assert_eq!(completed_from(&outcome(&handle).await), Some(ImageFrom::DiskCache));
        assert!(handle.history().contains(&Status::CheckDiskCache));
        assert!(!handle.history().contains(&Status::Connecting));
        assert_eq!(downloader.opens(), 1);
    }

    #[tokio::test]
    async fn test_pause_flags_lower_request_level() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;

        engine.set_pause_download(true);
        let load = outcome(&engine.load(URI).commit()).await;
        assert!(matches!(load, Outcome::Canceled(CancelCause::PauseDownload)));

        engine.set_pause_download(false);
        engine.set_pause_load(true);
        let display = outcome(&engine.display(URI).commit()).await;
        assert!(matches!(display, Outcome::Canceled(CancelCause::PauseLoad)));
        assert_eq!(downloader.opens(), 0);
    }

    #[tokio::test]
    async fn test_invalid_uris_fail_through_callbacks() {
        let downloader = CountingDownloader::open_gate(png(20, 20));
        let (engine, dir) = engine_with(downloader).await;
        let listener = Arc::new(RecordingListener::default());

        let empty = engine.display("  ").listener(listener.clone()).commit();
        assert!(matches!(outcome(&empty).await, Outcome::Failed(ErrorCause::UriInvalid)));
        assert_eq!(*listener.events.lock(), vec![Event::Error(ErrorCause::UriInvalid)]);

        let unknown = engine.load("ftp://x/img.jpg").commit();
        assert!(matches!(outcome(&unknown).await, Outcome::Failed(ErrorCause::UriNoSupport)));

        let separator = engine.load("http://x/a\u{1f}MaxSize(1x1)").commit();
        assert!(matches!(outcome(&separator).await, Outcome::Failed(ErrorCause::UriInvalid)));

        let local_path = dir.path().join("a.png").display().to_string();
        let download = engine.download(local_path).commit();
        assert!(matches!(outcome(&download).await, Outcome::Failed(ErrorCause::UriNoSupport)));
    }

    #[tokio::test]
    async fn test_sync_local_file_load() {
        let downloader = CountingDownloader::open_gate(Bytes::new());
        let (engine, dir) = engine_with(downloader).await;
        let path = dir.path().join("local.png");
        std::fs::write(&path, png(30, 10)).unwrap();
        let listener = Arc::new(RecordingListener::default());

        let outcome = engine
            .load(format!("file://{}", path.display()))
            .listener(listener.clone())
            .execute()
            .await;

        let Outcome::Completed(RequestResult::Load(result)) = outcome else {
            panic!("load did not complete");
        };
        assert_eq!(result.from, ImageFrom::Local);
        assert_eq!(result.image.bitmap().width(), 30);
        assert_eq!(
            *listener.events.lock(),
            vec![Event::Started, Event::Completed(ImageFrom::Local)]
        );
    }

    #[tokio::test]
    async fn test_sync_commit_missing_file() {
        let downloader = CountingDownloader::open_gate(Bytes::new());
        let (engine, dir) = engine_with(downloader).await;
        let path = dir.path().join("missing.png");

        let handle = engine.display(path.display().to_string()).sync(true).commit();
        assert!(matches!(
            outcome(&handle).await,
            Outcome::Failed(ErrorCause::DataSourceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_sync_commit_bypasses_pools() {
        let downloader = CountingDownloader::open_gate(png(12, 12));
        let (engine, dir) = engine_with(downloader.clone()).await;
        let path = dir.path().join("sync.png");
        std::fs::write(&path, png(12, 12)).unwrap();
        let listener = Arc::new(RecordingListener::default());

        let local = engine
            .load(path.display().to_string())
            .listener(listener.clone())
            .sync(true)
            .commit();
        assert_eq!(completed_from(&outcome(&local).await), Some(ImageFrom::Local));
        assert_eq!(
            *listener.events.lock(),
            vec![Event::Started, Event::Completed(ImageFrom::Local)]
        );

        let remote = engine.display(URI).sync(true).commit();
        assert_eq!(completed_from(&outcome(&remote).await), Some(ImageFrom::Network));

        let executor = &engine.context().executor;
        assert!(!executor.has_download_pool());
        assert!(!executor.has_load_pool());
    }

    #[tokio::test]
    async fn test_data_uri_display() {
        use base64::Engine as _;
        let downloader = CountingDownloader::open_gate(Bytes::new());
        let (engine, _dir) = engine_with(downloader.clone()).await;
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png(4, 4))
        );

        let outcome = outcome(&engine.display(uri).commit()).await;
        assert_eq!(completed_from(&outcome), Some(ImageFrom::Memory));
        assert_eq!(downloader.opens(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slot_merges_and_replaces() {
        let downloader = CountingDownloader::closed_gate(png(20, 20));
        let (engine, _dir) = engine_with(downloader.clone()).await;
        let slot = RequestSlot::new();

        let first = engine.display(URI).into_slot(&slot).commit();
        let again = engine.display(URI).into_slot(&slot).commit();
        assert_eq!(first.id(), again.id());

        let other = engine.display("http://x/other.jpg").into_slot(&slot).commit();
        assert_ne!(other.id(), first.id());
        assert!(matches!(outcome(&first).await, Outcome::Canceled(CancelCause::BeReplaced)));

        downloader.release();
        assert!(outcome(&other).await.is_completed());
        assert_eq!(slot.current().map(|h| h.id()), Some(other.id()));
    }

    #[tokio::test]
    async fn test_processor_participates_in_key_and_failure() {
        let downloader = CountingDownloader::open_gate(png(8, 8));
        let (engine, _dir) = engine_with(downloader).await;

        let mut passthrough = MockImageProcessor::new();
        passthrough.expect_key().return_const("grayscale".to_string());
        passthrough.expect_process().times(1).returning(|bitmap, _| Ok(bitmap));
        let handle = engine.display(URI).processor(Arc::new(passthrough)).commit();
        assert!(outcome(&handle).await.is_completed());
        assert_eq!(handle.memory_cache_key(), "http://x/img.jpg\u{1f}Processor(grayscale)");

        let mut failing = MockImageProcessor::new();
        failing.expect_key().return_const("broken".to_string());
        failing
            .expect_process()
            .returning(|_, _| Err(ProcessError::new("broken", "unsupported")));
        let handle = engine.load(URI).processor(Arc::new(failing)).commit();
        assert!(matches!(outcome(&handle).await, Outcome::Failed(ErrorCause::ProcessFailed)));
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_canceled() {
        let downloader = CountingDownloader::open_gate(png(8, 8));
        let (engine, _dir) = engine_with(downloader.clone()).await;
        engine.shutdown();
        engine.shutdown();

        let handle = engine.display(URI).commit();
        assert!(matches!(outcome(&handle).await, Outcome::Canceled(CancelCause::Normal)));
        assert_eq!(downloader.opens(), 0);
    }
}
