#[cfg(test)]
mod tests {
    use crate::compressor::Compressor;
    use crate::PipelineError;
    use logroll_core::CompressionMode;
    use std::io::Read;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::runtime::Handle;

    const CONTENT: &[u8] = b"2024-01-01 INFO started\n2024-01-01 INFO stopped\n";

    /// Test: gz compression replaces the source with `<source>.gz`
    ///
    /// Expected
    /// - returned path is `<source>.gz`, source removed, content decompresses intact
    #[test]
    fn test_compress_sync_gz() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("app.2024-01-01.log");
        std::fs::write(&src, CONTENT).unwrap();

        let out = Compressor::new(CompressionMode::Gz)
            .compress_sync(&src)
            .expect("compress");

        assert_eq!(out, tmp.path().join("app.2024-01-01.log.gz"));
        assert!(!src.exists(), "source should be removed");
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(std::fs::File::open(&out).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, CONTENT);
    }

    /// Test: zstd compression uses the `.zstd` extension
    #[test]
    fn test_compress_sync_zstd() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("app.log");
        std::fs::write(&src, CONTENT).unwrap();

        let out = Compressor::new(CompressionMode::Zstd)
            .compress_sync(&src)
            .expect("compress");

        assert_eq!(out, tmp.path().join("app.log.zstd"));
        let decoded = zstd::decode_all(std::fs::File::open(&out).unwrap()).unwrap();
        assert_eq!(decoded, CONTENT);
    }

    /// Test: without compression the source is returned untouched
    #[test]
    fn test_compress_sync_none_is_identity() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("app.log");
        std::fs::write(&src, CONTENT).unwrap();

        let out = Compressor::new(CompressionMode::None)
            .compress_sync(&src)
            .expect("compress");
        assert_eq!(out, src);
        assert_eq!(std::fs::read(&src).unwrap(), CONTENT);
    }

    /// Test: a missing source is skipped, not an error
    ///
    /// Expected
    /// - derived name returned, no compressed file created
    #[test]
    fn test_compress_sync_missing_source() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("never-written.log");

        let out = Compressor::new(CompressionMode::Gz)
            .compress_sync(&src)
            .expect("missing source is not an error");
        assert_eq!(out, tmp.path().join("never-written.log.gz"));
        assert!(!out.exists());
    }

    /// Test: a directory as source is a compression failure
    #[test]
    fn test_compress_sync_failure() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("a-directory");
        std::fs::create_dir(&src).unwrap();

        let err = Compressor::new(CompressionMode::Gz)
            .compress_sync(&src)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Compression { .. }));
        assert!(!tmp.path().join("a-directory.gz").exists());
    }

    /// Test: async compression is tracked and shutdown rejects new work
    ///
    /// Flow
    /// - compress one file in the background and wait for its handle
    /// - shut the compressor down, wait for termination, try another compression
    ///
    /// Expected
    /// - first handle yields `<source>.gz`; after shutdown new requests fail with `Closed`
    #[tokio::test]
    async fn test_compress_async_and_shutdown() {
        let tmp = TempDir::new().expect("tmpdir");
        let src = tmp.path().join("app.log");
        std::fs::write(&src, CONTENT).unwrap();
        let compressor = Compressor::new(CompressionMode::Gz);

        let out = compressor
            .compress_async(src.clone(), &Handle::current())
            .wait()
            .await
            .expect("async compress");
        assert_eq!(out, tmp.path().join("app.log.gz"));
        assert!(out.exists());

        compressor.shutdown();
        assert!(compressor.await_termination(Duration::from_secs(5)).await);

        let other = tmp.path().join("other.log");
        std::fs::write(&other, CONTENT).unwrap();
        let err = compressor
            .compress_async(other.clone(), &Handle::current())
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Closed));
        assert!(other.exists(), "rejected file must stay untouched");
    }
}
