#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use memcload::io::compression::{auto_detect_reader, detect_from_extension};
    use memcload::testing::{SAMPLE_LINES, write_lines};
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn read_lines(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(auto_detect_reader(file, path)?);
        Ok(reader.lines().collect::<Result<_, _>>()?)
    }

    fn roundtrip(name: &str) -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(name);
        write_lines(&path, SAMPLE_LINES)?;
        assert_eq!(read_lines(&path)?, SAMPLE_LINES);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_roundtrip() -> anyhow::Result<()> {
        roundtrip("logs.tsv.gz")
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_concatenated_gzip_members() -> anyhow::Result<()> {
        use std::io::Write;
        let dir = TempDir::new()?;
        let path = dir.path().join("multi.tsv.gz");
        let mut bytes = Vec::new();
        for line in &SAMPLE_LINES[..2] {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            writeln!(encoder, "{line}")?;
            bytes.extend(encoder.finish()?);
        }
        std::fs::write(&path, bytes)?;

        assert_eq!(read_lines(&path)?, &SAMPLE_LINES[..2]);
        Ok(())
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn test_zstd_roundtrip() -> anyhow::Result<()> {
        roundtrip("logs.tsv.zst")
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn test_bzip2_roundtrip() -> anyhow::Result<()> {
        roundtrip("logs.tsv.bz2")
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn test_xz_roundtrip() -> anyhow::Result<()> {
        roundtrip("logs.tsv.xz")
    }

    #[test]
    fn test_uncompressed_passthrough() -> anyhow::Result<()> {
        roundtrip("logs.tsv")
    }

    #[test]
    fn test_extension_detection() {
        assert!(detect_from_extension("a.tsv").is_none());
        #[cfg(feature = "compression-gzip")]
        assert_eq!(detect_from_extension("A.TSV.GZ").map(|c| c.name()), Some("gzip"));
        #[cfg(feature = "compression-zstd")]
        assert_eq!(detect_from_extension("a.tsv.zst").map(|c| c.name()), Some("zstd"));
    }
}
