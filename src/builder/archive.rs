//! Default producer: package the output directory as a gzipped tarball.
//!
//! Each deliverable becomes one `.tar.gz` holding the project's output
//! directory under `bin/`, its source directories under `src/`, and a
//! small `QUAY-INF/paths.txt` listing the resolved buildpath.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;
use tempfile::NamedTempFile;

use crate::builder::producer::{ArtifactProducer, OutputTarget, ProduceOutcome, ProduceRequest};
use crate::util::fs::ensure_dir;

#[derive(Debug, Default)]
pub struct ArchiveProducer;

impl ArchiveProducer {
    pub fn new() -> Self {
        ArchiveProducer
    }

    fn write_one(&self, request: &ProduceRequest, target: &OutputTarget) -> Result<()> {
        let dir = target
            .file
            .parent()
            .unwrap_or_else(|| request.target_dir.as_path());
        ensure_dir(dir)?;

        let tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

        {
            let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
            let mut builder = Builder::new(encoder);
            builder.follow_symlinks(false);

            if request.output_dir.is_dir() {
                builder
                    .append_dir_all("bin", &request.output_dir)
                    .with_context(|| {
                        format!("failed to archive {}", request.output_dir.display())
                    })?;
            }

            for source in &request.sourcepath {
                if source == &request.base || !source.is_dir() {
                    continue;
                }
                builder
                    .append_dir_all("src", source)
                    .with_context(|| format!("failed to archive {}", source.display()))?;
            }

            let manifest = paths_manifest(request, target);
            let mut header = tar::Header::new_gnu();
            header.set_path("QUAY-INF/paths.txt")?;
            header.set_size(manifest.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, Cursor::new(manifest.into_bytes()))?;

            builder
                .into_inner()
                .and_then(|encoder| encoder.finish())
                .with_context(|| format!("failed to finish {}", target.file.display()))?;
        }

        tmp.persist(&target.file)
            .with_context(|| format!("failed to write {}", target.file.display()))?;
        Ok(())
    }
}

fn paths_manifest(request: &ProduceRequest, target: &OutputTarget) -> String {
    let mut out = format!("bsn: {}\nversion: {}\n", target.bsn, target.version);
    for entry in &request.buildpath {
        out.push_str("buildpath: ");
        out.push_str(&entry.display().to_string());
        out.push('\n');
    }
    out
}

impl ArtifactProducer for ArchiveProducer {
    fn name(&self) -> &str {
        "archive"
    }

    fn produce(&self, request: &ProduceRequest) -> Result<ProduceOutcome> {
        let mut artifacts = Vec::new();
        for target in &request.targets {
            if let Err(e) = self.write_one(request, target) {
                return Ok(ProduceOutcome::failure(format!("{:#}", e)));
            }
            tracing::debug!("wrote {}", target.file.display());
            artifacts.push(target.file.clone());
        }
        Ok(ProduceOutcome::success(artifacts))
    }
}

/// List the entry paths of a produced archive.
pub fn archive_entries(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Version;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_produces_archive_per_target() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("app");
        fs::create_dir_all(base.join("bin")).unwrap();
        fs::create_dir_all(base.join("src")).unwrap();
        fs::write(base.join("bin/app.class"), "bytes").unwrap();
        fs::write(base.join("src/App.java"), "class App {}").unwrap();

        let request = ProduceRequest {
            project: "app".into(),
            base: base.clone(),
            output_dir: base.join("bin"),
            target_dir: base.join("generated"),
            targets: vec![OutputTarget {
                bsn: "app".into(),
                version: Version::new(1, 0, 0),
                file: base.join("generated/app.tar.gz"),
            }],
            buildpath: vec![base.join("bin")],
            testpath: Vec::new(),
            bootclasspath: Vec::new(),
            sourcepath: vec![base.join("src")],
            under_test: false,
        };

        let outcome = ArchiveProducer::new().produce(&request).unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.artifacts, vec![base.join("generated/app.tar.gz")]);

        let entries = archive_entries(&outcome.artifacts[0]).unwrap();
        assert!(entries.iter().any(|e| e == "bin/app.class"));
        assert!(entries.iter().any(|e| e == "src/App.java"));
        assert!(entries.iter().any(|e| e == "QUAY-INF/paths.txt"));
    }
}
