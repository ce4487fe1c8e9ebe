//! Registry payload for a synthesized recipe revision.
//!
//! A Conan recipe revision is served as three files: the recipe script, a
//! manifest listing file digests, and an export archive carrying
//! `conandata.yml`. All three are derived from the materialized recipe so the
//! same inputs always produce the same bytes.

use std::io::Write;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use cppkg_schema::{
    DESCRIPTOR_FILE, EXPORT_ARCHIVE, MANIFEST_FILE, Md5Digest, RECIPE_FILE, RecipeRevision,
};
use flate2::Compression;
use flate2::write::GzEncoder;

/// Files of a revision, in the order the registry lists them.
pub const REVISION_FILES: [&str; 3] = [EXPORT_ARCHIVE, MANIFEST_FILE, RECIPE_FILE];

/// A served revision file.
#[derive(Debug, Clone)]
pub struct RevisionFile {
    /// File body.
    pub body: Bytes,
    /// `Content-Type` header value.
    pub content_type: &'static str,
}

/// Everything the proxy serves for one synthesized revision.
#[derive(Debug, Clone)]
pub struct SynthesizedManifest {
    revision: RecipeRevision,
    timestamp: DateTime<Utc>,
    recipe: Bytes,
    manifest: Bytes,
    export_archive: Bytes,
}

impl SynthesizedManifest {
    /// Build the revision from the rewritten descriptor and recipe bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the export archive cannot be assembled.
    pub fn build(
        descriptor: impl Into<Bytes>,
        recipe: impl Into<Bytes>,
        timestamp: DateTime<Utc>,
    ) -> std::io::Result<Self> {
        let descriptor = descriptor.into();
        let recipe = recipe.into();
        let revision = RecipeRevision::from_descriptor(&descriptor);
        let manifest = manifest_text(timestamp.timestamp(), &descriptor, &recipe);
        let export_archive = export_archive(&descriptor, timestamp.timestamp())?;

        Ok(Self {
            revision,
            timestamp,
            recipe,
            manifest: Bytes::from(manifest),
            export_archive: Bytes::from(export_archive),
        })
    }

    /// Content-addressed revision id.
    pub fn revision(&self) -> &RecipeRevision {
        &self.revision
    }

    /// Timestamp as served by the registry, e.g. `2024-03-01T12:00:00Z`.
    pub fn time_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Gzip tar containing only the descriptor.
    pub fn export_archive(&self) -> &Bytes {
        &self.export_archive
    }

    /// Look up a revision file by name.
    pub fn file(&self, name: &str) -> Option<RevisionFile> {
        let (body, content_type) = match name {
            RECIPE_FILE => (&self.recipe, "text/x-python"),
            MANIFEST_FILE => (&self.manifest, "text/plain"),
            EXPORT_ARCHIVE => (&self.export_archive, "application/x-gzip"),
            _ => return None,
        };
        Some(RevisionFile {
            body: body.clone(),
            content_type,
        })
    }
}

/// Manifest text: the epoch seconds, then one `<file>: <md5>` line per file.
pub fn manifest_text(epoch: i64, descriptor: &[u8], recipe: &[u8]) -> String {
    format!(
        "{epoch}\n{DESCRIPTOR_FILE}: {}\n{RECIPE_FILE}: {}\n",
        Md5Digest::of(descriptor),
        Md5Digest::of(recipe)
    )
}

/// Gzip tar archive holding `conandata.yml` with a fixed mode and owner.
///
/// # Errors
///
/// Returns an I/O error if writing to the in-memory archive fails.
pub fn export_archive(descriptor: &[u8], mtime: i64) -> std::io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);

    let mut header = tar::Header::new_gnu();
    header.set_path(DESCRIPTOR_FILE)?;
    header.set_size(descriptor.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime.max(0) as u64);
    header.set_uid(0);
    header.set_gid(0);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    archive.append(&header, descriptor)?;

    let mut encoder = archive.into_inner()?;
    encoder.flush()?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const DESCRIPTOR: &[u8] =
        b"sources:\n  1.2.0:\n    url: https://example.com/widget-1.2.0.tar.gz\n";
    const RECIPE: &[u8] = b"class Widget(ConanFile):\n    pass\n";

    fn published() -> DateTime<Utc> {
        "2024-03-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_manifest_text() {
        let text = manifest_text(1_709_294_400, b"a", b"b");
        assert_eq!(
            text,
            "1709294400\n\
             conandata.yml: 0cc175b9c0f1b6a831c399e269772661\n\
             conanfile.py: 92eb5ffee6ae2fec3ad71c777531578f\n"
        );
    }

    #[test]
    fn test_export_archive_contains_only_descriptor() {
        let manifest = SynthesizedManifest::build(DESCRIPTOR, RECIPE, published()).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(manifest.export_archive().as_ref()));
        let mut entries = archive.entries().unwrap();

        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some(DESCRIPTOR_FILE));
        assert_eq!(entry.header().mode().unwrap(), 0o644);
        assert_eq!(entry.header().mtime().unwrap(), 1_709_294_400);
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        assert_eq!(body, DESCRIPTOR);
        drop(entry);

        assert!(entries.next().is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = SynthesizedManifest::build(DESCRIPTOR, RECIPE, published()).unwrap();
        let b = SynthesizedManifest::build(DESCRIPTOR, RECIPE, published()).unwrap();

        assert_eq!(a.revision(), b.revision());
        assert_eq!(a.export_archive(), b.export_archive());
        assert_eq!(a.revision().as_str().len(), 32);
        assert_eq!(a.time_rfc3339(), "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_file_lookup() {
        let manifest = SynthesizedManifest::build(DESCRIPTOR, RECIPE, published()).unwrap();

        let recipe = manifest.file(RECIPE_FILE).unwrap();
        assert_eq!(recipe.content_type, "text/x-python");
        assert_eq!(recipe.body.as_ref(), RECIPE);

        assert_eq!(manifest.file(MANIFEST_FILE).unwrap().content_type, "text/plain");
        assert_eq!(
            manifest.file(EXPORT_ARCHIVE).unwrap().content_type,
            "application/x-gzip"
        );
        assert!(manifest.file("conaninfo.txt").is_none());
        assert!(manifest.file(DESCRIPTOR_FILE).is_none());
    }
}
