use super::types::DomainToken;
use crate::error::WriteError;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Ordered fold of per-source token sequences into one deduplicated list.
/// The first occurrence of a domain fixes its position.
#[derive(Debug, Default)]
pub struct Aggregator {
    seen: FxHashSet<DomainToken>,
    domains: Vec<DomainToken>,
    allowlist: FxHashSet<DomainToken>,
    raw_count: usize,
    allowlisted: usize,
}

impl Aggregator {
    pub fn new(allowlist: &[String]) -> Self {
        let mut allowed = FxHashSet::default();
        for entry in allowlist {
            match DomainToken::parse(entry) {
                Ok(token) => {
                    allowed.insert(token);
                }
                Err(e) => warn!("Ignoring allowlist entry '{}': {}", entry, e),
            }
        }
        Self {
            allowlist: allowed,
            ..Self::default()
        }
    }

    /// Appends one source's tokens. Returns how many were new.
    pub fn extend<I>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = DomainToken>,
    {
        let before = self.domains.len();
        for token in tokens {
            self.raw_count += 1;
            if self.allowlist.contains(&token) {
                self.allowlisted += 1;
                continue;
            }
            if self.seen.insert(token.clone()) {
                self.domains.push(token);
            }
        }
        self.domains.len() - before
    }

    pub fn finish(self) -> Blocklist {
        let duplicates = self.raw_count - self.allowlisted - self.domains.len();
        Blocklist {
            domains: self.domains,
            raw_count: self.raw_count,
            duplicates,
            allowlisted: self.allowlisted,
        }
    }
}

/// The final artifact: unique lowercase domains in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocklist {
    domains: Vec<DomainToken>,
    raw_count: usize,
    duplicates: usize,
    allowlisted: usize,
}

impl Blocklist {
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn domains(&self) -> &[DomainToken] {
        &self.domains
    }

    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn allowlisted(&self) -> usize {
        self.allowlisted
    }

    /// One domain per line, each terminated by `\n`, nothing else.
    pub fn render(&self) -> String {
        let capacity = self.domains.iter().map(|d| d.as_str().len() + 1).sum();
        let mut out = String::with_capacity(capacity);
        for domain in &self.domains {
            out.push_str(domain.as_str());
            out.push('\n');
        }
        out
    }

    /// Writes to a sibling temporary file and renames it over `path`, so
    /// readers see either the old list or the complete new one.
    pub async fn write_atomic(&self, path: &Path) -> Result<(), WriteError> {
        let tmp = temp_path(path);
        let result = self.write_and_rename(&tmp, path).await;
        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result.map_err(|source| WriteError {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Wrote {} domains to {}", self.len(), path.display());
        Ok(())
    }

    async fn write_and_rename(&self, tmp: &Path, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        remove_stale_temps(path).await;

        let mut file = fs::File::create(tmp).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(tmp, path).await
    }
}

fn temp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blocklist".to_string());
    format!(".{}.tmp-", name)
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_file_name(format!("{}{}", temp_prefix(path), std::process::id()))
}

/// Clears temp files left behind by runs that were interrupted mid-write.
async fn remove_stale_temps(path: &Path) {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = temp_prefix(path);

    let Ok(mut entries) = fs::read_dir(&dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            match fs::remove_file(entry.path()).await {
                Ok(()) => debug!("Removed stale temp file {}", entry.path().display()),
                Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(names: &[&str]) -> Vec<DomainToken> {
        names.iter().map(|n| DomainToken::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut agg = Aggregator::new(&[]);
        assert_eq!(agg.extend(tokens(&["b.com", "a.com", "b.com"])), 2);
        assert_eq!(agg.extend(tokens(&["c.com", "A.com", "d.com"])), 2);

        let list = agg.finish();
        let names: Vec<&str> = list.domains().iter().map(|d| d.as_str()).collect();
        assert_eq!(names, vec!["b.com", "a.com", "c.com", "d.com"]);
        assert_eq!(list.raw_count(), 6);
        assert_eq!(list.duplicates(), 2);
    }

    #[test]
    fn test_union_of_disjoint_sources() {
        let mut agg = Aggregator::new(&[]);
        agg.extend(tokens(&["one.example"]));
        agg.extend(tokens(&["two.example"]));
        assert_eq!(agg.finish().render(), "one.example\ntwo.example\n");
    }

    #[test]
    fn test_allowlist_removes_entries() {
        let allow = vec!["Safe.Example.com".to_string(), "not a domain".to_string()];
        let mut agg = Aggregator::new(&allow);
        agg.extend(tokens(&["ads.com", "safe.example.com", "tracker.com"]));

        let list = agg.finish();
        assert_eq!(list.render(), "ads.com\ntracker.com\n");
        assert_eq!(list.allowlisted(), 1);
        assert_eq!(list.duplicates(), 0);
    }

    #[test]
    fn test_empty_render() {
        let list = Aggregator::new(&[]).finish();
        assert!(list.is_empty());
        assert_eq!(list.render(), "");
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blocklist.txt");

        let mut agg = Aggregator::new(&[]);
        agg.extend(tokens(&["old.com"]));
        agg.finish().write_atomic(&path).await.unwrap();

        let mut agg = Aggregator::new(&[]);
        agg.extend(tokens(&["new.com", "newer.com"]));
        agg.finish().write_atomic(&path).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "new.com\nnewer.com\n");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_clears_interrupted_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocklist.txt");
        std::fs::write(dir.path().join(".blocklist.txt.tmp-4242"), "half").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let mut agg = Aggregator::new(&[]);
        agg.extend(tokens(&["ads.com"]));
        agg.finish().write_atomic(&path).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["blocklist.txt", "unrelated.txt"]);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way of the rename target makes the write fail.
        let path = dir.path().join("blocklist.txt");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("marker"), "keep").unwrap();

        let mut agg = Aggregator::new(&[]);
        agg.extend(tokens(&["ads.com"]));
        let err = agg.finish().write_atomic(&path).await.unwrap_err();

        assert_eq!(err.path, path);
        assert_eq!(std::fs::read_to_string(path.join("marker")).unwrap(), "keep");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
