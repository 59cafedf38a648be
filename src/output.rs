use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{date::SortOrder, record::PublicationRecord};

/// The written file: journal articles and everything else, each sorted by publication date.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct OutputDocument {
    #[serde(rename = "Journal")]
    pub journal: Vec<PublicationRecord>,
    pub others: Vec<PublicationRecord>,
}

impl OutputDocument {
    /// Partition records by venue and sort both buckets.
    ///
    /// Partitioning and sorting are both stable, so records with equal dates keep fetch order.
    pub fn build(records: impl IntoIterator<Item = PublicationRecord>, order: SortOrder) -> Self {
        let (mut journal, mut others): (Vec<_>, Vec<_>) =
            records.into_iter().partition(PublicationRecord::has_journal);
        sort_bucket(&mut journal, order);
        sort_bucket(&mut others, order);
        OutputDocument { journal, others }
    }

    pub fn len(&self) -> usize {
        self.journal.len() + self.others.len()
    }

    /// Pretty-printed JSON, two-space indent, non-ASCII left unescaped.
    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut out = serde_json::to_string_pretty(self).context("serialize output")?;
        out.push('\n');
        Ok(out)
    }

    /// Write the document to `path`, replacing whatever is there.
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn sort_bucket(bucket: &mut [PublicationRecord], order: SortOrder) {
    let key = |r: &PublicationRecord| order.sort_key(r.publication_date.as_deref());
    bucket.sort_by(|a, b| order.compare(&key(a), &key(b)));
}

/// `scholar_data_<author_id>.json` inside `dir`.
///
/// Characters other than ASCII letters, digits, `-` and `_` are replaced so the identifier can
/// never escape `dir`.
pub fn output_path(dir: &Path, author_id: &str) -> PathBuf {
    let safe: String = author_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("scholar_data_{safe}.json"))
}
