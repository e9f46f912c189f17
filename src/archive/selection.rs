//! Include/exclude selection over archive members
//!
//! Two strategies, kept separate on purpose:
//! - [`SelectionStrategy::PerMember`] judges every member by its own extension,
//!   exclude first, then include.
//! - [`SelectionStrategy::WholeArchive`] keeps or drops the archive as a unit:
//!   any excluded extension drops it, and a non-empty include list drops it
//!   unless some member matches.

use crate::record::{FileInfo, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    #[default]
    PerMember,
    WholeArchive,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveSelection {
    pub strategy: SelectionStrategy,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ArchiveSelection {
    #[must_use]
    pub fn per_member<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::new(SelectionStrategy::PerMember, include, exclude)
    }

    #[must_use]
    pub fn whole_archive<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::new(SelectionStrategy::WholeArchive, include, exclude)
    }

    fn new<I, E>(strategy: SelectionStrategy, include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            strategy,
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    /// No include and no exclude list: every member passes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    #[must_use]
    pub fn include(&self) -> &[String] {
        &self.include
    }

    #[must_use]
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Apply the selection to one archive's member listing. Directory and link
    /// members are never judged by extension.
    #[must_use]
    pub fn apply(&self, members: Vec<FileInfo>) -> Vec<FileInfo> {
        if self.is_empty() {
            return members;
        }
        match self.strategy {
            SelectionStrategy::PerMember => members
                .into_iter()
                .filter(|m| m.file_type != FileType::File || self.keeps_extension(&m.ext()))
                .collect(),
            SelectionStrategy::WholeArchive => {
                if self.skips_archive(&members) {
                    Vec::new()
                } else {
                    members
                }
            }
        }
    }

    fn keeps_extension(&self, ext: &str) -> bool {
        if self.exclude.iter().any(|e| e == ext) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|i| i == ext)
    }

    fn skips_archive(&self, members: &[FileInfo]) -> bool {
        let extensions: Vec<String> = members
            .iter()
            .filter(|m| m.file_type == FileType::File)
            .map(FileInfo::ext)
            .collect();
        if extensions.iter().any(|ext| self.exclude.contains(ext)) {
            return true;
        }
        !self.include.is_empty() && !extensions.iter().any(|ext| self.include.contains(ext))
    }
}

fn normalize<I>(extensions: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
