use crate::chat::message::FileHandle;

/// Most files a single message may carry.
pub const MAX_ATTACHMENTS: usize = 4;

/// Why some candidates did not make it into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// At least one candidate was neither `image/*` nor `application/pdf`.
    UnsupportedType,
    /// Valid candidates were dropped because the buffer is full.
    LimitExceeded,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnsupportedType => "unsupported-type",
            RejectReason::LimitExceeded => "limit-exceeded",
        }
    }
}

/// Outcome of one `add_files` call. `accepted` and `rejected_reason` can
/// both be populated: a truncated batch still stages what fit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddFilesReport {
    pub accepted: Vec<FileHandle>,
    pub rejected_reason: Option<RejectReason>,
    /// Count of candidates that failed the type filter.
    pub unsupported: usize,
    /// Count of valid candidates dropped by the limit.
    pub truncated: usize,
}

/// Only images and PDFs can be attached.
pub fn is_supported_mime(mime: &str) -> bool {
    mime.starts_with("image/") || mime == "application/pdf"
}

/// Files picked or pasted but not yet sent, in arrival order.
#[derive(Debug, Clone)]
pub struct AttachmentBuffer {
    files: Vec<FileHandle>,
    limit: usize,
}

impl Default for AttachmentBuffer {
    fn default() -> Self {
        Self::new(MAX_ATTACHMENTS)
    }
}

impl AttachmentBuffer {
    /// The limit is clamped to `1..=MAX_ATTACHMENTS`.
    pub fn new(limit: usize) -> Self {
        Self {
            files: Vec::new(),
            limit: limit.clamp(1, MAX_ATTACHMENTS),
        }
    }

    /// Filters candidates by type, then stages as many as still fit.
    ///
    /// When both filters drop something, `LimitExceeded` is reported.
    pub fn add_files(&mut self, candidates: impl IntoIterator<Item = FileHandle>) -> AddFilesReport {
        let (valid, invalid): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|file| is_supported_mime(&file.mime));

        let room = self.limit.saturating_sub(self.files.len());
        let truncated = valid.len().saturating_sub(room);
        let accepted: Vec<FileHandle> = valid.into_iter().take(room).collect();
        self.files.extend(accepted.iter().cloned());

        let rejected_reason = if truncated > 0 {
            Some(RejectReason::LimitExceeded)
        } else if !invalid.is_empty() {
            Some(RejectReason::UnsupportedType)
        } else {
            None
        };

        if let Some(reason) = rejected_reason {
            tracing::debug!(
                reason = reason.as_str(),
                accepted = accepted.len(),
                unsupported = invalid.len(),
                truncated,
                "attachment candidates rejected"
            );
        }

        AddFilesReport {
            accepted,
            rejected_reason,
            unsupported: invalid.len(),
            truncated,
        }
    }

    /// Removes one staged file. Out-of-range indices are ignored.
    pub fn remove_one(&mut self, index: usize) -> Option<FileHandle> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Empties the buffer and hands over its contents.
    pub fn take(&mut self) -> Vec<FileHandle> {
        std::mem::take(&mut self.files)
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
