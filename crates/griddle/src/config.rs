//! Data source limits.

use serde::{Deserialize, Serialize};

/// Limits applied by [`DataSource`](crate::DataSource) to every request.
///
/// Defaults impose no limits. Can be loaded from any serde format:
///
/// ```
/// use griddle::DataSourceConfig;
///
/// let config: DataSourceConfig = serde_json::from_str(r#"{"max_page_size": 100}"#).unwrap();
/// assert_eq!(config.max_page_size, Some(100));
/// assert_eq!(config.max_group_depth, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Upper bound for `pageSize`. Larger requested pages are clamped.
    pub max_page_size: Option<usize>,
    /// Maximum number of grouping levels. Deeper requests are rejected.
    pub max_group_depth: Option<usize>,
}

impl DataSourceConfig {
    /// Clamps requested page sizes to `max`.
    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = Some(max);
        self
    }

    /// Rejects requests grouping more than `max` levels deep.
    pub fn with_max_group_depth(mut self, max: usize) -> Self {
        self.max_group_depth = Some(max);
        self
    }

    /// Effective page size for a requested one.
    pub(crate) fn clamp_page_size(&self, requested: usize) -> usize {
        match self.max_page_size {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}
