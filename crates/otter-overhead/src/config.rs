//! Registry configuration

/// How to pick between historical representations of a collection class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutDetection {
    /// Probe the snapshot
    #[default]
    Auto,
    /// Force the older representation
    Legacy,
    /// Force the newer representation
    Modern,
}

/// Collection registry configuration
#[derive(Debug, Clone)]
pub struct OverheadConfig {
    /// Hash map bucket layout (default: probe)
    pub hash_map_layout: LayoutDetection,
    /// Concurrent hash map layout (default: probe)
    pub concurrent_map_layout: LayoutDetection,
    /// Describe subclasses of known collection classes (default: true)
    pub cover_subclasses: bool,
    /// Treat fields reachable by a shorter path as known (default: true)
    pub ban_redundant_fields: bool,
}

impl Default for OverheadConfig {
    fn default() -> Self {
        Self {
            hash_map_layout: LayoutDetection::Auto,
            concurrent_map_layout: LayoutDetection::Auto,
            cover_subclasses: true,
            ban_redundant_fields: true,
        }
    }
}
