//! Domain models for bookmarks and browsing history.
//!
//! These mirror what the places storage hands back; the tree view layers
//! its presentation rules on top of them.

use serde::{Deserialize, Serialize};

/// GUID of the storage root that owns every built-in folder.
pub const ROOT_GUID: &str = "root________";
/// GUID of the mobile root, the top of the bookmarks UI.
pub const MOBILE_ROOT_GUID: &str = "mobile______";
/// GUID of the desktop "Bookmarks Menu" root.
pub const MENU_ROOT_GUID: &str = "menu________";
/// GUID of the desktop "Bookmarks Toolbar" root.
pub const TOOLBAR_ROOT_GUID: &str = "toolbar_____";
/// GUID of the desktop "Other Bookmarks" root.
pub const UNFILED_ROOT_GUID: &str = "unfiled_____";
/// GUID of the synthesized desktop folder. Never persisted.
pub const DESKTOP_ROOT_GUID: &str = "fake_desktop_root";

/// Kind of node in the bookmark tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BookmarkNodeType {
    /// A bookmarked page.
    Item = 1,
    /// A folder that may hold children.
    Folder = 2,
    /// A visual separator.
    Separator = 3,
}

impl From<BookmarkNodeType> for u8 {
    fn from(kind: BookmarkNodeType) -> Self {
        kind as Self
    }
}

impl TryFrom<u8> for BookmarkNodeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Item),
            2 => Ok(Self::Folder),
            3 => Ok(Self::Separator),
            other => Err(format!("unknown bookmark node type: {other}")),
        }
    }
}

impl std::fmt::Display for BookmarkNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Item => write!(f, "Bookmark"),
            Self::Folder => write!(f, "Folder"),
            Self::Separator => write!(f, "Separator"),
        }
    }
}

/// A node of the bookmark tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub node_type: BookmarkNodeType,
    pub guid: String,
    #[serde(default)]
    pub parent_guid: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// `None` when the children were not loaded.
    #[serde(default)]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    /// Create a folder node.
    #[must_use]
    pub fn folder(guid: impl Into<String>, parent_guid: Option<String>, title: Option<String>) -> Self {
        Self {
            node_type: BookmarkNodeType::Folder,
            guid: guid.into(),
            parent_guid,
            position: None,
            title,
            url: None,
            children: Some(Vec::new()),
        }
    }

    /// Create a bookmark item node.
    #[must_use]
    pub fn item(
        guid: impl Into<String>,
        parent_guid: impl Into<String>,
        url: impl Into<String>,
        title: Option<String>,
    ) -> Self {
        Self {
            node_type: BookmarkNodeType::Item,
            guid: guid.into(),
            parent_guid: Some(parent_guid.into()),
            position: None,
            title,
            url: Some(url.into()),
            children: None,
        }
    }

    /// Children of this node, empty when none were loaded.
    #[must_use]
    pub fn children(&self) -> &[BookmarkNode] {
        self.children.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.node_type == BookmarkNodeType::Folder
    }
}

/// Classification of a history visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VisitType {
    /// Recorded for bookkeeping only, not a real visit.
    NotAVisit = 0,
    Link = 1,
    Typed = 2,
    Bookmark = 3,
    Embed = 4,
    RedirectPermanent = 5,
    RedirectTemporary = 6,
    Download = 7,
    FramedLink = 8,
    Reload = 9,
}

impl VisitType {
    /// Visit kinds left out of the detailed history listing.
    pub const HIDDEN: [Self; 3] = [
        Self::NotAVisit,
        Self::RedirectTemporary,
        Self::RedirectPermanent,
    ];
}

impl From<VisitType> for u8 {
    fn from(kind: VisitType) -> Self {
        kind as Self
    }
}

impl TryFrom<u8> for VisitType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NotAVisit),
            1 => Ok(Self::Link),
            2 => Ok(Self::Typed),
            3 => Ok(Self::Bookmark),
            4 => Ok(Self::Embed),
            5 => Ok(Self::RedirectPermanent),
            6 => Ok(Self::RedirectTemporary),
            7 => Ok(Self::Download),
            8 => Ok(Self::FramedLink),
            9 => Ok(Self::Reload),
            other => Err(format!("unknown visit type: {other}")),
        }
    }
}

impl std::str::FromStr for VisitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "link" => Ok(Self::Link),
            "typed" => Ok(Self::Typed),
            "bookmark" => Ok(Self::Bookmark),
            "embed" => Ok(Self::Embed),
            "redirect-permanent" => Ok(Self::RedirectPermanent),
            "redirect-temporary" => Ok(Self::RedirectTemporary),
            "download" => Ok(Self::Download),
            "framed-link" => Ok(Self::FramedLink),
            "reload" => Ok(Self::Reload),
            "not-a-visit" => Ok(Self::NotAVisit),
            _ => Err(format!("Unknown visit type: {s}")),
        }
    }
}

/// A single visit as returned by detailed history queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitInfo {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Visit time in milliseconds since the Unix epoch.
    pub visit_time: i64,
    pub visit_type: VisitType,
}

/// Page metadata observed while a page is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageObservation {
    #[serde(default)]
    pub title: Option<String>,
}
