//! # Sync Domains
//!
//! Each slice of remote data the coordinator mirrors is a [`SyncDomain`],
//! tagged with a [`DomainKind`] that decides how an empty remote snapshot is
//! applied:
//!
//! ```text
//! Mirror   (catalog, playlists, likes)          []  -> clear local slice
//! Derived  (recommendations, trending, spotlight) [] -> keep last section
//! ```

use crate::{Result, SyncError};
use core_library::GLOBAL_SCOPE;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trending period used when no scope is given
pub const DEFAULT_TRENDING_PERIOD: &str = "day";

/// How a domain's remote snapshot maps onto local state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    /// Local rows are an exact copy of the remote snapshot
    Mirror,
    /// Local state is a ranked id list; remote rows are upserted but never pruned
    Derived,
}

/// A slice of remote data kept in the local mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDomain {
    Catalog,
    Playlists,
    Likes,
    Recommendations,
    Trending,
    Spotlight,
}

impl SyncDomain {
    pub const ALL: [SyncDomain; 6] = [
        SyncDomain::Catalog,
        SyncDomain::Playlists,
        SyncDomain::Likes,
        SyncDomain::Recommendations,
        SyncDomain::Trending,
        SyncDomain::Spotlight,
    ];

    pub fn kind(&self) -> DomainKind {
        match self {
            SyncDomain::Catalog | SyncDomain::Playlists | SyncDomain::Likes => DomainKind::Mirror,
            SyncDomain::Recommendations | SyncDomain::Trending | SyncDomain::Spotlight => {
                DomainKind::Derived
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDomain::Catalog => "catalog",
            SyncDomain::Playlists => "playlists",
            SyncDomain::Likes => "likes",
            SyncDomain::Recommendations => "recommendations",
            SyncDomain::Trending => "trending",
            SyncDomain::Spotlight => "spotlight",
        }
    }

    /// Whether the scope defaults to the signed-in user
    pub fn is_user_scoped(&self) -> bool {
        matches!(
            self,
            SyncDomain::Playlists | SyncDomain::Likes | SyncDomain::Recommendations
        )
    }

    /// Resolve the effective scope for a sync.
    ///
    /// Returns `Ok(None)` when the domain needs a signed-in user and there is
    /// neither an explicit scope nor a current identity.
    pub fn resolve_scope(
        &self,
        explicit: Option<&str>,
        current_user: Option<String>,
    ) -> Result<Option<String>> {
        if let Some(scope) = explicit {
            if scope.trim() != scope {
                return Err(self.invalid_scope(scope, "scope has surrounding whitespace"));
            }
        }

        match self {
            SyncDomain::Catalog => Ok(Some(explicit.unwrap_or(GLOBAL_SCOPE).to_string())),
            SyncDomain::Playlists | SyncDomain::Likes | SyncDomain::Recommendations => {
                match explicit {
                    Some("") => Err(self.invalid_scope("", "user scope cannot be empty")),
                    Some(scope) => Ok(Some(scope.to_string())),
                    None => Ok(current_user.filter(|id| !id.is_empty())),
                }
            }
            SyncDomain::Trending => match explicit {
                Some("") => Err(self.invalid_scope("", "trending period cannot be empty")),
                Some(period) => Ok(Some(period.to_string())),
                None => Ok(Some(DEFAULT_TRENDING_PERIOD.to_string())),
            },
            SyncDomain::Spotlight => match explicit {
                None | Some("") => Ok(Some(GLOBAL_SCOPE.to_string())),
                Some(scope) => Err(self.invalid_scope(scope, "spotlight takes no scope")),
            },
        }
    }

    /// `section_cache` key written by a derived domain
    pub fn section_key(&self, scope: &str) -> Option<String> {
        match self {
            SyncDomain::Recommendations => Some(format!("recommendations_{}", scope)),
            SyncDomain::Trending => Some(format!("trend_{}", scope)),
            SyncDomain::Spotlight => Some("spotlight".to_string()),
            _ => None,
        }
    }

    /// Query-cache key holding results derived from this domain and scope
    pub fn cache_key(&self, scope: &str) -> String {
        if scope.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}_{}", self.as_str(), scope)
        }
    }

    /// Whether a sync of this domain writes `media_records`
    pub fn writes_media(&self) -> bool {
        !matches!(self, SyncDomain::Playlists | SyncDomain::Likes)
    }

    /// Query-cache invalidation after a successful sync of this slice.
    ///
    /// Media rows are shared by the catalog and every section, so a sync
    /// that writes them stales all of those reads at every scope.
    pub fn cache_invalidation(&self, scope: &str) -> CacheInvalidation {
        if self.writes_media() {
            CacheInvalidation::Families(
                SyncDomain::ALL
                    .iter()
                    .filter(|d| d.writes_media())
                    .map(|d| d.as_str())
                    .collect(),
            )
        } else {
            CacheInvalidation::Keys(vec![self.cache_key(scope)])
        }
    }

    fn invalid_scope(&self, scope: &str, reason: &str) -> SyncError {
        SyncError::InvalidScope {
            domain: self.as_str().to_string(),
            scope: scope.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for SyncDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDomain {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        SyncDomain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == s)
            .ok_or_else(|| SyncError::UnknownDomain(s.to_string()))
    }
}

/// Which query-cache entries a sync makes stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheInvalidation {
    /// Exactly these keys
    Keys(Vec<String>),
    /// Each family's bare key and all of its `{family}_{scope}` keys
    Families(Vec<&'static str>),
}

/// A domain plus an optional explicit scope, as requested by a caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncTarget {
    pub domain: SyncDomain,
    pub scope: Option<String>,
}

impl SyncTarget {
    pub fn new(domain: SyncDomain) -> Self {
        Self {
            domain,
            scope: None,
        }
    }

    pub fn scoped(domain: SyncDomain, scope: impl Into<String>) -> Self {
        Self {
            domain,
            scope: Some(scope.into()),
        }
    }
}

impl From<SyncDomain> for SyncTarget {
    fn from(domain: SyncDomain) -> Self {
        SyncTarget::new(domain)
    }
}

/// Identity of an in-flight sync: domain plus resolved scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SyncKey {
    pub domain: SyncDomain,
    pub scope: String,
}

impl SyncKey {
    /// Scope as it may appear in logs; user and owner ids are masked.
    pub fn log_scope(&self) -> String {
        if self.scope.is_empty() {
            return String::new();
        }
        match self.domain {
            SyncDomain::Catalog => redact_if_sensitive("owner_id", &self.scope),
            d if d.is_user_scoped() => redact_if_sensitive("user_id", &self.scope),
            _ => self.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_scope_masks_identifiers() {
        let likes = SyncKey {
            domain: SyncDomain::Likes,
            scope: "8f14e45f-ceea".to_string(),
        };
        assert_eq!(likes.log_scope(), "8f14***");

        let trending = SyncKey {
            domain: SyncDomain::Trending,
            scope: "week".to_string(),
        };
        assert_eq!(trending.log_scope(), "week");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SyncDomain::Catalog.kind(), DomainKind::Mirror);
        assert_eq!(SyncDomain::Likes.kind(), DomainKind::Mirror);
        assert_eq!(SyncDomain::Trending.kind(), DomainKind::Derived);
        assert_eq!(SyncDomain::Spotlight.kind(), DomainKind::Derived);
    }

    #[test]
    fn test_parse_round_trip() {
        for domain in SyncDomain::ALL {
            assert_eq!(domain.as_str().parse::<SyncDomain>().unwrap(), domain);
        }
        assert!(matches!(
            "albums".parse::<SyncDomain>(),
            Err(SyncError::UnknownDomain(_))
        ));
    }

    #[test]
    fn test_scope_resolution() {
        let user = || Some("user-1".to_string());

        assert_eq!(
            SyncDomain::Catalog.resolve_scope(None, user()).unwrap(),
            Some(String::new())
        );
        assert_eq!(
            SyncDomain::Likes.resolve_scope(None, user()).unwrap(),
            Some("user-1".to_string())
        );
        assert_eq!(SyncDomain::Likes.resolve_scope(None, None).unwrap(), None);
        assert_eq!(
            SyncDomain::Likes.resolve_scope(Some("user-2"), None).unwrap(),
            Some("user-2".to_string())
        );
        assert_eq!(
            SyncDomain::Trending.resolve_scope(None, None).unwrap(),
            Some("day".to_string())
        );
        assert!(SyncDomain::Spotlight.resolve_scope(Some("x"), None).is_err());
        assert!(SyncDomain::Likes.resolve_scope(Some(""), user()).is_err());
        assert!(SyncDomain::Catalog.resolve_scope(Some(" u1"), None).is_err());
    }

    #[test]
    fn test_section_keys() {
        assert_eq!(
            SyncDomain::Trending.section_key("week").as_deref(),
            Some("trend_week")
        );
        assert_eq!(
            SyncDomain::Recommendations.section_key("u1").as_deref(),
            Some("recommendations_u1")
        );
        assert_eq!(
            SyncDomain::Spotlight.section_key("").as_deref(),
            Some("spotlight")
        );
        assert_eq!(SyncDomain::Catalog.section_key(""), None);
    }

    #[test]
    fn test_media_writes_invalidate_every_media_family() {
        let families = CacheInvalidation::Families(vec![
            "catalog",
            "recommendations",
            "trending",
            "spotlight",
        ]);
        assert_eq!(SyncDomain::Catalog.cache_invalidation(""), families);
        assert_eq!(SyncDomain::Catalog.cache_invalidation("u1"), families);
        assert_eq!(SyncDomain::Trending.cache_invalidation("week"), families);
        assert_eq!(
            SyncDomain::Likes.cache_invalidation("u1"),
            CacheInvalidation::Keys(vec!["likes_u1".to_string()])
        );
        assert_eq!(
            SyncDomain::Playlists.cache_invalidation("u1"),
            CacheInvalidation::Keys(vec!["playlists_u1".to_string()])
        );
    }
}
