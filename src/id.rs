//! Composite and external identifiers.
//!
//! Every id handed out to clients is `source:kind:payload`. The payload is
//! private to the owning source and may contain further `:` separators; the
//! rest of the crate only reads the source tag to route the id back.
//!
//! External ids (`tt1375666`, `tt0903747:1:2`) come from the public film
//! database and enter the resolver instead of a source.

use std::fmt;
use std::str::FromStr;

use crate::model::ContentType;

/// What a composite id addresses inside its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Movie,
    Series,
    Episode,
}

impl IdKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IdKind::Movie => "movie",
            IdKind::Series => "series",
            IdKind::Episode => "episode",
        }
    }
}

impl From<ContentType> for IdKind {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Movie => IdKind::Movie,
            ContentType::Series => IdKind::Series,
        }
    }
}

/// Errors produced while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("malformed composite id: {0}")]
    Malformed(String),

    #[error("unknown id kind '{kind}' in {id}")]
    UnknownKind { id: String, kind: String },

    #[error("invalid payload for {source_tag}: {payload}")]
    Payload { source_tag: &'static str, payload: String },
}

/// `source:kind:payload`, parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub source: String,
    pub kind: IdKind,
    pub payload: String,
}

impl CompositeId {
    pub fn new(source: impl Into<String>, kind: IdKind, payload: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            payload: payload.into(),
        }
    }

    /// Payload split on `:`, for sources that pack several fields.
    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.payload.split(':')
    }
}

impl FromStr for CompositeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(source), Some(kind), Some(payload)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(IdError::Malformed(s.to_string()));
        };
        if source.is_empty() || payload.is_empty() {
            return Err(IdError::Malformed(s.to_string()));
        }

        let kind = match kind {
            "movie" => IdKind::Movie,
            "series" => IdKind::Series,
            "episode" => IdKind::Episode,
            other => {
                return Err(IdError::UnknownKind {
                    id: s.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        Ok(Self::new(source, kind, payload))
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.kind.as_str(), self.payload)
    }
}

/// Public film database id with an optional `:season:episode` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalId {
    pub id: String,
    pub episode: Option<(u32, u32)>,
}

impl ExternalId {
    const PREFIX: &'static str = "tt";

    /// Cheap prefix check used to route requests.
    #[must_use]
    pub fn is_external(raw: &str) -> bool {
        raw.strip_prefix(Self::PREFIX)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    }

    /// Parse `tt123`, `tt123:1:2`. Returns `None` for anything else.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if !Self::is_external(raw) {
            return None;
        }

        let mut parts = raw.split(':');
        let id = parts.next()?;
        if !id[Self::PREFIX.len()..].chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let episode = match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => None,
            (Some(season), Some(episode), None) => {
                let season: u32 = season.parse().ok()?;
                let episode: u32 = episode.parse().ok()?;
                if season == 0 || episode == 0 {
                    return None;
                }
                Some((season, episode))
            }
            _ => return None,
        };

        Some(Self {
            id: id.to_string(),
            episode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_composite_id() {
        let id: CompositeId = "xalaflix:movie:1234".parse().unwrap();
        assert_eq!(id.source, "xalaflix");
        assert_eq!(id.kind, IdKind::Movie);
        assert_eq!(id.payload, "1234");
    }

    #[test]
    fn payload_keeps_inner_colons() {
        let raw = "purstream:episode:3830:1:7";
        let id: CompositeId = raw.parse().unwrap();
        assert_eq!(id.kind, IdKind::Episode);
        assert_eq!(id.segments().collect::<Vec<_>>(), vec!["3830", "1", "7"]);
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!("xalaflix".parse::<CompositeId>(), Err(IdError::Malformed(_))));
        assert!(matches!("xalaflix:movie".parse::<CompositeId>(), Err(IdError::Malformed(_))));
        assert!(matches!("xalaflix:movie:".parse::<CompositeId>(), Err(IdError::Malformed(_))));
        assert!(matches!(
            "xalaflix:trailer:1".parse::<CompositeId>(),
            Err(IdError::UnknownKind { .. })
        ));
    }

    #[test]
    fn external_id_with_and_without_episode() {
        let movie = ExternalId::parse("tt1375666").unwrap();
        assert_eq!(movie.id, "tt1375666");
        assert_eq!(movie.episode, None);

        let episode = ExternalId::parse("tt0903747:2:5").unwrap();
        assert_eq!(episode.id, "tt0903747");
        assert_eq!(episode.episode, Some((2, 5)));
    }

    #[test]
    fn external_id_rejects_noise() {
        assert!(ExternalId::parse("purstream:movie:1").is_none());
        assert!(ExternalId::parse("ttabc").is_none());
        assert!(ExternalId::parse("tt12:1").is_none());
        assert!(ExternalId::parse("tt12:0:1").is_none());
        assert!(ExternalId::parse("tt12:1:2:3").is_none());
        assert!(!ExternalId::is_external("tt"));
    }
}
