use bitflags::bitflags;

use crate::models::issue::Account;

bitflags! {
    /// Role mask carried by every scored comment. The low two bits encode
    /// the comment kind (issue discussion vs. pull-request review), the
    /// rest the author's relationship to the issue. TASK marks the issue
    /// body itself, which is scored as a pseudo-comment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RoleFlags: u32 {
        const REVIEW = 1;
        const ISSUE = 1 << 1;
        const ASSIGNEE = 1 << 2;
        const ISSUER = 1 << 3;
        const COLLABORATOR = 1 << 4;
        const CONTRIBUTOR = 1 << 5;
        const TASK = 1 << 6;
    }
}

impl serde::Serialize for RoleFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for RoleFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role bits: {bits:#b}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Issue,
    Review,
}

/// Classifies a comment against the issue (or pull request) it belongs to.
///
/// The author-relationship rules are evaluated in a fixed priority order and
/// the first match wins, so an assignee who is also an org member gets the
/// ASSIGNEE bit, never COLLABORATOR. The kind bit is always present; when no
/// relationship rule matches the mask is kind-only.
pub fn classify(
    kind: CommentKind,
    author: Option<&Account>,
    author_association: Option<&str>,
    issuer: Option<&Account>,
    assignee: Option<&Account>,
) -> RoleFlags {
    let mut role = match kind {
        CommentKind::Review => RoleFlags::REVIEW,
        CommentKind::Issue => RoleFlags::ISSUE,
    };

    let author_id = author.map(|a| a.id);
    if author_id.is_some() && author_id == issuer.map(|a| a.id) {
        role |= RoleFlags::ISSUER;
    } else if author_id.is_some() && author_id == assignee.map(|a| a.id) {
        role |= RoleFlags::ASSIGNEE;
    } else if author_association == Some("MEMBER") {
        role |= RoleFlags::COLLABORATOR;
    } else if author_association == Some("CONTRIBUTOR") {
        role |= RoleFlags::CONTRIBUTOR;
    }

    role
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: u64, login: &str) -> Account {
        Account {
            id,
            login: login.to_string(),
        }
    }

    #[test]
    fn issuer_takes_priority_over_assignee() {
        let user = account(1, "alice");
        let role = classify(
            CommentKind::Issue,
            Some(&user),
            Some("MEMBER"),
            Some(&user),
            Some(&user),
        );
        assert_eq!(role, RoleFlags::ISSUE | RoleFlags::ISSUER);
    }

    #[test]
    fn assignee_takes_priority_over_member_association() {
        let issuer = account(1, "alice");
        let assignee = account(2, "bob");
        let role = classify(
            CommentKind::Issue,
            Some(&assignee),
            Some("MEMBER"),
            Some(&issuer),
            Some(&assignee),
        );
        assert_eq!(role, RoleFlags::ISSUE | RoleFlags::ASSIGNEE);
        assert!(!role.contains(RoleFlags::COLLABORATOR));
    }

    #[test]
    fn member_association_maps_to_collaborator() {
        let issuer = account(1, "alice");
        let commenter = account(3, "carol");
        let role = classify(
            CommentKind::Review,
            Some(&commenter),
            Some("MEMBER"),
            Some(&issuer),
            None,
        );
        assert_eq!(role, RoleFlags::REVIEW | RoleFlags::COLLABORATOR);
    }

    #[test]
    fn unmatched_author_gets_kind_only_mask() {
        let issuer = account(1, "alice");
        let commenter = account(4, "dan");
        let role = classify(
            CommentKind::Issue,
            Some(&commenter),
            Some("NONE"),
            Some(&issuer),
            None,
        );
        assert_eq!(role, RoleFlags::ISSUE);
    }

    #[test]
    fn missing_author_never_matches_missing_issuer() {
        let role = classify(CommentKind::Issue, None, None, None, None);
        assert_eq!(role, RoleFlags::ISSUE);
    }
}
