//! Roles assigned to proxied endpoints.

use serde::{Deserialize, Serialize};

/// What a proxied endpoint is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxiedRole {
    /// Discovered but not routed
    #[default]
    None,
    /// Source of resources
    Input,
    /// Destination for resources
    Output,
}

impl ProxiedRole {
    pub const ALL: [ProxiedRole; 3] = [ProxiedRole::None, ProxiedRole::Input, ProxiedRole::Output];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for ProxiedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProxiedRole::None => "none",
            ProxiedRole::Input => "input",
            ProxiedRole::Output => "output",
        };
        f.write_str(name)
    }
}

/// A set of roles, used to filter which endpoints a route exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: Self = Self(0);
    pub const INPUT: Self = Self(ProxiedRole::Input.bit());
    pub const OUTPUT: Self = Self(ProxiedRole::Output.bit());
    pub const INPUT_OUTPUT: Self = Self(ProxiedRole::Input.bit() | ProxiedRole::Output.bit());

    pub const fn with(self, role: ProxiedRole) -> Self {
        Self(self.0 | role.bit())
    }

    pub const fn contains(&self, role: ProxiedRole) -> bool {
        self.0 & role.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Roles in the set, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ProxiedRole> {
        let set = *self;
        ProxiedRole::ALL.into_iter().filter(move |r| set.contains(*r))
    }
}

impl FromIterator<ProxiedRole> for RoleSet {
    fn from_iter<I: IntoIterator<Item = ProxiedRole>>(iter: I) -> Self {
        iter.into_iter().fold(RoleSet::EMPTY, RoleSet::with)
    }
}

impl From<ProxiedRole> for RoleSet {
    fn from(role: ProxiedRole) -> Self {
        RoleSet::EMPTY.with(role)
    }
}

impl Serialize for RoleSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<ProxiedRole>::deserialize(deserializer)?;
        Ok(roles.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership() {
        let set = RoleSet::INPUT;
        assert!(set.contains(ProxiedRole::Input));
        assert!(!set.contains(ProxiedRole::Output));
        assert!(!set.contains(ProxiedRole::None));
        assert!(RoleSet::EMPTY.is_empty());
    }

    #[test]
    fn collect_roles() {
        let set: RoleSet = [ProxiedRole::Output, ProxiedRole::Input].into_iter().collect();
        assert_eq!(set, RoleSet::INPUT_OUTPUT);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![ProxiedRole::Input, ProxiedRole::Output]
        );
    }

    #[test]
    fn role_set_serializes_as_list() {
        let json = serde_json::to_string(&RoleSet::INPUT_OUTPUT).unwrap();
        assert_eq!(json, r#"["input","output"]"#);
        let parsed: RoleSet = serde_json::from_str(r#"["none"]"#).unwrap();
        assert!(parsed.contains(ProxiedRole::None));
    }

    #[test]
    fn default_role_is_none() {
        assert_eq!(ProxiedRole::default(), ProxiedRole::None);
    }
}
