//! 用户空间分区模块 - Personal / Work / Private 三种 profile

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 通知来源的用户空间分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// 主用户空间
    #[default]
    Personal,
    /// 工作空间
    Work,
    /// 隐私空间
    Private,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Personal => "personal",
            ProfileKind::Work => "work",
            ProfileKind::Private => "private",
        }
    }

    /// 镜像标题使用的后缀（Personal 不加后缀）
    pub fn display_suffix(&self) -> Option<&'static str> {
        match self {
            ProfileKind::Personal => None,
            ProfileKind::Work => Some(" (Work)"),
            ProfileKind::Private => Some(" (Private)"),
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(ProfileKind::Personal),
            "work" => Ok(ProfileKind::Work),
            "private" => Ok(ProfileKind::Private),
            other => Err(format!("unknown profile: {}", other)),
        }
    }
}

/// 生成 (应用, profile) 分区键，存储和 tracker 共用
pub fn partition_key(package: &str, profile: ProfileKind) -> String {
    format!("{}|{}", package, profile.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_as_str() {
        assert_eq!(ProfileKind::Personal.as_str(), "personal");
        assert_eq!(ProfileKind::Work.as_str(), "work");
        assert_eq!(ProfileKind::Private.as_str(), "private");
    }

    #[test]
    fn test_profile_display_suffix() {
        assert_eq!(ProfileKind::Personal.display_suffix(), None);
        assert_eq!(ProfileKind::Work.display_suffix(), Some(" (Work)"));
        assert_eq!(ProfileKind::Private.display_suffix(), Some(" (Private)"));
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("personal".parse::<ProfileKind>().unwrap(), ProfileKind::Personal);
        assert_eq!("Work".parse::<ProfileKind>().unwrap(), ProfileKind::Work);
        assert_eq!("PRIVATE".parse::<ProfileKind>().unwrap(), ProfileKind::Private);
        assert!("guest".parse::<ProfileKind>().is_err());
    }

    #[test]
    fn test_profile_default_is_personal() {
        assert_eq!(ProfileKind::default(), ProfileKind::Personal);
    }

    #[test]
    fn test_partition_key() {
        assert_eq!(partition_key("com.example.chat", ProfileKind::Work), "com.example.chat|work");
        assert_eq!(partition_key("com.example.chat", ProfileKind::Personal), "com.example.chat|personal");
    }

    #[test]
    fn test_profile_serialization() {
        let json = serde_json::to_string(&ProfileKind::Work).unwrap();
        assert_eq!(json, "\"work\"");
        let parsed: ProfileKind = serde_json::from_str("\"private\"").unwrap();
        assert_eq!(parsed, ProfileKind::Private);
    }
}
