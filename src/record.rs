//! 通知记录模块 - 观察到的原始通知快照

use serde::{Deserialize, Serialize};

use crate::profile::{partition_key, ProfileKind};

/// 一条被观察到的通知（某一时刻的快照）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// 来源应用包名
    pub package: String,
    /// 应用显示名称
    pub app_label: String,
    /// 标题
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// 正文
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 到达时间戳（毫秒，宿主提供）
    pub posted_at: i64,
    /// 宿主分配的唯一键（不透明字符串）
    pub key: String,
    /// 用户空间分区
    #[serde(default)]
    pub profile: ProfileKind,
    /// 用户空间数字 id（未知时为 -1）
    #[serde(default = "unknown_user_id")]
    pub user_id: i32,
    /// 编码后的图标数据
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn unknown_user_id() -> i32 {
    -1
}

impl NotificationRecord {
    /// 创建新记录（测试和宿主边界共用的便捷构造）
    pub fn new(
        package: impl Into<String>,
        app_label: impl Into<String>,
        key: impl Into<String>,
        posted_at: i64,
        profile: ProfileKind,
    ) -> Self {
        Self {
            package: package.into(),
            app_label: app_label.into(),
            title: None,
            text: None,
            posted_at,
            key: key.into(),
            profile,
            user_id: if profile == ProfileKind::Personal { 0 } else { -1 },
            icon: None,
        }
    }

    /// 设置标题（链式调用）
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// 设置正文（链式调用）
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// 设置用户 id（链式调用）
    pub fn with_user_id(mut self, user_id: i32) -> Self {
        self.user_id = user_id;
        self
    }

    /// 设置图标数据（链式调用）
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// 入库校验：空键或非正时间戳的记录拒收
    pub fn is_valid(&self) -> bool {
        !self.key.trim().is_empty() && self.posted_at > 0
    }

    /// 所属 (应用, profile) 分区键
    pub fn partition_key(&self) -> String {
        partition_key(&self.package, self.profile)
    }

    /// 内容是否与另一条记录相同（标题 + 正文）
    pub fn same_content(&self, other: &NotificationRecord) -> bool {
        self.title == other.title && self.text == other.text
    }
}
